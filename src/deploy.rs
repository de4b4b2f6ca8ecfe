//! Deployment of the webhook and device plugin through their shell scripts
//!
//! The scripts are opaque: they are invoked as
//! `<script> --mode <mode> --namespace <namespace>` and judged by exit code
//! alone. A failed deploy means the environment is broken, so there is no
//! retry.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use tokio::process::Command;
use tracing::{debug, info};

use crate::Error;

/// Trait abstracting component deployment
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Deployer: Send + Sync {
    /// Run the deploy procedure at `script` in `mode` against `namespace`
    async fn deploy(&self, script: &Path, mode: &str, namespace: &str) -> Result<(), Error>;
}

/// Runs deploy scripts as child processes, bounded by a timeout
#[derive(Clone, Debug)]
pub struct ScriptDeployer {
    timeout: Duration,
}

impl ScriptDeployer {
    /// Create a deployer that kills scripts running longer than `timeout`
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl Deployer for ScriptDeployer {
    async fn deploy(&self, script: &Path, mode: &str, namespace: &str) -> Result<(), Error> {
        let script_name = script.display().to_string();
        info!(script = %script_name, %mode, %namespace, "running deploy script");

        let output = Command::new(script)
            .args(["--mode", mode, "--namespace", namespace])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output();

        let output = match tokio::time::timeout(self.timeout, output).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return Err(Error::deployment(
                    script_name,
                    mode,
                    namespace,
                    None,
                    format!("failed to spawn: {}", e),
                ))
            }
            Err(_) => {
                return Err(Error::deployment(
                    script_name,
                    mode,
                    namespace,
                    None,
                    format!("timed out after {:?}", self.timeout),
                ))
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout);
        if !stdout.trim().is_empty() {
            debug!(script = %script_name, "{}", stdout.trim_end());
        }

        if !output.status.success() {
            return Err(Error::deployment(
                script_name,
                mode,
                namespace,
                output.status.code(),
                String::from_utf8_lossy(&output.stderr).trim_end().to_string(),
            ));
        }

        Ok(())
    }
}

/// Resolve a repository-relative path to an existing file.
///
/// With an explicit `repo_root` the file must exist under it. Otherwise the
/// current directory and each of its ancestors are tried in turn.
pub fn locate_repo_file(repo_root: Option<&Path>, relative: &str) -> Result<PathBuf, Error> {
    let candidates: Vec<PathBuf> = match repo_root {
        Some(root) => vec![root.join(relative)],
        None => std::env::current_dir()?
            .ancestors()
            .map(|dir| dir.join(relative))
            .collect(),
    };

    candidates
        .into_iter()
        .find(|path| path.is_file())
        .ok_or_else(|| {
            Error::validation_for_field(
                "script",
                format!("unable to locate {:?} in the repository", relative),
            )
        })
}
