//! Bounded polling shared by every waiter in the harness
//!
//! All four waiters (readiness, allocatable resource, workload success,
//! workload failure) are the same loop with a different check. The check
//! returns:
//!
//! - `Ok(Some(value))` - condition met, stop and return the value
//! - `Ok(None)` - not yet, poll again after the interval
//! - `Err(e)` - fatal, stop immediately and surface `e`
//!
//! The timeout is a hard upper bound: a check that itself hangs is cut off
//! when the remaining budget runs out.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tracing::trace;

use crate::Error;

/// Result type for polling check functions.
pub type PollResult<T> = std::result::Result<Option<T>, Error>;

/// Why a bounded wait ended without its condition being met
#[derive(Debug)]
pub enum WaitError {
    /// The budget ran out
    TimedOut {
        /// Wall-clock time spent waiting
        elapsed: Duration,
    },
    /// The check reported a fatal error
    Aborted(Error),
}

impl WaitError {
    /// Convert into a harness error, building the timeout variant from the elapsed time.
    pub fn or_timeout(self, on_timeout: impl FnOnce(Duration) -> Error) -> Error {
        match self {
            WaitError::TimedOut { elapsed } => on_timeout(elapsed),
            WaitError::Aborted(e) => e,
        }
    }
}

/// Poll `check` every `interval` until it yields a value, fails, or `timeout` expires.
///
/// The check always runs at least once, even with a zero timeout.
pub async fn wait_until<T, F, Fut>(
    description: &str,
    interval: Duration,
    timeout: Duration,
    mut check: F,
) -> std::result::Result<T, WaitError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = PollResult<T>>,
{
    let start = Instant::now();

    loop {
        let remaining = timeout.saturating_sub(start.elapsed());
        match tokio::time::timeout(remaining, check()).await {
            Ok(Ok(Some(value))) => return Ok(value),
            Ok(Ok(None)) => trace!(%description, "condition not met yet"),
            Ok(Err(e)) => return Err(WaitError::Aborted(e)),
            Err(_) => {
                return Err(WaitError::TimedOut {
                    elapsed: start.elapsed(),
                })
            }
        }

        let elapsed = start.elapsed();
        if elapsed >= timeout {
            return Err(WaitError::TimedOut { elapsed });
        }
        tokio::time::sleep(interval.min(timeout - elapsed)).await;
    }
}
