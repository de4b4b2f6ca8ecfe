//! Integration tests for the FPGA e2e harness
//!
//! # Test Organization
//!
//! - `cluster_client`: Stories about the Kubernetes-backed cluster client
//!   (namespaces, workload phases, readiness counts, diagnostics) that hold
//!   on any cluster
//!
//! - `fpga_plugin`: The real suite against FPGA hardware: webhook and device
//!   plugin deployment, capacity advertisement, and workload isolation
//!
//! # Running These Tests
//!
//! ```bash
//! # Any cluster reachable through KUBECONFIG
//! cargo test --test kind cluster_client -- --ignored
//!
//! # FPGA nodes plus the plugin repository checkout
//! FPGA_E2E_REPO_ROOT=/path/to/intel-device-plugins-for-kubernetes \
//!     cargo test --test kind fpga_plugin -- --ignored --nocapture
//! ```

mod cluster_client;
mod fpga_plugin;
mod helpers;
