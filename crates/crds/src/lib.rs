//! distro-operator CRD Definitions
//!
//! Kubernetes Custom Resource Definitions for the distro-operator controller.

pub mod server_distribution;

pub use server_distribution::*;
