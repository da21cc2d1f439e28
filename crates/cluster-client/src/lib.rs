//! Kubernetes API client for distro-operator
//!
//! A thin, mockable layer over kube-rs that works on untyped [`Manifest`]
//! documents, so the reconciler can handle any kind rendered from templates.
//!
//! # Example
//!
//! ```no_run
//! use cluster_client::{gvk_from_api_version, ClusterClientTrait, KubeClusterClient};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = KubeClusterClient::try_default().await?;
//!
//! let gvk = gvk_from_api_version("rbac.authorization.k8s.io/v1", "ClusterRole");
//! let role = client.get(&gvk, None, "view").await?;
//! println!("{role} is cluster-scoped: {}", client.is_cluster_scoped(&gvk).await?);
//! # Ok(())
//! # }
//! ```
//!
//! # Features
//!
//! - **Dynamic objects**: any kind, resolved through API discovery
//! - **Scope cache**: discovery results are cached per kind
//! - **Server-side apply**: patches are applied with an explicit field owner
//! - **Mocking**: `MockClusterClient` behind the `test-util` feature

pub mod client;
pub mod error;
pub mod models;
#[path = "trait.rs"]
pub mod cluster_trait;
#[cfg(feature = "test-util")]
pub mod mock;

pub use client::KubeClusterClient;
pub use error::ClusterError;
pub use models::{gvk_from_api_version, Manifest, ObjectKey};
pub use cluster_trait::ClusterClientTrait;
#[cfg(feature = "test-util")]
pub use mock::{CallHook, MockCall, MockClusterClient, MockVerb};
