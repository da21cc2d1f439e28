//! Manifest rendering and transformation
//!
//! Turns a manifest directory into the desired resource set for one owner
//! object. Everything here is pure: no cluster I/O happens before the
//! reconciler receives the result.
//!
//! # Example
//!
//! ```no_run
//! use manifests::{render_manifest, FieldMapping, TransformOptions};
//! use serde_json::json;
//! use std::path::Path;
//!
//! # fn example() -> Result<(), manifests::ManifestError> {
//! let mappings = vec![
//!     FieldMapping::new("Service", "/spec/ports/0/port", Some(json!(9000))).with_default(8321),
//! ];
//! let options = TransformOptions::for_owner("demo", "ns1", mappings);
//! let resources = render_manifest(Path::new("/manifests"), &options)?;
//! for resource in &resources {
//!     println!("{resource}");
//! }
//! # Ok(())
//! # }
//! ```

pub mod context;
pub mod error;
pub mod field_mapping;
pub mod pointer;
pub mod render;
pub mod transform;

pub use context::{ManifestContext, CA_BUNDLE_HASH_ANNOTATION, USER_CONFIG_HASH_ANNOTATION};
pub use error::ManifestError;
pub use field_mapping::{apply_mappings, FieldMapping};
pub use render::{render_manifest, render_manifest_with_context, render_manifests};
pub use transform::{
    apply_name_prefix, apply_namespace, apply_transforms, filter_exclude_kinds, is_cluster_scoped_kind,
    TransformOptions,
};
