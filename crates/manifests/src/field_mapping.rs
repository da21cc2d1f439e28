//! Field mapping engine
//!
//! Copies values from the owner object into rendered resources. Each rule
//! targets one kind and one JSON pointer; the value is the rule's source when
//! it is non-empty, otherwise its default. A rule with neither is skipped, so
//! an empty value is never written.

use crate::error::ManifestError;
use crate::pointer::{self, PointerError};
use cluster_client::Manifest;
use serde_json::Value;
use tracing::debug;

/// One "copy this value to this path in resources of this kind" rule.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldMapping {
    /// Value taken from the owner object; `None`, `null` and `""` count as empty
    pub source_value: Option<Value>,
    /// Fallback used when the source is empty
    pub default_value: Option<Value>,
    /// JSON pointer (RFC 6901) of the field to set
    pub target_field: String,
    /// Kind of the resources the rule applies to
    pub target_kind: String,
    /// Create missing intermediate maps instead of failing
    pub create_if_not_exists: bool,
}

impl FieldMapping {
    /// Rule that creates its path when missing.
    pub fn new(target_kind: &str, target_field: &str, source_value: Option<Value>) -> Self {
        Self {
            source_value,
            default_value: None,
            target_field: target_field.to_string(),
            target_kind: target_kind.to_string(),
            create_if_not_exists: true,
        }
    }

    #[must_use]
    pub fn with_default(mut self, default_value: impl Into<Value>) -> Self {
        self.default_value = Some(default_value.into());
        self
    }

    /// The value to write: the source if non-empty, else the default if non-empty.
    pub fn resolve(&self) -> Option<&Value> {
        self.source_value
            .as_ref()
            .filter(|v| !is_empty(v))
            .or_else(|| self.default_value.as_ref().filter(|v| !is_empty(v)))
    }
}

fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

/// Applies every mapping, in order, to the resources of its target kind.
pub fn apply_mappings(resources: &mut [Manifest], mappings: &[FieldMapping]) -> Result<(), ManifestError> {
    for mapping in mappings {
        let Some(value) = mapping.resolve() else {
            debug!(
                "No value for {} {}, leaving it untouched",
                mapping.target_kind, mapping.target_field
            );
            continue;
        };
        for resource in resources.iter_mut().filter(|r| r.kind() == mapping.target_kind) {
            let label = resource.to_string();
            pointer::set(
                resource.value_mut(),
                &mapping.target_field,
                value.clone(),
                mapping.create_if_not_exists,
            )
            .map_err(|e| match e {
                PointerError::NotFound => ManifestError::PathNotFound {
                    resource: label,
                    pointer: mapping.target_field.clone(),
                },
                PointerError::Invalid(reason) => ManifestError::InvalidPointer {
                    resource: label,
                    pointer: mapping.target_field.clone(),
                    reason,
                },
            })?;
        }
    }
    Ok(())
}
