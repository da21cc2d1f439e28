//! Manifest directory rendering
//!
//! A manifest directory holds a `kustomization.yaml` whose `resources:` list
//! names YAML files and sub-directories, in the order they should be applied.
//! Files may hold several documents. Only the `resources:` list is
//! interpreted; overlays and generators are not supported.

use crate::context::ManifestContext;
use crate::error::ManifestError;
use crate::transform::{apply_transforms, TransformOptions};
use cluster_client::Manifest;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// File that marks a manifest directory.
pub const KUSTOMIZATION_FILE: &str = "kustomization.yaml";

/// Directory tried when the given path has no kustomization file.
pub const DEFAULT_DIR: &str = "default";

const MAX_DEPTH: usize = 16;

#[derive(Debug, Default, Deserialize)]
struct Kustomization {
    #[serde(default)]
    resources: Vec<String>,
}

/// Loads every resource of the manifest directory at `path`, falling back to
/// `path/default` when `path` itself has no kustomization file.
pub fn render_manifests(path: &Path) -> Result<Vec<Manifest>, ManifestError> {
    let root = if path.join(KUSTOMIZATION_FILE).is_file() {
        path.to_path_buf()
    } else {
        let fallback = path.join(DEFAULT_DIR);
        if !fallback.join(KUSTOMIZATION_FILE).is_file() {
            return Err(ManifestError::MissingKustomization(path.to_path_buf()));
        }
        debug!("No {} in {}, using {}", KUSTOMIZATION_FILE, path.display(), fallback.display());
        fallback
    };

    let mut resources = Vec::new();
    render_dir(&root, &mut resources, 0)?;
    debug!("Rendered {} resources from {}", resources.len(), root.display());
    Ok(resources)
}

/// Renders `path` and runs the transform pipeline over the result.
pub fn render_manifest(path: &Path, options: &TransformOptions) -> Result<Vec<Manifest>, ManifestError> {
    apply_transforms(render_manifests(path)?, options)
}

/// Like [`render_manifest`], then applies `context` to every Deployment.
pub fn render_manifest_with_context(
    path: &Path,
    options: &TransformOptions,
    context: Option<&ManifestContext>,
) -> Result<Vec<Manifest>, ManifestError> {
    let mut resources = render_manifest(path, options)?;
    if let Some(ctx) = context {
        ctx.apply(&mut resources)?;
    }
    Ok(resources)
}

fn render_dir(dir: &Path, out: &mut Vec<Manifest>, depth: usize) -> Result<(), ManifestError> {
    let kustomization_path = dir.join(KUSTOMIZATION_FILE);
    if depth > MAX_DEPTH {
        return Err(ManifestError::InvalidResource {
            path: kustomization_path,
            reason: "resource directories nest too deeply".to_string(),
        });
    }

    let kustomization: Kustomization = parse_yaml(&kustomization_path)?.unwrap_or_default();
    for entry in &kustomization.resources {
        let target = dir.join(entry);
        if target.is_dir() {
            if !target.join(KUSTOMIZATION_FILE).is_file() {
                return Err(ManifestError::MissingKustomization(target));
            }
            render_dir(&target, out, depth + 1)?;
        } else {
            load_documents(&target, out)?;
        }
    }
    Ok(())
}

fn read(path: &Path) -> Result<String, ManifestError> {
    fs::read_to_string(path).map_err(|source| ManifestError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn parse_yaml<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<Option<T>, ManifestError> {
    let content = read(path)?;
    if content.trim().is_empty() {
        return Ok(None);
    }
    serde_yaml::from_str(&content)
        .map(Some)
        .map_err(|source| yaml_error(path, source))
}

fn yaml_error(path: &Path, source: serde_yaml::Error) -> ManifestError {
    ManifestError::Yaml {
        path: PathBuf::from(path),
        source,
    }
}

fn load_documents(path: &Path, out: &mut Vec<Manifest>) -> Result<(), ManifestError> {
    let content = read(path)?;
    for document in serde_yaml::Deserializer::from_str(&content) {
        let value = serde_json::Value::deserialize(document).map_err(|e| yaml_error(path, e))?;
        if value.is_null() {
            continue;
        }
        let resource = Manifest::from_value(value).map_err(|e| ManifestError::InvalidResource {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        out.push(resource);
    }
    Ok(())
}
