//! Controller configuration, read from environment variables.

use crate::error::ControllerError;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::{env, fs};

/// Where Kubernetes mounts the pod's own namespace.
pub const SERVICE_ACCOUNT_NAMESPACE_FILE: &str = "/var/run/secrets/kubernetes.io/serviceaccount/namespace";

const DEFAULT_MANIFESTS_PATH: &str = "/manifests";
const DEFAULT_PROBE_ADDR: &str = "0.0.0.0:8081";

#[derive(Debug, Clone)]
pub struct Config {
    /// Manifest directory (`MANIFESTS_PATH`)
    pub manifests_path: PathBuf,
    /// Namespace to watch (`WATCH_NAMESPACE`); all namespaces when unset
    pub watch_namespace: Option<String>,
    /// Namespace the operator runs in (`OPERATOR_NAMESPACE`, then the
    /// service-account file). Empty when neither is available.
    pub operator_namespace: String,
    /// Render NetworkPolicies (`ENABLE_NETWORK_POLICY`, default true)
    pub enable_network_policy: bool,
    /// Listen address of the probe server (`PROBE_ADDR`)
    pub probe_addr: SocketAddr,
}

impl Config {
    pub fn from_env() -> Result<Self, ControllerError> {
        Self::from_lookup(|key| env::var(key).ok(), Path::new(SERVICE_ACCOUNT_NAMESPACE_FILE))
    }

    pub(crate) fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
        namespace_file: &Path,
    ) -> Result<Self, ControllerError> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let operator_namespace = get("OPERATOR_NAMESPACE")
            .or_else(|| {
                fs::read_to_string(namespace_file)
                    .ok()
                    .map(|ns| ns.trim().to_string())
                    .filter(|ns| !ns.is_empty())
            })
            .unwrap_or_default();

        let enable_network_policy = match get("ENABLE_NETWORK_POLICY") {
            None => true,
            Some(v) => parse_bool(&v).ok_or_else(|| {
                ControllerError::InvalidConfig(format!("ENABLE_NETWORK_POLICY must be true or false, got '{v}'"))
            })?,
        };

        let probe_addr = get("PROBE_ADDR").unwrap_or_else(|| DEFAULT_PROBE_ADDR.to_string());
        let probe_addr = probe_addr.parse::<SocketAddr>().map_err(|e| {
            ControllerError::InvalidConfig(format!("PROBE_ADDR '{probe_addr}' is not a socket address: {e}"))
        })?;

        Ok(Self {
            manifests_path: PathBuf::from(
                get("MANIFESTS_PATH").unwrap_or_else(|| DEFAULT_MANIFESTS_PATH.to_string()),
            ),
            watch_namespace: get("WATCH_NAMESPACE"),
            operator_namespace,
            enable_network_policy,
            probe_addr,
        })
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn config(vars: &[(&str, &str)], namespace_file: &Path) -> Result<Config, ControllerError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        Config::from_lookup(|k| vars.get(k).cloned(), namespace_file)
    }

    #[test]
    fn test_defaults() {
        let cfg = config(&[], Path::new("/nonexistent/namespace")).unwrap();
        assert_eq!(cfg.manifests_path, PathBuf::from("/manifests"));
        assert_eq!(cfg.watch_namespace, None);
        assert_eq!(cfg.operator_namespace, "");
        assert!(cfg.enable_network_policy);
        assert_eq!(cfg.probe_addr.port(), 8081);
    }

    #[test]
    fn test_operator_namespace_falls_back_to_service_account_file() {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("namespace");
        fs::write(&file, "distro-system\n").unwrap();

        let cfg = config(&[], &file).unwrap();
        assert_eq!(cfg.operator_namespace, "distro-system");

        let cfg = config(&[("OPERATOR_NAMESPACE", "explicit")], &file).unwrap();
        assert_eq!(cfg.operator_namespace, "explicit");
    }

    #[test]
    fn test_network_policy_flag() {
        let missing = Path::new("/nonexistent/namespace");
        assert!(!config(&[("ENABLE_NETWORK_POLICY", "False")], missing).unwrap().enable_network_policy);
        assert!(config(&[("ENABLE_NETWORK_POLICY", "maybe")], missing).is_err());
    }

    #[test]
    fn test_bad_probe_addr() {
        let err = config(&[("PROBE_ADDR", "localhost")], Path::new("/nonexistent")).unwrap_err();
        assert!(matches!(err, ControllerError::InvalidConfig(_)));
    }
}
