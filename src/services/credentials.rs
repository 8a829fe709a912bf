//! Cluster credential resolution
//!
//! Decides per invocation whether to talk to the cluster with the mounted
//! service account credentials or with a local kubeconfig, and produces the
//! connection settings the chart operations layer consumes.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::settings::Settings;

/// Token file mounted into every pod that runs with a service account.
pub const IN_CLUSTER_TOKEN_FILE: &str = "/var/run/secrets/kubernetes.io/serviceaccount/token";

/// Cluster CA certificate mounted alongside the token.
pub const IN_CLUSTER_CA_FILE: &str = "/var/run/secrets/kubernetes.io/serviceaccount/ca.crt";

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("failed to read service account token {}: {source}", path.display())]
    TokenRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Probe for the in-cluster credential files.
///
/// The paths are injectable so detection can be exercised against a
/// temporary directory instead of the real mount points.
#[derive(Debug, Clone)]
pub struct ClusterProbe {
    token_file: PathBuf,
    ca_file: PathBuf,
}

impl Default for ClusterProbe {
    fn default() -> Self {
        Self::new(IN_CLUSTER_TOKEN_FILE, IN_CLUSTER_CA_FILE)
    }
}

impl ClusterProbe {
    pub fn new(token_file: impl Into<PathBuf>, ca_file: impl Into<PathBuf>) -> Self {
        Self {
            token_file: token_file.into(),
            ca_file: ca_file.into(),
        }
    }

    /// Select the credential source. Both files must be present for the
    /// process to count as running inside a cluster; anything else falls
    /// back to local configuration.
    pub fn detect(&self) -> CredentialSource {
        if self.token_file.exists() && self.ca_file.exists() {
            CredentialSource::InCluster {
                token_file: self.token_file.clone(),
                ca_file: self.ca_file.clone(),
            }
        } else {
            CredentialSource::LocalConfig
        }
    }
}

/// Where cluster credentials come from for one resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialSource {
    InCluster {
        token_file: PathBuf,
        ca_file: PathBuf,
    },
    LocalConfig,
}

/// Resolved connection settings for a single namespace-scoped invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub namespace: String,
    pub context: Option<String>,
    pub kubeconfig: Option<PathBuf>,
    /// CA certificate path. Only the path is carried; the certificate
    /// contents are never inlined.
    pub ca_file: Option<PathBuf>,
    pub bearer_token: Option<String>,
    pub api_server: Option<String>,
}

/// Resolve connection settings for `namespace`.
///
/// Pure function of the settings snapshot and the probe result: the same
/// inputs always produce the same field values. Token reads are the only
/// fallible step and surface as an explicit error.
pub fn resolve(
    settings: &Settings,
    namespace: &str,
    probe: &ClusterProbe,
) -> Result<ClientConfig, CredentialError> {
    let mut config = match probe.detect() {
        CredentialSource::InCluster {
            token_file,
            ca_file,
        } => {
            tracing::debug!(namespace, "using in-cluster service account credentials");
            let token = read_token(&token_file)?;
            ClientConfig {
                namespace: namespace.to_string(),
                context: non_empty(&settings.kube_context),
                kubeconfig: None,
                ca_file: Some(ca_file),
                bearer_token: Some(token),
                api_server: None,
            }
        }
        CredentialSource::LocalConfig => {
            tracing::debug!(
                namespace,
                kubeconfig = ?settings.kubeconfig,
                "using local kubeconfig credentials"
            );
            ClientConfig {
                namespace: namespace.to_string(),
                context: non_empty(&settings.kube_context),
                kubeconfig: settings.kubeconfig.clone(),
                ca_file: None,
                bearer_token: None,
                api_server: None,
            }
        }
    };

    // Process-wide overrides apply after the base path is chosen
    if !settings.kube_token.is_empty() {
        config.bearer_token = Some(settings.kube_token.clone());
    }
    if !settings.kube_api_server.is_empty() {
        config.api_server = Some(settings.kube_api_server.clone());
    }

    Ok(config)
}

fn read_token(path: &Path) -> Result<String, CredentialError> {
    fs::read_to_string(path).map_err(|source| CredentialError::TokenRead {
        path: path.to_path_buf(),
        source,
    })
}

fn non_empty(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}
