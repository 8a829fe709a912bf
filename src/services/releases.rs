//! Release lifecycle operations
//!
//! Wraps the helm binary for everything release-shaped: list, install,
//! upgrade, uninstall, status, history and rollback. Every manager is bound
//! to one namespace via a freshly initialized action configuration.

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::{AppError, Result};
use crate::services::credentials::ClusterProbe;
use crate::services::helm::{ActionConfig, HelmCommand};
use crate::settings::Settings;

/// Install/upgrade request body.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct ReleaseOptions {
    /// Chart reference: `repo/name`, a chart path, or `upload/<file>` for a
    /// previously uploaded package.
    pub chart: String,
    #[serde(default)]
    pub version: Option<String>,
    /// Values overrides as a YAML document.
    #[serde(default)]
    pub values: Option<String>,
    /// Individual `--set key=value` overrides.
    #[serde(default)]
    pub set: BTreeMap<String, String>,
    #[serde(default)]
    pub dry_run: bool,
    #[serde(default)]
    pub wait: bool,
    #[serde(default)]
    pub atomic: bool,
    /// Helm duration string, e.g. `5m30s`.
    #[serde(default)]
    pub timeout: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

impl ReleaseOptions {
    fn to_args(&self) -> Vec<OsString> {
        let mut args: Vec<OsString> = Vec::new();
        if let Some(version) = &self.version {
            args.push("--version".into());
            args.push(version.into());
        }
        for (key, value) in &self.set {
            args.push("--set".into());
            args.push(format!("{}={}", key, value).into());
        }
        if self.values.is_some() {
            // Values are streamed over stdin
            args.push("--values".into());
            args.push("-".into());
        }
        if self.dry_run {
            args.push("--dry-run".into());
        }
        if self.wait {
            args.push("--wait".into());
        }
        if self.atomic {
            args.push("--atomic".into());
        }
        if let Some(timeout) = &self.timeout {
            args.push("--timeout".into());
            args.push(timeout.into());
        }
        if let Some(description) = &self.description {
            args.push("--description".into());
            args.push(description.into());
        }
        args
    }
}

/// One row of `helm list -o json`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ReleaseElement {
    pub name: String,
    pub namespace: String,
    pub revision: String,
    pub updated: String,
    pub status: String,
    pub chart: String,
    pub app_version: String,
}

/// One row of `helm history -o json`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ReleaseRevision {
    pub revision: u64,
    #[serde(default)]
    pub updated: String,
    pub status: String,
    pub chart: String,
    pub app_version: String,
    #[serde(default)]
    pub description: String,
}

/// Subset of `helm status -o json` worth surfacing.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ReleaseStatus {
    pub name: String,
    pub namespace: String,
    pub version: u64,
    pub info: ReleaseInfo,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ReleaseInfo {
    #[serde(default)]
    pub first_deployed: String,
    #[serde(default)]
    pub last_deployed: String,
    #[serde(default)]
    pub deleted: String,
    #[serde(default)]
    pub description: String,
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// Install/upgrade response.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ReleaseOutcome {
    pub release: String,
    pub namespace: String,
    pub chart: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    /// Rendered manifest, returned for dry runs only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manifest: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Namespace-scoped release manager.
pub struct ReleaseManager {
    cmd: HelmCommand,
    action: ActionConfig,
}

impl ReleaseManager {
    pub fn new(settings: &Settings, namespace: &str, probe: &ClusterProbe) -> Result<Self> {
        Ok(Self {
            cmd: HelmCommand::new(settings),
            action: ActionConfig::init(settings, namespace, probe)?,
        })
    }

    fn op_args(&self, op: &[&str]) -> Vec<OsString> {
        let mut args: Vec<OsString> = op.iter().map(OsString::from).collect();
        args.extend(self.action.connection_args());
        args
    }

    /// List releases in the namespace.
    pub async fn list(&self) -> Result<Vec<ReleaseElement>> {
        Ok(self
            .cmd
            .run_json(&self.op_args(&["list", "-o", "json"]), None)
            .await?)
    }

    /// Install a chart as a new release.
    pub async fn install(
        &self,
        release: &str,
        opts: &ReleaseOptions,
        upload_dir: &Path,
    ) -> Result<ReleaseOutcome> {
        self.deploy("install", release, opts, upload_dir).await
    }

    /// Upgrade an existing release.
    pub async fn upgrade(
        &self,
        release: &str,
        opts: &ReleaseOptions,
        upload_dir: &Path,
    ) -> Result<ReleaseOutcome> {
        self.deploy("upgrade", release, opts, upload_dir).await
    }

    async fn deploy(
        &self,
        verb: &str,
        release: &str,
        opts: &ReleaseOptions,
        upload_dir: &Path,
    ) -> Result<ReleaseOutcome> {
        let chart = resolve_chart_ref(&opts.chart, upload_dir)?;
        if let Some(values) = &opts.values {
            // Reject malformed values before helm sees them
            serde_yaml::from_str::<serde_yaml::Value>(values)?;
        }

        let mut args: Vec<OsString> = vec![verb.into(), release.into(), chart];
        args.push("-o".into());
        args.push("json".into());
        args.extend(opts.to_args());
        args.extend(self.action.connection_args());

        let stdin = opts.values.as_deref().map(str::as_bytes);
        let release_json: serde_json::Value = self.cmd.run_json(&args, stdin).await?;

        let status = release_json["info"]["status"]
            .as_str()
            .unwrap_or("unknown")
            .to_string();
        let notes = release_json["info"]["notes"].as_str().map(str::to_string);
        let manifest = if opts.dry_run {
            release_json["manifest"].as_str().map(str::to_string)
        } else {
            None
        };

        tracing::info!(
            release,
            namespace = self.action.namespace(),
            chart = %opts.chart,
            %status,
            "helm {} completed",
            verb
        );

        Ok(ReleaseOutcome {
            release: release.to_string(),
            namespace: self.action.namespace().to_string(),
            chart: opts.chart.clone(),
            status,
            notes,
            manifest,
            timestamp: Utc::now(),
        })
    }

    /// Uninstall a release.
    pub async fn uninstall(&self, release: &str) -> Result<serde_json::Value> {
        self.cmd
            .run(&self.op_args(&["uninstall", release]), None)
            .await?;

        tracing::info!(
            release,
            namespace = self.action.namespace(),
            "release uninstalled"
        );
        Ok(serde_json::json!({
            "success": true,
            "release": release,
            "namespace": self.action.namespace(),
            "status": "uninstalled"
        }))
    }

    /// Current status of a release.
    pub async fn status(&self, release: &str) -> Result<ReleaseStatus> {
        Ok(self
            .cmd
            .run_json(&self.op_args(&["status", release, "-o", "json"]), None)
            .await?)
    }

    /// Revision history of a release.
    pub async fn history(&self, release: &str) -> Result<Vec<ReleaseRevision>> {
        Ok(self
            .cmd
            .run_json(&self.op_args(&["history", release, "-o", "json"]), None)
            .await?)
    }

    /// Roll a release back to an earlier revision.
    pub async fn rollback(&self, release: &str, revision: u64) -> Result<serde_json::Value> {
        let revision_arg = revision.to_string();
        self.cmd
            .run(&self.op_args(&["rollback", release, &revision_arg]), None)
            .await?;

        tracing::info!(
            release,
            namespace = self.action.namespace(),
            revision,
            "release rolled back"
        );
        Ok(serde_json::json!({
            "success": true,
            "release": release,
            "namespace": self.action.namespace(),
            "revision": revision,
            "status": "rolled back"
        }))
    }
}

/// Resolve a request chart reference into what helm receives on the command
/// line. `upload/<file>` points into the upload directory; anything else is
/// passed through for helm's own repo/path resolution.
fn resolve_chart_ref(chart: &str, upload_dir: &Path) -> Result<OsString> {
    if chart.is_empty() {
        return Err(AppError::BadRequest(
            "chart reference is required".to_string(),
        ));
    }
    match chart.strip_prefix("upload/") {
        None => Ok(chart.into()),
        Some(name) => {
            if name.is_empty() || name.contains("..") || name.contains('/') || name.contains('\\') {
                return Err(AppError::BadRequest(
                    "Invalid uploaded chart name".to_string(),
                ));
            }
            let path = upload_dir.join(name);
            if !path.exists() {
                return Err(AppError::NotFound(format!(
                    "Uploaded chart '{}' not found",
                    name
                )));
            }
            Ok(path.into_os_string())
        }
    }
}
