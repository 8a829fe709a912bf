//! Chart repository operations
//!
//! Registers configured repositories at startup, re-syncs their indexes on
//! demand, searches them for charts, prints chart metadata and manages the
//! uploaded chart packages on disk.

use std::ffi::OsString;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use utoipa::ToSchema;

use crate::config::RepoEntry;
use crate::error::{AppError, Result};
use crate::services::helm::HelmCommand;
use crate::settings::Settings;

/// Which part of a chart `helm show` should print.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChartInfoKind {
    #[default]
    All,
    Chart,
    Readme,
    Values,
}

impl ChartInfoKind {
    fn as_arg(self) -> &'static str {
        match self {
            ChartInfoKind::All => "all",
            ChartInfoKind::Chart => "chart",
            ChartInfoKind::Readme => "readme",
            ChartInfoKind::Values => "values",
        }
    }
}

/// One row of `helm search repo -o json`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ChartVersion {
    pub name: String,
    pub version: String,
    pub app_version: String,
    pub description: String,
}

/// A chart package stored in the upload directory.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct UploadedChart {
    pub name: String,
    pub size: u64,
    pub uploaded_at: DateTime<Utc>,
}

/// Repository-level helm operations. These are not namespace-scoped, so no
/// action configuration is involved.
pub struct RepoManager {
    cmd: HelmCommand,
}

impl RepoManager {
    pub fn new(settings: &Settings) -> Self {
        Self {
            cmd: HelmCommand::new(settings),
        }
    }

    /// Register a repository, overwriting an existing entry with the same
    /// name and downloading its index.
    pub async fn add(&self, entry: &RepoEntry) -> Result<()> {
        self.cmd.run(&repo_add_args(entry), None).await?;
        Ok(())
    }

    /// Re-sync the index of every registered repository.
    pub async fn update(&self) -> Result<()> {
        let args: Vec<OsString> = vec!["repo".into(), "update".into()];
        self.cmd.run(&args, None).await?;
        tracing::info!("repository indexes synchronized");
        Ok(())
    }

    /// Search registered repositories for charts.
    pub async fn search(&self, keyword: Option<&str>, versions: bool) -> Result<Vec<ChartVersion>> {
        let mut args: Vec<OsString> = vec!["search".into(), "repo".into()];
        if let Some(keyword) = keyword {
            args.push(keyword.into());
        }
        args.push("-o".into());
        args.push("json".into());
        if versions {
            args.push("-l".into());
        }
        Ok(self.cmd.run_json(&args, None).await?)
    }

    /// Print chart metadata via `helm show`.
    pub async fn show(&self, chart: &str, info: ChartInfoKind) -> Result<String> {
        if chart.is_empty() {
            return Err(AppError::BadRequest(
                "chart reference is required".to_string(),
            ));
        }
        let args: Vec<OsString> = vec!["show".into(), info.as_arg().into(), chart.into()];
        let stdout = self.cmd.run(&args, None).await?;
        Ok(String::from_utf8_lossy(&stdout).into_owned())
    }
}

fn repo_add_args(entry: &RepoEntry) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec![
        "repo".into(),
        "add".into(),
        (&entry.name).into(),
        (&entry.url).into(),
    ];
    if let Some(username) = &entry.username {
        args.push("--username".into());
        args.push(username.into());
    }
    if let Some(password) = &entry.password {
        args.push("--password".into());
        args.push(password.into());
    }
    if let Some(ca_file) = &entry.ca_file {
        args.push("--ca-file".into());
        args.push(ca_file.into());
    }
    if entry.insecure_skip_tls_verify {
        args.push("--insecure-skip-tls-verify".into());
    }
    args.push("--force-update".into());
    args
}

fn is_chart_package(name: &str) -> bool {
    name.ends_with(".tgz") || name.ends_with(".tar.gz")
}

/// Store an uploaded chart package in the upload directory.
pub async fn store_chart(
    upload_dir: &Path,
    filename: &str,
    contents: &[u8],
) -> Result<UploadedChart> {
    // Validate the filename to prevent path traversal
    if filename.contains("..") || filename.contains('/') || filename.contains('\\') {
        return Err(AppError::BadRequest("Invalid chart filename".to_string()));
    }
    if !is_chart_package(filename) {
        return Err(AppError::BadRequest(format!(
            "Unsupported chart package '{}', expected .tgz or .tar.gz",
            filename
        )));
    }

    let target = upload_dir.join(filename);
    // Exclusive create keeps the duplicate check atomic under concurrent uploads
    let mut file = match tokio::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&target)
        .await
    {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
            return Err(AppError::Conflict(format!(
                "Chart '{}' already uploaded",
                filename
            )));
        }
        Err(e) => return Err(e.into()),
    };
    file.write_all(contents).await?;
    file.flush().await?;
    tracing::info!(chart = filename, size = contents.len(), "chart uploaded");

    Ok(UploadedChart {
        name: filename.to_string(),
        size: contents.len() as u64,
        uploaded_at: Utc::now(),
    })
}

/// List stored chart packages in name order.
pub async fn list_uploaded(upload_dir: &Path) -> Result<Vec<UploadedChart>> {
    let mut charts = Vec::new();
    let mut entries = tokio::fs::read_dir(upload_dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name().to_string_lossy().into_owned();
        if !is_chart_package(&name) {
            continue;
        }
        let metadata = entry.metadata().await?;
        if !metadata.is_file() {
            continue;
        }
        charts.push(UploadedChart {
            name,
            size: metadata.len(),
            uploaded_at: DateTime::<Utc>::from(metadata.modified()?),
        });
    }
    charts.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(charts)
}
