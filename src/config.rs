//! Server configuration file
//!
//! The YAML file named by `--config` carries the upload directory and the
//! chart repositories to register at startup. Anything wrong with it is
//! fatal; the server refuses to start on a config it cannot honor.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Deserialize;

/// Upload directory used when the config file does not set one.
pub const DEFAULT_UPLOAD_PATH: &str = "/tmp/charts";

/// A chart repository to register, using helm's own repository entry keys.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RepoEntry {
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default, rename = "caFile")]
    pub ca_file: Option<PathBuf>,
    #[serde(default)]
    pub insecure_skip_tls_verify: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HelmConfig {
    pub upload_path: String,
    pub helm_repos: Vec<RepoEntry>,
}

impl HelmConfig {
    /// Load and parse the YAML config file.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(&raw)
            .with_context(|| format!("failed to parse config file {}", path.display()))
    }

    /// Directory uploaded charts are stored in. Unset falls back to the
    /// default; a configured path must be absolute.
    pub fn upload_dir(&self) -> anyhow::Result<PathBuf> {
        if self.upload_path.is_empty() {
            return Ok(PathBuf::from(DEFAULT_UPLOAD_PATH));
        }
        let path = PathBuf::from(&self.upload_path);
        anyhow::ensure!(
            path.is_absolute(),
            "uploadPath must be an absolute path, got '{}'",
            self.upload_path
        );
        Ok(path)
    }
}
