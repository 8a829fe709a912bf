//! Helm process plumbing
//!
//! `ActionConfig` binds resolved cluster credentials to one namespace and
//! renders them as helm connection flags; `HelmCommand` spawns the binary,
//! feeds it stdin where needed and maps failures into typed errors.

use std::ffi::OsString;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};

use serde::de::DeserializeOwned;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::services::credentials::{self, ClientConfig, ClusterProbe, CredentialError};
use crate::settings::Settings;

#[derive(Debug, Error)]
pub enum HelmError {
    #[error("failed to run {}: {source}", bin.display())]
    Spawn {
        bin: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write helm stdin: {0}")]
    Stdin(#[source] std::io::Error),

    #[error("helm exited with {status}: {stderr}")]
    Failed { status: ExitStatus, stderr: String },

    #[error("failed to decode helm output: {0}")]
    Json(#[from] serde_json::Error),
}

/// Per-request action configuration: one namespace, one credential set.
#[derive(Debug, Clone)]
pub struct ActionConfig {
    client: ClientConfig,
}

impl ActionConfig {
    /// Resolve credentials for `namespace` and bind them. Rebuilt for every
    /// request; nothing here is cached across invocations.
    pub fn init(
        settings: &Settings,
        namespace: &str,
        probe: &ClusterProbe,
    ) -> Result<Self, CredentialError> {
        let client = credentials::resolve(settings, namespace, probe)?;
        Ok(Self { client })
    }

    pub fn namespace(&self) -> &str {
        &self.client.namespace
    }

    /// Render the connection flags helm needs to reach the cluster. Unset
    /// fields produce no flag at all.
    pub fn connection_args(&self) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec!["--namespace".into(), (&self.client.namespace).into()];
        if let Some(context) = &self.client.context {
            args.push("--kube-context".into());
            args.push(context.into());
        }
        if let Some(path) = &self.client.kubeconfig {
            args.push("--kubeconfig".into());
            args.push(path.into());
        }
        if let Some(path) = &self.client.ca_file {
            args.push("--kube-ca-file".into());
            args.push(path.into());
        }
        if let Some(token) = &self.client.bearer_token {
            args.push("--kube-token".into());
            args.push(token.into());
        }
        if let Some(server) = &self.client.api_server {
            args.push("--kube-apiserver".into());
            args.push(server.into());
        }
        args
    }
}

/// Low-level helm runner shared by the release and repository layers.
#[derive(Debug, Clone)]
pub struct HelmCommand {
    bin: PathBuf,
    driver: String,
}

impl HelmCommand {
    pub fn new(settings: &Settings) -> Self {
        Self {
            bin: settings.helm_bin.clone(),
            driver: settings.helm_driver.clone(),
        }
    }

    /// Run helm with `args`, optionally streaming `stdin` into it, and
    /// return stdout. Non-zero exit is an error carrying stderr.
    pub async fn run(&self, args: &[OsString], stdin: Option<&[u8]>) -> Result<Vec<u8>, HelmError> {
        tracing::debug!(bin = %self.bin.display(), ?args, "running helm");

        let mut cmd = Command::new(&self.bin);
        cmd.args(args)
            .stdin(if stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if !self.driver.is_empty() {
            cmd.env("HELM_DRIVER", &self.driver);
        }

        let mut child = cmd.spawn().map_err(|source| HelmError::Spawn {
            bin: self.bin.clone(),
            source,
        })?;

        if let Some(input) = stdin {
            let mut pipe = child
                .stdin
                .take()
                .ok_or_else(|| HelmError::Stdin(std::io::Error::other("stdin not captured")))?;
            match pipe.write_all(input).await {
                Ok(()) => {}
                // helm may exit before draining the pipe; its exit status
                // and stderr are still collected below
                Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => {}
                Err(e) => return Err(HelmError::Stdin(e)),
            }
            // Dropping the pipe closes it so helm sees EOF
            drop(pipe);
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|source| HelmError::Spawn {
                bin: self.bin.clone(),
                source,
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
            return Err(HelmError::Failed {
                status: output.status,
                stderr,
            });
        }

        Ok(output.stdout)
    }

    /// Run helm and decode its `-o json` output.
    pub async fn run_json<T: DeserializeOwned>(
        &self,
        args: &[OsString],
        stdin: Option<&[u8]>,
    ) -> Result<T, HelmError> {
        let stdout = self.run(args, stdin).await?;
        Ok(serde_json::from_slice(&stdout)?)
    }
}
