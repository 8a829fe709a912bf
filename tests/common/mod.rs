//! Shared helpers for the integration tests.
//!
//! Routes are driven end to end against a scripted helm stand-in, so no
//! cluster and no real helm install are needed. The stand-in logs every
//! invocation next to itself, which lets tests assert on the exact flags
//! the server passed down.

#![allow(dead_code)]

use std::io::Write;
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};

use axum::http::StatusCode;
use axum::response::Response;
use http_body_util::BodyExt;
use tempfile::TempDir;

use helm_wrapper::services::credentials::ClusterProbe;
use helm_wrapper::settings::Settings;
use helm_wrapper::state::AppState;

/// Scripted helm stand-in covering every subcommand the routes exercise.
/// Failure cases are keyed on the input: release `missing` does not exist,
/// release `broken` fails to deploy, chart `missing/chart` is unknown.
pub const FAKE_HELM: &str = r##"#!/bin/sh
log_dir=$(dirname "$0")
echo "$@" >> "$log_dir/helm.log"
cmd="$1"
case "$cmd" in
list)
    printf '[{"name":"nginx","namespace":"default","revision":"2","updated":"2024-05-06 15:50:37.936131 +0000 UTC","status":"deployed","chart":"nginx-15.1.0","app_version":"1.25.1"}]'
    ;;
install|upgrade)
    release="$2"
    cat >/dev/null
    if [ "$release" = "broken" ]; then
        echo 'Error: INSTALLATION FAILED: chart unpack failed' >&2
        exit 1
    fi
    printf '{"name":"%s","namespace":"default","info":{"status":"deployed","description":"Install complete","notes":"Enjoy"},"version":1,"manifest":"---\\napiVersion: v1\\nkind: Service\\n"}' "$release"
    ;;
uninstall)
    release="$2"
    if [ "$release" = "missing" ]; then
        echo 'Error: uninstall: Release not loaded: missing: release: not found' >&2
        exit 1
    fi
    printf 'release "%s" uninstalled\n' "$release"
    ;;
status)
    release="$2"
    if [ "$release" = "missing" ]; then
        echo 'Error: release: not found' >&2
        exit 1
    fi
    printf '{"name":"%s","namespace":"default","version":2,"info":{"first_deployed":"2024-05-01T10:00:00Z","last_deployed":"2024-05-06T15:50:37Z","deleted":"","description":"Upgrade complete","status":"deployed","notes":"Welcome"}}' "$release"
    ;;
history)
    printf '[{"revision":1,"updated":"2024-05-01T10:00:00Z","status":"superseded","chart":"nginx-15.0.0","app_version":"1.25.0","description":"Install complete"},{"revision":2,"updated":"2024-05-06T15:50:37Z","status":"deployed","chart":"nginx-15.1.0","app_version":"1.25.1","description":"Upgrade complete"}]'
    ;;
rollback)
    printf 'Rollback was a success! Happy Helming!\n'
    ;;
repo)
    if [ "$2" = "update" ]; then
        printf 'Update Complete.\n'
    else
        printf '"%s" has been added to your repositories\n' "$3"
    fi
    ;;
search)
    printf '[{"name":"bitnami/nginx","version":"15.1.0","app_version":"1.25.1","description":"NGINX Open Source packaged by Bitnami"},{"name":"bitnami/redis","version":"18.0.0","app_version":"7.2.0","description":"Redis packaged by Bitnami"}]'
    ;;
show)
    chart="$3"
    if [ "$chart" = "missing/chart" ]; then
        echo 'Error: failed to download "missing/chart"' >&2
        exit 1
    fi
    printf '# Default values\nreplicaCount: 1\n'
    ;;
*)
    echo "fake helm: unknown command $cmd" >&2
    exit 64
    ;;
esac
"##;

/// A helm stand-in that fails every invocation.
pub const FAILING_HELM: &str = r##"#!/bin/sh
echo 'Error: looks like something went wrong' >&2
exit 1
"##;

/// One isolated test environment: temp dir, fake helm, empty upload dir.
pub struct TestEnv {
    pub dir: TempDir,
    pub state: AppState,
}

impl TestEnv {
    /// Every line the fake helm was invoked with, in order.
    pub fn helm_log(&self) -> Vec<String> {
        match std::fs::read_to_string(self.dir.path().join("helm.log")) {
            Ok(log) => log.lines().map(str::to_string).collect(),
            Err(_) => Vec::new(),
        }
    }

    pub fn upload_dir(&self) -> PathBuf {
        self.state.upload_dir.clone()
    }
}

/// Environment resolving credentials through the local-config branch.
pub fn test_env() -> TestEnv {
    build_env(FAKE_HELM, None)
}

/// Environment with a custom helm script.
pub fn test_env_with_script(script: &str) -> TestEnv {
    build_env(script, None)
}

/// Environment where the probe finds in-cluster credential files holding
/// `token`.
pub fn test_env_in_cluster(token: &str) -> TestEnv {
    build_env(FAKE_HELM, Some(token))
}

fn build_env(script: &str, in_cluster_token: Option<&str>) -> TestEnv {
    let dir = TempDir::new().expect("create test dir");
    let helm_bin = write_fake_helm(dir.path(), script);

    let upload_dir = dir.path().join("charts");
    std::fs::create_dir_all(&upload_dir).expect("create upload dir");

    let token_file = dir.path().join("token");
    let ca_file = dir.path().join("ca.crt");
    if let Some(token) = in_cluster_token {
        std::fs::write(&token_file, token).expect("write token file");
        std::fs::write(&ca_file, "certificate data").expect("write ca file");
    }
    let probe = ClusterProbe::new(&token_file, &ca_file);

    let settings = Settings {
        kubeconfig: None,
        kube_context: String::new(),
        kube_token: String::new(),
        kube_api_server: String::new(),
        namespace: "default".to_string(),
        helm_driver: String::new(),
        helm_bin,
    };

    let state = AppState::new(settings, probe, upload_dir);
    TestEnv { dir, state }
}

/// Write an executable helm script into `dir` and return its path.
pub fn write_fake_helm(dir: &Path, script: &str) -> PathBuf {
    let path = dir.join("helm");
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .mode(0o755)
        .open(&path)
        .expect("create fake helm");
    file.write_all(script.as_bytes()).expect("write fake helm");
    path
}

/// Collect a response into its status and body text.
pub async fn get_response_body(response: Response) -> (StatusCode, String) {
    let status = response.status();
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("read response body")
        .to_bytes();
    (status, String::from_utf8_lossy(&bytes).into_owned())
}

/// Collect a response into its status and parsed JSON body.
pub async fn get_json_body(response: Response) -> (StatusCode, serde_json::Value) {
    let (status, body) = get_response_body(response).await;
    let json = serde_json::from_str(&body)
        .unwrap_or_else(|e| panic!("response must be valid JSON ({}): {}", e, body));
    (status, json)
}

/// Build a multipart/form-data body carrying one `chart` file field.
pub fn multipart_chart_body(filename: &str, contents: &[u8]) -> (String, Vec<u8>) {
    let boundary = "helm-wrapper-test-boundary";
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"chart\"; filename=\"{}\"\r\n",
            filename
        )
        .as_bytes(),
    );
    body.extend_from_slice(b"Content-Type: application/gzip\r\n\r\n");
    body.extend_from_slice(contents);
    body.extend_from_slice(format!("\r\n--{}--\r\n", boundary).as_bytes());
    (
        format!("multipart/form-data; boundary={}", boundary),
        body,
    )
}
