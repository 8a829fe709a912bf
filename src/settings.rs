//! Process-wide settings
//!
//! Built once at startup from CLI flags and the environment, then handed
//! around read-only. Requests never mutate this; every resolution works
//! against the same frozen snapshot.

use std::env;
use std::fs;
use std::path::PathBuf;

use clap::Args;

use crate::services::credentials::{ClusterProbe, CredentialSource};

/// Kubernetes connection flags, mirroring helm's own environment handling.
#[derive(Debug, Clone, Default, Args)]
pub struct KubeArgs {
    /// Path to the kubeconfig file used outside the cluster
    #[arg(long, env = "KUBECONFIG")]
    pub kubeconfig: Option<PathBuf>,

    /// Name of the kubeconfig context to use
    #[arg(long = "kube-context", env = "HELM_KUBECONTEXT", default_value = "")]
    pub kube_context: String,

    /// Bearer token used for authentication
    #[arg(long = "kube-token", env = "HELM_KUBETOKEN", default_value = "")]
    pub kube_token: String,

    /// Address and port of the Kubernetes API server
    #[arg(long = "kube-apiserver", env = "HELM_KUBEAPISERVER", default_value = "")]
    pub kube_apiserver: String,

    /// Namespace used when an operation does not name one
    #[arg(short = 'n', long, env = "HELM_NAMESPACE", default_value = "default")]
    pub namespace: String,
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub kubeconfig: Option<PathBuf>,
    pub kube_context: String,
    pub kube_token: String,
    pub kube_api_server: String,
    pub namespace: String,
    /// Release storage backend forwarded to helm via `HELM_DRIVER`.
    pub helm_driver: String,
    /// Helm binary to invoke, `HELM_BIN` or plain `helm`.
    pub helm_bin: PathBuf,
}

impl Settings {
    pub fn new(args: KubeArgs, probe: &ClusterProbe) -> Self {
        let mut settings = Settings {
            kubeconfig: args.kubeconfig,
            kube_context: args.kube_context,
            kube_token: args.kube_token,
            kube_api_server: args.kube_apiserver,
            namespace: args.namespace,
            helm_driver: env::var("HELM_DRIVER").unwrap_or_default(),
            helm_bin: env::var_os("HELM_BIN")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("helm")),
        };
        settings.bootstrap_in_cluster(probe);
        settings
    }

    /// When the in-cluster credential files are present, derive the API
    /// server address from the service environment and load the mounted
    /// token so both act as process-wide overrides. A failed token read is
    /// logged and leaves the override empty; the per-request resolver reads
    /// the file itself and surfaces the error there.
    fn bootstrap_in_cluster(&mut self, probe: &ClusterProbe) {
        let CredentialSource::InCluster { token_file, .. } = probe.detect() else {
            return;
        };

        if let (Ok(host), Ok(port)) = (
            env::var("KUBERNETES_SERVICE_HOST"),
            env::var("KUBERNETES_SERVICE_PORT"),
        ) {
            self.kube_api_server = format!("https://{}", join_host_port(&host, &port));
        }

        match fs::read_to_string(&token_file) {
            Ok(token) => self.kube_token = token,
            Err(e) => tracing::warn!(
                "failed to read service account token {}: {}",
                token_file.display(),
                e
            ),
        }
    }
}

/// Join a host and port into an address, bracketing IPv6 literals.
pub fn join_host_port(host: &str, port: &str) -> String {
    if host.contains(':') {
        format!("[{}]:{}", host, port)
    } else {
        format!("{}:{}", host, port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use tempfile::TempDir;

    // Serializes the tests that touch the KUBERNETES_SERVICE_* variables
    static SERVICE_ENV_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn test_join_host_port_ipv4() {
        assert_eq!(join_host_port("10.96.0.1", "443"), "10.96.0.1:443");
    }

    #[test]
    fn test_join_host_port_hostname() {
        assert_eq!(
            join_host_port("kubernetes.default.svc", "6443"),
            "kubernetes.default.svc:6443"
        );
    }

    #[test]
    fn test_join_host_port_brackets_ipv6() {
        assert_eq!(join_host_port("fd00::1", "443"), "[fd00::1]:443");
    }

    #[test]
    fn test_settings_defaults_without_cluster_files() {
        let dir = TempDir::new().unwrap();
        let probe = ClusterProbe::new(dir.path().join("token"), dir.path().join("ca.crt"));

        let args = KubeArgs {
            namespace: "default".to_string(),
            ..Default::default()
        };
        let settings = Settings::new(args, &probe);

        assert_eq!(settings.namespace, "default");
        assert_eq!(settings.kube_token, "");
        assert_eq!(settings.kube_api_server, "");
    }

    #[test]
    fn test_settings_flags_are_carried_over() {
        let dir = TempDir::new().unwrap();
        let probe = ClusterProbe::new(dir.path().join("token"), dir.path().join("ca.crt"));

        let args = KubeArgs {
            kubeconfig: Some("/tmp/kubeconfig".into()),
            kube_context: "minikube".to_string(),
            kube_token: "flag-token".to_string(),
            kube_apiserver: "https://flag:6443".to_string(),
            namespace: "apps".to_string(),
        };
        let settings = Settings::new(args, &probe);

        assert_eq!(settings.kubeconfig.as_deref(), Some("/tmp/kubeconfig".as_ref()));
        assert_eq!(settings.kube_context, "minikube");
        assert_eq!(settings.kube_token, "flag-token");
        assert_eq!(settings.kube_api_server, "https://flag:6443");
        assert_eq!(settings.namespace, "apps");
    }

    #[test]
    fn test_in_cluster_bootstrap_loads_token_and_api_server() {
        let dir = TempDir::new().unwrap();
        let token_file = dir.path().join("token");
        let ca_file = dir.path().join("ca.crt");
        std::fs::write(&token_file, "mounted-token").unwrap();
        std::fs::write(&ca_file, "certificate data").unwrap();
        let probe = ClusterProbe::new(&token_file, &ca_file);

        let _env = SERVICE_ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        env::set_var("KUBERNETES_SERVICE_HOST", "10.96.0.1");
        env::set_var("KUBERNETES_SERVICE_PORT", "443");
        let settings = Settings::new(KubeArgs::default(), &probe);
        env::remove_var("KUBERNETES_SERVICE_HOST");
        env::remove_var("KUBERNETES_SERVICE_PORT");

        assert_eq!(
            settings.kube_api_server, "https://10.96.0.1:443",
            "the API server address must be synthesized from the service environment"
        );
        assert_eq!(
            settings.kube_token, "mounted-token",
            "the mounted token must be loaded as the process-wide override"
        );
    }

    #[test]
    fn test_in_cluster_bootstrap_tolerates_unreadable_token() {
        let dir = TempDir::new().unwrap();
        let token_file = dir.path().join("token");
        let ca_file = dir.path().join("ca.crt");
        // A directory passes the presence probe but fails the read
        std::fs::create_dir(&token_file).unwrap();
        std::fs::write(&ca_file, "certificate data").unwrap();
        let probe = ClusterProbe::new(&token_file, &ca_file);

        let _env = SERVICE_ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        env::set_var("KUBERNETES_SERVICE_HOST", "10.96.0.1");
        env::set_var("KUBERNETES_SERVICE_PORT", "443");
        let settings = Settings::new(KubeArgs::default(), &probe);
        env::remove_var("KUBERNETES_SERVICE_HOST");
        env::remove_var("KUBERNETES_SERVICE_PORT");

        assert_eq!(
            settings.kube_api_server, "https://10.96.0.1:443",
            "the API server address must be synthesized even when the token is unreadable"
        );
        assert_eq!(
            settings.kube_token, "",
            "a failed token read must leave the token override empty"
        );
    }

    #[test]
    fn test_in_cluster_bootstrap_overwrites_flag_values() {
        let dir = TempDir::new().unwrap();
        let token_file = dir.path().join("token");
        let ca_file = dir.path().join("ca.crt");
        std::fs::write(&token_file, "mounted-token").unwrap();
        std::fs::write(&ca_file, "certificate data").unwrap();
        let probe = ClusterProbe::new(&token_file, &ca_file);

        let args = KubeArgs {
            kube_token: "flag-token".to_string(),
            ..Default::default()
        };
        let settings = Settings::new(args, &probe);

        assert_eq!(
            settings.kube_token, "mounted-token",
            "inside a cluster the mounted token wins over the flag"
        );
    }
}
