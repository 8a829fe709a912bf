use std::path::PathBuf;
use std::sync::Arc;

use crate::services::credentials::ClusterProbe;
use crate::settings::Settings;

/// Application state containing all shared resources. Everything here is
/// read-only after startup; requests resolve their own credentials from it.
#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub probe: Arc<ClusterProbe>,
    pub upload_dir: PathBuf,
}

impl AppState {
    pub fn new(settings: Settings, probe: ClusterProbe, upload_dir: PathBuf) -> Self {
        Self {
            settings: Arc::new(settings),
            probe: Arc::new(probe),
            upload_dir,
        }
    }
}
