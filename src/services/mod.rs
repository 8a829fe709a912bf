pub mod credentials;
pub mod helm;
pub mod releases;
pub mod repository;

pub use credentials::{ClientConfig, ClusterProbe, CredentialError, CredentialSource};
pub use helm::{ActionConfig, HelmCommand, HelmError};
pub use releases::{
    ReleaseElement, ReleaseManager, ReleaseOptions, ReleaseOutcome, ReleaseRevision, ReleaseStatus,
};
pub use repository::{ChartInfoKind, ChartVersion, RepoManager, UploadedChart};
