use axum::{
    extract::{Path, State},
    routing::{get, post, put},
    Json, Router,
};

use crate::error::Result;
use crate::services::releases::{
    ReleaseElement, ReleaseManager, ReleaseOptions, ReleaseOutcome, ReleaseRevision, ReleaseStatus,
};
use crate::state::AppState;

/// Create release routes, nested under /api/namespaces/{namespace}/releases
pub fn release_routes(state: AppState) -> Router {
    Router::new()
        .route("/", get(list_releases))
        .route(
            "/{release}",
            post(install_release)
                .put(upgrade_release)
                .delete(uninstall_release),
        )
        .route("/{release}/status", get(release_status))
        .route("/{release}/histories", get(release_history))
        .route("/{release}/versions/{revision}", put(rollback_release))
        .with_state(state)
}

fn manager(state: &AppState, namespace: &str) -> Result<ReleaseManager> {
    ReleaseManager::new(&state.settings, namespace, &state.probe)
}

/// List releases in a namespace
#[utoipa::path(
    get,
    path = "/api/namespaces/{namespace}/releases",
    tag = "Releases",
    params(
        ("namespace" = String, Path, description = "Namespace to list"),
    ),
    responses(
        (status = 200, body = Vec<ReleaseElement>)
    )
)]
async fn list_releases(
    State(state): State<AppState>,
    Path(namespace): Path<String>,
) -> Result<Json<Vec<ReleaseElement>>> {
    let releases = manager(&state, &namespace)?.list().await?;
    Ok(Json(releases))
}

/// Install a chart as a new release
#[utoipa::path(
    post,
    path = "/api/namespaces/{namespace}/releases/{release}",
    tag = "Releases",
    params(
        ("namespace" = String, Path, description = "Target namespace"),
        ("release" = String, Path, description = "Release name"),
    ),
    request_body = ReleaseOptions,
    responses(
        (status = 200, body = ReleaseOutcome)
    )
)]
async fn install_release(
    State(state): State<AppState>,
    Path((namespace, release)): Path<(String, String)>,
    Json(request): Json<ReleaseOptions>,
) -> Result<Json<ReleaseOutcome>> {
    let outcome = manager(&state, &namespace)?
        .install(&release, &request, &state.upload_dir)
        .await?;
    Ok(Json(outcome))
}

/// Upgrade an existing release
#[utoipa::path(
    put,
    path = "/api/namespaces/{namespace}/releases/{release}",
    tag = "Releases",
    params(
        ("namespace" = String, Path, description = "Target namespace"),
        ("release" = String, Path, description = "Release name"),
    ),
    request_body = ReleaseOptions,
    responses(
        (status = 200, body = ReleaseOutcome)
    )
)]
async fn upgrade_release(
    State(state): State<AppState>,
    Path((namespace, release)): Path<(String, String)>,
    Json(request): Json<ReleaseOptions>,
) -> Result<Json<ReleaseOutcome>> {
    let outcome = manager(&state, &namespace)?
        .upgrade(&release, &request, &state.upload_dir)
        .await?;
    Ok(Json(outcome))
}

/// Uninstall a release
#[utoipa::path(
    delete,
    path = "/api/namespaces/{namespace}/releases/{release}",
    tag = "Releases",
    params(
        ("namespace" = String, Path, description = "Target namespace"),
        ("release" = String, Path, description = "Release name"),
    ),
    responses(
        (status = 200, description = "Uninstall confirmation")
    )
)]
async fn uninstall_release(
    State(state): State<AppState>,
    Path((namespace, release)): Path<(String, String)>,
) -> Result<Json<serde_json::Value>> {
    let result = manager(&state, &namespace)?.uninstall(&release).await?;
    Ok(Json(result))
}

/// Get the current status of a release
#[utoipa::path(
    get,
    path = "/api/namespaces/{namespace}/releases/{release}/status",
    tag = "Releases",
    params(
        ("namespace" = String, Path, description = "Target namespace"),
        ("release" = String, Path, description = "Release name"),
    ),
    responses(
        (status = 200, body = ReleaseStatus)
    )
)]
async fn release_status(
    State(state): State<AppState>,
    Path((namespace, release)): Path<(String, String)>,
) -> Result<Json<ReleaseStatus>> {
    let status = manager(&state, &namespace)?.status(&release).await?;
    Ok(Json(status))
}

/// Get the revision history of a release
#[utoipa::path(
    get,
    path = "/api/namespaces/{namespace}/releases/{release}/histories",
    tag = "Releases",
    params(
        ("namespace" = String, Path, description = "Target namespace"),
        ("release" = String, Path, description = "Release name"),
    ),
    responses(
        (status = 200, body = Vec<ReleaseRevision>)
    )
)]
async fn release_history(
    State(state): State<AppState>,
    Path((namespace, release)): Path<(String, String)>,
) -> Result<Json<Vec<ReleaseRevision>>> {
    let history = manager(&state, &namespace)?.history(&release).await?;
    Ok(Json(history))
}

/// Roll a release back to an earlier revision
#[utoipa::path(
    put,
    path = "/api/namespaces/{namespace}/releases/{release}/versions/{revision}",
    tag = "Releases",
    params(
        ("namespace" = String, Path, description = "Target namespace"),
        ("release" = String, Path, description = "Release name"),
        ("revision" = u64, Path, description = "Revision to restore"),
    ),
    responses(
        (status = 200, description = "Rollback confirmation")
    )
)]
async fn rollback_release(
    State(state): State<AppState>,
    Path((namespace, release, revision)): Path<(String, String, u64)>,
) -> Result<Json<serde_json::Value>> {
    let result = manager(&state, &namespace)?
        .rollback(&release, revision)
        .await?;
    Ok(Json(result))
}
