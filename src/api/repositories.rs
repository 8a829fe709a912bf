use axum::{
    extract::{Query, State},
    routing::{get, put},
    Json, Router,
};
use serde::Deserialize;

use crate::error::Result;
use crate::services::repository::{ChartVersion, RepoManager};
use crate::state::AppState;

/// Create repository routes, nested under /api/repositories
pub fn repository_routes(state: AppState) -> Router {
    Router::new()
        .route("/", put(update_repositories))
        .route("/charts", get(list_repo_charts))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub keyword: Option<String>,
    #[serde(default)]
    pub versions: bool,
}

/// Re-sync the index of every registered repository
#[utoipa::path(
    put,
    path = "/api/repositories",
    tag = "Repositories",
    responses(
        (status = 200, description = "Synchronization confirmation")
    )
)]
async fn update_repositories(State(state): State<AppState>) -> Result<Json<serde_json::Value>> {
    RepoManager::new(&state.settings).update().await?;
    Ok(Json(serde_json::json!({
        "success": true,
        "message": "Repository indexes synchronized"
    })))
}

/// Search registered repositories for charts
#[utoipa::path(
    get,
    path = "/api/repositories/charts",
    tag = "Repositories",
    params(
        ("keyword" = Option<String>, Query, description = "Search keyword"),
        ("versions" = bool, Query, description = "List every chart version"),
    ),
    responses(
        (status = 200, body = Vec<ChartVersion>)
    )
)]
async fn list_repo_charts(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<ChartVersion>>> {
    let charts = RepoManager::new(&state.settings)
        .search(query.keyword.as_deref(), query.versions)
        .await?;
    Ok(Json(charts))
}
