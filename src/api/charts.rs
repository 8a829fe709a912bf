use axum::{
    extract::{Multipart, Query, State},
    http::header,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Deserialize;

use crate::error::{AppError, Result};
use crate::services::repository::{self, ChartInfoKind, RepoManager, UploadedChart};
use crate::state::AppState;

/// Create chart routes, nested under /api/charts
pub fn chart_routes(state: AppState) -> Router {
    Router::new()
        .route("/", get(show_chart))
        .route("/upload", get(list_uploaded_charts).post(upload_chart))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
pub struct ShowChartQuery {
    pub chart: String,
    #[serde(default)]
    pub info: ChartInfoKind,
}

/// Show chart metadata (chart, readme, values or all of them)
#[utoipa::path(
    get,
    path = "/api/charts",
    tag = "Charts",
    params(
        ("chart" = String, Query, description = "Chart reference, e.g. bitnami/nginx"),
        ("info" = String, Query, description = "One of all, chart, readme, values"),
    ),
    responses(
        (status = 200, description = "Chart metadata as plain text")
    )
)]
async fn show_chart(
    State(state): State<AppState>,
    Query(query): Query<ShowChartQuery>,
) -> Result<Response> {
    let content = RepoManager::new(&state.settings)
        .show(&query.chart, query.info)
        .await?;
    Ok((
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        content,
    )
        .into_response())
}

/// Upload a packaged chart into the upload directory
#[utoipa::path(
    post,
    path = "/api/charts/upload",
    tag = "Charts",
    responses(
        (status = 200, body = UploadedChart)
    )
)]
async fn upload_chart(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadedChart>> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some("chart") {
            continue;
        }
        let filename = field
            .file_name()
            .map(str::to_string)
            .ok_or_else(|| AppError::BadRequest("chart filename is required".to_string()))?;
        let contents = field.bytes().await?;

        let stored = repository::store_chart(&state.upload_dir, &filename, &contents).await?;
        return Ok(Json(stored));
    }

    Err(AppError::BadRequest(
        "multipart field 'chart' is required".to_string(),
    ))
}

/// List uploaded chart packages
#[utoipa::path(
    get,
    path = "/api/charts/upload",
    tag = "Charts",
    responses(
        (status = 200, body = Vec<UploadedChart>)
    )
)]
async fn list_uploaded_charts(State(state): State<AppState>) -> Result<Json<Vec<UploadedChart>>> {
    let charts = repository::list_uploaded(&state.upload_dir).await?;
    Ok(Json(charts))
}
