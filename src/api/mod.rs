pub mod charts;
pub mod releases;
pub mod repositories;

use axum::{routing::get, Router};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::state::AppState;

/// Create the main application router
pub fn create_app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(welcome))
        .route("/api/health", get(health_check))
        .nest(
            "/api/namespaces/{namespace}/releases",
            releases::release_routes(state.clone()),
        )
        .nest(
            "/api/repositories",
            repositories::repository_routes(state.clone()),
        )
        .nest("/api/charts", charts::chart_routes(state))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

/// Landing route kept stable for probes and humans alike
async fn welcome() -> &'static str {
    "Welcome helm wrapper server"
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}
