use axum::{
    extract::State,
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;

use super::{downloads, handlers, jobs, media, middleware::metrics_middleware};
use crate::metrics::{collect_dynamic_metrics, encode_metrics};
use crate::state::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    // API routes
    let api_routes = Router::new()
        // Health and config
        .route("/health", get(handlers::health))
        .route("/config", get(handlers::get_config))
        .route("/stats", get(handlers::get_stats))
        // Media
        .route("/info", post(media::get_info))
        .route("/download", post(media::request_download))
        // Jobs
        .route("/jobs/{key}", get(jobs::get_job))
        .route("/jobs/{key}/wait", get(jobs::wait_job));

    let mut router = Router::new()
        .nest("/api/v1", api_routes)
        .route("/downloads/{handle}", get(downloads::download_artifact))
        .route("/metrics", get(metrics));

    // Serve a static front page if configured
    if let Some(dir) = &state.config().server.static_dir {
        let index_path = dir.join("index.html");
        router = router.fallback_service(ServeDir::new(dir).fallback(ServeFile::new(index_path)));
    }

    router
        .layer(middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn metrics(State(state): State<Arc<AppState>>) -> String {
    collect_dynamic_metrics(&state);
    encode_metrics()
}
