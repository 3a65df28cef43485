//! GeoGuard API /v1: attendance checks, detection config and admin review
pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod state;

pub use config::ServiceConfig;
pub use error::{ApiError, ApiResult};
pub use state::AppState;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

pub fn create_app(state: AppState) -> Router {
    Router::new()
        .route("/v1/attendance/check", post(handlers::check_attendance))
        .route("/v1/attendance/{id}", get(handlers::get_attendance))
        .route(
            "/v1/configs",
            get(handlers::list_configs).post(handlers::create_config),
        )
        .route("/v1/configs/active", get(handlers::active_config))
        .route("/v1/configs/{name}/activate", post(handlers::activate_config))
        .route("/v1/configs/{name}/deactivate", post(handlers::deactivate_config))
        .route("/v1/detections", get(handlers::list_detections))
        .route("/v1/detections/stats", get(handlers::detection_stats))
        .route("/v1/detections/export", get(handlers::export_detections))
        .route("/v1/detections/{id}", get(handlers::get_detection))
        .route("/v1/detections/{id}/review", post(handlers::review_detection))
        .route("/v1/health", get(handlers::health))
        .route("/metrics", get(handlers::metrics))
        .layer(axum::middleware::from_fn(middleware::trace_id))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::cors())
        .with_state(state)
}

pub async fn run(config: ServiceConfig) -> ApiResult<()> {
    let state = AppState::from_config(&config)?;
    let app = create_app(state);

    let listener = tokio::net::TcpListener::bind(&config.addr).await?;
    tracing::info!(addr = %config.addr, "GeoGuard API listening");
    axum::serve(listener, app).await?;
    Ok(())
}
