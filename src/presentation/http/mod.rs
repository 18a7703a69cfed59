pub mod error;
pub mod health;
pub mod live;
pub mod samples;
pub mod state;

use axum::http::Request;
use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;
use tracing::Level;

pub use self::state::AppState;

/// Build the HTTP router.
///
/// - `GET /health` liveness probe
/// - `POST /api/samples` sample ingestion
/// - `GET /ws/alarms` live alarm stream (WebSocket)
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/api/samples", post(samples::create_sample))
        .route("/ws/alarms", get(live::live_alarms))
        .with_state(state)
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request<_>| {
                tracing::span!(
                    Level::INFO,
                    "http_request",
                    method = %request.method(),
                    path = %request.uri().path(),
                )
            }),
        )
}
