/**
 * Router Configuration
 *
 * A deliberately small HTTP surface: the WebSocket endpoint carrying the
 * chat protocol, a health probe, and a 404 fallback. Page serving, static
 * assets and the auth/upload REST surface belong to the external HTTP
 * layer.
 */
use crate::backend::chat::handlers::handle_socket_upgrade;
use crate::backend::server::state::AppState;
use axum::extract::State;
use axum::{Json, Router};
use tower_http::trace::TraceLayer;

/// Create the Axum router with all routes configured
pub fn create_router(app_state: AppState) -> Router<()> {
    Router::new()
        .route("/ws", axum::routing::get(handle_socket_upgrade))
        .route("/healthz", axum::routing::get(healthz))
        .fallback(|| async { "404 Not Found" })
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}

/// Liveness probe with a connection count for dashboards
async fn healthz(State(app_state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "live_sessions": app_state.router.live_sessions().await,
    }))
}
