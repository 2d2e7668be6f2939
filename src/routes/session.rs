//! Voice session WebSocket route

use axum::{Router, routing::get};
use tower_http::trace::TraceLayer;

use crate::handlers::session_handler;
use crate::state::AppState;
use std::sync::Arc;

/// Create the voice session router
///
/// `GET /ws` upgrades to a voice session. Optional `?sample_rate=` overrides
/// the runtime's native rate.
///
/// Authentication middleware is applied by the caller once state exists.
pub fn create_session_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/ws", get(session_handler))
        .layer(TraceLayer::new_for_http())
}
