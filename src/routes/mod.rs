pub mod api;
pub mod session;

use axum::{Router, middleware};
use std::sync::Arc;

use crate::middleware::auth_middleware;
use crate::state::AppState;

/// Public routes plus the authenticated session route, with state applied.
pub fn create_app(state: Arc<AppState>) -> Router {
    let session_routes = session::create_session_router()
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    api::create_api_router()
        .merge(session_routes)
        .with_state(state)
}
