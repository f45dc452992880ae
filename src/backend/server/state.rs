/**
 * Application State
 *
 * The Axum state container: the router (which owns the live session
 * directory behind its single lock) and the cookie-backed auth-session
 * store shared with the external HTTP layer. `FromRef` implementations let
 * handlers extract just the part they need.
 */
use crate::backend::auth::sessions::AuthSessionStore;
use crate::backend::chat::router::MessageRouter;
use axum::extract::FromRef;
use std::sync::Arc;

/// Shared state handed to every handler
#[derive(Clone)]
pub struct AppState {
    /// The routing core
    pub router: Arc<MessageRouter>,
    /// Cookie-backed auth sessions, swept by the background reaper
    pub auth_sessions: Arc<AuthSessionStore>,
}

impl FromRef<AppState> for Arc<MessageRouter> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.router.clone()
    }
}

impl FromRef<AppState> for Arc<AuthSessionStore> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.auth_sessions.clone()
    }
}
