//! Auth Module
//!
//! Cookie-backed session records shared with the external HTTP layer.
//! Credential verification, login and signup live in that layer; the
//! routing core only resolves "which user is this cookie" through the
//! store here.

/// Auth-session records and their store
pub mod sessions;

pub use sessions::{AuthSession, AuthSessionStore, SESSION_COOKIE};
