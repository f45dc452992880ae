//! Chat Backend Module
//!
//! The presence-aware routing core: who is online, what conversation each
//! connection is looking at, and how one sent message becomes live pushes
//! for some recipients and unread bumps for the rest.
//!
//! # Architecture
//!
//! The chat module is organized into focused submodules:
//!
//! - **`session`** - live Session records and the in-memory SessionDirectory
//! - **`router`** - the MessageRouter: command dispatch, fan-out, unread
//!   accounting and the account-deletion cascade
//! - **`render`** - the pure rendering collaborator used for every outbound
//!   fragment
//! - **`handlers`** - the WebSocket boundary feeding the router

/// Live session records and directory
pub mod session;

/// The routing engine
pub mod router;

/// Fragment rendering collaborator
pub mod render;

/// WebSocket handlers
pub mod handlers;

pub use render::{PlainRenderer, RenderParams, Renderer, Template};
pub use router::MessageRouter;
pub use session::{ConnectionId, Session, SessionDirectory};
