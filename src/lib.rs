//! Parley - Presence-Aware Chat Routing Engine
//!
//! Parley is a multi-user chat backend coordinating many concurrent
//! persistent connections. Each connected user views exactly one peer (a
//! specific user, or the broadcast pseudo-peer meaning "everyone");
//! incoming messages are persisted, echoed to the sender, and fanned out to
//! the recipients actively viewing the right conversation, while everyone
//! else accumulates a durable per-pair unread count instead of a live push.
//!
//! # Module Structure
//!
//! - **`shared`** - the data model and wire protocol: users, messages,
//!   inbound command / outbound push frames
//! - **`backend`** - the routing core, its store collaborators, and the
//!   Axum server around them
//!
//! # Usage
//!
//! ```rust,no_run
//! use parley::backend::server::{config::ServerConfig, init::create_app};
//!
//! # async fn example() {
//! let config = ServerConfig::from_env();
//! let app = create_app(&config).await;
//! // Serve `app` with axum
//! # }
//! ```
//!
//! # Concurrency
//!
//! All routing state sits behind the router's single fair lock: every
//! inbound event holds it for its entire logical operation, so the
//! push-vs-bump decision and the ledger mutation it implies are atomic.
//! Socket writes are queued per connection and never awaited under the
//! lock.

/// Server-side code
pub mod backend;

/// Shared types
pub mod shared;
