//! Server Module
//!
//! Startup wiring for the routing engine: configuration, the Axum state
//! container, and application initialization.

/// Server configuration
pub mod config;

/// Application state
pub mod state;

/// Server initialization
pub mod init;
