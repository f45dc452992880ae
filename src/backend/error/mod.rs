//! Backend Error Module
//!
//! Error types for the routing core. The taxonomy mirrors how failures are
//! contained: per-connection (protocol), per-recipient (transport,
//! not-found), or propagated from the store layer.

/// Error type definitions
pub mod types;

pub use types::RouterError;
