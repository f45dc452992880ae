//! Routes Module
//!
//! HTTP route assembly for the server binary.

/// Router assembly
pub mod router;

pub use router::create_router;
