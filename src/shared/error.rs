//! Shared Error Types
//!
//! Failure cases that can occur on both sides of the wire: malformed
//! protocol frames and data validation problems.
use thiserror::Error;

/// Errors shared between the transport boundary and the data model
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SharedError {
    /// A protocol frame that could not be parsed into a command
    #[error("Frame error: {message}")]
    FrameError {
        /// Human-readable error message
        message: String,
    },

    /// Data validation error
    #[error("Validation error in field '{field}': {message}")]
    ValidationError {
        /// The field that failed validation
        field: String,
        /// Human-readable error message
        message: String,
    },
}

impl SharedError {
    /// Create a new frame error
    pub fn frame(message: impl Into<String>) -> Self {
        Self::FrameError {
            message: message.into(),
        }
    }

    /// Create a new validation error
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ValidationError {
            field: field.into(),
            message: message.into(),
        }
    }
}
