/**
 * Backend Error Types
 *
 * This module defines the router's error taxonomy. No router error is fatal
 * to the process: protocol errors keep the connection open, not-found and
 * transport errors are logged no-ops contained to a single recipient, and
 * inconsistent state resolves defensively inside the operation itself.
 */
use crate::backend::store::StoreError;
use crate::shared::SharedError;
use thiserror::Error;

/// Errors raised while processing one routing operation
#[derive(Debug, Error)]
pub enum RouterError {
    /// Unknown or malformed inbound command
    ///
    /// Logged at the socket boundary; the connection stays open.
    #[error("Protocol error: {0}")]
    Protocol(#[from] SharedError),

    /// A referenced entity does not exist (e.g. deleting an unknown message)
    #[error("Not found: {0}")]
    NotFound(String),

    /// A push could not be written because the recipient socket closed
    ///
    /// Caught per-recipient during fan-out; never aborts delivery to others.
    #[error("Transport closed for '{username}'")]
    Transport {
        /// The recipient whose socket went away
        username: String,
    },

    /// Store-layer failure while persisting or reading routing data
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl RouterError {
    /// Create a new not-found error
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    /// Create a new transport error for a recipient
    pub fn transport(username: impl Into<String>) -> Self {
        Self::Transport {
            username: username.into(),
        }
    }
}
