//! Error types for revu

use thiserror::Error;

/// Result type alias for revu operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for revu operations
#[derive(Error, Debug)]
pub enum Error {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Webhook payload could not be turned into an event
    #[error("Invalid webhook event: {0}")]
    Event(String),

    /// Installation credential could not be acquired
    #[error("Credential error for installation {installation_id}: {message}")]
    Credential {
        /// Installation the credential was requested for (0 when absent)
        installation_id: u64,
        /// Underlying failure
        message: String,
    },

    /// Changed files could not be fetched
    #[error("Failed to fetch changed files for PR #{pr_number}: {message}")]
    Fetch {
        /// Pull request number
        pr_number: u64,
        /// Underlying failure
        message: String,
    },

    /// Review generation failed
    #[error("Review generation failed: {0}")]
    Generation(String),

    /// Review publication failed
    #[error("Review publication failed: {0}")]
    Publication(String),

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}
