//! Error types for GitHub operations

use thiserror::Error;

/// Result type for GitHub operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during GitHub operations
#[derive(Error, Debug)]
pub enum Error {
    /// GitHub API error
    #[error("GitHub API error: {0}")]
    Api(#[from] octocrab::Error),

    /// App authentication error
    #[error("GitHub App authentication error: {0}")]
    Auth(String),

    /// Installation not found or app not installed
    #[error("Installation {0} not found")]
    InstallationNotFound(u64),

    /// Pull request not found
    #[error("Pull request #{0} not found")]
    PrNotFound(u64),
}

impl Error {
    /// Map an API error, treating a GitHub 404 as `not_found`
    pub(crate) fn or_not_found(err: octocrab::Error, not_found: Error) -> Error {
        match &err {
            octocrab::Error::GitHub { source, .. } if source.status_code.as_u16() == 404 => not_found,
            _ => Error::Api(err),
        }
    }
}
