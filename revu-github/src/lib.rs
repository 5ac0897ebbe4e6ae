//! revu GitHub - GitHub App integration for revu
//!
//! This crate provides the GitHub side of the review pipeline: minting
//! installation-scoped clients, listing pull request files, and submitting
//! reviews.

mod app;
mod error;
mod files;
mod review;

#[cfg(test)]
mod testing;

pub use app::GitHubAppCredentials;
pub use error::{Error, Result};
pub use files::{list_pr_files, FileEntry, GitHubChangeSetFetcher};
pub use review::{submit_review, CreateReview, DraftComment, GitHubReviewPublisher};

pub use octocrab::Octocrab;
