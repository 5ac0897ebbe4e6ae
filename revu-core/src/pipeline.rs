//! Seams between the dispatcher and the collaborators it drives
//!
//! Each trait is one pipeline stage. `C` is the installation-scoped client
//! produced by the [`CredentialProvider`] and lent to every later stage of
//! the same event.

use async_trait::async_trait;

use crate::event::WebhookEvent;
use crate::model::{ChangedFile, ReviewArtifact};
use crate::Result;

/// Exchanges an installation id for a scoped client
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// Client type scoped to a single installation
    type Client: Send + Sync + 'static;

    /// Acquire a fresh client for `installation_id`
    async fn acquire(&self, installation_id: u64) -> Result<Self::Client>;
}

/// Lists the files a pull request touches
#[async_trait]
pub trait ChangeSetFetcher<C: Send + Sync>: Send + Sync {
    /// Every changed file of the pull request, in the order the platform returns them
    async fn list_changed_files(
        &self,
        client: &C,
        owner: &str,
        repo: &str,
        pr_number: u64,
    ) -> Result<Vec<ChangedFile>>;
}

/// Produces a review for a change set
#[async_trait]
pub trait ReviewGenerator<C: Send + Sync>: Send + Sync {
    /// Generate a review; `inline_suggestions` gates per-line comments
    async fn generate_review(
        &self,
        client: &C,
        event: &WebhookEvent,
        changed_files: &[ChangedFile],
        inline_suggestions: bool,
    ) -> Result<ReviewArtifact>;
}

/// Applies a review to the platform
#[async_trait]
pub trait ReviewPublisher<C: Send + Sync>: Send + Sync {
    /// Publish `review` on the pull request `event` refers to
    async fn publish_review(
        &self,
        client: &C,
        event: &WebhookEvent,
        review: &ReviewArtifact,
    ) -> Result<()>;
}
