//! Pull request review submission

use async_trait::async_trait;
use octocrab::Octocrab;
use revu_core::{ReviewArtifact, ReviewPublisher, ReviewVerdict, WebhookEvent};
use serde::Serialize;
use tracing::{debug, info};

use crate::{Error, Result};

/// Body of `POST /repos/{owner}/{repo}/pulls/{number}/reviews`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreateReview {
    /// Commit the review applies to
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commit_id: Option<String>,
    /// Review summary
    pub body: String,
    /// `COMMENT`, `APPROVE` or `REQUEST_CHANGES`
    pub event: &'static str,
    /// Inline comments
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub comments: Vec<DraftComment>,
}

/// Inline comment of a [`CreateReview`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DraftComment {
    /// File path
    pub path: String,
    /// Line on the new side of the diff
    pub line: u64,
    /// Always `RIGHT`
    pub side: &'static str,
    /// Comment text
    pub body: String,
}

fn review_event(verdict: ReviewVerdict) -> &'static str {
    match verdict {
        ReviewVerdict::Comment => "COMMENT",
        ReviewVerdict::Approve => "APPROVE",
        ReviewVerdict::RequestChanges => "REQUEST_CHANGES",
    }
}

impl CreateReview {
    /// Build the request body for `review`, pinned to `commit_id`
    pub fn new(review: &ReviewArtifact, commit_id: Option<String>) -> Self {
        Self {
            commit_id,
            body: review.summary.clone(),
            event: review_event(review.verdict),
            comments: review
                .comments
                .iter()
                .map(|c| DraftComment {
                    path: c.path.clone(),
                    line: c.line,
                    side: "RIGHT",
                    body: c.body.clone(),
                })
                .collect(),
        }
    }
}

/// Submit one review on a pull request
pub async fn submit_review(
    client: &Octocrab,
    owner: &str,
    repo: &str,
    pr_number: u64,
    review: &CreateReview,
) -> Result<u64> {
    debug!(
        owner,
        repo,
        pr_number,
        event = review.event,
        comments = review.comments.len(),
        "Submitting review"
    );

    let route = format!("/repos/{}/{}/pulls/{}/reviews", owner, repo, pr_number);
    let created: serde_json::Value = client
        .post(route, Some(review))
        .await
        .map_err(|e| Error::or_not_found(e, Error::PrNotFound(pr_number)))?;

    let review_id = created.get("id").and_then(|id| id.as_u64()).unwrap_or_default();
    info!(pr_number, review_id, "Submitted review");

    Ok(review_id)
}

/// [`ReviewPublisher`] that submits a GitHub pull request review
#[derive(Debug, Clone, Copy, Default)]
pub struct GitHubReviewPublisher;

impl GitHubReviewPublisher {
    /// Create a publisher
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ReviewPublisher<Octocrab> for GitHubReviewPublisher {
    async fn publish_review(
        &self,
        client: &Octocrab,
        event: &WebhookEvent,
        review: &ReviewArtifact,
    ) -> revu_core::Result<()> {
        let pr = event.pull_request.as_ref().ok_or_else(|| {
            revu_core::Error::Publication("event carries no pull request".to_string())
        })?;

        let body = CreateReview::new(review, Some(pr.head_sha.clone()));
        submit_review(
            client,
            &event.repository.owner,
            &event.repository.name,
            pr.number,
            &body,
        )
        .await
        .map(|_| ())
        .map_err(|e| revu_core::Error::Publication(e.to_string()))
    }
}
