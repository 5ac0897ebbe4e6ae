//! Webhook event model
//!
//! A [`WebhookEvent`] is built from one verified delivery and handed to
//! exactly one handler. Only the fields the pipeline routes on are typed;
//! everything else stays in [`WebhookEvent::payload`] untouched.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Event type plus action, the key handlers are registered under
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventKey {
    /// Value of the `X-GitHub-Event` header
    pub event_type: String,
    /// `action` field of the payload, if any
    pub action: Option<String>,
}

impl EventKey {
    /// Key for an event type with an action
    pub fn new(event_type: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            action: Some(action.into()),
        }
    }

    /// `pull_request.opened`
    pub fn pull_request_opened() -> Self {
        Self::new("pull_request", "opened")
    }

    /// Key of a delivery, read from its event header and raw payload
    pub fn from_payload(event_type: impl Into<String>, payload: &serde_json::Value) -> Self {
        Self {
            event_type: event_type.into(),
            action: payload
                .get("action")
                .and_then(|a| a.as_str())
                .map(str::to_string),
        }
    }
}

impl fmt::Display for EventKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.action {
            Some(action) => write!(f, "{}.{}", self.event_type, action),
            None => write!(f, "{}", self.event_type),
        }
    }
}

/// Repository an event belongs to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryRef {
    /// Owner login
    pub owner: String,
    /// Repository name
    pub name: String,
    /// `owner/name`
    pub full_name: String,
}

/// Pull request an event refers to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequestRef {
    /// PR number
    pub number: u64,
    /// PR title
    pub title: String,
    /// PR body
    pub body: Option<String>,
    /// Head commit SHA
    pub head_sha: String,
    /// Head branch name
    pub head_ref: String,
    /// Base branch name
    pub base_ref: String,
    /// Web URL of the PR
    pub html_url: Option<String>,
}

/// One verified webhook delivery
#[derive(Debug, Clone)]
pub struct WebhookEvent {
    /// Value of the `X-GitHub-Event` header
    pub event_type: String,
    /// `action` field of the payload
    pub action: Option<String>,
    /// Value of the `X-GitHub-Delivery` header
    pub delivery_id: String,
    /// Installation the delivery was sent for
    pub installation_id: Option<u64>,
    /// Repository the event belongs to
    pub repository: RepositoryRef,
    /// Pull request, for pull request events
    pub pull_request: Option<PullRequestRef>,
    /// Raw JSON body
    pub payload: serde_json::Value,
    /// When the delivery was accepted
    pub received_at: DateTime<Utc>,
}

// Wire shapes; only what routing needs.
#[derive(Deserialize)]
struct RawPayload {
    action: Option<String>,
    installation: Option<RawInstallation>,
    repository: Option<RawRepository>,
    pull_request: Option<RawPullRequest>,
}

#[derive(Deserialize)]
struct RawInstallation {
    id: u64,
}

#[derive(Deserialize)]
struct RawRepository {
    name: String,
    full_name: String,
    owner: RawUser,
}

#[derive(Deserialize)]
struct RawUser {
    login: String,
}

#[derive(Deserialize)]
struct RawPullRequest {
    number: u64,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    body: Option<String>,
    head: RawBranch,
    base: RawBranch,
    #[serde(default)]
    html_url: Option<String>,
}

#[derive(Deserialize)]
struct RawBranch {
    sha: String,
    #[serde(rename = "ref")]
    ref_name: String,
}

impl WebhookEvent {
    /// Build an event from a delivery's headers and verified body
    pub fn from_delivery(
        event_type: impl Into<String>,
        delivery_id: impl Into<String>,
        body: &[u8],
    ) -> Result<Self> {
        let payload: serde_json::Value = serde_json::from_slice(body)?;
        Self::from_payload(event_type, delivery_id, payload)
    }

    /// Build an event from an already parsed payload
    pub fn from_payload(
        event_type: impl Into<String>,
        delivery_id: impl Into<String>,
        payload: serde_json::Value,
    ) -> Result<Self> {
        let event_type = event_type.into();
        let raw = RawPayload::deserialize(&payload)
            .map_err(|e| Error::Event(format!("{} payload: {}", event_type, e)))?;

        let repository = raw
            .repository
            .map(|r| RepositoryRef {
                owner: r.owner.login,
                name: r.name,
                full_name: r.full_name,
            })
            .ok_or_else(|| Error::Event(format!("{} payload has no repository", event_type)))?;

        let pull_request = raw.pull_request.map(|pr| PullRequestRef {
            number: pr.number,
            title: pr.title.unwrap_or_default(),
            body: pr.body,
            head_sha: pr.head.sha,
            head_ref: pr.head.ref_name,
            base_ref: pr.base.ref_name,
            html_url: pr.html_url,
        });

        Ok(Self {
            event_type,
            action: raw.action,
            delivery_id: delivery_id.into(),
            installation_id: raw.installation.map(|i| i.id),
            repository,
            pull_request,
            payload,
            received_at: Utc::now(),
        })
    }

    /// Routing key of this event
    pub fn key(&self) -> EventKey {
        EventKey {
            event_type: self.event_type.clone(),
            action: self.action.clone(),
        }
    }

    /// PR number, if this is a pull request event
    pub fn pr_number(&self) -> Option<u64> {
        self.pull_request.as_ref().map(|pr| pr.number)
    }
}
