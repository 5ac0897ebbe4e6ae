//! revu core - event pipeline for the revu pull request review bot
//!
//! This crate holds everything between a verified webhook delivery and the
//! platform: the event model, the handler registry, the pipeline stage
//! traits and the dispatcher that drives them, plus configuration, secrets
//! and the agent-backed review generator.

pub mod config;
pub mod dispatch;
pub mod error;
pub mod event;
pub mod model;
pub mod pipeline;
pub mod registry;
pub mod review;
pub mod secrets;

pub use config::Config;
pub use dispatch::{DispatchOutcome, EventDispatcher, ReviewPolicy, Stage};
pub use error::{Error, Result};
pub use event::{EventKey, PullRequestRef, RepositoryRef, WebhookEvent};
pub use model::{ChangedFile, FileStatus, InlineComment, ReviewArtifact, ReviewVerdict};
pub use pipeline::{ChangeSetFetcher, CredentialProvider, ReviewGenerator, ReviewPublisher};
pub use registry::{EventHandler, HandlerRegistry};
pub use review::{AgentReviewGenerator, ReviewRequest};
pub use secrets::{AppIdentity, Secrets};
