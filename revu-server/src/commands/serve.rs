//! Serve command - Run the webhook server

use std::sync::Arc;

use clap::Args;
use revu_core::{
    AgentReviewGenerator, AppIdentity, Config, EventDispatcher, EventKey, HandlerRegistry,
    ReviewPolicy, Secrets,
};
use revu_github::{GitHubAppCredentials, GitHubChangeSetFetcher, GitHubReviewPublisher, Octocrab};
use tracing::info;

use crate::server::{self, IngressState};

/// Arguments for the serve command
#[derive(Args, Debug, Default)]
pub struct ServeArgs {
    /// Validate configuration and credentials, then exit without binding
    #[arg(long)]
    pub check: bool,
}

impl ServeArgs {
    /// Execute the serve command
    pub async fn execute(&self, config: &Config) -> anyhow::Result<()> {
        let secrets = Secrets::load()?.with_env_overrides()?;
        let identity = Arc::new(AppIdentity::from_secrets(&secrets)?);

        let credentials = GitHubAppCredentials::new(&identity, config.api_base_url()?.as_ref())?;
        let generator = AgentReviewGenerator::from_config(&config.review);

        info!(
            app_id = identity.app_id(),
            inline_suggestions = config.review.inline_suggestions,
            claude_path = %config.review.claude_path,
            "Review pipeline ready"
        );

        if self.check {
            println!("Configuration and credentials OK");
            return Ok(());
        }

        let dispatcher = EventDispatcher::<Octocrab>::new(
            Arc::new(credentials),
            Arc::new(GitHubChangeSetFetcher::new()),
            Arc::new(generator),
            Arc::new(GitHubReviewPublisher::new()),
        )
        .with_policy(ReviewPolicy::from(config));

        let registry =
            HandlerRegistry::new().on(EventKey::pull_request_opened(), Arc::new(dispatcher));

        let state = Arc::new(IngressState::new(identity, registry));
        server::serve(config, state).await
    }
}
