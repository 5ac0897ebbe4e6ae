//! GitHub App authentication
//!
//! The app authenticates with a JWT signed by its private key and exchanges
//! it for an installation access token whenever a scoped client is needed.

use async_trait::async_trait;
use jsonwebtoken::EncodingKey;
use octocrab::models::{AppId, InstallationId};
use octocrab::Octocrab;
use revu_core::{AppIdentity, CredentialProvider};
use tracing::{debug, info};
use url::Url;

use crate::{Error, Result};

/// Mints installation-scoped clients for a GitHub App
#[derive(Clone)]
pub struct GitHubAppCredentials {
    app: Octocrab,
    app_id: u64,
}

impl std::fmt::Debug for GitHubAppCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHubAppCredentials")
            .field("app_id", &self.app_id)
            .finish_non_exhaustive()
    }
}

impl GitHubAppCredentials {
    /// Create an app-authenticated client from the process identity
    ///
    /// `api_base` points at a GitHub Enterprise Server API root; `None`
    /// means github.com.
    pub fn new(identity: &AppIdentity, api_base: Option<&Url>) -> Result<Self> {
        let key = EncodingKey::from_rsa_pem(identity.private_key().as_bytes())
            .map_err(|e| Error::Auth(format!("Invalid app private key: {}", e)))?;

        let mut builder = Octocrab::builder().app(AppId(identity.app_id()), key);
        if let Some(base) = api_base {
            builder = builder
                .base_uri(base.as_str())
                .map_err(|e| Error::Auth(format!("Invalid API base {}: {}", base, e)))?;
        }

        let app = builder
            .build()
            .map_err(|e| Error::Auth(format!("Failed to create GitHub client: {}", e)))?;

        info!(app_id = identity.app_id(), "Created GitHub App client");

        Ok(Self {
            app,
            app_id: identity.app_id(),
        })
    }

    /// App id this provider signs for
    pub fn app_id(&self) -> u64 {
        self.app_id
    }

    /// Exchange the app JWT for an installation token and return a client using it
    pub async fn installation_client(&self, installation_id: u64) -> Result<Octocrab> {
        debug!(installation_id, "Exchanging app token for installation token");

        let (client, _token) = self
            .app
            .installation_and_token(InstallationId(installation_id))
            .await
            .map_err(|e| Error::or_not_found(e, Error::InstallationNotFound(installation_id)))?;

        Ok(client)
    }
}

#[async_trait]
impl CredentialProvider for GitHubAppCredentials {
    type Client = Octocrab;

    async fn acquire(&self, installation_id: u64) -> revu_core::Result<Octocrab> {
        self.installation_client(installation_id)
            .await
            .map_err(|e| revu_core::Error::Credential {
                installation_id,
                message: e.to_string(),
            })
    }
}
