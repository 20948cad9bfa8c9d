//! Top-level wiring: one place that owns the credential store, token
//! authority, and gateway, and hands out pipelines and the session guard
//! to the presentation layer.

use std::sync::Arc;

use tracing::info;

use crate::auth::api::{self, LoginPayload, RegisterPayload};
use crate::auth::authority::TokenAuthority;
use crate::auth::guard::SessionGuard;
use crate::auth::store::{CredentialStore, JsonFileStore};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::http::client::{HttpClient, ReqwestHttpClient};
use crate::http::gateway::HttpGateway;
use crate::pipeline::SubmissionPipeline;

/// The assembled client core. Construct once at startup and share; all
/// components are cheap to clone.
#[derive(Clone)]
pub struct MarketplaceClient {
    authority: TokenAuthority,
    gateway: HttpGateway,
    guard: SessionGuard,
}

impl MarketplaceClient {
    /// Assemble the client from configuration: file-backed credential
    /// store, reqwest transport, and a session restored from disk when
    /// one was persisted.
    pub async fn new(config: Config) -> Result<Self> {
        let store = JsonFileStore::open(&config.store_path)
            .await
            .map_err(|e| Error::store(e.to_string()))?;
        Self::with_parts(config, Arc::new(store), Arc::new(ReqwestHttpClient::new())).await
    }

    /// Assemble the client from explicit parts. Used by tests and by
    /// embedders that bring their own store or transport.
    pub async fn with_parts(
        config: Config,
        store: Arc<dyn CredentialStore>,
        http: Arc<dyn HttpClient>,
    ) -> Result<Self> {
        let authority = TokenAuthority::new(config.api_url.clone(), store, http.clone());
        authority.initialize().await?;

        let gateway = HttpGateway::new(config.api_url.clone(), http, authority.clone());
        let guard = SessionGuard::new(authority.clone());

        info!(api_url = %config.api_url, "Client core ready");

        Ok(Self {
            authority,
            gateway,
            guard,
        })
    }

    /// The capability check handed to navigation and pages
    pub fn guard(&self) -> &SessionGuard {
        &self.guard
    }

    /// The authenticated request dispatcher
    pub fn gateway(&self) -> &HttpGateway {
        &self.gateway
    }

    /// The session owner, for consumers that drive login flows directly
    pub fn authority(&self) -> &TokenAuthority {
        &self.authority
    }

    /// Start a fresh submission attempt
    pub fn new_submission(&self) -> SubmissionPipeline {
        SubmissionPipeline::new(self.gateway.clone())
    }

    /// Create an account and establish the session
    pub async fn register(&self, payload: &RegisterPayload) -> Result<()> {
        let (identity, tokens) = api::register(&self.gateway, payload).await?;
        self.authority.login(identity, tokens).await;
        Ok(())
    }

    /// Sign in and establish the session
    pub async fn sign_in(&self, payload: &LoginPayload) -> Result<()> {
        let (identity, tokens) = api::login(&self.gateway, payload).await?;
        self.authority.login(identity, tokens).await;
        Ok(())
    }

    /// End the session and clear persisted credentials
    pub async fn sign_out(&self) {
        self.authority.logout().await;
    }
}
