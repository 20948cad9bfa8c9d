use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt, Shared};
use serde::Deserialize;
use tokio::sync::{watch, Mutex, RwLock};
use tracing::{debug, error, info, warn};

use crate::auth::session::{Session, TokenPair, UserIdentity};
use crate::auth::store::{self, CredentialStore};
use crate::error::{Error, Result};
use crate::http::client::{Body, HttpClient, Method};

/// Response payload of the refresh endpoint
#[derive(Debug, Deserialize)]
struct RefreshResponse {
    access_token: String,
}

/// The at-most-one in-flight refresh for this authority. Concurrent
/// callers clone and await the same shared future instead of issuing
/// duplicate refresh calls; the refresh token is single-use server-side,
/// so a duplicate call would invalidate it for everyone.
struct PendingRefresh {
    cycle: u64,
    future: Shared<BoxFuture<'static, Option<String>>>,
}

struct AuthorityInner {
    session: RwLock<Option<Session>>,
    store: Arc<dyn CredentialStore>,
    http: Arc<dyn HttpClient>,
    api_url: String,
    pending_refresh: Mutex<Option<PendingRefresh>>,
    /// Bumped on login/logout; a refresh cycle started under an older
    /// epoch must not commit its result.
    epoch: AtomicU64,
    /// Monotonic id for refresh cycles, used to clear the pending slot
    cycle_counter: AtomicU64,
    session_tx: watch::Sender<bool>,
}

/// Single source of truth for "is there a usable session" and "what
/// header proves it".
///
/// Owns the [`Session`] exclusively; the credential store only mirrors it
/// for restart survival. Cheap to clone, all clones share state.
#[derive(Clone)]
pub struct TokenAuthority {
    inner: Arc<AuthorityInner>,
}

impl TokenAuthority {
    /// Create an authority with no session. Call [`initialize`] to restore
    /// a persisted session.
    ///
    /// [`initialize`]: TokenAuthority::initialize
    pub fn new(
        api_url: impl Into<String>,
        store: Arc<dyn CredentialStore>,
        http: Arc<dyn HttpClient>,
    ) -> Self {
        let (session_tx, _) = watch::channel(false);
        Self {
            inner: Arc::new(AuthorityInner {
                session: RwLock::new(None),
                store,
                http,
                api_url: api_url.into(),
                pending_refresh: Mutex::new(None),
                epoch: AtomicU64::new(0),
                cycle_counter: AtomicU64::new(0),
                session_tx,
            }),
        }
    }

    /// Restore the persisted session, if any, from the credential store.
    /// Missing or partial credentials leave the authority unauthenticated.
    pub async fn initialize(&self) -> Result<()> {
        let restored = store::load_session(self.inner.store.as_ref())
            .await
            .map_err(|e| Error::store(e.to_string()))?;

        match restored {
            Some(session) => {
                info!(user_id = %session.user.id, "Restored session from credential store");
                *self.inner.session.write().await = Some(session);
                let _ = self.inner.session_tx.send_replace(true);
            }
            None => {
                debug!("No persisted session, starting unauthenticated");
            }
        }
        Ok(())
    }

    /// Establish a session from a login or register outcome. The access
    /// token is usable immediately; mirroring to the credential store is
    /// best-effort.
    pub async fn login(&self, identity: UserIdentity, tokens: TokenPair) {
        let session = Session::new(identity, tokens);
        info!(user_id = %session.user.id, "Session established");

        // Invalidate any refresh cycle started under the previous session
        self.inner.epoch.fetch_add(1, Ordering::SeqCst);
        self.inner.pending_refresh.lock().await.take();

        if let Err(e) = store::persist_session(self.inner.store.as_ref(), &session).await {
            warn!(error = %e, "Failed to mirror session to credential store, session is memory-only");
        }

        *self.inner.session.write().await = Some(session);
        let _ = self.inner.session_tx.send_replace(true);
    }

    /// Clear the session from memory and the credential store. Any pending
    /// refresh is invalidated; its joiners observe "no token available".
    pub async fn logout(&self) {
        self.inner.epoch.fetch_add(1, Ordering::SeqCst);
        self.inner.pending_refresh.lock().await.take();

        let had_session = self.inner.session.write().await.take().is_some();
        if had_session {
            info!("Session cleared");
        }

        if let Err(e) = store::clear_session(self.inner.store.as_ref()).await {
            error!(error = %e, "Failed to clear credential store on logout");
        }

        let _ = self.inner.session_tx.send_replace(false);
    }

    /// Bearer header for the active access token, or `None` when
    /// unauthenticated. Side-effect-free.
    pub async fn current_auth_header(&self) -> Option<String> {
        self.inner
            .session
            .read()
            .await
            .as_ref()
            .map(|s| s.auth_header())
    }

    /// Identity of the signed-in user, if any
    pub async fn current_user(&self) -> Option<UserIdentity> {
        self.inner
            .session
            .read()
            .await
            .as_ref()
            .map(|s| s.user.clone())
    }

    /// Whether a session is active
    pub async fn is_authenticated(&self) -> bool {
        self.inner.session.read().await.is_some()
    }

    /// Subscribe to session presence changes
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.inner.session_tx.subscribe()
    }

    /// Mint a new access token from the stored refresh token.
    ///
    /// Single-flight: if a refresh is already pending, this call joins it
    /// and returns the same outcome. On success every joiner receives the
    /// new access token and the session (memory and store) carries it. On
    /// any failure the session is logged out and every joiner receives
    /// `None`.
    pub async fn refresh(&self) -> Option<String> {
        let future = {
            let mut pending = self.inner.pending_refresh.lock().await;
            if let Some(p) = pending.as_ref() {
                debug!("Joining in-flight token refresh");
                p.future.clone()
            } else {
                let epoch = self.inner.epoch.load(Ordering::SeqCst);
                let cycle = self.inner.cycle_counter.fetch_add(1, Ordering::SeqCst);
                let inner = Arc::clone(&self.inner);
                let future = async move { run_refresh(inner, epoch, cycle).await }
                    .boxed()
                    .shared();
                *pending = Some(PendingRefresh {
                    cycle,
                    future: future.clone(),
                });
                future
            }
        };

        future.await
    }
}

/// The actual refresh cycle. Runs at most once per pending slot; clears
/// the slot before resolving so the next failure starts a fresh cycle.
async fn run_refresh(inner: Arc<AuthorityInner>, epoch: u64, cycle: u64) -> Option<String> {
    // The refresh token is read exactly once per cycle and never leaves
    // this function.
    let refresh_token = inner
        .session
        .read()
        .await
        .as_ref()
        .map(|s| s.refresh_token.clone());

    let outcome = match refresh_token {
        Some(refresh_token) => request_new_access_token(&inner, &refresh_token).await,
        None => {
            debug!("Refresh requested without a session");
            None
        }
    };

    // A login/logout that happened while the request was in flight owns
    // the session now; this cycle's result must not touch it.
    let stale = inner.epoch.load(Ordering::SeqCst) != epoch;

    let result = match (&outcome, stale) {
        (_, true) => {
            warn!("Discarding refresh outcome, session changed while refresh was in flight");
            None
        }
        (Some(token), false) => {
            commit_access_token(&inner, token).await;
            Some(token.clone())
        }
        (None, false) => {
            warn!("Token refresh failed, terminating session");
            force_logout(&inner).await;
            None
        }
    };

    // Clear the pending slot if it still belongs to this cycle
    let mut pending = inner.pending_refresh.lock().await;
    if pending.as_ref().map(|p| p.cycle) == Some(cycle) {
        *pending = None;
    }

    result
}

async fn request_new_access_token(inner: &AuthorityInner, refresh_token: &str) -> Option<String> {
    let url = format!("{}/api/auth/refresh", inner.api_url);
    let mut headers = HashMap::new();
    headers.insert(
        "Authorization".to_string(),
        format!("Bearer {}", refresh_token),
    );

    match inner
        .http
        .request(Method::Post, &url, &headers, &Body::Empty)
        .await
    {
        Ok(response) if response.is_success() => match response.json::<RefreshResponse>() {
            Ok(parsed) => {
                info!("Access token refreshed");
                Some(parsed.access_token)
            }
            Err(e) => {
                error!(error = %e, "Refresh response was unreadable");
                None
            }
        },
        Ok(response) => {
            warn!(status = response.status(), "Refresh rejected by server");
            None
        }
        Err(e) => {
            warn!(error = %e, "Refresh request failed");
            None
        }
    }
}

/// Swap the access token in the session and mirror it to the store
async fn commit_access_token(inner: &AuthorityInner, token: &str) {
    let mut session = inner.session.write().await;
    if let Some(session) = session.as_mut() {
        session.access_token = token.to_string();
        if let Err(e) = inner
            .store
            .set(store::ACCESS_TOKEN_KEY, &session.access_token)
            .await
        {
            warn!(error = %e, "Failed to mirror refreshed access token");
        }
    }
}

/// Logout used inside a refresh cycle; does not touch the pending slot
/// (the running cycle clears it itself).
async fn force_logout(inner: &AuthorityInner) {
    inner.epoch.fetch_add(1, Ordering::SeqCst);
    inner.session.write().await.take();
    if let Err(e) = store::clear_session(inner.store.as_ref()).await {
        error!(error = %e, "Failed to clear credential store on forced logout");
    }
    let _ = inner.session_tx.send_replace(false);
}
