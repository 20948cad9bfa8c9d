use tokio::sync::watch;

use crate::auth::authority::TokenAuthority;

/// Read-only capability check for the presentation layer.
///
/// Navigation guards and page components ask one question, "is the caller
/// authenticated", and subscribe to changes; they never touch tokens
/// directly.
#[derive(Clone)]
pub struct SessionGuard {
    authority: TokenAuthority,
}

impl SessionGuard {
    /// Create a guard over an authority
    pub fn new(authority: TokenAuthority) -> Self {
        Self { authority }
    }

    /// Whether a session is currently active
    pub async fn is_authenticated(&self) -> bool {
        self.authority.is_authenticated().await
    }

    /// Receiver that observes session presence changes
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.authority.subscribe()
    }
}
