use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identity of the signed-in user, persisted alongside the tokens
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserIdentity {
    /// Server-side user id
    pub id: String,
    /// Display name shown by consumers
    pub username: String,
    /// Email, when the server returned one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// Access/refresh token pair as returned by the auth endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// The active session, owned exclusively by the token authority.
///
/// The credential store holds a mirror of this for restart survival; it is
/// never consulted for authorization decisions after startup.
#[derive(Debug, Clone)]
pub struct Session {
    pub user: UserIdentity,
    pub access_token: String,
    pub refresh_token: String,
    /// Advisory expiry of the access token, when known. Refresh stays
    /// reactive (driven by unauthorized responses), so this is exposed
    /// for consumers but not acted upon.
    pub expiry_hint: Option<DateTime<Utc>>,
}

impl Session {
    /// Create a session from a login/register outcome
    pub fn new(user: UserIdentity, tokens: TokenPair) -> Self {
        Self {
            user,
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
            expiry_hint: None,
        }
    }

    /// The bearer header value proving this session
    pub fn auth_header(&self) -> String {
        format!("Bearer {}", self.access_token)
    }
}
