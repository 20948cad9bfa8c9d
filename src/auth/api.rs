use serde::Deserialize;
use tracing::info;

use crate::auth::session::{TokenPair, UserIdentity};
use crate::error::{Error, Result};
use crate::http::gateway::{ApiRequest, HttpGateway};

/// Fields for creating an account
#[derive(Debug, Clone)]
pub struct RegisterPayload {
    pub username: String,
    pub email: String,
    pub password: String,
}

/// Fields for signing in
#[derive(Debug, Clone)]
pub struct LoginPayload {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
struct AuthResponse {
    access_token: String,
    refresh_token: String,
    user: serde_json::Value,
}

/// Create an account. The returned pair is expected to be handed to
/// [`TokenAuthority::login`](crate::auth::authority::TokenAuthority::login).
pub async fn register(
    gateway: &HttpGateway,
    payload: &RegisterPayload,
) -> Result<(UserIdentity, TokenPair)> {
    let body = serde_json::json!({
        "username": payload.username,
        "email": payload.email,
        "password": payload.password,
    });
    let response = gateway
        .send(ApiRequest::post_json("/api/auth/register", body))
        .await?;

    if !response.is_success() {
        return Err(Error::api(response.status(), response.error_message()));
    }

    let parsed: AuthResponse = response.json()?;
    let identity = parse_identity(&parsed.user, response.status())?;
    info!(user_id = %identity.id, "Account registered");

    Ok((
        identity,
        TokenPair {
            access_token: parsed.access_token,
            refresh_token: parsed.refresh_token,
        },
    ))
}

/// Sign in with existing credentials
pub async fn login(
    gateway: &HttpGateway,
    payload: &LoginPayload,
) -> Result<(UserIdentity, TokenPair)> {
    let body = serde_json::json!({
        "username": payload.username,
        "password": payload.password,
    });
    let response = gateway
        .send(ApiRequest::post_json("/api/auth/login", body))
        .await?;

    if !response.is_success() {
        return Err(Error::api(response.status(), response.error_message()));
    }

    let parsed: AuthResponse = response.json()?;
    let identity = parse_identity(&parsed.user, response.status())?;
    info!(user_id = %identity.id, "Signed in");

    Ok((
        identity,
        TokenPair {
            access_token: parsed.access_token,
            refresh_token: parsed.refresh_token,
        },
    ))
}

/// The server serializes user ids as either strings or numbers depending
/// on the route; normalize to a string identity.
fn parse_identity(user: &serde_json::Value, status: u16) -> Result<UserIdentity> {
    let id = match user.get("id") {
        Some(serde_json::Value::String(s)) => s.clone(),
        Some(serde_json::Value::Number(n)) => n.to_string(),
        _ => return Err(Error::api(status, "user payload missing id")),
    };
    let username = user
        .get("username")
        .and_then(|v| v.as_str())
        .ok_or_else(|| Error::api(status, "user payload missing username"))?
        .to_string();
    let email = user
        .get("email")
        .and_then(|v| v.as_str())
        .map(|s| s.to_string());

    Ok(UserIdentity {
        id,
        username,
        email,
    })
}
