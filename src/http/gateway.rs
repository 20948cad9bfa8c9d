use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, warn};
use uuid::Uuid;

use crate::auth::authority::TokenAuthority;
use crate::error::{Error, Result};
use crate::http::client::{ApiResponse, Body, HttpClient, Method, MultipartForm};

/// An outbound API request. The retry marker lives on the request itself
/// so it can never leak to a different request.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    /// Path under the API base URL, e.g. `/api/bets/upload`
    pub path: String,
    pub headers: HashMap<String, String>,
    pub body: Body,
    retried: bool,
}

impl ApiRequest {
    fn new(method: Method, path: impl Into<String>, body: Body) -> Self {
        Self {
            method,
            path: path.into(),
            headers: HashMap::new(),
            body,
            retried: false,
        }
    }

    /// GET request with an empty body
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::Get, path, Body::Empty)
    }

    /// POST request with a JSON body
    pub fn post_json(path: impl Into<String>, body: serde_json::Value) -> Self {
        Self::new(Method::Post, path, Body::Json(body))
    }

    /// POST request with a multipart body
    pub fn post_multipart(path: impl Into<String>, form: MultipartForm) -> Self {
        Self::new(Method::Post, path, Body::Multipart(form))
    }

    /// PATCH request with a JSON body
    pub fn patch_json(path: impl Into<String>, body: serde_json::Value) -> Self {
        Self::new(Method::Patch, path, Body::Json(body))
    }

    /// Whether this request has already used its one retry
    pub fn is_retried(&self) -> bool {
        self.retried
    }

    #[cfg(test)]
    pub(crate) fn with_retried_marker(mut self) -> Self {
        self.retried = true;
        self
    }
}

/// Uniform request dispatch with transparent re-authentication.
///
/// Every outbound call gets the current bearer header attached. An
/// unauthorized response triggers the token authority's single-flight
/// refresh, and the request is dispatched once more with the new
/// credential; a request never retries more than once.
#[derive(Clone)]
pub struct HttpGateway {
    client: Arc<dyn HttpClient>,
    authority: TokenAuthority,
    api_url: String,
}

impl HttpGateway {
    /// Create a gateway over a transport and an authority
    pub fn new(
        api_url: impl Into<String>,
        client: Arc<dyn HttpClient>,
        authority: TokenAuthority,
    ) -> Self {
        Self {
            client,
            authority,
            api_url: api_url.into(),
        }
    }

    /// The authority this gateway authenticates with
    pub fn authority(&self) -> &TokenAuthority {
        &self.authority
    }

    /// Dispatch a request, refreshing and retrying once on an unauthorized
    /// response.
    ///
    /// Outcomes:
    /// - any status except a credential-rejecting 401 comes back as
    ///   `Ok(ApiResponse)`, including server errors (pass-through, not
    ///   retried) and 401s on calls that carried no credential
    /// - a 401 that refresh could not recover is [`Error::AuthExpired`]
    /// - a failed refresh is [`Error::SessionTerminated`]; the session and
    ///   credential store have already been cleared
    /// - transport failures are [`Error::Network`]
    pub async fn send(&self, mut request: ApiRequest) -> Result<ApiResponse> {
        let url = format!("{}{}", self.api_url, request.path);
        let request_id = Uuid::new_v4();

        loop {
            let mut headers = request.headers.clone();
            let credential_attached = match self.authority.current_auth_header().await {
                Some(header) => {
                    headers.insert("Authorization".to_string(), header);
                    true
                }
                None => false,
            };

            debug!(
                request_id = %request_id,
                method = request.method.as_str(),
                path = %request.path,
                retried = request.retried,
                "Dispatching API request"
            );

            let response = self
                .client
                .request(request.method, &url, &headers, &request.body)
                .await?;

            // Only a rejected credential enters the refresh protocol; a 401
            // on an unauthenticated call (bad login, say) is the caller's
            // to interpret.
            if !response.is_unauthorized() || !credential_attached {
                return Ok(response);
            }

            if request.retried {
                warn!(
                    request_id = %request_id,
                    path = %request.path,
                    "Request unauthorized after retry, giving up"
                );
                return Err(Error::AuthExpired);
            }
            request.retried = true;

            match self.authority.refresh().await {
                Some(_) => {
                    debug!(
                        request_id = %request_id,
                        path = %request.path,
                        "Credential refreshed, retrying request"
                    );
                    // Loop re-reads the auth header, which now carries the
                    // refreshed access token.
                }
                None => {
                    warn!(
                        request_id = %request_id,
                        path = %request.path,
                        "Refresh failed, session terminated"
                    );
                    return Err(Error::SessionTerminated);
                }
            }
        }
    }
}
