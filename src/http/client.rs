use std::collections::HashMap;

use crate::error::{Error, Result};

/// HTTP method enum covering the endpoints this client consumes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Patch,
}

impl Method {
    /// Method name for logging
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Patch => "PATCH",
        }
    }
}

/// A single part of a multipart form
#[derive(Debug, Clone)]
pub enum PartData {
    /// Plain text field
    Text(String),
    /// File field with raw bytes
    File {
        bytes: Vec<u8>,
        filename: String,
        mime: String,
    },
}

/// Owned multipart form, converted to a transport form only inside the
/// concrete client. Owning the parts keeps request bodies reusable for
/// the single retry dispatch.
#[derive(Debug, Clone, Default)]
pub struct MultipartForm {
    parts: Vec<(String, PartData)>,
}

impl MultipartForm {
    /// Create an empty form
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a text field
    pub fn text(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.parts.push((name.into(), PartData::Text(value.into())));
        self
    }

    /// Add a file field
    pub fn file(
        mut self,
        name: impl Into<String>,
        bytes: Vec<u8>,
        filename: impl Into<String>,
        mime: impl Into<String>,
    ) -> Self {
        self.parts.push((
            name.into(),
            PartData::File {
                bytes,
                filename: filename.into(),
                mime: mime.into(),
            },
        ));
        self
    }

    /// Iterate over the parts
    pub fn parts(&self) -> impl Iterator<Item = &(String, PartData)> {
        self.parts.iter()
    }
}

/// Request body variants
#[derive(Debug, Clone)]
pub enum Body {
    Empty,
    Json(serde_json::Value),
    Multipart(MultipartForm),
}

/// Owned response holding status, body, and headers
#[derive(Debug, Clone)]
pub struct ApiResponse {
    status_code: u16,
    body: String,
    headers: HashMap<String, String>,
}

impl ApiResponse {
    /// Create a new response
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status_code: status,
            body: body.into(),
            headers: HashMap::new(),
        }
    }

    /// Add a header
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// Get the status code
    pub fn status(&self) -> u16 {
        self.status_code
    }

    /// Get a reference to the response body
    pub fn body(&self) -> &str {
        &self.body
    }

    /// Parse body as JSON
    pub fn json<T: serde::de::DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_str(&self.body)
            .map_err(|e| Error::api(self.status_code, format!("invalid response body: {}", e)))
    }

    /// Check if successful (2xx status)
    pub fn is_success(&self) -> bool {
        self.status_code >= 200 && self.status_code < 300
    }

    /// Check if the credential was rejected
    pub fn is_unauthorized(&self) -> bool {
        self.status_code == 401
    }

    /// Best-effort extraction of the server's error message from a JSON
    /// body shaped like `{"error": "..."}`, falling back to the raw body.
    pub fn error_message(&self) -> String {
        serde_json::from_str::<serde_json::Value>(&self.body)
            .ok()
            .and_then(|v| {
                v.get("error")
                    .or_else(|| v.get("message"))
                    .and_then(|m| m.as_str())
                    .map(|s| s.to_string())
            })
            .unwrap_or_else(|| self.body.clone())
    }
}

/// Trait for HTTP transport operations, allowing for mocking
#[async_trait::async_trait]
pub trait HttpClient: Send + Sync {
    /// Dispatch a request and return the owned response. Transport
    /// failures map to [`Error::Network`]; any received status, including
    /// errors, comes back as an `ApiResponse`.
    async fn request(
        &self,
        method: Method,
        url: &str,
        headers: &HashMap<String, String>,
        body: &Body,
    ) -> Result<ApiResponse>;
}

/// Implementation of HttpClient using reqwest
pub struct ReqwestHttpClient {
    client: reqwest::Client,
}

impl ReqwestHttpClient {
    /// Create a new ReqwestHttpClient
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    /// Create a new client with custom configuration
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    fn build_multipart(form: &MultipartForm) -> Result<reqwest::multipart::Form> {
        let mut out = reqwest::multipart::Form::new();
        for (name, data) in form.parts() {
            match data {
                PartData::Text(value) => {
                    out = out.text(name.clone(), value.clone());
                }
                PartData::File {
                    bytes,
                    filename,
                    mime,
                } => {
                    let part = reqwest::multipart::Part::bytes(bytes.clone())
                        .file_name(filename.clone())
                        .mime_str(mime)
                        .map_err(|e| Error::network(format!("invalid mime type: {}", e)))?;
                    out = out.part(name.clone(), part);
                }
            }
        }
        Ok(out)
    }
}

impl Default for ReqwestHttpClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl HttpClient for ReqwestHttpClient {
    async fn request(
        &self,
        method: Method,
        url: &str,
        headers: &HashMap<String, String>,
        body: &Body,
    ) -> Result<ApiResponse> {
        let mut request = match method {
            Method::Get => self.client.get(url),
            Method::Post => self.client.post(url),
            Method::Patch => self.client.patch(url),
        };

        for (key, value) in headers {
            request = request.header(key, value);
        }

        request = match body {
            Body::Empty => request,
            Body::Json(value) => request.json(value),
            Body::Multipart(form) => request.multipart(Self::build_multipart(form)?),
        };

        let response = request.send().await?;

        let status = response.status().as_u16();
        let body = response.text().await?;

        Ok(ApiResponse::new(status, body))
    }
}

/// Mock implementation of HttpClient for testing
#[cfg(test)]
pub mod mock {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    /// A mock HTTP client that plays back scripted responses per URL.
    ///
    /// Responses for a URL are consumed in order; the last one is repeated
    /// once the script runs out. An optional delay per URL keeps the
    /// request pending long enough for concurrency tests to overlap calls.
    #[derive(Clone, Default)]
    pub struct MockHttpClient {
        responses: Arc<Mutex<HashMap<String, VecDeque<ApiResponse>>>>,
        delays: Arc<Mutex<HashMap<String, Duration>>>,
        requests: Arc<Mutex<Vec<RecordedRequest>>>,
    }

    /// A request observed by the mock
    #[derive(Debug, Clone)]
    pub struct RecordedRequest {
        pub method: Method,
        pub url: String,
        pub headers: HashMap<String, String>,
        pub body: String,
    }

    impl MockHttpClient {
        /// Create a new mock client
        pub fn new() -> Self {
            Self::default()
        }

        /// Queue a response for a URL
        pub fn enqueue(&self, url: impl Into<String>, status: u16, body: impl Into<String>) {
            self.responses
                .lock()
                .unwrap()
                .entry(url.into())
                .or_default()
                .push_back(ApiResponse::new(status, body));
        }

        /// Queue a JSON response for a URL
        pub fn enqueue_json<T: serde::Serialize>(
            &self,
            url: impl Into<String>,
            status: u16,
            data: &T,
        ) {
            let body = serde_json::to_string(data).unwrap();
            self.responses
                .lock()
                .unwrap()
                .entry(url.into())
                .or_default()
                .push_back(
                    ApiResponse::new(status, body).with_header("content-type", "application/json"),
                );
        }

        /// Delay every response for a URL, so concurrent callers overlap
        pub fn set_delay(&self, url: impl Into<String>, delay: Duration) {
            self.delays.lock().unwrap().insert(url.into(), delay);
        }

        /// All recorded requests
        pub fn requests(&self) -> Vec<RecordedRequest> {
            self.requests.lock().unwrap().clone()
        }

        /// Number of dispatches made to a URL
        pub fn calls_to(&self, url: &str) -> usize {
            self.requests
                .lock()
                .unwrap()
                .iter()
                .filter(|r| r.url == url)
                .count()
        }

        fn record(&self, method: Method, url: &str, headers: &HashMap<String, String>, body: &Body) {
            let body_text = match body {
                Body::Empty => String::new(),
                Body::Json(value) => value.to_string(),
                Body::Multipart(form) => form
                    .parts()
                    .map(|(name, _)| name.as_str())
                    .collect::<Vec<_>>()
                    .join(","),
            };
            self.requests.lock().unwrap().push(RecordedRequest {
                method,
                url: url.to_string(),
                headers: headers.clone(),
                body: body_text,
            });
        }

        fn next_response(&self, url: &str) -> Result<ApiResponse> {
            let mut responses = self.responses.lock().unwrap();
            let queue = responses
                .get_mut(url)
                .ok_or_else(|| Error::network(format!("no mock response for {}", url)))?;
            if queue.len() > 1 {
                Ok(queue.pop_front().unwrap())
            } else {
                queue
                    .front()
                    .cloned()
                    .ok_or_else(|| Error::network(format!("mock script exhausted for {}", url)))
            }
        }
    }

    #[async_trait::async_trait]
    impl HttpClient for MockHttpClient {
        async fn request(
            &self,
            method: Method,
            url: &str,
            headers: &HashMap<String, String>,
            body: &Body,
        ) -> Result<ApiResponse> {
            self.record(method, url, headers, body);

            let delay = self.delays.lock().unwrap().get(url).copied();
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }

            self.next_response(url)
        }
    }
}
