//! HTTP transport seam.
//!
//! The testers never talk to `reqwest` directly; they go through
//! [`HttpTransport`] so requests can be scripted with [`MockTransport`].

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;
use std::time::Duration;

/// HTTP method used by an entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    /// GET
    Get,
    /// POST with form-encoded parameters
    Post,
}

impl std::fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Get => f.write_str("GET"),
            Self::Post => f.write_str("POST"),
        }
    }
}

/// A request ready to be sent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    /// Method
    pub method: HttpMethod,
    /// Fully substituted URL
    pub url: String,
    /// Form parameters (POST only)
    pub form: BTreeMap<String, String>,
}

impl HttpRequest {
    /// Create a GET request
    #[must_use]
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: HttpMethod::Get,
            url: url.into(),
            form: BTreeMap::new(),
        }
    }

    /// Create a POST request
    #[must_use]
    pub fn post(url: impl Into<String>, form: BTreeMap<String, String>) -> Self {
        Self {
            method: HttpMethod::Post,
            url: url.into(),
            form,
        }
    }
}

/// A received response, whatever its status
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    /// Status code
    pub status: u16,
    /// Body as text
    pub body: String,
}

impl HttpResponse {
    /// Create a response
    #[must_use]
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// 2xx status
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }
}

/// The request never produced a response (DNS, connect, TLS, timeout)
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct TransportError {
    /// Underlying error text
    pub message: String,
}

impl TransportError {
    /// Create a transport error
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Sends HTTP requests on behalf of the testers
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Send a request; non-2xx statuses are responses, not errors
    async fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError>;
}

/// `reqwest`-backed transport
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Build a transport with a request timeout and TLS policy
    ///
    /// # Errors
    ///
    /// Returns an error if the TLS backend cannot be initialised
    pub fn new(timeout: Duration, accept_invalid_certs: bool) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .danger_accept_invalid_certs(accept_invalid_certs)
            .build()
            .map_err(|e| TransportError::new(e.to_string()))?;
        Ok(Self { client })
    }

    /// Wrap an existing client
    #[must_use]
    pub const fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        let builder = match request.method {
            HttpMethod::Get => self.client.get(&request.url),
            HttpMethod::Post => self.client.post(&request.url).form(&request.form),
        };
        let resp = builder
            .send()
            .await
            .map_err(|e| TransportError::new(e.to_string()))?;
        let status = resp.status().as_u16();
        let body = resp
            .text()
            .await
            .map_err(|e| TransportError::new(e.to_string()))?;
        Ok(HttpResponse { status, body })
    }
}

/// Scripted transport for tests
#[derive(Debug, Default)]
pub struct MockTransport {
    routes: HashMap<(HttpMethod, String), Result<HttpResponse, TransportError>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl MockTransport {
    /// Create a transport with no routes; unknown URLs answer 404
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer GET `url` with a response
    #[must_use]
    pub fn with_get(mut self, url: impl Into<String>, response: HttpResponse) -> Self {
        self.routes.insert((HttpMethod::Get, url.into()), Ok(response));
        self
    }

    /// Answer POST `url` with a response
    #[must_use]
    pub fn with_post(mut self, url: impl Into<String>, response: HttpResponse) -> Self {
        self.routes.insert((HttpMethod::Post, url.into()), Ok(response));
        self
    }

    /// Fail GET `url` at the transport level
    #[must_use]
    pub fn with_transport_error(mut self, url: impl Into<String>, message: impl Into<String>) -> Self {
        self.routes
            .insert((HttpMethod::Get, url.into()), Err(TransportError::new(message)));
        self
    }

    /// Requests sent so far, in order
    #[must_use]
    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl HttpTransport for MockTransport {
    async fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        if let Ok(mut log) = self.requests.lock() {
            log.push(request.clone());
        }
        self.routes
            .get(&(request.method, request.url.clone()))
            .cloned()
            .unwrap_or_else(|| Ok(HttpResponse::new(404, "Not Found")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_range() {
        assert!(HttpResponse::new(200, "").is_success());
        assert!(HttpResponse::new(204, "").is_success());
        assert!(!HttpResponse::new(301, "").is_success());
        assert!(!HttpResponse::new(404, "").is_success());
    }

    #[test]
    fn test_method_display() {
        assert_eq!(HttpMethod::Get.to_string(), "GET");
        assert_eq!(HttpMethod::Post.to_string(), "POST");
    }

    #[tokio::test]
    async fn test_mock_routes_and_log() {
        let transport = MockTransport::new()
            .with_get("http://a/", HttpResponse::new(200, "home"))
            .with_transport_error("http://down/", "connection refused");

        let ok = transport.send(&HttpRequest::get("http://a/")).await.unwrap();
        assert_eq!(ok.body, "home");

        let missing = transport.send(&HttpRequest::get("http://a/nope")).await.unwrap();
        assert_eq!(missing.status, 404);

        let err = transport.send(&HttpRequest::get("http://down/")).await.unwrap_err();
        assert_eq!(err.to_string(), "connection refused");

        let post = transport
            .send(&HttpRequest::post("http://a/", BTreeMap::new()))
            .await
            .unwrap();
        assert_eq!(post.status, 404);

        assert_eq!(transport.requests().len(), 4);
    }

    #[test]
    fn test_reqwest_transport_builds() {
        assert!(ReqwestTransport::new(Duration::from_secs(5), true).is_ok());
    }

    #[tokio::test]
    async fn test_wrapped_client_reports_connection_errors() {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(2))
            .build()
            .unwrap();
        let transport = ReqwestTransport::with_client(client);
        let err = transport
            .send(&HttpRequest::get("http://127.0.0.1:1/"))
            .await
            .unwrap_err();
        assert!(!err.message.is_empty());
    }
}
