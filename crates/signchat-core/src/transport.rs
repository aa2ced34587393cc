//! HTTP request/response collaborator
//!
//! The channel client only needs a function from request to response body.
//! `HttpTransport` is that seam; `ReqwestTransport` is the real implementation
//! and tests substitute their own.

use async_trait::async_trait;
use thiserror::Error;

/// Transport failures. Distinct from protocol errors so callers can retry
/// against a different server.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("failed to read response body: {0}")]
    Body(String),

    #[error("http client unavailable: {0}")]
    ClientUnavailable(String),
}

/// Request method
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Get => write!(f, "GET"),
            Self::Post => write!(f, "POST"),
        }
    }
}

/// An outgoing HTTP request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    /// JSON body (POST only)
    pub body: Option<String>,
    /// Shared secret for the server, sent as a request header
    pub password: Option<String>,
}

impl HttpRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            url: url.into(),
            body: None,
            password: None,
        }
    }

    pub fn post(url: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            method: Method::Post,
            url: url.into(),
            body: Some(body.into()),
            password: None,
        }
    }

    pub fn with_password(mut self, password: Option<&str>) -> Self {
        self.password = password.map(str::to_string);
        self
    }
}

/// Executes HTTP requests and returns the response body
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Send `request` and return the full response body.
    ///
    /// Any response that arrives is returned, whatever its status.
    async fn execute(&self, request: HttpRequest) -> Result<String, TransportError>;
}

/// Value of the `Authorization` header carrying the shared secret
pub fn authorization_value(password: &str) -> String {
    use base64::Engine;
    base64::engine::general_purpose::STANDARD.encode(password.as_bytes())
}

#[cfg(feature = "http-client")]
pub use reqwest_transport::ReqwestTransport;

#[cfg(feature = "http-client")]
mod reqwest_transport {
    use std::time::Duration;

    use async_trait::async_trait;
    use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};

    use super::{authorization_value, HttpRequest, HttpTransport, Method, TransportError};

    /// `reqwest` backed transport
    #[derive(Clone)]
    pub struct ReqwestTransport {
        client: reqwest::Client,
    }

    impl ReqwestTransport {
        pub fn new() -> Result<Self, TransportError> {
            Self::build(reqwest::Client::builder())
        }

        /// Transport with a per-request timeout
        pub fn with_timeout(timeout: Duration) -> Result<Self, TransportError> {
            Self::build(reqwest::Client::builder().timeout(timeout))
        }

        fn build(builder: reqwest::ClientBuilder) -> Result<Self, TransportError> {
            let client = builder
                .use_rustls_tls()
                .build()
                .map_err(|e| TransportError::ClientUnavailable(e.to_string()))?;
            Ok(Self { client })
        }
    }

    fn map_error(e: reqwest::Error) -> TransportError {
        if e.is_timeout() {
            TransportError::Timeout(e.to_string())
        } else {
            TransportError::ConnectionFailed(e.to_string())
        }
    }

    #[async_trait]
    impl HttpTransport for ReqwestTransport {
        async fn execute(&self, request: HttpRequest) -> Result<String, TransportError> {
            tracing::debug!(method = %request.method, url = %request.url, "Sending request");

            let mut builder = match request.method {
                Method::Get => self.client.get(&request.url),
                Method::Post => self
                    .client
                    .post(&request.url)
                    .header(CONTENT_TYPE, "application/json")
                    .body(request.body.unwrap_or_default()),
            };
            builder = builder.header(ACCEPT, "application/json");

            if let Some(password) = request.password.as_deref() {
                builder = builder.header(AUTHORIZATION, authorization_value(password));
            }

            let resp = builder.send().await.map_err(map_error)?;
            let status = resp.status();
            if !status.is_success() {
                tracing::debug!(%status, "Server returned non-success status");
            }

            resp.text().await.map_err(|e| TransportError::Body(e.to_string()))
        }
    }
}
