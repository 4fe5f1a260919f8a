//! # HTTP Transport
//!
//! Authenticated request/response exchange with the GeoServer REST API.
//!
//! ## Request Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        One REST exchange                                │
//! │                                                                         │
//! │  RestRequest { method, url, headers, body }                            │
//! │        │                                                                │
//! │        ▼                                                                │
//! │  RestClient::send ──► HttpTransport (reqwest)                          │
//! │        │                 • basic auth from Credentials                  │
//! │        │                 • request timeout                              │
//! │        │                 • Content-Type from body unless overridden     │
//! │        ▼                                                                │
//! │  Ok(RestResponse { status, body })   any status, 2xx or not            │
//! │  Err(ConnectivityError)              exchange did not complete         │
//! │                                                                         │
//! │  Status interpretation is the catalog's job, not the transport's.      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The [`RestClient`] trait is the seam used by tests: an in-memory server
//! implements it and records every request.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::time::Duration;
use tracing::debug;

use crate::error::{ConnectivityError, PublishError, PublishResult};

pub const CONTENT_TYPE_JSON: &str = "application/json";
pub const CONTENT_TYPE_XML: &str = "text/xml";
pub const CONTENT_TYPE_ZIP: &str = "application/zip";
pub const CONTENT_TYPE_OCTET_STREAM: &str = "application/octet-stream";

// =============================================================================
// Request
// =============================================================================

/// HTTP verbs used against the REST API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Method::Get => write!(f, "GET"),
            Method::Post => write!(f, "POST"),
            Method::Put => write!(f, "PUT"),
            Method::Delete => write!(f, "DELETE"),
        }
    }
}

impl From<Method> for reqwest::Method {
    fn from(method: Method) -> Self {
        match method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Delete => reqwest::Method::DELETE,
        }
    }
}

/// Request payload.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Empty,
    Bytes { data: Vec<u8>, content_type: String },
    Text { text: String, content_type: String },
    Json(Value),
    /// Single file upload; the file name doubles as the form field name.
    Multipart { file_name: String, data: Vec<u8> },
}

impl RequestBody {
    /// Serializes `value` into a JSON body.
    pub fn json<T: Serialize>(value: &T) -> PublishResult<Self> {
        Ok(RequestBody::Json(serde_json::to_value(value)?))
    }

    pub fn bytes(data: Vec<u8>, content_type: impl Into<String>) -> Self {
        RequestBody::Bytes {
            data,
            content_type: content_type.into(),
        }
    }

    pub fn text(text: impl Into<String>, content_type: impl Into<String>) -> Self {
        RequestBody::Text {
            text: text.into(),
            content_type: content_type.into(),
        }
    }

    /// Content type implied by the body kind.
    pub fn default_content_type(&self) -> Option<&str> {
        match self {
            RequestBody::Empty | RequestBody::Multipart { .. } => None,
            RequestBody::Bytes { content_type, .. } | RequestBody::Text { content_type, .. } => {
                Some(content_type)
            }
            RequestBody::Json(_) => Some(CONTENT_TYPE_JSON),
        }
    }
}

/// One REST request.
#[derive(Debug, Clone, PartialEq)]
pub struct RestRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: RequestBody,
}

impl RestRequest {
    pub fn new(method: Method, url: impl Into<String>, body: RequestBody) -> Self {
        RestRequest {
            method,
            url: url.into(),
            headers: Vec::new(),
            body,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::Get, url, RequestBody::Empty)
    }

    pub fn delete(url: impl Into<String>) -> Self {
        Self::new(Method::Delete, url, RequestBody::Empty)
    }

    pub fn post(url: impl Into<String>, body: RequestBody) -> Self {
        Self::new(Method::Post, url, body)
    }

    pub fn put(url: impl Into<String>, body: RequestBody) -> Self {
        Self::new(Method::Put, url, body)
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Effective content type: an explicit header wins over the body default.
    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
            .or_else(|| self.body.default_content_type())
    }
}

// =============================================================================
// Response
// =============================================================================

/// A completed exchange, whatever its status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl RestResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        RestResponse {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn json<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        serde_json::from_slice(&self.body)
    }
}

// =============================================================================
// Client Trait
// =============================================================================

/// Sends requests to the server.
#[async_trait]
pub trait RestClient: Send + Sync {
    async fn send(&self, request: RestRequest) -> Result<RestResponse, ConnectivityError>;
}

// =============================================================================
// HTTP Implementation
// =============================================================================

/// Basic-auth credentials.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Credentials {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// Configuration for the HTTP transport.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Whole-request timeout.
    pub timeout: Duration,

    /// `User-Agent` header value.
    pub user_agent: String,
}

impl Default for TransportConfig {
    fn default() -> Self {
        TransportConfig {
            timeout: Duration::from_secs(60),
            user_agent: format!("geobridge/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// reqwest-backed [`RestClient`].
pub struct HttpTransport {
    client: reqwest::Client,
    credentials: Option<Credentials>,
}

impl HttpTransport {
    pub fn new(config: &TransportConfig, credentials: Option<Credentials>) -> PublishResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.as_str())
            .build()
            .map_err(|e| PublishError::InvalidConfig(format!("HTTP client: {}", e)))?;
        Ok(HttpTransport {
            client,
            credentials,
        })
    }

    fn connectivity(url: &str, err: reqwest::Error) -> ConnectivityError {
        ConnectivityError {
            url: url.to_string(),
            reason: err.to_string(),
        }
    }
}

#[async_trait]
impl RestClient for HttpTransport {
    async fn send(&self, request: RestRequest) -> Result<RestResponse, ConnectivityError> {
        debug!(method = %request.method, url = %request.url, "Sending request");

        let mut builder = self
            .client
            .request(request.method.into(), request.url.as_str());

        if let Some(credentials) = &self.credentials {
            builder = builder.basic_auth(&credentials.username, Some(&credentials.password));
        }
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if request.header("content-type").is_none() {
            if let Some(content_type) = request.body.default_content_type() {
                builder = builder.header(reqwest::header::CONTENT_TYPE, content_type);
            }
        }

        builder = match request.body {
            RequestBody::Empty => builder,
            RequestBody::Bytes { data, .. } => builder.body(data),
            RequestBody::Text { text, .. } => builder.body(text),
            RequestBody::Json(value) => builder.body(value.to_string()),
            RequestBody::Multipart { file_name, data } => {
                let part = reqwest::multipart::Part::bytes(data).file_name(file_name.clone());
                builder.multipart(reqwest::multipart::Form::new().part(file_name, part))
            }
        };

        let response = builder
            .send()
            .await
            .map_err(|e| Self::connectivity(&request.url, e))?;
        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|e| Self::connectivity(&request.url, e))?;

        debug!(url = %request.url, status, "Response received");
        Ok(RestResponse::new(status, body.to_vec()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_json_body_defaults_content_type() {
        let request = RestRequest::post(
            "http://geo.test/geoserver/rest/workspaces",
            RequestBody::json(&json!({"workspace": {"name": "ws"}})).unwrap(),
        );
        assert_eq!(request.content_type(), Some(CONTENT_TYPE_JSON));

        let overridden = request.with_header("Content-Type", "text/plain");
        assert_eq!(overridden.content_type(), Some("text/plain"));
    }

    #[test]
    fn test_body_content_types() {
        assert_eq!(RequestBody::Empty.default_content_type(), None);
        assert_eq!(
            RequestBody::bytes(vec![1], CONTENT_TYPE_ZIP).default_content_type(),
            Some(CONTENT_TYPE_ZIP)
        );
        assert_eq!(
            RequestBody::text("<x/>", CONTENT_TYPE_XML).default_content_type(),
            Some(CONTENT_TYPE_XML)
        );
        let multipart = RequestBody::Multipart {
            file_name: "roads.zip".into(),
            data: vec![],
        };
        assert_eq!(multipart.default_content_type(), None);
    }

    #[test]
    fn test_response_helpers() {
        let ok = RestResponse::new(201, br#"{"import": {"id": 4}}"#.to_vec());
        assert!(ok.is_success());
        let value: Value = ok.json().unwrap();
        assert_eq!(value["import"]["id"], 4);

        let missing = RestResponse::new(404, "No such layer");
        assert!(!missing.is_success());
        assert_eq!(missing.text(), "No such layer");
    }

    #[test]
    fn test_credentials_debug_hides_password() {
        let creds = Credentials::new("admin", "geoserver");
        assert!(!format!("{:?}", creds).contains("geoserver"));
    }

    #[tokio::test]
    async fn test_unreachable_server_is_connectivity_error() {
        let transport = HttpTransport::new(
            &TransportConfig {
                timeout: Duration::from_secs(2),
                ..Default::default()
            },
            None,
        )
        .unwrap();
        // Port 9 (discard) on localhost is closed in test environments
        let result = transport
            .send(RestRequest::get("http://127.0.0.1:9/geoserver/rest/about/version"))
            .await;
        let err = result.unwrap_err();
        assert_eq!(err.url, "http://127.0.0.1:9/geoserver/rest/about/version");
    }
}
