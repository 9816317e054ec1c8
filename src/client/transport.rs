//! Transport seam between the licensing core and the remote authority.
//!
//! The core builds [`ApiRequest`]s and interprets [`ApiResponse`]s; how bytes
//! cross the network is up to the [`Transport`] implementation.
//! [`HttpTransport`](crate::client::http::HttpTransport) is the default.

use crate::TollgateError;
use std::fmt;

/// HTTP method used by the licensing API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    /// GET
    Get,
    /// POST
    Post,
    /// DELETE
    Delete,
}

impl Method {
    /// Lowercase method name, as it appears in the signing string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "get",
            Method::Post => "post",
            Method::Delete => "delete",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Credential attached to a request.
#[derive(Clone, PartialEq, Eq)]
pub enum Auth {
    /// No credential.
    None,
    /// `Authorization: Bearer <token>`
    Bearer(String),
    /// `Authorization: License <key>`
    LicenseKey(String),
}

impl Auth {
    /// Value for the `Authorization` header.
    pub fn header_value(&self) -> Option<String> {
        match self {
            Auth::None => None,
            Auth::Bearer(token) => Some(format!("Bearer {}", token)),
            Auth::LicenseKey(key) => Some(format!("License {}", key)),
        }
    }
}

impl fmt::Debug for Auth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Auth::None => f.write_str("None"),
            Auth::Bearer(_) => f.write_str("Bearer(..)"),
            Auth::LicenseKey(_) => f.write_str("LicenseKey(..)"),
        }
    }
}

/// A request to the licensing API.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    /// HTTP method.
    pub method: Method,
    /// Absolute path including query string, e.g. `/v1/accounts/acme/machines`.
    pub path: String,
    /// JSON body, if any.
    pub body: Option<serde_json::Value>,
    /// Credential.
    pub auth: Auth,
    /// Ask for a JSON document instead of a redirect (`Prefer: no-redirect`).
    pub no_redirect: bool,
}

impl ApiRequest {
    /// Build a request without body or credential.
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            body: None,
            auth: Auth::None,
            no_redirect: false,
        }
    }

    /// Attach a JSON body.
    pub fn with_body(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Attach a credential.
    pub fn with_auth(mut self, auth: Auth) -> Self {
        self.auth = auth;
        self
    }

    /// Request a JSON document rather than a redirect.
    pub fn without_redirect(mut self) -> Self {
        self.no_redirect = true;
        self
    }
}

/// HTTP response with the headers needed for signature verification.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    /// HTTP status code.
    pub status: u16,

    /// Date header value.
    pub date: Option<String>,

    /// Keygen-Signature header value.
    pub signature: Option<String>,

    /// Digest header value.
    pub digest: Option<String>,

    /// Raw response body.
    pub body: Vec<u8>,

    /// Method of the originating request (for signing string reconstruction).
    pub method: Method,

    /// Request path including query (for signing string reconstruction).
    pub request_path: String,

    /// Host used (for signing string reconstruction).
    pub host: String,
}

impl ApiResponse {
    /// Get the body as a UTF-8 string.
    pub fn body_str(&self) -> Result<&str, TollgateError> {
        std::str::from_utf8(&self.body)
            .map_err(|e| TollgateError::Protocol(format!("Invalid UTF-8 in body: {}", e)))
    }

    /// Whether the status is 2xx.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Carries requests to the remote authority.
pub trait Transport: Send + Sync {
    /// Perform one API request. Failures to reach the server are
    /// `NetworkError`; any HTTP status is returned as a response.
    fn send(&self, request: &ApiRequest) -> Result<ApiResponse, TollgateError>;

    /// Fetch a release artifact. Failures are `DownloadFailed`.
    fn download(&self, url: &str) -> Result<Vec<u8>, TollgateError>;
}
