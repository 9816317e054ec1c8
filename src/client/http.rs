//! Reqwest-based HTTP transport for the licensing API.
//!
//! Captures every header needed for signature verification.

use crate::client::transport::{ApiRequest, ApiResponse, Method, Transport};
use crate::config::TollgateConfig;
use crate::crypto::digest::format_digest_header;
use crate::TollgateError;
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, DATE, USER_AGENT};

const JSON_API: &str = "application/vnd.api+json";

/// Blocking HTTPS transport.
pub struct HttpTransport {
    client: Client,
    base_url: String,
    host: String,
    user_agent: String,
    api_version: String,
}

impl HttpTransport {
    /// Create a transport from config.
    pub fn new(config: &TollgateConfig) -> Result<Self, TollgateError> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| TollgateError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.api_url.trim_end_matches('/').to_string(),
            host: config.api_host().to_string(),
            user_agent: build_user_agent(config),
            api_version: config.api_version.clone(),
        })
    }

    fn builder(&self, method: Method, url: &str) -> RequestBuilder {
        match method {
            Method::Get => self.client.get(url),
            Method::Post => self.client.post(url),
            Method::Delete => self.client.delete(url),
        }
    }

    fn capture(&self, response: Response, request: &ApiRequest) -> Result<ApiResponse, TollgateError> {
        let status = response.status().as_u16();
        let headers = response.headers().clone();

        let header = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(String::from)
        };

        let date = headers
            .get(DATE)
            .and_then(|v| v.to_str().ok())
            .map(String::from);
        let signature = header("Keygen-Signature");
        let digest = header("Digest");

        let body = response
            .bytes()
            .map_err(|e| TollgateError::NetworkError(format!("Failed to read body: {}", e)))?
            .to_vec();

        Ok(ApiResponse {
            status,
            date,
            signature,
            digest,
            body,
            method: request.method,
            request_path: request.path.clone(),
            host: self.host.clone(),
        })
    }
}

impl Transport for HttpTransport {
    fn send(&self, request: &ApiRequest) -> Result<ApiResponse, TollgateError> {
        let url = format!("{}{}", self.base_url, request.path);

        let mut builder = self
            .builder(request.method, &url)
            .header(USER_AGENT, &self.user_agent)
            .header(ACCEPT, JSON_API)
            .header("Keygen-Version", &self.api_version);

        if let Some(auth) = request.auth.header_value() {
            builder = builder.header(AUTHORIZATION, auth);
        }

        if request.no_redirect {
            builder = builder.header("Prefer", "no-redirect");
        }

        if let Some(body) = &request.body {
            let body_bytes = serde_json::to_vec(body)
                .map_err(|e| TollgateError::Protocol(format!("Failed to serialize: {}", e)))?;
            builder = builder
                .header(CONTENT_TYPE, JSON_API)
                .header("Digest", format_digest_header(&body_bytes))
                .body(body_bytes);
        }

        tracing::debug!(method = %request.method, path = %request.path, "sending request");

        let response = builder
            .send()
            .map_err(|e| TollgateError::NetworkError(format!("Request failed: {}", e)))?;

        self.capture(response, request)
    }

    fn download(&self, url: &str) -> Result<Vec<u8>, TollgateError> {
        tracing::debug!(%url, "downloading artifact");

        let response = self
            .client
            .get(url)
            .header(USER_AGENT, &self.user_agent)
            .send()
            .map_err(|e| TollgateError::DownloadFailed(format!("Request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(TollgateError::DownloadFailed(format!(
                "Unexpected status {}",
                response.status()
            )));
        }

        response
            .bytes()
            .map(|b| b.to_vec())
            .map_err(|e| TollgateError::DownloadFailed(format!("Failed to read body: {}", e)))
    }
}

/// Build a User-Agent string from config.
///
/// Format: `tollgate/<version> <app>`
pub fn build_user_agent(config: &TollgateConfig) -> String {
    format!("tollgate/{} {}", env!("CARGO_PKG_VERSION"), config.app_name)
}
