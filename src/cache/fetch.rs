//! Fetch primitives shared by the shell cache controller and its
//! network backends.

use std::time::Duration;

use thiserror::Error;

/// Transport-level failure: the network was unreachable or the request
/// never completed. HTTP error statuses are not transport failures and
/// come back as ordinary `FetchResponse`s.
#[derive(Debug, Error)]
#[error("network unreachable: {0}")]
pub struct NetworkError(pub String);

/// How a request reached the controller: a top-level document load
/// (an SPA route change) or a sub-resource fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchMode {
    Navigate,
    SubResource,
}

#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub method: String,
    pub url: String,
    pub mode: FetchMode,
}

impl FetchRequest {
    /// A plain sub-resource GET
    pub fn get(url: &str) -> Self {
        Self {
            method: "GET".to_string(),
            url: url.to_string(),
            mode: FetchMode::SubResource,
        }
    }

    /// A top-level document load
    pub fn navigate(url: &str) -> Self {
        Self {
            method: "GET".to_string(),
            url: url.to_string(),
            mode: FetchMode::Navigate,
        }
    }

    pub fn is_get(&self) -> bool {
        self.method.eq_ignore_ascii_case("GET")
    }

    /// Only http/https traffic is ever intercepted; extension
    /// pseudo-schemes and the like pass straight through.
    pub fn is_http(&self) -> bool {
        self.url.starts_with("http://") || self.url.starts_with("https://")
    }

    /// URL path without query string or fragment, for extension-based
    /// fallback matching.
    pub fn path(&self) -> &str {
        let rest = match self.url.find("://") {
            Some(i) => &self.url[i + 3..],
            None => self.url.as_str(),
        };
        let path = match rest.find('/') {
            Some(i) => &rest[i..],
            None => "/",
        };
        let end = path.find(['?', '#']).unwrap_or(path.len());
        &path[..end]
    }
}

/// A snapshot of a fetched response, as stored in and served from the
/// shell cache.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

impl FetchResponse {
    pub fn is_ok(&self) -> bool {
        self.status == 200
    }

    /// The terminal fallback: a synthetic 404 with a plain-text body.
    /// Never fails, never panics.
    pub fn not_found(message: &str) -> Self {
        Self {
            status: 404,
            content_type: Some("text/plain".to_string()),
            body: message.as_bytes().to_vec(),
        }
    }
}

/// Abstraction over the network so the controller's routing and
/// lifecycle can be exercised against a scripted fake.
pub trait Network {
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchResponse, NetworkError>;
}

// ============================================================================
// Real network backend
// ============================================================================

/// Shell asset request timeout in seconds.
/// Shorter than the backend API timeout: a slow shell fetch should fail
/// over to the cache quickly instead of stalling a page load.
const SHELL_TIMEOUT_SECS: u64 = 15;

/// `Network` implementation backed by a real HTTP client.
#[derive(Clone)]
pub struct HttpNetwork {
    client: reqwest::Client,
}

impl HttpNetwork {
    pub fn new() -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(SHELL_TIMEOUT_SECS))
            .build()?;
        Ok(Self { client })
    }
}

impl Network for HttpNetwork {
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchResponse, NetworkError> {
        let method = reqwest::Method::from_bytes(request.method.as_bytes())
            .map_err(|e| NetworkError(e.to_string()))?;

        let response = self
            .client
            .request(method, &request.url)
            .send()
            .await
            .map_err(|e| NetworkError(e.to_string()))?;

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(String::from);
        let body = response
            .bytes()
            .await
            .map_err(|e| NetworkError(e.to_string()))?
            .to_vec();

        Ok(FetchResponse {
            status,
            content_type,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_path() {
        assert_eq!(FetchRequest::get("https://spese.example/").path(), "/");
        assert_eq!(FetchRequest::get("https://spese.example").path(), "/");
        assert_eq!(
            FetchRequest::get("https://spese.example/assets/index-ab12.js?v=3").path(),
            "/assets/index-ab12.js"
        );
        assert_eq!(
            FetchRequest::get("https://spese.example/trips/5#dettagli").path(),
            "/trips/5"
        );
    }

    #[test]
    fn test_scheme_detection() {
        assert!(FetchRequest::get("http://spese.example/").is_http());
        assert!(FetchRequest::get("https://spese.example/").is_http());
        assert!(!FetchRequest::get("chrome-extension://abcdef/x.js").is_http());
    }

    #[test]
    fn test_not_found_is_plain_text() {
        let response = FetchResponse::not_found("offline");
        assert_eq!(response.status, 404);
        assert_eq!(response.content_type.as_deref(), Some("text/plain"));
        assert_eq!(response.body, b"offline");
    }
}
