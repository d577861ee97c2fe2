//! # contract: interfaces to everything outside the engine
//!
//! This module defines the traits the engine consumes and the plain data that crosses them:
//! - [`CredentialDirectory`]: read-only view of the ambient per-domain session cookies.
//! - [`StoredSessionStore`]: the small key/value area a companion observer may have written a
//!   session into ahead of time.
//! - [`Transport`]: generic HTTPS request/response.
//! - [`Sleeper`]: the delay used between deploy status checks.
//!
//! ## Mocking & Testing
//! - Every trait is annotated for `mockall`, so consumers can generate deterministic mocks for
//!   unit/integration tests (enabled by the `test-export-mocks` feature).
//! - Request and response types are plain data.

use std::time::Duration;

use async_trait::async_trait;

use mockall::automock;

/// Boxed error returned by trait adapters; converted into a [`crate::BridgeError`] by callers.
pub type TransportError = Box<dyn std::error::Error + Send + Sync>;

/// A session cookie as enumerated from the directory.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct CandidateCredential {
    /// Cookie domain, possibly with a leading dot.
    pub domain: String,
    /// The opaque session token.
    pub value: String,
}

/// A session previously pushed by the in-page observer.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredSession {
    pub session_id: String,
    /// Full URL of the page the observer saw the session on.
    pub href: String,
}

/// Read-only interface over the platform-supplied cookie store.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait CredentialDirectory: Send + Sync {
    /// Every cookie called `name`, on any domain.
    async fn list_tokens(&self, name: &str) -> Vec<CandidateCredential>;

    /// Value of the cookie called `name` that applies to `url`, if any.
    async fn get_token(&self, url: &str, name: &str) -> Option<String>;
}

/// Fallback store for a session reported by the in-page observer.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait StoredSessionStore: Send + Sync {
    async fn load(&self) -> Option<StoredSession>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Patch,
    Put,
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
        }
    }
}

impl std::str::FromStr for HttpMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(HttpMethod::Get),
            "POST" => Ok(HttpMethod::Post),
            "PATCH" => Ok(HttpMethod::Patch),
            "PUT" => Ok(HttpMethod::Put),
            "DELETE" => Ok(HttpMethod::Delete),
            other => Err(format!("unsupported HTTP method: {other}")),
        }
    }
}

/// An outgoing HTTPS request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
}

impl HttpRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// A received response; the body is always read to text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Generic request/response transport. Used for REST calls and the three SOAP operations.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;
}

/// Suspends the current task; injected so polling can be driven without real time passing.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// [`Sleeper`] backed by the tokio timer.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}
