//! In-memory cookie jar implementing [`CredentialDirectory`] with browser domain-matching.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::contract::{CandidateCredential, CredentialDirectory};

/// One cookie as found in a browser cookie export. Unknown fields are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cookie {
    pub name: String,
    pub domain: String,
    pub value: String,
}

impl Cookie {
    pub fn new(name: impl Into<String>, domain: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            domain: domain.into(),
            value: value.into(),
        }
    }

    /// A leading-dot domain covers itself and every sub-domain; otherwise host-only.
    pub fn applies_to_host(&self, host: &str) -> bool {
        let host = host.to_ascii_lowercase();
        let domain = self.domain.to_ascii_lowercase();
        match domain.strip_prefix('.') {
            Some(bare) => host == bare || host.ends_with(&domain),
            None => host == domain,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CookieJar {
    cookies: Vec<Cookie>,
}

impl CookieJar {
    pub fn new(cookies: Vec<Cookie>) -> Self {
        Self { cookies }
    }

    pub fn len(&self) -> usize {
        self.cookies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty()
    }
}

#[async_trait]
impl CredentialDirectory for CookieJar {
    async fn list_tokens(&self, name: &str) -> Vec<CandidateCredential> {
        self.cookies
            .iter()
            .filter(|c| c.name == name)
            .map(|c| CandidateCredential {
                domain: c.domain.clone(),
                value: c.value.clone(),
            })
            .collect()
    }

    async fn get_token(&self, url: &str, name: &str) -> Option<String> {
        let parsed = Url::parse(url).ok()?;
        let host = parsed.host_str()?;
        self.cookies
            .iter()
            .find(|c| c.name == name && c.applies_to_host(host))
            .map(|c| c.value.clone())
    }
}
