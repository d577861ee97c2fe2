//! Session resolution: which ambient session belongs to the org the user is viewing, and which
//! base URL to call with it.
//!
//! Resolution runs a fixed chain of strategies; the first one that yields a session wins and no
//! ranking or merging happens across strategies:
//!
//! 1. [`Strategy::CanonicalPrefix`]: a cookie whose domain starts with the org identifier and lies
//!    under `.my.salesforce.com`.
//! 2. [`Strategy::RootSubstring`]: a cookie whose domain contains the org identifier and
//!    `salesforce.com` anywhere.
//! 3. [`Strategy::ExactHost`]: the cookie scoped to the page host itself.
//! 4. [`Strategy::PatternProbe`]: cookies on the four canonical domains synthesised from the org
//!    identifier.
//! 5. [`Strategy::StoredFallback`]: the session the in-page observer last reported.
//!
//! The instance URL always comes from a cookie domain (or the page host rewritten to the API
//! root), never from the page path.

use tracing::{debug, info, warn};
use url::Url;

use crate::connection::Connection;
use crate::contract::{CandidateCredential, CredentialDirectory, StoredSession, StoredSessionStore};
use crate::error::BridgeError;

/// Name of the platform session cookie.
pub const SESSION_COOKIE: &str = "sid";

/// The two root domains every platform host lives under.
pub const ROOT_DOMAINS: [&str; 2] = [".salesforce.com", ".force.com"];

/// Domain family that always accepts bearer-token API calls.
pub const API_ROOT: &str = ".my.salesforce.com";

/// Domain family that renders the Lightning front-end.
pub const FRONTEND_SUFFIX: &str = ".lightning.force.com";

/// Session token plus the origin that serves the API for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub session_id: String,
    /// Always an `https://` origin.
    pub instance_url: String,
}

impl Session {
    fn for_host(session_id: impl Into<String>, host: &str) -> Self {
        Self {
            session_id: session_id.into(),
            instance_url: format!("https://{host}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    CanonicalPrefix,
    RootSubstring,
    ExactHost,
    PatternProbe,
    StoredFallback,
}

/// Execution order of the strategy chain.
pub const STRATEGY_ORDER: [Strategy; 5] = [
    Strategy::CanonicalPrefix,
    Strategy::RootSubstring,
    Strategy::ExactHost,
    Strategy::PatternProbe,
    Strategy::StoredFallback,
];

/// The page being viewed, reduced to what resolution needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageContext {
    pub url: String,
    pub hostname: String,
    pub org_id: String,
}

impl PageContext {
    pub fn parse(page_url: &str) -> Result<Self, BridgeError> {
        let parsed = Url::parse(page_url)
            .map_err(|_| BridgeError::NoActiveContext("Not a Salesforce page".to_string()))?;
        let hostname = parsed
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| BridgeError::NoActiveContext("Not a Salesforce page".to_string()))?
            .to_ascii_lowercase();
        Ok(Self {
            url: page_url.to_string(),
            org_id: org_identifier(&hostname).to_string(),
            hostname,
        })
    }

    pub fn is_platform_host(&self) -> bool {
        is_platform_domain(&self.hostname)
    }

    /// `salesforce.com` or `force.com` with no tenant label in front.
    pub fn is_bare_root(&self) -> bool {
        ROOT_DOMAINS
            .iter()
            .any(|root| self.hostname == root.trim_start_matches('.'))
    }
}

/// First dot-delimited label of a hostname; `--` separators inside it are kept.
pub fn org_identifier(hostname: &str) -> &str {
    hostname.split('.').next().unwrap_or_default()
}

/// True for hosts and cookie domains under one of the two root domains.
pub fn is_platform_domain(domain: &str) -> bool {
    let domain = domain.to_ascii_lowercase();
    ROOT_DOMAINS.iter().any(|root| domain.ends_with(root))
}

/// Rewrites a front-end host to its API-root twin; any other host is returned unchanged.
pub fn api_host_for(hostname: &str) -> String {
    match hostname.strip_suffix(FRONTEND_SUFFIX) {
        Some(prefix) => format!("{prefix}{API_ROOT}"),
        None => hostname.to_string(),
    }
}

fn strip_leading_dot(domain: &str) -> &str {
    domain.strip_prefix('.').unwrap_or(domain)
}

/// Strategy 1.
pub fn match_canonical_prefix(org_id: &str, candidates: &[CandidateCredential]) -> Option<Session> {
    candidates.iter().find_map(|c| {
        let domain = strip_leading_dot(&c.domain);
        (domain.starts_with(org_id) && domain.ends_with(API_ROOT))
            .then(|| Session::for_host(c.value.clone(), domain))
    })
}

/// Strategy 2. Any domain containing the org id qualifies, so two tenants whose names overlap
/// can collide here.
pub fn match_root_substring(org_id: &str, candidates: &[CandidateCredential]) -> Option<Session> {
    candidates.iter().find_map(|c| {
        let domain = strip_leading_dot(&c.domain);
        (domain.contains(org_id) && domain.contains("salesforce.com"))
            .then(|| Session::for_host(c.value.clone(), domain))
    })
}

/// Strategy 4 probe order: production, sandbox, develop, scratch.
pub fn probe_domains(org_id: &str) -> [String; 4] {
    [
        format!("{org_id}.my.salesforce.com"),
        format!("{org_id}.sandbox.my.salesforce.com"),
        format!("{org_id}.develop.my.salesforce.com"),
        format!("{org_id}.scratch.my.salesforce.com"),
    ]
}

/// Strategy 5 derivation; `None` when the stored href has no usable host.
pub fn session_from_stored(stored: &StoredSession) -> Option<Session> {
    if stored.session_id.is_empty() || stored.href.is_empty() {
        return None;
    }
    let url = Url::parse(&stored.href).ok()?;
    let host = url.host_str()?.to_ascii_lowercase();
    Some(Session::for_host(stored.session_id.clone(), &api_host_for(&host)))
}

pub struct SessionResolver<D, S> {
    directory: D,
    stored: S,
}

impl<D, S> SessionResolver<D, S>
where
    D: CredentialDirectory,
    S: StoredSessionStore,
{
    pub fn new(directory: D, stored: S) -> Self {
        Self { directory, stored }
    }

    /// Finds the session for the org behind `page_url`.
    ///
    /// Returns `NoActiveContext` when the URL has no host and `NoSession` when every strategy
    /// misses. Neither is retried.
    pub async fn resolve(&self, page_url: &str) -> Result<Session, BridgeError> {
        let page = PageContext::parse(page_url)?;
        match self.resolve_page(&page).await {
            Some((_, session)) => Ok(session),
            None => Err(BridgeError::NoSession),
        }
    }

    /// Runs the chain and reports which strategy produced the session.
    pub async fn resolve_page(&self, page: &PageContext) -> Option<(Strategy, Session)> {
        if page.org_id.is_empty() || page.is_bare_root() {
            warn!(host = %page.hostname, "Page host carries no org identifier");
            return None;
        }

        let candidates: Vec<CandidateCredential> = self
            .directory
            .list_tokens(SESSION_COOKIE)
            .await
            .into_iter()
            .filter(|c| is_platform_domain(&c.domain))
            .collect();
        debug!(
            org_id = %page.org_id,
            candidates = candidates.len(),
            "Enumerated platform session cookies"
        );

        for strategy in STRATEGY_ORDER {
            if let Some(session) = self.attempt(strategy, page, &candidates).await {
                info!(
                    org_id = %page.org_id,
                    ?strategy,
                    instance_url = %session.instance_url,
                    "Resolved session"
                );
                return Some((strategy, session));
            }
            debug!(org_id = %page.org_id, ?strategy, "Strategy found no session");
        }

        warn!(org_id = %page.org_id, host = %page.hostname, "No session found for page");
        None
    }

    async fn attempt(
        &self,
        strategy: Strategy,
        page: &PageContext,
        candidates: &[CandidateCredential],
    ) -> Option<Session> {
        match strategy {
            Strategy::CanonicalPrefix => match_canonical_prefix(&page.org_id, candidates),
            Strategy::RootSubstring => match_root_substring(&page.org_id, candidates),
            Strategy::ExactHost => {
                let token = self.directory.get_token(&page.url, SESSION_COOKIE).await?;
                Some(Session::for_host(token, &api_host_for(&page.hostname)))
            }
            Strategy::PatternProbe => {
                for domain in probe_domains(&page.org_id) {
                    let probe_url = format!("https://{domain}");
                    if let Some(token) = self.directory.get_token(&probe_url, SESSION_COOKIE).await {
                        return Some(Session::for_host(token, &domain));
                    }
                }
                None
            }
            Strategy::StoredFallback => {
                let stored = self.stored.load().await?;
                session_from_stored(&stored)
            }
        }
    }

    /// Validates the page, resolves its session and pairs it with an API version.
    pub async fn connect(&self, page_url: &str, api_version: &str) -> Result<Connection, BridgeError> {
        if page_url.trim().is_empty() {
            return Err(BridgeError::NoActiveContext(
                "No active Salesforce tab".to_string(),
            ));
        }
        let page = PageContext::parse(page_url)?;
        if !page.is_platform_host() {
            return Err(BridgeError::NoActiveContext(
                "Not a Salesforce page".to_string(),
            ));
        }
        let (_, session) = self
            .resolve_page(&page)
            .await
            .ok_or(BridgeError::NoSession)?;
        Ok(Connection::new(session, api_version))
    }
}
