//! File- and environment-backed adapters for the credential directory and the stored-session
//! fallback.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Result;
use async_trait::async_trait;
use sfdt_core::contract::{StoredSession, StoredSessionStore};
use sfdt_core::credentials::{Cookie, CookieJar};
use tracing::{info, warn};

pub const SESSION_ID_ENV: &str = "SFDT_SESSION_ID";
pub const SESSION_HREF_ENV: &str = "SFDT_SESSION_HREF";

/// Reads a JSON cookie export: an array of `{name, domain, value, ...}` objects.
pub fn load_cookie_jar<P: AsRef<Path>>(path: P) -> Result<CookieJar> {
    let path_ref = path.as_ref();
    let content = fs::read_to_string(path_ref).map_err(|e| {
        tracing::error!(error = ?e, cookie_file = ?path_ref, "Failed to read cookie file");
        anyhow::anyhow!("Failed to read cookie file {:?}: {}", path_ref, e)
    })?;
    let cookies: Vec<Cookie> = serde_json::from_str(&content).map_err(|e| {
        tracing::error!(error = ?e, cookie_file = ?path_ref, "Failed to parse cookie file");
        anyhow::anyhow!("Failed to parse cookie file {:?}: {e}", path_ref)
    })?;
    info!(cookie_file = ?path_ref, cookies = cookies.len(), "Loaded cookie jar");
    Ok(CookieJar::new(cookies))
}

/// A stored session kept as `{"sessionId": ..., "href": ...}` in a JSON file.
#[derive(Debug, Clone)]
pub struct FileSessionStore {
    path: PathBuf,
}

impl FileSessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `Ok(None)` when the file does not exist yet.
    pub fn read(&self) -> Result<Option<StoredSession>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&self.path)
            .map_err(|e| anyhow::anyhow!("Failed to read session file {:?}: {}", self.path, e))?;
        let stored = serde_json::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Failed to parse session file {:?}: {e}", self.path))?;
        Ok(Some(stored))
    }

    pub fn save(&self, session: &StoredSession) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, serde_json::to_string_pretty(session)?)
            .map_err(|e| anyhow::anyhow!("Failed to write session file {:?}: {}", self.path, e))?;
        info!(session_file = ?self.path, href = %session.href, "Stored session recorded");
        Ok(())
    }
}

#[async_trait]
impl StoredSessionStore for FileSessionStore {
    async fn load(&self) -> Option<StoredSession> {
        match self.read() {
            Ok(stored) => stored,
            Err(e) => {
                warn!(error = %e, "Ignoring unreadable stored session");
                None
            }
        }
    }
}

/// `SFDT_SESSION_ID` + `SFDT_SESSION_HREF`; both must be set.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvSessionStore;

#[async_trait]
impl StoredSessionStore for EnvSessionStore {
    async fn load(&self) -> Option<StoredSession> {
        let session_id = env::var(SESSION_ID_ENV).ok().filter(|v| !v.is_empty())?;
        let href = env::var(SESSION_HREF_ENV).ok().filter(|v| !v.is_empty())?;
        Some(StoredSession { session_id, href })
    }
}

/// Environment first, then the session file when one is configured.
#[derive(Debug, Clone, Default)]
pub struct SessionStores {
    env: EnvSessionStore,
    file: Option<FileSessionStore>,
}

impl SessionStores {
    pub fn new(file: Option<FileSessionStore>) -> Self {
        Self {
            env: EnvSessionStore,
            file,
        }
    }
}

#[async_trait]
impl StoredSessionStore for SessionStores {
    async fn load(&self) -> Option<StoredSession> {
        if let Some(stored) = self.env.load().await {
            return Some(stored);
        }
        match &self.file {
            Some(file) => file.load().await,
            None => None,
        }
    }
}
