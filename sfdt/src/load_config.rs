//! `load_config` module: reads the optional YAML config file and layers environment overrides on
//! top of it.
//!
//! Every key is optional; an absent file yields [`CliConfig::default`]. The recognised
//! environment overrides are `SFDT_COOKIE_FILE` and `SFDT_API_VERSION`.
//!
//! # Errors
//! Read and parse failures are `anyhow::Error`s naming the file, surfaced at the CLI boundary.

use anyhow::Result;
use serde::Deserialize;
use sfdt_core::connection::DEFAULT_API_VERSION;
use sfdt_core::deploy::{PollPolicy, DEFAULT_MAX_ATTEMPTS, DEFAULT_POLL_INTERVAL};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{error, info};

pub const COOKIE_FILE_ENV: &str = "SFDT_COOKIE_FILE";
pub const API_VERSION_ENV: &str = "SFDT_API_VERSION";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    /// JSON cookie export the session cookies are read from.
    pub cookie_file: Option<PathBuf>,
    /// Where `remember` writes, and the resolver's last-resort lookup reads, a stored session.
    pub stored_session_file: Option<PathBuf>,
    pub api_version: String,
    pub deploy: DeploySection,
    pub http: HttpSection,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            cookie_file: None,
            stored_session_file: None,
            api_version: DEFAULT_API_VERSION.to_string(),
            deploy: DeploySection::default(),
            http: HttpSection::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DeploySection {
    pub max_attempts: u32,
    pub interval_secs: u64,
}

impl Default for DeploySection {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            interval_secs: DEFAULT_POLL_INTERVAL.as_secs(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct HttpSection {
    pub timeout_secs: u64,
}

impl Default for HttpSection {
    fn default() -> Self {
        Self { timeout_secs: 60 }
    }
}

impl CliConfig {
    pub fn poll_policy(&self) -> PollPolicy {
        PollPolicy {
            max_attempts: self.deploy.max_attempts,
            interval: Duration::from_secs(self.deploy.interval_secs),
        }
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http.timeout_secs)
    }

    /// Applies `SFDT_COOKIE_FILE` and `SFDT_API_VERSION` when set and non-empty.
    pub fn apply_env_overrides(mut self) -> Self {
        if let Some(cookie_file) = non_empty_var(COOKIE_FILE_ENV) {
            info!(env = COOKIE_FILE_ENV, "Cookie file overridden from environment");
            self.cookie_file = Some(PathBuf::from(cookie_file));
        }
        if let Some(version) = non_empty_var(API_VERSION_ENV) {
            info!(env = API_VERSION_ENV, api_version = %version, "API version overridden from environment");
            self.api_version = version;
        }
        self
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Loads a YAML config file and applies environment overrides.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<CliConfig> {
    let path_ref = path.as_ref();
    info!(config_path = ?path_ref, "Loading configuration from file");

    let config_content = match fs::read_to_string(path_ref) {
        Ok(content) => content,
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to read config file");
            return Err(anyhow::anyhow!(
                "Failed to read config file {:?}: {}",
                path_ref,
                e
            ));
        }
    };

    // An empty document deserialises to unit, not to a mapping.
    if config_content.trim().is_empty() {
        return Ok(CliConfig::default().apply_env_overrides());
    }

    let config: CliConfig = match serde_yaml::from_str(&config_content) {
        Ok(conf) => {
            info!(config_path = ?path_ref, "Parsed config YAML successfully");
            conf
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to parse config YAML");
            return Err(anyhow::anyhow!(
                "Failed to parse config YAML {:?}: {e}",
                path_ref
            ));
        }
    };

    Ok(config.apply_env_overrides())
}

/// The file's config when a path is given, otherwise defaults; environment overrides apply
/// either way.
pub fn load_optional_config(path: Option<&Path>) -> Result<CliConfig> {
    match path {
        Some(path) => load_config(path),
        None => Ok(CliConfig::default().apply_env_overrides()),
    }
}
