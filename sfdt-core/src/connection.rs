//! Resolved connection and the reply shapes handed to callers.

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::BridgeError;

/// API version used for REST paths (`v62.0`) and SOAP endpoints (`62.0`).
pub const DEFAULT_API_VERSION: &str = "62.0";

/// Destination and credential for every API call against one org.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Connection {
    pub instance_url: String,
    pub session_id: String,
    /// Bare version number, e.g. `62.0`.
    pub api_version: String,
}

impl Connection {
    pub fn new(session: crate::session::Session, api_version: impl Into<String>) -> Self {
        Self {
            instance_url: session.instance_url,
            session_id: session.session_id,
            api_version: api_version.into(),
        }
    }

    /// Leading label of the instance host, e.g. `acme--uat`.
    pub fn org_name(&self) -> String {
        match Url::parse(&self.instance_url) {
            Ok(url) => url
                .host_str()
                .and_then(|h| h.split('.').next())
                .map(str::to_string)
                .unwrap_or_else(|| self.instance_url.clone()),
            Err(_) => self.instance_url.clone(),
        }
    }

    /// `/services/data/v62.0`
    pub fn rest_base_path(&self) -> String {
        format!("/services/data/v{}", self.api_version)
    }

    pub fn partner_soap_url(&self) -> String {
        format!("{}/services/Soap/u/{}", self.instance_url, self.api_version)
    }

    pub fn metadata_soap_url(&self) -> String {
        format!("{}/services/Soap/m/{}", self.instance_url, self.api_version)
    }
}

/// `{connection: {...}}` or `{error: "..."}`.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum ConnectionReply {
    Connection { connection: Connection },
    Error { error: String },
}

impl From<Result<Connection, BridgeError>> for ConnectionReply {
    fn from(result: Result<Connection, BridgeError>) -> Self {
        match result {
            Ok(connection) => ConnectionReply::Connection { connection },
            Err(e) => ConnectionReply::Error {
                error: e.to_string(),
            },
        }
    }
}

/// `{data: ...}` or `{error: "..."}`.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum DataReply<T> {
    Data { data: T },
    Error { error: String },
}

impl<T> From<Result<T, BridgeError>> for DataReply<T> {
    fn from(result: Result<T, BridgeError>) -> Self {
        match result {
            Ok(data) => DataReply::Data { data },
            Err(e) => DataReply::Error {
                error: e.to_string(),
            },
        }
    }
}
