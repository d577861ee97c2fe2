use thiserror::Error;

/// Every failure the engine reports to its callers.
///
/// Resolver failures (`NoActiveContext`, `NoSession`) describe user state and are never retried.
/// Transport and SOAP failures carry the most specific message available.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BridgeError {
    #[error("{0}")]
    NoActiveContext(String),

    #[error("No session found")]
    NoSession,

    #[error("{message}")]
    TransportFailure { status: u16, message: String },

    #[error("{0}")]
    RemoteFault(String),

    #[error("{0}")]
    ComponentFailure(String),

    #[error("Deploy timed out after {attempts} status checks")]
    Timeout { attempts: u32 },

    #[error("Archive entry {name} does not fit a stored ZIP record")]
    Archive { name: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl BridgeError {
    /// Failure raised before any HTTP status was seen (connection refused, TLS, timeout).
    pub fn unreachable(err: impl std::fmt::Display) -> Self {
        BridgeError::TransportFailure {
            status: 0,
            message: err.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;
