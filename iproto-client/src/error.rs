//! Client error types.

use iproto_protocol::ProtocolError;
use std::path::PathBuf;
use thiserror::Error;

/// Client errors.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("failed to {action}: {source}")]
    Transport {
        action: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("not connected")]
    NotConnected,

    #[error("connection closed by peer")]
    ConnectionClosed,

    #[error("timed out while trying to {0}")]
    Timeout(&'static str),

    #[error("authentication failed: {0}")]
    AuthFailed(String),

    #[error("server error {code:#x}: {message}")]
    ServerError { code: u32, message: String },

    #[error("cannot find {kind}: {name}")]
    NotFound { kind: &'static str, name: String },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("failed to read config file '{}': {source}", path.display())]
    ConfigFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("connection pool error: {0}")]
    Pool(String),
}

impl ClientError {
    /// Returns whether the connection was closed as part of this error.
    ///
    /// Transport and framing failures leave the stream unusable; server,
    /// schema and configuration errors do not.
    pub fn is_fatal(&self) -> bool {
        match self {
            ClientError::Transport { .. }
            | ClientError::ConnectionClosed
            | ClientError::Timeout(_)
            | ClientError::AuthFailed(_) => true,
            ClientError::Protocol(e) => e.is_desync(),
            _ => false,
        }
    }
}
