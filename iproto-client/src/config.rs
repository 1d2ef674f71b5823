//! Connection configuration.
//!
//! Configuration is loaded in the following order (later overrides earlier):
//! 1. Default values
//! 2. YAML config file (if specified via IPROTO_CONFIG)
//! 3. Environment variables

use crate::error::ClientError;
use iproto_protocol::{CallSemantics, DEFAULT_PORT};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Default socket timeout (5 s).
pub const DEFAULT_TIMEOUT_MS: u64 = 5_000;

/// Default number of idle sessions kept per pool key.
pub const DEFAULT_POOL_SIZE: usize = 30;

/// Default idle lifetime of a pooled session (60 s).
pub const DEFAULT_IDLE_TIMEOUT_MS: u64 = 60_000;

/// Connection configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    /// Server host name or address.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// User name; `None` connects anonymously and skips authentication.
    pub user: Option<String>,
    /// Password, only ever sent as a CHAP-SHA1 scramble.
    #[serde(skip_serializing)]
    pub password: Option<String>,
    /// Send/receive timeout in milliseconds.
    pub timeout_ms: u64,
    /// Which call command `call` uses.
    pub call_semantics: CallSemantics,
    /// Idle sessions kept per pool key by `set_keepalive`.
    pub pool_size: usize,
    /// How long an idle pooled session stays reusable, in milliseconds.
    pub idle_timeout_ms: u64,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
            user: None,
            password: None,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            call_semantics: CallSemantics::default(),
            pool_size: DEFAULT_POOL_SIZE,
            idle_timeout_ms: DEFAULT_IDLE_TIMEOUT_MS,
        }
    }
}

impl ConnectionConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Self::default()
        }
    }

    /// Loads configuration from `IPROTO_CONFIG` (if set), then applies
    /// environment variable overrides.
    pub fn load() -> Result<Self, ClientError> {
        let mut config = match std::env::var("IPROTO_CONFIG") {
            Ok(path) => Self::from_file(path)?,
            Err(_) => Self::default(),
        };
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Loads configuration from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ClientError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| ClientError::ConfigFile {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_yaml(&content)
    }

    /// Parses configuration from YAML text.
    pub fn from_yaml(content: &str) -> Result<Self, ClientError> {
        serde_yaml::from_str(content).map_err(|e| ClientError::Config(e.to_string()))
    }

    fn apply_env_overrides(&mut self) -> Result<(), ClientError> {
        if let Ok(host) = std::env::var("IPROTO_HOST") {
            self.host = host;
        }

        if let Ok(port) = std::env::var("IPROTO_PORT") {
            self.port = port
                .parse()
                .map_err(|_| ClientError::Config(format!("invalid IPROTO_PORT: {}", port)))?;
        }

        if let Ok(user) = std::env::var("IPROTO_USER") {
            if !user.is_empty() {
                self.user = Some(user);
            }
        }

        if let Ok(password) = std::env::var("IPROTO_PASSWORD") {
            self.password = Some(password);
        }

        if let Ok(timeout) = std::env::var("IPROTO_TIMEOUT_MS") {
            if let Ok(ms) = timeout.parse() {
                self.timeout_ms = ms;
            }
        }

        if let Ok(call) = std::env::var("IPROTO_CALL") {
            self.call_semantics = call
                .parse()
                .map_err(|e: iproto_protocol::ProtocolError| ClientError::Config(e.to_string()))?;
        }

        Ok(())
    }

    pub fn with_user(mut self, user: impl Into<String>, password: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self.password = Some(password.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn with_call_semantics(mut self, semantics: CallSemantics) -> Self {
        self.call_semantics = semantics;
        self
    }

    /// Sets call semantics by name, failing on anything but `old`/`new`.
    pub fn with_call_semantics_name(mut self, name: &str) -> Result<Self, ClientError> {
        self.call_semantics = name
            .parse()
            .map_err(|e: iproto_protocol::ProtocolError| ClientError::Config(e.to_string()))?;
        Ok(self)
    }

    pub fn with_pool(mut self, pool_size: usize, idle_timeout: Duration) -> Self {
        self.pool_size = pool_size;
        self.idle_timeout_ms = idle_timeout.as_millis() as u64;
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.idle_timeout_ms)
    }

    /// Key under which idle sessions to this server are pooled.
    pub fn pool_key(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
