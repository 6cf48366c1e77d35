//! Demo configuration loaded from environment variables.
//!
//! Every key is optional; the defaults reproduce the stock demo (listen on
//! port 8000, four clients, one shared channel). A `.env` file is honoured
//! via `dotenvy`.

use std::net::SocketAddr;
use std::path::PathBuf;

use crate::error::ConfigError;
use crate::node::LogLevel;

/// Default listen address.
pub const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:8000";
/// Default endpoint the demo clients dial.
pub const DEFAULT_SERVER_URL: &str = "ws://localhost:8000/connection/websocket";
/// Default shared channel.
pub const DEFAULT_CHANNEL: &str = "listening.server";

/// Output format of the log subscriber.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Pretty,
    /// One JSON object per line.
    Json,
}

/// Top-level demo configuration.
///
/// Loaded once at startup via [`DemoConfig::from_env`].
#[derive(Debug, Clone)]
pub struct DemoConfig {
    /// Socket address the HTTP server binds to.
    pub listen_addr: SocketAddr,

    /// WebSocket URL the demo clients connect to.
    pub server_url: String,

    /// Directory served verbatim for every non-WebSocket path.
    pub public_dir: PathBuf,

    /// Channel every client subscribes to.
    pub channel: String,

    /// Number of simulated clients.
    pub client_count: usize,

    /// Name the clients send on connect.
    pub client_name: String,

    /// Version the clients send on connect.
    pub client_version: String,

    /// Verbosity of the node's own diagnostics.
    pub node_log_level: LogLevel,

    /// Broadcast buffer per channel.
    pub channel_capacity: usize,

    /// Log output format.
    pub log_format: LogFormat,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 8000)),
            server_url: DEFAULT_SERVER_URL.to_string(),
            public_dir: PathBuf::from("./public"),
            channel: DEFAULT_CHANNEL.to_string(),
            client_count: 4,
            client_name: "listening-rust-client".to_string(),
            client_version: "0.0.1".to_string(),
            node_log_level: LogLevel::Debug,
            channel_capacity: 1024,
            log_format: LogFormat::Pretty,
        }
    }
}

impl DemoConfig {
    /// Loads configuration from environment variables.
    ///
    /// Falls back to [`DemoConfig::default`] for unset keys. Calls
    /// `dotenvy::dotenv().ok()` to optionally load a `.env` file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] if `LISTEN_ADDR` or
    /// `NODE_LOG_LEVEL` is set but cannot be parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a configuration from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Same as [`DemoConfig::from_env`].
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let listen_addr = match lookup("LISTEN_ADDR") {
            Some(raw) => raw.parse().map_err(|_| ConfigError::InvalidValue {
                key: "LISTEN_ADDR",
                value: raw,
            })?,
            None => defaults.listen_addr,
        };

        let node_log_level = match lookup("NODE_LOG_LEVEL") {
            Some(raw) => raw.parse().map_err(|_| ConfigError::InvalidValue {
                key: "NODE_LOG_LEVEL",
                value: raw,
            })?,
            None => defaults.node_log_level,
        };

        let log_format = match lookup("LOG_FORMAT").as_deref() {
            Some("json") | Some("JSON") => LogFormat::Json,
            _ => LogFormat::Pretty,
        };

        Ok(Self {
            listen_addr,
            server_url: lookup("SERVER_URL").unwrap_or(defaults.server_url),
            public_dir: lookup("PUBLIC_DIR").map_or(defaults.public_dir, PathBuf::from),
            channel: lookup("DEMO_CHANNEL")
                .filter(|c| !c.is_empty())
                .unwrap_or(defaults.channel),
            client_count: parse_or(&lookup, "CLIENT_COUNT", defaults.client_count),
            client_name: lookup("CLIENT_NAME").unwrap_or(defaults.client_name),
            client_version: lookup("CLIENT_VERSION").unwrap_or(defaults.client_version),
            node_log_level,
            channel_capacity: parse_or(&lookup, "CHANNEL_CAPACITY", defaults.channel_capacity),
            log_format,
        })
    }
}

/// Parses `key` as `T`, returning `default` on missing or invalid values.
fn parse_or<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> T {
    lookup(key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
