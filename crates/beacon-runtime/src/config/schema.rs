//! Configuration schema definitions.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use beacon_transport::ReconnectPolicy;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BeaconConfig {
    /// Which adaptor variant to instantiate and its parameters.
    #[serde(default)]
    pub connection: ConnectionConfig,

    /// Root directory scanned for plugin modules.
    #[serde(default = "default_plugin_root")]
    pub plugin_root: PathBuf,

    /// Bound on how long an action may await its reply, in seconds.
    #[serde(default = "default_action_timeout_secs")]
    pub action_timeout_secs: u64,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for BeaconConfig {
    fn default() -> Self {
        Self {
            connection: ConnectionConfig::default(),
            plugin_root: default_plugin_root(),
            action_timeout_secs: default_action_timeout_secs(),
            logging: LoggingConfig::default(),
        }
    }
}

impl BeaconConfig {
    /// The action timeout as a [`Duration`].
    pub fn action_timeout(&self) -> Duration {
        Duration::from_secs(self.action_timeout_secs)
    }
}

fn default_plugin_root() -> PathBuf {
    PathBuf::from("plugins")
}

fn default_action_timeout_secs() -> u64 {
    30
}

/// Gateway connection selection.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ConnectionConfig {
    /// No gateway; every outbound action fails fast.
    #[default]
    None,

    /// The host opens the socket to the gateway.
    WsClient {
        /// Gateway WebSocket URL (`ws://` or `wss://`).
        url: String,
        /// Reconnect behaviour.
        #[serde(default)]
        reconnect: ReconnectConfig,
    },

    /// The host listens and accepts a single gateway connection.
    WsServer {
        /// Bind host.
        #[serde(default = "default_ws_host")]
        host: String,
        /// Bind port.
        #[serde(default = "default_ws_port")]
        port: u16,
        /// WebSocket path.
        #[serde(default = "default_ws_path")]
        path: String,
    },
}

fn default_ws_host() -> String {
    "0.0.0.0".to_string()
}

fn default_ws_port() -> u16 {
    6700
}

fn default_ws_path() -> String {
    "/beacon".to_string()
}

/// Reconnect settings for the ws-client connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconnectConfig {
    /// Whether to reconnect after the connection drops.
    #[serde(default = "default_true")]
    pub auto_reconnect: bool,

    /// Delay before the first reconnect attempt, in milliseconds.
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,

    /// Upper bound on the backoff delay, in milliseconds.
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// Backoff multiplier applied after each failed attempt.
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,

    /// Give up after this many consecutive failures (absent = retry forever).
    #[serde(default)]
    pub max_retries: Option<u32>,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            auto_reconnect: true,
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            multiplier: default_multiplier(),
            max_retries: None,
        }
    }
}

impl ReconnectConfig {
    /// Converts to the transport-level policy.
    pub fn to_policy(&self) -> ReconnectPolicy {
        ReconnectPolicy {
            auto_reconnect: self.auto_reconnect,
            initial_delay: Duration::from_millis(self.initial_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
            multiplier: self.multiplier,
            max_retries: self.max_retries,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_initial_delay_ms() -> u64 {
    1000
}

fn default_max_delay_ms() -> u64 {
    30000
}

fn default_multiplier() -> f64 {
    2.0
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LoggingConfig {
    /// Base log level.
    #[serde(default)]
    pub level: LogLevel,

    /// Output format.
    #[serde(default)]
    pub format: LogFormat,

    /// Output destination.
    #[serde(default)]
    pub output: LogOutput,

    /// Log file path, used when `output = "file"`.
    #[serde(default)]
    pub file_path: Option<PathBuf>,

    /// Per-module level overrides (`module = "level"`).
    #[serde(default)]
    pub filters: HashMap<String, String>,
}

/// Base log level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Trace level.
    Trace,
    /// Debug level.
    Debug,
    /// Info level (default).
    #[default]
    Info,
    /// Warn level.
    Warn,
    /// Error level.
    Error,
}

impl LogLevel {
    /// Lowercase name accepted by `tracing` filter directives.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Single-line compact output (default).
    #[default]
    Compact,
    /// Default tracing formatter.
    Full,
    /// Multi-line human-oriented output.
    Pretty,
}

/// Log output destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogOutput {
    /// Standard output (default).
    #[default]
    Stdout,
    /// Standard error.
    Stderr,
    /// A log file; requires `file_path`.
    File,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = BeaconConfig::default();
        assert!(matches!(config.connection, ConnectionConfig::None));
        assert_eq!(config.plugin_root, PathBuf::from("plugins"));
        assert_eq!(config.action_timeout_secs, 30);
        assert_eq!(config.logging.level, LogLevel::Info);
    }

    #[test]
    fn ws_server_connection_parses() {
        let config: BeaconConfig = toml::from_str(
            r#"
[connection]
type = "ws-server"
host = "127.0.0.1"
port = 8080
path = "/gateway"

[logging]
level = "debug"
"#,
        )
        .unwrap();

        match config.connection {
            ConnectionConfig::WsServer { host, port, path } => {
                assert_eq!(host, "127.0.0.1");
                assert_eq!(port, 8080);
                assert_eq!(path, "/gateway");
            }
            other => panic!("expected ws-server, got {other:?}"),
        }
        assert_eq!(config.logging.level, LogLevel::Debug);
    }

    #[test]
    fn ws_client_reconnect_defaults() {
        let config: BeaconConfig = toml::from_str(
            r#"
[connection]
type = "ws-client"
url = "ws://127.0.0.1:6700/ws"
"#,
        )
        .unwrap();

        let ConnectionConfig::WsClient { url, reconnect } = config.connection else {
            panic!("expected ws-client");
        };
        assert_eq!(url, "ws://127.0.0.1:6700/ws");
        assert!(reconnect.auto_reconnect);
        assert_eq!(reconnect.to_policy().initial_delay, Duration::from_secs(1));
    }
}
