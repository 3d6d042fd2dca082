//! Host configuration.
//!
//! Settings are layered via figment: built-in defaults, the user config
//! directory, `beacon.toml` in the working directory (or an explicit file),
//! then `BEACON_*` environment variables.
//!
//! ```toml
//! plugin_root = "plugins"
//! action_timeout_secs = 30
//!
//! [connection]
//! type = "ws-server"     # none | ws-client | ws-server
//! host = "0.0.0.0"
//! port = 6700
//! path = "/beacon"
//!
//! [logging]
//! level = "info"
//! format = "compact"
//! ```

mod loader;
mod schema;

use thiserror::Error;

pub use loader::{CONFIG_FILE, ConfigLoader, validate};
pub use schema::{
    BeaconConfig, ConnectionConfig, LogFormat, LogLevel, LogOutput, LoggingConfig,
    ReconnectConfig,
};

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A provider failed or the merged figment did not match the schema.
    #[error("configuration error: {0}")]
    Figment(#[from] Box<figment::Error>),

    /// The configuration is well-formed but violates a constraint.
    #[error("invalid configuration: {0}")]
    Validation(String),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;
