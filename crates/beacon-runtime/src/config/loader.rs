//! Configuration loading and validation.

use std::path::PathBuf;

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use tracing::debug;

use super::schema::{BeaconConfig, ConnectionConfig, LogOutput};
use super::{ConfigError, ConfigResult};

/// Default configuration file name.
pub const CONFIG_FILE: &str = "beacon.toml";

/// Layered configuration loader.
///
/// Providers are merged lowest-precedence first: built-in defaults, the
/// user configuration directory, the working directory (or an explicit
/// file), then `BEACON_*` environment variables.
pub struct ConfigLoader {
    file: Option<PathBuf>,
    search_current_dir: bool,
    with_env: bool,
}

impl ConfigLoader {
    /// Creates a loader with the default provider stack.
    pub fn new() -> Self {
        Self {
            file: None,
            search_current_dir: true,
            with_env: true,
        }
    }

    /// Loads exactly this file instead of searching the working directory.
    pub fn file<P: AsRef<std::path::Path>>(mut self, path: P) -> Self {
        self.file = Some(path.as_ref().to_path_buf());
        self.search_current_dir = false;
        self
    }

    /// Disables the `BEACON_*` environment provider.
    pub fn without_env(mut self) -> Self {
        self.with_env = false;
        self
    }

    /// Merges the providers and validates the result.
    pub fn load(&self) -> ConfigResult<BeaconConfig> {
        let mut figment = Figment::from(Serialized::defaults(BeaconConfig::default()));

        if let Some(config_dir) = dirs::config_dir() {
            figment = figment.merge(Toml::file(config_dir.join("beacon").join(CONFIG_FILE)));
        }

        match &self.file {
            Some(file) => {
                debug!(file = %file.display(), "Loading configuration file");
                figment = figment.merge(Toml::file(file));
            }
            None if self.search_current_dir => {
                figment = figment.merge(Toml::file(CONFIG_FILE));
            }
            None => {}
        }

        if self.with_env {
            figment = figment.merge(Env::prefixed("BEACON_").split("__"));
        }

        let config: BeaconConfig = figment.extract()?;
        validate(&config)?;
        Ok(config)
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

/// Checks constraints figment cannot express.
pub fn validate(config: &BeaconConfig) -> ConfigResult<()> {
    if config.action_timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "action_timeout_secs must be greater than 0".into(),
        ));
    }

    match &config.connection {
        ConnectionConfig::None => {}
        ConnectionConfig::WsClient { url, reconnect } => {
            if !url.starts_with("ws://") && !url.starts_with("wss://") {
                return Err(ConfigError::Validation(format!(
                    "connection.url must be a ws:// or wss:// URL, got {url:?}"
                )));
            }
            if reconnect.multiplier < 1.0 {
                return Err(ConfigError::Validation(
                    "connection.reconnect.multiplier must be at least 1.0".into(),
                ));
            }
        }
        ConnectionConfig::WsServer { host, path, .. } => {
            if host.is_empty() {
                return Err(ConfigError::Validation("connection.host must not be empty".into()));
            }
            if path.is_empty() {
                return Err(ConfigError::Validation("connection.path must not be empty".into()));
            }
        }
    }

    if config.logging.output == LogOutput::File && config.logging.file_path.is_none() {
        return Err(ConfigError::Validation(
            "logging.file_path is required when logging.output = \"file\"".into(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn explicit_file_is_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("beacon.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            r#"
plugin_root = "modules"

[connection]
type = "ws-client"
url = "ws://127.0.0.1:6700/ws"
"#
        )
        .unwrap();

        let config = ConfigLoader::new()
            .file(&path)
            .without_env()
            .load()
            .unwrap();
        assert_eq!(config.plugin_root, std::path::PathBuf::from("modules"));
        assert!(matches!(
            config.connection,
            ConnectionConfig::WsClient { .. }
        ));
    }

    #[test]
    fn bad_url_scheme_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("beacon.toml");
        std::fs::write(
            &path,
            r#"
[connection]
type = "ws-client"
url = "http://127.0.0.1:6700"
"#,
        )
        .unwrap();

        let err = ConfigLoader::new().file(&path).without_env().load();
        assert!(matches!(err, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn file_output_requires_a_path() {
        let config = BeaconConfig {
            logging: super::super::schema::LoggingConfig {
                output: LogOutput::File,
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(matches!(
            validate(&config),
            Err(ConfigError::Validation(_))
        ));
    }
}
