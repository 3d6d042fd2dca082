//! Logging setup.
//!
//! A thin builder over `tracing-subscriber`, initialized from the
//! [`LoggingConfig`] section. `RUST_LOG` takes precedence over the
//! configured base level when set.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use tracing_subscriber::prelude::*;
use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{EnvFilter, fmt};

use crate::config::{LogFormat, LogOutput, LoggingConfig};

/// Initializes logging from configuration.
///
/// Safe to call more than once; later calls are no-ops.
pub fn init_from_config(config: &LoggingConfig) {
    let _ = LoggingBuilder::from_config(config).try_init();
}

/// Builder for the tracing subscriber.
#[derive(Default)]
pub struct LoggingBuilder {
    level: Option<&'static str>,
    directives: Vec<String>,
    format: LogFormat,
    output: LogOutput,
    file_path: Option<PathBuf>,
}

impl LoggingBuilder {
    /// Creates a builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a builder from a [`LoggingConfig`].
    pub fn from_config(config: &LoggingConfig) -> Self {
        let mut builder = Self::new();
        builder.level = Some(config.level.as_str());
        builder.format = config.format;
        builder.output = config.output;
        builder.file_path.clone_from(&config.file_path);
        for (module, level) in &config.filters {
            builder.directives.push(format!("{module}={level}"));
        }
        builder
    }

    /// Adds a filter directive (e.g. `"beacon_core=debug"`).
    pub fn directive(mut self, directive: &str) -> Self {
        self.directives.push(directive.to_string());
        self
    }

    /// Sets the output format.
    pub fn format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    fn build_filter(&self) -> EnvFilter {
        let base = self.level.unwrap_or("info");
        let mut filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(base));
        for directive in &self.directives {
            if let Ok(parsed) = directive.parse() {
                filter = filter.add_directive(parsed);
            }
        }
        filter
    }

    /// Initializes the subscriber, ignoring re-initialization errors.
    pub fn init(self) {
        let _ = self.try_init();
    }

    /// Initializes the subscriber.
    pub fn try_init(self) -> Result<(), TryInitError> {
        let filter = self.build_filter();

        macro_rules! init_with_writer {
            ($writer:expr) => {
                match self.format {
                    LogFormat::Compact => tracing_subscriber::registry()
                        .with(fmt::layer().compact().with_writer($writer))
                        .with(filter)
                        .try_init(),
                    LogFormat::Full => tracing_subscriber::registry()
                        .with(fmt::layer().with_writer($writer))
                        .with(filter)
                        .try_init(),
                    LogFormat::Pretty => tracing_subscriber::registry()
                        .with(fmt::layer().pretty().with_writer($writer))
                        .with(filter)
                        .try_init(),
                }
            };
        }

        match self.output {
            LogOutput::Stdout => init_with_writer!(std::io::stdout),
            LogOutput::Stderr => init_with_writer!(std::io::stderr),
            LogOutput::File => {
                let path = self.file_path.clone().unwrap_or_else(|| "beacon.log".into());
                let appender = tracing_appender::rolling::never(
                    path.parent().unwrap_or_else(|| Path::new(".")),
                    path.file_name().unwrap_or_else(|| OsStr::new("beacon.log")),
                );
                init_with_writer!(appender)
            }
        }
    }
}
