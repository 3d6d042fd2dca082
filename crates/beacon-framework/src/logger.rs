//! Namespace-scoped logger handed to plugins.

use std::fmt::Display;
use std::sync::Arc;

use tracing::{debug, error, info, trace, warn};

/// Logger scoped to one plugin namespace.
///
/// Every line carries a `plugin` field so per-plugin output can be filtered
/// without the plugin knowing anything about the logging backend.
#[derive(Clone)]
pub struct PluginLogger {
    scope: Arc<str>,
}

impl PluginLogger {
    /// Creates a logger scoped to `scope`.
    pub fn new(scope: impl AsRef<str>) -> Self {
        Self {
            scope: Arc::from(scope.as_ref()),
        }
    }

    /// The namespace this logger is scoped to.
    pub fn scope(&self) -> &str {
        &self.scope
    }

    /// Logs at trace level.
    pub fn trace(&self, message: impl Display) {
        trace!(plugin = %self.scope, "{message}");
    }

    /// Logs at debug level.
    pub fn debug(&self, message: impl Display) {
        debug!(plugin = %self.scope, "{message}");
    }

    /// Logs at info level.
    pub fn info(&self, message: impl Display) {
        info!(plugin = %self.scope, "{message}");
    }

    /// Logs at warn level.
    pub fn warn(&self, message: impl Display) {
        warn!(plugin = %self.scope, "{message}");
    }

    /// Logs at error level.
    pub fn error(&self, message: impl Display) {
        error!(plugin = %self.scope, "{message}");
    }
}
