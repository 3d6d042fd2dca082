//! Runtime error types.

use thiserror::Error;

use crate::config::ConfigError;
use beacon_core::TransportError;

/// Errors raised while constructing or driving the runtime.
///
/// Boot failures here are the only process-fatal condition in the host;
/// everything downstream is isolated per request or per plugin.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// Configuration could not be loaded or validated.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The configured adaptor could not be constructed.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Result type for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;
