//! Framework-level error types.

use thiserror::Error;

use crate::plugin::manifest::ManifestError;
use crate::storage::StorageError;

/// Boxed error used at plugin boundaries, where the host cannot know the
/// concrete error types a plugin produces.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors that exclude one plugin candidate during loading.
///
/// These are isolated per candidate: the manager logs them and continues
/// with the remaining plugins.
#[derive(Debug, Error)]
pub enum PluginError {
    /// The manifest is missing, unreadable, or fails validation.
    #[error(transparent)]
    Manifest(#[from] ManifestError),

    /// The manifest declares a namespace already taken by another plugin.
    #[error("duplicate plugin namespace: {0}")]
    DuplicateNamespace(String),

    /// No implementation is installed for the manifest's namespace.
    #[error("no installed implementation for namespace: {0}")]
    NotInstalled(String),

    /// The plugin's storage could not be opened.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// The plugin's factory failed during construction.
    #[error("plugin construction failed: {0}")]
    Construct(#[source] BoxError),
}
