//! Plugin manifest schema and validation.
//!
//! Each plugin directory carries a `plugin.toml` declaring its metadata:
//!
//! ```toml
//! [plugin]
//! namespace = "demo.echo"
//! name = "Echo"
//! author = "someone"
//! description = "Echoes messages back"
//! priority = 10
//! version = "1.0.0"
//! host_version = "0.1.0"
//! ```
//!
//! A manifest that fails validation excludes its plugin; loading continues
//! with the remaining candidates.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Manifest file name inside a plugin directory.
pub const MANIFEST_FILE: &str = "plugin.toml";

/// Declared plugin metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginMeta {
    /// Globally unique dotted identifier (`ident(.ident)*`).
    pub namespace: String,
    /// Display name.
    pub name: String,
    /// Author.
    pub author: String,
    /// One-line description.
    #[serde(default)]
    pub description: String,
    /// Start ordering, ascending, 1..=100. Lower priorities start first and
    /// stop last.
    pub priority: u32,
    /// Plugin version, dotted `MAJOR.MINOR.PATCH` numerals.
    pub version: String,
    /// Host version the plugin was written against.
    pub host_version: String,
}

#[derive(Debug, Deserialize)]
struct Manifest {
    plugin: PluginMeta,
}

/// Errors raised while reading or validating a manifest.
#[derive(Debug, Error)]
pub enum ManifestError {
    /// The manifest file could not be read.
    #[error("cannot read manifest: {0}")]
    Io(#[from] std::io::Error),

    /// The manifest is not valid TOML of the expected shape.
    #[error("cannot parse manifest: {0}")]
    Parse(#[from] toml::de::Error),

    /// The namespace does not match `ident(.ident)*`.
    #[error("invalid namespace: {0:?}")]
    InvalidNamespace(String),

    /// The priority is outside 1..=100.
    #[error("priority {0} out of range 1..=100")]
    PriorityOutOfRange(u32),

    /// The version is not dotted `MAJOR.MINOR.PATCH` numerals.
    #[error("invalid version: {0:?}")]
    InvalidVersion(String),

    /// The host version is not dotted `MAJOR.MINOR.PATCH` numerals.
    #[error("invalid host version: {0:?}")]
    InvalidHostVersion(String),
}

impl PluginMeta {
    /// Checks the declared metadata against the manifest schema.
    pub fn validate(&self) -> Result<(), ManifestError> {
        if !is_valid_namespace(&self.namespace) {
            return Err(ManifestError::InvalidNamespace(self.namespace.clone()));
        }
        if !(1..=100).contains(&self.priority) {
            return Err(ManifestError::PriorityOutOfRange(self.priority));
        }
        if !is_dotted_version(&self.version) {
            return Err(ManifestError::InvalidVersion(self.version.clone()));
        }
        if !is_dotted_version(&self.host_version) {
            return Err(ManifestError::InvalidHostVersion(self.host_version.clone()));
        }
        Ok(())
    }
}

/// Reads and validates the manifest inside `dir`.
pub fn load_manifest(dir: &Path) -> Result<PluginMeta, ManifestError> {
    let raw = std::fs::read_to_string(dir.join(MANIFEST_FILE))?;
    let manifest: Manifest = toml::from_str(&raw)?;
    manifest.plugin.validate()?;
    Ok(manifest.plugin)
}

/// `ident(.ident)*` with `ident = [A-Za-z_][A-Za-z0-9_]*`.
fn is_valid_namespace(namespace: &str) -> bool {
    !namespace.is_empty()
        && namespace.split('.').all(|segment| {
            let mut chars = segment.chars();
            matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        })
}

/// Dotted `MAJOR.MINOR.PATCH` numerals without leading zeros.
fn is_dotted_version(version: &str) -> bool {
    let parts: Vec<&str> = version.split('.').collect();
    parts.len() == 3
        && parts.iter().all(|part| {
            !part.is_empty()
                && part.chars().all(|c| c.is_ascii_digit())
                && (part.len() == 1 || !part.starts_with('0'))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta() -> PluginMeta {
        PluginMeta {
            namespace: "demo.echo".into(),
            name: "Echo".into(),
            author: "someone".into(),
            description: String::new(),
            priority: 10,
            version: "1.0.0".into(),
            host_version: "0.1.0".into(),
        }
    }

    #[test]
    fn valid_meta_passes() {
        meta().validate().unwrap();
    }

    #[test]
    fn namespace_format_is_enforced() {
        for bad in ["", "1abc", "a..b", "a.", "a-b", "a b"] {
            let mut m = meta();
            m.namespace = bad.into();
            assert!(
                matches!(m.validate(), Err(ManifestError::InvalidNamespace(_))),
                "{bad:?} should be rejected"
            );
        }
        for good in ["a", "a.b", "a_b.c2", "_x.y_z"] {
            let mut m = meta();
            m.namespace = good.into();
            assert!(m.validate().is_ok(), "{good:?} should be accepted");
        }
    }

    #[test]
    fn priority_range_is_enforced() {
        for bad in [0, 101, 200] {
            let mut m = meta();
            m.priority = bad;
            assert!(matches!(
                m.validate(),
                Err(ManifestError::PriorityOutOfRange(_))
            ));
        }
    }

    #[test]
    fn version_format_is_enforced() {
        for bad in ["1.0", "1.0.0.0", "v1.0.0", "01.0.0", "1.0.x", ""] {
            let mut m = meta();
            m.version = bad.into();
            assert!(
                matches!(m.validate(), Err(ManifestError::InvalidVersion(_))),
                "{bad:?} should be rejected"
            );
        }
        let mut m = meta();
        m.version = "10.20.30".into();
        assert!(m.validate().is_ok());
    }

    #[test]
    fn manifest_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(MANIFEST_FILE),
            r#"
[plugin]
namespace = "demo.echo"
name = "Echo"
author = "someone"
description = "Echoes messages back"
priority = 10
version = "1.0.0"
host_version = "0.1.0"
"#,
        )
        .unwrap();

        let meta = load_manifest(dir.path()).unwrap();
        assert_eq!(meta.namespace, "demo.echo");
        assert_eq!(meta.priority, 10);
    }
}
