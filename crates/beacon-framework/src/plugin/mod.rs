//! Plugin contract.
//!
//! A plugin module has two halves:
//!
//! - an **on-disk directory** under the plugin root carrying a `plugin.toml`
//!   manifest (see [`manifest`]), and
//! - an **installed implementation**: a factory registered with the manager
//!   under the manifest's namespace, called once per load with the plugin's
//!   injected capabilities.
//!
//! The factory receives a [`PluginContext`] and returns the live plugin.
//! Capabilities are moved into the instance, which makes the injection
//! immutable by construction: a plugin has no way to reassign what it was
//! given.
//!
//! ```ignore
//! struct Echo {
//!     api: Api,
//! }
//!
//! #[async_trait]
//! impl Plugin for Echo {
//!     fn handlers(&self) -> HandlerSet {
//!         let api = self.api.clone();
//!         HandlerSet::new().on(EventName::PrivateMessage, move |event| {
//!             let api = api.clone();
//!             async move {
//!                 if let Event::Message(MessageEvent::Private(msg)) = &*event {
//!                     api.send_private_msg(msg.user_id, &msg.raw_message).await?;
//!                 }
//!                 Ok(())
//!             }
//!         })
//!     }
//! }
//! ```

pub mod manifest;

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;

use crate::api::Api;
use crate::dispatcher::HandlerSet;
use crate::error::BoxError;
use crate::logger::PluginLogger;
use crate::storage::Storage;

pub use manifest::{MANIFEST_FILE, ManifestError, PluginMeta, load_manifest};

/// Capabilities injected into a plugin before first use.
pub struct PluginContext {
    /// Namespace-scoped API facade.
    pub api: Api,
    /// Namespace-scoped logger.
    pub logger: PluginLogger,
    /// Persistent key-value store rooted at the plugin's directory.
    pub storage: Storage,
    /// The plugin's own directory.
    pub dir: PathBuf,
}

/// A loaded extension module.
#[async_trait]
pub trait Plugin: Send + Sync {
    /// Called once before the plugin's handlers are registered. Returning
    /// an error excludes the plugin from receiving any events.
    async fn on_start(&self) -> Result<(), BoxError> {
        Ok(())
    }

    /// Called once during shutdown, in reverse priority order.
    async fn on_stop(&self) -> Result<(), BoxError> {
        Ok(())
    }

    /// The plugin's declared handler table.
    fn handlers(&self) -> HandlerSet;
}

/// A shared plugin instance.
pub type BoxedPlugin = Arc<dyn Plugin>;

/// Factory producing a plugin from its injected capabilities.
///
/// A factory that errors corresponds to a module failing its own top-level
/// initialization: the plugin is excluded, loading continues.
pub type PluginFactory =
    Arc<dyn Fn(PluginContext) -> Result<BoxedPlugin, BoxError> + Send + Sync>;
