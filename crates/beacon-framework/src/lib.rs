//! # Beacon Framework
//!
//! Event dispatch and plugin lifecycle for the Beacon bot host.
//!
//! - **Dispatcher** ([`dispatcher`]): the adaptor's sole message handler.
//!   Classifies and logs every event, fans broadcast events out to the
//!   registered handlers in priority order, and routes targeted call events
//!   to exactly one plugin.
//! - **Plugin contract** ([`plugin`]): manifest-described modules with an
//!   explicit handler registration table and optional start/stop hooks.
//! - **Lifecycle manager** ([`manager`]): discovery, validation, capability
//!   injection, priority ordering, and start/stop/restart orchestration.
//! - **Injected capabilities**: the [`Api`] facade, the scoped
//!   [`PluginLogger`], and the per-plugin [`Storage`] handle.
//!
//! ```text
//! Adaptor ──frames──▶ EventDispatcher ──Arc<Event>──▶ plugin handlers
//!                          ▲                              │
//!                          │ register / clear             │ Api::send / call
//!                     PluginManager ◀─────────────────────┘
//! ```

pub mod api;
pub mod dispatcher;
pub mod error;
pub mod logger;
pub mod manager;
pub mod plugin;
pub mod storage;

pub use api::{
    Api, GroupInfo, GroupMemberInfo, LoginInfo, MessageInfo, MessageTarget, StrangerInfo,
};
pub use dispatcher::{EventDispatcher, EventHandler, HandlerResult, HandlerSet};
pub use error::{BoxError, PluginError};
pub use logger::PluginLogger;
pub use manager::{HOST_VERSION, PluginManager, PluginState};
pub use plugin::{
    BoxedPlugin, MANIFEST_FILE, ManifestError, Plugin, PluginContext, PluginFactory, PluginMeta,
    load_manifest,
};
pub use storage::{Storage, StorageError, StorageResult};
