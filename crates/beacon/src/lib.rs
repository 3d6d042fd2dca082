//! # Beacon
//!
//! A plugin-driven chat-bot host. Beacon maintains one connection to a
//! messaging gateway speaking the JSON action/event protocol, decodes
//! inbound frames into typed immutable events, fans them out to
//! independently loaded plugins, and gives every plugin a scoped capability
//! surface: an API facade, a logger, persistent storage, and a same-process
//! call channel into other plugins.
//!
//! The workspace is layered the same way the crates are named:
//!
//! | Crate | Role |
//! |-------|------|
//! | `beacon-core` | wire codec, adaptor + reply correlation, event model |
//! | `beacon-transport` | WebSocket client and server adaptors |
//! | `beacon-framework` | dispatcher, plugin lifecycle, capabilities |
//! | `beacon-runtime` | configuration, logging, boot orchestration |
//!
//! Most hosts only need the [`prelude`].

pub use beacon_core;
pub use beacon_framework;
pub use beacon_runtime;
pub use beacon_transport;

pub use beacon_core::{
    ActionError, ActionResult, ActionResponse, Adaptor, CallError, CallEvent, CallResult, Event,
    EventName, NullAdaptor,
};
pub use beacon_framework::{
    Api, BoxError, BoxedPlugin, EventDispatcher, HandlerSet, Plugin, PluginContext, PluginManager,
    PluginMeta,
};
pub use beacon_runtime::{BeaconConfig, BeaconRuntime, ConnectionConfig};

/// Common imports for plugin and host authors.
pub mod prelude {
    pub use beacon_core::event::{
        GroupMessage, MessageEvent, MetaEvent, NoticeEvent, PrivateMessage, RequestEvent,
    };
    pub use beacon_core::{
        ActionError, ActionResult, ActionResponse, CallError, CallResult, Event, EventName,
    };
    pub use beacon_framework::{
        Api, BoxError, BoxedPlugin, HandlerSet, Plugin, PluginContext, PluginLogger, Storage,
    };
    pub use beacon_runtime::BeaconRuntime;
}
