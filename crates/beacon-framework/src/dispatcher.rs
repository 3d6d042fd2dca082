//! Central event dispatcher.
//!
//! The dispatcher is the adaptor's sole message handler and the single
//! source of truth for "what just happened". Every decoded event is logged
//! once, then either fanned out to every handler registered under its name
//! (broadcast events) or routed to exactly one plugin (targeted call
//! events).
//!
//! Handlers are invoked sequentially in registration order. Because the
//! plugin manager registers plugins in ascending priority order, broadcast
//! order *is* priority order. A failing handler is isolated and logged; it
//! never prevents the remaining handlers from running and never crashes the
//! dispatcher.

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::BoxFuture;
use parking_lot::RwLock;
use serde_json::Value;
use tracing::{debug, error, info, trace, warn};

use beacon_core::event::{MessageEvent, MetaEvent, NoticeEvent, RequestEvent};
use beacon_core::{CallError, Event, EventName, parse_event};

use crate::error::BoxError;

// =============================================================================
// Handler registration table
// =============================================================================

/// Result returned by an event handler.
pub type HandlerResult = Result<(), BoxError>;

/// A registered event handler.
pub type EventHandler =
    Arc<dyn Fn(Arc<Event>) -> BoxFuture<'static, HandlerResult> + Send + Sync>;

/// A plugin's declared mapping from event name to handler.
///
/// Declared explicitly against the closed [`EventName`] set, so a typo in a
/// handler name is a compile error instead of a silently dead registration.
#[derive(Default)]
pub struct HandlerSet {
    entries: Vec<(EventName, EventHandler)>,
}

impl HandlerSet {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a handler for `name`.
    pub fn on<F, Fut>(mut self, name: EventName, handler: F) -> Self
    where
        F: Fn(Arc<Event>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.entries
            .push((name, Arc::new(move |event| Box::pin(handler(event)))));
        self
    }

    /// Number of declared handlers.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn into_entries(self) -> Vec<(EventName, EventHandler)> {
        self.entries
    }
}

// =============================================================================
// Dispatcher
// =============================================================================

struct Registered {
    namespace: Arc<str>,
    handler: EventHandler,
}

/// Classifies, logs, and routes every inbound event.
#[derive(Default)]
pub struct EventDispatcher {
    registry: RwLock<HashMap<EventName, Vec<Registered>>>,
}

impl EventDispatcher {
    /// Creates an empty dispatcher.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records every handler the plugin declares under its event name.
    pub fn register(&self, namespace: &str, handlers: HandlerSet) {
        let namespace: Arc<str> = Arc::from(namespace);
        let mut registry = self.registry.write();
        for (name, handler) in handlers.into_entries() {
            registry.entry(name).or_default().push(Registered {
                namespace: Arc::clone(&namespace),
                handler,
            });
        }
    }

    /// Drops every registration; used during full restart.
    pub fn clear(&self) {
        self.registry.write().clear();
    }

    /// Number of handlers registered under `name`.
    pub fn handler_count(&self, name: EventName) -> usize {
        self.registry.read().get(&name).map_or(0, Vec::len)
    }

    /// Total number of registered handlers.
    pub fn total_handlers(&self) -> usize {
        self.registry.read().values().map(Vec::len).sum()
    }

    /// Decodes a raw frame and dispatches it.
    ///
    /// Unrecognized discriminator combinations and malformed payloads are
    /// logged as anomalies and dropped, never propagated.
    pub async fn dispatch_value(&self, value: Value) {
        match parse_event(value) {
            Ok(event) => self.dispatch(event).await,
            Err(e) => warn!(error = %e, "Anomalous event dropped"),
        }
    }

    /// Routes one decoded event to its handlers.
    pub async fn dispatch(&self, event: Event) {
        log_summary(&event);

        let name = event.name();
        let event = Arc::new(event);

        // Targeted calls route to exactly one plugin.
        if let Event::Call(call) = &*event
            && let Some(target) = call.target.clone()
        {
            self.dispatch_targeted(&target, event).await;
            return;
        }

        // Snapshot the handler list so the lock is not held across awaits.
        let handlers: Vec<(Arc<str>, EventHandler)> = {
            let registry = self.registry.read();
            registry.get(&name).map_or_else(Vec::new, |entries| {
                entries
                    .iter()
                    .map(|r| (Arc::clone(&r.namespace), Arc::clone(&r.handler)))
                    .collect()
            })
        };

        if handlers.is_empty() {
            trace!(event = %name, "No handlers registered");
            return;
        }

        for (namespace, handler) in handlers {
            if let Err(e) = handler(Arc::clone(&event)).await {
                error!(
                    plugin = %namespace,
                    event = %name,
                    error = %e,
                    "Handler failed"
                );
            }
        }
    }

    /// Routes a targeted call event to the single matching plugin.
    async fn dispatch_targeted(&self, target: &str, event: Arc<Event>) {
        let matched: Option<(Arc<str>, EventHandler)> = {
            let registry = self.registry.read();
            registry.get(&EventName::Call).and_then(|entries| {
                entries
                    .iter()
                    .find(|r| &*r.namespace == target)
                    .map(|r| (Arc::clone(&r.namespace), Arc::clone(&r.handler)))
            })
        };

        let Some((namespace, handler)) = matched else {
            warn!(target = %target, "Call target has no registered handler");
            if let Event::Call(call) = &*event {
                call.reject(CallError::NoSuchTarget(target.to_string()));
            }
            return;
        };

        if let Err(e) = handler(event).await {
            // The call's own resolution stays with the handler; this only
            // keeps the dispatcher alive.
            error!(plugin = %namespace, error = %e, "Call handler failed");
        }
    }
}

/// Writes the one-line human-readable summary for an event.
fn log_summary(event: &Event) {
    match event {
        Event::Message(MessageEvent::Private(ev)) => {
            info!(
                user_id = ev.user_id,
                message_id = ev.message_id,
                "Private message from {}: {}",
                ev.sender.display_name(),
                ev.raw_message
            );
        }
        Event::Message(MessageEvent::Group(ev)) => {
            info!(
                group_id = ev.group_id,
                user_id = ev.user_id,
                message_id = ev.message_id,
                "Group message from {}: {}",
                ev.sender.display_name(),
                ev.raw_message
            );
        }
        Event::Notice(notice) => log_notice(notice),
        Event::Request(RequestEvent::Friend(ev)) => {
            info!(
                user_id = ev.user_id,
                "Friend request: {}",
                ev.comment.split_whitespace().collect::<Vec<_>>().join(" ")
            );
        }
        Event::Request(RequestEvent::Group(ev)) => {
            info!(
                group_id = ev.group_id,
                user_id = ev.user_id,
                kind = %ev.sub_type,
                "Group join request: {}",
                ev.comment.split_whitespace().collect::<Vec<_>>().join(" ")
            );
        }
        Event::Meta(MetaEvent::Heartbeat(_)) => trace!("Gateway heartbeat"),
        Event::Meta(MetaEvent::Lifecycle(ev)) => {
            info!(kind = %ev.sub_type, "Gateway lifecycle report");
        }
        Event::Call(call) => match &call.target {
            Some(target) => info!(
                from = %call.from,
                target = %target,
                method = %call.method,
                "Plugin call"
            ),
            None => info!(from = %call.from, method = %call.method, "Broadcast plugin call"),
        },
    }
}

fn log_notice(notice: &NoticeEvent) {
    match notice {
        NoticeEvent::FriendRecall(ev) => {
            info!(user_id = ev.user_id, message_id = ev.message_id, "Friend recalled a message");
        }
        NoticeEvent::GroupRecall(ev) => {
            info!(
                group_id = ev.group_id,
                operator_id = ev.operator_id,
                user_id = ev.user_id,
                message_id = ev.message_id,
                "Group message recalled"
            );
        }
        NoticeEvent::GroupIncrease(ev) => {
            info!(
                group_id = ev.group_id,
                user_id = ev.user_id,
                kind = %ev.sub_type,
                "Member joined group"
            );
        }
        NoticeEvent::GroupDecrease(ev) => {
            info!(
                group_id = ev.group_id,
                user_id = ev.user_id,
                kind = %ev.sub_type,
                "Member left group"
            );
        }
        NoticeEvent::GroupAdmin(ev) => {
            info!(
                group_id = ev.group_id,
                user_id = ev.user_id,
                kind = %ev.sub_type,
                "Group admin changed"
            );
        }
        NoticeEvent::GroupUpload(ev) => {
            info!(
                group_id = ev.group_id,
                user_id = ev.user_id,
                file = %ev.file.name,
                "Group file uploaded"
            );
        }
        NoticeEvent::GroupBan(ev) => {
            info!(
                group_id = ev.group_id,
                operator_id = ev.operator_id,
                user_id = ev.user_id,
                duration = ev.duration,
                kind = %ev.sub_type,
                "Group mute changed"
            );
        }
        NoticeEvent::FriendAdd(ev) => info!(user_id = ev.user_id, "Friend added"),
        NoticeEvent::GroupCard(ev) => {
            info!(
                group_id = ev.group_id,
                user_id = ev.user_id,
                "Group card changed: {:?} -> {:?}",
                ev.card_old,
                ev.card_new
            );
        }
        NoticeEvent::OfflineFile(ev) => {
            info!(user_id = ev.user_id, file = %ev.file.name, "Offline file received");
        }
        NoticeEvent::ClientStatus(ev) => {
            debug!(online = ev.online, "Client status changed");
        }
        NoticeEvent::Essence(ev) => {
            info!(
                group_id = ev.group_id,
                operator_id = ev.operator_id,
                message_id = ev.message_id,
                kind = %ev.sub_type,
                "Essence list changed"
            );
        }
        NoticeEvent::Poke(ev) => match ev.group_id {
            Some(group_id) => info!(
                group_id,
                user_id = ev.user_id,
                target_id = ev.target_id,
                "Poke"
            ),
            None => info!(user_id = ev.user_id, "Poked by user"),
        },
        NoticeEvent::LuckyKing(ev) => {
            info!(
                group_id = ev.group_id,
                user_id = ev.user_id,
                target_id = ev.target_id,
                "Red-packet lucky king"
            );
        }
        NoticeEvent::Honor(ev) => {
            info!(
                group_id = ev.group_id,
                user_id = ev.user_id,
                honor = %ev.honor_type,
                "Group honor granted"
            );
        }
        NoticeEvent::Title(ev) => {
            info!(
                group_id = ev.group_id,
                user_id = ev.user_id,
                title = %ev.title,
                "Group title granted"
            );
        }
    }
}
