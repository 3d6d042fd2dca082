//! Adaptor contract and reply correlation.
//!
//! An adaptor owns one transport connection. It issues outbound actions
//! tagged with a fresh correlation token, resolves the matching pending
//! future when the reply arrives, and forwards every non-reply frame to the
//! single registered message handler.
//!
//! Replies are matched strictly by token, not by send order; out-of-order
//! replies from the transport resolve the right caller. A reply whose token
//! has no pending entry is logged and dropped, never propagated.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use tokio::sync::oneshot;
use tokio::time::timeout;
use tracing::{debug, trace, warn};

use crate::error::{ActionError, ActionResult};
use crate::wire::{ActionResponse, Status};

// =============================================================================
// Adaptor Trait
// =============================================================================

/// Callback invoked for every inbound non-reply frame.
///
/// The event dispatcher installs itself here; the adaptor never interprets
/// event payloads beyond the reply/event split.
pub type MessageHandler = Arc<dyn Fn(Value) + Send + Sync>;

/// Transport-specific delivery of outbound actions.
///
/// Implemented by the WebSocket client, the WebSocket server, and the null
/// variant. All variants share the same contract: `send` either resolves
/// with exactly one reply or fails with a typed [`ActionError`]; it never
/// hangs past the adaptor timeout.
#[async_trait]
pub trait Adaptor: Send + Sync {
    /// Issues one action and awaits its single matching reply.
    async fn send(&self, action: &str, params: Value) -> ActionResult<ActionResponse>;

    /// Installs the handler for non-reply frames. The slot holds exactly
    /// one handler; a later install replaces the earlier one.
    fn set_message_handler(&self, handler: MessageHandler);

    /// Short variant name used in logs.
    fn name(&self) -> &'static str;
}

/// A shared adaptor trait object.
pub type BoxedAdaptor = Arc<dyn Adaptor>;

// =============================================================================
// Pending-call table
// =============================================================================

/// Default bound on how long a pending action may wait for its reply.
pub const DEFAULT_ACTION_TIMEOUT: Duration = Duration::from_secs(30);

/// Correlation state shared by the transport-backed adaptor variants.
///
/// Each entry is created at send time and removed exactly once: by the
/// matching reply, by timeout, or by [`reject_all`](Self::reject_all) when
/// the connection drops. Lookup-and-remove happens under a single lock so a
/// reply can never race a timeout into double delivery.
pub struct PendingCalls {
    /// Monotonically increasing echo counter.
    counter: AtomicU64,
    /// echo → sender half of the reply channel.
    pending: Mutex<HashMap<u64, oneshot::Sender<ActionResponse>>>,
    /// How long to wait for a reply before giving up.
    action_timeout: Duration,
}

impl PendingCalls {
    /// Creates a table with the default timeout.
    pub fn new() -> Self {
        Self::with_timeout(DEFAULT_ACTION_TIMEOUT)
    }

    /// Creates a table with a custom reply timeout.
    pub fn with_timeout(action_timeout: Duration) -> Self {
        Self {
            counter: AtomicU64::new(0),
            pending: Mutex::new(HashMap::new()),
            action_timeout,
        }
    }

    /// Allocates the next echo and registers its reply channel.
    ///
    /// Registration happens before the frame is written to the transport so
    /// a fast reply can never arrive ahead of its waiter.
    pub fn register(&self) -> (u64, oneshot::Receiver<ActionResponse>) {
        let echo = self.counter.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = oneshot::channel();
        self.pending.lock().insert(echo, tx);
        (echo, rx)
    }

    /// Removes a pending entry whose frame never left the host.
    pub fn forget(&self, echo: u64) {
        self.pending.lock().remove(&echo);
    }

    /// Routes a decoded reply to its waiter.
    ///
    /// Returns `false` when no entry matches: a token that already timed
    /// out, or one this host never issued. Such replies are dropped.
    pub fn complete(&self, response: ActionResponse) -> bool {
        let Some(echo) = response.echo.as_deref().and_then(|e| e.parse::<u64>().ok()) else {
            warn!(echo = ?response.echo, "Reply carried an unparseable echo, dropping");
            return false;
        };
        let waiter = self.pending.lock().remove(&echo);
        match waiter {
            Some(tx) => {
                let _ = tx.send(response);
                true
            }
            None => {
                warn!(echo, "Reply for unknown echo, dropping (already timed out?)");
                false
            }
        }
    }

    /// Rejects every outstanding call; used when the connection drops.
    ///
    /// Dropping the senders wakes each waiter with a closed channel, which
    /// [`await_reply`](Self::await_reply) surfaces as
    /// [`ActionError::NotConnected`]. No pending entry outlives its
    /// connection.
    pub fn reject_all(&self) {
        let mut pending = self.pending.lock();
        if !pending.is_empty() {
            debug!(
                count = pending.len(),
                "Rejecting pending calls on disconnect"
            );
            pending.clear();
        }
    }

    /// Awaits the reply for a registered call, bounded by the table timeout.
    ///
    /// A `status: failed` reply is surfaced as [`ActionError::Failed`] with
    /// its retcode and wording, never swallowed.
    pub async fn await_reply(
        &self,
        echo: u64,
        rx: oneshot::Receiver<ActionResponse>,
    ) -> ActionResult<ActionResponse> {
        match timeout(self.action_timeout, rx).await {
            Ok(Ok(response)) => {
                if response.status == Status::Failed {
                    Err(ActionError::from_failed(&response))
                } else {
                    Ok(response)
                }
            }
            // Sender dropped: the transport rejected us on disconnect.
            Ok(Err(_)) => Err(ActionError::NotConnected),
            Err(_) => {
                self.forget(echo);
                Err(ActionError::Timeout)
            }
        }
    }

    /// Number of calls currently awaiting a reply.
    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }
}

impl Default for PendingCalls {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Message-handler slot
// =============================================================================

/// Single message-handler slot shared by the adaptor variants.
#[derive(Default)]
pub struct HandlerSlot {
    handler: RwLock<Option<MessageHandler>>,
}

impl HandlerSlot {
    /// Creates an empty slot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs a handler, replacing any earlier one.
    pub fn set(&self, handler: MessageHandler) {
        *self.handler.write() = Some(handler);
    }

    /// Invokes the installed handler with an event frame.
    ///
    /// Frames arriving before a handler is installed are dropped with a
    /// trace log.
    pub fn relay(&self, frame: Value) {
        let handler = self.handler.read().clone();
        match handler {
            Some(handler) => handler(frame),
            None => trace!("No message handler installed, dropping event frame"),
        }
    }
}

// =============================================================================
// NullAdaptor (no-gateway variant)
// =============================================================================

/// Adaptor used when no gateway is configured.
///
/// Accepts no transport; every `send` fails deterministically so callers
/// fail fast instead of hanging. Useful in tests and for running the host
/// with plugins only.
#[derive(Default)]
pub struct NullAdaptor {
    handler: HandlerSlot,
}

impl NullAdaptor {
    /// Creates the null adaptor.
    pub fn new() -> Self {
        debug!("Null adaptor created");
        Self::default()
    }

    /// Feeds a frame to the message handler as if it came from a gateway.
    ///
    /// Debug aid: lets a host without a transport still exercise the
    /// dispatch path.
    pub fn inject(&self, frame: Value) {
        self.handler.relay(frame);
    }
}

#[async_trait]
impl Adaptor for NullAdaptor {
    async fn send(&self, action: &str, _params: Value) -> ActionResult<ActionResponse> {
        trace!(action = %action, "Null adaptor rejecting send");
        Err(ActionError::NotConnected)
    }

    fn set_message_handler(&self, handler: MessageHandler) {
        self.handler.set(handler);
    }

    fn name(&self) -> &'static str {
        "null"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn reply(echo: u64, marker: i64) -> ActionResponse {
        ActionResponse {
            status: Status::Ok,
            retcode: 0,
            msg: None,
            wording: None,
            data: json!({ "marker": marker }),
            echo: Some(echo.to_string()),
        }
    }

    #[tokio::test]
    async fn replies_match_their_own_token_out_of_order() {
        let calls = PendingCalls::new();
        let registered: Vec<_> = (0..4).map(|_| calls.register()).collect();

        // Deliver replies in reverse order.
        for (echo, _) in registered.iter().rev() {
            assert!(calls.complete(reply(*echo, *echo as i64)));
        }

        for (echo, rx) in registered {
            let response = calls.await_reply(echo, rx).await.unwrap();
            assert_eq!(response.data["marker"].as_i64(), Some(echo as i64));
        }
        assert_eq!(calls.pending_count(), 0);
    }

    #[tokio::test]
    async fn unknown_token_is_dropped_without_touching_others() {
        let calls = PendingCalls::new();
        let (echo, rx) = calls.register();

        assert!(!calls.complete(reply(echo + 100, 0)));
        assert_eq!(calls.pending_count(), 1);

        assert!(calls.complete(reply(echo, 7)));
        let response = calls.await_reply(echo, rx).await.unwrap();
        assert_eq!(response.data["marker"].as_i64(), Some(7));
    }

    #[tokio::test]
    async fn failed_reply_surfaces_typed_error() {
        let calls = PendingCalls::new();
        let (echo, rx) = calls.register();
        calls.complete(ActionResponse {
            status: Status::Failed,
            retcode: 1400,
            msg: Some("bad request".into()),
            wording: Some("rejected".into()),
            data: Value::Null,
            echo: Some(echo.to_string()),
        });

        match calls.await_reply(echo, rx).await {
            Err(ActionError::Failed { retcode, msg, wording }) => {
                assert_eq!(retcode, 1400);
                assert_eq!(msg, "bad request");
                assert_eq!(wording.as_deref(), Some("rejected"));
            }
            other => panic!("expected Failed error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn disconnect_rejects_all_pending() {
        let calls = PendingCalls::new();
        let (echo_a, rx_a) = calls.register();
        let (echo_b, rx_b) = calls.register();

        calls.reject_all();
        assert_eq!(calls.pending_count(), 0);

        assert!(matches!(
            calls.await_reply(echo_a, rx_a).await,
            Err(ActionError::NotConnected)
        ));
        assert!(matches!(
            calls.await_reply(echo_b, rx_b).await,
            Err(ActionError::NotConnected)
        ));
    }

    #[tokio::test]
    async fn timeout_removes_the_pending_entry() {
        let calls = PendingCalls::with_timeout(Duration::from_millis(10));
        let (echo, rx) = calls.register();

        assert!(matches!(
            calls.await_reply(echo, rx).await,
            Err(ActionError::Timeout)
        ));
        assert_eq!(calls.pending_count(), 0);
    }

    #[tokio::test]
    async fn null_adaptor_fails_fast() {
        let adaptor = NullAdaptor::new();
        assert!(matches!(
            adaptor.send("get_status", json!({})).await,
            Err(ActionError::NotConnected)
        ));
    }
}
