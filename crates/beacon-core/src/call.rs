//! Same-process call envelope.
//!
//! A call event lets one plugin invoke a method exposed by another without
//! touching the transport. The caller supplies a resolve/reject pair; the
//! dispatcher routes the envelope to the target plugin's handler, which is
//! responsible for settling it.

use std::fmt;

use parking_lot::Mutex;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::oneshot;

/// Errors surfaced to the caller of a plugin-to-plugin call.
#[derive(Debug, Clone, Error)]
pub enum CallError {
    /// No loaded plugin matches the targeted namespace.
    #[error("no such call target: {0}")]
    NoSuchTarget(String),

    /// The handler rejected the call.
    #[error("call rejected: {0}")]
    Rejected(String),

    /// The envelope was discarded before anyone settled it.
    #[error("call dropped without resolution")]
    Dropped,
}

/// Outcome of a call, as observed by the caller.
pub type CallResult = Result<Value, CallError>;

/// A same-process RPC envelope.
///
/// The resolve/reject pair lives in a take-once responder: the first
/// settlement wins and later ones are no-ops. If the envelope is dropped
/// unsettled, the awaiting caller observes [`CallError::Dropped`] rather
/// than hanging.
pub struct CallEvent {
    /// Namespace of the calling plugin.
    pub from: String,
    /// Target namespace; `None` broadcasts to every call handler.
    pub target: Option<String>,
    /// Method name exposed by the target.
    pub method: String,
    /// Call parameters.
    pub params: Value,
    responder: Mutex<Option<oneshot::Sender<CallResult>>>,
}

impl CallEvent {
    /// Creates the envelope together with the future its caller awaits.
    pub fn new(
        from: impl Into<String>,
        target: Option<String>,
        method: impl Into<String>,
        params: Value,
    ) -> (Self, oneshot::Receiver<CallResult>) {
        let (tx, rx) = oneshot::channel();
        let event = Self {
            from: from.into(),
            target,
            method: method.into(),
            params,
            responder: Mutex::new(Some(tx)),
        };
        (event, rx)
    }

    /// Resolves the call with a value. No-op once settled.
    pub fn resolve(&self, value: Value) {
        self.settle(Ok(value));
    }

    /// Rejects the call. No-op once settled.
    pub fn reject(&self, error: CallError) {
        self.settle(Err(error));
    }

    /// Whether a resolution has already been delivered.
    pub fn is_settled(&self) -> bool {
        self.responder.lock().is_none()
    }

    fn settle(&self, result: CallResult) {
        if let Some(tx) = self.responder.lock().take() {
            let _ = tx.send(result);
        }
    }
}

impl fmt::Debug for CallEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallEvent")
            .field("from", &self.from)
            .field("target", &self.target)
            .field("method", &self.method)
            .field("settled", &self.is_settled())
            .finish_non_exhaustive()
    }
}

/// Awaits a call receiver, mapping a dropped envelope to
/// [`CallError::Dropped`].
pub async fn await_resolution(rx: oneshot::Receiver<CallResult>) -> CallResult {
    rx.await.unwrap_or(Err(CallError::Dropped))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn first_settlement_wins() {
        let (event, rx) = CallEvent::new("a", Some("b".into()), "ping", Value::Null);
        event.resolve(json!("pong"));
        assert!(event.is_settled());

        // Later settlements are no-ops.
        event.reject(CallError::Rejected("too late".into()));

        assert_eq!(await_resolution(rx).await.unwrap(), json!("pong"));
    }

    #[tokio::test]
    async fn dropped_envelope_rejects_the_caller() {
        let (event, rx) = CallEvent::new("a", None, "ping", Value::Null);
        drop(event);
        assert!(matches!(
            await_resolution(rx).await,
            Err(CallError::Dropped)
        ));
    }
}
