//! Unified error types for the Beacon core.
//!
//! Transport and codec failures stay local to the adaptor and the specific
//! in-flight request; nothing here is allowed to escape as a process-fatal
//! fault.

use thiserror::Error;

use crate::wire::ActionResponse;

// =============================================================================
// Codec Errors
// =============================================================================

/// Errors raised while encoding or decoding wire frames.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The frame was not valid JSON, or did not match the expected shape.
    #[error("malformed frame: {0}")]
    Malformed(#[from] serde_json::Error),

    /// The frame decoded to something other than a JSON object.
    #[error("frame is not a JSON object")]
    NotAnObject,
}

// =============================================================================
// Transport Errors
// =============================================================================

/// Errors that can occur in transport operations.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// Connection failed.
    #[error("connection failed: {url} - {reason}")]
    ConnectionFailed {
        /// The URL that failed to connect.
        url: String,
        /// Reason for failure.
        reason: String,
    },

    /// Listener could not be bound.
    #[error("bind failed: {addr} - {reason}")]
    BindFailed {
        /// The address that failed to bind.
        addr: String,
        /// Reason for failure.
        reason: String,
    },

    /// Connection closed.
    #[error("connection closed: {reason}")]
    ConnectionClosed {
        /// Reason for closure.
        reason: String,
    },

    /// Frame send failed.
    #[error("failed to send frame: {0}")]
    SendFailed(String),
}

// =============================================================================
// Action Errors
// =============================================================================

/// Errors surfaced to a caller awaiting an action reply.
#[derive(Debug, Error)]
pub enum ActionError {
    /// No transport is connected; the send fails fast instead of hanging.
    #[error("adaptor is not connected")]
    NotConnected,

    /// No reply arrived within the adaptor timeout.
    #[error("action timed out")]
    Timeout,

    /// The gateway replied with `status: failed`.
    #[error("action failed ({retcode}): {msg}")]
    Failed {
        /// Machine-readable return code from the gateway.
        retcode: i64,
        /// Machine-oriented error text.
        msg: String,
        /// Human-oriented error text, when the gateway provides one.
        wording: Option<String>,
    },

    /// The outbound frame could not be serialized.
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// The transport failed while the request was in flight.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl ActionError {
    /// Builds the typed error for a `status: failed` reply.
    pub fn from_failed(response: &ActionResponse) -> Self {
        Self::Failed {
            retcode: response.retcode,
            msg: response.msg.clone().unwrap_or_else(|| "unknown error".into()),
            wording: response.wording.clone(),
        }
    }
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;

/// Result type for outbound actions.
pub type ActionResult<T> = Result<T, ActionError>;
