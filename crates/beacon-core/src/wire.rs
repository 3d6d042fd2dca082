//! Wire codec for the gateway action/event protocol.
//!
//! Frames are JSON objects. Outbound: `{action, params, echo}`. Inbound
//! frames come in two shapes, split by the presence of the correlation
//! `echo` field:
//!
//! - **Reply**: carries `echo`, answers exactly one outbound action.
//! - **Event**: no `echo`, an unsolicited notification.
//!
//! All 64-bit identifiers (`user_id`, `group_id`, `message_id`, …) are
//! modelled as `i64` and round-trip exactly; the codec never coerces them
//! through floating point.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{CodecError, CodecResult};

// =============================================================================
// Outbound
// =============================================================================

/// An outbound action frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionRequest {
    /// Protocol action name (e.g. `"send_private_msg"`).
    pub action: String,
    /// JSON parameters for the action.
    pub params: Value,
    /// Correlation token, rendered as a decimal string to survive any
    /// peer that parses numbers as doubles.
    pub echo: String,
}

impl ActionRequest {
    /// Creates a new action frame.
    pub fn new(action: impl Into<String>, params: Value, echo: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            params,
            echo: echo.into(),
        }
    }

    /// Serializes the frame for the transport.
    pub fn to_bytes(&self) -> CodecResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }
}

// =============================================================================
// Inbound
// =============================================================================

/// Reply status reported by the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    /// The action completed successfully.
    Ok,
    /// The action was accepted and will complete asynchronously.
    Async,
    /// The action failed; see `retcode`/`msg`/`wording`.
    Failed,
}

/// A reply to one outbound action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionResponse {
    /// Reply status.
    pub status: Status,
    /// Return code (0 for success).
    pub retcode: i64,
    /// Machine-oriented error text (present on failure).
    #[serde(default)]
    pub msg: Option<String>,
    /// Human-oriented error text (present on failure).
    #[serde(default)]
    pub wording: Option<String>,
    /// Opaque response payload.
    #[serde(default)]
    pub data: Value,
    /// Correlation token echoed back from the request.
    #[serde(default)]
    pub echo: Option<String>,
}

impl ActionResponse {
    /// Whether the action succeeded.
    pub fn is_ok(&self) -> bool {
        self.status == Status::Ok && self.retcode == 0
    }
}

/// One classified inbound frame.
#[derive(Debug, Clone)]
pub enum Frame {
    /// A reply carrying a correlation token.
    Reply(ActionResponse),
    /// An unsolicited event payload.
    Event(Value),
}

/// Classifies a raw inbound frame.
///
/// A frame with a non-null `echo` key is a reply; anything else is an event
/// to be handed to the registered message handler.
pub fn decode_frame(raw: &str) -> CodecResult<Frame> {
    let value: Value = serde_json::from_str(raw)?;
    if !value.is_object() {
        return Err(CodecError::NotAnObject);
    }
    if value.get("echo").is_some_and(|e| !e.is_null()) {
        Ok(Frame::Reply(serde_json::from_value(value)?))
    } else {
        Ok(Frame::Event(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_serializes_expected_shape() {
        let req = ActionRequest::new(
            "send_private_msg",
            serde_json::json!({"user_id": 42, "message": "hi"}),
            "7",
        );
        let value: Value = serde_json::from_slice(&req.to_bytes().unwrap()).unwrap();
        assert_eq!(value["action"], "send_private_msg");
        assert_eq!(value["params"]["user_id"], 42);
        assert_eq!(value["echo"], "7");
    }

    #[test]
    fn frame_with_echo_is_reply() {
        let raw = r#"{"status":"ok","retcode":0,"data":{"message_id":1},"echo":"3"}"#;
        match decode_frame(raw).unwrap() {
            Frame::Reply(resp) => {
                assert!(resp.is_ok());
                assert_eq!(resp.echo.as_deref(), Some("3"));
            }
            Frame::Event(_) => panic!("expected reply"),
        }
    }

    #[test]
    fn frame_without_echo_is_event() {
        let raw = r#"{"post_type":"message","message_type":"private","user_id":1}"#;
        match decode_frame(raw).unwrap() {
            Frame::Event(value) => assert_eq!(value["post_type"], "message"),
            Frame::Reply(_) => panic!("expected event"),
        }
    }

    #[test]
    fn failed_status_parses() {
        let raw = r#"{"status":"failed","retcode":1400,"msg":"bad request","wording":"invalid","data":null,"echo":"0"}"#;
        match decode_frame(raw).unwrap() {
            Frame::Reply(resp) => {
                assert_eq!(resp.status, Status::Failed);
                assert_eq!(resp.retcode, 1400);
                assert!(!resp.is_ok());
            }
            Frame::Event(_) => panic!("expected reply"),
        }
    }

    #[test]
    fn wide_identifiers_survive_the_codec() {
        // One above the largest double-exact integer; a float path would
        // round it to ...992.
        let raw = r#"{"post_type":"notice","user_id":9007199254740993,"time":1700000000}"#;
        match decode_frame(raw).unwrap() {
            Frame::Event(value) => {
                assert_eq!(value["user_id"].as_i64(), Some(9_007_199_254_740_993));
            }
            Frame::Reply(_) => panic!("expected event"),
        }
    }

    #[test]
    fn null_echo_is_not_a_reply() {
        let raw = r#"{"post_type":"meta_event","echo":null}"#;
        assert!(matches!(decode_frame(raw).unwrap(), Frame::Event(_)));
    }
}
