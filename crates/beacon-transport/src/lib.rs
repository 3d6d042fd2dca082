//! # Beacon Transport
//!
//! WebSocket transports for the Beacon bot host. Both variants implement
//! the core [`Adaptor`](beacon_core::Adaptor) contract:
//!
//! - [`WsClientAdaptor`], **outbound-initiated**: the host opens and
//!   maintains the socket to the gateway, reconnecting with capped
//!   exponential backoff.
//! - [`WsServerAdaptor`], **inbound-accepted**: the host listens and
//!   accepts a single gateway-initiated connection; further connection
//!   attempts while one is active are rejected, not queued.
//!
//! Both variants bulk-reject their pending calls whenever the connection
//! drops, so no caller is left awaiting a reply that can never arrive.

mod ws_client;
mod ws_server;

pub use ws_client::{ReconnectPolicy, WsClientAdaptor};
pub use ws_server::WsServerAdaptor;

use beacon_core::{Frame, HandlerSlot, PendingCalls, decode_frame};
use tracing::warn;

/// Routes one raw inbound frame to the pending table or the message handler.
///
/// Decode failures are logged and dropped; nothing may panic the transport
/// read loop.
pub(crate) fn route_frame(raw: &str, pending: &PendingCalls, handler: &HandlerSlot) {
    match decode_frame(raw) {
        Ok(Frame::Reply(response)) => {
            pending.complete(response);
        }
        Ok(Frame::Event(value)) => handler.relay(value),
        Err(e) => warn!(error = %e, "Dropping undecodable frame"),
    }
}
