//! # Beacon Core
//!
//! The core engine of the Beacon bot host.
//!
//! This crate provides the protocol-facing building blocks the rest of the
//! host is assembled from:
//!
//! - **Wire codec** ([`wire`]): the JSON action/event protocol, with the
//!   reply/event split keyed on the correlation `echo` field and exact
//!   64-bit identifier handling.
//! - **Adaptor** ([`adaptor`]): transport-specific delivery of outbound
//!   actions and correlation of their replies through a pending-call table.
//!   Ships the [`NullAdaptor`]; the WebSocket variants live in
//!   `beacon-transport`.
//! - **Event model** ([`event`]): the closed, exhaustively matched union of
//!   everything the gateway can report.
//! - **Call envelope** ([`call`]): the same-process RPC event one plugin
//!   uses to invoke another.
//!
//! ## Data flow
//!
//! ```text
//! ┌───────────┐  frames   ┌──────────┐  replies   ┌──────────────┐
//! │  gateway  │──────────▶│  Adaptor │───────────▶│ pending call │
//! │           │◀──────────│          │            │    table     │
//! └───────────┘  actions  └────┬─────┘            └──────────────┘
//!                              │ events
//!                              ▼
//!                       message handler (the dispatcher)
//! ```
//!
//! One adaptor, one dispatcher and one plugin manager are constructed at
//! boot and threaded through explicitly; there is no ambient global state.

pub mod adaptor;
pub mod call;
pub mod error;
pub mod event;
pub mod wire;

pub use adaptor::{
    Adaptor, BoxedAdaptor, DEFAULT_ACTION_TIMEOUT, HandlerSlot, MessageHandler, NullAdaptor,
    PendingCalls,
};
pub use call::{CallError, CallEvent, CallResult, await_resolution};
pub use error::{
    ActionError, ActionResult, CodecError, CodecResult, TransportError, TransportResult,
};
pub use event::{Event, EventError, EventName, Origin, parse_event};
pub use wire::{ActionRequest, ActionResponse, Frame, Status, decode_frame};
