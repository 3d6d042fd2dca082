//! Outbound-initiated WebSocket adaptor.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};
use tracing::{debug, info, trace, warn};

use beacon_core::{
    ActionError, ActionRequest, ActionResult, ActionResponse, Adaptor, HandlerSlot,
    MessageHandler, PendingCalls, TransportError, TransportResult,
};

use crate::route_frame;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;
type WsSource = SplitStream<WsStream>;

/// Reconnect behaviour for the client adaptor.
#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    /// Whether to reconnect after the connection drops.
    pub auto_reconnect: bool,
    /// Delay before the first reconnect attempt.
    pub initial_delay: Duration,
    /// Upper bound on the backoff delay.
    pub max_delay: Duration,
    /// Backoff multiplier applied after each failed attempt.
    pub multiplier: f64,
    /// Give up after this many consecutive failures (`None` = retry forever).
    pub max_retries: Option<u32>,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            auto_reconnect: true,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
            max_retries: None,
        }
    }
}

impl ReconnectPolicy {
    /// Next backoff delay after a failed attempt.
    fn next_delay(&self, current: Duration) -> Duration {
        std::cmp::min(
            Duration::from_secs_f64(current.as_secs_f64() * self.multiplier),
            self.max_delay,
        )
    }
}

/// Adaptor that opens and maintains the socket to the gateway.
///
/// The connection is driven by a background task; `send` fails fast with
/// [`ActionError::NotConnected`] while the link is down, and every pending
/// call is bulk-rejected the moment the link drops.
pub struct WsClientAdaptor {
    url: String,
    writer: mpsc::Sender<Vec<u8>>,
    pending: Arc<PendingCalls>,
    handler: Arc<HandlerSlot>,
    connected: Arc<AtomicBool>,
    shutdown: watch::Sender<bool>,
}

impl WsClientAdaptor {
    /// Connects to the gateway and spawns the connection loop.
    ///
    /// Fails when the initial connection cannot be established; after that,
    /// reconnects are governed by the [`ReconnectPolicy`].
    pub async fn connect(url: &str, policy: ReconnectPolicy) -> TransportResult<Arc<Self>> {
        Self::connect_with(url, policy, PendingCalls::new()).await
    }

    /// Like [`connect`](Self::connect), with a custom pending-call table
    /// (used to shorten the reply timeout).
    pub async fn connect_with(
        url: &str,
        policy: ReconnectPolicy,
        pending: PendingCalls,
    ) -> TransportResult<Arc<Self>> {
        info!(url = %url, "Connecting to gateway");
        let (stream, _response) =
            connect_async(url)
                .await
                .map_err(|e| TransportError::ConnectionFailed {
                    url: url.to_string(),
                    reason: e.to_string(),
                })?;
        let (ws_tx, ws_rx) = stream.split();

        let (writer, message_rx) = mpsc::channel::<Vec<u8>>(256);
        let (shutdown, shutdown_rx) = watch::channel(false);

        let adaptor = Arc::new(Self {
            url: url.to_string(),
            writer,
            pending: Arc::new(pending),
            handler: Arc::new(HandlerSlot::new()),
            connected: Arc::new(AtomicBool::new(true)),
            shutdown,
        });

        info!(url = %url, "Gateway connection established");

        tokio::spawn(run_client_loop(
            ws_tx,
            ws_rx,
            message_rx,
            shutdown_rx,
            adaptor.url.clone(),
            policy,
            Arc::clone(&adaptor.pending),
            Arc::clone(&adaptor.handler),
            Arc::clone(&adaptor.connected),
        ));

        Ok(adaptor)
    }

    /// Signals the connection loop to close the socket and stop.
    pub fn close(&self) {
        let _ = self.shutdown.send(true);
    }

    /// Whether the link is currently up.
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Adaptor for WsClientAdaptor {
    async fn send(&self, action: &str, params: Value) -> ActionResult<ActionResponse> {
        if !self.is_connected() {
            warn!(action = %action, "Send while disconnected, rejecting");
            return Err(ActionError::NotConnected);
        }

        let (echo, rx) = self.pending.register();
        let request = ActionRequest::new(action, params, echo.to_string());
        debug!(action = %action, echo, "Sending action");

        let bytes = match request.to_bytes() {
            Ok(bytes) => bytes,
            Err(e) => {
                self.pending.forget(echo);
                return Err(e.into());
            }
        };
        if self.writer.send(bytes).await.is_err() {
            self.pending.forget(echo);
            return Err(ActionError::NotConnected);
        }

        self.pending.await_reply(echo, rx).await
    }

    fn set_message_handler(&self, handler: MessageHandler) {
        self.handler.set(handler);
    }

    fn name(&self) -> &'static str {
        "ws-client"
    }
}

/// Connection loop: pumps outbound frames, routes inbound ones, reconnects.
#[allow(clippy::too_many_arguments)]
async fn run_client_loop(
    mut ws_tx: WsSink,
    mut ws_rx: WsSource,
    mut message_rx: mpsc::Receiver<Vec<u8>>,
    mut shutdown_rx: watch::Receiver<bool>,
    url: String,
    policy: ReconnectPolicy,
    pending: Arc<PendingCalls>,
    handler: Arc<HandlerSlot>,
    connected: Arc<AtomicBool>,
) {
    loop {
        tokio::select! {
            _ = shutdown_rx.changed() => {
                if *shutdown_rx.borrow() {
                    info!(url = %url, "Client adaptor shutting down");
                    let _ = ws_tx.close().await;
                    connected.store(false, Ordering::SeqCst);
                    pending.reject_all();
                    break;
                }
            }

            Some(data) = message_rx.recv() => {
                let msg = Message::Text(String::from_utf8_lossy(&data).to_string().into());
                if let Err(e) = ws_tx.send(msg).await {
                    warn!(error = %e, "Failed to write frame");
                }
            }

            inbound = ws_rx.next() => {
                match inbound {
                    Some(Ok(Message::Text(text))) => {
                        trace!(len = text.len(), "Frame received");
                        route_frame(text.as_str(), &pending, &handler);
                    }
                    Some(Ok(Message::Binary(data))) => {
                        if let Ok(text) = std::str::from_utf8(&data) {
                            route_frame(text, &pending, &handler);
                        } else {
                            warn!("Dropping non-UTF-8 binary frame");
                        }
                    }
                    Some(Ok(Message::Ping(data))) => {
                        let _ = ws_tx.send(Message::Pong(data)).await;
                    }
                    Some(Ok(Message::Pong(_))) => {}
                    Some(Ok(Message::Close(_))) | Some(Ok(Message::Frame(_))) | None => {
                        info!(url = %url, "Gateway closed the connection");
                        connected.store(false, Ordering::SeqCst);
                        pending.reject_all();
                        match try_reconnect(&url, &policy).await {
                            Some((new_tx, new_rx)) => {
                                ws_tx = new_tx;
                                ws_rx = new_rx;
                                connected.store(true, Ordering::SeqCst);
                            }
                            None => break,
                        }
                    }
                    Some(Err(e)) => {
                        warn!(url = %url, error = %e, "Connection error");
                        connected.store(false, Ordering::SeqCst);
                        pending.reject_all();
                        match try_reconnect(&url, &policy).await {
                            Some((new_tx, new_rx)) => {
                                ws_tx = new_tx;
                                ws_rx = new_rx;
                                connected.store(true, Ordering::SeqCst);
                            }
                            None => break,
                        }
                    }
                }
            }
        }
    }
}

/// Reconnects with capped exponential backoff.
///
/// Returns the new stream halves, or `None` when the policy forbids
/// reconnecting or the retry budget is exhausted.
async fn try_reconnect(url: &str, policy: &ReconnectPolicy) -> Option<(WsSink, WsSource)> {
    if !policy.auto_reconnect {
        return None;
    }

    let mut delay = policy.initial_delay;
    let mut attempts = 0u32;

    loop {
        if let Some(max) = policy.max_retries
            && attempts >= max
        {
            warn!(url = %url, attempts, "Reconnect budget exhausted, giving up");
            return None;
        }

        warn!(url = %url, delay = ?delay, "Reconnecting");
        tokio::time::sleep(delay).await;

        match connect_async(url).await {
            Ok((stream, _)) => {
                info!(url = %url, "Reconnected");
                return Some(stream.split());
            }
            Err(e) => {
                warn!(url = %url, error = %e, "Reconnect attempt failed");
                attempts += 1;
                delay = policy.next_delay(delay);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_is_capped() {
        let policy = ReconnectPolicy {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(8),
            multiplier: 3.0,
            ..Default::default()
        };
        let d1 = policy.next_delay(policy.initial_delay);
        let d2 = policy.next_delay(d1);
        assert_eq!(d1, Duration::from_secs(3));
        assert_eq!(d2, Duration::from_secs(8));
    }
}
