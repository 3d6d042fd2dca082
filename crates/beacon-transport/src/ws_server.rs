//! Inbound-accepted WebSocket adaptor.

use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    Router,
    extract::{
        ConnectInfo, State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    response::IntoResponse,
    routing::get,
};
use futures::{SinkExt, StreamExt};
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, trace, warn};

use beacon_core::{
    ActionError, ActionRequest, ActionResult, ActionResponse, Adaptor, HandlerSlot,
    MessageHandler, PendingCalls, TransportError, TransportResult,
};

use crate::route_frame;

/// State shared between the listener task and the adaptor handle.
struct ServerShared {
    pending: PendingCalls,
    handler: HandlerSlot,
    /// Write channel of the active gateway connection, when one exists.
    writer: RwLock<Option<mpsc::Sender<Vec<u8>>>>,
}

/// Adaptor that listens for a single gateway-initiated connection.
///
/// While a connection is active, any further connection attempt is closed
/// immediately rather than queued. While no connection is active, `send`
/// fails fast with [`ActionError::NotConnected`].
pub struct WsServerAdaptor {
    shared: Arc<ServerShared>,
    local_addr: SocketAddr,
    shutdown: Mutex<Option<oneshot::Sender<()>>>,
}

impl WsServerAdaptor {
    /// Binds the listener and spawns the accept loop.
    pub async fn listen(addr: &str, path: &str) -> TransportResult<Arc<Self>> {
        Self::listen_with(addr, path, PendingCalls::new()).await
    }

    /// Like [`listen`](Self::listen), with a custom pending-call table.
    pub async fn listen_with(
        addr: &str,
        path: &str,
        pending: PendingCalls,
    ) -> TransportResult<Arc<Self>> {
        let shared = Arc::new(ServerShared {
            pending,
            handler: HandlerSlot::new(),
            writer: RwLock::new(None),
        });

        let path = if path.starts_with('/') {
            path.to_string()
        } else {
            format!("/{path}")
        };

        let router = Router::new()
            .route(&path, get(ws_handler))
            .with_state(Arc::clone(&shared));

        let listener =
            tokio::net::TcpListener::bind(addr)
                .await
                .map_err(|e| TransportError::BindFailed {
                    addr: addr.to_string(),
                    reason: e.to_string(),
                })?;
        let local_addr = listener.local_addr().map_err(|e| TransportError::BindFailed {
            addr: addr.to_string(),
            reason: e.to_string(),
        })?;

        info!(addr = %local_addr, path = %path, "Listening for gateway connection");

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        tokio::spawn(async move {
            let server = axum::serve(
                listener,
                router.into_make_service_with_connect_info::<SocketAddr>(),
            );
            tokio::select! {
                result = server => {
                    if let Err(e) = result {
                        error!(error = %e, "Listener error");
                    }
                }
                _ = shutdown_rx => {
                    info!("Listener shutting down");
                }
            }
        });

        Ok(Arc::new(Self {
            shared,
            local_addr,
            shutdown: Mutex::new(Some(shutdown_tx)),
        }))
    }

    /// The address the listener is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Whether a gateway connection is currently active.
    pub fn is_connected(&self) -> bool {
        self.shared.writer.read().is_some()
    }

    /// Stops the listener task.
    pub fn close(&self) {
        if let Some(tx) = self.shutdown.lock().take() {
            let _ = tx.send(());
        }
    }
}

#[async_trait]
impl Adaptor for WsServerAdaptor {
    async fn send(&self, action: &str, params: Value) -> ActionResult<ActionResponse> {
        let Some(writer) = self.shared.writer.read().clone() else {
            warn!(action = %action, "No gateway connection, rejecting send");
            return Err(ActionError::NotConnected);
        };

        let (echo, rx) = self.shared.pending.register();
        let request = ActionRequest::new(action, params, echo.to_string());
        debug!(action = %action, echo, "Sending action");

        let bytes = match request.to_bytes() {
            Ok(bytes) => bytes,
            Err(e) => {
                self.shared.pending.forget(echo);
                return Err(e.into());
            }
        };
        if writer.send(bytes).await.is_err() {
            self.shared.pending.forget(echo);
            return Err(ActionError::NotConnected);
        }

        self.shared.pending.await_reply(echo, rx).await
    }

    fn set_message_handler(&self, handler: MessageHandler) {
        self.shared.handler.set(handler);
    }

    fn name(&self) -> &'static str {
        "ws-server"
    }
}

/// Upgrade handler for incoming gateway connections.
async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<ServerShared>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
) -> impl IntoResponse {
    debug!(remote_addr = %addr, "Gateway connection request");
    ws.on_upgrade(move |socket| handle_socket(socket, addr, state))
}

/// Drives one accepted gateway connection.
async fn handle_socket(socket: WebSocket, addr: SocketAddr, state: Arc<ServerShared>) {
    let (tx, mut rx) = mpsc::channel::<Vec<u8>>(256);

    // Exactly one connection may hold the writer slot; a second attempt is
    // closed here, before any frame is processed.
    {
        let mut writer = state.writer.write();
        if writer.is_some() {
            warn!(remote_addr = %addr, "Gateway already connected, rejecting connection");
            return;
        }
        *writer = Some(tx);
    }

    info!(remote_addr = %addr, "Gateway connection established");

    let (mut ws_tx, mut ws_rx) = socket.split();

    let send_task = tokio::spawn(async move {
        while let Some(data) = rx.recv().await {
            let msg = Message::Text(String::from_utf8_lossy(&data).to_string().into());
            if ws_tx.send(msg).await.is_err() {
                break;
            }
        }
    });

    while let Some(inbound) = ws_rx.next().await {
        match inbound {
            Ok(Message::Text(text)) => {
                trace!(len = text.len(), "Frame received");
                route_frame(text.as_str(), &state.pending, &state.handler);
            }
            Ok(Message::Binary(data)) => {
                if let Ok(text) = std::str::from_utf8(&data) {
                    route_frame(text, &state.pending, &state.handler);
                } else {
                    warn!("Dropping non-UTF-8 binary frame");
                }
            }
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {}
            Ok(Message::Close(_)) => {
                info!(remote_addr = %addr, "Gateway closed the connection");
                break;
            }
            Err(e) => {
                warn!(remote_addr = %addr, error = %e, "Connection error");
                break;
            }
        }
    }

    send_task.abort();
    *state.writer.write() = None;
    state.pending.reject_all();
    info!(remote_addr = %addr, "Gateway connection closed");
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::{SinkExt, StreamExt};
    use serde_json::json;
    use std::time::Duration;
    use tokio_tungstenite::{connect_async, tungstenite};

    async fn wait_connected(adaptor: &WsServerAdaptor) {
        for _ in 0..100 {
            if adaptor.is_connected() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("gateway connection never became active");
    }

    #[tokio::test]
    async fn send_without_connection_fails_fast() {
        let adaptor = WsServerAdaptor::listen("127.0.0.1:0", "/gateway")
            .await
            .unwrap();
        assert!(matches!(
            adaptor.send("get_status", json!({})).await,
            Err(ActionError::NotConnected)
        ));
        adaptor.close();
    }

    #[tokio::test]
    async fn roundtrip_and_event_relay() {
        let adaptor = WsServerAdaptor::listen("127.0.0.1:0", "/gateway")
            .await
            .unwrap();
        let url = format!("ws://{}/gateway", adaptor.local_addr());

        let (event_tx, mut event_rx) = mpsc::unbounded_channel::<Value>();
        adaptor.set_message_handler(Arc::new(move |value| {
            let _ = event_tx.send(value);
        }));

        let (mut gateway, _) = connect_async(&url).await.unwrap();
        wait_connected(&adaptor).await;

        // Issue an action and answer it from the gateway side.
        let sender = Arc::clone(&adaptor);
        let call = tokio::spawn(async move {
            sender.send("get_status", json!({"probe": true})).await
        });

        let frame = gateway.next().await.unwrap().unwrap();
        let request: Value = serde_json::from_str(frame.to_text().unwrap()).unwrap();
        assert_eq!(request["action"], "get_status");
        let reply = json!({
            "status": "ok",
            "retcode": 0,
            "data": {"good": true},
            "echo": request["echo"],
        });
        gateway
            .send(tungstenite::Message::Text(reply.to_string().into()))
            .await
            .unwrap();

        let response = call.await.unwrap().unwrap();
        assert_eq!(response.data["good"], true);

        // An unsolicited frame reaches the message handler.
        let event = json!({"post_type": "meta_event", "meta_event_type": "heartbeat"});
        gateway
            .send(tungstenite::Message::Text(event.to_string().into()))
            .await
            .unwrap();
        let relayed = tokio::time::timeout(Duration::from_secs(2), event_rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(relayed["post_type"], "meta_event");

        adaptor.close();
    }

    #[tokio::test]
    async fn second_connection_is_rejected() {
        let adaptor = WsServerAdaptor::listen("127.0.0.1:0", "/gateway")
            .await
            .unwrap();
        let url = format!("ws://{}/gateway", adaptor.local_addr());

        let (_first, _) = connect_async(&url).await.unwrap();
        wait_connected(&adaptor).await;

        let (mut second, _) = connect_async(&url).await.unwrap();
        // The server drops the second socket without installing it.
        let outcome = tokio::time::timeout(Duration::from_secs(2), second.next()).await;
        match outcome {
            Ok(None) => {}
            Ok(Some(Ok(tungstenite::Message::Close(_)))) => {}
            Ok(Some(Err(_))) => {}
            other => panic!("second connection was serviced: {other:?}"),
        }

        adaptor.close();
    }
}
