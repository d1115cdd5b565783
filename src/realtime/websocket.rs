//! WebSocket attach point for the realtime hub.
//!
//! # Data Flow
//! ```text
//! GET {path}/{namespace} (Upgrade: websocket)
//!     → 503 until the hub is connected, 404 for unknown namespaces
//!     → client task: frames ⇄ Envelope, namespace broadcasts, direct emits
//! ```
//!
//! # Design Decisions
//! - Text frames carry JSON envelopes; anything else is ignored except Close
//! - A malformed frame is a notice, not a disconnect
//! - A lagging client skips missed broadcasts and stays connected

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::{broadcast, mpsc};

use crate::loader::events::SocketEvent;
use crate::realtime::hub::{Envelope, Namespace, RealtimeHandle, SocketClient};

/// Router serving every namespace below `path`.
pub fn socket_router(path: &str, handle: RealtimeHandle) -> Router {
    let base = path.trim_end_matches('/');
    Router::new()
        .route(&format!("{base}/{{namespace}}"), get(upgrade))
        .with_state(handle)
}

async fn upgrade(
    State(handle): State<RealtimeHandle>,
    Path(namespace): Path<String>,
    ws: WebSocketUpgrade,
) -> Response {
    if !handle.is_ready() {
        return (StatusCode::SERVICE_UNAVAILABLE, "realtime not connected").into_response();
    }

    let Some(ns) = handle.namespace(&namespace) else {
        return (StatusCode::NOT_FOUND, "unknown namespace").into_response();
    };

    ws.on_upgrade(move |socket| run_client(socket, namespace, ns, handle))
}

async fn run_client(
    socket: WebSocket,
    name: String,
    namespace: Arc<Namespace>,
    handle: RealtimeHandle,
) {
    let (mut sink, mut stream) = socket.split();
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Envelope>();
    let mut broadcasts = namespace.sender.subscribe();

    let client = SocketClient::new(&name, outbound_tx, handle.clone());
    namespace.client_joined();
    tracing::debug!(client = client.id(), namespace = %name, "Socket client connected");
    namespace.module.on_connect(&client).await;

    loop {
        let outgoing = tokio::select! {
            frame = stream.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    match serde_json::from_str::<Envelope>(text.as_str()) {
                        Ok(envelope) => namespace.module.on_event(&client, envelope).await,
                        Err(e) => handle.notify(SocketEvent::Error(format!(
                            "malformed frame from client {} on '{name}': {e}",
                            client.id()
                        ))),
                    }
                    continue;
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => continue,
                Some(Err(e)) => {
                    handle.notify(SocketEvent::Error(format!(
                        "socket error for client {}: {e}",
                        client.id()
                    )));
                    break;
                }
            },
            broadcast = broadcasts.recv() => match broadcast {
                Ok(envelope) => envelope,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    handle.notify(SocketEvent::Status(format!(
                        "client {} on '{name}' lagged, skipped {skipped} messages",
                        client.id()
                    )));
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            direct = outbound_rx.recv() => match direct {
                Some(envelope) => envelope,
                None => break,
            },
        };

        let text = match serde_json::to_string(&outgoing) {
            Ok(text) => text,
            Err(e) => {
                handle.notify(SocketEvent::Error(format!("unserializable envelope: {e}")));
                continue;
            }
        };
        if sink.send(Message::Text(text.into())).await.is_err() {
            break;
        }
    }

    namespace.module.on_disconnect(&client).await;
    namespace.client_left();
    tracing::debug!(client = client.id(), namespace = %name, "Socket client disconnected");
}
