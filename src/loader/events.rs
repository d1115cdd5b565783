//! Asynchronous notices from the socket side.
//!
//! The realtime hub reports problems and progress over an unbounded channel.
//! A single bridge task drains it into the log; nothing on this path can stop
//! the server.

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::observability::metrics;

/// Log target for socket notices.
pub const REALTIME_TARGET: &str = "api_orchestrator::realtime";

/// A notice raised by the socket collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SocketEvent {
    Error(String),
    Status(String),
}

impl SocketEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            SocketEvent::Error(_) => "error",
            SocketEvent::Status(_) => "status",
        }
    }
}

pub type EventSender = mpsc::UnboundedSender<SocketEvent>;
pub type EventReceiver = mpsc::UnboundedReceiver<SocketEvent>;

pub fn channel() -> (EventSender, EventReceiver) {
    mpsc::unbounded_channel()
}

/// Forward every notice to the log until all senders are gone.
pub fn spawn_notice_bridge(mut events: EventReceiver) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            metrics::record_socket_notice(event.kind());
            match event {
                SocketEvent::Error(message) => {
                    tracing::error!(target: REALTIME_TARGET, error = %message, "Socket error");
                }
                SocketEvent::Status(message) => {
                    tracing::info!(target: REALTIME_TARGET, "{}", message);
                }
            }
        }
        tracing::debug!(target: REALTIME_TARGET, "Socket notice channel closed");
    })
}
