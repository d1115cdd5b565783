//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::io;
use std::sync::Arc;

use api_orchestrator::config::Environment;
use api_orchestrator::http::ParsedBody;
use api_orchestrator::session::{Cookies, Session};
use api_orchestrator::{
    ApiModule, Envelope, OrchestratorBuilder, Orchestrator, ProcessRegistry, SocketClient,
    SocketModule,
};
use async_trait::async_trait;
use axum::extract::Extension;
use axum::routing::{get, post};
use axum::{Json, Router};
use parking_lot::Mutex;
use serde_json::{json, Value};
use tracing::subscriber::DefaultGuard;

/// Builder listening on an ephemeral localhost port with a private registry.
pub fn builder(overrides: Value) -> (OrchestratorBuilder, Arc<ProcessRegistry>) {
    let registry = Arc::new(ProcessRegistry::new());
    let mut merged = json!({ "listen": { "host": "127.0.0.1", "port": 0 } });
    api_orchestrator::config::merge_values(&mut merged, overrides);
    let builder = Orchestrator::builder()
        .environment(Environment::Development)
        .secret("integration-secret")
        .overrides(merged)
        .registry(Arc::clone(&registry));
    (builder, registry)
}

/// Collects formatted log output.
#[derive(Clone, Default)]
pub struct LogCapture {
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl LogCapture {
    /// Capture everything logged on this thread until the guard drops.
    pub fn install() -> (Self, DefaultGuard) {
        let capture = Self::default();
        let writer = capture.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .with_max_level(tracing::Level::DEBUG)
            .finish();
        let guard = tracing::subscriber::set_default(subscriber);
        (capture, guard)
    }

    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.buffer.lock()).into_owned()
    }

    /// Lines at `level` (e.g. `"WARN"`).
    pub fn lines_at(&self, level: &str) -> Vec<String> {
        let marker = format!(" {level} ");
        self.contents()
            .lines()
            .filter(|line| line.contains(&marker))
            .map(String::from)
            .collect()
    }
}

impl io::Write for LogCapture {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// `api/users.rs`: echo bodies, expose cookies and a session counter.
pub struct UsersApi;

impl ApiModule for UsersApi {
    fn source(&self) -> &str {
        "api/users.rs"
    }

    fn router(&self) -> Router {
        Router::new()
            .route("/", get(|| async { Json(json!(["alice", "bob"])) }))
            .route(
                "/echo",
                post(|ParsedBody(body): ParsedBody| async move { Json(body) }),
            )
            .route(
                "/theme",
                get(|Extension(cookies): Extension<Cookies>| async move {
                    cookies.get("theme").unwrap_or("none").to_string()
                }),
            )
            .route(
                "/visits",
                get(|session: Session| async move {
                    let visits = session.get::<u64>("visits").unwrap_or(0) + 1;
                    session.insert("visits", visits).unwrap();
                    visits.to_string()
                }),
            )
    }
}

/// `tests/users.rs`: never selected by discovery.
pub struct StrayApi;

impl ApiModule for StrayApi {
    fn source(&self) -> &str {
        "tests/users.rs"
    }

    fn router(&self) -> Router {
        Router::new().route("/stray", get(|| async { "stray" }))
    }
}

/// Chat namespace: `say` is broadcast, `whoami` answers the sender only.
pub struct ChatSocket;

#[async_trait]
impl SocketModule for ChatSocket {
    fn namespace(&self) -> &str {
        "chat"
    }

    async fn on_connect(&self, client: &SocketClient) {
        client.emit("welcome", json!({ "id": client.id() }));
    }

    async fn on_event(&self, client: &SocketClient, envelope: Envelope) {
        match envelope.event.as_str() {
            "say" => {
                client.broadcast("said", envelope.data);
            }
            "whoami" => {
                client.emit("you", json!(client.id()));
            }
            _ => {}
        }
    }
}
