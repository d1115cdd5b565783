//! Lifecycle tests: initialization, configuration callbacks, startup.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use api_orchestrator::error::{ConfigError, Error, LifecycleError, StartupError};
use api_orchestrator::http::Stage;
use api_orchestrator::registry::REALTIME_KEY;
use api_orchestrator::session::MemoryStore;
use api_orchestrator::{LifecycleState, Orchestrator, ProcessRegistry, RealtimeHandle};
use serde_json::json;

mod common;

use common::{builder, ChatSocket, LogCapture, StrayApi, UsersApi};

#[tokio::test]
async fn test_initialize_is_idempotent() {
    let (builder, _) = builder(json!({}));
    let mut orchestrator = builder.api(UsersApi).socket(ChatSocket).build().unwrap();
    assert_eq!(orchestrator.state(), LifecycleState::Uninitialized);
    assert!(orchestrator.pipeline().is_none());

    orchestrator.initialize().unwrap();
    let first: Vec<Stage> = orchestrator.pipeline().unwrap().stages().to_vec();
    orchestrator.initialize().unwrap();

    let stages = orchestrator.pipeline().unwrap().stages();
    assert_eq!(stages, first.as_slice());
    assert_eq!(stages.iter().filter(|s| **s == Stage::Session).count(), 1);
    assert_eq!(stages.iter().filter(|s| **s == Stage::CookieParser).count(), 1);
    assert_eq!(orchestrator.state(), LifecycleState::Initialized);
    assert_eq!(orchestrator.services().len(), 1);
    assert_eq!(orchestrator.sockets().len(), 1);
}

#[tokio::test]
async fn test_configure_sees_final_registries() {
    let (builder, _) = builder(json!({}));
    let mut orchestrator = builder
        .api(UsersApi)
        .api(StrayApi)
        .socket(ChatSocket)
        .build()
        .unwrap();

    let mut seen = None;
    orchestrator
        .configure(|ctx| {
            seen = Some((
                ctx.services.iter().map(|s| s.prefix.clone()).collect::<Vec<_>>(),
                ctx.sockets.get("chat").map(|s| s.path.clone()),
                ctx.stages.len(),
                ctx.io.is_ready(),
            ));
        })
        .unwrap();

    let (prefixes, chat_path, stages, ready) = seen.unwrap();
    assert_eq!(prefixes, vec!["/users".to_string()]);
    assert_eq!(chat_path.as_deref(), Some("/socket/chat"));
    assert_eq!(stages, 7);
    assert!(!ready);
    assert_eq!(orchestrator.state(), LifecycleState::Initialized);
}

#[tokio::test]
async fn test_configure_after_start_is_rejected() {
    let (builder, _) = builder(json!({}));
    let mut orchestrator = builder.api(UsersApi).build().unwrap();
    let server = orchestrator.start().await.unwrap();
    assert_eq!(orchestrator.state(), LifecycleState::Active);

    let called = AtomicBool::new(false);
    let err = orchestrator
        .configure(|_| called.store(true, Ordering::SeqCst))
        .unwrap_err();

    assert!(matches!(err, Error::Lifecycle(LifecycleError::AlreadyActive)));
    assert!(!called.load(Ordering::SeqCst));
    assert_eq!(orchestrator.state(), LifecycleState::Active);

    server.shutdown();
    server.wait().await.unwrap();
}

#[tokio::test]
async fn test_second_start_is_rejected() {
    let (builder, _) = builder(json!({}));
    let mut orchestrator = builder.build().unwrap();
    let server = orchestrator.start().await.unwrap();

    assert!(matches!(
        orchestrator.start().await,
        Err(Error::Lifecycle(LifecycleError::AlreadyStarted))
    ));

    server.shutdown();
    server.wait().await.unwrap();
}

#[tokio::test]
async fn test_start_mounts_routes_and_connects_sockets() {
    let (builder, _) = builder(json!({ "api_path": "/api" }));
    let mut orchestrator = builder.api(UsersApi).socket(ChatSocket).build().unwrap();
    let server = orchestrator.start().await.unwrap();

    assert_eq!(server.routes_mounted(), 1);
    assert_eq!(server.sockets_connected(), 1);
    assert!(orchestrator.io().is_ready());

    let body: serde_json::Value = reqwest::get(format!("http://{}/api/users", server.local_addr()))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body, json!(["alice", "bob"]));

    server.shutdown();
    server.wait().await.unwrap();
}

#[tokio::test]
async fn test_disabled_services_start_empty_and_warn_once() {
    let (capture, _guard) = LogCapture::install();
    let (builder, _) = builder(json!({ "load_services": false }));
    let mut orchestrator = builder.api(UsersApi).socket(ChatSocket).build().unwrap();

    let server = orchestrator.start().await.unwrap();
    assert_eq!(server.routes_mounted(), 0);
    assert_eq!(server.sockets_connected(), 0);
    assert!(!orchestrator.io().is_ready());

    let response = reqwest::get(format!("http://{}/users", server.local_addr()))
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::NOT_FOUND);
    assert_eq!(response.headers()["x-content-type-options"], "nosniff");

    let warnings = capture.lines_at("WARN");
    assert_eq!(warnings.len(), 1, "warnings: {warnings:?}");
    assert!(warnings[0].contains("Service loading disabled"));

    server.shutdown();
    server.wait().await.unwrap();
}

#[tokio::test]
async fn test_unsupported_store_is_rejected_during_initialize() {
    let (builder, _) = builder(json!({
        "security": { "session_options": { "store": "mongo-store" } }
    }));
    let mut orchestrator = builder.build().unwrap();

    match orchestrator.initialize() {
        Err(Error::Config(ConfigError::UnsupportedStore { store })) => {
            assert_eq!(store, "mongo-store")
        }
        other => panic!("unexpected result: {other:?}"),
    }
    assert_eq!(orchestrator.state(), LifecycleState::Uninitialized);
    assert!(orchestrator.pipeline().is_none());
}

#[tokio::test]
async fn test_named_redis_store_is_constructed() {
    let (builder, _) = builder(json!({
        "security": { "session_options": { "store": "connect-redis" } }
    }));
    let mut orchestrator = builder.build().unwrap();
    orchestrator.initialize().unwrap();
    assert_eq!(orchestrator.pipeline().unwrap().session_store().kind(), "redis");
}

#[tokio::test]
async fn test_inline_store_wins_over_name() {
    let (builder, _) = builder(json!({
        "security": { "session_options": { "store": "mongo-store" } }
    }));
    let mut orchestrator = builder
        .session_store(Arc::new(MemoryStore::new()))
        .build()
        .unwrap();
    orchestrator.initialize().unwrap();
    assert_eq!(orchestrator.pipeline().unwrap().session_store().kind(), "memory");
}

#[tokio::test]
async fn test_secure_cookies_trust_first_proxy() {
    let (builder, _) = builder(json!({
        "security": { "session_options": { "cookie": { "secure": true } } }
    }));
    let mut orchestrator = builder.build().unwrap();
    assert_eq!(orchestrator.settings().trust_proxy(), 0);
    orchestrator.initialize().unwrap();
    assert_eq!(orchestrator.settings().trust_proxy(), 1);
}

#[tokio::test]
async fn test_port_in_use_fails_start() {
    let occupied = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = occupied.local_addr().unwrap().port();

    let (builder, _) = builder(json!({ "listen": { "port": port } }));
    let mut orchestrator = builder.build().unwrap();

    let err = orchestrator.start().await.unwrap_err();
    assert!(matches!(err, Error::Startup(StartupError::Bind { .. })));
}

#[tokio::test]
async fn test_realtime_handle_published_once_per_registry() {
    let (first_builder, registry) = builder(json!({}));
    let mut first = first_builder.socket(ChatSocket).build().unwrap();
    let mut second = Orchestrator::builder()
        .config(first.config().clone())
        .socket(ChatSocket)
        .registry(Arc::clone(&registry))
        .build()
        .unwrap();

    let first_server = first.start().await.unwrap();
    let second_server = second.start().await.unwrap();

    let published = registry.get::<RealtimeHandle>(REALTIME_KEY).unwrap();
    assert!(published.same_hub(&first.io()));
    assert!(!published.same_hub(&second.io()));

    for server in [first_server, second_server] {
        server.shutdown();
        server.wait().await.unwrap();
    }
}

#[tokio::test]
async fn test_global_registry_keeps_first_publisher() {
    let (first_builder, _) = builder(json!({}));
    let config = first_builder.build().unwrap().config().clone();

    let mut first = Orchestrator::with_config(config.clone()).unwrap();
    let mut second = Orchestrator::with_config(config).unwrap();

    let first_server = first.start().await.unwrap();
    let second_server = second.start().await.unwrap();

    let published = ProcessRegistry::global()
        .get::<RealtimeHandle>(REALTIME_KEY)
        .unwrap();
    assert!(published.same_hub(&first.io()));
    assert!(!published.same_hub(&second.io()));

    for server in [first_server, second_server] {
        server.shutdown();
        server.wait().await.unwrap();
    }
}
