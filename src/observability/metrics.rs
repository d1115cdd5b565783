//! Metrics recording.
//!
//! # Metrics
//! - `orchestrator_requests_total` (counter): responses by method, status
//! - `orchestrator_request_duration_seconds` (histogram): pipeline latency
//! - `orchestrator_sessions_created_total` (counter): new sessions by store
//! - `orchestrator_socket_notices_total` (counter): socket notices by kind
//!
//! Without an installed recorder these calls are no-ops.

use std::time::Duration;

pub fn record_request(method: &str, status: u16, elapsed: Duration) {
    let labels = [
        ("method", method.to_string()),
        ("status", status.to_string()),
    ];
    ::metrics::counter!("orchestrator_requests_total", &labels).increment(1);
    ::metrics::histogram!("orchestrator_request_duration_seconds", &labels)
        .record(elapsed.as_secs_f64());
}

pub fn record_session_created(store: &'static str) {
    ::metrics::counter!("orchestrator_sessions_created_total", "store" => store).increment(1);
}

pub fn record_socket_notice(kind: &'static str) {
    ::metrics::counter!("orchestrator_socket_notices_total", "kind" => kind).increment(1);
}
