//! Access logging stage.
//!
//! One structured line per response, in the configured format:
//!
//! ```text
//! combined  :remote-addr - - ":method :url HTTP/:version" :status :length ":referrer" ":user-agent"
//! common    :remote-addr - - ":method :url HTTP/:version" :status :length
//! dev       :method :url :status :response-time ms - :length
//! short     :remote-addr :method :url HTTP/:version :status :length - :response-time ms
//! tiny      :method :url :status :length - :response-time ms
//! ```
//!
//! Timestamps come from the tracing subscriber.

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{header, HeaderMap, Request, Version},
    middleware::Next,
    response::Response,
};

use crate::config::schema::LogFormat;
use crate::observability::metrics;

/// Everything an access log line may print.
#[derive(Debug, Clone)]
pub struct AccessRecord {
    pub remote_addr: Option<SocketAddr>,
    pub method: String,
    pub url: String,
    pub version: Version,
    pub status: u16,
    pub content_length: Option<u64>,
    pub referrer: Option<String>,
    pub user_agent: Option<String>,
    pub elapsed: Duration,
}

fn or_dash<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_else(|| "-".to_string())
}

fn http_version(version: Version) -> &'static str {
    match version {
        Version::HTTP_09 => "0.9",
        Version::HTTP_10 => "1.0",
        Version::HTTP_2 => "2.0",
        Version::HTTP_3 => "3.0",
        _ => "1.1",
    }
}

/// Render a record in the given format.
pub fn format_line(format: LogFormat, record: &AccessRecord) -> String {
    let addr = or_dash(record.remote_addr.map(|a| a.ip()));
    let length = or_dash(record.content_length);
    let millis = format!("{:.3}", record.elapsed.as_secs_f64() * 1000.0);
    let version = http_version(record.version);

    match format {
        LogFormat::Combined => format!(
            "{addr} - - \"{} {} HTTP/{version}\" {} {length} \"{}\" \"{}\"",
            record.method,
            record.url,
            record.status,
            or_dash(record.referrer.as_deref()),
            or_dash(record.user_agent.as_deref()),
        ),
        LogFormat::Common => format!(
            "{addr} - - \"{} {} HTTP/{version}\" {} {length}",
            record.method, record.url, record.status,
        ),
        LogFormat::Dev => format!(
            "{} {} {} {millis} ms - {length}",
            record.method, record.url, record.status,
        ),
        LogFormat::Short => format!(
            "{addr} {} {} HTTP/{version} {} {length} - {millis} ms",
            record.method, record.url, record.status,
        ),
        LogFormat::Tiny => format!(
            "{} {} {} {length} - {millis} ms",
            record.method, record.url, record.status,
        ),
    }
}

fn header_string(headers: &HeaderMap, name: header::HeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(String::from)
}

/// Stage 5: access logging.
pub async fn access_log(
    State(format): State<LogFormat>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let started = Instant::now();
    let remote_addr = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let method = request.method().to_string();
    let url = request
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| "/".to_string());
    let version = request.version();
    let referrer = header_string(request.headers(), header::REFERER);
    let user_agent = header_string(request.headers(), header::USER_AGENT);

    let response = next.run(request).await;

    let record = AccessRecord {
        remote_addr,
        method,
        url,
        version,
        status: response.status().as_u16(),
        content_length: header_string(response.headers(), header::CONTENT_LENGTH)
            .and_then(|v| v.parse().ok()),
        referrer,
        user_agent,
        elapsed: started.elapsed(),
    };

    metrics::record_request(&record.method, record.status, record.elapsed);
    tracing::info!(target: "api_orchestrator::access", "{}", format_line(format, &record));

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> AccessRecord {
        AccessRecord {
            remote_addr: Some("10.0.0.1:5555".parse().unwrap()),
            method: "GET".to_string(),
            url: "/users?page=2".to_string(),
            version: Version::HTTP_11,
            status: 200,
            content_length: Some(42),
            referrer: None,
            user_agent: Some("curl/8.0".to_string()),
            elapsed: Duration::from_micros(1500),
        }
    }

    #[test]
    fn test_combined_format() {
        assert_eq!(
            format_line(LogFormat::Combined, &record()),
            "10.0.0.1 - - \"GET /users?page=2 HTTP/1.1\" 200 42 \"-\" \"curl/8.0\""
        );
    }

    #[test]
    fn test_dev_format() {
        assert_eq!(
            format_line(LogFormat::Dev, &record()),
            "GET /users?page=2 200 1.500 ms - 42"
        );
    }

    #[test]
    fn test_missing_fields_render_dash() {
        let mut record = record();
        record.remote_addr = None;
        record.content_length = None;
        assert_eq!(
            format_line(LogFormat::Common, &record),
            "- - - \"GET /users?page=2 HTTP/1.1\" 200 -"
        );
        assert_eq!(
            format_line(LogFormat::Tiny, &record),
            "GET /users?page=2 200 - - 1.500 ms"
        );
    }
}
