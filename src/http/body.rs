//! Body parsing stages.
//!
//! # Responsibilities
//! - Stage 2: parse `application/json` bodies
//! - Stage 3: parse `application/x-www-form-urlencoded` bodies with nested keys
//! - Expose the result as a [`ParsedBody`] extension
//!
//! # Design Decisions
//! - The raw bytes are put back into the request so axum extractors still work
//! - Bodies are buffered up to the configured limit; larger bodies get 413
//! - An empty body parses to an empty object

use axum::{
    body::{Body, Bytes},
    extract::{FromRequestParts, State},
    http::{header, request::Parts, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde_json::{Map, Value};

/// Maximum bracket nesting honoured in urlencoded keys; deeper segments are kept literally.
const MAX_DEPTH: usize = 5;

/// Body parsed by one of the body stages.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedBody(pub Value);

impl<S> FromRequestParts<S> for ParsedBody
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    /// Requests without a parsed body yield an empty object.
    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts
            .extensions
            .get::<ParsedBody>()
            .cloned()
            .unwrap_or_else(|| ParsedBody(Value::Object(Map::new()))))
    }
}

/// Byte limit shared by both body stages.
#[derive(Debug, Clone, Copy)]
pub struct BodyLimit(pub usize);

fn has_content_type(request: &Request<Body>, expected: &str) -> bool {
    request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .map(|essence| essence.trim().eq_ignore_ascii_case(expected))
        .unwrap_or(false)
}

async fn buffer(
    request: Request<Body>,
    limit: BodyLimit,
) -> Result<(Parts, Bytes), Response> {
    let (parts, body) = request.into_parts();
    match axum::body::to_bytes(body, limit.0).await {
        Ok(bytes) => Ok((parts, bytes)),
        Err(e) => {
            tracing::debug!(error = %e, limit = limit.0, "Rejecting request body");
            Err((StatusCode::PAYLOAD_TOO_LARGE, "request entity too large").into_response())
        }
    }
}

fn reassemble(parts: Parts, bytes: Bytes, parsed: Value) -> Request<Body> {
    let mut request = Request::from_parts(parts, Body::from(bytes));
    request.extensions_mut().insert(ParsedBody(parsed));
    request
}

/// Stage 2: JSON body parsing.
pub async fn json_body(
    State(limit): State<BodyLimit>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if !has_content_type(&request, "application/json") {
        return next.run(request).await;
    }

    let (parts, bytes) = match buffer(request, limit).await {
        Ok(buffered) => buffered,
        Err(response) => return response,
    };

    let parsed = if bytes.is_empty() {
        Value::Object(Map::new())
    } else {
        match serde_json::from_slice::<Value>(&bytes) {
            Ok(value) => value,
            Err(e) => {
                tracing::debug!(error = %e, "Malformed JSON body");
                return (StatusCode::BAD_REQUEST, "malformed JSON body").into_response();
            }
        }
    };

    next.run(reassemble(parts, bytes, parsed)).await
}

/// Stage 3: URL-encoded body parsing with nested keys.
pub async fn urlencoded_body(
    State(limit): State<BodyLimit>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if !has_content_type(&request, "application/x-www-form-urlencoded") {
        return next.run(request).await;
    }

    let (parts, bytes) = match buffer(request, limit).await {
        Ok(buffered) => buffered,
        Err(response) => return response,
    };

    let parsed = parse_nested(&bytes);
    next.run(reassemble(parts, bytes, parsed)).await
}

/// Parse `a[b]=1&a[c][]=2&d=3` into nested JSON.
pub fn parse_nested(input: &[u8]) -> Value {
    let mut root = Value::Object(Map::new());

    for (key, value) in url::form_urlencoded::parse(input) {
        if key.is_empty() {
            continue;
        }
        let path = split_key(&key);
        assign(&mut root, &path, Value::String(value.into_owned()));
    }

    root
}

fn split_key(key: &str) -> Vec<String> {
    let open = match key.find('[') {
        Some(0) | None => return vec![key.to_string()],
        Some(i) => i,
    };

    let mut segments = vec![key[..open].to_string()];
    let mut rest = &key[open..];

    while let Some(inner) = rest.strip_prefix('[') {
        let Some(close) = inner.find(']') else {
            break;
        };
        if segments.len() > MAX_DEPTH {
            break;
        }
        segments.push(inner[..close].to_string());
        rest = &inner[close + 1..];
    }

    if !rest.is_empty() {
        segments.push(rest.to_string());
    }
    segments
}

fn assign(slot: &mut Value, path: &[String], value: Value) {
    let Some((head, rest)) = path.split_first() else {
        match slot {
            Value::Null => *slot = value,
            Value::Array(items) => items.push(value),
            existing => {
                let previous = existing.take();
                *existing = Value::Array(vec![previous, value]);
            }
        }
        return;
    };

    if head.is_empty() {
        if !slot.is_array() {
            *slot = match slot.take() {
                Value::Null => Value::Array(Vec::new()),
                other => Value::Array(vec![other]),
            };
        }
        if let Value::Array(items) = slot {
            let mut child = Value::Null;
            assign(&mut child, rest, value);
            items.push(child);
        }
        return;
    }

    if !slot.is_object() {
        *slot = Value::Object(Map::new());
    }
    if let Value::Object(map) = slot {
        let child = map.entry(head.clone()).or_insert(Value::Null);
        assign(child, rest, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_flat_pairs() {
        assert_eq!(parse_nested(b"a=1&b=two+words"), json!({"a": "1", "b": "two words"}));
    }

    #[test]
    fn test_nested_objects_and_arrays() {
        let parsed = parse_nested(b"user[name]=ann&user[tags][]=x&user[tags][]=y&id=7");
        assert_eq!(
            parsed,
            json!({"user": {"name": "ann", "tags": ["x", "y"]}, "id": "7"})
        );
    }

    #[test]
    fn test_repeated_key_becomes_array() {
        assert_eq!(parse_nested(b"a=1&a=2&a=3"), json!({"a": ["1", "2", "3"]}));
    }

    #[test]
    fn test_percent_encoded_brackets() {
        assert_eq!(parse_nested(b"a%5Bb%5D=c"), json!({"a": {"b": "c"}}));
    }

    #[test]
    fn test_leading_bracket_is_literal() {
        assert_eq!(parse_nested(b"[x]=1"), json!({"[x]": "1"}));
    }

    #[test]
    fn test_depth_is_capped() {
        let parsed = parse_nested(b"a[b][c][d][e][f][g][h]=1");
        assert_eq!(
            parsed,
            json!({"a": {"b": {"c": {"d": {"e": {"f": {"[g][h]": "1"}}}}}}})
        );
    }
}
