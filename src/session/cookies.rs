//! Cookie parsing stage and cookie signing.
//!
//! # Responsibilities
//! - Parse the `Cookie` request header into a [`Cookies`] extension
//! - Unsign values of the form `s:<value>.<mac>` with the session secret
//! - Serialize `Set-Cookie` values for the session stage
//!
//! # Design Decisions
//! - Signatures are keyed BLAKE3 MACs with a key derived from the secret
//! - Values failing verification are dropped from the signed set, never trusted
//! - Malformed pairs are skipped; parsing never fails the request

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{header, Request},
    middleware::Next,
    response::Response,
};
use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

use crate::config::schema::CookieOptions;

/// Characters escaped like `encodeURIComponent`.
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

const SIGNED_PREFIX: &str = "s:";
const KEY_CONTEXT: &str = "api-orchestrator 2026-01-01 session cookie signing";

/// Signs and verifies cookie values.
pub struct CookieSigner {
    key: [u8; 32],
}

impl std::fmt::Debug for CookieSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("CookieSigner { .. }")
    }
}

impl CookieSigner {
    pub fn new(secret: &str) -> Self {
        Self {
            key: blake3::derive_key(KEY_CONTEXT, secret.as_bytes()),
        }
    }

    /// `s:<value>.<mac>`
    pub fn sign(&self, value: &str) -> String {
        let mac = blake3::keyed_hash(&self.key, value.as_bytes());
        format!("{SIGNED_PREFIX}{value}.{}", mac.to_hex())
    }

    /// Verify a signed value and return the payload.
    pub fn unsign(&self, signed: &str) -> Option<String> {
        let body = signed.strip_prefix(SIGNED_PREFIX)?;
        let (value, mac) = body.rsplit_once('.')?;
        let mac = blake3::Hash::from_hex(mac).ok()?;

        // blake3::Hash equality is constant-time.
        (blake3::keyed_hash(&self.key, value.as_bytes()) == mac).then(|| value.to_string())
    }
}

/// Cookies parsed from the request.
#[derive(Debug, Clone, Default)]
pub struct Cookies {
    plain: HashMap<String, String>,
    signed: HashMap<String, String>,
}

impl Cookies {
    /// Parse a `Cookie` header. The first occurrence of a name wins.
    pub fn parse(header: &str, signer: &CookieSigner) -> Self {
        let mut cookies = Cookies::default();

        for pair in header.split(';') {
            let Some((name, value)) = pair.split_once('=') else {
                continue;
            };
            let name = name.trim();
            if name.is_empty() || cookies.plain.contains_key(name) || cookies.signed.contains_key(name) {
                continue;
            }

            let value = value.trim();
            let value = value
                .strip_prefix('"')
                .and_then(|v| v.strip_suffix('"'))
                .unwrap_or(value);
            let value = percent_decode_str(value).decode_utf8_lossy().into_owned();

            if value.starts_with(SIGNED_PREFIX) {
                if let Some(unsigned) = signer.unsign(&value) {
                    cookies.signed.insert(name.to_string(), unsigned);
                } else {
                    tracing::debug!(cookie = %name, "Dropping cookie with invalid signature");
                }
            } else {
                cookies.plain.insert(name.to_string(), value);
            }
        }

        cookies
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.plain.get(name).map(String::as_str)
    }

    /// Verified payload of a signed cookie.
    pub fn get_signed(&self, name: &str) -> Option<&str> {
        self.signed.get(name).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.plain.len() + self.signed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Build a `Set-Cookie` header value.
pub fn serialize_cookie(name: &str, value: &str, options: &CookieOptions) -> String {
    let mut out = format!("{name}={}", utf8_percent_encode(value, COMPONENT));

    out.push_str("; Path=");
    out.push_str(&options.path);

    if let Some(max_age_ms) = options.max_age_ms {
        out.push_str(&format!("; Max-Age={}", max_age_ms / 1000));
    }
    if options.http_only {
        out.push_str("; HttpOnly");
    }
    if options.secure {
        out.push_str("; Secure");
    }
    out.push_str("; SameSite=");
    out.push_str(options.same_site.as_str());

    out
}

/// Cookie parsing stage.
pub async fn cookie_parser(
    State(signer): State<Arc<CookieSigner>>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let cookies = request
        .headers()
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .collect::<Vec<_>>()
        .join("; ");

    let cookies = Cookies::parse(&cookies, &signer);
    request.extensions_mut().insert(cookies);
    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::SameSite;

    fn signer() -> CookieSigner {
        CookieSigner::new("keyboard cat")
    }

    #[test]
    fn test_sign_roundtrip_and_tamper() {
        let signer = signer();
        let signed = signer.sign("abc-123");
        assert!(signed.starts_with("s:abc-123."));
        assert_eq!(signer.unsign(&signed).as_deref(), Some("abc-123"));

        let tampered = signed.replacen("abc", "abd", 1);
        assert_eq!(signer.unsign(&tampered), None);
        assert_eq!(CookieSigner::new("other").unsign(&signed), None);
    }

    #[test]
    fn test_parse_plain_and_signed() {
        let signer = signer();
        let signed = utf8_percent_encode(&signer.sign("sid"), COMPONENT).to_string();
        let header = format!("theme=dark; connect.sid={signed}; quoted=\"a b\"; broken; theme=light");

        let cookies = Cookies::parse(&header, &signer);
        assert_eq!(cookies.get("theme"), Some("dark"));
        assert_eq!(cookies.get("quoted"), Some("a b"));
        assert_eq!(cookies.get_signed("connect.sid"), Some("sid"));
        assert_eq!(cookies.get("connect.sid"), None);
        assert_eq!(cookies.len(), 3);
    }

    #[test]
    fn test_parse_drops_forged_signature() {
        let cookies = Cookies::parse("connect.sid=s%3Aforged.00", &signer());
        assert_eq!(cookies.get_signed("connect.sid"), None);
        assert!(cookies.is_empty());
    }

    #[test]
    fn test_serialize_cookie() {
        let options = CookieOptions {
            http_only: true,
            max_age_ms: Some(60_000),
            secure: true,
            path: "/".to_string(),
            same_site: SameSite::Strict,
        };
        assert_eq!(
            serialize_cookie("connect.sid", "s:a.b", &options),
            "connect.sid=s%3Aa.b; Path=/; Max-Age=60; HttpOnly; Secure; SameSite=Strict"
        );
    }
}
