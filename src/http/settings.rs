//! Application-level HTTP settings shared by the pipeline stages.

use axum::http::HeaderMap;

/// Header consulted for the client protocol when a proxy hop is trusted.
pub const X_FORWARDED_PROTO: &str = "x-forwarded-proto";

/// Mutable app settings, fixed once the pipeline is built.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppSettings {
    trust_proxy_hops: usize,
}

impl AppSettings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Trust `hops` reverse proxies in front of this server.
    pub fn set_trust_proxy(&mut self, hops: usize) {
        self.trust_proxy_hops = hops;
    }

    pub fn trust_proxy(&self) -> usize {
        self.trust_proxy_hops
    }

    /// Whether the client connection is secure.
    ///
    /// The listener itself is plain HTTP, so this is only ever true when a
    /// trusted proxy reports `https` in the first `X-Forwarded-Proto` entry.
    pub fn is_secure(&self, headers: &HeaderMap) -> bool {
        if self.trust_proxy_hops == 0 {
            return false;
        }

        headers
            .get(X_FORWARDED_PROTO)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(|proto| proto.trim().eq_ignore_ascii_case("https"))
            .unwrap_or(false)
    }
}
