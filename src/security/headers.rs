//! Security response headers.
//!
//! # Responsibilities
//! - Render Content-Security-Policy from configured directives
//! - Validate Referrer-Policy tokens
//! - Collect the remaining hardening headers that are enabled
//!
//! # Design Decisions
//! - Every header value is encoded once at build time; an invalid value is a
//!   configuration error, never a per-request failure
//! - Headers override whatever a handler set

use axum::http::{HeaderName, HeaderValue};

use crate::config::schema::{ContentSecurityPolicy, ReferrerPolicy, SecurityConfig};
use crate::error::ConfigError;

const REFERRER_TOKENS: &[&str] = &[
    "",
    "no-referrer",
    "no-referrer-when-downgrade",
    "same-origin",
    "origin",
    "strict-origin",
    "origin-when-cross-origin",
    "strict-origin-when-cross-origin",
    "unsafe-url",
];

/// Pre-encoded security headers.
#[derive(Debug, Clone, Default)]
pub struct SecurityHeaders {
    headers: Vec<(HeaderName, HeaderValue)>,
}

impl SecurityHeaders {
    /// Build the header set from configuration.
    pub fn from_config(config: &SecurityConfig) -> Result<Self, ConfigError> {
        let mut headers = Vec::new();

        if config.content_security_policy.enabled {
            let csp = render_csp(&config.content_security_policy)?;
            if !csp.is_empty() {
                let name = if config.content_security_policy.report_only {
                    "content-security-policy-report-only"
                } else {
                    "content-security-policy"
                };
                headers.push(header(name, csp)?);
            }
        }

        if config.referrer_policy.enabled {
            headers.push(header(
                "referrer-policy",
                render_referrer_policy(&config.referrer_policy)?,
            )?);
        }

        let hardening = &config.headers;
        if hardening.content_type_options {
            headers.push(header("x-content-type-options", "nosniff".into())?);
        }
        if let Some(value) = &hardening.frame_options {
            headers.push(header("x-frame-options", value.clone())?);
        }
        if hardening.dns_prefetch_control {
            headers.push(header("x-dns-prefetch-control", "off".into())?);
        }
        if let Some(value) = &hardening.strict_transport_security {
            headers.push(header("strict-transport-security", value.clone())?);
        }
        if hardening.download_options {
            headers.push(header("x-download-options", "noopen".into())?);
        }
        if let Some(value) = &hardening.permitted_cross_domain_policies {
            headers.push(header("x-permitted-cross-domain-policies", value.clone())?);
        }
        if let Some(value) = &hardening.cross_origin_opener_policy {
            headers.push(header("cross-origin-opener-policy", value.clone())?);
        }
        if let Some(value) = &hardening.cross_origin_resource_policy {
            headers.push(header("cross-origin-resource-policy", value.clone())?);
        }
        if hardening.origin_agent_cluster {
            headers.push(header("origin-agent-cluster", "?1".into())?);
        }

        Ok(Self { headers })
    }

    pub fn iter(&self) -> impl Iterator<Item = &(HeaderName, HeaderValue)> {
        self.headers.iter()
    }

    pub fn get(&self, name: &str) -> Option<&HeaderValue> {
        self.headers
            .iter()
            .find(|(n, _)| n.as_str() == name)
            .map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.headers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }
}

fn header(name: &'static str, value: String) -> Result<(HeaderName, HeaderValue), ConfigError> {
    let encoded = HeaderValue::from_str(&value).map_err(|_| ConfigError::InvalidHeader {
        header: name,
        value: value.clone(),
    })?;
    Ok((HeaderName::from_static(name), encoded))
}

/// `directive source source;directive source`
fn render_csp(policy: &ContentSecurityPolicy) -> Result<String, ConfigError> {
    let mut parts = Vec::with_capacity(policy.directives.len());

    for (name, sources) in &policy.directives {
        let valid_name = !name.is_empty()
            && name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-');
        if !valid_name {
            return Err(ConfigError::InvalidHeader {
                header: "content-security-policy",
                value: name.clone(),
            });
        }

        if let Some(bad) = sources.iter().find(|s| s.contains([';', ','])) {
            return Err(ConfigError::InvalidHeader {
                header: "content-security-policy",
                value: bad.clone(),
            });
        }

        if sources.is_empty() {
            parts.push(name.clone());
        } else {
            parts.push(format!("{} {}", name, sources.join(" ")));
        }
    }

    Ok(parts.join(";"))
}

fn render_referrer_policy(policy: &ReferrerPolicy) -> Result<String, ConfigError> {
    if policy.policy.is_empty() {
        return Err(ConfigError::InvalidReferrerPolicy(String::new()));
    }

    let mut seen = Vec::with_capacity(policy.policy.len());
    for token in &policy.policy {
        if !REFERRER_TOKENS.contains(&token.as_str()) || seen.contains(&token) {
            return Err(ConfigError::InvalidReferrerPolicy(token.clone()));
        }
        seen.push(token);
    }

    Ok(policy.policy.join(","))
}
