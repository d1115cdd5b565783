//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the orchestrator.
//! All types derive Serde traits so that caller overrides (JSON values or TOML
//! files) can be deep-merged over the serialized defaults.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Runtime environment flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Production,
    #[default]
    Development,
}

impl Environment {
    /// Environment variable consulted by [`Environment::from_env`].
    pub const VAR: &'static str = "APP_ENV";

    /// Read the environment flag from `APP_ENV`.
    pub fn from_env() -> Self {
        std::env::var(Self::VAR)
            .map(|v| Self::parse(&v))
            .unwrap_or_default()
    }

    /// `production` / `prod` (any case) select production; everything else is development.
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "production" | "prod" => Environment::Production,
            _ => Environment::Development,
        }
    }

    pub fn is_production(self) -> bool {
        self == Environment::Production
    }
}

/// Root configuration for the orchestrator.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Where the HTTP server listens.
    pub listen: ListenConfig,

    /// Headers, CORS and session settings.
    pub security: SecurityConfig,

    /// Access log settings.
    pub logging: LoggingConfig,

    /// Mount discovered routes and connect sockets during `start`.
    pub load_services: bool,

    /// Mount path for discovered API routes.
    pub api_path: String,

    /// API module discovery settings.
    pub discovery: DiscoveryConfig,

    /// Realtime socket attach point.
    pub realtime: RealtimeConfig,

    /// Maximum size of a parsed request body in bytes.
    pub body_limit: usize,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenConfig {
    pub port: u16,
    pub host: String,
}

impl Default for ListenConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            host: "0.0.0.0".to_string(),
        }
    }
}

impl ListenConfig {
    /// `host:port`, bracketing IPv6 hosts.
    pub fn address(&self) -> String {
        if self.host.contains(':') && !self.host.starts_with('[') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

/// Security hardening configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct SecurityConfig {
    pub session_options: SessionOptions,
    pub content_security_policy: ContentSecurityPolicy,
    pub referrer_policy: ReferrerPolicy,
    pub cors_options: CorsOptions,
    pub headers: HardeningHeaders,
}

/// Session middleware configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SessionOptions {
    /// Signing secret for the session cookie.
    pub secret: String,

    /// Session cookie name.
    pub name: String,

    /// Save sessions on every response even when unmodified.
    pub resave: bool,

    /// Save new sessions that were never written to.
    pub save_uninitialized: bool,

    pub cookie: CookieOptions,

    /// Symbolic store name; `None` selects the in-memory store.
    pub store: Option<String>,

    /// Options handed to a named store when it is constructed.
    pub store_options: StoreOptions,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            secret: String::new(),
            name: "connect.sid".to_string(),
            resave: false,
            save_uninitialized: false,
            cookie: CookieOptions::default(),
            store: None,
            store_options: StoreOptions::default(),
        }
    }
}

/// Session cookie policy.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CookieOptions {
    pub http_only: bool,
    /// Cookie lifetime in milliseconds; `None` makes a browser-session cookie.
    pub max_age_ms: Option<u64>,
    /// Only send the cookie over secure connections. Requires trusting one proxy hop.
    pub secure: bool,
    pub path: String,
    pub same_site: SameSite,
}

impl Default for CookieOptions {
    fn default() -> Self {
        Self {
            http_only: true,
            max_age_ms: Some(24 * 60 * 60 * 1000),
            secure: false,
            path: "/".to_string(),
            same_site: SameSite::Lax,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub enum SameSite {
    Strict,
    Lax,
    None,
}

impl SameSite {
    pub fn as_str(self) -> &'static str {
        match self {
            SameSite::Strict => "Strict",
            SameSite::Lax => "Lax",
            SameSite::None => "None",
        }
    }
}

/// Options for named session stores.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StoreOptions {
    pub url: String,
    /// Key prefix for stored sessions.
    pub prefix: String,
    /// Fallback TTL when the cookie carries no max-age.
    pub ttl_secs: u64,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            url: "redis://127.0.0.1:6379".to_string(),
            prefix: "sess:".to_string(),
            ttl_secs: 86_400,
        }
    }
}

/// Content-Security-Policy settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ContentSecurityPolicy {
    pub enabled: bool,
    /// Emit `Content-Security-Policy-Report-Only` instead of enforcing.
    pub report_only: bool,
    /// Directive name to sources. An empty list renders the bare directive.
    pub directives: BTreeMap<String, Vec<String>>,
}

impl Default for ContentSecurityPolicy {
    fn default() -> Self {
        let directives = [
            ("default-src", vec!["'self'"]),
            ("base-uri", vec!["'self'"]),
            ("font-src", vec!["'self'", "https:", "data:"]),
            ("form-action", vec!["'self'"]),
            ("frame-ancestors", vec!["'self'"]),
            ("img-src", vec!["'self'", "data:"]),
            ("object-src", vec!["'none'"]),
            ("script-src", vec!["'self'"]),
            ("script-src-attr", vec!["'none'"]),
            ("style-src", vec!["'self'", "https:", "'unsafe-inline'"]),
            ("upgrade-insecure-requests", vec![]),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.into_iter().map(String::from).collect()))
        .collect();

        Self {
            enabled: true,
            report_only: false,
            directives,
        }
    }
}

/// Referrer-Policy settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ReferrerPolicy {
    pub enabled: bool,
    /// Policy tokens in fallback order.
    pub policy: Vec<String>,
}

impl Default for ReferrerPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            policy: vec!["no-referrer".to_string()],
        }
    }
}

/// CORS settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CorsOptions {
    /// Allowed origins; `"*"` allows any origin.
    pub origin: Vec<String>,
    pub methods: Vec<String>,
    /// Allowed request headers; empty mirrors the preflight request.
    pub allowed_headers: Vec<String>,
    pub exposed_headers: Vec<String>,
    pub credentials: bool,
    pub max_age_secs: Option<u64>,
}

impl Default for CorsOptions {
    fn default() -> Self {
        Self {
            origin: vec!["*".to_string()],
            methods: ["GET", "HEAD", "PUT", "PATCH", "POST", "DELETE"]
                .into_iter()
                .map(String::from)
                .collect(),
            allowed_headers: Vec::new(),
            exposed_headers: Vec::new(),
            credentials: false,
            max_age_secs: None,
        }
    }
}

/// Remaining response hardening headers. `None` / `false` disables a header.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HardeningHeaders {
    pub content_type_options: bool,
    pub frame_options: Option<String>,
    pub dns_prefetch_control: bool,
    pub strict_transport_security: Option<String>,
    pub download_options: bool,
    pub permitted_cross_domain_policies: Option<String>,
    pub cross_origin_opener_policy: Option<String>,
    pub cross_origin_resource_policy: Option<String>,
    pub origin_agent_cluster: bool,
}

impl Default for HardeningHeaders {
    fn default() -> Self {
        Self {
            content_type_options: true,
            frame_options: Some("SAMEORIGIN".to_string()),
            dns_prefetch_control: true,
            strict_transport_security: Some("max-age=15552000; includeSubDomains".to_string()),
            download_options: true,
            permitted_cross_domain_policies: Some("none".to_string()),
            cross_origin_opener_policy: Some("same-origin".to_string()),
            cross_origin_resource_policy: Some("same-origin".to_string()),
            origin_agent_cluster: true,
        }
    }
}

/// Access log configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub enable: bool,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self::for_environment(Environment::Development)
    }
}

impl LoggingConfig {
    /// Production logs the combined format; everything else the compact dev format.
    pub fn for_environment(env: Environment) -> Self {
        Self {
            enable: true,
            format: if env.is_production() {
                LogFormat::Combined
            } else {
                LogFormat::Dev
            },
        }
    }
}

/// Access log line format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Combined,
    Common,
    Dev,
    Short,
    Tiny,
}

/// API module discovery settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// Glob matched against module paths relative to `main_path`.
    pub pattern: String,
    /// Root the module paths are relative to.
    pub main_path: PathBuf,
    /// Directories under `main_path` that are searched.
    pub directories: Vec<String>,
    /// Globs excluded from discovery.
    pub ignore: Vec<String>,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            pattern: "**/*.rs".to_string(),
            main_path: PathBuf::from("."),
            directories: vec!["api".to_string()],
            ignore: Vec::new(),
        }
    }
}

/// Realtime socket configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RealtimeConfig {
    /// Path prefix for websocket upgrades; namespaces live below it.
    pub path: String,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            path: "/socket".to_string(),
        }
    }
}

/// Express-style default body limit (100kb).
pub const DEFAULT_BODY_LIMIT: usize = 100 * 1024;

impl OrchestratorConfig {
    /// Built-in defaults for the given environment, with an already-resolved secret.
    pub fn defaults(env: Environment, secret: impl Into<String>) -> Self {
        Self {
            listen: ListenConfig::default(),
            security: SecurityConfig {
                session_options: SessionOptions {
                    secret: secret.into(),
                    ..SessionOptions::default()
                },
                ..SecurityConfig::default()
            },
            logging: LoggingConfig::for_environment(env),
            load_services: true,
            api_path: "/".to_string(),
            discovery: DiscoveryConfig::default(),
            realtime: RealtimeConfig::default(),
            body_limit: DEFAULT_BODY_LIMIT,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_environment_parse() {
        assert_eq!(Environment::parse("production"), Environment::Production);
        assert_eq!(Environment::parse(" PROD "), Environment::Production);
        assert_eq!(Environment::parse("staging"), Environment::Development);
        assert_eq!(Environment::parse(""), Environment::Development);
    }

    #[test]
    fn test_log_format_depends_on_environment() {
        let prod = OrchestratorConfig::defaults(Environment::Production, "s");
        let dev = OrchestratorConfig::defaults(Environment::Development, "s");
        assert_eq!(prod.logging.format, LogFormat::Combined);
        assert_eq!(dev.logging.format, LogFormat::Dev);
    }

    #[test]
    fn test_defaults() {
        let config = OrchestratorConfig::defaults(Environment::Development, "abc");
        assert_eq!(config.listen.port, 3000);
        assert_eq!(config.api_path, "/");
        assert!(config.load_services);
        assert_eq!(config.security.session_options.secret, "abc");
        assert!(config.security.session_options.store.is_none());
        assert!(!config.security.session_options.cookie.secure);
        assert_eq!(config.body_limit, DEFAULT_BODY_LIMIT);
    }

    #[test]
    fn test_listen_address() {
        let mut listen = ListenConfig::default();
        assert_eq!(listen.address(), "0.0.0.0:3000");
        listen.host = "::1".to_string();
        assert_eq!(listen.address(), "[::1]:3000");
    }

    #[test]
    fn test_csp_defaults_include_self() {
        let csp = ContentSecurityPolicy::default();
        assert_eq!(csp.directives["default-src"], vec!["'self'".to_string()]);
        assert!(csp.directives["upgrade-insecure-requests"].is_empty());
    }
}
