//! Middleware pipeline.
//!
//! # Stage order
//! ```text
//! request →  1 security headers
//!            2 JSON body
//!            3 URL-encoded body
//!            4 CORS
//!            5 access log (skipped when disabled)
//!            6 cookie parsing
//!            7 session
//!            → routes
//! ```
//!
//! # Design Decisions
//! - All stages are constructed in [`Pipeline::build`]; any construction
//!   failure aborts initialization and nothing is retried
//! - [`Pipeline::apply`] wraps a finished router, so the order holds for every
//!   route regardless of when it was added
//! - Session lookup depends on stage 6 having populated `Cookies`

use std::fmt;
use std::sync::Arc;

use axum::{
    http::Request,
    middleware::from_fn_with_state,
    Router,
};
use tower_http::{cors::CorsLayer, set_header::SetResponseHeaderLayer, trace::TraceLayer};

use crate::config::schema::{LogFormat, OrchestratorConfig};
use crate::error::Result;
use crate::http::access_log::access_log;
use crate::http::body::{json_body, urlencoded_body, BodyLimit};
use crate::http::settings::AppSettings;
use crate::security::{build_cors_layer, SecurityHeaders};
use crate::session::cookies::{cookie_parser, CookieSigner};
use crate::session::memory::MemoryStore;
use crate::session::middleware::{session_stage, SessionState};
use crate::session::store::SessionStore;

/// A pipeline stage, in installation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    SecurityHeaders,
    JsonBody,
    UrlEncodedBody,
    Cors,
    AccessLog,
    CookieParser,
    Session,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::SecurityHeaders => "security-headers",
            Stage::JsonBody => "json-body",
            Stage::UrlEncodedBody => "urlencoded-body",
            Stage::Cors => "cors",
            Stage::AccessLog => "access-log",
            Stage::CookieParser => "cookie-parser",
            Stage::Session => "session",
        };
        f.write_str(name)
    }
}

/// Fully constructed middleware pipeline.
#[derive(Clone)]
pub struct Pipeline {
    stages: Vec<Stage>,
    headers: SecurityHeaders,
    body_limit: BodyLimit,
    cors: CorsLayer,
    access_log: Option<LogFormat>,
    signer: Arc<CookieSigner>,
    session: Arc<SessionState>,
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("stages", &self.stages)
            .field("session_store", &self.session.store().kind())
            .finish()
    }
}

impl Pipeline {
    /// Construct every stage from configuration.
    ///
    /// `settings` must already carry the trust-proxy decision and `store` the
    /// resolved session store (`None` selects a process-local memory store).
    pub fn build(
        config: &OrchestratorConfig,
        settings: &AppSettings,
        store: Option<Arc<dyn SessionStore>>,
    ) -> Result<Self> {
        let mut stages = Vec::with_capacity(7);

        let headers = SecurityHeaders::from_config(&config.security)?;
        stages.push(Stage::SecurityHeaders);

        let body_limit = BodyLimit(config.body_limit);
        stages.push(Stage::JsonBody);
        stages.push(Stage::UrlEncodedBody);

        let cors = build_cors_layer(&config.security.cors_options)?;
        stages.push(Stage::Cors);

        let access_log = config.logging.enable.then_some(config.logging.format);
        if access_log.is_some() {
            stages.push(Stage::AccessLog);
        }

        let options = &config.security.session_options;
        let signer = Arc::new(CookieSigner::new(&options.secret));
        stages.push(Stage::CookieParser);

        let store = store.unwrap_or_else(|| Arc::new(MemoryStore::new()));
        let session = Arc::new(SessionState::new(
            store,
            options.clone(),
            Arc::clone(&signer),
            settings.clone(),
        ));
        stages.push(Stage::Session);

        tracing::debug!(
            stages = %stages.iter().map(Stage::to_string).collect::<Vec<_>>().join(" → "),
            "Middleware pipeline built"
        );

        Ok(Self {
            stages,
            headers,
            body_limit,
            cors,
            access_log,
            signer,
            session,
        })
    }

    /// Installed stages, outermost first.
    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn session_store(&self) -> &Arc<dyn SessionStore> {
        self.session.store()
    }

    /// Wrap `router` so requests traverse the stages in order.
    ///
    /// Later `.layer` calls wrap earlier ones, so stages are added innermost first.
    pub fn apply(&self, router: Router) -> Router {
        let mut router = router
            .layer(from_fn_with_state(Arc::clone(&self.session), session_stage))
            .layer(from_fn_with_state(Arc::clone(&self.signer), cookie_parser));

        if let Some(format) = self.access_log {
            router = router
                .layer(from_fn_with_state(format, access_log))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(|request: &Request<axum::body::Body>| {
                            tracing::info_span!(
                                "http_request",
                                method = %request.method(),
                                uri = %request.uri(),
                            )
                        })
                        .on_response(()),
                );
        }

        router = router
            .layer(self.cors.clone())
            .layer(from_fn_with_state(self.body_limit, urlencoded_body))
            .layer(from_fn_with_state(self.body_limit, json_body));

        for (name, value) in self.headers.iter() {
            router = router.layer(SetResponseHeaderLayer::overriding(
                name.clone(),
                value.clone(),
            ));
        }

        router
    }
}
