//! Session handling stage.
//!
//! Looks up the session named by the signed session cookie, exposes it to
//! handlers as a [`Session`] extension and persists it after the handler ran.
//! Requires the cookie parsing stage to have run first: without a
//! [`Cookies`] extension every request starts a fresh session.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::{FromRequestParts, State},
    http::{header, request::Parts, HeaderValue, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use parking_lot::Mutex;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::config::schema::SessionOptions;
use crate::http::settings::AppSettings;
use crate::observability::metrics;
use crate::session::cookies::{serialize_cookie, CookieSigner, Cookies};
use crate::session::store::{SessionData, SessionStore};

#[derive(Debug)]
struct SessionInner {
    id: String,
    data: SessionData,
    is_new: bool,
    modified: bool,
    destroyed: bool,
}

/// Per-request session handle.
#[derive(Debug, Clone)]
pub struct Session {
    inner: Arc<Mutex<SessionInner>>,
}

impl Session {
    fn new(id: String, data: SessionData, is_new: bool) -> Self {
        Self {
            inner: Arc::new(Mutex::new(SessionInner {
                id,
                data,
                is_new,
                modified: false,
                destroyed: false,
            })),
        }
    }

    pub fn id(&self) -> String {
        self.inner.lock().id.clone()
    }

    /// True when the request carried no valid session.
    pub fn is_new(&self) -> bool {
        self.inner.lock().is_new
    }

    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let inner = self.inner.lock();
        inner
            .data
            .0
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    pub fn insert<T: Serialize>(&self, key: &str, value: T) -> Result<(), serde_json::Error> {
        let value = serde_json::to_value(value)?;
        let mut inner = self.inner.lock();
        inner.data.0.insert(key.to_string(), value);
        inner.modified = true;
        Ok(())
    }

    pub fn remove(&self, key: &str) -> Option<Value> {
        let mut inner = self.inner.lock();
        let removed = inner.data.0.remove(key);
        if removed.is_some() {
            inner.modified = true;
        }
        removed
    }

    /// Delete the session from the store once the response is produced.
    pub fn destroy(&self) {
        self.inner.lock().destroyed = true;
    }
}

impl<S> FromRequestParts<S> for Session
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, &'static str);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Session>()
            .cloned()
            .ok_or((StatusCode::INTERNAL_SERVER_ERROR, "session stage not installed"))
    }
}

/// State shared by every invocation of the session stage.
#[derive(Debug)]
pub struct SessionState {
    store: Arc<dyn SessionStore>,
    options: SessionOptions,
    signer: Arc<CookieSigner>,
    settings: AppSettings,
}

impl SessionState {
    pub fn new(
        store: Arc<dyn SessionStore>,
        options: SessionOptions,
        signer: Arc<CookieSigner>,
        settings: AppSettings,
    ) -> Self {
        Self {
            store,
            options,
            signer,
            settings,
        }
    }

    pub fn store(&self) -> &Arc<dyn SessionStore> {
        &self.store
    }

    fn ttl(&self) -> Option<Duration> {
        self.options.cookie.max_age_ms.map(Duration::from_millis)
    }
}

/// Session handling stage.
pub async fn session_stage(
    State(state): State<Arc<SessionState>>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let cookie_id = match request.extensions().get::<Cookies>() {
        Some(cookies) => cookies.get_signed(&state.options.name).map(String::from),
        None => {
            tracing::warn!("Session stage ran before cookies were parsed; starting a new session");
            None
        }
    };

    let loaded = match &cookie_id {
        Some(id) => match state.store.load(id).await {
            Ok(found) => found.map(|data| (id.clone(), data)),
            Err(e) => {
                tracing::error!(error = %e, store = state.store.kind(), "Failed to load session");
                return (StatusCode::INTERNAL_SERVER_ERROR, "session store unavailable").into_response();
            }
        },
        None => None,
    };

    let session = match loaded {
        Some((id, data)) => Session::new(id, data, false),
        None => Session::new(Uuid::new_v4().to_string(), SessionData::default(), true),
    };

    let secure_connection = state.settings.is_secure(request.headers());
    request.extensions_mut().insert(session.clone());

    let mut response = next.run(request).await;

    let (id, data, is_new, modified, destroyed) = {
        let inner = session.inner.lock();
        (
            inner.id.clone(),
            inner.data.clone(),
            inner.is_new,
            inner.modified,
            inner.destroyed,
        )
    };

    if destroyed {
        if let Err(e) = state.store.destroy(&id).await {
            tracing::error!(error = %e, "Failed to destroy session");
        }
        return response;
    }

    let should_save = modified
        || (is_new && state.options.save_uninitialized)
        || (!is_new && state.options.resave);
    if !should_save {
        return response;
    }

    if let Err(e) = state.store.save(&id, &data, state.ttl()).await {
        tracing::error!(error = %e, store = state.store.kind(), "Failed to save session");
        return (StatusCode::INTERNAL_SERVER_ERROR, "session store unavailable").into_response();
    }

    if is_new {
        metrics::record_session_created(state.store.kind());
    }

    if state.options.cookie.secure && !secure_connection {
        tracing::debug!("Not setting secure session cookie over an insecure connection");
        return response;
    }

    let cookie = serialize_cookie(
        &state.options.name,
        &state.signer.sign(&id),
        &state.options.cookie,
    );
    match HeaderValue::from_str(&cookie) {
        Ok(value) => {
            response.headers_mut().append(header::SET_COOKIE, value);
        }
        Err(e) => tracing::error!(error = %e, "Session cookie is not a valid header value"),
    }

    response
}
