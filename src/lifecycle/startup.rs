//! Startup orchestration.
//!
//! # Responsibilities
//! - Merge and validate configuration (secret generated once, up front)
//! - Resolve the session store and build the middleware pipeline
//! - Drive the route and socket loaders through their hooks
//! - Bind, mount, serve, then connect sockets
//!
//! # Design Decisions
//! - Fail fast: every startup error is returned to the caller
//! - `initialize` leaves the orchestrator `Uninitialized` on error; each loader
//!   commits its own registry only once its setup succeeded, so a retry starts clean
//! - Routes are mounted after the port is bound and before serving begins
//! - The socket route is matched ahead of the pipeline; every other request,
//!   unmatched ones included, goes through it
//! - The notice bridge belongs to the server handle, not the orchestrator

use std::fmt;
use std::sync::Arc;

use axum::Router;
use serde_json::Value;

use crate::config::{generate_secret, Environment, OrchestratorConfig};
use crate::config::validation::validate_config;
use crate::error::{Error, LifecycleError, Result};
use crate::http::pipeline::{Pipeline, Stage};
use crate::http::settings::AppSettings;
use crate::lifecycle::state::LifecycleState;
use crate::loader::{
    spawn_notice_bridge, ApiModule, LoaderContext, ModuleRouteLoader, RouteLoader,
    ServiceRegistry, SocketLoader, SocketModuleLoader, SocketRegistry,
};
use crate::net::{self, ServerHandle};
use crate::realtime::{RealtimeHandle, SocketModule};
use crate::registry::{ProcessRegistry, REALTIME_KEY};
use crate::session::store::{resolve_store, SessionStore, StoreConfig};

/// Read access handed to configuration callbacks.
#[derive(Debug)]
pub struct ConfigureContext<'a> {
    pub config: &'a OrchestratorConfig,
    pub services: &'a ServiceRegistry,
    pub sockets: &'a SocketRegistry,
    pub settings: &'a AppSettings,
    pub stages: &'a [Stage],
    pub io: RealtimeHandle,
}

/// Builder for [`Orchestrator`].
#[derive(Default)]
pub struct OrchestratorBuilder {
    overrides: Option<Value>,
    config: Option<OrchestratorConfig>,
    environment: Option<Environment>,
    secret: Option<String>,
    store: Option<Arc<dyn SessionStore>>,
    apis: Vec<Arc<dyn ApiModule>>,
    sockets: Vec<Arc<dyn SocketModule>>,
    route_loader: Option<Box<dyn RouteLoader>>,
    socket_loader: Option<Box<dyn SocketLoader>>,
    registry: Option<Arc<ProcessRegistry>>,
}

impl OrchestratorBuilder {
    /// Partial configuration merged over the defaults.
    pub fn overrides(mut self, overrides: Value) -> Self {
        self.overrides = Some(overrides);
        self
    }

    /// A complete configuration; overrides are ignored when set.
    pub fn config(mut self, config: OrchestratorConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Defaults to `APP_ENV`.
    pub fn environment(mut self, environment: Environment) -> Self {
        self.environment = Some(environment);
        self
    }

    /// Session secret used when the overrides do not provide one.
    pub fn secret(mut self, secret: impl Into<String>) -> Self {
        self.secret = Some(secret.into());
        self
    }

    /// A caller-constructed session store; takes precedence over `store` in the config.
    pub fn session_store(mut self, store: Arc<dyn SessionStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn api(mut self, module: impl ApiModule + 'static) -> Self {
        self.apis.push(Arc::new(module));
        self
    }

    pub fn socket(mut self, module: impl SocketModule + 'static) -> Self {
        self.sockets.push(Arc::new(module));
        self
    }

    /// Replace the default module route loader.
    pub fn route_loader(mut self, loader: Box<dyn RouteLoader>) -> Self {
        self.route_loader = Some(loader);
        self
    }

    /// Replace the default socket loader.
    pub fn socket_loader(mut self, loader: Box<dyn SocketLoader>) -> Self {
        self.socket_loader = Some(loader);
        self
    }

    /// Registry the realtime handle is published to. Defaults to the process-wide one.
    pub fn registry(mut self, registry: Arc<ProcessRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn build(self) -> Result<Orchestrator> {
        let config = match self.config {
            Some(config) => config,
            None => {
                let environment = self.environment.unwrap_or_else(Environment::from_env);
                let secret = self.secret.unwrap_or_else(generate_secret);
                let defaults = OrchestratorConfig::defaults(environment, secret);
                OrchestratorConfig::merged(&defaults, self.overrides.unwrap_or(Value::Null))?
            }
        };
        validate_config(&config)?;

        let routes = self.route_loader.unwrap_or_else(|| {
            Box::new(ModuleRouteLoader::new(config.discovery.clone(), self.apis))
        });
        let sockets = self.socket_loader.unwrap_or_else(|| {
            Box::new(SocketModuleLoader::new(config.realtime.clone(), self.sockets))
        });

        Ok(Orchestrator {
            config: Arc::new(config),
            state: LifecycleState::Uninitialized,
            settings: AppSettings::new(),
            inline_store: self.store,
            pipeline: None,
            routes,
            sockets,
            registry: self.registry.unwrap_or_else(ProcessRegistry::global),
        })
    }
}

/// Owns configuration, middleware and loaders, and drives them through the lifecycle.
pub struct Orchestrator {
    config: Arc<OrchestratorConfig>,
    state: LifecycleState,
    settings: AppSettings,
    inline_store: Option<Arc<dyn SessionStore>>,
    pipeline: Option<Pipeline>,
    routes: Box<dyn RouteLoader>,
    sockets: Box<dyn SocketLoader>,
    registry: Arc<ProcessRegistry>,
}

impl fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Orchestrator")
            .field("state", &self.state)
            .field("listen", &self.config.listen.address())
            .field("pipeline", &self.pipeline)
            .field("services", &self.routes.services().len())
            .field("sockets", &self.sockets.sockets().len())
            .finish()
    }
}

impl Orchestrator {
    /// Orchestrator over the defaults merged with `overrides`.
    pub fn new(overrides: Value) -> Result<Self> {
        Self::builder().overrides(overrides).build()
    }

    pub fn with_config(config: OrchestratorConfig) -> Result<Self> {
        Self::builder().config(config).build()
    }

    pub fn builder() -> OrchestratorBuilder {
        OrchestratorBuilder::default()
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn settings(&self) -> &AppSettings {
        &self.settings
    }

    /// `None` until initialized.
    pub fn pipeline(&self) -> Option<&Pipeline> {
        self.pipeline.as_ref()
    }

    pub fn services(&self) -> &ServiceRegistry {
        self.routes.services()
    }

    pub fn sockets(&self) -> &SocketRegistry {
        self.sockets.sockets()
    }

    pub fn io(&self) -> RealtimeHandle {
        self.sockets.io()
    }

    /// Build the pipeline and initialize both loaders.
    ///
    /// Does nothing once initialized.
    ///
    /// # Errors
    ///
    /// Configuration errors (unsupported store, invalid policies) and loader
    /// failures. The orchestrator stays `Uninitialized` on error.
    pub fn initialize(&mut self) -> Result<()> {
        if self.state != LifecycleState::Uninitialized {
            return Ok(());
        }

        let options = &self.config.security.session_options;
        let store = resolve_store(StoreConfig::from_options(
            options,
            self.inline_store.clone(),
        )?)?;
        if store.is_none() {
            tracing::info!("No session store configured; sessions are kept in process memory");
        }

        let mut settings = self.settings.clone();
        if options.cookie.secure {
            settings.set_trust_proxy(1);
            tracing::debug!("Secure session cookies enabled; trusting the first proxy hop");
        }

        let pipeline = Pipeline::build(&self.config, &settings, store)?;

        self.routes.initialize()?;
        self.sockets.initialize()?;

        self.settings = settings;
        self.pipeline = Some(pipeline);
        self.state = LifecycleState::Initialized;
        tracing::debug!(state = %self.state, "Orchestrator initialized");
        Ok(())
    }

    /// Run `f` against the current registries.
    ///
    /// Initializes first if needed.
    ///
    /// # Errors
    ///
    /// [`LifecycleError::AlreadyActive`] once `start` has run; `f` is not called.
    pub fn configure<F>(&mut self, f: F) -> Result<()>
    where
        F: FnOnce(&ConfigureContext<'_>),
    {
        if self.state == LifecycleState::Active {
            return Err(LifecycleError::AlreadyActive.into());
        }
        self.initialize()?;

        let ctx = ConfigureContext {
            config: &self.config,
            services: self.routes.services(),
            sockets: self.sockets.sockets(),
            settings: &self.settings,
            stages: self.pipeline.as_ref().map(Pipeline::stages).unwrap_or_default(),
            io: self.sockets.io(),
        };
        f(&ctx);
        Ok(())
    }

    fn loader_context(&self) -> LoaderContext {
        LoaderContext {
            config: Arc::clone(&self.config),
            settings: self.settings.clone(),
            io: self.sockets.io(),
        }
    }

    /// Bring the server up.
    ///
    /// Order: module config hooks, `Active`, bind, mount routes inside the
    /// pipeline, publish the realtime handle, serve, connect sockets. With `load_services` disabled the
    /// server runs with no routes and no sockets.
    ///
    /// # Errors
    ///
    /// Anything `initialize` can return, loader hook failures, and
    /// [`StartupError`](crate::error::StartupError) when the address cannot be
    /// bound. A second call returns [`LifecycleError::AlreadyStarted`].
    pub async fn start(&mut self) -> Result<ServerHandle> {
        if self.state == LifecycleState::Active {
            return Err(LifecycleError::AlreadyStarted.into());
        }
        self.initialize()?;

        let Some(pipeline) = self.pipeline.clone() else {
            return Err(Error::loader("middleware pipeline missing after initialization"));
        };

        self.routes.set_config(&self.loader_context())?;
        self.state = LifecycleState::Active;

        let bound = net::bind(&self.config.listen).await?;

        let load_services = self.config.load_services;
        let (api, routes_mounted) = if load_services {
            let api = self.routes.set_apis(&self.config.api_path)?;
            (api, self.routes.services().len())
        } else {
            tracing::warn!("Service loading disabled; no routes or sockets will be registered");
            (Router::new(), 0)
        };

        // Merging would replace the layered fallback with a bare one, so the
        // pipeline is the socket router's fallback instead.
        let api = pipeline.apply(api);
        let app = if load_services {
            self.sockets.attach().fallback_service(api)
        } else {
            api
        };

        let io = self.sockets.io();
        if self.registry.publish_once(REALTIME_KEY, io) {
            tracing::debug!(key = REALTIME_KEY, "Realtime handle published");
        } else {
            tracing::debug!(key = REALTIME_KEY, "Realtime handle already published; keeping the first");
        }

        let mut handle = bound.serve(app);
        if let Some(events) = self.sockets.take_events() {
            handle.notices = Some(spawn_notice_bridge(events));
        }
        handle.routes_mounted = routes_mounted;
        if load_services {
            handle.sockets_connected = self.sockets.connect();
        }

        tracing::info!(
            address = %handle.local_addr(),
            routes = handle.routes_mounted(),
            sockets = handle.sockets_connected(),
            "Orchestrator active"
        );
        Ok(handle)
    }
}

