//! Route module discovery and mounting.
//!
//! Route modules are compiled in and registered with the loader; discovery
//! decides which of them are served, using the configured directories, glob
//! pattern and ignore list against each module's source path.
//!
//! ```text
//! source "api/v1/users.rs", directories ["api"]
//!     → relative "v1/users.rs"  (matched against pattern / ignore)
//!     → prefix "/v1/users"      (index.rs and mod.rs map to their directory)
//! ```

use std::path::{Component, Path};
use std::sync::Arc;

use axum::Router;
use ignore::overrides::{Override, OverrideBuilder};

use crate::config::schema::DiscoveryConfig;
use crate::error::{ConfigError, Error, Result};
use crate::loader::{LoaderContext, RouteLoader};

/// An HTTP route module.
pub trait ApiModule: Send + Sync {
    /// Source path relative to the discovery root, e.g. `api/users.rs`.
    fn source(&self) -> &str;

    /// Routes relative to the module prefix.
    fn router(&self) -> Router;

    /// Explicit prefix; derived from [`ApiModule::source`] when `None`.
    fn prefix(&self) -> Option<String> {
        None
    }

    /// Hook run before the server listens.
    fn configure(&self, _ctx: &LoaderContext) -> Result<()> {
        Ok(())
    }
}

/// A discovered, mountable module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceEntry {
    pub name: String,
    pub source: String,
    pub prefix: String,
}

/// Read-only view of discovered modules, in registration order.
#[derive(Debug, Clone, Default)]
pub struct ServiceRegistry {
    entries: Vec<ServiceEntry>,
}

impl ServiceRegistry {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ServiceEntry> {
        self.entries.iter()
    }

    pub fn get(&self, name: &str) -> Option<&ServiceEntry> {
        self.entries.iter().find(|e| e.name == name)
    }
}

struct ModuleFilter {
    main_path: std::path::PathBuf,
    directories: Vec<String>,
    matcher: Override,
}

impl ModuleFilter {
    fn new(discovery: &DiscoveryConfig) -> std::result::Result<Self, ConfigError> {
        let invalid = |pattern: &str, e: ignore::Error| ConfigError::InvalidPattern {
            pattern: pattern.to_string(),
            reason: e.to_string(),
        };

        let mut builder = OverrideBuilder::new(&discovery.main_path);
        builder
            .add(&discovery.pattern)
            .map_err(|e| invalid(&discovery.pattern, e))?;
        for glob in &discovery.ignore {
            builder
                .add(&format!("!{glob}"))
                .map_err(|e| invalid(glob, e))?;
        }
        let matcher = builder.build().map_err(|e| invalid(&discovery.pattern, e))?;

        Ok(Self {
            main_path: discovery.main_path.clone(),
            directories: discovery.directories.clone(),
            matcher,
        })
    }

    /// Directory and directory-relative path of a selected source.
    fn select<'a>(&self, source: &'a str) -> Option<(&str, &'a Path)> {
        let source = Path::new(source);
        let source = source.strip_prefix(&self.main_path).unwrap_or(source);

        self.directories.iter().find_map(|dir| {
            let relative = source.strip_prefix(dir.trim_matches('/')).ok()?;
            self.matcher
                .matched(relative, false)
                .is_whitelist()
                .then_some((dir.as_str(), relative))
        })
    }
}

/// Route prefix for a directory-relative source path.
fn derive_prefix(relative: &Path) -> String {
    let mut segments: Vec<String> = relative
        .with_extension("")
        .components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();

    if matches!(segments.last().map(String::as_str), Some("index" | "mod")) {
        segments.pop();
    }

    segments.iter().map(|s| format!("/{s}")).collect()
}

fn normalize_prefix(prefix: &str) -> String {
    let trimmed = prefix.trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{trimmed}")
    }
}

/// Default [`RouteLoader`] over registered [`ApiModule`]s.
pub struct ModuleRouteLoader {
    discovery: DiscoveryConfig,
    modules: Vec<Arc<dyn ApiModule>>,
    discovered: Vec<Arc<dyn ApiModule>>,
    services: ServiceRegistry,
    initialized: bool,
}

impl std::fmt::Debug for ModuleRouteLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleRouteLoader")
            .field("registered", &self.modules.len())
            .field("services", &self.services)
            .field("initialized", &self.initialized)
            .finish()
    }
}

impl ModuleRouteLoader {
    pub fn new(discovery: DiscoveryConfig, modules: Vec<Arc<dyn ApiModule>>) -> Self {
        Self {
            discovery,
            modules,
            discovered: Vec::new(),
            services: ServiceRegistry::default(),
            initialized: false,
        }
    }
}

impl RouteLoader for ModuleRouteLoader {
    fn initialize(&mut self) -> Result<()> {
        if self.initialized {
            return Ok(());
        }

        let filter = ModuleFilter::new(&self.discovery)?;
        let mut entries: Vec<ServiceEntry> = Vec::new();
        let mut discovered = Vec::new();

        for module in &self.modules {
            let Some((dir, relative)) = filter.select(module.source()) else {
                tracing::debug!(source = module.source(), "Module not selected by discovery");
                continue;
            };

            let prefix = match module.prefix() {
                Some(explicit) => normalize_prefix(&explicit),
                None => derive_prefix(relative),
            };
            if let Some(existing) = entries.iter().find(|e| e.prefix == prefix) {
                return Err(Error::loader(format!(
                    "modules '{}' and '{}' both mount at '{}'",
                    existing.source,
                    module.source(),
                    if prefix.is_empty() { "/" } else { &prefix }
                )));
            }

            let name = format!(
                "{}/{}",
                dir.trim_matches('/'),
                relative.with_extension("").to_string_lossy()
            );
            entries.push(ServiceEntry {
                name,
                source: module.source().to_string(),
                prefix,
            });
            discovered.push(Arc::clone(module));
        }

        tracing::info!(
            registered = self.modules.len(),
            discovered = entries.len(),
            "Route modules discovered"
        );

        self.services = ServiceRegistry { entries };
        self.discovered = discovered;
        self.initialized = true;
        Ok(())
    }

    fn set_config(&mut self, ctx: &LoaderContext) -> Result<()> {
        for (entry, module) in self.services.iter().zip(&self.discovered) {
            module.configure(ctx).map_err(|e| {
                Error::loader(format!("configuring '{}' failed: {e}", entry.name))
            })?;
        }
        Ok(())
    }

    fn set_apis(&mut self, mount_path: &str) -> Result<Router> {
        let mut api = Router::new();
        for (entry, module) in self.services.iter().zip(&self.discovered) {
            api = if entry.prefix.is_empty() {
                api.merge(module.router())
            } else {
                api.nest(&entry.prefix, module.router())
            };
            tracing::debug!(service = %entry.name, prefix = %entry.prefix, "Service mounted");
        }

        let mount = normalize_prefix(mount_path);
        tracing::info!(
            mount_path = if mount.is_empty() { "/" } else { mount.as_str() },
            services = self.services.len(),
            "Routes mounted"
        );

        Ok(if mount.is_empty() {
            api
        } else {
            Router::new().nest(&mount, api)
        })
    }

    fn services(&self) -> &ServiceRegistry {
        &self.services
    }
}
