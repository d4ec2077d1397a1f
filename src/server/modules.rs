//! Server modules.
//!
//! A module contributes routes to the embedded web server. The default set
//! is the REST API followed by third-party extension support.

use axum::Router;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use crate::config::schema::ServerProperties;
use crate::graph::GraphDatabase;
use crate::server::container::ContainerError;
use crate::server::rest::RestApiModule;

/// What a module may use when building its routes.
#[derive(Debug, Clone)]
pub struct ModuleContext {
    pub database: Arc<GraphDatabase>,
    pub properties: ServerProperties,
}

/// A capability registered with the container.
pub trait ServerModule: Send + Sync {
    fn name(&self) -> &str;

    fn router(&self, ctx: &ModuleContext) -> Result<Router, ContainerError>;
}

/// Ordered modules.
#[derive(Clone)]
pub struct ModuleSet {
    modules: Vec<Arc<dyn ServerModule>>,
}

impl Default for ModuleSet {
    fn default() -> Self {
        Self::empty()
            .with_module(RestApiModule)
            .with_module(ThirdPartyExtensionModule::new())
    }
}

impl std::fmt::Debug for ModuleSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

impl ModuleSet {
    pub fn empty() -> Self {
        Self { modules: Vec::new() }
    }

    pub fn with_module(mut self, module: impl ServerModule + 'static) -> Self {
        self.modules.push(Arc::new(module));
        self
    }

    pub fn with_shared_module(mut self, module: Arc<dyn ServerModule>) -> Self {
        self.modules.push(module);
        self
    }

    pub fn names(&self) -> Vec<&str> {
        self.modules.iter().map(|m| m.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// Merge every module's routes, in order. Overlapping routes are a
    /// [`ContainerError::Module`] naming the module that collided.
    pub fn build_router(&self, ctx: &ModuleContext) -> Result<Router, ContainerError> {
        let mut router = Router::new();
        for module in &self.modules {
            tracing::debug!(module = module.name(), "Mounting server module");
            let routes = module.router(ctx)?;
            router = compose(module.name(), || router.merge(routes))?;
        }
        Ok(router)
    }
}

/// Run a router composition step, turning axum's route-conflict panics into
/// a module error.
fn compose<F>(module: &str, step: F) -> Result<Router, ContainerError>
where
    F: FnOnce() -> Router,
{
    catch_unwind(AssertUnwindSafe(step)).map_err(|payload| {
        let reason = payload
            .downcast_ref::<String>()
            .map(String::as_str)
            .or_else(|| payload.downcast_ref::<&str>().copied())
            .unwrap_or("conflicting routes")
            .to_string();
        ContainerError::Module {
            module: module.to_string(),
            reason,
        }
    })
}

/// Whether two mount paths share a route subtree.
fn overlaps(a: &str, b: &str) -> bool {
    let under = |inner: &str, outer: &str| {
        inner
            .strip_prefix(outer)
            .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
    };
    under(a, b) || under(b, a)
}

/// Builds an extension's routes.
pub type ExtensionFactory = Arc<dyn Fn(&ModuleContext) -> Router + Send + Sync>;

/// Mounts caller-supplied routers under their own mount points.
#[derive(Clone, Default)]
pub struct ThirdPartyExtensionModule {
    extensions: Vec<(String, ExtensionFactory)>,
}

impl std::fmt::Debug for ThirdPartyExtensionModule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mounts: Vec<&str> = self.mount_points().collect();
        f.debug_struct("ThirdPartyExtensionModule")
            .field("mount_points", &mounts)
            .finish()
    }
}

impl ThirdPartyExtensionModule {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an extension under `mount_point` (e.g., "/ext").
    pub fn mount<F>(mut self, mount_point: impl Into<String>, factory: F) -> Self
    where
        F: Fn(&ModuleContext) -> Router + Send + Sync + 'static,
    {
        self.extensions.push((mount_point.into(), Arc::new(factory)));
        self
    }

    pub fn mount_points(&self) -> impl Iterator<Item = &str> {
        self.extensions.iter().map(|(mount, _)| mount.as_str())
    }
}

impl ServerModule for ThirdPartyExtensionModule {
    fn name(&self) -> &str {
        "third-party-extensions"
    }

    fn router(&self, ctx: &ModuleContext) -> Result<Router, ContainerError> {
        let rest_prefix = ctx.properties.web.rest_api_prefix();
        let reject = |reason: String| ContainerError::Module {
            module: self.name().to_string(),
            reason,
        };

        let mut mounted: Vec<&str> = Vec::with_capacity(self.extensions.len());
        let mut router = Router::new();
        for (mount, factory) in &self.extensions {
            let mount = mount.trim_end_matches('/');
            if !mount.starts_with('/') || mount.len() < 2 {
                return Err(reject(format!("invalid mount point {:?}", mount)));
            }
            if overlaps(mount, rest_prefix) {
                return Err(reject(format!(
                    "mount point {:?} overlaps the REST API at {:?}",
                    mount, rest_prefix
                )));
            }
            if let Some(existing) = mounted.iter().find(|existing| overlaps(mount, existing)) {
                return Err(reject(format!(
                    "mount point {:?} overlaps extension mounted at {:?}",
                    mount, existing
                )));
            }

            tracing::debug!(mount_point = mount, "Mounting third-party extension");
            let routes = factory(ctx);
            router = compose(self.name(), || router.nest(mount, routes))?;
            mounted.push(mount);
        }
        Ok(router)
    }
}
