//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! ServerConfig (endpoint, resource name, injected capabilities)
//!     → resource.rs (resource name → file on the search path)
//!     → loader.rs (parse TOML & deserialize)
//!     → validation.rs (semantic checks)
//!     → ServerProperties (validated, immutable)
//!     → ContainerAssembly handed to the container factory
//! ```
//!
//! # Design Decisions
//! - The resource is resolved and loaded at every start, never cached
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks
//! - Every collaborator is an injected strategy with a default

pub mod loader;
pub mod resource;
pub mod schema;
pub mod validation;

pub use loader::{load_properties, ConfigError};
pub use resource::{ResourceLocator, RESOURCE_PATH_ENV};
pub use schema::{DatabaseConfig, ServerProperties, WebConfig};

use std::path::PathBuf;
use std::sync::Arc;
use url::Url;

use crate::graph::{DatabaseCleaner, EphemeralStorageFactory, GraphCleaner, StorageFactory};
use crate::lifecycle::readiness::{PollPolicy, Sleeper, ThreadSleeper};
use crate::server::{
    AddressResolver, ConfiguredAddressResolver, ContainerAssembly, ContainerFactory,
    EmbeddedContainerFactory, HealthCheckSet, ModuleContext, ModuleSet, RestApiModule,
    StartupHealthCheckRule, ThirdPartyExtensionModule,
};

/// Hostname used when none is given.
pub const DEFAULT_HOSTNAME: &str = "localhost";

/// Port used when none is given.
pub const DEFAULT_PORT: u16 = 7473;

/// Configuration resource used when none is given.
pub const DEFAULT_CONFIGURATION_RESOURCE: &str = "test-db.toml";

/// Host and port the server binds to. Port 0 picks a free port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    hostname: String,
    port: u16,
}

impl Endpoint {
    pub fn new(hostname: impl Into<String>, port: u16) -> Self {
        Self {
            hostname: hostname.into(),
            port,
        }
    }

    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// `http://host:port/`, with IPv6 literals bracketed.
    pub fn base_url(&self) -> Result<Url, url::ParseError> {
        let host = if self.hostname.contains(':') && !self.hostname.starts_with('[') {
            format!("[{}]", self.hostname)
        } else {
            self.hostname.clone()
        };
        Url::parse(&format!("http://{}:{}/", host, self.port))
    }
}

impl Default for Endpoint {
    fn default() -> Self {
        Self::new(DEFAULT_HOSTNAME, DEFAULT_PORT)
    }
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.hostname, self.port)
    }
}

/// Harness configuration: where to bind, which resource to load and which
/// collaborators build the server.
#[derive(Clone)]
pub struct ServerConfig {
    endpoint: Endpoint,
    configuration_resource: String,
    resource_locator: ResourceLocator,
    storage: Arc<dyn StorageFactory>,
    address_resolver: Option<Arc<dyn AddressResolver>>,
    health_checks: HealthCheckSet,
    modules: Option<ModuleSet>,
    extensions: ThirdPartyExtensionModule,
    container_factory: Arc<dyn ContainerFactory>,
    cleaner: Arc<dyn DatabaseCleaner>,
    poll_policy: PollPolicy,
    sleeper: Arc<dyn Sleeper>,
}

impl std::fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConfig")
            .field("endpoint", &self.endpoint)
            .field("configuration_resource", &self.configuration_resource)
            .field("resource_locator", &self.resource_locator)
            .field("storage", &self.storage.kind())
            .field("health_checks", &self.health_checks)
            .field("modules", &self.modules)
            .field("extensions", &self.extensions)
            .field("poll_policy", &self.poll_policy)
            .finish()
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::with_endpoint(Endpoint::default())
    }
}

impl ServerConfig {
    pub fn new(hostname: impl Into<String>, port: u16) -> Self {
        Self::with_endpoint(Endpoint::new(hostname, port))
    }

    pub fn with_endpoint(endpoint: Endpoint) -> Self {
        Self {
            endpoint,
            configuration_resource: DEFAULT_CONFIGURATION_RESOURCE.to_string(),
            resource_locator: ResourceLocator::from_env(),
            storage: Arc::new(EphemeralStorageFactory),
            address_resolver: None,
            health_checks: HealthCheckSet::new(),
            modules: None,
            extensions: ThirdPartyExtensionModule::new(),
            container_factory: Arc::new(EmbeddedContainerFactory),
            cleaner: Arc::new(GraphCleaner),
            poll_policy: PollPolicy::default(),
            sleeper: Arc::new(ThreadSleeper),
        }
    }

    pub fn with_configuration_resource(mut self, name: impl Into<String>) -> Self {
        self.configuration_resource = name.into();
        self
    }

    pub fn with_resource_locator(mut self, locator: ResourceLocator) -> Self {
        self.resource_locator = locator;
        self
    }

    pub fn with_storage_factory(mut self, storage: impl StorageFactory + 'static) -> Self {
        self.storage = Arc::new(storage);
        self
    }

    pub fn with_address_resolver(mut self, resolver: impl AddressResolver + 'static) -> Self {
        self.address_resolver = Some(Arc::new(resolver));
        self
    }

    pub fn with_health_check(mut self, rule: impl StartupHealthCheckRule + 'static) -> Self {
        self.health_checks = self.health_checks.with_rule(rule);
        self
    }

    /// Replace the default module set.
    pub fn with_modules(mut self, modules: ModuleSet) -> Self {
        self.modules = Some(modules);
        self
    }

    /// Mount an extension router under `mount_point`.
    pub fn with_extension<F>(mut self, mount_point: impl Into<String>, factory: F) -> Self
    where
        F: Fn(&ModuleContext) -> axum::Router + Send + Sync + 'static,
    {
        self.extensions = self.extensions.mount(mount_point, factory);
        self
    }

    pub fn with_container_factory(mut self, factory: impl ContainerFactory + 'static) -> Self {
        self.container_factory = Arc::new(factory);
        self
    }

    pub fn with_cleaner(mut self, cleaner: impl DatabaseCleaner + 'static) -> Self {
        self.cleaner = Arc::new(cleaner);
        self
    }

    pub fn with_poll_policy(mut self, policy: PollPolicy) -> Self {
        self.poll_policy = policy;
        self
    }

    pub fn with_sleeper(mut self, sleeper: impl Sleeper + 'static) -> Self {
        self.sleeper = Arc::new(sleeper);
        self
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn configuration_resource(&self) -> &str {
        &self.configuration_resource
    }

    pub fn resource_locator(&self) -> &ResourceLocator {
        &self.resource_locator
    }

    pub fn storage_factory(&self) -> &Arc<dyn StorageFactory> {
        &self.storage
    }

    pub fn health_checks(&self) -> &HealthCheckSet {
        &self.health_checks
    }

    pub fn container_factory(&self) -> &Arc<dyn ContainerFactory> {
        &self.container_factory
    }

    pub fn cleaner(&self) -> &Arc<dyn DatabaseCleaner> {
        &self.cleaner
    }

    pub fn poll_policy(&self) -> &PollPolicy {
        &self.poll_policy
    }

    pub fn sleeper(&self) -> &dyn Sleeper {
        self.sleeper.as_ref()
    }

    /// The injected resolver, or one answering the endpoint hostname.
    pub fn address_resolver(&self) -> Arc<dyn AddressResolver> {
        match &self.address_resolver {
            Some(resolver) => resolver.clone(),
            None => Arc::new(ConfiguredAddressResolver::new(self.endpoint.hostname())),
        }
    }

    /// Modules in mount order. Registered extensions are appended to a
    /// replaced module set.
    pub fn modules(&self) -> ModuleSet {
        match &self.modules {
            None => ModuleSet::empty()
                .with_module(RestApiModule)
                .with_module(self.extensions.clone()),
            Some(modules) if self.extensions.mount_points().next().is_some() => {
                modules.clone().with_module(self.extensions.clone())
            }
            Some(modules) => modules.clone(),
        }
    }

    /// Resolve the configuration resource on the search path.
    pub fn resolve(&self) -> Result<PathBuf, ConfigError> {
        self.resource_locator.resolve(&self.configuration_resource)
    }

    /// Resolve, read and validate the configuration resource.
    pub fn load_properties(&self) -> Result<ServerProperties, ConfigError> {
        let path = self.resolve()?;
        tracing::debug!(resource = %self.configuration_resource, path = %path.display(), "Loading configuration");
        load_properties(&path)
    }

    /// Everything a container factory needs to build a server.
    pub fn assembly(&self, properties: ServerProperties) -> ContainerAssembly {
        ContainerAssembly {
            endpoint: self.endpoint.clone(),
            properties,
            storage: self.storage.clone(),
            address_resolver: self.address_resolver(),
            health_checks: self.health_checks.clone(),
            modules: self.modules(),
        }
    }

    pub(crate) fn set_configuration_resource(&mut self, name: impl Into<String>) {
        self.configuration_resource = name.into();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{PersistentStorageFactory, StorageKind};
    use crate::server::RequiredPropertyRule;
    use std::fs;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.endpoint(), &Endpoint::new("localhost", 7473));
        assert_eq!(config.configuration_resource(), "test-db.toml");
        assert_eq!(config.storage_factory().kind(), StorageKind::Ephemeral);
        assert!(config.health_checks().is_empty());
        assert_eq!(config.modules().names(), vec!["rest-api", "third-party-extensions"]);
        assert_eq!(config.poll_policy(), &PollPolicy::default());
        assert_eq!(config.address_resolver().hostname(), "localhost");
    }

    #[test]
    fn test_fluent_overrides() {
        let config = ServerConfig::new("127.0.0.1", 0)
            .with_configuration_resource("other.toml")
            .with_storage_factory(PersistentStorageFactory)
            .with_address_resolver(ConfiguredAddressResolver::new("graph.test"))
            .with_health_check(RequiredPropertyRule::new("cache_type"))
            .with_modules(ModuleSet::empty().with_module(RestApiModule));

        assert_eq!(config.configuration_resource(), "other.toml");
        assert_eq!(config.storage_factory().kind(), StorageKind::Persistent);
        assert_eq!(config.address_resolver().hostname(), "graph.test");
        assert_eq!(config.health_checks().names(), vec!["required-property:cache_type"]);
        assert_eq!(config.modules().names(), vec!["rest-api"]);
    }

    #[test]
    fn test_extensions_appended_to_replaced_modules() {
        let config = ServerConfig::default()
            .with_modules(ModuleSet::empty())
            .with_extension("/ext", |_| axum::Router::new());
        assert_eq!(config.modules().names(), vec!["third-party-extensions"]);
    }

    #[test]
    fn test_load_properties_from_search_path() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("custom.toml"),
            "[database.properties]\ncache_type = \"none\"\n",
        )
        .unwrap();

        let config = ServerConfig::default()
            .with_configuration_resource("/custom.toml")
            .with_resource_locator(ResourceLocator::new(vec![dir.path().to_path_buf()]));
        let props = config.load_properties().unwrap();
        assert_eq!(props.database.properties.get("cache_type").map(String::as_str), Some("none"));

        let assembly = config.assembly(props);
        assert_eq!(assembly.endpoint.port(), 7473);
        assert_eq!(assembly.modules.len(), 2);
    }

    #[test]
    fn test_missing_resource() {
        let dir = tempfile::tempdir().unwrap();
        let config = ServerConfig::default()
            .with_configuration_resource("absent.toml")
            .with_resource_locator(ResourceLocator::new(vec![dir.path().to_path_buf()]));
        assert!(matches!(config.load_properties(), Err(ConfigError::NotFound { .. })));
    }

    #[test]
    fn test_endpoint_base_url() {
        assert_eq!(Endpoint::default().base_url().unwrap().as_str(), "http://localhost:7473/");
        assert_eq!(Endpoint::new("::1", 8080).base_url().unwrap().as_str(), "http://[::1]:8080/");
        assert_eq!(Endpoint::new("127.0.0.1", 0).to_string(), "127.0.0.1:0");
    }
}
