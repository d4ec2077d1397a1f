//! Web container subsystem.
//!
//! # Data Flow
//! ```text
//! ContainerAssembly (from ServerConfig)
//!     → container.rs (ContainerFactory::assemble → ServerContainer)
//!     → embedded.rs start():
//!         health.rs (startup rules)
//!         → StorageFactory (database)
//!         → modules.rs (rest.rs + third-party extensions → Router)
//!         → server thread: bind address.rs hostname + endpoint port → serve
//!     → status polled by the lifecycle controller
//! ```
//!
//! # Design Decisions
//! - start() never waits for the bind; readiness is observed, not awaited
//! - Each container owns its own tokio runtime so tests need no async
//! - A bind failure is a Failed status, not a start() error

pub mod address;
pub mod container;
pub mod embedded;
pub mod health;
pub mod modules;
pub mod rest;

pub use address::{AddressResolver, ConfiguredAddressResolver};
pub use container::{ContainerAssembly, ContainerError, ContainerFactory, ContainerStatus, ServerContainer};
pub use embedded::{EmbeddedContainerFactory, EmbeddedWebServer};
pub use health::{HealthCheckSet, RequiredPropertyRule, StartupHealthCheckRule};
pub use modules::{ModuleContext, ModuleSet, ServerModule, ThirdPartyExtensionModule};
pub use rest::RestApiModule;
