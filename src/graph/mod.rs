//! Graph storage subsystem.
//!
//! # Data Flow
//! ```text
//! ServerConfig
//!     → factory.rs (StorageFactory: ephemeral or persistent)
//!     → store.rs (GraphDatabase, shared via Arc)
//!     → REST handlers and test assertions read/write concurrently
//!
//! Between test cases:
//!     DatabaseHandle::clean_db
//!     → cleaner.rs (DatabaseCleaner) wipes indexes, relationships, nodes
//! ```
//!
//! # Design Decisions
//! - Tests get an ephemeral database by default; nothing leaks across runs
//! - Persistence is a snapshot on shutdown, not a write-ahead log

pub mod cleaner;
pub mod factory;
pub mod store;

pub use cleaner::{CleanupSummary, DatabaseCleaner, GraphCleaner};
pub use factory::{EphemeralStorageFactory, PersistentStorageFactory, StorageFactory, StorageKind};
pub use store::{GraphDatabase, GraphError, Node, NodeId, Properties, Relationship, RelationshipId};
