//! Storage factories.
//!
//! The container never constructs a database itself; it asks the configured
//! [`StorageFactory`] for one, passing the store directory and the database
//! properties from the configuration resource.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use crate::graph::store::{GraphDatabase, GraphError};

/// Kind of database a factory produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageKind {
    /// Embedded database snapshotted to the store directory.
    Persistent,
    /// Embedded database living only in memory.
    Ephemeral,
}

/// Creates the database a server instance fronts.
pub trait StorageFactory: Send + Sync {
    /// Create a database for `store_dir` with the given properties.
    fn create_database(
        &self,
        store_dir: &Path,
        properties: &BTreeMap<String, String>,
    ) -> Result<Arc<GraphDatabase>, GraphError>;

    fn kind(&self) -> StorageKind;
}

/// Always yields a fresh, empty, in-memory database.
///
/// The store directory is ignored, so consecutive test runs never see each
/// other's data.
#[derive(Debug, Clone, Copy, Default)]
pub struct EphemeralStorageFactory;

impl StorageFactory for EphemeralStorageFactory {
    fn create_database(
        &self,
        store_dir: &Path,
        properties: &BTreeMap<String, String>,
    ) -> Result<Arc<GraphDatabase>, GraphError> {
        let db = GraphDatabase::impermanent(properties.clone());
        tracing::debug!(
            instance_id = %db.instance_id(),
            ignored_store = %store_dir.display(),
            "Created impermanent graph database"
        );
        Ok(Arc::new(db))
    }

    fn kind(&self) -> StorageKind {
        StorageKind::Ephemeral
    }
}

/// Opens (or creates) a database snapshotted under the store directory.
#[derive(Debug, Clone, Copy, Default)]
pub struct PersistentStorageFactory;

impl StorageFactory for PersistentStorageFactory {
    fn create_database(
        &self,
        store_dir: &Path,
        properties: &BTreeMap<String, String>,
    ) -> Result<Arc<GraphDatabase>, GraphError> {
        let db = GraphDatabase::open(store_dir, properties.clone())?;
        tracing::debug!(
            instance_id = %db.instance_id(),
            store = %store_dir.display(),
            "Opened persistent graph database"
        );
        Ok(Arc::new(db))
    }

    fn kind(&self) -> StorageKind {
        StorageKind::Persistent
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::store::Properties;

    #[test]
    fn test_ephemeral_databases_are_independent() {
        let factory = EphemeralStorageFactory;
        let dir = Path::new("target/never-created");
        let mut props = BTreeMap::new();
        props.insert("cache_type".to_string(), "none".to_string());

        let first = factory.create_database(dir, &props).unwrap();
        first.create_node(Properties::new());
        let second = factory.create_database(dir, &props).unwrap();

        assert_eq!(second.node_count(), 0);
        assert_ne!(first.instance_id(), second.instance_id());
        assert_eq!(second.config().get("cache_type").map(String::as_str), Some("none"));
        assert!(!dir.exists());
        assert_eq!(factory.kind(), StorageKind::Ephemeral);
    }

    #[test]
    fn test_persistent_factory_reloads_store() {
        let dir = tempfile::tempdir().unwrap();
        let factory = PersistentStorageFactory;

        let db = factory.create_database(dir.path(), &BTreeMap::new()).unwrap();
        db.create_node(Properties::new());
        db.shutdown().unwrap();

        let db = factory.create_database(dir.path(), &BTreeMap::new()).unwrap();
        assert_eq!(db.node_count(), 1);
        assert_eq!(db.store_location(), Some(dir.path()));
        assert_eq!(factory.kind(), StorageKind::Persistent);
    }
}
