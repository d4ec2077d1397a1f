//! In-memory graph store.
//!
//! # Responsibilities
//! - Hold nodes, relationships and exact-match node indexes
//! - Hand out monotonically increasing ids
//! - Optionally snapshot to a store directory on shutdown
//!
//! # Design Decisions
//! - DashMap per entity kind; readers (test assertions) and writers (REST
//!   handlers) never block each other for long
//! - Ids are never reused within one database instance
//! - A node with relationships cannot be deleted
//! - Node deletion and relationship creation serialize on one topology
//!   lock so no relationship ever points at a deleted node

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};
use thiserror::Error;
use uuid::Uuid;

/// Node identifier.
pub type NodeId = u64;

/// Relationship identifier.
pub type RelationshipId = u64;

/// Property container shared by nodes and relationships.
pub type Properties = Map<String, Value>;

/// File name of the snapshot inside a persistent store directory.
pub const SNAPSHOT_FILE: &str = "graph.json";

/// Errors raised by the graph store.
#[derive(Debug, Error)]
pub enum GraphError {
    /// No node with this id exists.
    #[error("Node {0} not found")]
    NodeNotFound(NodeId),

    /// No relationship with this id exists.
    #[error("Relationship {0} not found")]
    RelationshipNotFound(RelationshipId),

    /// Node deletion refused while relationships still reference it.
    #[error("Node {id} still has {count} relationship(s)")]
    NodeHasRelationships { id: NodeId, count: usize },

    /// Store directory or snapshot file could not be accessed.
    #[error("Store IO error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Snapshot could not be encoded or decoded.
    #[error("Snapshot error: {0}")]
    Snapshot(#[from] serde_json::Error),
}

/// A graph node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    #[serde(default)]
    pub properties: Properties,
}

/// A directed, typed relationship between two nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relationship {
    pub id: RelationshipId,
    pub start: NodeId,
    pub end: NodeId,
    #[serde(rename = "type")]
    pub rel_type: String,
    #[serde(default)]
    pub properties: Properties,
}

/// (key, value) → node ids.
type IndexEntries = BTreeMap<(String, String), BTreeSet<NodeId>>;

#[derive(Debug, Default, Serialize, Deserialize)]
struct Snapshot {
    nodes: Vec<Node>,
    relationships: Vec<Relationship>,
    node_indexes: BTreeMap<String, Vec<SnapshotIndexEntry>>,
}

#[derive(Debug, Serialize, Deserialize)]
struct SnapshotIndexEntry {
    key: String,
    value: String,
    nodes: Vec<NodeId>,
}

/// The graph database handed to tests and REST handlers.
pub struct GraphDatabase {
    instance_id: Uuid,
    store: Option<PathBuf>,
    config: BTreeMap<String, String>,
    nodes: DashMap<NodeId, Node>,
    relationships: DashMap<RelationshipId, Relationship>,
    node_indexes: DashMap<String, IndexEntries>,
    next_node_id: AtomicU64,
    next_relationship_id: AtomicU64,
    topology: Mutex<()>,
}

impl std::fmt::Debug for GraphDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphDatabase")
            .field("instance_id", &self.instance_id)
            .field("store", &self.store)
            .field("nodes", &self.nodes.len())
            .field("relationships", &self.relationships.len())
            .field("node_indexes", &self.node_indexes.len())
            .finish()
    }
}

impl GraphDatabase {
    /// Create an empty database that never touches the filesystem.
    pub fn impermanent(config: BTreeMap<String, String>) -> Self {
        Self {
            instance_id: Uuid::new_v4(),
            store: None,
            config,
            nodes: DashMap::new(),
            relationships: DashMap::new(),
            node_indexes: DashMap::new(),
            next_node_id: AtomicU64::new(0),
            next_relationship_id: AtomicU64::new(0),
            topology: Mutex::new(()),
        }
    }

    /// Open a database backed by `store_dir`, loading the previous snapshot
    /// if one exists.
    pub fn open(store_dir: &Path, config: BTreeMap<String, String>) -> Result<Self, GraphError> {
        fs::create_dir_all(store_dir).map_err(|source| GraphError::Io {
            path: store_dir.to_path_buf(),
            source,
        })?;

        let mut db = Self::impermanent(config);
        db.store = Some(store_dir.to_path_buf());

        let snapshot_path = store_dir.join(SNAPSHOT_FILE);
        if snapshot_path.exists() {
            let content = fs::read_to_string(&snapshot_path).map_err(|source| GraphError::Io {
                path: snapshot_path.clone(),
                source,
            })?;
            let snapshot: Snapshot = serde_json::from_str(&content)?;
            db.restore(snapshot);
            tracing::debug!(
                path = %snapshot_path.display(),
                nodes = db.node_count(),
                relationships = db.relationship_count(),
                "Graph snapshot loaded"
            );
        }

        Ok(db)
    }

    fn restore(&mut self, snapshot: Snapshot) {
        let mut max_node = None;
        for node in snapshot.nodes {
            max_node = max_node.max(Some(node.id));
            self.nodes.insert(node.id, node);
        }
        let mut max_rel = None;
        for rel in snapshot.relationships {
            max_rel = max_rel.max(Some(rel.id));
            self.relationships.insert(rel.id, rel);
        }
        for (name, entries) in snapshot.node_indexes {
            let mut index = IndexEntries::new();
            for entry in entries {
                index
                    .entry((entry.key, entry.value))
                    .or_default()
                    .extend(entry.nodes);
            }
            self.node_indexes.insert(name, index);
        }
        self.next_node_id = AtomicU64::new(max_node.map_or(0, |id| id + 1));
        self.next_relationship_id = AtomicU64::new(max_rel.map_or(0, |id| id + 1));
    }

    /// Unique id of this database instance.
    pub fn instance_id(&self) -> Uuid {
        self.instance_id
    }

    /// Store directory, `None` for impermanent databases.
    pub fn store_location(&self) -> Option<&Path> {
        self.store.as_deref()
    }

    /// Database properties this instance was created with.
    pub fn config(&self) -> &BTreeMap<String, String> {
        &self.config
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn relationship_count(&self) -> usize {
        self.relationships.len()
    }

    /// Create a node with the given properties.
    pub fn create_node(&self, properties: Properties) -> Node {
        let id = self.next_node_id.fetch_add(1, Ordering::Relaxed);
        let node = Node { id, properties };
        self.nodes.insert(id, node.clone());
        node
    }

    pub fn node(&self, id: NodeId) -> Option<Node> {
        self.nodes.get(&id).map(|n| n.clone())
    }

    /// Ids of all nodes, ascending.
    pub fn node_ids(&self) -> Vec<NodeId> {
        let mut ids: Vec<NodeId> = self.nodes.iter().map(|n| *n.key()).collect();
        ids.sort_unstable();
        ids
    }

    /// Replace all properties of a node.
    pub fn set_node_properties(&self, id: NodeId, properties: Properties) -> Result<(), GraphError> {
        let mut node = self.nodes.get_mut(&id).ok_or(GraphError::NodeNotFound(id))?;
        node.properties = properties;
        Ok(())
    }

    pub fn set_node_property(&self, id: NodeId, key: impl Into<String>, value: Value) -> Result<(), GraphError> {
        let mut node = self.nodes.get_mut(&id).ok_or(GraphError::NodeNotFound(id))?;
        node.properties.insert(key.into(), value);
        Ok(())
    }

    /// Delete a node and drop it from every index.
    ///
    /// Fails with [`GraphError::NodeHasRelationships`] while any relationship
    /// starts or ends at the node.
    pub fn delete_node(&self, id: NodeId) -> Result<Node, GraphError> {
        let _topology = self.lock_topology();
        if !self.nodes.contains_key(&id) {
            return Err(GraphError::NodeNotFound(id));
        }
        let count = self
            .relationships
            .iter()
            .filter(|r| r.start == id || r.end == id)
            .count();
        if count > 0 {
            return Err(GraphError::NodeHasRelationships { id, count });
        }

        let (_, node) = self.nodes.remove(&id).ok_or(GraphError::NodeNotFound(id))?;
        for mut index in self.node_indexes.iter_mut() {
            index.retain(|_, ids| {
                ids.remove(&id);
                !ids.is_empty()
            });
        }
        Ok(node)
    }

    /// Create a relationship; both endpoints must exist.
    pub fn create_relationship(
        &self,
        start: NodeId,
        end: NodeId,
        rel_type: impl Into<String>,
        properties: Properties,
    ) -> Result<Relationship, GraphError> {
        let _topology = self.lock_topology();
        for endpoint in [start, end] {
            if !self.nodes.contains_key(&endpoint) {
                return Err(GraphError::NodeNotFound(endpoint));
            }
        }
        let id = self.next_relationship_id.fetch_add(1, Ordering::Relaxed);
        let rel = Relationship {
            id,
            start,
            end,
            rel_type: rel_type.into(),
            properties,
        };
        self.relationships.insert(id, rel.clone());
        Ok(rel)
    }

    /// Guard for changes that must see a consistent node/relationship pair.
    /// The guarded data is `()`, so a poisoned lock is still usable.
    fn lock_topology(&self) -> MutexGuard<'_, ()> {
        self.topology.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn relationship(&self, id: RelationshipId) -> Option<Relationship> {
        self.relationships.get(&id).map(|r| r.clone())
    }

    /// Ids of all relationships, ascending.
    pub fn relationship_ids(&self) -> Vec<RelationshipId> {
        let mut ids: Vec<RelationshipId> = self.relationships.iter().map(|r| *r.key()).collect();
        ids.sort_unstable();
        ids
    }

    /// All relationships touching `node`, in either direction, ordered by id.
    pub fn relationships_of(&self, node: NodeId) -> Result<Vec<Relationship>, GraphError> {
        if !self.nodes.contains_key(&node) {
            return Err(GraphError::NodeNotFound(node));
        }
        let mut rels: Vec<Relationship> = self
            .relationships
            .iter()
            .filter(|r| r.start == node || r.end == node)
            .map(|r| r.clone())
            .collect();
        rels.sort_by_key(|r| r.id);
        Ok(rels)
    }

    pub fn delete_relationship(&self, id: RelationshipId) -> Result<Relationship, GraphError> {
        self.relationships
            .remove(&id)
            .map(|(_, rel)| rel)
            .ok_or(GraphError::RelationshipNotFound(id))
    }

    /// Add `node` to the named index under `key = value`, creating the index
    /// on first use.
    pub fn add_to_index(
        &self,
        index: &str,
        key: impl Into<String>,
        value: impl Into<String>,
        node: NodeId,
    ) -> Result<(), GraphError> {
        if !self.nodes.contains_key(&node) {
            return Err(GraphError::NodeNotFound(node));
        }
        self.node_indexes
            .entry(index.to_string())
            .or_default()
            .entry((key.into(), value.into()))
            .or_default()
            .insert(node);
        Ok(())
    }

    /// Exact-match lookup. Unknown indexes yield no hits.
    pub fn query_index(&self, index: &str, key: &str, value: &str) -> Vec<Node> {
        let ids: Vec<NodeId> = match self.node_indexes.get(index) {
            Some(entries) => entries
                .get(&(key.to_string(), value.to_string()))
                .map(|ids| ids.iter().copied().collect())
                .unwrap_or_default(),
            None => Vec::new(),
        };
        ids.into_iter().filter_map(|id| self.node(id)).collect()
    }

    /// Names of all node indexes, sorted.
    pub fn index_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.node_indexes.iter().map(|i| i.key().clone()).collect();
        names.sort();
        names
    }

    /// Drop an index entirely. Returns whether it existed.
    pub fn delete_index(&self, index: &str) -> bool {
        self.node_indexes.remove(index).is_some()
    }

    /// Flush the snapshot for persistent databases. No-op when impermanent.
    pub fn shutdown(&self) -> Result<(), GraphError> {
        let Some(store) = &self.store else {
            return Ok(());
        };
        let path = store.join(SNAPSHOT_FILE);
        let content = serde_json::to_string_pretty(&self.snapshot())?;
        fs::write(&path, content).map_err(|source| GraphError::Io {
            path: path.clone(),
            source,
        })?;
        tracing::debug!(path = %path.display(), "Graph snapshot written");
        Ok(())
    }

    fn snapshot(&self) -> Snapshot {
        let nodes = self.node_ids().into_iter().filter_map(|id| self.node(id)).collect();
        let relationships = self
            .relationship_ids()
            .into_iter()
            .filter_map(|id| self.relationship(id))
            .collect();
        let node_indexes = self
            .node_indexes
            .iter()
            .map(|index| {
                let entries = index
                    .value()
                    .iter()
                    .map(|((key, value), ids)| SnapshotIndexEntry {
                        key: key.clone(),
                        value: value.clone(),
                        nodes: ids.iter().copied().collect(),
                    })
                    .collect();
                (index.key().clone(), entries)
            })
            .collect();
        Snapshot {
            nodes,
            relationships,
            node_indexes,
        }
    }
}
