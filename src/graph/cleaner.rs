//! Database cleaning between test cases.

use serde::Serialize;

use crate::graph::store::{GraphDatabase, GraphError};

/// Counts of what a clean removed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CleanupSummary {
    pub nodes_deleted: usize,
    pub relationships_deleted: usize,
    pub indexes_deleted: usize,
}

/// Wipes a database back to a blank graph without restarting the server.
pub trait DatabaseCleaner: Send + Sync {
    fn clean_db(&self, graph: &GraphDatabase) -> CleanupSummary;
}

/// Removes every index, relationship and node, in that order.
#[derive(Debug, Clone, Copy, Default)]
pub struct GraphCleaner;

impl DatabaseCleaner for GraphCleaner {
    fn clean_db(&self, graph: &GraphDatabase) -> CleanupSummary {
        let mut summary = CleanupSummary::default();

        for name in graph.index_names() {
            if graph.delete_index(&name) {
                summary.indexes_deleted += 1;
            }
        }

        for id in graph.relationship_ids() {
            if graph.delete_relationship(id).is_ok() {
                summary.relationships_deleted += 1;
            }
        }

        for id in graph.node_ids() {
            match graph.delete_node(id) {
                Ok(_) => summary.nodes_deleted += 1,
                // Deleted concurrently.
                Err(GraphError::NodeNotFound(_)) => {}
                Err(e) => {
                    tracing::warn!(node = id, error = %e, "Node survived clean");
                }
            }
        }

        tracing::debug!(
            nodes = summary.nodes_deleted,
            relationships = summary.relationships_deleted,
            indexes = summary.indexes_deleted,
            "Database cleaned"
        );
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::store::Properties;
    use std::collections::BTreeMap;

    #[test]
    fn test_clean_removes_everything() {
        let db = GraphDatabase::impermanent(BTreeMap::new());
        let a = db.create_node(Properties::new());
        let b = db.create_node(Properties::new());
        db.create_relationship(a.id, b.id, "KNOWS", Properties::new()).unwrap();
        db.add_to_index("people", "name", "a", a.id).unwrap();

        let summary = GraphCleaner.clean_db(&db);

        assert_eq!(
            summary,
            CleanupSummary {
                nodes_deleted: 2,
                relationships_deleted: 1,
                indexes_deleted: 1,
            }
        );
        assert_eq!(db.node_count(), 0);
        assert_eq!(db.relationship_count(), 0);
        assert!(db.index_names().is_empty());
    }

    #[test]
    fn test_clean_empty_database() {
        let db = GraphDatabase::impermanent(BTreeMap::new());
        assert_eq!(GraphCleaner.clean_db(&db), CleanupSummary::default());
    }
}
