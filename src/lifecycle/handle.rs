//! Access to a running server's database.

use std::sync::Arc;
use url::Url;

use crate::graph::{CleanupSummary, DatabaseCleaner, GraphDatabase};
use crate::observability::metrics;

/// Handle to the live database of a running server.
///
/// Obtained from `LifecycleController::database_handle`. The handle keeps the
/// database alive but not the server; after `stop()` the base URI no longer
/// answers.
#[derive(Clone)]
pub struct DatabaseHandle {
    graph: Arc<GraphDatabase>,
    base_uri: Url,
    cleaner: Arc<dyn DatabaseCleaner>,
}

impl std::fmt::Debug for DatabaseHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseHandle")
            .field("graph", &self.graph)
            .field("base_uri", &self.base_uri.as_str())
            .finish()
    }
}

impl DatabaseHandle {
    pub fn new(graph: Arc<GraphDatabase>, base_uri: Url, cleaner: Arc<dyn DatabaseCleaner>) -> Self {
        Self {
            graph,
            base_uri,
            cleaner,
        }
    }

    /// The live database, for direct test assertions.
    pub fn graph(&self) -> &Arc<GraphDatabase> {
        &self.graph
    }

    pub fn base_uri(&self) -> &Url {
        &self.base_uri
    }

    /// Wipe all nodes, relationships and indexes without restarting.
    pub fn clean_db(&self) -> CleanupSummary {
        let summary = self.cleaner.clean_db(&self.graph);
        metrics::record_clean(&summary);
        summary
    }
}
