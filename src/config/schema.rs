//! Configuration resource schema.
//!
//! These types are deserialized from the TOML configuration resource named
//! by `ServerConfig`. Every section has defaults so an empty file is valid.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Root of the configuration resource.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct ServerProperties {
    /// Database store settings.
    pub database: DatabaseConfig,

    /// Embedded web server settings.
    pub web: WebConfig,
}

/// Database store settings handed to the storage factory.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Store directory. Ignored by the ephemeral storage factory.
    pub location: PathBuf,

    /// Free-form database properties passed through to the storage factory.
    pub properties: BTreeMap<String, String>,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            location: PathBuf::from("target/graph-test-db"),
            properties: BTreeMap::new(),
        }
    }
}

/// Embedded web server settings.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct WebConfig {
    /// Mount point of the REST API module (e.g., "/db/data").
    pub rest_api_path: String,

    /// Request timeout in seconds.
    pub request_timeout_secs: u64,

    /// Maximum request body size in bytes.
    pub max_body_size: usize,

    /// Worker threads of the server's tokio runtime.
    pub worker_threads: usize,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            rest_api_path: "/db/data".to_string(),
            request_timeout_secs: 30,
            max_body_size: 2 * 1024 * 1024, // 2MB
            worker_threads: 2,
        }
    }
}

impl WebConfig {
    /// REST API mount point without a trailing slash.
    pub fn rest_api_prefix(&self) -> &str {
        self.rest_api_path.trim_end_matches('/')
    }
}
