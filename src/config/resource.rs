//! Configuration resource resolution.
//!
//! # Responsibilities
//! - Map a resource name (e.g., "test-db.toml") to a file on disk
//! - Search an ordered list of directories, first hit wins
//!
//! # Design Decisions
//! - `GRAPH_TEST_SERVER_RESOURCE_PATH` entries are searched before the
//!   built-in directories so a test suite can point at its own fixtures
//! - A leading '/' is ignored: "/test-db.toml" and "test-db.toml" are the
//!   same resource
//! - Resolution is repeated at every start, never cached

use std::env;
use std::path::{Path, PathBuf};

use crate::config::loader::ConfigError;

/// Environment variable holding extra search directories (platform path
/// separator).
pub const RESOURCE_PATH_ENV: &str = "GRAPH_TEST_SERVER_RESOURCE_PATH";

/// Resolves resource names against a search path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceLocator {
    search_path: Vec<PathBuf>,
}

impl ResourceLocator {
    /// Locator searching exactly the given directories, in order.
    pub fn new(search_path: Vec<PathBuf>) -> Self {
        Self { search_path }
    }

    /// Locator built from the environment and the built-in directories.
    pub fn from_env() -> Self {
        let mut search_path: Vec<PathBuf> = env::var_os(RESOURCE_PATH_ENV)
            .map(|paths| env::split_paths(&paths).collect())
            .unwrap_or_default();
        search_path.extend(
            [".", "resources", "tests/resources"]
                .into_iter()
                .map(PathBuf::from),
        );
        Self { search_path }
    }

    /// Put `dir` in front of the search path.
    pub fn prepend(mut self, dir: impl Into<PathBuf>) -> Self {
        self.search_path.insert(0, dir.into());
        self
    }

    pub fn search_path(&self) -> &[PathBuf] {
        &self.search_path
    }

    /// Resolve `name` to an existing file.
    pub fn resolve(&self, name: &str) -> Result<PathBuf, ConfigError> {
        let direct = Path::new(name);
        if direct.is_absolute() && direct.is_file() {
            return Ok(direct.to_path_buf());
        }

        let relative = name.trim_start_matches('/');
        if !relative.is_empty() {
            for dir in &self.search_path {
                let candidate = dir.join(relative);
                if candidate.is_file() {
                    tracing::debug!(resource = %name, path = %candidate.display(), "Resolved configuration resource");
                    return Ok(candidate);
                }
            }
        }

        Err(ConfigError::NotFound {
            name: name.to_string(),
            searched: self.search_path.clone(),
        })
    }
}

impl Default for ResourceLocator {
    fn default() -> Self {
        Self::from_env()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_first_match_wins() {
        let first = tempfile::tempdir().unwrap();
        let second = tempfile::tempdir().unwrap();
        fs::write(first.path().join("db.toml"), "").unwrap();
        fs::write(second.path().join("db.toml"), "").unwrap();

        let locator = ResourceLocator::new(vec![
            second.path().to_path_buf(),
            first.path().to_path_buf(),
        ]);
        assert_eq!(locator.resolve("db.toml").unwrap(), second.path().join("db.toml"));
    }

    #[test]
    fn test_leading_slash_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("db.toml"), "").unwrap();

        let locator = ResourceLocator::new(vec![dir.path().to_path_buf()]);
        assert_eq!(locator.resolve("/db.toml").unwrap(), dir.path().join("db.toml"));
    }

    #[test]
    fn test_absolute_path_used_as_is() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("elsewhere.toml");
        fs::write(&path, "").unwrap();

        let locator = ResourceLocator::new(Vec::new());
        assert_eq!(locator.resolve(path.to_str().unwrap()).unwrap(), path);
    }

    #[test]
    fn test_missing_resource() {
        let dir = tempfile::tempdir().unwrap();
        let locator = ResourceLocator::new(vec![dir.path().to_path_buf()]);

        let err = locator.resolve("nope.toml").unwrap_err();
        match err {
            ConfigError::NotFound { name, searched } => {
                assert_eq!(name, "nope.toml");
                assert_eq!(searched, vec![dir.path().to_path_buf()]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_directories_are_not_resources() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("db.toml")).unwrap();
        let locator = ResourceLocator::new(vec![dir.path().to_path_buf()]);
        assert!(locator.resolve("db.toml").is_err());
    }

    #[test]
    fn test_prepend() {
        let locator = ResourceLocator::new(vec![PathBuf::from("b")]).prepend("a");
        assert_eq!(locator.search_path(), &[PathBuf::from("a"), PathBuf::from("b")]);
    }
}
