//! Configuration loading from disk.

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::schema::ServerProperties;
use crate::config::validation::{validate_properties, ValidationError};

/// Error type for configuration resolution and loading.
#[derive(Debug)]
pub enum ConfigError {
    /// The named resource is not on the search path.
    NotFound { name: String, searched: Vec<PathBuf> },
    Io { path: PathBuf, source: std::io::Error },
    Parse { path: PathBuf, source: toml::de::Error },
    Validation(Vec<ValidationError>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::NotFound { name, searched } => {
                write!(f, "Could not resolve configuration resource {:?} (searched: ", name)?;
                for (i, dir) in searched.iter().enumerate() {
                    if i > 0 { write!(f, ", ")?; }
                    write!(f, "{}", dir.display())?;
                }
                write!(f, ")")
            }
            ConfigError::Io { path, source } => write!(f, "IO error reading {}: {}", path.display(), source),
            ConfigError::Parse { path, source } => write!(f, "Parse error in {}: {}", path.display(), source),
            ConfigError::Validation(errors) => {
                write!(f, "Validation failed: ")?;
                for (i, err) in errors.iter().enumerate() {
                    if i > 0 { write!(f, ", ")?; }
                    write!(f, "{}", err)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io { source, .. } => Some(source),
            ConfigError::Parse { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Load and validate server properties from a TOML file.
pub fn load_properties(path: &Path) -> Result<ServerProperties, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let props: ServerProperties = toml::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;

    validate_properties(&props).map_err(ConfigError::Validation)?;

    Ok(props)
}
