//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, body limits > 0)
//! - Validate mount points
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ServerProperties → Result<(), Vec<ValidationError>>
//! - Runs before the container is assembled

use crate::config::schema::ServerProperties;

/// A single semantic problem in the configuration resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: &'static str,
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate loaded server properties.
pub fn validate_properties(props: &ServerProperties) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if props.database.location.as_os_str().is_empty() {
        errors.push(ValidationError {
            field: "database.location",
            message: "must not be empty".to_string(),
        });
    }

    let prefix = props.web.rest_api_prefix();
    if !prefix.starts_with('/') || prefix.len() < 2 {
        errors.push(ValidationError {
            field: "web.rest_api_path",
            message: format!("must be an absolute path below the root, got {:?}", props.web.rest_api_path),
        });
    } else if let Some(segment) = prefix.split('/').find(|segment| !is_literal_segment(segment)) {
        errors.push(ValidationError {
            field: "web.rest_api_path",
            message: format!(
                "must be a literal path, segment {:?} in {:?} is a route pattern",
                segment, props.web.rest_api_path
            ),
        });
    }

    if props.web.request_timeout_secs == 0 {
        errors.push(ValidationError {
            field: "web.request_timeout_secs",
            message: "must be greater than zero".to_string(),
        });
    }

    if props.web.max_body_size == 0 {
        errors.push(ValidationError {
            field: "web.max_body_size",
            message: "must be greater than zero".to_string(),
        });
    }

    if props.web.worker_threads == 0 {
        errors.push(ValidationError {
            field: "web.worker_threads",
            message: "must be greater than zero".to_string(),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// A path segment the router matches literally: no captures, wildcards or
/// brace escapes.
fn is_literal_segment(segment: &str) -> bool {
    !segment.starts_with(':') && !segment.starts_with('*') && !segment.contains(|c: char| c == '{' || c == '}')
}
