//! Startup health checks.
//!
//! # Responsibilities
//! - Validate the loaded configuration before the container binds
//! - Run rules in registration order, stop at the first failure
//!
//! # Design Decisions
//! - Empty by default: readiness polling is the only startup check
//! - Rules see properties only, never the live server

use std::sync::Arc;

use crate::config::schema::ServerProperties;
use crate::server::container::ContainerError;

/// A single startup validation predicate.
pub trait StartupHealthCheckRule: Send + Sync {
    fn name(&self) -> &str;

    /// `Err` carries the reason the server must not start.
    fn execute(&self, properties: &ServerProperties) -> Result<(), String>;
}

/// Ordered set of startup rules.
#[derive(Clone, Default)]
pub struct HealthCheckSet {
    rules: Vec<Arc<dyn StartupHealthCheckRule>>,
}

impl std::fmt::Debug for HealthCheckSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

impl HealthCheckSet {
    /// An empty set.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rule(mut self, rule: impl StartupHealthCheckRule + 'static) -> Self {
        self.rules.push(Arc::new(rule));
        self
    }

    /// Add a closure-backed rule.
    pub fn with_check<F>(self, name: impl Into<String>, check: F) -> Self
    where
        F: Fn(&ServerProperties) -> Result<(), String> + Send + Sync + 'static,
    {
        self.with_rule(FnRule {
            name: name.into(),
            check,
        })
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.rules.iter().map(|r| r.name()).collect()
    }

    /// Run every rule in order.
    pub fn run(&self, properties: &ServerProperties) -> Result<(), ContainerError> {
        for rule in &self.rules {
            tracing::debug!(rule = rule.name(), "Running startup health check");
            if let Err(reason) = rule.execute(properties) {
                tracing::error!(rule = rule.name(), reason = %reason, "Startup health check failed");
                return Err(ContainerError::HealthCheck {
                    rule: rule.name().to_string(),
                    reason,
                });
            }
        }
        Ok(())
    }
}

struct FnRule<F> {
    name: String,
    check: F,
}

impl<F> StartupHealthCheckRule for FnRule<F>
where
    F: Fn(&ServerProperties) -> Result<(), String> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn execute(&self, properties: &ServerProperties) -> Result<(), String> {
        (self.check)(properties)
    }
}

/// Requires a key in `[database.properties]`.
#[derive(Debug, Clone)]
pub struct RequiredPropertyRule {
    name: String,
    key: String,
}

impl RequiredPropertyRule {
    pub fn new(key: impl Into<String>) -> Self {
        let key = key.into();
        Self {
            name: format!("required-property:{key}"),
            key,
        }
    }
}

impl StartupHealthCheckRule for RequiredPropertyRule {
    fn name(&self) -> &str {
        &self.name
    }

    fn execute(&self, properties: &ServerProperties) -> Result<(), String> {
        if properties.database.properties.contains_key(&self.key) {
            Ok(())
        } else {
            Err(format!("database property '{}' is not set", self.key))
        }
    }
}
