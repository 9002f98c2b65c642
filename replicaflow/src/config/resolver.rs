//! Merges a task's defaults with its registered override.

use crate::core::SourceType;
use crate::errors::{ReplicationError, TypeMismatchError};
use crate::registry::Registry;
use crate::task::{TaskConfig, TaskIdentity};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{info, warn};

/// Where a resolved configuration came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfigOrigin {
    /// The source is not registered; caller defaults apply.
    SourceNotRegistered,
    /// The source is registered but the table is not; caller defaults apply.
    TableNotRegistered,
    /// A registered override was merged over the defaults.
    Registry,
}

impl std::fmt::Display for ConfigOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SourceNotRegistered => write!(f, "source_not_registered"),
            Self::TableNotRegistered => write!(f, "table_not_registered"),
            Self::Registry => write!(f, "registry"),
        }
    }
}

/// The effective configuration of one task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedConfig {
    /// Merged configuration.
    pub config: TaskConfig,
    /// Where it came from.
    pub origin: ConfigOrigin,
    /// Names of the fields the override replaced.
    pub overridden: Vec<String>,
    /// Unrecognized override fields; never applied.
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl ResolvedConfig {
    fn from_defaults(defaults: &TaskConfig, origin: ConfigOrigin) -> Self {
        Self {
            config: defaults.clone(),
            origin,
            overridden: Vec::new(),
            extra: BTreeMap::new(),
        }
    }

    /// Returns true if any field came from the registry.
    #[must_use]
    pub fn is_overridden(&self) -> bool {
        !self.overridden.is_empty()
    }
}

/// Resolves task configuration against a registry.
pub struct ConfigResolver<'a> {
    registry: &'a dyn Registry,
}

impl<'a> ConfigResolver<'a> {
    /// Creates a resolver over `registry`.
    #[must_use]
    pub fn new(registry: &'a dyn Registry) -> Self {
        Self { registry }
    }

    /// Resolves the configuration for one table.
    ///
    /// A missing source or table is not an error: the defaults are returned
    /// and a warning is logged.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the registry cannot be loaded, and a
    /// type mismatch if the registered source type differs from
    /// `source_type`.
    pub fn resolve(
        &self,
        identity: &TaskIdentity,
        source_type: SourceType,
        defaults: &TaskConfig,
    ) -> Result<ResolvedConfig, ReplicationError> {
        self.registry.ensure_loaded()?;
        let TaskIdentity {
            source_name,
            db_name,
            table_name,
        } = identity;

        if !self.registry.has_source(source_name) {
            warn!(source = %source_name, "Source not found in registry; using task defaults");
            return Ok(Self::summarize(identity, ResolvedConfig::from_defaults(defaults, ConfigOrigin::SourceNotRegistered)));
        }

        if let Some(registered) = self.registry.source_type(source_name) {
            if registered != source_type {
                return Err(TypeMismatchError::new(identity.qualified(), source_type, registered).into());
            }
        }

        let Some(entry) = self.registry.get_override(source_name, db_name, table_name) else {
            warn!(
                table = %identity,
                "Table not found in registry; using task defaults"
            );
            return Ok(Self::summarize(identity, ResolvedConfig::from_defaults(defaults, ConfigOrigin::TableNotRegistered)));
        };

        if entry.has_extra() {
            let fields: Vec<&str> = entry.extra.keys().map(String::as_str).collect();
            warn!(
                table = %identity,
                extra = ?fields,
                "Registry entry carries unrecognized fields; they are not applied"
            );
        }

        let (config, overridden) = entry.apply(defaults);
        Ok(Self::summarize(
            identity,
            ResolvedConfig {
                config,
                origin: ConfigOrigin::Registry,
                overridden: overridden.into_iter().map(str::to_string).collect(),
                extra: entry.extra.clone(),
            },
        ))
    }

    fn summarize(identity: &TaskIdentity, resolved: ResolvedConfig) -> ResolvedConfig {
        info!(
            table = %identity,
            origin = %resolved.origin,
            overridden = resolved.overridden.len(),
            fields = ?resolved.overridden,
            "Configuration resolved"
        );
        resolved
    }
}
