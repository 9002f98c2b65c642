//! Replication task definitions.
//!
//! A [`ReplicationTask`] is the unit one orchestrator invocation drives. It
//! carries the caller's defaults ([`TaskConfig`]) and, once resolved, the
//! merged configuration ([`ResolvedConfig`]) cached for the rest of the run.

mod args;

pub use args::TaskArgs;

use crate::config::{ConfigResolver, ResolvedConfig};
use crate::core::{
    BackfillFilter, ColumnTransformation, DataFormat, EtlMode, PartitionKey, QualityTolerance,
    SourceType,
};
use crate::errors::{IdentityError, ReplicationError};
use crate::registry::Registry;
use serde::{Deserialize, Serialize};

/// The three identifiers naming a replicated table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct TaskIdentity {
    /// Registered source (cluster, API, bucket) name.
    pub source_name: String,
    /// Database or namespace within the source.
    pub db_name: String,
    /// Table within the database.
    pub table_name: String,
}

impl TaskIdentity {
    /// Creates a task identity.
    #[must_use]
    pub fn new(
        source_name: impl Into<String>,
        db_name: impl Into<String>,
        table_name: impl Into<String>,
    ) -> Self {
        Self {
            source_name: source_name.into(),
            db_name: db_name.into(),
            table_name: table_name.into(),
        }
    }

    /// Checks that no identifier is blank.
    pub fn validate(&self) -> Result<(), IdentityError> {
        let missing: Vec<String> = [
            ("source_name", &self.source_name),
            ("db_name", &self.db_name),
            ("table_name", &self.table_name),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| name.to_string())
        .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(IdentityError::new(missing))
        }
    }

    /// Returns `source.db.table`.
    #[must_use]
    pub fn qualified(&self) -> String {
        format!("{}.{}.{}", self.source_name, self.db_name, self.table_name)
    }
}

impl std::fmt::Display for TaskIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}", self.source_name, self.db_name, self.table_name)
    }
}

/// The resolvable part of a task's configuration.
///
/// Every field here can be replaced by a registry override.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskConfig {
    /// How new data is applied.
    pub etl_mode: EtlMode,
    /// CLEAN layer storage layout.
    pub data_format: DataFormat,
    /// Owning team; part of every path and catalog name.
    pub team: String,
    /// Final table name when it differs from the source table name.
    pub table_alias: Option<String>,
    /// Prefix the database component with the source name.
    pub use_enriched_naming: bool,
    /// Merge key(s) for incremental writes.
    pub upsert_key: Vec<String>,
    /// Partition columns.
    pub partition_keys: Vec<PartitionKey>,
    /// Column rewrites applied before persisting.
    pub column_transformations: Vec<ColumnTransformation>,
    /// Clustering columns for versioned tables.
    pub z_order_by: Vec<String>,
    /// Target number of output partitions.
    pub partitions_count: u32,
    /// Read pre-extracted RAW data instead of extracting.
    pub skip_extract: bool,
    /// Run the post-write quality gate.
    pub run_quality_check: bool,
    /// Let the writer evolve the table schema.
    pub schema_evolution: bool,
    /// Trailing window covered by the quality check.
    pub quality_window_days: u32,
    /// Allowed deviation band for the quality check.
    pub quality_tolerance: QualityTolerance,
    /// Column the quality check counts by, when not the default.
    pub quality_key: Option<String>,
    /// Principals granted read access on registration.
    pub grant_read_to: Vec<String>,
    /// Predicates restricting a backfill extraction.
    pub backfill_filters: Vec<BackfillFilter>,
}

impl Default for TaskConfig {
    fn default() -> Self {
        Self {
            etl_mode: EtlMode::Incremental,
            data_format: DataFormat::PlainColumnar,
            team: "default".to_string(),
            table_alias: None,
            use_enriched_naming: false,
            upsert_key: vec!["id".to_string()],
            partition_keys: Vec::new(),
            column_transformations: Vec::new(),
            z_order_by: Vec::new(),
            partitions_count: 100,
            skip_extract: false,
            run_quality_check: true,
            schema_evolution: true,
            quality_window_days: 60,
            quality_tolerance: QualityTolerance::default(),
            quality_key: None,
            grant_read_to: vec!["default-user".to_string()],
            backfill_filters: Vec::new(),
        }
    }
}

impl TaskConfig {
    /// Sorts partition keys by their declared order.
    pub fn normalize(&mut self) {
        self.partition_keys.sort_by_key(|key| key.order);
    }
}

/// A single table replication, owned by one orchestrator invocation.
#[derive(Debug, Clone)]
pub struct ReplicationTask {
    identity: TaskIdentity,
    source_type: SourceType,
    defaults: TaskConfig,
    extract_options: serde_json::Map<String, serde_json::Value>,
    write_options: serde_json::Map<String, serde_json::Value>,
    resolved: Option<ResolvedConfig>,
}

impl ReplicationTask {
    /// Creates a task from typed parts.
    ///
    /// Identifiers are not checked here; the orchestrator rejects blank ones
    /// before any I/O. Use [`TaskArgs`] to build from raw strings with
    /// eager validation.
    #[must_use]
    pub fn new(identity: TaskIdentity, source_type: SourceType, mut defaults: TaskConfig) -> Self {
        defaults.normalize();
        Self {
            identity,
            source_type,
            defaults,
            extract_options: serde_json::Map::new(),
            write_options: serde_json::Map::new(),
            resolved: None,
        }
    }

    /// Sets options passed through to the reader.
    #[must_use]
    pub fn with_extract_options(mut self, options: serde_json::Map<String, serde_json::Value>) -> Self {
        self.extract_options = options;
        self
    }

    /// Sets options passed through to the writer.
    #[must_use]
    pub fn with_write_options(mut self, options: serde_json::Map<String, serde_json::Value>) -> Self {
        self.write_options = options;
        self
    }

    /// Returns the task identity.
    #[must_use]
    pub fn identity(&self) -> &TaskIdentity {
        &self.identity
    }

    /// Returns the declared source type.
    #[must_use]
    pub fn source_type(&self) -> SourceType {
        self.source_type
    }

    /// Returns the caller-supplied defaults.
    #[must_use]
    pub fn defaults(&self) -> &TaskConfig {
        &self.defaults
    }

    /// Returns the reader pass-through options.
    #[must_use]
    pub fn extract_options(&self) -> &serde_json::Map<String, serde_json::Value> {
        &self.extract_options
    }

    /// Returns the writer pass-through options.
    #[must_use]
    pub fn write_options(&self) -> &serde_json::Map<String, serde_json::Value> {
        &self.write_options
    }

    /// Returns the resolved configuration, if resolution already ran.
    #[must_use]
    pub fn resolved(&self) -> Option<&ResolvedConfig> {
        self.resolved.as_ref()
    }

    /// Checks the identifiers.
    pub fn validate(&self) -> Result<(), IdentityError> {
        self.identity.validate()
    }

    /// Resolves the configuration against the registry.
    ///
    /// Runs at most once per task; later calls return the cached result
    /// without consulting the registry again.
    pub fn resolve_config(&mut self, registry: &dyn Registry) -> Result<&ResolvedConfig, ReplicationError> {
        let resolved = match self.resolved.take() {
            Some(resolved) => resolved,
            None => ConfigResolver::new(registry).resolve(&self.identity, self.source_type, &self.defaults)?,
        };
        Ok(self.resolved.insert(resolved))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::ConfigRegistry;

    #[test]
    fn test_identity_validate() {
        assert!(TaskIdentity::new("pg1", "sales", "orders").validate().is_ok());

        let err = TaskIdentity::new("pg1", " ", "").validate().unwrap_err();
        assert_eq!(err.missing, vec!["db_name".to_string(), "table_name".to_string()]);
    }

    #[test]
    fn test_identity_display() {
        let identity = TaskIdentity::new("pg1", "sales", "orders");
        assert_eq!(identity.to_string(), "pg1.sales.orders");
        assert_eq!(identity.qualified(), "pg1.sales.orders");
    }

    #[test]
    fn test_task_defaults() {
        let config = TaskConfig::default();
        assert_eq!(config.team, "default");
        assert_eq!(config.upsert_key, vec!["id".to_string()]);
        assert_eq!(config.quality_window_days, 60);
        assert_eq!(config.grant_read_to, vec!["default-user".to_string()]);
        assert!(config.run_quality_check);
    }

    #[test]
    fn test_new_sorts_partition_keys() {
        let config = TaskConfig {
            partition_keys: vec![PartitionKey::new("day", 2), PartitionKey::new("year", 0), PartitionKey::new("month", 1)],
            ..TaskConfig::default()
        };
        let task = ReplicationTask::new(TaskIdentity::new("pg1", "sales", "orders"), SourceType::Database, config);
        let columns: Vec<&str> = task.defaults().partition_keys.iter().map(|k| k.column.as_str()).collect();
        assert_eq!(columns, vec!["year", "month", "day"]);
    }

    #[test]
    fn test_resolve_config_is_cached() {
        let registry = ConfigRegistry::empty();
        let mut task = ReplicationTask::new(
            TaskIdentity::new("pg1", "sales", "orders"),
            SourceType::Database,
            TaskConfig::default(),
        );
        assert!(task.resolved().is_none());

        let first = task.resolve_config(&registry).unwrap().clone();
        let second = task.resolve_config(&registry).unwrap().clone();
        assert_eq!(first, second);
        assert!(task.resolved().is_some());
    }
}
