//! Raw, string-typed task arguments.

use super::{ReplicationTask, TaskConfig, TaskIdentity};
use crate::core::{
    BackfillFilter, ColumnTransformation, DataFormat, EtlMode, PartitionKey, QualityTolerance,
    SourceType,
};
use crate::errors::ReplicationError;
use serde::{Deserialize, Serialize};

/// Task arguments as a caller or a job definition file supplies them.
///
/// Mode, format and source type are plain strings here; [`TaskArgs::build`]
/// parses them into closed enums and fails on anything unknown.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskArgs {
    /// Registered source name.
    #[serde(default)]
    pub source_name: String,
    /// Database name.
    #[serde(default)]
    pub db_name: String,
    /// Table name.
    #[serde(default)]
    pub table_name: String,
    /// Source type (`database`, `third_party`, `file`).
    #[serde(default = "default_source_type")]
    pub source_type: String,
    /// ETL mode (`incremental`, `full_reload`).
    #[serde(default = "default_etl_mode")]
    pub etl_mode: String,
    /// Data format (`plain_columnar`, `versioned_columnar`).
    #[serde(default = "default_data_format")]
    pub data_format: String,
    /// Owning team.
    #[serde(default = "default_team")]
    pub team: String,
    /// Final table name override.
    #[serde(default)]
    pub table_alias: Option<String>,
    /// Prefix the database component with the source name.
    #[serde(default)]
    pub use_enriched_naming: bool,
    /// Merge key(s).
    #[serde(default = "default_upsert_key")]
    pub upsert_key: Vec<String>,
    /// Partition keys in any order.
    #[serde(default)]
    pub partition_keys: Vec<PartitionKey>,
    /// Column rewrites.
    #[serde(default)]
    pub column_transformations: Vec<ColumnTransformation>,
    /// Clustering columns.
    #[serde(default)]
    pub z_order_by: Vec<String>,
    /// Output partition count.
    #[serde(default = "default_partitions_count")]
    pub partitions_count: u32,
    /// Skip extraction and read the RAW layer.
    #[serde(default)]
    pub skip_extract: bool,
    /// Run the quality gate.
    #[serde(default = "default_true")]
    pub run_quality_check: bool,
    /// Allow schema evolution.
    #[serde(default = "default_true")]
    pub schema_evolution: bool,
    /// Quality check window.
    #[serde(default = "default_quality_window_days")]
    pub quality_window_days: u32,
    /// Quality tolerance band `[low, high]`.
    #[serde(default = "default_quality_tolerance")]
    pub quality_tolerance: (i64, i64),
    /// Quality check key column.
    #[serde(default)]
    pub quality_key: Option<String>,
    /// Read grants.
    #[serde(default = "default_grant_read_to")]
    pub grant_read_to: Vec<String>,
    /// Backfill predicates.
    #[serde(default)]
    pub backfill_filters: Vec<BackfillFilter>,
    /// Reader pass-through options.
    #[serde(default)]
    pub extract_options: serde_json::Map<String, serde_json::Value>,
    /// Writer pass-through options.
    #[serde(default)]
    pub write_options: serde_json::Map<String, serde_json::Value>,
}

fn default_source_type() -> String {
    "DATABASE".to_string()
}

fn default_etl_mode() -> String {
    "INCREMENTAL".to_string()
}

fn default_data_format() -> String {
    "PLAIN_COLUMNAR".to_string()
}

fn default_team() -> String {
    "default".to_string()
}

fn default_upsert_key() -> Vec<String> {
    vec!["id".to_string()]
}

fn default_partitions_count() -> u32 {
    100
}

fn default_true() -> bool {
    true
}

fn default_quality_window_days() -> u32 {
    60
}

fn default_quality_tolerance() -> (i64, i64) {
    (-20, 10)
}

fn default_grant_read_to() -> Vec<String> {
    vec!["default-user".to_string()]
}

impl TaskArgs {
    /// Creates arguments for a table with every other field defaulted.
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
            source_type: default_source_type(),
            etl_mode: default_etl_mode(),
            data_format: default_data_format(),
            team: default_team(),
            table_alias: None,
            use_enriched_naming: false,
            upsert_key: default_upsert_key(),
            partition_keys: Vec::new(),
            column_transformations: Vec::new(),
            z_order_by: Vec::new(),
            partitions_count: default_partitions_count(),
            skip_extract: false,
            run_quality_check: true,
            schema_evolution: true,
            quality_window_days: default_quality_window_days(),
            quality_tolerance: default_quality_tolerance(),
            quality_key: None,
            grant_read_to: default_grant_read_to(),
            backfill_filters: Vec::new(),
            extract_options: serde_json::Map::new(),
            write_options: serde_json::Map::new(),
        }
    }

    /// Sets the source type string.
    #[must_use]
    pub fn with_source_type(mut self, source_type: impl Into<String>) -> Self {
        self.source_type = source_type.into();
        self
    }

    /// Sets the ETL mode string.
    #[must_use]
    pub fn with_etl_mode(mut self, etl_mode: impl Into<String>) -> Self {
        self.etl_mode = etl_mode.into();
        self
    }

    /// Sets the data format string.
    #[must_use]
    pub fn with_data_format(mut self, data_format: impl Into<String>) -> Self {
        self.data_format = data_format.into();
        self
    }

    /// Sets the team.
    #[must_use]
    pub fn with_team(mut self, team: impl Into<String>) -> Self {
        self.team = team.into();
        self
    }

    /// Validates identifiers and parses every closed vocabulary.
    pub fn build(self) -> Result<ReplicationTask, ReplicationError> {
        let identity = TaskIdentity::new(self.source_name, self.db_name, self.table_name);
        identity.validate()?;

        let source_type: SourceType = self.source_type.parse()?;
        let etl_mode: EtlMode = self.etl_mode.parse()?;
        let data_format: DataFormat = self.data_format.parse()?;
        let quality_tolerance = QualityTolerance::new(self.quality_tolerance.0, self.quality_tolerance.1)?;

        let config = TaskConfig {
            etl_mode,
            data_format,
            team: self.team,
            table_alias: self.table_alias,
            use_enriched_naming: self.use_enriched_naming,
            upsert_key: self.upsert_key,
            partition_keys: self.partition_keys,
            column_transformations: self.column_transformations,
            z_order_by: self.z_order_by,
            partitions_count: self.partitions_count,
            skip_extract: self.skip_extract,
            run_quality_check: self.run_quality_check,
            schema_evolution: self.schema_evolution,
            quality_window_days: self.quality_window_days,
            quality_tolerance,
            quality_key: self.quality_key,
            grant_read_to: self.grant_read_to,
            backfill_filters: self.backfill_filters,
        };

        Ok(ReplicationTask::new(identity, source_type, config)
            .with_extract_options(self.extract_options)
            .with_write_options(self.write_options))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_with_defaults() {
        let task = TaskArgs::new("pg1", "sales", "orders").build().unwrap();
        assert_eq!(task.identity().qualified(), "pg1.sales.orders");
        assert_eq!(task.source_type(), SourceType::Database);
        assert_eq!(task.defaults().etl_mode, EtlMode::Incremental);
        assert_eq!(task.defaults().data_format, DataFormat::PlainColumnar);
    }

    #[test]
    fn test_build_parses_case_insensitively() {
        let task = TaskArgs::new("api", "crm", "contacts")
            .with_source_type("third_party")
            .with_etl_mode("full_reload")
            .with_data_format("Versioned_Columnar")
            .build()
            .unwrap();
        assert_eq!(task.source_type(), SourceType::ThirdParty);
        assert_eq!(task.defaults().etl_mode, EtlMode::FullReload);
        assert_eq!(task.defaults().data_format, DataFormat::VersionedColumnar);
    }

    #[test]
    fn test_unknown_mode_fails_at_construction() {
        let err = TaskArgs::new("pg1", "sales", "orders")
            .with_etl_mode("snapshot")
            .build()
            .unwrap_err();
        assert!(matches!(err, ReplicationError::Configuration(_)));
    }

    #[test]
    fn test_unknown_format_fails_at_construction() {
        let err = TaskArgs::new("pg1", "sales", "orders")
            .with_data_format("orc")
            .build()
            .unwrap_err();
        assert!(matches!(err, ReplicationError::Configuration(_)));
    }

    #[test]
    fn test_missing_identifier_fails() {
        let err = TaskArgs::new("", "sales", "orders").build().unwrap_err();
        match err {
            ReplicationError::Identity(e) => assert_eq!(e.missing, vec!["source_name".to_string()]),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_deserialize_from_json() {
        let args: TaskArgs = serde_json::from_value(serde_json::json!({
            "source_name": "pg1",
            "db_name": "sales",
            "table_name": "orders",
            "etl_mode": "FULL_RELOAD",
            "partition_keys": [
                {"column": "month", "order": 1},
                {"column": "year", "order": 0}
            ],
            "quality_tolerance": [-5, 5]
        }))
        .unwrap();

        let task = args.build().unwrap();
        assert_eq!(task.defaults().etl_mode, EtlMode::FullReload);
        assert_eq!(task.defaults().partition_keys[0].column, "year");
        assert_eq!(task.defaults().quality_tolerance, QualityTolerance::new(-5, 5).unwrap());
        assert_eq!(task.defaults().team, "default");
    }

    #[test]
    fn test_inverted_tolerance_rejected() {
        let mut args = TaskArgs::new("pg1", "sales", "orders");
        args.quality_tolerance = (10, -10);
        assert!(matches!(args.build(), Err(ReplicationError::Configuration(_))));
    }
}
