//! Registry file model.

use crate::core::{
    BackfillFilter, ColumnTransformation, DataFormat, EtlMode, PartitionKey, QualityTolerance,
    SourceType,
};
use crate::task::TaskConfig;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The template a registry file follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistryType {
    /// Per-table overrides for batch replication tasks.
    BatchReplication,
}

fn default_active() -> bool {
    true
}

/// One registry file: a source and the tables registered under it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceRegistration {
    /// Template of the file.
    pub registry_type: RegistryType,
    /// Source name; matched case-insensitively.
    pub source_name: String,
    /// Declared type of the source.
    pub source_type: SourceType,
    /// Inactive sources are dropped at load.
    #[serde(default = "default_active")]
    pub is_active: bool,
    /// Databases keyed by name.
    #[serde(default)]
    pub databases: BTreeMap<String, DatabaseRegistration>,
}

/// Tables registered under one database.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DatabaseRegistration {
    /// Table overrides keyed by table name.
    #[serde(default)]
    pub tables: BTreeMap<String, ConfigOverride>,
}

/// A centrally registered override for one table.
///
/// Recognized fields are optional; a field left out keeps the task's
/// default. Anything not recognized lands in `extra` and is reported but
/// never applied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigOverride {
    /// Inactive entries are invisible to every lookup.
    #[serde(default = "default_active")]
    pub is_active: bool,
    /// ETL mode override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub etl_mode: Option<EtlMode>,
    /// Data format override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_format: Option<DataFormat>,
    /// Team override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team: Option<String>,
    /// Table alias override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table_alias: Option<String>,
    /// Enriched naming override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub use_enriched_naming: Option<bool>,
    /// Upsert key override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upsert_key: Option<Vec<String>>,
    /// Partition keys override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partition_keys: Option<Vec<PartitionKey>>,
    /// Column transformations override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column_transformations: Option<Vec<ColumnTransformation>>,
    /// Clustering columns override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub z_order_by: Option<Vec<String>>,
    /// Partition count override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partitions_count: Option<u32>,
    /// Skip-extract override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip_extract: Option<bool>,
    /// Quality gate toggle override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_quality_check: Option<bool>,
    /// Schema evolution override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_evolution: Option<bool>,
    /// Quality window override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality_window_days: Option<u32>,
    /// Quality tolerance override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality_tolerance: Option<QualityTolerance>,
    /// Quality key override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality_key: Option<String>,
    /// Read grants override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grant_read_to: Option<Vec<String>>,
    /// Backfill filters override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backfill_filters: Option<Vec<BackfillFilter>>,
    /// Unrecognized fields, kept for reporting only.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl Default for ConfigOverride {
    fn default() -> Self {
        Self {
            is_active: true,
            etl_mode: None,
            data_format: None,
            team: None,
            table_alias: None,
            use_enriched_naming: None,
            upsert_key: None,
            partition_keys: None,
            column_transformations: None,
            z_order_by: None,
            partitions_count: None,
            skip_extract: None,
            run_quality_check: None,
            schema_evolution: None,
            quality_window_days: None,
            quality_tolerance: None,
            quality_key: None,
            grant_read_to: None,
            backfill_filters: None,
            extra: BTreeMap::new(),
        }
    }
}

impl ConfigOverride {
    /// Applies the recognized fields on top of `base`.
    ///
    /// Returns the merged configuration and the names of the fields that
    /// were replaced, in declaration order.
    #[must_use]
    pub fn apply(&self, base: &TaskConfig) -> (TaskConfig, Vec<&'static str>) {
        let entry = self;
        let mut merged = base.clone();
        let mut overridden = Vec::new();

        macro_rules! take {
            ($field:ident) => {
                if let Some(value) = &entry.$field {
                    merged.$field = value.clone();
                    overridden.push(stringify!($field));
                }
            };
            ($field:ident, optional) => {
                if let Some(value) = &entry.$field {
                    merged.$field = Some(value.clone());
                    overridden.push(stringify!($field));
                }
            };
        }

        take!(etl_mode);
        take!(data_format);
        take!(team);
        take!(table_alias, optional);
        take!(use_enriched_naming);
        take!(upsert_key);
        take!(partition_keys);
        take!(column_transformations);
        take!(z_order_by);
        take!(partitions_count);
        take!(skip_extract);
        take!(run_quality_check);
        take!(schema_evolution);
        take!(quality_window_days);
        take!(quality_tolerance);
        take!(quality_key, optional);
        take!(grant_read_to);
        take!(backfill_filters);

        merged.normalize();
        (merged, overridden)
    }

    /// Returns true if the entry carries unrecognized fields.
    #[must_use]
    pub fn has_extra(&self) -> bool {
        !self.extra.is_empty()
    }
}

/// A (source, db, table) triple known to the registry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RegistryTask {
    /// Source name.
    pub source_name: String,
    /// Database name.
    pub db_name: String,
    /// Table name.
    pub table_name: String,
}
