//! Collaborator capabilities the orchestrator drives.
//!
//! Each trait is a narrow port onto an external system. Implementations are
//! shared as `Arc<dyn …>` and must be safe to call from any task.

use crate::core::{
    BackfillFilter, ColumnTransformation, DataFormat, EtlMode, PartitionKey,
};
use crate::task::TaskIdentity;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::sync::Arc;

/// An opaque handle to extracted data.
///
/// The orchestrator never looks inside; it passes the handle from the reader
/// to the writer. Engines attach their own frame type as the payload.
#[derive(Clone, Default)]
pub struct Dataset {
    /// Free-form description, used in logs.
    pub label: String,
    /// Row count, when the reader knows it.
    pub row_count: Option<u64>,
    payload: Option<Arc<dyn Any + Send + Sync>>,
}

impl std::fmt::Debug for Dataset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dataset")
            .field("label", &self.label)
            .field("row_count", &self.row_count)
            .field("has_payload", &self.payload.is_some())
            .finish()
    }
}

impl Dataset {
    /// Creates an empty dataset handle.
    #[must_use]
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            row_count: None,
            payload: None,
        }
    }

    /// Sets the row count.
    #[must_use]
    pub fn with_row_count(mut self, rows: u64) -> Self {
        self.row_count = Some(rows);
        self
    }

    /// Attaches an engine-specific payload.
    #[must_use]
    pub fn with_payload<T: Any + Send + Sync>(mut self, payload: T) -> Self {
        self.payload = Some(Arc::new(payload));
        self
    }

    /// Returns the payload if it is a `T`.
    #[must_use]
    pub fn payload<T: Any + Send + Sync>(&self) -> Option<&T> {
        self.payload.as_deref()?.downcast_ref::<T>()
    }
}

/// What the reader needs to extract one table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractOptions {
    /// Table being extracted.
    pub identity: TaskIdentity,
    /// RAW-layer prefix the reader may persist into.
    pub raw_path: String,
    /// Predicates restricting a backfill.
    pub backfill_filters: Vec<BackfillFilter>,
    /// Caller pass-through options.
    pub options: serde_json::Map<String, serde_json::Value>,
}

/// What the writer needs to persist one table into CLEAN.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WriteOptions {
    /// CLEAN catalog identifier.
    pub fq_name: String,
    /// CLEAN storage prefix.
    pub path: String,
    /// Merge or overwrite.
    pub etl_mode: EtlMode,
    /// Storage layout.
    pub data_format: DataFormat,
    /// Merge key(s) for incremental writes.
    pub upsert_key: Vec<String>,
    /// Partition columns, in order.
    pub partition_keys: Vec<PartitionKey>,
    /// Column rewrites.
    pub column_transformations: Vec<ColumnTransformation>,
    /// Clustering columns.
    pub z_order_by: Vec<String>,
    /// Target output partition count.
    pub partitions_count: u32,
    /// Let the table schema evolve.
    pub schema_evolution: bool,
    /// Caller pass-through options.
    pub options: serde_json::Map<String, serde_json::Value>,
}

/// A create-or-replace request for the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableRegistration {
    /// Catalog identifier.
    pub fq_name: String,
    /// Storage prefix the table points at.
    pub path: String,
    /// Storage layout.
    pub format: DataFormat,
    /// Partition columns, in order.
    pub partition_keys: Vec<PartitionKey>,
    /// Drop the existing table first.
    pub drop_original: bool,
}

/// Pulls data out of a source.
#[async_trait]
pub trait Reader: Send + Sync {
    /// Extracts the table described by `options`.
    async fn extract(&self, options: &ExtractOptions) -> anyhow::Result<Dataset>;

    /// Reads data already persisted at `path`.
    async fn read_path(&self, path: &str, format: DataFormat) -> anyhow::Result<Dataset>;
}

/// Persists data into the CLEAN layer.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Writer: Send + Sync {
    /// Writes `dataset`; returns true if new data was persisted.
    async fn write(&self, dataset: Dataset, options: &WriteOptions) -> anyhow::Result<bool>;

    /// Restores the version preceding the last write.
    async fn rollback(&self) -> anyhow::Result<()>;

    /// True if the last write was a full reload of an empty source.
    fn last_was_reload_noop(&self) -> bool;
}

/// The metastore tables are registered in.
#[async_trait]
pub trait Catalog: Send + Sync {
    /// Current DDL of a table, or `None` if it is not registered.
    async fn get_ddl(&self, fq_name: &str) -> anyhow::Result<Option<String>>;

    /// Creates the table, dropping the existing one first if requested.
    async fn create_or_replace(&self, registration: &TableRegistration) -> anyhow::Result<()>;

    /// Grants read access to `principals`.
    async fn grant_access(&self, fq_name: &str, principals: &[String]) -> anyhow::Result<()>;

    /// Re-discovers partitions after a write.
    async fn repair_partitions(&self, fq_name: &str) -> anyhow::Result<()>;
}
