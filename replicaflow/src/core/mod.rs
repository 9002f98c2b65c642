//! Core domain types for replicaflow.
//!
//! This module contains the vocabulary shared by every other module:
//! - ETL mode, data format, layer and source type enums
//! - Partition keys, column transformations and the quality tolerance band
//! - Run state and quality outcome enums

mod models;
mod status;

pub use models::{
    BackfillFilter, ColumnTransformation, DataFormat, DataLayer, EtlMode, PartitionKey,
    QualityTolerance, SourceType,
};
pub use status::{QualityOutcome, QualitySkipReason, RunState};
