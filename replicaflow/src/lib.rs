//! # Replicaflow
//!
//! Per-table data replication: take one table from a source system, land
//! it in the lake's CLEAN layer, register it in the catalog and gate it on
//! a data quality check.
//!
//! Replicaflow provides:
//!
//! - **Config resolution**: caller defaults overridden by a YAML registry of
//!   sources, databases and tables
//! - **Deterministic naming**: storage paths and catalog identifiers derived
//!   from team, database and table
//! - **Recreation policy**: when the catalog table must be dropped and
//!   recreated rather than refreshed
//! - **Quality gating**: rollback of versioned tables on a failed check
//! - **Ancillary reporting**: run rows, metrics, monitors and alerts that
//!   never fail a run
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use replicaflow::prelude::*;
//!
//! let settings = PipelineSettings::from_env()?;
//! replicaflow::logging::init_from_settings(&settings);
//!
//! let orchestrator = PipelineOrchestrator::builder(reader, writer, catalog, checker)
//!     .with_registry(Arc::new(LazyRegistry::new(settings.registry_root())))
//!     .with_reporters(Reporters::new(&settings))
//!     .build();
//!
//! let mut task = TaskArgs::new("pg1", "sales", "orders").build()?;
//! let run = orchestrator.run(&mut task).await?;
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod config;
pub mod core;
pub mod errors;
pub mod logging;
pub mod naming;
pub mod notify;
pub mod pipeline;
pub mod policy;
pub mod quality;
pub mod registry;
pub mod reporting;
pub mod task;
pub mod testing;
pub mod utils;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::{ConfigOrigin, PipelineSettings, ResolvedConfig};
    pub use crate::core::{
        DataFormat, DataLayer, EtlMode, PartitionKey, QualityOutcome, QualityTolerance, RunState,
        SourceType,
    };
    pub use crate::errors::{ErrorInfo, ReplicationError};
    pub use crate::naming::{TableLocation, TableNaming};
    pub use crate::notify::{Alert, AlertSeverity, LoggingNotifier, NoOpNotifier, Notifier};
    pub use crate::pipeline::{
        Catalog, Dataset, ExtractOptions, PipelineOrchestrator, PipelineRun, Reader,
        TableRegistration, WriteOptions, Writer,
    };
    pub use crate::policy::{RecreationDecision, RecreationPolicy, RecreationReason};
    pub use crate::quality::{CheckDescriptor, QualityChecker};
    pub use crate::registry::{ConfigRegistry, LazyRegistry, Registry};
    pub use crate::reporting::{MetricReporter, MonitorInitializer, Reporters, RunReporter};
    pub use crate::task::{ReplicationTask, TaskArgs, TaskConfig, TaskIdentity};
    pub use std::sync::Arc;
}
