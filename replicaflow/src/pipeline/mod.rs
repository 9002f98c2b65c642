//! Per-table pipeline execution.
//!
//! This module provides:
//! - The collaborator ports (reader, writer, catalog)
//! - Run state tracking
//! - The orchestrator driving one table through the steps

mod orchestrator;
mod ports;
mod run;

pub use orchestrator::{PipelineOrchestrator, PipelineOrchestratorBuilder};
#[cfg(test)]
pub use ports::MockWriter;
pub use ports::{Catalog, Dataset, ExtractOptions, Reader, TableRegistration, WriteOptions, Writer};
pub use run::{PipelineRun, RunKey};
