//! Testing utilities for replication pipelines.
//!
//! This module provides:
//! - Recording doubles for every collaborator
//! - A harness wiring them into an orchestrator
//! - Assertions on finished runs

mod assertions;
mod fixtures;
pub mod mocks;

pub use assertions::{
    assert_catalog_calls, assert_quality_outcome, assert_recreations, assert_run_done,
    assert_run_failed,
};
pub use fixtures::{database_task, TestHarness};
pub use mocks::{
    RecordingCatalog, RecordingMetricReporter, RecordingMonitor, RecordingReader,
    RecordingRunReporter, RecordingWriter, StaticQualityChecker,
};
