//! Test assertions for replication runs.

use crate::core::{QualityOutcome, RunState};
use crate::pipeline::PipelineRun;

use super::mocks::RecordingCatalog;

/// Asserts that the run finished successfully.
pub fn assert_run_done(run: &PipelineRun) {
    assert_eq!(
        run.state,
        RunState::Done,
        "Expected run {} to be done, got {} (error: {:?})",
        run.run_id,
        run.state,
        run.error
    );
}

/// Asserts that the run failed.
pub fn assert_run_failed(run: &PipelineRun) {
    assert_eq!(
        run.state,
        RunState::Failed,
        "Expected run {} to have failed, got {}",
        run.run_id,
        run.state
    );
}

/// Asserts the quality outcome of the run.
pub fn assert_quality_outcome(run: &PipelineRun, expected: QualityOutcome) {
    assert_eq!(
        run.quality, expected,
        "Expected quality outcome {expected}, got {}",
        run.quality
    );
}

/// Asserts the catalog operations seen, in order.
pub fn assert_catalog_calls(catalog: &RecordingCatalog, expected: &[&str]) {
    let calls = catalog.calls();
    assert_eq!(
        calls, expected,
        "Expected catalog calls {expected:?}, got {calls:?}"
    );
}

/// Asserts whether each registration recreated the table, in order.
pub fn assert_recreations(catalog: &RecordingCatalog, expected: &[bool]) {
    let drops: Vec<bool> = catalog
        .registrations()
        .iter()
        .map(|registration| registration.drop_original)
        .collect();
    assert_eq!(
        drops, expected,
        "Expected recreations {expected:?}, got {drops:?}"
    );
}
