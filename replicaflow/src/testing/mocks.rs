//! Recording doubles for every collaborator.
//!
//! Each double records its calls behind a `parking_lot::Mutex` and returns a
//! configurable result, so a test can drive the orchestrator end to end and
//! then assert on what each collaborator saw.

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::core::DataFormat;
use crate::pipeline::{
    Catalog, Dataset, ExtractOptions, PipelineRun, Reader, RunKey, TableRegistration, WriteOptions,
    Writer,
};
use crate::quality::{CheckDescriptor, QualityChecker};
use crate::reporting::{MetricReporter, MonitorInitializer, RunReporter};

fn fail(message: &Option<String>) -> anyhow::Result<()> {
    match message {
        Some(msg) => Err(anyhow::anyhow!(msg.clone())),
        None => Ok(()),
    }
}

/// A reader returning a fixed dataset.
#[derive(Debug, Default)]
pub struct RecordingReader {
    failure: Option<String>,
    calls: Mutex<Vec<String>>,
    extract_options: Mutex<Vec<ExtractOptions>>,
}

impl RecordingReader {
    /// Creates a reader that succeeds.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a reader whose every call fails with `message`.
    #[must_use]
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            failure: Some(message.into()),
            ..Self::default()
        }
    }

    /// Calls in order: `extract` or `read_path:<path>`.
    #[must_use]
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    /// Options passed to each `extract` call.
    #[must_use]
    pub fn extract_options(&self) -> Vec<ExtractOptions> {
        self.extract_options.lock().clone()
    }
}

#[async_trait]
impl Reader for RecordingReader {
    async fn extract(&self, options: &ExtractOptions) -> anyhow::Result<Dataset> {
        self.calls.lock().push("extract".to_string());
        self.extract_options.lock().push(options.clone());
        fail(&self.failure)?;
        Ok(Dataset::new(options.identity.qualified()).with_row_count(3))
    }

    async fn read_path(&self, path: &str, _format: DataFormat) -> anyhow::Result<Dataset> {
        self.calls.lock().push(format!("read_path:{path}"));
        fail(&self.failure)?;
        Ok(Dataset::new(path))
    }
}

/// A writer with a fixed write outcome.
#[derive(Debug)]
pub struct RecordingWriter {
    wrote_new_data: bool,
    reload_noop: bool,
    write_failure: Option<String>,
    rollback_failure: Option<String>,
    writes: Mutex<Vec<WriteOptions>>,
    rollbacks: Mutex<usize>,
}

impl Default for RecordingWriter {
    fn default() -> Self {
        Self {
            wrote_new_data: true,
            reload_noop: false,
            write_failure: None,
            rollback_failure: None,
            writes: Mutex::new(Vec::new()),
            rollbacks: Mutex::new(0),
        }
    }
}

impl RecordingWriter {
    /// Creates a writer that persists new data.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a writer that persists nothing; `reload_noop` marks the
    /// write as a full reload of an empty source.
    #[must_use]
    pub fn nothing_written(reload_noop: bool) -> Self {
        Self {
            wrote_new_data: false,
            reload_noop,
            ..Self::default()
        }
    }

    /// Creates a writer whose writes fail with `message`.
    #[must_use]
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            write_failure: Some(message.into()),
            ..Self::default()
        }
    }

    /// Makes rollbacks fail with `message`.
    #[must_use]
    pub fn with_rollback_failure(mut self, message: impl Into<String>) -> Self {
        self.rollback_failure = Some(message.into());
        self
    }

    /// Options passed to each write.
    #[must_use]
    pub fn writes(&self) -> Vec<WriteOptions> {
        self.writes.lock().clone()
    }

    /// Number of rollback calls.
    #[must_use]
    pub fn rollback_count(&self) -> usize {
        *self.rollbacks.lock()
    }
}

#[async_trait]
impl Writer for RecordingWriter {
    async fn write(&self, _dataset: Dataset, options: &WriteOptions) -> anyhow::Result<bool> {
        self.writes.lock().push(options.clone());
        fail(&self.write_failure)?;
        Ok(self.wrote_new_data)
    }

    async fn rollback(&self) -> anyhow::Result<()> {
        *self.rollbacks.lock() += 1;
        fail(&self.rollback_failure)
    }

    fn last_was_reload_noop(&self) -> bool {
        self.reload_noop
    }
}

/// An in-memory catalog.
///
/// `create_or_replace` stores a DDL for the table, carrying the manifest
/// marker for versioned tables, so a second run sees the first run's table.
#[derive(Debug, Default)]
pub struct RecordingCatalog {
    ddl: Mutex<std::collections::HashMap<String, String>>,
    failing_operation: Option<&'static str>,
    calls: Mutex<Vec<String>>,
    registrations: Mutex<Vec<TableRegistration>>,
}

impl RecordingCatalog {
    /// Creates an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the DDL of a table.
    #[must_use]
    pub fn with_ddl(self, fq_name: impl Into<String>, ddl: impl Into<String>) -> Self {
        self.ddl.lock().insert(fq_name.into(), ddl.into());
        self
    }

    /// Makes `operation` fail.
    #[must_use]
    pub fn failing_on(mut self, operation: &'static str) -> Self {
        self.failing_operation = Some(operation);
        self
    }

    /// Operation names in call order.
    #[must_use]
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    /// Every create-or-replace request.
    #[must_use]
    pub fn registrations(&self) -> Vec<TableRegistration> {
        self.registrations.lock().clone()
    }

    fn record(&self, operation: &'static str) -> anyhow::Result<()> {
        self.calls.lock().push(operation.to_string());
        if self.failing_operation == Some(operation) {
            anyhow::bail!("catalog rejected {operation}");
        }
        Ok(())
    }
}

#[async_trait]
impl Catalog for RecordingCatalog {
    async fn get_ddl(&self, fq_name: &str) -> anyhow::Result<Option<String>> {
        self.record("get_ddl")?;
        Ok(self.ddl.lock().get(fq_name).cloned())
    }

    async fn create_or_replace(&self, registration: &TableRegistration) -> anyhow::Result<()> {
        self.record("create_or_replace")?;
        let location = if registration.format.uses_manifest_marker() {
            format!("{}/{}", registration.path, crate::policy::MANIFEST_MARKER)
        } else {
            registration.path.clone()
        };
        self.ddl.lock().insert(
            registration.fq_name.clone(),
            format!("CREATE EXTERNAL TABLE {} LOCATION '{location}'", registration.fq_name),
        );
        self.registrations.lock().push(registration.clone());
        Ok(())
    }

    async fn grant_access(&self, _fq_name: &str, _principals: &[String]) -> anyhow::Result<()> {
        self.record("grant_access")
    }

    async fn repair_partitions(&self, _fq_name: &str) -> anyhow::Result<()> {
        self.record("repair_partitions")
    }
}

/// A quality checker with a fixed verdict.
#[derive(Debug)]
pub struct StaticQualityChecker {
    verdict: Result<bool, String>,
    checks: Mutex<Vec<CheckDescriptor>>,
}

impl StaticQualityChecker {
    /// A checker whose checks pass.
    #[must_use]
    pub fn passing() -> Self {
        Self::with_verdict(Ok(true))
    }

    /// A checker whose checks fail.
    #[must_use]
    pub fn failing() -> Self {
        Self::with_verdict(Ok(false))
    }

    /// A checker that cannot run.
    #[must_use]
    pub fn erroring(message: impl Into<String>) -> Self {
        Self::with_verdict(Err(message.into()))
    }

    fn with_verdict(verdict: Result<bool, String>) -> Self {
        Self {
            verdict,
            checks: Mutex::new(Vec::new()),
        }
    }

    /// Number of checks run.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.checks.lock().len()
    }

    /// Every descriptor received.
    #[must_use]
    pub fn checks(&self) -> Vec<CheckDescriptor> {
        self.checks.lock().clone()
    }
}

#[async_trait]
impl QualityChecker for StaticQualityChecker {
    async fn run_standard_check(&self, check: &CheckDescriptor) -> anyhow::Result<bool> {
        self.checks.lock().push(check.clone());
        self.verdict.clone().map_err(anyhow::Error::msg)
    }
}

/// A run reporter recording every call.
#[derive(Debug, Default)]
pub struct RecordingRunReporter {
    failure: Option<String>,
    calls: Mutex<Vec<String>>,
    runs: Mutex<Vec<PipelineRun>>,
    keys: Mutex<Vec<RunKey>>,
    quality: Mutex<Vec<bool>>,
}

impl RecordingRunReporter {
    /// Creates a reporter that succeeds.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a reporter whose every call fails with `message`.
    #[must_use]
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            failure: Some(message.into()),
            ..Self::default()
        }
    }

    /// Method names in call order.
    #[must_use]
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    /// Runs passed to `report`.
    #[must_use]
    pub fn runs(&self) -> Vec<PipelineRun> {
        self.runs.lock().clone()
    }

    /// Keys passed to `insert_run`.
    #[must_use]
    pub fn keys(&self) -> Vec<RunKey> {
        self.keys.lock().clone()
    }

    /// Quality results, in order.
    #[must_use]
    pub fn quality_results(&self) -> Vec<bool> {
        self.quality.lock().clone()
    }
}

#[async_trait]
impl RunReporter for RecordingRunReporter {
    async fn insert_run(&self, key: &RunKey) -> anyhow::Result<()> {
        self.calls.lock().push("insert_run".to_string());
        fail(&self.failure)?;
        self.keys.lock().push(key.clone());
        Ok(())
    }

    async fn report(&self, run: &PipelineRun) -> anyhow::Result<()> {
        self.calls.lock().push("report".to_string());
        fail(&self.failure)?;
        self.runs.lock().push(run.clone());
        Ok(())
    }

    async fn report_quality_result(&self, _key: &RunKey, passed: bool) -> anyhow::Result<()> {
        self.calls.lock().push("report_quality_result".to_string());
        fail(&self.failure)?;
        self.quality.lock().push(passed);
        Ok(())
    }
}

/// A metric reporter recording `(fq_name, status, metric_name)`.
#[derive(Debug, Default)]
pub struct RecordingMetricReporter {
    failure: Option<String>,
    reports: Mutex<Vec<(String, bool, String)>>,
}

impl RecordingMetricReporter {
    /// Creates a reporter that succeeds.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a reporter whose calls fail with `message`.
    #[must_use]
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            failure: Some(message.into()),
            ..Self::default()
        }
    }

    /// Reports received, in order.
    #[must_use]
    pub fn reports(&self) -> Vec<(String, bool, String)> {
        self.reports.lock().clone()
    }
}

#[async_trait]
impl MetricReporter for RecordingMetricReporter {
    async fn report_metrics(&self, fq_name: &str, status: bool, metric_name: &str) -> anyhow::Result<()> {
        fail(&self.failure)?;
        self.reports
            .lock()
            .push((fq_name.to_string(), status, metric_name.to_string()));
        Ok(())
    }
}

/// A monitor initializer counting calls.
#[derive(Debug, Default)]
pub struct RecordingMonitor {
    failure: Option<String>,
    call_count: Mutex<usize>,
}

impl RecordingMonitor {
    /// Creates a monitor initializer that succeeds.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates one whose calls fail with `message`.
    #[must_use]
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            failure: Some(message.into()),
            ..Self::default()
        }
    }

    /// Returns the number of calls.
    #[must_use]
    pub fn call_count(&self) -> usize {
        *self.call_count.lock()
    }
}

#[async_trait]
impl MonitorInitializer for RecordingMonitor {
    async fn init_monitors(&self, _fq_name: &str) -> anyhow::Result<()> {
        *self.call_count.lock() += 1;
        fail(&self.failure)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::PartitionKey;

    #[tokio::test]
    async fn test_catalog_remembers_registered_ddl() {
        let catalog = RecordingCatalog::new();
        assert!(catalog.get_ddl("clean_default_sales.orders").await.unwrap().is_none());

        catalog
            .create_or_replace(&TableRegistration {
                fq_name: "clean_default_sales.orders".to_string(),
                path: "clean/default/sales/orders".to_string(),
                format: DataFormat::VersionedColumnar,
                partition_keys: vec![PartitionKey::new("day", 0)],
                drop_original: true,
            })
            .await
            .unwrap();

        let ddl = catalog.get_ddl("clean_default_sales.orders").await.unwrap().unwrap();
        assert!(ddl.contains(crate::policy::MANIFEST_MARKER));
        assert_eq!(catalog.calls(), vec!["get_ddl", "create_or_replace", "get_ddl"]);
    }

    #[tokio::test]
    async fn test_catalog_failing_operation() {
        let catalog = RecordingCatalog::new().failing_on("grant_access");
        let err = catalog.grant_access("t", &[]).await.unwrap_err();
        assert!(err.to_string().contains("grant_access"));
    }

    #[tokio::test]
    async fn test_writer_counts_rollbacks() {
        let writer = RecordingWriter::new().with_rollback_failure("no history");
        assert!(writer.rollback().await.is_err());
        assert_eq!(writer.rollback_count(), 1);
    }
}
