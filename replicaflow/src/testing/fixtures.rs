//! Test harness wiring recording doubles into an orchestrator.

use std::sync::Arc;

use crate::config::PipelineSettings;
use crate::notify::CollectingNotifier;
use crate::pipeline::PipelineOrchestrator;
use crate::registry::{ConfigRegistry, Registry};
use crate::reporting::Reporters;
use crate::task::{ReplicationTask, TaskArgs};

use super::mocks::{
    RecordingCatalog, RecordingMetricReporter, RecordingMonitor, RecordingReader,
    RecordingRunReporter, RecordingWriter, StaticQualityChecker,
};

/// Every collaborator of an orchestrator, as inspectable doubles.
///
/// The doubles are shared, so one harness can build several orchestrators
/// and the recordings accumulate across them.
#[derive(Debug, Clone)]
pub struct TestHarness {
    /// Registry handed to the orchestrator.
    pub registry: Arc<ConfigRegistry>,
    /// Reader double.
    pub reader: Arc<RecordingReader>,
    /// Writer double.
    pub writer: Arc<RecordingWriter>,
    /// Catalog double.
    pub catalog: Arc<RecordingCatalog>,
    /// Quality checker double.
    pub checker: Arc<StaticQualityChecker>,
    /// Run reporter double.
    pub runs: Arc<RecordingRunReporter>,
    /// Metric reporter double.
    pub metrics: Arc<RecordingMetricReporter>,
    /// Monitor initializer double.
    pub monitors: Arc<RecordingMonitor>,
    /// Alert sink.
    pub notifier: Arc<CollectingNotifier>,
    /// Settings the reporters are built from.
    pub settings: PipelineSettings,
    /// Force recreation on every registration.
    pub force_drop: bool,
}

impl Default for TestHarness {
    fn default() -> Self {
        Self {
            registry: Arc::new(ConfigRegistry::empty()),
            reader: Arc::new(RecordingReader::new()),
            writer: Arc::new(RecordingWriter::new()),
            catalog: Arc::new(RecordingCatalog::new()),
            checker: Arc::new(StaticQualityChecker::passing()),
            runs: Arc::new(RecordingRunReporter::new()),
            metrics: Arc::new(RecordingMetricReporter::new()),
            monitors: Arc::new(RecordingMonitor::new()),
            notifier: Arc::new(CollectingNotifier::new()),
            settings: PipelineSettings::default(),
            force_drop: false,
        }
    }
}

impl TestHarness {
    /// Creates a harness where every collaborator succeeds.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the registry.
    #[must_use]
    pub fn with_registry(mut self, registry: ConfigRegistry) -> Self {
        self.registry = Arc::new(registry);
        self
    }

    /// Sets the reader.
    #[must_use]
    pub fn with_reader(mut self, reader: RecordingReader) -> Self {
        self.reader = Arc::new(reader);
        self
    }

    /// Sets the writer.
    #[must_use]
    pub fn with_writer(mut self, writer: RecordingWriter) -> Self {
        self.writer = Arc::new(writer);
        self
    }

    /// Sets the catalog.
    #[must_use]
    pub fn with_catalog(mut self, catalog: RecordingCatalog) -> Self {
        self.catalog = Arc::new(catalog);
        self
    }

    /// Sets the quality checker.
    #[must_use]
    pub fn with_checker(mut self, checker: StaticQualityChecker) -> Self {
        self.checker = Arc::new(checker);
        self
    }

    /// Sets the run reporter.
    #[must_use]
    pub fn with_run_reporter(mut self, runs: RecordingRunReporter) -> Self {
        self.runs = Arc::new(runs);
        self
    }

    /// Sets the metric reporter.
    #[must_use]
    pub fn with_metric_reporter(mut self, metrics: RecordingMetricReporter) -> Self {
        self.metrics = Arc::new(metrics);
        self
    }

    /// Sets the monitor initializer.
    #[must_use]
    pub fn with_monitor(mut self, monitors: RecordingMonitor) -> Self {
        self.monitors = Arc::new(monitors);
        self
    }

    /// Sets the settings.
    #[must_use]
    pub fn with_settings(mut self, settings: PipelineSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Forces recreation on every registration.
    #[must_use]
    pub fn with_force_drop(mut self, force_drop: bool) -> Self {
        self.force_drop = force_drop;
        self
    }

    /// Reporters over the harness doubles.
    #[must_use]
    pub fn reporters(&self) -> Reporters {
        Reporters::new(&self.settings)
            .with_run_reporter(self.runs.clone())
            .with_metric_reporter(self.metrics.clone())
            .with_monitor_initializer(self.monitors.clone())
            .with_notifier(self.notifier.clone())
    }

    /// Builds an orchestrator over the harness doubles.
    #[must_use]
    pub fn orchestrator(&self) -> PipelineOrchestrator {
        let registry: Arc<dyn Registry> = self.registry.clone();
        PipelineOrchestrator::builder(
            self.reader.clone(),
            self.writer.clone(),
            self.catalog.clone(),
            self.checker.clone(),
        )
        .with_registry(registry)
        .with_reporters(self.reporters())
        .with_force_drop(self.force_drop)
        .build()
    }
}

/// A database task for `source.db.table` with default configuration.
///
/// # Panics
///
/// When an identifier is blank.
#[must_use]
pub fn database_task(source_name: &str, db_name: &str, table_name: &str) -> ReplicationTask {
    TaskArgs::new(source_name, db_name, table_name)
        .build()
        .expect("database task identifiers must be non-blank")
}
