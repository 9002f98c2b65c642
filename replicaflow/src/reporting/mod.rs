//! Run, metric and monitor reporting.
//!
//! Reporting is ancillary: every failure is logged with its error code and
//! alerted, and never changes a run's outcome. In the designated test
//! environment every reporter call is skipped.

use crate::config::PipelineSettings;
use crate::errors::ReplicationError;
use crate::notify::{Alert, AlertSeverity, NoOpNotifier, Notifier};
use crate::pipeline::{PipelineRun, RunKey};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, error, info};

/// Writes run rows to a run-tracking store.
#[async_trait]
pub trait RunReporter: Send + Sync {
    /// Inserts the run row keyed by `key`.
    async fn insert_run(&self, key: &RunKey) -> anyhow::Result<()>;

    /// Records the final state of `run`.
    async fn report(&self, run: &PipelineRun) -> anyhow::Result<()>;

    /// Records a quality gate result against the run row.
    async fn report_quality_result(&self, key: &RunKey, passed: bool) -> anyhow::Result<()>;
}

/// Sends metrics to a monitoring backend.
#[async_trait]
pub trait MetricReporter: Send + Sync {
    /// Reports `status` for `fq_name` under `metric_name`.
    async fn report_metrics(&self, fq_name: &str, status: bool, metric_name: &str) -> anyhow::Result<()>;
}

/// Creates monitors for a table; expected to be a no-op when they exist.
#[async_trait]
pub trait MonitorInitializer: Send + Sync {
    /// Ensures monitors exist for `fq_name`.
    async fn init_monitors(&self, fq_name: &str) -> anyhow::Result<()>;
}

/// Discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpReporter;

#[async_trait]
impl RunReporter for NoOpReporter {
    async fn insert_run(&self, _key: &RunKey) -> anyhow::Result<()> {
        Ok(())
    }

    async fn report(&self, _run: &PipelineRun) -> anyhow::Result<()> {
        Ok(())
    }

    async fn report_quality_result(&self, _key: &RunKey, _passed: bool) -> anyhow::Result<()> {
        Ok(())
    }
}

#[async_trait]
impl MetricReporter for NoOpReporter {
    async fn report_metrics(&self, _fq_name: &str, _status: bool, _metric_name: &str) -> anyhow::Result<()> {
        Ok(())
    }
}

#[async_trait]
impl MonitorInitializer for NoOpReporter {
    async fn init_monitors(&self, _fq_name: &str) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Writes every report to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingReporter;

#[async_trait]
impl RunReporter for LoggingReporter {
    async fn insert_run(&self, key: &RunKey) -> anyhow::Result<()> {
        info!(fq_name = %key.fq_name, started_at = %key.started_at, row = %key.fingerprint(), "Run inserted");
        Ok(())
    }

    async fn report(&self, run: &PipelineRun) -> anyhow::Result<()> {
        info!(run = ?run.to_dict(), "Run reported");
        Ok(())
    }

    async fn report_quality_result(&self, key: &RunKey, passed: bool) -> anyhow::Result<()> {
        info!(fq_name = %key.fq_name, passed, "Quality result reported");
        Ok(())
    }
}

#[async_trait]
impl MetricReporter for LoggingReporter {
    async fn report_metrics(&self, fq_name: &str, status: bool, metric_name: &str) -> anyhow::Result<()> {
        info!(fq_name = %fq_name, metric = %metric_name, status, "Metric reported");
        Ok(())
    }
}

#[async_trait]
impl MonitorInitializer for LoggingReporter {
    async fn init_monitors(&self, fq_name: &str) -> anyhow::Result<()> {
        info!(fq_name = %fq_name, "Monitors initialized");
        Ok(())
    }
}

/// The reporting collaborators of an orchestrator, gated by settings.
#[derive(Clone)]
pub struct Reporters {
    run: Arc<dyn RunReporter>,
    metric: Arc<dyn MetricReporter>,
    monitor: Arc<dyn MonitorInitializer>,
    notifier: Arc<dyn Notifier>,
    test_environment: bool,
    report_runs: bool,
    report_metrics: bool,
    metric_name: String,
    alert_channel: String,
}

impl std::fmt::Debug for Reporters {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reporters")
            .field("test_environment", &self.test_environment)
            .field("report_runs", &self.report_runs)
            .field("report_metrics", &self.report_metrics)
            .field("metric_name", &self.metric_name)
            .field("alert_channel", &self.alert_channel)
            .finish_non_exhaustive()
    }
}

impl Default for Reporters {
    fn default() -> Self {
        Self::new(&PipelineSettings::default())
    }
}

impl Reporters {
    /// Creates no-op reporters gated by `settings`.
    #[must_use]
    pub fn new(settings: &PipelineSettings) -> Self {
        Self {
            run: Arc::new(NoOpReporter),
            metric: Arc::new(NoOpReporter),
            monitor: Arc::new(NoOpReporter),
            notifier: Arc::new(NoOpNotifier),
            test_environment: settings.test_environment,
            report_runs: settings.report_runs,
            report_metrics: settings.report_metrics,
            metric_name: settings.quality_metric_name.clone(),
            alert_channel: settings.alert_channel.clone(),
        }
    }

    /// Sets the run reporter.
    #[must_use]
    pub fn with_run_reporter(mut self, reporter: Arc<dyn RunReporter>) -> Self {
        self.run = reporter;
        self
    }

    /// Sets the metric reporter.
    #[must_use]
    pub fn with_metric_reporter(mut self, reporter: Arc<dyn MetricReporter>) -> Self {
        self.metric = reporter;
        self
    }

    /// Sets the monitor initializer.
    #[must_use]
    pub fn with_monitor_initializer(mut self, monitor: Arc<dyn MonitorInitializer>) -> Self {
        self.monitor = monitor;
        self
    }

    /// Sets the notifier.
    #[must_use]
    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    /// Returns true in the designated test environment.
    #[must_use]
    pub fn is_test_environment(&self) -> bool {
        self.test_environment
    }

    /// Ensures monitors exist for the table. Failures are alerted.
    pub async fn init_monitors(&self, fq_name: &str, table: &str) {
        if self.test_environment {
            return;
        }
        debug!(fq_name = %fq_name, "Initializing monitors; existing monitors are kept");
        if let Err(err) = self.monitor.init_monitors(fq_name).await {
            self.ancillary_failure(
                &format!("Monitor initialisation failed for {table}"),
                ReplicationError::ancillary(table, "init_monitors", err),
            );
        }
    }

    /// Reports a quality gate result to the metric and run reporters.
    pub async fn report_quality(&self, key: &RunKey, passed: bool) {
        if self.test_environment {
            return;
        }
        if self.report_metrics {
            if let Err(err) = self.metric.report_metrics(&key.fq_name, passed, &self.metric_name).await {
                self.ancillary_failure(
                    "Quality metric could not be reported",
                    ReplicationError::reporting(&key.fq_name, "report_metrics", err),
                );
            }
        }
        if self.report_runs {
            if let Err(err) = self.run.report_quality_result(key, passed).await {
                self.ancillary_failure(
                    "Quality result could not be recorded",
                    ReplicationError::reporting(&key.fq_name, "report_quality_result", err),
                );
            }
        }
    }

    /// Inserts and reports the run row.
    pub async fn report_run(&self, run: &PipelineRun) {
        if self.test_environment || !self.report_runs {
            return;
        }
        let key = run.key();
        if let Err(err) = self.run.insert_run(&key).await {
            self.ancillary_failure(
                "Run row could not be inserted",
                ReplicationError::reporting(&key.fq_name, "insert_run", err),
            );
            return;
        }
        if let Err(err) = self.run.report(run).await {
            self.ancillary_failure(
                "Run could not be reported",
                ReplicationError::reporting(&key.fq_name, "report", err),
            );
        }
    }

    /// Logs an ancillary failure and alerts on it.
    pub fn ancillary_failure(&self, title: &str, err: ReplicationError) {
        let info = err.info();
        error!(
            code = %info.code,
            fix_hint = ?info.fix_hint,
            context = ?info.context,
            "{}", info.summary
        );
        self.notifier.notify(
            Alert::new(&self.alert_channel, title, err.to_string()).with_severity(AlertSeverity::Critical),
        );
    }
}
