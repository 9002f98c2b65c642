//! Post-write quality gate.

use crate::core::{DataFormat, QualityTolerance};
use crate::errors::{QualityCheckFailure, ReplicationError};
use crate::pipeline::{RunKey, Writer};
use crate::reporting::Reporters;
use crate::task::TaskIdentity;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// What the checker compares.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckDescriptor {
    /// Source-side table.
    pub identity: TaskIdentity,
    /// CLEAN catalog identifier.
    pub fq_name: String,
    /// Trailing window in days.
    pub window_days: u32,
    /// Allowed deviation band.
    pub tolerance: QualityTolerance,
    /// Column to count by; the checker's default when `None`.
    pub key: Option<String>,
}

/// Compares source and target over a window.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait QualityChecker: Send + Sync {
    /// Runs the standard check; `Ok(false)` means the data failed it.
    async fn run_standard_check(&self, check: &CheckDescriptor) -> anyhow::Result<bool>;
}

/// Runs the check and handles a failure.
pub struct QualityGate<'a> {
    checker: &'a dyn QualityChecker,
    writer: &'a dyn Writer,
    reporters: &'a Reporters,
}

impl<'a> QualityGate<'a> {
    /// Creates a gate.
    #[must_use]
    pub fn new(checker: &'a dyn QualityChecker, writer: &'a dyn Writer, reporters: &'a Reporters) -> Self {
        Self {
            checker,
            writer,
            reporters,
        }
    }

    /// Runs the check for `check`.
    ///
    /// On failure, versioned tables are rolled back first. A rollback error
    /// is logged and alerted; the returned error is still the quality
    /// failure. The result is reported either way.
    ///
    /// # Errors
    ///
    /// [`ReplicationError::QualityCheckFailure`] when the data fails, and
    /// [`ReplicationError::QualityCheck`] when the checker itself errors; in
    /// the latter case nothing is rolled back or reported.
    pub async fn evaluate(
        &self,
        check: &CheckDescriptor,
        format: DataFormat,
        key: &RunKey,
    ) -> Result<(), ReplicationError> {
        info!(
            fq_name = %check.fq_name,
            window_days = check.window_days,
            low = check.tolerance.low(),
            high = check.tolerance.high(),
            "Running quality check"
        );

        let passed = self
            .checker
            .run_standard_check(check)
            .await
            .map_err(|err| ReplicationError::quality_check(&check.fq_name, err))?;

        if passed {
            info!(fq_name = %check.fq_name, "Quality check passed");
            self.reporters.report_quality(key, true).await;
            return Ok(());
        }

        let mut rolled_back = false;
        if format.supports_rollback() {
            warn!(fq_name = %check.fq_name, "Quality check failed; restoring the previous table version");
            match self.writer.rollback().await {
                Ok(()) => rolled_back = true,
                Err(err) => self.reporters.ancillary_failure(
                    &format!("Rollback failed for {}", check.fq_name),
                    ReplicationError::ancillary(
                        format!("{}.{}", check.identity.db_name, check.identity.table_name),
                        "rollback",
                        err,
                    ),
                ),
            }
        }

        self.reporters.report_quality(key, false).await;

        Err(QualityCheckFailure {
            fq_name: check.fq_name.clone(),
            window_days: check.window_days,
            low: check.tolerance.low(),
            high: check.tolerance.high(),
            rolled_back,
        }
        .into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::CollectingNotifier;
    use crate::pipeline::MockWriter;
    use crate::testing::mocks::{RecordingMetricReporter, RecordingRunReporter};
    use chrono::Utc;
    use std::sync::Arc;

    fn check() -> CheckDescriptor {
        CheckDescriptor {
            identity: TaskIdentity::new("pg1", "sales", "orders"),
            fq_name: "clean_default_sales.orders".to_string(),
            window_days: 60,
            tolerance: QualityTolerance::default(),
            key: None,
        }
    }

    fn key() -> RunKey {
        RunKey::new("clean_default_sales.orders", Utc::now())
    }

    fn failing_checker() -> MockQualityChecker {
        let mut checker = MockQualityChecker::new();
        checker.expect_run_standard_check().times(1).returning(|_| Ok(false));
        checker
    }

    #[tokio::test]
    async fn test_versioned_failure_rolls_back_once() {
        let checker = failing_checker();
        let mut writer = MockWriter::new();
        writer.expect_rollback().times(1).returning(|| Ok(()));
        let reporters = Reporters::default();

        let err = QualityGate::new(&checker, &writer, &reporters)
            .evaluate(&check(), DataFormat::VersionedColumnar, &key())
            .await
            .unwrap_err();

        match err {
            ReplicationError::QualityCheckFailure(failure) => assert!(failure.rolled_back),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_plain_failure_never_rolls_back() {
        let checker = failing_checker();
        let mut writer = MockWriter::new();
        writer.expect_rollback().times(0);
        let reporters = Reporters::default();

        let err = QualityGate::new(&checker, &writer, &reporters)
            .evaluate(&check(), DataFormat::PlainColumnar, &key())
            .await
            .unwrap_err();

        match err {
            ReplicationError::QualityCheckFailure(failure) => assert!(!failure.rolled_back),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_rollback_failure_keeps_quality_error() {
        let checker = failing_checker();
        let mut writer = MockWriter::new();
        writer
            .expect_rollback()
            .times(1)
            .returning(|| Err(anyhow::anyhow!("no previous version")));
        let notifier = Arc::new(CollectingNotifier::new());
        let metric = Arc::new(RecordingMetricReporter::new());
        let reporters = Reporters::default()
            .with_notifier(notifier.clone())
            .with_metric_reporter(metric.clone());

        let err = QualityGate::new(&checker, &writer, &reporters)
            .evaluate(&check(), DataFormat::VersionedColumnar, &key())
            .await
            .unwrap_err();

        assert!(matches!(err, ReplicationError::QualityCheckFailure(ref f) if !f.rolled_back));
        assert_eq!(notifier.len(), 1);
        assert_eq!(metric.reports().len(), 1);
        assert!(!metric.reports()[0].1);
    }

    #[tokio::test]
    async fn test_pass_reports_success() {
        let mut checker = MockQualityChecker::new();
        checker.expect_run_standard_check().returning(|_| Ok(true));
        let mut writer = MockWriter::new();
        writer.expect_rollback().times(0);
        let runs = Arc::new(RecordingRunReporter::new());
        let reporters = Reporters::default().with_run_reporter(runs.clone());

        QualityGate::new(&checker, &writer, &reporters)
            .evaluate(&check(), DataFormat::VersionedColumnar, &key())
            .await
            .unwrap();

        assert_eq!(runs.quality_results(), vec![true]);
    }

    #[tokio::test]
    async fn test_checker_error_skips_rollback_and_report() {
        let mut checker = MockQualityChecker::new();
        checker
            .expect_run_standard_check()
            .returning(|_| Err(anyhow::anyhow!("warehouse unreachable")));
        let mut writer = MockWriter::new();
        writer.expect_rollback().times(0);
        let metric = Arc::new(RecordingMetricReporter::new());
        let reporters = Reporters::default().with_metric_reporter(metric.clone());

        let err = QualityGate::new(&checker, &writer, &reporters)
            .evaluate(&check(), DataFormat::VersionedColumnar, &key())
            .await
            .unwrap_err();

        assert!(matches!(err, ReplicationError::QualityCheck { .. }));
        assert!(metric.reports().is_empty());
    }
}
