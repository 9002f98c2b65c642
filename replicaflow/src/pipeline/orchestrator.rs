//! The per-table replication step sequence.

use super::ports::{Catalog, ExtractOptions, Reader, TableRegistration, WriteOptions, Writer};
use super::run::PipelineRun;
use crate::core::{QualityOutcome, QualitySkipReason, RunState};
use crate::errors::ReplicationError;
use crate::naming::{TableLocation, TableNaming};
use crate::policy::RecreationPolicy;
use crate::quality::{CheckDescriptor, QualityChecker, QualityGate};
use crate::registry::{ConfigRegistry, Registry};
use crate::reporting::Reporters;
use crate::task::{ReplicationTask, TaskConfig};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Drives one table through extract, persist, register, check and report.
///
/// An orchestrator holds shared collaborators only and can run any number
/// of tasks, one at a time or concurrently on separate tasks.
pub struct PipelineOrchestrator {
    registry: Arc<dyn Registry>,
    reader: Arc<dyn Reader>,
    writer: Arc<dyn Writer>,
    catalog: Arc<dyn Catalog>,
    checker: Arc<dyn QualityChecker>,
    reporters: Reporters,
    policy: RecreationPolicy,
    force_drop: bool,
}

impl std::fmt::Debug for PipelineOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineOrchestrator")
            .field("reporters", &self.reporters)
            .field("force_drop", &self.force_drop)
            .finish_non_exhaustive()
    }
}

/// Builder for [`PipelineOrchestrator`].
pub struct PipelineOrchestratorBuilder {
    registry: Option<Arc<dyn Registry>>,
    reader: Arc<dyn Reader>,
    writer: Arc<dyn Writer>,
    catalog: Arc<dyn Catalog>,
    checker: Arc<dyn QualityChecker>,
    reporters: Reporters,
    force_drop: bool,
}

impl PipelineOrchestratorBuilder {
    /// Sets the shared registry. Without one, every task runs on its defaults.
    #[must_use]
    pub fn with_registry(mut self, registry: Arc<dyn Registry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Sets the reporting collaborators.
    #[must_use]
    pub fn with_reporters(mut self, reporters: Reporters) -> Self {
        self.reporters = reporters;
        self
    }

    /// Always drop and recreate the catalog table on registration.
    #[must_use]
    pub fn with_force_drop(mut self, force_drop: bool) -> Self {
        self.force_drop = force_drop;
        self
    }

    /// Builds the orchestrator.
    #[must_use]
    pub fn build(self) -> PipelineOrchestrator {
        PipelineOrchestrator {
            registry: self
                .registry
                .unwrap_or_else(|| Arc::new(ConfigRegistry::empty())),
            reader: self.reader,
            writer: self.writer,
            catalog: self.catalog,
            checker: self.checker,
            reporters: self.reporters,
            policy: RecreationPolicy::new(),
            force_drop: self.force_drop,
        }
    }
}

fn log_fatal(run: &PipelineRun, err: &ReplicationError) {
    let info = err.info();
    error!(
        run_id = %run.run_id,
        table = %run.identity,
        state = %run.state,
        code = %info.code,
        fix_hint = ?info.fix_hint,
        context = ?info.context,
        "{}", info.summary
    );
}

impl PipelineOrchestrator {
    /// Starts building an orchestrator over the required collaborators.
    #[must_use]
    pub fn builder(
        reader: Arc<dyn Reader>,
        writer: Arc<dyn Writer>,
        catalog: Arc<dyn Catalog>,
        checker: Arc<dyn QualityChecker>,
    ) -> PipelineOrchestratorBuilder {
        PipelineOrchestratorBuilder {
            registry: None,
            reader,
            writer,
            catalog,
            checker,
            reporters: Reporters::default(),
            force_drop: false,
        }
    }

    /// Derived names and paths of `task` under `config`.
    #[must_use]
    pub fn location(&self, task: &ReplicationTask, config: &TaskConfig) -> TableLocation {
        TableNaming::for_task(task.identity(), config, self.reporters.is_test_environment())
            .location(task.source_type())
    }

    /// Runs one replication of `task`.
    ///
    /// Identity and configuration problems fail before any I/O and are not
    /// reported. Once extraction starts, the run is reported whatever the
    /// outcome.
    ///
    /// # Errors
    ///
    /// The first fatal step error, with collaborator errors wrapped and
    /// kept as `source`.
    pub async fn run(&self, task: &mut ReplicationTask) -> Result<PipelineRun, ReplicationError> {
        let mut run = PipelineRun::start(task.identity().clone());
        info!(run_id = %run.run_id, table = %run.identity, "Starting replication run");

        if let Err(err) = task.validate() {
            return Err(Self::fail_pre_flight(&mut run, err.into()));
        }

        run.advance(RunState::ResolveConfig);
        let config = match task.resolve_config(self.registry.as_ref()) {
            Ok(resolved) => resolved.config.clone(),
            Err(err) => return Err(Self::fail_pre_flight(&mut run, err)),
        };
        let location = self.location(task, &config);
        run.fq_name.clone_from(&location.fq_name);

        let identity = task.identity();
        self.reporters
            .init_monitors(&location.fq_name, &format!("{}.{}", identity.db_name, identity.table_name))
            .await;

        let outcome = self.execute(task, &config, &location, &mut run).await;

        run.advance(RunState::Report);
        if let Err(ref err) = outcome {
            log_fatal(&run, err);
        }

        // The reported row carries the terminal state and finish time.
        match &outcome {
            Ok(()) => run.complete(),
            Err(err) => run.fail(err.to_string()),
        }
        self.reporters.report_run(&run).await;

        outcome?;
        info!(
            run_id = %run.run_id,
            fq_name = %run.fq_name,
            wrote_new_data = run.wrote_new_data,
            quality = %run.quality,
            "Replication run finished"
        );
        Ok(run)
    }

    fn fail_pre_flight(run: &mut PipelineRun, err: ReplicationError) -> ReplicationError {
        log_fatal(run, &err);
        run.fail(err.to_string());
        err
    }

    async fn execute(
        &self,
        task: &ReplicationTask,
        config: &TaskConfig,
        location: &TableLocation,
        run: &mut PipelineRun,
    ) -> Result<(), ReplicationError> {
        let table = task.identity().qualified();

        run.advance(RunState::Extract);
        info!(table = %table, "Step 1: extracting from source");
        let dataset = if config.skip_extract {
            warn!(path = %location.raw_path, "Extraction skipped; reading pre-extracted RAW data");
            self.reader
                .read_path(&location.raw_path, config.data_format)
                .await
                .map_err(|err| {
                    error!(
                        path = %location.raw_path,
                        "Reading RAW data failed; reload the entire RAW folder with a full extraction"
                    );
                    ReplicationError::extraction(&table, err)
                })?
        } else {
            let options = ExtractOptions {
                identity: task.identity().clone(),
                raw_path: location.raw_path.clone(),
                backfill_filters: config.backfill_filters.clone(),
                options: task.extract_options().clone(),
            };
            self.reader
                .extract(&options)
                .await
                .map_err(|err| ReplicationError::extraction(&table, err))?
        };
        run.extracted = true;

        run.advance(RunState::Persist);
        info!(fq_name = %location.fq_name, mode = %config.etl_mode, "Step 2: persisting into CLEAN");
        let options = WriteOptions {
            fq_name: location.fq_name.clone(),
            path: location.clean_path.clone(),
            etl_mode: config.etl_mode,
            data_format: config.data_format,
            upsert_key: config.upsert_key.clone(),
            partition_keys: config.partition_keys.clone(),
            column_transformations: config.column_transformations.clone(),
            z_order_by: config.z_order_by.clone(),
            partitions_count: config.partitions_count,
            schema_evolution: config.schema_evolution,
            options: task.write_options().clone(),
        };
        let wrote_new_data = self
            .writer
            .write(dataset, &options)
            .await
            .map_err(|err| ReplicationError::persistence(&table, err))?;
        run.wrote_new_data = wrote_new_data;

        if wrote_new_data {
            run.advance(RunState::Register);
            info!(fq_name = %location.fq_name, "Step 3: registering table");
            self.register(config, location).await?;
            run.registered = true;
        } else {
            info!(fq_name = %location.fq_name, "Step 3: no new data persisted; registration skipped");
        }

        if wrote_new_data || !self.writer.last_was_reload_noop() {
            if config.run_quality_check {
                run.advance(RunState::QualityCheck);
                info!(fq_name = %location.fq_name, "Step 4: running quality check");
                let check = CheckDescriptor {
                    identity: task.identity().clone(),
                    fq_name: location.fq_name.clone(),
                    window_days: config.quality_window_days,
                    tolerance: config.quality_tolerance,
                    key: config.quality_key.clone(),
                };
                let gate = QualityGate::new(self.checker.as_ref(), self.writer.as_ref(), &self.reporters);
                let result = gate.evaluate(&check, config.data_format, &run.key()).await;
                run.quality = match &result {
                    Ok(()) => QualityOutcome::Passed,
                    Err(ReplicationError::QualityCheckFailure(_)) => QualityOutcome::Failed,
                    Err(_) => QualityOutcome::NotRun,
                };
                result?;
            } else {
                warn!(fq_name = %location.fq_name, "Step 4: quality check disabled in configuration; skipped");
                run.quality = QualityOutcome::Skipped(QualitySkipReason::Disabled);
            }
        } else {
            warn!(
                fq_name = %location.fq_name,
                "Step 4: full reload of an empty source; quality check skipped"
            );
            run.quality = QualityOutcome::Skipped(QualitySkipReason::ReloadNoOp);
        }

        Ok(())
    }

    async fn register(&self, config: &TaskConfig, location: &TableLocation) -> Result<(), ReplicationError> {
        let fq_name = &location.fq_name;

        let ddl = self
            .catalog
            .get_ddl(fq_name)
            .await
            .map_err(|err| ReplicationError::catalog(fq_name, "get_ddl", err))?;
        if ddl.is_none() {
            warn!(fq_name = %fq_name, "Table not found in catalog");
        }

        let decision = self
            .policy
            .decide(ddl.as_deref(), config.data_format, config.etl_mode)
            .with_force(self.force_drop);
        info!(
            fq_name = %fq_name,
            recreate = decision.recreate,
            reason = %decision.reason,
            "Recreation decided"
        );

        let registration = TableRegistration {
            fq_name: fq_name.clone(),
            path: location.clean_path.clone(),
            format: config.data_format,
            partition_keys: config.partition_keys.clone(),
            drop_original: decision.recreate,
        };
        self.catalog
            .create_or_replace(&registration)
            .await
            .map_err(|err| ReplicationError::catalog(fq_name, "create_or_replace", err))?;
        self.catalog
            .grant_access(fq_name, &config.grant_read_to)
            .await
            .map_err(|err| ReplicationError::catalog(fq_name, "grant_access", err))?;
        self.catalog
            .repair_partitions(fq_name)
            .await
            .map_err(|err| ReplicationError::catalog(fq_name, "repair_partitions", err))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PipelineSettings;
    use crate::core::{DataFormat, EtlMode, SourceType};
    use crate::policy::MANIFEST_MARKER;
    use crate::registry::{ConfigOverride, DatabaseRegistration, RegistryType, SourceRegistration};
    use crate::task::{TaskArgs, TaskIdentity};
    use crate::testing::mocks::{
        RecordingCatalog, RecordingMonitor, RecordingReader, RecordingRunReporter, RecordingWriter,
        StaticQualityChecker,
    };
    use pretty_assertions::assert_eq;
    use std::collections::BTreeMap;

    struct Parts {
        reader: Arc<RecordingReader>,
        writer: Arc<RecordingWriter>,
        catalog: Arc<RecordingCatalog>,
        checker: Arc<StaticQualityChecker>,
        runs: Arc<RecordingRunReporter>,
    }

    impl Parts {
        fn new(writer: RecordingWriter, catalog: RecordingCatalog, checker: StaticQualityChecker) -> Self {
            Self {
                reader: Arc::new(RecordingReader::new()),
                writer: Arc::new(writer),
                catalog: Arc::new(catalog),
                checker: Arc::new(checker),
                runs: Arc::new(RecordingRunReporter::new()),
            }
        }

        fn orchestrator(&self) -> PipelineOrchestrator {
            PipelineOrchestrator::builder(
                self.reader.clone(),
                self.writer.clone(),
                self.catalog.clone(),
                self.checker.clone(),
            )
            .with_reporters(Reporters::default().with_run_reporter(self.runs.clone()))
            .build()
        }
    }

    fn task() -> ReplicationTask {
        TaskArgs::new("pg1", "sales", "orders").build().unwrap()
    }

    #[tokio::test]
    async fn test_happy_path_ends_done() {
        let parts = Parts::new(RecordingWriter::new(), RecordingCatalog::new(), StaticQualityChecker::passing());
        let mut task = task();

        let run = parts.orchestrator().run(&mut task).await.unwrap();

        assert_eq!(run.state, RunState::Done);
        assert!(run.extracted && run.wrote_new_data && run.registered);
        assert_eq!(run.quality, QualityOutcome::Passed);
        assert_eq!(run.fq_name, "clean_default_sales.orders");
        assert_eq!(
            parts.catalog.calls(),
            vec!["get_ddl", "create_or_replace", "grant_access", "repair_partitions"]
        );
        assert_eq!(parts.checker.call_count(), 1);
        assert_eq!(parts.runs.calls(), vec!["report_quality_result", "insert_run", "report"]);
        let reported = parts.runs.runs();
        assert_eq!(reported[0].state, RunState::Done);
        assert!(reported[0].finished_at.is_some());
    }

    #[tokio::test]
    async fn test_reload_noop_skips_quality_check() {
        let parts = Parts::new(
            RecordingWriter::nothing_written(true),
            RecordingCatalog::new(),
            StaticQualityChecker::passing(),
        );
        let mut task = task();

        let run = parts.orchestrator().run(&mut task).await.unwrap();

        assert!(!run.registered);
        assert_eq!(run.quality, QualityOutcome::Skipped(QualitySkipReason::ReloadNoOp));
        assert_eq!(parts.checker.call_count(), 0);
        assert!(parts.catalog.calls().is_empty());
    }

    #[tokio::test]
    async fn test_no_new_data_without_reload_still_checks() {
        let parts = Parts::new(
            RecordingWriter::nothing_written(false),
            RecordingCatalog::new(),
            StaticQualityChecker::passing(),
        );
        let mut task = task();

        let run = parts.orchestrator().run(&mut task).await.unwrap();

        assert!(!run.registered);
        assert_eq!(run.quality, QualityOutcome::Passed);
        assert_eq!(parts.checker.call_count(), 1);
    }

    #[tokio::test]
    async fn test_disabled_quality_check_is_skipped() {
        let parts = Parts::new(RecordingWriter::new(), RecordingCatalog::new(), StaticQualityChecker::passing());
        let mut args = TaskArgs::new("pg1", "sales", "orders");
        args.run_quality_check = false;
        let mut task = args.build().unwrap();

        let run = parts.orchestrator().run(&mut task).await.unwrap();

        assert_eq!(run.quality, QualityOutcome::Skipped(QualitySkipReason::Disabled));
        assert_eq!(parts.checker.call_count(), 0);
    }

    #[tokio::test]
    async fn test_legacy_marker_with_plain_format_drops_original() {
        let catalog = RecordingCatalog::new().with_ddl(
            "clean_default_sales.orders",
            format!("CREATE EXTERNAL TABLE t LOCATION 's3://lake/clean/default/sales/orders/{MANIFEST_MARKER}'"),
        );
        let parts = Parts::new(RecordingWriter::new(), catalog, StaticQualityChecker::passing());
        let mut task = task();

        parts.orchestrator().run(&mut task).await.unwrap();

        let registrations = parts.catalog.registrations();
        assert_eq!(registrations.len(), 1);
        assert!(registrations[0].drop_original);
        assert_eq!(registrations[0].format, DataFormat::PlainColumnar);
    }

    #[tokio::test]
    async fn test_rerun_does_not_recreate_table() {
        let parts = Parts::new(RecordingWriter::new(), RecordingCatalog::new(), StaticQualityChecker::passing());
        let orchestrator = parts.orchestrator();

        orchestrator.run(&mut task()).await.unwrap();
        orchestrator.run(&mut task()).await.unwrap();

        let drops: Vec<bool> = parts.catalog.registrations().iter().map(|r| r.drop_original).collect();
        assert_eq!(drops, vec![true, false]);
    }

    #[tokio::test]
    async fn test_force_drop_recreates_existing_table() {
        let parts = Parts::new(RecordingWriter::new(), RecordingCatalog::new(), StaticQualityChecker::passing());
        let orchestrator = PipelineOrchestrator::builder(
            parts.reader.clone(),
            parts.writer.clone(),
            parts.catalog.clone(),
            parts.checker.clone(),
        )
        .with_force_drop(true)
        .build();

        orchestrator.run(&mut task()).await.unwrap();
        orchestrator.run(&mut task()).await.unwrap();

        assert!(parts.catalog.registrations().iter().all(|r| r.drop_original));
    }

    #[tokio::test]
    async fn test_missing_identifier_fails_before_io() {
        let parts = Parts::new(RecordingWriter::new(), RecordingCatalog::new(), StaticQualityChecker::passing());
        let mut task = ReplicationTask::new(
            TaskIdentity::new("pg1", "", "orders"),
            SourceType::Database,
            TaskConfig::default(),
        );

        let err = parts.orchestrator().run(&mut task).await.unwrap_err();

        assert!(matches!(err, ReplicationError::Identity(_)));
        assert!(parts.reader.calls().is_empty());
        assert!(parts.runs.calls().is_empty());
    }

    #[tokio::test]
    async fn test_type_mismatch_fails_before_io() {
        let registry = ConfigRegistry::from_sources(vec![SourceRegistration {
            registry_type: RegistryType::BatchReplication,
            source_name: "pg1".to_string(),
            source_type: SourceType::ThirdParty,
            is_active: true,
            databases: BTreeMap::new(),
        }])
        .unwrap();
        let parts = Parts::new(RecordingWriter::new(), RecordingCatalog::new(), StaticQualityChecker::passing());
        let orchestrator = PipelineOrchestrator::builder(
            parts.reader.clone(),
            parts.writer.clone(),
            parts.catalog.clone(),
            parts.checker.clone(),
        )
        .with_registry(Arc::new(registry))
        .build();

        let err = orchestrator.run(&mut task()).await.unwrap_err();

        assert!(matches!(err, ReplicationError::TypeMismatch(_)));
        assert!(parts.reader.calls().is_empty());
    }

    #[tokio::test]
    async fn test_registry_override_drives_the_run() {
        let entry = ConfigOverride {
            etl_mode: Some(EtlMode::FullReload),
            data_format: Some(DataFormat::VersionedColumnar),
            team: Some("data-eng".to_string()),
            ..ConfigOverride::default()
        };
        let registry = ConfigRegistry::from_sources(vec![SourceRegistration {
            registry_type: RegistryType::BatchReplication,
            source_name: "PG1".to_string(),
            source_type: SourceType::Database,
            is_active: true,
            databases: BTreeMap::from([(
                "sales".to_string(),
                DatabaseRegistration {
                    tables: BTreeMap::from([("orders".to_string(), entry)]),
                },
            )]),
        }])
        .unwrap();
        let parts = Parts::new(RecordingWriter::new(), RecordingCatalog::new(), StaticQualityChecker::passing());
        let orchestrator = PipelineOrchestrator::builder(
            parts.reader.clone(),
            parts.writer.clone(),
            parts.catalog.clone(),
            parts.checker.clone(),
        )
        .with_registry(Arc::new(registry))
        .build();

        let run = orchestrator.run(&mut task()).await.unwrap();

        assert_eq!(run.fq_name, "clean_data_eng_sales.orders");
        let writes = parts.writer.writes();
        assert_eq!(writes[0].etl_mode, EtlMode::FullReload);
        assert_eq!(writes[0].data_format, DataFormat::VersionedColumnar);
        assert_eq!(writes[0].path, "clean/data_eng/sales/orders");
    }

    #[tokio::test]
    async fn test_skip_extract_reads_raw_path() {
        let parts = Parts::new(RecordingWriter::new(), RecordingCatalog::new(), StaticQualityChecker::passing());
        let mut args = TaskArgs::new("pg1", "sales", "orders");
        args.skip_extract = true;
        let mut task = args.build().unwrap();

        parts.orchestrator().run(&mut task).await.unwrap();

        assert_eq!(parts.reader.calls(), vec!["read_path:raw/default/sales/orders".to_string()]);
    }

    #[tokio::test]
    async fn test_skip_extract_failure_is_fatal_and_reported() {
        let mut parts = Parts::new(RecordingWriter::new(), RecordingCatalog::new(), StaticQualityChecker::passing());
        parts.reader = Arc::new(RecordingReader::failing("path does not exist"));
        let mut args = TaskArgs::new("pg1", "sales", "orders");
        args.skip_extract = true;
        let mut task = args.build().unwrap();

        let err = parts.orchestrator().run(&mut task).await.unwrap_err();

        match &err {
            ReplicationError::Extraction { source, .. } => assert_eq!(source.to_string(), "path does not exist"),
            other => panic!("unexpected error: {other}"),
        }
        assert!(parts.writer.writes().is_empty());
        let reported = parts.runs.runs();
        assert_eq!(reported.len(), 1);
        assert!(!reported[0].extracted);
        assert!(reported[0].error.is_some());
        assert_eq!(reported[0].state, RunState::Failed);
        assert!(reported[0].finished_at.is_some());
    }

    #[tokio::test]
    async fn test_write_failure_skips_registration() {
        let parts = Parts::new(
            RecordingWriter::failing("disk full"),
            RecordingCatalog::new(),
            StaticQualityChecker::passing(),
        );

        let err = parts.orchestrator().run(&mut task()).await.unwrap_err();

        assert!(matches!(err, ReplicationError::Persistence { .. }));
        assert!(parts.catalog.calls().is_empty());
        assert_eq!(parts.checker.call_count(), 0);
        assert_eq!(parts.runs.runs().len(), 1);
    }

    #[tokio::test]
    async fn test_quality_failure_rolls_back_versioned_table() {
        let parts = Parts::new(RecordingWriter::new(), RecordingCatalog::new(), StaticQualityChecker::failing());
        let mut task = TaskArgs::new("pg1", "sales", "orders")
            .with_data_format("VERSIONED_COLUMNAR")
            .build()
            .unwrap();

        let err = parts.orchestrator().run(&mut task).await.unwrap_err();

        assert!(matches!(err, ReplicationError::QualityCheckFailure(ref f) if f.rolled_back));
        assert_eq!(parts.writer.rollback_count(), 1);
        assert_eq!(parts.runs.quality_results(), vec![false]);
        assert_eq!(parts.runs.runs()[0].quality, QualityOutcome::Failed);
        assert_eq!(parts.runs.runs()[0].state, RunState::Failed);
    }

    #[tokio::test]
    async fn test_monitor_failure_is_not_fatal() {
        let parts = Parts::new(RecordingWriter::new(), RecordingCatalog::new(), StaticQualityChecker::passing());
        let monitor = Arc::new(RecordingMonitor::failing("quota exceeded"));
        let orchestrator = PipelineOrchestrator::builder(
            parts.reader.clone(),
            parts.writer.clone(),
            parts.catalog.clone(),
            parts.checker.clone(),
        )
        .with_reporters(Reporters::default().with_monitor_initializer(monitor.clone()))
        .build();

        let run = orchestrator.run(&mut task()).await.unwrap();

        assert_eq!(monitor.call_count(), 1);
        assert!(run.is_success());
    }

    #[tokio::test]
    async fn test_test_environment_names_and_silence() {
        let parts = Parts::new(RecordingWriter::new(), RecordingCatalog::new(), StaticQualityChecker::passing());
        let orchestrator = PipelineOrchestrator::builder(
            parts.reader.clone(),
            parts.writer.clone(),
            parts.catalog.clone(),
            parts.checker.clone(),
        )
        .with_reporters(
            Reporters::new(&PipelineSettings::default().with_test_environment(true))
                .with_run_reporter(parts.runs.clone()),
        )
        .build();

        let run = orchestrator.run(&mut task()).await.unwrap();

        assert_eq!(run.fq_name, "clean_test_default_sales.orders");
        assert!(parts.runs.calls().is_empty());
    }
}
