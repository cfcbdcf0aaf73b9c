//! Scan Orchestrator: the job state machine, progress reporting,
//! cancellation propagation, and event publication tying every other
//! component together. One `ScanOrchestrator` runs many jobs concurrently;
//! each job is one spawned task plus a `DashMap` entry.

pub mod events;

use crate::collaborators::Collaborators;
use crate::config::Config;
use crate::detection::pipeline::DetectionPipeline;
use crate::detection::{HeuristicStrategy, HttpNerClient, NerStrategy, QuasiIdentifierStrategy, RegexStrategy};
use crate::dialect::Dialect;
use crate::domain::detection::{DetectionResult, StrategyName};
use crate::domain::job::{ScanCounts, ScanJob, ScanRequest, ScanStatus};
use crate::domain::sample::SampleData;
use crate::domain::schema::{ColumnId, Schema, TableId};
use crate::error::{ScanError, ScanResult, Severity, classify};
use crate::qi_correlation::QiCorrelationAnalyzer;
use crate::report::ReportBuilder;
use crate::risk::RiskAssessor;
use crate::sampler::{DbQueryPermits, ParallelSampler, new_permits};
use crate::utils::CancelToken;
use chrono::Utc;
use dashmap::DashMap;
use events::{EventBus, EventSubscription, ScanEvent};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

struct JobHandle {
    job: Mutex<ScanJob>,
    cancel: CancelToken,
    report: Mutex<Option<crate::report::ScanReport>>,
    completed: tokio::sync::Notify,
}

struct Inner {
    collaborators: Collaborators,
    config: Config,
    jobs: DashMap<Uuid, Arc<JobHandle>>,
    events: EventBus,
    db_permits: DbQueryPermits,
}

#[derive(Clone)]
pub struct ScanOrchestrator {
    inner: Arc<Inner>,
}

impl ScanOrchestrator {
    pub fn new(config: Config, collaborators: Collaborators) -> Self {
        let db_permits = new_permits(config.sampling.max_concurrent_db_queries);
        Self {
            inner: Arc::new(Inner {
                collaborators,
                config,
                jobs: DashMap::new(),
                events: EventBus::new(),
                db_permits,
            }),
        }
    }

    /// Non-blocking: creates the job, registers it, and spawns the scan
    /// task. Returns immediately with the new job id.
    pub fn submit(&self, request: ScanRequest) -> Uuid {
        let job = ScanJob::new(request.connection_id.clone());
        let job_id = job.id;
        let handle = Arc::new(JobHandle {
            job: Mutex::new(job),
            cancel: CancelToken::new(),
            report: Mutex::new(None),
            completed: tokio::sync::Notify::new(),
        });
        self.inner.jobs.insert(job_id, handle);

        let orchestrator = self.clone();
        tokio::spawn(async move {
            orchestrator.run_scan(job_id, request).await;
        });
        job_id
    }

    pub fn status(&self, job_id: Uuid) -> ScanResult<ScanStatus> {
        self.handle(job_id).map(|h| h.job.lock().expect("job mutex poisoned").status)
    }

    /// Idempotent: cancelling an already-terminal job is a no-op.
    pub fn cancel(&self, job_id: Uuid) -> ScanResult<()> {
        let handle = self.handle(job_id)?;
        let status = handle.job.lock().expect("job mutex poisoned").status;
        if !status.is_terminal() {
            handle.cancel.cancel();
        }
        Ok(())
    }

    pub fn subscribe(&self, job_id: Option<Uuid>) -> EventSubscription {
        self.inner.events.subscribe(job_id)
    }

    /// Blocks until the job reaches a terminal state, returning it.
    pub async fn await_job(&self, job_id: Uuid) -> ScanResult<ScanStatus> {
        loop {
            let handle = self.handle(job_id)?;
            let notified = handle.completed.notified();
            tokio::pin!(notified);
            let status = handle.job.lock().expect("job mutex poisoned").status;
            if status.is_terminal() {
                return Ok(status);
            }
            notified.await;
        }
    }

    pub fn get_report(&self, job_id: Uuid) -> ScanResult<crate::report::ScanReport> {
        let handle = self.handle(job_id)?;
        let status = handle.job.lock().expect("job mutex poisoned").status;
        if status != ScanStatus::Completed {
            return Err(ScanError::NotReady);
        }
        handle.report.lock().expect("report mutex poisoned").clone().ok_or(ScanError::NotReady)
    }

    fn handle(&self, job_id: Uuid) -> ScanResult<Arc<JobHandle>> {
        self.inner.jobs.get(&job_id).map(|r| r.clone()).ok_or(ScanError::UnknownJob(job_id))
    }

    fn advance(&self, job_id: Uuid, handle: &JobHandle, status: ScanStatus, progress: u8, operation: &str) {
        {
            let mut job = handle.job.lock().expect("job mutex poisoned");
            job.status = status;
            job.progress = progress;
            if status.is_terminal() {
                job.end_time = Some(Utc::now());
            }
        }
        let event = ScanEvent::new(job_id, status, progress, Utc::now()).with_operation(operation);
        self.inner.events.publish(event.clone());
        self.inner.collaborators.events.publish(event);
        handle.completed.notify_waiters();
    }

    fn fail(&self, job_id: Uuid, handle: &JobHandle, message: String) {
        {
            let mut job = handle.job.lock().expect("job mutex poisoned");
            job.status = ScanStatus::Failed;
            job.error_message = Some(message.clone());
            job.end_time = Some(Utc::now());
        }
        let event = ScanEvent::new(job_id, ScanStatus::Failed, 100, Utc::now()).with_error(message);
        self.inner.events.publish(event.clone());
        self.inner.collaborators.events.publish(event);
        handle.completed.notify_waiters();
    }

    fn cancel_job(&self, job_id: Uuid, handle: &JobHandle) {
        let progress = {
            let mut job = handle.job.lock().expect("job mutex poisoned");
            job.status = ScanStatus::Cancelled;
            job.end_time = Some(Utc::now());
            job.progress
        };
        let event = ScanEvent::new(job_id, ScanStatus::Cancelled, progress, Utc::now());
        self.inner.events.publish(event.clone());
        self.inner.collaborators.events.publish(event);
        handle.completed.notify_waiters();
    }

    async fn run_scan(&self, job_id: Uuid, request: ScanRequest) {
        let Some(handle) = self.inner.jobs.get(&job_id).map(|r| r.clone()) else { return };

        if let Err(e) = self.run_scan_inner(job_id, &handle, &request).await {
            match classify(&e) {
                Severity::Cancelled => self.cancel_job(job_id, &handle),
                _ => self.fail(job_id, &handle, e.to_string()),
            }
        }
    }

    async fn run_scan_inner(
        &self,
        job_id: Uuid,
        handle: &JobHandle,
        request: &ScanRequest,
    ) -> ScanResult<()> {
        if handle.cancel.is_cancelled() {
            return Err(ScanError::Cancelled);
        }

        self.advance(job_id, handle, ScanStatus::ExtractingMetadata, 5, "extracting schema metadata");
        let schema = handle
            .cancel
            .race(self.inner.collaborators.metadata.extract_schema(
                &request.connection_id,
                &request.included_schemas,
                &request.included_tables,
                &request.excluded_tables,
            ))
            .await
            .ok_or(ScanError::Cancelled)??;

        let dialect_kind = Dialect::for_product_name(&schema.database_product_name)?;
        let dialect = dialect_kind.registry();

        self.advance(job_id, handle, ScanStatus::Sampling, 20, "sampling columns");
        let samples =
            self.sample_schema(job_id, &request.connection_id, &schema, dialect.as_ref(), request, handle).await?;

        self.advance(job_id, handle, ScanStatus::DetectingPii, 50, "running detection pipeline");
        let detection_results = self.detect_pii(job_id, &schema, &samples, request, handle).await?;

        self.advance(job_id, handle, ScanStatus::AnalyzingQi, 80, "analyzing quasi-identifiers");
        let (qi_groups, risk) = self.analyze_qi_and_risk(&schema, &detection_results, &samples, handle)?;

        self.advance(job_id, handle, ScanStatus::GeneratingReport, 95, "building report");
        if handle.cancel.is_cancelled() {
            return Err(ScanError::Cancelled);
        }

        let pii_found = detection_results
            .iter()
            .filter(|r| r.has_pii(self.inner.config.detection.reporting_threshold))
            .count();
        let counts =
            ScanCounts { tables: schema.tables().len(), columns: schema.columns().len(), pii_found };

        let report = ReportBuilder::build(
            job_id,
            request.connection_id.clone(),
            schema.name.clone(),
            schema.database_product_name.clone(),
            Utc::now(),
            counts.clone(),
            detection_results,
            qi_groups,
            risk,
        );

        if let Err(e) = self.inner.collaborators.store.save_report(&report).await {
            tracing::warn!("failed to persist report for job {job_id}: {e}");
        }
        *handle.report.lock().expect("report mutex poisoned") = Some(report);

        {
            let mut job = handle.job.lock().expect("job mutex poisoned");
            job.counts = counts;
        }
        self.advance(job_id, handle, ScanStatus::Completed, 100, "scan complete");
        Ok(())
    }

    async fn sample_schema(
        &self,
        job_id: Uuid,
        connection_id: &str,
        schema: &Schema,
        dialect: &dyn crate::dialect::SqlDialect,
        request: &ScanRequest,
        handle: &JobHandle,
    ) -> ScanResult<HashMap<ColumnId, SampleData>> {
        let sampler = ParallelSampler::new(self.inner.collaborators.connector.clone(), self.inner.db_permits.clone());
        let mut all_samples = HashMap::new();
        let total_tables = schema.tables().len().max(1);

        for (index, table) in schema.tables().iter().enumerate() {
            if handle.cancel.is_cancelled() {
                return Err(ScanError::Cancelled);
            }
            let columns = schema.columns_of(table.id).into_iter().cloned().collect::<Vec<_>>();
            if columns.is_empty() {
                continue;
            }
            let optimal_n = sampler
                .determine_optimal_sample_size(
                    connection_id,
                    &table.name,
                    dialect,
                    request.max_sample_size.min(self.inner.config.sampling.default_size),
                )
                .await;

            let results = sampler
                .sample_columns(
                    connection_id,
                    &table.name,
                    &columns,
                    dialect,
                    optimal_n,
                    &self.inner.config.sampling,
                    &handle.cancel,
                )
                .await;

            for (column_id, result) in results {
                match result {
                    Ok(data) => {
                        all_samples.insert(column_id, data);
                    },
                    Err(e) => tracing::warn!("sampling failed for column {column_id:?}: {e}"),
                }
            }

            let progress = 20 + (20 * (index + 1) / total_tables) as u8;
            self.advance(
                job_id,
                handle,
                ScanStatus::Sampling,
                progress.min(40),
                &format!("sampled table {}", table.name),
            );
        }

        Ok(all_samples)
    }

    async fn detect_pii(
        &self,
        job_id: Uuid,
        schema: &Schema,
        samples: &HashMap<ColumnId, SampleData>,
        request: &ScanRequest,
        handle: &JobHandle,
    ) -> ScanResult<Vec<DetectionResult>> {
        let pipeline = self.build_pipeline()?;
        let requested: Vec<StrategyName> = request.strategies.clone();
        let total = schema.columns().len().max(1);
        let mut results = Vec::with_capacity(schema.columns().len());

        for (index, column) in schema.columns().iter().enumerate() {
            if handle.cancel.is_cancelled() {
                return Err(ScanError::Cancelled);
            }
            let sample = samples.get(&column.id);
            let result = pipeline.process_column(column, sample, &requested).await;
            results.push(result);

            if index % 8 == 0 {
                let progress = 50 + (30 * (index + 1) / total) as u8;
                self.advance(
                    job_id,
                    handle,
                    ScanStatus::DetectingPii,
                    progress.min(80),
                    "running detection pipeline",
                );
            }
        }
        Ok(results)
    }

    fn build_pipeline(&self) -> ScanResult<DetectionPipeline> {
        let heuristic = Arc::new(HeuristicStrategy::new());
        let regex = Arc::new(RegexStrategy::new(&self.inner.config.pattern_bank)?);
        let ner_client: Arc<dyn crate::collaborators::NerClient> =
            if self.inner.config.ner.url.is_empty() {
                self.inner.collaborators.ner.clone()
            } else {
                Arc::new(HttpNerClient::new(&self.inner.config.ner))
            };
        let ner = Arc::new(NerStrategy::new(ner_client, &self.inner.config.ner));
        let qi = Arc::new(QuasiIdentifierStrategy::new(self.inner.config.qi.clone()));
        Ok(DetectionPipeline::new(heuristic, regex, ner, qi, self.inner.config.detection.clone()))
    }

    fn analyze_qi_and_risk(
        &self,
        schema: &Schema,
        detection_results: &[DetectionResult],
        samples: &HashMap<ColumnId, SampleData>,
        handle: &JobHandle,
    ) -> ScanResult<(Vec<crate::domain::qi::QuasiIdentifierGroup>, crate::risk::RiskReport)> {
        if handle.cancel.is_cancelled() {
            return Err(ScanError::Cancelled);
        }
        let analyzer = QiCorrelationAnalyzer::new(self.inner.config.qi.clone());
        let mut qi_groups = analyzer.analyze(detection_results, samples);
        RiskAssessor::annotate_groups(&mut qi_groups, samples);

        let mut tables_with_qi_samples: HashMap<TableId, Vec<&SampleData>> = HashMap::new();
        for result in detection_results {
            if !result.has_qi_candidate() {
                continue;
            }
            let Some(column) = schema.column(result.column_id) else { continue };
            let Some(sample) = samples.get(&result.column_id) else { continue };
            tables_with_qi_samples.entry(column.table_id).or_default().push(sample);
        }

        let risk = RiskAssessor::assess(&tables_with_qi_samples, detection_results, &qi_groups, samples);
        Ok((qi_groups, risk))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::{Collaborators, Connector, EventSink, MetadataExtractor, NerClient, RawValue, Store};
    use crate::domain::schema::{Column, Table};
    use crate::error::ConnectivityError;
    use async_trait::async_trait;

    struct EmptyConnector;
    #[async_trait]
    impl Connector for EmptyConnector {
        async fn query_column(&self, _c: &str, _s: &str) -> Result<Vec<RawValue>, ConnectivityError> {
            Ok(vec![RawValue::Text("a@b.com".into()), RawValue::Text("c@d.com".into())])
        }
        async fn row_count(&self, _c: &str, _s: &str) -> Result<u64, ConnectivityError> {
            Ok(2)
        }
        async fn database_product_name(&self, _c: &str) -> Result<String, ConnectivityError> {
            Ok("PostgreSQL".into())
        }
    }

    struct FixedSchemaExtractor;
    #[async_trait]
    impl MetadataExtractor for FixedSchemaExtractor {
        async fn extract_schema(
            &self,
            _connection_id: &str,
            _included_schemas: &[String],
            _included_tables: &[String],
            _excluded_tables: &[String],
        ) -> Result<Schema, ConnectivityError> {
            let mut schema = Schema::new("app", "PostgreSQL");
            let table = schema.add_table(Table { id: TableId(0), name: "users".into(), remarks: None, columns: vec![] });
            schema.add_column(Column {
                id: ColumnId(0),
                table_id: table,
                name: "email".into(),
                jdbc_type: 12,
                db_type_name: "varchar".into(),
                comments: None,
                size: None,
                nullable: true,
                primary_key: false,
            });
            Ok(schema)
        }
    }

    struct NoopNer;
    #[async_trait]
    impl NerClient for NoopNer {
        async fn detect_entities(
            &self,
            _column: &str,
            _texts: &[String],
        ) -> Result<Vec<crate::collaborators::NerEntity>, crate::error::NerError> {
            Ok(vec![])
        }
    }

    struct NoopEvents;
    impl EventSink for NoopEvents {
        fn publish(&self, _event: ScanEvent) {}
    }

    struct NoopStore;
    #[async_trait]
    impl Store for NoopStore {
        async fn save_report(&self, _report: &crate::report::ScanReport) -> Result<(), ConnectivityError> {
            Ok(())
        }
    }

    fn test_orchestrator() -> ScanOrchestrator {
        let collaborators = Collaborators {
            connector: Arc::new(EmptyConnector),
            metadata: Arc::new(FixedSchemaExtractor),
            ner: Arc::new(NoopNer),
            events: Arc::new(NoopEvents),
            store: Arc::new(NoopStore),
        };
        ScanOrchestrator::new(Config::default(), collaborators)
    }

    #[tokio::test]
    async fn submit_runs_to_completion_and_produces_a_report() {
        let orchestrator = test_orchestrator();
        let job_id = orchestrator.submit(ScanRequest::new("conn-1"));
        let status = orchestrator.await_job(job_id).await.unwrap();
        assert_eq!(status, ScanStatus::Completed);
        let report = orchestrator.get_report(job_id).unwrap();
        assert_eq!(report.counts.tables, 1);
    }

    #[tokio::test]
    async fn unknown_job_is_an_error() {
        let orchestrator = test_orchestrator();
        assert!(orchestrator.status(Uuid::new_v4()).is_err());
    }

    #[tokio::test]
    async fn report_is_not_ready_before_completion() {
        let orchestrator = test_orchestrator();
        let job_id = orchestrator.submit(ScanRequest::new("conn-1"));
        // Racey by nature; either NotReady (job still running) or the job
        // has already completed, in which case a report is legitimately
        // available. Only assert the error type when not yet ready.
        if orchestrator.status(job_id).unwrap() != ScanStatus::Completed {
            assert!(matches!(orchestrator.get_report(job_id), Err(ScanError::NotReady)));
        }
        orchestrator.await_job(job_id).await.unwrap();
    }

    #[tokio::test]
    async fn cancel_is_idempotent_on_a_terminal_job() {
        let orchestrator = test_orchestrator();
        let job_id = orchestrator.submit(ScanRequest::new("conn-1"));
        orchestrator.await_job(job_id).await.unwrap();
        orchestrator.cancel(job_id).unwrap();
        orchestrator.cancel(job_id).unwrap();
        assert_eq!(orchestrator.status(job_id).unwrap(), ScanStatus::Completed);
    }

    struct InFlightGuard(Arc<std::sync::atomic::AtomicUsize>);
    impl Drop for InFlightGuard {
        fn drop(&mut self) {
            self.0.fetch_sub(1, std::sync::atomic::Ordering::SeqCst);
        }
    }

    struct SlowConnector {
        in_flight: Arc<std::sync::atomic::AtomicUsize>,
        completed: Arc<std::sync::atomic::AtomicUsize>,
    }
    #[async_trait]
    impl Connector for SlowConnector {
        async fn query_column(&self, _c: &str, _s: &str) -> Result<Vec<RawValue>, ConnectivityError> {
            self.in_flight.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            let _guard = InFlightGuard(self.in_flight.clone());
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
            self.completed.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Ok(vec![RawValue::Text("x".into()), RawValue::Text("y".into())])
        }
        async fn row_count(&self, _c: &str, _s: &str) -> Result<u64, ConnectivityError> {
            Ok(2)
        }
        async fn database_product_name(&self, _c: &str) -> Result<String, ConnectivityError> {
            Ok("PostgreSQL".into())
        }
    }

    struct ManyColumnsExtractor;
    #[async_trait]
    impl MetadataExtractor for ManyColumnsExtractor {
        async fn extract_schema(
            &self,
            _connection_id: &str,
            _included_schemas: &[String],
            _included_tables: &[String],
            _excluded_tables: &[String],
        ) -> Result<Schema, ConnectivityError> {
            let mut schema = Schema::new("app", "PostgreSQL");
            let table = schema.add_table(Table { id: TableId(0), name: "wide".into(), remarks: None, columns: vec![] });
            for i in 0..100 {
                schema.add_column(Column {
                    id: ColumnId(0),
                    table_id: table,
                    name: format!("col_{i}"),
                    jdbc_type: 12,
                    db_type_name: "varchar".into(),
                    comments: None,
                    size: None,
                    nullable: true,
                    primary_key: false,
                });
            }
            Ok(schema)
        }
    }

    #[tokio::test]
    async fn cancelling_mid_sampling_terminates_with_no_report_and_drains_permits() {
        let in_flight = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let completed = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let collaborators = Collaborators {
            connector: Arc::new(SlowConnector { in_flight: in_flight.clone(), completed: completed.clone() }),
            metadata: Arc::new(ManyColumnsExtractor),
            ner: Arc::new(NoopNer),
            events: Arc::new(NoopEvents),
            store: Arc::new(NoopStore),
        };
        let orchestrator = ScanOrchestrator::new(Config::default(), collaborators);
        let job_id = orchestrator.submit(ScanRequest::new("conn-1"));

        while completed.load(std::sync::atomic::Ordering::SeqCst) < 10 {
            tokio::time::sleep(std::time::Duration::from_millis(1)).await;
        }
        orchestrator.cancel(job_id).unwrap();

        let status = orchestrator.await_job(job_id).await.unwrap();
        assert_eq!(status, ScanStatus::Cancelled);
        assert!(matches!(orchestrator.get_report(job_id), Err(ScanError::NotReady)));

        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert_eq!(in_flight.load(std::sync::atomic::Ordering::SeqCst), 0);
    }
}
