//! In-memory collaborator implementations for tests and the CLI's demo
//! mode. None of these talk to a real database or HTTP service; they exist
//! so the orchestrator can be exercised end to end without a live
//! `Connector`/`MetadataExtractor`/`NerClient` behind it.

use crate::collaborators::{Connector, EventSink, MetadataExtractor, NerClient, NerEntity, RawValue, Store};
use crate::domain::schema::Schema;
use crate::error::{ConnectivityError, NerError};
use crate::orchestrator::events::ScanEvent;
use crate::report::ScanReport;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

/// A fixed schema plus one column of sample values per `(table, column)`
/// pair, served back verbatim regardless of `connection_id`.
pub struct InMemoryConnector {
    product_name: String,
    rows: HashMap<(String, String), Vec<RawValue>>,
}

impl InMemoryConnector {
    pub fn new(product_name: impl Into<String>) -> Self {
        Self { product_name: product_name.into(), rows: HashMap::new() }
    }

    pub fn with_column(
        mut self,
        table: impl Into<String>,
        column: impl Into<String>,
        values: Vec<RawValue>,
    ) -> Self {
        self.rows.insert((table.into(), column.into()), values);
        self
    }

    /// Extracts `table`/`column` back out of a sampling query built by a
    /// `SqlDialect` implementation. These queries are always of the shape
    /// `... FROM <table> ... <column> ...`, so a keyword scan is enough;
    /// this connector never parses SQL beyond recognizing its own fixture
    /// data by name.
    fn lookup(&self, sql: &str) -> Option<&Vec<RawValue>> {
        self.rows.iter().find(|((table, column), _)| {
            sql.contains(table.as_str()) && sql.contains(column.as_str())
        }).map(|(_, values)| values)
    }
}

#[async_trait]
impl Connector for InMemoryConnector {
    async fn query_column(&self, _connection_id: &str, sql: &str) -> Result<Vec<RawValue>, ConnectivityError> {
        Ok(self.lookup(sql).cloned().unwrap_or_default())
    }

    async fn row_count(&self, _connection_id: &str, sql: &str) -> Result<u64, ConnectivityError> {
        Ok(self.lookup(sql).map(|v| v.len() as u64).unwrap_or(0))
    }

    async fn database_product_name(&self, _connection_id: &str) -> Result<String, ConnectivityError> {
        Ok(self.product_name.clone())
    }
}

/// Hands back a pre-built `Schema` unchanged, applying only the
/// `includedTables`/`excludedTables` filters a real metadata extractor
/// would honor.
pub struct StaticMetadataExtractor {
    schema: Schema,
}

impl StaticMetadataExtractor {
    pub fn new(schema: Schema) -> Self {
        Self { schema }
    }
}

#[async_trait]
impl MetadataExtractor for StaticMetadataExtractor {
    async fn extract_schema(
        &self,
        _connection_id: &str,
        _included_schemas: &[String],
        included_tables: &[String],
        excluded_tables: &[String],
    ) -> Result<Schema, ConnectivityError> {
        if included_tables.is_empty() && excluded_tables.is_empty() {
            return Ok(self.schema.clone());
        }

        let mut filtered = Schema::new(self.schema.name.clone(), self.schema.database_product_name.clone());
        for table in self.schema.tables() {
            let included = included_tables.is_empty() || included_tables.iter().any(|t| t == &table.name);
            let excluded = excluded_tables.iter().any(|t| t == &table.name);
            if !included || excluded {
                continue;
            }
            let new_table_id = filtered.add_table(table.clone());
            for column in self.schema.columns_of(table.id) {
                let mut column = column.clone();
                column.table_id = new_table_id;
                filtered.add_column(column);
            }
        }
        Ok(filtered)
    }
}

/// Always returns the entities it was constructed with, ignoring the
/// input texts. Good enough to exercise the NER strategy's label
/// aggregation without a live service.
pub struct StubNerClient {
    entities: Vec<NerEntity>,
}

impl StubNerClient {
    pub fn new(entities: Vec<NerEntity>) -> Self {
        Self { entities }
    }

    pub fn empty() -> Self {
        Self { entities: Vec::new() }
    }
}

#[async_trait]
impl NerClient for StubNerClient {
    async fn detect_entities(&self, _column: &str, texts: &[String]) -> Result<Vec<NerEntity>, NerError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        Ok(self.entities.clone())
    }
}

/// Logs each event at debug level instead of forwarding it anywhere.
#[derive(Default)]
pub struct LoggingEventSink;

impl EventSink for LoggingEventSink {
    fn publish(&self, event: ScanEvent) {
        tracing::debug!(
            job_id = %event.job_id,
            status = ?event.status,
            progress = event.progress,
            "scan event"
        );
    }
}

/// Keeps every saved report in memory, for tests that need to assert a
/// report was persisted.
#[derive(Default)]
pub struct InMemoryStore {
    reports: Mutex<Vec<ScanReport>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reports(&self) -> Vec<ScanReport> {
        self.reports.lock().expect("store mutex poisoned").clone()
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn save_report(&self, report: &ScanReport) -> Result<(), ConnectivityError> {
        self.reports.lock().expect("store mutex poisoned").push(report.clone());
        Ok(())
    }
}
