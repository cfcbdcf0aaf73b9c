//! Ports the core depends on but does not implement: the host process
//! supplies concrete adapters (a real database driver, a web server that
//! forwards `ScanEvent`s, a persistence layer). Framework DI is replaced by
//! explicit constructor wiring — there is no container, only these five
//! traits and whatever `Arc<dyn Trait>` the caller passes to
//! `ScanOrchestrator::new`.

use crate::domain::{Column, Schema};
use crate::error::{ConnectivityError, SamplingError};
use async_trait::async_trait;
use std::collections::HashMap;

/// Opaque row value as read off the wire by the connector; the sampler
/// coerces it into a `SampleValue` after the fact.
#[derive(Debug, Clone)]
pub enum RawValue {
    Null,
    Text(String),
    Number(f64),
    Boolean(bool),
}

/// Borrows a connection and executes prepared statements against it.
/// Real implementations wrap a pooled DB driver; the core never owns a
/// concrete driver type.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Executes `sql` and returns one column's worth of rows (the sampler
    /// only ever issues single-column sampling queries).
    async fn query_column(
        &self,
        connection_id: &str,
        sql: &str,
    ) -> Result<Vec<RawValue>, ConnectivityError>;

    /// `SELECT COUNT(*)`-style row count, used by
    /// `determineOptimalSampleSize`. Failure here is non-fatal — callers
    /// fall back to the configured default size.
    async fn row_count(&self, connection_id: &str, sql: &str) -> Result<u64, ConnectivityError>;

    /// The database product name as reported by the driver (e.g.
    /// `"PostgreSQL"`), used to select a `Dialect`.
    async fn database_product_name(
        &self,
        connection_id: &str,
    ) -> Result<String, ConnectivityError>;
}

/// Produces a fully-populated `Schema` graph. Metadata-extraction SQL
/// (per-dialect comment/FK queries) lives entirely on the implementation's
/// side; the core only ever consumes the resulting graph.
#[async_trait]
pub trait MetadataExtractor: Send + Sync {
    async fn extract_schema(
        &self,
        connection_id: &str,
        included_schemas: &[String],
        included_tables: &[String],
        excluded_tables: &[String],
    ) -> Result<Schema, ConnectivityError>;
}

/// Entity returned by the external NER HTTP service for one input text.
#[derive(Debug, Clone)]
pub struct NerEntity {
    pub text: String,
    pub label: String,
    pub score: f64,
}

/// Abstraction over the external NER HTTP service, so the detection
/// pipeline can be tested against a mock without a live endpoint. The
/// production implementation (`detection::ner::HttpNerClient`) owns the
/// retry/circuit-breaker behavior; this trait is just the raw call.
#[async_trait]
pub trait NerClient: Send + Sync {
    async fn detect_entities(
        &self,
        column: &str,
        texts: &[String],
    ) -> Result<Vec<NerEntity>, crate::error::NerError>;
}

/// Sink for `ScanEvent`s. The production implementation fans these out to
/// an HTTP/WebSocket layer that is out of scope here; the core only
/// publishes.
pub trait EventSink: Send + Sync {
    fn publish(&self, event: crate::orchestrator::events::ScanEvent);
}

/// Persistence for completed reports. Out of scope beyond this
/// interface — no ORM, no schema migration, lives entirely on the host.
#[async_trait]
pub trait Store: Send + Sync {
    async fn save_report(&self, report: &crate::report::ScanReport) -> Result<(), ConnectivityError>;
}

/// Convenience bundle so `ScanOrchestrator::new` takes one argument instead
/// of five.
pub struct Collaborators {
    pub connector: std::sync::Arc<dyn Connector>,
    pub metadata: std::sync::Arc<dyn MetadataExtractor>,
    pub ner: std::sync::Arc<dyn NerClient>,
    pub events: std::sync::Arc<dyn EventSink>,
    pub store: std::sync::Arc<dyn Store>,
}

/// Columns indexed by id, as handed from schema to sampler to pipeline.
pub type ColumnIndex = HashMap<crate::domain::ColumnId, Column>;
