//! `scanpii` CLI: loads configuration, wires up in-memory demo
//! collaborators (or a future real connector), runs a scan to completion,
//! and prints the resulting report as JSON.

use clap::Parser;
use scanpii_core::collaborators::Collaborators;
use scanpii_core::config::{CommandLineArgs, Config};
use scanpii_core::domain::job::ScanRequest;
use scanpii_core::domain::schema::{Column, ColumnId, Schema, Table, TableId};
use scanpii_core::fixtures::{InMemoryConnector, InMemoryStore, LoggingEventSink, StaticMetadataExtractor, StubNerClient};
use scanpii_core::orchestrator::ScanOrchestrator;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli_args = CommandLineArgs::parse();
    let config = Config::load(&cli_args)?;

    let log_filter = tracing_subscriber::EnvFilter::new(&config.logging.level);
    tracing_subscriber::registry().with(log_filter).with(tracing_subscriber::fmt::layer()).init();

    tracing::info!("scanpii starting up");

    let collaborators = Collaborators {
        connector: Arc::new(demo_connector()),
        metadata: Arc::new(StaticMetadataExtractor::new(demo_schema())),
        ner: Arc::new(StubNerClient::empty()),
        events: Arc::new(LoggingEventSink),
        store: Arc::new(InMemoryStore::new()),
    };

    let orchestrator = ScanOrchestrator::new(config, collaborators);
    let job_id = orchestrator.submit(ScanRequest::new("demo"));
    tracing::info!(%job_id, "scan submitted");

    let status = orchestrator.await_job(job_id).await?;
    tracing::info!(?status, "scan finished");

    let report = orchestrator.get_report(job_id)?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn demo_schema() -> Schema {
    let mut schema = Schema::new("demo", "PostgreSQL");
    let users = schema.add_table(Table { id: TableId(0), name: "users".into(), remarks: None, columns: vec![] });
    schema.add_column(Column {
        id: ColumnId(0),
        table_id: users,
        name: "email".into(),
        jdbc_type: 12,
        db_type_name: "varchar".into(),
        comments: None,
        size: None,
        nullable: true,
        primary_key: false,
    });
    schema.add_column(Column {
        id: ColumnId(0),
        table_id: users,
        name: "zip_code".into(),
        jdbc_type: 12,
        db_type_name: "varchar".into(),
        comments: None,
        size: None,
        nullable: true,
        primary_key: false,
    });
    schema
}

fn demo_connector() -> InMemoryConnector {
    use scanpii_core::collaborators::RawValue;
    InMemoryConnector::new("PostgreSQL")
        .with_column(
            "users",
            "email",
            vec![
                RawValue::Text("alice@example.com".into()),
                RawValue::Text("bob@example.com".into()),
                RawValue::Text("carol@example.com".into()),
            ],
        )
        .with_column(
            "users",
            "zip_code",
            vec![
                RawValue::Text("94110".into()),
                RawValue::Text("94110".into()),
                RawValue::Text("10001".into()),
            ],
        )
}
