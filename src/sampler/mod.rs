//! Parallel Sampler: extracts samples for N columns concurrently under a
//! global DB-query permit, grounded on the `tokio::sync::Semaphore`
//! fan-out idiom used for bounded-concurrency agent dispatch, with the
//! worker-pool/permit split kept as two independent primitives.

use crate::collaborators::{Connector, RawValue};
use crate::config::SamplingConfig;
use crate::dialect::SqlDialect;
use crate::domain::sample::{SampleData, SampleValue};
use crate::domain::schema::Column;
use crate::error::SamplingError;
use crate::utils::CancelToken;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// The global permit bounding concurrent DB-query execution
/// (`maxConcurrentDbQueries`). Process-wide singleton when multiple scans
/// share a database: callers construct one and pass the `Arc` to every
/// `ParallelSampler`.
pub type DbQueryPermits = Arc<Semaphore>;

pub fn new_permits(max_concurrent_db_queries: usize) -> DbQueryPermits {
    Arc::new(Semaphore::new(max_concurrent_db_queries.max(1)))
}

/// Fetch size cap passed to the prepared statement: requested sample
/// sizes are clamped to `min(n, 1000)`.
const MAX_FETCH_SIZE: usize = 1000;

pub struct ParallelSampler {
    connector: Arc<dyn Connector>,
    db_permits: DbQueryPermits,
    worker_pool_permits: Arc<Semaphore>,
}

impl ParallelSampler {
    pub fn new(connector: Arc<dyn Connector>, db_permits: DbQueryPermits) -> Self {
        let pool_size = (num_cpus() * 2).max(1);
        Self { connector, db_permits, worker_pool_permits: Arc::new(Semaphore::new(pool_size)) }
    }

    /// `sampleColumns(conn, columns[], n) -> map column -> SampleData`.
    /// Per-column failures surface as `Err` in the returned map rather than
    /// aborting the whole call; the only way the call aborts early is
    /// cancellation.
    pub async fn sample_columns(
        &self,
        connection_id: &str,
        table_name: &str,
        columns: &[Column],
        dialect: &dyn SqlDialect,
        requested_n: usize,
        config: &SamplingConfig,
        cancel: &CancelToken,
    ) -> HashMap<crate::domain::ColumnId, Result<SampleData, SamplingError>> {
        let fetch_size = requested_n.min(MAX_FETCH_SIZE);
        let mut join_set: JoinSet<(
            crate::domain::ColumnId,
            Result<SampleData, SamplingError>,
        )> = JoinSet::new();

        for column in columns {
            if cancel.is_cancelled() {
                break;
            }
            let connector = self.connector.clone();
            let db_permits = self.db_permits.clone();
            let worker_pool_permits = self.worker_pool_permits.clone();
            let cancel = cancel.clone();
            let column = column.clone();
            let connection_id = connection_id.to_string();
            let table_name = table_name.to_string();
            let sql = dialect.build_sampling_query(&table_name, &column.name, fetch_size);
            let entropy_enabled = config.entropy_calculation_enabled;

            join_set.spawn(async move {
                let column_id = column.id;
                let result = sample_one_column(
                    &connector,
                    &worker_pool_permits,
                    &db_permits,
                    &connection_id,
                    &column,
                    &sql,
                    entropy_enabled,
                    &cancel,
                )
                .await;
                (column_id, result)
            });
        }

        let mut results = HashMap::new();
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((column_id, result)) => {
                    results.insert(column_id, result);
                },
                Err(join_error) => {
                    tracing::error!("sampler worker panicked: {join_error}");
                },
            }
        }
        results
    }

    /// `determineOptimalSampleSize`: exact row count when it is at most
    /// `defaultSize`, else `defaultSize`. Count failures are non-fatal and
    /// fall back to `defaultSize`.
    pub async fn determine_optimal_sample_size(
        &self,
        connection_id: &str,
        table_name: &str,
        dialect: &dyn SqlDialect,
        default_size: usize,
    ) -> usize {
        let sql = dialect.build_count_query(table_name);
        let _permit = self.db_permits.acquire().await;
        match self.connector.row_count(connection_id, &sql).await {
            Ok(count) if (count as usize) <= default_size => count as usize,
            Ok(_) => default_size,
            Err(e) => {
                tracing::warn!("row count failed for {table_name}, falling back to default size: {e}");
                default_size
            },
        }
    }
}

#[allow(clippy::too_many_arguments)]
async fn sample_one_column(
    connector: &Arc<dyn Connector>,
    worker_pool_permits: &Semaphore,
    db_permits: &Semaphore,
    connection_id: &str,
    column: &Column,
    sql: &str,
    entropy_enabled: bool,
    cancel: &CancelToken,
) -> Result<SampleData, SamplingError> {
    let _pool_permit = match cancel.race(worker_pool_permits.acquire()).await {
        Some(Ok(permit)) => permit,
        Some(Err(_)) => return Err(SamplingError::Cancelled),
        None => return Err(SamplingError::Cancelled),
    };

    if cancel.is_cancelled() {
        return Err(SamplingError::Cancelled);
    }

    let _db_permit = match cancel.race(db_permits.acquire()).await {
        Some(Ok(permit)) => permit,
        Some(Err(_)) => return Err(SamplingError::Cancelled),
        None => return Err(SamplingError::Cancelled),
    };

    let query = connector.query_column(connection_id, sql);
    let rows = match cancel.race(query).await {
        Some(Ok(rows)) => rows,
        Some(Err(e)) => {
            return Err(SamplingError::QueryFailed {
                column: column.name.clone(),
                message: e.to_string(),
            });
        },
        None => return Err(SamplingError::Cancelled),
    };

    let samples: Vec<SampleValue> = rows.into_iter().map(coerce).collect();
    let mut data = SampleData::new(column.id, samples);
    if entropy_enabled {
        data.compute_entropy();
    }
    Ok(data)
}

fn coerce(value: RawValue) -> SampleValue {
    match value {
        RawValue::Null => SampleValue::Null,
        RawValue::Text(s) => SampleValue::Text(s),
        RawValue::Number(n) => SampleValue::Number(n),
        RawValue::Boolean(b) => SampleValue::Boolean(b),
    }
}

fn num_cpus() -> usize {
    std::thread::available_parallelism().map(|n| n.get()).unwrap_or(4)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::schema::{ColumnId, TableId};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingConnector {
        in_flight: Arc<AtomicUsize>,
        max_observed: Arc<AtomicUsize>,
        row_values: Vec<RawValue>,
    }

    #[async_trait]
    impl Connector for CountingConnector {
        async fn query_column(
            &self,
            _connection_id: &str,
            _sql: &str,
        ) -> Result<Vec<RawValue>, crate::error::ConnectivityError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_observed.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(self.row_values.clone())
        }

        async fn row_count(
            &self,
            _connection_id: &str,
            _sql: &str,
        ) -> Result<u64, crate::error::ConnectivityError> {
            Ok(self.row_values.len() as u64)
        }

        async fn database_product_name(
            &self,
            _connection_id: &str,
        ) -> Result<String, crate::error::ConnectivityError> {
            Ok("PostgreSQL".to_string())
        }
    }

    fn test_column(id: u64, name: &str) -> Column {
        Column {
            id: ColumnId(id),
            table_id: TableId(0),
            name: name.to_string(),
            jdbc_type: 12,
            db_type_name: "varchar".into(),
            comments: None,
            size: None,
            nullable: true,
            primary_key: false,
        }
    }

    #[tokio::test]
    async fn permit_bound_is_respected_across_twenty_columns() {
        let in_flight = Arc::new(AtomicUsize::new(0));
        let max_observed = Arc::new(AtomicUsize::new(0));
        let connector: Arc<dyn Connector> = Arc::new(CountingConnector {
            in_flight: in_flight.clone(),
            max_observed: max_observed.clone(),
            row_values: vec![RawValue::Text("x".into()); 4],
        });

        let permits = new_permits(3);
        let sampler = ParallelSampler::new(connector, permits);
        let columns: Vec<Column> = (0..20).map(|i| test_column(i, &format!("col{i}"))).collect();
        let dialect = crate::dialect::PostgresDialect;
        let cancel = CancelToken::new();

        let config = SamplingConfig { max_concurrent_db_queries: 3, ..SamplingConfig::default() };
        let results = sampler
            .sample_columns("conn", "t", &columns, &dialect, 4, &config, &cancel)
            .await;

        assert_eq!(results.len(), 20);
        for result in results.values() {
            let data = result.as_ref().unwrap();
            assert!(data.samples.len() <= 4);
        }
        assert!(max_observed.load(Ordering::SeqCst) <= 3);
    }

    #[tokio::test]
    async fn requested_sample_size_is_clamped_to_the_fetch_size_cap() {
        struct RecordingConnector {
            seen_sql: std::sync::Mutex<Vec<String>>,
        }
        #[async_trait]
        impl Connector for RecordingConnector {
            async fn query_column(
                &self,
                _connection_id: &str,
                sql: &str,
            ) -> Result<Vec<RawValue>, crate::error::ConnectivityError> {
                self.seen_sql.lock().unwrap().push(sql.to_string());
                Ok(vec![])
            }
            async fn row_count(
                &self,
                _connection_id: &str,
                _sql: &str,
            ) -> Result<u64, crate::error::ConnectivityError> {
                Ok(0)
            }
            async fn database_product_name(
                &self,
                _connection_id: &str,
            ) -> Result<String, crate::error::ConnectivityError> {
                Ok("PostgreSQL".to_string())
            }
        }

        let recorder = Arc::new(RecordingConnector { seen_sql: std::sync::Mutex::new(Vec::new()) });
        let sampler = ParallelSampler::new(recorder.clone(), new_permits(5));
        let dialect = crate::dialect::PostgresDialect;
        let cancel = CancelToken::new();
        let columns = vec![test_column(0, "a")];
        let config = SamplingConfig::default();

        sampler
            .sample_columns("conn", "t", &columns, &dialect, MAX_FETCH_SIZE + 500, &config, &cancel)
            .await;

        let seen = recorder.seen_sql.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert!(seen[0].contains(&format!("LIMIT {MAX_FETCH_SIZE}")));
    }

    #[tokio::test]
    async fn sample_size_optimization_falls_back_to_default_on_count_failure() {
        struct FailingCountConnector;
        #[async_trait]
        impl Connector for FailingCountConnector {
            async fn query_column(
                &self,
                _connection_id: &str,
                _sql: &str,
            ) -> Result<Vec<RawValue>, crate::error::ConnectivityError> {
                Ok(vec![])
            }
            async fn row_count(
                &self,
                _connection_id: &str,
                _sql: &str,
            ) -> Result<u64, crate::error::ConnectivityError> {
                Err(crate::error::ConnectivityError::Unreachable("down".into()))
            }
            async fn database_product_name(
                &self,
                _connection_id: &str,
            ) -> Result<String, crate::error::ConnectivityError> {
                Ok("PostgreSQL".to_string())
            }
        }

        let connector: Arc<dyn Connector> = Arc::new(FailingCountConnector);
        let sampler = ParallelSampler::new(connector, new_permits(5));
        let dialect = crate::dialect::PostgresDialect;
        let size = sampler.determine_optimal_sample_size("conn", "t", &dialect, 1000).await;
        assert_eq!(size, 1000);
    }

    #[tokio::test]
    async fn cancellation_stops_in_flight_sampling_promptly() {
        struct SlowConnector;
        #[async_trait]
        impl Connector for SlowConnector {
            async fn query_column(
                &self,
                _connection_id: &str,
                _sql: &str,
            ) -> Result<Vec<RawValue>, crate::error::ConnectivityError> {
                tokio::time::sleep(std::time::Duration::from_secs(30)).await;
                Ok(vec![])
            }
            async fn row_count(
                &self,
                _connection_id: &str,
                _sql: &str,
            ) -> Result<u64, crate::error::ConnectivityError> {
                Ok(0)
            }
            async fn database_product_name(
                &self,
                _connection_id: &str,
            ) -> Result<String, crate::error::ConnectivityError> {
                Ok("PostgreSQL".to_string())
            }
        }

        let connector: Arc<dyn Connector> = Arc::new(SlowConnector);
        let sampler = ParallelSampler::new(connector, new_permits(2));
        let dialect = crate::dialect::PostgresDialect;
        let cancel = CancelToken::new();
        let columns = vec![test_column(0, "a")];
        let config = SamplingConfig::default();

        let cancel_clone = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            cancel_clone.cancel();
        });

        let results = tokio::time::timeout(
            std::time::Duration::from_secs(2),
            sampler.sample_columns("conn", "t", &columns, &dialect, 10, &config, &cancel),
        )
        .await
        .expect("sampling should return promptly after cancellation");

        assert!(matches!(results[&ColumnId(0)], Err(SamplingError::Cancelled)));
    }
}
