//! NER strategy: batches non-null samples to an external HTTP entity
//! recognizer behind a circuit breaker. `HttpNerClient` handles timeouts,
//! status-code branching, and JSON (de)serialization over `reqwest`; the
//! breaker itself is modeled as an explicit closed/open/half-open state
//! machine.

use super::Strategy;
use crate::collaborators::{NerClient, NerEntity};
use crate::config::{CircuitBreakerConfig, NerConfig};
use crate::domain::detection::{DetectionResult, PiiCandidate, StrategyName};
use crate::domain::sample::SampleData;
use crate::domain::schema::Column;
use crate::error::{NerError, StrategyError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

#[derive(Debug, Serialize)]
struct NerRequestBody<'a> {
    texts: &'a [String],
    column: &'a str,
}

#[derive(Debug, Deserialize)]
struct NerResponseBody {
    entities: Vec<NerResponseEntity>,
}

#[derive(Debug, Deserialize)]
struct NerResponseEntity {
    text: String,
    label: String,
    score: f64,
}

/// Production `NerClient`: one HTTP POST per call, no retry/breaker logic
/// of its own — that lives in `NerStrategy`, which is the thing that knows
/// about consecutive-failure counting across calls.
pub struct HttpNerClient {
    http_client: reqwest::Client,
    url: String,
    timeout: Duration,
}

impl HttpNerClient {
    pub fn new(config: &NerConfig) -> Self {
        Self {
            http_client: reqwest::Client::new(),
            url: config.url.clone(),
            timeout: Duration::from_secs(config.timeout_seconds),
        }
    }
}

#[async_trait]
impl NerClient for HttpNerClient {
    async fn detect_entities(
        &self,
        column: &str,
        texts: &[String],
    ) -> Result<Vec<NerEntity>, NerError> {
        let body = NerRequestBody { texts, column };
        let response = self
            .http_client
            .post(&self.url)
            .timeout(self.timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    NerError::Timeout(self.timeout.as_secs())
                } else {
                    NerError::Transport(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(NerError::Status(status.as_u16()));
        }

        let parsed: NerResponseBody = response
            .json()
            .await
            .map_err(|e| NerError::InvalidResponse(e.to_string()))?;

        Ok(parsed
            .entities
            .into_iter()
            .map(|e| NerEntity { text: e.text, label: e.label, score: e.score })
            .collect())
    }
}

#[derive(Debug, Default)]
struct BreakerState {
    consecutive_failures: u32,
    opened_at: Option<Instant>,
}

/// Circuit breaker guarding the NER collaborator. Opens after
/// `failure_threshold` consecutive failures; a single success closes it.
/// After `reset_timeout` elapses while open, one trial call is let through
/// (half-open) without yet clearing the failure count.
struct CircuitBreaker {
    config: CircuitBreakerConfig,
    state: Mutex<BreakerState>,
}

impl CircuitBreaker {
    fn new(config: CircuitBreakerConfig) -> Self {
        Self { config, state: Mutex::new(BreakerState::default()) }
    }

    fn allow_request(&self) -> bool {
        let state = self.state.lock().expect("breaker mutex poisoned");
        match state.opened_at {
            None => true,
            Some(opened_at) => opened_at.elapsed() >= Duration::from_secs(self.config.reset_timeout_seconds),
        }
    }

    fn record_success(&self) {
        let mut state = self.state.lock().expect("breaker mutex poisoned");
        state.consecutive_failures = 0;
        state.opened_at = None;
    }

    fn record_failure(&self) {
        let mut state = self.state.lock().expect("breaker mutex poisoned");
        state.consecutive_failures += 1;
        if state.consecutive_failures >= self.config.failure_threshold {
            state.opened_at = Some(Instant::now());
        }
    }

    #[cfg(test)]
    fn is_open(&self) -> bool {
        !self.allow_request()
    }
}

pub struct NerStrategy {
    client: std::sync::Arc<dyn NerClient>,
    breaker: CircuitBreaker,
    max_samples: usize,
    retry_attempts: u32,
}

impl NerStrategy {
    pub fn new(client: std::sync::Arc<dyn NerClient>, config: &NerConfig) -> Self {
        Self {
            client,
            breaker: CircuitBreaker::new(config.circuit_breaker.clone()),
            max_samples: config.max_samples,
            retry_attempts: config.retry_attempts,
        }
    }

    async fn call_with_retries(&self, column: &str, texts: &[String]) -> Result<Vec<NerEntity>, NerError> {
        let mut attempt = 0;
        loop {
            match self.client.detect_entities(column, texts).await {
                Ok(entities) => return Ok(entities),
                Err(e) if attempt < self.retry_attempts => {
                    attempt += 1;
                    let backoff = Duration::from_millis(100 * 2u64.pow(attempt));
                    tracing::debug!("NER call failed ({e}), retrying in {backoff:?} (attempt {attempt})");
                    tokio::time::sleep(backoff).await;
                },
                Err(e) => return Err(e),
            }
        }
    }
}

#[async_trait]
impl Strategy for NerStrategy {
    fn name(&self) -> StrategyName {
        StrategyName::Ner
    }

    async fn detect(
        &self,
        column: &Column,
        sample_data: Option<&SampleData>,
    ) -> Result<DetectionResult, StrategyError> {
        let Some(samples) = sample_data else {
            return Ok(DetectionResult::empty(column.id));
        };
        let texts: Vec<String> = samples
            .non_null_text_samples()
            .into_iter()
            .take(self.max_samples)
            .map(str::to_string)
            .collect();
        if texts.is_empty() {
            return Ok(DetectionResult::empty(column.id));
        }

        if !self.breaker.allow_request() {
            tracing::debug!("NER circuit breaker open, skipping column {}", column.name);
            return Ok(DetectionResult::empty(column.id));
        }

        let entities = match self.call_with_retries(&column.name, &texts).await {
            Ok(entities) => {
                self.breaker.record_success();
                entities
            },
            Err(e) => {
                tracing::warn!("NER strategy failed on column {}: {e}", column.name);
                self.breaker.record_failure();
                return Ok(DetectionResult::empty(column.id));
            },
        };

        let mut by_label: HashMap<String, f64> = HashMap::new();
        for entity in entities {
            let slot = by_label.entry(entity.label).or_insert(0.0);
            if entity.score > *slot {
                *slot = entity.score;
            }
        }

        let candidates = by_label
            .into_iter()
            .map(|(label, score)| {
                PiiCandidate::new(
                    column.id,
                    label.clone(),
                    score,
                    StrategyName::Ner,
                    format!("NER entity label {label}"),
                )
            })
            .collect();

        Ok(DetectionResult { column_id: column.id, candidates })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::sample::SampleValue;
    use crate::domain::schema::{ColumnId, TableId};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct AlwaysFailingClient {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl NerClient for AlwaysFailingClient {
        async fn detect_entities(
            &self,
            _column: &str,
            _texts: &[String],
        ) -> Result<Vec<NerEntity>, NerError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(NerError::Status(500))
        }
    }

    fn column() -> Column {
        Column {
            id: ColumnId(0),
            table_id: TableId(0),
            name: "notes".into(),
            jdbc_type: 12,
            db_type_name: "varchar".into(),
            comments: None,
            size: None,
            nullable: true,
            primary_key: false,
        }
    }

    fn samples() -> SampleData {
        SampleData::new(ColumnId(0), vec![SampleValue::Text("some free text".into())])
    }

    #[tokio::test]
    async fn breaker_opens_after_threshold_consecutive_failures() {
        let calls = Arc::new(AtomicUsize::new(0));
        let client = Arc::new(AlwaysFailingClient { calls: calls.clone() });
        let mut config = NerConfig::default();
        config.retry_attempts = 0;
        config.circuit_breaker.failure_threshold = 5;
        let strategy = NerStrategy::new(client, &config);

        for _ in 0..5 {
            let result = strategy.detect(&column(), Some(&samples())).await.unwrap();
            assert!(result.candidates.is_empty());
        }
        assert_eq!(calls.load(Ordering::SeqCst), 5);
        assert!(strategy.breaker.is_open());

        for _ in 0..10 {
            strategy.detect(&column(), Some(&samples())).await.unwrap();
        }
        assert_eq!(calls.load(Ordering::SeqCst), 5, "breaker should suppress further calls");
    }

    #[tokio::test]
    async fn a_single_success_closes_the_breaker() {
        struct FlakyClient {
            fail_first: std::sync::atomic::AtomicBool,
        }
        #[async_trait]
        impl NerClient for FlakyClient {
            async fn detect_entities(
                &self,
                _column: &str,
                _texts: &[String],
            ) -> Result<Vec<NerEntity>, NerError> {
                if self.fail_first.swap(false, Ordering::SeqCst) {
                    Err(NerError::Status(500))
                } else {
                    Ok(vec![NerEntity { text: "x".into(), label: "PERSON".into(), score: 0.9 }])
                }
            }
        }

        let client = Arc::new(FlakyClient { fail_first: std::sync::atomic::AtomicBool::new(true) });
        let mut config = NerConfig::default();
        config.retry_attempts = 0;
        let strategy = NerStrategy::new(client, &config);

        strategy.detect(&column(), Some(&samples())).await.unwrap();
        assert_eq!(strategy.breaker.state.lock().unwrap().consecutive_failures, 1);

        let result = strategy.detect(&column(), Some(&samples())).await.unwrap();
        assert_eq!(result.candidates.len(), 1);
        assert_eq!(strategy.breaker.state.lock().unwrap().consecutive_failures, 0);
    }
}
