//! Detection Pipeline: runs strategies per column in a fixed order
//! with stop-on-high-confidence short-circuiting, then resolves conflicts
//! and applies the reporting threshold.

use super::Strategy;
use crate::config::DetectionConfig;
use crate::domain::detection::{DetectionResult, PiiCandidate, StrategyName};
use crate::domain::sample::SampleData;
use crate::domain::schema::Column;
use crate::utils::group_by;
use std::sync::Arc;

pub struct DetectionPipeline {
    heuristic: Arc<dyn Strategy>,
    regex: Arc<dyn Strategy>,
    ner: Arc<dyn Strategy>,
    qi: Arc<dyn Strategy>,
    config: DetectionConfig,
}

impl DetectionPipeline {
    pub fn new(
        heuristic: Arc<dyn Strategy>,
        regex: Arc<dyn Strategy>,
        ner: Arc<dyn Strategy>,
        qi: Arc<dyn Strategy>,
        config: DetectionConfig,
    ) -> Self {
        Self { heuristic, regex, ner, qi, config }
    }

    fn threshold_for(&self, strategy: StrategyName) -> f64 {
        match strategy {
            StrategyName::Heuristic => self.config.heuristic_threshold,
            StrategyName::Regex => self.config.regex_threshold,
            StrategyName::Ner => self.config.ner_threshold,
            StrategyName::QuasiIdentifier => self.config.reporting_threshold,
        }
    }

    async fn run_stage(
        &self,
        strategy: &Arc<dyn Strategy>,
        column: &Column,
        sample_data: Option<&SampleData>,
        candidates: &mut Vec<PiiCandidate>,
    ) -> bool {
        let result = strategy.detect(column, sample_data).await;
        let new_candidates = match result {
            Ok(result) => result.candidates,
            Err(e) => {
                tracing::warn!(
                    "strategy {} failed on column {}: {e}",
                    strategy.name(),
                    column.name
                );
                Vec::new()
            },
        };

        let threshold = self.threshold_for(strategy.name());
        let should_stop = self.config.stop_pipeline_on_high_confidence
            && new_candidates.iter().any(|c| c.confidence >= threshold);
        candidates.extend(new_candidates);
        should_stop
    }

    /// Runs the full per-column pipeline: HEURISTIC → REGEX → NER (with
    /// short-circuiting), then QI (always run to completion, never
    /// short-circuited since its candidate family never competes with the
    /// PII `piiType` tags above), then conflict resolution and threshold
    /// filtering.
    pub async fn process_column(
        &self,
        column: &Column,
        sample_data: Option<&SampleData>,
        requested: &[StrategyName],
    ) -> DetectionResult {
        let mut candidates = Vec::new();

        if requested.contains(&StrategyName::Heuristic)
            && self.run_stage(&self.heuristic, column, sample_data, &mut candidates).await
        {
            return self.finish(column, candidates);
        }
        if requested.contains(&StrategyName::Regex)
            && self.run_stage(&self.regex, column, sample_data, &mut candidates).await
        {
            return self.finish(column, candidates);
        }
        if requested.contains(&StrategyName::Ner) {
            self.run_stage(&self.ner, column, sample_data, &mut candidates).await;
        }
        if requested.contains(&StrategyName::QuasiIdentifier) {
            self.run_stage(&self.qi, column, sample_data, &mut candidates).await;
        }

        self.finish(column, candidates)
    }

    fn finish(&self, column: &Column, candidates: Vec<PiiCandidate>) -> DetectionResult {
        let resolved = resolve_conflicts(candidates);
        let surviving: Vec<PiiCandidate> = resolved
            .into_iter()
            .filter(|c| c.confidence >= self.config.reporting_threshold)
            .collect();
        DetectionResult { column_id: column.id, candidates: surviving }
    }
}

/// Groups by `piiType`, keeps the max-confidence candidate per group,
/// breaking ties by strategy priority then lexicographic strategy name.
fn resolve_conflicts(candidates: Vec<PiiCandidate>) -> Vec<PiiCandidate> {
    let groups = group_by(candidates, |c: &PiiCandidate| c.pii_type.clone());
    let mut winners: Vec<PiiCandidate> = groups
        .into_values()
        .filter_map(|mut group| {
            group.sort_by(|a, b| {
                b.confidence
                    .partial_cmp(&a.confidence)
                    .unwrap()
                    .then_with(|| b.strategy.priority().cmp(&a.strategy.priority()))
                    .then_with(|| a.strategy.as_str().cmp(b.strategy.as_str()))
            });
            group.into_iter().next()
        })
        .collect();
    winners.sort_by(|a, b| a.pii_type.cmp(&b.pii_type));
    winners
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::schema::{ColumnId, TableId};
    use async_trait::async_trait;
    use crate::error::StrategyError;

    struct FixedStrategy {
        name: StrategyName,
        candidates: Vec<PiiCandidate>,
    }

    #[async_trait]
    impl Strategy for FixedStrategy {
        fn name(&self) -> StrategyName {
            self.name
        }

        async fn detect(
            &self,
            _column: &Column,
            _sample_data: Option<&SampleData>,
        ) -> Result<DetectionResult, StrategyError> {
            Ok(DetectionResult { column_id: ColumnId(0), candidates: self.candidates.clone() })
        }
    }

    fn column() -> Column {
        Column {
            id: ColumnId(0),
            table_id: TableId(0),
            name: "c".into(),
            jdbc_type: 12,
            db_type_name: "varchar".into(),
            comments: None,
            size: None,
            nullable: true,
            primary_key: false,
        }
    }

    fn pipeline_with(
        heuristic_candidates: Vec<PiiCandidate>,
        regex_candidates: Vec<PiiCandidate>,
        ner_candidates: Vec<PiiCandidate>,
        config: DetectionConfig,
    ) -> DetectionPipeline {
        DetectionPipeline::new(
            Arc::new(FixedStrategy { name: StrategyName::Heuristic, candidates: heuristic_candidates }),
            Arc::new(FixedStrategy { name: StrategyName::Regex, candidates: regex_candidates }),
            Arc::new(FixedStrategy { name: StrategyName::Ner, candidates: ner_candidates }),
            Arc::new(FixedStrategy { name: StrategyName::QuasiIdentifier, candidates: vec![] }),
            config,
        )
    }

    #[tokio::test]
    async fn high_confidence_heuristic_short_circuits_remaining_stages() {
        let config = DetectionConfig { stop_pipeline_on_high_confidence: true, ..DetectionConfig::default() };
        let pipeline = pipeline_with(
            vec![PiiCandidate::new(ColumnId(0), "SSN", 0.85, StrategyName::Heuristic, "e")],
            vec![PiiCandidate::new(ColumnId(0), "PHONE", 0.95, StrategyName::Regex, "e")],
            vec![],
            config,
        );
        let result = pipeline
            .process_column(&column(), None, &[StrategyName::Heuristic, StrategyName::Regex, StrategyName::Ner])
            .await;
        assert_eq!(result.candidates.len(), 1);
        assert_eq!(result.candidates[0].pii_type, "SSN");
    }

    #[tokio::test]
    async fn conflict_resolution_keeps_max_confidence_per_pii_type() {
        let config = DetectionConfig { stop_pipeline_on_high_confidence: false, ..DetectionConfig::default() };
        let pipeline = pipeline_with(
            vec![PiiCandidate::new(ColumnId(0), "EMAIL", 0.6, StrategyName::Heuristic, "e")],
            vec![PiiCandidate::new(ColumnId(0), "EMAIL", 0.9, StrategyName::Regex, "e")],
            vec![],
            config,
        );
        let result = pipeline
            .process_column(&column(), None, &[StrategyName::Heuristic, StrategyName::Regex, StrategyName::Ner])
            .await;
        assert_eq!(result.candidates.len(), 1);
        assert_eq!(result.candidates[0].confidence, 0.9);
        assert_eq!(result.candidates[0].strategy, StrategyName::Regex);
    }

    #[tokio::test]
    async fn tie_breaks_by_strategy_priority() {
        let config = DetectionConfig { stop_pipeline_on_high_confidence: false, ..DetectionConfig::default() };
        let pipeline = pipeline_with(
            vec![PiiCandidate::new(ColumnId(0), "EMAIL", 0.8, StrategyName::Heuristic, "e")],
            vec![PiiCandidate::new(ColumnId(0), "EMAIL", 0.8, StrategyName::Regex, "e")],
            vec![],
            config,
        );
        let result = pipeline
            .process_column(&column(), None, &[StrategyName::Heuristic, StrategyName::Regex, StrategyName::Ner])
            .await;
        assert_eq!(result.candidates[0].strategy, StrategyName::Heuristic);
    }

    #[tokio::test]
    async fn below_reporting_threshold_is_dropped() {
        let config = DetectionConfig { reporting_threshold: 0.5, ..DetectionConfig::default() };
        let pipeline = pipeline_with(
            vec![PiiCandidate::new(ColumnId(0), "EMAIL", 0.2, StrategyName::Heuristic, "e")],
            vec![],
            vec![],
            config,
        );
        let result = pipeline
            .process_column(&column(), None, &[StrategyName::Heuristic])
            .await;
        assert!(result.candidates.is_empty());
    }
}
