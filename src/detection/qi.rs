//! QI strategy: column-name/comment keyword matching for canonical
//! quasi-identifiers, plus cardinality-shaped detection of columns whose
//! distinctness sits in the "moderately identifying" band.

use super::Strategy;
use crate::config::QiConfig;
use crate::domain::detection::{DetectionResult, PiiCandidate, StrategyName};
use crate::domain::sample::SampleData;
use crate::domain::schema::Column;
use crate::error::StrategyError;
use async_trait::async_trait;
use regex::Regex;

const KEYWORD_CONFIDENCE: f64 = 0.9;
const MIN_SAMPLES_FOR_CARDINALITY: usize = 10;

struct QiKeyword {
    regex: Regex,
    qi_type: &'static str,
}

pub struct QuasiIdentifierStrategy {
    keywords: Vec<QiKeyword>,
    qi_config: QiConfig,
}

impl QuasiIdentifierStrategy {
    pub fn new(qi_config: QiConfig) -> Self {
        let table: &[(&str, &str)] = &[
            (r"(?i)gender|\bsex\b", "QUASI_ID_GENDER"),
            (r"(?i)zip|postal|postcode", "QUASI_ID_ZIP"),
            (r"(?i)\bdob\b|date[-_ ]?of[-_ ]?birth|birth[-_ ]?date", "QUASI_ID_DOB"),
            (r"(?i)\bcity\b|\btown\b", "QUASI_ID_CITY"),
            (r"(?i)\bage\b", "QUASI_ID_AGE"),
            (r"(?i)nationality|citizenship", "QUASI_ID_NATIONALITY"),
            (r"(?i)\brace\b|ethnicity", "QUASI_ID_RACE"),
            (r"(?i)marital[-_ ]?status", "QUASI_ID_MARITAL_STATUS"),
            (r"(?i)occupation|job[-_ ]?title", "QUASI_ID_OCCUPATION"),
        ];
        let keywords = table
            .iter()
            .map(|(pattern, qi_type)| QiKeyword {
                regex: Regex::new(pattern).expect("QI keyword table entries are valid regex"),
                qi_type,
            })
            .collect();
        Self { keywords, qi_config }
    }

    fn cardinality_candidate(&self, column: &Column, samples: &SampleData) -> Option<PiiCandidate> {
        let non_null = samples.total_count - samples.null_count;
        if non_null < MIN_SAMPLES_FOR_CARDINALITY {
            return None;
        }
        let ratio = samples.distinct_count() as f64 / samples.total_count as f64;
        let low = self.qi_config.low_cardinality_threshold;
        let high = self.qi_config.high_cardinality_threshold;
        if ratio < low || ratio > high {
            return None;
        }
        let midpoint = (low + high) / 2.0;
        let half_width = (high - low) / 2.0;
        let confidence = if half_width <= 0.0 {
            1.0
        } else {
            (1.0 - (ratio - midpoint).abs() / half_width).clamp(0.0, 1.0)
        };
        Some(PiiCandidate::new(
            column.id,
            "QUASI_ID_MEDIUM_CARDINALITY",
            confidence,
            StrategyName::QuasiIdentifier,
            format!("distinct ratio {ratio:.3} within [{low}, {high}]"),
        ))
    }
}

#[async_trait]
impl Strategy for QuasiIdentifierStrategy {
    fn name(&self) -> StrategyName {
        StrategyName::QuasiIdentifier
    }

    async fn detect(
        &self,
        column: &Column,
        sample_data: Option<&SampleData>,
    ) -> Result<DetectionResult, StrategyError> {
        let mut candidates = Vec::new();
        let comments = column.comments.as_deref().unwrap_or("");
        for keyword in &self.keywords {
            if keyword.regex.is_match(&column.name) || keyword.regex.is_match(comments) {
                candidates.push(PiiCandidate::new(
                    column.id,
                    keyword.qi_type,
                    KEYWORD_CONFIDENCE,
                    StrategyName::QuasiIdentifier,
                    format!("name/comment matched {} keyword", keyword.qi_type),
                ));
            }
        }

        if let Some(samples) = sample_data
            && let Some(candidate) = self.cardinality_candidate(column, samples)
        {
            candidates.push(candidate);
        }

        Ok(DetectionResult { column_id: column.id, candidates })
    }
}
