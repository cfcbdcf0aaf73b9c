//! Regex strategy: applies a configurable named-pattern bank to each
//! non-null sample, emitting one candidate per piiType scaled by match
//! ratio.

use super::Strategy;
use crate::config::PatternBankEntry;
use crate::domain::detection::{DetectionResult, PiiCandidate, StrategyName};
use crate::domain::sample::SampleData;
use crate::domain::schema::Column;
use crate::error::StrategyError;
use async_trait::async_trait;
use regex::Regex;
use std::collections::HashMap;

struct CompiledPattern {
    regex: Regex,
    score: f64,
    pii_type: String,
}

pub struct RegexStrategy {
    patterns: Vec<CompiledPattern>,
}

impl RegexStrategy {
    pub fn new(bank: &HashMap<String, PatternBankEntry>) -> Result<Self, StrategyError> {
        let mut patterns = Vec::with_capacity(bank.len());
        for (name, entry) in bank {
            let regex = Regex::new(&entry.pattern).map_err(|e| StrategyError::Failed {
                strategy: StrategyName::Regex.to_string(),
                column: String::new(),
                message: format!("pattern bank entry '{name}' is not valid regex: {e}"),
            })?;
            patterns.push(CompiledPattern { regex, score: entry.score, pii_type: entry.pii_type.clone() });
        }
        Ok(Self { patterns })
    }
}

#[async_trait]
impl Strategy for RegexStrategy {
    fn name(&self) -> StrategyName {
        StrategyName::Regex
    }

    async fn detect(
        &self,
        column: &Column,
        sample_data: Option<&SampleData>,
    ) -> Result<DetectionResult, StrategyError> {
        let Some(samples) = sample_data else {
            return Ok(DetectionResult::empty(column.id));
        };
        let texts = samples.non_null_text_samples();
        if texts.is_empty() {
            return Ok(DetectionResult::empty(column.id));
        }

        let mut by_type: HashMap<&str, (usize, f64)> = HashMap::new();
        for pattern in &self.patterns {
            let matches = texts.iter().filter(|text| pattern.regex.is_match(text)).count();
            if matches == 0 {
                continue;
            }
            let entry = by_type.entry(pattern.pii_type.as_str()).or_insert((0, pattern.score));
            if matches > entry.0 {
                *entry = (matches, pattern.score);
            }
        }

        let non_null_count = texts.len() as f64;
        let candidates = by_type
            .into_iter()
            .map(|(pii_type, (matches, base_score))| {
                let confidence = (base_score * (matches as f64 / non_null_count)).clamp(0.0, 1.0);
                PiiCandidate::new(
                    column.id,
                    pii_type,
                    confidence,
                    StrategyName::Regex,
                    format!("{matches}/{} samples matched {pii_type} pattern", texts.len()),
                )
            })
            .collect();

        Ok(DetectionResult { column_id: column.id, candidates })
    }
}
