//! Heuristic strategy: column name/comment keyword matching against a
//! fixed (regex, piiType, baseScore, description) table, precompiled once
//! at construction rather than per call.

use super::Strategy;
use crate::domain::detection::{DetectionResult, PiiCandidate, StrategyName};
use crate::domain::sample::SampleData;
use crate::domain::schema::Column;
use crate::error::StrategyError;
use async_trait::async_trait;
use regex::Regex;

struct HeuristicPattern {
    regex: Regex,
    pii_type: &'static str,
    base_score: f64,
    description: &'static str,
}

pub struct HeuristicStrategy {
    patterns: Vec<HeuristicPattern>,
}

impl HeuristicStrategy {
    pub fn new() -> Self {
        let table: &[(&str, &str, f64, &str)] = &[
            (r"(?i)^e?[-_]?mail", "EMAIL", 0.85, "email-like column name"),
            (r"(?i)ssn|social[-_ ]?security", "SSN", 0.9, "social security reference"),
            (r"(?i)phone|mobile|telephone", "PHONE", 0.75, "phone number reference"),
            (
                r"(?i)credit[-_ ]?card|card[-_ ]?number|\bcc[-_]?num\b",
                "CREDIT_CARD",
                0.85,
                "credit card reference",
            ),
            (r"(?i)passport", "PASSPORT", 0.85, "passport reference"),
            (r"(?i)national[-_ ]?id|\bnin\b", "NATIONAL_ID", 0.85, "national id reference"),
            (r"(?i)password|passwd|pwd", "CREDENTIAL", 0.9, "credential material"),
            (
                r"(?i)first[-_ ]?name|last[-_ ]?name|full[-_ ]?name|surname",
                "NAME",
                0.7,
                "person name reference",
            ),
            (r"(?i)address", "ADDRESS", 0.65, "postal address reference"),
            (r"(?i)\bdob\b|date[-_ ]?of[-_ ]?birth|birth[-_ ]?date", "DATE_OF_BIRTH", 0.8, "date of birth reference"),
            (r"(?i)\biban\b", "IBAN", 0.85, "IBAN reference"),
            (r"(?i)ip[-_ ]?address|\bip4\b|\bip6\b", "IP_ADDRESS", 0.7, "IP address reference"),
        ];

        let patterns = table
            .iter()
            .map(|(pattern, pii_type, base_score, description)| HeuristicPattern {
                regex: Regex::new(pattern).expect("heuristic pattern table entries are valid regex"),
                pii_type,
                base_score: *base_score,
                description,
            })
            .collect();
        Self { patterns }
    }
}

impl Default for HeuristicStrategy {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Strategy for HeuristicStrategy {
    fn name(&self) -> StrategyName {
        StrategyName::Heuristic
    }

    async fn detect(
        &self,
        column: &Column,
        _sample_data: Option<&SampleData>,
    ) -> Result<DetectionResult, StrategyError> {
        let comments = column.comments.as_deref().unwrap_or("");

        for pattern in &self.patterns {
            let name_hit = pattern.regex.is_match(&column.name);
            let comment_hit = !name_hit && pattern.regex.is_match(comments);
            if !name_hit && !comment_hit {
                continue;
            }

            let confidence = if name_hit { pattern.base_score } else { 0.8 * pattern.base_score };
            let evidence = if name_hit {
                format!("column name matched {}: {}", pattern.pii_type, pattern.description)
            } else {
                format!("comment matched {}: {}", pattern.pii_type, pattern.description)
            };

            return Ok(DetectionResult {
                column_id: column.id,
                candidates: vec![PiiCandidate::new(
                    column.id,
                    pattern.pii_type,
                    confidence,
                    StrategyName::Heuristic,
                    evidence,
                )],
            });
        }

        Ok(DetectionResult::empty(column.id))
    }
}
