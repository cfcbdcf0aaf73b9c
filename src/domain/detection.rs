//! PiiCandidate / DetectionResult: the output of the detection pipeline
//! before and after conflict resolution and threshold filtering.

use super::schema::ColumnId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum StrategyName {
    Heuristic,
    Regex,
    Ner,
    QuasiIdentifier,
}

impl StrategyName {
    /// Conflict-resolution priority: HEURISTIC > REGEX > NER. QI candidates
    /// never compete with PII candidates for the same `piiType` tag in
    /// practice (their type tags are disjoint), but are ranked last so the
    /// ordering is still total.
    pub fn priority(self) -> u8 {
        match self {
            StrategyName::Heuristic => 3,
            StrategyName::Regex => 2,
            StrategyName::Ner => 1,
            StrategyName::QuasiIdentifier => 0,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            StrategyName::Heuristic => "HEURISTIC",
            StrategyName::Regex => "REGEX",
            StrategyName::Ner => "NER",
            StrategyName::QuasiIdentifier => "QUASI_IDENTIFIER",
        }
    }
}

impl std::fmt::Display for StrategyName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PiiCandidate {
    pub column_id: ColumnId,
    pub pii_type: String,
    pub confidence: f64,
    pub strategy: StrategyName,
    pub evidence: String,
}

impl PiiCandidate {
    pub fn new(
        column_id: ColumnId,
        pii_type: impl Into<String>,
        confidence: f64,
        strategy: StrategyName,
        evidence: impl Into<String>,
    ) -> Self {
        Self {
            column_id,
            pii_type: pii_type.into(),
            confidence: confidence.clamp(0.0, 1.0),
            strategy,
            evidence: evidence.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionResult {
    pub column_id: ColumnId,
    pub candidates: Vec<PiiCandidate>,
}

impl DetectionResult {
    pub fn empty(column_id: ColumnId) -> Self {
        Self { column_id, candidates: Vec::new() }
    }

    pub fn has_pii(&self, reporting_threshold: f64) -> bool {
        self.candidates.iter().any(|c| c.confidence >= reporting_threshold)
    }

    pub fn highest_confidence_candidate(&self) -> Option<&PiiCandidate> {
        self.candidates
            .iter()
            .max_by(|a, b| a.confidence.partial_cmp(&b.confidence).unwrap())
    }

    pub fn highest_confidence_type(&self) -> String {
        self.highest_confidence_candidate().map(|c| c.pii_type.clone()).unwrap_or_default()
    }

    pub fn highest_confidence_score(&self) -> f64 {
        self.highest_confidence_candidate().map(|c| c.confidence).unwrap_or(0.0)
    }

    pub fn detection_methods(&self) -> BTreeSet<StrategyName> {
        self.candidates.iter().map(|c| c.strategy).collect()
    }

    /// True if any surviving candidate's `piiType` belongs to the QI family
    /// (tag begins with `QUASI_ID` or was contributed by the QI strategy).
    pub fn has_qi_candidate(&self) -> bool {
        self.candidates.iter().any(|c| {
            c.strategy == StrategyName::QuasiIdentifier || c.pii_type.starts_with("QUASI_ID")
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn has_pii_respects_reporting_threshold() {
        let mut result = DetectionResult::empty(ColumnId(0));
        result.candidates.push(PiiCandidate::new(
            ColumnId(0),
            "EMAIL",
            0.4,
            StrategyName::Regex,
            "test",
        ));
        assert!(!result.has_pii(0.5));
        result.candidates.push(PiiCandidate::new(
            ColumnId(0),
            "SSN",
            0.9,
            StrategyName::Heuristic,
            "test",
        ));
        assert!(result.has_pii(0.5));
        assert_eq!(result.highest_confidence_type(), "SSN");
    }

    #[test]
    fn detection_methods_is_union_of_contributing_strategies() {
        let mut result = DetectionResult::empty(ColumnId(0));
        result.candidates.push(PiiCandidate::new(
            ColumnId(0),
            "EMAIL",
            0.9,
            StrategyName::Regex,
            "test",
        ));
        result.candidates.push(PiiCandidate::new(
            ColumnId(0),
            "EMAIL",
            0.9,
            StrategyName::Heuristic,
            "test",
        ));
        let methods = result.detection_methods();
        assert!(methods.contains(&StrategyName::Regex));
        assert!(methods.contains(&StrategyName::Heuristic));
    }

    #[test]
    fn strategy_priority_orders_heuristic_above_regex_above_ner() {
        assert!(StrategyName::Heuristic.priority() > StrategyName::Regex.priority());
        assert!(StrategyName::Regex.priority() > StrategyName::Ner.priority());
    }
}
