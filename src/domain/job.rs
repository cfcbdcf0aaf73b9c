//! ScanJob: the state machine entity driven by the orchestrator.

use super::detection::StrategyName as DetectionStrategyName;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SamplingMethod {
    Random,
    FirstN,
    Stratified,
}

impl Default for SamplingMethod {
    fn default() -> Self {
        SamplingMethod::Random
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanRequest {
    pub connection_id: String,
    #[serde(default)]
    pub included_schemas: Vec<String>,
    #[serde(default)]
    pub included_tables: Vec<String>,
    #[serde(default)]
    pub excluded_tables: Vec<String>,
    pub max_sample_size: usize,
    #[serde(default)]
    pub sampling_method: SamplingMethod,
    pub confidence_threshold: f64,
    pub strategies: Vec<DetectionStrategyName>,
}

impl ScanRequest {
    pub fn new(connection_id: impl Into<String>) -> Self {
        Self {
            connection_id: connection_id.into(),
            included_schemas: Vec::new(),
            included_tables: Vec::new(),
            excluded_tables: Vec::new(),
            max_sample_size: 1000,
            sampling_method: SamplingMethod::Random,
            confidence_threshold: 0.5,
            strategies: vec![
                DetectionStrategyName::Heuristic,
                DetectionStrategyName::Regex,
                DetectionStrategyName::Ner,
                DetectionStrategyName::QuasiIdentifier,
            ],
        }
    }
}

/// Status values, in the only order transitions are allowed to move through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScanStatus {
    Pending,
    ExtractingMetadata,
    Sampling,
    DetectingPii,
    AnalyzingQi,
    GeneratingReport,
    Completed,
    Failed,
    Cancelled,
}

impl ScanStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, ScanStatus::Completed | ScanStatus::Failed | ScanStatus::Cancelled)
    }

    /// The single valid non-terminal successor in the happy-path state
    /// machine, or `None` if `self` is terminal or the last non-terminal
    /// state (Completed is reached explicitly, not via `next()`).
    pub fn next(self) -> Option<ScanStatus> {
        match self {
            ScanStatus::Pending => Some(ScanStatus::ExtractingMetadata),
            ScanStatus::ExtractingMetadata => Some(ScanStatus::Sampling),
            ScanStatus::Sampling => Some(ScanStatus::DetectingPii),
            ScanStatus::DetectingPii => Some(ScanStatus::AnalyzingQi),
            ScanStatus::AnalyzingQi => Some(ScanStatus::GeneratingReport),
            ScanStatus::GeneratingReport => Some(ScanStatus::Completed),
            ScanStatus::Completed | ScanStatus::Failed | ScanStatus::Cancelled => None,
        }
    }

    /// Any non-terminal state may transition directly to Failed or
    /// Cancelled; validates a proposed transition against those rules.
    pub fn can_transition_to(self, target: ScanStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        if target == ScanStatus::Failed || target == ScanStatus::Cancelled {
            return true;
        }
        self.next() == Some(target)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScanCounts {
    pub tables: usize,
    pub columns: usize,
    pub pii_found: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanJob {
    pub id: Uuid,
    pub connection_id: String,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub status: ScanStatus,
    pub progress: u8,
    pub error_message: Option<String>,
    pub counts: ScanCounts,
}

impl ScanJob {
    pub fn new(connection_id: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            connection_id: connection_id.into(),
            start_time: Utc::now(),
            end_time: None,
            status: ScanStatus::Pending,
            progress: 0,
            error_message: None,
            counts: ScanCounts::default(),
        }
    }
}
