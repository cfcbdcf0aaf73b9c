//! QuasiIdentifierGroup: the output of the QI correlation analyzer.

use super::schema::ColumnId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuasiIdentifierGroup {
    pub columns: Vec<ColumnId>,
    pub risk_score: f64,
    /// `None` represents k = infinity (no rows to assess).
    pub k_anonymity: Option<u64>,
}

impl QuasiIdentifierGroup {
    pub fn new(columns: Vec<ColumnId>, risk_score: f64) -> Self {
        Self { columns, risk_score: risk_score.clamp(0.0, 1.0), k_anonymity: None }
    }
}
