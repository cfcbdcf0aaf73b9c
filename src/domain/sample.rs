//! SampleData: the per-column result of the sampler, including optional
//! Shannon entropy over the observed value distribution.

use super::schema::ColumnId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A single sampled value. Nulls are preserved (not dropped) so null-count
/// bookkeeping and k-anonymity signatures stay accurate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SampleValue {
    Null,
    Text(String),
    Number(f64),
    Boolean(bool),
}

impl SampleValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            SampleValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, SampleValue::Null)
    }

    /// Canonical string form used for cardinality/cooccurrence bucketing and
    /// k-anonymity row signatures. Nulls map to a literal `"null"`/`"NULL"`
    /// token so they form their own bucket instead of colliding with a real
    /// value.
    pub fn bucket_key(&self) -> String {
        match self {
            SampleValue::Null => "null".to_string(),
            SampleValue::Text(s) => s.clone(),
            SampleValue::Number(n) => n.to_string(),
            SampleValue::Boolean(b) => b.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SampleData {
    pub column_id: ColumnId,
    pub samples: Vec<SampleValue>,
    pub null_count: usize,
    pub total_count: usize,
    pub entropy: Option<f64>,
}

impl SampleData {
    pub fn new(column_id: ColumnId, samples: Vec<SampleValue>) -> Self {
        let null_count = samples.iter().filter(|s| s.is_null()).count();
        let total_count = samples.len();
        Self { column_id, samples, null_count, total_count, entropy: None }
    }

    pub fn non_null_samples(&self) -> impl Iterator<Item = &SampleValue> {
        self.samples.iter().filter(|s| !s.is_null())
    }

    pub fn non_null_text_samples(&self) -> Vec<&str> {
        self.samples.iter().filter_map(|s| s.as_text()).collect()
    }

    pub fn distinct_count(&self) -> usize {
        let mut keys: Vec<String> = self.samples.iter().map(|s| s.bucket_key()).collect();
        keys.sort_unstable();
        keys.dedup();
        keys.len()
    }

    /// Base-2 Shannon entropy over the discrete value-frequency distribution.
    /// Nulls are counted as a single bucket.
    pub fn compute_entropy(&mut self) {
        if self.samples.is_empty() {
            self.entropy = None;
            return;
        }
        let mut counts: HashMap<String, usize> = HashMap::new();
        for value in &self.samples {
            *counts.entry(value.bucket_key()).or_insert(0) += 1;
        }
        let total = self.samples.len() as f64;
        let entropy = -counts
            .values()
            .map(|&count| {
                let p = count as f64 / total;
                p * p.log2()
            })
            .sum::<f64>();
        self.entropy = Some(entropy);
    }
}
