//! Risk Assessor: k-anonymity over QI row-signatures, per-column and
//! overall risk levels, and deterministic recommendations.

use crate::domain::detection::DetectionResult;
use crate::domain::qi::QuasiIdentifierGroup;
use crate::domain::sample::SampleData;
use crate::domain::schema::{ColumnId, TableId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

/// `None` represents k = ∞ (no rows, or undefined). When every
/// row-signature is distinct there is exactly one row per equivalence
/// class (min class size 1), but re-identification risk in that case is
/// bounded by the table size, not by 1: k is defined as `rowCount`.
fn k_anonymity(row_count: usize, equivalence_class_sizes: &[usize]) -> Option<u64> {
    if row_count == 0 {
        return None;
    }
    if equivalence_class_sizes.len() == row_count {
        return Some(row_count as u64);
    }
    equivalence_class_sizes.iter().min().map(|&k| k as u64)
}

fn table_risk_for_k(k: Option<u64>) -> RiskLevel {
    match k {
        None => RiskLevel::Low,
        Some(k) if k <= 1 => RiskLevel::Critical,
        Some(k) if k <= 5 => RiskLevel::High,
        Some(k) if k <= 15 => RiskLevel::Medium,
        Some(_) => RiskLevel::Low,
    }
}

/// Computes k-anonymity for one table's QI columns by building a
/// row-signature (values joined with `|`, nulls as the literal `NULL`) per
/// row and taking the minimum equivalence-class size, or `rowCount` if
/// every signature turned out distinct.
pub fn table_k_anonymity(qi_samples: &[&SampleData]) -> Option<u64> {
    if qi_samples.is_empty() {
        return None;
    }
    let row_count = qi_samples.iter().map(|s| s.samples.len()).min().unwrap_or(0);
    if row_count == 0 {
        return None;
    }

    let mut signature_counts: HashMap<String, usize> = HashMap::new();
    for row in 0..row_count {
        let signature = qi_samples
            .iter()
            .map(|sample| match &sample.samples[row] {
                crate::domain::sample::SampleValue::Null => "NULL".to_string(),
                other => other.bucket_key(),
            })
            .collect::<Vec<_>>()
            .join("|");
        *signature_counts.entry(signature).or_insert(0) += 1;
    }

    let sizes: Vec<usize> = signature_counts.into_values().collect();
    k_anonymity(row_count, &sizes)
}

pub fn per_column_risk(distinct_ratio: f64, confidence: f64) -> RiskLevel {
    if distinct_ratio >= 0.9 && confidence >= 0.8 {
        RiskLevel::Critical
    } else if distinct_ratio >= 0.7 && confidence >= 0.7 {
        RiskLevel::High
    } else if (distinct_ratio >= 0.5 && confidence >= 0.6) || (distinct_ratio >= 0.3 && confidence >= 0.8)
    {
        RiskLevel::Medium
    } else {
        RiskLevel::Low
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableRiskAssessment {
    pub table_id: TableId,
    pub k_anonymity: Option<u64>,
    pub risk: RiskLevel,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnRiskAssessment {
    pub column_id: ColumnId,
    pub distinct_ratio: f64,
    pub confidence: f64,
    pub risk: RiskLevel,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskReport {
    pub table_risks: Vec<TableRiskAssessment>,
    pub column_risks: Vec<ColumnRiskAssessment>,
    pub overall_risk: RiskLevel,
    pub recommendations: Vec<String>,
}

pub struct RiskAssessor;

impl RiskAssessor {
    /// Fills in each group's own `k_anonymity` (over just that group's
    /// columns, not the whole table) so report consumers can see
    /// group-level re-identification risk alongside the table-level figure.
    pub fn annotate_groups(
        qi_groups: &mut [QuasiIdentifierGroup],
        samples: &HashMap<ColumnId, SampleData>,
    ) {
        for group in qi_groups.iter_mut() {
            let group_samples: Vec<&SampleData> =
                group.columns.iter().filter_map(|id| samples.get(id)).collect();
            group.k_anonymity = table_k_anonymity(&group_samples);
        }
    }

    /// `tables_with_qi_samples`: for each table with QI columns, the QI
    /// `SampleData` slice to build row signatures from.
    pub fn assess(
        tables_with_qi_samples: &HashMap<TableId, Vec<&SampleData>>,
        detection_results: &[DetectionResult],
        qi_groups: &[QuasiIdentifierGroup],
        samples: &HashMap<ColumnId, SampleData>,
    ) -> RiskReport {
        let table_risks: Vec<TableRiskAssessment> = tables_with_qi_samples
            .iter()
            .map(|(table_id, qi_samples)| {
                let k = table_k_anonymity(qi_samples);
                TableRiskAssessment { table_id: *table_id, k_anonymity: k, risk: table_risk_for_k(k) }
            })
            .collect();

        let column_risks: Vec<ColumnRiskAssessment> = detection_results
            .iter()
            .filter_map(|result| {
                let candidate = result.highest_confidence_candidate()?;
                let sample = samples.get(&result.column_id)?;
                if sample.total_count == 0 {
                    return None;
                }
                let distinct_ratio = sample.distinct_count() as f64 / sample.total_count as f64;
                let risk = per_column_risk(distinct_ratio, candidate.confidence);
                Some(ColumnRiskAssessment {
                    column_id: result.column_id,
                    distinct_ratio,
                    confidence: candidate.confidence,
                    risk,
                })
            })
            .collect();

        let overall_risk = table_risks
            .iter()
            .map(|t| t.risk)
            .chain(column_risks.iter().map(|c| c.risk))
            .max()
            .unwrap_or(RiskLevel::Low);

        let recommendations = build_recommendations(overall_risk, !qi_groups.is_empty());

        RiskReport { table_risks, column_risks, overall_risk, recommendations }
    }
}

fn build_recommendations(overall_risk: RiskLevel, has_correlated_columns: bool) -> Vec<String> {
    let mut recommendations = Vec::new();
    match overall_risk {
        RiskLevel::Critical => {
            recommendations.push(
                "apply k-anonymization or suppression to quasi-identifier columns immediately"
                    .to_string(),
            );
            recommendations.push("restrict direct access to raw tables pending remediation".to_string());
        },
        RiskLevel::High => {
            recommendations
                .push("generalize or bucket high-cardinality quasi-identifiers".to_string());
            recommendations.push("review access controls on affected tables".to_string());
        },
        RiskLevel::Medium => {
            recommendations.push("monitor quasi-identifier columns for cardinality drift".to_string());
        },
        RiskLevel::Low => {
            recommendations.push("no immediate remediation required".to_string());
        },
    }
    if has_correlated_columns {
        recommendations.push(
            "correlated quasi-identifiers detected: evaluate l-diversity in addition to k-anonymity"
                .to_string(),
        );
    }
    recommendations
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::sample::SampleValue;

    #[test]
    fn zip_and_gender_signature_collapse_yields_k_equal_one() {
        let zip = SampleData::new(
            ColumnId(0),
            vec![1, 1, 2, 2, 3].into_iter().map(|n| SampleValue::Number(n as f64)).collect(),
        );
        let gender = SampleData::new(
            ColumnId(1),
            ["M", "M", "F", "F", "F"].into_iter().map(|s| SampleValue::Text(s.to_string())).collect(),
        );
        let k = table_k_anonymity(&[&zip, &gender]);
        assert_eq!(k, Some(1));
        assert_eq!(table_risk_for_k(k), RiskLevel::Critical);
    }

    #[test]
    fn all_distinct_signatures_give_k_equal_row_count() {
        let col = SampleData::new(
            ColumnId(0),
            (0..5).map(|i| SampleValue::Text(format!("v{i}"))).collect(),
        );
        let k = table_k_anonymity(&[&col]);
        assert_eq!(k, Some(5));
        assert_eq!(table_risk_for_k(k), RiskLevel::Low);
    }

    #[test]
    fn no_rows_gives_infinite_k() {
        let col = SampleData::new(ColumnId(0), vec![]);
        assert_eq!(table_k_anonymity(&[&col]), None);
        assert_eq!(table_risk_for_k(None), RiskLevel::Low);
    }

    #[test]
    fn per_column_risk_matches_threshold_table() {
        assert_eq!(per_column_risk(0.95, 0.85), RiskLevel::Critical);
        assert_eq!(per_column_risk(0.75, 0.75), RiskLevel::High);
        assert_eq!(per_column_risk(0.55, 0.65), RiskLevel::Medium);
        assert_eq!(per_column_risk(0.1, 0.1), RiskLevel::Low);
    }

    #[test]
    fn overall_risk_is_max_across_tables_and_columns() {
        let mut tables: HashMap<TableId, Vec<&SampleData>> = HashMap::new();
        let zip = SampleData::new(ColumnId(0), vec![SampleValue::Number(1.0); 5]);
        tables.insert(TableId(0), vec![&zip]);
        let report = RiskAssessor::assess(&tables, &[], &[], &HashMap::new());
        assert_eq!(report.overall_risk, RiskLevel::Critical);
        assert!(!report.recommendations.is_empty());
    }
}
