//! QI Correlation Analyzer: pairwise categorical association between QI
//! columns, then connected-component group formation. Single-threaded:
//! pairwise complexity is O(k²) on an already-small set of QI candidates.

use crate::config::QiConfig;
use crate::domain::detection::DetectionResult;
use crate::domain::qi::QuasiIdentifierGroup;
use crate::domain::sample::SampleData;
use crate::domain::schema::ColumnId;
use dashmap::DashMap;
use std::collections::{HashMap, HashSet};

const MIN_ALIGNED_SIZE: usize = 10;

/// Unordered column-pair cache key. Makes association symmetric by
/// construction: the key collapses `(A,B)` and `(B,A)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct PairKey(ColumnId, ColumnId);

impl PairKey {
    fn new(a: ColumnId, b: ColumnId) -> Self {
        if a.0 <= b.0 { PairKey(a, b) } else { PairKey(b, a) }
    }
}

pub struct QiCorrelationAnalyzer {
    config: QiConfig,
    cache: DashMap<PairKey, f64>,
}

impl QiCorrelationAnalyzer {
    pub fn new(config: QiConfig) -> Self {
        Self { config, cache: DashMap::new() }
    }

    /// Computes the asymmetric proxy association `assoc(col_i -> col_j)`
    /// and caches the max of both directions under the unordered key, so
    /// the resulting relation is symmetric regardless of visit order.
    fn association(&self, a_id: ColumnId, a: &SampleData, b_id: ColumnId, b: &SampleData) -> Option<f64> {
        let key = PairKey::new(a_id, b_id);
        if let Some(cached) = self.cache.get(&key) {
            return Some(*cached);
        }

        let aligned = a.samples.len().min(b.samples.len());
        if aligned < MIN_ALIGNED_SIZE {
            return None;
        }

        let distinct_a = a.distinct_count();
        let distinct_b = b.distinct_count();
        if distinct_a == a.samples.len() || distinct_b == b.samples.len() {
            // fully unique column carries no correlation signal
            return None;
        }

        let forward = directional_association(a, b, aligned, distinct_b);
        let backward = directional_association(b, a, aligned, distinct_a);
        let assoc = forward.max(backward);

        if assoc >= self.config.min_correlation_coefficient {
            self.cache.insert(key, assoc);
            Some(assoc)
        } else {
            None
        }
    }

    /// Augments qualifying `DetectionResult`s (those with ≥1 QI candidate)
    /// with correlation evidence and forms `QuasiIdentifierGroup`s from
    /// connected components of correlated columns.
    pub fn analyze(
        &self,
        results: &[DetectionResult],
        samples: &HashMap<ColumnId, SampleData>,
    ) -> Vec<QuasiIdentifierGroup> {
        let mut qi_results: Vec<&DetectionResult> =
            results.iter().filter(|r| r.has_qi_candidate()).collect();
        if qi_results.len() < 2 {
            return Vec::new();
        }

        if qi_results.len() > self.config.max_correlation_columns_to_analyze {
            qi_results.sort_by(|a, b| {
                b.highest_confidence_score().partial_cmp(&a.highest_confidence_score()).unwrap()
            });
            qi_results.truncate(self.config.max_correlation_columns_to_analyze);
        }

        let mut edges: Vec<(ColumnId, ColumnId, f64)> = Vec::new();
        for i in 0..qi_results.len() {
            for j in (i + 1)..qi_results.len() {
                let col_i = qi_results[i].column_id;
                let col_j = qi_results[j].column_id;
                let (Some(sample_i), Some(sample_j)) = (samples.get(&col_i), samples.get(&col_j))
                else {
                    continue;
                };
                if let Some(assoc) = self.association(col_i, sample_i, col_j, sample_j) {
                    edges.push((col_i, col_j, assoc));
                }
            }
        }

        build_groups(
            qi_results.iter().map(|r| r.column_id).collect(),
            &edges,
            self.config.min_group_size,
            self.config.max_group_size,
        )
    }
}

/// One direction of the association formula:
/// `assoc = 1 - avgDistinctPerValue(col_b | col_a) / distinct(col_b)`.
fn directional_association(a: &SampleData, b: &SampleData, aligned: usize, distinct_b: usize) -> f64 {
    if distinct_b == 0 {
        return 0.0;
    }
    let mut cooccurrence: HashMap<String, HashSet<String>> = HashMap::new();
    for i in 0..aligned {
        let key_a = a.samples[i].bucket_key();
        let key_b = b.samples[i].bucket_key();
        cooccurrence.entry(key_a).or_default().insert(key_b);
    }
    let avg_distinct_per_value =
        cooccurrence.values().map(|set| set.len()).sum::<usize>() as f64 / cooccurrence.len() as f64;
    (1.0 - avg_distinct_per_value / distinct_b as f64).clamp(0.0, 1.0)
}

/// Connected components of the correlation graph, each becoming one
/// `QuasiIdentifierGroup` when its size falls within `[min_size, max_size]`.
fn build_groups(
    nodes: Vec<ColumnId>,
    edges: &[(ColumnId, ColumnId, f64)],
    min_size: usize,
    max_size: usize,
) -> Vec<QuasiIdentifierGroup> {
    let mut adjacency: HashMap<ColumnId, Vec<(ColumnId, f64)>> = HashMap::new();
    for &(a, b, assoc) in edges {
        adjacency.entry(a).or_default().push((b, assoc));
        adjacency.entry(b).or_default().push((a, assoc));
    }

    let mut visited: HashSet<ColumnId> = HashSet::new();
    let mut groups = Vec::new();

    for &node in &nodes {
        if visited.contains(&node) || !adjacency.contains_key(&node) {
            continue;
        }
        let mut component = Vec::new();
        let mut component_edges = Vec::new();
        let mut stack = vec![node];
        visited.insert(node);
        while let Some(current) = stack.pop() {
            component.push(current);
            for &(neighbor, assoc) in adjacency.get(&current).into_iter().flatten() {
                component_edges.push(assoc);
                if visited.insert(neighbor) {
                    stack.push(neighbor);
                }
            }
        }

        if component.len() < min_size || component.len() > max_size {
            continue;
        }
        component.sort_by_key(|c| c.0);
        let score = if component_edges.is_empty() {
            0.0
        } else {
            component_edges.iter().sum::<f64>() / (component_edges.len() as f64 * 2.0)
        };
        groups.push(QuasiIdentifierGroup::new(component, score));
    }

    groups
}
