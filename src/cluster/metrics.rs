//! Cluster connectivity metrics

use std::collections::HashSet;

use rayon::prelude::*;

use crate::cluster::Metrics;
use crate::graph::HaplotypeGraph;

/// Clusters at least this large are scored in parallel
const PARALLEL_THRESHOLD: usize = 1000;

/// Number of vertex pairs in a cluster of `k` members
pub fn theoretical_edge_count(k: usize) -> usize {
    if k < 2 {
        0
    } else {
        k * (k - 1) / 2
    }
}

/// Score one cluster against the full graph.
///
/// Internal edges have both endpoints in `members`; boundary edges have
/// exactly one. `members` must not repeat.
pub fn score_cluster(graph: &HaplotypeGraph, members: &[u32]) -> Metrics {
    let member_set: HashSet<u32> = members.iter().copied().collect();

    // (internal endpoint count, boundary edge count) per member
    let count = |&node: &u32| -> (usize, usize) {
        graph
            .neighbors(node as usize)
            .iter()
            .fold((0, 0), |(inside, outside), n| {
                if member_set.contains(n) {
                    (inside + 1, outside)
                } else {
                    (inside, outside + 1)
                }
            })
    };

    let sum = |a: (usize, usize), b: (usize, usize)| (a.0 + b.0, a.1 + b.1);

    let (internal_endpoints, boundary) = if members.len() < PARALLEL_THRESHOLD {
        members.iter().map(count).fold((0, 0), sum)
    } else {
        members.par_iter().map(count).reduce(|| (0, 0), sum)
    };

    // Every internal edge was seen from both endpoints
    let true_positive_count = internal_endpoints / 2;
    let possible = theoretical_edge_count(members.len());
    let true_positive_ratio = if possible == 0 {
        0.0
    } else {
        true_positive_count as f64 / possible as f64
    };

    Metrics {
        true_positive_count,
        true_positive_ratio,
        false_negative_count: boundary,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::VertexLabels;

    fn graph(n: usize, edges: &[(u32, u32, f64)]) -> HaplotypeGraph {
        let labels = VertexLabels {
            hap_keys: (0..n).map(|i| format!("H{i}.1")).collect(),
            individual_ids: (0..n).map(|i| format!("H{i}")).collect(),
        };
        HaplotypeGraph::from_edges(n, edges, labels)
    }

    #[test]
    fn test_single_pair() {
        let g = graph(2, &[(0, 1, 4.0)]);
        let metrics = score_cluster(&g, &[0, 1]);

        assert_eq!(metrics.true_positive_count, 1);
        assert_eq!(metrics.true_positive_ratio, 1.0);
        assert_eq!(metrics.false_negative_count, 0);
    }

    #[test]
    fn test_boundary_edges_are_counted_once() {
        // Triangle 0-1-2 with two edges leaving to 3 and one to 4
        let g = graph(
            5,
            &[(0, 1, 3.0), (1, 2, 3.0), (0, 2, 3.0), (0, 3, 3.0), (2, 3, 3.0), (1, 4, 3.0), (3, 4, 3.0)],
        );
        let metrics = score_cluster(&g, &[0, 1, 2]);

        assert_eq!(metrics.true_positive_count, 3);
        assert_eq!(metrics.true_positive_ratio, 1.0);
        assert_eq!(metrics.false_negative_count, 3);
    }

    #[test]
    fn test_path_ratio() {
        let g = graph(4, &[(0, 1, 3.0), (1, 2, 3.0), (2, 3, 3.0)]);
        let metrics = score_cluster(&g, &[0, 1, 2, 3]);

        assert_eq!(metrics.true_positive_count, 3);
        assert!((metrics.true_positive_ratio - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_singleton_has_zero_ratio() {
        let g = graph(2, &[(0, 1, 3.0)]);
        let metrics = score_cluster(&g, &[0]);

        assert_eq!(metrics.true_positive_count, 0);
        assert_eq!(metrics.true_positive_ratio, 0.0);
        assert_eq!(metrics.false_negative_count, 1);
        assert_eq!(theoretical_edge_count(0), 0);
    }
}
