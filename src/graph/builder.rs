//! Graph construction from filtered IBD edge rows

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{NetworkError, Result};
use crate::graph::compressed::{HaplotypeGraph, VertexLabels};

/// One filtered IBD segment between two haplotypes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeRow {
    pub hap_key_1: String,
    pub hap_key_2: String,
    /// Shared segment length in centimorgans
    pub length_cm: f64,
    pub individual_id_1: String,
    pub individual_id_2: String,
}

impl EdgeRow {
    pub fn new(
        hap_key_1: impl Into<String>,
        hap_key_2: impl Into<String>,
        length_cm: f64,
        individual_id_1: impl Into<String>,
        individual_id_2: impl Into<String>,
    ) -> Self {
        Self {
            hap_key_1: hap_key_1.into(),
            hap_key_2: hap_key_2.into(),
            length_cm,
            individual_id_1: individual_id_1.into(),
            individual_id_2: individual_id_2.into(),
        }
    }
}

/// Builder for incrementally constructing a [`HaplotypeGraph`]
pub struct GraphBuilder {
    /// Mapping from haplotype keys to vertex ids
    id_to_index: HashMap<String, u32>,

    /// Vertex labels in id order
    labels: VertexLabels,

    /// Longest segment seen per unordered vertex pair
    edges: HashMap<(u32, u32), f64>,

    /// Rows consumed so far, for error reporting
    rows_seen: usize,
}

impl GraphBuilder {
    /// Create a new graph builder with the given capacity
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            id_to_index: HashMap::with_capacity(capacity),
            labels: VertexLabels {
                hap_keys: Vec::with_capacity(capacity),
                individual_ids: Vec::with_capacity(capacity),
            },
            edges: HashMap::with_capacity(capacity),
            rows_seen: 0,
        }
    }

    /// Get or create a vertex id for the given haplotype key
    fn get_or_create_node(&mut self, hap_key: &str, individual_id: &str) -> u32 {
        if let Some(&idx) = self.id_to_index.get(hap_key) {
            return idx;
        }

        let idx = self.labels.hap_keys.len() as u32;
        self.id_to_index.insert(hap_key.to_string(), idx);
        self.labels.hap_keys.push(hap_key.to_string());
        self.labels.individual_ids.push(individual_id.to_string());

        idx
    }

    /// Add one segment row. Repeated pairs keep the longest segment.
    pub fn add_row(&mut self, row: &EdgeRow) -> Result<()> {
        let index = self.rows_seen;
        self.rows_seen += 1;

        let malformed = |reason: &str| NetworkError::MalformedEdge {
            row: index,
            reason: reason.to_string(),
        };

        if row.hap_key_1.is_empty() || row.hap_key_2.is_empty() {
            return Err(malformed("empty haplotype key"));
        }
        if row.hap_key_1 == row.hap_key_2 {
            return Err(malformed(&format!("self-loop on {}", row.hap_key_1)));
        }
        if !row.length_cm.is_finite() || row.length_cm <= 0.0 {
            return Err(malformed(&format!("segment length {} is not positive", row.length_cm)));
        }

        let a = self.get_or_create_node(&row.hap_key_1, &row.individual_id_1);
        let b = self.get_or_create_node(&row.hap_key_2, &row.individual_id_2);
        let key = (a.min(b), a.max(b));

        let weight = self.edges.entry(key).or_insert(row.length_cm);
        if row.length_cm > *weight {
            *weight = row.length_cm;
        }

        Ok(())
    }

    /// Build the compressed graph
    pub fn build(self) -> Result<HaplotypeGraph> {
        if self.edges.is_empty() {
            return Err(NetworkError::EmptyGraph);
        }

        let mut edges: Vec<(u32, u32, f64)> =
            self.edges.into_iter().map(|((u, v), w)| (u, v, w)).collect();
        edges.sort_unstable_by_key(|&(u, v, _)| (u, v));

        let node_count = self.labels.hap_keys.len();
        Ok(HaplotypeGraph::from_edges(node_count, &edges, self.labels))
    }
}

/// Build the haplotype graph from a full set of edge rows
pub fn build_graph(rows: &[EdgeRow]) -> Result<HaplotypeGraph> {
    let mut builder = GraphBuilder::with_capacity(rows.len());
    for row in rows {
        builder.add_row(row)?;
    }

    let graph = builder.build()?;
    log::info!(
        "Built haplotype graph with {} vertices and {} edges",
        graph.node_count,
        graph.edge_count()
    );

    Ok(graph)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(a: &str, b: &str, cm: f64) -> EdgeRow {
        let ind = |k: &str| k.split('.').next().unwrap_or(k).to_string();
        EdgeRow::new(a, b, cm, ind(a), ind(b))
    }

    #[test]
    fn test_ids_follow_first_seen_order() {
        let graph = build_graph(&[row("B.1", "A.2", 4.0), row("C.1", "B.1", 6.0)]).unwrap();

        assert_eq!(graph.labels.hap_keys, vec!["B.1", "A.2", "C.1"]);
        assert_eq!(graph.labels.individual_ids, vec!["B", "A", "C"]);
        assert_eq!(graph.edge_count(), 2);
    }

    #[test]
    fn test_duplicate_pairs_collapse_to_longest() {
        let graph = build_graph(&[
            row("A.1", "B.1", 4.0),
            row("B.1", "A.1", 9.0),
            row("A.1", "B.1", 2.0),
        ])
        .unwrap();

        assert_eq!(graph.edge_count(), 1);
        assert_eq!(graph.edge_weight(0, 1), Some(9.0));
    }

    #[test]
    fn test_rejects_self_loop() {
        let err = build_graph(&[row("A.1", "B.1", 3.0), row("A.1", "A.1", 3.0)]).unwrap_err();
        assert!(matches!(err, NetworkError::MalformedEdge { row: 1, .. }));
    }

    #[test]
    fn test_rejects_bad_length_and_empty_key() {
        assert!(matches!(
            build_graph(&[row("A.1", "B.1", 0.0)]),
            Err(NetworkError::MalformedEdge { .. })
        ));
        assert!(matches!(
            build_graph(&[row("A.1", "B.1", f64::NAN)]),
            Err(NetworkError::MalformedEdge { .. })
        ));
        assert!(matches!(
            build_graph(&[row("", "B.1", 3.0)]),
            Err(NetworkError::MalformedEdge { .. })
        ));
    }

    #[test]
    fn test_empty_input_is_an_error() {
        assert!(matches!(build_graph(&[]), Err(NetworkError::EmptyGraph)));
    }

    #[test]
    fn test_build_is_deterministic() {
        let rows = vec![row("A.1", "B.1", 4.0), row("B.1", "C.2", 5.0), row("C.2", "A.1", 6.0)];
        let first = build_graph(&rows).unwrap();
        let second = build_graph(&rows).unwrap();

        assert_eq!(first.offsets, second.offsets);
        assert_eq!(first.neighbors, second.neighbors);
        assert_eq!(first.weights, second.weights);
    }
}
