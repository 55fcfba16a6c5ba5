//! Compressed sparse representation of the haplotype graph

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Per-vertex labels kept alongside the adjacency arrays
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VertexLabels {
    /// Haplotype key for each vertex, e.g. `"SAMPLE1.2"`
    pub hap_keys: Vec<String>,

    /// Individual id for each vertex
    pub individual_ids: Vec<String>,
}

/// Undirected weighted graph of haplotypes in CSR form.
///
/// Every edge is stored twice, once in each endpoint's adjacency list.
/// Adjacency lists are sorted by neighbor id so membership tests are a
/// binary search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HaplotypeGraph {
    /// Number of vertices
    pub node_count: usize,

    /// offsets[i] to offsets[i+1] defines the adjacency range for vertex i
    pub offsets: Vec<u32>,

    /// Concatenated neighbor lists
    pub neighbors: Vec<u32>,

    /// Shared segment length (cM) parallel to `neighbors`
    pub weights: Vec<f64>,

    /// Haplotype and individual labels
    pub labels: VertexLabels,
}

impl HaplotypeGraph {
    /// Assemble a graph from deduplicated undirected edges `(u, v, cm)`
    /// with `u != v`. Labels must have one entry per vertex.
    pub fn from_edges(node_count: usize, edges: &[(u32, u32, f64)], labels: VertexLabels) -> Self {
        // Degree pass
        let mut degrees = vec![0u32; node_count];
        for &(u, v, _) in edges {
            degrees[u as usize] += 1;
            degrees[v as usize] += 1;
        }

        let mut offsets = Vec::with_capacity(node_count + 1);
        offsets.push(0);
        let mut offset = 0;
        for &degree in &degrees {
            offset += degree;
            offsets.push(offset);
        }

        // Fill pass
        let total = offset as usize;
        let mut neighbors = vec![0u32; total];
        let mut weights = vec![0.0f64; total];
        let mut cursor: Vec<usize> = offsets[..node_count].iter().map(|&o| o as usize).collect();

        for &(u, v, cm) in edges {
            for (src, dst) in [(u, v), (v, u)] {
                let pos = cursor[src as usize];
                neighbors[pos] = dst;
                weights[pos] = cm;
                cursor[src as usize] += 1;
            }
        }

        let mut graph = Self {
            node_count,
            offsets,
            neighbors,
            weights,
            labels,
        };
        graph.sort_adjacency_lists();
        graph
    }

    /// Sort all adjacency lists by neighbor id, carrying weights along
    fn sort_adjacency_lists(&mut self) {
        for node in 0..self.node_count {
            let (start, end) = self.range(node);
            if end - start < 2 {
                continue;
            }
            let mut pairs: Vec<(u32, f64)> = self.neighbors[start..end]
                .iter()
                .copied()
                .zip(self.weights[start..end].iter().copied())
                .collect();
            pairs.sort_unstable_by_key(|&(n, _)| n);
            for (i, (n, w)) in pairs.into_iter().enumerate() {
                self.neighbors[start + i] = n;
                self.weights[start + i] = w;
            }
        }
    }

    fn range(&self, node: usize) -> (usize, usize) {
        (self.offsets[node] as usize, self.offsets[node + 1] as usize)
    }

    /// Neighbors of a vertex, ascending
    pub fn neighbors(&self, node: usize) -> &[u32] {
        let (start, end) = self.range(node);
        &self.neighbors[start..end]
    }

    /// Edge weights parallel to [`neighbors`](Self::neighbors)
    pub fn edge_weights(&self, node: usize) -> &[f64] {
        let (start, end) = self.range(node);
        &self.weights[start..end]
    }

    /// Iterate `(neighbor, cm)` pairs of a vertex
    pub fn incident(&self, node: usize) -> impl Iterator<Item = (u32, f64)> + '_ {
        self.neighbors(node)
            .iter()
            .copied()
            .zip(self.edge_weights(node).iter().copied())
    }

    pub fn degree(&self, node: usize) -> usize {
        let (start, end) = self.range(node);
        end - start
    }

    /// Number of undirected edges
    pub fn edge_count(&self) -> usize {
        self.neighbors.len() / 2
    }

    pub fn has_edge(&self, src: usize, dst: u32) -> bool {
        self.neighbors(src).binary_search(&dst).is_ok()
    }

    pub fn edge_weight(&self, src: usize, dst: u32) -> Option<f64> {
        self.neighbors(src)
            .binary_search(&dst)
            .ok()
            .map(|i| self.edge_weights(src)[i])
    }

    /// Each undirected edge once, as `(u, v, cm)` with `u < v`
    pub fn edges(&self) -> impl Iterator<Item = (u32, u32, f64)> + '_ {
        (0..self.node_count).flat_map(move |u| {
            self.incident(u)
                .filter(move |&(v, _)| (u as u32) < v)
                .map(move |(v, w)| (u as u32, v, w))
        })
    }

    pub fn hap_key(&self, node: usize) -> &str {
        &self.labels.hap_keys[node]
    }

    pub fn individual_id(&self, node: usize) -> &str {
        &self.labels.individual_ids[node]
    }

    /// Copy of the subgraph induced by `members`.
    ///
    /// Local vertex `i` of the result corresponds to `members[i]` in this
    /// graph; labels follow the vertices. `members` must not repeat.
    pub fn induced_subgraph(&self, members: &[u32]) -> HaplotypeGraph {
        let local: HashMap<u32, u32> = members
            .iter()
            .enumerate()
            .map(|(i, &m)| (m, i as u32))
            .collect();

        let mut edges = Vec::new();
        for (i, &m) in members.iter().enumerate() {
            for (n, w) in self.incident(m as usize) {
                if let Some(&j) = local.get(&n) {
                    if (i as u32) < j {
                        edges.push((i as u32, j, w));
                    }
                }
            }
        }

        let labels = VertexLabels {
            hap_keys: members.iter().map(|&m| self.hap_key(m as usize).to_string()).collect(),
            individual_ids: members
                .iter()
                .map(|&m| self.individual_id(m as usize).to_string())
                .collect(),
        };

        HaplotypeGraph::from_edges(members.len(), &edges, labels)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(n: usize) -> VertexLabels {
        VertexLabels {
            hap_keys: (0..n).map(|i| format!("I{i}.1")).collect(),
            individual_ids: (0..n).map(|i| format!("I{i}")).collect(),
        }
    }

    #[test]
    fn test_adjacency_is_symmetric_and_sorted() {
        let graph = HaplotypeGraph::from_edges(4, &[(2, 0, 4.0), (0, 1, 3.0), (3, 0, 5.0)], labels(4));

        assert_eq!(graph.neighbors(0), &[1, 2, 3]);
        assert_eq!(graph.edge_weights(0), &[3.0, 4.0, 5.0]);
        assert_eq!(graph.neighbors(2), &[0]);
        assert_eq!(graph.edge_count(), 3);
        assert_eq!(graph.edge_weight(3, 0), Some(5.0));
        assert!(!graph.has_edge(1, 2));
    }

    #[test]
    fn test_edges_lists_each_once() {
        let graph = HaplotypeGraph::from_edges(3, &[(0, 1, 1.0), (1, 2, 2.0)], labels(3));
        let edges: Vec<_> = graph.edges().collect();
        assert_eq!(edges, vec![(0, 1, 1.0), (1, 2, 2.0)]);
    }

    #[test]
    fn test_induced_subgraph_remaps_vertices() {
        let graph = HaplotypeGraph::from_edges(
            4,
            &[(0, 1, 1.0), (1, 2, 2.0), (2, 3, 3.0), (1, 3, 4.0)],
            labels(4),
        );
        let sub = graph.induced_subgraph(&[3, 1, 0]);

        assert_eq!(sub.node_count, 3);
        assert_eq!(sub.edge_count(), 2);
        assert_eq!(sub.edge_weight(0, 1), Some(4.0));
        assert_eq!(sub.edge_weight(1, 2), Some(1.0));
        assert_eq!(sub.hap_key(0), "I3.1");
    }
}
