//! Random-walk agglomerative community detection (walktrap).
//!
//! ## The Algorithm (Pons & Latapy 2005)
//!
//! Two vertices are close when short random walks started from them end up
//! in the same places. For a community `C` let `P_C` be the distribution of
//! a walk of `t` steps started from a uniformly chosen member. The distance
//! between two communities is
//!
//! ```text
//! Δσ(C1, C2) = 1/n × |C1||C2| / (|C1| + |C2|) × Σ_k (P_C1[k] - P_C2[k])² / d(k)
//! ```
//!
//! Starting from singletons, the adjacent pair with the smallest `Δσ` is
//! merged until every connected component is a single community. The
//! sequence of merges forms a dendrogram which is cut where the weighted
//! modularity of the resulting partition is highest.
//!
//! Edge weights are segment lengths in cM, so long shared segments make
//! walks between two haplotypes more likely and pull them together. Every
//! vertex carries a self-loop weighted with the mean of its incident
//! weights, which keeps walks from oscillating on bipartite structure.

use std::cmp::{Ordering, Reverse};
use std::collections::{BTreeMap, BinaryHeap};

use crate::cluster::{CommunityDetection, DisjointSets, Partition};
use crate::graph::HaplotypeGraph;

/// Walktrap community detector
#[derive(Debug, Clone, Copy)]
pub struct Walktrap {
    /// Length of the random walks
    steps: usize,
}

impl Walktrap {
    /// Create a detector using walks of `steps` steps (at least one)
    pub fn new(steps: usize) -> Self {
        Self { steps: steps.max(1) }
    }

    /// Run the agglomeration and return the full merge history
    pub fn dendrogram(&self, graph: &HaplotypeGraph) -> Dendrogram {
        Agglomeration::new(graph, self.steps).run()
    }
}

impl Default for Walktrap {
    fn default() -> Self {
        Self::new(4)
    }
}

impl CommunityDetection for Walktrap {
    fn detect(&self, graph: &HaplotypeGraph) -> Partition {
        if graph.node_count < 2 {
            return Partition::trivial(graph.node_count);
        }

        let dendrogram = self.dendrogram(graph);
        let cut = dendrogram.optimal_cut();
        log::debug!(
            "Walktrap ({} steps) on {} vertices: cutting after {} of {} merges, modularity {:.4}",
            self.steps,
            graph.node_count,
            cut,
            dendrogram.merges.len(),
            dendrogram.modularity[cut]
        );

        dendrogram.cut(cut)
    }

    fn name(&self) -> &'static str {
        "walktrap"
    }
}

/// One agglomeration step. Community ids below `node_count` are vertices;
/// merge `i` creates community `node_count + i`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Merge {
    pub left: usize,
    pub right: usize,
    pub distance: f64,
}

/// Merge history of a walktrap run
#[derive(Debug, Clone, PartialEq)]
pub struct Dendrogram {
    pub node_count: usize,
    pub merges: Vec<Merge>,
    /// `modularity[k]` is the modularity after the first `k` merges
    pub modularity: Vec<f64>,
}

impl Dendrogram {
    /// Number of merges giving the highest modularity. Ties resolve to
    /// the fewest merges.
    pub fn optimal_cut(&self) -> usize {
        let mut best = 0;
        for (k, &q) in self.modularity.iter().enumerate() {
            if q > self.modularity[best] + 1e-12 {
                best = k;
            }
        }
        best
    }

    /// Partition obtained by applying the first `merges` merges
    pub fn cut(&self, merges: usize) -> Partition {
        let applied = merges.min(self.merges.len());
        let mut sets = DisjointSets::new(self.node_count + applied);

        for (i, merge) in self.merges[..applied].iter().enumerate() {
            let id = (self.node_count + i) as u32;
            sets.union(merge.left as u32, id);
            sets.union(merge.right as u32, id);
        }

        let labels: Vec<usize> = (0..self.node_count as u32)
            .map(|v| sets.find(v) as usize)
            .collect();
        Partition::from_labels(&labels)
    }
}

/// Sparse probability vector, sorted by vertex
type Distribution = Vec<(u32, f64)>;

struct Community {
    size: usize,
    probs: Distribution,
    /// Weight of edges inside the community
    internal: f64,
    /// Sum of member degrees, without self-loops
    total_degree: f64,
    /// Adjacent communities and the edge weight between them
    adjacent: BTreeMap<usize, f64>,
    alive: bool,
}

/// Pending merge in the priority queue
#[derive(Debug, Clone, Copy)]
struct PairDistance {
    distance: f64,
    left: usize,
    right: usize,
}

impl PartialEq for PairDistance {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for PairDistance {}

impl PartialOrd for PairDistance {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PairDistance {
    fn cmp(&self, other: &Self) -> Ordering {
        self.distance
            .total_cmp(&other.distance)
            .then(self.left.cmp(&other.left))
            .then(self.right.cmp(&other.right))
    }
}

struct Agglomeration<'a> {
    graph: &'a HaplotypeGraph,
    steps: usize,
    /// Self-loop weight per vertex
    loops: Vec<f64>,
    /// Degree per vertex including the self-loop
    walk_degree: Vec<f64>,
    /// Total edge weight, each edge once
    total_weight: f64,
    communities: Vec<Community>,
    heap: BinaryHeap<Reverse<PairDistance>>,
}

impl<'a> Agglomeration<'a> {
    fn new(graph: &'a HaplotypeGraph, steps: usize) -> Self {
        let n = graph.node_count;
        let mut loops = Vec::with_capacity(n);
        let mut walk_degree = Vec::with_capacity(n);
        let mut total_weight = 0.0;

        for v in 0..n {
            let strength: f64 = graph.edge_weights(v).iter().sum();
            let degree = graph.degree(v);
            let self_loop = if degree == 0 { 1.0 } else { strength / degree as f64 };
            loops.push(self_loop);
            walk_degree.push(strength + self_loop);
            total_weight += strength;
        }
        total_weight /= 2.0;

        Self {
            graph,
            steps,
            loops,
            walk_degree,
            total_weight,
            communities: Vec::with_capacity(2 * n),
            heap: BinaryHeap::new(),
        }
    }

    /// Distribution of a `steps`-step walk started at `start`
    fn walk_from(&self, start: u32, scratch: &mut [f64], seen: &mut [bool]) -> Distribution {
        let mut current: Distribution = vec![(start, 1.0)];
        let mut touched: Vec<u32> = Vec::new();

        for _ in 0..self.steps {
            for &(j, p) in &current {
                let j_idx = j as usize;
                let scale = p / self.walk_degree[j_idx];

                let targets = self
                    .graph
                    .incident(j_idx)
                    .chain(std::iter::once((j, self.loops[j_idx])));
                for (k, w) in targets {
                    let k_idx = k as usize;
                    if !seen[k_idx] {
                        seen[k_idx] = true;
                        touched.push(k);
                    }
                    scratch[k_idx] += scale * w;
                }
            }

            touched.sort_unstable();
            current = touched
                .iter()
                .map(|&k| {
                    let k_idx = k as usize;
                    let p = scratch[k_idx];
                    scratch[k_idx] = 0.0;
                    seen[k_idx] = false;
                    (k, p)
                })
                .collect();
            touched.clear();
        }

        current
    }

    /// Δσ between two live communities
    fn distance(&self, a: usize, b: usize) -> f64 {
        let ca = &self.communities[a];
        let cb = &self.communities[b];
        let (sa, sb) = (ca.size as f64, cb.size as f64);

        let mut sum = 0.0;
        let (mut i, mut j) = (0, 0);
        let (pa, pb) = (&ca.probs, &cb.probs);
        while i < pa.len() || j < pb.len() {
            let (k, diff) = match (pa.get(i), pb.get(j)) {
                (Some(&(ka, va)), Some(&(kb, vb))) if ka == kb => {
                    i += 1;
                    j += 1;
                    (ka, va - vb)
                }
                (Some(&(ka, va)), Some(&(kb, _))) if ka < kb => {
                    i += 1;
                    (ka, va)
                }
                (Some(&(ka, va)), None) => {
                    i += 1;
                    (ka, va)
                }
                (_, Some(&(kb, vb))) => {
                    j += 1;
                    (kb, -vb)
                }
                (None, None) => break,
            };
            sum += diff * diff / self.walk_degree[k as usize];
        }

        sum * sa * sb / (sa + sb) / self.graph.node_count as f64
    }

    /// Size-weighted mean of two distributions
    fn merged_distribution(a: &Community, b: &Community) -> Distribution {
        let total = (a.size + b.size) as f64;
        let (wa, wb) = (a.size as f64 / total, b.size as f64 / total);

        let mut merged = Vec::with_capacity(a.probs.len().max(b.probs.len()));
        let (mut i, mut j) = (0, 0);
        while i < a.probs.len() || j < b.probs.len() {
            match (a.probs.get(i), b.probs.get(j)) {
                (Some(&(ka, va)), Some(&(kb, vb))) if ka == kb => {
                    merged.push((ka, wa * va + wb * vb));
                    i += 1;
                    j += 1;
                }
                (Some(&(ka, va)), Some(&(kb, _))) if ka < kb => {
                    merged.push((ka, wa * va));
                    i += 1;
                }
                (Some(&(ka, va)), None) => {
                    merged.push((ka, wa * va));
                    i += 1;
                }
                (_, Some(&(kb, vb))) => {
                    merged.push((kb, wb * vb));
                    j += 1;
                }
                (None, None) => break,
            }
        }
        merged
    }

    fn modularity_term(&self, community: &Community) -> f64 {
        let m = self.total_weight;
        let share = community.total_degree / (2.0 * m);
        community.internal / m - share * share
    }

    /// Change in modularity if `a` and `b` were merged
    fn modularity_gain(&self, a: usize, b: usize) -> f64 {
        let m = self.total_weight;
        let (ca, cb) = (&self.communities[a], &self.communities[b]);
        let between = ca.adjacent.get(&b).copied().unwrap_or(0.0);
        between / m - ca.total_degree * cb.total_degree / (2.0 * m * m)
    }

    fn run(mut self) -> Dendrogram {
        let n = self.graph.node_count;
        let mut scratch = vec![0.0; n];
        let mut seen = vec![false; n];

        for v in 0..n {
            let probs = self.walk_from(v as u32, &mut scratch, &mut seen);
            let adjacent = self.graph.incident(v).map(|(u, w)| (u as usize, w)).collect();
            self.communities.push(Community {
                size: 1,
                probs,
                internal: 0.0,
                total_degree: self.graph.edge_weights(v).iter().sum(),
                adjacent,
                alive: true,
            });
        }

        let graph = self.graph;
        for (u, v, _) in graph.edges() {
            let (left, right) = (u as usize, v as usize);
            let distance = self.distance(left, right);
            self.heap.push(Reverse(PairDistance { distance, left, right }));
        }

        let has_edges = self.total_weight > 0.0;
        let mut modularity = if has_edges {
            self.communities.iter().map(|c| self.modularity_term(c)).sum::<f64>()
        } else {
            0.0
        };

        let mut merges = Vec::new();
        let mut history = vec![modularity];

        while let Some(Reverse(pair)) = self.heap.pop() {
            if !self.communities[pair.left].alive || !self.communities[pair.right].alive {
                continue;
            }

            if has_edges {
                modularity += self.modularity_gain(pair.left, pair.right);
            }
            let id = self.merge(pair.left, pair.right);

            merges.push(Merge {
                left: pair.left,
                right: pair.right,
                distance: pair.distance,
            });
            history.push(modularity);

            // New pairs for the merged community
            let neighbors: Vec<usize> = self.communities[id].adjacent.keys().copied().collect();
            for other in neighbors {
                let distance = self.distance(id, other);
                let (left, right) = (other.min(id), other.max(id));
                self.heap.push(Reverse(PairDistance { distance, left, right }));
            }
        }

        Dendrogram {
            node_count: n,
            merges,
            modularity: history,
        }
    }

    /// Merge two live communities into a new one and return its id
    fn merge(&mut self, a: usize, b: usize) -> usize {
        let id = self.communities.len();

        let (ca, cb) = (&self.communities[a], &self.communities[b]);
        let between = ca.adjacent.get(&b).copied().unwrap_or(0.0);

        let mut adjacent = ca.adjacent.clone();
        for (&other, &w) in &cb.adjacent {
            *adjacent.entry(other).or_insert(0.0) += w;
        }
        adjacent.remove(&a);
        adjacent.remove(&b);

        let merged = Community {
            size: ca.size + cb.size,
            probs: Self::merged_distribution(ca, cb),
            internal: ca.internal + cb.internal + between,
            total_degree: ca.total_degree + cb.total_degree,
            adjacent,
            alive: true,
        };

        for (&other, &w) in &merged.adjacent {
            let neighbor = &mut self.communities[other];
            neighbor.adjacent.remove(&a);
            neighbor.adjacent.remove(&b);
            neighbor.adjacent.insert(id, w);
        }

        for dead in [a, b] {
            let community = &mut self.communities[dead];
            community.alive = false;
            community.probs = Vec::new();
            community.adjacent.clear();
        }

        self.communities.push(merged);
        id
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

    fn clique(offset: u32, size: u32, cm: f64) -> Vec<(u32, u32, f64)> {
        let mut edges = Vec::new();
        for i in 0..size {
            for j in (i + 1)..size {
                edges.push((offset + i, offset + j, cm));
            }
        }
        edges
    }

    #[test]
    fn test_complete_graph_is_one_community() {
        let g = graph(10, &clique(0, 10, 5.0));
        let partition = Walktrap::new(3).detect(&g);

        assert_eq!(partition.cluster_count(), 1);
    }

    #[test]
    fn test_two_cliques_joined_by_weak_edge() {
        let mut edges = clique(0, 5, 10.0);
        edges.extend(clique(5, 5, 10.0));
        edges.push((4, 5, 1.0));
        let g = graph(10, &edges);

        let partition = Walktrap::new(3).detect(&g);

        assert_eq!(partition.cluster_count(), 2);
        assert_eq!(partition.clusters(), vec![vec![0, 1, 2, 3, 4], vec![5, 6, 7, 8, 9]]);
    }

    #[test]
    fn test_components_are_never_merged() {
        let mut edges = clique(0, 4, 6.0);
        edges.extend(clique(4, 3, 6.0));
        let g = graph(7, &edges);

        let dendrogram = Walktrap::new(3).dendrogram(&g);
        // 3 merges inside the first clique, 2 inside the second
        assert_eq!(dendrogram.merges.len(), 5);

        let partition = Walktrap::new(3).detect(&g);
        assert_eq!(partition.clusters(), vec![vec![0, 1, 2, 3], vec![4, 5, 6]]);
    }

    #[test]
    fn test_detection_is_idempotent() {
        let mut edges = clique(0, 6, 8.0);
        edges.extend(clique(6, 6, 4.0));
        edges.extend([(0, 6, 2.0), (3, 9, 2.5), (11, 12, 3.0), (12, 13, 3.0)]);
        let g = graph(14, &edges);

        let walktrap = Walktrap::new(3);
        let first = walktrap.detect(&g);
        for _ in 0..5 {
            assert_eq!(walktrap.detect(&g), first);
        }
    }

    #[test]
    fn test_small_graphs_are_trivial() {
        assert_eq!(Walktrap::new(3).detect(&graph(1, &[])), Partition::trivial(1));
        assert_eq!(Walktrap::new(3).detect(&graph(0, &[])).cluster_count(), 0);
    }

    #[test]
    fn test_edgeless_graph_keeps_singletons() {
        let partition = Walktrap::new(3).detect(&graph(4, &[]));
        assert_eq!(partition.cluster_count(), 4);
    }

    #[test]
    fn test_walk_distribution_sums_to_one() {
        let g = graph(4, &[(0, 1, 3.0), (1, 2, 7.0), (2, 3, 4.0)]);
        let agglomeration = Agglomeration::new(&g, 3);
        let mut scratch = vec![0.0; 4];
        let mut seen = vec![false; 4];

        let probs = agglomeration.walk_from(0, &mut scratch, &mut seen);
        let total: f64 = probs.iter().map(|&(_, p)| p).sum();

        assert!((total - 1.0).abs() < 1e-9);
        assert!(scratch.iter().all(|&p| p == 0.0));
    }

    #[test]
    fn test_optimal_cut_prefers_fewest_merges_on_tie() {
        let dendrogram = Dendrogram {
            node_count: 3,
            merges: vec![
                Merge { left: 0, right: 1, distance: 0.1 },
                Merge { left: 2, right: 3, distance: 0.2 },
            ],
            modularity: vec![-0.3, 0.2, 0.2],
        };
        assert_eq!(dendrogram.optimal_cut(), 1);
        assert_eq!(dendrogram.cut(1).clusters(), vec![vec![0, 1], vec![2]]);
        assert_eq!(dendrogram.cut(2).cluster_count(), 1);
    }
}
