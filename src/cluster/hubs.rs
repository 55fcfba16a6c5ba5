//! Detection of hub haplotypes that bridge unrelated sub-groups

use itertools::Itertools;

use crate::config::ClusterConfig;
use crate::graph::HaplotypeGraph;

/// Per-vertex statistics used to decide whether a vertex is a hub
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HubStats {
    /// Sum of inverse segment lengths over incident edges
    pub connectivity: f64,

    /// Number of distinct neighbors
    pub neighbor_count: usize,

    /// Fraction of neighbor pairs that are themselves connected
    pub local_ratio: f64,
}

/// Fraction of neighbor pairs of `node` joined by an edge. 1.0 when there
/// is no pair to test.
pub fn local_ratio(graph: &HaplotypeGraph, node: usize) -> f64 {
    let neighbors = graph.neighbors(node);
    if neighbors.len() <= 1 {
        return 1.0;
    }

    let pairs = neighbors.len() * (neighbors.len() - 1) / 2;
    let connected = neighbors
        .iter()
        .tuple_combinations()
        .filter(|&(&a, &b)| graph.has_edge(a as usize, b))
        .count();

    connected as f64 / pairs as f64
}

/// Inverse-length weighted degree of `node`
pub fn connectivity(graph: &HaplotypeGraph, node: usize) -> f64 {
    graph.edge_weights(node).iter().map(|cm| 1.0 / cm).sum()
}

pub fn hub_stats(graph: &HaplotypeGraph, node: usize) -> HubStats {
    HubStats {
        connectivity: connectivity(graph, node),
        neighbor_count: graph.degree(node),
        local_ratio: local_ratio(graph, node),
    }
}

/// Find hub candidates in a cluster's induced subgraph.
///
/// A vertex is a hub when it has more than
/// `segment_dist_threshold × size` neighbors, its neighbors are poorly
/// connected to each other (`local_ratio < min_connected_threshold`) and
/// its connectivity ranks within the top `hub_threshold` fraction. A
/// vertex whose connectivity equals the value at the cutoff rank counts as
/// inside the top fraction, unless that value is also the cluster's lowest
/// connectivity: a cluster where every member ties has no hubs.
/// Returns subgraph vertex ids, ascending.
pub fn detect_hubs(subgraph: &HaplotypeGraph, config: &ClusterConfig) -> Vec<u32> {
    let size = subgraph.node_count;
    if size == 0 {
        return Vec::new();
    }

    let conn: Vec<f64> = (0..size).map(|v| connectivity(subgraph, v)).collect();

    // Value at the hub_threshold rank; the rank itself is included
    let mut ranked = conn.clone();
    ranked.sort_unstable_by(|a, b| b.total_cmp(a));
    let rank = ((config.hub_threshold * size as f64).floor() as usize).min(size - 1);
    let cutoff = ranked[rank];
    let lowest = ranked[size - 1];

    let degree_limit = config.segment_dist_threshold * size as f64;

    let hubs: Vec<u32> = (0..size)
        .filter(|&v| subgraph.degree(v) as f64 > degree_limit)
        .filter(|&v| conn[v] >= cutoff && conn[v] > lowest)
        .filter(|&v| local_ratio(subgraph, v) < config.min_connected_threshold)
        .map(|v| v as u32)
        .collect();

    if !hubs.is_empty() {
        log::debug!(
            "Found {} hub(s) among {} haplotypes (connectivity cutoff {:.4})",
            hubs.len(),
            size,
            cutoff
        );
        for &hub in &hubs {
            let stats = hub_stats(subgraph, hub as usize);
            log::debug!(
                "Hub {}: connectivity {:.4}, {} neighbors, local ratio {:.3}",
                subgraph.hap_key(hub as usize),
                stats.connectivity,
                stats.neighbor_count,
                stats.local_ratio
            );
        }
    }

    hubs
}
