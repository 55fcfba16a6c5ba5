//! Community detection, scoring and refinement of haplotype clusters

pub mod detection;
pub mod hubs;
pub mod metrics;
pub mod recluster;
pub mod walktrap;

use serde::{Deserialize, Serialize};

pub use detection::{CommunityDetection, ConnectedComponents, DisjointSets};
pub use hubs::detect_hubs;
pub use metrics::score_cluster;
pub use recluster::{DropReason, Outcome, ReclusterController};
pub use walktrap::Walktrap;

/// Assignment of every vertex of a graph to one cluster label.
///
/// Labels are dense and numbered in order of each cluster's smallest
/// vertex, so two partitions with the same grouping compare equal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Partition {
    labels: Vec<usize>,
    cluster_count: usize,
}

impl Partition {
    /// Canonicalize arbitrary per-vertex labels
    pub fn from_labels(raw: &[usize]) -> Self {
        let mut remap = std::collections::HashMap::new();
        let labels = raw
            .iter()
            .map(|&label| {
                let next = remap.len();
                *remap.entry(label).or_insert(next)
            })
            .collect();

        Self {
            labels,
            cluster_count: remap.len(),
        }
    }

    /// Every vertex in one cluster
    pub fn trivial(node_count: usize) -> Self {
        Self {
            labels: vec![0; node_count],
            cluster_count: usize::from(node_count > 0),
        }
    }

    pub fn label(&self, node: usize) -> usize {
        self.labels[node]
    }

    pub fn labels(&self) -> &[usize] {
        &self.labels
    }

    pub fn cluster_count(&self) -> usize {
        self.cluster_count
    }

    pub fn node_count(&self) -> usize {
        self.labels.len()
    }

    /// Member lists in label order, each ascending
    pub fn clusters(&self) -> Vec<Vec<u32>> {
        let mut clusters = vec![Vec::new(); self.cluster_count];
        for (node, &label) in self.labels.iter().enumerate() {
            clusters[label].push(node as u32);
        }
        clusters
    }
}

/// Connectivity statistics of one cluster
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    /// Edges with both endpoints in the cluster
    pub true_positive_count: usize,

    /// `true_positive_count / C(k, 2)`, 0 for fewer than two members
    pub true_positive_ratio: f64,

    /// Edges leaving the cluster from any member
    pub false_negative_count: usize,
}

/// A cluster under evaluation by the refinement controller
#[derive(Debug, Clone, PartialEq)]
pub struct NetworkCandidate {
    /// Lineage id: top-level label, then one `.child` suffix per round
    pub cluster_id: String,

    /// Number of hub-removal rounds this lineage went through
    pub attempt: usize,

    /// Member vertex ids in the full graph, ascending
    pub members: Vec<u32>,

    pub metrics: Option<Metrics>,
}

impl NetworkCandidate {
    pub fn new(cluster_id: impl Into<String>, attempt: usize, mut members: Vec<u32>) -> Self {
        members.sort_unstable();
        Self {
            cluster_id: cluster_id.into(),
            attempt,
            members,
            metrics: None,
        }
    }

    pub fn size(&self) -> usize {
        self.members.len()
    }

    /// Candidate produced from this one after a hub-removal round
    pub fn child(&self, index: usize, members: Vec<u32>) -> Self {
        Self::new(format!("{}.{}", self.cluster_id, index), self.attempt + 1, members)
    }
}
