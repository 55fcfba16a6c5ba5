//! Finalized networks and the repository handed to analysis modules

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use crate::cluster::NetworkCandidate;
use crate::error::{NetworkError, Result};
use crate::graph::HaplotypeGraph;

/// A finalized cluster of haplotypes presumed to be IBD relatives
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Network {
    /// Cluster id, stable across the run
    pub cluster_id: String,

    /// Individual ids of the members
    pub members: BTreeSet<String>,

    /// Haplotype keys of the members
    pub haplotypes: BTreeSet<String>,

    /// Vertex ids in the run's haplotype graph
    pub hap_ids: Vec<u32>,

    pub true_positive_count: usize,
    pub true_positive_ratio: f64,
    pub false_negative_count: usize,

    /// Refinement rounds this network went through
    pub attempt: usize,

    /// Accepted only because its lineage ran out of rechecks
    pub recheck_exhausted: bool,

    /// Smallest p-value across phenotypes, filled by analysis modules
    pub min_pvalue: String,

    /// Per-phenotype results, filled by analysis modules
    pub pvalues: BTreeMap<String, serde_json::Value>,
}

impl Network {
    /// Finalize an accepted candidate, resolving labels from `graph`
    pub fn from_candidate(
        graph: &HaplotypeGraph,
        candidate: NetworkCandidate,
        recheck_exhausted: bool,
    ) -> Result<Self> {
        let metrics = candidate.metrics.ok_or_else(|| NetworkError::InconsistentMembership {
            cluster_id: candidate.cluster_id.clone(),
            reason: "accepted without being scored".to_string(),
        })?;

        let members = candidate
            .members
            .iter()
            .map(|&v| graph.individual_id(v as usize).to_string())
            .collect();
        let haplotypes = candidate
            .members
            .iter()
            .map(|&v| graph.hap_key(v as usize).to_string())
            .collect();

        Ok(Self {
            cluster_id: candidate.cluster_id,
            members,
            haplotypes,
            hap_ids: candidate.members,
            true_positive_count: metrics.true_positive_count,
            true_positive_ratio: metrics.true_positive_ratio,
            false_negative_count: metrics.false_negative_count,
            attempt: candidate.attempt,
            recheck_exhausted,
            min_pvalue: String::new(),
            pvalues: BTreeMap::new(),
        })
    }

    /// Individual ids joined by commas
    pub fn members_list(&self) -> String {
        self.members.iter().cloned().collect::<Vec<_>>().join(",")
    }

    /// Haplotype keys joined by commas
    pub fn haplotypes_list(&self) -> String {
        self.haplotypes.iter().cloned().collect::<Vec<_>>().join(",")
    }

    /// Record a per-phenotype result
    pub fn annotate(&mut self, phenotype: impl Into<String>, value: serde_json::Value) {
        self.pvalues.insert(phenotype.into(), value);
    }
}

/// Append-only collection of finalized networks with membership lookups
#[derive(Debug, Clone, Default)]
pub struct NetworkRepository {
    networks: Vec<Network>,
    by_cluster: HashMap<String, usize>,
    by_haplotype: HashMap<String, usize>,
    by_individual: HashMap<String, Vec<usize>>,
}

impl NetworkRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a network. Fails if its cluster id or any of its haplotypes
    /// is already stored; the repository is left unchanged in that case.
    pub fn push(&mut self, network: Network) -> Result<()> {
        if self.by_cluster.contains_key(&network.cluster_id) {
            return Err(NetworkError::DuplicateNetwork(format!(
                "cluster {}",
                network.cluster_id
            )));
        }
        if let Some(hap) = network.haplotypes.iter().find(|h| self.by_haplotype.contains_key(*h)) {
            return Err(NetworkError::DuplicateNetwork(format!("haplotype {hap}")));
        }

        let index = self.networks.len();
        self.by_cluster.insert(network.cluster_id.clone(), index);
        for hap in &network.haplotypes {
            self.by_haplotype.insert(hap.clone(), index);
        }
        for member in &network.members {
            self.by_individual.entry(member.clone()).or_default().push(index);
        }
        self.networks.push(network);

        Ok(())
    }

    pub fn len(&self) -> usize {
        self.networks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.networks.is_empty()
    }

    /// Networks in insertion order
    pub fn networks(&self) -> &[Network] {
        &self.networks
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Network> {
        self.networks.iter()
    }

    pub fn get(&self, cluster_id: &str) -> Option<&Network> {
        self.by_cluster.get(cluster_id).map(|&i| &self.networks[i])
    }

    /// Annotation slots (`min_pvalue`, `pvalues`) of a stored network
    pub fn annotations_mut(
        &mut self,
        cluster_id: &str,
    ) -> Option<(&mut String, &mut BTreeMap<String, serde_json::Value>)> {
        let index = *self.by_cluster.get(cluster_id)?;
        let network = &mut self.networks[index];
        Some((&mut network.min_pvalue, &mut network.pvalues))
    }

    /// Network containing a haplotype, if any
    pub fn network_for_haplotype(&self, hap_key: &str) -> Option<&Network> {
        self.by_haplotype.get(hap_key).map(|&i| &self.networks[i])
    }

    /// Networks containing either haplotype of an individual
    pub fn networks_for_individual(&self, individual_id: &str) -> Vec<&Network> {
        self.by_individual
            .get(individual_id)
            .map(|indices| indices.iter().map(|&i| &self.networks[i]).collect())
            .unwrap_or_default()
    }

    /// Networks ordered by cluster id, numerically per lineage segment
    pub fn sorted_by_cluster_id(&self) -> Vec<&Network> {
        let mut sorted: Vec<&Network> = self.networks.iter().collect();
        sorted.sort_by_key(|n| lineage_key(&n.cluster_id));
        sorted
    }
}

impl<'a> IntoIterator for &'a NetworkRepository {
    type Item = &'a Network;
    type IntoIter = std::slice::Iter<'a, Network>;

    fn into_iter(self) -> Self::IntoIter {
        self.networks.iter()
    }
}

/// Sort key for ids like `"12.0.3"`; non-numeric segments sort last
pub(crate) fn lineage_key(cluster_id: &str) -> Vec<u64> {
    cluster_id
        .split('.')
        .map(|part| part.parse().unwrap_or(u64::MAX))
        .collect()
}
