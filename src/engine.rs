//! Network identification pipeline: graph, partition, refinement, repository

use std::collections::HashSet;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::cluster::{
    CommunityDetection, DropReason, NetworkCandidate, Outcome, ReclusterController, Walktrap,
};
use crate::config::Config;
use crate::error::{NetworkError, Result};
use crate::graph::{build_graph, EdgeRow, HaplotypeGraph};
use crate::network::{lineage_key, Network, NetworkRepository};

/// Counts describing one engine run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub vertices: usize,
    pub edges: usize,
    /// Clusters found by the initial community detection
    pub initial_clusters: usize,
    /// Top-level clusters actually refined
    pub candidates_processed: usize,
    pub networks: usize,
    /// Haplotypes in candidates below the minimum network size
    pub dropped_haplotypes: usize,
    pub removed_hubs: usize,
    /// Networks accepted after running out of rechecks
    pub recheck_exhausted: usize,
}

/// Everything a run produces
pub struct RunOutput {
    pub graph: HaplotypeGraph,
    pub repository: NetworkRepository,
    pub summary: RunSummary,
}

/// Entry point of network identification
pub struct NetworkEngine {
    config: Config,
    detector: Box<dyn CommunityDetection>,
}

impl NetworkEngine {
    /// Create an engine using a custom community detection strategy
    pub fn new(config: Config, detector: Box<dyn CommunityDetection>) -> Self {
        Self { config, detector }
    }

    /// Create an engine using walktrap with the configured step size
    pub fn with_walktrap(config: Config) -> Self {
        let detector = Walktrap::new(config.cluster.random_walk_step_size);
        Self::new(config, Box::new(detector))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Build the haplotype graph from `rows` and identify networks in it
    pub fn run(&self, rows: &[EdgeRow]) -> Result<RunOutput> {
        self.config.cluster.validate()?;
        let graph = build_graph(rows)?;
        self.run_graph(graph)
    }

    /// Identify networks in an already built graph
    pub fn run_graph(&self, graph: HaplotypeGraph) -> Result<RunOutput> {
        self.config.cluster.validate()?;
        if graph.edge_count() == 0 {
            return Err(NetworkError::EmptyGraph);
        }

        log::info!(
            "Partitioning {} haplotypes with {}",
            graph.node_count,
            self.detector.name()
        );
        let partition = self.detector.detect(&graph);
        log::info!("Initial partition has {} clusters", partition.cluster_count());

        // Ids come from the partition labels, never from completion order
        let mut candidates: Vec<NetworkCandidate> = partition
            .clusters()
            .into_iter()
            .enumerate()
            .map(|(label, members)| NetworkCandidate::new(label.to_string(), 0, members))
            .collect();

        if let Some(limit) = self.config.debug_iterations {
            if limit < candidates.len() {
                log::warn!(
                    "Debug mode: refining only the first {} of {} clusters",
                    limit,
                    candidates.len()
                );
                candidates.truncate(limit);
            }
        }

        let expected: HashSet<u32> = candidates
            .iter()
            .flat_map(|c| c.members.iter().copied())
            .collect();
        let candidates_processed = candidates.len();

        let controller = ReclusterController::new(&graph, &self.config.cluster, self.detector.as_ref());
        let outcomes: Vec<Vec<Outcome>> = candidates
            .into_par_iter()
            .map(|candidate| controller.refine(candidate))
            .collect::<Result<_>>()?;

        check_partition(&outcomes, &expected)?;

        let mut summary = RunSummary {
            vertices: graph.node_count,
            edges: graph.edge_count(),
            initial_clusters: partition.cluster_count(),
            candidates_processed,
            ..RunSummary::default()
        };

        let mut accepted = Vec::new();
        for outcome in outcomes.into_iter().flatten() {
            match outcome {
                Outcome::Accepted {
                    candidate,
                    recheck_exhausted,
                } => {
                    if recheck_exhausted {
                        summary.recheck_exhausted += 1;
                    }
                    accepted.push(Network::from_candidate(&graph, candidate, recheck_exhausted)?);
                }
                Outcome::Dropped {
                    members,
                    reason: DropReason::Undersized,
                    ..
                } => summary.dropped_haplotypes += members.len(),
                Outcome::Dropped {
                    members,
                    reason: DropReason::Hub,
                    ..
                } => summary.removed_hubs += members.len(),
            }
        }

        accepted.sort_by_cached_key(|n| lineage_key(&n.cluster_id));
        let mut repository = NetworkRepository::new();
        for network in accepted {
            repository.push(network)?;
        }
        summary.networks = repository.len();

        log::info!(
            "Identified {} networks ({} haplotypes dropped, {} hubs removed, {} accepted after exhausting rechecks)",
            summary.networks,
            summary.dropped_haplotypes,
            summary.removed_hubs,
            summary.recheck_exhausted
        );

        Ok(RunOutput {
            graph,
            repository,
            summary,
        })
    }
}

/// Every refined haplotype must land in exactly one outcome
fn check_partition(outcomes: &[Vec<Outcome>], expected: &HashSet<u32>) -> Result<()> {
    let mut seen = HashSet::with_capacity(expected.len());

    for outcome in outcomes.iter().flatten() {
        for &member in outcome.members() {
            if !seen.insert(member) {
                return Err(NetworkError::InconsistentMembership {
                    cluster_id: outcome_id(outcome).to_string(),
                    reason: format!("haplotype {member} appears in more than one outcome"),
                });
            }
        }
    }

    if seen != *expected {
        return Err(NetworkError::InconsistentMembership {
            cluster_id: "*".to_string(),
            reason: format!(
                "{} haplotypes refined but {} accounted for",
                expected.len(),
                seen.len()
            ),
        });
    }

    Ok(())
}

fn outcome_id(outcome: &Outcome) -> &str {
    match outcome {
        Outcome::Accepted { candidate, .. } => &candidate.cluster_id,
        Outcome::Dropped { cluster_id, .. } => cluster_id,
    }
}
