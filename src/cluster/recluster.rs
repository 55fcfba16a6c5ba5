//! Iterative refinement of candidate clusters into final networks.
//!
//! Each candidate is scored and either accepted, dropped, or stripped of its
//! hub haplotypes and re-partitioned. Re-partitioned pieces are evaluated
//! again with one more attempt on their lineage, so refinement stops after
//! at most `max_recheck_count` rounds.

use std::collections::HashSet;

use crate::cluster::{detect_hubs, score_cluster, CommunityDetection, NetworkCandidate};
use crate::config::ClusterConfig;
use crate::error::{NetworkError, Result};
use crate::graph::HaplotypeGraph;

/// Why haplotypes left the refinement without becoming a network
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// Candidate smaller than `min_network_size`
    Undersized,
    /// Removed as a hub
    Hub,
}

/// Terminal result for a set of haplotypes
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Candidate becomes a final network. `recheck_exhausted` is set when it
    /// was accepted only because its lineage ran out of attempts.
    Accepted {
        candidate: NetworkCandidate,
        recheck_exhausted: bool,
    },
    Dropped {
        cluster_id: String,
        members: Vec<u32>,
        reason: DropReason,
    },
}

impl Outcome {
    /// Haplotypes covered by this outcome
    pub fn members(&self) -> &[u32] {
        match self {
            Outcome::Accepted { candidate, .. } => &candidate.members,
            Outcome::Dropped { members, .. } => members,
        }
    }
}

/// Drives candidates to their terminal outcomes.
///
/// Holds only shared references, so one controller can serve many rayon
/// tasks at once.
pub struct ReclusterController<'a> {
    graph: &'a HaplotypeGraph,
    config: &'a ClusterConfig,
    detector: &'a dyn CommunityDetection,
}

impl<'a> ReclusterController<'a> {
    pub fn new(
        graph: &'a HaplotypeGraph,
        config: &'a ClusterConfig,
        detector: &'a dyn CommunityDetection,
    ) -> Self {
        Self {
            graph,
            config,
            detector,
        }
    }

    /// Refine one candidate and everything split from it.
    ///
    /// The members of the returned outcomes partition the candidate's
    /// members exactly.
    pub fn refine(&self, root: NetworkCandidate) -> Result<Vec<Outcome>> {
        let mut outcomes = Vec::new();
        let mut pending = vec![root];

        while let Some(mut candidate) = pending.pop() {
            if candidate.size() < self.config.min_network_size {
                log::debug!(
                    "Dropping cluster {} with {} haplotype(s)",
                    candidate.cluster_id,
                    candidate.size()
                );
                outcomes.push(Outcome::Dropped {
                    cluster_id: candidate.cluster_id,
                    members: candidate.members,
                    reason: DropReason::Undersized,
                });
                continue;
            }

            let metrics = score_cluster(self.graph, &candidate.members);
            candidate.metrics = Some(metrics);

            let passes = metrics.true_positive_ratio >= self.config.min_connected_threshold
                && candidate.size() <= self.config.max_network_size;
            let exhausted = candidate.attempt >= self.config.max_recheck_count;

            if !self.config.recluster || passes || exhausted {
                let recheck_exhausted = self.config.recluster && !passes;
                if recheck_exhausted {
                    log::debug!(
                        "Cluster {} reached {} rechecks, accepting with ratio {:.3}",
                        candidate.cluster_id,
                        candidate.attempt,
                        metrics.true_positive_ratio
                    );
                }
                outcomes.push(Outcome::Accepted {
                    candidate,
                    recheck_exhausted,
                });
                continue;
            }

            let subgraph = self.graph.induced_subgraph(&candidate.members);
            let hubs_local = detect_hubs(&subgraph, self.config);

            if hubs_local.is_empty() {
                log::debug!(
                    "No hubs in cluster {} (ratio {:.3}, size {}), accepting as is",
                    candidate.cluster_id,
                    metrics.true_positive_ratio,
                    candidate.size()
                );
                outcomes.push(Outcome::Accepted {
                    candidate,
                    recheck_exhausted: false,
                });
                continue;
            }

            let children = self.split_without_hubs(&candidate, &subgraph, &hubs_local);
            let hubs: Vec<u32> = hubs_local
                .iter()
                .map(|&local| candidate.members[local as usize])
                .collect();
            verify_split(&candidate, &children, &hubs)?;

            log::debug!(
                "Removed {} hub(s) from cluster {}, re-partitioned into {} candidate(s)",
                hubs.len(),
                candidate.cluster_id,
                children.len()
            );

            outcomes.push(Outcome::Dropped {
                cluster_id: candidate.cluster_id.clone(),
                members: hubs,
                reason: DropReason::Hub,
            });

            // Reverse so children are evaluated in label order
            pending.extend(children.into_iter().rev());
        }

        Ok(outcomes)
    }

    /// Remove hubs from the candidate's subgraph and re-partition the rest
    fn split_without_hubs(
        &self,
        candidate: &NetworkCandidate,
        subgraph: &HaplotypeGraph,
        hubs_local: &[u32],
    ) -> Vec<NetworkCandidate> {
        let hub_set: HashSet<u32> = hubs_local.iter().copied().collect();
        let remaining: Vec<u32> = (0..subgraph.node_count as u32)
            .filter(|v| !hub_set.contains(v))
            .collect();

        let reduced = subgraph.induced_subgraph(&remaining);
        let partition = self.detector.detect(&reduced);

        partition
            .clusters()
            .into_iter()
            .enumerate()
            .map(|(index, cluster)| {
                let members = cluster
                    .iter()
                    .map(|&v| candidate.members[remaining[v as usize] as usize])
                    .collect();
                candidate.child(index, members)
            })
            .collect()
    }
}

/// Check that children and hubs split the parent's members exactly
fn verify_split(
    parent: &NetworkCandidate,
    children: &[NetworkCandidate],
    hubs: &[u32],
) -> Result<()> {
    let inconsistent = |reason: String| NetworkError::InconsistentMembership {
        cluster_id: parent.cluster_id.clone(),
        reason,
    };

    let parent_set: HashSet<u32> = parent.members.iter().copied().collect();
    let mut seen = HashSet::with_capacity(parent.size());

    let pieces = children.iter().flat_map(|c| c.members.iter()).chain(hubs.iter());
    for &member in pieces {
        if !parent_set.contains(&member) {
            return Err(inconsistent(format!("haplotype {member} is not in the parent")));
        }
        if !seen.insert(member) {
            return Err(inconsistent(format!("haplotype {member} assigned twice")));
        }
    }

    if seen.len() != parent_set.len() {
        return Err(inconsistent(format!(
            "{} of {} haplotypes accounted for",
            seen.len(),
            parent_set.len()
        )));
    }

    Ok(())
}
