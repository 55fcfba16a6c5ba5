//! Configuration management for network identification

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{NetworkError, Result};

/// Parameters controlling clustering and re-clustering of haplotype networks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterConfig {
    /// Minimum fraction of possible edges a network must contain
    pub min_connected_threshold: f64,

    /// Largest network accepted without further refinement
    pub max_network_size: usize,

    /// Smallest network kept at all
    pub min_network_size: usize,

    /// Number of re-clustering rounds allowed per lineage
    pub max_recheck_count: usize,

    /// Random walk length used by the walktrap detector
    pub random_walk_step_size: usize,

    /// Fraction of network size a hub's neighbor count has to exceed
    pub segment_dist_threshold: f64,

    /// Top fraction of members, ranked by inverse-length connectivity,
    /// considered as hubs
    pub hub_threshold: f64,

    /// Whether failing networks are refined at all
    pub recluster: bool,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            min_connected_threshold: 0.5,
            max_network_size: 30,
            min_network_size: 2,
            max_recheck_count: 5,
            random_walk_step_size: 3,
            segment_dist_threshold: 0.2,
            hub_threshold: 0.01,
            recluster: true,
        }
    }
}

impl ClusterConfig {
    /// Read a configuration from a JSON file. Missing fields take defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        log::debug!("Reading cluster configuration from {}", path.display());

        let reader = BufReader::new(File::open(path)?);
        let config: ClusterConfig = serde_json::from_reader(reader)?;
        config.validate()?;

        Ok(config)
    }

    /// Check that every parameter is inside its meaningful range
    pub fn validate(&self) -> Result<()> {
        check_fraction("min_connected_threshold", self.min_connected_threshold)?;
        check_fraction("segment_dist_threshold", self.segment_dist_threshold)?;
        check_fraction("hub_threshold", self.hub_threshold)?;

        if self.random_walk_step_size == 0 {
            return Err(NetworkError::InvalidConfig {
                name: "random_walk_step_size",
                message: "must be at least 1".to_string(),
            });
        }
        if self.min_network_size == 0 {
            return Err(NetworkError::InvalidConfig {
                name: "min_network_size",
                message: "must be at least 1".to_string(),
            });
        }
        if self.min_network_size > self.max_network_size {
            return Err(NetworkError::InvalidConfig {
                name: "max_network_size",
                message: format!(
                    "{} is smaller than min_network_size {}",
                    self.max_network_size, self.min_network_size
                ),
            });
        }

        Ok(())
    }
}

fn check_fraction(name: &'static str, value: f64) -> Result<()> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(NetworkError::InvalidConfig {
            name,
            message: format!("{value} is outside [0, 1]"),
        })
    }
}

/// How a segment must relate to the target region to be kept
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SegmentOverlap {
    /// Segment spans the whole region
    Contains,
    /// Segment shares at least one base with the region
    Overlaps,
}

/// Full run configuration threaded through the engine entry point
#[derive(Debug, Clone)]
pub struct Config {
    /// Minimum segment length in centimorgans
    pub min_cm: f64,

    /// Region filtering mode
    pub segment_overlap: SegmentOverlap,

    /// Clustering parameters
    pub cluster: ClusterConfig,

    /// Stop after this many top-level candidates (debugging aid)
    pub debug_iterations: Option<usize>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            min_cm: 3.0,
            segment_overlap: SegmentOverlap::Contains,
            cluster: ClusterConfig::default(),
            debug_iterations: None,
        }
    }
}

impl Config {
    /// Create a new configuration with custom values
    pub fn new(
        min_cm: f64,
        segment_overlap: SegmentOverlap,
        cluster: ClusterConfig,
        debug_iterations: Option<usize>,
    ) -> Self {
        Self {
            min_cm,
            segment_overlap,
            cluster,
            debug_iterations,
        }
    }
}
