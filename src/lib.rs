//! Core library functions for IBD haplotype network identification

pub mod cluster;
pub mod config;
pub mod data;
pub mod engine;
pub mod error;
pub mod graph;
pub mod network;
pub mod storage;

pub use config::{ClusterConfig, Config, SegmentOverlap};
pub use engine::{NetworkEngine, RunOutput, RunSummary};
pub use error::{NetworkError, Result};
pub use network::{Network, NetworkRepository};
