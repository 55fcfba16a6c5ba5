//! Error types for network construction and refinement

use thiserror::Error;

/// Errors raised by the graph builder, the refinement engine and the
/// network repository
#[derive(Debug, Error)]
pub enum NetworkError {
    /// An edge row breaks the graph invariants (empty key, self-loop,
    /// non-positive length)
    #[error("malformed edge at row {row}: {reason}")]
    MalformedEdge { row: usize, reason: String },

    /// No edges survived upstream filtering
    #[error("no IBD edges to build a graph from")]
    EmptyGraph,

    /// Refinement produced membership that does not partition its parent
    #[error("inconsistent membership in cluster {cluster_id}: {reason}")]
    InconsistentMembership { cluster_id: String, reason: String },

    /// A network with this cluster id or haplotype is already stored
    #[error("duplicate network entry for {0}")]
    DuplicateNetwork(String),

    #[error("invalid configuration value for '{name}': {message}")]
    InvalidConfig { name: &'static str, message: String },

    #[error("unknown IBD format '{0}', expected one of hapibd, germline, ilash, rapid")]
    UnknownFormat(String),

    #[error("invalid target region '{0}', expected <chr>:<start>-<end>")]
    InvalidRegion(String),
}

pub type Result<T> = std::result::Result<T, NetworkError>;
