//! Haplotype graph representation and construction

pub mod builder;
pub mod compressed;

pub use builder::{build_graph, EdgeRow, GraphBuilder};
pub use compressed::{HaplotypeGraph, VertexLabels};
