//! IBD segment input

pub mod formats;
pub mod ibd;

pub use formats::{ColumnIndices, IbdFormat, TargetRegion};
pub use ibd::load_ibd_segments;
