//! The hierarchical machine model: levels, the tree itself, the input
//! descriptor it is built from, discovery, and the flattening used by
//! the comparators.

pub mod input;
pub mod level;
pub mod slice;
pub mod tree;

#[cfg(feature = "hwloc-discovery")]
pub mod discover;

pub use input::{build_tree, CacheInput, DieInput, NumaInput, PackageInput, TopologyInput};
pub use level::Level;
pub use slice::{to_attributed_slice, AttributedRecord};
pub use tree::{Node, WalkControl};
