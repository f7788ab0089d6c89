//! Topology-aware CPU set allocator for resizing container workloads.
//!
//! Build an [`Allocator`] over a machine topology tree (hand-built via
//! [`topology::build_tree`], discovered with the `hwloc-discovery`
//! feature via [`topology::discover`], or assembled directly with
//! [`topology::Node`]) and call [`Allocator::resize`] to grow or shrink a
//! workload's CPU set while respecting topology locality, hyperthread
//! spreading, and device proximity hints.

pub mod allocator;
pub mod comparator;
pub mod cpuset;
pub mod error;
pub mod hints;
mod resize;
pub mod topology;

pub use allocator::{Allocator, Options};
pub use cpuset::{Cpu, CpuSet};
pub use error::{AllocatorError, AllocatorResult, ResizeError, ResizeResult};
pub use hints::HintProvider;
