//! Error kinds returned by topology discovery and the resize pipeline.

use crate::cpuset::CpuSet;

/// Errors produced by the allocator.
///
/// `InsufficientFreeCpus` and `InsufficientCurrentCpus` are ordinary,
/// expected outcomes of a resize call (the caller asked for more than is
/// available); `InternalInvariant` indicates a bug in a pipeline stage and
/// `TopologyDiscoveryFailed` can only occur at construction time.
#[derive(Debug, thiserror::Error)]
pub enum AllocatorError {
    #[error("requested {requested} free CPUs but only {available} are available")]
    InsufficientFreeCpus { requested: u32, available: usize },

    #[error("requested to release {requested} CPUs but only {available} are currently owned")]
    InsufficientCurrentCpus { requested: u32, available: usize },

    #[error("internal invariant violated in resizer pipeline: {0}")]
    InternalInvariant(String),

    #[error("failed to discover hardware topology: {0}")]
    TopologyDiscoveryFailed(String),
}

/// A failed resize, carrying the same `(add_from, remove_from)` pair a
/// successful resize would have returned: `InsufficientFreeCpus` still
/// carries `(free, ∅)` and `InsufficientCurrentCpus` carries `(∅,
/// current)`, so callers can inspect what was available even on failure.
#[derive(Debug, thiserror::Error)]
#[error("{kind}")]
pub struct ResizeError {
    pub kind: AllocatorError,
    pub add_from: CpuSet,
    pub remove_from: CpuSet,
}

pub type AllocatorResult<T> = Result<T, AllocatorError>;
pub type ResizeResult<T> = Result<T, ResizeError>;
