//! Stage 1: `only_if_necessary` — short-circuits the delta-0 and
//! exactly-saturating cases, and rejects impossible requests up front.

use crate::allocator::Allocator;
use crate::cpuset::CpuSet;
use crate::error::{AllocatorError, ResizeError, ResizeResult};

pub(super) fn run(
    alloc: &Allocator,
    stage: usize,
    current: CpuSet,
    free: CpuSet,
    delta: i32,
) -> ResizeResult<(CpuSet, CpuSet)> {
    if delta == 0 {
        return Ok((CpuSet::new(), CpuSet::new()));
    }

    if delta > 0 {
        let requested = delta as u32;
        let available = free.len();
        if (available as u32) < requested {
            return Err(ResizeError {
                kind: AllocatorError::InsufficientFreeCpus {
                    requested,
                    available,
                },
                add_from: free,
                remove_from: CpuSet::new(),
            });
        }
        if available as u32 == requested {
            return Ok((free, CpuSet::new()));
        }
    } else {
        let requested = delta.unsigned_abs();
        let available = current.len();
        if (available as u32) < requested {
            return Err(ResizeError {
                kind: AllocatorError::InsufficientCurrentCpus {
                    requested,
                    available,
                },
                add_from: CpuSet::new(),
                remove_from: current,
            });
        }
        if available as u32 == requested {
            return Ok((CpuSet::new(), current));
        }
    }

    super::run_stage(alloc, stage + 1, current, free, delta)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::allocator::Options;
    use crate::topology::level::Level;
    use crate::topology::tree::Node;

    fn tiny_allocator() -> Allocator {
        let root = Node::new("system", Level::System, CpuSet::new());
        Allocator::new(root, Options::default(), None)
    }

    #[test]
    fn zero_delta_is_a_no_op() {
        let alloc = tiny_allocator();
        let (add, remove) = alloc.resize(&CpuSet::new(), &"0-3".parse().unwrap(), 0).unwrap();
        assert!(add.is_empty());
        assert!(remove.is_empty());
    }

    #[test]
    fn growth_beyond_free_capacity_fails() {
        let alloc = tiny_allocator();
        let err = alloc
            .resize(&CpuSet::new(), &"0-1".parse().unwrap(), 5)
            .unwrap_err();
        assert!(matches!(
            err.kind,
            AllocatorError::InsufficientFreeCpus { requested: 5, available: 2 }
        ));
        assert_eq!(err.add_from.list(), vec![0, 1]);
        assert!(err.remove_from.is_empty());
    }

    #[test]
    fn shrink_beyond_current_fails() {
        let alloc = tiny_allocator();
        let err = alloc
            .resize(&"0-1".parse().unwrap(), &CpuSet::new(), -5)
            .unwrap_err();
        assert!(matches!(
            err.kind,
            AllocatorError::InsufficientCurrentCpus { requested: 5, available: 2 }
        ));
        assert_eq!(err.remove_from.list(), vec![0, 1]);
    }

    #[test]
    fn exact_saturation_returns_whole_set() {
        let alloc = tiny_allocator();
        let free: CpuSet = "0-2".parse().unwrap();
        let (add, remove) = alloc.resize(&CpuSet::new(), &free, 3).unwrap();
        assert_eq!(add.list(), free.list());
        assert!(remove.is_empty());

        let current: CpuSet = "0-2".parse().unwrap();
        let (add, remove) = alloc.resize(&current, &CpuSet::new(), -3).unwrap();
        assert!(add.is_empty());
        assert_eq!(remove.list(), current.list());
    }
}
