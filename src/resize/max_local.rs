//! Stage 5: max-local-set. Flattens the working topology into attributed
//! records, keeps only the ones that can satisfy the delta entirely on
//! their own, and sorts the survivors with the allocate or release
//! comparator. Only the side of the best subtree's attributes relevant
//! to the request is forwarded to the terminal stage (free_cpus on
//! growth, current_cpus on shrink); the other side is zeroed rather
//! than passed through, since the subtree can already hold some of the
//! caller's current allocation and the terminal stage returns its
//! inputs verbatim.

use crate::allocator::Allocator;
use crate::comparator::{allocate_order, release_order};
use crate::cpuset::CpuSet;
use crate::error::{AllocatorError, ResizeError, ResizeResult};
use crate::topology::{to_attributed_slice, AttributedRecord};

pub(super) fn run(
    alloc: &Allocator,
    stage: usize,
    current: CpuSet,
    free: CpuSet,
    delta: i32,
) -> ResizeResult<(CpuSet, CpuSet)> {
    if delta > 0 {
        grow(alloc, stage, current, free, delta as usize)
    } else if delta < 0 {
        shrink(alloc, stage, current, free, delta.unsigned_abs() as usize)
    } else {
        super::run_stage(alloc, stage + 1, current, free, delta)
    }
}

fn grow(
    alloc: &Allocator,
    stage: usize,
    current: CpuSet,
    free: CpuSet,
    needed: usize,
) -> ResizeResult<(CpuSet, CpuSet)> {
    let mut records = to_attributed_slice(alloc.root(), &current, &free, &|r: &AttributedRecord| {
        r.free_count >= needed
    });
    if records.is_empty() {
        return Err(ResizeError {
            kind: AllocatorError::InsufficientFreeCpus {
                requested: needed as u32,
                available: free.len(),
            },
            add_from: free,
            remove_from: CpuSet::new(),
        });
    }
    let cmp = allocate_order(alloc.options().topology_balancing);
    records.sort_by(cmp);
    let best = &records[0];
    // The chosen subtree's own `current_cpus` may be non-empty (it can
    // already hold some of the caller's allocation); a growth request
    // must never hand back a non-empty `remove_from`, so only its free
    // CPUs are forwarded.
    super::run_stage(
        alloc,
        stage + 1,
        CpuSet::new(),
        best.free_cpus.clone(),
        needed as i32,
    )
}

fn shrink(
    alloc: &Allocator,
    stage: usize,
    current: CpuSet,
    free: CpuSet,
    needed: usize,
) -> ResizeResult<(CpuSet, CpuSet)> {
    let mut records = to_attributed_slice(alloc.root(), &current, &free, &|r: &AttributedRecord| {
        r.current_count >= needed
    });
    if records.is_empty() {
        return Err(ResizeError {
            kind: AllocatorError::InsufficientCurrentCpus {
                requested: needed as u32,
                available: current.len(),
            },
            add_from: CpuSet::new(),
            remove_from: current,
        });
    }
    let cmp = release_order();
    records.sort_by(cmp);
    let best = &records[0];
    // Mirror image of `grow`: the subtree's own `free_cpus` must not leak
    // into a shrink request's `add_from`.
    super::run_stage(
        alloc,
        stage + 1,
        best.current_cpus.clone(),
        CpuSet::new(),
        -(needed as i32),
    )
}
