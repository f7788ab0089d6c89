//! The resizer pipeline: an ordered, closed chain of strategies that
//! progressively narrow candidate sets. Modeled as a fixed dispatch over
//! a stage index rather than an open trait hierarchy, since the chain is
//! stable and small (design note: pipeline polymorphism).

mod dynamic_hints;
mod max_local;
mod single_step;
mod static_hints;
mod terminal;
mod trivial;

use crate::allocator::Allocator;
use crate::cpuset::CpuSet;
use crate::error::ResizeResult;

const STAGE_COUNT: usize = 6;

pub(crate) fn run(
    alloc: &Allocator,
    current: CpuSet,
    free: CpuSet,
    delta: i32,
) -> ResizeResult<(CpuSet, CpuSet)> {
    run_stage(alloc, 0, current, free, delta)
}

/// Dispatches to stage `stage` of the pipeline. Stages call back into
/// this with `stage + 1` to delegate to "the remainder of the chain",
/// possibly more than once (dynamic hints, one-at-a-time) or with
/// narrowed inputs (static hints, max-local-set).
pub(crate) fn run_stage(
    alloc: &Allocator,
    stage: usize,
    current: CpuSet,
    free: CpuSet,
    delta: i32,
) -> ResizeResult<(CpuSet, CpuSet)> {
    log::trace!(
        "resizer stage {stage}/{STAGE_COUNT}: current={current} (in {:?}) free={free} (in {:?}) delta={delta}",
        alloc.root().cpu_locations(&current),
        alloc.root().cpu_locations(&free),
    );
    match stage {
        0 => trivial::run(alloc, stage, current, free, delta),
        1 => dynamic_hints::run(alloc, stage, current, free, delta),
        2 => static_hints::run(alloc, stage, current, free, delta),
        3 => single_step::run(alloc, stage, current, free, delta),
        4 => max_local::run(alloc, stage, current, free, delta),
        5 => terminal::run(alloc, stage, current, free, delta),
        _ => unreachable!("resizer pipeline has exactly {STAGE_COUNT} stages"),
    }
}
