//! Stage 4: one-at-a-time. Growth probes the remainder of the chain once
//! at the full delta; if the pool it returns is no larger than what was
//! asked for, that pool is the answer. Only when the probe comes back
//! oversized does growth fall back to re-running the chain after every
//! single CPU picked, since picking a thread changes which physical core
//! looks emptiest for the next pick. Shrink always goes one at a time,
//! since releasing a CPU can change which core is now the better target
//! to drain next.

use crate::allocator::Allocator;
use crate::cpuset::{Cpu, CpuSet};
use crate::error::{AllocatorError, ResizeError, ResizeResult};

pub(super) fn run(
    alloc: &Allocator,
    stage: usize,
    current: CpuSet,
    free: CpuSet,
    delta: i32,
) -> ResizeResult<(CpuSet, CpuSet)> {
    if delta > 0 {
        grow(alloc, stage, current, free, delta)
    } else if delta < 0 {
        shrink(alloc, stage, current, free, delta)
    } else {
        super::run_stage(alloc, stage + 1, current, free, delta)
    }
}

fn grow(
    alloc: &Allocator,
    stage: usize,
    current: CpuSet,
    free: CpuSet,
    delta: i32,
) -> ResizeResult<(CpuSet, CpuSet)> {
    if !alloc.options().prefer_spread_on_physical_cores {
        return super::run_stage(alloc, stage + 1, current, free, delta);
    }

    let probe = super::run_stage(alloc, stage + 1, current.clone(), free.clone(), delta)?;
    if probe.0.len() as i32 <= delta {
        return Ok(probe);
    }

    let mut current = current;
    let mut free = free;
    let mut accumulated = CpuSet::new();
    for _ in 0..delta {
        let cpu = single_cpu(alloc, stage, &current, &free, 1, &accumulated)?;
        current.insert(cpu);
        free.remove(cpu);
        accumulated.insert(cpu);
    }
    Ok((accumulated, CpuSet::new()))
}

fn shrink(
    alloc: &Allocator,
    stage: usize,
    current: CpuSet,
    free: CpuSet,
    delta: i32,
) -> ResizeResult<(CpuSet, CpuSet)> {
    let mut current = current;
    let free = free;
    let mut accumulated = CpuSet::new();
    for _ in 0..delta.unsigned_abs() {
        let cpu = single_cpu(alloc, stage, &current, &free, -1, &accumulated)?;
        current.remove(cpu);
        accumulated.insert(cpu);
    }
    Ok((CpuSet::new(), accumulated))
}

/// Runs the remainder of the chain for a single CPU, unwrapping the
/// exactly-one-CPU pool that `max_local_set` always yields at that
/// granularity. Errors out if the pool doesn't have exactly one CPU or
/// repeats a pick already made this round, either of which would mean a
/// downstream stage broke its contract.
fn single_cpu(
    alloc: &Allocator,
    stage: usize,
    current: &CpuSet,
    free: &CpuSet,
    step: i32,
    already_picked: &CpuSet,
) -> ResizeResult<Cpu> {
    let (add, remove) = super::run_stage(alloc, stage + 1, current.clone(), free.clone(), step)?;
    let pool = if step > 0 { add } else { remove };
    let list: Vec<Cpu> = pool
        .list()
        .into_iter()
        .filter(|cpu| !already_picked.contains(*cpu))
        .collect();
    if list.len() != 1 {
        return Err(ResizeError {
            kind: AllocatorError::InternalInvariant(format!(
                "one-at-a-time stage expected exactly one candidate CPU, got {}",
                list.len()
            )),
            add_from: CpuSet::new(),
            remove_from: CpuSet::new(),
        });
    }
    Ok(list[0])
}
