//! Stage 3: static device hints (`prefer_close_to_devices` /
//! `prefer_far_from_devices`). Narrows the free pool on growth;
//! prioritizes which CPUs to keep on shrink.

use crate::allocator::Allocator;
use crate::cpuset::{Cpu, CpuSet};
use crate::error::{AllocatorError, ResizeError, ResizeResult};

fn priority_hints(alloc: &Allocator) -> Vec<CpuSet> {
    let universe = alloc.root().cpus();
    let mut hints = Vec::new();
    for path in &alloc.options().prefer_close_to_devices {
        hints.extend(alloc.hints.topology_hint_cpus(path));
    }
    for path in &alloc.options().prefer_far_from_devices {
        for hint in alloc.hints.topology_hint_cpus(path) {
            // "Close" hints are naturally scored against whatever pool is
            // being considered; "far" hints must be scored against the
            // whole machine, not just the call's `free` set, or a CPU
            // already owned by the caller (never a member of `free`)
            // would always read as "not far" and the key would be inert
            // during a shrink.
            hints.push(universe.difference(&hint));
        }
    }
    hints
}

pub(super) fn run(
    alloc: &Allocator,
    stage: usize,
    current: CpuSet,
    free: CpuSet,
    delta: i32,
) -> ResizeResult<(CpuSet, CpuSet)> {
    let hints = priority_hints(alloc);
    if hints.is_empty() {
        return super::run_stage(alloc, stage + 1, current, free, delta);
    }

    if delta > 0 {
        let needed = delta as usize;
        let mut remaining_free = free.clone();
        for hint in &hints {
            let narrowed = remaining_free.intersection(hint);
            if narrowed.len() >= needed {
                remaining_free = narrowed;
            }
        }
        super::run_stage(alloc, stage + 1, current, remaining_free, delta)
    } else {
        shrink(alloc, stage, current, free, delta, &hints)
    }
}

fn shrink(
    alloc: &Allocator,
    stage: usize,
    current: CpuSet,
    free: CpuSet,
    delta: i32,
    hints: &[CpuSet],
) -> ResizeResult<(CpuSet, CpuSet)> {
    let needed = delta.unsigned_abs() as usize;
    let priority_count = hints.len();

    let mut scored: Vec<(Cpu, u64)> = current
        .list()
        .into_iter()
        .map(|cpu| {
            let mut score = 0u64;
            for (rank, hint) in hints.iter().enumerate() {
                if hint.contains(cpu) {
                    score |= 1u64 << (priority_count - 1 - rank);
                }
            }
            (cpu, score)
        })
        .collect();
    // Ascending by score: least desirable to retain (lowest score) first.
    scored.sort_by_key(|&(_, score)| score);

    if needed == 0 || needed > scored.len() {
        return Err(ResizeError {
            kind: AllocatorError::InternalInvariant(format!(
                "static device hint stage asked to release {needed} of {} current CPUs",
                scored.len()
            )),
            add_from: CpuSet::new(),
            remove_from: CpuSet::new(),
        });
    }

    let threshold = scored[needed - 1].1;
    let mut free_for_sure = CpuSet::from_iter(
        scored
            .iter()
            .filter(|&&(_, score)| score < threshold)
            .map(|&(cpu, _)| cpu),
    );
    let maybe: Vec<Cpu> = scored
        .iter()
        .filter(|&&(_, score)| score == threshold)
        .map(|&(cpu, _)| cpu)
        .collect();

    let shortfall = needed - free_for_sure.len();
    if shortfall > 0 {
        let maybe_set = CpuSet::from_iter(maybe);
        let (_, maybe_remove) =
            super::run_stage(alloc, stage + 1, maybe_set, free.clone(), -(shortfall as i32))?;
        for cpu in maybe_remove.list().into_iter().take(shortfall) {
            free_for_sure.insert(cpu);
        }
    }

    Ok((free, free_for_sure))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::allocator::Options;
    use crate::topology::input::{
        build_tree, CacheInput, DieInput, NumaInput, PackageInput, TopologyInput,
    };

    fn topology() -> crate::topology::tree::Node {
        build_tree(&TopologyInput {
            packages: vec![PackageInput {
                id: 0,
                dies: vec![DieInput {
                    id: 0,
                    numas: vec![NumaInput {
                        id: 0,
                        caches: vec![
                            CacheInput { id: 0, cores: vec![vec![0, 1], vec![2, 3]] },
                            CacheInput { id: 1, cores: vec![vec![4, 5], vec![6, 7]] },
                        ],
                    }],
                }],
            }],
        })
    }

    #[test]
    fn close_device_narrows_growth_to_hint() {
        let mut options = Options::default();
        options.prefer_close_to_devices = vec!["/devA".to_string()];
        let mut virt = std::collections::HashMap::new();
        virt.insert("/devA".to_string(), vec!["4-5".parse().unwrap()]);
        options.virt_dev_cpusets = Some(virt);
        let alloc = Allocator::new(topology(), options, None);

        let (add, _) = alloc
            .resize(&CpuSet::new(), &"0-7".parse().unwrap(), 1)
            .unwrap();
        let hint: CpuSet = "4-5".parse().unwrap();
        assert!(add.is_subset_of(&hint));
    }

    #[test]
    fn far_device_frees_the_hinted_cpus_first_on_shrink() {
        let mut options = Options::default();
        options.prefer_far_from_devices = vec!["/devA".to_string()];
        let mut virt = std::collections::HashMap::new();
        virt.insert("/devA".to_string(), vec!["4-5".parse().unwrap()]);
        options.virt_dev_cpusets = Some(virt);
        let alloc = Allocator::new(topology(), options, None);

        let (_, remove) = alloc
            .resize(&"0,4,5".parse().unwrap(), &"1-3,6-7".parse().unwrap(), -2)
            .unwrap();
        assert_eq!(remove.list(), vec![4, 5]);
    }
}
