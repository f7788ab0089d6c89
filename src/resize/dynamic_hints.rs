//! Stage 2: dynamic device hints. Re-evaluates the device-proximity
//! landscape one CPU at a time via `device_update_on_every_cpu`, since
//! each pick may shift what the external device model considers close.

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
    let Some(callback) = alloc.options().device_update_on_every_cpu.clone() else {
        return super::run_stage(alloc, stage + 1, current, free, delta);
    };
    if delta <= 0 {
        return super::run_stage(alloc, stage + 1, current, free, delta);
    }

    let mut current = current;
    let mut free = free;
    let mut picked = CpuSet::new();
    let mut remaining = delta;
    // Seed the first pick with a globally-good CPU using the full request.
    let mut next_request = delta;

    loop {
        callback(&current);
        let (pool, _) = super::run_stage(alloc, stage + 1, current.clone(), free.clone(), next_request)?;
        let cpu = pool.list().into_iter().next().ok_or_else(|| ResizeError {
            kind: AllocatorError::InternalInvariant(
                "dynamic device hint stage received an empty candidate pool".into(),
            ),
            add_from: CpuSet::new(),
            remove_from: CpuSet::new(),
        })?;

        current.insert(cpu);
        free.remove(cpu);
        picked.insert(cpu);
        remaining -= 1;
        if remaining == 0 {
            break;
        }
        next_request = 1;
    }

    Ok((picked, CpuSet::new()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::allocator::Options;
    use crate::topology::input::{build_tree, CacheInput, DieInput, NumaInput, PackageInput, TopologyInput};
    use std::cell::RefCell;
    use std::rc::Rc;

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
    fn callback_fires_once_per_cpu_picked() {
        let calls = Rc::new(RefCell::new(Vec::new()));
        let calls_clone = calls.clone();
        let mut options = Options::default();
        options.device_update_on_every_cpu = Some(Rc::new(move |set: &CpuSet| {
            calls_clone.borrow_mut().push(set.list());
        }));
        let alloc = Allocator::new(topology(), options, None);

        let (add, _) = alloc
            .resize(&CpuSet::new(), &"0-7".parse().unwrap(), 2)
            .unwrap();
        assert_eq!(add.len(), 2);
        // Called once before each of the two picks.
        assert_eq!(calls.borrow().len(), 2);
        assert_eq!(calls.borrow()[0], Vec::<u32>::new());
    }

    #[test]
    fn negative_delta_skips_dynamic_hints() {
        let mut options = Options::default();
        options.device_update_on_every_cpu = Some(Rc::new(|_: &CpuSet| {
            panic!("callback must not run on shrink");
        }));
        let alloc = Allocator::new(topology(), options, None);
        let (_, remove) = alloc
            .resize(&"0,1".parse().unwrap(), &"2-7".parse().unwrap(), -1)
            .unwrap();
        assert_eq!(remove.len(), 1);
    }
}
