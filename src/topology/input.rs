//! The topology input descriptor (§6 of the design): a package/die/NUMA
//! node/cache/core/thread enumeration from which the tree is built, and
//! the naming contract the comparators tie-break on.

use serde::{Deserialize, Serialize};

use crate::cpuset::{Cpu, CpuSet};
use crate::topology::level::Level;
use crate::topology::tree::Node;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheInput {
    /// Opaque cache id, unique within its NUMA node.
    pub id: u32,
    /// Physical cores served by this cache. Each inner list is the set
    /// of hardware threads sharing one physical core, in any order; the
    /// smallest CPU in the list names the core.
    pub cores: Vec<Vec<Cpu>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NumaInput {
    pub id: u32,
    pub caches: Vec<CacheInput>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DieInput {
    pub id: u32,
    pub numas: Vec<NumaInput>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageInput {
    pub id: u32,
    pub dies: Vec<DieInput>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TopologyInput {
    pub packages: Vec<PackageInput>,
}

/// Builds the tree described by §3/§6: names are synthesized exactly as
/// `"system"` / `"p<ID>"` / `"<parent>d<ID>"` / `"<parent>n<ID>"` /
/// `"<numa>$<ID>"` / `"<numa>cpu<firstCPU>"` / `"<core>t<CPU>"`, since
/// comparators tie-break on these names and they must be stable.
pub fn build_tree(input: &TopologyInput) -> Node {
    let root = Node::new("system", Level::System, CpuSet::new());
    for package in &input.packages {
        let package_name = format!("p{}", package.id);
        let package_node = Node::new(package_name.clone(), Level::Package, CpuSet::new());
        root.add_child(package_node.clone());

        for die in &package.dies {
            let die_name = format!("{}d{}", package_name, die.id);
            let die_node = Node::new(die_name.clone(), Level::Die, CpuSet::new());
            package_node.add_child(die_node.clone());

            for numa in &die.numas {
                let numa_name = format!("{}n{}", die_name, numa.id);
                let numa_node = Node::new(numa_name.clone(), Level::Numa, CpuSet::new());
                die_node.add_child(numa_node.clone());

                for cache in &numa.caches {
                    let cache_name = format!("{}${}", numa_name, cache.id);
                    let cache_node = Node::new(cache_name.clone(), Level::L2Cache, CpuSet::new());
                    numa_node.add_child(cache_node.clone());

                    for core_threads in &cache.cores {
                        let first_cpu = *core_threads.iter().min().expect(
                            "a physical core must list at least one hardware thread",
                        );
                        let core_name = format!("{}cpu{}", numa_name, first_cpu);
                        let core_node = Node::new(core_name.clone(), Level::Core, CpuSet::new());
                        cache_node.add_child(core_node.clone());

                        let mut threads: Vec<Cpu> = core_threads.clone();
                        threads.sort_unstable();
                        for cpu in threads {
                            let thread_name = format!("{}t{}", core_name, cpu);
                            let thread_node =
                                Node::new(thread_name, Level::Thread, CpuSet::new());
                            core_node.add_child(thread_node.clone());
                            thread_node.add_cpus(&CpuSet::singleton(cpu));
                        }
                    }
                }
            }
        }
    }
    root
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_input() -> TopologyInput {
        TopologyInput {
            packages: vec![PackageInput {
                id: 0,
                dies: vec![DieInput {
                    id: 0,
                    numas: vec![NumaInput {
                        id: 0,
                        caches: vec![
                            CacheInput {
                                id: 0,
                                cores: vec![vec![0, 1], vec![2, 3]],
                            },
                            CacheInput {
                                id: 1,
                                cores: vec![vec![4, 5], vec![6, 7]],
                            },
                        ],
                    }],
                }],
            }],
        }
    }

    #[test]
    fn names_follow_the_naming_contract() {
        let root = build_tree(&sample_input());
        assert_eq!(root.name(), "system");
        let package = &root.children()[0];
        assert_eq!(package.name(), "p0");
        let die = &package.children()[0];
        assert_eq!(die.name(), "p0d0");
        let numa = &die.children()[0];
        assert_eq!(numa.name(), "p0d0n0");
        let cache0 = &numa.children()[0];
        assert_eq!(cache0.name(), "p0d0n0$0");
        let core0 = &cache0.children()[0];
        assert_eq!(core0.name(), "p0d0n0cpu0");
        let thread0 = &core0.children()[0];
        assert_eq!(thread0.name(), "p0d0n0cpu0t0");
    }

    #[test]
    fn union_invariant_holds_after_construction() {
        let root = build_tree(&sample_input());
        assert_eq!(root.cpus().list(), (0..8).collect::<Vec<_>>());
        let numa = &root.children()[0].children()[0].children()[0];
        assert_eq!(numa.cpus().list(), (0..8).collect::<Vec<_>>());
        assert_eq!(numa.children()[0].cpus().list(), vec![0, 1, 2, 3]);
        assert_eq!(numa.children()[1].cpus().list(), vec![4, 5, 6, 7]);
    }
}
