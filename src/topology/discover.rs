//! Hardware topology discovery via hwloc2.
//!
//! Grounded in the teacher crate's `MachineTopology::new()`: walk every
//! processing unit and climb parent links to classify its enclosing
//! core, L2 cache, package and NUMA node. Unlike the teacher, which
//! assembles a flat `Vec<CpuInfo>` for benchmark placement, this module
//! assembles the full tree of [`crate::topology::tree::Node`] and names
//! every node per the naming contract, because the comparators tie-break
//! on those names.

use std::collections::BTreeMap;

use hwloc2::{ObjectType, Topology};

use crate::cpuset::Cpu;
use crate::error::AllocatorError;
use crate::topology::input::{CacheInput, DieInput, NumaInput, PackageInput, TopologyInput};
use crate::topology::tree::Node;

/// Discovers the machine's topology and builds the corresponding tree.
pub fn discover() -> Result<Node, AllocatorError> {
    let input = discover_input()?;
    Ok(crate::topology::input::build_tree(&input))
}

/// Produces a [`TopologyInput`] by walking hwloc's object tree, exposed
/// separately from [`discover`] so a caller can inspect or adjust the
/// descriptor (e.g. to apply a manual override) before building the tree.
pub fn discover_input() -> Result<TopologyInput, AllocatorError> {
    log::debug!("discovering hardware topology via hwloc");
    let topo = Topology::new().ok_or_else(|| {
        let err = AllocatorError::TopologyDiscoveryFailed("hwloc failed to initialize a topology".into());
        log::error!("{err}");
        err
    })?;
    let cpus = topo.objects_with_type(&ObjectType::PU).map_err(|err| {
        let err = AllocatorError::TopologyDiscoveryFailed(format!("hwloc could not enumerate PUs: {err:?}"));
        log::error!("{err}");
        err
    })?;
    if cpus.is_empty() {
        let err = AllocatorError::TopologyDiscoveryFailed(
            "hwloc reported zero processing units".into(),
        );
        log::error!("{err}");
        return Err(err);
    }

    // package id -> numa id -> cache id -> core-representative cpu -> thread cpus
    let mut packages: BTreeMap<u32, BTreeMap<u32, BTreeMap<u32, BTreeMap<Cpu, Vec<Cpu>>>>> =
        BTreeMap::new();

    for cpu in cpus {
        let cpu_id = cpu.os_index() as Cpu;
        let mut parent = cpu.parent();

        while parent.is_some() && parent.unwrap().object_type() != ObjectType::Core {
            parent = parent.unwrap().parent();
        }
        let core = parent.ok_or_else(|| {
            let err = AllocatorError::TopologyDiscoveryFailed(format!(
                "cpu {cpu_id} has no enclosing physical core"
            ));
            log::error!("{err}");
            err
        })?;
        let core_rep = core
            .first_child()
            .map(|c| c.os_index() as Cpu)
            .unwrap_or(cpu_id);

        while parent.is_some()
            && (parent.unwrap().object_type() != ObjectType::L2Cache
                || parent
                    .unwrap()
                    .cache_attributes()
                    .map(|a| a.depth())
                    .unwrap_or(0)
                    < 2)
        {
            parent = parent.unwrap().parent();
        }
        let cache_id = parent.map(|l2| l2.logical_index()).unwrap_or(0);

        while parent.is_some() && parent.unwrap().object_type() != ObjectType::NUMANode {
            parent = parent.unwrap().parent();
        }
        let numa_id = parent.map(|n| n.os_index()).unwrap_or(0);

        while parent.is_some() && parent.unwrap().object_type() != ObjectType::Package {
            parent = parent.unwrap().parent();
        }
        let package_id = parent.map(|p| p.logical_index()).unwrap_or(0);

        packages
            .entry(package_id)
            .or_default()
            .entry(numa_id)
            .or_default()
            .entry(cache_id)
            .or_default()
            .entry(core_rep)
            .or_default()
            .push(cpu_id);
    }

    let packages = packages
        .into_iter()
        .map(|(package_id, numas)| PackageInput {
            id: package_id,
            // hwloc does not expose a distinct "die" level on every
            // platform; this crate treats the package as a single die,
            // which keeps the naming contract intact (`p<id>d0n<id>`).
            dies: vec![DieInput {
                id: 0,
                numas: numas
                    .into_iter()
                    .map(|(numa_id, caches)| NumaInput {
                        id: numa_id,
                        caches: caches
                            .into_iter()
                            .map(|(cache_id, cores)| CacheInput {
                                id: cache_id,
                                cores: cores.into_values().collect(),
                            })
                            .collect(),
                    })
                    .collect(),
            }],
        })
        .collect();

    log::debug!("topology discovery complete: {} package(s)", packages.len());
    Ok(TopologyInput { packages })
}
