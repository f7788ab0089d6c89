//! The allocator: binds a (possibly split) topology tree to resize
//! options and a device-hint cache, and answers `resize` calls.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::cpuset::{Cpu, CpuSet};
use crate::error::ResizeResult;
use crate::hints::{DeviceHintCache, HintProvider};
use crate::resize;
use crate::topology::level::Level;
use crate::topology::tree::Node;

/// Resize options. `device_update_on_every_cpu` is a callback, not data,
/// so it is excluded from (de)serialization; a host loading the rest of
/// this record from its own policy configuration file supplies the
/// callback programmatically.
#[derive(Clone, Serialize, Deserialize)]
pub struct Options {
    pub topology_balancing: bool,
    pub prefer_spread_on_physical_cores: bool,
    pub prefer_close_to_devices: Vec<String>,
    pub prefer_far_from_devices: Vec<String>,
    pub virt_dev_cpusets: Option<HashMap<String, Vec<CpuSet>>>,
    #[serde(skip)]
    pub device_update_on_every_cpu: Option<std::rc::Rc<dyn Fn(&CpuSet)>>,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            topology_balancing: false,
            prefer_spread_on_physical_cores: false,
            prefer_close_to_devices: Vec::new(),
            prefer_far_from_devices: Vec::new(),
            virt_dev_cpusets: None,
            device_update_on_every_cpu: None,
        }
    }
}

impl fmt::Debug for Options {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Options")
            .field("topology_balancing", &self.topology_balancing)
            .field(
                "prefer_spread_on_physical_cores",
                &self.prefer_spread_on_physical_cores,
            )
            .field("prefer_close_to_devices", &self.prefer_close_to_devices)
            .field("prefer_far_from_devices", &self.prefer_far_from_devices)
            .field("virt_dev_cpusets", &self.virt_dev_cpusets)
            .field(
                "device_update_on_every_cpu",
                &self.device_update_on_every_cpu.is_some(),
            )
            .finish()
    }
}

/// Binds a topology tree to options and a device-hint cache. Stateless
/// across `resize` calls except for the hint cache, which only grows.
pub struct Allocator {
    pub(crate) root: Node,
    pub(crate) options: Options,
    pub(crate) hints: DeviceHintCache,
}

impl Allocator {
    /// Builds an allocator over `root`. If
    /// `options.prefer_spread_on_physical_cores` is set, the working root
    /// is `root.split_level(Numa, classifier)` where `classifier(cpu)` is
    /// the sibling index of the thread leaf owning `cpu` in the
    /// *original* tree, grouping "first hyperthread of each core",
    /// "second hyperthread", etc. under distinct synthetic children.
    pub fn new(root: Node, options: Options, hint_provider: Option<Box<HintProvider>>) -> Allocator {
        let working_root = if options.prefer_spread_on_physical_cores {
            let original = root.clone();
            let classifier = move |cpu: Cpu| {
                original
                    .find_leaf_with_cpu(cpu)
                    .map(|leaf| leaf.sibling_index())
                    .unwrap_or(-2)
            };
            root.split_level(Level::Numa, &classifier)
        } else {
            root
        };
        let hints = DeviceHintCache::new(options.virt_dev_cpusets.clone(), hint_provider);
        Allocator {
            root: working_root,
            options,
            hints,
        }
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn root(&self) -> &Node {
        &self.root
    }

    /// Resizes a workload's CPU allocation by `delta`. Returns
    /// `(add_from, remove_from)`: the set to allocate from (when growing)
    /// and the set to reclaim from (when shrinking). One of the two is
    /// always empty; both may exceed `|delta|` in size, since the caller
    /// is free to apply a secondary tie-break among equally good CPUs.
    pub fn resize(&self, current: &CpuSet, free: &CpuSet, delta: i32) -> ResizeResult<(CpuSet, CpuSet)> {
        resize::run(self, current.clone(), free.clone(), delta)
    }
}
