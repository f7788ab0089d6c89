//! Device topology hints: CPU sets "close to" a device path, cached by
//! path and resolved lazily via an external provider.

use std::cell::RefCell;
use std::collections::HashMap;

use crate::cpuset::CpuSet;

/// A hint provider resolves a device path to a priority-ordered list of
/// "close" CPU sets (earlier entries are stronger hints). Errors are
/// non-fatal: the caller degrades to an empty hint list for that path.
pub type HintProvider = dyn Fn(&str) -> Result<Vec<CpuSet>, String>;

/// Cache of device path to its prioritized list of close CPU sets.
///
/// When `virt_dev_cpusets` is supplied at construction, it stands in for
/// the whole cache: lookups never consult the provider, and a path
/// missing from the map simply resolves to no hints. Otherwise, a miss
/// queries the provider once and caches the result (or an empty list on
/// provider failure) so the failure is only logged once per path.
pub struct DeviceHintCache {
    provider: Option<Box<HintProvider>>,
    entries: RefCell<HashMap<String, Vec<CpuSet>>>,
    virt_only: bool,
}

impl DeviceHintCache {
    pub fn new(
        virt_dev_cpusets: Option<HashMap<String, Vec<CpuSet>>>,
        provider: Option<Box<HintProvider>>,
    ) -> Self {
        match virt_dev_cpusets {
            Some(map) => DeviceHintCache {
                provider: None,
                entries: RefCell::new(map),
                virt_only: true,
            },
            None => DeviceHintCache {
                provider,
                entries: RefCell::new(HashMap::new()),
                virt_only: false,
            },
        }
    }

    /// Topology hints "close to" `path`, in provider priority order.
    pub fn topology_hint_cpus(&self, path: &str) -> Vec<CpuSet> {
        if let Some(existing) = self.entries.borrow().get(path) {
            return existing.clone();
        }
        if self.virt_only {
            return Vec::new();
        }
        let resolved = match &self.provider {
            Some(provider) => match provider(path) {
                Ok(hints) => hints,
                Err(err) => {
                    log::warn!(
                        "device hint provider failed for {path}: {err}; caching empty hint set"
                    );
                    Vec::new()
                }
            },
            None => Vec::new(),
        };
        self.entries
            .borrow_mut()
            .insert(path.to_string(), resolved.clone());
        resolved
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    #[test]
    fn virt_map_never_calls_provider() {
        let mut map = HashMap::new();
        map.insert("/devA".to_string(), vec!["4-5".parse().unwrap()]);
        let cache = DeviceHintCache::new(Some(map), None);
        assert_eq!(cache.topology_hint_cpus("/devA")[0].list(), vec![4, 5]);
        assert!(cache.topology_hint_cpus("/devB").is_empty());
    }

    #[test]
    fn provider_failure_caches_empty_and_only_logs_once() {
        let calls = Rc::new(Cell::new(0));
        let calls_clone = calls.clone();
        let provider: Box<HintProvider> = Box::new(move |_path| {
            calls_clone.set(calls_clone.get() + 1);
            Err("no such device".to_string())
        });
        let cache = DeviceHintCache::new(None, Some(provider));
        assert!(cache.topology_hint_cpus("/devA").is_empty());
        assert!(cache.topology_hint_cpus("/devA").is_empty());
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn provider_success_is_cached() {
        let calls = Rc::new(Cell::new(0));
        let calls_clone = calls.clone();
        let provider: Box<HintProvider> = Box::new(move |_path| {
            calls_clone.set(calls_clone.get() + 1);
            Ok(vec!["0-1".parse().unwrap()])
        });
        let cache = DeviceHintCache::new(None, Some(provider));
        assert_eq!(cache.topology_hint_cpus("/devA")[0].list(), vec![0, 1]);
        assert_eq!(cache.topology_hint_cpus("/devA")[0].list(), vec![0, 1]);
        assert_eq!(calls.get(), 1);
    }
}
