//! The topology tree: nodes linked by owning child lists and weak parent
//! back-references, per the design note on parent links outliving no one.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use crate::cpuset::{Cpu, CpuSet};
use crate::topology::level::Level;

struct NodeData {
    name: String,
    level: Level,
    parent: Option<Weak<RefCell<NodeData>>>,
    children: Vec<Node>,
    cpus: CpuSet,
}

/// A handle to one node of the topology tree. Cheap to clone (an `Rc`
/// clone); two handles compare equal by name, not by identity, mirroring
/// how the comparators and tests refer to nodes by their stable name.
#[derive(Clone)]
pub struct Node {
    inner: Rc<RefCell<NodeData>>,
}

/// What a [`Node::depth_first_walk`] handler wants to happen next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkControl {
    Continue,
    SkipChildren,
    Stop,
}

impl Node {
    pub fn new(name: impl Into<String>, level: Level, cpus: CpuSet) -> Node {
        Node {
            inner: Rc::new(RefCell::new(NodeData {
                name: name.into(),
                level,
                parent: None,
                children: Vec::new(),
                cpus,
            })),
        }
    }

    pub fn name(&self) -> String {
        self.inner.borrow().name.clone()
    }

    pub fn level(&self) -> Level {
        self.inner.borrow().level
    }

    pub fn cpus(&self) -> CpuSet {
        self.inner.borrow().cpus.clone()
    }

    pub fn children(&self) -> Vec<Node> {
        self.inner.borrow().children.clone()
    }

    pub fn parent(&self) -> Option<Node> {
        self.inner
            .borrow()
            .parent
            .as_ref()
            .and_then(|weak| weak.upgrade())
            .map(|inner| Node { inner })
    }

    /// Appends `child` to the children list and sets its parent link.
    pub fn add_child(&self, child: Node) {
        child.inner.borrow_mut().parent = Some(Rc::downgrade(&self.inner));
        self.inner.borrow_mut().children.push(child);
    }

    /// Unions `set` into this node's CPU set and recursively into every
    /// ancestor, maintaining the union invariant as leaves are populated.
    pub fn add_cpus(&self, set: &CpuSet) {
        self.inner.borrow_mut().cpus.union_in_place(set);
        if let Some(parent) = self.parent() {
            parent.add_cpus(set);
        }
    }

    /// Replaces the children list wholesale, fixing up parent links.
    pub fn set_children(&self, children: Vec<Node>) {
        for child in &children {
            child.inner.borrow_mut().parent = Some(Rc::downgrade(&self.inner));
        }
        self.inner.borrow_mut().children = children;
    }

    /// Distance to the root. `O(depth)`.
    pub fn depth(&self) -> usize {
        let mut depth = 0;
        let mut cur = self.parent();
        while let Some(node) = cur {
            depth += 1;
            cur = node.parent();
        }
        depth
    }

    /// Index among the parent's children. `-1` at the root, `-2` if the
    /// parent's child list does not contain this node (a diagnostic-only
    /// invariant violation; never a valid index).
    pub fn sibling_index(&self) -> i64 {
        match self.parent() {
            None => -1,
            Some(parent) => {
                let siblings = parent.children();
                siblings
                    .iter()
                    .position(|sibling| Rc::ptr_eq(&sibling.inner, &self.inner))
                    .map(|idx| idx as i64)
                    .unwrap_or_else(|| {
                        log::debug!(
                            "sibling_index: node {} not found among parent {}'s children",
                            self.name(),
                            parent.name()
                        );
                        -2
                    })
            }
        }
    }

    /// Depth-first search for the first leaf (a node with no children)
    /// whose CPU set contains `cpu`. `None` if absent.
    pub fn find_leaf_with_cpu(&self, cpu: Cpu) -> Option<Node> {
        if !self.cpus().contains(cpu) {
            return None;
        }
        let children = self.children();
        if children.is_empty() {
            return Some(self.clone());
        }
        for child in children {
            if let Some(found) = child.find_leaf_with_cpu(cpu) {
                return Some(found);
            }
        }
        None
    }

    /// For each level from this node's level to the deepest, the names of
    /// subtrees that intersect `set`, in pre-order.
    pub fn cpu_locations(&self, set: &CpuSet) -> Vec<String> {
        let mut names = Vec::new();
        self.collect_locations(set, &mut names);
        names
    }

    fn collect_locations(&self, set: &CpuSet, out: &mut Vec<String>) {
        if self.cpus().is_disjoint(set) {
            return;
        }
        out.push(self.name());
        for child in self.children() {
            child.collect_locations(set, out);
        }
    }

    /// Pre-order traversal. Returns `Ok(true)` if a handler requested
    /// `Stop` (the whole walk is aborted and the signal is propagated to
    /// the caller), `Ok(false)` if it ran to completion, or the first
    /// handler error, which also aborts the walk.
    pub fn depth_first_walk<E>(
        &self,
        handler: &mut impl FnMut(&Node) -> Result<WalkControl, E>,
    ) -> Result<bool, E> {
        match handler(self)? {
            WalkControl::Stop => Ok(true),
            WalkControl::SkipChildren => Ok(false),
            WalkControl::Continue => {
                for child in self.children() {
                    if child.depth_first_walk(handler)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
        }
    }

    /// Deep copy: children recursively, names/levels/CPU sets preserved,
    /// parent links re-established from the new root down.
    pub fn copy_tree(&self) -> Node {
        let copy = Node::new(self.name(), self.level(), self.cpus());
        let children: Vec<Node> = self.children().iter().map(|c| c.copy_tree()).collect();
        copy.set_children(children);
        copy
    }

    /// Replaces every node at `target_level` with a fanout of synthetic
    /// children, one per distinct class returned by `classifier` over the
    /// node's CPUs. Under each synthetic child the original subtree is
    /// duplicated with every node's CPU set intersected with the class's
    /// mask; subtrees that become empty are pruned.
    pub fn split_level(&self, target_level: Level, classifier: &dyn Fn(Cpu) -> i64) -> Node {
        if self.level() == target_level {
            let cpus = self.cpus();
            let mut classes: Vec<i64> = cpus.list().iter().map(|&c| classifier(c)).collect();
            classes.sort_unstable();
            classes.dedup();

            let new_node = Node::new(self.name(), self.level(), cpus.clone());
            let mut synthetic_children = Vec::with_capacity(classes.len());
            for class in classes {
                let mask =
                    CpuSet::from_iter(cpus.list().into_iter().filter(|&c| classifier(c) == class));
                let synthetic = Node::new(format!("{}~{}", self.name(), class), self.level(), mask.clone());
                let duplicated: Vec<Node> = self
                    .children()
                    .iter()
                    .filter_map(|child| duplicate_masked(child, &mask))
                    .collect();
                synthetic.set_children(duplicated);
                synthetic_children.push(synthetic);
            }
            new_node.set_children(synthetic_children);
            new_node
        } else {
            let new_node = Node::new(self.name(), self.level(), self.cpus());
            let children: Vec<Node> = self
                .children()
                .iter()
                .map(|c| c.split_level(target_level, classifier))
                .collect();
            new_node.set_children(children);
            new_node
        }
    }
}

/// Duplicates `node` and its descendants, intersecting every CPU set with
/// `mask`. Returns `None` if the intersection is empty (the subtree is
/// pruned).
fn duplicate_masked(node: &Node, mask: &CpuSet) -> Option<Node> {
    let cpus = node.cpus().intersection(mask);
    if cpus.is_empty() {
        return None;
    }
    let new_node = Node::new(node.name(), node.level(), cpus);
    let children: Vec<Node> = node
        .children()
        .iter()
        .filter_map(|child| duplicate_masked(child, mask))
        .collect();
    new_node.set_children(children);
    Some(new_node)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(name: &str, cpu: Cpu) -> Node {
        Node::new(name, Level::Thread, CpuSet::singleton(cpu))
    }

    fn small_tree() -> Node {
        let root = Node::new("system", Level::System, CpuSet::new());
        let core0 = Node::new("core0", Level::Core, CpuSet::new());
        core0.add_child(leaf("core0t0", 0));
        core0.add_child(leaf("core0t1", 1));
        let core1 = Node::new("core1", Level::Core, CpuSet::new());
        core1.add_child(leaf("core1t2", 2));
        core1.add_child(leaf("core1t3", 3));
        root.add_child(core0);
        root.add_child(core1);
        for cpu in 0..4 {
            root.add_cpus(&CpuSet::singleton(cpu));
        }
        root
    }

    #[test]
    fn add_cpus_maintains_union_invariant() {
        let root = small_tree();
        assert_eq!(root.cpus().list(), vec![0, 1, 2, 3]);
        assert_eq!(root.children()[0].cpus().list(), vec![0, 1]);
        assert_eq!(root.children()[1].cpus().list(), vec![2, 3]);
    }

    #[test]
    fn depth_and_sibling_index() {
        let root = small_tree();
        assert_eq!(root.depth(), 0);
        assert_eq!(root.sibling_index(), -1);
        let core1 = root.children().into_iter().nth(1).unwrap();
        assert_eq!(core1.depth(), 1);
        assert_eq!(core1.sibling_index(), 1);
        let thread = core1.children().into_iter().next().unwrap();
        assert_eq!(thread.depth(), 2);
        assert_eq!(thread.sibling_index(), 0);
    }

    #[test]
    fn find_leaf_with_cpu_locates_exact_thread() {
        let root = small_tree();
        let found = root.find_leaf_with_cpu(2).unwrap();
        assert_eq!(found.name(), "core1t2");
        assert!(root.find_leaf_with_cpu(99).is_none());
    }

    #[test]
    fn cpu_locations_names_every_intersecting_subtree() {
        let root = small_tree();
        let set: CpuSet = "1,2".parse().unwrap();
        // cpu 1 is under core0, cpu 2 under core1: both cores and both
        // their owning threads intersect, core0t0/core1t3 do not.
        assert_eq!(
            root.cpu_locations(&set),
            vec!["system", "core0", "core0t1", "core1", "core1t2"]
        );
        assert!(root.cpu_locations(&CpuSet::new()).is_empty());
    }

    #[test]
    fn walk_respects_skip_and_stop() {
        let root = small_tree();
        let mut visited = Vec::new();
        let stopped = root
            .depth_first_walk::<()>(&mut |node| {
                visited.push(node.name());
                if node.name() == "core0" {
                    Ok(WalkControl::SkipChildren)
                } else {
                    Ok(WalkControl::Continue)
                }
            })
            .unwrap();
        assert!(!stopped);
        assert_eq!(visited, vec!["system", "core0", "core1", "core1t2", "core1t3"]);

        let mut visited = Vec::new();
        let stopped = root
            .depth_first_walk::<()>(&mut |node| {
                visited.push(node.name());
                if node.name() == "core0t1" {
                    Ok(WalkControl::Stop)
                } else {
                    Ok(WalkControl::Continue)
                }
            })
            .unwrap();
        assert!(stopped);
        assert_eq!(visited, vec!["system", "core0", "core0t0", "core0t1"]);
    }

    #[test]
    fn copy_tree_preserves_structure_and_is_independent() {
        let root = small_tree();
        let copy = root.copy_tree();
        assert_eq!(copy.cpus().list(), root.cpus().list());
        assert_eq!(copy.children().len(), root.children().len());
        assert_eq!(copy.children()[0].parent().unwrap().name(), "system");

        // Mutating the copy must not affect the original (structural copy).
        copy.children()[0].add_cpus(&CpuSet::singleton(40));
        assert!(copy.cpus().contains(40));
        assert!(!root.cpus().contains(40));
    }

    #[test]
    fn split_level_separates_hyperthread_classes() {
        let root = small_tree();
        let original = root.clone();
        let classifier = move |cpu: Cpu| {
            original
                .find_leaf_with_cpu(cpu)
                .map(|leaf| leaf.sibling_index())
                .unwrap_or(-2)
        };
        let split = root.split_level(Level::Core, &classifier);

        // core0 and core1 each become shells over two synthetic classes.
        let core0_split = split.children().into_iter().find(|n| n.name() == "core0").unwrap();
        let class_names: Vec<String> = core0_split.children().iter().map(|n| n.name()).collect();
        assert_eq!(class_names, vec!["core0~0", "core0~1"]);
        let class0 = &core0_split.children()[0];
        assert_eq!(class0.cpus().list(), vec![0]);
        let class1 = &core0_split.children()[1];
        assert_eq!(class1.cpus().list(), vec![1]);

        // the split's root still unions to the same full CPU set.
        assert_eq!(split.cpus().list(), root.cpus().list());
    }
}
