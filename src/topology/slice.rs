//! Flattening a tree into the per-node records the comparators consume.

use crate::cpuset::CpuSet;
use crate::topology::tree::Node;

/// One node's contribution to a resize decision, with the running counts
/// of every ancestor on the path from the root down to (and including)
/// this node.
#[derive(Clone)]
pub struct AttributedRecord {
    pub node: Node,
    pub depth: usize,
    pub current_cpus: CpuSet,
    pub free_cpus: CpuSet,
    pub current_count: usize,
    pub free_count: usize,
    pub current_counts_by_depth: Vec<usize>,
    pub free_counts_by_depth: Vec<usize>,
}

impl AttributedRecord {
    pub fn name(&self) -> String {
        self.node.name()
    }
}

/// Pre-order walk that, at each surviving node, intersects `current` and
/// `free` with the node's CPU set and extends the ancestor count vectors
/// by one entry. `filter` is applied before emission and before
/// descending: a rejected node and its whole subtree are skipped.
pub fn to_attributed_slice(
    root: &Node,
    current: &CpuSet,
    free: &CpuSet,
    filter: &dyn Fn(&AttributedRecord) -> bool,
) -> Vec<AttributedRecord> {
    let mut out = Vec::new();
    walk(root, current, free, &[], &[], filter, &mut out);
    out
}

fn walk(
    node: &Node,
    current: &CpuSet,
    free: &CpuSet,
    current_ancestors: &[usize],
    free_ancestors: &[usize],
    filter: &dyn Fn(&AttributedRecord) -> bool,
    out: &mut Vec<AttributedRecord>,
) {
    let node_cpus = node.cpus();
    let current_cpus = node_cpus.intersection(current);
    let free_cpus = node_cpus.intersection(free);
    let current_count = current_cpus.len();
    let free_count = free_cpus.len();

    let mut current_counts_by_depth = current_ancestors.to_vec();
    current_counts_by_depth.push(current_count);
    let mut free_counts_by_depth = free_ancestors.to_vec();
    free_counts_by_depth.push(free_count);

    let record = AttributedRecord {
        node: node.clone(),
        depth: node.depth(),
        current_cpus,
        free_cpus,
        current_count,
        free_count,
        current_counts_by_depth: current_counts_by_depth.clone(),
        free_counts_by_depth: free_counts_by_depth.clone(),
    };

    if !filter(&record) {
        return;
    }

    out.push(record);

    for child in node.children() {
        walk(
            &child,
            current,
            free,
            &current_counts_by_depth,
            &free_counts_by_depth,
            filter,
            out,
        );
    }
}
