//! Strict weak orderings over attributed records: "which subtree should we
//! grow into" and "which subtree should we shrink out of".

use std::cmp::Ordering;

use crate::topology::slice::AttributedRecord;

fn by_depth_deepest_first(a: &AttributedRecord, b: &AttributedRecord) -> Ordering {
    b.depth.cmp(&a.depth)
}

fn by_ancestor_counts(
    a: &[usize],
    b: &[usize],
    prefer_higher: bool,
) -> Ordering {
    let len = a.len().min(b.len());
    for i in 0..len {
        let ord = if prefer_higher {
            b[i].cmp(&a[i])
        } else {
            a[i].cmp(&b[i])
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}

/// Smaller is a better candidate to allocate from. Prefers: deeper
/// subtrees; concentrating current allocation as high as possible;
/// matching the balancing goal on free-count headroom; then ascending
/// node name.
pub fn allocate_order(balancing: bool) -> impl Fn(&AttributedRecord, &AttributedRecord) -> Ordering {
    move |a, b| {
        by_depth_deepest_first(a, b)
            .then_with(|| {
                by_ancestor_counts(
                    &a.current_counts_by_depth,
                    &b.current_counts_by_depth,
                    true,
                )
            })
            .then_with(|| {
                by_ancestor_counts(&a.free_counts_by_depth, &b.free_counts_by_depth, balancing)
            })
            .then_with(|| a.name().cmp(&b.name()))
    }
}

/// Smaller is a better candidate to release from. Prefers: deeper
/// subtrees; minimizing remaining current allocation high in the tree;
/// lower free counts at higher levels — *regardless* of the balancing
/// flag, which this ordering does not consult (see the open question on
/// release/allocate asymmetry); then descending node name.
///
/// TODO: revisit whether release should mirror allocate's balancing-aware
/// free-count key instead of always preferring lower free counts.
pub fn release_order() -> impl Fn(&AttributedRecord, &AttributedRecord) -> Ordering {
    |a, b| {
        by_depth_deepest_first(a, b)
            .then_with(|| {
                by_ancestor_counts(
                    &a.current_counts_by_depth,
                    &b.current_counts_by_depth,
                    false,
                )
            })
            .then_with(|| {
                by_ancestor_counts(&a.free_counts_by_depth, &b.free_counts_by_depth, false)
            })
            .then_with(|| b.name().cmp(&a.name()))
    }
}
