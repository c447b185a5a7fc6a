/*
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

//! The concurrent community structure.
//!
//! Communities are identified by the id of their founding vertex and live
//! in a flat arena of slots. Each slot carries a parent pointer forming a
//! union-find-like forest (a community is *live* while its parent points to
//! itself), a pair of weight accumulators, and a merge lock. [`find`]
//! is lock-free; [`try_merge`] is the only mutating operation and the only
//! one that takes locks, always in ascending id order so that concurrent
//! merges cannot deadlock.
//!
//! This structure is the only shared-mutable state of the aggregation
//! engine: everything else workers touch is thread-local.
//!
//! [`find`]: CommunityStore::find
//! [`try_merge`]: CommunityStore::try_merge

use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use crate::graph::Graph;

struct CommunitySlot {
    merge_lock: Mutex<()>,
    /// Points to the community this one was merged into; to itself while
    /// the community is live. Only ever rewritten while `merge_lock` is
    /// held, but read without it.
    parent: AtomicUsize,
    /// Weight of the arcs internal to the community, in symmetrized arc
    /// units (each internal edge counted in both directions).
    internal: AtomicU64,
    /// Total incident weight of the community's vertices.
    total: AtomicU64,
}

/// A dynamic vertex-to-community map with fine-grained locking.
pub struct CommunityStore {
    slots: Box<[CommunitySlot]>,
}

impl CommunityStore {
    /// Creates one singleton community per vertex of the given graph.
    ///
    /// The initial total of community `v` is the strength of `v`, and the
    /// initial internal weight is the weight of its self-loop, so the
    /// constructor is also correct for the contracted graphs of later
    /// aggregation passes, whose self-loops carry intra-community weight.
    pub fn new(graph: &Graph) -> Self {
        let slots = (0..graph.num_nodes())
            .map(|v| {
                let self_loop = graph
                    .successors(v)
                    .iter()
                    .find(|&&(dst, _)| dst == v)
                    .map_or(0, |&(_, weight)| weight);
                CommunitySlot {
                    merge_lock: Mutex::new(()),
                    parent: AtomicUsize::new(v),
                    internal: AtomicU64::new(self_loop),
                    total: AtomicU64::new(graph.strength(v)),
                }
            })
            .collect();
        Self { slots }
    }

    /// Returns the number of community slots.
    #[inline(always)]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Returns the live community a vertex currently belongs to.
    ///
    /// Lock-free, with path halving: chains left behind by merges are
    /// shortened as they are traversed. The result may be stale by the time
    /// it is used; callers that merge must revalidate through
    /// [`try_merge`](CommunityStore::try_merge).
    pub fn find(&self, vertex: usize) -> usize {
        let mut cur = vertex;
        loop {
            let parent = self.slots[cur].parent.load(Ordering::Acquire);
            if parent == cur {
                return cur;
            }
            let grandparent = self.slots[parent].parent.load(Ordering::Acquire);
            if grandparent != parent {
                // Halving is a best-effort shortcut; a lost race is fine.
                let _ = self.slots[cur].parent.compare_exchange_weak(
                    parent,
                    grandparent,
                    Ordering::AcqRel,
                    Ordering::Relaxed,
                );
            }
            cur = parent;
        }
    }

    /// Returns whether a community id is currently a live root.
    #[inline(always)]
    pub fn is_root(&self, community: usize) -> bool {
        self.slots[community].parent.load(Ordering::Acquire) == community
    }

    /// Returns the `(internal, total)` weight pair of a community.
    ///
    /// The values are a consistent snapshot only for live roots read by the
    /// thread that holds their merge lock; elsewhere they are advisory.
    #[inline(always)]
    pub fn weight(&self, community: usize) -> (u64, u64) {
        (
            self.slots[community].internal.load(Ordering::Relaxed),
            self.slots[community].total.load(Ordering::Relaxed),
        )
    }

    /// Returns the number of live communities.
    pub fn num_roots(&self) -> usize {
        (0..self.slots.len()).filter(|&c| self.is_root(c)).count()
    }

    /// Merges community `src` into community `dst`, folding `src`'s weight
    /// accumulators plus `cross_weight` (the arc weight between the two
    /// communities known to the caller, in symmetrized arc units) into
    /// `dst`.
    ///
    /// Returns the total weight `src` carried at the moment of the merge,
    /// or `None` if either side was no longer a live root, in which case
    /// nothing is modified and the caller is expected to re-read
    /// [`find`](CommunityStore::find) and retry.
    pub fn try_merge(&self, src: usize, dst: usize, cross_weight: u64) -> Option<u64> {
        if src == dst {
            return None;
        }
        let (first, second) = if src < dst { (src, dst) } else { (dst, src) };
        // A poisoned lock only means another worker panicked mid-merge
        // while not holding any partial state; the guard data is ().
        let _first = self.slots[first]
            .merge_lock
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        let _second = self.slots[second]
            .merge_lock
            .lock()
            .unwrap_or_else(|e| e.into_inner());

        // Parents change only under the merge lock, so the roots are stable
        // from here to the end of the merge.
        if !self.is_root(src) || !self.is_root(dst) {
            return None;
        }

        let src_internal = self.slots[src].internal.load(Ordering::Relaxed);
        let src_total = self.slots[src].total.load(Ordering::Relaxed);
        self.slots[dst]
            .internal
            .fetch_add(src_internal + cross_weight, Ordering::Relaxed);
        self.slots[dst].total.fetch_add(src_total, Ordering::Relaxed);
        self.slots[src].parent.store(dst, Ordering::Release);
        Some(src_total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triangle() -> Graph {
        Graph::build(3, [(0, 1, 1), (1, 2, 1), (2, 0, 1)], false).unwrap()
    }

    #[test]
    fn singletons_at_construction() {
        let store = CommunityStore::new(&triangle());
        for v in 0..3 {
            assert_eq!(store.find(v), v);
            assert_eq!(store.weight(v), (0, 2));
        }
        assert_eq!(store.num_roots(), 3);
    }

    #[test]
    fn merge_relabels_and_folds_weights() {
        let store = CommunityStore::new(&triangle());
        assert_eq!(store.try_merge(0, 1, 2), Some(2));
        assert_eq!(store.find(0), 1);
        assert_eq!(store.find(1), 1);
        assert_eq!(store.weight(1), (2, 4));
        assert_eq!(store.num_roots(), 2);
    }

    #[test]
    fn stale_source_is_rejected() {
        let store = CommunityStore::new(&triangle());
        assert!(store.try_merge(0, 1, 2).is_some());
        // 0 is no longer a live root.
        assert_eq!(store.try_merge(0, 2, 2), None);
        assert_eq!(store.try_merge(2, 0, 2), None);
        assert_eq!(store.try_merge(0, 0, 0), None);
        // The failed attempts must not have touched any accumulator.
        assert_eq!(store.weight(2), (0, 2));
    }

    #[test]
    fn chains_resolve_to_the_last_root() {
        let store = CommunityStore::new(&triangle());
        assert!(store.try_merge(0, 1, 2).is_some());
        assert!(store.try_merge(1, 2, 4).is_some());
        assert_eq!(store.find(0), 2);
        assert_eq!(store.find(1), 2);
        assert_eq!(store.weight(2), (6, 6));
        assert_eq!(store.num_roots(), 1);
    }
}
