/*
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

//! The merge history of an aggregation run.
//!
//! Community ids coincide with founding vertex ids and communities only
//! ever merge, so the whole history is a forest over `[0, N)` with the
//! original vertices as leaves. The authoritative record is an append-only
//! log of [`MergeEvent`]s in sequence order; a [`Forest`] with parent
//! pointers and child lists is derived from it for traversal.

/// One merge: community `child` was absorbed into community `parent`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeEvent {
    pub child: usize,
    pub parent: usize,
    /// Monotonically increasing stamp assigned at merge time.
    pub seq: u64,
    /// Total weight the child community carried when it was merged. Since
    /// a merged community never grows again, this is also the final
    /// aggregate weight of the child's subtree.
    pub child_total: u64,
}

/// The append-only log of merges recorded by the aggregation engine.
pub struct Dendrogram {
    num_nodes: usize,
    events: Vec<MergeEvent>,
}

impl Dendrogram {
    pub fn new(num_nodes: usize) -> Self {
        Self {
            num_nodes,
            events: Vec::new(),
        }
    }

    /// Appends a merge event. Events must be pushed in sequence order;
    /// the aggregation engine sorts each pass's events before appending.
    pub fn push(&mut self, event: MergeEvent) {
        debug_assert!(event.child < self.num_nodes);
        debug_assert!(event.parent < self.num_nodes);
        debug_assert!(
            self.events.last().is_none_or(|last| last.seq < event.seq),
            "merge events must be appended in sequence order"
        );
        self.events.push(event);
    }

    /// Returns the number of leaves (original vertices).
    #[inline(always)]
    pub fn num_nodes(&self) -> usize {
        self.num_nodes
    }

    /// Returns the number of recorded merges.
    #[inline(always)]
    pub fn num_merges(&self) -> usize {
        self.events.len()
    }

    /// Returns the number of final communities: every merge reduces the
    /// community count by exactly one.
    #[inline(always)]
    pub fn num_communities(&self) -> usize {
        self.num_nodes - self.events.len()
    }

    /// Returns the merge log in sequence order.
    #[inline(always)]
    pub fn events(&self) -> &[MergeEvent] {
        &self.events
    }

    /// Derives the read-only merge forest.
    pub fn forest(&self) -> Forest {
        let mut parent: Vec<usize> = (0..self.num_nodes).collect();
        let mut children = vec![Vec::new(); self.num_nodes];
        for event in &self.events {
            debug_assert_eq!(parent[event.child], event.child, "child merged twice");
            parent[event.child] = event.parent;
            children[event.parent].push(event.child);
        }
        let roots = (0..self.num_nodes).filter(|&c| parent[c] == c).collect();
        Forest {
            parent: parent.into_boxed_slice(),
            children: children.into_boxed_slice(),
            roots,
        }
    }

    /// Returns, for every original vertex, the root community it ends up
    /// in.
    pub fn membership(&self) -> Vec<usize> {
        self.forest().membership()
    }
}

/// A derived, read-only view of the merge forest.
pub struct Forest {
    parent: Box<[usize]>,
    /// Children of each node, in merge order.
    children: Box<[Vec<usize>]>,
    /// Nodes that were never merged into another community, in id order.
    roots: Vec<usize>,
}

impl Forest {
    #[inline(always)]
    pub fn num_nodes(&self) -> usize {
        self.parent.len()
    }

    #[inline(always)]
    pub fn roots(&self) -> &[usize] {
        &self.roots
    }

    /// Returns the communities merged into `node`, in merge order.
    #[inline(always)]
    pub fn children(&self, node: usize) -> &[usize] {
        &self.children[node]
    }

    /// Returns the root of the tree containing `node`.
    pub fn root_of(&self, mut node: usize) -> usize {
        while self.parent[node] != node {
            node = self.parent[node];
        }
        node
    }

    /// Returns the root community of every vertex, with memoization along
    /// the resolved paths.
    pub fn membership(&self) -> Vec<usize> {
        let mut root = vec![usize::MAX; self.parent.len()];
        let mut path = Vec::new();
        for v in 0..self.parent.len() {
            let mut cur = v;
            while root[cur] == usize::MAX && self.parent[cur] != cur {
                path.push(cur);
                cur = self.parent[cur];
            }
            let r = if root[cur] == usize::MAX { cur } else { root[cur] };
            root[v] = r;
            for &p in &path {
                root[p] = r;
            }
            path.clear();
        }
        root
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forest_tracks_merges() {
        let mut dendrogram = Dendrogram::new(5);
        dendrogram.push(MergeEvent {
            child: 0,
            parent: 1,
            seq: 0,
            child_total: 2,
        });
        dendrogram.push(MergeEvent {
            child: 1,
            parent: 3,
            seq: 1,
            child_total: 4,
        });
        assert_eq!(dendrogram.num_communities(), 3);

        let forest = dendrogram.forest();
        assert_eq!(forest.roots(), &[2, 3, 4]);
        assert_eq!(forest.children(1), &[0]);
        assert_eq!(forest.children(3), &[1]);
        assert_eq!(forest.root_of(0), 3);
        assert_eq!(dendrogram.membership(), vec![3, 3, 2, 3, 4]);
    }
}
