/*
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

//! Locality-preserving order assignment.
//!
//! New ids are handed out by a depth-first walk over the merge forest.
//! Roots are visited heaviest-first; inside a tree the founding vertex of
//! a community is numbered before the communities that were merged into
//! it, which are themselves visited heaviest-first. Structurally close
//! vertices are therefore numbered consecutively, which is the whole
//! locality objective.
//!
//! The walk is fully deterministic for a given dendrogram: weight ties
//! among children break toward the more recently merged community and
//! then toward the lower vertex id, and root ties break toward the lower
//! vertex id.

use crate::dendrogram::Dendrogram;
use crate::graph::Graph;
use crate::perm::Permutation;

/// Computes the permutation (original id -> new id) induced by a
/// dendrogram over `graph`.
///
/// `graph` must be the graph the dendrogram was aggregated from; its
/// vertex strengths seed the root aggregate weights, while children are
/// weighed by the totals recorded at merge time.
pub fn assign_order(dendrogram: &Dendrogram, graph: &Graph) -> Permutation {
    assert_eq!(dendrogram.num_nodes(), graph.num_nodes());
    let num_nodes = graph.num_nodes();
    let forest = dendrogram.forest();

    // A child is frozen when it is merged, so its recorded merge-time
    // total is its final subtree weight; folding the recorded totals into
    // the parents yields every root's aggregate weight.
    let mut aggregate: Vec<u64> = (0..num_nodes).map(|v| graph.strength(v)).collect();
    let mut merge_weight: Vec<u64> = vec![0; num_nodes];
    let mut merge_seq: Vec<u64> = vec![0; num_nodes];
    for event in dendrogram.events() {
        aggregate[event.parent] += event.child_total;
        merge_weight[event.child] = event.child_total;
        merge_seq[event.child] = event.seq;
    }

    let mut roots: Vec<usize> = forest.roots().to_vec();
    roots.sort_unstable_by(|&a, &b| aggregate[b].cmp(&aggregate[a]).then_with(|| a.cmp(&b)));

    let mut perm = vec![usize::MAX; num_nodes];
    let mut next_id = 0;
    let mut stack = Vec::new();
    for root in roots {
        stack.push(root);
        while let Some(node) = stack.pop() {
            debug_assert_eq!(perm[node], usize::MAX);
            perm[node] = next_id;
            next_id += 1;
            let mut children = forest.children(node).to_vec();
            children.sort_unstable_by(|&a, &b| {
                merge_weight[b]
                    .cmp(&merge_weight[a])
                    .then_with(|| merge_seq[b].cmp(&merge_seq[a]))
                    .then_with(|| a.cmp(&b))
            });
            // Reversed so the heaviest child is popped first.
            stack.extend(children.into_iter().rev());
        }
    }
    debug_assert_eq!(next_id, num_nodes);

    Permutation::from_trusted(perm)
}
