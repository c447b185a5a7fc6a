/*
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

#![doc = include_str!("../README.md")]
#![deny(unstable_features)]
#![deny(trivial_casts)]
#![deny(unconditional_recursion)]
#![deny(clippy::empty_loop)]
#![deny(unreachable_code)]
#![deny(unreachable_patterns)]
#![deny(unused_macro_rules)]
#![deny(unused_doc_comments)]

pub mod aggregation;
pub mod community;
pub mod dendrogram;
pub mod edge_list;
pub mod graph;
pub mod order;
pub mod perm;

pub mod prelude {
    pub use crate::aggregation::{Aggregation, AggregationStatus, ReorderConfig, aggregate};
    pub use crate::dendrogram::Dendrogram;
    pub use crate::graph::{Graph, GraphError, WeightedArc};
    pub use crate::order::assign_order;
    pub use crate::perm::{PermError, Permutation, apply};
    pub use crate::reorder;
}

use anyhow::Result;

use crate::aggregation::ReorderConfig;
use crate::graph::{Graph, WeightedArc};
use crate::perm::Permutation;

/// Computes a locality-preserving vertex permutation for the given edges.
///
/// Convenience entry point wiring graph construction, community
/// aggregation, and order assignment together. Callers that need the
/// dendrogram, the aggregation status, or the final membership should use
/// [`aggregation::aggregate`] and [`order::assign_order`] directly.
pub fn reorder(
    num_nodes: usize,
    edges: &[WeightedArc],
    config: &ReorderConfig,
) -> Result<Permutation> {
    let graph = Graph::build(num_nodes, edges.iter().copied(), config.directed)?;
    let aggregation = aggregation::aggregate(&graph, config)?;
    if aggregation.is_partial() {
        log::warn!(
            "Aggregation did not run to convergence ({:?}); the permutation reflects a partial community structure",
            aggregation.status()
        );
    }
    Ok(order::assign_order(aggregation.dendrogram(), &graph))
}
