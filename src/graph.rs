/*
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

//! A compact weighted adjacency structure, immutable after construction.
//!
//! The graph is stored in compressed sparse row form and is always
//! symmetrized: every input arc contributes its weight to the adjacency of
//! both endpoints, which is the undirected-equivalent treatment community
//! detection is defined on. Multi-arcs are coalesced by accumulating
//! weights, and a self-loop of weight *w* ends up stored once with weight
//! 2*w*, so that the [strength](Graph::strength) of a vertex always counts
//! both endpoints of every incident edge.

use thiserror::Error;

/// An arc with an integer weight, as supplied by the loader boundary.
pub type WeightedArc = (usize, usize, u64);

/// Errors that can occur while building a [`Graph`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    /// An edge references a vertex outside the declared vertex range.
    #[error("edge ({src}, {dst}) references a vertex out of range for {num_nodes} vertices")]
    MalformedInput {
        src: usize,
        dst: usize,
        num_nodes: usize,
    },

    /// The declared vertex count is zero.
    #[error("the graph has no vertices")]
    EmptyGraph,
}

/// An immutable weighted symmetric graph in CSR form.
pub struct Graph {
    offsets: Box<[usize]>,
    arcs: Box<[(usize, u64)]>,
    strengths: Box<[u64]>,
    /// Sum of the input edge weights, each edge counted once. This is the
    /// normalization constant of the modularity gain.
    total_weight: u64,
    directed: bool,
}

impl Graph {
    /// Builds a graph from a sequence of `(source, destination, weight)`
    /// triples.
    ///
    /// The adjacency is symmetrized regardless of `directed`: an arc always
    /// contributes its weight to both endpoints' incident totals, as
    /// modularity is defined on the undirected equivalent of the graph. The
    /// flag records the intent of the input and is carried through to the
    /// output stage.
    ///
    /// Vertex ids must lie in `[0, num_nodes)`; remapping sparse external
    /// id spaces is the loader's job, since the vertex count is declared at
    /// the input boundary. Unreferenced ids are isolated vertices.
    pub fn build(
        num_nodes: usize,
        arcs: impl IntoIterator<Item = WeightedArc>,
        directed: bool,
    ) -> Result<Self, GraphError> {
        if num_nodes == 0 {
            return Err(GraphError::EmptyGraph);
        }
        let mut sym = Vec::new();
        let mut total_weight = 0u64;
        for (src, dst, weight) in arcs {
            if src >= num_nodes || dst >= num_nodes {
                return Err(GraphError::MalformedInput {
                    src,
                    dst,
                    num_nodes,
                });
            }
            total_weight += weight;
            sym.push((src, dst, weight));
            sym.push((dst, src, weight));
        }
        Ok(Self::from_symmetric_arcs(
            num_nodes,
            sym,
            total_weight,
            directed,
        ))
    }

    /// Builds a graph from an already-symmetric arc multiset, without
    /// re-symmetrizing and without recomputing the normalization constant.
    ///
    /// Used by the aggregation engine when contracting a level graph: the
    /// contracted arcs are symmetric by construction and the normalization
    /// constant must stay that of the input graph.
    pub(crate) fn from_symmetric_arcs(
        num_nodes: usize,
        sym: Vec<WeightedArc>,
        total_weight: u64,
        directed: bool,
    ) -> Self {
        // Counting sort by source, then sort and coalesce each adjacency run.
        let mut degrees = vec![0usize; num_nodes];
        for &(src, _, _) in &sym {
            degrees[src] += 1;
        }
        let mut bounds = Vec::with_capacity(num_nodes + 1);
        bounds.push(0usize);
        for v in 0..num_nodes {
            bounds.push(bounds[v] + degrees[v]);
        }
        let mut placed = vec![(0usize, 0u64); sym.len()];
        let mut cursor = bounds[..num_nodes].to_vec();
        for (src, dst, weight) in sym {
            placed[cursor[src]] = (dst, weight);
            cursor[src] += 1;
        }

        let mut arcs = Vec::with_capacity(placed.len());
        let mut offsets = Vec::with_capacity(num_nodes + 1);
        let mut strengths = vec![0u64; num_nodes];
        offsets.push(0);
        for v in 0..num_nodes {
            let run = &mut placed[bounds[v]..bounds[v + 1]];
            run.sort_unstable_by_key(|&(dst, _)| dst);
            let mut iter = run.iter().copied();
            if let Some((mut cur_dst, mut cur_weight)) = iter.next() {
                for (dst, weight) in iter {
                    if dst == cur_dst {
                        cur_weight += weight;
                    } else {
                        arcs.push((cur_dst, cur_weight));
                        strengths[v] += cur_weight;
                        cur_dst = dst;
                        cur_weight = weight;
                    }
                }
                arcs.push((cur_dst, cur_weight));
                strengths[v] += cur_weight;
            }
            offsets.push(arcs.len());
        }

        Self {
            offsets: offsets.into_boxed_slice(),
            arcs: arcs.into_boxed_slice(),
            strengths: strengths.into_boxed_slice(),
            total_weight,
            directed,
        }
    }

    /// Returns the number of vertices.
    #[inline(always)]
    pub fn num_nodes(&self) -> usize {
        self.strengths.len()
    }

    /// Returns the number of stored (symmetrized, coalesced) arcs.
    #[inline(always)]
    pub fn num_arcs(&self) -> usize {
        self.arcs.len()
    }

    /// Returns the number of distinct neighbors of a vertex.
    #[inline(always)]
    pub fn degree(&self, node: usize) -> usize {
        self.offsets[node + 1] - self.offsets[node]
    }

    /// Returns the neighbors of a vertex as `(neighbor, weight)` pairs,
    /// sorted by neighbor id.
    #[inline(always)]
    pub fn successors(&self, node: usize) -> &[(usize, u64)] {
        &self.arcs[self.offsets[node]..self.offsets[node + 1]]
    }

    /// Returns the weighted degree of a vertex: the sum of the weights of
    /// its incident arcs, with self-loops counted twice.
    #[inline(always)]
    pub fn strength(&self, node: usize) -> u64 {
        self.strengths[node]
    }

    /// Returns the sum of the input edge weights, each edge counted once.
    #[inline(always)]
    pub fn total_weight(&self) -> u64 {
        self.total_weight
    }

    /// Returns whether the input declared itself as directed.
    #[inline(always)]
    pub fn is_directed(&self) -> bool {
        self.directed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn multi_arcs_are_coalesced() -> Result<(), GraphError> {
        let graph = Graph::build(3, [(0, 1, 1), (1, 0, 2), (0, 1, 3)], false)?;
        assert_eq!(graph.successors(0), &[(1, 6)]);
        assert_eq!(graph.successors(1), &[(0, 6)]);
        assert_eq!(graph.strength(0), 6);
        assert_eq!(graph.strength(2), 0);
        assert_eq!(graph.total_weight(), 6);
        Ok(())
    }

    #[test]
    fn self_loops_count_twice_in_strength() -> Result<(), GraphError> {
        let graph = Graph::build(2, [(0, 0, 3), (0, 1, 1)], false)?;
        assert_eq!(graph.successors(0), &[(0, 6), (1, 1)]);
        assert_eq!(graph.strength(0), 7);
        assert_eq!(graph.total_weight(), 4);
        Ok(())
    }

    #[test]
    fn out_of_range_edge_is_rejected() {
        let err = Graph::build(5, [(0, 10, 1)], false).err().unwrap();
        assert_eq!(
            err,
            GraphError::MalformedInput {
                src: 0,
                dst: 10,
                num_nodes: 5
            }
        );
    }

    #[test]
    fn zero_vertices_is_rejected() {
        let err = Graph::build(0, [], false).err().unwrap();
        assert_eq!(err, GraphError::EmptyGraph);
    }
}
