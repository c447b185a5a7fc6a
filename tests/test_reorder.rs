/*
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

use anyhow::Result;
use graph_reorder::aggregation::ReorderConfig;
use graph_reorder::graph::{GraphError, WeightedArc};
use graph_reorder::perm::apply;
use graph_reorder::reorder;

const TRIANGLES: [WeightedArc; 6] = [
    (0, 1, 1),
    (1, 2, 1),
    (2, 0, 1),
    (3, 4, 1),
    (4, 5, 1),
    (5, 3, 1),
];

fn single_worker() -> ReorderConfig {
    ReorderConfig {
        num_workers: 1,
        ..ReorderConfig::default()
    }
}

/// Asserts that the new ids of `vertices` form a contiguous range.
fn assert_contiguous(new_ids: &mut Vec<usize>) {
    new_ids.sort_unstable();
    for window in new_ids.windows(2) {
        assert_eq!(window[1], window[0] + 1, "ids {:?} are interleaved", new_ids);
    }
}

#[test]
fn disjoint_triangles_get_contiguous_ranges() -> Result<()> {
    let perm = reorder(6, &TRIANGLES, &single_worker())?;

    let mut seen = vec![false; 6];
    for v in 0..6 {
        assert!(!seen[perm.get(v)]);
        seen[perm.get(v)] = true;
    }

    let mut first: Vec<usize> = (0..3).map(|v| perm.get(v)).collect();
    let mut second: Vec<usize> = (3..6).map(|v| perm.get(v)).collect();
    assert_contiguous(&mut first);
    assert_contiguous(&mut second);
    Ok(())
}

#[test]
fn single_worker_runs_are_reproducible() -> Result<()> {
    let first = reorder(6, &TRIANGLES, &single_worker())?;
    let second = reorder(6, &TRIANGLES, &single_worker())?;
    assert_eq!(first.as_slice(), second.as_slice());
    Ok(())
}

#[test]
fn empty_edge_list_keeps_the_vertex_count() -> Result<()> {
    let perm = reorder(5, &[], &single_worker())?;
    assert_eq!(perm.len(), 5);
    let mut seen = vec![false; 5];
    for v in 0..5 {
        assert!(!seen[perm.get(v)]);
        seen[perm.get(v)] = true;
    }
    Ok(())
}

#[test]
fn out_of_range_edge_fails_construction() {
    let err = reorder(5, &[(0, 10, 1)], &single_worker()).unwrap_err();
    assert_eq!(
        err.downcast::<GraphError>().unwrap(),
        GraphError::MalformedInput {
            src: 0,
            dst: 10,
            num_nodes: 5
        }
    );
}

#[test]
fn zero_vertices_fails_construction() {
    let err = reorder(0, &[], &single_worker()).unwrap_err();
    assert_eq!(err.downcast::<GraphError>().unwrap(), GraphError::EmptyGraph);
}

#[test]
fn applying_the_permutation_preserves_weights_and_order() -> Result<()> {
    let edges: Vec<WeightedArc> = vec![(0, 1, 7), (1, 2, 1), (2, 0, 3)];
    let perm = reorder(3, &edges, &single_worker())?;
    let permuted = apply(&edges, &perm)?;
    assert_eq!(permuted.len(), edges.len());
    for (before, after) in edges.iter().zip(&permuted) {
        assert_eq!(after.0, perm.get(before.0));
        assert_eq!(after.1, perm.get(before.1));
        assert_eq!(after.2, before.2);
    }
    Ok(())
}

#[test]
fn reordering_leaves_modularity_structure_intact() -> Result<()> {
    use graph_reorder::aggregation::{aggregate, modularity};
    use graph_reorder::graph::Graph;

    // Reordering is a relabeling: the permuted graph must have the same
    // optimal partition quality as the original.
    let graph = Graph::build(6, TRIANGLES, false)?;
    let aggregation = aggregate(&graph, &single_worker())?;
    let q_before = modularity(&graph, &aggregation.membership());

    let perm = reorder(6, &TRIANGLES, &single_worker())?;
    let permuted_edges = apply(&TRIANGLES, &perm)?;
    let permuted_graph = Graph::build(6, permuted_edges.iter().copied(), false)?;
    let permuted_aggregation = aggregate(&permuted_graph, &single_worker())?;
    let q_after = modularity(&permuted_graph, &permuted_aggregation.membership());

    assert!((q_before - q_after).abs() < 1e-9);
    Ok(())
}
