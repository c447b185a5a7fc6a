/*
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use anyhow::Result;
use graph_reorder::aggregation::{AggregationStatus, ReorderConfig, aggregate, modularity};
use graph_reorder::graph::{Graph, WeightedArc};
use graph_reorder::order::assign_order;

fn two_triangles() -> Graph {
    Graph::build(
        6,
        [(0, 1, 1), (1, 2, 1), (2, 0, 1), (3, 4, 1), (4, 5, 1), (5, 3, 1)],
        false,
    )
    .unwrap()
}

/// A ring of `cliques` cliques of `size` vertices, consecutive cliques
/// joined by a single edge. A classic graph with an unambiguous community
/// structure.
fn clique_ring(cliques: usize, size: usize) -> Graph {
    let mut edges: Vec<WeightedArc> = Vec::new();
    for c in 0..cliques {
        let base = c * size;
        for i in 0..size {
            for j in (i + 1)..size {
                edges.push((base + i, base + j, 1));
            }
        }
        let next_base = ((c + 1) % cliques) * size;
        edges.push((base, next_base, 1));
    }
    Graph::build(cliques * size, edges, false).unwrap()
}

fn single_worker() -> ReorderConfig {
    ReorderConfig {
        num_workers: 1,
        ..ReorderConfig::default()
    }
}

#[test]
fn two_triangles_converge_to_two_communities() -> Result<()> {
    let graph = two_triangles();
    let aggregation = aggregate(&graph, &single_worker())?;

    assert_eq!(aggregation.status(), AggregationStatus::Converged);
    assert!(!aggregation.is_partial());
    // One merging pass plus the pass that observes the fixpoint.
    assert_eq!(aggregation.passes(), 2);
    assert_eq!(aggregation.num_communities(), 2);

    let membership = aggregation.membership();
    assert_eq!(membership[0], membership[1]);
    assert_eq!(membership[1], membership[2]);
    assert_eq!(membership[3], membership[4]);
    assert_eq!(membership[4], membership[5]);
    assert_ne!(membership[0], membership[3]);

    // The optimal partition of two disjoint triangles has modularity 1/2.
    assert!((modularity(&graph, &membership) - 0.5).abs() < 1e-9);
    Ok(())
}

#[test]
fn merge_log_is_consistent() -> Result<()> {
    let graph = clique_ring(4, 4);
    let aggregation = aggregate(&graph, &single_worker())?;
    let dendrogram = aggregation.dendrogram();

    assert_eq!(
        dendrogram.num_merges(),
        graph.num_nodes() - aggregation.num_communities()
    );
    for window in dendrogram.events().windows(2) {
        assert!(window[0].seq < window[1].seq);
    }
    // Each vertex belongs to exactly one final community.
    let membership = aggregation.membership();
    assert_eq!(membership.len(), graph.num_nodes());
    for (v, &root) in membership.iter().enumerate() {
        assert!(root < graph.num_nodes(), "vertex {} has invalid root", v);
    }
    Ok(())
}

#[test]
fn worker_counts_agree_on_quality() -> Result<()> {
    let graph = clique_ring(8, 5);
    let reference = aggregate(&graph, &single_worker())?;
    let reference_q = modularity(&graph, &reference.membership());
    assert!(reference_q > 0.5);

    for workers in [1, 2, 8] {
        let config = ReorderConfig {
            num_workers: workers,
            ..ReorderConfig::default()
        };
        let aggregation = aggregate(&graph, &config)?;
        let membership = aggregation.membership();
        assert_eq!(membership.len(), graph.num_nodes());

        let perm = assign_order(aggregation.dendrogram(), &graph);
        let mut seen = vec![false; graph.num_nodes()];
        for v in 0..graph.num_nodes() {
            assert!(!seen[perm.get(v)], "{} workers: not a bijection", workers);
            seen[perm.get(v)] = true;
        }

        let q = modularity(&graph, &membership);
        assert!(
            (q - reference_q).abs() < 0.1,
            "{} workers: modularity {} too far from single-threaded {}",
            workers,
            q,
            reference_q
        );
    }
    Ok(())
}

#[test]
fn stop_flag_yields_partial_result() -> Result<()> {
    let graph = two_triangles();
    let stop = Arc::new(AtomicBool::new(true));
    let config = ReorderConfig {
        num_workers: 1,
        stop: Some(stop),
        ..ReorderConfig::default()
    };
    let aggregation = aggregate(&graph, &config)?;

    assert_eq!(aggregation.status(), AggregationStatus::Cancelled);
    assert!(aggregation.is_partial());
    assert_eq!(aggregation.passes(), 0);
    assert_eq!(aggregation.num_communities(), graph.num_nodes());

    // The dendrogram is empty but still yields a valid permutation: with
    // all strengths equal, the tie-breaks make it the identity.
    let perm = assign_order(aggregation.dendrogram(), &graph);
    assert_eq!(perm.as_slice(), &[0, 1, 2, 3, 4, 5]);
    Ok(())
}

#[test]
fn pass_cap_is_reported() -> Result<()> {
    let graph = two_triangles();
    let config = ReorderConfig {
        num_workers: 1,
        max_passes: 1,
        ..ReorderConfig::default()
    };
    let aggregation = aggregate(&graph, &config)?;
    assert_eq!(aggregation.status(), AggregationStatus::ReachedMaxPasses);
    assert!(aggregation.is_partial());
    assert_eq!(aggregation.passes(), 1);
    // The single pass still merged the triangles.
    assert_eq!(aggregation.num_communities(), 2);
    Ok(())
}

#[test]
fn prohibitive_gain_threshold_merges_nothing() -> Result<()> {
    let graph = two_triangles();
    let config = ReorderConfig {
        num_workers: 1,
        min_gain_threshold: 1.0,
        ..ReorderConfig::default()
    };
    let aggregation = aggregate(&graph, &config)?;
    assert_eq!(aggregation.status(), AggregationStatus::Converged);
    assert_eq!(aggregation.passes(), 1);
    assert_eq!(aggregation.num_communities(), graph.num_nodes());
    Ok(())
}

#[test]
fn edgeless_graph_converges_immediately() -> Result<()> {
    let graph = Graph::build(5, [], false)?;
    let aggregation = aggregate(&graph, &single_worker())?;
    assert_eq!(aggregation.status(), AggregationStatus::Converged);
    assert_eq!(aggregation.num_communities(), 5);
    let perm = assign_order(aggregation.dendrogram(), &graph);
    assert_eq!(perm.len(), 5);
    assert_eq!(perm.as_slice(), &[0, 1, 2, 3, 4]);
    Ok(())
}
