/*
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

//! The aggregation engine.
//!
//! Aggregation runs one or more passes over the current *level graph*. In
//! every pass each vertex starts as a singleton community; worker threads
//! scan the vertices, compute for each vertex the modularity gain of
//! merging its community into each neighboring community, and greedily
//! perform the best strictly-positive merge through the concurrent
//! [`CommunityStore`]. A merge lost to a concurrent one is retried a
//! bounded number of times and then deferred to the next pass. When a pass
//! ends, live communities become the vertices of the next level graph and
//! inter-community arc weights are accumulated; the engine stops at the
//! first pass that performs no merge, when the pass cap is hit, or when
//! the cooperative stop flag is raised between passes.
//!
//! Every merge is recorded in the [`Dendrogram`] with a globally
//! increasing sequence stamp; the dendrogram is the only output the order
//! assignment needs.
//!
//! The modularity gain of merging the community of `v` into a neighboring
//! community `C` is
//!
//! ```text
//! gain(C) = w(v, C) / W  -  strength(v) * total(C) / (2 W²)
//! ```
//!
//! where `w(v, C)` is the weight from `v` to `C`, `total(C)` the incident
//! weight of `C`, and `W` the total input edge weight of the original
//! graph, which is invariant under contraction.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use anyhow::{Context, Result};
use crossbeam_utils::CachePadded;
use dsi_progress_logger::prelude::*;
use log::info;
use rayon::prelude::*;

use crate::community::CommunityStore;
use crate::dendrogram::{Dendrogram, MergeEvent};
use crate::graph::{Graph, WeightedArc};

/// How many times a worker re-reads the current community of a vertex and
/// retries a merge that lost a race before deferring the vertex to the
/// next pass.
const MAX_MERGE_RETRIES: usize = 8;

/// Configuration of a reordering run.
#[derive(Debug, Clone)]
pub struct ReorderConfig {
    /// Whether the input arcs are directed. The adjacency is symmetrized
    /// either way; the flag records input intent.
    pub directed: bool,
    /// Number of worker threads; `0` means available hardware parallelism.
    pub num_workers: usize,
    /// Maximum number of aggregation passes.
    pub max_passes: usize,
    /// Merges must improve modularity strictly more than this. Non-positive
    /// gains never merge, whatever the threshold.
    pub min_gain_threshold: f64,
    /// Cooperative stop flag, checked between passes. A run stopped this
    /// way returns the dendrogram built so far, flagged
    /// [`Cancelled`](AggregationStatus::Cancelled).
    pub stop: Option<Arc<AtomicBool>>,
}

impl Default for ReorderConfig {
    fn default() -> Self {
        Self {
            directed: false,
            num_workers: num_cpus::get(),
            max_passes: usize::MAX,
            min_gain_threshold: 0.0,
            stop: None,
        }
    }
}

/// Why an aggregation run stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregationStatus {
    /// A pass performed no merge: the community structure is a fixpoint of
    /// the greedy scan.
    Converged,
    /// The configured pass cap was reached before convergence.
    ReachedMaxPasses,
    /// The stop flag was raised between passes. The dendrogram is valid
    /// but partial.
    Cancelled,
}

/// The result of an aggregation run.
pub struct Aggregation {
    dendrogram: Dendrogram,
    status: AggregationStatus,
    passes: usize,
}

impl Aggregation {
    #[inline(always)]
    pub fn dendrogram(&self) -> &Dendrogram {
        &self.dendrogram
    }

    #[inline(always)]
    pub fn into_dendrogram(self) -> Dendrogram {
        self.dendrogram
    }

    #[inline(always)]
    pub fn status(&self) -> AggregationStatus {
        self.status
    }

    /// Returns whether the run stopped before reaching a fixpoint.
    #[inline(always)]
    pub fn is_partial(&self) -> bool {
        self.status != AggregationStatus::Converged
    }

    /// Number of passes executed.
    #[inline(always)]
    pub fn passes(&self) -> usize {
        self.passes
    }

    /// Number of final communities.
    #[inline(always)]
    pub fn num_communities(&self) -> usize {
        self.dendrogram.num_communities()
    }

    /// Final community of every original vertex.
    pub fn membership(&self) -> Vec<usize> {
        self.dendrogram.membership()
    }
}

/// Runs community aggregation on the given graph.
///
/// With `num_workers = 1` the run is fully deterministic: vertices are
/// scanned in id order and gain ties break toward the lower community id.
/// With more workers the set of merges may differ between runs, but the
/// resulting partition quality is comparable and the returned dendrogram
/// always yields a valid permutation.
pub fn aggregate(graph: &Graph, config: &ReorderConfig) -> Result<Aggregation> {
    let num_workers = match config.num_workers {
        0 => num_cpus::get(),
        n => n,
    };
    let thread_pool = rayon::ThreadPoolBuilder::new()
        .num_threads(num_workers)
        .build()
        .context("Could not create thread pool")?;
    let min_gain = config.min_gain_threshold.max(0.0);

    let mut dendrogram = Dendrogram::new(graph.num_nodes());
    let seq = CachePadded::new(AtomicU64::new(0));

    // Level-node id -> dendrogram (original community) id.
    let mut node_map: Vec<usize> = (0..graph.num_nodes()).collect();
    let mut contracted: Option<Graph> = None;

    let mut pass_pl = progress_logger![item_name = "pass", display_memory = true];
    let mut scan_pl = concurrent_progress_logger![item_name = "vertex", local_speed = true];

    pass_pl.start(format!("Aggregating with {} workers...", num_workers));

    let mut passes = 0;
    let status = loop {
        if config
            .stop
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Relaxed))
        {
            break AggregationStatus::Cancelled;
        }
        if passes >= config.max_passes {
            break AggregationStatus::ReachedMaxPasses;
        }

        let level_graph = contracted.as_ref().unwrap_or(graph);
        let store = CommunityStore::new(level_graph);
        let merges = run_pass(
            level_graph,
            &store,
            &thread_pool,
            graph.total_weight(),
            min_gain,
            &seq,
            &node_map,
            &mut dendrogram,
            &mut scan_pl,
        );
        passes += 1;
        pass_pl.update_and_display();

        if merges == 0 {
            break AggregationStatus::Converged;
        }
        info!(
            "Pass {}: {} merges, {} communities left",
            passes,
            merges,
            store.num_roots()
        );

        let (next_graph, next_map) = contract(level_graph, &store, &node_map, &thread_pool);
        contracted = Some(next_graph);
        node_map = next_map;
    };

    pass_pl.done();
    info!(
        "Aggregation stopped after {} passes ({:?}): {} communities",
        passes,
        status,
        dendrogram.num_communities()
    );

    Ok(Aggregation {
        dendrogram,
        status,
        passes,
    })
}

/// Scans every vertex of the level graph once, merging greedily. Returns
/// the number of merges performed.
#[allow(clippy::too_many_arguments)]
fn run_pass<P: ConcurrentProgressLog>(
    graph: &Graph,
    store: &CommunityStore,
    thread_pool: &rayon::ThreadPool,
    total_weight: u64,
    min_gain: f64,
    seq: &AtomicU64,
    node_map: &[usize],
    dendrogram: &mut Dendrogram,
    pl: &mut P,
) -> usize {
    let num_nodes = graph.num_nodes();
    pl.expected_updates(Some(num_nodes));
    pl.start("Scanning vertices...");

    let (tx, rx) = crossbeam_channel::unbounded::<MergeEvent>();
    thread_pool.install(|| {
        (0..num_nodes).into_par_iter().for_each_with(
            (HashMap::new(), tx.clone(), pl.clone()),
            |(weights, tx, pl), vertex| {
                scan_vertex(
                    graph,
                    store,
                    total_weight,
                    min_gain,
                    seq,
                    node_map,
                    weights,
                    tx,
                    vertex,
                );
                pl.light_update();
            },
        );
    });
    drop(tx);

    let mut events: Vec<MergeEvent> = rx.try_iter().collect();
    events.sort_unstable_by_key(|event| event.seq);
    let merges = events.len();
    for event in events {
        dendrogram.push(event);
    }

    pl.done_with_count(num_nodes);
    merges
}

/// Computes the best merge for one vertex and attempts it with bounded
/// retry. `weights` is the worker's reusable neighbor-community
/// accumulator.
#[allow(clippy::too_many_arguments)]
fn scan_vertex(
    graph: &Graph,
    store: &CommunityStore,
    total_weight: u64,
    min_gain: f64,
    seq: &AtomicU64,
    node_map: &[usize],
    weights: &mut HashMap<usize, u64>,
    tx: &crossbeam_channel::Sender<MergeEvent>,
    vertex: usize,
) {
    // A graph whose edges all have zero weight has no meaningful gains.
    if total_weight == 0 {
        return;
    }
    let community = store.find(vertex);
    weights.clear();
    for &(neighbor, weight) in graph.successors(vertex) {
        if neighbor == vertex {
            continue;
        }
        let target = store.find(neighbor);
        if target != community {
            *weights.entry(target).or_insert(0) += weight;
        }
    }
    if weights.is_empty() {
        return;
    }

    let w = total_weight as f64;
    let strength = graph.strength(vertex) as f64;
    let mut best: Option<(f64, usize, u64)> = None;
    for (&candidate, &vertex_to_candidate) in weights.iter() {
        let (_, candidate_total) = store.weight(candidate);
        let gain = vertex_to_candidate as f64 / w
            - strength * candidate_total as f64 / (2.0 * w * w);
        // Total order on (gain, id): the map's iteration order cannot leak
        // into the outcome.
        let better = match best {
            None => true,
            Some((best_gain, best_id, _)) => {
                gain > best_gain || (gain == best_gain && candidate < best_id)
            }
        };
        if better {
            best = Some((gain, candidate, vertex_to_candidate));
        }
    }

    let Some((gain, target, cross)) = best else {
        return;
    };
    if gain <= min_gain {
        return;
    }

    let mut target = target;
    for _ in 0..MAX_MERGE_RETRIES {
        let source = store.find(vertex);
        target = store.find(target);
        if source == target {
            return;
        }
        // The cross weight is passed in symmetrized arc units.
        if let Some(child_total) = store.try_merge(source, target, 2 * cross) {
            let stamp = seq.fetch_add(1, Ordering::Relaxed);
            // The receiver outlives the scan; a send cannot fail.
            let _ = tx.send(MergeEvent {
                child: node_map[source],
                parent: node_map[target],
                seq: stamp,
                child_total,
            });
            return;
        }
        // Somebody merged one of the two sides first; re-resolve and retry,
        // then defer to the next pass.
    }
}

/// Contracts a level graph: live communities become the new vertices and
/// inter-community arc weights are accumulated. Returns the new graph and
/// the new level-node -> dendrogram id map.
fn contract(
    graph: &Graph,
    store: &CommunityStore,
    node_map: &[usize],
    thread_pool: &rayon::ThreadPool,
) -> (Graph, Vec<usize>) {
    let num_nodes = graph.num_nodes();
    let mut renumber = vec![usize::MAX; num_nodes];
    let mut next_map = Vec::new();
    for community in 0..num_nodes {
        if store.is_root(community) {
            renumber[community] = next_map.len();
            next_map.push(node_map[community]);
        }
    }

    let accumulated: HashMap<(usize, usize), u64> = thread_pool.install(|| {
        (0..num_nodes)
            .into_par_iter()
            .fold(HashMap::new, |mut acc: HashMap<(usize, usize), u64>, u| {
                let cu = renumber[store.find(u)];
                for &(v, weight) in graph.successors(u) {
                    let cv = renumber[store.find(v)];
                    *acc.entry((cu, cv)).or_insert(0) += weight;
                }
                acc
            })
            .reduce(HashMap::new, |mut acc, other| {
                for (arc, weight) in other {
                    *acc.entry(arc).or_insert(0) += weight;
                }
                acc
            })
    });

    let sym: Vec<WeightedArc> = accumulated
        .into_iter()
        .map(|((u, v), weight)| (u, v, weight))
        .collect();
    let next_graph = Graph::from_symmetric_arcs(
        next_map.len(),
        sym,
        graph.total_weight(),
        graph.is_directed(),
    );
    (next_graph, next_map)
}

/// Computes the exact modularity of a vertex partition of `graph`.
///
/// `membership[v]` is the community of vertex `v`; any labeling works, not
/// just the one produced by [`aggregate`]. Used for validation and
/// logging; the incremental accumulators of the community store are not
/// trusted here.
pub fn modularity(graph: &Graph, membership: &[usize]) -> f64 {
    assert_eq!(membership.len(), graph.num_nodes());
    if graph.total_weight() == 0 {
        return 0.0;
    }
    let two_m = 2.0 * graph.total_weight() as f64;
    let mut totals: HashMap<usize, u64> = HashMap::new();
    let mut intra = 0u64;
    for u in 0..graph.num_nodes() {
        *totals.entry(membership[u]).or_insert(0) += graph.strength(u);
        for &(v, weight) in graph.successors(u) {
            if membership[u] == membership[v] {
                intra += weight;
            }
        }
    }
    let mut q = intra as f64 / two_m;
    for total in totals.values() {
        let fraction = *total as f64 / two_m;
        q -= fraction * fraction;
    }
    q
}
