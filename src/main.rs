/*
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

use std::path::PathBuf;
use std::time::Instant;

use anyhow::Result;
use clap::Parser;
use log::info;

use graph_reorder::aggregation::{self, ReorderConfig};
use graph_reorder::edge_list::EdgeList;
use graph_reorder::graph::Graph;
use graph_reorder::order::assign_order;

#[derive(Parser, Debug)]
#[command(
    about = "Reorders the vertices of an edge-list graph so that adjacent vertices get nearby ids.",
    long_about = None
)]
struct Args {
    /// The edge list to reorder.
    src: PathBuf,
    /// Where to write the reordered edge list.
    dst: PathBuf,

    /// Number of header lines to pass through verbatim.
    #[arg(long, default_value_t = 2)]
    header_lines: usize,

    /// Number of worker threads; defaults to the available parallelism.
    #[arg(short = 'j', long)]
    workers: Option<usize>,

    /// Maximum number of aggregation passes; defaults to running until
    /// convergence.
    #[arg(long)]
    max_passes: Option<usize>,

    /// Minimum modularity gain a merge must exceed.
    #[arg(long, default_value_t = 0.0)]
    min_gain: f64,

    /// Treat the input arcs as directed.
    #[arg(long)]
    directed: bool,
}

pub fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let start = Instant::now();
    let edge_list = EdgeList::read(&args.src, args.header_lines)?;
    info!(
        "Loaded {} edges ({} vertices) from {} in {:.3}s",
        edge_list.num_edges(),
        edge_list.num_nodes(),
        args.src.display(),
        start.elapsed().as_secs_f64()
    );

    let mut config = ReorderConfig {
        directed: args.directed,
        min_gain_threshold: args.min_gain,
        ..ReorderConfig::default()
    };
    if let Some(workers) = args.workers {
        config.num_workers = workers;
    }
    if let Some(max_passes) = args.max_passes {
        config.max_passes = max_passes;
    }

    let graph = Graph::build(edge_list.num_nodes(), edge_list.arcs(), config.directed)?;
    let aggregation = aggregation::aggregate(&graph, &config)?;
    info!(
        "{} passes, {} communities, status {:?}",
        aggregation.passes(),
        aggregation.num_communities(),
        aggregation.status()
    );
    info!(
        "Modularity: {:.6}",
        aggregation::modularity(&graph, &aggregation.membership())
    );

    let perm = assign_order(aggregation.dendrogram(), &graph);
    edge_list.permuted(&perm)?.write(&args.dst)?;
    info!(
        "Wrote {} in {:.3}s total",
        args.dst.display(),
        start.elapsed().as_secs_f64()
    );
    Ok(())
}
