//! Command-line interface for the expansion pipeline.

pub mod progress;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use log::info;

use crate::ebg::{EdgeExpander, EdgeLookupPaths, OutputConfig, SpeedProfile};
use crate::formats::snapshot::{NetworkData, NetworkSnapshot};

#[derive(Parser)]
#[command(name = "switchback")]
#[command(about = "Turn-aware edge expansion for road networks", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Expand a node-based network snapshot into an edge-based graph
    Expand {
        /// Input nbg.snapshot bundle
        #[arg(short, long)]
        input: PathBuf,

        /// Output directory for the edge data files
        #[arg(short, long)]
        outdir: PathBuf,

        /// Penalty added to u-turn edges, in weight units
        #[arg(long, default_value = "20")]
        u_turn_penalty: i32,

        /// Penalty added when the turn crosses a traffic signal
        #[arg(long, default_value = "0")]
        traffic_signal_penalty: i32,

        /// Also write the edge segment lookup and fixed penalty files
        #[arg(long)]
        edge_lookup: bool,

        /// Suppress the progress bar
        #[arg(long)]
        quiet: bool,
    },
}

#[derive(Debug)]
pub struct ExpandConfig {
    pub input: PathBuf,
    pub outdir: PathBuf,
    pub profile: SpeedProfile,
    pub edge_lookup: bool,
    pub quiet: bool,
}

pub fn run_expand(config: ExpandConfig) -> Result<()> {
    let snapshot = NetworkSnapshot::read(&config.input)?;
    info!(
        "loaded snapshot: {} nodes, {} edges, {} restrictions",
        snapshot.nodes.len(),
        snapshot.edges.len(),
        snapshot.restrictions.len()
    );

    let NetworkData {
        mut graph,
        geometry,
        coordinates,
        restrictions,
        barrier_nodes,
        traffic_signals,
    } = snapshot.into_network_data();
    let total_nodes = graph.num_nodes();

    std::fs::create_dir_all(&config.outdir)?;
    let output = OutputConfig {
        original_edge_data: config.outdir.join("original_edge_data.bin"),
        edge_lookup: config.edge_lookup.then(|| EdgeLookupPaths {
            segments: config.outdir.join("edge_segment_lookup.bin"),
            penalties: config.outdir.join("edge_penalties.bin"),
        }),
    };

    let mut expander = EdgeExpander::new(
        &mut graph,
        &geometry,
        &coordinates,
        &restrictions,
        &barrier_nodes,
        &traffic_signals,
        config.profile,
    );
    if !config.quiet {
        expander = expander.with_progress(progress::expansion_progress(total_nodes as u64));
    }

    let result = expander.run(&output)?;

    info!(
        "expansion finished: {} expanded nodes, {} expanded edges, {} records",
        result.nodes.len(),
        result.edges.len(),
        result.stats.original_edges_written
    );
    Ok(())
}
