use anyhow::Result;
use clap::Parser;

use switchback::cli::{Cli, Commands, ExpandConfig};
use switchback::ebg::SpeedProfile;

fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Expand {
            input,
            outdir,
            u_turn_penalty,
            traffic_signal_penalty,
            edge_lookup,
            quiet,
        } => switchback::cli::run_expand(ExpandConfig {
            input,
            outdir,
            profile: SpeedProfile {
                u_turn_penalty,
                traffic_signal_penalty,
            },
            edge_lookup,
            quiet,
        }),
    }
}
