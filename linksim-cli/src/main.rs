mod config;
mod report;

use clap::Parser;
use color_eyre::eyre::{eyre, Context, Result};
use std::path::PathBuf;

use config::CliConfig;
use linksim_core::pipeline::run_simulation;
use linksim_core::sink::MemoryPlotSink;

#[derive(Parser, Debug)]
#[command(author, version, about = "Serial link simulator and jitter analyzer", long_about = None)]
struct Cli {
    /// Path to TOML configuration file (defaults apply when omitted)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Write the full plot-data map as JSON (overrides config)
    #[arg(short = 'j', long)]
    json_output: Option<PathBuf>,

    /// Override the random seed for a reproducible run
    #[arg(short, long)]
    seed: Option<u64>,

    /// Print the per-stage log after the summary
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    color_eyre::install()?;
    let args = Cli::parse();

    let mut cfg = match &args.config {
        Some(path) => CliConfig::from_file(path)?,
        None => CliConfig::default(),
    };
    if let Some(path) = args.json_output {
        cfg.output.json_output = Some(path);
    }
    if let Some(seed) = args.seed {
        cfg.simulation.rng_seed = Some(seed);
    }
    if args.verbose {
        cfg.output.show_log = true;
    }

    let result = run_simulation(&cfg.simulation).map_err(|e| eyre!("simulation failed: {e}"))?;

    report::print_summary(&result);

    if cfg.output.show_log {
        println!("\n{}", result.logger);
    }

    if let Some(path) = &cfg.output.json_output {
        let mut sink = MemoryPlotSink::new();
        result.write_plots(&mut sink);
        let json = serde_json::to_string(&sink.into_inner())?;
        std::fs::write(path, json).wrap_err_with(|| format!("writing {}", path.display()))?;
        println!("plot data written to {}", path.display());
    }

    Ok(())
}
