use anyhow::Result;
use clap::Parser;
use mrchain::config::ConfigLayer;
use mrchain::io::read_input_lines;
use mrchain::jobs::reverse_graph;
use mrchain::{write_output, Engine, EngineConfig};
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
struct Args {
    /// Edge list, one `from to` pair per line; `#` lines are comments
    #[arg(long)]
    input: PathBuf,
    #[arg(long, default_value = "results/reversed_web_graph.txt")]
    output: PathBuf,
    /// Engine config JSON
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    partitions: Option<usize>,
    #[arg(long)]
    threads: Option<usize>,
    /// Also print results to stdout
    #[arg(long)]
    print: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
    let args = Args::parse();

    let flags = ConfigLayer { threads: args.threads, partitions: args.partitions, ..ConfigLayer::default() };
    let engine = Engine::new(EngineConfig::with_overrides(args.config.as_deref(), flags)?)?;

    let edges = read_input_lines(&args.input)?;
    let out = engine.run_job(&reverse_graph::job(), edges)?;
    let skipped = out.stats.malformed();
    if skipped > 0 {
        warn!(skipped, "ignored comment or malformed lines");
    }
    write_output(&args.output, args.print, &out.pairs)?;
    info!(output = %args.output.display(), nodes = out.pairs.len(), "Reversed graph written");
    Ok(())
}
