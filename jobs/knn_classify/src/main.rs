use anyhow::Result;
use clap::Parser;
use mrchain::config::ConfigLayer;
use mrchain::io::read_input_lines;
use mrchain::jobs::knn::{self, KnnContext};
use mrchain::{write_output, Engine, EngineConfig};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
struct Args {
    /// Iris CSV; rows with an empty Species are classified
    #[arg(long)]
    input: PathBuf,
    #[arg(long, default_value = "results/knn_output.txt")]
    output: PathBuf,
    /// Number of neighbours that vote
    #[arg(long, default_value_t = knn::DEFAULT_K)]
    k: usize,
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

    // Normalization and the labeled/unlabeled split happen once, before any mapper runs.
    let samples = knn::parse_samples(&read_input_lines(&args.input)?)?;
    let ctx = Arc::new(KnnContext::from_rows(samples));
    info!(labeled = ctx.labeled().len(), unlabeled = ctx.unlabeled().len(), k = args.k, "Dataset loaded");

    let unknown = ctx.unlabeled().to_vec();
    let out = engine.run_job(&knn::job(ctx, args.k)?, unknown)?;
    write_output(&args.output, args.print, &out.pairs)?;
    info!(output = %args.output.display(), classified = out.pairs.len(), "Classification written");
    Ok(())
}
