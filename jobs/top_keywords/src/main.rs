use anyhow::Result;
use clap::Parser;
use mrchain::config::ConfigLayer;
use mrchain::io::read_input_lines;
use mrchain::jobs::keywords::{self, KeywordFilter};
use mrchain::jobs::stopwords;
use mrchain::{write_output, Engine, EngineConfig};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
struct Args {
    /// movies CSV (`movieId,title,genres`)
    #[arg(long)]
    input: PathBuf,
    #[arg(long, default_value = "results/top_keywords_by_genre.txt")]
    output: PathBuf,
    /// Keywords kept per genre
    #[arg(long, default_value_t = keywords::DEFAULT_TOP)]
    top: usize,
    /// Extra stopwords, one per line
    #[arg(long)]
    stopwords: Option<PathBuf>,
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

    let extra = match &args.stopwords {
        Some(path) => stopwords::load_file(path)?,
        None => Vec::new(),
    };
    let filter = Arc::new(KeywordFilter::new(extra)?);

    let movies = read_input_lines(&args.input)?;
    let out = engine.run_job(&keywords::job(filter, args.top), movies)?;
    write_output(&args.output, args.print, &out.pairs)?;
    for stage in &out.stats.stages {
        info!(stage = stage.stage, groups = stage.groups, malformed = stage.malformed, wall_ms = stage.wall_ms, "Stage summary");
    }
    info!(output = %args.output.display(), genres = out.pairs.len(), "Job complete! Results written");
    Ok(())
}
