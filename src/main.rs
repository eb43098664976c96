mod archive;
mod breadcrumbs;
mod config;
mod database;
mod errors;
mod filters;
mod hierarchy;
mod loaders;
mod models;
mod outlink;
mod parsing;
mod pipeline;
mod schema;
mod sfga;
mod utils;

use std::path::PathBuf;

use clap::{Args, Parser};
use tracing::Level;
use tracing_subscriber::fmt::format::FmtSpan;

use crate::config::Config;
use crate::errors::Error;
use crate::filters::SourceFilter;
use crate::pipeline::Populator;
use crate::utils::{CancelToken, ConsolePrompter};

/// The GlobalNames warehouse loader
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand)]
pub enum Commands {
    /// Import the selected sources' archives into the warehouse
    Populate(PopulateArgs),

    /// List the sources declared in the catalog
    Sources(SourcesArgs),
}

#[derive(Args)]
pub struct PopulateArgs {
    /// Source selection: 'main', 'exclude main', ids and ranges, e.g. 1,5,10-20,50-
    #[arg(long)]
    sources: Option<String>,

    /// Path to the sources catalog
    #[arg(long, default_value = "sources.yaml")]
    config: PathBuf,

    /// Worker count for the hierarchy parsing stage
    #[arg(long)]
    jobs: Option<usize>,

    /// Rows per bulk-copy batch
    #[arg(long)]
    batch_size: Option<usize>,

    /// Build classifications from the flat rank columns even when the
    /// hierarchy is walkable
    #[arg(long)]
    prefer_flat: bool,
}

#[derive(Args)]
pub struct SourcesArgs {
    /// Path to the sources catalog
    #[arg(long, default_value = "sources.yaml")]
    config: PathBuf,
}

fn main() -> Result<(), Error> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    match &cli.command {
        Commands::Populate(args) => populate(args),
        Commands::Sources(args) => list_sources(args),
    }
}

fn populate(args: &PopulateArgs) -> Result<(), Error> {
    let mut config = Config::load(&args.config)?;
    init_tracing(&config.logging.level);

    if let Some(jobs) = args.jobs {
        config.populate.concurrent_jobs = jobs;
    }
    if let Some(batch_size) = args.batch_size {
        config.populate.batch_size = batch_size;
    }
    if args.prefer_flat {
        config.populate.prefer_flat_classification = true;
    }

    let filter = match &args.sources {
        Some(raw) => Some(SourceFilter::parse(raw)?),
        None => None,
    };

    let cancel = CancelToken::new();
    {
        let cancel = cancel.clone();
        ctrlc::set_handler(move || cancel.cancel()).expect("Failed to set the signal handler");
    }

    let pool = database::get_pool()?;
    let prompter = ConsolePrompter;
    let populator = Populator::new(&config, pool, &prompter, cancel);
    let summary = populator.run(filter.as_ref())?;

    if summary.failed() > 0 {
        tracing::warn!(failed = summary.failed(), "run finished with failed sources");
    }

    Ok(())
}

fn list_sources(args: &SourcesArgs) -> Result<(), Error> {
    let config = Config::load(&args.config)?;

    for source in &config.sources {
        println!("{:>5}  {:<30}  {}", source.id, source.title_short, source.parent);
    }

    Ok(())
}

fn init_tracing(level: &str) {
    let level = match level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    tracing_subscriber::fmt::fmt()
        .with_max_level(level)
        .with_span_events(FmtSpan::CLOSE)
        .with_target(false)
        .with_level(false)
        .init();
}
