//! KGP CLI - Command-line interface
//!
//! Usage:
//!   kgp decode <sequence>
//!   kgp extract -m <method>
//!   kgp validate -m <method>
//!   kgp upload -m <method> [--dry-run]
//!   kgp run -m <method> [--dry-run]

mod pipeline;

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use kgp_core::{AppConfig, ArtifactStore, BackendKind, LoggingConfig};
use kgp_extractor::{decode_with_stats, Backend};
use kgp_graph::{GraphStore, MemoryGraphStore, SurrealDbStore};
use tracing::{info, info_span, Instrument};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "kgp")]
#[command(about = "Knowledge graph construction pipeline")]
#[command(version)]
struct Cli {
    /// TOML configuration file; environment variables override it
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Decode one tagged sequence and print its triplets as JSON
    Decode {
        /// Generated sequence, markers included
        sequence: String,
    },
    /// Run an extraction backend over the input texts
    Extract {
        /// Extraction method (relik or mrebel)
        #[arg(short, long)]
        method: String,
        /// Clean texts before extraction
        #[arg(long)]
        clean: bool,
    },
    /// Resolve types and validate extracted relationships
    Validate {
        #[arg(short, long)]
        method: String,
    },
    /// Upsert validated tables into the graph
    Upload {
        #[arg(short, long)]
        method: String,
        /// Write to an in-memory graph instead of the database
        #[arg(long)]
        dry_run: bool,
    },
    /// Extract, validate and upload in sequence
    Run {
        #[arg(short, long)]
        method: String,
        #[arg(long)]
        clean: bool,
        #[arg(long)]
        dry_run: bool,
    },
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<AppConfig> {
    let config = match path {
        Some(path) => AppConfig::from_file(path.clone())?.with_env_override()?,
        None => AppConfig::from_env()?,
    };
    Ok(config)
}

fn init_tracing(logging: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if logging.json_format {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn open_graph(config: &AppConfig, dry_run: bool) -> anyhow::Result<Box<dyn GraphStore>> {
    if dry_run {
        info!("Dry run: writing to an in-memory graph");
        return Ok(Box::new(MemoryGraphStore::new()));
    }
    let store = SurrealDbStore::new(&config.database)
        .await
        .with_context(|| format!("connecting to {}", config.database.surrealdb_url))?;
    Ok(Box::new(store))
}

async fn extract(
    config: &AppConfig,
    store: &ArtifactStore,
    method: &str,
    clean: bool,
) -> anyhow::Result<()> {
    let backend = Backend::from_method(method, &config.extraction)?;
    pipeline::extract_stage(store, &backend, clean).await?;
    Ok(())
}

async fn upload(
    config: &AppConfig,
    store: &ArtifactStore,
    kind: BackendKind,
    dry_run: bool,
) -> anyhow::Result<()> {
    let graph = open_graph(config, dry_run).await?;
    let (nodes, edges) = pipeline::upload_stage(store, kind, graph.as_ref()).await?;
    println!(
        "{} nodes and {} edges merged, {} rows rejected",
        nodes.written,
        edges.written,
        nodes.rejected.len() + edges.rejected.len()
    );
    Ok(())
}

async fn run(
    config: &AppConfig,
    store: &ArtifactStore,
    method: &str,
    kind: BackendKind,
    clean: bool,
    dry_run: bool,
) -> anyhow::Result<()> {
    extract(config, store, method, clean).await?;
    pipeline::validate_stage(store, kind)?;
    upload(config, store, kind, dry_run).await
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_ref())?;
    init_tracing(&config.logging);

    let store = ArtifactStore::from_config(&config.storage);
    let run_id = Uuid::new_v4();

    match cli.command {
        Commands::Decode { sequence } => {
            let (triplets, stats) = decode_with_stats(&sequence);
            println!("{}", serde_json::to_string_pretty(&triplets)?);
            eprintln!(
                "{} segments, {} triplets, {} dropped",
                stats.segments_seen, stats.triplets_emitted, stats.triplets_dropped
            );
        }
        Commands::Extract { method, clean } => {
            extract(&config, &store, &method, clean)
                .instrument(info_span!("extract", %run_id, %method))
                .await?;
        }
        Commands::Validate { method } => {
            let kind: BackendKind = method.parse()?;
            let _span = info_span!("validate", %run_id, %method).entered();
            let summary = pipeline::validate_stage(&store, kind)?;
            println!(
                "{} of {} relationships kept, {} entities",
                summary.relationships_out, summary.relationships_in, summary.entities_out
            );
        }
        Commands::Upload { method, dry_run } => {
            let kind: BackendKind = method.parse()?;
            upload(&config, &store, kind, dry_run)
                .instrument(info_span!("upload", %run_id, %method))
                .await?;
        }
        Commands::Run {
            method,
            clean,
            dry_run,
        } => {
            let kind: BackendKind = method.parse()?;
            run(&config, &store, &method, kind, clean, dry_run)
                .instrument(info_span!("run", %run_id, %method))
                .await?;
        }
    }

    Ok(())
}
