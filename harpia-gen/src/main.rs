//! harpia-gen - Harpy eagle nest tracker and candidate generator
//!
//! Records field observations and proposes plausible new nest sites,
//! validated against elevation, land-use, forest cover and prey data.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use harpia_common::config::{RootFolderInitializer, RootFolderResolver};
use harpia_common::db::{self, observations};
use harpia_common::observation::parse_coordinates;
use harpia_common::{legacy_csv, Observation, ObservationKind};
use harpia_gen::services::ServiceSet;
use harpia_gen::{
    CandidateGenerator, GenerationController, GenerationEvent, GenerationRequest, HarpiaConfig,
    ViabilityValidator,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use sqlx::SqlitePool;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Command-line arguments for harpia-gen
#[derive(Parser, Debug)]
#[command(name = "harpia-gen")]
#[command(about = "Harpy eagle nest tracker and candidate site generator")]
#[command(version)]
struct Args {
    /// TOML config file
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Data root folder (holds harpia.db)
    #[arg(long, global = true, value_name = "DIR")]
    root_folder: Option<PathBuf>,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Record an observation
    Add {
        /// Latitude in degrees
        #[arg(allow_hyphen_values = true)]
        lat: String,
        /// Longitude in degrees
        #[arg(allow_hyphen_values = true)]
        lon: String,
        /// sighting, probable-nest or generated
        #[arg(short, long, default_value = "probable-nest")]
        kind: String,
        /// Field comment, used to weight probable nests
        #[arg(short, long, default_value = "")]
        comment: String,
    },
    /// List stored observations
    List {
        /// Only show this kind
        #[arg(short, long)]
        kind: Option<String>,
    },
    /// Delete an observation by id
    Delete { id: i64 },
    /// Generate candidate nest sites
    Generate {
        /// Number of candidates wanted
        #[arg(short = 'n', long)]
        count: Option<u32>,
        /// Seed for reproducible sampling
        #[arg(long)]
        seed: Option<u64>,
        /// Report candidates without storing them
        #[arg(long)]
        dry_run: bool,
    },
    /// Import a legacy CSV file
    ImportCsv { path: PathBuf },
    /// Export every observation to CSV
    ExportCsv { path: PathBuf },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = HarpiaConfig::load(args.config.as_deref()).context("Failed to load configuration")?;
    init_tracing(&config, args.verbose)?;

    info!("Starting harpia-gen v{}", env!("CARGO_PKG_VERSION"));

    let root_folder = RootFolderResolver::new()
        .with_cli_arg(args.root_folder.clone())
        .with_toml_value(config.root_folder.clone())
        .resolve();

    let initializer = RootFolderInitializer::new(root_folder);
    initializer.ensure_directory_exists()?;
    info!("Root folder: {}", initializer.root_folder().display());

    let db_path = initializer.database_path();
    info!("Database path: {}", db_path.display());

    let pool = db::init_database_pool(&db_path)
        .await
        .context("Failed to open observation store")?;

    match args.command {
        Command::Add {
            lat,
            lon,
            kind,
            comment,
        } => add(&pool, &lat, &lon, &kind, &comment).await,
        Command::List { kind } => list(&pool, kind.as_deref()).await,
        Command::Delete { id } => {
            observations::delete_observation(&pool, id).await?;
            println!("Deleted observation {}", id);
            Ok(())
        }
        Command::Generate {
            count,
            seed,
            dry_run,
        } => {
            let requested = count.unwrap_or(config.generator.default_count);
            generate(&pool, &config, requested, seed, dry_run).await
        }
        Command::ImportCsv { path } => import(&pool, &path).await,
        Command::ExportCsv { path } => {
            let all = observations::read_all(&pool).await?;
            legacy_csv::export_csv(&path, &all)?;
            println!("Exported {} observations to {}", all.len(), path.display());
            Ok(())
        }
    }
}

/// stderr (or the configured file), filtered by `RUST_LOG` or the config level
fn init_tracing(config: &HarpiaConfig, verbose: bool) -> Result<()> {
    let level = if verbose { "debug" } else { config.logging.level.as_str() };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    match &config.logging.file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(std::sync::Mutex::new(file))
                .init();
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }

    Ok(())
}

async fn add(pool: &SqlitePool, lat: &str, lon: &str, kind: &str, comment: &str) -> Result<()> {
    let (lat, lon) = parse_coordinates(lat, lon)?;
    let kind: ObservationKind = kind.parse()?;

    let observation = observations::insert_manual(pool, lat, lon, kind, comment).await?;
    println!(
        "Added observation {} ({}) at ({:.5}, {:.5})",
        observation.id, observation.kind, observation.lat, observation.lon
    );
    Ok(())
}

async fn list(pool: &SqlitePool, kind: Option<&str>) -> Result<()> {
    let rows = match kind {
        Some(kind) => observations::read_by_kind(pool, kind.parse()?).await?,
        None => observations::read_all(pool).await?,
    };

    if rows.is_empty() {
        println!("No observations");
        return Ok(());
    }

    print_table(&rows);
    Ok(())
}

async fn import(pool: &SqlitePool, path: &Path) -> Result<()> {
    let imported = legacy_csv::import_csv(path)?;
    for (line, reason) in &imported.skipped {
        warn!(line, reason = %reason, "Skipped CSV row");
    }

    observations::append_observations(pool, &imported.observations)
        .await
        .context("Import failed, nothing was stored")?;

    println!(
        "Imported {} observations ({} rows skipped)",
        imported.observations.len(),
        imported.skipped.len()
    );
    Ok(())
}

async fn generate(
    pool: &SqlitePool,
    config: &HarpiaConfig,
    requested: u32,
    seed: Option<u64>,
    dry_run: bool,
) -> Result<()> {
    let stored = observations::read_all(pool).await?;
    let first_id = observations::next_id(pool).await?;

    let services = ServiceSet::from_settings(&config.services).context("Failed to build HTTP clients")?;
    let validator = Arc::new(ViabilityValidator::from_services(services, config.validation.clone()));
    let generator = Arc::new(CandidateGenerator::new(
        validator,
        config.weights.clone(),
        config.generator.clone(),
    ));

    let rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let controller = GenerationController::new();
    let (run_id, mut progress) = controller
        .start(generator, stored, GenerationRequest { requested, first_id }, rng)
        .await?;
    info!(%run_id, requested, dry_run, "Generation started");

    let mut ticker = tokio::time::interval(config.generator.poll_interval());
    let ctrl_c = signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut interrupted = false;

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            result = &mut ctrl_c, if !interrupted => {
                interrupted = true;
                match result {
                    Ok(()) => {
                        info!("Received Ctrl+C, cancelling generation");
                        controller.cancel().await;
                    }
                    Err(e) => warn!("Failed to listen for Ctrl+C: {}", e),
                }
                continue;
            }
        }

        for event in progress.drain() {
            match event {
                GenerationEvent::Status(text) => println!("{}", text),
                GenerationEvent::Error(message) => {
                    controller.join().await;
                    bail!("Generation failed: {}", message);
                }
                GenerationEvent::Done(candidates) => {
                    controller.join().await;
                    return finish(pool, &candidates, requested, dry_run).await;
                }
            }
        }

        if progress.is_closed() {
            controller.join().await;
            bail!("Generation worker stopped without reporting a result");
        }
    }
}

async fn finish(pool: &SqlitePool, candidates: &[Observation], requested: u32, dry_run: bool) -> Result<()> {
    if candidates.is_empty() {
        println!("No viable candidates found within the attempt budget");
        return Ok(());
    }

    println!("\n{} of {} requested candidates accepted:", candidates.len(), requested);

    if dry_run {
        print_table(candidates);
        println!("Dry run: nothing stored");
        return Ok(());
    }

    // Ids are final only once the batch is committed
    let stored = observations::append_generated(pool, candidates)
        .await
        .context("Failed to store candidates")?;
    print_table(&stored);
    println!("Stored {} candidates", stored.len());
    Ok(())
}

fn print_table(rows: &[Observation]) {
    println!(
        "{:>5}  {:>10}  {:>11}  {:<18}  {:>5}  {}",
        "id", "lat", "lon", "kind", "score", "comment / reason"
    );
    for obs in rows {
        let score = obs.score.map(|s| format!("{:.0}", s)).unwrap_or_else(|| "-".to_string());
        let note = obs.validation_reason.as_deref().unwrap_or(obs.comment.as_str());
        println!(
            "{:>5}  {:>10.5}  {:>11.5}  {:<18}  {:>5}  {}",
            obs.id,
            obs.lat,
            obs.lon,
            obs.kind.as_str(),
            score,
            note
        );
    }
}
