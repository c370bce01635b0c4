//! Cognition CLI: provisioning, one-shot capture and reduction, and a
//! periodic capture loop.
//!
//! Usage:
//!   cognition [--db path] [--config file] provision
//!   cognition [--db path] capture
//!   cognition [--db path] reduce <RAW_EVENT_ID>
//!   cognition [--db path] backfill [--limit N]
//!   cognition [--db path] run [--interval SECS] [--workers N]

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use cognition::{
    schema, CaptureLoop, ChannelDispatcher, Database, EventCapture, NoteVersionSource, PipelineConfig, ReducerRegistry,
    ReductionOutcome, ReductionWorkers, SemanticReducer, SourceSystem, SourceType,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "cognition",
    version,
    about = "Checkpointed event capture and semantic reduction"
)]
struct Cli {
    /// Path to SQLite database file (overrides the config file)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// YAML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create tables and register the note-version checkpoint
    Provision,
    /// Run one capture cycle and print the inserted raw event ids
    Capture,
    /// Reduce a single raw event
    Reduce {
        /// Raw event id
        id: i64,
    },
    /// Reduce raw events that were never marked processed
    Backfill {
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Capture periodically and reduce through a worker pool until Ctrl+C
    Run {
        /// Seconds between capture cycles
        #[arg(long)]
        interval: Option<u64>,
        /// Number of reduction workers
        #[arg(long)]
        workers: Option<usize>,
    },
}

const SOURCE: (SourceType, SourceSystem) = (SourceType::CognoNoteVersions, SourceSystem::Cogno);

fn load_config(cli: &Cli) -> Result<PipelineConfig> {
    let mut config = match &cli.config {
        Some(path) => PipelineConfig::from_yaml_file(path)?,
        None => PipelineConfig::default(),
    };
    if let Some(db) = &cli.db {
        config.database_path = db.clone();
    }
    Ok(config)
}

fn open_database(config: &PipelineConfig) -> Result<Arc<Database>> {
    let db = Database::open(&config.database_path)
        .with_context(|| format!("failed to open database {}", config.database_path.display()))?;
    Ok(Arc::new(db))
}

fn capture_service(db: Arc<Database>) -> EventCapture {
    EventCapture::new(db).with_source(Arc::new(NoteVersionSource::new()))
}

fn reducer_service(db: Arc<Database>) -> Arc<SemanticReducer> {
    Arc::new(SemanticReducer::new(db, Arc::new(ReducerRegistry::default_registry())))
}

fn cmd_provision(db: &Database) -> Result<()> {
    let source_id = db
        .with_connection(|conn| -> cognition::StorageResult<i64> {
            schema::provision(conn)?;
            schema::register_source(conn, SOURCE.0, SOURCE.1, "0")
        })
        .context("provisioning failed")?;
    println!("Provisioned schema; {} / {} checkpoint id {}", SOURCE.0, SOURCE.1, source_id);
    Ok(())
}

fn cmd_capture(db: Arc<Database>) -> Result<()> {
    let inserted = capture_service(db).capture_batch(SOURCE.0, SOURCE.1)?;
    if inserted.is_empty() {
        println!("No new raw events.");
    } else {
        for id in &inserted {
            println!("{}", id);
        }
    }
    Ok(())
}

fn cmd_reduce(db: Arc<Database>, id: i64) -> Result<()> {
    match reducer_service(db).process_event(id)? {
        ReductionOutcome::Created { semantic_event_id, unique_hash } => {
            println!("Created semantic event {} ({})", semantic_event_id, unique_hash)
        }
        ReductionOutcome::AlreadyExists { unique_hash } => println!("Already reduced ({})", unique_hash),
        ReductionOutcome::Skipped { event_type } => println!("Skipped: no reducer for '{}'", event_type),
    }
    Ok(())
}

fn cmd_backfill(db: Arc<Database>, limit: usize) -> Result<()> {
    let report = reducer_service(db).process_unprocessed(limit)?;
    println!("Processed {} raw events", report.processed);
    for (id, reason) in &report.failed {
        eprintln!("  {}: {}", id, reason);
    }
    if !report.is_clean() {
        bail!("{} raw events failed to reduce", report.failed.len());
    }
    Ok(())
}

async fn cmd_run(db: Arc<Database>, config: &PipelineConfig) -> Result<()> {
    let reducer = reducer_service(db.clone());
    let capture_loop = CaptureLoop::new(
        capture_service(db),
        reducer.clone(),
        SOURCE.0,
        SOURCE.1,
        config.backfill_limit,
    );

    let (dispatcher, rx) = ChannelDispatcher::channel(config.queue_capacity);
    let workers = tokio::spawn(ReductionWorkers::new(reducer, config.reduction_workers).run(rx));

    let mut ticker = tokio::time::interval(config.capture_interval());
    info!(
        interval_secs = config.capture_interval().as_secs(),
        workers = config.reduction_workers,
        "capture loop started"
    );

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let report = capture_loop.tick(&dispatcher).await;
                debug!(captured = ?report.captured, backfilled = ?report.backfill.map(|r| r.processed), "tick finished");
            }
            _ = tokio::signal::ctrl_c() => {
                info!("shutdown requested, draining reduction queue");
                break;
            }
        }
    }

    drop(dispatcher);
    let report = workers.await.context("reduction workers panicked")?;
    println!(
        "Reduced {} raw events ({} created, {} already existed, {} skipped, {} failed)",
        report.total(),
        report.created,
        report.already_existed,
        report.skipped,
        report.failed.len()
    );
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let mut config = load_config(&cli)?;
    let db = open_database(&config)?;

    match cli.command {
        Commands::Provision => cmd_provision(&db),
        Commands::Capture => cmd_capture(db),
        Commands::Reduce { id } => cmd_reduce(db, id),
        Commands::Backfill { limit } => cmd_backfill(db, limit.unwrap_or(config.backfill_limit)),
        Commands::Run { interval, workers } => {
            if let Some(secs) = interval {
                config.capture_interval_secs = secs;
            }
            if let Some(n) = workers {
                config.reduction_workers = n;
            }
            cmd_run(db, &config).await
        }
    }
}
