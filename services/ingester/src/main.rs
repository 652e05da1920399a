//! Hazard simulation ingester.
//!
//! Reads a job file naming an event and its datasets, contours and stores
//! every declared variable, and records each outcome in the ingest log.

mod job;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use ingestion::{IngestReport, Ingester};
use storage::{GeometryStore, MemoryStore, PgStore};
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

use job::JobFile;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Json,
    Pretty,
}

#[derive(Parser, Debug)]
#[command(name = "ingester")]
#[command(about = "Ingests hazard simulation output into contour polygons and point features")]
struct Args {
    /// Job file (YAML) describing the event and datasets
    #[arg(short, long)]
    job: PathBuf,

    /// PostgreSQL connection string
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,

    /// Ingest into memory and print a summary instead of writing to the database
    #[arg(long)]
    dry_run: bool,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Json)]
    log_format: LogFormat,
}

fn init_tracing(level: &str, format: LogFormat) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let builder = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr);

    match format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
    }
    .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))
}

async fn open_store(args: &Args) -> Result<Arc<dyn GeometryStore>> {
    if args.dry_run {
        info!("Dry run: using an in-memory store");
        return Ok(Arc::new(MemoryStore::new()));
    }

    let url = args
        .database_url
        .as_deref()
        .context("--database-url or DATABASE_URL is required unless --dry-run is set")?;
    let store = PgStore::connect(url).await?;
    store.migrate().await?;
    Ok(Arc::new(store))
}

async fn print_summary(store: &dyn GeometryStore, event_id: &str, reports: &[IngestReport]) -> Result<()> {
    for report in reports {
        let paths: Vec<String> = report.datasets.iter().map(|p| p.display().to_string()).collect();
        println!("{}", paths.join(" + "));
        for variable in &report.variables {
            println!(
                "  {:<20} steps={:<4} polygons={:<6} points={:<8} empty={}",
                variable.name, variable.steps, variable.polygons, variable.points, variable.empty_steps
            );
        }
        for name in &report.skipped {
            println!("  {:<20} skipped (unknown variable)", name);
        }
    }

    for variable in store.variables(event_id).await? {
        let legend: Vec<String> = variable
            .color_bar
            .iter()
            .map(|stop| format!("{}={}", stop.value, stop.color))
            .collect();
        println!("{} [{}]: {}", variable.name(), variable.spec.unit.as_str(), legend.join(" "));
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();
    init_tracing(&args.log_level, args.log_format)?;

    let job = JobFile::load(&args.job)?;
    let config = job.ingest_config()?;
    info!(
        event = %job.event.id,
        passes = job.datasets.len(),
        datasets = job.manifest_count(),
        dry_run = args.dry_run,
        "Starting ingestion job"
    );

    let store = open_store(&args).await?;
    let ingester = Ingester::new(store.clone(), job.event.clone(), config)?;

    let mut reports = Vec::new();
    let mut failures = 0;
    for entry in &job.datasets {
        match ingester.ingest_parts(entry.manifests()).await {
            Ok(report) => reports.push(report),
            Err(e) => {
                error!(error = %e, variable = e.variable().unwrap_or("-"), "Dataset ingestion failed");
                failures += 1;
            }
        }
    }

    if args.dry_run {
        print_summary(store.as_ref(), &job.event.id, &reports).await?;
    }

    if failures > 0 {
        anyhow::bail!("{} of {} ingestion passes failed", failures, job.datasets.len());
    }
    info!(passes = reports.len(), "Ingestion job complete");
    Ok(())
}
