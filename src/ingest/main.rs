//! Snapshot build pipeline.
//!
//! Loads boundaries and places from NDJSON, builds the spatial indexes and
//! hierarchy graph, persists the edge set and prints diagnostics.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use georesolve::config::{BuilderConfig, Config, ResolverConfig};
use georesolve::diagnostics::DiagnosticsSnapshot;
use georesolve::hierarchy::BuildReport;
use georesolve::store::NdjsonStore;
use georesolve::{Resolver, Snapshot};

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

#[derive(Parser, Debug)]
#[command(name = "ingest")]
#[command(about = "Build a resolution snapshot from boundary and place NDJSON")]
struct Args {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Boundary NDJSON (overrides config)
    #[arg(long)]
    boundaries: Option<PathBuf>,

    /// Place NDJSON (overrides config)
    #[arg(long)]
    places: Option<PathBuf>,

    /// Where to write the hierarchy edge CSV (defaults to store.edges from config)
    #[arg(long)]
    edges_out: Option<PathBuf>,

    /// Run the derived-edge pass on one thread
    #[arg(long)]
    sequential: bool,

    /// Resolve every place's own location afterwards and report gaps
    #[arg(long)]
    verify: bool,
}

#[derive(Serialize)]
struct IngestSummary {
    built_at: String,
    boundaries_indexed: usize,
    boundaries_without_geometry: usize,
    places: usize,
    edges: usize,
    build: Option<BuildReport>,
    diagnostics: DiagnosticsSnapshot,
    #[serde(skip_serializing_if = "Option::is_none")]
    verification: Option<Verification>,
}

#[derive(Serialize, Default)]
struct Verification {
    checked: usize,
    without_state: usize,
    without_country: usize,
    derived_country: usize,
}

fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let args = Args::parse();

    info!("Georesolve Ingest Pipeline");

    let config = match &args.config {
        Some(path) => Some(
            Config::load_from_file(path)
                .with_context(|| format!("Failed to load config {}", path.display()))?,
        ),
        None => None,
    };

    let boundaries = args
        .boundaries
        .clone()
        .or_else(|| config.as_ref().map(|c| c.store.boundaries.clone()))
        .context("No boundary file given (use --boundaries or a config file)")?;
    let places = args
        .places
        .clone()
        .or_else(|| config.as_ref().map(|c| c.store.places.clone()))
        .context("No place file given (use --places or a config file)")?;
    let edges_out = args
        .edges_out
        .clone()
        .or_else(|| config.as_ref().and_then(|c| c.store.edges.clone()));

    let mut builder_config = config
        .as_ref()
        .map(|c| c.builder.clone())
        .unwrap_or_default();
    if args.sequential {
        builder_config.parallel = false;
    }
    let resolver_config = config
        .as_ref()
        .map(|c| c.resolver.clone())
        .unwrap_or_default();

    info!("Boundaries: {}", boundaries.display());
    info!("Places: {}", places.display());

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}")?);
    spinner.enable_steady_tick(Duration::from_millis(120));

    spinner.set_message("Loading geometry store...");
    let store = NdjsonStore::open(&boundaries, &places).context("Failed to load geometry store")?;

    spinner.set_message("Building snapshot...");
    let snapshot = build_snapshot(&store, &builder_config)?;
    spinner.finish_with_message("Snapshot built");

    if let Some(path) = &edges_out {
        snapshot
            .graph()
            .write_csv(path)
            .with_context(|| format!("Failed to write edges to {}", path.display()))?;
    } else {
        warn!("No edge output path configured; hierarchy not persisted");
    }

    let snapshot = Arc::new(snapshot);
    let verification = if args.verify {
        Some(verify(Arc::clone(&snapshot), &resolver_config)?)
    } else {
        None
    };

    let summary = IngestSummary {
        built_at: snapshot.built_at().to_rfc3339(),
        boundaries_indexed: snapshot.index().len(),
        boundaries_without_geometry: snapshot.index().skipped(),
        places: snapshot.places().len(),
        edges: snapshot.graph().len(),
        build: snapshot.report().copied(),
        diagnostics: snapshot.diagnostics().snapshot(),
        verification,
    };
    println!("{}", serde_json::to_string_pretty(&summary)?);

    Ok(())
}

fn build_snapshot(store: &NdjsonStore, config: &BuilderConfig) -> Result<Snapshot> {
    let snapshot = Snapshot::load(store, config).context("Failed to build snapshot")?;
    info!(
        "Indexed {} boundaries, {} places, {} hierarchy edges",
        snapshot.index().len(),
        snapshot.places().len(),
        snapshot.graph().len()
    );
    Ok(snapshot)
}

/// Resolve each place at its own location
fn verify(snapshot: Arc<Snapshot>, config: &ResolverConfig) -> Result<Verification> {
    let points: Vec<_> = snapshot.places().places().map(|p| p.location).collect();
    let resolver = Resolver::new(snapshot, config);

    let pb = ProgressBar::new(points.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({per_sec})",
            )?
            .progress_chars("#>-"),
    );

    let mut verification = Verification::default();
    for chunk in points.chunks(10_000) {
        for result in resolver.resolve_batch(chunk) {
            verification.checked += 1;
            match result {
                Ok(location) => {
                    if location.state.is_none() {
                        verification.without_state += 1;
                    }
                    if location.country.is_none() {
                        verification.without_country += 1;
                    }
                    if location.country_derived_from_state {
                        verification.derived_country += 1;
                    }
                }
                Err(_) => {
                    verification.without_state += 1;
                    verification.without_country += 1;
                }
            }
        }
        pb.inc(chunk.len() as u64);
    }
    pb.finish_with_message("Verification complete");

    info!(
        "Verified {} places: {} without state, {} without country",
        verification.checked, verification.without_state, verification.without_country
    );
    Ok(verification)
}
