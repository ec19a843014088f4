//! Reverse geocoding from the command line.
//!
//! Resolves one coordinate, or a batch of `lat lon` lines read from stdin,
//! against a snapshot built from the configured geometry store.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use serde::Serialize;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use georesolve::config::{Config, ResolverConfig};
use georesolve::resolver::BoundaryMatch;
use georesolve::store::NdjsonStore;
use georesolve::{GeoPoint, ResolveError, ResolvedLocation, Resolver, Snapshot};

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

#[derive(Parser, Debug)]
#[command(name = "query")]
#[command(about = "Resolve coordinates to city, state and country")]
struct Args {
    /// TOML configuration file
    #[arg(short, long)]
    config: PathBuf,

    /// Latitude
    #[arg(long, allow_hyphen_values = true, required_unless_present = "batch")]
    lat: Option<f64>,

    /// Longitude
    #[arg(long, allow_hyphen_values = true, required_unless_present = "batch")]
    lon: Option<f64>,

    /// Read `lat lon` pairs from stdin, one per line
    #[arg(long)]
    batch: bool,

    /// Also list every boundary containing the point
    #[arg(long)]
    debug: bool,

    /// Rebuild the hierarchy even if a persisted edge file exists
    #[arg(long)]
    rebuild: bool,

    #[arg(long, value_enum, default_value = "json")]
    format: OutputFormat,

    /// Nearest-place search radius in metres (overrides the config file)
    #[arg(long)]
    search_radius_m: Option<f64>,

    /// Distance in metres beyond which a city match is approximate
    #[arg(long)]
    exact_tolerance_m: Option<f64>,

    #[arg(long)]
    max_ascent_depth: Option<usize>,

    #[arg(long)]
    max_ascent_paths: Option<usize>,

    /// Report native names instead of English ones
    #[arg(long)]
    native_names: bool,
}

impl Args {
    /// Apply resolver flags on top of the file settings
    fn apply_overrides(&self, resolver: &mut ResolverConfig) -> Result<()> {
        if let Some(radius) = self.search_radius_m {
            resolver.search_radius_m = radius;
        }
        if let Some(tolerance) = self.exact_tolerance_m {
            resolver.exact_tolerance_m = tolerance;
        }
        if let Some(depth) = self.max_ascent_depth {
            resolver.max_ascent_depth = depth;
        }
        if let Some(paths) = self.max_ascent_paths {
            resolver.max_ascent_paths = paths;
        }
        if self.native_names {
            resolver.prefer_english_names = false;
        }
        resolver.validate().context("Invalid resolver flags")
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum OutputFormat {
    Json,
    Text,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryOutput<'a> {
    lat: f64,
    lon: f64,
    #[serde(flatten)]
    outcome: Outcome<'a>,
    #[serde(skip_serializing_if = "Option::is_none")]
    containing: Option<Vec<BoundaryMatch>>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum Outcome<'a> {
    Found(&'a ResolvedLocation),
    Error { error: String },
}

fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let args = Args::parse();
    let mut config = Config::load_from_file(&args.config)
        .with_context(|| format!("Failed to load config {}", args.config.display()))?;
    args.apply_overrides(&mut config.resolver)?;

    let store = NdjsonStore::open(&config.store.boundaries, &config.store.places)
        .context("Failed to load geometry store")?;

    let snapshot = match &config.store.edges {
        Some(edges) if edges.exists() && !args.rebuild => {
            info!("Using persisted hierarchy {}", edges.display());
            Snapshot::load_with_edges(&store, edges)
        }
        _ => Snapshot::load(&store, &config.builder),
    }
    .context("Failed to build snapshot")?;

    let resolver = Resolver::new(Arc::new(snapshot), &config.resolver);

    let stdout = io::stdout();
    let mut out = stdout.lock();

    if args.batch {
        let points = read_points(io::stdin().lock())?;
        let results = resolver.resolve_batch(&points);
        for (point, result) in points.iter().zip(&results) {
            let containing = args.debug.then(|| resolver.containing(*point).unwrap_or_default());
            print_result(&mut out, args.format, *point, result, containing)?;
        }
    } else {
        let (Some(lat), Some(lon)) = (args.lat, args.lon) else {
            anyhow::bail!("--lat and --lon are required without --batch");
        };
        let point = GeoPoint::new(lat, lon);
        let result = resolver.resolve(point);
        let containing = if args.debug {
            Some(resolver.containing(point).unwrap_or_default())
        } else {
            None
        };
        print_result(&mut out, args.format, point, &result, containing)?;
    }

    print_diagnostics(&config.resolver, &resolver);
    Ok(())
}

/// Parse `lat lon` or `lat,lon` lines; bad lines are reported and skipped
fn read_points<R: BufRead>(reader: R) -> Result<Vec<GeoPoint>> {
    let mut points = Vec::new();
    for (i, line) in reader.lines().enumerate() {
        let line = line.context("Failed to read stdin")?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        match parse_point(trimmed) {
            Some(point) => points.push(point),
            None => warn!("line {}: cannot parse '{}'", i + 1, trimmed),
        }
    }
    Ok(points)
}

fn parse_point(line: &str) -> Option<GeoPoint> {
    let mut parts = line
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|s| !s.is_empty());
    let lat = parts.next()?.parse().ok()?;
    let lon = parts.next()?.parse().ok()?;
    if parts.next().is_some() {
        return None;
    }
    Some(GeoPoint::new(lat, lon))
}

fn print_result<W: Write>(
    out: &mut W,
    format: OutputFormat,
    point: GeoPoint,
    result: &Result<ResolvedLocation, ResolveError>,
    containing: Option<Vec<BoundaryMatch>>,
) -> Result<()> {
    match format {
        OutputFormat::Json => {
            let output = QueryOutput {
                lat: point.lat,
                lon: point.lon,
                outcome: match result {
                    Ok(location) => Outcome::Found(location),
                    Err(e) => Outcome::Error {
                        error: e.to_string(),
                    },
                },
                containing,
            };
            writeln!(out, "{}", serde_json::to_string(&output)?)?;
        }
        OutputFormat::Text => {
            match result {
                Ok(location) => writeln!(out, "{}, {}: {}", point.lat, point.lon, describe(location))?,
                Err(e) => writeln!(out, "{}, {}: {}", point.lat, point.lon, e)?,
            }
            for m in containing.iter().flatten() {
                writeln!(
                    out,
                    "    level {:>2}  {:<40}  {}",
                    m.level,
                    m.name.as_deref().unwrap_or("(unnamed)"),
                    m.id
                )?;
            }
        }
    }
    Ok(())
}

fn describe(location: &ResolvedLocation) -> String {
    let mut parts: Vec<String> = Vec::new();
    if let Some(city) = &location.city {
        let mut city = city.clone();
        if location.city_approximate {
            if let Some(d) = location.distance_m {
                city.push_str(&format!(" (~{:.1} km)", d / 1000.0));
            }
        }
        parts.push(city);
    }
    if let Some(state) = &location.state {
        parts.push(state.clone());
    }
    if let Some(country) = &location.country {
        let mut country = country.clone();
        if location.country_derived_from_state {
            country.push_str(" (derived)");
        }
        parts.push(country);
    }
    parts.join(", ")
}

fn print_diagnostics(config: &ResolverConfig, resolver: &Resolver) {
    let diag = resolver.diagnostics();
    info!(
        "search radius {} m, {} resolutions ({} approximate city, {} derived country, {} not found)",
        config.search_radius_m,
        diag.resolutions,
        diag.approximate_city_resolutions,
        diag.derived_country_resolutions,
        diag.not_found_resolutions
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_point() {
        assert_eq!(parse_point("48.85 2.35"), Some(GeoPoint::new(48.85, 2.35)));
        assert_eq!(parse_point("48.85,2.35"), Some(GeoPoint::new(48.85, 2.35)));
        assert_eq!(parse_point("48.85, -2.35"), Some(GeoPoint::new(48.85, -2.35)));
        assert_eq!(parse_point("48.85"), None);
        assert_eq!(parse_point("a b"), None);
        assert_eq!(parse_point("1 2 3"), None);
    }

    #[test]
    fn test_flags_override_resolver_config() {
        let args = Args::parse_from([
            "query",
            "--config",
            "georesolve.toml",
            "--lat",
            "-33.9",
            "--lon",
            "18.4",
            "--search-radius-m",
            "25000",
            "--native-names",
        ]);
        let mut resolver = ResolverConfig::default();
        args.apply_overrides(&mut resolver).unwrap();
        assert_eq!(resolver.search_radius_m, 25_000.0);
        assert_eq!(resolver.exact_tolerance_m, ResolverConfig::default().exact_tolerance_m);
        assert!(!resolver.prefer_english_names);

        let args = Args::parse_from([
            "query",
            "--config",
            "georesolve.toml",
            "--batch",
            "--max-ascent-paths",
            "0",
        ]);
        assert!(args.apply_overrides(&mut ResolverConfig::default()).is_err());
    }

    #[test]
    fn test_read_points_skips_bad_lines() {
        let input = "1 2\n\n# comment\nnope\n3,4\n";
        let points = read_points(input.as_bytes()).unwrap();
        assert_eq!(points, vec![GeoPoint::new(1.0, 2.0), GeoPoint::new(3.0, 4.0)]);
    }
}
