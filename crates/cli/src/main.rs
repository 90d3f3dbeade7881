//! moundscan CLI - candidate mound detection runs

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{Level, info};
use tracing_subscriber::FmtSubscriber;

use moundscan_core::Raster;
use moundscan_core::io::read_band;
use moundscan_pipeline::config::RegionConfig;
use moundscan_pipeline::{
    DetectionConfig, DetectionPipeline, DetectionResult, DirectorySink, ExportSink, ManifestSource,
    MemorySource, RasterSource, Strategy, spawn_detection,
};

// ─── CLI structure ──────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "moundscan")]
#[command(author, version, about = "Candidate mound detection from elevation and satellite rasters", long_about = None)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a configured detection over a manifest of input files
    Run {
        /// TOML run configuration
        #[arg(short, long)]
        config: PathBuf,
        /// JSON manifest listing elevation, scenes and labels
        #[arg(short, long)]
        source: PathBuf,
        /// Output directory for rasters, candidates and the export index
        #[arg(short, long)]
        out: PathBuf,
    },
    /// Relief scoring over a whole DEM with default settings
    Relief {
        /// Input DEM file
        input: PathBuf,
        /// Output directory
        output: PathBuf,
        /// Run identifier used to name outputs
        #[arg(long, default_value = "relief")]
        run_id: String,
        /// Combined score above which pixels become candidates
        #[arg(long)]
        cutoff: Option<f64>,
        /// Analysis radii in map units, comma separated
        #[arg(long, value_delimiter = ',')]
        radii: Option<Vec<f64>>,
    },
    /// Show information about a raster file
    Info {
        /// Input raster file
        input: PathBuf,
    },
}

// ─── Helpers ────────────────────────────────────────────────────────────

fn setup_logging(verbose: bool) -> Result<()> {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber).context("setting default subscriber failed")
}

fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

fn read_raster(path: &Path) -> Result<Raster<f64>> {
    let pb = spinner("Reading raster...");
    let raster = read_band(path).with_context(|| format!("Failed to read {}", path.display()))?;
    pb.finish_and_clear();
    info!("Input: {} x {}", raster.cols(), raster.rows());
    Ok(raster)
}

/// Region covering the full extent of a raster
fn extent_region(raster: &Raster<f64>) -> RegionConfig {
    let (min_x, min_y, max_x, max_y) = raster.bounds();
    RegionConfig {
        epsg: raster.crs().and_then(|c| c.epsg()),
        ring: Some(vec![[min_x, min_y], [max_x, min_y], [max_x, max_y], [min_x, max_y]]),
        ..Default::default()
    }
}

fn execute(
    config: DetectionConfig,
    source: Arc<dyn RasterSource>,
    sink: Box<dyn ExportSink>,
) -> Result<DetectionResult> {
    let pipeline = DetectionPipeline::new(config, source, sink).context("Invalid configuration")?;
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start runtime")?;

    let pb = spinner("Running detection...");
    let result = runtime.block_on(spawn_detection(pipeline).join());
    pb.finish_and_clear();
    result.context("Detection run failed")
}

fn done(result: &DetectionResult, out: &Path, elapsed: std::time::Duration) {
    println!(
        "Run {} ({}): {} candidate(s)",
        result.run_id,
        result.strategy,
        result.candidates.len()
    );
    for record in &result.exports {
        match &record.path {
            Some(path) => println!("  {} -> {}", record.name, path.display()),
            None => println!("  {}", record.name),
        }
    }
    println!("Outputs in: {}", out.display());
    println!("  Processing time: {:.2?}", elapsed);
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose)?;

    match cli.command {
        // ── Run ──────────────────────────────────────────────────────
        Commands::Run { config, source, out } => {
            let start = Instant::now();
            let config = DetectionConfig::load(&config)
                .with_context(|| format!("Failed to load {}", config.display()))?;
            let source = ManifestSource::open(&source)
                .with_context(|| format!("Failed to open manifest {}", source.display()))?;
            let sink = DirectorySink::create(&out, config.export.max_pixels)
                .context("Failed to create output directory")?;
            info!("Run {} using the {} strategy", config.run_id, config.strategy);

            let result = execute(config, Arc::new(source), Box::new(sink))?;
            done(&result, &out, start.elapsed());
        }

        // ── Relief ───────────────────────────────────────────────────
        Commands::Relief {
            input,
            output,
            run_id,
            cutoff,
            radii,
        } => {
            let start = Instant::now();
            let dem = read_raster(&input)?;

            let mut config = DetectionConfig {
                run_id,
                strategy: Strategy::Relief,
                region: Some(extent_region(&dem)),
                ..Default::default()
            };
            if let Some(cutoff) = cutoff {
                config.relief.candidate_cutoff = cutoff;
            }
            if let Some(radii) = radii {
                if radii.is_empty() {
                    bail!("--radii needs at least one value");
                }
                config.relief.radii_m = radii;
            }

            let sink = DirectorySink::create(&output, config.export.max_pixels)
                .context("Failed to create output directory")?;
            let source = MemorySource::new().with_elevation(dem);
            let result = execute(config, Arc::new(source), Box::new(sink))?;
            done(&result, &output, start.elapsed());
        }

        // ── Info ─────────────────────────────────────────────────────
        Commands::Info { input } => {
            let raster = read_raster(&input)?;
            let (rows, cols) = raster.shape();
            let bounds = raster.bounds();
            let stats = raster.statistics();

            println!("File: {}", input.display());
            println!("Dimensions: {} x {} ({} cells)", cols, rows, raster.len());
            println!("Cell size: {}", raster.cell_size());
            println!(
                "Bounds: ({:.6}, {:.6}) - ({:.6}, {:.6})",
                bounds.0, bounds.1, bounds.2, bounds.3
            );
            if let Some(crs) = raster.crs() {
                println!("CRS: {}", crs);
            }
            println!("\nStatistics:");
            if let Some(min) = stats.min {
                println!("  Min: {:.4}", min);
            }
            if let Some(max) = stats.max {
                println!("  Max: {:.4}", max);
            }
            if let Some(mean) = stats.mean {
                println!("  Mean: {:.4}", mean);
            }
            println!(
                "  Valid cells: {} ({:.1}%)",
                stats.valid_count,
                100.0 * stats.valid_count as f64 / raster.len().max(1) as f64
            );
        }
    }

    Ok(())
}
