//! CLI entry point for the SAR drought estimator.
//!
//! Provides subcommands for estimating drought over a single request or a
//! directory of requests, analyzing a local backscatter grid, computing
//! optical indices, and printing the static reference tables.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use ndarray::Array2;
use sar_drought::{
    analyzers::raster::{ArrayAnalysis, analyze_array, linear_to_db},
    baselines::{BaselineProvider, HistoricalBaselines},
    config::EngineConfig,
    orchestrator::EstimationOrchestrator,
    output::{append_record, feature_collection, legend_json, print_pretty, write_geojson},
    parser::{AnalysisMode, AnalysisRequest, parse_request},
    summary::{SummaryContext, TemplateSummary},
    thresholds::{Polarization, seasonal_baselines},
    vegetation::OpticalIndex,
};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::Instrument;
use tracing::{error, info, warn};
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "sar_drought")]
#[command(about = "Estimate agricultural drought from Sentinel-1 radar backscatter", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Overrides for the request's analysis mode.
#[derive(Args, Debug, Default)]
struct ModeArgs {
    /// Polarization to evaluate (VV or VH)
    #[arg(long)]
    polarization: Option<String>,

    /// Skip the Lee speckle filter on raster input
    #[arg(long, default_value_t = false)]
    no_speckle_filter: bool,

    /// Compare against the stored historical baseline
    #[arg(long, default_value_t = false)]
    historical_baseline: bool,

    /// Year of the historical baseline
    #[arg(long)]
    baseline_year: Option<i32>,
}

impl ModeArgs {
    fn apply(&self, mode: &mut AnalysisMode) {
        if let Some(p) = &self.polarization {
            mode.polarization = Polarization::from(p.clone());
        }
        if self.no_speckle_filter {
            mode.apply_speckle_filter = false;
        }
        if self.historical_baseline {
            mode.use_historical_baseline = true;
        }
        if let Some(year) = self.baseline_year {
            mode.baseline_year = year;
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum IndexArg {
    Ndvi,
    Ndwi,
}

impl From<IndexArg> for OpticalIndex {
    fn from(value: IndexArg) -> Self {
        match value {
            IndexArg::Ndvi => OpticalIndex::Ndvi,
            IndexArg::Ndwi => OpticalIndex::Ndwi,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Estimate drought for one JSON request
    Estimate {
        /// Path to the request JSON
        #[arg(value_name = "REQUEST_JSON")]
        request: PathBuf,

        /// CSV file to append the result to
        #[arg(short, long)]
        output: Option<String>,

        /// Write a map-ready GeoJSON FeatureCollection here
        #[arg(long)]
        geojson: Option<String>,

        /// Identifier stamped on the GeoJSON feature (defaults to the file stem)
        #[arg(long)]
        job_id: Option<String>,

        /// Also print a plain-language summary
        #[arg(long, default_value_t = false)]
        summary: bool,

        #[command(flatten)]
        mode: ModeArgs,
    },
    /// Estimate every *.json request in a directory
    Batch {
        /// Directory containing request files
        #[arg(value_name = "DIR")]
        dir: PathBuf,

        /// CSV file to append results to
        #[arg(short, long, default_value = "estimates.csv")]
        output: String,

        /// Maximum number of concurrent estimations
        #[arg(short, long, default_value_t = 4)]
        concurrency: usize,

        #[command(flatten)]
        mode: ModeArgs,
    },
    /// Analyze a local CSV grid of backscatter values
    Grid {
        /// CSV with one raster row per line, no header; empty cells are no-data
        #[arg(value_name = "CSV")]
        grid: PathBuf,

        /// Pixel edge length in metres
        #[arg(long, default_value_t = 10.0)]
        pixel_size: f64,

        /// Values are linear power, not dB
        #[arg(long, default_value_t = false)]
        linear: bool,

        /// Baseline in dB to compute the anomaly against
        #[arg(long)]
        baseline_db: Option<f64>,

        #[command(flatten)]
        mode: ModeArgs,
    },
    /// Optical vegetation (NDVI) or water (NDWI) index for one request
    Vegetation {
        #[arg(value_name = "REQUEST_JSON")]
        request: PathBuf,

        #[arg(long, value_enum, default_value_t = IndexArg::Ndvi)]
        index: IndexArg,
    },
    /// Print the severity legend
    Legend,
    /// Print the seasonal baseline table
    Baselines {
        /// Only this month (1-12)
        #[arg(long)]
        month: Option<u32>,

        /// Also show historical values for this year (from SAR_BASELINES_CSV)
        #[arg(long)]
        year: Option<i32>,

        #[arg(long, default_value = "VV")]
        polarization: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path =
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| "logs/sar_drought.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("sar_drought.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse()?));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse()?));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Estimate {
            request,
            output,
            geojson,
            job_id,
            summary,
            mode,
        } => {
            let orchestrator = orchestrator_from_env().await?;
            let req = load_request(&request, &mode)?;
            let estimate = orchestrator.estimate_request(&req).await;

            print_pretty(&estimate);
            println!("{}", serde_json::to_string_pretty(&estimate)?);

            if summary {
                let context = SummaryContext::from_request(&req.polygon, &req.date_window);
                println!("{}", TemplateSummary.render(&estimate, &context));
            }
            if let Some(path) = output {
                append_record(&path, &estimate)?;
            }
            if let Some(path) = geojson {
                let job_id = job_id.unwrap_or_else(|| file_stem(&request));
                let fc = feature_collection(&req.polygon, &estimate, &job_id, &req.date_window)?;
                write_geojson(&path, &fc)?;
            }
        }
        Commands::Batch {
            dir,
            output,
            concurrency,
            mode,
        } => {
            let orchestrator = orchestrator_from_env().await?;
            run_batch(orchestrator, &dir, &output, concurrency, &mode).await?;
        }
        Commands::Grid {
            grid,
            pixel_size,
            linear,
            baseline_db,
            mode,
        } => {
            let mut analysis_mode = AnalysisMode::default();
            mode.apply(&mut analysis_mode);

            let mut values = load_grid(&grid)?;
            if linear {
                values = linear_to_db(&values);
            }
            let estimate = analyze_array(
                &values,
                &ArrayAnalysis {
                    pixel_size_m: pixel_size,
                    polarization: analysis_mode.polarization,
                    apply_speckle_filter: analysis_mode.apply_speckle_filter,
                    baseline_db,
                },
            );
            println!("{}", serde_json::to_string_pretty(&estimate)?);
        }
        Commands::Vegetation { request, index } => {
            let orchestrator = orchestrator_from_env().await?;
            let req = load_request(&request, &ModeArgs::default())?;
            let estimate = orchestrator
                .estimate_vegetation(&req.polygon, &req.date_window, index.into())
                .await;
            println!("{}", serde_json::to_string_pretty(&estimate)?);
        }
        Commands::Legend => {
            println!("{}", serde_json::to_string_pretty(&legend_json()?)?);
        }
        Commands::Baselines {
            month,
            year,
            polarization,
        } => {
            let polarization = Polarization::from(polarization);
            let historical = match std::env::var("SAR_BASELINES_CSV") {
                Ok(path) => Some(HistoricalBaselines::load(&path)?),
                Err(_) => None,
            };

            for (m, db) in seasonal_baselines() {
                if month.is_some_and(|wanted| wanted != m) {
                    continue;
                }
                println!("{m:>2}  seasonal      {db:>6.1} dB");
                if let (Some(store), Some(year)) = (&historical, year) {
                    match store.baseline_db(polarization, year, m) {
                        Some(h) => println!("{m:>2}  {polarization}  {year}     {h:>6.1} dB"),
                        None => println!("{m:>2}  {polarization}  {year}     missing"),
                    }
                }
            }
        }
    }

    Ok(())
}

async fn orchestrator_from_env() -> Result<EstimationOrchestrator> {
    let config = EngineConfig::from_env().await?;
    Ok(EstimationOrchestrator::from_config(&config).await)
}

/// Reads a request file and applies CLI overrides to its mode.
#[tracing::instrument(skip_all, fields(path = %path.display()))]
fn load_request(path: &Path, overrides: &ModeArgs) -> Result<AnalysisRequest> {
    let bytes = std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    let mut request = parse_request(&bytes)?;
    overrides.apply(&mut request.mode);
    Ok(request)
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .and_then(OsStr::to_str)
        .unwrap_or("analysis")
        .to_string()
}

/// Parses a headerless numeric CSV into a grid. Empty or non-numeric cells
/// are no-data (NaN); rows must all have the same width.
fn load_grid(path: &Path) -> Result<Array2<f64>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .trim(csv::Trim::All)
        .from_path(path)?;

    let mut data = Vec::new();
    let mut rows = 0;
    let mut cols = None;
    for record in rdr.records() {
        let record = record?;
        match cols {
            None => cols = Some(record.len()),
            Some(c) if c != record.len() => {
                anyhow::bail!("row {} has {} cells, expected {}", rows + 1, record.len(), c)
            }
            _ => {}
        }
        data.extend(record.iter().map(|cell| cell.parse::<f64>().unwrap_or(f64::NAN)));
        rows += 1;
    }

    Ok(Array2::from_shape_vec((rows, cols.unwrap_or(0)), data)?)
}

/// Estimates every request in `dir` with bounded concurrency and appends one
/// CSV row per request, in file-name order.
#[tracing::instrument(skip_all, fields(dir = %dir.display(), concurrency = concurrency))]
async fn run_batch(
    orchestrator: EstimationOrchestrator,
    dir: &Path,
    output: &str,
    concurrency: usize,
    overrides: &ModeArgs,
) -> Result<()> {
    let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.extension() == Some(OsStr::new("json")))
        .collect();
    paths.sort();
    info!(request_count = paths.len(), "Starting batch");

    let orchestrator = Arc::new(orchestrator);
    let semaphore = Arc::new(tokio::sync::Semaphore::new(concurrency.max(1)));
    let mut tasks = vec![];

    for path in paths {
        let request = match load_request(&path, overrides) {
            Ok(r) => r,
            Err(e) => {
                error!(path = %path.display(), error = %e, "Skipping unreadable request");
                continue;
            }
        };

        let sem = semaphore.clone();
        let orchestrator = orchestrator.clone();
        let span = tracing::info_span!("estimate_request", request = %path.display());

        let task = tokio::spawn(
            async move {
                let _permit = sem.acquire().await.ok()?;
                Some(orchestrator.estimate_request(&request).await)
            }
            .instrument(span),
        );
        tasks.push((path, task));
    }

    let mut written = 0;
    for (path, task) in tasks {
        match task.await {
            Ok(Some(estimate)) => {
                append_record(output, &estimate)?;
                written += 1;
            }
            Ok(None) => warn!(path = %path.display(), "Batch semaphore closed"),
            Err(e) => error!(path = %path.display(), error = %e, "Estimation task failed"),
        }
    }

    info!(written, output, "Batch finished");
    Ok(())
}
