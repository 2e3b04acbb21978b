//! Quantity Recorder CLI
//!
//! Runs timed recordings against the simulated data source and inspects the
//! resulting data files.

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use quantity_recorder::{
    config::Config,
    recorder::{FileResult, QuantitySampleRecorder, RecorderHandle, RecorderObserver, TaskStep},
    source::{QuantityType, SimulatedSource, Unit},
    RecorderError, RecorderState, RecordingSummary, VERSION,
};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "quantity-recorder")]
#[command(version = VERSION)]
#[command(about = "Record live quantity samples for research tasks", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Record samples from the simulated source
    Record {
        /// Quantity to record (e.g. heart-rate, respiratory-rate)
        #[arg(long)]
        quantity: Option<QuantityType>,

        /// Unit to persist samples in (e.g. count/min)
        #[arg(long)]
        unit: Option<Unit>,

        /// Recording duration in seconds
        #[arg(long)]
        duration: Option<u64>,

        /// Task step identifier
        #[arg(long)]
        step: Option<String>,

        /// Output directory for the data file
        #[arg(long, short)]
        output: Option<PathBuf>,

        /// Milliseconds between simulated batches
        #[arg(long)]
        interval_ms: Option<u64>,

        /// Samples per simulated batch
        #[arg(long)]
        batch_size: Option<usize>,

        /// Print every update as it arrives
        #[arg(long)]
        live: bool,
    },

    /// Summarize a recorded data file
    Inspect {
        /// Path to a .jsonl data file
        file: PathBuf,
    },

    /// List data files in the output directory
    List {
        /// Directory to scan (defaults to the configured output path)
        #[arg(long, short)]
        output: Option<PathBuf>,
    },

    /// List quantity types and their units
    Types,

    /// Show configuration
    Config,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Record {
            quantity,
            unit,
            duration,
            step,
            output,
            interval_ms,
            batch_size,
            live,
        } => {
            let mut config = Config::load().unwrap_or_default();
            if let Some(quantity) = quantity {
                config.quantity = quantity;
                // An explicit quantity resets a configured unit that may not fit it.
                config.unit = None;
            }
            if unit.is_some() {
                config.unit = unit;
            }
            if let Some(secs) = duration {
                config.duration = Duration::from_secs(secs);
            }
            if let Some(step) = step {
                config.step_identifier = step;
            }
            if let Some(output) = output {
                config.output_path = output;
            }
            if let Some(ms) = interval_ms {
                config.simulated.interval_ms = ms;
            }
            if let Some(size) = batch_size {
                config.simulated.batch_size = size;
            }
            cmd_record(&config, live)
        }
        Commands::Inspect { file } => cmd_inspect(&file),
        Commands::List { output } => cmd_list(output),
        Commands::Types => {
            cmd_types();
            Ok(())
        }
        Commands::Config => {
            cmd_config();
            Ok(())
        }
    }
}

/// Prints updates to stdout as they arrive.
struct ConsoleObserver {
    live: bool,
}

impl RecorderObserver for ConsoleObserver {
    fn recorder_did_update(&self, recorder: &RecorderHandle) {
        if !self.live {
            return;
        }
        if let Some(sample) = recorder.latest_sample() {
            println!(
                "  {} {:.1} {} at {}",
                recorder.quantity_type(),
                sample.value,
                sample.unit,
                sample.start.format("%H:%M:%S%.3f")
            );
        }
    }

    fn recorder_did_fail(&self, _recorder: &RecorderHandle, error: &RecorderError) {
        eprintln!("Recording failed: {error}");
    }
}

fn cmd_record(config: &Config, live: bool) -> anyhow::Result<()> {
    println!("Quantity Recorder v{VERSION}");
    println!();

    config
        .ensure_directories()
        .with_context(|| format!("creating {}", config.output_path.display()))?;

    let unit = config.effective_unit();
    let source = SimulatedSource::new(config.simulated.to_source_config());
    let source_id = source.source_id().to_string();

    let mut recorder = QuantitySampleRecorder::new(
        config.quantity,
        unit,
        TaskStep::new(config.step_identifier.clone()),
        &config.output_path,
        Arc::new(source),
    )
    .context("creating recorder")?;
    recorder.set_observer(Some(Arc::new(ConsoleObserver { live })));

    println!("Recording {} in {unit}", config.quantity);
    println!("  Step: {}", config.step_identifier);
    println!("  Source: {source_id}");
    println!("  Duration: {}s", config.duration.as_secs());
    println!("  Output: {}", config.output_path.display());
    println!();
    println!("Press Ctrl+C to stop early");
    println!();

    let running = Arc::new(AtomicBool::new(true));
    ctrlc_handler(running.clone())?;

    recorder.start().context("starting recording")?;

    let started = Instant::now();
    let mut last_report = Instant::now();
    while running.load(Ordering::SeqCst) && started.elapsed() < config.duration {
        if recorder.state() == RecorderState::Failed {
            break;
        }
        if !live && last_report.elapsed() >= Duration::from_secs(5) {
            if let Some(sample) = recorder.latest_sample() {
                println!("  latest: {:.1} {}", sample.value, sample.unit);
            }
            last_report = Instant::now();
        }
        thread::sleep(Duration::from_millis(100));
    }

    let result = recorder.stop().context("stopping recording")?;
    println!();
    println!("{}", recorder.stats().summary());

    match result {
        Some(result) => {
            print_result(&result)?;
            Ok(())
        }
        None => match recorder.failure() {
            Some(error) => Err(error).context("recording aborted"),
            None => bail!("recording ended without a result"),
        },
    }
}

fn print_result(result: &FileResult) -> anyhow::Result<()> {
    println!();
    println!("Result:");
    println!("{}", serde_json::to_string_pretty(result)?);

    let summary = RecordingSummary::from_file(&result.path)
        .with_context(|| format!("reading back {}", result.path.display()))?;
    println!();
    println!("{summary}");
    Ok(())
}

fn cmd_inspect(file: &Path) -> anyhow::Result<()> {
    let summary = RecordingSummary::from_file(file)
        .with_context(|| format!("inspecting {}", file.display()))?;

    println!("{}", file.display());
    println!("{summary}");
    Ok(())
}

fn cmd_list(output: Option<PathBuf>) -> anyhow::Result<()> {
    let config = Config::load().unwrap_or_default();
    let dir = output.unwrap_or(config.output_path);

    let mut files: Vec<PathBuf> = std::fs::read_dir(&dir)
        .with_context(|| format!("reading {}", dir.display()))?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.extension().map(|e| e == "jsonl").unwrap_or(false))
        .collect();
    files.sort();

    if files.is_empty() {
        println!("No recordings found in {}", dir.display());
        println!("Run 'quantity-recorder record' to create one.");
        return Ok(());
    }

    println!("Found {} recording(s) in {}", files.len(), dir.display());
    for file in &files {
        let name = file.file_name().unwrap_or_default().to_string_lossy();
        match RecordingSummary::from_file(file) {
            Ok(summary) => println!("  {name}: {} records", summary.count),
            Err(e) => println!("  {name}: unreadable ({e})"),
        }
    }
    Ok(())
}

fn cmd_types() {
    println!("Quantity types:");
    for quantity in QuantityType::ALL {
        let units: Vec<&str> = Unit::all_of(quantity.dimension())
            .map(|u| u.symbol())
            .collect();
        println!(
            "  {:<20} default {:<10} units: {}",
            quantity.identifier(),
            quantity.default_unit().symbol(),
            units.join(", ")
        );
    }
}

fn cmd_config() {
    let config = Config::load().unwrap_or_default();

    println!("Configuration");
    println!("=============");
    println!();
    println!("Config file: {:?}", Config::config_path());
    println!();
    println!(
        "{}",
        serde_json::to_string_pretty(&config).unwrap_or_else(|_| "Error".to_string())
    );
}

/// Set up Ctrl+C handler.
fn ctrlc_handler(running: Arc<AtomicBool>) -> anyhow::Result<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .context("setting Ctrl+C handler")
}
