use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::{ArgAction, Args, Parser, Subcommand};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::thread;
use tracing::{info, warn};

use hud_arrows::config::{out_root, Config};
use hud_arrows::frame::{FrameSource, ImageFileSource, ScreenSource};
use hud_arrows::logging;
use hud_arrows::overlay::OverlayWriter;
use hud_arrows::pipeline::{
    run_detection, ActivationLock, DetectionObserver, DetectionResult, LOCK_FILE,
};
use hud_arrows::PipelineError;
use hud_arrows::sequencer::{DryRunInjector, EnigoInjector, KeyInjector, SequenceReport};
use hud_arrows::{execute, Direction};

#[derive(Parser, Debug)]
#[command(
    name = "hud-arrows",
    version,
    about = "Detect HUD arrow glyphs on screen and replay them as arrow-key presses"
)]
struct Cli {
    /// JSON config file (missing fields use defaults)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Append log output to this file
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,
    /// Do not write a log file
    #[arg(long, global = true, action = ArgAction::SetTrue)]
    no_log_file: bool,
    /// Log debug detail (per-candidate decisions)
    #[arg(short, long, global = true, action = ArgAction::SetTrue)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Capture, detect and press the detected arrows
    Run(RunArgs),
    /// Capture (or load) a frame and print the detected directions
    Detect(DetectArgs),
    /// Press an explicit list of directions
    Press(PressArgs),
    /// Print the effective configuration as JSON
    Config,
}

#[derive(Args, Debug, Default)]
struct SourceArgs {
    /// Read this screenshot instead of capturing the screen
    #[arg(long)]
    image: Option<PathBuf>,
    /// Write the annotated debug overlay (optionally to PATH)
    #[arg(long, num_args = 0..=1, value_name = "PATH")]
    debug_image: Option<Option<PathBuf>>,
}

#[derive(Args, Debug, Default)]
struct TimingArgs {
    /// Key hold duration in milliseconds
    #[arg(long)]
    hold_ms: Option<u64>,
    /// Delay between keys in milliseconds
    #[arg(long)]
    delay_ms: Option<u64>,
    /// Dry run: log key events without sending them
    #[arg(long, action = ArgAction::SetTrue)]
    dry_run: bool,
}

#[derive(Args, Debug)]
struct RunArgs {
    #[command(flatten)]
    source: SourceArgs,
    #[command(flatten)]
    timing: TimingArgs,
    /// Wait before capturing, in milliseconds
    #[arg(long)]
    start_delay_ms: Option<u64>,
}

#[derive(Args, Debug)]
struct DetectArgs {
    #[command(flatten)]
    source: SourceArgs,
    /// Emit JSON payload
    #[arg(long, action = ArgAction::SetTrue)]
    json: bool,
}

#[derive(Args, Debug)]
struct PressArgs {
    /// Directions to press, in order (up, down, left, right)
    #[arg(required = true)]
    directions: Vec<Direction>,
    #[command(flatten)]
    timing: TimingArgs,
}

fn main() {
    if let Err(err) = run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    let log_file = if cli.no_log_file {
        None
    } else {
        Some(
            cli.log_file
                .clone()
                .unwrap_or_else(|| out_root().join(logging::DEFAULT_LOG_FILE)),
        )
    };
    logging::init(cli.verbose, log_file.as_deref()).context("failed to open log file")?;

    let config = Config::load_or_default(cli.config.as_deref())?;

    match cli.command {
        Commands::Run(args) => command_run(args, config),
        Commands::Detect(args) => command_detect(args, config),
        Commands::Press(args) => command_press(args, config),
        Commands::Config => print_config(&config),
    }
}

fn command_run(args: RunArgs, mut config: Config) -> Result<()> {
    apply_timing(&args.timing, &mut config);
    if let Some(ms) = args.start_delay_ms {
        config.sequencer.start_delay_ms = ms;
    }

    let mut lock = ActivationLock::open(out_root().join(LOCK_FILE))?;
    let _held = match lock.try_acquire() {
        Err(PipelineError::Busy) => {
            warn!("another activation is still running; ignoring this one");
            return Err(PipelineError::Busy.into());
        }
        other => other?,
    };

    info!("===== activation =====");
    let start_delay = config.sequencer.start_delay();
    if !start_delay.is_zero() {
        thread::sleep(start_delay);
    }

    let result = detect(&args.source, &config)?;
    if result.is_empty() {
        info!("nothing detected; no keys sent");
        println!("nothing detected");
        return Ok(());
    }

    let directions = result.directions();
    println!("{}", join_directions(&directions));
    let report = press(&directions, &config, args.timing.dry_run)?;
    finish_report(&report, directions.len())
}

fn command_detect(args: DetectArgs, config: Config) -> Result<()> {
    let result = detect(&args.source, &config)?;

    if args.json {
        println!("{}", serde_json::to_string(&detection_payload(&result))?);
    } else if result.is_empty() {
        println!("nothing detected");
    } else {
        for (idx, glyph) in result.glyphs.iter().enumerate() {
            println!("{:2}. {}", idx + 1, glyph.direction);
        }
    }
    Ok(())
}

fn command_press(args: PressArgs, mut config: Config) -> Result<()> {
    apply_timing(&args.timing, &mut config);
    let report = press(&args.directions, &config, args.timing.dry_run)?;
    finish_report(&report, args.directions.len())
}

fn print_config(config: &Config) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(config)?);
    Ok(())
}

fn apply_timing(args: &TimingArgs, config: &mut Config) {
    if let Some(ms) = args.hold_ms {
        config.sequencer.hold_ms = ms;
    }
    if let Some(ms) = args.delay_ms {
        config.sequencer.delay_ms = ms;
    }
}

fn detect(args: &SourceArgs, config: &Config) -> Result<DetectionResult> {
    let mut source: Box<dyn FrameSource> = match &args.image {
        Some(path) => {
            if !path.exists() {
                bail!("image not found: {}", path.display());
            }
            Box::new(ImageFileSource::new(path))
        }
        None => Box::new(ScreenSource),
    };

    let mut overlay = overlay_path(args, config).map(OverlayWriter::new);
    let observer = overlay.as_mut().map(|o| o as &mut dyn DetectionObserver);
    let result = run_detection(source.as_mut(), config, observer).context("detection failed")?;
    Ok(result)
}

fn overlay_path(args: &SourceArgs, config: &Config) -> Option<PathBuf> {
    let path = match &args.debug_image {
        Some(Some(path)) => path.clone(),
        Some(None) => config.debug.overlay_path.clone(),
        None if config.debug.overlay => config.debug.overlay_path.clone(),
        None => return None,
    };
    Some(resolve_out_path(&path))
}

fn resolve_out_path(path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        out_root().join(path)
    }
}

fn press(directions: &[Direction], config: &Config, dry_run: bool) -> Result<SequenceReport> {
    let mut injector: Box<dyn KeyInjector> = if dry_run {
        Box::new(DryRunInjector)
    } else {
        Box::new(EnigoInjector::new().context("keyboard injection unavailable")?)
    };
    Ok(execute(
        directions,
        config.sequencer.hold(),
        config.sequencer.delay(),
        injector.as_mut(),
    ))
}

fn finish_report(report: &SequenceReport, total: usize) -> Result<()> {
    info!(sent = report.sent, total, "sequence finished");
    if !report.failures.is_empty() {
        let failed: Vec<String> = report
            .failures
            .iter()
            .map(|f| format!("#{} {}: {}", f.index + 1, f.direction, f.error))
            .collect();
        bail!(
            "{} of {} keys failed: {}",
            report.failed_indices().len(),
            total,
            failed.join("; ")
        );
    }
    Ok(())
}

fn join_directions(directions: &[Direction]) -> String {
    directions
        .iter()
        .map(|d| d.as_str())
        .collect::<Vec<_>>()
        .join(" -> ")
}

fn detection_payload(result: &DetectionResult) -> Value {
    json!({
        "detected_at": Utc::now().to_rfc3339(),
        "size": {"width": result.frame_width, "height": result.frame_height},
        "zone": result.zone,
        "directions": result.directions(),
        "glyphs": result.glyphs,
        "unclassified": result.unclassified,
        "empty": result.is_empty(),
    })
}
