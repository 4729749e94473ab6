//! FlyFF HP bar CLI - desktop entry point
//!
//! Runs the detection engine against PNG screenshots so the region and
//! tolerance can be tuned without a live game view.

use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use chrono::Local;
use clap::{Args, Parser, Subcommand};

use flyff_hpbar::config::{RegionSettings, Settings};
use flyff_hpbar::detection::{BarId, DetectionResult, TickOutcome};
use flyff_hpbar::presentation::IndicatorState;
use flyff_hpbar::vision::PngFileCapture;
use flyff_hpbar::HpBot;

/// Width of the text indicator in cells
const INDICATOR_CELLS: usize = 20;

#[derive(Parser, Debug)]
#[command(
    name = "hpbar",
    version,
    about = "Detect FlyFF HP bar fill levels from screenshots"
)]
struct Cli {
    /// Settings file
    #[arg(long, global = true, default_value = "settings.json")]
    settings: PathBuf,
    /// Override the per-channel color tolerance
    #[arg(long, global = true)]
    tolerance: Option<u8>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run one detection tick against a screenshot
    Detect(DetectArgs),
    /// Poll a screenshot that is rewritten by another program
    Watch(WatchArgs),
    /// Save the configured HP region of a screenshot for checking the crop
    Snapshot(SnapshotArgs),
    /// Store the HP region in the settings file
    #[command(name = "set-region")]
    SetRegion(RegionArgs),
}

#[derive(Args, Debug)]
struct DetectArgs {
    /// Screenshot PNG
    screenshot: PathBuf,
    /// Print results as JSON lines
    #[arg(long)]
    json: bool,
}

#[derive(Args, Debug)]
struct WatchArgs {
    /// Screenshot PNG, re-read on every tick
    screenshot: PathBuf,
    /// Polling interval (ms); defaults to the settings value
    #[arg(long)]
    interval_ms: Option<u64>,
    /// Stop after this many seconds; runs until killed otherwise
    #[arg(long)]
    duration_secs: Option<u64>,
}

#[derive(Args, Debug)]
struct SnapshotArgs {
    /// Screenshot PNG
    screenshot: PathBuf,
    /// Output directory; defaults to the settings value
    #[arg(long)]
    dir: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct RegionArgs {
    min_x: i32,
    min_y: i32,
    max_x: i32,
    max_y: i32,
}

fn main() {
    env_logger::init();

    if let Err(err) = run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    let mut settings = Settings::load_or_default(&cli.settings);
    if let Some(tolerance) = cli.tolerance {
        settings.detection.tolerance = tolerance;
    }

    match cli.command {
        Commands::Detect(args) => command_detect(settings, args),
        Commands::Watch(args) => command_watch(settings, args),
        Commands::Snapshot(args) => command_snapshot(settings, args),
        Commands::SetRegion(args) => command_set_region(settings, &cli.settings, args),
    }
}

fn print_result(bar: BarId, result: DetectionResult, json: bool) {
    if json {
        let line = serde_json::json!({
            "bar": bar,
            "percentage": result.percentage,
            "tier": result.tier,
        });
        println!("{line}");
        return;
    }
    let indicator = IndicatorState::from_result(&result, INDICATOR_CELLS as f64);
    println!(
        "{:<13} {} {} {}",
        bar.name(),
        indicator.render_text(INDICATOR_CELLS),
        indicator.tier,
        indicator.color.to_hex()
    );
}

fn command_detect(settings: Settings, args: DetectArgs) -> Result<()> {
    if !args.screenshot.exists() {
        bail!("screenshot not found: {}", args.screenshot.display());
    }
    let json = args.json;
    let source = Arc::new(PngFileCapture::new(args.screenshot));
    let bot = HpBot::new(
        settings,
        source,
        Arc::new(move |bar: BarId, result: DetectionResult| print_result(bar, result, json)),
    );

    match bot.tick() {
        TickOutcome::Completed { emitted: 0 } => bail!("no bar could be read; see the log"),
        TickOutcome::Completed { .. } => {}
        TickOutcome::Skipped => bail!("detection was already running"),
    }

    if !json {
        for bar in BarId::ALL {
            let state = bot.bar_state(bar);
            println!(
                "{:<13} {} px wide, calibrated at {} px",
                bar.name(),
                state.last_width,
                state.calibrated_max_width
            );
        }
    }
    Ok(())
}

fn command_watch(mut settings: Settings, args: WatchArgs) -> Result<()> {
    if let Some(interval_ms) = args.interval_ms {
        settings.detection.interval_ms = interval_ms;
    }
    let source = Arc::new(PngFileCapture::new(args.screenshot));
    let bot = HpBot::new(
        settings,
        source,
        Arc::new(|bar: BarId, result: DetectionResult| {
            print!("{} ", Local::now().format("%H:%M:%S"));
            print_result(bar, result, false);
        }),
    );

    bot.start().context("failed to start the detection thread")?;
    let deadline = args
        .duration_secs
        .map(|secs| Instant::now() + Duration::from_secs(secs));
    while deadline.is_none_or(|d| Instant::now() < d) {
        thread::sleep(Duration::from_millis(100));
    }
    bot.stop();

    let stats = bot.stats();
    println!(
        "{} ticks, {} dropped, {} failed bar cycles",
        stats.completed_ticks, stats.skipped_ticks, stats.failed_cycles
    );
    Ok(())
}

fn command_snapshot(mut settings: Settings, args: SnapshotArgs) -> Result<()> {
    if let Some(dir) = args.dir {
        settings.screenshot_dir = dir;
    }
    let source = Arc::new(PngFileCapture::new(args.screenshot));
    let bot = HpBot::new(settings, source, Arc::new(|_: BarId, _: DetectionResult| {}));

    let report = bot
        .capture_calibration_snapshot()
        .context("failed to capture the HP region")?;
    println!(
        "Saved {}x{} region to {}",
        report.width,
        report.height,
        report.path.display()
    );
    match (&report.marked_path, report.scan.span) {
        (Some(marked), Some(span)) => println!(
            "Bar spans x {}..={} ({} px), outlined in {}",
            span.leftmost,
            span.rightmost,
            report.scan.width(),
            marked.display()
        ),
        _ => println!("No HP bar pixels found; check the region and tolerance"),
    }
    Ok(())
}

fn command_set_region(
    mut settings: Settings,
    path: &std::path::Path,
    args: RegionArgs,
) -> Result<()> {
    settings.hp_region = RegionSettings {
        min_x: args.min_x,
        max_x: args.max_x,
        min_y: args.min_y,
        max_y: args.max_y,
    };
    settings
        .save(path)
        .with_context(|| format!("failed to save {}", path.display()))?;
    println!("HP region set to {}", settings.main_region());
    Ok(())
}
