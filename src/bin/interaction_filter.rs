//! interaction_filter - run the interaction filter over a recorded or synthetic scenario
//!
//! This tool:
//! 1. Loads the filter config (file + environment), then applies CLI overrides
//! 2. Replays a scenario (`path/to/scenario.json` or `synthetic://`)
//! 3. Prints the comparator report and optionally writes it as JSON
//!
//! Ctrl-C stops the run early; active interactions are still flushed into the report.

use anyhow::{anyhow, Context, Result};
use clap::{Parser, ValueEnum};
use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use interaction_filter::{
    ingest, pipeline, ui, Comparator, FilterConfig, FrameSource, RunOptions, StopReason,
    ZPlaneMethod,
};

#[derive(Clone, Copy, Debug, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Gate VLM invocations on sustained same-plane interactions")]
struct Args {
    /// Scenario JSON path, or synthetic:// for the built-in synthetic scene
    #[arg(long, default_value = "synthetic://", value_name = "PATH")]
    scenario: String,

    /// Z-plane method (overrides config)
    #[arg(long, value_enum)]
    method: Option<ZPlaneMethod>,

    /// Process every Nth frame (overrides config)
    #[arg(long, value_name = "N")]
    frame_interval: Option<u32>,

    /// Seconds of sustained interaction before a trigger (overrides config)
    #[arg(long, value_name = "SECS")]
    duration: Option<f64>,

    /// Report format on stdout
    #[arg(long, value_enum, default_value = "text")]
    format: OutputFormat,

    /// Also write the JSON report to this path
    #[arg(long, value_name = "PATH")]
    report_json: Option<PathBuf>,

    /// Seed for the synthetic scene
    #[arg(long)]
    seed: Option<u64>,

    /// Stop after this many source frames
    #[arg(long, value_name = "N")]
    max_frames: Option<u64>,

    /// Write the loaded scenario as JSON and continue
    #[arg(long, value_name = "PATH")]
    dump_scenario: Option<PathBuf>,

    /// UI mode for stderr progress (auto|plain|pretty)
    #[arg(long, default_value = "auto", value_name = "MODE")]
    ui: String,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let is_tty = std::io::stderr().is_terminal();
    let stdout_is_tty = std::io::stdout().is_terminal();
    let ui = ui::Ui::from_args(Some(&args.ui), is_tty, !stdout_is_tty);

    let mut config = FilterConfig::load()?;
    if let Some(method) = args.method {
        config.method = method;
    }
    if let Some(interval) = args.frame_interval {
        config.frame_interval = interval;
    }
    if let Some(duration) = args.duration {
        config.interaction_duration_secs = duration;
    }
    if let Some(path) = &args.report_json {
        config.report.json_path = Some(path.clone());
    }
    config.validate()?;

    let stop = Arc::new(AtomicBool::new(false));
    let handler_stop = Arc::clone(&stop);
    ctrlc::set_handler(move || {
        handler_stop.store(true, Ordering::SeqCst);
    })
    .map_err(|e| anyhow!("failed to install Ctrl-C handler: {}", e))?;

    let scenario = {
        let _stage = ui.stage("Load scenario");
        ingest::open_scenario(&args.scenario, args.seed)?
    };
    if let Some(path) = &args.dump_scenario {
        std::fs::write(path, scenario.to_json()?)
            .with_context(|| format!("failed to write scenario {}", path.display()))?;
        log::info!("scenario written to {}", path.display());
    }

    let (mut source, mut filter) = pipeline::prepare_replay(scenario, config.method, &config)?;
    filter.warm_up()?;

    let mut options = RunOptions::from_config(&config);
    options.max_frames = args.max_frames;

    let mut comparator = Comparator::new();
    let mut progress = ui.frames(config.method.as_str(), source.frame_count_hint());
    let summary = pipeline::run(
        &mut source,
        &mut filter,
        &mut comparator,
        &options,
        &stop,
        |result| {
            progress.frame_done(result.triggers_this_frame);
            for pair in &result.new_triggers {
                progress.log(&format!("VLM trigger: pair {} at frame {}", pair, result.frame));
            }
        },
    )?;
    progress.finish();

    let report = comparator.report();
    match args.format {
        OutputFormat::Text => print!("{}", report.to_text()),
        OutputFormat::Json => println!("{}", report.to_json()?),
    }
    if let Some(path) = &config.report.json_path {
        std::fs::write(path, report.to_json()?)
            .with_context(|| format!("failed to write report {}", path.display()))?;
        log::info!("report written to {}", path.display());
    }

    match summary.stop_reason {
        StopReason::SourceError(message) => Err(anyhow!("run stopped early: {}", message)),
        _ => Ok(()),
    }
}
