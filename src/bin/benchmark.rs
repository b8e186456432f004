//! benchmark - compare z-plane methods on one scenario
//!
//! Runs the same scenario once per method into a shared comparator, times each
//! run, and prints a summary table followed by the combined report.

use anyhow::{anyhow, Result};
use clap::Parser;
use std::io::IsTerminal;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use interaction_filter::{
    ingest, pipeline, ui, Comparator, FilterConfig, FrameSource, RunOptions, StopReason,
    ZPlaneMethod,
};

#[derive(Parser, Debug)]
#[command(author, version, about = "Benchmark z-plane methods on one scenario")]
struct Args {
    /// Scenario JSON path, or synthetic:// for the built-in synthetic scene
    #[arg(long, default_value = "synthetic://", value_name = "PATH")]
    scenario: String,

    /// Comma-separated methods to run (overrides config)
    #[arg(long, value_enum, value_delimiter = ',')]
    methods: Vec<ZPlaneMethod>,

    /// Seed for the synthetic scene
    #[arg(long)]
    seed: Option<u64>,

    /// UI mode for stderr progress (auto|plain|pretty)
    #[arg(long, default_value = "auto", value_name = "MODE")]
    ui: String,
}

struct BenchRow {
    method: ZPlaneMethod,
    seconds: f64,
    frames: u64,
    savings: Option<f64>,
}

impl BenchRow {
    fn fps(&self) -> f64 {
        if self.seconds > 0.0 {
            self.frames as f64 / self.seconds
        } else {
            0.0
        }
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let is_tty = std::io::stderr().is_terminal();
    let stdout_is_tty = std::io::stdout().is_terminal();
    let ui = ui::Ui::from_args(Some(&args.ui), is_tty, !stdout_is_tty);

    let mut config = FilterConfig::load()?;
    if !args.methods.is_empty() {
        config.benchmark_methods = args.methods.clone();
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
    println!(
        "Starting benchmark on {} ({} frames)...\n",
        scenario.label,
        scenario.frame_count()
    );

    let mut comparator = Comparator::new();
    let mut rows = Vec::new();
    for &method in &config.benchmark_methods {
        if stop.load(Ordering::SeqCst) {
            log::warn!("benchmark cancelled before method {}", method);
            break;
        }
        let (mut source, mut filter) =
            pipeline::prepare_replay(scenario.clone(), method, &config)?;
        filter.warm_up()?;

        let mut progress = ui.frames(method.as_str(), source.frame_count_hint());
        let started = Instant::now();
        let summary = pipeline::run(
            &mut source,
            &mut filter,
            &mut comparator,
            &RunOptions::from_config(&config),
            &stop,
            |result| progress.frame_done(result.triggers_this_frame),
        )?;
        let seconds = started.elapsed().as_secs_f64();
        progress.finish();

        if let StopReason::SourceError(message) = &summary.stop_reason {
            log::warn!("method {} stopped early: {}", method, message);
        }
        rows.push(BenchRow {
            method,
            seconds,
            frames: summary.frames_processed,
            savings: comparator
                .stats(method.as_str())
                .and_then(|stats| stats.cost_reduction_percent()),
        });
    }

    println!("\nBenchmark Results:");
    println!(
        "{:<10} | {:<10} | {:<10} | {:<10} | {:<12}",
        "Method", "Time (s)", "FPS", "Frames", "Savings (%)"
    );
    println!("{}", "-".repeat(65));
    for row in &rows {
        let savings = row
            .savings
            .map(|pct| format!("{:.1}", pct))
            .unwrap_or_else(|| "N/A".to_string());
        println!(
            "{:<10} | {:<10.2} | {:<10.2} | {:<10} | {:<12}",
            row.method.as_str(),
            row.seconds,
            row.fps(),
            row.frames,
            savings
        );
    }
    println!();
    print!("{}", comparator.render_text());
    Ok(())
}
