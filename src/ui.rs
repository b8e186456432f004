use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::time::{Duration, Instant};

/// Plain mode prints a progress line every this many frames.
const PLAIN_PROGRESS_EVERY: u64 = 50;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UiMode {
    Auto,
    Plain,
    Pretty,
}

#[derive(Clone, Debug)]
pub struct Ui {
    mode: UiMode,
    is_tty: bool,
    disable_pretty: bool,
}

impl Ui {
    pub fn new(mode: UiMode, is_tty: bool, disable_pretty: bool) -> Self {
        Self {
            mode,
            is_tty,
            disable_pretty,
        }
    }

    pub fn from_args(ui_flag: Option<&str>, is_tty: bool, disable_pretty: bool) -> Self {
        let mode = match ui_flag {
            Some("plain") => UiMode::Plain,
            Some("pretty") => UiMode::Pretty,
            _ => UiMode::Auto,
        };
        Self::new(mode, is_tty, disable_pretty)
    }

    pub fn mode(&self) -> UiMode {
        self.mode
    }

    pub fn is_pretty(&self) -> bool {
        self.is_tty
            && match self.mode {
                UiMode::Pretty => true,
                UiMode::Auto => !self.disable_pretty,
                UiMode::Plain => false,
            }
    }

    pub fn stage(&self, name: &str) -> StageGuard {
        if self.is_pretty() {
            let spinner = ProgressBar::new_spinner();
            spinner.set_draw_target(ProgressDrawTarget::stderr());
            spinner.enable_steady_tick(Duration::from_millis(120));
            let style = ProgressStyle::with_template("{spinner} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner());
            spinner.set_style(style);
            spinner.set_message(format!("{name}…"));
            StageGuard::new(name.to_string(), Some(spinner))
        } else {
            eprintln!("==> {}", name);
            StageGuard::new(name.to_string(), None)
        }
    }

    /// Per-frame progress for a run over `total` frames, if known.
    pub fn frames(&self, label: &str, total: Option<u64>) -> FrameProgress {
        let bar = if self.is_pretty() {
            let (bar, template) = match total {
                Some(total) => (
                    ProgressBar::new(total),
                    "{prefix} [{bar:30.cyan/blue}] {pos}/{len} ({percent}%) {per_sec} eta {eta} {msg}",
                ),
                None => (
                    ProgressBar::new_spinner(),
                    "{prefix} {spinner} {pos} frames {per_sec} {msg}",
                ),
            };
            bar.set_draw_target(ProgressDrawTarget::stderr());
            let style = ProgressStyle::with_template(template)
                .map(|style| style.progress_chars("=> "))
                .unwrap_or_else(|_| ProgressStyle::default_bar());
            bar.set_style(style);
            bar.set_prefix(label.to_string());
            Some(bar)
        } else {
            None
        };
        FrameProgress {
            label: label.to_string(),
            total,
            bar,
            frames: 0,
            triggers: 0,
            start: Instant::now(),
        }
    }
}

pub struct StageGuard {
    name: String,
    start: Instant,
    spinner: Option<ProgressBar>,
}

impl StageGuard {
    fn new(name: String, spinner: Option<ProgressBar>) -> Self {
        Self {
            name,
            start: Instant::now(),
            spinner,
        }
    }
}

impl Drop for StageGuard {
    fn drop(&mut self) {
        let elapsed = self.start.elapsed();
        let message = format!("✔ {} ({})", self.name, format_duration(elapsed));
        if let Some(spinner) = &self.spinner {
            spinner.finish_with_message(message);
        } else {
            eprintln!("{message}");
        }
    }
}

/// Frame counter with a trigger tally. Draws an `indicatif` bar in pretty mode,
/// periodic stderr lines otherwise.
pub struct FrameProgress {
    label: String,
    total: Option<u64>,
    bar: Option<ProgressBar>,
    frames: u64,
    triggers: u64,
    start: Instant,
}

impl FrameProgress {
    /// Advance by one processed frame that fired `new_triggers` triggers.
    pub fn frame_done(&mut self, new_triggers: u32) {
        self.frames += 1;
        if new_triggers > 0 {
            self.triggers += u64::from(new_triggers);
            if let Some(bar) = &self.bar {
                bar.set_message(format!("triggers: {}", self.triggers));
            }
        }
        match &self.bar {
            Some(bar) => bar.inc(1),
            None => {
                if self.frames % PLAIN_PROGRESS_EVERY == 0 {
                    eprintln!("{}", self.status_line());
                }
            }
        }
    }

    /// Print a line without tearing the bar.
    pub fn log(&self, message: &str) {
        match &self.bar {
            Some(bar) => bar.println(message),
            None => eprintln!("{message}"),
        }
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn triggers(&self) -> u64 {
        self.triggers
    }

    pub fn finish(self) {
        let message = format!(
            "✔ {} {} frames, {} triggers ({})",
            self.label,
            self.frames,
            self.triggers,
            format_duration(self.start.elapsed())
        );
        match &self.bar {
            Some(bar) => bar.finish_with_message(message),
            None => eprintln!("{message}"),
        }
    }

    fn status_line(&self) -> String {
        let elapsed = self.start.elapsed().as_secs_f64();
        let rate = if elapsed > 0.0 {
            self.frames as f64 / elapsed
        } else {
            0.0
        };
        match self.total {
            Some(total) if total > 0 => format!(
                "{}: {}/{} frames ({:.0}%) {:.1} fps, triggers: {}",
                self.label,
                self.frames,
                total,
                self.frames as f64 * 100.0 / total as f64,
                rate,
                self.triggers
            ),
            _ => format!(
                "{}: {} frames {:.1} fps, triggers: {}",
                self.label, self.frames, rate, self.triggers
            ),
        }
    }
}

fn format_duration(duration: Duration) -> String {
    if duration.as_secs() >= 1 {
        format!("{:.2}s", duration.as_secs_f64())
    } else {
        format!("{}ms", duration.as_millis())
    }
}
