//! Cross-method statistics and the end-of-run report.
//!
//! Stats are keyed by method label and created on first use, so any label is
//! accepted. Reports list methods in first-seen order.

use std::fmt::Write as _;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::Result;
use serde::Serialize;

use crate::frame::frame_timestamp;
use crate::graph::PairKey;
use crate::tracker::InteractionRecord;

/// Counters and finalized interactions for one method.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MethodStats {
    pub overlap_frames: u64,
    pub interaction_frames: u64,
    /// Frames in which at least one trigger fired.
    pub triggers: u64,
    pub annotations: Vec<InteractionRecord>,
}

impl MethodStats {
    /// Percentage of overlap frames that did not escalate.
    ///
    /// `None` when no frame had an overlap, so no escalation was ever possible.
    pub fn cost_reduction_percent(&self) -> Option<f64> {
        if self.overlap_frames == 0 {
            return None;
        }
        Some((1.0 - self.triggers as f64 / self.overlap_frames as f64) * 100.0)
    }
}

/// Wall-clock timing of one run.
#[derive(Clone, Debug, PartialEq)]
pub struct ProcessingStats {
    pub start_time: SystemTime,
    pub end_time: SystemTime,
    /// Source frame rate.
    pub fps: f64,
    pub total_frames: u64,
}

impl ProcessingStats {
    pub fn duration(&self) -> Duration {
        self.end_time
            .duration_since(self.start_time)
            .unwrap_or_default()
    }
}

#[derive(Debug, Default)]
pub struct Comparator {
    methods: Vec<(String, MethodStats)>,
    processing: Option<ProcessingStats>,
}

impl Comparator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one processed frame for `method`.
    pub fn update(
        &mut self,
        method: &str,
        has_overlap: bool,
        has_interaction: bool,
        triggered_this_frame: bool,
    ) {
        let stats = self.stats_mut(method);
        stats.overlap_frames += u64::from(has_overlap);
        stats.interaction_frames += u64::from(has_interaction);
        stats.triggers += u64::from(triggered_this_frame);
    }

    /// Append a finalized interaction, triggered or not.
    pub fn log_interaction(&mut self, method: &str, record: InteractionRecord) {
        self.stats_mut(method).annotations.push(record);
    }

    /// Record run timing. Only the first call takes effect.
    pub fn set_processing_stats(&mut self, stats: ProcessingStats) {
        if self.processing.is_some() {
            log::warn!("processing stats already recorded; ignoring update");
            return;
        }
        self.processing = Some(stats);
    }

    pub fn processing_stats(&self) -> Option<&ProcessingStats> {
        self.processing.as_ref()
    }

    pub fn stats(&self, method: &str) -> Option<&MethodStats> {
        self.methods
            .iter()
            .find(|(name, _)| name == method)
            .map(|(_, stats)| stats)
    }

    /// Methods in first-seen order.
    pub fn methods(&self) -> impl Iterator<Item = (&str, &MethodStats)> {
        self.methods
            .iter()
            .map(|(name, stats)| (name.as_str(), stats))
    }

    fn stats_mut(&mut self, method: &str) -> &mut MethodStats {
        let idx = match self.methods.iter().position(|(name, _)| name == method) {
            Some(idx) => idx,
            None => {
                self.methods.push((method.to_string(), MethodStats::default()));
                self.methods.len() - 1
            }
        };
        &mut self.methods[idx].1
    }

    pub fn report(&self) -> Report {
        let fps = self.processing.as_ref().map(|p| p.fps).unwrap_or(0.0);
        Report {
            processing: self.processing.as_ref().map(ProcessingSummary::from_stats),
            methods: self
                .methods
                .iter()
                .map(|(name, stats)| MethodReport::from_stats(name, stats, fps))
                .collect(),
        }
    }

    pub fn render_json(&self) -> Result<String> {
        self.report().to_json()
    }

    pub fn render_text(&self) -> String {
        self.report().to_text()
    }
}

// ----------------------------------------------------------------------------
// Report
// ----------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Report {
    pub processing: Option<ProcessingSummary>,
    pub methods: Vec<MethodReport>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ProcessingSummary {
    /// Seconds since the Unix epoch.
    pub start_time: f64,
    pub end_time: f64,
    pub duration_seconds: f64,
    pub fps: f64,
    pub total_frames: u64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MethodReport {
    pub method: String,
    pub overlap_frames: u64,
    pub interaction_frames: u64,
    pub triggers: u64,
    /// `null` when no overlap was ever seen.
    pub cost_reduction_percent: Option<f64>,
    pub annotations: Vec<Annotation>,
}

/// Finalized interaction with times derived from the source frame rate.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Annotation {
    pub pair: PairKey,
    pub start_frame: u64,
    pub end_frame: Option<u64>,
    pub start_time: f64,
    pub end_time: Option<f64>,
    pub triggered: bool,
    pub trigger_frame: Option<u64>,
    pub trigger_time: Option<f64>,
}

impl ProcessingSummary {
    fn from_stats(stats: &ProcessingStats) -> Self {
        Self {
            start_time: round2(epoch_secs(stats.start_time)),
            end_time: round2(epoch_secs(stats.end_time)),
            duration_seconds: round2(stats.duration().as_secs_f64()),
            fps: round2(stats.fps),
            total_frames: stats.total_frames,
        }
    }
}

impl MethodReport {
    fn from_stats(method: &str, stats: &MethodStats, fps: f64) -> Self {
        Self {
            method: method.to_string(),
            overlap_frames: stats.overlap_frames,
            interaction_frames: stats.interaction_frames,
            triggers: stats.triggers,
            cost_reduction_percent: stats.cost_reduction_percent().map(round2),
            annotations: stats
                .annotations
                .iter()
                .map(|record| Annotation::from_record(record, fps))
                .collect(),
        }
    }
}

impl Annotation {
    fn from_record(record: &InteractionRecord, fps: f64) -> Self {
        let time = |frame: u64| round2(frame_timestamp(frame, fps));
        Self {
            pair: record.pair,
            start_frame: record.start_frame,
            end_frame: record.end_frame,
            start_time: time(record.start_frame),
            end_time: record.end_frame.map(time),
            triggered: record.triggered,
            trigger_frame: record.trigger_frame,
            trigger_time: record.trigger_frame.map(time),
        }
    }

    pub fn status(&self) -> &'static str {
        if self.triggered {
            "TRIGGERED"
        } else {
            "BUFFERED"
        }
    }
}

impl Report {
    pub fn method(&self, name: &str) -> Option<&MethodReport> {
        self.methods.iter().find(|m| m.method == name)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn to_text(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "--- Comparator Report ---");
        if let Some(p) = &self.processing {
            let _ = writeln!(
                out,
                "Processed {} frames in {:.2}s (source {:.2} fps)",
                p.total_frames, p.duration_seconds, p.fps
            );
        }
        for m in &self.methods {
            let _ = writeln!(out, "Method: {}", m.method);
            let _ = writeln!(out, "  Overlaps detected: {}", m.overlap_frames);
            let _ = writeln!(out, "  Verified Interactions: {}", m.interaction_frames);
            let _ = writeln!(out, "  VLM Triggers: {}", m.triggers);
            match m.cost_reduction_percent {
                Some(pct) => {
                    let _ = writeln!(out, "  VLM Cost Reduction: {:.2}%", pct);
                }
                None => {
                    let _ = writeln!(out, "  VLM Cost Reduction: N/A (no overlaps)");
                }
            }
            if !m.annotations.is_empty() {
                let _ = writeln!(out, "  Interactions:");
            }
            for a in &m.annotations {
                let _ = write!(
                    out,
                    "    [{}] {} frames {}-{} ({:.2}s - {:.2}s)",
                    a.status(),
                    a.pair,
                    a.start_frame,
                    a.end_frame.unwrap_or(a.start_frame),
                    a.start_time,
                    a.end_time.unwrap_or(a.start_time)
                );
                if let (Some(frame), Some(time)) = (a.trigger_frame, a.trigger_time) {
                    let _ = write!(out, ", trigger at frame {} ({:.2}s)", frame, time);
                }
                out.push('\n');
            }
            let _ = writeln!(out, "-------------------------");
        }
        out
    }
}

fn epoch_secs(t: SystemTime) -> f64 {
    t.duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}
