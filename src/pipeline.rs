//! Run loop: pull frames from a source through one filter into the comparator.
//!
//! The loop is single-threaded and strictly ordered. Cancellation is cooperative
//! through a stop flag checked between frames; whatever ends the loop, active
//! interactions are flushed into the comparator before returning.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::SystemTime;

use anyhow::Result;

use crate::comparator::{Comparator, ProcessingStats};
use crate::config::FilterConfig;
use crate::filter::{FrameResult, InteractionFilter};
use crate::ingest::{FrameSource, ReplaySource, Scenario};
use crate::tracker::InteractionTracker;
use crate::zplane::{ZPlaneEstimator, ZPlaneMethod};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunOptions {
    /// Process every Nth source frame. 0 is treated as 1.
    pub frame_interval: u32,
    /// Stop after this many source frames.
    pub max_frames: Option<u64>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            frame_interval: 1,
            max_frames: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StopReason {
    EndOfStream,
    Cancelled,
    MaxFrames,
    /// The source or a detector failed; the message is the error chain.
    SourceError(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunSummary {
    pub frames_read: u64,
    pub frames_processed: u64,
    pub total_triggers: u64,
    /// Interactions finalized by the end-of-stream flush.
    pub flushed: usize,
    pub stop_reason: StopReason,
}

/// Build a replay source and a filter for `method` over a recorded scenario.
///
/// The trigger threshold is derived from the configured duration and the
/// scenario's frame rate.
pub fn prepare_replay(
    scenario: Scenario,
    method: ZPlaneMethod,
    config: &FilterConfig,
) -> Result<(ReplaySource, InteractionFilter)> {
    let threshold = config.trigger_threshold_frames(scenario.fps);
    let (source, detector, depth) = scenario.into_parts();
    let filter = InteractionFilter::new(
        ZPlaneEstimator::new(method, config.z_plane),
        InteractionTracker::new(threshold),
        Box::new(detector),
        Some(Box::new(depth)),
    )?;
    Ok((source, filter))
}

impl RunOptions {
    pub fn from_config(config: &FilterConfig) -> Self {
        Self {
            frame_interval: config.frame_interval,
            max_frames: None,
        }
    }
}

/// Whether a 1-based source frame index is sampled at `interval`.
pub fn is_sampled(index: u64, interval: u32) -> bool {
    let interval = u64::from(interval.max(1));
    index.saturating_sub(1) % interval == 0
}

/// Drive `filter` over `source`, recording everything under the filter's method
/// label in `comparator`.
///
/// Errors from the source or detectors end the run early but are not returned:
/// they are logged and reported as [`StopReason::SourceError`] so the partial
/// results still reach the report.
pub fn run<F>(
    source: &mut dyn FrameSource,
    filter: &mut InteractionFilter,
    comparator: &mut Comparator,
    options: &RunOptions,
    stop: &AtomicBool,
    mut on_frame: F,
) -> Result<RunSummary>
where
    F: FnMut(&FrameResult),
{
    let method = filter.method().as_str();
    let fps = source.fps();
    let start_time = SystemTime::now();
    log::info!(
        "run start: source={} method={} interval={} trigger_threshold={} frames",
        source.describe(),
        method,
        options.frame_interval.max(1),
        filter.threshold_frames()
    );

    let mut frames_read = 0u64;
    let mut frames_processed = 0u64;
    let mut total_triggers = 0u64;

    let stop_reason = loop {
        if stop.load(Ordering::SeqCst) {
            log::warn!("run cancelled after {} frames", frames_read);
            break StopReason::Cancelled;
        }
        if let Some(max) = options.max_frames {
            if frames_read >= max {
                break StopReason::MaxFrames;
            }
        }

        let frame = match source.next_frame() {
            Ok(Some(frame)) => frame,
            Ok(None) => break StopReason::EndOfStream,
            Err(err) => {
                log::warn!("frame source failed after {} frames: {:#}", frames_read, err);
                break StopReason::SourceError(format!("{:#}", err));
            }
        };
        frames_read += 1;

        if !is_sampled(frame.index, options.frame_interval) {
            continue;
        }

        let result = match filter.process(&frame) {
            Ok(result) => result,
            Err(err) => {
                log::warn!("detection failed on frame {}: {:#}", frame.index, err);
                break StopReason::SourceError(format!("{:#}", err));
            }
        };
        frames_processed += 1;
        total_triggers += u64::from(result.triggers_this_frame);

        comparator.update(
            method,
            result.has_overlap(),
            result.has_interaction(),
            result.triggers_this_frame > 0,
        );
        for record in &result.ended_interactions {
            comparator.log_interaction(method, record.clone());
        }
        for pair in &result.new_triggers {
            log::info!(
                "{}: pair {} triggered at frame {} ({:.2}s)",
                method,
                pair,
                frame.index,
                frame.timestamp_secs(fps)
            );
        }
        log::debug!(
            "frame {}: persons={} overlaps={} interactions={} active={}",
            frame.index,
            result.persons.len(),
            result.overlapping_pairs.len(),
            result.interacting_pairs.len(),
            result.active_interactions.len()
        );

        on_frame(&result);
    };

    let flushed = filter.finish();
    let flushed_count = flushed.len();
    for record in flushed {
        comparator.log_interaction(method, record);
    }

    // A shared comparator keeps the timing of its first run.
    if comparator.processing_stats().is_none() {
        comparator.set_processing_stats(ProcessingStats {
            start_time,
            end_time: SystemTime::now(),
            fps,
            total_frames: frames_processed,
        });
    }

    let summary = RunSummary {
        frames_read,
        frames_processed,
        total_triggers,
        flushed: flushed_count,
        stop_reason,
    };
    log::info!(
        "run finished ({:?}): read {} frames, processed {}, {} triggers, {} flushed",
        summary.stop_reason,
        summary.frames_read,
        summary.frames_processed,
        summary.total_triggers,
        summary.flushed
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::{Keypoint, Person, PersonMap, ReplayDetector};
    use crate::frame::Frame;
    use crate::geometry::BBox;
    use crate::zplane::ZPlaneThresholds;
    use anyhow::anyhow;

    struct CountingSource {
        total: u64,
        next: u64,
        fail_at: Option<u64>,
    }

    impl FrameSource for CountingSource {
        fn fps(&self) -> f64 {
            10.0
        }

        fn next_frame(&mut self) -> Result<Option<Frame>> {
            if Some(self.next) == self.fail_at {
                return Err(anyhow!("decoder hiccup"));
            }
            if self.next > self.total {
                return Ok(None);
            }
            let frame = Frame::metadata_only(self.next, 64, 64);
            self.next += 1;
            Ok(Some(frame))
        }

        fn describe(&self) -> String {
            "counting".to_string()
        }
    }

    fn pair_frame() -> PersonMap {
        let eyes = |x: f32| {
            let mut kps = vec![Keypoint::default(); 17];
            kps[1] = Keypoint::new(x, 10.0, 0.9);
            kps[2] = Keypoint::new(x + 6.0, 10.0, 0.9);
            kps
        };
        [
            (1, Person::new(1, BBox::new(0.0, 0.0, 30.0, 60.0), eyes(10.0))),
            (2, Person::new(2, BBox::new(20.0, 0.0, 50.0, 60.0), eyes(30.0))),
        ]
        .into()
    }

    fn filter(frames: usize, threshold: u32) -> InteractionFilter {
        InteractionFilter::new(
            ZPlaneEstimator::new(ZPlaneMethod::Ipd, ZPlaneThresholds::default()),
            InteractionTracker::new(threshold),
            Box::new(ReplayDetector::new(vec![pair_frame(); frames])),
            None,
        )
        .unwrap()
    }

    #[test]
    fn sampling_starts_at_first_frame() {
        let sampled: Vec<u64> = (1..=7).filter(|i| is_sampled(*i, 3)).collect();
        assert_eq!(sampled, vec![1, 4, 7]);
        assert!(is_sampled(5, 0));
    }

    #[test]
    fn interval_skips_frames_and_flushes() {
        let mut source = CountingSource {
            total: 10,
            next: 1,
            fail_at: None,
        };
        let mut f = filter(10, 3);
        let mut comparator = Comparator::new();
        let mut seen = Vec::new();
        let summary = run(
            &mut source,
            &mut f,
            &mut comparator,
            &RunOptions {
                frame_interval: 2,
                max_frames: None,
            },
            &AtomicBool::new(false),
            |r| seen.push(r.frame),
        )
        .unwrap();

        assert_eq!(seen, vec![1, 3, 5, 7, 9]);
        assert_eq!(summary.frames_read, 10);
        assert_eq!(summary.frames_processed, 5);
        assert_eq!(summary.total_triggers, 1);
        assert_eq!(summary.flushed, 1);
        assert_eq!(summary.stop_reason, StopReason::EndOfStream);

        let stats = comparator.stats("ipd").unwrap();
        assert_eq!(stats.overlap_frames, 5);
        assert_eq!(stats.triggers, 1);
        let record = &stats.annotations[0];
        assert_eq!(record.start_frame, 1);
        assert_eq!(record.trigger_frame, Some(5));
        assert_eq!(record.end_frame, Some(9));
        assert_eq!(comparator.processing_stats().unwrap().total_frames, 5);
    }

    #[test]
    fn source_error_still_flushes() {
        let mut source = CountingSource {
            total: 10,
            next: 1,
            fail_at: Some(4),
        };
        let mut f = filter(10, 100);
        let mut comparator = Comparator::new();
        let summary = run(
            &mut source,
            &mut f,
            &mut comparator,
            &RunOptions::default(),
            &AtomicBool::new(false),
            |_| {},
        )
        .unwrap();
        assert!(matches!(summary.stop_reason, StopReason::SourceError(ref m) if m.contains("hiccup")));
        assert_eq!(summary.frames_processed, 3);
        let stats = comparator.stats("ipd").unwrap();
        assert_eq!(stats.annotations.len(), 1);
        assert_eq!(stats.annotations[0].end_frame, Some(3));
        assert!(!stats.annotations[0].triggered);
    }

    #[test]
    fn max_frames_and_stop_flag() {
        let mut source = CountingSource {
            total: 10,
            next: 1,
            fail_at: None,
        };
        let mut f = filter(10, 2);
        let mut comparator = Comparator::new();
        let options = RunOptions {
            frame_interval: 1,
            max_frames: Some(4),
        };
        let summary = run(
            &mut source,
            &mut f,
            &mut comparator,
            &options,
            &AtomicBool::new(false),
            |_| {},
        )
        .unwrap();
        assert_eq!(summary.stop_reason, StopReason::MaxFrames);
        assert_eq!(summary.frames_read, 4);

        let stopped = AtomicBool::new(true);
        let summary = run(
            &mut source,
            &mut filter(10, 2),
            &mut Comparator::new(),
            &RunOptions::default(),
            &stopped,
            |_| {},
        )
        .unwrap();
        assert_eq!(summary.stop_reason, StopReason::Cancelled);
        assert_eq!(summary.frames_processed, 0);
        assert_eq!(summary.flushed, 0);
    }
}
