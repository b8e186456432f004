//! Persistent per-pair interaction state machine.
//!
//! Turns the per-frame `interacting_pairs` set into interaction records:
//!
//! - a record is created the first frame a pair interacts;
//! - it counts consecutive interacting frames;
//! - it triggers exactly once, the frame the count reaches the threshold;
//! - it is finalized the first frame the pair stops interacting, or by `flush`
//!   at end of stream.
//!
//! A finalized record is never revived. A pair that interacts again later gets a
//! new record.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::graph::PairKey;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct InteractionRecord {
    pub pair: PairKey,
    pub consecutive_frames: u32,
    pub start_frame: u64,
    /// Sticky once set.
    pub triggered: bool,
    pub trigger_frame: Option<u64>,
    /// Last interacting frame, set on finalization.
    pub end_frame: Option<u64>,
}

impl InteractionRecord {
    fn new(pair: PairKey, frame: u64) -> Self {
        Self {
            pair,
            consecutive_frames: 1,
            start_frame: frame,
            triggered: false,
            trigger_frame: None,
            end_frame: None,
        }
    }

    pub fn is_finalized(&self) -> bool {
        self.end_frame.is_some()
    }

    fn mark_triggered(&mut self, frame: u64) -> bool {
        if self.triggered {
            return false;
        }
        self.triggered = true;
        self.trigger_frame = Some(frame);
        true
    }
}

/// Frames of sustained interaction needed to trigger:
/// `round(duration_secs * fps / frame_interval)`, at least 1.
pub fn trigger_threshold_frames(duration_secs: f64, fps: f64, frame_interval: u32) -> u32 {
    let frames = (duration_secs * fps / f64::from(frame_interval.max(1))).round();
    if frames.is_finite() && frames >= 1.0 {
        frames.min(f64::from(u32::MAX)) as u32
    } else {
        1
    }
}

/// Changes produced by one tracker update.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TrackerUpdate {
    pub frame: u64,
    /// Pairs whose trigger fired this frame.
    pub new_triggers: Vec<PairKey>,
    /// Records finalized this frame, ordered by pair.
    pub ended: Vec<InteractionRecord>,
}

impl TrackerUpdate {
    pub fn trigger_count(&self) -> u32 {
        self.new_triggers.len() as u32
    }
}

/// Owns the active interaction records for one run.
#[derive(Debug)]
pub struct InteractionTracker {
    threshold_frames: u32,
    active: BTreeMap<PairKey, InteractionRecord>,
    last_frame: Option<u64>,
}

impl InteractionTracker {
    pub fn new(threshold_frames: u32) -> Self {
        Self {
            threshold_frames: threshold_frames.max(1),
            active: BTreeMap::new(),
            last_frame: None,
        }
    }

    /// Tracker whose threshold is derived from a duration and the source frame rate.
    pub fn from_duration(duration_secs: f64, fps: f64, frame_interval: u32) -> Self {
        Self::new(trigger_threshold_frames(duration_secs, fps, frame_interval))
    }

    pub fn threshold_frames(&self) -> u32 {
        self.threshold_frames
    }

    /// Last frame passed to `update`.
    pub fn last_frame(&self) -> Option<u64> {
        self.last_frame
    }

    /// Advance the state machine to `frame` with this frame's interacting pairs.
    ///
    /// Records that stop interacting end at the previously processed frame.
    pub fn update(&mut self, frame: u64, interacting: &BTreeSet<PairKey>) -> TrackerUpdate {
        if let Some(last) = self.last_frame {
            if frame <= last {
                log::warn!(
                    "tracker received frame {} after frame {}; frames must be strictly increasing",
                    frame,
                    last
                );
            }
        }
        let previous_frame = self.last_frame.unwrap_or(frame.saturating_sub(1));
        let mut update = TrackerUpdate {
            frame,
            ..TrackerUpdate::default()
        };

        let threshold = self.threshold_frames;
        let mut stopped = Vec::new();
        for (pair, record) in self.active.iter_mut() {
            if interacting.contains(pair) {
                record.consecutive_frames = record.consecutive_frames.saturating_add(1);
                if record.consecutive_frames >= threshold && record.mark_triggered(frame) {
                    update.new_triggers.push(*pair);
                }
            } else {
                stopped.push(*pair);
            }
        }

        for pair in stopped {
            if let Some(mut record) = self.active.remove(&pair) {
                record.end_frame = Some(previous_frame);
                update.ended.push(record);
            }
        }

        for pair in interacting {
            if self.active.contains_key(pair) {
                continue;
            }
            let mut record = InteractionRecord::new(*pair, frame);
            if record.consecutive_frames >= threshold && record.mark_triggered(frame) {
                update.new_triggers.push(*pair);
            }
            self.active.insert(*pair, record);
        }

        self.last_frame = Some(frame);
        update
    }

    pub fn active_record(&self, pair: &PairKey) -> Option<&InteractionRecord> {
        self.active.get(pair)
    }

    pub fn active_len(&self) -> usize {
        self.active.len()
    }

    pub fn active_snapshot(&self) -> Vec<InteractionRecord> {
        self.active.values().cloned().collect()
    }

    /// Finalize every active record at the last processed frame.
    ///
    /// Each record is returned exactly once; a second flush returns nothing.
    pub fn flush(&mut self) -> Vec<InteractionRecord> {
        let active = std::mem::take(&mut self.active);
        active
            .into_values()
            .map(|mut record| {
                let end = self
                    .last_frame
                    .unwrap_or(record.start_frame)
                    .max(record.start_frame);
                record.end_frame = Some(end);
                record
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair(a: u32, b: u32) -> PairKey {
        PairKey::new(a, b).unwrap()
    }

    fn set(pairs: &[PairKey]) -> BTreeSet<PairKey> {
        pairs.iter().copied().collect()
    }

    #[test]
    fn threshold_follows_fps_and_interval() {
        assert_eq!(trigger_threshold_frames(2.0, 30.0, 1), 60);
        assert_eq!(trigger_threshold_frames(2.0, 25.0, 1), 50);
        assert_eq!(trigger_threshold_frames(2.0, 29.97, 1), 60);
        assert_eq!(trigger_threshold_frames(2.0, 30.0, 2), 30);
        assert_eq!(trigger_threshold_frames(2.0, 30.0, 0), 60);
        assert_eq!(trigger_threshold_frames(0.0, 30.0, 1), 1);
        assert_eq!(trigger_threshold_frames(2.0, f64::NAN, 1), 1);
    }

    #[test]
    fn triggers_once_at_threshold() {
        let mut tracker = InteractionTracker::new(5);
        let p = pair(1, 2);
        let mut trigger_frames = Vec::new();
        for frame in 1..=9 {
            let update = tracker.update(frame, &set(&[p]));
            if update.trigger_count() > 0 {
                trigger_frames.push(frame);
            }
            assert!(update.ended.is_empty());
        }
        assert_eq!(trigger_frames, vec![5]);
        let record = tracker.active_record(&p).unwrap();
        assert!(record.triggered);
        assert_eq!(record.trigger_frame, Some(5));
        assert_eq!(record.consecutive_frames, 9);
    }

    #[test]
    fn short_interaction_ends_untriggered() {
        let mut tracker = InteractionTracker::new(60);
        let p = pair(1, 2);
        for frame in 1..=30 {
            tracker.update(frame, &set(&[p]));
        }
        let update = tracker.update(31, &set(&[]));
        assert_eq!(update.ended.len(), 1);
        let record = &update.ended[0];
        assert_eq!(record.start_frame, 1);
        assert_eq!(record.end_frame, Some(30));
        assert_eq!(record.consecutive_frames, 30);
        assert!(!record.triggered);
        assert_eq!(tracker.active_len(), 0);
    }

    #[test]
    fn reinteraction_creates_new_record() {
        let mut tracker = InteractionTracker::new(3);
        let p = pair(4, 9);
        for frame in 1..=4 {
            tracker.update(frame, &set(&[p]));
        }
        let gap = tracker.update(5, &set(&[]));
        assert!(gap.ended[0].triggered);
        let again = tracker.update(6, &set(&[p]));
        assert!(again.new_triggers.is_empty());
        let record = tracker.active_record(&p).unwrap();
        assert_eq!(record.start_frame, 6);
        assert!(!record.triggered);
        assert_eq!(record.consecutive_frames, 1);
    }

    #[test]
    fn threshold_of_one_triggers_on_creation() {
        let mut tracker = InteractionTracker::new(1);
        let update = tracker.update(1, &set(&[pair(1, 2)]));
        assert_eq!(update.new_triggers, vec![pair(1, 2)]);
        let update = tracker.update(2, &set(&[pair(1, 2)]));
        assert!(update.new_triggers.is_empty());
    }

    #[test]
    fn end_frame_uses_previous_processed_frame() {
        let mut tracker = InteractionTracker::new(10);
        let p = pair(1, 2);
        tracker.update(1, &set(&[p]));
        tracker.update(3, &set(&[p]));
        let update = tracker.update(5, &set(&[]));
        assert_eq!(update.ended[0].end_frame, Some(3));
    }

    #[test]
    fn flush_emits_each_active_record_once() {
        let mut tracker = InteractionTracker::new(3);
        let a = pair(1, 2);
        let b = pair(2, 3);
        for frame in 1..=4 {
            let pairs = if frame >= 3 { set(&[a, b]) } else { set(&[a]) };
            tracker.update(frame, &pairs);
        }
        let flushed = tracker.flush();
        assert_eq!(flushed.len(), 2);
        assert_eq!(flushed[0].pair, a);
        assert!(flushed[0].triggered);
        assert_eq!(flushed[0].end_frame, Some(4));
        assert_eq!(flushed[1].pair, b);
        assert!(!flushed[1].triggered);
        assert_eq!(flushed[1].start_frame, 3);
        assert_eq!(flushed[1].end_frame, Some(4));
        assert!(flushed.iter().all(InteractionRecord::is_finalized));
        assert_eq!(tracker.last_frame(), Some(4));
        assert!(tracker.flush().is_empty());
    }
}
