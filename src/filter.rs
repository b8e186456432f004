//! Per-frame interaction filter.
//!
//! Wires the detector and depth collaborators to the core:
//! persons -> z metrics -> pair graph -> tracker -> `FrameResult`.

use std::collections::{BTreeMap, BTreeSet};

use anyhow::{anyhow, Result};

use crate::depth::DepthMap;
use crate::detect::{DepthEstimator, PersonMap, PoseDetector, TrackId};
use crate::frame::Frame;
use crate::graph::{FrameGraph, PairKey};
use crate::tracker::{InteractionRecord, InteractionTracker};
use crate::zplane::{ZPlaneEstimator, ZPlaneMethod};

/// Everything produced for one processed frame.
#[derive(Clone, Debug, Default)]
pub struct FrameResult {
    pub frame: u64,
    pub persons: PersonMap,
    pub overlapping_pairs: BTreeSet<PairKey>,
    pub interacting_pairs: BTreeSet<PairKey>,
    pub groups: Vec<Vec<TrackId>>,
    /// Empty when fewer than two persons were detected.
    pub z_metrics: BTreeMap<TrackId, f32>,
    pub triggers_this_frame: u32,
    pub new_triggers: Vec<PairKey>,
    pub ended_interactions: Vec<InteractionRecord>,
    /// Active records after this frame's update.
    pub active_interactions: Vec<InteractionRecord>,
}

impl FrameResult {
    pub fn has_overlap(&self) -> bool {
        !self.overlapping_pairs.is_empty()
    }

    pub fn has_interaction(&self) -> bool {
        !self.interacting_pairs.is_empty()
    }
}

pub struct InteractionFilter {
    estimator: ZPlaneEstimator,
    tracker: InteractionTracker,
    detector: Box<dyn PoseDetector>,
    depth: Option<Box<dyn DepthEstimator>>,
}

impl InteractionFilter {
    /// MDE requires a depth estimator; other methods ignore one if given.
    pub fn new(
        estimator: ZPlaneEstimator,
        tracker: InteractionTracker,
        detector: Box<dyn PoseDetector>,
        depth: Option<Box<dyn DepthEstimator>>,
    ) -> Result<Self> {
        if estimator.method().needs_depth() && depth.is_none() {
            return Err(anyhow!(
                "z-plane method '{}' requires a depth estimator",
                estimator.method()
            ));
        }
        log::info!(
            "interaction filter: method={} detector={} depth={} trigger_threshold={} frames",
            estimator.method(),
            detector.name(),
            depth.as_ref().map(|d| d.name()).unwrap_or("none"),
            tracker.threshold_frames()
        );
        Ok(Self {
            estimator,
            tracker,
            detector,
            depth,
        })
    }

    pub fn method(&self) -> ZPlaneMethod {
        self.estimator.method()
    }

    pub fn threshold_frames(&self) -> u32 {
        self.tracker.threshold_frames()
    }

    pub fn tracker(&self) -> &InteractionTracker {
        &self.tracker
    }

    pub fn warm_up(&mut self) -> Result<()> {
        self.detector.warm_up()?;
        if let Some(depth) = self.depth.as_mut() {
            depth.warm_up()?;
        }
        Ok(())
    }

    /// Detect persons in `frame` and advance the tracker.
    ///
    /// The depth map is only computed for MDE when at least two persons are present.
    pub fn process(&mut self, frame: &Frame) -> Result<FrameResult> {
        let persons = self.detector.detect(frame)?;

        let depth_map = match self.depth.as_mut() {
            Some(depth) if self.estimator.method().needs_depth() && persons.len() > 1 => {
                Some(depth.depth_map(frame)?)
            }
            _ => None,
        };

        Ok(self.analyze(frame.index, persons, depth_map.as_ref()))
    }

    /// Core step on already-detected persons. Never fails.
    pub fn analyze(
        &mut self,
        frame: u64,
        persons: PersonMap,
        depth_map: Option<&DepthMap>,
    ) -> FrameResult {
        let z_metrics = self.z_metrics(&persons, depth_map);
        let graph = FrameGraph::build(&persons, &z_metrics, &self.estimator);
        let update = self.tracker.update(frame, &graph.interacting_pairs);

        for pair in &update.new_triggers {
            log::info!("trigger: pair {} interacting at frame {}", pair, frame);
        }
        for record in &update.ended {
            log::debug!(
                "interaction ended: pair {} frames {}-{} triggered={}",
                record.pair,
                record.start_frame,
                record.end_frame.unwrap_or(record.start_frame),
                record.triggered
            );
        }

        FrameResult {
            frame,
            persons,
            overlapping_pairs: graph.overlapping_pairs,
            interacting_pairs: graph.interacting_pairs,
            groups: graph.groups,
            z_metrics,
            triggers_this_frame: update.trigger_count(),
            new_triggers: update.new_triggers,
            ended_interactions: update.ended,
            active_interactions: self.tracker.active_snapshot(),
        }
    }

    /// End-of-stream flush of every still-active interaction.
    pub fn finish(&mut self) -> Vec<InteractionRecord> {
        self.tracker.flush()
    }

    fn z_metrics(
        &self,
        persons: &PersonMap,
        depth_map: Option<&DepthMap>,
    ) -> BTreeMap<TrackId, f32> {
        if persons.len() < 2 {
            return BTreeMap::new();
        }
        persons
            .values()
            .map(|person| {
                let person_depth = match (depth_map, self.depth.as_ref()) {
                    (Some(map), Some(depth)) => Some(depth.person_depth(map, &person.bbox)),
                    _ => None,
                };
                (person.id, self.estimator.metric(person, person_depth))
            })
            .collect()
    }
}
