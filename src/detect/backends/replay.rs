use anyhow::Result;

use crate::depth::DepthMap;
use crate::detect::backend::{DepthEstimator, PoseDetector};
use crate::detect::result::PersonMap;
use crate::frame::Frame;

/// Detector that serves recorded detections by frame index (1-based).
///
/// Frames past the end of the recording have no persons.
pub struct ReplayDetector {
    frames: Vec<PersonMap>,
}

impl ReplayDetector {
    pub fn new(frames: Vec<PersonMap>) -> Self {
        Self { frames }
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

impl PoseDetector for ReplayDetector {
    fn name(&self) -> &'static str {
        "replay"
    }

    fn detect(&mut self, frame: &Frame) -> Result<PersonMap> {
        Ok(recorded(&self.frames, frame.index)
            .cloned()
            .unwrap_or_default())
    }
}

/// Depth estimator that serves recorded depth maps by frame index.
///
/// Frames without a recorded map get an empty map, so every person depth is 0
/// and no pair is judged same-plane.
pub struct ReplayDepth {
    maps: Vec<Option<DepthMap>>,
}

impl ReplayDepth {
    pub fn new(maps: Vec<Option<DepthMap>>) -> Self {
        Self { maps }
    }
}

impl DepthEstimator for ReplayDepth {
    fn name(&self) -> &'static str {
        "replay"
    }

    fn depth_map(&mut self, frame: &Frame) -> Result<DepthMap> {
        Ok(recorded(&self.maps, frame.index)
            .and_then(|map| map.clone())
            .unwrap_or_else(DepthMap::empty))
    }
}

fn recorded<T>(items: &[T], frame_index: u64) -> Option<&T> {
    let slot = usize::try_from(frame_index.checked_sub(1)?).ok()?;
    items.get(slot)
}
