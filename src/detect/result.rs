use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::geometry::BBox;

/// Tracker-assigned id slot. Stable while a subject stays visible, but may be
/// reused for a different subject after a gap.
pub type TrackId = u32;

/// Persons detected in one frame, keyed by track id.
pub type PersonMap = BTreeMap<TrackId, Person>;

/// COCO-17 keypoint indices used by the z-plane heuristics.
pub mod keypoints {
    pub const NOSE: usize = 0;
    pub const LEFT_EYE: usize = 1;
    pub const RIGHT_EYE: usize = 2;
    pub const LEFT_EAR: usize = 3;
    pub const RIGHT_EAR: usize = 4;

    /// Keypoints whose horizontal spread approximates head width.
    pub const HEAD: [usize; 5] = [NOSE, LEFT_EYE, RIGHT_EYE, LEFT_EAR, RIGHT_EAR];

    pub const COUNT: usize = 17;
}

/// Keypoint in pixel space. Serialized as `[x, y, confidence]`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f32; 3]", into = "[f32; 3]")]
pub struct Keypoint {
    pub x: f32,
    pub y: f32,
    pub confidence: f32,
}

impl Keypoint {
    pub fn new(x: f32, y: f32, confidence: f32) -> Self {
        Self { x, y, confidence }
    }

    pub fn distance(&self, other: &Keypoint) -> f32 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

impl From<[f32; 3]> for Keypoint {
    fn from(v: [f32; 3]) -> Self {
        Self::new(v[0], v[1], v[2])
    }
}

impl From<Keypoint> for [f32; 3] {
    fn from(k: Keypoint) -> Self {
        [k.x, k.y, k.confidence]
    }
}

/// One detected person in one frame.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Person {
    pub id: TrackId,
    pub bbox: BBox,
    /// COCO-17 ordered keypoints. May be shorter when the detector has no pose head.
    pub keypoints: Vec<Keypoint>,
    /// Aggregate confidence, the mean keypoint confidence unless the detector supplies one.
    pub confidence: f32,
}

impl Person {
    pub fn new(id: TrackId, bbox: BBox, keypoints: Vec<Keypoint>) -> Self {
        let confidence = mean_confidence(&keypoints);
        Self {
            id,
            bbox,
            keypoints,
            confidence,
        }
    }

    pub fn with_confidence(mut self, confidence: f32) -> Self {
        self.confidence = confidence;
        self
    }

    pub fn keypoint(&self, index: usize) -> Option<&Keypoint> {
        self.keypoints.get(index)
    }
}

fn mean_confidence(keypoints: &[Keypoint]) -> f32 {
    if keypoints.is_empty() {
        return 0.0;
    }
    keypoints.iter().map(|k| k.confidence).sum::<f32>() / keypoints.len() as f32
}
