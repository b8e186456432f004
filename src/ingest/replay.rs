//! Recorded-scenario replay.
//!
//! A scenario file holds per-frame detections (and optional depth maps) captured
//! from an external detector, so the filter can be run and compared across
//! methods without the models:
//!
//! ```json
//! {
//!   "fps": 30.0, "width": 640, "height": 480,
//!   "frames": [
//!     { "persons": [ { "id": 1, "bbox": [100, 100, 200, 400],
//!                      "keypoints": [[150, 120, 0.9], ...] } ],
//!       "depth_map": { "width": 4, "height": 3, "values": [...] } }
//!   ]
//! }
//! ```
//!
//! Frame indices are 1-based: `frames[0]` is frame 1.

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};

use super::FrameSource;
use crate::depth::DepthMap;
use crate::detect::{Keypoint, Person, PersonMap, ReplayDepth, ReplayDetector, TrackId};
use crate::frame::Frame;
use crate::geometry::BBox;

const DEFAULT_WIDTH: u32 = 640;
const DEFAULT_HEIGHT: u32 = 480;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    pub fps: f64,
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
    #[serde(default)]
    pub frames: Vec<ScenarioFrame>,
    /// Where the scenario came from, for logs.
    #[serde(skip)]
    pub label: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ScenarioFrame {
    #[serde(default)]
    pub persons: Vec<ScenarioPerson>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub depth_map: Option<DepthMap>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScenarioPerson {
    pub id: TrackId,
    pub bbox: BBox,
    #[serde(default)]
    pub keypoints: Vec<Keypoint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f32>,
}

impl ScenarioPerson {
    fn to_person(&self) -> Person {
        let person = Person::new(self.id, self.bbox, self.keypoints.clone());
        match self.confidence {
            Some(c) => person.with_confidence(c),
            None => person,
        }
    }
}

fn default_width() -> u32 {
    DEFAULT_WIDTH
}

fn default_height() -> u32 {
    DEFAULT_HEIGHT
}

impl Scenario {
    /// Load a scenario from a local JSON file.
    pub fn load(path: &str) -> Result<Self> {
        if !is_local_file_path(path) {
            return Err(anyhow!(
                "scenario replay only supports local paths (got '{}')",
                path
            ));
        }
        let raw = std::fs::read_to_string(Path::new(path))
            .with_context(|| format!("failed to read scenario {}", path))?;
        let mut scenario =
            Self::from_json(&raw).with_context(|| format!("invalid scenario {}", path))?;
        scenario.label = path.to_string();
        Ok(scenario)
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        let mut scenario: Scenario = serde_json::from_str(raw)?;
        scenario.validate()?;
        if scenario.label.is_empty() {
            scenario.label = "inline".to_string();
        }
        Ok(scenario)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.fps.is_finite() || self.fps <= 0.0 {
            return Err(anyhow!("scenario fps must be positive, got {}", self.fps));
        }
        for (i, frame) in self.frames.iter().enumerate() {
            for person in &frame.persons {
                let b = person.bbox;
                if b.x1 > b.x2 || b.y1 > b.y2 {
                    log::warn!(
                        "frame {}: person {} has inverted bbox [{}, {}, {}, {}]",
                        i + 1,
                        person.id,
                        b.x1,
                        b.y1,
                        b.x2,
                        b.y2
                    );
                }
            }
        }
        Ok(())
    }

    pub fn frame_count(&self) -> u64 {
        self.frames.len() as u64
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Split into a frame source and the detector/depth backends that serve it.
    pub fn into_parts(self) -> (ReplaySource, ReplayDetector, ReplayDepth) {
        let source = ReplaySource {
            fps: self.fps,
            width: self.width,
            height: self.height,
            total: self.frame_count(),
            next: 1,
            label: self.label.clone(),
        };

        let mut detections = Vec::with_capacity(self.frames.len());
        let mut depth_maps = Vec::with_capacity(self.frames.len());
        for (i, frame) in self.frames.into_iter().enumerate() {
            let mut persons = PersonMap::new();
            for p in &frame.persons {
                if persons.insert(p.id, p.to_person()).is_some() {
                    log::warn!("frame {}: duplicate person id {}", i + 1, p.id);
                }
            }
            detections.push(persons);
            depth_maps.push(frame.depth_map);
        }

        (
            source,
            ReplayDetector::new(detections),
            ReplayDepth::new(depth_maps),
        )
    }
}

/// Emits one metadata-only frame per recorded scenario frame.
pub struct ReplaySource {
    fps: f64,
    width: u32,
    height: u32,
    total: u64,
    next: u64,
    label: String,
}

impl ReplaySource {
    pub fn frames_emitted(&self) -> u64 {
        self.next - 1
    }
}

impl FrameSource for ReplaySource {
    fn fps(&self) -> f64 {
        self.fps
    }

    fn frame_count_hint(&self) -> Option<u64> {
        Some(self.total)
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        if self.next > self.total {
            return Ok(None);
        }
        let frame = Frame::metadata_only(self.next, self.width, self.height);
        self.next += 1;
        Ok(Some(frame))
    }

    fn describe(&self) -> String {
        format!(
            "replay {} ({} frames @ {:.2} fps)",
            self.label, self.total, self.fps
        )
    }
}

fn is_local_file_path(path: &str) -> bool {
    if path.trim().is_empty() {
        return false;
    }
    !path.contains("://")
}
