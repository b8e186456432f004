//! Same-depth-plane ("z-plane") estimation.
//!
//! Each person is reduced to one scalar depth proxy. Heuristic methods use the
//! projected size of head features: people at the same distance from the camera
//! project similarly sized heads. The MDE method uses the median of a monocular
//! depth map over the person's box.
//!
//! A metric of 0 means "unusable" (missing keypoints, empty depth region) and is
//! never judged same-plane, so missing data cannot cause a trigger.

use std::fmt;
use std::str::FromStr;

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

use crate::detect::{keypoints, Keypoint, Person};

/// Keypoint confidence a point must exceed to be used.
pub const DEFAULT_KEYPOINT_CONFIDENCE: f32 = 0.5;
/// Heuristic size ratio below which two people are same-plane.
pub const DEFAULT_RATIO_THRESHOLD: f32 = 1.3;
/// Relative depth difference below which two people are same-plane.
pub const DEFAULT_DEPTH_DIFF_THRESHOLD: f32 = 0.10;

const DEPTH_EPSILON: f32 = 1e-6;

#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum ZPlaneMethod {
    /// Interpupillary distance.
    Ipd,
    /// Horizontal span of head keypoints.
    Head,
    /// IPD, falling back to head span.
    Hybrid,
    /// Monocular depth estimation.
    Mde,
}

impl ZPlaneMethod {
    pub const ALL: [ZPlaneMethod; 4] = [Self::Ipd, Self::Head, Self::Hybrid, Self::Mde];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ipd => "ipd",
            Self::Head => "head",
            Self::Hybrid => "hybrid",
            Self::Mde => "mde",
        }
    }

    pub fn needs_depth(&self) -> bool {
        matches!(self, Self::Mde)
    }
}

impl Default for ZPlaneMethod {
    fn default() -> Self {
        Self::Hybrid
    }
}

impl fmt::Display for ZPlaneMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ZPlaneMethod {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|m| m.as_str() == wanted)
            .ok_or_else(|| {
                anyhow!(
                    "unknown z-plane method '{}' (expected ipd, head, hybrid or mde)",
                    s
                )
            })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ZPlaneThresholds {
    pub keypoint_confidence: f32,
    pub ratio_threshold: f32,
    pub depth_diff_threshold: f32,
}

impl Default for ZPlaneThresholds {
    fn default() -> Self {
        Self {
            keypoint_confidence: DEFAULT_KEYPOINT_CONFIDENCE,
            ratio_threshold: DEFAULT_RATIO_THRESHOLD,
            depth_diff_threshold: DEFAULT_DEPTH_DIFF_THRESHOLD,
        }
    }
}

/// Per-person depth proxy and pairwise same-plane test for one method.
#[derive(Clone, Copy, Debug)]
pub struct ZPlaneEstimator {
    method: ZPlaneMethod,
    thresholds: ZPlaneThresholds,
}

impl ZPlaneEstimator {
    pub fn new(method: ZPlaneMethod, thresholds: ZPlaneThresholds) -> Self {
        Self { method, thresholds }
    }

    pub fn method(&self) -> ZPlaneMethod {
        self.method
    }

    pub fn thresholds(&self) -> &ZPlaneThresholds {
        &self.thresholds
    }

    /// Depth proxy for one person.
    ///
    /// `person_depth` is only read by the MDE method; pass `None` when no depth
    /// map was computed for the frame.
    pub fn metric(&self, person: &Person, person_depth: Option<f32>) -> f32 {
        match self.method {
            ZPlaneMethod::Ipd => self.ipd(person).unwrap_or(0.0),
            ZPlaneMethod::Head => self.head_span(person).unwrap_or(0.0),
            ZPlaneMethod::Hybrid => self
                .ipd(person)
                .filter(|v| *v > 0.0)
                .or_else(|| self.head_span(person))
                .unwrap_or(0.0),
            ZPlaneMethod::Mde => person_depth.unwrap_or(0.0),
        }
    }

    pub fn same_plane(&self, v1: f32, v2: f32) -> bool {
        same_plane(v1, v2, self.method, &self.thresholds)
    }

    fn ipd(&self, person: &Person) -> Option<f32> {
        let left = self.confident(person, keypoints::LEFT_EYE)?;
        let right = self.confident(person, keypoints::RIGHT_EYE)?;
        Some(left.distance(right))
    }

    fn head_span(&self, person: &Person) -> Option<f32> {
        let xs: Vec<f32> = keypoints::HEAD
            .iter()
            .filter_map(|&idx| self.confident(person, idx))
            .map(|k| k.x)
            .collect();
        if xs.len() < 2 {
            return None;
        }
        let min = xs.iter().copied().fold(f32::INFINITY, f32::min);
        let max = xs.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        Some(max - min)
    }

    fn confident<'a>(&self, person: &'a Person, index: usize) -> Option<&'a Keypoint> {
        person
            .keypoint(index)
            .filter(|k| k.confidence > self.thresholds.keypoint_confidence)
    }
}

/// Whether two depth proxies describe the same depth plane.
///
/// Always false when either value is 0. Symmetric in `(v1, v2)`.
pub fn same_plane(
    v1: f32,
    v2: f32,
    method: ZPlaneMethod,
    thresholds: &ZPlaneThresholds,
) -> bool {
    if v1 == 0.0 || v2 == 0.0 {
        return false;
    }
    match method {
        ZPlaneMethod::Mde => depth_diff_ratio(v1, v2) < thresholds.depth_diff_threshold,
        ZPlaneMethod::Ipd | ZPlaneMethod::Head | ZPlaneMethod::Hybrid => {
            size_ratio(v1, v2) < thresholds.ratio_threshold
        }
    }
}

fn size_ratio(v1: f32, v2: f32) -> f32 {
    (v1 / v2).max(v2 / v1)
}

fn depth_diff_ratio(v1: f32, v2: f32) -> f32 {
    (v1 - v2).abs() / (v1.abs().max(v2.abs()) + DEPTH_EPSILON)
}
