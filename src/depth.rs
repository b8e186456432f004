//! Dense depth maps and per-person depth aggregation.

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

use crate::geometry::BBox;

/// Row-major `width x height` field of relative depth values.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "DepthMapFile")]
pub struct DepthMap {
    width: usize,
    height: usize,
    values: Vec<f32>,
}

#[derive(Deserialize)]
struct DepthMapFile {
    width: usize,
    height: usize,
    values: Vec<f32>,
}

impl TryFrom<DepthMapFile> for DepthMap {
    type Error = anyhow::Error;

    fn try_from(file: DepthMapFile) -> Result<Self> {
        Self::new(file.width, file.height, file.values)
    }
}

impl DepthMap {
    pub fn new(width: usize, height: usize, values: Vec<f32>) -> Result<Self> {
        let expected = width
            .checked_mul(height)
            .ok_or_else(|| anyhow!("depth map {}x{} is too large", width, height))?;
        if values.len() != expected {
            return Err(anyhow!(
                "depth map {}x{} needs {} values, got {}",
                width,
                height,
                expected,
                values.len()
            ));
        }
        Ok(Self {
            width,
            height,
            values,
        })
    }

    /// Zero-sized map. Every region is empty.
    pub fn empty() -> Self {
        Self {
            width: 0,
            height: 0,
            values: Vec::new(),
        }
    }

    pub fn filled(width: usize, height: usize, value: f32) -> Self {
        Self {
            width,
            height,
            values: vec![value; width * height],
        }
    }

    pub fn from_fn(width: usize, height: usize, f: impl Fn(usize, usize) -> f32) -> Self {
        let mut values = Vec::with_capacity(width * height);
        for y in 0..height {
            for x in 0..width {
                values.push(f(x, y));
            }
        }
        Self {
            width,
            height,
            values,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn get(&self, x: usize, y: usize) -> Option<f32> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.values.get(y * self.width + x).copied()
    }

    /// Median depth inside `bbox` clipped to the map bounds.
    ///
    /// Coordinates are truncated to whole pixels; the lower bound is inclusive and
    /// the upper bound exclusive. Returns 0 when the clipped region is empty.
    pub fn median_in(&self, bbox: &BBox) -> f32 {
        let x1 = clip(bbox.x1, self.width);
        let y1 = clip(bbox.y1, self.height);
        let x2 = clip(bbox.x2, self.width);
        let y2 = clip(bbox.y2, self.height);
        if x1 >= x2 || y1 >= y2 {
            return 0.0;
        }

        let mut region: Vec<f32> = (y1..y2)
            .flat_map(|y| {
                let row = y * self.width;
                self.values[row + x1..row + x2].iter().copied()
            })
            .collect();
        median(&mut region)
    }
}

fn clip(coord: f32, limit: usize) -> usize {
    let c = coord as i64;
    c.clamp(0, limit as i64) as usize
}

fn median(values: &mut [f32]) -> f32 {
    if values.is_empty() {
        return 0.0;
    }
    values.sort_by(|a, b| a.total_cmp(b));
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_mismatched_length() {
        assert!(DepthMap::new(2, 2, vec![0.0; 3]).is_err());
        assert!(DepthMap::new(2, 2, vec![0.0; 4]).is_ok());
    }

    #[test]
    fn median_over_clipped_region() {
        let map = DepthMap::from_fn(4, 4, |x, y| (y * 4 + x) as f32);
        // Rows 0..2, cols 0..2: 0, 1, 4, 5 -> even count averages 1 and 4.
        assert_eq!(map.median_in(&BBox::new(0.0, 0.0, 2.0, 2.0)), 2.5);
        // Partially outside; clipped to cols 3..4, rows 0..1 -> single value 3.
        assert_eq!(map.median_in(&BBox::new(3.0, -5.0, 99.0, 1.0)), 3.0);
    }

    #[test]
    fn empty_region_is_zero() {
        let map = DepthMap::filled(4, 4, 0.7);
        assert_eq!(map.median_in(&BBox::new(10.0, 10.0, 20.0, 20.0)), 0.0);
        assert_eq!(map.median_in(&BBox::new(1.0, 1.0, 1.0, 3.0)), 0.0);
        assert_eq!(DepthMap::empty().median_in(&BBox::new(0.0, 0.0, 5.0, 5.0)), 0.0);
    }

    #[test]
    fn deserialization_is_validated() {
        let ok: DepthMap =
            serde_json::from_str(r#"{"width": 2, "height": 1, "values": [0.1, 0.2]}"#).unwrap();
        assert_eq!(ok.get(1, 0), Some(0.2));
        let bad = serde_json::from_str::<DepthMap>(r#"{"width": 2, "height": 2, "values": [0.1]}"#);
        assert!(bad.is_err());
    }
}
