//! Rectangle utilities for pixel-space bounding boxes.

use serde::{Deserialize, Serialize};

/// Axis-aligned box in pixel space, `x1 <= x2` and `y1 <= y2`.
///
/// Serialized as `[x1, y1, x2, y2]`. Malformed boxes are not rejected here;
/// detectors own that validation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f32; 4]", into = "[f32; 4]")]
pub struct BBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl BBox {
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    pub fn width(&self) -> f32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> f32 {
        self.y2 - self.y1
    }
}

impl From<[f32; 4]> for BBox {
    fn from(v: [f32; 4]) -> Self {
        Self::new(v[0], v[1], v[2], v[3])
    }
}

impl From<BBox> for [f32; 4] {
    fn from(b: BBox) -> Self {
        [b.x1, b.y1, b.x2, b.y2]
    }
}

/// True unless one box lies strictly left of or strictly above the other.
///
/// Boxes that only share an edge or a corner overlap.
pub fn overlaps(a: &BBox, b: &BBox) -> bool {
    if a.x2 < b.x1 || b.x2 < a.x1 {
        return false;
    }
    if a.y2 < b.y1 || b.y2 < a.y1 {
        return false;
    }
    true
}

/// Integer midpoint, truncated toward zero.
pub fn center(bbox: &BBox) -> (i32, i32) {
    (
        ((bbox.x1 + bbox.x2) / 2.0) as i32,
        ((bbox.y1 + bbox.y2) / 2.0) as i32,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overlapping_boxes() {
        let a = BBox::new(0.0, 0.0, 10.0, 10.0);
        let b = BBox::new(5.0, 5.0, 15.0, 15.0);
        assert!(overlaps(&a, &b));
        assert!(overlaps(&b, &a));
    }

    #[test]
    fn disjoint_boxes() {
        let a = BBox::new(0.0, 0.0, 10.0, 10.0);
        let far = BBox::new(20.0, 20.0, 30.0, 30.0);
        let right = BBox::new(10.5, 0.0, 20.0, 10.0);
        let below = BBox::new(0.0, 10.5, 10.0, 20.0);
        for other in [far, right, below] {
            assert!(!overlaps(&a, &other));
            assert!(!overlaps(&other, &a));
        }
    }

    #[test]
    fn touching_edge_and_corner_overlap() {
        let a = BBox::new(0.0, 0.0, 10.0, 10.0);
        let edge = BBox::new(10.0, 0.0, 20.0, 10.0);
        let corner = BBox::new(10.0, 10.0, 20.0, 20.0);
        assert!(overlaps(&a, &edge));
        assert!(overlaps(&edge, &a));
        assert!(overlaps(&a, &corner));
        assert!(overlaps(&corner, &a));
    }

    #[test]
    fn containment_overlaps() {
        let outer = BBox::new(0.0, 0.0, 100.0, 100.0);
        let inner = BBox::new(40.0, 40.0, 60.0, 60.0);
        assert!(overlaps(&outer, &inner));
        assert!(overlaps(&inner, &outer));
    }

    #[test]
    fn center_truncates() {
        assert_eq!(center(&BBox::new(0.0, 0.0, 10.0, 10.0)), (5, 5));
        assert_eq!(center(&BBox::new(0.0, 0.0, 5.0, 7.0)), (2, 3));
    }

    #[test]
    fn serializes_as_array() {
        let b = BBox::new(1.0, 2.0, 3.0, 4.0);
        let json = serde_json::to_string(&b).unwrap();
        assert_eq!(json, "[1.0,2.0,3.0,4.0]");
        let back: BBox = serde_json::from_str(&json).unwrap();
        assert_eq!(back, b);
    }
}
