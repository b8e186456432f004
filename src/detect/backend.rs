use anyhow::Result;

use crate::depth::DepthMap;
use crate::detect::result::PersonMap;
use crate::frame::Frame;
use crate::geometry::BBox;

/// Person/pose detector with identity tracking.
///
/// # Contract
///
/// - Ids are stable across consecutive frames while a subject stays visible.
/// - Ids may be reused for a different subject after a gap; callers must not
///   assume a permanent identity.
/// - Implementations must not retain the frame beyond the `detect` call.
pub trait PoseDetector: Send {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Run detection and tracking on a frame.
    fn detect(&mut self, frame: &Frame) -> Result<PersonMap>;

    /// Optional warm-up hook.
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Monocular depth estimator.
///
/// Values are relative depth or disparity, assumed comparable within a frame.
pub trait DepthEstimator: Send {
    fn name(&self) -> &'static str;

    /// Dense depth map for the whole frame.
    fn depth_map(&mut self, frame: &Frame) -> Result<DepthMap>;

    /// Scalar depth for a person: median over the box clipped to the map, 0 when empty.
    fn person_depth(&self, map: &DepthMap, bbox: &BBox) -> f32 {
        map.median_in(bbox)
    }

    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}
