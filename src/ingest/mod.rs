//! Frame sources.
//!
//! Video decode is outside this crate. Sources here replay recorded detections
//! (`replay`) or generate a seeded synthetic scene (`synthetic`); both emit
//! metadata-only frames whose detections are served by replay backends.

pub mod replay;
pub mod synthetic;

use anyhow::Result;

use crate::frame::Frame;

pub use replay::{ReplaySource, Scenario};
pub use synthetic::SyntheticScene;

/// Path prefix that selects the synthetic scene instead of a scenario file.
pub const SYNTHETIC_SCHEME: &str = "synthetic://";

/// Pull-driven, strictly ordered frame source.
pub trait FrameSource {
    /// Source frame rate.
    fn fps(&self) -> f64;

    /// Total frames when known up front.
    fn frame_count_hint(&self) -> Option<u64> {
        None
    }

    /// Next frame, or `None` at end of stream.
    fn next_frame(&mut self) -> Result<Option<Frame>>;

    fn describe(&self) -> String;
}

/// Load a scenario from a file path, or build the synthetic scene for
/// `synthetic://` paths.
pub fn open_scenario(path: &str, seed: Option<u64>) -> Result<Scenario> {
    if let Some(rest) = path.strip_prefix(SYNTHETIC_SCHEME) {
        let mut scene = SyntheticScene::default();
        if let Some(seed) = seed {
            scene.seed = seed;
        }
        if !rest.trim().is_empty() {
            log::debug!("synthetic scene label '{}'", rest);
        }
        return Ok(scene.build());
    }
    Scenario::load(path)
}
