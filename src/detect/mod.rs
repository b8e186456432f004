mod backend;
pub mod backends;
mod result;

pub use backend::{DepthEstimator, PoseDetector};
pub use backends::{ReplayDepth, ReplayDetector};
pub use result::{keypoints, Keypoint, Person, PersonMap, TrackId};
