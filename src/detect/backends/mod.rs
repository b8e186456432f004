pub mod replay;

pub use replay::{ReplayDepth, ReplayDetector};
