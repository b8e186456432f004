//! Interaction Filter
//!
//! Decides, frame by frame, when a group of people in a video is genuinely
//! interacting and an expensive downstream model (a VLM) should be invoked.
//!
//! # Pipeline
//!
//! 1. **Proximity**: every pair of detected persons whose boxes overlap.
//! 2. **Z-plane gate**: an overlapping pair only counts as interacting when both
//!    people are at a similar distance from the camera (`zplane`).
//! 3. **Grouping**: interacting pairs are joined into connected groups (`graph`).
//! 4. **Temporal gate**: a pair must interact for a sustained, fps-derived number
//!    of processed frames before it triggers, exactly once (`tracker`).
//! 5. **Comparison**: per-method counters, finalized interactions and the
//!    resulting cost reduction (`comparator`).
//!
//! # Module Structure
//!
//! - `geometry`, `depth`, `detect`: boxes, depth maps, persons and the detector seams
//! - `zplane`, `graph`, `tracker`: the per-frame core
//! - `filter`: wires detectors to the core for one method
//! - `ingest`, `pipeline`: frame sources and the run loop
//! - `comparator`: statistics and the report
//! - `config`, `ui`: configuration and terminal progress

pub mod comparator;
pub mod config;
pub mod depth;
pub mod detect;
pub mod filter;
pub mod frame;
pub mod geometry;
pub mod graph;
pub mod ingest;
pub mod pipeline;
pub mod tracker;
pub mod ui;
pub mod zplane;

pub use comparator::{Comparator, MethodStats, ProcessingStats, Report};
pub use config::FilterConfig;
pub use depth::DepthMap;
pub use detect::{DepthEstimator, Keypoint, Person, PersonMap, PoseDetector, TrackId};
pub use filter::{FrameResult, InteractionFilter};
pub use frame::Frame;
pub use geometry::{center, overlaps, BBox};
pub use graph::{FrameGraph, PairGraph, PairKey};
pub use ingest::{FrameSource, Scenario, SyntheticScene};
pub use pipeline::{RunOptions, RunSummary, StopReason};
pub use tracker::{trigger_threshold_frames, InteractionRecord, InteractionTracker};
pub use zplane::{same_plane, ZPlaneEstimator, ZPlaneMethod, ZPlaneThresholds};
