//! planmark Core - Poses, marker messages, and frame snapshots
//!
//! This crate provides the plain-data side of planmark:
//! - Poses and their conversion to rigid transforms
//! - Marker messages as produced by a planning pipeline, and JSON batches of them
//! - Frame snapshots answering "how is frame F placed in the planning frame?"
//!
//! Nothing in here touches a scene graph; see `planmark-scene` for that.

pub mod frames;
pub mod marker;
pub mod pose;

pub use frames::{FrameError, FrameSnapshot, FrameTree};
pub use marker::{Color, Header, Marker, MarkerBatch, MarkerError, MarkerKind};
pub use pose::{parse_pose_string, Orientation, Point, Pose, PoseError};
