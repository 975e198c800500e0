//! Shared fixtures for unit tests

use planmark_core::{FrameTree, Marker, MarkerKind, Pose};
use std::f64::consts::FRAC_PI_2;

use crate::context::StaticTransforms;

/// map <- odom (shifted and turned a quarter) ; map <- base (identity)
pub fn sample_tree() -> FrameTree {
    FrameTree::new("map")
        .with_frame("odom", "map", Pose::from_xyz_rpy([1.0, 2.0, 0.0, 0.0, 0.0, FRAC_PI_2]))
        .unwrap()
        .with_frame("base", "map", Pose::identity())
        .unwrap()
        .with_frame("gripper", "odom", Pose::from_position(0.0, 0.0, 0.5))
        .unwrap()
}

/// Transform service over [`sample_tree`] rendering relative to `fixed_frame`
pub fn context(fixed_frame: &str) -> StaticTransforms {
    StaticTransforms::new(sample_tree(), fixed_frame)
}

pub fn marker(kind: MarkerKind, ns: &str, frame_id: &str) -> Marker {
    Marker::new(kind, ns, frame_id)
}
