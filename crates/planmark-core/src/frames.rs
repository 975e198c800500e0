//! Frame snapshots: where named frames sit relative to the planning frame

use nalgebra::Isometry3;
use std::collections::HashMap;
use thiserror::Error;

use crate::pose::Pose;

#[derive(Error, Debug, PartialEq)]
pub enum FrameError {
    #[error("Frame '{0}' is the planning frame and cannot be redefined")]
    PlanningFrame(String),
    #[error("Frame '{0}' is already defined")]
    Duplicate(String),
    #[error("Frame name must not be empty")]
    EmptyName,
}

/// A frozen view of the frame transforms known to one planning scene
pub trait FrameSnapshot {
    /// The canonical frame every marker is reconciled into
    fn planning_frame(&self) -> &str;

    /// Whether a transform from `frame_id` to the planning frame is known
    fn knows_frame_transform(&self, frame_id: &str) -> bool;

    /// Pose of `frame_id` expressed in the planning frame
    fn frame_transform(&self, frame_id: &str) -> Option<Isometry3<f64>>;
}

#[derive(Debug, Clone)]
struct FrameLink {
    parent: String,
    /// Pose of this frame in its parent
    pose: Isometry3<f64>,
}

/// Static tree of named frames rooted at the planning frame
#[derive(Debug, Clone)]
pub struct FrameTree {
    planning_frame: String,
    frames: HashMap<String, FrameLink>,
}

impl FrameTree {
    /// Create a tree containing only the planning frame
    pub fn new(planning_frame: &str) -> Self {
        Self {
            planning_frame: planning_frame.to_string(),
            frames: HashMap::new(),
        }
    }

    /// Add a frame placed at `pose` in `parent`
    ///
    /// The parent does not need to exist yet; frames whose chain never
    /// reaches the planning frame are simply unknown.
    pub fn add_frame(&mut self, name: &str, parent: &str, pose: Pose) -> Result<(), FrameError> {
        if name.is_empty() {
            return Err(FrameError::EmptyName);
        }
        if name == self.planning_frame {
            return Err(FrameError::PlanningFrame(name.to_string()));
        }
        if self.frames.contains_key(name) {
            return Err(FrameError::Duplicate(name.to_string()));
        }
        self.frames.insert(
            name.to_string(),
            FrameLink {
                parent: parent.to_string(),
                pose: pose.to_isometry(),
            },
        );
        Ok(())
    }

    /// Builder-style variant of [`FrameTree::add_frame`]
    pub fn with_frame(mut self, name: &str, parent: &str, pose: Pose) -> Result<Self, FrameError> {
        self.add_frame(name, parent, pose)?;
        Ok(self)
    }

    /// Names of all frames other than the planning frame, sorted
    pub fn frame_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.frames.keys().map(|s| s.as_str()).collect();
        names.sort();
        names
    }

    /// Parent of a frame, if it is defined in this tree
    pub fn parent_of(&self, frame_id: &str) -> Option<&str> {
        self.frames.get(frame_id).map(|l| l.parent.as_str())
    }

    /// Walk the parent chain of `frame_id` up to the planning frame
    fn resolve(&self, frame_id: &str) -> Option<Isometry3<f64>> {
        let mut acc = Isometry3::identity();
        let mut current = frame_id;
        // a chain longer than the number of frames has a cycle
        for _ in 0..=self.frames.len() {
            if current == self.planning_frame {
                return Some(acc);
            }
            let link = self.frames.get(current)?;
            acc = link.pose * acc;
            current = &link.parent;
        }
        None
    }
}

impl FrameSnapshot for FrameTree {
    fn planning_frame(&self) -> &str {
        &self.planning_frame
    }

    fn knows_frame_transform(&self, frame_id: &str) -> bool {
        self.resolve(frame_id).is_some()
    }

    fn frame_transform(&self, frame_id: &str) -> Option<Isometry3<f64>> {
        self.resolve(frame_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::Vector3;
    use std::f64::consts::FRAC_PI_2;

    fn sample_tree() -> FrameTree {
        FrameTree::new("map")
            .with_frame("odom", "map", Pose::from_position(1.0, 0.0, 0.0))
            .unwrap()
            .with_frame("base", "odom", Pose::from_xyz_rpy([0.0, 2.0, 0.0, 0.0, 0.0, FRAC_PI_2]))
            .unwrap()
    }

    #[test]
    fn test_planning_frame_is_identity() {
        let tree = sample_tree();
        assert!(tree.knows_frame_transform("map"));
        assert_eq!(tree.frame_transform("map"), Some(Isometry3::identity()));
    }

    #[test]
    fn test_chain_composition() {
        let tree = sample_tree();
        let tm = tree.frame_transform("base").unwrap();

        // origin of base is at odom(0, 2, 0) = map(1, 2, 0)
        assert_relative_eq!(tm.translation.vector, Vector3::new(1.0, 2.0, 0.0), epsilon = 1e-12);

        // x axis of base points along map y
        let x = tm.rotation * Vector3::x();
        assert_relative_eq!(x, Vector3::y(), epsilon = 1e-12);
    }

    #[test]
    fn test_unknown_and_dangling_frames() {
        let mut tree = sample_tree();
        tree.add_frame("sensor", "missing_parent", Pose::identity()).unwrap();

        assert!(!tree.knows_frame_transform("unknown_frame"));
        assert!(!tree.knows_frame_transform("sensor"));
        assert_eq!(tree.frame_transform("sensor"), None);
    }

    #[test]
    fn test_cycle_is_unknown() {
        let tree = FrameTree::new("map")
            .with_frame("a", "b", Pose::identity())
            .unwrap()
            .with_frame("b", "a", Pose::identity())
            .unwrap();
        assert!(!tree.knows_frame_transform("a"));
    }

    #[test]
    fn test_add_frame_errors() {
        let mut tree = sample_tree();
        assert_eq!(
            tree.add_frame("map", "odom", Pose::identity()),
            Err(FrameError::PlanningFrame("map".to_string()))
        );
        assert_eq!(
            tree.add_frame("odom", "map", Pose::identity()),
            Err(FrameError::Duplicate("odom".to_string()))
        );
        assert_eq!(tree.add_frame("", "map", Pose::identity()), Err(FrameError::EmptyName));
        assert_eq!(tree.frame_names(), vec!["base", "odom"]);
        assert_eq!(tree.parent_of("base"), Some("odom"));
    }
}
