//! Render context: the viewer's fixed frame and its transform service

use nalgebra::Isometry3;
use planmark_core::{FrameSnapshot, FrameTree};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransformError {
    #[error("No transform from '{source_frame}' to '{target_frame}'")]
    Unavailable {
        target_frame: String,
        source_frame: String,
    },
    #[error("Timed out after {timeout:?} waiting for '{source_frame}' -> '{target_frame}'")]
    Timeout {
        target_frame: String,
        source_frame: String,
        timeout: Duration,
    },
}

/// Services a live viewer offers to marker materialization
pub trait RenderContext {
    /// Frame the viewer currently renders relative to
    fn fixed_frame(&self) -> &str;

    /// Pose of `source` expressed in `target`, waiting at most `timeout`
    fn lookup_transform(
        &self,
        target: &str,
        source: &str,
        timeout: Duration,
    ) -> Result<Isometry3<f64>, TransformError>;

    /// Upper bound for a single transform lookup
    fn lookup_timeout(&self) -> Duration {
        Duration::from_millis(100)
    }
}

/// Transform service backed by a static frame tree
#[derive(Debug, Clone)]
pub struct StaticTransforms {
    tree: FrameTree,
    fixed_frame: String,
    timeout: Duration,
}

impl StaticTransforms {
    pub fn new(tree: FrameTree, fixed_frame: &str) -> Self {
        Self {
            tree,
            fixed_frame: fixed_frame.to_string(),
            timeout: Duration::from_millis(100),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn set_fixed_frame(&mut self, frame: &str) {
        self.fixed_frame = frame.to_string();
    }

    pub fn tree(&self) -> &FrameTree {
        &self.tree
    }
}

impl RenderContext for StaticTransforms {
    fn fixed_frame(&self) -> &str {
        &self.fixed_frame
    }

    fn lookup_transform(
        &self,
        target: &str,
        source: &str,
        _timeout: Duration,
    ) -> Result<Isometry3<f64>, TransformError> {
        let unavailable = || TransformError::Unavailable {
            target_frame: target.to_string(),
            source_frame: source.to_string(),
        };
        // both frames are anchored in the tree's root, so no waiting is needed
        let root_t_target = self.tree.frame_transform(target).ok_or_else(unavailable)?;
        let root_t_source = self.tree.frame_transform(source).ok_or_else(unavailable)?;
        Ok(root_t_target.inverse() * root_t_source)
    }

    fn lookup_timeout(&self) -> Duration {
        self.timeout
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::Vector3;
    use planmark_core::Pose;

    #[test]
    fn test_lookup_between_siblings() {
        let tree = FrameTree::new("map")
            .with_frame("odom", "map", Pose::from_position(1.0, 0.0, 0.0))
            .unwrap()
            .with_frame("base", "map", Pose::from_position(0.0, 3.0, 0.0))
            .unwrap();
        let tf = StaticTransforms::new(tree, "odom");

        let odom_t_base = tf.lookup_transform("odom", "base", tf.lookup_timeout()).unwrap();
        assert_relative_eq!(
            odom_t_base.translation.vector,
            Vector3::new(-1.0, 3.0, 0.0),
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_lookup_unknown_frame() {
        let tf = StaticTransforms::new(FrameTree::new("map"), "map");
        let err = tf.lookup_transform("map", "nowhere", Duration::ZERO).unwrap_err();
        assert_eq!(
            err,
            TransformError::Unavailable {
                target_frame: "map".to_string(),
                source_frame: "nowhere".to_string(),
            }
        );
    }

    #[test]
    fn test_fixed_frame_and_timeout() {
        let mut tf = StaticTransforms::new(FrameTree::new("map"), "map")
            .with_timeout(Duration::from_millis(250));
        assert_eq!(tf.fixed_frame(), "map");
        assert_eq!(tf.lookup_timeout(), Duration::from_millis(250));

        tf.set_fixed_frame("odom");
        assert_eq!(tf.fixed_frame(), "odom");
    }
}
