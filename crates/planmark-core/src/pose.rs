//! Poses in 3D space and their conversion to rigid transforms

use nalgebra::{Isometry3, Quaternion, Translation3, UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum PoseError {
    #[error("Expected 6 values \"x y z roll pitch yaw\", got {0}")]
    WrongArity(usize),
    #[error("Invalid number in pose string: {0}")]
    InvalidNumber(String),
}

/// A point (or vector) in 3D space
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    #[serde(default)]
    pub z: f64,
}

impl Point {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn to_vector(&self) -> Vector3<f64> {
        Vector3::new(self.x, self.y, self.z)
    }

    pub fn from_vector(v: &Vector3<f64>) -> Self {
        Self::new(v.x, v.y, v.z)
    }
}

/// Orientation as a quaternion (x, y, z, w)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Orientation {
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    #[serde(default)]
    pub z: f64,
    #[serde(default = "default_w")]
    pub w: f64,
}

fn default_w() -> f64 {
    1.0
}

impl Default for Orientation {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            z: 0.0,
            w: 1.0,
        }
    }
}

impl Orientation {
    /// Convert to a unit quaternion. A degenerate (zero-length) quaternion
    /// is read as the identity rotation.
    pub fn to_unit_quaternion(&self) -> UnitQuaternion<f64> {
        let q = Quaternion::new(self.w, self.x, self.y, self.z);
        UnitQuaternion::try_new(q, f64::EPSILON).unwrap_or_else(UnitQuaternion::identity)
    }

    pub fn from_unit_quaternion(q: &UnitQuaternion<f64>) -> Self {
        Self {
            x: q.i,
            y: q.j,
            z: q.k,
            w: q.w,
        }
    }
}

/// Pose in 3D space: position plus orientation
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Pose {
    #[serde(default)]
    pub position: Point,
    #[serde(default)]
    pub orientation: Orientation,
}

impl Pose {
    pub fn identity() -> Self {
        Self::default()
    }

    pub fn from_position(x: f64, y: f64, z: f64) -> Self {
        Self {
            position: Point::new(x, y, z),
            orientation: Orientation::default(),
        }
    }

    /// Build a pose from (x, y, z, roll, pitch, yaw) in meters/radians
    pub fn from_xyz_rpy(arr: [f64; 6]) -> Self {
        let rotation = UnitQuaternion::from_euler_angles(arr[3], arr[4], arr[5]);
        Self {
            position: Point::new(arr[0], arr[1], arr[2]),
            orientation: Orientation::from_unit_quaternion(&rotation),
        }
    }

    pub fn to_isometry(&self) -> Isometry3<f64> {
        Isometry3::from_parts(
            Translation3::new(self.position.x, self.position.y, self.position.z),
            self.orientation.to_unit_quaternion(),
        )
    }

    pub fn from_isometry(iso: &Isometry3<f64>) -> Self {
        Self {
            position: Point::from_vector(&iso.translation.vector),
            orientation: Orientation::from_unit_quaternion(&iso.rotation),
        }
    }

    /// Express this pose in the parent of `frame`: `frame ∘ self`
    pub fn transformed_by(&self, frame: &Isometry3<f64>) -> Self {
        Self::from_isometry(&(frame * self.to_isometry()))
    }
}

/// Parse a pose string "x y z roll pitch yaw" into a Pose
pub fn parse_pose_string(s: &str) -> Result<Pose, PoseError> {
    let parts = s
        .split_whitespace()
        .map(|p| {
            p.parse::<f64>()
                .map_err(|_| PoseError::InvalidNumber(p.to_string()))
        })
        .collect::<Result<Vec<f64>, _>>()?;

    match parts.as_slice() {
        [x, y, z, roll, pitch, yaw] => Ok(Pose::from_xyz_rpy([*x, *y, *z, *roll, *pitch, *yaw])),
        other => Err(PoseError::WrongArity(other.len())),
    }
}
