//! Marker messages and batches of them
//!
//! A marker is a typed drawable annotation attached to a named reference
//! frame. Type codes follow the `visualization_msgs/Marker` numbering so that
//! batches dumped from a ROS pipeline can be read without translation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use thiserror::Error;
use tracing::debug;

use crate::pose::{Point, Pose};

#[derive(Error, Debug)]
pub enum MarkerError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse marker batch: {0}")]
    ParseError(#[from] serde_json::Error),
}

/// Kind of drawable a marker describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "i32", into = "i32")]
pub enum MarkerKind {
    Arrow,
    Cube,
    Sphere,
    Cylinder,
    LineStrip,
    LineList,
    CubeList,
    SphereList,
    Points,
    TextViewFacing,
    MeshResource,
    TriangleList,
    /// A type code this crate has no name for
    Unknown(i32),
}

impl MarkerKind {
    /// All kinds with a known type code
    pub const KNOWN: [MarkerKind; 12] = [
        MarkerKind::Arrow,
        MarkerKind::Cube,
        MarkerKind::Sphere,
        MarkerKind::Cylinder,
        MarkerKind::LineStrip,
        MarkerKind::LineList,
        MarkerKind::CubeList,
        MarkerKind::SphereList,
        MarkerKind::Points,
        MarkerKind::TextViewFacing,
        MarkerKind::MeshResource,
        MarkerKind::TriangleList,
    ];

    pub fn code(&self) -> i32 {
        match self {
            MarkerKind::Arrow => 0,
            MarkerKind::Cube => 1,
            MarkerKind::Sphere => 2,
            MarkerKind::Cylinder => 3,
            MarkerKind::LineStrip => 4,
            MarkerKind::LineList => 5,
            MarkerKind::CubeList => 6,
            MarkerKind::SphereList => 7,
            MarkerKind::Points => 8,
            MarkerKind::TextViewFacing => 9,
            MarkerKind::MeshResource => 10,
            MarkerKind::TriangleList => 11,
            MarkerKind::Unknown(code) => *code,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            MarkerKind::Arrow => "arrow",
            MarkerKind::Cube => "cube",
            MarkerKind::Sphere => "sphere",
            MarkerKind::Cylinder => "cylinder",
            MarkerKind::LineStrip => "line_strip",
            MarkerKind::LineList => "line_list",
            MarkerKind::CubeList => "cube_list",
            MarkerKind::SphereList => "sphere_list",
            MarkerKind::Points => "points",
            MarkerKind::TextViewFacing => "text_view_facing",
            MarkerKind::MeshResource => "mesh_resource",
            MarkerKind::TriangleList => "triangle_list",
            MarkerKind::Unknown(_) => "unknown",
        }
    }
}

impl From<i32> for MarkerKind {
    fn from(code: i32) -> Self {
        MarkerKind::KNOWN
            .iter()
            .copied()
            .find(|k| k.code() == code)
            .unwrap_or(MarkerKind::Unknown(code))
    }
}

impl From<MarkerKind> for i32 {
    fn from(kind: MarkerKind) -> Self {
        kind.code()
    }
}

impl fmt::Display for MarkerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MarkerKind::Unknown(code) => write!(f, "unknown({})", code),
            other => write!(f, "{}", other.name()),
        }
    }
}

/// RGBA color, components in 0.0-1.0
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Color {
    #[serde(default)]
    pub r: f32,
    #[serde(default)]
    pub g: f32,
    #[serde(default)]
    pub b: f32,
    #[serde(default = "default_alpha")]
    pub a: f32,
}

fn default_alpha() -> f32 {
    1.0
}

impl Default for Color {
    fn default() -> Self {
        Self {
            r: 1.0,
            g: 1.0,
            b: 1.0,
            a: 1.0,
        }
    }
}

/// Message header: reference frame and capture time
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Header {
    #[serde(default)]
    pub frame_id: String,
    #[serde(default)]
    pub stamp: Option<DateTime<Utc>>,
}

/// A single drawable annotation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Marker {
    #[serde(default)]
    pub header: Header,
    /// Grouping key for joint visibility
    #[serde(default)]
    pub ns: String,
    #[serde(default)]
    pub id: i32,
    #[serde(rename = "type")]
    pub kind: MarkerKind,
    /// Pose relative to `header.frame_id`
    #[serde(default)]
    pub pose: Pose,
    #[serde(default = "default_scale")]
    pub scale: Point,
    #[serde(default)]
    pub color: Color,
    /// Vertices for line, point, list and triangle kinds
    #[serde(default)]
    pub points: Vec<Point>,
    /// Per-vertex colors (optional, parallel to `points`)
    #[serde(default)]
    pub colors: Vec<Color>,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub mesh_resource: String,
    #[serde(default)]
    pub mesh_use_embedded_materials: bool,
}

fn default_scale() -> Point {
    Point::new(1.0, 1.0, 1.0)
}

impl Marker {
    /// Create a marker of `kind` in namespace `ns`, placed at the origin of `frame_id`
    pub fn new(kind: MarkerKind, ns: &str, frame_id: &str) -> Self {
        Self {
            header: Header {
                frame_id: frame_id.to_string(),
                stamp: None,
            },
            ns: ns.to_string(),
            id: 0,
            kind,
            pose: Pose::identity(),
            scale: default_scale(),
            color: Color::default(),
            points: Vec::new(),
            colors: Vec::new(),
            text: String::new(),
            mesh_resource: String::new(),
            mesh_use_embedded_materials: false,
        }
    }

    pub fn with_pose(mut self, pose: Pose) -> Self {
        self.pose = pose;
        self
    }

    pub fn with_id(mut self, id: i32) -> Self {
        self.id = id;
        self
    }

    pub fn frame_id(&self) -> &str {
        &self.header.frame_id
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum BatchRepr {
    List(Vec<Marker>),
    Object { markers: Vec<Marker> },
}

/// An ordered batch of markers from one planning result
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MarkerBatch {
    pub markers: Vec<Marker>,
}

impl<'de> Deserialize<'de> for MarkerBatch {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let markers = match BatchRepr::deserialize(deserializer)? {
            BatchRepr::List(markers) => markers,
            BatchRepr::Object { markers } => markers,
        };
        Ok(Self { markers })
    }
}

impl MarkerBatch {
    /// Parse a batch from JSON: either a bare array or `{ "markers": [...] }`
    pub fn from_json(json: &str) -> Result<Self, MarkerError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_file(path: &Path) -> Result<Self, MarkerError> {
        let content = std::fs::read_to_string(path)?;
        let batch = Self::from_json(&content)?;
        debug!(path = %path.display(), markers = batch.len(), "Loaded marker batch");
        Ok(batch)
    }

    pub fn to_json(&self) -> Result<String, MarkerError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn len(&self) -> usize {
        self.markers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }
}

impl IntoIterator for MarkerBatch {
    type Item = Marker;
    type IntoIter = std::vec::IntoIter<Marker>;

    fn into_iter(self) -> Self::IntoIter {
        self.markers.into_iter()
    }
}
