//! Render handles and the marker kind registry that creates them
//!
//! A render handle is the live scene object standing in for one marker. The
//! built-in [`NodeHandle`] owns a single scene node under its namespace's
//! grouping node and records the marker's appearance; geometry upload is left
//! to whatever backend walks the graph.

use nalgebra::{UnitQuaternion, Vector3};
use planmark_core::{Color, Marker, MarkerKind};
use std::collections::HashMap;
use std::fmt;
use tracing::warn;

use crate::context::{RenderContext, TransformError};
use crate::graph::{NodeId, SceneGraph};

/// Family of render object a marker kind maps onto
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandleKind {
    /// Cube, cylinder, sphere
    Shape,
    Arrow,
    LineStrip,
    LineList,
    /// Point clouds, sphere lists, cube lists
    Points,
    TextViewFacing,
    MeshResource,
    TriangleList,
}

impl HandleKind {
    pub fn name(&self) -> &'static str {
        match self {
            HandleKind::Shape => "shape",
            HandleKind::Arrow => "arrow",
            HandleKind::LineStrip => "line_strip",
            HandleKind::LineList => "line_list",
            HandleKind::Points => "points",
            HandleKind::TextViewFacing => "text",
            HandleKind::MeshResource => "mesh",
            HandleKind::TriangleList => "triangle_list",
        }
    }
}

/// Appearance captured from the marker payload
#[derive(Debug, Clone, PartialEq)]
pub struct Appearance {
    pub marker_kind: MarkerKind,
    pub scale: Vector3<f64>,
    pub color: Color,
    pub vertex_count: usize,
    pub text: Option<String>,
    pub mesh_resource: Option<String>,
}

impl Default for Appearance {
    fn default() -> Self {
        Self {
            marker_kind: MarkerKind::Cube,
            scale: Vector3::new(1.0, 1.0, 1.0),
            color: Color::default(),
            vertex_count: 0,
            text: None,
            mesh_resource: None,
        }
    }
}

impl Appearance {
    fn from_marker(marker: &Marker) -> Self {
        let non_empty = |s: &str| (!s.is_empty()).then(|| s.to_string());
        Self {
            marker_kind: marker.kind,
            scale: marker.scale.to_vector(),
            color: marker.color,
            vertex_count: marker.points.len(),
            text: non_empty(&marker.text),
            mesh_resource: non_empty(&marker.mesh_resource),
        }
    }
}

/// Live scene object representing one marker
pub trait RenderHandle: fmt::Debug {
    fn kind(&self) -> HandleKind;

    /// Scene node carrying this handle's pose
    fn node(&self) -> NodeId;

    /// Initialize from the marker payload, placing the handle relative to
    /// the context's fixed frame
    fn set_message(&mut self, marker: &Marker, context: &dyn RenderContext) -> Result<(), TransformError>;

    fn appearance(&self) -> &Appearance;

    fn position(&self) -> Vector3<f64>;

    fn set_position(&mut self, position: Vector3<f64>);

    fn orientation(&self) -> UnitQuaternion<f64>;

    fn set_orientation(&mut self, orientation: UnitQuaternion<f64>);
}

/// Render handle backed by one node of a [`SceneGraph`]
///
/// The node is destroyed when the handle is dropped.
#[derive(Debug)]
pub struct NodeHandle {
    kind: HandleKind,
    graph: SceneGraph,
    node: NodeId,
    appearance: Appearance,
}

impl NodeHandle {
    pub fn new(kind: HandleKind, graph: &SceneGraph, parent: NodeId) -> Self {
        let node = graph.create_node(kind.name());
        if let Err(e) = graph.add_child(parent, node) {
            warn!(error = %e, kind = kind.name(), "Render handle created without parent");
        }
        Self {
            kind,
            graph: graph.clone(),
            node,
            appearance: Appearance::default(),
        }
    }

    pub fn boxed(kind: HandleKind, graph: &SceneGraph, parent: NodeId) -> Box<dyn RenderHandle> {
        Box::new(Self::new(kind, graph, parent))
    }
}

impl RenderHandle for NodeHandle {
    fn kind(&self) -> HandleKind {
        self.kind
    }

    fn node(&self) -> NodeId {
        self.node
    }

    fn set_message(&mut self, marker: &Marker, context: &dyn RenderContext) -> Result<(), TransformError> {
        self.appearance = Appearance::from_marker(marker);
        let label = format!("{} {}/{}", self.kind.name(), marker.ns, marker.id);
        if let Err(e) = self.graph.set_name(self.node, &label) {
            warn!(error = %e, "Failed to label render handle");
        }

        let fixed_t_frame = context.lookup_transform(
            context.fixed_frame(),
            marker.frame_id(),
            context.lookup_timeout(),
        )?;
        let pose = fixed_t_frame * marker.pose.to_isometry();
        self.set_position(pose.translation.vector);
        self.set_orientation(pose.rotation);
        Ok(())
    }

    fn appearance(&self) -> &Appearance {
        &self.appearance
    }

    fn position(&self) -> Vector3<f64> {
        self.graph.position(self.node).unwrap_or_else(Vector3::zeros)
    }

    fn set_position(&mut self, position: Vector3<f64>) {
        if let Err(e) = self.graph.set_position(self.node, position) {
            warn!(error = %e, "Failed to position render handle");
        }
    }

    fn orientation(&self) -> UnitQuaternion<f64> {
        self.graph
            .orientation(self.node)
            .unwrap_or_else(UnitQuaternion::identity)
    }

    fn set_orientation(&mut self, orientation: UnitQuaternion<f64>) {
        if let Err(e) = self.graph.set_orientation(self.node, orientation) {
            warn!(error = %e, "Failed to orient render handle");
        }
    }
}

impl Drop for NodeHandle {
    fn drop(&mut self) {
        self.graph.destroy_node(self.node);
    }
}

/// Builds a render handle under the given parent node
pub type HandleConstructor = fn(&SceneGraph, NodeId) -> Box<dyn RenderHandle>;

fn shape(graph: &SceneGraph, parent: NodeId) -> Box<dyn RenderHandle> {
    NodeHandle::boxed(HandleKind::Shape, graph, parent)
}

fn arrow(graph: &SceneGraph, parent: NodeId) -> Box<dyn RenderHandle> {
    NodeHandle::boxed(HandleKind::Arrow, graph, parent)
}

fn line_strip(graph: &SceneGraph, parent: NodeId) -> Box<dyn RenderHandle> {
    NodeHandle::boxed(HandleKind::LineStrip, graph, parent)
}

fn line_list(graph: &SceneGraph, parent: NodeId) -> Box<dyn RenderHandle> {
    NodeHandle::boxed(HandleKind::LineList, graph, parent)
}

fn points(graph: &SceneGraph, parent: NodeId) -> Box<dyn RenderHandle> {
    NodeHandle::boxed(HandleKind::Points, graph, parent)
}

fn text(graph: &SceneGraph, parent: NodeId) -> Box<dyn RenderHandle> {
    NodeHandle::boxed(HandleKind::TextViewFacing, graph, parent)
}

fn mesh(graph: &SceneGraph, parent: NodeId) -> Box<dyn RenderHandle> {
    NodeHandle::boxed(HandleKind::MeshResource, graph, parent)
}

fn triangle_list(graph: &SceneGraph, parent: NodeId) -> Box<dyn RenderHandle> {
    NodeHandle::boxed(HandleKind::TriangleList, graph, parent)
}

/// Registry mapping marker kinds to handle constructors
#[derive(Clone)]
pub struct HandleFactory {
    constructors: HashMap<MarkerKind, HandleConstructor>,
}

impl fmt::Debug for HandleFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut kinds: Vec<MarkerKind> = self.constructors.keys().copied().collect();
        kinds.sort();
        f.debug_struct("HandleFactory").field("kinds", &kinds).finish()
    }
}

impl Default for HandleFactory {
    fn default() -> Self {
        Self::with_builtin()
    }
}

impl HandleFactory {
    /// A factory that knows no marker kinds
    pub fn empty() -> Self {
        Self {
            constructors: HashMap::new(),
        }
    }

    /// A factory covering every named marker kind
    pub fn with_builtin() -> Self {
        let mut factory = Self::empty();
        let builtin: [(MarkerKind, HandleConstructor); 12] = [
            (MarkerKind::Cube, shape),
            (MarkerKind::Cylinder, shape),
            (MarkerKind::Sphere, shape),
            (MarkerKind::Arrow, arrow),
            (MarkerKind::LineStrip, line_strip),
            (MarkerKind::LineList, line_list),
            (MarkerKind::SphereList, points),
            (MarkerKind::CubeList, points),
            (MarkerKind::Points, points),
            (MarkerKind::TextViewFacing, text),
            (MarkerKind::MeshResource, mesh),
            (MarkerKind::TriangleList, triangle_list),
        ];
        for (kind, constructor) in builtin {
            factory.register(kind, constructor);
        }
        factory
    }

    /// Register a constructor, returning the one it replaces
    pub fn register(&mut self, kind: MarkerKind, constructor: HandleConstructor) -> Option<HandleConstructor> {
        self.constructors.insert(kind, constructor)
    }

    pub fn unregister(&mut self, kind: MarkerKind) -> Option<HandleConstructor> {
        self.constructors.remove(&kind)
    }

    pub fn supports(&self, kind: MarkerKind) -> bool {
        self.constructors.contains_key(&kind)
    }

    /// Create a handle for `kind` under `parent`, or `None` if the kind is
    /// not registered
    pub fn create(&self, kind: MarkerKind, graph: &SceneGraph, parent: NodeId) -> Option<Box<dyn RenderHandle>> {
        self.constructors.get(&kind).map(|constructor| constructor(graph, parent))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::StaticTransforms;
    use approx::assert_relative_eq;
    use planmark_core::{FrameTree, Pose};

    #[test]
    fn test_builtin_dispatch() {
        let factory = HandleFactory::with_builtin();
        let graph = SceneGraph::new();
        let parent = graph.root();

        let expected = [
            (MarkerKind::Cube, HandleKind::Shape),
            (MarkerKind::Cylinder, HandleKind::Shape),
            (MarkerKind::Sphere, HandleKind::Shape),
            (MarkerKind::Arrow, HandleKind::Arrow),
            (MarkerKind::LineStrip, HandleKind::LineStrip),
            (MarkerKind::LineList, HandleKind::LineList),
            (MarkerKind::SphereList, HandleKind::Points),
            (MarkerKind::CubeList, HandleKind::Points),
            (MarkerKind::Points, HandleKind::Points),
            (MarkerKind::TextViewFacing, HandleKind::TextViewFacing),
            (MarkerKind::MeshResource, HandleKind::MeshResource),
            (MarkerKind::TriangleList, HandleKind::TriangleList),
        ];
        for (marker_kind, handle_kind) in expected {
            let handle = factory.create(marker_kind, &graph, parent).unwrap();
            assert_eq!(handle.kind(), handle_kind);
            assert_eq!(graph.parent(handle.node()), Some(parent));
        }
        assert!(factory.create(MarkerKind::Unknown(42), &graph, parent).is_none());
    }

    #[test]
    fn test_register_new_kind() {
        let mut factory = HandleFactory::empty();
        assert!(!factory.supports(MarkerKind::Unknown(42)));

        factory.register(MarkerKind::Unknown(42), text);
        assert!(factory.supports(MarkerKind::Unknown(42)));

        let graph = SceneGraph::new();
        let handle = factory.create(MarkerKind::Unknown(42), &graph, graph.root()).unwrap();
        assert_eq!(handle.kind(), HandleKind::TextViewFacing);

        assert!(factory.unregister(MarkerKind::Unknown(42)).is_some());
        assert!(!factory.supports(MarkerKind::Unknown(42)));
    }

    #[test]
    fn test_drop_destroys_node() {
        let graph = SceneGraph::new();
        let handle = NodeHandle::boxed(HandleKind::Arrow, &graph, graph.root());
        let node = handle.node();
        assert!(graph.contains(node));

        drop(handle);
        assert!(!graph.contains(node));
        assert!(graph.children(graph.root()).is_empty());
    }

    #[test]
    fn test_set_message_places_in_fixed_frame() {
        let tree = FrameTree::new("map")
            .with_frame("odom", "map", Pose::from_position(2.0, 0.0, 0.0))
            .unwrap();
        let context = StaticTransforms::new(tree, "odom");
        let graph = SceneGraph::new();

        let mut marker = Marker::new(MarkerKind::TextViewFacing, "labels", "map")
            .with_pose(Pose::from_position(1.0, 1.0, 0.0))
            .with_id(7);
        marker.text = "goal".to_string();

        let mut handle = NodeHandle::new(HandleKind::TextViewFacing, &graph, graph.root());
        handle.set_message(&marker, &context).unwrap();

        // map(1, 1, 0) is odom(-1, 1, 0)
        assert_relative_eq!(handle.position(), Vector3::new(-1.0, 1.0, 0.0), epsilon = 1e-12);
        assert_eq!(handle.appearance().text.as_deref(), Some("goal"));
        assert_eq!(handle.appearance().mesh_resource, None);
        assert_eq!(graph.name(handle.node()).as_deref(), Some("text labels/7"));
    }

    #[test]
    fn test_set_message_unknown_frame() {
        let context = StaticTransforms::new(FrameTree::new("map"), "map");
        let graph = SceneGraph::new();
        let marker = Marker::new(MarkerKind::Cube, "ns", "elsewhere");

        let mut handle = NodeHandle::new(HandleKind::Shape, &graph, graph.root());
        assert!(handle.set_message(&marker, &context).is_err());
        assert_eq!(handle.appearance().marker_kind, MarkerKind::Cube);
    }
}
