//! In-process scene graph
//!
//! Nodes live in an arena keyed by [`NodeId`]. A node has at most one parent
//! and an ordered list of children; its position and orientation are relative
//! to its parent. Nodes may exist unparented, which is how grouping nodes are
//! kept around while their namespace is hidden.
//!
//! [`SceneGraph`] is a cheap-to-clone handle onto a shared arena, so render
//! handles can destroy their own nodes when dropped.

use nalgebra::{Isometry3, Translation3, UnitQuaternion, Vector3};
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt::{self, Write as _};
use std::rc::Rc;
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum SceneError {
    #[error("Unknown scene node {0}")]
    UnknownNode(NodeId),
    #[error("Node {child} is already attached to {parent}")]
    AlreadyAttached { child: NodeId, parent: NodeId },
    #[error("Attaching {child} under {parent} would create a cycle")]
    WouldCycle { parent: NodeId, child: NodeId },
}

/// Identifier of a node in a [`SceneGraph`]. Ids are never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug)]
struct Node {
    name: String,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    position: Vector3<f64>,
    orientation: UnitQuaternion<f64>,
}

impl Node {
    fn new(name: String) -> Self {
        Self {
            name,
            parent: None,
            children: Vec::new(),
            position: Vector3::zeros(),
            orientation: UnitQuaternion::identity(),
        }
    }
}

#[derive(Debug)]
struct Arena {
    nodes: HashMap<NodeId, Node>,
    next_id: u64,
    root: NodeId,
}

impl Arena {
    fn new() -> Self {
        let root = NodeId(0);
        let mut nodes = HashMap::new();
        nodes.insert(root, Node::new("root".to_string()));
        Self {
            nodes,
            next_id: 1,
            root,
        }
    }

    fn node(&self, id: NodeId) -> Result<&Node, SceneError> {
        self.nodes.get(&id).ok_or(SceneError::UnknownNode(id))
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut Node, SceneError> {
        self.nodes.get_mut(&id).ok_or(SceneError::UnknownNode(id))
    }

    fn create(&mut self, name: String) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        self.nodes.insert(id, Node::new(name));
        id
    }

    fn add_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), SceneError> {
        self.node(parent)?;
        if let Some(current) = self.node(child)?.parent {
            return Err(SceneError::AlreadyAttached { child, parent: current });
        }

        // child must not be an ancestor of parent (or parent itself)
        let mut cursor = Some(parent);
        while let Some(id) = cursor {
            if id == child {
                return Err(SceneError::WouldCycle { parent, child });
            }
            cursor = self.nodes.get(&id).and_then(|n| n.parent);
        }

        self.node_mut(parent)?.children.push(child);
        self.node_mut(child)?.parent = Some(parent);
        Ok(())
    }

    fn detach(&mut self, child: NodeId) -> bool {
        let Some(parent) = self.nodes.get_mut(&child).and_then(|n| n.parent.take()) else {
            return false;
        };
        if let Some(p) = self.nodes.get_mut(&parent) {
            p.children.retain(|c| *c != child);
        }
        true
    }

    fn remove_all_children(&mut self, parent: NodeId) -> usize {
        let children = match self.nodes.get_mut(&parent) {
            Some(node) => std::mem::take(&mut node.children),
            None => return 0,
        };
        for child in &children {
            if let Some(node) = self.nodes.get_mut(child) {
                node.parent = None;
            }
        }
        children.len()
    }

    fn destroy(&mut self, id: NodeId) -> bool {
        if id == self.root || !self.nodes.contains_key(&id) {
            return false;
        }
        self.detach(id);
        self.remove_all_children(id);
        self.nodes.remove(&id);
        true
    }

    fn local_transform(&self, id: NodeId) -> Option<Isometry3<f64>> {
        self.nodes.get(&id).map(|n| {
            Isometry3::from_parts(Translation3::from(n.position), n.orientation)
        })
    }

    fn write_tree(&self, id: NodeId, depth: usize, out: &mut String) {
        let Some(node) = self.nodes.get(&id) else {
            return;
        };
        let p = node.position;
        let _ = writeln!(
            out,
            "{:indent$}{} {} @ ({:.3}, {:.3}, {:.3})",
            "",
            node.name,
            id,
            p.x,
            p.y,
            p.z,
            indent = depth * 2
        );
        for child in &node.children {
            self.write_tree(*child, depth + 1, out);
        }
    }
}

/// Shared handle onto a scene graph arena
#[derive(Debug, Clone)]
pub struct SceneGraph {
    inner: Rc<RefCell<Arena>>,
}

impl Default for SceneGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl SceneGraph {
    /// Create a graph holding only its root node
    pub fn new() -> Self {
        Self {
            inner: Rc::new(RefCell::new(Arena::new())),
        }
    }

    /// Whether both handles point at the same arena
    pub fn same_graph(&self, other: &SceneGraph) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// The root node; everything rendered hangs below it
    pub fn root(&self) -> NodeId {
        self.inner.borrow().root
    }

    /// Create an unparented node
    pub fn create_node(&self, name: &str) -> NodeId {
        self.inner.borrow_mut().create(name.to_string())
    }

    /// Create a node attached under `parent`
    pub fn create_child(&self, parent: NodeId, name: &str) -> Result<NodeId, SceneError> {
        let mut arena = self.inner.borrow_mut();
        arena.node(parent)?;
        let id = arena.create(name.to_string());
        arena.add_child(parent, id)?;
        Ok(id)
    }

    /// Destroy a node. Its children are detached, not destroyed.
    /// The root cannot be destroyed.
    pub fn destroy_node(&self, id: NodeId) -> bool {
        self.inner.borrow_mut().destroy(id)
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.inner.borrow().nodes.contains_key(&id)
    }

    pub fn node_count(&self) -> usize {
        self.inner.borrow().nodes.len()
    }

    pub fn name(&self, id: NodeId) -> Option<String> {
        self.inner.borrow().nodes.get(&id).map(|n| n.name.clone())
    }

    pub fn set_name(&self, id: NodeId, name: &str) -> Result<(), SceneError> {
        self.inner.borrow_mut().node_mut(id)?.name = name.to_string();
        Ok(())
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.inner.borrow().nodes.get(&id).and_then(|n| n.parent)
    }

    pub fn children(&self, id: NodeId) -> Vec<NodeId> {
        self.inner
            .borrow()
            .nodes
            .get(&id)
            .map(|n| n.children.clone())
            .unwrap_or_default()
    }

    /// Attach an unparented `child` under `parent`
    pub fn add_child(&self, parent: NodeId, child: NodeId) -> Result<(), SceneError> {
        self.inner.borrow_mut().add_child(parent, child)
    }

    /// Detach `child` if it is a direct child of `parent`
    pub fn remove_child(&self, parent: NodeId, child: NodeId) -> bool {
        if self.parent(child) != Some(parent) {
            return false;
        }
        self.inner.borrow_mut().detach(child)
    }

    /// Detach a node from whatever parent it has
    pub fn detach(&self, id: NodeId) -> bool {
        self.inner.borrow_mut().detach(id)
    }

    /// Detach all children of `parent`, returning how many were removed
    pub fn remove_all_children(&self, parent: NodeId) -> usize {
        self.inner.borrow_mut().remove_all_children(parent)
    }

    /// Attach `node` under `parent` or detach it from its current parent.
    /// Repeating the same request is a no-op.
    pub fn set_attached(&self, node: NodeId, parent: NodeId, attached: bool) -> Result<(), SceneError> {
        let mut arena = self.inner.borrow_mut();
        let current = arena.node(node)?.parent;
        if attached {
            if current != Some(parent) {
                arena.detach(node);
                arena.add_child(parent, node)?;
            }
        } else if current.is_some() {
            arena.detach(node);
        }
        Ok(())
    }

    pub fn is_child_of(&self, child: NodeId, parent: NodeId) -> bool {
        self.parent(child) == Some(parent)
    }

    /// Whether the node's parent chain reaches the root
    pub fn is_rendered(&self, id: NodeId) -> bool {
        let arena = self.inner.borrow();
        let mut cursor = Some(id);
        while let Some(current) = cursor {
            if current == arena.root {
                return true;
            }
            cursor = arena.nodes.get(&current).and_then(|n| n.parent);
        }
        false
    }

    pub fn position(&self, id: NodeId) -> Option<Vector3<f64>> {
        self.inner.borrow().nodes.get(&id).map(|n| n.position)
    }

    pub fn orientation(&self, id: NodeId) -> Option<UnitQuaternion<f64>> {
        self.inner.borrow().nodes.get(&id).map(|n| n.orientation)
    }

    pub fn set_position(&self, id: NodeId, position: Vector3<f64>) -> Result<(), SceneError> {
        self.inner.borrow_mut().node_mut(id)?.position = position;
        Ok(())
    }

    pub fn set_orientation(&self, id: NodeId, orientation: UnitQuaternion<f64>) -> Result<(), SceneError> {
        self.inner.borrow_mut().node_mut(id)?.orientation = orientation;
        Ok(())
    }

    /// Pose of the node relative to its parent
    pub fn local_transform(&self, id: NodeId) -> Option<Isometry3<f64>> {
        self.inner.borrow().local_transform(id)
    }

    /// Pose of the node relative to the top of its parent chain
    pub fn world_transform(&self, id: NodeId) -> Option<Isometry3<f64>> {
        let arena = self.inner.borrow();
        let mut acc = arena.local_transform(id)?;
        let mut cursor = arena.nodes.get(&id).and_then(|n| n.parent);
        while let Some(current) = cursor {
            acc = arena.local_transform(current)? * acc;
            cursor = arena.nodes.get(&current).and_then(|n| n.parent);
        }
        Some(acc)
    }

    /// Indented dump of the subtree below `id`
    pub fn render_tree(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.inner.borrow().write_tree(id, 0, &mut out);
        out
    }
}
