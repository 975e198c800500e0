//! Marker sets: one planning result's markers, materialized on demand
//!
//! A [`MarkerSet`] is built from raw markers and a frame snapshot. Every
//! marker is rewritten into the snapshot's planning frame right away, but no
//! scene node is created until the set is first shown.
//!
//! Each namespace gets one grouping node, created by the set the first time
//! one of its markers is materialized and destroyed with the set. Showing or
//! hiding a namespace attaches or detaches that grouping node.

use planmark_core::{FrameSnapshot, Marker};
use std::cell::RefCell;
use std::collections::{BTreeMap, HashSet};
use std::rc::Rc;
use thiserror::Error;
use tracing::{debug, error, warn};

use crate::context::{RenderContext, TransformError};
use crate::graph::{NodeId, SceneGraph};
use crate::handle::{HandleFactory, RenderHandle};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum MaterializeError {
    #[error("Cannot align markers with the planning frame: {0}")]
    Transform(#[from] TransformError),
}

/// Distinct (frame, namespace) pairs remembered per thread. When full the
/// set is reset, so a pair may warn again after this many others.
const MAX_WARNED_FRAMES: usize = 1024;

thread_local! {
    static WARNED_FRAMES: RefCell<HashSet<(String, String)>> = RefCell::new(HashSet::new());
}

/// Warn about an unknown frame once per (frame, namespace) pair.
/// Returns true if this call emitted the warning.
fn warn_unknown_frame(frame: &str, ns: &str) -> bool {
    let first = WARNED_FRAMES.with(|warned| {
        let mut warned = warned.borrow_mut();
        let key = (frame.to_string(), ns.to_string());
        if warned.contains(&key) {
            return false;
        }
        if warned.len() >= MAX_WARNED_FRAMES {
            warned.clear();
        }
        warned.insert(key)
    });
    if first {
        warn!(frame = %frame, ns = %ns, "Unknown frame for solution marker, dropping it");
    } else {
        debug!(frame = %frame, ns = %ns, "Dropping marker in unknown frame");
    }
    first
}

/// Rewrite a marker's pose into the snapshot's planning frame.
/// Returns false if the marker's frame cannot be resolved.
fn to_planning_frame(marker: &mut Marker, snapshot: &dyn FrameSnapshot) -> bool {
    let planning_frame = snapshot.planning_frame();
    if marker.frame_id() == planning_frame {
        return true;
    }

    if !snapshot.knows_frame_transform(marker.frame_id()) {
        warn_unknown_frame(marker.frame_id(), &marker.ns);
        return false;
    }
    let Some(tm) = snapshot.frame_transform(marker.frame_id()) else {
        warn_unknown_frame(marker.frame_id(), &marker.ns);
        return false;
    };

    marker.pose = marker.pose.transformed_by(&tm);
    marker.header.frame_id = planning_frame.to_string();
    true
}

/// Lifecycle of one marker entry
#[derive(Debug)]
pub enum EntryState {
    /// Reconciled, no render handle yet
    Captured,
    /// Render handle created
    Materialized(Box<dyn RenderHandle>),
    /// No constructor for the marker's kind; never retried
    Rejected,
}

impl EntryState {
    pub fn is_captured(&self) -> bool {
        matches!(self, EntryState::Captured)
    }

    pub fn is_materialized(&self) -> bool {
        matches!(self, EntryState::Materialized(_))
    }
}

#[derive(Debug)]
pub struct MarkerEntry {
    marker: Marker,
    state: EntryState,
}

impl MarkerEntry {
    pub fn marker(&self) -> &Marker {
        &self.marker
    }

    pub fn state(&self) -> &EntryState {
        &self.state
    }

    pub fn handle(&self) -> Option<&dyn RenderHandle> {
        match &self.state {
            EntryState::Materialized(handle) => Some(handle.as_ref()),
            _ => None,
        }
    }
}

/// Outcome of one [`MarkerSet::create_markers`] call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MaterializeReport {
    /// Handles created by this call
    pub created: usize,
    /// Entries whose kind has no registered constructor
    pub rejected: usize,
    /// Handles created but left at their namespace origin because the
    /// handle could not resolve its own pose
    pub unplaced: usize,
}

/// Shared ownership of a marker set between a planning result and a host
pub type MarkerSetPtr = Rc<RefCell<MarkerSet>>;

/// Markers of one planning result, all expressed in one planning frame
#[derive(Debug)]
pub struct MarkerSet {
    planning_frame: String,
    entries: Vec<MarkerEntry>,
    /// Namespace -> grouping node (None until first materialized)
    namespaces: BTreeMap<String, Option<NodeId>>,
    /// Graph the grouping nodes were created in
    graph: Option<SceneGraph>,
}

impl MarkerSet {
    /// Capture `markers`, expressing each pose in the snapshot's planning
    /// frame. Markers in frames the snapshot cannot resolve are dropped.
    pub fn new<I>(markers: I, snapshot: &dyn FrameSnapshot) -> Self
    where
        I: IntoIterator<Item = Marker>,
    {
        let mut entries = Vec::new();
        let mut namespaces = BTreeMap::new();
        let mut dropped = 0usize;

        for mut marker in markers {
            if !to_planning_frame(&mut marker, snapshot) {
                dropped += 1;
                continue;
            }
            namespaces.entry(marker.ns.clone()).or_insert(None);
            entries.push(MarkerEntry {
                marker,
                state: EntryState::Captured,
            });
        }

        debug!(
            planning_frame = %snapshot.planning_frame(),
            markers = entries.len(),
            dropped,
            namespaces = namespaces.len(),
            "Captured marker set"
        );

        Self {
            planning_frame: snapshot.planning_frame().to_string(),
            entries,
            namespaces,
            graph: None,
        }
    }

    pub fn into_shared(self) -> MarkerSetPtr {
        Rc::new(RefCell::new(self))
    }

    pub fn planning_frame(&self) -> &str {
        &self.planning_frame
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[MarkerEntry] {
        &self.entries
    }

    pub fn markers(&self) -> impl Iterator<Item = &Marker> {
        self.entries.iter().map(|e| &e.marker)
    }

    /// Namespaces in name order with their grouping node, if created
    pub fn namespaces(&self) -> impl Iterator<Item = (&str, Option<NodeId>)> {
        self.namespaces.iter().map(|(ns, node)| (ns.as_str(), *node))
    }

    pub fn namespace_node(&self, ns: &str) -> Option<NodeId> {
        self.namespaces.get(ns).copied().flatten()
    }

    /// Graph holding this set's nodes, once materialized
    pub fn graph(&self) -> Option<&SceneGraph> {
        self.graph.as_ref()
    }

    /// Number of entries still waiting for a render handle
    pub fn pending(&self) -> usize {
        self.entries.iter().filter(|e| e.state.is_captured()).count()
    }

    /// Create render handles for every captured entry
    ///
    /// The fixed-frame to planning-frame transform is looked up once and
    /// applied to every handle created by this call. If the lookup fails
    /// nothing is created and a later call may retry. Entries that already
    /// have a handle, or were rejected, are left alone.
    ///
    /// A set lives in one graph at a time. Given a different graph than
    /// before, it releases every node held in the old graph and materializes
    /// all of its markers afresh in the new one.
    pub fn create_markers(
        &mut self,
        context: &dyn RenderContext,
        graph: &SceneGraph,
        factory: &HandleFactory,
    ) -> Result<MaterializeReport, MaterializeError> {
        if self.graph.as_ref().is_some_and(|held| !held.same_graph(graph)) {
            debug!(markers = self.len(), "Moving marker set to another scene graph");
            self.release_nodes();
        }

        let mut report = MaterializeReport::default();
        if self.pending() == 0 {
            return Ok(report);
        }

        let fixed_t_planning = context
            .lookup_transform(context.fixed_frame(), &self.planning_frame, context.lookup_timeout())
            .inspect_err(|e| {
                warn!(
                    error = %e,
                    fixed_frame = %context.fixed_frame(),
                    planning_frame = %self.planning_frame,
                    "Deferring marker creation"
                );
            })?;
        let rotation = fixed_t_planning.rotation.inverse();
        let offset = fixed_t_planning.translation.vector;

        let graph = self.graph.get_or_insert_with(|| graph.clone()).clone();
        let Self {
            planning_frame,
            entries,
            namespaces,
            ..
        } = self;

        for entry in entries.iter_mut().filter(|e| e.state.is_captured()) {
            let marker = &entry.marker;
            debug_assert_eq!(
                marker.frame_id(),
                planning_frame.as_str(),
                "marker set must carry exactly one planning frame"
            );
            if marker.frame_id() != planning_frame.as_str() {
                error!(frame = %marker.frame_id(), planning_frame = %planning_frame, "Marker outside planning frame");
                continue;
            }

            let Some(slot) = namespaces.get_mut(&marker.ns) else {
                debug_assert!(false, "namespace '{}' was not recorded", marker.ns);
                error!(ns = %marker.ns, "Marker namespace was not recorded");
                continue;
            };
            let group = *slot.get_or_insert_with(|| graph.create_node(&format!("ns:{}", marker.ns)));

            let Some(mut handle) = factory.create(marker.kind, &graph, group) else {
                error!(kind = %marker.kind, ns = %marker.ns, id = marker.id, "Unknown marker type");
                entry.state = EntryState::Rejected;
                report.rejected += 1;
                continue;
            };

            // the handle places itself relative to the fixed frame; re-express
            // that pose relative to the planning frame
            match handle.set_message(marker, context) {
                Ok(()) => {
                    handle.set_orientation(rotation * handle.orientation());
                    handle.set_position(rotation * (handle.position() - offset));
                }
                Err(e) => {
                    warn!(error = %e, ns = %marker.ns, id = marker.id, "Marker left at namespace origin");
                    report.unplaced += 1;
                }
            }
            entry.state = EntryState::Materialized(handle);
            report.created += 1;
        }

        debug!(
            created = report.created,
            rejected = report.rejected,
            unplaced = report.unplaced,
            "Materialized markers"
        );
        Ok(report)
    }

    /// Attach (`visible`) or detach the grouping node of `ns` below `parent`.
    /// A namespace that was never materialized is left alone.
    pub fn set_visible(&self, ns: &str, parent: NodeId, visible: bool) {
        let (Some(node), Some(graph)) = (self.namespace_node(ns), self.graph.as_ref()) else {
            return;
        };
        if let Err(e) = graph.set_attached(node, parent, visible) {
            warn!(error = %e, ns = %ns, visible, "Failed to change namespace visibility");
        }
    }

    /// Whether the grouping node of `ns` is a direct child of `parent`
    pub fn is_attached(&self, ns: &str, parent: NodeId) -> bool {
        match (self.namespace_node(ns), self.graph.as_ref()) {
            (Some(node), Some(graph)) => graph.is_child_of(node, parent),
            _ => false,
        }
    }

    /// Destroy every render handle and grouping node and return all entries
    /// to the captured state
    fn release_nodes(&mut self) {
        // handles release their own nodes before the grouping nodes go
        for entry in &mut self.entries {
            entry.state = EntryState::Captured;
        }
        if let Some(graph) = self.graph.take() {
            for node in self.namespaces.values_mut().filter_map(Option::take) {
                graph.destroy_node(node);
            }
        }
    }
}

impl Drop for MarkerSet {
    fn drop(&mut self) {
        self.release_nodes();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use approx::assert_relative_eq;
    use nalgebra::{Isometry3, Vector3};
    use planmark_core::{MarkerKind, Pose};
    use std::cell::Cell;
    use std::time::Duration;

    use crate::context::StaticTransforms;
    use crate::testing::{context, marker, sample_tree};

    fn sample_pose() -> Pose {
        Pose::from_xyz_rpy([0.5, -0.25, 1.0, 0.1, 0.2, 0.3])
    }

    #[test]
    fn test_planning_frame_markers_unchanged() {
        let original = marker(MarkerKind::Cube, "obj", "map").with_pose(sample_pose());
        let set = MarkerSet::new(vec![original.clone()], &sample_tree());

        assert_eq!(set.len(), 1);
        let stored = set.markers().next().unwrap();
        assert_eq!(stored, &original);
    }

    #[test]
    fn test_known_frame_is_reconciled() {
        let tree = sample_tree();
        let original = marker(MarkerKind::Arrow, "grasp", "gripper").with_pose(sample_pose());
        let set = MarkerSet::new(vec![original.clone()], &tree);

        let stored = set.markers().next().unwrap();
        assert_eq!(stored.frame_id(), "map");

        let expected = tree.frame_transform("gripper").unwrap() * original.pose.to_isometry();
        assert_relative_eq!(stored.pose.to_isometry(), expected, epsilon = 1e-12);

        // gripper sits 0.5 above odom, whose origin is map(1, 2, 0)
        let origin = marker(MarkerKind::Sphere, "grasp", "gripper");
        let set = MarkerSet::new(vec![origin], &tree);
        let p = set.markers().next().unwrap().pose.position;
        assert_relative_eq!(p.to_vector(), Vector3::new(1.0, 2.0, 0.5), epsilon = 1e-12);
    }

    #[test]
    fn test_unknown_frame_dropped() {
        let markers = vec![
            marker(MarkerKind::Cube, "a", "map"),
            marker(MarkerKind::Cube, "b", "nowhere"),
            marker(MarkerKind::Cube, "b", "nowhere"),
            marker(MarkerKind::Cube, "c", "odom"),
        ];
        let set = MarkerSet::new(markers, &sample_tree());

        assert_eq!(set.len(), 2);
        let names: Vec<&str> = set.namespaces().map(|(ns, _)| ns).collect();
        assert_eq!(names, vec!["a", "c"]);
    }

    #[test]
    fn test_unknown_frame_warns_once_per_namespace() {
        WARNED_FRAMES.with(|warned| warned.borrow_mut().clear());

        assert!(warn_unknown_frame("lidar", "scan"));
        assert!(!warn_unknown_frame("lidar", "scan"));
        assert!(warn_unknown_frame("lidar", "hits"));
        assert!(warn_unknown_frame("radar", "scan"));

        // construction goes through the same gate
        let markers = vec![
            marker(MarkerKind::Cube, "cloud", "sonar"),
            marker(MarkerKind::Cube, "cloud", "sonar"),
        ];
        let set = MarkerSet::new(markers, &sample_tree());
        assert!(set.is_empty());
        assert!(!warn_unknown_frame("sonar", "cloud"));
    }

    #[test]
    fn test_warned_frames_bounded() {
        WARNED_FRAMES.with(|warned| warned.borrow_mut().clear());

        for i in 0..MAX_WARNED_FRAMES {
            assert!(warn_unknown_frame(&format!("frame_{i}"), "ns"));
        }
        assert!(!warn_unknown_frame("frame_0", "ns"));

        assert!(warn_unknown_frame("one_too_many", "ns"));
        WARNED_FRAMES.with(|warned| assert_eq!(warned.borrow().len(), 1));
        assert!(warn_unknown_frame("frame_0", "ns"));
    }

    #[test]
    fn test_three_marker_scenario() {
        let markers = vec![
            marker(MarkerKind::Cube, "scene", "map"),
            marker(MarkerKind::Cube, "scene", "base"),
            marker(MarkerKind::Cube, "scene", "unknown_frame"),
        ];
        let set = MarkerSet::new(markers, &sample_tree());

        assert_eq!(set.len(), 2);
        assert!(set.markers().all(|m| m.frame_id() == "map"));
        assert_eq!(set.planning_frame(), "map");
    }

    #[test]
    fn test_construction_creates_no_nodes() {
        let set = MarkerSet::new(vec![marker(MarkerKind::Cube, "a", "map")], &sample_tree());
        assert_eq!(set.pending(), 1);
        assert_eq!(set.namespace_node("a"), None);
        assert!(set.entries()[0].handle().is_none());
    }

    #[test]
    fn test_create_markers_is_idempotent() {
        let graph = SceneGraph::new();
        let factory = HandleFactory::default();
        let ctx = context("map");
        let markers = vec![
            marker(MarkerKind::Cube, "a", "map"),
            marker(MarkerKind::LineStrip, "a", "odom"),
            marker(MarkerKind::TextViewFacing, "b", "base"),
        ];
        let mut set = MarkerSet::new(markers, &sample_tree());

        let first = set.create_markers(&ctx, &graph, &factory).unwrap();
        assert_eq!(first.created, 3);
        let nodes_after_first = graph.node_count();
        let handle_nodes: Vec<NodeId> = set.entries().iter().filter_map(|e| e.handle()).map(|h| h.node()).collect();
        assert_eq!(handle_nodes.len(), 3);

        let second = set.create_markers(&ctx, &graph, &factory).unwrap();
        assert_eq!(second, MaterializeReport::default());
        assert_eq!(graph.node_count(), nodes_after_first);
        let again: Vec<NodeId> = set.entries().iter().filter_map(|e| e.handle()).map(|h| h.node()).collect();
        assert_eq!(again, handle_nodes);

        // two namespaces, each with its grouping node holding its handles
        let a = set.namespace_node("a").unwrap();
        let b = set.namespace_node("b").unwrap();
        assert_eq!(graph.children(a).len(), 2);
        assert_eq!(graph.children(b).len(), 1);
        assert_eq!(graph.parent(a), None);
    }

    #[test]
    fn test_handles_aligned_to_planning_frame() {
        // viewer renders relative to odom, which is shifted and turned
        let graph = SceneGraph::new();
        let factory = HandleFactory::default();
        let ctx = context("odom");
        let pose = sample_pose();
        let mut set = MarkerSet::new(vec![marker(MarkerKind::Arrow, "a", "map").with_pose(pose)], &sample_tree());

        set.create_markers(&ctx, &graph, &factory).unwrap();
        let handle = set.entries()[0].handle().unwrap();

        assert_relative_eq!(handle.position(), pose.position.to_vector(), epsilon = 1e-9);
        assert_relative_eq!(handle.orientation(), pose.orientation.to_unit_quaternion(), epsilon = 1e-9);
    }

    #[test]
    fn test_transform_failure_defers_creation() {
        let graph = SceneGraph::new();
        let factory = HandleFactory::default();
        let mut ctx = context("camera");
        let mut set = MarkerSet::new(vec![marker(MarkerKind::Cube, "a", "map")], &sample_tree());
        let nodes_before = graph.node_count();

        let err = set.create_markers(&ctx, &graph, &factory).unwrap_err();
        assert!(matches!(err, MaterializeError::Transform(_)));
        assert_eq!(graph.node_count(), nodes_before);
        assert_eq!(set.pending(), 1);
        assert_eq!(set.namespace_node("a"), None);

        ctx.set_fixed_frame("map");
        let report = set.create_markers(&ctx, &graph, &factory).unwrap();
        assert_eq!(report.created, 1);
        assert_eq!(set.pending(), 0);
    }

    #[test]
    fn test_unknown_kind_rejected_once() {
        let graph = SceneGraph::new();
        let factory = HandleFactory::default();
        let ctx = context("map");
        let markers = vec![
            marker(MarkerKind::Unknown(42), "weird", "map"),
            marker(MarkerKind::Sphere, "weird", "map"),
        ];
        let mut set = MarkerSet::new(markers, &sample_tree());

        let report = set.create_markers(&ctx, &graph, &factory).unwrap();
        assert_eq!(report.created, 1);
        assert_eq!(report.rejected, 1);
        assert!(matches!(set.entries()[0].state(), EntryState::Rejected));
        assert!(set.entries()[1].state().is_materialized());

        let group = set.namespace_node("weird").unwrap();
        assert_eq!(graph.children(group).len(), 1);

        let again = set.create_markers(&ctx, &graph, &factory).unwrap();
        assert_eq!(again.rejected, 0);
    }

    #[test]
    fn test_unplaced_handle_kept() {
        // answers the alignment lookup, then loses the transform
        struct Flaky {
            inner: StaticTransforms,
            calls: Cell<usize>,
        }

        impl RenderContext for Flaky {
            fn fixed_frame(&self) -> &str {
                self.inner.fixed_frame()
            }

            fn lookup_transform(
                &self,
                target: &str,
                source: &str,
                timeout: Duration,
            ) -> Result<Isometry3<f64>, TransformError> {
                self.calls.set(self.calls.get() + 1);
                if self.calls.get() == 1 {
                    return self.inner.lookup_transform(target, source, timeout);
                }
                Err(TransformError::Timeout {
                    target_frame: target.to_string(),
                    source_frame: source.to_string(),
                    timeout,
                })
            }
        }

        let graph = SceneGraph::new();
        let ctx = Flaky {
            inner: context("odom"),
            calls: Cell::new(0),
        };
        let pose = sample_pose();
        let mut set = MarkerSet::new(vec![marker(MarkerKind::Cube, "a", "map").with_pose(pose)], &sample_tree());

        let report = set.create_markers(&ctx, &graph, &HandleFactory::default()).unwrap();
        assert_eq!(report.created, 1);
        assert_eq!(report.unplaced, 1);
        assert_eq!(set.pending(), 0);

        let handle = set.entries()[0].handle().unwrap();
        assert_eq!(handle.position(), Vector3::zeros());
        assert_eq!(graph.parent(handle.node()), set.namespace_node("a"));
    }

    #[test]
    fn test_alignment_looked_up_once_per_call() {
        // answers the first lookup, then drifts to identity
        struct Drifting {
            inner: StaticTransforms,
            calls: Cell<usize>,
        }

        impl RenderContext for Drifting {
            fn fixed_frame(&self) -> &str {
                self.inner.fixed_frame()
            }

            fn lookup_transform(
                &self,
                target: &str,
                source: &str,
                timeout: Duration,
            ) -> Result<Isometry3<f64>, TransformError> {
                self.calls.set(self.calls.get() + 1);
                if self.calls.get() == 1 {
                    return self.inner.lookup_transform(target, source, timeout);
                }
                Ok(Isometry3::identity())
            }
        }

        let graph = SceneGraph::new();
        let factory = HandleFactory::default();
        let ctx = Drifting {
            inner: context("odom"),
            calls: Cell::new(0),
        };
        let poses = [
            sample_pose(),
            Pose::from_position(1.0, 0.0, 0.0),
            Pose::from_xyz_rpy([-2.0, 0.5, 0.25, 0.0, 0.0, 1.0]),
        ];
        let markers: Vec<Marker> = poses
            .iter()
            .map(|pose| marker(MarkerKind::Cube, "a", "map").with_pose(*pose))
            .collect();
        let mut set = MarkerSet::new(markers, &sample_tree());

        let report = set.create_markers(&ctx, &graph, &factory).unwrap();
        assert_eq!(report.created, 3);
        assert_eq!(report.unplaced, 0);
        // one alignment lookup, then one per handle
        assert_eq!(ctx.calls.get(), 1 + poses.len());

        let fixed_t_planning = context("odom")
            .lookup_transform("odom", "map", Duration::from_millis(100))
            .unwrap();
        let rotation = fixed_t_planning.rotation.inverse();
        let offset = fixed_t_planning.translation.vector;
        for (entry, pose) in set.entries().iter().zip(&poses) {
            let handle = entry.handle().unwrap();
            assert_relative_eq!(handle.position(), rotation * (pose.position.to_vector() - offset), epsilon = 1e-9);
            assert_relative_eq!(
                handle.orientation(),
                rotation * pose.orientation.to_unit_quaternion(),
                epsilon = 1e-9
            );
        }

        set.create_markers(&ctx, &graph, &factory).unwrap();
        assert_eq!(ctx.calls.get(), 1 + poses.len());
    }

    #[test]
    fn test_moving_to_another_graph() {
        let first = SceneGraph::new();
        let second = SceneGraph::new();
        let factory = HandleFactory::default();
        let ctx = context("map");
        let markers = vec![
            marker(MarkerKind::Cube, "a", "map"),
            marker(MarkerKind::Unknown(7), "a", "map"),
            marker(MarkerKind::Points, "b", "odom"),
        ];
        let mut set = MarkerSet::new(markers, &sample_tree());

        set.create_markers(&ctx, &first, &factory).unwrap();
        // root, two grouping nodes, two handles
        assert_eq!(first.node_count(), 5);

        let report = set.create_markers(&ctx, &second, &factory).unwrap();
        assert_eq!(report.created, 2);
        assert_eq!(report.rejected, 1);
        assert_eq!(first.node_count(), 1);
        assert_eq!(second.node_count(), 5);
        assert!(set.graph().unwrap().same_graph(&second));

        let parent = second.create_child(second.root(), "markers").unwrap();
        set.set_visible("a", parent, true);
        assert!(set.is_attached("a", parent));
        let handle = set.entries()[0].handle().unwrap();
        assert!(second.is_rendered(handle.node()));
    }

    #[test]
    fn test_set_visible_idempotent() {
        let graph = SceneGraph::new();
        let parent = graph.create_child(graph.root(), "markers").unwrap();
        let mut set = MarkerSet::new(vec![marker(MarkerKind::Cube, "a", "map")], &sample_tree());

        // nothing to attach before materialization
        set.set_visible("a", parent, true);
        assert!(graph.children(parent).is_empty());

        set.create_markers(&context("map"), &graph, &HandleFactory::default())
            .unwrap();
        set.set_visible("a", parent, true);
        set.set_visible("a", parent, true);
        assert_eq!(graph.children(parent).len(), 1);
        assert!(set.is_attached("a", parent));

        set.set_visible("a", parent, false);
        set.set_visible("a", parent, false);
        assert!(graph.children(parent).is_empty());
        assert!(!set.is_attached("a", parent));

        // unknown namespaces are ignored
        set.set_visible("missing", parent, true);
        assert!(graph.children(parent).is_empty());
    }

    #[test]
    fn test_drop_releases_nodes() {
        let graph = SceneGraph::new();
        let parent = graph.create_child(graph.root(), "markers").unwrap();
        let baseline = graph.node_count();

        let markers = vec![
            marker(MarkerKind::Cube, "a", "map"),
            marker(MarkerKind::Points, "b", "odom"),
        ];
        let mut set = MarkerSet::new(markers, &sample_tree());
        set.create_markers(&context("map"), &graph, &HandleFactory::default())
            .unwrap();
        set.set_visible("a", parent, true);
        assert_eq!(graph.node_count(), baseline + 4);

        drop(set);
        assert_eq!(graph.node_count(), baseline);
        assert!(graph.children(parent).is_empty());
    }
}
