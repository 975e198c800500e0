//! Marker host: attachment point and per-namespace visibility
//!
//! The host owns one scene node ("markers") below the display's node. Hosted
//! marker sets hang their namespace grouping nodes below it. Visibility has
//! two levels: one switch for the whole host and one toggle per namespace,
//! shared by every hosted set.

use std::collections::BTreeMap;
use std::rc::Rc;
use tracing::{debug, info, warn};

use crate::context::RenderContext;
use crate::graph::{NodeId, SceneError, SceneGraph};
use crate::handle::HandleFactory;
use crate::marker_set::MarkerSetPtr;

/// Visibility toggle per namespace (visible unless switched off)
#[derive(Debug, Clone, Default)]
pub struct NamespaceToggles {
    toggles: BTreeMap<String, bool>,
}

impl NamespaceToggles {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_visible(&self, ns: &str) -> bool {
        self.toggles.get(ns).copied().unwrap_or(true)
    }

    /// Make sure a toggle exists for `ns` and return its value
    pub fn ensure(&mut self, ns: &str) -> bool {
        *self.toggles.entry(ns.to_string()).or_insert(true)
    }

    /// Set a toggle, returning whether its value changed
    pub fn set_visible(&mut self, ns: &str, visible: bool) -> bool {
        let previous = self.toggles.insert(ns.to_string(), visible);
        previous.unwrap_or(true) != visible
    }

    pub fn contains(&self, ns: &str) -> bool {
        self.toggles.contains_key(ns)
    }

    /// Toggles in namespace order
    pub fn iter(&self) -> impl Iterator<Item = (&str, bool)> {
        self.toggles.iter().map(|(ns, visible)| (ns.as_str(), *visible))
    }

    pub fn len(&self) -> usize {
        self.toggles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.toggles.is_empty()
    }
}

/// Hosts marker sets below one attachment node
pub struct MarkerHost {
    graph: SceneGraph,
    parent: NodeId,
    attachment: NodeId,
    enabled: bool,
    context: Box<dyn RenderContext>,
    factory: HandleFactory,
    toggles: NamespaceToggles,
    hosted: Vec<MarkerSetPtr>,
}

impl MarkerHost {
    /// Create the host's attachment node below `parent`
    pub fn new(
        graph: &SceneGraph,
        parent: NodeId,
        context: Box<dyn RenderContext>,
        factory: HandleFactory,
    ) -> Result<Self, SceneError> {
        let attachment = graph.create_child(parent, "markers")?;
        Ok(Self {
            graph: graph.clone(),
            parent,
            attachment,
            enabled: true,
            context,
            factory,
            toggles: NamespaceToggles::new(),
            hosted: Vec::new(),
        })
    }

    pub fn attachment(&self) -> NodeId {
        self.attachment
    }

    pub fn graph(&self) -> &SceneGraph {
        &self.graph
    }

    pub fn context(&self) -> &dyn RenderContext {
        self.context.as_ref()
    }

    /// Swap the render context, e.g. after the viewer's fixed frame changed.
    /// Already materialized markers keep their alignment.
    pub fn set_context(&mut self, context: Box<dyn RenderContext>) {
        self.context = context;
    }

    pub fn toggles(&self) -> &NamespaceToggles {
        &self.toggles
    }

    pub fn hosted(&self) -> &[MarkerSetPtr] {
        &self.hosted
    }

    pub fn hosted_count(&self) -> usize {
        self.hosted.len()
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn is_namespace_visible(&self, ns: &str) -> bool {
        self.toggles.is_visible(ns)
    }

    /// Host a marker set and show its namespaces according to their toggles
    ///
    /// The set is materialized here if any of its namespaces has no grouping
    /// node yet, or if its nodes live in another graph.
    pub fn add_markers(&mut self, set: MarkerSetPtr) {
        if self.hosted.iter().any(|hosted| Rc::ptr_eq(hosted, &set)) {
            debug!("Marker set already hosted");
        } else {
            self.hosted.push(Rc::clone(&set));
        }

        let (namespaces, foreign) = {
            let set = set.borrow();
            let namespaces: Vec<(String, Option<NodeId>)> = set
                .namespaces()
                .map(|(ns, node)| (ns.to_string(), node))
                .collect();
            let foreign = set.graph().is_some_and(|held| !held.same_graph(&self.graph));
            (namespaces, foreign)
        };

        let mut attempted = false;
        for (ns, node) in namespaces {
            let visible = self.toggles.ensure(&ns);
            if (node.is_none() || foreign) && !attempted {
                attempted = true;
                self.materialize(&set);
            }

            let set = set.borrow();
            if set.namespace_node(&ns).is_none() {
                warn!(ns = %ns, "Namespace has no scene node yet");
                continue;
            }
            set.set_visible(&ns, self.attachment, visible);
        }
    }

    /// Retry materialization of hosted sets that still have captured markers.
    /// Returns the number of handles created.
    pub fn materialize_pending(&mut self) -> usize {
        let mut created = 0;
        let pending: Vec<MarkerSetPtr> = self
            .hosted
            .iter()
            .filter(|set| set.borrow().pending() > 0)
            .cloned()
            .collect();

        for set in pending {
            created += self.materialize(&set);
            let set = set.borrow();
            for (ns, _) in set.namespaces() {
                set.set_visible(ns, self.attachment, self.toggles.is_visible(ns));
            }
        }
        created
    }

    fn materialize(&self, set: &MarkerSetPtr) -> usize {
        match set
            .borrow_mut()
            .create_markers(self.context.as_ref(), &self.graph, &self.factory)
        {
            Ok(report) => report.created,
            Err(e) => {
                warn!(error = %e, "Markers not materialized, will retry later");
                0
            }
        }
    }

    /// Change the toggle of `ns` and apply it to every hosted set
    pub fn set_namespace_visible(&mut self, ns: &str, visible: bool) {
        if self.toggles.set_visible(ns, visible) {
            info!(ns = %ns, visible, "Namespace visibility changed");
        }
        for set in &self.hosted {
            set.borrow().set_visible(ns, self.attachment, visible);
        }
    }

    /// Show or hide everything the host carries
    pub fn set_enabled(&mut self, visible: bool) {
        self.enabled = visible;
        if let Err(e) = self.graph.set_attached(self.attachment, self.parent, visible) {
            warn!(error = %e, visible, "Failed to toggle marker host");
        }
    }

    /// Detach everything below the attachment node and release all hosted
    /// sets. Namespace toggles are kept.
    pub fn clear_markers(&mut self) {
        let detached = self.graph.remove_all_children(self.attachment);
        let released = self.hosted.len();
        self.hosted.clear();
        debug!(detached, released, "Cleared markers");
    }
}

impl Drop for MarkerHost {
    fn drop(&mut self) {
        self.graph.destroy_node(self.attachment);
    }
}
