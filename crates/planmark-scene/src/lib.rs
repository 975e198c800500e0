//! planmark Scene - Scene graph attachment for planning-result markers
//!
//! This crate turns reconciled marker batches into scene-graph nodes:
//! - [`SceneGraph`]: an in-process arena of positioned, parented nodes
//! - [`RenderContext`]: the viewer's fixed frame and transform service
//! - [`HandleFactory`]: marker kind to render handle registry
//! - [`MarkerSet`]: one planning result's markers, materialized on demand
//! - [`MarkerHost`]: the attachment point and per-namespace visibility

pub mod context;
pub mod graph;
pub mod handle;
pub mod host;
pub mod marker_set;

#[cfg(test)]
pub(crate) mod testing;

pub use context::{RenderContext, StaticTransforms, TransformError};
pub use graph::{NodeId, SceneError, SceneGraph};
pub use handle::{Appearance, HandleConstructor, HandleFactory, HandleKind, NodeHandle, RenderHandle};
pub use host::{MarkerHost, NamespaceToggles};
pub use marker_set::{EntryState, MarkerEntry, MarkerSet, MarkerSetPtr, MaterializeError, MaterializeReport};
