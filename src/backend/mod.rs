//! Render targets.
//!
//! The engine owns the [`Dom`] and reports every change to its backend as a
//! [`Mutation`], after the tree has been updated. At the end of a flush the
//! backend gets [`Backend::flush`] to commit whatever it accumulated.
//!
//! Three backends ship with the crate:
//!
//! - [`DomBackend`] records a patch log a host bridge replays;
//! - [`CanvasBackend`] repaints a display list on each animation frame;
//! - [`SsrBackend`] serializes the tree to HTML synchronously.

pub mod canvas;
pub mod dom;
pub mod ssr;

use std::any::Any;

use crate::dom::{AttrValue, Dom, NodeId, NodeKind};
use crate::engine::Schedule;
use crate::geometry::Point;

pub use self::canvas::{CanvasBackend, DrawCommand};
pub use self::dom::{DomBackend, Patch};
pub use self::ssr::{render_html, SsrBackend};

/// One change to the render tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    /// A node was created. `parent` is `None` for root-level layers.
    Create {
        node: NodeId,
        parent: Option<NodeId>,
        kind: NodeKind,
    },
    SetAttribute {
        node: NodeId,
        name: String,
        value: AttrValue,
    },
    RemoveAttribute {
        node: NodeId,
        name: String,
    },
    AddListener {
        node: NodeId,
        event: String,
    },
    RemoveListener {
        node: NodeId,
        event: String,
    },
    /// A node and its whole subtree were removed.
    Remove {
        node: NodeId,
    },
}

impl Mutation {
    /// The node the mutation applies to.
    pub fn node(&self) -> NodeId {
        match self {
            Mutation::Create { node, .. }
            | Mutation::SetAttribute { node, .. }
            | Mutation::RemoveAttribute { node, .. }
            | Mutation::AddListener { node, .. }
            | Mutation::RemoveListener { node, .. }
            | Mutation::Remove { node } => *node,
        }
    }
}

/// A render target bound to one engine.
pub trait Backend: Any {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// The discipline this backend prefers for applying scheduled work.
    fn schedule(&self) -> Schedule;

    /// Observe one mutation. `dom` already reflects it.
    fn apply(&mut self, dom: &Dom, mutation: &Mutation);

    /// Commit accumulated work at the end of a flush.
    fn flush(&mut self, _dom: &Dom) {}

    /// The node drawn topmost at `point`, for backends that know geometry.
    fn hit_test(&self, _point: Point) -> Option<NodeId> {
        None
    }

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}
