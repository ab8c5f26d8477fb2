//! Backend events: the `Event` object handed to listeners and its bubble path.
//!
//! Events start at a target node and bubble to the root. Any listener may call
//! [`Event::stop_propagation`] to keep ancestors from seeing it.

use std::any::Any;
use std::fmt;
use std::rc::Rc;

use crate::dom::{Dom, NodeId};
use crate::geometry::Point;

/// A listener callback. Shared so the tree can hand out clones while the
/// callback runs without a borrow on the tree.
pub type Handler = Rc<dyn Fn(&mut Event)>;

/// Wrap a closure as a [`Handler`].
pub fn handler(f: impl Fn(&mut Event) + 'static) -> Handler {
    Rc::new(f)
}

// ---------------------------------------------------------------------------
// Event
// ---------------------------------------------------------------------------

/// An event travelling through the tree.
#[derive(Clone)]
pub struct Event {
    /// Event type, e.g. `"click"`.
    pub kind: String,
    /// The node the event was dispatched at. Set by the engine.
    pub target: Option<NodeId>,
    /// The node whose listeners are currently running. Set by the engine.
    pub current_target: Option<NodeId>,
    /// Pointer position for canvas-originated events.
    pub position: Option<Point>,
    /// Arbitrary payload (input value, key name, ...).
    pub detail: Option<Rc<dyn Any>>,
    propagation_stopped: bool,
}

impl Event {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            target: None,
            current_target: None,
            position: None,
            detail: None,
            propagation_stopped: false,
        }
    }

    /// Attach a pointer position (builder).
    pub fn with_position(mut self, position: Point) -> Self {
        self.position = Some(position);
        self
    }

    /// Attach a payload (builder).
    pub fn with_detail<T: 'static>(mut self, detail: T) -> Self {
        self.detail = Some(Rc::new(detail));
        self
    }

    /// Downcast the payload.
    pub fn detail<T: 'static>(&self) -> Option<&T> {
        self.detail.as_deref()?.downcast_ref::<T>()
    }

    /// Stop the event from reaching ancestors of the current node.
    pub fn stop_propagation(&mut self) {
        self.propagation_stopped = true;
    }

    pub fn is_propagation_stopped(&self) -> bool {
        self.propagation_stopped
    }
}

impl fmt::Debug for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event")
            .field("kind", &self.kind)
            .field("target", &self.target)
            .field("current_target", &self.current_target)
            .field("position", &self.position)
            .field("propagation_stopped", &self.propagation_stopped)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Bubble path
// ---------------------------------------------------------------------------

/// Compute the bubble path from `start` up to its root (inclusive).
///
/// Returns `[start, parent, grandparent, ..., root]`.
/// If `start` does not exist, returns an empty vec.
pub fn bubble_path(dom: &Dom, start: NodeId) -> Vec<NodeId> {
    if !dom.contains(start) {
        return Vec::new();
    }
    let mut path = vec![start];
    path.extend(dom.ancestors(start));
    path
}
