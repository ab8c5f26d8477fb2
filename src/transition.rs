//! Enter and leave phases for a block of content.
//!
//! [`transition`] renders its children into a fragment and marks each
//! top-level element with a [`PHASE_ATTR`] attribute naming the phase:
//!
//! ```text
//! build            → data-transition="fade-enter"
//! +enter_frames    → attribute removed
//! owner refreshed  → data-transition="fade-leave", old nodes kept in place
//! +leave_frames    → old nodes removed
//! ```
//!
//! Frames are counted by [`Engine::advance_frame`](crate::engine::Engine::advance_frame),
//! which [`Hub::tick_frame`](crate::hub::Hub::tick_frame) calls for every
//! registered engine. The leave phase plays when the slot that rendered the
//! transition is refreshed; if that slot is removed outright its nodes go
//! with it.

use std::rc::Rc;

use crate::dom::{NodeData, NodeId};
use crate::engine::Engine;
use crate::error::RenderError;
use crate::plugin::Plugin;
use crate::request::{builder, Builder, Request, Response};
use crate::scope::Scope;
use crate::slot::Slot;

/// Tag claimed by [`TransitionPlugin`].
pub const TRANSITION_TAG: &str = "transition";

/// Attribute carrying the current phase, `"{name}-enter"` or `"{name}-leave"`.
pub const PHASE_ATTR: &str = "data-transition";

/// Phase names and lengths, in animation frames.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    name: String,
    enter_frames: usize,
    leave_frames: usize,
}

impl Transition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            enter_frames: 1,
            leave_frames: 1,
        }
    }

    /// Frames the enter marker stays on (builder). At least one.
    pub fn enter_frames(mut self, frames: usize) -> Self {
        self.enter_frames = frames;
        self
    }

    /// Frames old content lingers after its owner refreshes (builder).
    /// At least one.
    pub fn leave_frames(mut self, frames: usize) -> Self {
        self.leave_frames = frames;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn enter_phase(&self) -> String {
        format!("{}-enter", self.name)
    }

    fn leave_phase(&self) -> String {
        format!("{}-leave", self.name)
    }
}

impl Default for Transition {
    fn default() -> Self {
        Self::new("fade")
    }
}

struct TransitionRequest {
    transition: Transition,
    children: Builder,
}

/// Render `children` with enter and leave phases. Returns the content's slot.
pub fn transition(
    scope: &mut Scope<'_>,
    transition: Transition,
    children: impl Fn(&mut Scope<'_>) -> Result<(), RenderError> + 'static,
) -> Result<Slot, RenderError> {
    let response = scope.request(Request::custom(
        TRANSITION_TAG,
        TransitionRequest {
            transition,
            children: builder(children),
        },
    ))?;
    response.into_slot().ok_or_else(|| RenderError::UnexpectedResponse {
        tag: TRANSITION_TAG.to_string(),
    })
}

/// Handles `transition` requests. Not installed by default.
#[derive(Debug, Default, Clone, Copy)]
pub struct TransitionPlugin;

impl Plugin for TransitionPlugin {
    fn name(&self) -> &'static str {
        "transition"
    }

    fn handles(&self) -> &[&'static str] {
        &[TRANSITION_TAG]
    }

    fn dependencies(&self) -> &[&'static str] {
        &["core"]
    }

    fn handle(&self, request: Request, scope: &mut Scope<'_>) -> Result<Response, RenderError> {
        let unsupported = |tag: &str| RenderError::UnsupportedRequest {
            plugin: self.name().to_string(),
            tag: tag.to_string(),
        };
        let Request::Custom { tag, payload } = request else {
            return Err(unsupported(request.tag()));
        };
        let request = payload
            .downcast::<TransitionRequest>()
            .map_err(|_| unsupported(tag))?;
        let transition = Rc::new(request.transition.clone());

        let anchor = scope.create_node(NodeData::fragment())?;
        let slot = scope.create_slot(anchor, request.children.clone())?;
        let engine = scope.engine();

        let entering = element_children(engine, anchor);
        let enter = transition.enter_phase();
        for &node in &entering {
            engine.set_attribute(node, PHASE_ATTR, enter.as_str().into())?;
        }
        engine.after_frames(transition.enter_frames, move |engine| {
            for node in entering {
                if phase_of(engine, node).as_deref() == Some(enter.as_str()) {
                    engine.remove_attribute(node, PHASE_ATTR);
                }
            }
        });

        let weak = engine.downgrade();
        scope.on_unmount(move || {
            let Some(engine) = weak.upgrade() else {
                return;
            };
            let leave = transition.leave_phase();
            for node in element_children(&engine, anchor) {
                // The node may already be gone with its owner.
                let _ = engine.set_attribute(node, PHASE_ATTR, leave.as_str().into());
            }
            engine.retain_node(anchor);
            tracing::trace!(node = ?anchor, name = %transition.name, "leave started");
            engine.after_frames(transition.leave_frames, move |engine| {
                engine.release_node(anchor);
            });
        });
        Ok(Response::Slot(slot))
    }
}

fn element_children(engine: &Engine, node: NodeId) -> Vec<NodeId> {
    engine.with_dom(|dom| {
        dom.children(node)
            .iter()
            .copied()
            .filter(|&child| dom.get(child).is_some_and(NodeData::is_element))
            .collect()
    })
}

fn phase_of(engine: &Engine, node: NodeId) -> Option<String> {
    engine.with_dom(|dom| {
        dom.get(node)
            .and_then(|data| data.attr(PHASE_ATTR))
            .and_then(|value| value.as_str())
            .map(str::to_string)
    })
}
