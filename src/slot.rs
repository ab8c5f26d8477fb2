//! Slots: refreshable mount points.
//!
//! Every `element`, `portal`, `reactive` and `boundary` request, and every
//! [`Engine::mount`](crate::engine::Engine::mount), creates a slot bound to one
//! node. The slot remembers the builder that filled the node, the slots nested
//! inside it, and the unmount callbacks registered while it built, so it can
//! tear its contents down and build them again on its own.

use std::any::Any;
use std::fmt;
use std::rc::Rc;

use slotmap::new_key_type;

use crate::dom::NodeId;
use crate::engine::{Engine, WeakEngine};
use crate::error::RenderError;
use crate::reactive::ObserverId;
use crate::request::{builder, Builder};
use crate::scope::Scope;

new_key_type! {
    /// Identifies a slot inside its engine.
    pub struct SlotId;
}

/// Engine-side slot record.
pub(crate) struct SlotState {
    pub(crate) node: NodeId,
    pub(crate) parent: Option<SlotId>,
    pub(crate) children: Vec<SlotId>,
    pub(crate) builder: Builder,
    pub(crate) cleanups: Vec<Box<dyn FnOnce()>>,
    /// Values provided in this slot, newest last.
    pub(crate) context: Vec<Rc<dyn Any>>,
    pub(crate) building: bool,
    /// Set while old contents are being torn down.
    pub(crate) tearing_down: bool,
    /// Set for reactive blocks: builds run under this observer.
    pub(crate) observer: Option<ObserverId>,
}

impl SlotState {
    pub(crate) fn new(node: NodeId, parent: Option<SlotId>, builder: Builder) -> Self {
        Self {
            node,
            parent,
            children: Vec::new(),
            builder,
            cleanups: Vec::new(),
            context: Vec::new(),
            building: false,
            tearing_down: false,
            observer: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Slot handle
// ---------------------------------------------------------------------------

/// Handle to a rendered subtree.
///
/// Holds only a weak reference to its engine; once the engine is dropped or
/// the slot is torn down, every operation returns
/// [`RenderError::SlotDisposed`].
#[derive(Clone)]
pub struct Slot {
    id: SlotId,
    engine: WeakEngine,
}

impl Slot {
    pub(crate) fn new(id: SlotId, engine: WeakEngine) -> Self {
        Self { id, engine }
    }

    pub fn id(&self) -> SlotId {
        self.id
    }

    fn engine(&self) -> Result<Engine, RenderError> {
        self.engine.upgrade().ok_or(RenderError::SlotDisposed)
    }

    /// Replace the slot's contents with what `builder` produces.
    ///
    /// Unmount callbacks of the old contents run first (nested slots before
    /// this slot's own, newest first), then the bound node is emptied and
    /// `builder` runs with it as parent. On error the slot is left empty.
    pub fn refresh(&self, builder: Builder) -> Result<(), RenderError> {
        self.engine()?.refresh_now(self.id, Some(builder))
    }

    /// [`refresh`](Self::refresh) with a closure.
    pub fn refresh_with(
        &self,
        f: impl Fn(&mut Scope<'_>) -> Result<(), RenderError> + 'static,
    ) -> Result<(), RenderError> {
        self.refresh(builder(f))
    }

    /// Rebuild with the current builder.
    pub fn rerender(&self) -> Result<(), RenderError> {
        self.engine()?.refresh_now(self.id, None)
    }

    /// Queue a rebuild for the engine's next flush.
    pub fn schedule_refresh(&self) -> Result<(), RenderError> {
        let engine = self.engine()?;
        if !engine.slot_alive(self.id) {
            return Err(RenderError::SlotDisposed);
        }
        engine.schedule_slot(self.id);
        Ok(())
    }

    pub fn is_alive(&self) -> bool {
        self.engine
            .upgrade()
            .is_some_and(|engine| engine.slot_alive(self.id))
    }

    /// The node this slot renders into.
    pub fn node(&self) -> Option<NodeId> {
        self.engine.upgrade()?.slot_node(self.id)
    }

    /// Tear the slot down and remove its node.
    pub fn unmount(&self) -> Result<(), RenderError> {
        self.engine()?.unmount_slot(self.id)
    }
}

impl fmt::Debug for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Slot")
            .field("id", &self.id)
            .field("alive", &self.is_alive())
            .finish()
    }
}
