//! Pilot: programmatic interaction with a headless engine.
//!
//! The `Pilot` mounts a view on a [`DomBackend`] engine registered with its own
//! [`Hub`], and provides methods to simulate user input (clicks, custom
//! events, messages), settle scheduled work, and inspect the rendered tree.

use std::rc::Rc;

use crate::backend::{DomBackend, Patch};
use crate::dom::NodeId;
use crate::engine::Engine;
use crate::error::{HubError, RenderError};
use crate::event::Event;
use crate::geometry::Point;
use crate::hub::message::Message;
use crate::hub::Hub;
use crate::plugin::Plugin;
use crate::router::RouterPlugin;
use crate::scope::Scope;
use crate::slot::Slot;

use super::snapshot::{engine_html, outline};

// ---------------------------------------------------------------------------
// Pilot
// ---------------------------------------------------------------------------

/// A headless engine driver for testing.
///
/// # Examples
///
/// ```ignore
/// use sprig::testing::Pilot;
///
/// let pilot = Pilot::new(|s| {
///     s.element("button", |s| {
///         s.attr("id", "go")?;
///         s.on("click", |_| println!("clicked"))?;
///         s.text("Go")
///     })?;
///     Ok(())
/// })?;
/// assert!(pilot.click("go"));
/// ```
pub struct Pilot {
    hub: Hub,
    engine: Engine,
    slot: Slot,
}

impl Pilot {
    /// Mount `view` on a fresh engine with the default plugins and the router.
    pub fn new(
        view: impl Fn(&mut Scope<'_>) -> Result<(), RenderError> + 'static,
    ) -> Result<Self, RenderError> {
        Self::with_plugins(Vec::new(), view)
    }

    /// Like [`new`](Self::new), with extra plugins registered on the engine.
    pub fn with_plugins(
        plugins: Vec<Rc<dyn Plugin>>,
        view: impl Fn(&mut Scope<'_>) -> Result<(), RenderError> + 'static,
    ) -> Result<Self, RenderError> {
        let engine = Engine::builder(DomBackend::new())
            .id("pilot")
            .plugin(RouterPlugin)
            .plugins(plugins)
            .build()
            .map_err(|err| RenderError::component(err.to_string()))?;
        let hub = Hub::new();
        hub.register(&engine)
            .map_err(|err| RenderError::component(err.to_string()))?;
        let slot = engine.mount_with(view)?;
        hub.run_microtasks();
        Ok(Self { hub, engine, slot })
    }

    // ── Input simulation ─────────────────────────────────────────────

    /// Dispatch `click` on the element with the given `id` attribute, then
    /// settle. Returns whether any listener ran; `false` if nothing has that id.
    pub fn click(&self, id: &str) -> bool {
        match self.find(id) {
            Some(node) => self.dispatch(node, Event::new("click")),
            None => false,
        }
    }

    /// Dispatch `click` at a point, routed by the backend's hit test.
    ///
    /// The DOM backend knows no geometry, so this only reaches listeners when
    /// the pilot's engine is swapped for one that does.
    pub fn click_at(&self, x: f64, y: f64) -> bool {
        let handled = self
            .engine
            .dispatch_at(Point::new(x, y), Event::new("click"));
        self.settle();
        handled
    }

    /// Dispatch `event` at `node`, then settle.
    pub fn dispatch(&self, node: NodeId, event: Event) -> bool {
        let handled = self.engine.dispatch_event(node, event);
        self.settle();
        handled
    }

    /// Send a message to the pilot's engine through the hub, then settle.
    pub fn send(&self, message: impl Message) -> Result<(), HubError> {
        self.hub.dispatch(self.engine.id(), message)?;
        self.settle();
        Ok(())
    }

    // ── Processing ───────────────────────────────────────────────────

    /// Run the hub's microtask checkpoint. Returns the number of flushes.
    pub fn settle(&self) -> usize {
        self.hub.run_microtasks()
    }

    /// Simulate one animation frame.
    pub fn tick(&self) -> usize {
        self.hub.tick_frame()
    }

    // ── Query ────────────────────────────────────────────────────────

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn hub(&self) -> &Hub {
        &self.hub
    }

    /// The slot the view was mounted in.
    pub fn slot(&self) -> &Slot {
        &self.slot
    }

    /// The node whose `id` attribute equals `id`.
    pub fn find(&self, id: &str) -> Option<NodeId> {
        self.engine.with_dom(|dom| dom.query_by_id(id))
    }

    /// Text content of the element with the given `id`.
    pub fn text_of(&self, id: &str) -> Option<String> {
        let node = self.find(id)?;
        Some(self.engine.with_dom(|dom| dom.text_content(node)))
    }

    /// Current HTML of the whole tree.
    pub fn html(&self) -> String {
        engine_html(&self.engine)
    }

    /// Indented outline of the main tree.
    pub fn outline(&self) -> String {
        self.engine
            .with_dom(|dom| outline(dom, self.engine.root()))
    }

    /// Drain the patches committed so far.
    pub fn take_patches(&self) -> Vec<Patch> {
        self.engine
            .with_backend_mut(|b: &mut DomBackend| b.take_patches())
            .unwrap_or_default()
    }
}

impl std::fmt::Debug for Pilot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pilot")
            .field("engine", &self.engine)
            .field("slot", &self.slot)
            .finish()
    }
}

// ===========================================================================
// Tests
// ===========================================================================
