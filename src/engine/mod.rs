//! The render engine: one tree, one backend, one flush discipline.
//!
//! An [`Engine`] owns a [`Dom`], the backend it reports mutations to, the
//! slot table, and the queues that feed a flush:
//!
//! ```text
//! before_flush hooks → inbox (FIFO) → pending slot refreshes (FIFO)
//!                    → Backend::flush → on_flush hooks
//! ```
//!
//! Work scheduled while a flush runs (a message handler writing a signal) is
//! picked up by the same flush, pass after pass, until both queues are empty
//! or [`EngineConfig::max_flush_passes`] is reached.

pub mod config;
pub mod schedule;

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet, VecDeque};
use std::rc::{Rc, Weak};

use slotmap::SlotMap;

use crate::backend::{Backend, Mutation};
use crate::dom::{AttrValue, Dom, ListenerId, NodeData, NodeId, NodeKind};
use crate::error::{ConfigError, HubError, RenderError};
use crate::event::{bubble_path, Event, Handler};
use crate::geometry::Point;
use crate::hub::message::{Envelope, Message, Refresh};
use crate::hub::{Hub, HubCore};
use crate::plugin::{default_plugins, Plugin, PluginRegistry};
use crate::reactive::{self, ObserverId};
use crate::request::{builder, Builder};
use crate::scope::Scope;
use crate::slot::{Slot, SlotId, SlotState};

pub use self::config::EngineConfig;
pub use self::schedule::Schedule;

/// Called with the engine before or after each flush.
pub type FlushHook = Rc<dyn Fn(&Engine)>;

/// Receives render errors raised during scheduled refreshes.
pub type ErrorHook = Rc<dyn Fn(&RenderError)>;

/// Handles one named message delivered through the inbox.
pub type MessageHandler = Rc<dyn Fn(&Envelope, &Engine)>;

/// Work deferred by a number of animation frames.
struct FrameTask {
    remaining: usize,
    run: Box<dyn FnOnce(&Engine)>,
}

/// What one flush did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushStats {
    pub passes: usize,
    pub messages: usize,
    pub refreshes: usize,
    pub errors: usize,
}

// ---------------------------------------------------------------------------
// EngineCore
// ---------------------------------------------------------------------------

/// Shared engine state. Every concern sits in its own cell so user callbacks
/// never run while a borrow is held.
pub(crate) struct EngineCore {
    config: EngineConfig,
    schedule: Schedule,
    plugins: PluginRegistry,
    root: NodeId,
    dom: RefCell<Dom>,
    backend: RefCell<Box<dyn Backend>>,
    slots: RefCell<SlotMap<SlotId, SlotState>>,
    root_slots: RefCell<Vec<SlotId>>,
    pending: RefCell<VecDeque<SlotId>>,
    inbox: RefCell<VecDeque<Envelope>>,
    handlers: RefCell<HashMap<String, Vec<MessageHandler>>>,
    before_flush: RefCell<Vec<FlushHook>>,
    after_flush: RefCell<Vec<FlushHook>>,
    error_hooks: RefCell<Vec<ErrorHook>>,
    frame_tasks: RefCell<Vec<FrameTask>>,
    /// Nodes that survive their parent slot's teardown until released.
    retained: RefCell<HashSet<NodeId>>,
    paused: Cell<bool>,
    flushing: Cell<bool>,
    flush_requested: Cell<bool>,
    /// Nesting depth of mounts, refreshes and event dispatches.
    depth: Cell<usize>,
    hub: RefCell<Weak<HubCore>>,
}

struct DepthGuard<'a>(&'a Cell<usize>);

impl Drop for DepthGuard<'_> {
    fn drop(&mut self) {
        self.0.set(self.0.get() - 1);
    }
}

// ---------------------------------------------------------------------------
// EngineBuilder
// ---------------------------------------------------------------------------

/// Assembles an engine: backend, config, and plugin set.
pub struct EngineBuilder {
    backend: Box<dyn Backend>,
    config: EngineConfig,
    plugins: Vec<Rc<dyn Plugin>>,
    default_plugins: bool,
}

impl EngineBuilder {
    pub fn new(backend: impl Backend) -> Self {
        Self {
            backend: Box::new(backend),
            config: EngineConfig::default(),
            plugins: Vec::new(),
            default_plugins: true,
        }
    }

    /// Set the engine config (builder).
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Shorthand for setting only the hub id (builder).
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.config.id = id.into();
        self
    }

    /// Install an extra plugin (builder).
    pub fn plugin(mut self, plugin: impl Plugin + 'static) -> Self {
        self.plugins.push(Rc::new(plugin));
        self
    }

    /// Install several shared plugins at once (builder).
    pub fn plugins(mut self, plugins: impl IntoIterator<Item = Rc<dyn Plugin>>) -> Self {
        self.plugins.extend(plugins);
        self
    }

    /// Start from an empty plugin set instead of the built-in one (builder).
    pub fn without_default_plugins(mut self) -> Self {
        self.default_plugins = false;
        self
    }

    /// Order plugins, create the root node, and return the engine.
    pub fn build(self) -> Result<Engine, ConfigError> {
        let mut plugins = if self.default_plugins {
            default_plugins()
        } else {
            Vec::new()
        };
        plugins.extend(self.plugins);
        let plugins = PluginRegistry::new(plugins)?;

        let mut backend = self.backend;
        let schedule = self.config.schedule.unwrap_or_else(|| backend.schedule());
        let mut dom = Dom::new();
        let root = dom.insert(NodeData::root());
        backend.apply(
            &dom,
            &Mutation::Create {
                node: root,
                parent: None,
                kind: NodeKind::Root,
            },
        );

        tracing::debug!(
            engine = %self.config.id,
            backend = backend.name(),
            %schedule,
            plugins = ?plugins.names(),
            "engine built"
        );

        Ok(Engine {
            core: Rc::new(EngineCore {
                config: self.config,
                schedule,
                plugins,
                root,
                dom: RefCell::new(dom),
                backend: RefCell::new(backend),
                slots: RefCell::new(SlotMap::with_key()),
                root_slots: RefCell::new(Vec::new()),
                pending: RefCell::new(VecDeque::new()),
                inbox: RefCell::new(VecDeque::new()),
                handlers: RefCell::new(HashMap::new()),
                before_flush: RefCell::new(Vec::new()),
                after_flush: RefCell::new(Vec::new()),
                error_hooks: RefCell::new(Vec::new()),
                frame_tasks: RefCell::new(Vec::new()),
                retained: RefCell::new(HashSet::new()),
                paused: Cell::new(false),
                flushing: Cell::new(false),
                flush_requested: Cell::new(true),
                depth: Cell::new(0),
                hub: RefCell::new(Weak::new()),
            }),
        })
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// A cheap, clonable handle on one render engine.
#[derive(Clone)]
pub struct Engine {
    pub(crate) core: Rc<EngineCore>,
}

/// Non-owning engine handle, held by slots and cleanup callbacks.
#[derive(Clone, Default)]
pub struct WeakEngine {
    core: Weak<EngineCore>,
}

impl WeakEngine {
    pub fn upgrade(&self) -> Option<Engine> {
        self.core.upgrade().map(|core| Engine { core })
    }
}

impl Engine {
    /// Start assembling an engine for `backend`.
    pub fn builder(backend: impl Backend) -> EngineBuilder {
        EngineBuilder::new(backend)
    }

    pub fn downgrade(&self) -> WeakEngine {
        WeakEngine {
            core: Rc::downgrade(&self.core),
        }
    }

    /// Whether both handles point at the same engine.
    pub fn ptr_eq(&self, other: &Engine) -> bool {
        Rc::ptr_eq(&self.core, &other.core)
    }

    // ── Accessors ────────────────────────────────────────────────────

    pub fn id(&self) -> &str {
        &self.core.config.id
    }

    pub fn config(&self) -> &EngineConfig {
        &self.core.config
    }

    pub fn schedule(&self) -> Schedule {
        self.core.schedule
    }

    /// The main root node. Mounts without an explicit parent go here.
    pub fn root(&self) -> NodeId {
        self.core.root
    }

    /// Installed plugin names in dependency order.
    pub fn plugin_names(&self) -> Vec<&'static str> {
        self.core.plugins.names()
    }

    pub(crate) fn plugin_for(&self, tag: &str) -> Option<Rc<dyn Plugin>> {
        self.core.plugins.claim(tag).cloned()
    }

    pub fn is_paused(&self) -> bool {
        self.core.paused.get()
    }

    /// Whether a flush would have anything to do.
    pub fn needs_flush(&self) -> bool {
        self.core.flush_requested.get()
            || !self.core.inbox.borrow().is_empty()
            || !self.core.pending.borrow().is_empty()
    }

    /// Number of live slots.
    pub fn slot_count(&self) -> usize {
        self.core.slots.borrow().len()
    }

    /// Number of slots queued for the next flush.
    pub fn pending_count(&self) -> usize {
        self.core.pending.borrow().len()
    }

    /// Number of frame tasks still waiting.
    pub fn pending_frame_tasks(&self) -> usize {
        self.core.frame_tasks.borrow().len()
    }

    /// Run `f` with read access to the tree.
    pub fn with_dom<R>(&self, f: impl FnOnce(&Dom) -> R) -> R {
        f(&self.core.dom.borrow())
    }

    /// Run `f` against the backend if it is a `B`.
    pub fn with_backend<B: Backend, R>(&self, f: impl FnOnce(&B) -> R) -> Option<R> {
        let backend = self.core.backend.borrow();
        backend.as_any().downcast_ref::<B>().map(f)
    }

    /// Run `f` against the backend mutably if it is a `B`.
    pub fn with_backend_mut<B: Backend, R>(&self, f: impl FnOnce(&mut B) -> R) -> Option<R> {
        let mut backend = self.core.backend.borrow_mut();
        backend.as_any_mut().downcast_mut::<B>().map(f)
    }

    /// The hub this engine is registered with.
    pub fn hub(&self) -> Option<Hub> {
        self.core.hub.borrow().upgrade().map(Hub::from_core)
    }

    pub(crate) fn attach_hub(&self, hub: Weak<HubCore>) {
        *self.core.hub.borrow_mut() = hub;
    }

    // ── Mounting ─────────────────────────────────────────────────────

    /// Render `builder` under the main root.
    pub fn mount(&self, builder: Builder) -> Result<Slot, RenderError> {
        self.mount_at(self.core.root, builder)
    }

    /// [`mount`](Self::mount) with a closure.
    pub fn mount_with(
        &self,
        f: impl Fn(&mut Scope<'_>) -> Result<(), RenderError> + 'static,
    ) -> Result<Slot, RenderError> {
        self.mount(builder(f))
    }

    /// Render `builder` into a fresh fragment under `parent`.
    ///
    /// On failure everything the partial build created is torn down and the
    /// error is returned.
    pub fn mount_at(&self, parent: NodeId, builder: Builder) -> Result<Slot, RenderError> {
        let result = {
            let _guard = self.enter();
            let anchor = self.create_node(parent, NodeData::fragment())?;
            let id = self.insert_slot(anchor, None, builder);
            self.core.root_slots.borrow_mut().push(id);
            match self.run_slot(id) {
                Ok(()) => {
                    tracing::debug!(engine = %self.id(), slot = ?id, "mounted");
                    Ok(Slot::new(id, self.downgrade()))
                }
                Err(err) => {
                    tracing::debug!(engine = %self.id(), error = %err, "mount failed, tearing down");
                    self.dispose_slot(id);
                    self.remove_node(anchor);
                    Err(err)
                }
            }
        };
        self.settle();
        result
    }

    /// Add a parentless node, e.g. a target for portals rendered outside
    /// the main tree.
    pub fn create_layer(&self) -> NodeId {
        let node = self.core.dom.borrow_mut().insert(NodeData::root());
        self.emit(Mutation::Create {
            node,
            parent: None,
            kind: NodeKind::Root,
        });
        self.settle();
        node
    }

    // ── Scheduling ───────────────────────────────────────────────────

    /// Stop flushing. Refreshes and messages queue until [`resume`](Self::resume).
    pub fn pause(&self) {
        if !self.core.paused.replace(true) {
            tracing::debug!(engine = %self.id(), "paused");
        }
    }

    /// Resume flushing and apply the backlog immediately, in scheduled order.
    pub fn resume(&self) -> FlushStats {
        if !self.core.paused.replace(false) {
            return FlushStats::default();
        }
        tracing::debug!(engine = %self.id(), backlog = self.pending_count(), "resumed");
        if self.needs_flush() {
            self.flush()
        } else {
            FlushStats::default()
        }
    }

    /// Apply every queued message and refresh, then commit to the backend.
    ///
    /// A no-op while paused. Called re-entrantly it only marks the engine
    /// for another pass.
    pub fn flush(&self) -> FlushStats {
        let core = &self.core;
        if core.flushing.get() {
            core.flush_requested.set(true);
            return FlushStats::default();
        }
        if core.paused.get() {
            tracing::trace!(engine = %self.id(), "flush deferred while paused");
            return FlushStats::default();
        }
        core.flushing.set(true);
        core.flush_requested.set(false);

        let hooks = core.before_flush.borrow().clone();
        for hook in hooks {
            hook(self);
        }

        let mut stats = FlushStats::default();
        loop {
            if core.paused.get() {
                break;
            }
            let messages: Vec<Envelope> = core.inbox.borrow_mut().drain(..).collect();
            let slots: Vec<SlotId> = core.pending.borrow_mut().drain(..).collect();
            if messages.is_empty() && slots.is_empty() {
                break;
            }
            if stats.passes == core.config.max_flush_passes {
                tracing::warn!(
                    engine = %self.id(),
                    passes = stats.passes,
                    "flush pass limit reached, requeueing remaining work"
                );
                core.inbox.borrow_mut().extend(messages);
                core.pending.borrow_mut().extend(slots);
                break;
            }
            stats.passes += 1;

            for envelope in messages {
                stats.messages += 1;
                stats.errors += self.deliver(&envelope);
            }
            for id in slots {
                if !self.slot_alive(id) {
                    continue;
                }
                match self.refresh_slot(id, None) {
                    Ok(()) => stats.refreshes += 1,
                    Err(err) => {
                        stats.errors += 1;
                        self.report_error(&err);
                    }
                }
            }
        }

        // Mutations applied during the passes are committed below.
        core.flush_requested.set(false);
        core.backend.borrow_mut().flush(&core.dom.borrow());
        core.flushing.set(false);

        let hooks = core.after_flush.borrow().clone();
        for hook in hooks {
            hook(self);
        }

        tracing::debug!(
            engine = %self.id(),
            passes = stats.passes,
            messages = stats.messages,
            refreshes = stats.refreshes,
            errors = stats.errors,
            "flushed"
        );
        stats
    }

    // ── Hooks ────────────────────────────────────────────────────────

    /// Run `hook` after every flush has committed to the backend.
    pub fn on_flush(&self, hook: impl Fn(&Engine) + 'static) {
        self.core.after_flush.borrow_mut().push(Rc::new(hook));
    }

    /// Run `hook` at the start of every flush.
    pub fn on_before_flush(&self, hook: impl Fn(&Engine) + 'static) {
        self.core.before_flush.borrow_mut().push(Rc::new(hook));
    }

    /// Receive errors from scheduled refreshes. Without a hook they are logged.
    pub fn on_error(&self, hook: impl Fn(&RenderError) + 'static) {
        self.core.error_hooks.borrow_mut().push(Rc::new(hook));
    }

    /// Handle messages named `message_name` delivered to this engine.
    pub fn on(&self, message_name: impl Into<String>, handler: impl Fn(&Envelope, &Engine) + 'static) {
        self.core
            .handlers
            .borrow_mut()
            .entry(message_name.into())
            .or_default()
            .push(Rc::new(handler));
    }

    // ── Messaging ────────────────────────────────────────────────────

    /// Queue a message for this engine's next flush.
    pub fn post(&self, message: impl Message) {
        let envelope = Envelope::new(message, self.id());
        self.enqueue(envelope);
    }

    /// Send a message through the hub to the engine registered as `target`.
    pub fn dispatch(&self, target: &str, message: impl Message) -> Result<(), HubError> {
        let hub = self.hub().ok_or(HubError::Detached)?;
        hub.route(Envelope::new(message, target).from_sender(self.id()))
    }

    pub(crate) fn enqueue(&self, envelope: Envelope) {
        tracing::trace!(engine = %self.id(), message = envelope.name(), "message queued");
        self.core.inbox.borrow_mut().push_back(envelope);
        self.request_flush();
    }

    /// Returns the number of errors raised while handling the message.
    fn deliver(&self, envelope: &Envelope) -> usize {
        let mut errors = 0;
        if envelope.name() == Refresh::NAME {
            let roots = self.core.root_slots.borrow().clone();
            for id in roots.into_iter().filter(|&id| self.slot_alive(id)) {
                if let Err(err) = self.refresh_slot(id, None) {
                    errors += 1;
                    self.report_error(&err);
                }
            }
        }
        let handlers = self
            .core
            .handlers
            .borrow()
            .get(envelope.name())
            .cloned()
            .unwrap_or_default();
        if handlers.is_empty() && envelope.name() != Refresh::NAME {
            tracing::warn!(engine = %self.id(), message = envelope.name(), "no handler, message dropped");
        }
        for handler in handlers {
            handler(envelope, self);
        }
        errors
    }

    // ── Events ───────────────────────────────────────────────────────

    /// Deliver `event` at `target` and bubble it toward the root.
    ///
    /// Stops after the node whose handler called
    /// [`Event::stop_propagation`]. Returns whether any listener ran.
    pub fn dispatch_event(&self, target: NodeId, mut event: Event) -> bool {
        let handled = {
            let _guard = self.enter();
            let path = self.with_dom(|dom| bubble_path(dom, target));
            event.target = Some(target);
            let mut handled = false;
            for node in path {
                let handlers = self.with_dom(|dom| dom.handlers(node, &event.kind));
                if handlers.is_empty() {
                    continue;
                }
                event.current_target = Some(node);
                for handler in handlers {
                    handler(&mut event);
                    handled = true;
                }
                if event.is_propagation_stopped() {
                    break;
                }
            }
            handled
        };
        self.settle();
        handled
    }

    /// Route a pointer event to whatever the backend reports under `point`.
    pub fn dispatch_at(&self, point: Point, event: Event) -> bool {
        let hit = self.core.backend.borrow().hit_test(point);
        match hit {
            Some(node) => self.dispatch_event(node, event.with_position(point)),
            None => false,
        }
    }

    // -----------------------------------------------------------------------
    // Crate-internal: tree mutation
    // -----------------------------------------------------------------------

    fn enter(&self) -> DepthGuard<'_> {
        self.core.depth.set(self.core.depth.get() + 1);
        DepthGuard(&self.core.depth)
    }

    fn emit(&self, mutation: Mutation) {
        self.core
            .backend
            .borrow_mut()
            .apply(&self.core.dom.borrow(), &mutation);
        self.core.flush_requested.set(true);
    }

    pub(crate) fn create_node(&self, parent: NodeId, data: NodeData) -> Result<NodeId, RenderError> {
        let kind = data.kind.clone();
        let node = self
            .core
            .dom
            .borrow_mut()
            .insert_child(parent, data)
            .ok_or(RenderError::UnknownNode(parent))?;
        self.emit(Mutation::Create {
            node,
            parent: Some(parent),
            kind,
        });
        Ok(node)
    }

    /// Set an attribute, returning the value it replaced.
    pub(crate) fn set_attribute(
        &self,
        node: NodeId,
        name: &str,
        value: AttrValue,
    ) -> Result<Option<AttrValue>, RenderError> {
        let previous = {
            let mut dom = self.core.dom.borrow_mut();
            let data = dom.get_mut(node).ok_or(RenderError::UnknownNode(node))?;
            let previous = data.attr(name).cloned();
            data.set_attr(name, value.clone());
            previous
        };
        self.emit(Mutation::SetAttribute {
            node,
            name: name.to_string(),
            value,
        });
        Ok(previous)
    }

    pub(crate) fn remove_attribute(&self, node: NodeId, name: &str) {
        let removed = self
            .core
            .dom
            .borrow_mut()
            .get_mut(node)
            .and_then(|data| data.remove_attr(name));
        if removed.is_some() {
            self.emit(Mutation::RemoveAttribute {
                node,
                name: name.to_string(),
            });
        }
    }

    pub(crate) fn add_listener(
        &self,
        node: NodeId,
        event: &str,
        handler: Handler,
    ) -> Result<ListenerId, RenderError> {
        let id = self
            .core
            .dom
            .borrow_mut()
            .add_listener(node, event, handler)
            .ok_or(RenderError::UnknownNode(node))?;
        self.emit(Mutation::AddListener {
            node,
            event: event.to_string(),
        });
        Ok(id)
    }

    pub(crate) fn remove_listener(&self, id: ListenerId) {
        let removed = self.core.dom.borrow_mut().remove_listener(id);
        if let Some((node, event)) = removed {
            self.emit(Mutation::RemoveListener { node, event });
        }
    }

    /// Remove a node and its subtree. Removing a missing node is a no-op.
    pub(crate) fn remove_node(&self, node: NodeId) {
        let removed = self.core.dom.borrow_mut().remove(node);
        if removed.is_some() {
            self.emit(Mutation::Remove { node });
        }
    }

    /// Remove every child of `node` except retained ones.
    pub(crate) fn clear_children(&self, node: NodeId) {
        let removed = {
            let retained = self.core.retained.borrow();
            let mut dom = self.core.dom.borrow_mut();
            let doomed: Vec<NodeId> = dom
                .children(node)
                .iter()
                .copied()
                .filter(|child| !retained.contains(child))
                .collect();
            for &child in &doomed {
                dom.remove(child);
            }
            doomed
        };
        for child in removed {
            self.emit(Mutation::Remove { node: child });
        }
    }

    /// Keep `node` in place when its parent is cleared for a rebuild.
    pub(crate) fn retain_node(&self, node: NodeId) {
        self.core.retained.borrow_mut().insert(node);
    }

    /// Drop a retained node and its subtree.
    pub(crate) fn release_node(&self, node: NodeId) {
        self.core.retained.borrow_mut().remove(&node);
        self.remove_node(node);
    }

    // -----------------------------------------------------------------------
    // Crate-internal: frames
    // -----------------------------------------------------------------------

    /// Run `run` once `frames` animation frames have passed (at least one).
    pub(crate) fn after_frames(&self, frames: usize, run: impl FnOnce(&Engine) + 'static) {
        self.core.frame_tasks.borrow_mut().push(FrameTask {
            remaining: frames.max(1),
            run: Box::new(run),
        });
    }

    /// Count one animation frame and run the frame tasks that came due, in
    /// the order they were scheduled. Tasks wait while the engine is paused.
    /// Returns how many ran.
    pub fn advance_frame(&self) -> usize {
        if self.core.paused.get() {
            return 0;
        }
        let due = {
            let mut tasks = self.core.frame_tasks.borrow_mut();
            for task in tasks.iter_mut() {
                task.remaining -= 1;
            }
            let (due, waiting): (Vec<FrameTask>, Vec<FrameTask>) = std::mem::take(&mut *tasks)
                .into_iter()
                .partition(|task| task.remaining == 0);
            *tasks = waiting;
            due
        };
        let ran = due.len();
        if ran == 0 {
            return 0;
        }
        {
            let _guard = self.enter();
            for task in due {
                (task.run)(self);
            }
        }
        tracing::trace!(engine = %self.id(), ran, "frame tasks");
        self.settle();
        ran
    }

    // -----------------------------------------------------------------------
    // Crate-internal: slots
    // -----------------------------------------------------------------------

    pub(crate) fn insert_slot(&self, node: NodeId, parent: Option<SlotId>, builder: Builder) -> SlotId {
        let mut slots = self.core.slots.borrow_mut();
        let id = slots.insert(SlotState::new(node, parent, builder));
        if let Some(parent) = parent.and_then(|p| slots.get_mut(p)) {
            parent.children.push(id);
        }
        id
    }

    pub(crate) fn set_observer(&self, id: SlotId, observer: ObserverId) {
        if let Some(state) = self.core.slots.borrow_mut().get_mut(id) {
            state.observer = Some(observer);
        }
    }

    pub(crate) fn slot_alive(&self, id: SlotId) -> bool {
        self.core.slots.borrow().contains_key(id)
    }

    pub(crate) fn slot_node(&self, id: SlotId) -> Option<NodeId> {
        self.core.slots.borrow().get(id).map(|s| s.node)
    }

    pub(crate) fn add_cleanup(&self, id: SlotId, cleanup: Box<dyn FnOnce()>) {
        match self.core.slots.borrow_mut().get_mut(id) {
            Some(state) => state.cleanups.push(cleanup),
            None => tracing::warn!(slot = ?id, "cleanup registered on a disposed slot"),
        }
    }

    pub(crate) fn push_context(&self, id: SlotId, value: Rc<dyn Any>) {
        if let Some(state) = self.core.slots.borrow_mut().get_mut(id) {
            state.context.push(value);
        }
    }

    /// Nearest context value matching `pred`, searching `id` then its ancestors.
    pub(crate) fn find_context(
        &self,
        id: SlotId,
        pred: impl Fn(&Rc<dyn Any>) -> bool,
    ) -> Option<Rc<dyn Any>> {
        let slots = self.core.slots.borrow();
        let mut current = Some(id);
        while let Some(slot) = current.and_then(|c| slots.get(c)) {
            if let Some(found) = slot.context.iter().rev().find(|v| pred(v)) {
                return Some(found.clone());
            }
            current = slot.parent;
        }
        None
    }

    /// Run the slot's builder with its node as parent.
    pub(crate) fn run_slot(&self, id: SlotId) -> Result<(), RenderError> {
        let (node, builder, observer) = {
            let mut slots = self.core.slots.borrow_mut();
            let state = slots.get_mut(id).ok_or(RenderError::SlotDisposed)?;
            state.building = true;
            (state.node, state.builder.clone(), state.observer)
        };
        let mut scope = Scope::new(self, id, node);
        let result = reactive::with_owner(self.effect_owner(id), || match observer {
            Some(observer) => reactive::track(observer, || builder(&mut scope)),
            None => builder(&mut scope),
        });
        if let Some(state) = self.core.slots.borrow_mut().get_mut(id) {
            state.building = false;
        }
        result
    }

    /// Ties effects created during a build to the building slot.
    fn effect_owner(&self, id: SlotId) -> reactive::EffectOwner {
        let weak = self.downgrade();
        Rc::new(move |effect| {
            if let Some(engine) = weak.upgrade() {
                engine.add_cleanup(id, Box::new(move || reactive::dispose_effect(effect)));
            }
        })
    }

    /// Tear down and rebuild a slot, optionally swapping its builder.
    /// A failed build leaves the slot empty.
    pub(crate) fn refresh_slot(&self, id: SlotId, builder: Option<Builder>) -> Result<(), RenderError> {
        {
            let mut slots = self.core.slots.borrow_mut();
            let state = slots.get_mut(id).ok_or(RenderError::SlotDisposed)?;
            if state.building || state.tearing_down {
                return Err(RenderError::Reentrant);
            }
            if let Some(builder) = builder {
                state.builder = builder;
            }
        }
        let _guard = self.enter();
        tracing::debug!(engine = %self.id(), slot = ?id, "refreshing slot");
        self.teardown_contents(id);
        let result = self.run_slot(id);
        if result.is_err() {
            self.teardown_contents(id);
        }
        result
    }

    /// [`refresh_slot`](Self::refresh_slot) from outside a build or flush.
    pub(crate) fn refresh_now(&self, id: SlotId, builder: Option<Builder>) -> Result<(), RenderError> {
        let result = self.refresh_slot(id, builder);
        self.settle();
        result
    }

    /// Dispose nested slots, run this slot's cleanups newest first, drop its
    /// context, and empty its node. Refreshes of the slot issued meanwhile
    /// fail with [`RenderError::Reentrant`].
    pub(crate) fn teardown_contents(&self, id: SlotId) {
        let taken = {
            let mut slots = self.core.slots.borrow_mut();
            slots.get_mut(id).map(|state| {
                state.context.clear();
                state.tearing_down = true;
                (
                    std::mem::take(&mut state.children),
                    std::mem::take(&mut state.cleanups),
                    state.node,
                )
            })
        };
        let Some((children, cleanups, node)) = taken else {
            return;
        };
        for child in children {
            self.dispose_slot(child);
        }
        for cleanup in cleanups.into_iter().rev() {
            cleanup();
        }
        self.clear_children(node);
        if let Some(state) = self.core.slots.borrow_mut().get_mut(id) {
            state.tearing_down = false;
        }
    }

    /// Remove a slot and everything nested in it. Nodes are left to the caller.
    pub(crate) fn dispose_slot(&self, id: SlotId) {
        let Some(state) = self.core.slots.borrow_mut().remove(id) else {
            return;
        };
        if let Some(parent) = state.parent {
            if let Some(parent) = self.core.slots.borrow_mut().get_mut(parent) {
                parent.children.retain(|&c| c != id);
            }
        }
        self.core.root_slots.borrow_mut().retain(|&r| r != id);
        for child in state.children {
            self.dispose_slot(child);
        }
        for cleanup in state.cleanups.into_iter().rev() {
            cleanup();
        }
        if let Some(observer) = state.observer {
            reactive::dispose_observer(observer);
        }
    }

    pub(crate) fn unmount_slot(&self, id: SlotId) -> Result<(), RenderError> {
        let node = self.slot_node(id).ok_or(RenderError::SlotDisposed)?;
        {
            let _guard = self.enter();
            self.dispose_slot(id);
            self.remove_node(node);
        }
        tracing::debug!(engine = %self.id(), slot = ?id, "unmounted");
        self.settle();
        Ok(())
    }

    /// Queue a slot for the next flush, at most once.
    pub(crate) fn schedule_slot(&self, id: SlotId) {
        {
            let mut pending = self.core.pending.borrow_mut();
            if pending.contains(&id) {
                return;
            }
            pending.push_back(id);
        }
        tracing::trace!(engine = %self.id(), slot = ?id, "slot scheduled");
        self.request_flush();
    }

    fn request_flush(&self) {
        self.core.flush_requested.set(true);
        self.settle();
    }

    /// Flush now if this is a sync engine with nothing in progress.
    fn settle(&self) {
        let core = &self.core;
        if core.schedule.is_sync()
            && core.depth.get() == 0
            && !core.paused.get()
            && !core.flushing.get()
            && core.flush_requested.get()
        {
            self.flush();
        }
    }

    fn report_error(&self, err: &RenderError) {
        let hooks = self.core.error_hooks.borrow().clone();
        if hooks.is_empty() {
            tracing::error!(engine = %self.id(), error = %err, "unhandled render error");
            return;
        }
        for hook in hooks {
            hook(err);
        }
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("id", &self.core.config.id)
            .field("schedule", &self.core.schedule)
            .field("paused", &self.core.paused.get())
            .finish()
    }
}

// ===========================================================================
// Tests
// ===========================================================================
