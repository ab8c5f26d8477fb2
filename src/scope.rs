//! The render context handed to builders and plugins.
//!
//! A [`Scope`] knows the node new children go under, the slot that owns
//! whatever gets created, and the engine. Builders mostly use the typed
//! shorthands (`element`, `attr`, `on`, `text`, ...), each of which is one
//! [`Request`]. Plugins use the lower-level helpers (`create_node`,
//! `create_slot`, `process_children`, `on_unmount`).

use std::any::{Any, TypeId};
use std::rc::Rc;

use crate::dom::{AttrValue, ListenerId, NodeData, NodeId};
use crate::engine::Engine;
use crate::error::RenderError;
use crate::event::{Event, Handler};
use crate::request::{builder, Builder, Request, Response};
use crate::slot::{Slot, SlotId};

/// Render context for one build step.
pub struct Scope<'a> {
    engine: &'a Engine,
    slot: SlotId,
    parent: NodeId,
}

impl<'a> Scope<'a> {
    pub(crate) fn new(engine: &'a Engine, slot: SlotId, parent: NodeId) -> Self {
        Self { engine, slot, parent }
    }

    // -----------------------------------------------------------------------
    // Requests
    // -----------------------------------------------------------------------

    /// Hand `request` to the plugin claiming its tag and return its response.
    pub fn request(&mut self, request: Request) -> Result<Response, RenderError> {
        let tag = request.tag();
        let Some(plugin) = self.engine.plugin_for(tag) else {
            return Err(RenderError::UnclaimedRequest { tag: tag.to_string() });
        };
        tracing::trace!(tag, plugin = plugin.name(), ?request, "request");
        plugin.handle(request, self)
    }

    /// Issue a lazily produced sequence of requests, stopping at the first error.
    pub fn extend(
        &mut self,
        requests: impl IntoIterator<Item = Request>,
    ) -> Result<Vec<Response>, RenderError> {
        requests.into_iter().map(|r| self.request(r)).collect()
    }

    /// Run another builder in this scope.
    pub fn render(&mut self, builder: &Builder) -> Result<(), RenderError> {
        builder(self)
    }

    pub fn element(
        &mut self,
        tag: impl Into<String>,
        children: impl Fn(&mut Scope<'_>) -> Result<(), RenderError> + 'static,
    ) -> Result<Slot, RenderError> {
        let response = self.request(Request::element(tag, children))?;
        expect_slot(response, "element")
    }

    pub fn attr(&mut self, name: impl Into<String>, value: impl Into<AttrValue>) -> Result<(), RenderError> {
        self.request(Request::attribute(name, value)).map(drop)
    }

    pub fn on(
        &mut self,
        event: impl Into<String>,
        handler: impl Fn(&mut Event) + 'static,
    ) -> Result<ListenerId, RenderError> {
        self.listen(event, Rc::new(handler))
    }

    /// [`on`](Self::on) with a shared handler.
    pub fn listen(&mut self, event: impl Into<String>, handler: Handler) -> Result<ListenerId, RenderError> {
        let response = self.request(Request::EventListener {
            event: event.into(),
            handler,
        })?;
        match response {
            Response::Listener(id) => Ok(id),
            _ => Err(RenderError::UnexpectedResponse {
                tag: "eventlistener".into(),
            }),
        }
    }

    pub fn text(&mut self, content: impl Into<String>) -> Result<(), RenderError> {
        self.request(Request::text(content)).map(drop)
    }

    /// Render `children` under `target`; torn down with this scope's slot.
    pub fn portal(
        &mut self,
        target: NodeId,
        children: impl Fn(&mut Scope<'_>) -> Result<(), RenderError> + 'static,
    ) -> Result<Slot, RenderError> {
        let response = self.request(Request::Portal {
            target,
            children: builder(children),
        })?;
        expect_slot(response, "portal")
    }

    /// Render `children` as a block that refreshes when signals it reads change.
    pub fn reactive(
        &mut self,
        children: impl Fn(&mut Scope<'_>) -> Result<(), RenderError> + 'static,
    ) -> Result<Slot, RenderError> {
        let response = self.request(Request::Reactive(builder(children)))?;
        expect_slot(response, "reactive")
    }

    /// Render `children`, or `fallback` if they fail to build.
    pub fn boundary(
        &mut self,
        children: impl Fn(&mut Scope<'_>) -> Result<(), RenderError> + 'static,
        fallback: impl Fn(&mut Scope<'_>, &RenderError) -> Result<(), RenderError> + 'static,
    ) -> Result<Slot, RenderError> {
        let response = self.request(Request::Boundary {
            children: builder(children),
            fallback: Rc::new(fallback),
        })?;
        expect_slot(response, "boundary")
    }

    /// Make `value` visible to [`inject`](Self::inject) in this slot and below.
    pub fn provide<T: 'static>(&mut self, value: T) -> Result<(), RenderError> {
        self.request(Request::Provide(Rc::new(value))).map(drop)
    }

    /// The nearest value of type `T` provided here or in an enclosing slot.
    pub fn inject<T: 'static>(&mut self) -> Result<Option<Rc<T>>, RenderError> {
        let response = self.request(Request::Inject(TypeId::of::<T>()))?;
        Ok(response.into_value().and_then(|v| v.downcast::<T>().ok()))
    }

    // -----------------------------------------------------------------------
    // Plugin helpers
    // -----------------------------------------------------------------------

    pub fn engine(&self) -> &'a Engine {
        self.engine
    }

    /// The node new children are created under.
    pub fn parent(&self) -> NodeId {
        self.parent
    }

    pub fn slot_id(&self) -> SlotId {
        self.slot
    }

    /// Handle on the slot that owns this scope.
    pub fn slot(&self) -> Slot {
        Slot::new(self.slot, self.engine.downgrade())
    }

    /// The node bound to this scope's slot.
    pub fn slot_node(&self) -> Option<NodeId> {
        self.engine.slot_node(self.slot)
    }

    /// Create a node under the current parent.
    pub fn create_node(&mut self, data: NodeData) -> Result<NodeId, RenderError> {
        self.engine.create_node(self.parent, data)
    }

    /// Bind a new slot to `node`, nested in this scope's slot, and build it.
    pub fn create_slot(&mut self, node: NodeId, builder: Builder) -> Result<Slot, RenderError> {
        let id = self.engine.insert_slot(node, Some(self.slot), builder);
        self.engine.run_slot(id)?;
        Ok(Slot::new(id, self.engine.downgrade()))
    }

    /// Run `builder` with `node` as parent, in this scope's slot.
    pub fn process_children(&mut self, node: NodeId, builder: &Builder) -> Result<(), RenderError> {
        let mut child = Scope::new(self.engine, self.slot, node);
        builder(&mut child)
    }

    /// Remove every child of `node`.
    pub fn clear_children(&mut self, node: NodeId) {
        self.engine.clear_children(node);
    }

    /// Run `callback` when this scope's slot is refreshed or torn down.
    pub fn on_unmount(&mut self, callback: impl FnOnce() + 'static) {
        self.engine.add_cleanup(self.slot, Box::new(callback));
    }

    /// Store a context value on this scope's slot.
    pub fn push_context(&mut self, value: Rc<dyn Any>) {
        self.engine.push_context(self.slot, value);
    }

    /// Nearest context value of type `type_id`, from this slot upward.
    pub fn lookup_context(&self, type_id: TypeId) -> Option<Rc<dyn Any>> {
        self.engine
            .find_context(self.slot, |value| Any::type_id(&**value) == type_id)
    }

    /// Tear down everything this scope's slot has built so far.
    pub(crate) fn reset(&mut self) {
        self.engine.teardown_contents(self.slot);
    }
}

fn expect_slot(response: Response, tag: &str) -> Result<Slot, RenderError> {
    response
        .into_slot()
        .ok_or_else(|| RenderError::UnexpectedResponse { tag: tag.to_string() })
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::SsrBackend;
    use std::cell::RefCell;

    fn engine() -> Engine {
        Engine::builder(SsrBackend::new()).build().unwrap()
    }

    fn html(engine: &Engine) -> String {
        engine.with_backend(|b: &SsrBackend| b.html().to_string()).unwrap()
    }

    #[test]
    fn extend_feeds_requests_in_order() {
        let engine = engine();
        engine
            .mount_with(|s| {
                let words = ["a", "b", "c"].into_iter().map(Request::text);
                let responses = s.extend(words)?;
                assert!(responses.iter().all(Response::is_none));
                Ok(())
            })
            .unwrap();
        assert_eq!(html(&engine), "abc");
    }

    #[test]
    fn extend_stops_at_first_error() {
        let engine = engine();
        let reached = Rc::new(RefCell::new(false));
        let reached_c = reached.clone();
        let err = engine
            .mount_with(move |s| {
                let reached_c = reached_c.clone();
                let requests = vec![Request::text("ok"), Request::custom("nope", ())]
                    .into_iter()
                    .chain(std::iter::once_with(move || {
                        *reached_c.borrow_mut() = true;
                        Request::text("never")
                    }));
                s.extend(requests).map(drop)
            })
            .unwrap_err();
        assert_eq!(err, RenderError::UnclaimedRequest { tag: "nope".into() });
        assert!(!*reached.borrow());
    }

    #[test]
    fn render_reuses_builders() {
        let engine = engine();
        let item = builder(|s| s.element("li", |s| s.text("x")).map(drop));
        engine
            .mount_with(move |s| {
                s.render(&item)?;
                s.render(&item)
            })
            .unwrap();
        assert_eq!(html(&engine), "<li>x</li><li>x</li>");
    }

    #[test]
    fn on_unmount_runs_on_refresh() {
        let engine = engine();
        let log = Rc::new(RefCell::new(Vec::new()));
        let log_c = log.clone();
        let slot = engine
            .mount_with(move |s| {
                let log_c = log_c.clone();
                s.on_unmount(move || log_c.borrow_mut().push("gone"));
                Ok(())
            })
            .unwrap();
        assert!(log.borrow().is_empty());
        slot.rerender().unwrap();
        assert_eq!(*log.borrow(), vec!["gone"]);
    }

    #[test]
    fn process_children_builds_under_node() {
        let engine = engine();
        engine
            .mount_with(|s| {
                let node = s.create_node(NodeData::element("ul"))?;
                s.process_children(node, &builder(|s| s.element("li", |_| Ok(())).map(drop)))
            })
            .unwrap();
        assert_eq!(html(&engine), "<ul><li></li></ul>");
    }
}
