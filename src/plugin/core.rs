//! Element, attribute, listener and text requests.

use crate::dom::{is_valid_name, NodeData, NodeId};
use crate::error::RenderError;
use crate::request::{tags, Request, Response};
use crate::scope::Scope;

use super::Plugin;

/// Handles the four tags every tree needs.
#[derive(Debug, Default, Clone, Copy)]
pub struct CorePlugin;

impl Plugin for CorePlugin {
    fn name(&self) -> &'static str {
        "core"
    }

    fn handles(&self) -> &[&'static str] {
        &[tags::ELEMENT, tags::ATTRIBUTE, tags::EVENT_LISTENER, tags::TEXT]
    }

    fn handle(&self, request: Request, scope: &mut Scope<'_>) -> Result<Response, RenderError> {
        match request {
            Request::Element { tag, children } => {
                check_name("element", &tag)?;
                let node = scope.create_node(NodeData::element(tag))?;
                scope.create_slot(node, children).map(Response::Slot)
            }
            Request::Attribute { name, value } => {
                check_name("attribute", &name)?;
                let target = element_target(scope, tags::ATTRIBUTE)?;
                let engine = scope.engine();
                let previous = engine.set_attribute(target, &name, value)?;
                if survives_refresh(scope, target) {
                    let weak = engine.downgrade();
                    scope.on_unmount(move || {
                        let Some(engine) = weak.upgrade() else {
                            return;
                        };
                        match previous {
                            Some(value) => {
                                let _ = engine.set_attribute(target, &name, value);
                            }
                            None => engine.remove_attribute(target, &name),
                        }
                    });
                }
                Ok(Response::None)
            }
            Request::EventListener { event, handler } => {
                let target = element_target(scope, tags::EVENT_LISTENER)?;
                let engine = scope.engine();
                let id = engine.add_listener(target, &event, handler)?;
                if survives_refresh(scope, target) {
                    let weak = engine.downgrade();
                    scope.on_unmount(move || {
                        if let Some(engine) = weak.upgrade() {
                            engine.remove_listener(id);
                        }
                    });
                }
                Ok(Response::Listener(id))
            }
            Request::Text(content) => {
                scope.create_node(NodeData::text(content))?;
                Ok(Response::None)
            }
            other => Err(RenderError::UnsupportedRequest {
                plugin: self.name().to_string(),
                tag: other.tag().to_string(),
            }),
        }
    }
}

fn check_name(kind: &'static str, name: &str) -> Result<(), RenderError> {
    if is_valid_name(name) {
        Ok(())
    } else {
        Err(RenderError::InvalidName {
            kind,
            name: name.to_string(),
        })
    }
}

/// The element attributes and listeners attach to.
fn element_target(scope: &Scope<'_>, tag: &str) -> Result<NodeId, RenderError> {
    let parent = scope.parent();
    scope
        .engine()
        .with_dom(|dom| dom.nearest_element(parent))
        .ok_or_else(|| RenderError::NoElementParent { tag: tag.to_string() })
}

/// Whether `target` outlives a refresh of the scope's slot, which only
/// clears nodes strictly inside the slot's node.
fn survives_refresh(scope: &Scope<'_>, target: NodeId) -> bool {
    match scope.slot_node() {
        Some(slot_node) => !scope
            .engine()
            .with_dom(|dom| dom.is_descendant(target, slot_node)),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use crate::backend::{DomBackend, Mutation, SsrBackend};
    use crate::engine::Engine;
    use crate::error::RenderError;
    use crate::event::Event;
    use pretty_assertions::assert_eq;
    use std::cell::Cell;
    use std::rc::Rc;

    fn ssr() -> Engine {
        Engine::builder(SsrBackend::new()).build().unwrap()
    }

    fn html(engine: &Engine) -> String {
        engine.with_backend(|b: &SsrBackend| b.html().to_string()).unwrap()
    }

    #[test]
    fn element_with_attributes_and_text() {
        let engine = ssr();
        engine
            .mount_with(|s| {
                s.element("a", |s| {
                    s.attr("href", "/home")?;
                    s.attr("tabindex", 0)?;
                    s.text("Home")
                })?;
                Ok(())
            })
            .unwrap();
        assert_eq!(html(&engine), r#"<a href="/home" tabindex="0">Home</a>"#);
    }

    #[test]
    fn attribute_without_element_fails() {
        let engine = ssr();
        let err = engine.mount_with(|s| s.attr("id", "x")).unwrap_err();
        assert_eq!(err, RenderError::NoElementParent { tag: "attribute".into() });
    }

    #[test]
    fn markup_breaking_names_rejected() {
        let engine = ssr();
        let err = engine
            .mount_with(|s| s.element("div onload=x", |_| Ok(())).map(drop))
            .unwrap_err();
        assert_eq!(
            err,
            RenderError::InvalidName {
                kind: "element",
                name: "div onload=x".into(),
            }
        );
        let err = engine
            .mount_with(|s| s.element("p", |s| s.attr("x\"><script", "1")).map(drop))
            .unwrap_err();
        assert_eq!(
            err,
            RenderError::InvalidName {
                kind: "attribute",
                name: "x\"><script".into(),
            }
        );
        assert_eq!(html(&engine), "");
    }

    #[test]
    fn element_refresh_drops_old_attributes() {
        let engine = ssr();
        let slot = engine
            .mount_with(|s| {
                s.element("div", |s| s.attr("class", "old"))?;
                Ok(())
            })
            .unwrap();
        let div = engine.with_dom(|dom| dom.query_by_tag("div"))[0];
        let attr_count = engine
            .with_dom(|dom| dom.get(div).map(|d| d.attributes.len()))
            .unwrap();
        assert_eq!(attr_count, 1);

        // Refreshing the root rebuilds the div from scratch.
        slot.refresh_with(|s| {
            s.element("div", |s| s.attr("id", "new"))?;
            Ok(())
        })
        .unwrap();
        assert_eq!(html(&engine), r#"<div id="new"></div>"#);
    }

    #[test]
    fn slot_refresh_restores_attributes_on_its_own_node() {
        let engine = ssr();
        let inner = Rc::new(std::cell::RefCell::new(None));
        let inner_c = inner.clone();
        engine
            .mount_with(move |s| {
                let slot = s.element("div", |s| s.attr("class", "a"))?;
                *inner_c.borrow_mut() = Some(slot);
                Ok(())
            })
            .unwrap();
        let div = inner.borrow().clone().unwrap();
        div.refresh_with(|s| s.attr("title", "t")).unwrap();
        assert_eq!(html(&engine), r#"<div title="t"></div>"#);
        div.refresh_with(|s| s.text("plain")).unwrap();
        assert_eq!(html(&engine), "<div>plain</div>");
    }

    #[test]
    fn listeners_replaced_on_refresh() {
        let engine = ssr();
        let hits = Rc::new(Cell::new(0));
        let hits_c = hits.clone();
        let slot = engine
            .mount_with(move |s| {
                let hits_c = hits_c.clone();
                s.element("button", move |s| {
                    let hits_c = hits_c.clone();
                    s.on("click", move |_: &mut Event| hits_c.set(hits_c.get() + 1))?;
                    Ok(())
                })?;
                Ok(())
            })
            .unwrap();
        for _ in 0..3 {
            slot.rerender().unwrap();
        }
        assert_eq!(engine.with_dom(|dom| dom.listener_count()), 1);
        let button = engine.with_dom(|dom| dom.query_by_tag("button"))[0];
        engine.dispatch_event(button, Event::new("click"));
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn mutations_reach_the_backend() {
        let engine = Engine::builder(DomBackend::new()).build().unwrap();
        engine
            .mount_with(|s| {
                s.element("p", |s| s.text("x"))?;
                Ok(())
            })
            .unwrap();
        let kinds: Vec<&'static str> = engine
            .with_backend(|b: &DomBackend| {
                b.staged()
                    .iter()
                    .map(|m| match m {
                        Mutation::Create { .. } => "create",
                        Mutation::SetAttribute { .. } => "set",
                        Mutation::RemoveAttribute { .. } => "unset",
                        Mutation::AddListener { .. } => "listen",
                        Mutation::RemoveListener { .. } => "unlisten",
                        Mutation::Remove { .. } => "remove",
                    })
                    .collect()
            })
            .unwrap();
        // root, mount anchor, <p>, text
        assert_eq!(kinds, vec!["create"; 4]);
    }
}
