//! Error boundaries.

use crate::dom::NodeData;
use crate::error::RenderError;
use crate::request::{builder, tags, Request, Response};
use crate::scope::Scope;

use super::Plugin;

/// Builds children in their own slot. If they fail, whatever they created is
/// torn down and the fallback renders in its place.
///
/// Only failures raised while the boundary's slot builds are caught. A nested
/// reactive block that fails on a later flush reports to
/// [`Engine::on_error`](crate::engine::Engine::on_error) instead.
#[derive(Debug, Default, Clone, Copy)]
pub struct BoundaryPlugin;

impl Plugin for BoundaryPlugin {
    fn name(&self) -> &'static str {
        "boundary"
    }

    fn handles(&self) -> &[&'static str] {
        &[tags::BOUNDARY]
    }

    fn dependencies(&self) -> &[&'static str] {
        &["core"]
    }

    fn handle(&self, request: Request, scope: &mut Scope<'_>) -> Result<Response, RenderError> {
        let Request::Boundary { children, fallback } = request else {
            return Err(RenderError::UnsupportedRequest {
                plugin: self.name().to_string(),
                tag: request.tag().to_string(),
            });
        };
        let anchor = scope.create_node(NodeData::fragment())?;
        let guarded = builder(move |scope| match children(scope) {
            Ok(()) => Ok(()),
            Err(err) => {
                tracing::debug!(error = %err, "boundary caught render error");
                scope.reset();
                fallback(scope, &err)
            }
        });
        scope.create_slot(anchor, guarded).map(Response::Slot)
    }
}

#[cfg(test)]
mod tests {
    use crate::backend::{DomBackend, SsrBackend};
    use crate::engine::Engine;
    use crate::error::RenderError;
    use crate::reactive::create_signal;
    use pretty_assertions::assert_eq;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn html(engine: &Engine) -> String {
        engine.with_backend(|b: &SsrBackend| b.html().to_string()).unwrap()
    }

    #[test]
    fn fallback_replaces_partial_children() {
        let engine = Engine::builder(SsrBackend::new()).build().unwrap();
        engine
            .mount_with(|s| {
                s.text("before ")?;
                s.boundary(
                    |s| {
                        s.element("b", |s| s.text("half"))?;
                        Err(RenderError::component("boom"))
                    },
                    |s, err| s.text(format!("failed: {err}")),
                )?;
                s.text(" after")
            })
            .unwrap();
        assert_eq!(html(&engine), "before failed: boom after");
    }

    #[test]
    fn fallback_errors_propagate() {
        let engine = Engine::builder(SsrBackend::new()).build().unwrap();
        let err = engine
            .mount_with(|s| {
                s.boundary(
                    |_| Err(RenderError::component("first")),
                    |_, _| Err(RenderError::component("second")),
                )?;
                Ok(())
            })
            .unwrap_err();
        assert_eq!(err, RenderError::component("second"));
    }

    #[test]
    fn unclaimed_tag_inside_boundary_is_caught() {
        let engine = Engine::builder(SsrBackend::new()).build().unwrap();
        engine
            .mount_with(|s| {
                s.boundary(
                    |s| s.request(crate::request::Request::custom("video", ())).map(drop),
                    |s, _| s.text("unsupported"),
                )?;
                Ok(())
            })
            .unwrap();
        assert_eq!(html(&engine), "unsupported");
    }

    #[test]
    fn later_reactive_failure_goes_to_on_error() {
        let engine = Engine::builder(DomBackend::new()).build().unwrap();
        let errors = Rc::new(RefCell::new(Vec::new()));
        let errors_c = errors.clone();
        engine.on_error(move |e| errors_c.borrow_mut().push(e.to_string()));
        let (broken, set_broken) = create_signal(false);
        engine
            .mount_with(move |s| {
                s.boundary(
                    move |s| {
                        s.reactive(move |s| {
                            if broken.get() {
                                return Err(RenderError::component("late"));
                            }
                            s.text("ok")
                        })?;
                        Ok(())
                    },
                    |s, _| s.text("fallback"),
                )?;
                Ok(())
            })
            .unwrap();
        engine.flush();
        set_broken.set(true);
        engine.flush();
        assert_eq!(*errors.borrow(), vec!["late".to_string()]);
        let text = engine.with_dom(|dom| dom.text_content(dom.root().unwrap()));
        assert_eq!(text, "");
    }
}
