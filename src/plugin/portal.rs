//! Portals: content owned by one slot but rendered under a foreign node.

use crate::dom::NodeData;
use crate::error::RenderError;
use crate::request::{tags, Request, Response};
use crate::scope::Scope;

use super::Plugin;

/// Renders children into a fragment appended to the target node. The
/// fragment is removed when the owning slot is refreshed or torn down.
#[derive(Debug, Default, Clone, Copy)]
pub struct PortalPlugin;

impl Plugin for PortalPlugin {
    fn name(&self) -> &'static str {
        "portal"
    }

    fn handles(&self) -> &[&'static str] {
        &[tags::PORTAL]
    }

    fn dependencies(&self) -> &[&'static str] {
        &["core"]
    }

    fn handle(&self, request: Request, scope: &mut Scope<'_>) -> Result<Response, RenderError> {
        let Request::Portal { target, children } = request else {
            return Err(RenderError::UnsupportedRequest {
                plugin: self.name().to_string(),
                tag: request.tag().to_string(),
            });
        };
        let engine = scope.engine();
        let anchor = engine.create_node(target, NodeData::fragment())?;
        let weak = engine.downgrade();
        scope.on_unmount(move || {
            if let Some(engine) = weak.upgrade() {
                tracing::trace!(node = ?anchor, "portal removed");
                engine.remove_node(anchor);
            }
        });
        scope.create_slot(anchor, children).map(Response::Slot)
    }
}

#[cfg(test)]
mod tests {
    use crate::backend::SsrBackend;
    use crate::engine::Engine;
    use crate::error::RenderError;
    use pretty_assertions::assert_eq;

    fn html(engine: &Engine) -> String {
        engine.with_backend(|b: &SsrBackend| b.html().to_string()).unwrap()
    }

    #[test]
    fn portal_renders_into_layer() {
        let engine = Engine::builder(SsrBackend::new()).build().unwrap();
        let layer = engine.create_layer();
        engine
            .mount_with(move |s| {
                s.element("main", move |s| {
                    s.portal(layer, |s| {
                        s.element("dialog", |s| s.text("hi"))?;
                        Ok(())
                    })?;
                    Ok(())
                })?;
                Ok(())
            })
            .unwrap();
        assert_eq!(html(&engine), "<main></main><dialog>hi</dialog>");
    }

    #[test]
    fn owner_refresh_removes_portal_content() {
        let engine = Engine::builder(SsrBackend::new()).build().unwrap();
        let layer = engine.create_layer();
        let slot = engine
            .mount_with(move |s| {
                s.portal(layer, |s| s.text("overlay"))?;
                Ok(())
            })
            .unwrap();
        assert_eq!(engine.with_dom(|dom| dom.text_content(layer)), "overlay");

        slot.refresh_with(|s| s.text("no overlay")).unwrap();
        assert_eq!(engine.with_dom(|dom| dom.children(layer).len()), 0);
        assert_eq!(html(&engine), "no overlay");
    }

    #[test]
    fn missing_target_fails() {
        let engine = Engine::builder(SsrBackend::new()).build().unwrap();
        let stale = engine.mount_with(|_| Ok(())).unwrap();
        let target = stale.node().unwrap();
        stale.unmount().unwrap();
        let err = engine
            .mount_with(move |s| s.portal(target, |_| Ok(())).map(drop))
            .unwrap_err();
        assert_eq!(err, RenderError::UnknownNode(target));
    }
}
