//! Reactive blocks: slots that rebuild when the signals they read change.
//!
//! The block's builder runs under a dedicated observer, so every signal read
//! during a build subscribes the block. A write schedules the block's slot on
//! its engine; the engine's pending queue keeps it to one refresh per flush.

use crate::dom::NodeData;
use crate::error::RenderError;
use crate::reactive::create_observer;
use crate::request::{tags, Request, Response};
use crate::scope::Scope;
use crate::slot::Slot;

use super::Plugin;

#[derive(Debug, Default, Clone, Copy)]
pub struct ReactivePlugin;

impl Plugin for ReactivePlugin {
    fn name(&self) -> &'static str {
        "reactive"
    }

    fn handles(&self) -> &[&'static str] {
        &[tags::REACTIVE]
    }

    fn dependencies(&self) -> &[&'static str] {
        &["core"]
    }

    fn handle(&self, request: Request, scope: &mut Scope<'_>) -> Result<Response, RenderError> {
        let Request::Reactive(children) = request else {
            return Err(RenderError::UnsupportedRequest {
                plugin: self.name().to_string(),
                tag: request.tag().to_string(),
            });
        };
        let anchor = scope.create_node(NodeData::fragment())?;
        let engine = scope.engine();
        let id = engine.insert_slot(anchor, Some(scope.slot_id()), children);

        let weak = engine.downgrade();
        let observer = create_observer(move || {
            if let Some(engine) = weak.upgrade() {
                if engine.slot_alive(id) {
                    engine.schedule_slot(id);
                }
            }
        });
        engine.set_observer(id, observer);
        engine.run_slot(id)?;
        Ok(Response::Slot(Slot::new(id, engine.downgrade())))
    }
}
