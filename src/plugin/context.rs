//! Typed context values scoped to slots.

use crate::error::RenderError;
use crate::request::{tags, Request, Response};
use crate::scope::Scope;

use super::Plugin;

/// `provide` stores a value on the current slot; `inject` returns the nearest
/// value of the requested type from the current slot upward, or
/// [`Response::None`] when nothing matches.
#[derive(Debug, Default, Clone, Copy)]
pub struct ContextPlugin;

impl Plugin for ContextPlugin {
    fn name(&self) -> &'static str {
        "context"
    }

    fn handles(&self) -> &[&'static str] {
        &[tags::PROVIDE, tags::INJECT]
    }

    fn handle(&self, request: Request, scope: &mut Scope<'_>) -> Result<Response, RenderError> {
        match request {
            Request::Provide(value) => {
                scope.push_context(value);
                Ok(Response::None)
            }
            Request::Inject(type_id) => Ok(scope
                .lookup_context(type_id)
                .map_or(Response::None, Response::Value)),
            other => Err(RenderError::UnsupportedRequest {
                plugin: self.name().to_string(),
                tag: other.tag().to_string(),
            }),
        }
    }
}
