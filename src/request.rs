//! Requests and responses: the vocabulary components speak to the engine.
//!
//! A component is a [`Builder`]. Every call to
//! [`Scope::request`](crate::scope::Scope::request) hands one [`Request`] to
//! the plugin claiming its tag and resumes the builder with that plugin's
//! [`Response`].

use std::any::{Any, TypeId};
use std::fmt;
use std::rc::Rc;

use crate::dom::{AttrValue, ListenerId, NodeId};
use crate::error::RenderError;
use crate::event::Handler;
use crate::scope::Scope;
use crate::slot::Slot;

/// A replayable component body.
pub type Builder = Rc<dyn Fn(&mut Scope<'_>) -> Result<(), RenderError>>;

/// Renders in place of children that failed to build.
pub type Fallback = Rc<dyn Fn(&mut Scope<'_>, &RenderError) -> Result<(), RenderError>>;

/// Wrap a closure as a [`Builder`].
pub fn builder(f: impl Fn(&mut Scope<'_>) -> Result<(), RenderError> + 'static) -> Builder {
    Rc::new(f)
}

/// Built-in request tags.
pub mod tags {
    pub const ELEMENT: &str = "element";
    pub const ATTRIBUTE: &str = "attribute";
    pub const EVENT_LISTENER: &str = "eventlistener";
    pub const TEXT: &str = "text";
    pub const PORTAL: &str = "portal";
    pub const REACTIVE: &str = "reactive";
    pub const BOUNDARY: &str = "boundary";
    pub const PROVIDE: &str = "provide";
    pub const INJECT: &str = "inject";
}

// ---------------------------------------------------------------------------
// Request
// ---------------------------------------------------------------------------

/// One declarative effect a component wants applied.
#[derive(Clone)]
pub enum Request {
    /// Create an element under the current parent and build its children.
    Element { tag: String, children: Builder },
    /// Set an attribute on the nearest enclosing element.
    Attribute { name: String, value: AttrValue },
    /// Attach a listener to the nearest enclosing element.
    EventListener { event: String, handler: Handler },
    /// Emit a text node.
    Text(String),
    /// Render `children` under `target`, a node outside the current subtree.
    Portal { target: NodeId, children: Builder },
    /// Render `children` as a block that refreshes when signals it reads change.
    Reactive(Builder),
    /// Render `children`, replacing them with `fallback` if they fail to build.
    Boundary { children: Builder, fallback: Fallback },
    /// Make a value available to descendants, keyed by its type.
    Provide(Rc<dyn Any>),
    /// Look up the nearest provided value of the given type.
    Inject(TypeId),
    /// Request for a third-party plugin.
    Custom { tag: &'static str, payload: Rc<dyn Any> },
}

impl Request {
    /// The tag used to route this request to a plugin.
    pub fn tag(&self) -> &'static str {
        match self {
            Request::Element { .. } => tags::ELEMENT,
            Request::Attribute { .. } => tags::ATTRIBUTE,
            Request::EventListener { .. } => tags::EVENT_LISTENER,
            Request::Text(_) => tags::TEXT,
            Request::Portal { .. } => tags::PORTAL,
            Request::Reactive(_) => tags::REACTIVE,
            Request::Boundary { .. } => tags::BOUNDARY,
            Request::Provide(_) => tags::PROVIDE,
            Request::Inject(_) => tags::INJECT,
            Request::Custom { tag, .. } => *tag,
        }
    }

    pub fn element(
        tag: impl Into<String>,
        children: impl Fn(&mut Scope<'_>) -> Result<(), RenderError> + 'static,
    ) -> Self {
        Request::Element {
            tag: tag.into(),
            children: builder(children),
        }
    }

    pub fn attribute(name: impl Into<String>, value: impl Into<AttrValue>) -> Self {
        Request::Attribute {
            name: name.into(),
            value: value.into(),
        }
    }

    pub fn text(content: impl Into<String>) -> Self {
        Request::Text(content.into())
    }

    pub fn custom<T: 'static>(tag: &'static str, payload: T) -> Self {
        Request::Custom {
            tag,
            payload: Rc::new(payload),
        }
    }
}

impl fmt::Debug for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Request::Element { tag, .. } => f.debug_struct("Element").field("tag", tag).finish(),
            Request::Attribute { name, value } => f
                .debug_struct("Attribute")
                .field("name", name)
                .field("value", value)
                .finish(),
            Request::EventListener { event, .. } => {
                f.debug_struct("EventListener").field("event", event).finish()
            }
            Request::Text(text) => f.debug_tuple("Text").field(text).finish(),
            Request::Portal { target, .. } => {
                f.debug_struct("Portal").field("target", target).finish()
            }
            other => f.debug_tuple(other.tag()).finish(),
        }
    }
}

// ---------------------------------------------------------------------------
// Response
// ---------------------------------------------------------------------------

/// What a plugin hands back to the builder that issued a request.
#[derive(Clone, Default)]
pub enum Response {
    #[default]
    None,
    /// A refreshable handle on the subtree the request created.
    Slot(Slot),
    /// A computed value, e.g. an injected context value.
    Value(Rc<dyn Any>),
    /// The listener a request registered.
    Listener(ListenerId),
}

impl Response {
    pub fn into_slot(self) -> Option<Slot> {
        match self {
            Response::Slot(slot) => Some(slot),
            _ => None,
        }
    }

    pub fn into_value(self) -> Option<Rc<dyn Any>> {
        match self {
            Response::Value(value) => Some(value),
            _ => None,
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Response::None)
    }
}

impl fmt::Debug for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Response::None => f.write_str("None"),
            Response::Slot(slot) => f.debug_tuple("Slot").field(slot).finish(),
            Response::Value(_) => f.write_str("Value(..)"),
            Response::Listener(id) => f.debug_tuple("Listener").field(id).finish(),
        }
    }
}
