//! Error types: render, configuration, hub.
//!
//! [`RenderError`] is what builders and plugins return while materializing a
//! tree. [`ConfigError`] is raised once, when an engine's plugin set is
//! assembled. [`HubError`] covers cross-engine message routing.

use crate::dom::NodeId;

/// Errors raised while building or refreshing a subtree.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RenderError {
    /// No installed plugin claims the request's tag.
    #[error("no plugin claims request tag `{tag}`")]
    UnclaimedRequest { tag: String },
    /// A plugin answered with a response of the wrong shape for its tag.
    #[error("plugin for `{tag}` returned an unexpected response")]
    UnexpectedResponse { tag: String },
    /// The plugin received a request it declared but cannot process.
    #[error("plugin `{plugin}` cannot handle request `{tag}`")]
    UnsupportedRequest { plugin: String, tag: String },
    /// The slot was torn down (or its engine dropped) before the call.
    #[error("slot has been disposed")]
    SlotDisposed,
    /// A slot was refreshed from inside its own build or teardown.
    #[error("slot is already building")]
    Reentrant,
    /// A node referenced by a request no longer exists.
    #[error("node {0:?} does not exist")]
    UnknownNode(NodeId),
    /// The request needs an element to attach to but none encloses the scope.
    #[error("`{tag}` requires an enclosing element")]
    NoElementParent { tag: String },
    /// An element tag or attribute name that cannot be written as markup.
    #[error("invalid {kind} name `{name}`")]
    InvalidName { kind: &'static str, name: String },
    /// Error raised by application code inside a builder.
    #[error("{0}")]
    Component(String),
}

impl RenderError {
    /// Convenience constructor for application-level failures.
    pub fn component(message: impl Into<String>) -> Self {
        Self::Component(message.into())
    }
}

/// Errors detected while assembling an engine's plugin set.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("plugin `{0}` registered twice")]
    DuplicatePlugin(String),
    #[error("tag `{tag}` claimed by both `{first}` and `{second}`")]
    DuplicateTag {
        tag: String,
        first: String,
        second: String,
    },
    #[error("plugin `{plugin}` depends on missing plugin `{dependency}`")]
    MissingDependency { plugin: String, dependency: String },
    #[error("plugin dependency cycle among: {}", .0.join(", "))]
    DependencyCycle(Vec<String>),
}

/// Errors from hub registration and dispatch.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HubError {
    #[error("no engine registered with id `{0}`")]
    UnknownEngine(String),
    #[error("engine id `{0}` is already registered")]
    DuplicateEngine(String),
    #[error("engine is not attached to a hub")]
    Detached,
}
