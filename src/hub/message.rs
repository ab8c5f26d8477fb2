//! Message trait, envelope, and built-in messages.
//!
//! The [`Message`] trait is object-safe and supports downcasting via `Any`.
//! [`Envelope`] wraps a boxed message with routing metadata (sender and
//! target engine ids). Engines look handlers up by [`Message::message_name`].
//! Built-in messages: [`Refresh`], [`Custom`].

use std::any::Any;

// ---------------------------------------------------------------------------
// Message trait
// ---------------------------------------------------------------------------

/// Object-safe message trait.
///
/// All messages must implement `as_any` for downcasting and `message_name`
/// for handler routing and logging.
pub trait Message: 'static {
    /// Upcast to `&dyn Any` for downcasting.
    fn as_any(&self) -> &dyn Any;

    /// Name handlers subscribe to with [`Engine::on`](crate::engine::Engine::on).
    fn message_name(&self) -> &str;
}

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

/// Wraps a boxed message with routing metadata.
pub struct Envelope {
    /// The message payload.
    pub message: Box<dyn Message>,
    /// Id of the sending engine, if sent from one.
    pub sender: Option<String>,
    /// Id of the engine the message is addressed to.
    pub target: String,
}

impl Envelope {
    /// Create an envelope with no sender.
    pub fn new(message: impl Message, target: impl Into<String>) -> Self {
        Self {
            message: Box::new(message),
            sender: None,
            target: target.into(),
        }
    }

    /// Record the sending engine (builder).
    pub fn from_sender(mut self, sender: impl Into<String>) -> Self {
        self.sender = Some(sender.into());
        self
    }

    /// The routing name of the wrapped message.
    pub fn name(&self) -> &str {
        self.message.message_name()
    }

    /// Attempt to downcast the message to a concrete type.
    pub fn downcast_ref<T: Message>(&self) -> Option<&T> {
        self.message.as_any().downcast_ref::<T>()
    }
}

impl std::fmt::Debug for Envelope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Envelope")
            .field("message_name", &self.message.message_name())
            .field("sender", &self.sender)
            .field("target", &self.target)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Built-in messages
// ---------------------------------------------------------------------------

/// Re-run every mounted root on the receiving engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Refresh;

impl Refresh {
    pub const NAME: &'static str = "Refresh";
}

impl Message for Refresh {
    fn as_any(&self) -> &dyn Any {
        self
    }
    fn message_name(&self) -> &str {
        Self::NAME
    }
}

/// Named message without a payload. Routed by its name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Custom(pub String);

impl Custom {
    /// Create a new custom message.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }
}

impl Message for Custom {
    fn as_any(&self) -> &dyn Any {
        self
    }
    fn message_name(&self) -> &str {
        &self.0
    }
}

// ===========================================================================
// Tests
// ===========================================================================
