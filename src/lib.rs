//! # sprig
//!
//! A builder-based UI component framework with a pluggable render engine.
//!
//! Components are closures that issue declarative [`request`]s (`element`,
//! `attribute`, `text`, ...) through a [`Scope`](scope::Scope). An
//! [`Engine`](engine::Engine) routes each request to the [`plugin`] claiming
//! its tag, keeps the resulting tree in a slotmap-backed [`dom`], and reports
//! every change to a [`backend`]: a DOM patch log, a Canvas2D display list, or
//! server-side HTML. Subtrees are mounted in [`slot`]s that can be refreshed
//! in place, either directly or when the signals a reactive block read change.
//! Several engines can share a [`hub`] to exchange messages and be flushed on
//! their own schedules.
//!
//! ## Core Systems
//!
//! - **[`request`]**: Requests, responses, and the `Builder` type
//! - **[`scope`]**: The render context handed to builders and plugins
//! - **[`plugin`]**: Plugin trait, dependency-ordered registry, built-in plugins
//! - **[`engine`]**: Mounting, slots, scheduling, flush loop, event dispatch
//! - **[`slot`]**: Refreshable mount points
//! - **[`backend`]**: DOM, canvas and SSR render targets
//! - **[`dom`]**: Slotmap-backed render tree with listeners and queries
//! - **[`event`]**: Events and bubbling
//! - **[`reactive`]**: Signals, effects, memos (Leptos-style auto-tracking)
//! - **[`hub`]**: Engine registry, messaging, frame driving
//! - **[`router`]**: Path routing on reactive blocks
//! - **[`transition`]**: Frame-counted enter and leave phases
//! - **[`testing`]**: Headless pilot and snapshot helpers
//! - **[`geometry`]**: Point, Size, Rect for canvas coordinates
//!
//! ## Example
//!
//! ```ignore
//! use sprig::backend::SsrBackend;
//! use sprig::engine::Engine;
//! use sprig::reactive::create_signal;
//!
//! let engine = Engine::builder(SsrBackend::new()).build()?;
//! let (count, set_count) = create_signal(0);
//! engine.mount_with(move |s| {
//!     s.element("p", move |s| {
//!         s.reactive(move |s| s.text(format!("count: {}", count.get())))?;
//!         Ok(())
//!     })?;
//!     Ok(())
//! })?;
//! set_count.set(1);
//! ```

// Foundation
pub mod error;
pub mod geometry;

// Tree and events
pub mod dom;
pub mod event;

// Reactivity
pub mod reactive;

// Rendering
pub mod backend;
pub mod engine;
pub mod plugin;
pub mod request;
pub mod scope;
pub mod slot;

// Coordination
pub mod hub;
pub mod router;
pub mod transition;

// Test helpers
pub mod testing;

pub use engine::{Engine, EngineBuilder, EngineConfig, Schedule};
pub use error::{ConfigError, HubError, RenderError};
pub use hub::{Hub, HubConfig};
pub use request::{builder, Builder, Request, Response};
pub use scope::Scope;
pub use slot::Slot;

// Proc macros (feature-gated)
#[cfg(feature = "macros")]
pub use sprig_macros::view;
