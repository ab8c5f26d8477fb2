//! The hub: engines addressed by id, plus the loop that drives their flushes.
//!
//! Engines registered on one hub stay independent; the hub only routes
//! messages into their inboxes and decides when each one flushes:
//!
//! - [`Hub::run_microtasks`] flushes microtask engines until they settle;
//! - [`Hub::tick_frame`] additionally flushes animation-frame engines once;
//! - [`Hub::drive`] ticks frames on a tokio interval.

pub mod message;

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use crate::engine::{Engine, Schedule};
use crate::error::HubError;

use self::message::{Envelope, Message};

/// Passes [`Hub::run_microtasks`] makes before giving up on engines that
/// keep rescheduling each other.
const MAX_MICROTASK_PASSES: usize = 64;

// ---------------------------------------------------------------------------
// HubConfig
// ---------------------------------------------------------------------------

/// Configuration for a hub.
#[derive(Debug, Clone, PartialEq)]
pub struct HubConfig {
    /// Time between frames in [`Hub::drive`].
    pub frame_interval: Duration,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            frame_interval: Duration::from_millis(16),
        }
    }
}

impl HubConfig {
    /// Create a new default config.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the frame interval (builder).
    pub fn with_frame_interval(mut self, interval: Duration) -> Self {
        self.frame_interval = interval;
        self
    }

    /// Set the frame interval from a target FPS (builder).
    pub fn with_fps(mut self, fps: u32) -> Self {
        self.frame_interval = Duration::from_secs(1) / fps.max(1);
        self
    }
}

// ---------------------------------------------------------------------------
// Hub
// ---------------------------------------------------------------------------

pub(crate) struct HubCore {
    config: HubConfig,
    /// Registration order is flush order.
    engines: RefCell<Vec<Engine>>,
}

/// Registry of engines by id.
#[derive(Clone)]
pub struct Hub {
    core: Rc<HubCore>,
}

impl Default for Hub {
    fn default() -> Self {
        Self::new()
    }
}

impl Hub {
    pub fn new() -> Self {
        Self::with_config(HubConfig::default())
    }

    pub fn with_config(config: HubConfig) -> Self {
        Self {
            core: Rc::new(HubCore {
                config,
                engines: RefCell::new(Vec::new()),
            }),
        }
    }

    pub(crate) fn from_core(core: Rc<HubCore>) -> Self {
        Self { core }
    }

    pub fn config(&self) -> &HubConfig {
        &self.core.config
    }

    /// Register `engine` under its configured id.
    pub fn register(&self, engine: &Engine) -> Result<(), HubError> {
        if self.engine(engine.id()).is_some() {
            return Err(HubError::DuplicateEngine(engine.id().to_string()));
        }
        engine.attach_hub(Rc::downgrade(&self.core));
        self.core.engines.borrow_mut().push(engine.clone());
        tracing::debug!(engine = %engine.id(), schedule = %engine.schedule(), "engine registered");
        Ok(())
    }

    /// Remove an engine from the hub. Its queued messages stay queued.
    pub fn unregister(&self, id: &str) -> Option<Engine> {
        let mut engines = self.core.engines.borrow_mut();
        let index = engines.iter().position(|e| e.id() == id)?;
        let engine = engines.remove(index);
        engine.attach_hub(std::rc::Weak::new());
        Some(engine)
    }

    pub fn engine(&self, id: &str) -> Option<Engine> {
        self.core
            .engines
            .borrow()
            .iter()
            .find(|e| e.id() == id)
            .cloned()
    }

    /// Registered engine ids in registration order.
    pub fn ids(&self) -> Vec<String> {
        self.core
            .engines
            .borrow()
            .iter()
            .map(|e| e.id().to_string())
            .collect()
    }

    /// Queue `message` on the engine registered as `target`. It is delivered
    /// exactly once, during that engine's next flush.
    pub fn dispatch(&self, target: &str, message: impl Message) -> Result<(), HubError> {
        self.route(Envelope::new(message, target))
    }

    pub(crate) fn route(&self, envelope: Envelope) -> Result<(), HubError> {
        let engine = self
            .engine(&envelope.target)
            .ok_or_else(|| HubError::UnknownEngine(envelope.target.clone()))?;
        engine.enqueue(envelope);
        Ok(())
    }

    fn engines(&self) -> Vec<Engine> {
        self.core.engines.borrow().clone()
    }

    /// Flush every microtask (and sync) engine with pending work, repeating
    /// until none has any. Returns the number of flushes.
    pub fn run_microtasks(&self) -> usize {
        let mut flushes = 0;
        for _ in 0..MAX_MICROTASK_PASSES {
            let ready: Vec<Engine> = self
                .engines()
                .into_iter()
                .filter(|e| e.schedule() != Schedule::AnimationFrame)
                .filter(|e| !e.is_paused() && e.needs_flush())
                .collect();
            if ready.is_empty() {
                return flushes;
            }
            for engine in ready {
                engine.flush();
                flushes += 1;
            }
        }
        tracing::warn!(flushes, "microtask checkpoint did not settle");
        flushes
    }

    /// One animation frame: advance every engine's frame tasks, drain
    /// microtasks, flush each animation-frame engine with pending work once,
    /// then drain microtasks again.
    pub fn tick_frame(&self) -> usize {
        for engine in self.engines() {
            engine.advance_frame();
        }
        let mut flushes = self.run_microtasks();
        for engine in self.engines() {
            if engine.schedule() == Schedule::AnimationFrame
                && !engine.is_paused()
                && engine.needs_flush()
            {
                engine.flush();
                flushes += 1;
            }
        }
        flushes + self.run_microtasks()
    }

    /// Flush every unpaused engine regardless of schedule.
    pub fn flush_all(&self) -> usize {
        let mut flushes = 0;
        for engine in self.engines() {
            if !engine.is_paused() {
                engine.flush();
                flushes += 1;
            }
        }
        flushes
    }

    /// Drive `frames` animation frames, one per
    /// [`HubConfig::frame_interval`]. Needs a tokio runtime with time enabled.
    pub async fn drive(&self, frames: usize) {
        let mut interval = tokio::time::interval(self.core.config.frame_interval);
        for frame in 0..frames {
            interval.tick().await;
            let flushes = self.tick_frame();
            tracing::trace!(frame, flushes, "frame");
            tokio::task::yield_now().await;
        }
    }
}

impl std::fmt::Debug for Hub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hub")
            .field("engines", &self.ids())
            .field("config", &self.core.config)
            .finish()
    }
}

// ===========================================================================
// Tests
// ===========================================================================
