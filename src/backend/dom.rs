//! DOM backend: a patch log for a host bridge.
//!
//! Mutations are staged as they happen and committed in one batch per flush,
//! so a bridge replaying [`DomBackend::take_patches`] never sees a half-built
//! frame.

use std::any::Any;

use super::{Backend, Mutation};
use crate::dom::Dom;
use crate::engine::Schedule;

/// A committed mutation, tagged with the flush that committed it.
#[derive(Debug, Clone, PartialEq)]
pub struct Patch {
    /// 1-based flush counter.
    pub frame: u64,
    pub mutation: Mutation,
}

/// Records the mutation stream. Flushes on the microtask schedule.
#[derive(Debug, Default)]
pub struct DomBackend {
    staged: Vec<Mutation>,
    committed: Vec<Patch>,
    frames: u64,
}

impl DomBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drain every committed patch, oldest first.
    pub fn take_patches(&mut self) -> Vec<Patch> {
        std::mem::take(&mut self.committed)
    }

    /// Committed patches not yet taken.
    pub fn patches(&self) -> &[Patch] {
        &self.committed
    }

    /// Mutations applied since the last flush.
    pub fn staged(&self) -> &[Mutation] {
        &self.staged
    }

    /// Number of flushes that committed at least one patch.
    pub fn frames(&self) -> u64 {
        self.frames
    }
}

impl Backend for DomBackend {
    fn name(&self) -> &'static str {
        "dom"
    }

    fn schedule(&self) -> Schedule {
        Schedule::Microtask
    }

    fn apply(&mut self, _dom: &Dom, mutation: &Mutation) {
        self.staged.push(mutation.clone());
    }

    fn flush(&mut self, _dom: &Dom) {
        if self.staged.is_empty() {
            return;
        }
        self.frames += 1;
        let frame = self.frames;
        self.committed.extend(
            self.staged
                .drain(..)
                .map(|mutation| Patch { frame, mutation }),
        );
        tracing::trace!(frame, total = self.committed.len(), "dom patches committed");
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
