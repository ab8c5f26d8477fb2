//! Flush scheduling disciplines.

use std::fmt;

/// When an engine applies scheduled work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Schedule {
    /// Flush at the next microtask checkpoint ([`Hub::run_microtasks`](crate::hub::Hub::run_microtasks)).
    Microtask,
    /// Flush on the next animation frame ([`Hub::tick_frame`](crate::hub::Hub::tick_frame)).
    AnimationFrame,
    /// Flush as soon as the outermost operation returns.
    Sync,
}

impl Schedule {
    pub fn is_sync(self) -> bool {
        matches!(self, Schedule::Sync)
    }
}

impl fmt::Display for Schedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Schedule::Microtask => "microtask",
            Schedule::AnimationFrame => "animation-frame",
            Schedule::Sync => "sync",
        };
        f.write_str(name)
    }
}
