//! Engine configuration.

use super::schedule::Schedule;

/// Configuration for one engine.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Id used to address the engine on a hub.
    pub id: String,
    /// Overrides the backend's preferred schedule when set.
    pub schedule: Option<Schedule>,
    /// Upper bound on inbox/refresh passes within a single flush.
    pub max_flush_passes: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            id: "main".to_string(),
            schedule: None,
            max_flush_passes: 100,
        }
    }
}

impl EngineConfig {
    /// Create a new default config.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the hub id (builder).
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Force a schedule regardless of backend (builder).
    pub fn with_schedule(mut self, schedule: Schedule) -> Self {
        self.schedule = Some(schedule);
        self
    }

    /// Set the flush pass limit (builder). Clamped to at least one pass.
    pub fn with_max_flush_passes(mut self, passes: usize) -> Self {
        self.max_flush_passes = passes.max(1);
        self
    }
}
