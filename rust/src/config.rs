//! Configuration types for the scheduling engines.

use chrono::NaiveDate;

/// Default number of simultaneous tasks an owner may carry before a day is flagged.
pub const DEFAULT_CONFLICT_THRESHOLD: usize = 3;

/// Configuration shared by the engine operations.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EngineConfig {
    /// Verbosity level: 0=silent, 1=changes, 2=checks, 3=debug.
    pub verbosity: u8,
    /// Reject dependency edges that would close a cycle while loading a snapshot.
    pub check_cycles: bool,
    /// Maximum concurrent tasks per owner per day before it counts as a conflict.
    pub conflict_threshold: usize,
    /// Anchor for the backward pass; defaults to the latest early finish.
    pub project_end: Option<NaiveDate>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            verbosity: 0,
            check_cycles: true,
            conflict_threshold: DEFAULT_CONFLICT_THRESHOLD,
            project_end: None,
        }
    }
}

impl EngineConfig {
    /// Same configuration with a different verbosity.
    pub fn with_verbosity(mut self, verbosity: u8) -> Self {
        self.verbosity = verbosity;
        self
    }

    /// Same configuration anchored to an explicit project end.
    pub fn with_project_end(mut self, project_end: NaiveDate) -> Self {
        self.project_end = Some(project_end);
        self
    }
}
