//! Rust implementation of the WBS scheduling engine.
//!
//! Pure functions over an immutable [`Snapshot`] of a task forest and its
//! dependency edges: hierarchical rollup, critical path, ASAP scheduling,
//! constrained shifting and resource conflict detection. Each operation
//! returns a new snapshot or a [`ScheduleError`]; nothing is cached between
//! calls.

pub mod config;
pub mod critical_path;
mod error;
pub mod graph;
mod interner;
pub mod logging;
mod models;
pub mod resources;
pub mod rollup;
pub mod scheduler;
pub mod store;

#[cfg(feature = "python")]
mod python;

pub use config::{EngineConfig, DEFAULT_CONFLICT_THRESHOLD};
pub use critical_path::{critical_path, CriticalPathResult, TaskTiming};
pub use error::ScheduleError;
pub use graph::DependencyGraph;
pub use models::{
    end_for, span_days, Assignment, Dependency, DependencyType, Snapshot, TaskNode, TaskStatus,
    Window,
};
pub use resources::{
    detect_conflicts, owners, resource_calendar, resource_conflicts, ConflictDay, ResourceCalendar,
};
pub use rollup::{rollup_all, rollup_dates, rollup_progress};
pub use scheduler::{
    asap_schedule, earliest_allowed_start, set_dates, shift, shift_by, ShiftOutcome, TaskMove,
};
pub use store::TaskStore;
