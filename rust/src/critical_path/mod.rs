//! Critical path method over the dependency graph.
//!
//! A forward pass computes earliest start/finish per task, a backward pass
//! from the project end computes latest start/finish, and tasks with zero
//! slack form the critical path.

mod calculation;
mod types;

pub use calculation::critical_path;
pub(crate) use calculation::{forward_pass, resolve_project_start};
pub use types::{CriticalPathResult, TaskTiming};
