//! Types for critical path calculation.

use chrono::NaiveDate;
use rustc_hash::FxHashMap;

use crate::models::Window;

/// Per-task timing information from the forward and backward passes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TaskTiming {
    /// Earliest possible start (forward pass).
    pub earliest_start: NaiveDate,
    /// Earliest possible inclusive finish (forward pass).
    pub earliest_finish: NaiveDate,
    /// Latest allowable start (backward pass).
    pub latest_start: NaiveDate,
    /// Latest allowable inclusive finish (backward pass).
    pub latest_finish: NaiveDate,
    /// Slack = latest_start - earliest_start, in days.
    pub slack_days: i64,
}

impl TaskTiming {
    pub(crate) fn from_windows(early: Window, late: Window) -> Self {
        Self {
            earliest_start: early.start,
            earliest_finish: early.finish,
            latest_start: late.start,
            latest_finish: late.finish,
            slack_days: (late.start - early.start).num_days(),
        }
    }

    pub fn is_critical(&self) -> bool {
        self.slack_days == 0
    }
}

/// Result of a critical path calculation over the whole project.
#[derive(Clone, Debug, Default)]
pub struct CriticalPathResult {
    /// Timing for every task, keyed by code.
    pub task_timings: FxHashMap<String, TaskTiming>,
    /// Codes in the topological order the passes used.
    pub order: Vec<String>,
    /// Zero-slack codes, in topological order.
    pub critical_path_tasks: Vec<String>,
    /// Forward-pass anchor (None only for an empty project).
    pub project_start: Option<NaiveDate>,
    /// Backward-pass anchor (None only for an empty project).
    pub project_end: Option<NaiveDate>,
}

impl CriticalPathResult {
    pub fn timing(&self, code: &str) -> Option<&TaskTiming> {
        self.task_timings.get(code)
    }

    pub fn is_critical(&self, code: &str) -> bool {
        self.timing(code).is_some_and(|t| t.is_critical())
    }

    /// Inclusive length of the project in days.
    pub fn critical_path_length_days(&self) -> i64 {
        match (self.project_start, self.project_end) {
            (Some(start), Some(end)) => (end - start).num_days() + 1,
            _ => 0,
        }
    }
}
