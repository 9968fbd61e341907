//! Error taxonomy shared by every engine.

use chrono::NaiveDate;
use thiserror::Error;

/// Errors returned by scheduling operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScheduleError {
    /// Malformed input: bad dates, negative duration, self-dependency, duplicate pair.
    #[error("Invalid {field}: {message}")]
    Validation { field: String, message: String },

    /// A referenced task code does not exist.
    #[error("Task not found: {0}")]
    NotFound(String),

    /// The dependency graph contains a cycle. The first code is repeated at the end.
    #[error("Circular dependency detected: {}", .cycle.join(" -> "))]
    CycleDetected { cycle: Vec<String> },

    /// A requested start falls before the bound imposed by the task's predecessors.
    #[error("Task {code} cannot start on {requested}; earliest allowed start is {earliest_allowed}")]
    ConstraintViolation {
        code: String,
        requested: NaiveDate,
        earliest_allowed: NaiveDate,
    },
}

impl ScheduleError {
    pub(crate) fn validation(field: &str, message: impl Into<String>) -> Self {
        ScheduleError::Validation {
            field: field.to_string(),
            message: message.into(),
        }
    }

    pub(crate) fn not_found(code: &str) -> Self {
        ScheduleError::NotFound(code.to_string())
    }
}
