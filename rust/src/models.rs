//! Core data types for the scheduling system.

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ScheduleError;

/// Number of days between a task's start and its inclusive end.
///
/// Fractional durations round up to whole days. Durations 0 and 1 both end on
/// the start day.
pub fn span_days(duration_days: f64) -> i64 {
    if duration_days <= 0.0 {
        return 0;
    }
    (duration_days.ceil() as i64 - 1).max(0)
}

/// `date` moved by `days`; leaving the calendar is a validation error on `field`.
pub(crate) fn add_days(
    date: NaiveDate,
    days: i64,
    field: &str,
) -> Result<NaiveDate, ScheduleError> {
    Duration::try_days(days)
        .and_then(|delta| date.checked_add_signed(delta))
        .ok_or_else(|| {
            ScheduleError::validation(field, format!("{} moved by {} days is out of range", date, days))
        })
}

/// Inclusive end date of a task starting at `start`.
pub fn end_for(start: NaiveDate, duration_days: f64) -> Result<NaiveDate, ScheduleError> {
    add_days(start, span_days(duration_days), "duration_days")
}

/// Lifecycle state of a task.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskStatus {
    #[default]
    NotStarted,
    InProgress,
    Done,
    Blocked,
    OnHold,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotStarted => "not-started",
            Self::InProgress => "in-progress",
            Self::Done => "done",
            Self::Blocked => "blocked",
            Self::OnHold => "on-hold",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = ScheduleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "not-started" => Ok(Self::NotStarted),
            "in-progress" => Ok(Self::InProgress),
            "done" => Ok(Self::Done),
            "blocked" => Ok(Self::Blocked),
            "on-hold" => Ok(Self::OnHold),
            other => Err(ScheduleError::validation(
                "status",
                format!("unknown status {:?}", other),
            )),
        }
    }
}

/// A node of the work breakdown structure.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TaskNode {
    pub code: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub parent_code: Option<String>,
    #[serde(default)]
    pub duration_days: f64,
    #[serde(default)]
    pub planned_start: Option<NaiveDate>,
    #[serde(default)]
    pub planned_end: Option<NaiveDate>,
    #[serde(default)]
    pub actual_start: Option<NaiveDate>,
    #[serde(default)]
    pub actual_end: Option<NaiveDate>,
    #[serde(default)]
    pub status: TaskStatus,
    #[serde(default)]
    pub percent_complete: f64,
    #[serde(default)]
    pub is_milestone: bool,
    /// Display-only flag; hides descendants in tree views.
    #[serde(default)]
    pub collapsed: bool,
}

impl TaskNode {
    pub fn new(code: impl Into<String>, duration_days: f64) -> Self {
        Self {
            code: code.into(),
            name: String::new(),
            parent_code: None,
            duration_days,
            planned_start: None,
            planned_end: None,
            actual_start: None,
            actual_end: None,
            status: TaskStatus::NotStarted,
            percent_complete: 0.0,
            is_milestone: false,
            collapsed: false,
        }
    }

    /// Zero-duration milestone.
    pub fn milestone(code: impl Into<String>) -> Self {
        Self {
            is_milestone: true,
            ..Self::new(code, 0.0)
        }
    }

    pub fn with_parent(mut self, parent_code: impl Into<String>) -> Self {
        self.parent_code = Some(parent_code.into());
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_dates(mut self, start: NaiveDate, end: NaiveDate) -> Self {
        self.planned_start = Some(start);
        self.planned_end = Some(end);
        self
    }

    /// Set the start and derive the end from the duration.
    ///
    /// An end past the calendar is left unset; the store rejects such a task.
    pub fn starting(mut self, start: NaiveDate) -> Self {
        self.planned_start = Some(start);
        self.planned_end = end_for(start, self.duration_days).ok();
        self
    }

    pub fn with_progress(mut self, percent_complete: f64) -> Self {
        self.percent_complete = percent_complete;
        self
    }

    pub fn with_status(mut self, status: TaskStatus) -> Self {
        self.status = status;
        self
    }

    /// Days from start to inclusive end implied by the duration.
    pub fn span_days(&self) -> i64 {
        if self.is_milestone {
            0
        } else {
            span_days(self.duration_days)
        }
    }

    /// Planned window, if the start is set. A missing end is derived from the duration.
    pub fn planned_window(&self) -> Result<Option<Window>, ScheduleError> {
        let Some(start) = self.planned_start else {
            return Ok(None);
        };
        let finish = match self.planned_end {
            Some(end) => end,
            None => add_days(start, self.span_days(), "duration_days")?,
        };
        Ok(Some(Window { start, finish }))
    }

    /// Dot-prefix that all descendants' codes start with.
    pub(crate) fn descendant_prefix(code: &str) -> String {
        format!("{}.", code)
    }
}

/// Start and inclusive finish of a scheduled task.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Window {
    pub start: NaiveDate,
    pub finish: NaiveDate,
}

impl Window {
    pub fn from_start(start: NaiveDate, span: i64) -> Result<Self, ScheduleError> {
        Ok(Self {
            start,
            finish: add_days(start, span, "duration_days")?,
        })
    }

    pub fn from_finish(finish: NaiveDate, span: i64) -> Result<Self, ScheduleError> {
        Ok(Self {
            start: add_days(finish, -span, "duration_days")?,
            finish,
        })
    }

    /// Smallest window covering both.
    pub fn cover(self, other: Window) -> Self {
        Self {
            start: self.start.min(other.start),
            finish: self.finish.max(other.finish),
        }
    }
}

/// Relationship between a predecessor and a successor.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DependencyType {
    /// Successor starts after predecessor finishes.
    #[default]
    FS,
    /// Successor starts after predecessor starts.
    SS,
    /// Successor finishes after predecessor finishes.
    FF,
    /// Successor finishes after predecessor starts.
    SF,
}

impl DependencyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FS => "FS",
            Self::SS => "SS",
            Self::FF => "FF",
            Self::SF => "SF",
        }
    }

    /// Lower bound this edge puts on the successor's start.
    ///
    /// Finish-anchored types bound the successor's finish; the bound is moved
    /// back to a start through the successor's span.
    pub fn earliest_start(
        self,
        pred: Window,
        lag_days: i64,
        succ_span: i64,
    ) -> Result<NaiveDate, ScheduleError> {
        let (anchor, offset) = match self {
            Self::FS => (pred.finish, Some(lag_days)),
            Self::SS => (pred.start, Some(lag_days)),
            Self::FF => (pred.finish, lag_days.checked_sub(succ_span)),
            Self::SF => (pred.start, lag_days.checked_sub(succ_span)),
        };
        match offset {
            Some(days) => add_days(anchor, days, "lag_days"),
            None => Err(lag_out_of_range(lag_days)),
        }
    }

    /// Upper bound this edge puts on the predecessor's finish, given the
    /// successor's latest window.
    pub fn latest_finish(
        self,
        succ: Window,
        lag_days: i64,
        pred_span: i64,
    ) -> Result<NaiveDate, ScheduleError> {
        let (anchor, offset) = match self {
            Self::FS => (succ.start, Some(lag_days)),
            Self::SS => (succ.start, lag_days.checked_sub(pred_span)),
            Self::FF => (succ.finish, Some(lag_days)),
            Self::SF => (succ.finish, lag_days.checked_sub(pred_span)),
        };
        match offset.and_then(i64::checked_neg) {
            Some(days) => add_days(anchor, days, "lag_days"),
            None => Err(lag_out_of_range(lag_days)),
        }
    }
}

fn lag_out_of_range(lag_days: i64) -> ScheduleError {
    ScheduleError::validation("lag_days", format!("lag of {} days is out of range", lag_days))
}

impl fmt::Display for DependencyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DependencyType {
    type Err = ScheduleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "FS" => Ok(Self::FS),
            "SS" => Ok(Self::SS),
            "FF" => Ok(Self::FF),
            "SF" => Ok(Self::SF),
            other => Err(ScheduleError::validation(
                "dependency_type",
                format!("unknown dependency type {:?}", other),
            )),
        }
    }
}

/// A typed, lagged edge between two tasks.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependency {
    pub predecessor_code: String,
    pub successor_code: String,
    #[serde(default)]
    pub dependency_type: DependencyType,
    /// Positive delays the successor, negative lets it overlap.
    #[serde(default)]
    pub lag_days: i64,
}

impl Dependency {
    pub fn new(
        predecessor_code: impl Into<String>,
        successor_code: impl Into<String>,
        dependency_type: DependencyType,
        lag_days: i64,
    ) -> Self {
        Self {
            predecessor_code: predecessor_code.into(),
            successor_code: successor_code.into(),
            dependency_type,
            lag_days,
        }
    }
}

/// Immutable input to every engine operation.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Forward-pass anchor; the earliest planned start is used when absent.
    #[serde(default)]
    pub project_start: Option<NaiveDate>,
    #[serde(default)]
    pub tasks: Vec<TaskNode>,
    #[serde(default)]
    pub dependencies: Vec<Dependency>,
}

impl Snapshot {
    pub fn new(tasks: Vec<TaskNode>, dependencies: Vec<Dependency>) -> Self {
        Self {
            project_start: None,
            tasks,
            dependencies,
        }
    }

    pub fn with_project_start(mut self, project_start: NaiveDate) -> Self {
        self.project_start = Some(project_start);
        self
    }

    /// Look up a task by code.
    pub fn task(&self, code: &str) -> Option<&TaskNode> {
        self.tasks.iter().find(|t| t.code == code)
    }
}

/// An owner working on a task over an inclusive date range.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    pub task_code: String,
    pub owner: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl Assignment {
    pub fn new(
        task_code: impl Into<String>,
        owner: impl Into<String>,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Self {
        Self {
            task_code: task_code.into(),
            owner: owner.into(),
            start,
            end,
        }
    }
}
