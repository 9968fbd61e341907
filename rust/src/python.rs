//! Python bindings for the scheduling engine.
//!
//! Wrapper classes mirror the Rust data types with string-typed enums so the
//! host application can build snapshots from its own records.

// Allow clippy warning triggered by PyO3 macro expansion
#![allow(clippy::useless_conversion)]

use chrono::NaiveDate;
use pyo3::exceptions::{PyKeyError, PyValueError};
use pyo3::prelude::*;
use std::collections::HashMap;

use crate::{
    Assignment, Dependency, EngineConfig, ScheduleError, Snapshot, TaskNode, TaskTiming,
    DEFAULT_CONFLICT_THRESHOLD,
};

fn to_py_err(err: ScheduleError) -> PyErr {
    match err {
        ScheduleError::NotFound(_) => PyKeyError::new_err(err.to_string()),
        _ => PyValueError::new_err(err.to_string()),
    }
}

/// A WBS node (PyO3 wrapper).
#[pyclass(name = "TaskNode")]
#[derive(Clone, Debug)]
pub struct PyTaskNode {
    #[pyo3(get, set)]
    pub code: String,
    #[pyo3(get, set)]
    pub name: String,
    #[pyo3(get, set)]
    pub parent_code: Option<String>,
    #[pyo3(get, set)]
    pub duration_days: f64,
    #[pyo3(get, set)]
    pub planned_start: Option<NaiveDate>,
    #[pyo3(get, set)]
    pub planned_end: Option<NaiveDate>,
    #[pyo3(get, set)]
    pub actual_start: Option<NaiveDate>,
    #[pyo3(get, set)]
    pub actual_end: Option<NaiveDate>,
    #[pyo3(get, set)]
    pub status: String,
    #[pyo3(get, set)]
    pub percent_complete: f64,
    #[pyo3(get, set)]
    pub is_milestone: bool,
    #[pyo3(get, set)]
    pub collapsed: bool,
}

#[pymethods]
impl PyTaskNode {
    #[new]
    #[pyo3(signature = (
        code,
        duration_days,
        parent_code=None,
        planned_start=None,
        planned_end=None,
        status=None,
        percent_complete=0.0,
        is_milestone=false,
        name=None
    ))]
    #[allow(clippy::too_many_arguments)]
    fn new(
        code: String,
        duration_days: f64,
        parent_code: Option<String>,
        planned_start: Option<NaiveDate>,
        planned_end: Option<NaiveDate>,
        status: Option<String>,
        percent_complete: f64,
        is_milestone: bool,
        name: Option<String>,
    ) -> Self {
        Self {
            code,
            name: name.unwrap_or_default(),
            parent_code,
            duration_days,
            planned_start,
            planned_end,
            actual_start: None,
            actual_end: None,
            status: status.unwrap_or_else(|| "not-started".to_string()),
            percent_complete,
            is_milestone,
            collapsed: false,
        }
    }

    fn __repr__(&self) -> String {
        format!(
            "TaskNode(code={:?}, duration_days={}, start={:?}, end={:?})",
            self.code, self.duration_days, self.planned_start, self.planned_end
        )
    }
}

impl TryFrom<&PyTaskNode> for TaskNode {
    type Error = ScheduleError;

    fn try_from(node: &PyTaskNode) -> Result<Self, Self::Error> {
        Ok(TaskNode {
            code: node.code.clone(),
            name: node.name.clone(),
            parent_code: node.parent_code.clone(),
            duration_days: node.duration_days,
            planned_start: node.planned_start,
            planned_end: node.planned_end,
            actual_start: node.actual_start,
            actual_end: node.actual_end,
            status: node.status.parse()?,
            percent_complete: node.percent_complete,
            is_milestone: node.is_milestone,
            collapsed: node.collapsed,
        })
    }
}

impl From<TaskNode> for PyTaskNode {
    fn from(node: TaskNode) -> Self {
        Self {
            status: node.status.to_string(),
            code: node.code,
            name: node.name,
            parent_code: node.parent_code,
            duration_days: node.duration_days,
            planned_start: node.planned_start,
            planned_end: node.planned_end,
            actual_start: node.actual_start,
            actual_end: node.actual_end,
            percent_complete: node.percent_complete,
            is_milestone: node.is_milestone,
            collapsed: node.collapsed,
        }
    }
}

/// A typed, lagged dependency (PyO3 wrapper).
#[pyclass(name = "Dependency")]
#[derive(Clone, Debug)]
pub struct PyDependency {
    #[pyo3(get, set)]
    pub predecessor_code: String,
    #[pyo3(get, set)]
    pub successor_code: String,
    /// One of "FS", "SS", "FF", "SF".
    #[pyo3(get, set)]
    pub dependency_type: String,
    #[pyo3(get, set)]
    pub lag_days: i64,
}

#[pymethods]
impl PyDependency {
    #[new]
    #[pyo3(signature = (predecessor_code, successor_code, dependency_type=None, lag_days=0))]
    fn new(
        predecessor_code: String,
        successor_code: String,
        dependency_type: Option<String>,
        lag_days: i64,
    ) -> Self {
        Self {
            predecessor_code,
            successor_code,
            dependency_type: dependency_type.unwrap_or_else(|| "FS".to_string()),
            lag_days,
        }
    }

    fn __repr__(&self) -> String {
        format!(
            "Dependency({:?} -{}-> {:?}, lag_days={})",
            self.predecessor_code, self.dependency_type, self.successor_code, self.lag_days
        )
    }
}

impl TryFrom<&PyDependency> for Dependency {
    type Error = ScheduleError;

    fn try_from(dep: &PyDependency) -> Result<Self, Self::Error> {
        Ok(Dependency::new(
            dep.predecessor_code.clone(),
            dep.successor_code.clone(),
            dep.dependency_type.parse()?,
            dep.lag_days,
        ))
    }
}

/// An owner assigned to a task over an inclusive date range (PyO3 wrapper).
#[pyclass(name = "Assignment")]
#[derive(Clone, Debug)]
pub struct PyAssignment {
    #[pyo3(get, set)]
    pub task_code: String,
    #[pyo3(get, set)]
    pub owner: String,
    #[pyo3(get, set)]
    pub start: NaiveDate,
    #[pyo3(get, set)]
    pub end: NaiveDate,
}

#[pymethods]
impl PyAssignment {
    #[new]
    fn new(task_code: String, owner: String, start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            task_code,
            owner,
            start,
            end,
        }
    }

    fn __repr__(&self) -> String {
        format!(
            "Assignment(task_code={:?}, owner={:?}, start={}, end={})",
            self.task_code, self.owner, self.start, self.end
        )
    }
}

/// Engine configuration (PyO3 wrapper).
#[pyclass(name = "EngineConfig")]
#[derive(Clone, Debug)]
pub struct PyEngineConfig {
    #[pyo3(get, set)]
    pub verbosity: u8,
    #[pyo3(get, set)]
    pub check_cycles: bool,
    #[pyo3(get, set)]
    pub conflict_threshold: usize,
    #[pyo3(get, set)]
    pub project_end: Option<NaiveDate>,
}

#[pymethods]
impl PyEngineConfig {
    #[new]
    #[pyo3(signature = (verbosity=0, check_cycles=true, conflict_threshold=DEFAULT_CONFLICT_THRESHOLD, project_end=None))]
    fn new(
        verbosity: u8,
        check_cycles: bool,
        conflict_threshold: usize,
        project_end: Option<NaiveDate>,
    ) -> Self {
        Self {
            verbosity,
            check_cycles,
            conflict_threshold,
            project_end,
        }
    }

    fn __repr__(&self) -> String {
        format!(
            "EngineConfig(verbosity={}, check_cycles={}, conflict_threshold={})",
            self.verbosity, self.check_cycles, self.conflict_threshold
        )
    }
}

impl From<Option<PyEngineConfig>> for EngineConfig {
    fn from(config: Option<PyEngineConfig>) -> Self {
        match config {
            Some(c) => EngineConfig {
                verbosity: c.verbosity,
                check_cycles: c.check_cycles,
                conflict_threshold: c.conflict_threshold,
                project_end: c.project_end,
            },
            None => EngineConfig::default(),
        }
    }
}

/// Critical path timing of one task (PyO3 wrapper).
#[pyclass(name = "TaskTiming")]
#[derive(Clone, Debug)]
pub struct PyTaskTiming {
    #[pyo3(get)]
    pub earliest_start: NaiveDate,
    #[pyo3(get)]
    pub earliest_finish: NaiveDate,
    #[pyo3(get)]
    pub latest_start: NaiveDate,
    #[pyo3(get)]
    pub latest_finish: NaiveDate,
    #[pyo3(get)]
    pub slack_days: i64,
    #[pyo3(get)]
    pub critical: bool,
}

#[pymethods]
impl PyTaskTiming {
    fn __repr__(&self) -> String {
        format!(
            "TaskTiming(es={}, ef={}, ls={}, lf={}, slack={})",
            self.earliest_start,
            self.earliest_finish,
            self.latest_start,
            self.latest_finish,
            self.slack_days
        )
    }
}

impl From<&TaskTiming> for PyTaskTiming {
    fn from(timing: &TaskTiming) -> Self {
        Self {
            earliest_start: timing.earliest_start,
            earliest_finish: timing.earliest_finish,
            latest_start: timing.latest_start,
            latest_finish: timing.latest_finish,
            slack_days: timing.slack_days,
            critical: timing.is_critical(),
        }
    }
}

fn snapshot_from(
    tasks: &[PyTaskNode],
    dependencies: &[PyDependency],
    project_start: Option<NaiveDate>,
) -> PyResult<Snapshot> {
    let tasks = tasks
        .iter()
        .map(TaskNode::try_from)
        .collect::<Result<Vec<_>, _>>()
        .map_err(to_py_err)?;
    let dependencies = dependencies
        .iter()
        .map(Dependency::try_from)
        .collect::<Result<Vec<_>, _>>()
        .map_err(to_py_err)?;
    Ok(Snapshot {
        project_start,
        tasks,
        dependencies,
    })
}

fn tasks_out(snapshot: Snapshot) -> Vec<PyTaskNode> {
    snapshot.tasks.into_iter().map(PyTaskNode::from).collect()
}

/// Roll dates and progress up the subtree at `root_code`, or the whole forest.
///
/// # Returns
/// * (changed, tasks) with the updated task list
#[pyfunction]
#[pyo3(name = "rollup", signature = (tasks, dependencies, root_code=None, config=None))]
fn py_rollup(
    tasks: Vec<PyTaskNode>,
    dependencies: Vec<PyDependency>,
    root_code: Option<String>,
    config: Option<PyEngineConfig>,
) -> PyResult<(bool, Vec<PyTaskNode>)> {
    let snapshot = snapshot_from(&tasks, &dependencies, None)?;
    let config = EngineConfig::from(config);
    let (changed, out) = match root_code {
        Some(root) => {
            let (dates, rolled) =
                crate::rollup_dates(&snapshot, &root, &config).map_err(to_py_err)?;
            let (progress, rolled) =
                crate::rollup_progress(&rolled, &root, &config).map_err(to_py_err)?;
            (dates || progress, rolled)
        }
        None => crate::rollup_all(&snapshot, &config).map_err(to_py_err)?,
    };
    Ok((changed, tasks_out(out)))
}

/// Compute ES/EF/LS/LF and slack for every task.
///
/// # Raises
/// * ValueError if a dependency cycle is detected or input is invalid
#[pyfunction]
#[pyo3(name = "critical_path", signature = (tasks, dependencies, project_start=None, config=None))]
fn py_critical_path(
    tasks: Vec<PyTaskNode>,
    dependencies: Vec<PyDependency>,
    project_start: Option<NaiveDate>,
    config: Option<PyEngineConfig>,
) -> PyResult<HashMap<String, PyTaskTiming>> {
    let snapshot = snapshot_from(&tasks, &dependencies, project_start)?;
    let result = crate::critical_path(&snapshot, &EngineConfig::from(config)).map_err(to_py_err)?;
    Ok(result
        .task_timings
        .iter()
        .map(|(code, timing)| (code.clone(), PyTaskTiming::from(timing)))
        .collect())
}

/// Assign every task its earliest feasible dates.
///
/// # Returns
/// * (changed_codes, tasks)
#[pyfunction]
#[pyo3(name = "asap_schedule", signature = (tasks, dependencies, project_start=None, config=None))]
fn py_asap_schedule(
    tasks: Vec<PyTaskNode>,
    dependencies: Vec<PyDependency>,
    project_start: Option<NaiveDate>,
    config: Option<PyEngineConfig>,
) -> PyResult<(Vec<String>, Vec<PyTaskNode>)> {
    let snapshot = snapshot_from(&tasks, &dependencies, project_start)?;
    let (changed, out) =
        crate::asap_schedule(&snapshot, &EngineConfig::from(config)).map_err(to_py_err)?;
    Ok((changed, tasks_out(out)))
}

/// Move a task to a new start, optionally with its subtree.
///
/// # Returns
/// * (moves, snapped, tasks) where moves are (code, new_start, new_end)
///
/// # Raises
/// * ValueError on a constraint violation when allow_snap is false
/// * KeyError if the code is unknown
#[pyfunction]
#[pyo3(name = "shift", signature = (tasks, dependencies, code, new_start, include_children=false, allow_snap=false, config=None))]
#[allow(clippy::too_many_arguments)]
#[allow(clippy::type_complexity)]
fn py_shift(
    tasks: Vec<PyTaskNode>,
    dependencies: Vec<PyDependency>,
    code: String,
    new_start: NaiveDate,
    include_children: bool,
    allow_snap: bool,
    config: Option<PyEngineConfig>,
) -> PyResult<(Vec<(String, NaiveDate, NaiveDate)>, bool, Vec<PyTaskNode>)> {
    let snapshot = snapshot_from(&tasks, &dependencies, None)?;
    let outcome = crate::shift(
        &snapshot,
        &code,
        new_start,
        include_children,
        allow_snap,
        &EngineConfig::from(config),
    )
    .map_err(to_py_err)?;
    let moves = outcome
        .moves
        .into_iter()
        .map(|m| (m.code, m.new_start, m.new_end))
        .collect();
    Ok((moves, outcome.snapped, tasks_out(outcome.snapshot)))
}

/// List overallocated days as (date, {owner: count}).
///
/// An explicit `threshold` overrides the config's `conflict_threshold`.
#[pyfunction]
#[pyo3(name = "resource_conflicts", signature = (assignments, threshold=None, config=None))]
fn py_resource_conflicts(
    assignments: Vec<PyAssignment>,
    threshold: Option<usize>,
    config: Option<PyEngineConfig>,
) -> PyResult<Vec<(NaiveDate, HashMap<String, usize>)>> {
    let assignments: Vec<Assignment> = assignments
        .into_iter()
        .map(|a| Assignment::new(a.task_code, a.owner, a.start, a.end))
        .collect();
    let mut config = EngineConfig::from(config);
    if let Some(threshold) = threshold {
        config.conflict_threshold = threshold;
    }
    let conflicts = crate::detect_conflicts(&assignments, &config).map_err(to_py_err)?;
    Ok(conflicts
        .into_iter()
        .map(|c| (c.date, c.owner_counts.into_iter().collect()))
        .collect())
}

/// The wbs.rust Python module.
#[pymodule]
fn rust(m: &Bound<'_, PyModule>) -> PyResult<()> {
    // Data types
    m.add_class::<PyTaskNode>()?;
    m.add_class::<PyDependency>()?;
    m.add_class::<PyAssignment>()?;
    m.add_class::<PyTaskTiming>()?;

    // Config types
    m.add_class::<PyEngineConfig>()?;

    // Engines
    m.add_function(wrap_pyfunction!(py_rollup, m)?)?;
    m.add_function(wrap_pyfunction!(py_critical_path, m)?)?;
    m.add_function(wrap_pyfunction!(py_asap_schedule, m)?)?;
    m.add_function(wrap_pyfunction!(py_shift, m)?)?;
    m.add_function(wrap_pyfunction!(py_resource_conflicts, m)?)?;

    Ok(())
}
