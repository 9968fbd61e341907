//! Constrained rescheduling of one task, optionally dragging its subtree.

use chrono::NaiveDate;

use crate::config::EngineConfig;
use crate::error::ScheduleError;
use crate::graph::DependencyGraph;
use crate::interner::NodeId;
use crate::models::{add_days, Snapshot, TaskNode};
use crate::rollup::propagate_from;
use crate::store::TaskStore;
use crate::{log_changes, log_checks};

use super::asap::planned_dates;

/// New planned dates of one task after an edit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TaskMove {
    pub code: String,
    pub new_start: NaiveDate,
    pub new_end: NaiveDate,
}

/// Result of a shift or date edit.
#[derive(Clone, Debug, PartialEq)]
pub struct ShiftOutcome {
    /// Every task whose dates changed: the task, moved descendants and re-rolled ancestors.
    pub moves: Vec<TaskMove>,
    /// The requested start was replaced by the earliest allowed start.
    pub snapped: bool,
    pub snapshot: Snapshot,
}

fn load(
    snapshot: &Snapshot,
    config: &EngineConfig,
) -> Result<(TaskStore, DependencyGraph), ScheduleError> {
    let store = TaskStore::from_tasks(&snapshot.tasks)?;
    let graph = DependencyGraph::build(&store, &snapshot.dependencies, config.check_cycles)?;
    Ok((store, graph))
}

/// Tightest start bound from the current planned dates of the predecessors
/// of the task and of its ancestors.
pub(crate) fn earliest_allowed_at(
    store: &TaskStore,
    graph: &DependencyGraph,
    id: NodeId,
    verbosity: u8,
) -> Result<Option<NaiveDate>, ScheduleError> {
    let span = store.node(id).span_days();
    let mut earliest: Option<NaiveDate> = None;
    for edge in graph.start_edges(store, id) {
        let pred = store.node(edge.pred);
        let Some(window) = pred.planned_window()? else {
            log_checks!(verbosity, "  skip {}: no planned dates", pred.code);
            continue;
        };
        let bound = edge
            .dependency_type
            .earliest_start(window, edge.lag_days, span)?;
        log_checks!(
            verbosity,
            "  {} {} {} (lag {}): start >= {}",
            pred.code,
            edge.dependency_type,
            store.node(edge.succ).code,
            edge.lag_days,
            bound
        );
        earliest = earliest.max(Some(bound));
    }
    Ok(earliest)
}

/// Earliest start the task's predecessors allow, or `None` if nothing constrains it.
pub fn earliest_allowed_start(
    snapshot: &Snapshot,
    code: &str,
    config: &EngineConfig,
) -> Result<Option<NaiveDate>, ScheduleError> {
    let (store, graph) = load(snapshot, config)?;
    let id = store.id_of(code)?;
    earliest_allowed_at(&store, &graph, id, config.verbosity)
}

/// Collect the outcome: every task whose planned dates differ from `before`.
fn outcome(
    snapshot: &Snapshot,
    store: TaskStore,
    before: &[(Option<NaiveDate>, Option<NaiveDate>)],
    snapped: bool,
) -> ShiftOutcome {
    let moves = store
        .tasks()
        .iter()
        .zip(before)
        .filter(|(task, (start, end))| task.planned_start != *start || task.planned_end != *end)
        .filter_map(|(task, _)| {
            Some(TaskMove {
                code: task.code.clone(),
                new_start: task.planned_start?,
                new_end: task.planned_end?,
            })
        })
        .collect();

    ShiftOutcome {
        moves,
        snapped,
        snapshot: Snapshot {
            project_start: snapshot.project_start,
            tasks: store.into_tasks(),
            dependencies: snapshot.dependencies.clone(),
        },
    }
}

fn require_start(task: &TaskNode) -> Result<NaiveDate, ScheduleError> {
    task.planned_start.ok_or_else(|| {
        ScheduleError::validation(
            "planned_start",
            format!("task {} has no planned start to shift from", task.code),
        )
    })
}

/// Move a task to start on `new_start`.
///
/// The request is checked against the predecessors' current dates. A start
/// before the earliest allowed one fails with `ConstraintViolation` unless
/// `allow_snap` is set, in which case the earliest allowed start is used.
/// With `include_children`, every dated descendant moves by the same number
/// of days without its own constraint check. Ancestors are rolled up afterwards.
pub fn shift(
    snapshot: &Snapshot,
    code: &str,
    new_start: NaiveDate,
    include_children: bool,
    allow_snap: bool,
    config: &EngineConfig,
) -> Result<ShiftOutcome, ScheduleError> {
    let (mut store, graph) = load(snapshot, config)?;
    let id = store.id_of(code)?;
    let old_start = require_start(store.node(id))?;

    let mut target = new_start;
    let mut snapped = false;
    if let Some(earliest) = earliest_allowed_at(&store, &graph, id, config.verbosity)? {
        if new_start < earliest {
            if !allow_snap {
                return Err(ScheduleError::ConstraintViolation {
                    code: code.to_string(),
                    requested: new_start,
                    earliest_allowed: earliest,
                });
            }
            log_changes!(
                config.verbosity,
                "  shift {}: snapping {} to {}",
                code,
                new_start,
                earliest
            );
            target = earliest;
            snapped = true;
        }
    }

    let before = planned_dates(&store);
    let delta = (target - old_start).num_days();

    let mut moving = vec![id];
    if include_children {
        let prefix = TaskNode::descendant_prefix(code);
        moving.extend(
            store
                .tasks()
                .iter()
                .enumerate()
                .filter(|(_, t)| t.code.starts_with(&prefix))
                .map(|(idx, _)| idx as NodeId),
        );
    }

    for moved in moving {
        let Some(window) = store.node(moved).planned_window()? else {
            continue;
        };
        let start = add_days(window.start, delta, "planned_start")?;
        let end = add_days(window.finish, delta, "planned_start")?;
        if store.set_dates_by_id(moved, Some(start), Some(end)) {
            log_changes!(
                config.verbosity,
                "  shift {}: {}..{}",
                store.node(moved).code,
                start,
                end
            );
        }
    }

    propagate_from(&mut store, id, config.verbosity);
    Ok(outcome(snapshot, store, &before, snapped))
}

/// Move a task by `delta_days` relative to its current start.
pub fn shift_by(
    snapshot: &Snapshot,
    code: &str,
    delta_days: i64,
    include_children: bool,
    allow_snap: bool,
    config: &EngineConfig,
) -> Result<ShiftOutcome, ScheduleError> {
    let task = snapshot
        .task(code)
        .ok_or_else(|| ScheduleError::not_found(code))?;
    let new_start = add_days(require_start(task)?, delta_days, "planned_start")?;
    shift(snapshot, code, new_start, include_children, allow_snap, config)
}

/// Set a task's planned dates directly and roll its ancestors up.
///
/// Not checked against predecessors; used to replay edits such as undo/redo.
pub fn set_dates(
    snapshot: &Snapshot,
    code: &str,
    start: NaiveDate,
    end: NaiveDate,
    config: &EngineConfig,
) -> Result<ShiftOutcome, ScheduleError> {
    if end < start {
        return Err(ScheduleError::validation(
            "planned_end",
            format!("end {} is before start {}", end, start),
        ));
    }
    let (mut store, _) = load(snapshot, config)?;
    let id = store.id_of(code)?;
    if store.node(id).is_milestone && start != end {
        return Err(ScheduleError::validation(
            "planned_end",
            format!("milestone {} must start and end on the same day", code),
        ));
    }

    let before = planned_dates(&store);
    if store.set_dates_by_id(id, Some(start), Some(end)) {
        log_changes!(config.verbosity, "  set {}: {}..{}", code, start, end);
    }
    propagate_from(&mut store, id, config.verbosity);
    Ok(outcome(snapshot, store, &before, false))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Dependency, DependencyType};
    use chrono::Duration;

    fn day(n: i64) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, 1).unwrap() + Duration::days(n)
    }

    fn chain() -> Snapshot {
        Snapshot::new(
            vec![
                TaskNode::new("A", 5.0).starting(day(0)),
                TaskNode::new("B", 3.0).starting(day(6)),
            ],
            vec![Dependency::new("A", "B", DependencyType::FS, 2)],
        )
    }

    #[test]
    fn test_earliest_allowed_start() {
        let config = EngineConfig::default();
        assert_eq!(
            earliest_allowed_start(&chain(), "B", &config).unwrap(),
            Some(day(6))
        );
        assert_eq!(earliest_allowed_start(&chain(), "A", &config).unwrap(), None);
    }

    #[test]
    fn test_violation_reports_suggestion() {
        let err = shift(&chain(), "B", day(3), false, false, &EngineConfig::default()).unwrap_err();
        assert_eq!(
            err,
            ScheduleError::ConstraintViolation {
                code: "B".to_string(),
                requested: day(3),
                earliest_allowed: day(6),
            }
        );
    }

    #[test]
    fn test_snap_to_earliest() {
        let mut snapshot = chain();
        snapshot.tasks[1] = TaskNode::new("B", 3.0).starting(day(10));
        let outcome = shift(&snapshot, "B", day(3), false, true, &EngineConfig::default()).unwrap();
        assert!(outcome.snapped);
        assert_eq!(
            outcome.moves,
            vec![TaskMove {
                code: "B".to_string(),
                new_start: day(6),
                new_end: day(8),
            }]
        );
    }

    #[test]
    fn test_later_start_needs_no_snap() {
        let outcome = shift(&chain(), "B", day(9), false, false, &EngineConfig::default()).unwrap();
        assert!(!outcome.snapped);
        let b = outcome.snapshot.task("B").unwrap();
        assert_eq!((b.planned_start, b.planned_end), (Some(day(9)), Some(day(11))));
    }

    #[test]
    fn test_shift_without_children_rolls_parent() {
        let snapshot = Snapshot::new(
            vec![
                TaskNode::new("1", 0.0).with_dates(day(0), day(4)),
                TaskNode::new("1.1", 2.0).with_parent("1").starting(day(0)),
                TaskNode::new("1.2", 2.0).with_parent("1").starting(day(3)),
            ],
            vec![],
        );
        let outcome = shift_by(&snapshot, "1.2", 5, false, false, &EngineConfig::default()).unwrap();
        let codes: Vec<&str> = outcome.moves.iter().map(|m| m.code.as_str()).collect();
        assert_eq!(codes, vec!["1", "1.2"]);
        assert_eq!(outcome.snapshot.task("1").unwrap().planned_end, Some(day(9)));
    }

    #[test]
    fn test_undated_task_rejected() {
        let snapshot = Snapshot::new(vec![TaskNode::new("A", 1.0)], vec![]);
        assert!(matches!(
            shift(&snapshot, "A", day(1), false, false, &EngineConfig::default()),
            Err(ScheduleError::Validation { ref field, .. }) if field == "planned_start"
        ));
        assert_eq!(
            shift(&snapshot, "Z", day(1), false, false, &EngineConfig::default()).unwrap_err(),
            ScheduleError::NotFound("Z".to_string())
        );
    }

    #[test]
    fn test_child_bound_by_summary_predecessor() {
        let snapshot = Snapshot::new(
            vec![
                TaskNode::new("A", 5.0).starting(day(0)),
                TaskNode::new("2", 0.0).with_dates(day(6), day(8)),
                TaskNode::new("2.1", 3.0).with_parent("2").starting(day(6)),
            ],
            vec![Dependency::new("A", "2", DependencyType::FS, 2)],
        );
        let config = EngineConfig::default();
        assert_eq!(
            earliest_allowed_start(&snapshot, "2.1", &config).unwrap(),
            Some(day(6))
        );
        assert!(matches!(
            shift(&snapshot, "2.1", day(2), false, false, &config),
            Err(ScheduleError::ConstraintViolation { .. })
        ));
    }

    #[test]
    fn test_out_of_range_shift_is_validation_error() {
        let config = EngineConfig::default();
        for delta in [1_000_000_000, i64::MAX, i64::MIN] {
            assert!(matches!(
                shift_by(&chain(), "A", delta, true, false, &config),
                Err(ScheduleError::Validation { ref field, .. }) if field == "planned_start"
            ));
        }
    }

    #[test]
    fn test_set_dates() {
        let config = EngineConfig::default();
        let outcome = set_dates(&chain(), "B", day(1), day(2), &config).unwrap();
        // Direct edits skip the predecessor check
        assert_eq!(outcome.snapshot.task("B").unwrap().planned_start, Some(day(1)));
        assert!(set_dates(&chain(), "B", day(2), day(1), &config).is_err());

        let milestone = Snapshot::new(
            vec![TaskNode::milestone("M").with_dates(day(0), day(0))],
            vec![],
        );
        assert!(set_dates(&milestone, "M", day(1), day(2), &config).is_err());
        assert!(set_dates(&milestone, "M", day(1), day(1), &config).is_ok());
    }
}
