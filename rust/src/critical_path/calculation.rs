//! Critical path calculation using forward and backward passes.

use chrono::NaiveDate;
use rustc_hash::FxHashMap;

use crate::config::EngineConfig;
use crate::error::ScheduleError;
use crate::graph::{order_waiting, DependencyGraph};
use crate::interner::NodeId;
use crate::models::{Snapshot, Window};
use crate::store::TaskStore;
use crate::{log_checks, log_debug};

use super::types::{CriticalPathResult, TaskTiming};

/// Early windows from the forward pass, indexed by node id.
pub(crate) struct ForwardPass {
    pub order: Vec<NodeId>,
    pub early: Vec<Window>,
}

/// Explicit project start, or the earliest planned start in the store.
pub(crate) fn resolve_project_start(
    explicit: Option<NaiveDate>,
    store: &TaskStore,
) -> Result<NaiveDate, ScheduleError> {
    explicit
        .or_else(|| store.tasks().iter().filter_map(|t| t.planned_start).min())
        .ok_or_else(|| {
            ScheduleError::validation(
                "project_start",
                "no project start given and no task has a planned start",
            )
        })
}

/// Order the nodes so each comes after every node in its wait list.
fn pass_order(store: &TaskStore, waits_on: &[Vec<NodeId>]) -> Result<Vec<NodeId>, ScheduleError> {
    order_waiting(waits_on).map_err(|cycle| ScheduleError::CycleDetected {
        cycle: cycle
            .into_iter()
            .map(|id| store.node(id).code.clone())
            .collect(),
    })
}

/// Compute earliest windows.
///
/// A summary task spans its children's early windows. A leaf starts at the
/// tightest bound imposed by its own predecessor edges and those of every
/// ancestor, floored at the project start; a leaf with no such edges starts
/// at its own planned start (never before the project start).
pub(crate) fn forward_pass(
    store: &TaskStore,
    graph: &DependencyGraph,
    project_start: NaiveDate,
    verbosity: u8,
) -> Result<ForwardPass, ScheduleError> {
    let waits_on: Vec<Vec<NodeId>> = (0..store.len() as NodeId)
        .map(|id| match store.child_ids(id) {
            [] => graph.start_edges(store, id).map(|e| e.pred).collect(),
            children => children.to_vec(),
        })
        .collect();
    let order = pass_order(store, &waits_on)?;

    let unset = Window {
        start: project_start,
        finish: project_start,
    };
    let mut early = vec![unset; store.len()];

    for &id in &order {
        let node = store.node(id);
        let children_span = store
            .child_ids(id)
            .iter()
            .map(|&c| early[c as usize])
            .reduce(Window::cover);
        if let Some(span) = children_span {
            early[id as usize] = span;
            log_debug!(
                verbosity,
                "  forward {}: ES={} EF={} (children)",
                node.code,
                span.start,
                span.finish
            );
            continue;
        }

        let span = node.span_days();
        let mut earliest_start = project_start;
        let mut has_preds = false;

        for edge in graph.start_edges(store, id) {
            has_preds = true;
            let bound = edge
                .dependency_type
                .earliest_start(early[edge.pred as usize], edge.lag_days, span)?;
            log_checks!(
                verbosity,
                "  {}: {} {} {} (lag {}): start >= {}",
                node.code,
                store.node(edge.pred).code,
                edge.dependency_type,
                store.node(edge.succ).code,
                edge.lag_days,
                bound
            );
            earliest_start = earliest_start.max(bound);
        }

        if !has_preds {
            if let Some(own_start) = node.planned_start {
                earliest_start = earliest_start.max(own_start);
            }
        }

        early[id as usize] = Window::from_start(earliest_start, span)?;
        log_debug!(
            verbosity,
            "  forward {}: ES={} EF={}",
            node.code,
            early[id as usize].start,
            early[id as usize].finish
        );
    }

    Ok(ForwardPass { order, early })
}

/// Compute latest windows.
///
/// Each task keeps the span its early window has. Its latest finish is
/// capped by the project end, its parent's latest finish and its own
/// successor edges.
fn backward_pass(
    store: &TaskStore,
    graph: &DependencyGraph,
    forward: &ForwardPass,
    project_end: NaiveDate,
    verbosity: u8,
) -> Result<Vec<Window>, ScheduleError> {
    let waits_on: Vec<Vec<NodeId>> = (0..store.len() as NodeId)
        .map(|id| {
            store
                .parent_id(id)
                .into_iter()
                .chain(graph.succ_edges(id).map(|e| e.succ))
                .collect()
        })
        .collect();
    let order = pass_order(store, &waits_on)?;

    let unset = Window {
        start: project_end,
        finish: project_end,
    };
    let mut late = vec![unset; store.len()];

    for &id in &order {
        let early = forward.early[id as usize];
        let span = (early.finish - early.start).num_days();
        let mut latest_finish = match store.parent_id(id) {
            Some(parent) => project_end.min(late[parent as usize].finish),
            None => project_end,
        };

        for edge in graph.succ_edges(id) {
            let bound = edge
                .dependency_type
                .latest_finish(late[edge.succ as usize], edge.lag_days, span)?;
            latest_finish = latest_finish.min(bound);
        }

        late[id as usize] = Window::from_finish(latest_finish, span)?;
        log_debug!(
            verbosity,
            "  backward {}: LS={} LF={}",
            store.node(id).code,
            late[id as usize].start,
            late[id as usize].finish
        );
    }

    Ok(late)
}

/// Run both passes over a validated store and graph.
pub(crate) fn calculate_critical_path(
    store: &TaskStore,
    graph: &DependencyGraph,
    project_start: NaiveDate,
    config: &EngineConfig,
) -> Result<CriticalPathResult, ScheduleError> {
    let forward = forward_pass(store, graph, project_start, config.verbosity)?;

    let project_end = config.project_end.unwrap_or_else(|| {
        forward
            .early
            .iter()
            .map(|w| w.finish)
            .max()
            .unwrap_or(project_start)
    });

    let late = backward_pass(store, graph, &forward, project_end, config.verbosity)?;

    let mut task_timings: FxHashMap<String, TaskTiming> =
        FxHashMap::with_capacity_and_hasher(store.len(), Default::default());
    let mut order = Vec::with_capacity(store.len());
    let mut critical_path_tasks = Vec::new();

    for &id in &forward.order {
        let code = store.node(id).code.clone();
        let timing = TaskTiming::from_windows(forward.early[id as usize], late[id as usize]);
        if timing.is_critical() {
            critical_path_tasks.push(code.clone());
        }
        task_timings.insert(code.clone(), timing);
        order.push(code);
    }

    Ok(CriticalPathResult {
        task_timings,
        order,
        critical_path_tasks,
        project_start: Some(project_start),
        project_end: Some(project_end),
    })
}

/// Compute earliest/latest start and finish, slack and criticality for every task.
///
/// # Returns
/// * `Ok(CriticalPathResult)` with per-task timings
/// * `Err(ScheduleError::CycleDetected)` before either pass runs if the graph has a cycle
pub fn critical_path(
    snapshot: &Snapshot,
    config: &EngineConfig,
) -> Result<CriticalPathResult, ScheduleError> {
    let store = TaskStore::from_tasks(&snapshot.tasks)?;
    let graph = DependencyGraph::build(&store, &snapshot.dependencies, config.check_cycles)?;
    if store.is_empty() {
        return Ok(CriticalPathResult::default());
    }
    let project_start = resolve_project_start(snapshot.project_start, &store)?;
    calculate_critical_path(&store, &graph, project_start, config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Dependency, DependencyType, TaskNode};

    fn d(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).unwrap()
    }

    fn day(n: i64) -> NaiveDate {
        d(2025, 1, 1) + chrono::Duration::days(n)
    }

    #[test]
    fn test_single_task_is_critical() {
        let snapshot = Snapshot::new(vec![TaskNode::new("A", 5.0).starting(day(0))], vec![]);
        let result = critical_path(&snapshot, &EngineConfig::default()).unwrap();
        let timing = result.timing("A").unwrap();
        assert_eq!(timing.earliest_start, day(0));
        assert_eq!(timing.earliest_finish, day(4));
        assert!(timing.is_critical());
        assert_eq!(result.critical_path_length_days(), 5);
    }

    #[test]
    fn test_fs_ss_chain() {
        let snapshot = Snapshot::new(
            vec![
                TaskNode::new("A", 5.0).starting(day(0)),
                TaskNode::new("B", 3.0),
                TaskNode::new("C", 2.0),
            ],
            vec![
                Dependency::new("A", "B", DependencyType::FS, 2),
                Dependency::new("B", "C", DependencyType::SS, 0),
            ],
        );
        let result = critical_path(&snapshot, &EngineConfig::default()).unwrap();
        assert_eq!(result.timing("B").unwrap().earliest_start, day(6));
        assert_eq!(result.timing("C").unwrap().earliest_start, day(6));
        // B finishes day 8, C day 7: C floats one day
        assert_eq!(result.project_end, Some(day(8)));
        assert_eq!(result.timing("C").unwrap().slack_days, 1);
        assert_eq!(result.critical_path_tasks, vec!["A", "B"]);
    }

    #[test]
    fn test_parallel_branch_slack() {
        // A(3) -> C(2), B(1) -> C: B has two days of slack
        let snapshot = Snapshot::new(
            vec![
                TaskNode::new("A", 3.0),
                TaskNode::new("B", 1.0),
                TaskNode::new("C", 2.0),
            ],
            vec![
                Dependency::new("A", "C", DependencyType::FS, 1),
                Dependency::new("B", "C", DependencyType::FS, 1),
            ],
        )
        .with_project_start(day(0));
        let result = critical_path(&snapshot, &EngineConfig::default()).unwrap();
        assert_eq!(result.timing("C").unwrap().earliest_start, day(3));
        assert_eq!(result.timing("B").unwrap().slack_days, 2);
        assert!(result.is_critical("A"));
        assert!(result.is_critical("C"));
        assert!(!result.is_critical("B"));
    }

    #[test]
    fn test_finish_anchored_types() {
        let snapshot = Snapshot::new(
            vec![
                TaskNode::new("A", 5.0).starting(day(0)),
                TaskNode::new("B", 2.0),
                TaskNode::new("C", 3.0),
            ],
            vec![
                // B must finish on/after A finishes: ES = 4 - 1 = 3
                Dependency::new("A", "B", DependencyType::FF, 0),
                // C must finish on/after A starts + 6: ES = 6 - 2 = 4
                Dependency::new("A", "C", DependencyType::SF, 6),
            ],
        );
        let result = critical_path(&snapshot, &EngineConfig::default()).unwrap();
        assert_eq!(result.timing("B").unwrap().earliest_start, day(3));
        assert_eq!(result.timing("B").unwrap().earliest_finish, day(4));
        assert_eq!(result.timing("C").unwrap().earliest_start, day(4));
        assert_eq!(result.timing("C").unwrap().earliest_finish, day(6));
        // C is the sink ending last
        assert!(result.is_critical("C"));
        // A can slip until C's start bound: LS(A) = LF(C) - 6 = 0
        assert!(result.is_critical("A"));
        assert_eq!(result.timing("B").unwrap().slack_days, 2);
    }

    #[test]
    fn test_negative_lag_floored_at_project_start() {
        let snapshot = Snapshot::new(
            vec![TaskNode::new("A", 2.0), TaskNode::new("B", 2.0)],
            vec![Dependency::new("A", "B", DependencyType::SS, -5)],
        )
        .with_project_start(day(0));
        let result = critical_path(&snapshot, &EngineConfig::default()).unwrap();
        assert_eq!(result.timing("B").unwrap().earliest_start, day(0));
    }

    #[test]
    fn test_milestone_zero_span() {
        let snapshot = Snapshot::new(
            vec![TaskNode::new("A", 3.0), TaskNode::milestone("M")],
            vec![Dependency::new("A", "M", DependencyType::FS, 0)],
        )
        .with_project_start(day(0));
        let result = critical_path(&snapshot, &EngineConfig::default()).unwrap();
        let m = result.timing("M").unwrap();
        assert_eq!(m.earliest_start, m.earliest_finish);
        assert_eq!(m.earliest_start, day(2));
    }

    #[test]
    fn test_project_end_anchor() {
        let snapshot = Snapshot::new(vec![TaskNode::new("A", 2.0).starting(day(0))], vec![]);
        let config = EngineConfig::default().with_project_end(day(4));
        let result = critical_path(&snapshot, &config).unwrap();
        assert_eq!(result.timing("A").unwrap().slack_days, 3);
        assert!(result.critical_path_tasks.is_empty());
    }

    #[test]
    fn test_cycle_aborts() {
        let snapshot = Snapshot::new(
            vec![TaskNode::new("A", 1.0), TaskNode::new("B", 1.0)],
            vec![
                Dependency::new("A", "B", DependencyType::FS, 0),
                Dependency::new("B", "A", DependencyType::FS, 0),
            ],
        )
        .with_project_start(day(0));
        for check_cycles in [true, false] {
            let config = EngineConfig {
                check_cycles,
                ..Default::default()
            };
            assert!(matches!(
                critical_path(&snapshot, &config),
                Err(ScheduleError::CycleDetected { .. })
            ));
        }
    }

    fn summary_chain() -> Snapshot {
        Snapshot::new(
            vec![
                TaskNode::new("1", 0.0),
                TaskNode::new("1.1", 5.0).with_parent("1").starting(day(0)),
                TaskNode::new("1.2", 4.0).with_parent("1"),
                TaskNode::new("2", 2.0),
            ],
            vec![
                Dependency::new("1.1", "1.2", DependencyType::FS, 1),
                Dependency::new("1", "2", DependencyType::FS, 1),
            ],
        )
    }

    #[test]
    fn test_summary_spans_children() {
        let result = critical_path(&summary_chain(), &EngineConfig::default()).unwrap();

        let summary = result.timing("1").unwrap();
        assert_eq!((summary.earliest_start, summary.earliest_finish), (day(0), day(8)));
        // 2 waits for the whole summary, not the summary's own zero duration
        let after = result.timing("2").unwrap();
        assert_eq!((after.earliest_start, after.earliest_finish), (day(9), day(10)));

        assert_eq!(summary.latest_finish, day(8));
        assert_eq!(result.timing("1.2").unwrap().latest_finish, day(8));
        assert_eq!(result.critical_path_tasks, vec!["1.1", "1.2", "1", "2"]);
    }

    #[test]
    fn test_summary_predecessor_bounds_children() {
        let snapshot = Snapshot::new(
            vec![
                TaskNode::new("A", 3.0).starting(day(0)),
                TaskNode::new("2", 0.0),
                TaskNode::new("2.1", 2.0).with_parent("2"),
                TaskNode::new("2.2", 1.0).with_parent("2").starting(day(0)),
            ],
            vec![Dependency::new("A", "2", DependencyType::FS, 0)],
        );
        let result = critical_path(&snapshot, &EngineConfig::default()).unwrap();
        assert_eq!(result.timing("2.1").unwrap().earliest_start, day(2));
        assert_eq!(result.timing("2.2").unwrap().earliest_start, day(2));
        let summary = result.timing("2").unwrap();
        assert_eq!((summary.earliest_start, summary.earliest_finish), (day(2), day(3)));
        for timing in result.task_timings.values() {
            assert!(timing.slack_days >= 0);
        }
    }

    #[test]
    fn test_edge_between_task_and_its_ancestor_is_a_cycle() {
        let snapshot = Snapshot::new(
            vec![
                TaskNode::new("1", 0.0),
                TaskNode::new("1.1", 2.0).with_parent("1").starting(day(0)),
            ],
            vec![Dependency::new("1", "1.1", DependencyType::FS, 0)],
        );
        match critical_path(&snapshot, &EngineConfig::default()) {
            Err(ScheduleError::CycleDetected { cycle }) => {
                assert!(cycle.contains(&"1".to_string()));
                assert!(cycle.contains(&"1.1".to_string()));
            }
            other => panic!("expected cycle, got {:?}", other),
        }
    }

    #[test]
    fn test_huge_duration_is_validation_error() {
        let snapshot = Snapshot::new(vec![TaskNode::new("A", 1.0e9)], vec![])
            .with_project_start(day(0));
        assert!(matches!(
            critical_path(&snapshot, &EngineConfig::default()),
            Err(ScheduleError::Validation { ref field, .. }) if field == "duration_days"
        ));

        let lagged = Snapshot::new(
            vec![TaskNode::new("A", 1.0).starting(day(0)), TaskNode::new("B", 1.0)],
            vec![Dependency::new("A", "B", DependencyType::FS, 1_000_000_000)],
        );
        assert!(matches!(
            critical_path(&lagged, &EngineConfig::default()),
            Err(ScheduleError::Validation { ref field, .. }) if field == "lag_days"
        ));
    }

    #[test]
    fn test_missing_project_start() {
        let snapshot = Snapshot::new(vec![TaskNode::new("A", 1.0)], vec![]);
        assert!(matches!(
            critical_path(&snapshot, &EngineConfig::default()),
            Err(ScheduleError::Validation { ref field, .. }) if field == "project_start"
        ));
        let empty = critical_path(&Snapshot::default(), &EngineConfig::default()).unwrap();
        assert!(empty.task_timings.is_empty());
    }
}
