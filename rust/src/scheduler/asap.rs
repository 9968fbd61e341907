//! ASAP auto-scheduling: assign every task its earliest feasible dates.

use chrono::NaiveDate;

use crate::config::EngineConfig;
use crate::critical_path::{forward_pass, resolve_project_start};
use crate::error::ScheduleError;
use crate::graph::DependencyGraph;
use crate::log_changes;
use crate::models::Snapshot;
use crate::rollup::{rollup_dates_tree, rollup_progress_tree};
use crate::store::TaskStore;

type PlannedDates = (Option<NaiveDate>, Option<NaiveDate>);

pub(crate) fn planned_dates(store: &TaskStore) -> Vec<PlannedDates> {
    store
        .tasks()
        .iter()
        .map(|t| (t.planned_start, t.planned_end))
        .collect()
}

/// Recompute planned dates as the forward pass of the critical path method,
/// then roll the whole forest up.
///
/// Tasks with no predecessors, on themselves or any ancestor, keep their
/// planned start (unless it precedes the project start). Summary tasks get
/// the span of their children, so a successor of a summary waits for the
/// whole subtree.
///
/// # Returns
/// * `Ok((changed_codes, snapshot))` where `changed_codes` lists, in task
///   order, every task whose planned dates differ from the input
/// * `Err(ScheduleError::CycleDetected)` if the graph has a cycle
pub fn asap_schedule(
    snapshot: &Snapshot,
    config: &EngineConfig,
) -> Result<(Vec<String>, Snapshot), ScheduleError> {
    let mut store = TaskStore::from_tasks(&snapshot.tasks)?;
    let graph = DependencyGraph::build(&store, &snapshot.dependencies, config.check_cycles)?;
    if store.is_empty() {
        return Ok((Vec::new(), snapshot.clone()));
    }

    let before = planned_dates(&store);
    let project_start = resolve_project_start(snapshot.project_start, &store)?;
    let forward = forward_pass(&store, &graph, project_start, config.verbosity)?;

    for &id in &forward.order {
        let window = forward.early[id as usize];
        if store.set_dates_by_id(id, Some(window.start), Some(window.finish)) {
            log_changes!(
                config.verbosity,
                "  asap {}: {}..{}",
                store.node(id).code,
                window.start,
                window.finish
            );
        }
    }

    rollup_dates_tree(&mut store, None, config.verbosity);
    rollup_progress_tree(&mut store, None, config.verbosity);

    let changed: Vec<String> = store
        .tasks()
        .iter()
        .zip(&before)
        .filter(|(task, (start, end))| task.planned_start != *start || task.planned_end != *end)
        .map(|(task, _)| task.code.clone())
        .collect();

    Ok((
        changed,
        Snapshot {
            project_start: snapshot.project_start,
            tasks: store.into_tasks(),
            dependencies: snapshot.dependencies.clone(),
        },
    ))
}
