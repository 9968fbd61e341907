//! Bottom-up rollup of planned dates and progress from children to parents.
//!
//! A parent spans its dated children: earliest child start to latest child
//! end. A child counts as dated once it has a start; a missing end is derived
//! from its duration, and a child with only an end is ignored. A parent
//! without dated children keeps its own dates. Progress is the
//! duration-weighted mean of the children, a zero-duration child weighing 1.

use crate::config::EngineConfig;
use crate::error::ScheduleError;
use crate::interner::NodeId;
use crate::models::{Snapshot, Window};
use crate::store::TaskStore;
use crate::{log_changes, log_checks};

/// Weight of a child in its parent's progress.
fn progress_weight(duration_days: f64) -> f64 {
    if duration_days == 0.0 {
        1.0
    } else {
        duration_days
    }
}

/// Recompute one node's dates from its direct children.
pub(crate) fn rollup_dates_at(store: &mut TaskStore, id: NodeId, verbosity: u8) -> bool {
    let children = store.child_ids(id);
    if children.is_empty() {
        return false;
    }

    let span = children
        .iter()
        .filter_map(|&c| store.node(c).planned_window().ok().flatten())
        .reduce(Window::cover);
    let Some(span) = span else {
        log_checks!(
            verbosity,
            "  rollup {}: no dated children, keeping own dates",
            store.node(id).code
        );
        return false;
    };

    let (start, end) = (Some(span.start), Some(span.finish));
    let changed = store.set_dates_by_id(id, start, end);
    if changed {
        log_changes!(
            verbosity,
            "  rollup {}: dates -> {:?}..{:?}",
            store.node(id).code,
            start,
            end
        );
    }
    changed
}

/// Recompute one node's progress from its direct children.
pub(crate) fn rollup_progress_at(store: &mut TaskStore, id: NodeId, verbosity: u8) -> bool {
    let children = store.child_ids(id);
    if children.is_empty() {
        return false;
    }

    let (weighted, total) = children.iter().fold((0.0, 0.0), |(sum, weight), &c| {
        let child = store.node(c);
        let w = progress_weight(child.duration_days);
        (sum + child.percent_complete * w, weight + w)
    });
    let percent = weighted / total;

    let changed = store.set_progress_by_id(id, percent);
    if changed {
        log_changes!(
            verbosity,
            "  rollup {}: progress -> {:.2}%",
            store.node(id).code,
            percent
        );
    }
    changed
}

/// Roll up dates over a subtree (or the whole forest), deepest nodes first.
pub(crate) fn rollup_dates_tree(store: &mut TaskStore, root: Option<NodeId>, verbosity: u8) -> bool {
    let mut changed = false;
    for id in store.bottom_up_ids(root) {
        changed |= rollup_dates_at(store, id, verbosity);
    }
    changed
}

/// Roll up progress over a subtree (or the whole forest), deepest nodes first.
pub(crate) fn rollup_progress_tree(
    store: &mut TaskStore,
    root: Option<NodeId>,
    verbosity: u8,
) -> bool {
    let mut changed = false;
    for id in store.bottom_up_ids(root) {
        changed |= rollup_progress_at(store, id, verbosity);
    }
    changed
}

/// Re-roll every ancestor of `id`, nearest first, stopping at the first
/// ancestor that does not change. Returns the ancestors that changed.
pub(crate) fn propagate_from(store: &mut TaskStore, id: NodeId, verbosity: u8) -> Vec<NodeId> {
    let ancestors: Vec<NodeId> = store.ancestor_ids(id).collect();
    let mut changed = Vec::new();
    for ancestor in ancestors {
        let dates = rollup_dates_at(store, ancestor, verbosity);
        let progress = rollup_progress_at(store, ancestor, verbosity);
        if !dates && !progress {
            break;
        }
        changed.push(ancestor);
    }
    changed
}

fn with_tasks(snapshot: &Snapshot, store: TaskStore) -> Snapshot {
    Snapshot {
        project_start: snapshot.project_start,
        tasks: store.into_tasks(),
        dependencies: snapshot.dependencies.clone(),
    }
}

/// Recompute planned dates over the subtree rooted at `root_code`.
pub fn rollup_dates(
    snapshot: &Snapshot,
    root_code: &str,
    config: &EngineConfig,
) -> Result<(bool, Snapshot), ScheduleError> {
    let mut store = TaskStore::from_tasks(&snapshot.tasks)?;
    let root = store.id_of(root_code)?;
    let changed = rollup_dates_tree(&mut store, Some(root), config.verbosity);
    Ok((changed, with_tasks(snapshot, store)))
}

/// Recompute progress over the subtree rooted at `root_code`.
pub fn rollup_progress(
    snapshot: &Snapshot,
    root_code: &str,
    config: &EngineConfig,
) -> Result<(bool, Snapshot), ScheduleError> {
    let mut store = TaskStore::from_tasks(&snapshot.tasks)?;
    let root = store.id_of(root_code)?;
    let changed = rollup_progress_tree(&mut store, Some(root), config.verbosity);
    Ok((changed, with_tasks(snapshot, store)))
}

/// Recompute dates and progress over the whole forest.
pub fn rollup_all(
    snapshot: &Snapshot,
    config: &EngineConfig,
) -> Result<(bool, Snapshot), ScheduleError> {
    let mut store = TaskStore::from_tasks(&snapshot.tasks)?;
    let dates = rollup_dates_tree(&mut store, None, config.verbosity);
    let progress = rollup_progress_tree(&mut store, None, config.verbosity);
    Ok((dates || progress, with_tasks(snapshot, store)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TaskNode;
    use chrono::NaiveDate;

    fn d(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).unwrap()
    }

    fn tree() -> Snapshot {
        Snapshot::new(
            vec![
                TaskNode::new("1", 0.0),
                TaskNode::new("1.1", 2.0)
                    .with_parent("1")
                    .with_dates(d(2025, 1, 6), d(2025, 1, 7))
                    .with_progress(50.0),
                TaskNode::new("1.2", 0.0).with_parent("1"),
                TaskNode::new("1.2.1", 8.0)
                    .with_parent("1.2")
                    .with_dates(d(2025, 1, 2), d(2025, 1, 9))
                    .with_progress(100.0),
            ],
            vec![],
        )
    }

    #[test]
    fn test_dates_span_children() {
        let (changed, out) = rollup_dates(&tree(), "1", &EngineConfig::default()).unwrap();
        assert!(changed);
        let parent = out.task("1").unwrap();
        assert_eq!(parent.planned_start, Some(d(2025, 1, 2)));
        assert_eq!(parent.planned_end, Some(d(2025, 1, 9)));
        // Intermediate summary rolled up first
        let mid = out.task("1.2").unwrap();
        assert_eq!(mid.planned_start, Some(d(2025, 1, 2)));
    }

    #[test]
    fn test_undated_children_keep_parent_dates() {
        let snapshot = Snapshot::new(
            vec![
                TaskNode::new("1", 0.0).with_dates(d(2025, 2, 1), d(2025, 2, 3)),
                TaskNode::new("1.1", 2.0).with_parent("1"),
            ],
            vec![],
        );
        let (changed, out) = rollup_dates(&snapshot, "1", &EngineConfig::default()).unwrap();
        assert!(!changed);
        assert_eq!(out.task("1").unwrap().planned_start, Some(d(2025, 2, 1)));
    }

    #[test]
    fn test_half_dated_children_keep_parent_ordered() {
        let mut starts_only = TaskNode::new("1.1", 3.0).with_parent("1");
        starts_only.planned_start = Some(d(2025, 1, 10));
        let mut ends_only = TaskNode::new("1.2", 1.0).with_parent("1");
        ends_only.planned_end = Some(d(2025, 1, 5));
        let snapshot = Snapshot::new(vec![TaskNode::new("1", 0.0), starts_only, ends_only], vec![]);

        let (_, out) = rollup_dates(&snapshot, "1", &EngineConfig::default()).unwrap();
        let parent = out.task("1").unwrap();
        // 1.1 ends on its derived day, 1.2 has no start and is left out
        assert_eq!(parent.planned_start, Some(d(2025, 1, 10)));
        assert_eq!(parent.planned_end, Some(d(2025, 1, 12)));
        assert!(TaskStore::from_tasks(&out.tasks).is_ok());
    }

    #[test]
    fn test_progress_weighted_by_duration() {
        // Both children under one parent: 2 days at 50%, 8 days at 100%
        let snapshot = Snapshot::new(
            vec![
                TaskNode::new("1", 0.0),
                TaskNode::new("1.1", 2.0).with_parent("1").with_progress(50.0),
                TaskNode::new("1.2", 8.0).with_parent("1").with_progress(100.0),
            ],
            vec![],
        );
        let (changed, out) = rollup_progress(&snapshot, "1", &EngineConfig::default()).unwrap();
        assert!(changed);
        assert!((out.task("1").unwrap().percent_complete - 90.0).abs() < 1e-9);
    }

    #[test]
    fn test_zero_duration_child_weighs_one() {
        let snapshot = Snapshot::new(
            vec![
                TaskNode::new("1", 0.0),
                TaskNode::milestone("1.1").with_parent("1").with_progress(100.0),
                TaskNode::new("1.2", 1.0).with_parent("1"),
            ],
            vec![],
        );
        let (_, out) = rollup_progress(&snapshot, "1", &EngineConfig::default()).unwrap();
        assert!((out.task("1").unwrap().percent_complete - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_rollup_idempotent() {
        let config = EngineConfig::default();
        let (_, once) = rollup_all(&tree(), &config).unwrap();
        let (changed, twice) = rollup_all(&once, &config).unwrap();
        assert!(!changed);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_propagate_stops_at_unchanged_ancestor() {
        let (_, rolled) = rollup_all(&tree(), &EngineConfig::default()).unwrap();
        let mut store = TaskStore::from_tasks(&rolled.tasks).unwrap();
        let leaf = store.id_of("1.2.1").unwrap();

        // Nothing changed below, so nothing above changes
        assert!(propagate_from(&mut store, leaf, 0).is_empty());

        store
            .set_dates("1.2.1", Some(d(2025, 1, 1)), Some(d(2025, 1, 8)))
            .unwrap();
        let changed: Vec<String> = propagate_from(&mut store, leaf, 0)
            .into_iter()
            .map(|id| store.node(id).code.clone())
            .collect();
        assert_eq!(changed, vec!["1.2", "1"]);
        assert_eq!(store.get("1").unwrap().planned_start, Some(d(2025, 1, 1)));
    }

    #[test]
    fn test_unknown_root() {
        assert_eq!(
            rollup_dates(&tree(), "7", &EngineConfig::default()).unwrap_err(),
            ScheduleError::NotFound("7".to_string())
        );
    }
}
