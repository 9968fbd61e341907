//! In-memory task forest with code-addressed navigation.

use chrono::NaiveDate;

use crate::error::ScheduleError;
use crate::interner::{CodeInterner, NodeId};
use crate::models::TaskNode;

/// Owns every task of one project. Parent/child relations are id-indexed
/// vectors over the code arena.
#[derive(Debug, Clone)]
pub struct TaskStore {
    index: CodeInterner,
    nodes: Vec<TaskNode>,
    parents: Vec<Option<NodeId>>,
    children: Vec<Vec<NodeId>>,
}

/// Check a single node's own fields.
fn validate_node(task: &TaskNode) -> Result<(), ScheduleError> {
    if task.code.trim().is_empty() {
        return Err(ScheduleError::validation("code", "must not be empty"));
    }
    if !task.duration_days.is_finite() || task.duration_days < 0.0 {
        return Err(ScheduleError::validation(
            "duration_days",
            format!(
                "task {} has invalid duration {}",
                task.code, task.duration_days
            ),
        ));
    }
    if !task.percent_complete.is_finite() || !(0.0..=100.0).contains(&task.percent_complete) {
        return Err(ScheduleError::validation(
            "percent_complete",
            format!(
                "task {} has progress {} outside 0-100",
                task.code, task.percent_complete
            ),
        ));
    }
    if let (Some(start), Some(end)) = (task.planned_start, task.planned_end) {
        validate_dates(task, start, end)?;
    }
    // A start without an end needs a representable derived end
    task.planned_window()?;
    if task.is_milestone && task.duration_days != 0.0 {
        return Err(ScheduleError::validation(
            "duration_days",
            format!("milestone {} must have zero duration", task.code),
        ));
    }
    Ok(())
}

/// Check a planned date pair against the task it is meant for.
fn validate_dates(task: &TaskNode, start: NaiveDate, end: NaiveDate) -> Result<(), ScheduleError> {
    if end < start {
        return Err(ScheduleError::validation(
            "planned_end",
            format!("task {} ends {} before it starts {}", task.code, end, start),
        ));
    }
    if task.is_milestone && start != end {
        return Err(ScheduleError::validation(
            "planned_end",
            format!("milestone {} must start and end on the same day", task.code),
        ));
    }
    Ok(())
}

/// Code of the node this code's dot-prefix names, if it has one.
fn prefix_parent(code: &str) -> Option<&str> {
    code.rfind('.').map(|pos| &code[..pos])
}

impl TaskStore {
    /// Build and validate a store from a task list.
    pub fn from_tasks(tasks: &[TaskNode]) -> Result<Self, ScheduleError> {
        let mut index = CodeInterner::with_capacity(tasks.len());
        let mut nodes = Vec::with_capacity(tasks.len());

        for task in tasks {
            validate_node(task)?;
            let (_, is_new) = index.intern(&task.code);
            if !is_new {
                return Err(ScheduleError::validation(
                    "code",
                    format!("duplicate task code {}", task.code),
                ));
            }
            nodes.push(task.clone());
        }

        let mut parents = vec![None; nodes.len()];
        let mut children: Vec<Vec<NodeId>> = vec![Vec::new(); nodes.len()];

        for (idx, task) in nodes.iter().enumerate() {
            let expected = prefix_parent(&task.code);
            match (&task.parent_code, expected) {
                (Some(parent), Some(prefix)) if parent == prefix => {
                    let parent_id = index
                        .get(parent)
                        .ok_or_else(|| ScheduleError::not_found(parent))?;
                    parents[idx] = Some(parent_id);
                    children[parent_id as usize].push(idx as NodeId);
                }
                (Some(parent), _) => {
                    return Err(ScheduleError::validation(
                        "parent_code",
                        format!("{} is not the code prefix of {}", parent, task.code),
                    ));
                }
                (None, Some(prefix)) if index.get(prefix).is_some() => {
                    return Err(ScheduleError::validation(
                        "parent_code",
                        format!("task {} must name its parent {}", task.code, prefix),
                    ));
                }
                (None, _) => {}
            }
        }

        Ok(Self {
            index,
            nodes,
            parents,
            children,
        })
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, code: &str) -> bool {
        self.index.get(code).is_some()
    }

    /// All tasks in insertion order.
    pub fn tasks(&self) -> &[TaskNode] {
        &self.nodes
    }

    pub fn into_tasks(self) -> Vec<TaskNode> {
        self.nodes
    }

    pub fn codes(&self) -> impl Iterator<Item = &str> {
        self.index.codes()
    }

    pub(crate) fn interner(&self) -> &CodeInterner {
        &self.index
    }

    pub(crate) fn id_of(&self, code: &str) -> Result<NodeId, ScheduleError> {
        self.index.get(code).ok_or_else(|| ScheduleError::not_found(code))
    }

    pub(crate) fn node(&self, id: NodeId) -> &TaskNode {
        &self.nodes[id as usize]
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut TaskNode {
        &mut self.nodes[id as usize]
    }

    pub(crate) fn parent_id(&self, id: NodeId) -> Option<NodeId> {
        self.parents[id as usize]
    }

    pub(crate) fn child_ids(&self, id: NodeId) -> &[NodeId] {
        &self.children[id as usize]
    }

    pub fn get(&self, code: &str) -> Result<&TaskNode, ScheduleError> {
        Ok(self.node(self.id_of(code)?))
    }

    /// Direct children in insertion order.
    pub fn children_of(&self, code: &str) -> Result<Vec<&TaskNode>, ScheduleError> {
        let id = self.id_of(code)?;
        Ok(self.child_ids(id).iter().map(|&c| self.node(c)).collect())
    }

    /// Every node whose code starts with `code + "."`.
    pub fn descendants_of(&self, code: &str) -> Result<Vec<&TaskNode>, ScheduleError> {
        self.id_of(code)?;
        let prefix = TaskNode::descendant_prefix(code);
        Ok(self
            .nodes
            .iter()
            .filter(|t| t.code.starts_with(&prefix))
            .collect())
    }

    /// Ancestors from the parent up to the root.
    pub fn ancestors_of(&self, code: &str) -> Result<Vec<&TaskNode>, ScheduleError> {
        let id = self.id_of(code)?;
        Ok(self.ancestor_ids(id).map(|a| self.node(a)).collect())
    }

    pub(crate) fn ancestor_ids(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(self.parent_id(id), move |&p| self.parent_id(p))
    }

    /// True if any ancestor is collapsed in the tree view.
    pub fn is_collapsed_ancestor(&self, code: &str) -> Result<bool, ScheduleError> {
        let id = self.id_of(code)?;
        Ok(self.ancestor_ids(id).any(|a| self.node(a).collapsed))
    }

    pub fn is_leaf(&self, code: &str) -> Result<bool, ScheduleError> {
        Ok(self.child_ids(self.id_of(code)?).is_empty())
    }

    pub fn depth_of(&self, code: &str) -> Result<usize, ScheduleError> {
        Ok(self.ancestor_ids(self.id_of(code)?).count())
    }

    pub fn roots(&self) -> Vec<&TaskNode> {
        self.root_ids().map(|id| self.node(id)).collect()
    }

    fn root_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        (0..self.nodes.len() as NodeId).filter(move |&id| self.parent_id(id).is_none())
    }

    /// Earliest planned start and latest planned end across the project.
    pub fn date_range(&self) -> Option<(NaiveDate, NaiveDate)> {
        let start = self.nodes.iter().filter_map(|t| t.planned_start).min()?;
        let end = self
            .nodes
            .iter()
            .filter_map(|t| t.planned_end)
            .max()
            .unwrap_or(start);
        Some((start, end.max(start)))
    }

    /// Post-order ids (children before parents) of the subtree at `root`,
    /// or of the whole forest when `root` is `None`.
    pub(crate) fn bottom_up_ids(&self, root: Option<NodeId>) -> Vec<NodeId> {
        let starts: Vec<NodeId> = match root {
            Some(id) => vec![id],
            None => self.root_ids().collect(),
        };

        let mut order = Vec::with_capacity(self.nodes.len());
        // (node, children already pushed)
        let mut stack: Vec<(NodeId, bool)> = starts.into_iter().rev().map(|id| (id, false)).collect();
        while let Some((id, expanded)) = stack.pop() {
            if expanded {
                order.push(id);
                continue;
            }
            stack.push((id, true));
            for &child in self.child_ids(id).iter().rev() {
                stack.push((child, false));
            }
        }
        order
    }

    /// Overwrite planned dates. Returns whether anything changed.
    ///
    /// The pair is validated like a loaded task's: the end may not precede the
    /// start and a milestone must start and end on the same day.
    pub fn set_dates(
        &mut self,
        code: &str,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<bool, ScheduleError> {
        let id = self.id_of(code)?;
        if let (Some(start), Some(end)) = (start, end) {
            validate_dates(self.node(id), start, end)?;
        }
        Ok(self.set_dates_by_id(id, start, end))
    }

    pub(crate) fn set_dates_by_id(
        &mut self,
        id: NodeId,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> bool {
        let node = self.node_mut(id);
        if node.planned_start == start && node.planned_end == end {
            return false;
        }
        node.planned_start = start;
        node.planned_end = end;
        true
    }

    /// Overwrite progress. Returns whether anything changed.
    pub fn set_progress(&mut self, code: &str, percent_complete: f64) -> Result<bool, ScheduleError> {
        if !percent_complete.is_finite() || !(0.0..=100.0).contains(&percent_complete) {
            return Err(ScheduleError::validation(
                "percent_complete",
                format!("{} is outside 0-100", percent_complete),
            ));
        }
        let id = self.id_of(code)?;
        Ok(self.set_progress_by_id(id, percent_complete))
    }

    pub(crate) fn set_progress_by_id(&mut self, id: NodeId, percent_complete: f64) -> bool {
        let node = self.node_mut(id);
        if (node.percent_complete - percent_complete).abs() < 1e-9 {
            return false;
        }
        node.percent_complete = percent_complete;
        true
    }
}
