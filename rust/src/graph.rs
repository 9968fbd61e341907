//! Dependency graph over task codes: typed, lagged edges with cycle detection.

use rustc_hash::{FxHashMap, FxHashSet};
use std::cmp::Reverse;
use std::collections::{BinaryHeap, VecDeque};

use crate::error::ScheduleError;
use crate::interner::{CodeInterner, NodeId};
use crate::models::{Dependency, DependencyType};
use crate::store::TaskStore;

/// Resolved edge between two interned nodes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Edge {
    pub pred: NodeId,
    pub succ: NodeId,
    pub dependency_type: DependencyType,
    pub lag_days: i64,
}

/// Directed dependency edges between the tasks of one store.
#[derive(Debug, Clone)]
pub struct DependencyGraph {
    index: CodeInterner,
    dependencies: Vec<Dependency>,
    edges: Vec<Edge>,
    /// Edge indices into `edges`, per node.
    preds: Vec<Vec<usize>>,
    succs: Vec<Vec<usize>>,
    pairs: FxHashSet<(NodeId, NodeId)>,
    check_cycles: bool,
}

impl DependencyGraph {
    /// Empty graph over the store's tasks.
    pub fn new(store: &TaskStore, check_cycles: bool) -> Self {
        let n = store.len();
        Self {
            index: store.interner().clone(),
            dependencies: Vec::new(),
            edges: Vec::new(),
            preds: vec![Vec::new(); n],
            succs: vec![Vec::new(); n],
            pairs: FxHashSet::default(),
            check_cycles,
        }
    }

    /// Graph over the store's tasks with every dependency added in order.
    ///
    /// With `check_cycles`, the finished graph is checked once with a
    /// topological sort instead of a reachability search per edge.
    pub fn build(
        store: &TaskStore,
        dependencies: &[Dependency],
        check_cycles: bool,
    ) -> Result<Self, ScheduleError> {
        let mut graph = Self::new(store, check_cycles);
        for dep in dependencies {
            graph.insert_edge(
                &dep.predecessor_code,
                &dep.successor_code,
                dep.dependency_type,
                dep.lag_days,
                false,
            )?;
        }
        if check_cycles {
            graph.topological_ids()?;
        }
        Ok(graph)
    }

    fn id_of(&self, code: &str) -> Result<NodeId, ScheduleError> {
        self.index.get(code).ok_or_else(|| ScheduleError::not_found(code))
    }

    fn code(&self, id: NodeId) -> String {
        self.index.resolve(id).unwrap_or_default().to_string()
    }

    /// Add an edge. On failure the graph is left unchanged.
    pub fn add_edge(
        &mut self,
        predecessor: &str,
        successor: &str,
        dependency_type: DependencyType,
        lag_days: i64,
    ) -> Result<(), ScheduleError> {
        let check = self.check_cycles;
        self.insert_edge(predecessor, successor, dependency_type, lag_days, check)
    }

    fn insert_edge(
        &mut self,
        predecessor: &str,
        successor: &str,
        dependency_type: DependencyType,
        lag_days: i64,
        check_cycle: bool,
    ) -> Result<(), ScheduleError> {
        let pred = self.id_of(predecessor)?;
        let succ = self.id_of(successor)?;

        if pred == succ {
            return Err(ScheduleError::validation(
                "successor_code",
                format!("task {} cannot depend on itself", predecessor),
            ));
        }
        if self.pairs.contains(&(pred, succ)) {
            return Err(ScheduleError::validation(
                "predecessor_code",
                format!("duplicate dependency {} -> {}", predecessor, successor),
            ));
        }
        if check_cycle {
            // The new edge closes a cycle iff pred is already reachable from succ
            if let Some(path) = self.path_between(succ, pred) {
                let mut cycle = Vec::with_capacity(path.len() + 1);
                cycle.push(self.code(pred));
                cycle.extend(path.into_iter().map(|id| self.code(id)));
                return Err(ScheduleError::CycleDetected { cycle });
            }
        }

        let edge_idx = self.edges.len();
        self.edges.push(Edge {
            pred,
            succ,
            dependency_type,
            lag_days,
        });
        self.dependencies.push(Dependency::new(
            predecessor,
            successor,
            dependency_type,
            lag_days,
        ));
        self.preds[succ as usize].push(edge_idx);
        self.succs[pred as usize].push(edge_idx);
        self.pairs.insert((pred, succ));
        Ok(())
    }

    /// Shortest successor path `from -> ... -> to`, both ends included.
    fn path_between(&self, from: NodeId, to: NodeId) -> Option<Vec<NodeId>> {
        let mut came_from: FxHashMap<NodeId, NodeId> = FxHashMap::default();
        let mut queue = VecDeque::from([from]);
        let mut seen = FxHashSet::from_iter([from]);

        while let Some(current) = queue.pop_front() {
            if current == to {
                let mut path = vec![to];
                let mut cursor = to;
                while let Some(&prev) = came_from.get(&cursor) {
                    path.push(prev);
                    cursor = prev;
                }
                path.reverse();
                return Some(path);
            }
            for &edge_idx in &self.succs[current as usize] {
                let next = self.edges[edge_idx].succ;
                if seen.insert(next) {
                    came_from.insert(next, current);
                    queue.push_back(next);
                }
            }
        }
        None
    }

    /// All dependencies in insertion order.
    pub fn dependencies(&self) -> &[Dependency] {
        &self.dependencies
    }

    pub fn predecessors_of(&self, code: &str) -> Result<Vec<&Dependency>, ScheduleError> {
        let id = self.id_of(code)?;
        Ok(self.preds[id as usize]
            .iter()
            .map(|&e| &self.dependencies[e])
            .collect())
    }

    pub fn successors_of(&self, code: &str) -> Result<Vec<&Dependency>, ScheduleError> {
        let id = self.id_of(code)?;
        Ok(self.succs[id as usize]
            .iter()
            .map(|&e| &self.dependencies[e])
            .collect())
    }

    pub(crate) fn pred_edges(&self, id: NodeId) -> impl Iterator<Item = &Edge> {
        self.preds[id as usize].iter().map(move |&e| &self.edges[e])
    }

    pub(crate) fn succ_edges(&self, id: NodeId) -> impl Iterator<Item = &Edge> {
        self.succs[id as usize].iter().map(move |&e| &self.edges[e])
    }

    /// Predecessor edges bounding a node's start: its own, then each ancestor's.
    pub(crate) fn start_edges<'a>(
        &'a self,
        store: &'a TaskStore,
        id: NodeId,
    ) -> impl Iterator<Item = &'a Edge> + 'a {
        std::iter::once(id)
            .chain(store.ancestor_ids(id))
            .flat_map(move |node| self.pred_edges(node))
    }

    /// Task codes in an order consistent with every edge.
    pub fn topological_order(&self) -> Result<Vec<String>, ScheduleError> {
        Ok(self
            .topological_ids()?
            .into_iter()
            .map(|id| self.code(id))
            .collect())
    }

    /// Kahn's algorithm; ties go to the task inserted first.
    pub(crate) fn topological_ids(&self) -> Result<Vec<NodeId>, ScheduleError> {
        let n = self.index.len();
        let mut in_degree: Vec<usize> = self.preds.iter().map(|p| p.len()).collect();

        let mut ready: BinaryHeap<Reverse<NodeId>> = (0..n as NodeId)
            .filter(|&id| in_degree[id as usize] == 0)
            .map(Reverse)
            .collect();

        let mut order = Vec::with_capacity(n);
        while let Some(Reverse(id)) = ready.pop() {
            order.push(id);
            for edge in self.succ_edges(id) {
                let degree = &mut in_degree[edge.succ as usize];
                *degree -= 1;
                if *degree == 0 {
                    ready.push(Reverse(edge.succ));
                }
            }
        }

        if order.len() != n {
            return Err(ScheduleError::CycleDetected {
                cycle: self.find_cycle(&in_degree),
            });
        }
        Ok(order)
    }

    /// Extract one concrete cycle among the nodes Kahn's algorithm could not release.
    ///
    /// Every such node still has an unreleased predecessor, so walking
    /// predecessors must revisit a node.
    fn find_cycle(&self, in_degree: &[usize]) -> Vec<String> {
        let Some(start) = (0..in_degree.len()).find(|&i| in_degree[i] > 0) else {
            return Vec::new();
        };

        let mut walk: Vec<NodeId> = Vec::new();
        let mut position: FxHashMap<NodeId, usize> = FxHashMap::default();
        let mut current = start as NodeId;

        while !position.contains_key(&current) {
            position.insert(current, walk.len());
            walk.push(current);
            match self
                .pred_edges(current)
                .map(|e| e.pred)
                .find(|&p| in_degree[p as usize] > 0)
            {
                Some(pred) => current = pred,
                None => break,
            }
        }

        let from = position.get(&current).copied().unwrap_or(0);
        // Walked against edge direction; flip to successor order and close the loop
        let mut cycle: Vec<String> = walk[from..].iter().rev().map(|&id| self.code(id)).collect();
        if let Some(first) = cycle.first().cloned() {
            cycle.push(first);
        }
        cycle
    }
}

/// Order ids so that every id in `waits_on[id]` comes before `id`.
///
/// Kahn's algorithm with ties going to the lowest id. When no order exists,
/// returns one closed loop of ids in dependency order, first id repeated last.
pub(crate) fn order_waiting(waits_on: &[Vec<NodeId>]) -> Result<Vec<NodeId>, Vec<NodeId>> {
    let n = waits_on.len();
    let mut in_degree: Vec<usize> = waits_on.iter().map(|w| w.len()).collect();
    let mut unblocks: Vec<Vec<NodeId>> = vec![Vec::new(); n];
    for (id, waits) in waits_on.iter().enumerate() {
        for &before in waits {
            unblocks[before as usize].push(id as NodeId);
        }
    }

    let mut ready: BinaryHeap<Reverse<NodeId>> = (0..n as NodeId)
        .filter(|&id| in_degree[id as usize] == 0)
        .map(Reverse)
        .collect();
    let mut order = Vec::with_capacity(n);
    while let Some(Reverse(id)) = ready.pop() {
        order.push(id);
        for &next in &unblocks[id as usize] {
            let degree = &mut in_degree[next as usize];
            *degree -= 1;
            if *degree == 0 {
                ready.push(Reverse(next));
            }
        }
    }
    if order.len() == n {
        return Ok(order);
    }

    // Every unreleased id waits on another unreleased id, so the walk loops
    let Some(start) = (0..n).find(|&i| in_degree[i] > 0) else {
        return Err(Vec::new());
    };
    let mut walk: Vec<NodeId> = Vec::new();
    let mut position: FxHashMap<NodeId, usize> = FxHashMap::default();
    let mut current = start as NodeId;
    while !position.contains_key(&current) {
        position.insert(current, walk.len());
        walk.push(current);
        match waits_on[current as usize]
            .iter()
            .copied()
            .find(|&w| in_degree[w as usize] > 0)
        {
            Some(before) => current = before,
            None => break,
        }
    }
    let from = position.get(&current).copied().unwrap_or(0);
    let mut cycle: Vec<NodeId> = walk[from..].iter().rev().copied().collect();
    if let Some(&first) = cycle.first() {
        cycle.push(first);
    }
    Err(cycle)
}
