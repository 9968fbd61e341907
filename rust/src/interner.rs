//! Arena of task codes.
//!
//! Maps task codes to dense integer ids so tree and graph relations can be
//! stored as plain vectors indexed by id, never as references between nodes.

use rustc_hash::FxHashMap;

/// Dense node id (u32 for compact storage and fast hashing).
pub type NodeId = u32;

/// Bidirectional code <-> id mapping. Ids follow insertion order.
#[derive(Debug, Clone)]
pub struct CodeInterner {
    to_id: FxHashMap<String, NodeId>,
    from_id: Vec<String>,
}

impl CodeInterner {
    /// Create a new interner with pre-allocated capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            to_id: FxHashMap::with_capacity_and_hasher(capacity, Default::default()),
            from_id: Vec::with_capacity(capacity),
        }
    }

    /// Intern a code, returning its id and whether it was newly added.
    pub fn intern(&mut self, code: &str) -> (NodeId, bool) {
        if let Some(&id) = self.to_id.get(code) {
            return (id, false);
        }
        let id = self.from_id.len() as NodeId;
        self.from_id.push(code.to_string());
        self.to_id.insert(code.to_string(), id);
        (id, true)
    }

    #[inline]
    pub fn get(&self, code: &str) -> Option<NodeId> {
        self.to_id.get(code).copied()
    }

    #[inline]
    pub fn resolve(&self, id: NodeId) -> Option<&str> {
        self.from_id.get(id as usize).map(|s| s.as_str())
    }

    /// All codes in id order.
    pub fn codes(&self) -> impl Iterator<Item = &str> {
        self.from_id.iter().map(|s| s.as_str())
    }

    pub fn len(&self) -> usize {
        self.from_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.from_id.is_empty()
    }
}

impl Default for CodeInterner {
    fn default() -> Self {
        Self::with_capacity(0)
    }
}
