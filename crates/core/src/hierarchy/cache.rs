use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use callwheel_protocol::{FunctionId, HierarchyNode, HierarchyRequest};
use tracing::debug;

/// Identity of a hierarchy request: `(root, parent, depth, cutoff)`.
///
/// The cutoff is kept as its bit pattern so keys hash and compare exactly.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestKey {
    pub root: FunctionId,
    pub parent: Option<FunctionId>,
    pub depth: u32,
    cutoff_bits: u64,
}

impl RequestKey {
    pub fn new(root: FunctionId, parent: Option<FunctionId>, depth: u32, cutoff: f64) -> Self {
        Self {
            root,
            parent,
            depth,
            cutoff_bits: cutoff.to_bits(),
        }
    }

    pub fn cutoff(&self) -> f64 {
        f64::from_bits(self.cutoff_bits)
    }
}

impl From<&HierarchyRequest> for RequestKey {
    fn from(req: &HierarchyRequest) -> Self {
        Self::new(req.name.clone(), req.parent_name.clone(), req.depth, req.cutoff)
    }
}

impl fmt::Display for RequestKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parent = self.parent.as_deref().unwrap_or("");
        write!(f, "{}|{}|{}|{}", self.root, parent, self.depth, self.cutoff())
    }
}

/// Session-scoped memo of built hierarchies.
///
/// The stats table never changes after load, so entries are never
/// invalidated or evicted. Failed builds are never inserted.
#[derive(Debug, Default)]
pub struct HierarchyCache {
    entries: HashMap<RequestKey, Arc<HierarchyNode>>,
    hits: u64,
    misses: u64,
}

impl HierarchyCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&mut self, key: &RequestKey) -> Option<Arc<HierarchyNode>> {
        match self.entries.get(key) {
            Some(tree) => {
                self.hits += 1;
                debug!(%key, "hierarchy cache hit");
                Some(Arc::clone(tree))
            }
            None => {
                self.misses += 1;
                debug!(%key, "hierarchy cache miss");
                None
            }
        }
    }

    pub fn put(&mut self, key: RequestKey, tree: Arc<HierarchyNode>) {
        self.entries.insert(key, tree);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }

    pub fn misses(&self) -> u64 {
        self.misses
    }
}
