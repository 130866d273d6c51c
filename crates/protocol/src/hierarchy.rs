use serde::{Deserialize, Serialize};

use crate::shared_str::{FunctionId, SharedStr};

/// One node of a size-weighted call hierarchy.
///
/// Built fresh for every `(root, parent, depth, cutoff)` request and never
/// mutated afterwards. `size` is a layout weight (share of the angle / width
/// the node gets), not a time; `cumulative` is the function's total
/// cumulative time from the stats table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HierarchyNode {
    pub name: FunctionId,
    pub display_name: SharedStr,
    /// Function that invoked this one on the rendered path; `None` only for
    /// the absolute root of a request.
    pub parent_name: Option<FunctionId>,
    pub size: f64,
    pub cumulative: f64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<HierarchyNode>,
}

impl HierarchyNode {
    pub fn leaf(
        name: FunctionId,
        display_name: SharedStr,
        parent_name: Option<FunctionId>,
        size: f64,
        cumulative: f64,
    ) -> Self {
        Self {
            name,
            display_name,
            parent_name,
            size,
            cumulative,
            children: Vec::new(),
        }
    }

    /// Synthetic child standing for time spent in the function itself.
    /// It is the only kind of node whose parent is itself: real recursive
    /// edges are never expanded.
    pub fn is_self_time(&self) -> bool {
        self.parent_name.as_ref() == Some(&self.name)
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    pub fn children_size(&self) -> f64 {
        self.children.iter().map(|c| c.size).sum()
    }

    /// Number of levels, counting this node.
    pub fn depth(&self) -> usize {
        let mut deepest = 0;
        let mut work = vec![(self, 1)];
        while let Some((node, level)) = work.pop() {
            deepest = deepest.max(level);
            work.extend(node.children.iter().map(|c| (c, level + 1)));
        }
        deepest
    }

    pub fn node_count(&self) -> usize {
        let mut count = 0;
        let mut work = vec![self];
        while let Some(node) = work.pop() {
            count += 1;
            work.extend(&node.children);
        }
        count
    }

    /// First child (in order) calling itself `name`, self-time excluded.
    pub fn child(&self, name: &str) -> Option<&HierarchyNode> {
        self.children
            .iter()
            .find(|c| c.name == name && !c.is_self_time())
    }

    /// The synthetic self-time child, if one was added.
    pub fn self_time_child(&self) -> Option<&HierarchyNode> {
        self.children.iter().find(|c| c.is_self_time())
    }
}
