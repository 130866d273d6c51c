use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};

use callwheel_protocol::{FunctionId, HierarchyNode, HierarchyRequest};
use thiserror::Error;

use crate::model::StatsTable;

/// Weight given to the root of every request.
pub const ROOT_SIZE: f64 = 1.0;

/// Deepest hierarchy a build may produce, counting the root. Building,
/// flattening and dropping a tree all walk it recursively, so deeper call
/// paths are refused rather than allowed to overflow the stack.
pub const MAX_LEVELS: usize = 512;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum BuildError {
    #[error("function {0} is not in the stats table")]
    UnknownFunction(FunctionId),
    #[error("no caller edge {caller} -> {callee} in the stats table")]
    MissingCallerEdge { callee: FunctionId, caller: FunctionId },
    #[error("hierarchy build was cancelled")]
    Cancelled,
    #[error("call path is deeper than {limit} levels; lower the depth")]
    TooDeep { limit: usize },
}

/// Converts the flat stats table into a size-weighted tree.
///
/// A node's `size` is split among its callees in proportion to the time
/// each callee spent when called from this node's function. Whatever is not
/// attributed to a callee becomes a synthetic self-time child.
pub struct HierarchyBuilder<'a> {
    stats: &'a StatsTable,
    cancel: Option<&'a AtomicBool>,
}

impl<'a> HierarchyBuilder<'a> {
    pub fn new(stats: &'a StatsTable) -> Self {
        Self { stats, cancel: None }
    }

    /// Abort with [`BuildError::Cancelled`] once `flag` is raised.
    pub fn with_cancel(mut self, flag: &'a AtomicBool) -> Self {
        self.cancel = Some(flag);
        self
    }

    pub fn build_request(&self, request: &HierarchyRequest) -> Result<HierarchyNode, BuildError> {
        self.build(&request.name, request.parent_name.as_ref(), request.depth)
    }

    /// Build the tree rooted at `root`, as reached from `parent` (`None` for
    /// the absolute root), expanding at most `depth` levels below it.
    pub fn build(
        &self,
        root: &FunctionId,
        parent: Option<&FunctionId>,
        depth: u32,
    ) -> Result<HierarchyNode, BuildError> {
        let mut path = HashSet::new();
        self.node(root, parent, depth, 0, ROOT_SIZE, &mut path)
    }

    fn node<'s>(
        &'s self,
        name: &'s FunctionId,
        parent: Option<&FunctionId>,
        depth: u32,
        level: usize,
        size: f64,
        path: &mut HashSet<&'s str>,
    ) -> Result<HierarchyNode, BuildError> {
        if self.cancel.is_some_and(|flag| flag.load(Ordering::Relaxed)) {
            return Err(BuildError::Cancelled);
        }
        if level >= MAX_LEVELS {
            return Err(BuildError::TooDeep { limit: MAX_LEVELS });
        }

        let function = self
            .stats
            .get(name)
            .ok_or_else(|| BuildError::UnknownFunction(name.clone()))?;
        let cumulative = function.stats.cumulative_time;
        let parent_time = match parent {
            None => cumulative,
            Some(parent) => self.edge_time(name, parent)?,
        };

        let mut node = HierarchyNode::leaf(
            name.clone(),
            self.stats.display_name(name),
            parent.cloned(),
            size,
            cumulative,
        );
        if depth == 0 || function.children.is_empty() {
            return Ok(node);
        }

        path.insert(name.as_str());

        let mut sized = Vec::with_capacity(function.children.len());
        let mut time_in_children = 0.0;
        for child in &function.children {
            let edge_time = self.edge_time(child, name)?;
            time_in_children += edge_time;
            // Recursive calls are drawn once per path; the re-entry is elided.
            if path.contains(child.as_str()) {
                continue;
            }
            sized.push((child, fraction(edge_time, parent_time) * size));
        }

        let children_size: f64 = sized.iter().map(|(_, s)| s).sum();
        let overflow = children_size > size;
        if overflow {
            let scale = size / children_size;
            for (_, child_size) in &mut sized {
                *child_size *= scale;
            }
        }

        for (child, child_size) in sized {
            let built = self.node(child, Some(name), depth - 1, level + 1, child_size, path)?;
            node.children.push(built);
        }

        if !overflow {
            let self_size = (fraction(parent_time - time_in_children, parent_time) * size).max(0.0);
            node.children.push(HierarchyNode::leaf(
                name.clone(),
                node.display_name.clone(),
                Some(name.clone()),
                self_size,
                cumulative,
            ));
        }

        path.remove(name.as_str());
        Ok(node)
    }

    fn edge_time(&self, callee: &FunctionId, caller: &FunctionId) -> Result<f64, BuildError> {
        self.stats
            .caller_edge(callee, caller)
            .map(|edge| edge.cumulative_time)
            .ok_or_else(|| BuildError::MissingCallerEdge {
                callee: callee.clone(),
                caller: caller.clone(),
            })
    }
}

fn fraction(part: f64, whole: f64) -> f64 {
    if whole > 0.0 { part / whole } else { 0.0 }
}
