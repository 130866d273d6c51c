use callwheel_protocol::FunctionId;
use thiserror::Error;

use super::flat_tree::FlatTree;
use super::stats::short_name;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum NavigationError {
    #[error("node {0} is not part of the displayed hierarchy")]
    UnknownNode(usize),
    #[error("{name} is not reachable from the top of the call stack")]
    Detached { name: FunctionId },
}

/// The zoom path from the profile's root to the focused function.
///
/// Never empty; the first frame is always the root the stack was created
/// with. Because a function can be reached through several callers, each
/// frame is only meaningful together with the one below it, which is why
/// the focused view is requested as `(top, parent)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallStack {
    frames: Vec<FunctionId>,
}

impl CallStack {
    pub fn new(root: FunctionId) -> Self {
        Self { frames: vec![root] }
    }

    pub fn root(&self) -> &FunctionId {
        &self.frames[0]
    }

    /// The focused function: the next request's root.
    pub fn top(&self) -> &FunctionId {
        &self.frames[self.frames.len() - 1]
    }

    /// The frame below the top, `None` when the stack holds only the root.
    pub fn parent(&self) -> Option<&FunctionId> {
        self.frames.len().checked_sub(2).map(|i| &self.frames[i])
    }

    pub fn as_slice(&self) -> &[FunctionId] {
        &self.frames
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// Always false; kept for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn reset(&mut self) {
        self.frames.truncate(1);
    }

    /// `(position, short name)` pairs ordered from the top of the stack
    /// down to the root.
    pub fn listing(&self) -> Vec<(usize, &str)> {
        self.frames
            .iter()
            .enumerate()
            .rev()
            .map(|(i, id)| (i, short_name(id)))
            .collect()
    }

    /// Apply a click on node `index` of the displayed `tree`.
    ///
    /// - the root function resets the stack;
    /// - a node already on the stack (same name over the same parent) pops
    ///   to the frame below it;
    /// - anything else is a new path: the rendered ancestry of the node up
    ///   to the current top is appended.
    ///
    /// On error the stack is left unchanged.
    pub fn update(&mut self, tree: &FlatTree, index: usize) -> Result<(), NavigationError> {
        let owner = tree.owner(index).ok_or(NavigationError::UnknownNode(index))?;
        let node = tree.get(owner).ok_or(NavigationError::UnknownNode(index))?;

        if node.name == *self.root() {
            self.reset();
            return Ok(());
        }

        if let Some(parent) = &node.parent_name
            && let Some(position) = self.position_of(&node.name, parent)
        {
            self.frames.truncate(position);
            return Ok(());
        }

        let mut walked = Vec::new();
        for step in std::iter::once(owner)
            .chain(tree.ancestors(owner))
            .filter_map(|i| tree.get(i))
        {
            if step.name == *self.top() {
                self.frames.extend(walked.into_iter().rev());
                return Ok(());
            }
            walked.push(step.name.clone());
        }
        Err(NavigationError::Detached {
            name: node.name.clone(),
        })
    }

    /// Position of `name` on the stack when it sits directly above `parent`.
    fn position_of(&self, name: &FunctionId, parent: &FunctionId) -> Option<usize> {
        self.frames
            .windows(2)
            .position(|pair| pair[0] == *parent && pair[1] == *name)
            .map(|i| i + 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hierarchy::HierarchyBuilder;
    use crate::model::StatsTable;
    use crate::testing::table;

    /// `R → A → B → C` plus a second path `R → X → B`.
    fn diamond() -> StatsTable {
        table(
            &[("R", 20.0), ("A", 12.0), ("X", 6.0), ("B", 10.0), ("C", 4.0)],
            &[
                ("R", "A", 12.0),
                ("R", "X", 6.0),
                ("A", "B", 7.0),
                ("X", "B", 3.0),
                ("B", "C", 4.0),
            ],
        )
    }

    fn view(stats: &StatsTable, stack: &CallStack) -> FlatTree {
        let tree = HierarchyBuilder::new(stats)
            .build(stack.top(), stack.parent(), 10)
            .unwrap();
        FlatTree::from_hierarchy(&tree)
    }

    fn names(stack: &CallStack) -> Vec<&str> {
        stack.as_slice().iter().map(FunctionId::as_str).collect()
    }

    #[test]
    fn clicking_the_root_is_a_no_op() {
        let stats = diamond();
        let mut stack = CallStack::new("R".into());
        let flat = view(&stats, &stack);
        stack.update(&flat, 0).unwrap();
        assert_eq!(names(&stack), ["R"]);
        assert!(stack.parent().is_none());
    }

    #[test]
    fn clicking_a_descendant_appends_its_rendered_path() {
        let stats = diamond();
        let mut stack = CallStack::new("R".into());
        let flat = view(&stats, &stack);
        let c = flat.find("C", Some("B")).unwrap();
        stack.update(&flat, c).unwrap();
        assert_eq!(names(&stack), ["R", "A", "B", "C"]);
        assert_eq!(stack.top(), "C");
        assert_eq!(stack.parent().map(FunctionId::as_str), Some("B"));
    }

    #[test]
    fn second_caller_path_is_kept_apart() {
        let stats = diamond();
        let mut stack = CallStack::new("R".into());
        let flat = view(&stats, &stack);
        let via_x = flat
            .iter()
            .find(|(_, n)| n.name == "B" && n.parent_name.as_deref() == Some("X"))
            .map(|(i, _)| i)
            .unwrap();
        stack.update(&flat, via_x).unwrap();
        assert_eq!(names(&stack), ["R", "X", "B"]);
    }

    #[test]
    fn clicking_the_top_pops_one_level() {
        let stats = diamond();
        let mut stack = CallStack::new("R".into());
        let flat = view(&stats, &stack);
        stack.update(&flat, flat.find("B", Some("A")).unwrap()).unwrap();
        assert_eq!(names(&stack), ["R", "A", "B"]);

        // Zoomed view is rooted at B; its centre pops back to A.
        let zoomed = view(&stats, &stack);
        stack.update(&zoomed, 0).unwrap();
        assert_eq!(names(&stack), ["R", "A"]);
    }

    #[test]
    fn self_time_click_acts_on_its_function() {
        let stats = diamond();
        let mut stack = CallStack::new("R".into());
        let flat = view(&stats, &stack);
        let b = flat.find("B", Some("A")).unwrap();
        let b_self = flat
            .get(b)
            .unwrap()
            .children
            .iter()
            .copied()
            .find(|&i| flat.get(i).unwrap().self_time)
            .unwrap();
        stack.update(&flat, b_self).unwrap();
        assert_eq!(names(&stack), ["R", "A", "B"]);
    }

    #[test]
    fn deeper_click_in_zoomed_view_extends_from_top() {
        let stats = diamond();
        let mut stack = CallStack::new("R".into());
        let flat = view(&stats, &stack);
        stack.update(&flat, flat.find("A", Some("R")).unwrap()).unwrap();
        let zoomed = view(&stats, &stack);
        stack.update(&zoomed, zoomed.find("C", Some("B")).unwrap()).unwrap();
        assert_eq!(names(&stack), ["R", "A", "B", "C"]);
        for pair in stack.as_slice().windows(2) {
            assert_ne!(pair[0], pair[1]);
        }
    }

    #[test]
    fn ancestor_on_stack_truncates_before_it() {
        let stats = diamond();
        let mut stack = CallStack::new("R".into());
        let flat = view(&stats, &stack);
        stack.update(&flat, flat.find("C", Some("B")).unwrap()).unwrap();
        assert_eq!(names(&stack), ["R", "A", "B", "C"]);
        // The full view still shows A under R, which is already on the stack.
        stack.update(&flat, flat.find("A", Some("R")).unwrap()).unwrap();
        assert_eq!(names(&stack), ["R"]);
    }

    #[test]
    fn unknown_node_leaves_stack_alone() {
        let stats = diamond();
        let mut stack = CallStack::new("R".into());
        let flat = view(&stats, &stack);
        assert_eq!(stack.update(&flat, 999), Err(NavigationError::UnknownNode(999)));
        assert_eq!(names(&stack), ["R"]);
    }

    #[test]
    fn detached_tree_is_rejected() {
        let stats = diamond();
        let mut stack = CallStack::new("R".into());
        let flat = view(&stats, &stack);
        stack.update(&flat, flat.find("A", Some("R")).unwrap()).unwrap();
        // A tree rooted at X never reaches A.
        let other = HierarchyBuilder::new(&stats)
            .build(&"X".into(), Some(&"R".into()), 10)
            .unwrap();
        let other = FlatTree::from_hierarchy(&other);
        let err = stack.update(&other, other.find("C", Some("B")).unwrap());
        assert!(matches!(err, Err(NavigationError::Detached { .. })));
        assert_eq!(names(&stack), ["R", "A"]);
    }

    #[test]
    fn listing_runs_top_down() {
        let stats = diamond();
        let mut stack = CallStack::new("R".into());
        let flat = view(&stats, &stack);
        stack.update(&flat, flat.find("B", Some("A")).unwrap()).unwrap();
        assert_eq!(stack.listing(), vec![(2, "B"), (1, "A"), (0, "R")]);
    }
}
