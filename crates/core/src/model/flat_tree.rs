use callwheel_protocol::{FunctionId, HierarchyNode, SharedStr};

/// One node of a [`FlatTree`], addressed by its preorder index.
#[derive(Debug, Clone, PartialEq)]
pub struct FlatNode {
    pub name: FunctionId,
    pub display_name: SharedStr,
    pub parent_name: Option<FunctionId>,
    /// Index of the rendered parent, `None` for the root.
    pub parent: Option<usize>,
    pub depth: usize,
    pub size: f64,
    pub cumulative: f64,
    pub self_time: bool,
    pub children: Vec<usize>,
}

/// Preorder flattening of a displayed hierarchy.
///
/// Render commands refer to nodes by index into this tree, which is what
/// clicks and hovers come back with.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlatTree {
    nodes: Vec<FlatNode>,
}

impl FlatTree {
    pub fn from_hierarchy(root: &HierarchyNode) -> Self {
        let mut nodes = Vec::with_capacity(root.node_count());
        // Explicit stack; hierarchies can be as deep as the profile's call chains.
        let mut pending = vec![(root, None, 0usize)];
        while let Some((node, parent, depth)) = pending.pop() {
            let index = nodes.len();
            nodes.push(FlatNode {
                name: node.name.clone(),
                display_name: node.display_name.clone(),
                parent_name: node.parent_name.clone(),
                parent,
                depth,
                size: node.size,
                cumulative: node.cumulative,
                self_time: node.is_self_time(),
                children: Vec::with_capacity(node.children.len()),
            });
            if let Some(p) = parent {
                nodes[p].children.push(index);
            }
            for child in node.children.iter().rev() {
                pending.push((child, Some(index), depth + 1));
            }
        }
        Self { nodes }
    }

    pub fn get(&self, index: usize) -> Option<&FlatNode> {
        self.nodes.get(index)
    }

    pub fn root(&self) -> Option<&FlatNode> {
        self.nodes.first()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &FlatNode)> {
        self.nodes.iter().enumerate()
    }

    /// Indices from `index`'s parent up to the root.
    pub fn ancestors(&self, index: usize) -> impl Iterator<Item = usize> + '_ {
        std::iter::successors(self.get(index).and_then(|n| n.parent), |&i| {
            self.get(i).and_then(|n| n.parent)
        })
    }

    /// Every node drawn for the same function as `index`.
    pub fn same_function(&self, index: usize) -> Vec<usize> {
        let Some(target) = self.get(index) else {
            return Vec::new();
        };
        self.iter()
            .filter(|(_, n)| n.name == target.name)
            .map(|(i, _)| i)
            .collect()
    }

    /// First node (in preorder) for `name` reached from `parent_name`,
    /// self-time nodes excluded.
    pub fn find(&self, name: &str, parent_name: Option<&str>) -> Option<usize> {
        self.iter()
            .find(|(_, n)| {
                !n.self_time && n.name == name && n.parent_name.as_deref() == parent_name
            })
            .map(|(i, _)| i)
    }

    /// The node a click on `index` stands for: self-time nodes resolve to
    /// the function they belong to.
    pub fn owner(&self, index: usize) -> Option<usize> {
        let node = self.get(index)?;
        if node.self_time { node.parent } else { Some(index) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hierarchy::HierarchyBuilder;
    use crate::testing::chain;

    fn flat_chain() -> FlatTree {
        let tree = HierarchyBuilder::new(&chain())
            .build(&"A".into(), None, 10)
            .unwrap();
        FlatTree::from_hierarchy(&tree)
    }

    #[test]
    fn preorder_with_parent_links() {
        let flat = flat_chain();
        // A, B, C, B-self, A-self
        assert_eq!(flat.len(), 5);
        let names: Vec<&str> = flat.iter().map(|(_, n)| n.name.as_str()).collect();
        assert_eq!(names, ["A", "B", "C", "B", "A"]);
        assert_eq!(flat.get(2).unwrap().parent, Some(1));
        assert_eq!(flat.get(2).unwrap().depth, 2);
        assert!(flat.get(3).unwrap().self_time);
        assert_eq!(flat.get(0).unwrap().children, vec![1, 4]);
        assert_eq!(flat.ancestors(2).collect::<Vec<_>>(), vec![1, 0]);
    }

    #[test]
    fn self_time_resolves_to_owner() {
        let flat = flat_chain();
        assert_eq!(flat.owner(3), Some(1));
        assert_eq!(flat.owner(2), Some(2));
        assert_eq!(flat.owner(99), None);
    }

    #[test]
    fn lookup_helpers() {
        let flat = flat_chain();
        assert_eq!(flat.find("C", Some("B")), Some(2));
        assert_eq!(flat.find("A", None), Some(0));
        assert_eq!(flat.find("C", Some("A")), None);
        assert_eq!(flat.same_function(1), vec![1, 3]);
    }
}
