//! Space-filling partition of a hierarchy.
//!
//! Leaves are weighted by their `size`, internal nodes by the sum of their
//! children. Siblings are placed heaviest first and split their parent's
//! breadth in proportion to weight; every level gets the same thickness.

use std::cmp::Ordering;

use crate::model::FlatTree;

/// Position of one node in partition space.
///
/// `x`/`dx` run along the breadth axis (angle for the sunburst), `y`/`dy`
/// along the depth axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cell {
    pub x: f64,
    pub dx: f64,
    pub y: f64,
    pub dy: f64,
    pub value: f64,
}

/// Layout weight of every node, indexed like `tree`.
pub fn values(tree: &FlatTree) -> Vec<f64> {
    let mut values = vec![0.0; tree.len()];
    // Preorder: every child comes after its parent.
    for index in (0..tree.len()).rev() {
        let Some(node) = tree.get(index) else {
            continue;
        };
        values[index] = if node.children.is_empty() {
            node.size.max(0.0)
        } else {
            node.children.iter().map(|&c| values[c]).sum()
        };
    }
    values
}

/// Children of `index` ordered heaviest first; equal weights keep tree order.
pub fn sorted_children(tree: &FlatTree, values: &[f64], index: usize) -> Vec<usize> {
    let mut children = tree
        .get(index)
        .map(|n| n.children.clone())
        .unwrap_or_default();
    children.sort_by(|&a, &b| values[b].partial_cmp(&values[a]).unwrap_or(Ordering::Equal));
    children
}

/// Lay `tree` out over a `breadth` × `depth` rectangle.
pub fn partition(tree: &FlatTree, breadth: f64, depth: f64) -> Vec<Option<Cell>> {
    let mut cells = vec![None; tree.len()];
    if tree.is_empty() {
        return cells;
    }

    let values = values(tree);
    let levels = tree.iter().map(|(_, n)| n.depth).max().unwrap_or(0) + 1;
    let dy = depth / levels as f64;

    cells[0] = Some(Cell {
        x: 0.0,
        dx: breadth,
        y: 0.0,
        dy,
        value: values[0],
    });
    for index in 0..tree.len() {
        let Some(parent) = cells[index] else {
            continue;
        };
        let scale = if parent.value > 0.0 {
            parent.dx / parent.value
        } else {
            0.0
        };
        let mut x = parent.x;
        for child in sorted_children(tree, &values, index) {
            let dx = values[child] * scale;
            cells[child] = Some(Cell {
                x,
                dx,
                y: parent.y + dy,
                dy,
                value: values[child],
            });
            x += dx;
        }
    }
    cells
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hierarchy::HierarchyBuilder;
    use crate::testing::{chain, table};

    const EPS: f64 = 1e-9;

    fn flat(stats: &crate::model::StatsTable, root: &str) -> FlatTree {
        let tree = HierarchyBuilder::new(stats)
            .build(&root.into(), None, 10)
            .unwrap();
        FlatTree::from_hierarchy(&tree)
    }

    #[test]
    fn internal_values_sum_children() {
        let tree = flat(&chain(), "A");
        let values = values(&tree);
        // A = B + A-self = (C + B-self) + A-self
        assert!((values[0] - 1.0).abs() < EPS);
        assert!((values[1] - 0.8).abs() < EPS);
        assert!((values[2] - 0.5).abs() < EPS);
    }

    #[test]
    fn breadth_is_split_by_value() {
        let tree = flat(&chain(), "A");
        let cells = partition(&tree, 100.0, 60.0);
        let root = cells[0].unwrap();
        assert_eq!((root.x, root.dx, root.y), (0.0, 100.0, 0.0));
        // Three levels of equal thickness.
        assert!((root.dy - 20.0).abs() < EPS);

        let b = cells[1].unwrap();
        assert!((b.dx - 80.0).abs() < EPS);
        assert!((b.y - 20.0).abs() < EPS);
        let c = cells[2].unwrap();
        assert!((c.dx - 50.0).abs() < EPS);
        assert!((c.y - 40.0).abs() < EPS);
    }

    #[test]
    fn heaviest_sibling_comes_first() {
        let stats = table(
            &[("P", 10.0), ("X", 2.0), ("Y", 6.0)],
            &[("P", "X", 2.0), ("P", "Y", 6.0)],
        );
        let tree = flat(&stats, "P");
        let cells = partition(&tree, 10.0, 1.0);
        let x = tree.find("X", Some("P")).unwrap();
        let y = tree.find("Y", Some("P")).unwrap();
        assert_eq!(cells[y].unwrap().x, 0.0);
        assert!((cells[x].unwrap().x - 6.0).abs() < EPS);
    }

    #[test]
    fn empty_tree_has_no_cells() {
        assert!(partition(&FlatTree::default(), 1.0, 1.0).is_empty());
    }
}
