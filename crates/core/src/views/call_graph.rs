use callwheel_protocol::{Point, Rect, RenderCommand, ThemeToken, Viewport};

use super::partition::{Cell, sorted_children, values};
use super::{LayoutParams, Node, RenderStrategy, RenderStyle};
use crate::model::FlatTree;

const MAX_BOX_BREADTH: f64 = 25.0;
/// Share of each column left empty for the links.
const COLUMN_GAP: f64 = 0.25;

/// Functions as boxes in depth columns, each linked to its caller.
///
/// Boxes are stacked in the order they are met, heaviest callee first, so
/// unlike the partition styles a box's breadth does not encode time.
/// Self-time nodes are not drawn.
#[derive(Debug, Clone, Copy, Default)]
pub struct CallGraph;

impl RenderStrategy for CallGraph {
    fn style(&self) -> RenderStyle {
        RenderStyle::CallGraph
    }

    /// `breadth` is the size of one box rather than of the whole layout.
    fn layout_params(&self, viewport: &Viewport) -> LayoutParams {
        LayoutParams {
            breadth: (viewport.height / 24.0).clamp(1.0, MAX_BOX_BREADTH),
            depth: viewport.width,
            min_extent: 0.0,
            origin: Point::new(0.0, 0.0),
        }
    }

    fn layout(&self, tree: &FlatTree, params: &LayoutParams) -> Vec<Option<Cell>> {
        let mut cells = vec![None; tree.len()];
        if tree.is_empty() {
            return cells;
        }

        let values = values(tree);
        let levels = tree
            .iter()
            .filter(|(_, n)| !n.self_time)
            .map(|(_, n)| n.depth)
            .max()
            .unwrap_or(0)
            + 1;
        let column = params.depth / levels as f64;
        let mut slots = vec![0usize; levels];

        let mut pending = vec![0];
        while let Some(index) = pending.pop() {
            let Some(node) = tree.get(index) else {
                continue;
            };
            if node.self_time {
                continue;
            }
            let slot = &mut slots[node.depth];
            cells[index] = Some(Cell {
                x: *slot as f64 * params.breadth,
                dx: params.breadth,
                y: node.depth as f64 * column,
                dy: column * (1.0 - COLUMN_GAP),
                value: values[index],
            });
            *slot += 1;
            pending.extend(sorted_children(tree, &values, index).into_iter().rev());
        }
        cells
    }

    fn render(&self, node: &Node<'_>, params: &LayoutParams) -> RenderCommand {
        let cell = node.cell;
        RenderCommand::DrawRect {
            rect: Rect::new(
                params.origin.x + cell.y,
                params.origin.y + cell.x,
                cell.dy,
                cell.dx,
            ),
            color: node.color,
            border_color: Some(ThemeToken::Border),
            label: Some(node.flat.display_name.clone()),
            node: Some(node.index),
        }
    }

    fn render_post(
        &self,
        tree: &FlatTree,
        cells: &[Option<Cell>],
        visible: &[bool],
        params: &LayoutParams,
        out: &mut Vec<RenderCommand>,
    ) {
        for (index, node) in tree.iter() {
            let Some(parent) = node.parent else {
                continue;
            };
            if !visible[index] || !visible[parent] {
                continue;
            }
            let (Some(child), Some(caller)) = (cells[index], cells[parent]) else {
                continue;
            };
            out.push(RenderCommand::DrawLine {
                from: Point::new(
                    params.origin.x + child.y,
                    params.origin.y + child.x + child.dx / 2.0,
                ),
                to: Point::new(
                    params.origin.x + caller.y + caller.dy,
                    params.origin.y + caller.x + caller.dx / 2.0,
                ),
                color: ThemeToken::Link,
                width: 1.0,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hierarchy::HierarchyBuilder;
    use crate::testing::table;

    fn flat() -> FlatTree {
        // P calls X and Y; Y calls Z.
        let stats = table(
            &[("P", 10.0), ("X", 2.0), ("Y", 6.0), ("Z", 3.0)],
            &[("P", "X", 2.0), ("P", "Y", 6.0), ("Y", "Z", 3.0)],
        );
        let tree = HierarchyBuilder::new(&stats)
            .build(&"P".into(), None, 10)
            .unwrap();
        FlatTree::from_hierarchy(&tree)
    }

    #[test]
    fn boxes_stack_per_column_heaviest_first() {
        let tree = flat();
        let params = CallGraph.layout_params(&Viewport::new(300.0, 600.0));
        assert_eq!(params.breadth, 25.0);
        let cells = CallGraph.layout(&tree, &params);

        let y = cells[tree.find("Y", Some("P")).unwrap()].unwrap();
        let x = cells[tree.find("X", Some("P")).unwrap()].unwrap();
        let z = cells[tree.find("Z", Some("Y")).unwrap()].unwrap();
        assert_eq!((y.x, x.x, z.x), (0.0, 25.0, 0.0));
        assert_eq!((y.y, z.y), (100.0, 200.0));
        assert_eq!(y.dy, 75.0);

        for (index, node) in tree.iter() {
            assert_eq!(cells[index].is_none(), node.self_time);
        }
    }

    #[test]
    fn links_join_each_box_to_its_caller() {
        let tree = flat();
        let commands = CallGraph.draw(&tree, &Viewport::new(300.0, 600.0), 0.0, None);
        let lines: Vec<(Point, Point)> = commands
            .iter()
            .filter_map(|c| match c {
                RenderCommand::DrawLine { from, to, .. } => Some((*from, *to)),
                _ => None,
            })
            .collect();
        assert_eq!(lines.len(), 3);
        // Y's box starts the second column; P's box ends three quarters into the first.
        assert!(lines.contains(&(Point::new(100.0, 12.5), Point::new(75.0, 12.5))));
        let boxes = commands
            .iter()
            .filter(|c| matches!(c, RenderCommand::DrawRect { .. }))
            .count();
        assert_eq!(boxes, 4);
    }
}
