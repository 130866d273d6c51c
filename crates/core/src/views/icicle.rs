use callwheel_protocol::{Point, Rect, RenderCommand, ThemeToken, Viewport};

use super::{LayoutParams, Node, RenderStrategy, RenderStyle};

/// Rectangles narrower than half a pixel are not drawn.
const MIN_WIDTH: f64 = 0.5;

/// Rows of rectangles hanging from the focused function at the top.
#[derive(Debug, Clone, Copy, Default)]
pub struct Icicle;

impl RenderStrategy for Icicle {
    fn style(&self) -> RenderStyle {
        RenderStyle::Icicle
    }

    fn layout_params(&self, viewport: &Viewport) -> LayoutParams {
        LayoutParams {
            breadth: viewport.width,
            depth: viewport.height,
            min_extent: MIN_WIDTH,
            origin: Point::new(0.0, 0.0),
        }
    }

    fn render(&self, node: &Node<'_>, params: &LayoutParams) -> RenderCommand {
        let cell = node.cell;
        RenderCommand::DrawRect {
            rect: Rect::new(
                params.origin.x + cell.x,
                params.origin.y + cell.y,
                cell.dx,
                cell.dy,
            ),
            color: node.color,
            border_color: Some(ThemeToken::Border),
            label: Some(node.flat.display_name.clone()),
            node: Some(node.index),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hierarchy::HierarchyBuilder;
    use crate::model::FlatTree;
    use crate::testing::chain;

    #[test]
    fn rows_fill_the_viewport() {
        let tree = HierarchyBuilder::new(&chain())
            .build(&"A".into(), None, 10)
            .unwrap();
        let flat = FlatTree::from_hierarchy(&tree);
        let commands = Icicle.draw(&flat, &Viewport::new(200.0, 120.0), 0.0, None);

        let root = commands.iter().find(|c| c.node() == Some(0));
        match root {
            Some(RenderCommand::DrawRect { rect, label, .. }) => {
                assert_eq!(*rect, Rect::new(0.0, 0.0, 200.0, 40.0));
                assert_eq!(label.as_deref(), Some("A"));
            }
            other => panic!("unexpected root command {other:?}"),
        }
        let c = flat.find("C", Some("B")).unwrap();
        match commands.iter().find(|cmd| cmd.node() == Some(c)) {
            Some(RenderCommand::DrawRect { rect, .. }) => {
                assert_eq!(rect.y, 80.0);
                assert!((rect.w - 100.0).abs() < 1e-9);
            }
            other => panic!("unexpected command for C {other:?}"),
        }
    }
}
