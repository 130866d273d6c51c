//! Render strategies: turn a displayed hierarchy into render commands.
//!
//! Every strategy is a partition-style layout followed by one shape per
//! visible node. Commands carry the node's [`FlatTree`] index so hosts can
//! map clicks and hovers back onto the hierarchy.

pub mod call_graph;
pub mod icicle;
pub mod partition;
pub mod sunburst;

use std::collections::HashSet;
use std::f64::consts::TAU;
use std::fmt;
use std::str::FromStr;

use callwheel_protocol::{Point, RenderCommand, ThemeToken, Viewport};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{FlatNode, FlatTree};

pub use call_graph::CallGraph;
pub use icicle::Icicle;
pub use partition::{Cell, partition};
pub use sunburst::Sunburst;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StyleError {
    #[error("unknown rendering style '{0}'")]
    Unknown(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderStyle {
    #[default]
    Sunburst,
    Icicle,
    CallGraph,
}

impl RenderStyle {
    pub const ALL: [RenderStyle; 3] = [Self::Sunburst, Self::Icicle, Self::CallGraph];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sunburst => "sunburst",
            Self::Icicle => "icicle",
            Self::CallGraph => "callgraph",
        }
    }

    /// The style after this one, wrapping around.
    pub fn next(self) -> Self {
        match self {
            Self::Sunburst => Self::Icicle,
            Self::Icicle => Self::CallGraph,
            Self::CallGraph => Self::Sunburst,
        }
    }

    pub fn strategy(self) -> Box<dyn RenderStrategy + Send + Sync> {
        match self {
            Self::Sunburst => Box::new(Sunburst),
            Self::Icicle => Box::new(Icicle),
            Self::CallGraph => Box::new(CallGraph),
        }
    }
}

impl FromStr for RenderStyle {
    type Err = StyleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|style| style.as_str() == s)
            .ok_or_else(|| StyleError::Unknown(s.to_string()))
    }
}

impl fmt::Display for RenderStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Geometry a strategy derives from the viewport before layout.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayoutParams {
    /// Partition extent along the breadth axis.
    pub breadth: f64,
    /// Partition extent along the depth axis.
    pub depth: f64,
    /// Nodes whose breadth does not exceed this are not drawn.
    pub min_extent: f64,
    /// Translation applied to partition coordinates.
    pub origin: Point,
}

pub trait RenderStrategy {
    fn style(&self) -> RenderStyle;

    fn layout_params(&self, viewport: &Viewport) -> LayoutParams;

    fn layout(&self, tree: &FlatTree, params: &LayoutParams) -> Vec<Option<Cell>> {
        partition(tree, params.breadth, params.depth)
    }

    /// The shape for one visible node.
    fn render(&self, node: &Node<'_>, params: &LayoutParams) -> RenderCommand;

    /// Decorations drawn after every node.
    fn render_post(
        &self,
        _tree: &FlatTree,
        _cells: &[Option<Cell>],
        _visible: &[bool],
        _params: &LayoutParams,
        _out: &mut Vec<RenderCommand>,
    ) {
    }

    /// Lay out and draw `tree`, skipping branches narrower than the
    /// strategy's minimum extent or lighter than `cutoff` of the root.
    /// Nodes of the function under `hovered` are highlighted.
    fn draw(
        &self,
        tree: &FlatTree,
        viewport: &Viewport,
        cutoff: f64,
        hovered: Option<usize>,
    ) -> Vec<RenderCommand> {
        let mut out = Vec::new();
        if tree.is_empty() {
            return out;
        }

        let params = self.layout_params(viewport);
        let cells = self.layout(tree, &params);
        let visible = visibility(tree, &cells, &params, cutoff);
        let highlighted: HashSet<usize> = hovered
            .map(|i| tree.same_function(i).into_iter().collect())
            .unwrap_or_default();

        let style = self.style();
        out.push(RenderCommand::BeginGroup {
            id: style.as_str().into(),
            label: tree.root().map(|r| r.display_name.clone()),
        });
        for (index, flat) in tree.iter() {
            let Some(cell) = cells[index].filter(|_| visible[index]) else {
                continue;
            };
            let color = if highlighted.contains(&index) {
                ThemeToken::HoverHighlight
            } else {
                ThemeToken::slice_for(&flat.name)
            };
            let node = Node {
                index,
                flat,
                cell,
                color,
            };
            out.push(self.render(&node, &params));
        }
        self.render_post(tree, &cells, &visible, &params, &mut out);
        out.push(RenderCommand::EndGroup);
        out
    }
}

/// A visible node handed to [`RenderStrategy::render`].
#[derive(Debug, Clone, Copy)]
pub struct Node<'a> {
    pub index: usize,
    pub flat: &'a FlatNode,
    pub cell: Cell,
    pub color: ThemeToken,
}

fn visibility(
    tree: &FlatTree,
    cells: &[Option<Cell>],
    params: &LayoutParams,
    cutoff: f64,
) -> Vec<bool> {
    let total = cells.first().copied().flatten().map_or(0.0, |c| c.value);
    let mut visible = vec![false; tree.len()];
    for (index, node) in tree.iter() {
        let Some(cell) = cells[index] else {
            continue;
        };
        let parent_visible = node.parent.is_none_or(|p| visible[p]);
        let wide_enough = cell.dx > params.min_extent;
        let heavy_enough = total <= 0.0 || cell.value / total >= cutoff;
        visible[index] = parent_visible && wide_enough && heavy_enough;
    }
    visible
}

/// The topmost node under `point`, searching the commands back to front.
pub fn hit_test(commands: &[RenderCommand], point: Point) -> Option<usize> {
    commands.iter().rev().find_map(|cmd| match cmd {
        RenderCommand::DrawRect { rect, node, .. } if rect.contains(point) => *node,
        RenderCommand::DrawArc {
            center,
            inner_radius,
            outer_radius,
            start_angle,
            end_angle,
            node,
            ..
        } => {
            let (dx, dy) = (point.x - center.x, point.y - center.y);
            let r = dx.hypot(dy);
            // Clockwise from twelve o'clock, like the arcs themselves.
            let angle = dx.atan2(-dy).rem_euclid(TAU);
            let inside = r >= *inner_radius
                && r < *outer_radius
                && angle >= *start_angle
                && angle < *end_angle;
            if inside { *node } else { None }
        }
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hierarchy::HierarchyBuilder;
    use crate::testing::{chain, table};

    fn flat(stats: &crate::model::StatsTable, root: &str) -> FlatTree {
        let tree = HierarchyBuilder::new(stats)
            .build(&root.into(), None, 10)
            .unwrap();
        FlatTree::from_hierarchy(&tree)
    }

    fn drawn(commands: &[RenderCommand]) -> Vec<usize> {
        commands.iter().filter_map(RenderCommand::node).collect()
    }

    #[test]
    fn style_names_round_trip() {
        for style in RenderStyle::ALL {
            assert_eq!(style.as_str().parse::<RenderStyle>(), Ok(style));
            assert_eq!(style.strategy().style(), style);
        }
        assert_eq!(
            "treemap".parse::<RenderStyle>(),
            Err(StyleError::Unknown("treemap".into()))
        );
        assert_eq!(RenderStyle::CallGraph.next(), RenderStyle::Sunburst);
    }

    #[test]
    fn every_style_draws_the_root_first() {
        let tree = flat(&chain(), "A");
        let viewport = Viewport::new(400.0, 300.0);
        for style in RenderStyle::ALL {
            let commands = style.strategy().draw(&tree, &viewport, 0.0, None);
            assert!(matches!(commands.first(), Some(RenderCommand::BeginGroup { .. })));
            assert!(matches!(commands.last(), Some(RenderCommand::EndGroup)));
            assert_eq!(drawn(&commands).first(), Some(&0), "{style}");
        }
    }

    #[test]
    fn cutoff_hides_light_branches_and_their_descendants() {
        // X gets 3% of P; its child Z even less.
        let stats = table(
            &[("P", 100.0), ("X", 3.0), ("Y", 90.0), ("Z", 2.0)],
            &[("P", "X", 3.0), ("P", "Y", 90.0), ("X", "Z", 2.0)],
        );
        let tree = flat(&stats, "P");
        let x = tree.find("X", Some("P")).unwrap();
        let z = tree.find("Z", Some("X")).unwrap();
        let viewport = Viewport::new(1000.0, 1000.0);

        let all = Icicle.draw(&tree, &viewport, 0.0, None);
        assert!(drawn(&all).contains(&x));
        assert!(drawn(&all).contains(&z));

        let cut = Icicle.draw(&tree, &viewport, 0.05, None);
        assert!(!drawn(&cut).contains(&x));
        assert!(!drawn(&cut).contains(&z));
        assert!(drawn(&cut).contains(&tree.find("Y", Some("P")).unwrap()));
    }

    #[test]
    fn hover_highlights_every_node_of_the_function() {
        let tree = flat(&chain(), "A");
        let commands = Icicle.draw(&tree, &Viewport::new(100.0, 90.0), 0.0, Some(1));
        let highlighted: Vec<usize> = commands
            .iter()
            .filter_map(|c| match c {
                RenderCommand::DrawRect {
                    color: ThemeToken::HoverHighlight,
                    node,
                    ..
                } => *node,
                _ => None,
            })
            .collect();
        assert_eq!(highlighted, tree.same_function(1));
    }

    #[test]
    fn hit_test_finds_rects_and_arcs() {
        let tree = flat(&chain(), "A");
        let viewport = Viewport::new(100.0, 90.0);

        let icicle = Icicle.draw(&tree, &viewport, 0.0, None);
        // Root row spans the top third; B sits below it on the left.
        assert_eq!(hit_test(&icicle, Point::new(50.0, 10.0)), Some(0));
        assert_eq!(hit_test(&icicle, Point::new(10.0, 40.0)), Some(1));
        assert_eq!(hit_test(&icicle, Point::new(50.0, 200.0)), None);

        let sunburst = Sunburst.draw(&tree, &viewport, 0.0, None);
        let center = Point::new(50.0, 45.0);
        assert_eq!(hit_test(&sunburst, center), Some(0));
        // Just right of twelve o'clock in the second ring is B.
        let b = Point::new(center.x + 1.0, center.y - 20.0);
        assert_eq!(hit_test(&sunburst, b), Some(1));
    }
}
