use std::f64::consts::TAU;

use callwheel_protocol::{Point, RenderCommand, ThemeToken, Viewport};

use super::{LayoutParams, Node, RenderStrategy, RenderStyle};

/// Arcs narrower than this (radians) are not drawn.
const MIN_ANGLE: f64 = 0.005;

/// Concentric rings, the focused function in the centre.
///
/// The partition runs over `[0, 2π] × [0, r²]`, so the depth axis is in
/// area units and is mapped back linearly onto `[0, r]` to give every ring
/// the same radial thickness.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sunburst;

impl Sunburst {
    fn radius(viewport: &Viewport) -> f64 {
        viewport.width.min(viewport.height) / 2.0
    }
}

impl RenderStrategy for Sunburst {
    fn style(&self) -> RenderStyle {
        RenderStyle::Sunburst
    }

    fn layout_params(&self, viewport: &Viewport) -> LayoutParams {
        let radius = Self::radius(viewport);
        LayoutParams {
            breadth: TAU,
            depth: radius * radius,
            min_extent: MIN_ANGLE,
            origin: Point::new(viewport.width / 2.0, radius),
        }
    }

    fn render(&self, node: &Node<'_>, params: &LayoutParams) -> RenderCommand {
        let radius = params.depth.sqrt();
        let to_radius = |y: f64| if radius > 0.0 { y / radius } else { 0.0 };
        let cell = node.cell;
        RenderCommand::DrawArc {
            center: params.origin,
            inner_radius: to_radius(cell.y),
            outer_radius: to_radius(cell.y + cell.dy),
            start_angle: cell.x.clamp(0.0, TAU),
            end_angle: (cell.x + cell.dx).clamp(0.0, TAU),
            color: node.color,
            border_color: Some(ThemeToken::Border),
            label: Some(node.flat.display_name.clone()),
            node: Some(node.index),
        }
    }
}
