use serde::{Deserialize, Serialize};

use crate::shared_str::SharedStr;
use crate::theme::ThemeToken;
use crate::types::{Point, Rect};

/// A single, stateless render instruction.
///
/// A render strategy emits a `Vec<RenderCommand>` for one hierarchy. Hosts
/// (SVG export, terminal, browser canvas) consume the list in order; each
/// command carries everything it needs to be drawn.
///
/// `node` on the shape commands is the preorder index of the hierarchy node
/// the shape stands for. Hosts hand it back on click/hover so the call stack
/// can resolve the exact node, not just its function name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum RenderCommand {
    /// Filled rectangle (icicle cells, call-graph boxes).
    DrawRect {
        rect: Rect,
        color: ThemeToken,
        border_color: Option<ThemeToken>,
        label: Option<SharedStr>,
        node: Option<usize>,
    },

    /// Filled annular sector centred on `center`. Angles are in radians,
    /// measured clockwise from twelve o'clock.
    DrawArc {
        center: Point,
        inner_radius: f64,
        outer_radius: f64,
        start_angle: f64,
        end_angle: f64,
        color: ThemeToken,
        border_color: Option<ThemeToken>,
        label: Option<SharedStr>,
        node: Option<usize>,
    },

    /// Draw a line segment.
    DrawLine {
        from: Point,
        to: Point,
        color: ThemeToken,
        width: f64,
    },

    /// Draw a text string at a position.
    DrawText {
        position: Point,
        text: SharedStr,
        color: ThemeToken,
        font_size: f64,
        align: TextAlign,
    },

    /// Begin a logical group (one diagram). Renderers may use this for
    /// layering or accessibility.
    BeginGroup {
        id: SharedStr,
        label: Option<SharedStr>,
    },

    /// End the current group.
    EndGroup,
}

impl RenderCommand {
    /// The hierarchy node a shape command stands for, if any.
    pub fn node(&self) -> Option<usize> {
        match self {
            Self::DrawRect { node, .. } | Self::DrawArc { node, .. } => *node,
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TextAlign {
    Left,
    Center,
    Right,
}
