//! SVG renderer: converts `RenderCommand` lists into standalone SVG strings.

use std::f64::consts::{PI, TAU};
use std::fmt::Write as _;

use callwheel_protocol::{Point, RenderCommand, ThemeToken};

/// Render a list of commands as an SVG document string.
///
/// `width` and `height` define the SVG viewBox dimensions.
/// `dark` selects the color palette.
pub fn render_svg(commands: &[RenderCommand], width: f64, height: f64, dark: bool) -> String {
    let mut svg = String::with_capacity(commands.len() * 200);
    let _ = write!(
        svg,
        r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 {width} {height}" width="{width}" height="{height}" style="font-family:system-ui,-apple-system,sans-serif;font-size:11px">"#,
    );

    let bg = resolve_color(ThemeToken::Background, dark);
    let _ = write!(svg, r#"<rect width="{width}" height="{height}" fill="{bg}"/>"#);

    for cmd in commands {
        match cmd {
            RenderCommand::DrawRect {
                rect,
                color,
                border_color,
                label,
                ..
            } => {
                let fill = resolve_color(*color, dark);
                let _ = write!(
                    svg,
                    r#"<rect x="{}" y="{}" width="{}" height="{}" fill="{fill}"{}>"#,
                    rect.x,
                    rect.y,
                    rect.w,
                    rect.h,
                    stroke(*border_color, dark),
                );
                push_title(&mut svg, label.as_deref());
                svg.push_str("</rect>");

                // Label the box if it is wide enough to hold a few characters.
                if let Some(label) = label
                    && rect.w > 30.0
                    && rect.h > 8.0
                {
                    let text_color = resolve_color(ThemeToken::TextPrimary, dark);
                    let tx = rect.x + 3.0;
                    let ty = rect.y + rect.h.min(18.0) * 0.75;
                    let max_chars = (rect.w / 7.0) as usize;
                    let text = if label.chars().count() > max_chars && max_chars > 2 {
                        let truncated: String = label.chars().take(max_chars - 1).collect();
                        format!("{truncated}…")
                    } else {
                        label.to_string()
                    };
                    let _ = write!(
                        svg,
                        r#"<text x="{tx}" y="{ty}" fill="{text_color}" style="pointer-events:none">{}</text>"#,
                        escape_xml(&text),
                    );
                }
            }
            RenderCommand::DrawArc {
                center,
                inner_radius,
                outer_radius,
                start_angle,
                end_angle,
                color,
                border_color,
                label,
                ..
            } => {
                let fill = resolve_color(*color, dark);
                let d = sector_path(*center, *inner_radius, *outer_radius, *start_angle, *end_angle);
                let _ = write!(
                    svg,
                    r#"<path d="{d}" fill="{fill}" fill-rule="evenodd"{}>"#,
                    stroke(*border_color, dark),
                );
                push_title(&mut svg, label.as_deref());
                svg.push_str("</path>");
            }
            RenderCommand::DrawLine {
                from,
                to,
                color,
                width: line_width,
            } => {
                let stroke = resolve_color(*color, dark);
                let _ = write!(
                    svg,
                    r#"<line x1="{}" y1="{}" x2="{}" y2="{}" stroke="{stroke}" stroke-width="{line_width}"/>"#,
                    from.x, from.y, to.x, to.y,
                );
            }
            RenderCommand::DrawText {
                text,
                position,
                color,
                ..
            } => {
                let fill = resolve_color(*color, dark);
                let _ = write!(
                    svg,
                    r#"<text x="{}" y="{}" fill="{fill}">{}</text>"#,
                    position.x,
                    position.y,
                    escape_xml(text),
                );
            }
            // Groups carry no geometry.
            RenderCommand::BeginGroup { .. } | RenderCommand::EndGroup => {}
        }
    }

    svg.push_str("</svg>");
    svg
}

fn stroke(border: Option<ThemeToken>, dark: bool) -> String {
    border
        .map(|token| format!(r#" stroke="{}""#, resolve_color(token, dark)))
        .unwrap_or_default()
}

fn push_title(svg: &mut String, label: Option<&str>) {
    if let Some(label) = label {
        let _ = write!(svg, "<title>{}</title>", escape_xml(label));
    }
}

/// Angles run clockwise from twelve o'clock.
fn polar(center: Point, radius: f64, angle: f64) -> (f64, f64) {
    (
        center.x + radius * angle.sin(),
        center.y - radius * angle.cos(),
    )
}

/// Path data for an annular sector. A full turn is drawn as two half
/// arcs; a single SVG arc cannot start and end on the same point.
fn sector_path(center: Point, inner: f64, outer: f64, start: f64, end: f64) -> String {
    let sweep = (end - start).clamp(0.0, TAU);
    if sweep >= TAU - 1e-9 {
        let mut d = String::new();
        for radius in [outer, inner] {
            if radius <= 0.0 {
                continue;
            }
            let (x0, y0) = polar(center, radius, 0.0);
            let (x1, y1) = polar(center, radius, PI);
            let _ = write!(
                d,
                "M{x0},{y0}A{radius},{radius} 0 1,1 {x1},{y1}A{radius},{radius} 0 1,1 {x0},{y0}Z"
            );
        }
        return d;
    }

    let large = u8::from(sweep > PI);
    let (ox0, oy0) = polar(center, outer, start);
    let (ox1, oy1) = polar(center, outer, end);
    let mut d = format!("M{ox0},{oy0}A{outer},{outer} 0 {large},1 {ox1},{oy1}");
    if inner > 0.0 {
        let (ix1, iy1) = polar(center, inner, end);
        let (ix0, iy0) = polar(center, inner, start);
        let _ = write!(d, "L{ix1},{iy1}A{inner},{inner} 0 {large},0 {ix0},{iy0}Z");
    } else {
        let _ = write!(d, "L{},{}Z", center.x, center.y);
    }
    d
}

fn resolve_color(token: ThemeToken, dark: bool) -> &'static str {
    if dark {
        match token {
            ThemeToken::Slice0 => "#3182bd",
            ThemeToken::Slice1 => "#6baed6",
            ThemeToken::Slice2 => "#e6550d",
            ThemeToken::Slice3 => "#fd8d3c",
            ThemeToken::Slice4 => "#31a354",
            ThemeToken::Slice5 => "#74c476",
            ThemeToken::Slice6 => "#756bb1",
            ThemeToken::Slice7 => "#9e9ac8",
            ThemeToken::HoverHighlight => "#ff00ff",
            ThemeToken::Background => "#181818",
            ThemeToken::Border => "#303030",
            ThemeToken::Link => "#ff5252",
            ThemeToken::TextPrimary => "#ececec",
            ThemeToken::TextSecondary => "#9e9e9e",
            ThemeToken::ErrorBanner => "#c62828",
        }
    } else {
        match token {
            ThemeToken::Slice0 => "#3182bd",
            ThemeToken::Slice1 => "#9ecae1",
            ThemeToken::Slice2 => "#e6550d",
            ThemeToken::Slice3 => "#fdae6b",
            ThemeToken::Slice4 => "#31a354",
            ThemeToken::Slice5 => "#a1d99b",
            ThemeToken::Slice6 => "#756bb1",
            ThemeToken::Slice7 => "#bcbddc",
            ThemeToken::HoverHighlight => "#ff00ff",
            ThemeToken::Background => "#ffffff",
            ThemeToken::Border => "#ffffff",
            ThemeToken::Link => "#ff0000",
            ThemeToken::TextPrimary => "#1a1a2e",
            ThemeToken::TextSecondary => "#666677",
            ThemeToken::ErrorBanner => "#e63946",
        }
    }
}

fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use callwheel_protocol::Rect;

    #[test]
    fn basic_svg_output() {
        let commands = vec![RenderCommand::DrawRect {
            rect: Rect::new(10.0, 20.0, 100.0, 18.0),
            color: ThemeToken::Slice2,
            border_color: None,
            label: Some("main".into()),
            node: Some(1),
        }];
        let svg = render_svg(&commands, 800.0, 400.0, true);
        assert!(svg.starts_with("<svg"));
        assert!(svg.ends_with("</svg>"));
        assert!(svg.contains("<title>main</title>"));
        assert!(svg.contains("#e6550d"));
    }

    #[test]
    fn escapes_xml_entities() {
        let commands = vec![RenderCommand::DrawRect {
            rect: Rect::new(0.0, 0.0, 200.0, 18.0),
            color: ThemeToken::Slice0,
            border_color: None,
            label: Some("~:0(<built-in method time.sleep>)".into()),
            node: None,
        }];
        let svg = render_svg(&commands, 400.0, 100.0, false);
        assert!(svg.contains("~:0(&lt;built-in method time.sleep&gt;)"));
        assert!(!svg.contains("<built-in"));
    }

    #[test]
    fn arcs_become_sector_paths() {
        let quarter = RenderCommand::DrawArc {
            center: Point::new(50.0, 50.0),
            inner_radius: 10.0,
            outer_radius: 20.0,
            start_angle: 0.0,
            end_angle: PI / 2.0,
            color: ThemeToken::Slice4,
            border_color: Some(ThemeToken::Border),
            label: Some("work".into()),
            node: Some(2),
        };
        let full = RenderCommand::DrawArc {
            center: Point::new(50.0, 50.0),
            inner_radius: 0.0,
            outer_radius: 10.0,
            start_angle: 0.0,
            end_angle: TAU,
            color: ThemeToken::Slice1,
            border_color: None,
            label: None,
            node: Some(0),
        };
        let svg = render_svg(&[full, quarter], 100.0, 100.0, false);
        assert_eq!(svg.matches("<path").count(), 2);
        // Quarter sector starts at twelve o'clock on the outer ring.
        assert!(svg.contains("M50,30A20,20 0 0,1 70,50"));
        // Full disc: two half circles, no inner ring.
        assert!(svg.contains("M50,40A10,10 0 1,1 50,60A10,10 0 1,1 50,40Z"));
        assert!(svg.contains("<title>work</title></path>"));
    }
}
