//! SVG renderer: turns a viewport's `RenderCommand` list into a standalone
//! SVG document.

use std::fmt::Write as _;

use heapvis_protocol::{RenderCommand, TextAlign, ThemeToken};

/// Render `commands` as an SVG document of `width` x `height`.
///
/// Groups become `<g>` elements and clip regions become `clipPath`s, so a
/// well-nested command list yields well-formed XML. `dark` selects the
/// palette.
pub fn render_svg(commands: &[RenderCommand], width: f64, height: f64, dark: bool) -> String {
    let mut svg = String::with_capacity(commands.len() * 120);
    let _ = write!(
        svg,
        r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 {width} {height}" width="{width}" height="{height}" style="font-family:monospace">"#,
    );
    let _ = write!(
        svg,
        r#"<rect width="{width}" height="{height}" fill="{}"/>"#,
        resolve_color(ThemeToken::Background, dark)
    );

    let mut crisp = false;
    let mut clips = 0usize;
    for cmd in commands {
        let rendering = if crisp {
            r#" shape-rendering="crispEdges""#
        } else {
            ""
        };
        match cmd {
            RenderCommand::DrawRect {
                rect,
                color,
                border_color,
                item_id,
            } => {
                let _ = write!(
                    svg,
                    r#"<rect x="{}" y="{}" width="{}" height="{}" fill="{}""#,
                    rect.x,
                    rect.y,
                    rect.w,
                    rect.h,
                    resolve_color(*color, dark)
                );
                if let Some(border) = border_color {
                    let _ = write!(svg, r#" stroke="{}""#, resolve_color(*border, dark));
                }
                if let Some(id) = item_id {
                    let _ = write!(svg, r#" data-item="{id}""#);
                }
                let _ = write!(svg, "{rendering}/>");
            }
            RenderCommand::DrawLine {
                from,
                to,
                color,
                width: line_width,
            } => {
                let _ = write!(
                    svg,
                    r#"<line x1="{}" y1="{}" x2="{}" y2="{}" stroke="{}" stroke-width="{line_width}"{rendering}/>"#,
                    from.x,
                    from.y,
                    to.x,
                    to.y,
                    resolve_color(*color, dark)
                );
            }
            RenderCommand::DrawText {
                position,
                text,
                color,
                font_size,
                align,
            } => {
                let anchor = match align {
                    TextAlign::Left => "start",
                    TextAlign::Center => "middle",
                    TextAlign::Right => "end",
                };
                let _ = write!(
                    svg,
                    r#"<text x="{}" y="{}" fill="{}" font-size="{font_size}" text-anchor="{anchor}" dominant-baseline="middle">{}</text>"#,
                    position.x,
                    position.y,
                    resolve_color(*color, dark),
                    escape_xml(text)
                );
            }
            RenderCommand::SetAntialiasing { enabled } => crisp = !enabled,
            RenderCommand::SetClip { rect } => {
                clips += 1;
                let _ = write!(
                    svg,
                    r#"<clipPath id="clip{clips}"><rect x="{}" y="{}" width="{}" height="{}"/></clipPath><g clip-path="url(#clip{clips})">"#,
                    rect.x, rect.y, rect.w, rect.h
                );
            }
            RenderCommand::BeginGroup { id } => {
                let _ = write!(svg, r#"<g class="{}">"#, escape_xml(id));
            }
            RenderCommand::ClearClip | RenderCommand::EndGroup => svg.push_str("</g>"),
        }
    }

    svg.push_str("</svg>");
    svg
}

fn resolve_color(token: ThemeToken, dark: bool) -> &'static str {
    if dark {
        match token {
            ThemeToken::Background => "#181818",
            ThemeToken::PlotBackground => "#202020",
            ThemeToken::AxisLine | ThemeToken::AxisTick => "#9e9e9e",
            ThemeToken::AxisLabel | ThemeToken::TextPrimary | ThemeToken::CursorLabel => "#ececec",
            ThemeToken::GridLine => "#303030",
            ThemeToken::AskedForLine => "#42a5f5",
            ThemeToken::UsableLine => "#66bb6a",
            ThemeToken::OccupiedLine => "#ef5350",
            ThemeToken::DataMarker => "#ffd600",
            ThemeToken::StaleBarFill => "#7e57c2",
            ThemeToken::StaleBarBorder => "#b39ddb",
            ThemeToken::Cursor => "#ff7043",
            ThemeToken::Selection => "#448aff",
            ThemeToken::TextMuted => "#9e9e9e",
        }
    } else {
        match token {
            ThemeToken::Background => "#ffffff",
            ThemeToken::PlotBackground => "#f8f9fa",
            ThemeToken::AxisLine | ThemeToken::AxisTick => "#495057",
            ThemeToken::AxisLabel | ThemeToken::TextPrimary | ThemeToken::CursorLabel => "#1a1a2e",
            ThemeToken::GridLine => "#dee2e6",
            ThemeToken::AskedForLine => "#1565c0",
            ThemeToken::UsableLine => "#2e7d32",
            ThemeToken::OccupiedLine => "#c62828",
            ThemeToken::DataMarker => "#f9a825",
            ThemeToken::StaleBarFill => "#9575cd",
            ThemeToken::StaleBarBorder => "#4527a0",
            ThemeToken::Cursor => "#e64a19",
            ThemeToken::Selection => "#90caf9",
            ThemeToken::TextMuted => "#666677",
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
