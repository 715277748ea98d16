use serde::{Deserialize, Serialize};

use crate::theme::ThemeToken;
use crate::types::{Point, Rect};

/// A single, stateless render instruction.
///
/// Viewports emit a `Vec<RenderCommand>` in widget-local coordinates
/// (origin top-left, y grows downward). Renderers consume the list
/// sequentially; each command carries all the data it needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RenderCommand {
    /// Draw a filled rectangle, optionally outlined, with an optional
    /// logical item identifier for hit-testing.
    DrawRect {
        rect: Rect,
        color: ThemeToken,
        border_color: Option<ThemeToken>,
        item_id: Option<u64>,
    },

    /// Draw a text string anchored at a position.
    DrawText {
        position: Point,
        text: String,
        color: ThemeToken,
        font_size: f64,
        align: TextAlign,
    },

    /// Draw a line segment.
    DrawLine {
        from: Point,
        to: Point,
        color: ThemeToken,
        width: f64,
    },

    /// Toggle antialiased rasterization for the commands that follow.
    SetAntialiasing { enabled: bool },

    /// Restrict subsequent drawing to a rectangular region.
    SetClip { rect: Rect },

    /// Remove the active clip region.
    ClearClip,

    /// Begin a logical group (axes, a data series, the cursor overlay).
    BeginGroup { id: String },

    /// End the current group.
    EndGroup,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TextAlign {
    Left,
    Center,
    Right,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commands_serialize_with_variant_tags() {
        let cmd = RenderCommand::DrawLine {
            from: Point::new(0.0, 1.0),
            to: Point::new(2.0, 3.0),
            color: ThemeToken::Cursor,
            width: 1.0,
        };
        let json = serde_json::to_string(&cmd).unwrap_or_default();
        assert!(json.starts_with("{\"DrawLine\""));
        assert!(json.contains("\"Cursor\""));
    }
}
