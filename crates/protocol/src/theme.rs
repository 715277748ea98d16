use serde::{Deserialize, Serialize};

/// Semantic color tokens resolved by the renderer's active theme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ThemeToken {
    Background,
    PlotBackground,

    // Axes
    AxisLine,
    AxisTick,
    AxisLabel,
    GridLine,

    // Memory series
    AskedForLine,
    UsableLine,
    OccupiedLine,
    DataMarker,

    // Staleness bars
    StaleBarFill,
    StaleBarBorder,

    // Interaction overlay
    Cursor,
    CursorLabel,
    Selection,

    TextPrimary,
    TextMuted,
}
