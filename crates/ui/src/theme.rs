use heapvis_protocol::ThemeToken;

/// Resolved RGBA color for egui rendering.
#[derive(Debug, Clone, Copy)]
pub struct ResolvedColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl ResolvedColor {
    const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub fn to_color32(self) -> egui::Color32 {
        egui::Color32::from_rgba_unmultiplied(self.r, self.g, self.b, self.a)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThemeMode {
    Dark,
    Light,
}

impl ThemeMode {
    pub fn is_dark(self) -> bool {
        self == ThemeMode::Dark
    }
}

pub fn resolve(token: ThemeToken, mode: ThemeMode) -> egui::Color32 {
    match mode {
        ThemeMode::Dark => resolve_dark(token),
        ThemeMode::Light => resolve_light(token),
    }
    .to_color32()
}

fn resolve_dark(token: ThemeToken) -> ResolvedColor {
    // Catppuccin Mocha palette
    use ThemeToken::*;
    match token {
        Background => ResolvedColor::rgb(0x11, 0x11, 0x1b),     // Crust
        PlotBackground => ResolvedColor::rgb(0x1e, 0x1e, 0x2e), // Base

        AxisLine => ResolvedColor::rgb(0xa6, 0xad, 0xc8), // Subtext0
        AxisTick => ResolvedColor::rgb(0xa6, 0xad, 0xc8),
        AxisLabel => ResolvedColor::rgb(0xba, 0xc2, 0xde), // Subtext1
        GridLine => ResolvedColor::rgb(0x31, 0x32, 0x44),  // Surface0

        AskedForLine => ResolvedColor::rgb(0x89, 0xb4, 0xfa), // Blue
        UsableLine => ResolvedColor::rgb(0xa6, 0xe3, 0xa1),   // Green
        OccupiedLine => ResolvedColor::rgb(0xf3, 0x8b, 0xa8), // Red
        DataMarker => ResolvedColor::rgb(0xf9, 0xe2, 0xaf),   // Yellow

        StaleBarFill => ResolvedColor::rgb(0xcb, 0xa6, 0xf7), // Mauve
        StaleBarBorder => ResolvedColor::rgb(0xb4, 0xbe, 0xfe), // Lavender

        Cursor => ResolvedColor::rgb(0xfa, 0xb3, 0x87), // Peach
        CursorLabel => ResolvedColor::rgb(0xfa, 0xb3, 0x87),
        Selection => ResolvedColor::rgba(0x89, 0xb4, 0xfa, 70),

        TextPrimary => ResolvedColor::rgb(0xcd, 0xd6, 0xf4), // Text
        TextMuted => ResolvedColor::rgb(0xa6, 0xad, 0xc8),   // Subtext0
    }
}

fn resolve_light(token: ThemeToken) -> ResolvedColor {
    use ThemeToken::*;
    match token {
        Background => ResolvedColor::rgb(255, 255, 255),
        PlotBackground => ResolvedColor::rgb(250, 250, 252),

        AxisLine => ResolvedColor::rgb(60, 60, 70),
        AxisTick => ResolvedColor::rgb(60, 60, 70),
        AxisLabel => ResolvedColor::rgb(40, 40, 50),
        GridLine => ResolvedColor::rgb(225, 225, 232),

        AskedForLine => ResolvedColor::rgb(40, 120, 200),
        UsableLine => ResolvedColor::rgb(56, 142, 60),
        OccupiedLine => ResolvedColor::rgb(211, 47, 47),
        DataMarker => ResolvedColor::rgb(230, 170, 0),

        StaleBarFill => ResolvedColor::rgb(150, 120, 210),
        StaleBarBorder => ResolvedColor::rgb(90, 60, 160),

        Cursor => ResolvedColor::rgb(220, 60, 20),
        CursorLabel => ResolvedColor::rgb(180, 50, 20),
        Selection => ResolvedColor::rgba(66, 135, 245, 60),

        TextPrimary => ResolvedColor::rgb(20, 20, 30),
        TextMuted => ResolvedColor::rgb(100, 100, 110),
    }
}

// ── Typography scale ───────────────────────────────────────────────────────

pub const FONT_TITLE: f32 = 16.0;
pub const FONT_BODY: f32 = 12.0;
pub const FONT_CAPTION: f32 = 11.0;

// ── egui visual presets ────────────────────────────────────────────────────

/// Catppuccin Mocha dark visuals for egui widgets.
pub fn mocha_dark_visuals() -> egui::Visuals {
    let mut v = egui::Visuals::dark();
    v.panel_fill = egui::Color32::from_rgb(0x18, 0x18, 0x25);
    v.window_fill = egui::Color32::from_rgb(0x1e, 0x1e, 0x2e);
    v.extreme_bg_color = egui::Color32::from_rgb(0x11, 0x11, 0x1b);
    v.faint_bg_color = egui::Color32::from_rgb(0x1e, 0x1e, 0x2e);
    v.widgets.noninteractive.bg_stroke =
        egui::Stroke::new(1.0, egui::Color32::from_rgb(0x45, 0x47, 0x5a));
    v.widgets.inactive.bg_fill = egui::Color32::from_rgb(0x45, 0x47, 0x5a);
    v.widgets.hovered.bg_fill = egui::Color32::from_rgb(0x58, 0x5b, 0x70);
    v.widgets.active.bg_fill = egui::Color32::from_rgb(0x89, 0xb4, 0xfa);
    v.selection.bg_fill = egui::Color32::from_rgba_unmultiplied(0x89, 0xb4, 0xfa, 60);
    v.selection.stroke = egui::Stroke::new(1.0, egui::Color32::from_rgb(0x89, 0xb4, 0xfa));
    v.warn_fg_color = egui::Color32::from_rgb(0xf9, 0xe2, 0xaf);
    v.error_fg_color = egui::Color32::from_rgb(0xf3, 0x8b, 0xa8);
    v
}

pub fn light_visuals() -> egui::Visuals {
    let mut v = egui::Visuals::light();
    v.panel_fill = egui::Color32::from_rgb(250, 250, 252);
    v.faint_bg_color = egui::Color32::from_rgb(245, 245, 248);
    v.widgets.active.bg_fill = egui::Color32::from_rgb(50, 110, 220);
    v.selection.bg_fill = egui::Color32::from_rgba_unmultiplied(50, 110, 220, 50);
    v.selection.stroke = egui::Stroke::new(1.0, egui::Color32::from_rgb(50, 110, 220));
    v.warn_fg_color = egui::Color32::from_rgb(230, 170, 0);
    v.error_fg_color = egui::Color32::from_rgb(211, 47, 47);
    v
}

pub fn apply_typography(ctx: &egui::Context) {
    let mut style = (*ctx.style()).clone();
    style.text_styles.insert(
        egui::TextStyle::Heading,
        egui::FontId::proportional(FONT_TITLE),
    );
    style
        .text_styles
        .insert(egui::TextStyle::Body, egui::FontId::proportional(FONT_BODY));
    style.text_styles.insert(
        egui::TextStyle::Button,
        egui::FontId::proportional(FONT_BODY),
    );
    style.text_styles.insert(
        egui::TextStyle::Monospace,
        egui::FontId::monospace(FONT_CAPTION),
    );
    style.spacing.item_spacing = egui::vec2(8.0, 6.0);
    ctx.set_style(style);
}
