use egui::{Align2, CornerRadius, FontId, Pos2, Rect, Stroke, StrokeKind};
use heapvis_protocol::{RenderCommand, TextAlign};

use crate::theme::{self, ThemeMode};

/// A drawn rectangle that carries a logical item, for hover lookups.
pub struct HitRegion {
    pub rect: Rect,
    pub item_id: u64,
}

/// Result of rendering a command list.
pub struct RenderResult {
    pub hit_regions: Vec<HitRegion>,
}

impl RenderResult {
    pub fn item_at(&self, pos: Pos2) -> Option<u64> {
        self.hit_regions
            .iter()
            .rev()
            .find(|r| r.rect.contains(pos))
            .map(|r| r.item_id)
    }
}

/// Paint a `RenderCommand` list with an egui `Painter`.
///
/// `offset` is the top-left pixel position of the widget; commands are in
/// widget-local coordinates.
pub fn render_commands(
    painter: &mut egui::Painter,
    commands: &[RenderCommand],
    offset: Pos2,
    mode: ThemeMode,
) -> RenderResult {
    let mut clip_stack: Vec<Rect> = Vec::new();
    let mut hit_regions: Vec<HitRegion> = Vec::new();
    let at = |x: f64, y: f64| Pos2::new(x as f32 + offset.x, y as f32 + offset.y);

    for cmd in commands {
        match cmd {
            RenderCommand::DrawRect {
                rect,
                color,
                border_color,
                item_id,
            } => {
                let egui_rect =
                    Rect::from_min_size(at(rect.x, rect.y), egui::vec2(rect.w as f32, rect.h as f32));
                if egui_rect.width() < 0.5 && egui_rect.height() < 0.5 {
                    continue;
                }
                if !painter.clip_rect().intersects(egui_rect) {
                    continue;
                }

                painter.rect_filled(egui_rect, CornerRadius::ZERO, theme::resolve(*color, mode));
                if let Some(bc) = border_color {
                    painter.rect_stroke(
                        egui_rect,
                        CornerRadius::ZERO,
                        Stroke::new(1.0, theme::resolve(*bc, mode)),
                        StrokeKind::Inside,
                    );
                }
                if let Some(id) = item_id {
                    hit_regions.push(HitRegion {
                        rect: egui_rect.intersect(painter.clip_rect()),
                        item_id: *id,
                    });
                }
            }

            RenderCommand::DrawText {
                position,
                text,
                color,
                font_size,
                align,
            } => {
                let size = *font_size as f32;
                if size < 1.0 {
                    continue;
                }
                let anchor = match align {
                    TextAlign::Left => Align2::LEFT_CENTER,
                    TextAlign::Center => Align2::CENTER_CENTER,
                    TextAlign::Right => Align2::RIGHT_CENTER,
                };
                painter.text(
                    at(position.x, position.y),
                    anchor,
                    text,
                    FontId::monospace(size),
                    theme::resolve(*color, mode),
                );
            }

            RenderCommand::DrawLine {
                from,
                to,
                color,
                width,
            } => {
                painter.line_segment(
                    [at(from.x, from.y), at(to.x, to.y)],
                    Stroke::new(*width as f32, theme::resolve(*color, mode)),
                );
            }

            RenderCommand::SetClip { rect } => {
                let clip_rect =
                    Rect::from_min_size(at(rect.x, rect.y), egui::vec2(rect.w as f32, rect.h as f32));
                clip_stack.push(painter.clip_rect());
                let intersected = painter.clip_rect().intersect(clip_rect);
                painter.set_clip_rect(intersected);
            }

            RenderCommand::ClearClip => {
                if let Some(prev) = clip_stack.pop() {
                    painter.set_clip_rect(prev);
                }
            }

            // Feathering is a context-wide tessellation setting in egui; the
            // app applies it once per frame from the options.
            RenderCommand::SetAntialiasing { .. }
            | RenderCommand::BeginGroup { .. }
            | RenderCommand::EndGroup => {}
        }
    }

    RenderResult { hit_regions }
}
