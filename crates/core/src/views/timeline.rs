use std::sync::Arc;

use heapvis_protocol::{FontMetrics, Point, Rect, RenderCommand, TextAlign, ThemeToken, Viewport};

use super::axis::{self, DragSelection, GRAPH_MARGIN, MIN_SPAN, PlotLayout};
use crate::model::{Dataset, Snapshot};
use crate::options::Options;

const MARKER_SIZE: f64 = 3.0;
const LINE_WIDTH: f64 = 2.0;

/// One of the three memory series drawn on the timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Series {
    AskedFor,
    Usable,
    Occupied,
}

impl Series {
    pub const ALL: [Series; 3] = [Series::AskedFor, Series::Usable, Series::Occupied];

    pub fn label(self) -> &'static str {
        match self {
            Series::AskedFor => "Memory requested",
            Series::Usable => "Padding",
            Series::Occupied => "Heap headers",
        }
    }

    fn token(self) -> ThemeToken {
        match self {
            Series::AskedFor => ThemeToken::AskedForLine,
            Series::Usable => ThemeToken::UsableLine,
            Series::Occupied => ThemeToken::OccupiedLine,
        }
    }

    fn index(self) -> usize {
        self as usize
    }

    fn value(self, snapshot: &Snapshot) -> u64 {
        match self {
            Series::AskedFor => snapshot.tot_bytes_asked_for,
            Series::Usable => snapshot.tot_bytes_usable,
            Series::Occupied => snapshot.tot_bytes_occupied,
        }
    }
}

/// Which series are drawn. All on by default.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineToggles([bool; 3]);

impl Default for LineToggles {
    fn default() -> Self {
        Self([true; 3])
    }
}

impl LineToggles {
    pub fn is_visible(&self, series: Series) -> bool {
        self.0[series.index()]
    }

    pub fn set(&mut self, series: Series, visible: bool) {
        self.0[series.index()] = visible;
    }
}

/// Cumulative memory over tick-weighted time.
///
/// The x axis spans the visible window `[view_start_percent,
/// view_end_percent]` of the total tick weight. Axes and data are cached
/// and only rebuilt when the data, the window, the options or the line
/// toggles change; the cursor and selection overlay are drawn fresh on
/// every render.
pub struct TimelineViewport {
    dataset: Arc<Dataset>,
    options: Options,
    lines: LineToggles,
    viewport: Viewport,
    metrics: FontMetrics,
    layout: PlotLayout,
    max_value: u64,
    total_ticks: u64,
    view_start_percent: f64,
    view_end_percent: f64,
    /// Cursor position, plot-relative.
    highlighted_x: f64,
    highlight_percent: f64,
    current_snapshot: Option<usize>,
    drag: Option<DragSelection>,
    cache: Option<Vec<RenderCommand>>,
}

impl TimelineViewport {
    pub fn new(
        dataset: Arc<Dataset>,
        options: Options,
        viewport: Viewport,
        metrics: FontMetrics,
    ) -> Self {
        let mut timeline = Self {
            dataset,
            options: options.validated(),
            lines: LineToggles::default(),
            viewport,
            metrics,
            layout: PlotLayout::new(&viewport, &metrics, "0"),
            max_value: 0,
            total_ticks: 0,
            view_start_percent: 0.0,
            view_end_percent: 100.0,
            highlighted_x: 0.0,
            highlight_percent: 0.0,
            current_snapshot: None,
            drag: None,
            cache: None,
        };
        timeline.rescale();
        timeline
    }

    fn rescale(&mut self) {
        let hide_peak = self.options.hide_peak_snapshot;
        self.max_value = self.dataset.max_occupied(hide_peak);
        self.total_ticks = self.dataset.total_ticks(hide_peak);
        self.layout = PlotLayout::new(&self.viewport, &self.metrics, &self.max_value.to_string());
        self.cache = None;
    }

    pub fn dataset(&self) -> &Arc<Dataset> {
        &self.dataset
    }

    pub fn layout(&self) -> &PlotLayout {
        &self.layout
    }

    pub fn view_window(&self) -> (f64, f64) {
        (self.view_start_percent, self.view_end_percent)
    }

    pub fn current_snapshot(&self) -> Option<usize> {
        self.current_snapshot
    }

    pub fn lines(&self) -> LineToggles {
        self.lines
    }

    pub fn is_cached(&self) -> bool {
        self.cache.is_some()
    }

    /// No visible snapshots, or no tick weight to spread them over.
    pub fn is_empty(&self) -> bool {
        self.total_ticks == 0
            || self
                .dataset
                .visible_snapshots(self.options.hide_peak_snapshot)
                .next()
                .is_none()
    }

    fn span(&self) -> f64 {
        self.view_end_percent - self.view_start_percent
    }

    /// Plot-relative x of cumulative percent `p`.
    fn percent_x(&self, percent: f64) -> f64 {
        (percent - self.view_start_percent) * self.layout.plot_w / self.span()
    }

    pub fn resize(&mut self, viewport: Viewport) {
        self.viewport = viewport;
        self.layout = PlotLayout::new(&viewport, &self.metrics, &self.max_value.to_string());
        self.highlighted_x = self
            .percent_x(self.highlight_percent)
            .clamp(0.0, self.layout.plot_w.max(0.0));
        self.cache = None;
    }

    pub fn set_font_metrics(&mut self, metrics: FontMetrics) {
        self.metrics = metrics;
        self.resize(self.viewport);
    }

    /// Take a new copy of the options and re-resolve the highlight.
    pub fn apply_options(&mut self, options: Options) -> Option<usize> {
        self.options = options.validated();
        self.rescale();
        self.resolve_highlight()
    }

    pub fn set_line_visible(&mut self, series: Series, visible: bool) {
        if self.lines.is_visible(series) != visible {
            self.lines.set(series, visible);
            self.cache = None;
        }
    }

    /// Start a zoom selection at widget-local `x`.
    pub fn press(&mut self, x: f64) {
        self.drag = Some(DragSelection::new(self.layout.to_plot_x(x)));
    }

    pub fn drag_to(&mut self, x: f64) {
        let x = self.layout.to_plot_x(x);
        if let Some(drag) = &mut self.drag {
            drag.current_x = x;
        }
    }

    pub fn selection(&self) -> Option<DragSelection> {
        self.drag
    }

    /// Finish the zoom selection, compose it with the current window and
    /// return the newly highlighted snapshot if the cursor now lands on a
    /// different one.
    pub fn release(&mut self) -> Option<usize> {
        let drag = self.drag.take()?;
        let plot_w = self.layout.plot_w;
        if plot_w <= 0.0 || self.is_empty() {
            return None;
        }
        let start = self.view_start_percent;
        let span = self.span();
        let mut new_start = start + drag.anchor_x / plot_w * span;
        let mut new_end = start + drag.current_x / plot_w * span;
        if new_start > new_end {
            std::mem::swap(&mut new_start, &mut new_end);
        }
        if new_end - new_start < MIN_SPAN {
            new_end = new_start + MIN_SPAN;
        }
        if new_start >= 100.0 - MIN_SPAN {
            new_start = 100.0 - MIN_SPAN;
            new_end = 100.0;
        }
        tracing::debug!(start = new_start, end = new_end, "timeline zoomed");
        self.view_start_percent = new_start;
        self.view_end_percent = new_end;
        self.cache = None;
        self.resolve_highlight()
    }

    pub fn reset_zoom(&mut self) -> Option<usize> {
        self.view_start_percent = 0.0;
        self.view_end_percent = 100.0;
        self.drag = None;
        self.cache = None;
        self.resolve_highlight()
    }

    /// Move the cursor to widget-local `x`. Returns the snapshot under it
    /// only when that differs from the current one.
    pub fn highlight_at(&mut self, x: f64) -> Option<usize> {
        self.highlighted_x = self.layout.to_plot_x(x);
        self.resolve_highlight()
    }

    /// Map the cursor to a cumulative percent and find the snapshot whose
    /// accumulated range contains it.
    pub fn resolve_highlight(&mut self) -> Option<usize> {
        if self.is_empty() {
            self.current_snapshot = None;
            return None;
        }
        let plot_w = self.layout.plot_w;
        let offset = if plot_w > 0.0 {
            self.highlighted_x / plot_w * self.span()
        } else {
            0.0
        };
        self.highlight_percent = self.view_start_percent + offset;

        let total = self.total_ticks as f64;
        let mut cumulative = 0.0;
        let mut found = None;
        for snapshot in self
            .dataset
            .visible_snapshots(self.options.hide_peak_snapshot)
        {
            cumulative += snapshot.num_ticks as f64 / total * 100.0;
            found = Some(snapshot.id);
            if self.highlight_percent <= cumulative {
                break;
            }
        }

        if found == self.current_snapshot {
            return None;
        }
        self.current_snapshot = found;
        tracing::debug!(snapshot = ?found, percent = self.highlight_percent, "highlight changed");
        found
    }

    pub fn render(&mut self) -> Vec<RenderCommand> {
        if self.is_empty() {
            return axis::render_empty(&self.viewport, &self.metrics);
        }
        let mut commands = match &self.cache {
            Some(base) => base.clone(),
            None => {
                let base = self.build_base();
                self.cache = Some(base.clone());
                base
            }
        };
        self.render_overlay(&mut commands);
        commands
    }

    fn build_base(&self) -> Vec<RenderCommand> {
        let mut commands = Vec::with_capacity(256);
        commands.push(RenderCommand::BeginGroup { id: "axes".into() });
        commands.extend(axis::render_x_axis(&self.layout, self.span()));
        commands.extend(axis::render_y_axis(
            &self.layout,
            self.max_value as f64,
            self.options.num_vertical_ticks,
            self.metrics.font_size,
        ));
        commands.push(RenderCommand::EndGroup);

        commands.push(RenderCommand::BeginGroup { id: "series".into() });
        let plot = self.layout.plot_rect();
        commands.push(RenderCommand::SetClip {
            rect: Rect::new(plot.x, plot.y - MARKER_SIZE, plot.w, plot.h + 2.0 * MARKER_SIZE),
        });
        commands.push(RenderCommand::SetAntialiasing {
            enabled: self.options.antialiasing_enabled,
        });
        self.render_series(&mut commands);
        commands.push(RenderCommand::SetAntialiasing { enabled: true });
        commands.push(RenderCommand::ClearClip);
        commands.push(RenderCommand::EndGroup);
        commands
    }

    fn render_series(&self, commands: &mut Vec<RenderCommand>) {
        let left = self.layout.left_bound;
        let max = self.max_value as f64;
        let total = self.total_ticks as f64;
        let origin = Point::new(left, self.layout.baseline());
        let mut prev = [origin; 3];

        let mut cumulative = 0.0;
        let mut first = true;
        let mut last = false;
        for snapshot in self
            .dataset
            .visible_snapshots(self.options.hide_peak_snapshot)
        {
            cumulative += snapshot.num_ticks as f64 / total * 100.0;
            let x = left + self.percent_x(cumulative);
            if cumulative < self.view_start_percent {
                for series in Series::ALL {
                    let y = self.layout.value_y(series.value(snapshot) as f64, max);
                    prev[series.index()] = Point::new(x, y);
                }
                continue;
            }
            if last {
                break;
            }
            if cumulative > self.view_end_percent {
                last = true;
            }
            for series in Series::ALL {
                if !self.lines.is_visible(series) {
                    continue;
                }
                let y = self.layout.value_y(series.value(snapshot) as f64, max);
                let slot = &mut prev[series.index()];
                self.render_segment(commands, series, slot, Point::new(x, y), first);
            }
            first = false;
        }
    }

    /// Join `prev` to `point` and mark `point`. The first visible datum is
    /// joined from the left edge of the plot.
    fn render_segment(
        &self,
        commands: &mut Vec<RenderCommand>,
        series: Series,
        prev: &mut Point,
        point: Point,
        first: bool,
    ) {
        let left = self.layout.left_bound;
        let square = self.options.square_graph;
        if first {
            prev.y = if square {
                point.y
            } else {
                let dx = point.x - prev.x;
                if dx.abs() < f64::EPSILON {
                    point.y
                } else {
                    let slope = (point.y - prev.y) / dx;
                    prev.y + slope * (left - prev.x)
                }
            };
            prev.x = left;
        }
        let color = series.token();
        if square {
            let corner = Point::new(prev.x, point.y);
            commands.push(line(*prev, corner, color));
            commands.push(marker(corner, color));
            *prev = corner;
        }
        commands.push(line(*prev, point, color));
        commands.push(marker(point, color));
        *prev = point;
    }

    fn render_overlay(&self, commands: &mut Vec<RenderCommand>) {
        commands.push(RenderCommand::BeginGroup {
            id: "overlay".into(),
        });
        if let Some(drag) = &self.drag {
            commands.push(drag.render(&self.layout));
        }
        commands.push(axis::render_cursor(&self.layout, self.highlighted_x));
        if let Some(snapshot) = self.current_snapshot {
            commands.push(RenderCommand::DrawText {
                position: Point::new(
                    self.layout.left_bound + self.highlighted_x - 3.0,
                    GRAPH_MARGIN / 2.0 + self.layout.text_height / 2.0,
                ),
                text: format!("#{snapshot}"),
                color: ThemeToken::CursorLabel,
                font_size: self.metrics.font_size,
                align: TextAlign::Right,
            });
        }
        commands.push(RenderCommand::EndGroup);
    }
}

fn line(from: Point, to: Point, color: ThemeToken) -> RenderCommand {
    RenderCommand::DrawLine {
        from,
        to,
        color,
        width: LINE_WIDTH,
    }
}

fn marker(at: Point, color: ThemeToken) -> RenderCommand {
    let half = MARKER_SIZE / 2.0;
    RenderCommand::DrawRect {
        rect: Rect::new(at.x - half, at.y - half, MARKER_SIZE, MARKER_SIZE),
        color: ThemeToken::DataMarker,
        border_color: Some(color),
        item_id: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snap(id: usize, ticks: u64, asked: u64, usable: u64, occupied: u64) -> Snapshot {
        let mut s = Snapshot::new(id, ticks);
        s.tot_bytes_asked_for = asked;
        s.tot_bytes_usable = usable;
        s.tot_bytes_occupied = occupied;
        s
    }

    fn metrics() -> FontMetrics {
        FontMetrics {
            font_size: 10.0,
            char_width: 5.0,
            line_height: 12.0,
        }
    }

    /// Four snapshots of equal weight: each covers 25% of the timeline.
    fn timeline() -> TimelineViewport {
        let ds = Dataset::new(
            vec![],
            vec![
                snap(0, 10, 10, 20, 30),
                snap(1, 10, 40, 50, 60),
                snap(2, 10, 70, 80, 90),
                snap(3, 10, 20, 30, 40),
            ],
            "ticks".into(),
        );
        TimelineViewport::new(
            Arc::new(ds),
            Options::default(),
            Viewport::new(435.0, 200.0),
            metrics(),
        )
    }

    fn plot_x(t: &TimelineViewport, fraction: f64) -> f64 {
        t.layout().left_bound + t.layout().plot_w * fraction
    }

    #[test]
    fn highlight_resolves_by_cumulative_weight() {
        let mut t = timeline();
        assert_eq!(t.highlight_at(plot_x(&t, 0.0)), Some(0));
        assert_eq!(t.highlight_at(plot_x(&t, 0.3)), Some(1));
        assert_eq!(t.highlight_at(plot_x(&t, 0.99)), Some(3));
        assert_eq!(t.current_snapshot(), Some(3));
    }

    #[test]
    fn highlight_emits_once_per_change() {
        let mut t = timeline();
        let x = plot_x(&t, 0.6);
        assert_eq!(t.highlight_at(x), Some(2));
        assert_eq!(t.highlight_at(x), None);
        assert_eq!(t.highlight_at(x + 1.0), None);
    }

    #[test]
    fn zoom_is_ordered_regardless_of_direction() {
        for (a, b) in [(0.2, 0.7), (0.7, 0.2)] {
            let mut t = timeline();
            t.press(plot_x(&t, a));
            t.drag_to(plot_x(&t, b));
            t.release();
            let (start, end) = t.view_window();
            assert!((start - 20.0).abs() < 1e-6);
            assert!((end - 70.0).abs() < 1e-6);
        }
    }

    #[test]
    fn tiny_zoom_widens_to_minimum_span() {
        let mut t = timeline();
        let x = plot_x(&t, 0.5);
        t.press(x);
        t.drag_to(x);
        t.release();
        let (start, end) = t.view_window();
        assert!(start < end);
        assert!(end - start >= MIN_SPAN - 1e-9);
    }

    #[test]
    fn zoom_near_right_edge_is_clamped() {
        let mut t = timeline();
        let x = plot_x(&t, 1.0);
        t.press(x);
        t.drag_to(x + 50.0);
        t.release();
        assert_eq!(t.view_window(), (98.0, 100.0));
    }

    #[test]
    fn nested_zoom_composes_with_window() {
        let mut t = timeline();
        t.press(plot_x(&t, 0.0));
        t.drag_to(plot_x(&t, 0.5));
        t.release();
        t.press(plot_x(&t, 0.5));
        t.drag_to(plot_x(&t, 1.0));
        t.release();
        let (start, end) = t.view_window();
        assert!((start - 25.0).abs() < 1e-6);
        assert!((end - 50.0).abs() < 1e-6);
    }

    #[test]
    fn reset_zoom_restores_full_window() {
        let mut t = timeline();
        t.press(plot_x(&t, 0.5));
        t.drag_to(plot_x(&t, 0.75));
        t.release();
        t.highlight_at(plot_x(&t, 0.0));
        // left edge of the [50, 75] window is the end of snapshot 1
        assert_eq!(t.current_snapshot(), Some(1));
        assert_eq!(t.reset_zoom(), Some(0));
        assert_eq!(t.view_window(), (0.0, 100.0));
    }

    #[test]
    fn overlay_does_not_invalidate_cache() {
        let mut t = timeline();
        let first = t.render();
        assert!(t.is_cached());
        t.highlight_at(plot_x(&t, 0.6));
        let second = t.render();
        assert!(t.is_cached());
        assert_ne!(first, second);
        t.set_line_visible(Series::Usable, false);
        assert!(!t.is_cached());
    }

    #[test]
    fn hidden_lines_are_not_drawn() {
        let mut t = timeline();
        t.set_line_visible(Series::AskedFor, false);
        t.set_line_visible(Series::Occupied, false);
        let cmds = t.render();
        let tokens: Vec<ThemeToken> = cmds
            .iter()
            .filter_map(|c| match c {
                RenderCommand::DrawLine { color, .. } => Some(*color),
                _ => None,
            })
            .filter(|c| {
                matches!(
                    c,
                    ThemeToken::AskedForLine | ThemeToken::UsableLine | ThemeToken::OccupiedLine
                )
            })
            .collect();
        assert!(!tokens.is_empty());
        assert!(tokens.iter().all(|c| *c == ThemeToken::UsableLine));
    }

    #[test]
    fn cursor_label_names_snapshot() {
        let mut t = timeline();
        t.highlight_at(plot_x(&t, 0.3));
        let cmds = t.render();
        assert!(cmds.iter().any(|c| matches!(
            c,
            RenderCommand::DrawText { text, .. } if text == "#1"
        )));
    }

    #[test]
    fn empty_dataset_renders_placeholder() {
        let mut t = TimelineViewport::new(
            Arc::new(Dataset::default()),
            Options::default(),
            Viewport::new(300.0, 200.0),
            metrics(),
        );
        assert!(t.is_empty());
        assert_eq!(t.highlight_at(50.0), None);
        let cmds = t.render();
        assert_eq!(cmds.len(), 1);
        assert!(matches!(
            &cmds[0],
            RenderCommand::DrawText { text, .. } if text == axis::EMPTY_MESSAGE
        ));
    }

    #[test]
    fn zero_weight_is_degenerate() {
        let ds = Dataset::new(vec![], vec![snap(0, 0, 1, 1, 1)], "ticks".into());
        let t = TimelineViewport::new(
            Arc::new(ds),
            Options::default(),
            Viewport::new(300.0, 200.0),
            metrics(),
        );
        assert!(t.is_empty());
    }

    #[test]
    fn hiding_peak_skips_it_when_resolving() {
        let mut t = timeline();
        let options = Options {
            hide_peak_snapshot: true,
            ..Options::default()
        };
        t.apply_options(options);
        // snapshot 2 is the peak; three remaining snapshots of a third each
        assert_eq!(t.highlight_at(plot_x(&t, 0.5)), Some(1));
        assert_eq!(t.highlight_at(plot_x(&t, 0.9)), Some(3));
    }

    #[test]
    fn square_mode_adds_corner_segments() {
        let mut linear = timeline();
        let linear_lines = linear.render().len();
        let mut square = timeline();
        square.apply_options(Options {
            square_graph: true,
            ..Options::default()
        });
        assert!(square.render().len() > linear_lines);
    }
}
