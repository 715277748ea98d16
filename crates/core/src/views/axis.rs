use heapvis_protocol::{FontMetrics, Point, Rect, RenderCommand, TextAlign, ThemeToken, Viewport};

pub const GRAPH_MARGIN: f64 = 10.0;
pub const MARK_WIDTH: f64 = 5.0;
/// Smallest zoom window, in percent for the timeline and in slots for the
/// staleness graph. Keeps the axis from degenerating to zero ticks.
pub const MIN_SPAN: f64 = 2.0;
pub const EMPTY_MESSAGE: &str = "No datapoints available!";

/// Screen geometry shared by both graphs.
///
/// The plot sits right of a gutter wide enough for the largest y label and
/// below a band one text line tall that holds the cursor label. `baseline`
/// is the widget-local y of the x axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlotLayout {
    pub width: f64,
    pub height: f64,
    pub left_bound: f64,
    pub plot_w: f64,
    pub plot_h: f64,
    pub text_width: f64,
    pub text_height: f64,
}

impl PlotLayout {
    pub fn new(viewport: &Viewport, metrics: &FontMetrics, max_label: &str) -> Self {
        let text_width = metrics.text_width(max_label);
        let text_height = metrics.line_height;
        let y_axis_width = text_width + 5.0;
        let x_axis_height = text_height + 5.0;
        Self {
            width: viewport.width,
            height: viewport.height,
            left_bound: GRAPH_MARGIN + y_axis_width,
            plot_w: viewport.width - y_axis_width - 2.0 * GRAPH_MARGIN,
            plot_h: viewport.height - x_axis_height - 2.0 * GRAPH_MARGIN,
            text_width,
            text_height,
        }
    }

    pub fn right_bound(&self) -> f64 {
        self.left_bound + self.plot_w
    }

    pub fn baseline(&self) -> f64 {
        self.height - GRAPH_MARGIN
    }

    pub fn top(&self) -> f64 {
        self.baseline() - self.plot_h
    }

    pub fn plot_rect(&self) -> Rect {
        Rect::new(
            self.left_bound,
            self.top(),
            self.plot_w.max(0.0),
            self.plot_h.max(0.0),
        )
    }

    /// Clamp a widget-local x into the plot and make it plot-relative.
    pub fn to_plot_x(&self, x: f64) -> f64 {
        (x - self.left_bound).min(self.plot_w).max(0.0)
    }

    /// Widget-local y of `value` on a scale topping out at `max`.
    pub fn value_y(&self, value: f64, max: f64) -> f64 {
        if max <= 0.0 {
            return self.baseline();
        }
        self.baseline() - value * self.plot_h / max
    }
}

/// X axis with one tick per unit of `span` and a longer tick every quarter.
pub fn render_x_axis(layout: &PlotLayout, span: f64) -> Vec<RenderCommand> {
    let baseline = layout.baseline();
    let span = span.max(MIN_SPAN);
    let major_every = ((span / 4.0).round() as u64).max(1);
    let steps = span.floor() as u64;
    let step_w = layout.plot_w / span;

    let mut commands = Vec::with_capacity(steps as usize + 2);
    commands.push(RenderCommand::DrawLine {
        from: Point::new(layout.left_bound, baseline),
        to: Point::new(layout.right_bound(), baseline),
        color: ThemeToken::AxisLine,
        width: 1.0,
    });
    for i in 0..=steps {
        let x = layout.left_bound + i as f64 * step_w;
        let len = if i % major_every == 0 {
            MARK_WIDTH + 2.0
        } else {
            MARK_WIDTH
        };
        commands.push(RenderCommand::DrawLine {
            from: Point::new(x, baseline),
            to: Point::new(x, baseline + len),
            color: ThemeToken::AxisTick,
            width: 1.0,
        });
    }
    commands
}

/// Y axis with `num_ticks + 1` labels from 0 to `max_value`, each with a
/// faint grid line across the plot. The last label is exactly the maximum.
pub fn render_y_axis(
    layout: &PlotLayout,
    max_value: f64,
    num_ticks: u32,
    font_size: f64,
) -> Vec<RenderCommand> {
    let num_ticks = num_ticks.max(1);
    let baseline = layout.baseline();
    let label_x = layout.left_bound - GRAPH_MARGIN;

    let mut commands = Vec::with_capacity(num_ticks as usize * 3 + 4);
    commands.push(RenderCommand::DrawLine {
        from: Point::new(layout.left_bound, baseline),
        to: Point::new(layout.left_bound, layout.top()),
        color: ThemeToken::AxisLine,
        width: 1.0,
    });
    for count in 0..=num_ticks {
        let (value, mark) = if count == num_ticks {
            (max_value, layout.plot_h)
        } else {
            let frac = f64::from(count) / f64::from(num_ticks);
            (max_value * frac, layout.plot_h * frac)
        };
        let y = baseline - mark;
        commands.push(RenderCommand::DrawText {
            position: Point::new(label_x, y),
            text: format!("{:.0}", value.round()),
            color: ThemeToken::AxisLabel,
            font_size,
            align: TextAlign::Right,
        });
        commands.push(RenderCommand::DrawLine {
            from: Point::new(layout.left_bound, y),
            to: Point::new(layout.right_bound(), y),
            color: ThemeToken::GridLine,
            width: 1.0,
        });
        commands.push(RenderCommand::DrawLine {
            from: Point::new(layout.left_bound - MARK_WIDTH, y),
            to: Point::new(layout.left_bound, y),
            color: ThemeToken::AxisTick,
            width: 1.0,
        });
    }
    commands
}

/// The centered placeholder drawn instead of axes when there is no data.
pub fn render_empty(viewport: &Viewport, metrics: &FontMetrics) -> Vec<RenderCommand> {
    vec![RenderCommand::DrawText {
        position: Point::new(viewport.width / 2.0, viewport.height / 2.0),
        text: EMPTY_MESSAGE.to_string(),
        color: ThemeToken::TextMuted,
        font_size: metrics.font_size,
        align: TextAlign::Center,
    }]
}

/// An in-progress zoom drag, in plot-relative x.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DragSelection {
    pub anchor_x: f64,
    pub current_x: f64,
}

impl DragSelection {
    pub fn new(x: f64) -> Self {
        Self {
            anchor_x: x,
            current_x: x,
        }
    }

    /// The translucent guide spanning the full plot height.
    pub fn render(&self, layout: &PlotLayout) -> RenderCommand {
        RenderCommand::DrawRect {
            rect: Rect::from_corners(
                Point::new(layout.left_bound + self.anchor_x, layout.top()),
                Point::new(layout.left_bound + self.current_x, layout.baseline()),
            ),
            color: ThemeToken::Selection,
            border_color: None,
            item_id: None,
        }
    }
}

/// Vertical cursor line at plot-relative `x`.
pub fn render_cursor(layout: &PlotLayout, x: f64) -> RenderCommand {
    let x = layout.left_bound + x;
    RenderCommand::DrawLine {
        from: Point::new(x, layout.top()),
        to: Point::new(x, layout.baseline()),
        color: ThemeToken::Cursor,
        width: 1.0,
    }
}
