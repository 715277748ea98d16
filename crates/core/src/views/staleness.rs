use std::sync::Arc;

use heapvis_protocol::{FontMetrics, Rect, RenderCommand, ThemeToken, Viewport};

use super::axis::{self, DragSelection, MIN_SPAN, PlotLayout};
use crate::model::{Dataset, StaleSample};
use crate::options::Options;

/// Gap left between neighbouring bars.
const SPACING: f64 = 2.0;

/// Staleness of every live allocation in one snapshot.
///
/// The x axis is the position in the snapshot's association list. Each
/// slot is split evenly between the staleness samples its callstack has at
/// this snapshot, one bar per sample. Zooming works on slot indices.
pub struct StalenessViewport {
    dataset: Arc<Dataset>,
    snapshot: usize,
    options: Options,
    viewport: Viewport,
    metrics: FontMetrics,
    layout: PlotLayout,
    max_stale: u64,
    view_start_index: usize,
    view_end_index: usize,
    highlighted_x: f64,
    drag: Option<DragSelection>,
    cache: Option<Vec<RenderCommand>>,
}

impl StalenessViewport {
    pub fn new(
        dataset: Arc<Dataset>,
        snapshot: usize,
        options: Options,
        viewport: Viewport,
        metrics: FontMetrics,
    ) -> Self {
        let assoc = dataset
            .snapshot(snapshot)
            .map(|s| s.assoc_callstacks.as_slice())
            .unwrap_or(&[]);
        // Orphan samples draw no bars and stay out of the scale.
        let max_stale = assoc
            .iter()
            .filter_map(|&id| dataset.callstack(id))
            .flat_map(|cs| cs.stale_samples(snapshot))
            .map(|s| s.stale_bytes)
            .max()
            .unwrap_or(0);
        let len = assoc.len();
        Self {
            layout: PlotLayout::new(&viewport, &metrics, &max_stale.to_string()),
            dataset,
            snapshot,
            options: options.validated(),
            viewport,
            metrics,
            max_stale,
            view_start_index: 0,
            view_end_index: len,
            highlighted_x: 0.0,
            drag: None,
            cache: None,
        }
    }

    pub fn snapshot(&self) -> usize {
        self.snapshot
    }

    pub fn layout(&self) -> &PlotLayout {
        &self.layout
    }

    pub fn view_window(&self) -> (usize, usize) {
        (self.view_start_index, self.view_end_index)
    }

    pub fn is_cached(&self) -> bool {
        self.cache.is_some()
    }

    fn assoc(&self) -> &[u32] {
        self.dataset
            .snapshot(self.snapshot)
            .map(|s| s.assoc_callstacks.as_slice())
            .unwrap_or(&[])
    }

    pub fn is_empty(&self) -> bool {
        self.assoc().is_empty()
    }

    fn span(&self) -> f64 {
        self.view_end_index.saturating_sub(self.view_start_index) as f64
    }

    fn samples_of(&self, callstack: u32) -> &[StaleSample] {
        self.dataset
            .callstack(callstack)
            .map(|cs| cs.stale_samples(self.snapshot))
            .unwrap_or(&[])
    }

    /// Fractional slot position of plot-relative `x`, relative to the
    /// window start.
    fn slot_offset(&self, x: f64) -> f64 {
        if self.layout.plot_w <= 0.0 {
            return 0.0;
        }
        x * self.span() / self.layout.plot_w
    }

    /// Association-list index under plot-relative `x`, clamped to the list.
    pub fn callstack_index(&self, x: f64) -> Option<usize> {
        let len = self.assoc().len();
        if len == 0 {
            return None;
        }
        let index = (self.slot_offset(x) + self.view_start_index as f64).floor();
        Some((index.max(0.0) as usize).min(len - 1))
    }

    pub fn resize(&mut self, viewport: Viewport) {
        self.viewport = viewport;
        self.layout = PlotLayout::new(&viewport, &self.metrics, &self.max_stale.to_string());
        self.highlighted_x = self.highlighted_x.min(self.layout.plot_w).max(0.0);
        self.cache = None;
    }

    pub fn apply_options(&mut self, options: Options) {
        self.options = options.validated();
        self.cache = None;
    }

    /// Move the cursor to widget-local `x`.
    pub fn highlight_at(&mut self, x: f64) {
        self.highlighted_x = self.layout.to_plot_x(x);
    }

    pub fn press(&mut self, x: f64) {
        if self.is_empty() {
            return;
        }
        self.drag = Some(DragSelection::new(self.layout.to_plot_x(x)));
    }

    pub fn drag_to(&mut self, x: f64) {
        let x = self.layout.to_plot_x(x);
        if let Some(drag) = &mut self.drag {
            drag.current_x = x;
        }
    }

    /// Zoom to the slots between the press and the release, inclusive of
    /// the slot the release lands in.
    pub fn release(&mut self) {
        let Some(drag) = self.drag.take() else {
            return;
        };
        let (Some(a), Some(b)) = (
            self.callstack_index(drag.anchor_x),
            self.callstack_index(drag.current_x),
        ) else {
            return;
        };
        let len = self.assoc().len();
        let min_span = MIN_SPAN as usize;
        let mut start = a.min(b);
        let mut end = a.max(b) + 1;
        if end - start < min_span {
            end = start + min_span;
        }
        if start >= len.saturating_sub(min_span) {
            start = len.saturating_sub(min_span);
            end = len;
        }
        tracing::debug!(start, end, "staleness graph zoomed");
        self.view_start_index = start;
        self.view_end_index = end;
        self.cache = None;
    }

    pub fn reset_zoom(&mut self) {
        self.view_start_index = 0;
        self.view_end_index = self.assoc().len();
        self.drag = None;
        self.cache = None;
    }

    /// Describe the sample under the cursor, e.g.
    /// `"64 bytes untouched for 12 ms in callstack #3"`.
    pub fn hover_info(&self) -> Option<String> {
        let index = self.callstack_index(self.highlighted_x)?;
        let callstack = *self.assoc().get(index)?;
        let samples = self.samples_of(callstack);
        if samples.is_empty() {
            return None;
        }
        let within = self.slot_offset(self.highlighted_x)
            - index.saturating_sub(self.view_start_index) as f64;
        let sample_index =
            ((within * samples.len() as f64).floor().max(0.0) as usize).min(samples.len() - 1);
        let sample = samples[sample_index];
        Some(format!(
            "{} bytes untouched for {} {} in callstack #{}",
            sample.stale_bytes,
            sample.last_access,
            self.dataset.time_unit(),
            callstack
        ))
    }

    /// While a zoom drag is in progress, the callstacks at either end.
    pub fn zoom_info(&self) -> Option<String> {
        let drag = self.drag?;
        let assoc = self.assoc();
        let from = assoc.get(self.callstack_index(drag.anchor_x)?)?;
        let to = assoc.get(self.callstack_index(drag.current_x)?)?;
        Some(format!("Zoom from callstack {from} to {to}"))
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
        commands.push(RenderCommand::BeginGroup {
            id: "overlay".into(),
        });
        if let Some(drag) = &self.drag {
            commands.push(drag.render(&self.layout));
        }
        commands.push(axis::render_cursor(&self.layout, self.highlighted_x));
        commands.push(RenderCommand::EndGroup);
        commands
    }

    fn build_base(&self) -> Vec<RenderCommand> {
        let mut commands = Vec::with_capacity(256);
        commands.push(RenderCommand::BeginGroup { id: "axes".into() });
        commands.extend(axis::render_x_axis(&self.layout, self.span()));
        commands.extend(axis::render_y_axis(
            &self.layout,
            self.max_stale as f64,
            self.options.num_vertical_ticks,
            self.metrics.font_size,
        ));
        commands.push(RenderCommand::EndGroup);

        commands.push(RenderCommand::BeginGroup { id: "bars".into() });
        commands.push(RenderCommand::SetClip {
            rect: self.layout.plot_rect(),
        });
        commands.push(RenderCommand::SetAntialiasing {
            enabled: self.options.antialiasing_enabled,
        });
        self.render_bars(&mut commands);
        commands.push(RenderCommand::SetAntialiasing { enabled: true });
        commands.push(RenderCommand::ClearClip);
        commands.push(RenderCommand::EndGroup);
        commands
    }

    fn render_bars(&self, commands: &mut Vec<RenderCommand>) {
        let span = self.span();
        if span <= 0.0 {
            return;
        }
        let slot_w = self.layout.plot_w / span;
        let baseline = self.layout.baseline();
        let max = self.max_stale as f64;
        let assoc = self.assoc();
        let end = self.view_end_index.min(assoc.len());
        let visible = assoc.get(self.view_start_index..end).unwrap_or(&[]);

        for (slot, &callstack) in visible.iter().enumerate() {
            let samples = self.samples_of(callstack);
            if samples.is_empty() {
                continue;
            }
            let slot_x = self.layout.left_bound + slot as f64 * slot_w;
            let bar_w = slot_w / samples.len() as f64;
            for (i, sample) in samples.iter().enumerate() {
                let x = slot_x + bar_w * i as f64 + SPACING / 2.0;
                let top = self.layout.value_y(sample.stale_bytes as f64, max);
                commands.push(RenderCommand::DrawRect {
                    rect: Rect::new(x, top, (bar_w - SPACING / 2.0).max(0.5), baseline - top),
                    color: ThemeToken::StaleBarFill,
                    border_color: Some(ThemeToken::StaleBarBorder),
                    item_id: Some(u64::from(callstack)),
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Callstack, Snapshot};

    fn metrics() -> FontMetrics {
        FontMetrics {
            font_size: 10.0,
            char_width: 5.0,
            line_height: 12.0,
        }
    }

    /// Snapshot 0 holds callstacks [1, 2, 2, 3]; callstack 2 has two
    /// samples, the others one each.
    fn dataset() -> Arc<Dataset> {
        let mut callstacks: Vec<Callstack> = (1..=3).map(Callstack::new).collect();
        let sample = |stale_bytes, last_access| StaleSample {
            stale_bytes,
            last_access,
        };
        callstacks[0].staleness.insert(0, vec![sample(10, 1)]);
        callstacks[1]
            .staleness
            .insert(0, vec![sample(64, 12), sample(32, 4)]);
        callstacks[2].staleness.insert(0, vec![sample(99, 7)]);
        let mut snapshot = Snapshot::new(0, 10);
        snapshot.assoc_callstacks = vec![1, 2, 2, 3];
        Arc::new(Dataset::new(callstacks, vec![snapshot], "ms".into()))
    }

    /// The label "99" is 10px wide, so a 435px widget leaves a 400px plot:
    /// 100px per slot at full zoom.
    fn graph() -> StalenessViewport {
        StalenessViewport::new(
            dataset(),
            0,
            Options::default(),
            Viewport::new(435.0, 200.0),
            metrics(),
        )
    }

    fn at(g: &StalenessViewport, plot_x: f64) -> f64 {
        g.layout().left_bound + plot_x
    }

    #[test]
    fn window_covers_association_list() {
        let g = graph();
        assert_eq!(g.layout().plot_w, 400.0);
        assert_eq!(g.view_window(), (0, 4));
        assert_eq!(g.callstack_index(0.0), Some(0));
        assert_eq!(g.callstack_index(150.0), Some(1));
        assert_eq!(g.callstack_index(400.0), Some(3));
    }

    #[test]
    fn unassociated_samples_do_not_scale_the_graph() {
        let mut callstacks = vec![Callstack::new(1), Callstack::new(2)];
        let sample = |stale_bytes| StaleSample {
            stale_bytes,
            last_access: 1,
        };
        callstacks[0].staleness.insert(0, vec![sample(40)]);
        callstacks[1].staleness.insert(0, vec![sample(5000)]);
        let mut snapshot = Snapshot::new(0, 10);
        snapshot.assoc_callstacks = vec![1];
        let ds = Arc::new(Dataset::new(callstacks, vec![snapshot], "ms".into()));

        let g = StalenessViewport::new(
            ds,
            0,
            Options::default(),
            Viewport::new(435.0, 200.0),
            metrics(),
        );
        assert_eq!(g.max_stale, 40);
    }

    #[test]
    fn one_bar_per_sample() {
        let mut g = graph();
        let bars = g
            .render()
            .iter()
            .filter(|c| matches!(c, RenderCommand::DrawRect { item_id: Some(_), .. }))
            .count();
        // 1 + 2 + 2 + 1
        assert_eq!(bars, 6);
    }

    #[test]
    fn hover_picks_sample_within_slot() {
        let mut g = graph();
        g.highlight_at(at(&g, 120.0));
        assert_eq!(
            g.hover_info().as_deref(),
            Some("64 bytes untouched for 12 ms in callstack #2")
        );
        g.highlight_at(at(&g, 180.0));
        assert_eq!(
            g.hover_info().as_deref(),
            Some("32 bytes untouched for 4 ms in callstack #2")
        );
    }

    #[test]
    fn zoom_includes_release_slot() {
        let mut g = graph();
        g.press(at(&g, 150.0));
        g.drag_to(at(&g, 250.0));
        assert_eq!(
            g.zoom_info().as_deref(),
            Some("Zoom from callstack 2 to 2")
        );
        g.release();
        assert_eq!(g.view_window(), (1, 3));
        assert!(g.zoom_info().is_none());
    }

    #[test]
    fn reversed_single_slot_zoom_widens_and_clamps() {
        let mut g = graph();
        g.press(at(&g, 399.0));
        g.drag_to(at(&g, 350.0));
        g.release();
        assert_eq!(g.view_window(), (2, 4));
        g.reset_zoom();
        assert_eq!(g.view_window(), (0, 4));
    }

    #[test]
    fn zoomed_window_maps_cursor_into_window() {
        let mut g = graph();
        g.press(at(&g, 250.0));
        g.drag_to(at(&g, 399.0));
        g.release();
        assert_eq!(g.view_window(), (2, 4));
        assert_eq!(g.callstack_index(0.0), Some(2));
        assert_eq!(g.callstack_index(399.0), Some(3));
    }

    #[test]
    fn empty_snapshot_renders_placeholder() {
        let ds = Arc::new(Dataset::new(vec![], vec![Snapshot::new(0, 1)], "ms".into()));
        let mut g = StalenessViewport::new(
            ds,
            0,
            Options::default(),
            Viewport::new(300.0, 200.0),
            metrics(),
        );
        assert!(g.is_empty());
        assert!(g.hover_info().is_none());
        g.press(10.0);
        g.release();
        assert_eq!(g.view_window(), (0, 0));
        assert!(matches!(
            g.render().as_slice(),
            [RenderCommand::DrawText { text, .. }] if text == axis::EMPTY_MESSAGE
        ));
    }
}
