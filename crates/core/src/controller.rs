use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use heapvis_protocol::{FontMetrics, RenderCommand, Viewport};

use crate::model::Dataset;
use crate::options::Options;
use crate::parsers::{self, LoadError};
use crate::svg;
use crate::views::axis;
use crate::views::frames::{self, FrameTree, TreePath};
use crate::views::staleness::StalenessViewport;
use crate::views::table::{CallstackTable, Column};
use crate::views::timeline::{LineToggles, Series, TimelineViewport};

/// Notifications for the host, queued in the order they happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    HighlightChanged(usize),
    OpenSourceRequested { path: PathBuf, line: u32 },
}

/// Which callstacks feed the frame tree.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TreeScope {
    /// Every allocation in the current snapshot.
    #[default]
    Snapshot,
    /// Only the callstack selected in the table.
    SelectedCallstack,
}

/// One Dr. Heapstat tool instance.
///
/// Owns the loaded dataset, both graphs, the callstack table and the frame
/// views. A highlight change on the timeline is handled before the call
/// that caused it returns: the table goes back to page 0, the staleness
/// graph is rebuilt for the new snapshot and the frame views follow the
/// table's selection.
pub struct HeapstatTool {
    options: Options,
    metrics: FontMetrics,
    timeline_size: Viewport,
    staleness_size: Viewport,
    lines: LineToggles,
    dataset: Option<Arc<Dataset>>,
    timeline: Option<TimelineViewport>,
    staleness: Option<StalenessViewport>,
    table: CallstackTable,
    current_snapshot: Option<usize>,
    frame_list: String,
    frame_tree: FrameTree,
    tree_scope: TreeScope,
    events: VecDeque<Event>,
}

impl HeapstatTool {
    pub fn new(options: Options) -> Self {
        let options = options.validated();
        Self {
            table: CallstackTable::new(options.num_callstacks_per_page),
            options,
            metrics: FontMetrics::default(),
            timeline_size: Viewport::new(640.0, 320.0),
            staleness_size: Viewport::new(640.0, 240.0),
            lines: LineToggles::default(),
            dataset: None,
            timeline: None,
            staleness: None,
            current_snapshot: None,
            frame_list: String::new(),
            frame_tree: FrameTree::default(),
            tree_scope: TreeScope::default(),
            events: VecDeque::new(),
        }
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn dataset(&self) -> Option<&Arc<Dataset>> {
        self.dataset.as_ref()
    }

    pub fn timeline(&self) -> Option<&TimelineViewport> {
        self.timeline.as_ref()
    }

    pub fn staleness(&self) -> Option<&StalenessViewport> {
        self.staleness.as_ref()
    }

    pub fn table(&self) -> &CallstackTable {
        &self.table
    }

    pub fn current_snapshot(&self) -> Option<usize> {
        self.current_snapshot
    }

    pub fn frame_list(&self) -> &str {
        &self.frame_list
    }

    pub fn frame_tree(&self) -> &FrameTree {
        &self.frame_tree
    }

    pub fn tree_scope(&self) -> TreeScope {
        self.tree_scope
    }

    pub fn lines(&self) -> LineToggles {
        self.lines
    }

    pub fn drain_events(&mut self) -> impl Iterator<Item = Event> + '_ {
        self.events.drain(..)
    }

    /// Parse `dir` and install the result. On error the current dataset
    /// stays as it was.
    pub fn load_dir(&mut self, dir: &Path) -> Result<(), LoadError> {
        let dataset = parsers::load_dir(dir)?;
        self.install_dataset(Arc::new(dataset));
        Ok(())
    }

    /// Replace the dataset and rebuild every view from it.
    pub fn install_dataset(&mut self, dataset: Arc<Dataset>) {
        tracing::info!(
            snapshots = dataset.snapshots().len(),
            callstacks = dataset.callstacks().len(),
            "dataset installed"
        );
        let mut timeline = TimelineViewport::new(
            Arc::clone(&dataset),
            self.options.clone(),
            self.timeline_size,
            self.metrics,
        );
        for series in Series::ALL {
            timeline.set_line_visible(series, self.lines.is_visible(series));
        }
        self.dataset = Some(dataset);
        self.clear_snapshot_views();

        let initial = timeline.resolve_highlight();
        self.timeline = Some(timeline);
        if let Some(snapshot) = initial {
            self.highlight_changed(snapshot);
        }
    }

    fn highlight_changed(&mut self, snapshot: usize) {
        if self.current_snapshot == Some(snapshot) {
            return;
        }
        self.current_snapshot = Some(snapshot);
        self.refresh_snapshot_views();
        self.events.push_back(Event::HighlightChanged(snapshot));
    }

    fn forward_highlight(&mut self, changed: Option<usize>) {
        if let Some(snapshot) = changed {
            self.highlight_changed(snapshot);
        }
    }

    /// Page 0 of the table, a fresh staleness graph and frame views, all
    /// for the current snapshot.
    fn refresh_snapshot_views(&mut self) {
        let (Some(dataset), Some(snapshot)) = (&self.dataset, self.current_snapshot) else {
            return;
        };
        self.table.rebuild(dataset, snapshot, 0);
        self.staleness = Some(StalenessViewport::new(
            Arc::clone(dataset),
            snapshot,
            self.options.clone(),
            self.staleness_size,
            self.metrics,
        ));
        self.refresh_frame_views();
    }

    fn refresh_frame_views(&mut self) {
        let Some(dataset) = &self.dataset else {
            return;
        };
        let selected = self
            .table
            .selected_row()
            .and_then(|row| dataset.callstack(row.callstack));
        self.frame_list = selected.map(frames::frame_list).unwrap_or_default();
        self.frame_tree = match (self.tree_scope, self.current_snapshot) {
            (TreeScope::Snapshot, Some(snapshot)) => FrameTree::for_snapshot(dataset, snapshot),
            (TreeScope::SelectedCallstack, _) => FrameTree::build(selected),
            (TreeScope::Snapshot, None) => FrameTree::default(),
        };
    }

    /// Take a new set of options and refresh every view without
    /// re-parsing.
    pub fn update_options(&mut self, options: Options) {
        self.options = options.validated();
        self.table.set_per_page(self.options.num_callstacks_per_page);
        let changed = match &mut self.timeline {
            Some(timeline) => timeline.apply_options(self.options.clone()),
            None => None,
        };
        let cleared = self
            .timeline
            .as_ref()
            .is_some_and(|timeline| timeline.current_snapshot().is_none());
        match changed {
            Some(snapshot) => self.highlight_changed(snapshot),
            None if cleared => self.clear_snapshot_views(),
            None => self.refresh_snapshot_views(),
        }
    }

    /// Drop the table, staleness graph and frame views when the timeline
    /// has nothing left to highlight.
    fn clear_snapshot_views(&mut self) {
        self.current_snapshot = None;
        self.table.clear();
        self.staleness = None;
        self.frame_list.clear();
        self.frame_tree = FrameTree::default();
    }

    pub fn set_tree_scope(&mut self, scope: TreeScope) {
        if self.tree_scope != scope {
            self.tree_scope = scope;
            self.refresh_frame_views();
        }
    }

    pub fn set_font_metrics(&mut self, metrics: FontMetrics) {
        self.metrics = metrics;
        if let Some(timeline) = &mut self.timeline {
            timeline.set_font_metrics(metrics);
        }
        self.refresh_staleness_geometry();
    }

    pub fn resize_timeline(&mut self, size: Viewport) {
        if self.timeline_size == size {
            return;
        }
        self.timeline_size = size;
        if let Some(timeline) = &mut self.timeline {
            timeline.resize(size);
        }
    }

    pub fn resize_staleness(&mut self, size: Viewport) {
        if self.staleness_size == size {
            return;
        }
        self.staleness_size = size;
        if let Some(staleness) = &mut self.staleness {
            staleness.resize(size);
        }
    }

    fn refresh_staleness_geometry(&mut self) {
        if let (Some(dataset), Some(snapshot)) = (&self.dataset, self.current_snapshot) {
            self.staleness = Some(StalenessViewport::new(
                Arc::clone(dataset),
                snapshot,
                self.options.clone(),
                self.staleness_size,
                self.metrics,
            ));
        }
    }

    pub fn set_line_visible(&mut self, series: Series, visible: bool) {
        self.lines.set(series, visible);
        if let Some(timeline) = &mut self.timeline {
            timeline.set_line_visible(series, visible);
        }
    }

    // Timeline gestures. `x` is widget-local.

    pub fn timeline_press(&mut self, x: f64) {
        if let Some(timeline) = &mut self.timeline {
            timeline.press(x);
        }
    }

    pub fn timeline_drag(&mut self, x: f64) {
        if let Some(timeline) = &mut self.timeline {
            timeline.drag_to(x);
        }
    }

    pub fn timeline_release(&mut self) {
        let changed = self.timeline.as_mut().and_then(TimelineViewport::release);
        self.forward_highlight(changed);
    }

    pub fn timeline_highlight(&mut self, x: f64) {
        let changed = self
            .timeline
            .as_mut()
            .and_then(|timeline| timeline.highlight_at(x));
        self.forward_highlight(changed);
    }

    pub fn reset_timeline_zoom(&mut self) {
        let changed = self
            .timeline
            .as_mut()
            .and_then(TimelineViewport::reset_zoom);
        self.forward_highlight(changed);
    }

    // Staleness gestures.

    pub fn staleness_press(&mut self, x: f64) {
        if let Some(staleness) = &mut self.staleness {
            staleness.press(x);
        }
    }

    pub fn staleness_drag(&mut self, x: f64) {
        if let Some(staleness) = &mut self.staleness {
            staleness.drag_to(x);
        }
    }

    pub fn staleness_release(&mut self) {
        if let Some(staleness) = &mut self.staleness {
            staleness.release();
        }
    }

    pub fn staleness_highlight(&mut self, x: f64) {
        if let Some(staleness) = &mut self.staleness {
            staleness.highlight_at(x);
        }
    }

    pub fn reset_staleness_zoom(&mut self) {
        if let Some(staleness) = &mut self.staleness {
            staleness.reset_zoom();
        }
    }

    pub fn render_timeline(&mut self) -> Vec<RenderCommand> {
        match &mut self.timeline {
            Some(timeline) => timeline.render(),
            None => axis::render_empty(&self.timeline_size, &self.metrics),
        }
    }

    pub fn render_staleness(&mut self) -> Vec<RenderCommand> {
        match &mut self.staleness {
            Some(staleness) => staleness.render(),
            None => axis::render_empty(&self.staleness_size, &self.metrics),
        }
    }

    /// The timeline as a standalone SVG document.
    pub fn timeline_svg(&mut self, dark: bool) -> String {
        let commands = self.render_timeline();
        svg::render_svg(
            &commands,
            self.timeline_size.width,
            self.timeline_size.height,
            dark,
        )
    }

    pub fn staleness_svg(&mut self, dark: bool) -> String {
        let commands = self.render_staleness();
        svg::render_svg(
            &commands,
            self.staleness_size.width,
            self.staleness_size.height,
            dark,
        )
    }

    // Table.

    pub fn next_page(&mut self) {
        self.show_page(self.table.has_next(), self.table.page() + 1);
    }

    pub fn prev_page(&mut self) {
        self.show_page(self.table.has_prev(), self.table.page().saturating_sub(1));
    }

    fn show_page(&mut self, allowed: bool, page: usize) {
        let (Some(dataset), Some(snapshot)) = (&self.dataset, self.current_snapshot) else {
            return;
        };
        if !allowed {
            return;
        }
        self.table.rebuild(dataset, snapshot, page);
        self.refresh_frame_views();
    }

    pub fn select_row(&mut self, row: usize) {
        if self.table.select(row) {
            self.refresh_frame_views();
        }
    }

    pub fn sort_table(&mut self, column: Column) {
        self.table.sort_by(column);
        self.refresh_frame_views();
    }

    /// Ask the host to open the source behind a frame-tree leaf. Returns
    /// false when the leaf has no file or line.
    pub fn activate_frame(&mut self, path: TreePath) -> bool {
        let Some((path, line)) = self.frame_tree.source_location(path) else {
            return false;
        };
        tracing::debug!(path = %path.display(), line, "open source requested");
        self.events
            .push_back(Event::OpenSourceRequested { path, line });
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsers::parse_logs;

    const CALLSTACKS: &str = "\
CALLSTACK 1
# 0 app!alloc_a [/src/a.c:10] (0x10 <app+0x10>)
# 1 app!main [/src/main.c:5] (0x20 <app+0x20>)
error end
CALLSTACK 2
# 0 app!alloc_b [/src/b.c:7] (0x30 <app+0x30>)
# 1 app!main [/src/main.c:5] (0x20 <app+0x20>)
error end
LOG END
";

    const SNAPSHOTS: &str = "\
SNAPSHOT #0 @10 ms
total: 1,16,24,32
1,1,16,8,8
SNAPSHOT #1 @10 ms
total: 3,48,64,96
1,1,16,8,8
2,2,32,8,24
LOG END
";

    const STALENESS: &str = "\
SNAPSHOT #0
1,16,3
SNAPSHOT #1
1,8,13
2,32,2
2,16,9
LOG END
";

    fn tool() -> HeapstatTool {
        let ds = parse_logs(
            CALLSTACKS.as_bytes(),
            SNAPSHOTS.as_bytes(),
            STALENESS.as_bytes(),
        )
        .unwrap();
        let mut tool = HeapstatTool::new(Options::default());
        tool.resize_timeline(Viewport::new(640.0, 320.0));
        tool.install_dataset(Arc::new(ds));
        tool
    }

    fn timeline_x(tool: &HeapstatTool, fraction: f64) -> f64 {
        let layout = tool.timeline().map(|t| *t.layout()).unwrap();
        layout.left_bound + layout.plot_w * fraction
    }

    #[test]
    fn install_highlights_first_snapshot() {
        let mut tool = tool();
        assert_eq!(tool.current_snapshot(), Some(0));
        assert_eq!(tool.table().total(), 1);
        assert_eq!(tool.staleness().map(StalenessViewport::snapshot), Some(0));
        assert!(tool.frame_list().starts_with("Callstack #1\n"));
        let events: Vec<Event> = tool.drain_events().collect();
        assert_eq!(events, vec![Event::HighlightChanged(0)]);
    }

    #[test]
    fn highlight_change_rebuilds_dependents() {
        let mut tool = tool();
        tool.drain_events().for_each(drop);
        let x = timeline_x(&tool, 0.75);
        tool.timeline_highlight(x);
        assert_eq!(tool.current_snapshot(), Some(1));
        assert_eq!(tool.table().total(), 3);
        assert_eq!(tool.table().page(), 0);
        assert_eq!(tool.table().selected(), Some(0));
        assert_eq!(tool.staleness().map(StalenessViewport::snapshot), Some(1));

        // same spot again: nothing new
        tool.timeline_highlight(x);
        let events: Vec<Event> = tool.drain_events().collect();
        assert_eq!(events, vec![Event::HighlightChanged(1)]);
    }

    #[test]
    fn hiding_the_only_snapshot_empties_dependents() {
        let ds = parse_logs(
            CALLSTACKS.as_bytes(),
            b"SNAPSHOT #0 @10 ms\ntotal: 1,16,24,32\n1,1,16,8,8\nLOG END\n",
            b"SNAPSHOT #0\n1,16,3\nLOG END\n",
        )
        .unwrap();
        let mut tool = HeapstatTool::new(Options::default());
        tool.resize_timeline(Viewport::new(640.0, 320.0));
        tool.install_dataset(Arc::new(ds));
        assert_eq!(tool.current_snapshot(), Some(0));

        tool.update_options(Options {
            hide_peak_snapshot: true,
            ..Options::default()
        });
        assert!(tool.timeline().is_some_and(TimelineViewport::is_empty));
        assert_eq!(tool.timeline().and_then(TimelineViewport::current_snapshot), None);
        assert_eq!(tool.current_snapshot(), None);
        assert_eq!(tool.table().total(), 0);
        assert!(tool.staleness().is_none());
        assert!(tool.frame_list().is_empty());
        assert!(tool.frame_tree().is_empty());

        tool.update_options(Options::default());
        assert_eq!(tool.current_snapshot(), Some(0));
        assert_eq!(tool.table().total(), 1);
        assert_eq!(tool.staleness().map(StalenessViewport::snapshot), Some(0));
    }

    #[test]
    fn paging_respects_bounds() {
        let mut tool = tool();
        tool.update_options(Options {
            num_callstacks_per_page: 2,
            ..Options::default()
        });
        let x = timeline_x(&tool, 0.9);
        tool.timeline_highlight(x);
        assert_eq!(tool.table().rows().len(), 2);
        tool.prev_page();
        assert_eq!(tool.table().page(), 0);
        tool.next_page();
        assert_eq!(tool.table().page(), 1);
        assert_eq!(tool.table().rows().len(), 1);
        tool.next_page();
        assert_eq!(tool.table().page(), 1);
        assert_eq!(
            tool.table().page_label(),
            "Displaying callstacks 3 to 3 of 3"
        );
    }

    #[test]
    fn selecting_a_row_updates_frame_list() {
        let mut tool = tool();
        let x = timeline_x(&tool, 0.9);
        tool.timeline_highlight(x);
        tool.select_row(1);
        assert!(tool.frame_list().starts_with("Callstack #2\n"));
    }

    #[test]
    fn tree_scope_switches_source() {
        let mut tool = tool();
        let x = timeline_x(&tool, 0.9);
        tool.timeline_highlight(x);
        // whole snapshot: a.c, b.c and main.c under one module
        assert_eq!(tool.frame_tree().modules[0].files.len(), 3);
        tool.set_tree_scope(TreeScope::SelectedCallstack);
        assert_eq!(tool.frame_tree().modules[0].files.len(), 2);
    }

    #[test]
    fn activating_located_leaf_requests_source() {
        let mut tool = tool();
        tool.drain_events().for_each(drop);
        let leaf = TreePath {
            module: 0,
            file: 0,
            function: 0,
        };
        assert!(tool.activate_frame(leaf));
        let events: Vec<Event> = tool.drain_events().collect();
        assert_eq!(
            events,
            vec![Event::OpenSourceRequested {
                path: PathBuf::from("/src/a.c"),
                line: 10
            }]
        );
    }

    #[test]
    fn failed_load_keeps_dataset() {
        let mut tool = tool();
        let before = tool.dataset().map(Arc::clone);
        let err = tool.load_dir(Path::new("/no/such/heapstat/dir"));
        assert!(matches!(err, Err(LoadError::InvalidDirectory { .. })));
        assert!(Arc::ptr_eq(
            tool.dataset().unwrap(),
            before.as_ref().unwrap()
        ));
        assert_eq!(tool.current_snapshot(), Some(0));
    }

    #[test]
    fn options_refresh_without_reparse() {
        let mut tool = tool();
        let x = timeline_x(&tool, 0.9);
        tool.timeline_highlight(x);
        tool.next_page();
        tool.update_options(Options {
            num_callstacks_per_page: 1,
            ..Options::default()
        });
        assert_eq!(tool.table().page(), 0);
        assert_eq!(tool.table().rows().len(), 1);
        assert_eq!(tool.current_snapshot(), Some(1));
    }

    #[test]
    fn no_dataset_renders_placeholder() {
        let mut tool = HeapstatTool::new(Options::default());
        tool.timeline_highlight(10.0);
        tool.next_page();
        assert_eq!(tool.render_timeline().len(), 1);
        assert_eq!(tool.render_staleness().len(), 1);
        assert_eq!(tool.drain_events().count(), 0);
    }
}
