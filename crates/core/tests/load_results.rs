//! Integration tests: load a results directory from disk and drive a tool
//! instance through highlight, paging, reload and export.

use std::fs;
use std::path::{Path, PathBuf};

use heapvis_core::controller::{Event, HeapstatTool};
use heapvis_core::options::Options;
use heapvis_core::parsers::{self, LoadError};
use heapvis_core::views::axis::EMPTY_MESSAGE;
use heapvis_core::views::table::Column;
use heapvis_protocol::{RenderCommand, Viewport};

fn sample_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/sample")
}

fn copy_sample(to: &Path) {
    for name in [
        parsers::CALLSTACK_LOG,
        parsers::SNAPSHOT_LOG,
        parsers::STALENESS_LOG,
    ] {
        fs::copy(sample_dir().join(name), to.join(name)).expect("copy fixture");
    }
}

/// Widget-local x at `fraction` of the timeline's plot width.
fn timeline_x(tool: &HeapstatTool, fraction: f64) -> f64 {
    let layout = *tool.timeline().expect("timeline").layout();
    layout.left_bound + layout.plot_w * fraction
}

#[test]
fn sample_directory_parses() {
    let dataset = parsers::load_dir(&sample_dir()).expect("sample loads");
    assert_eq!(dataset.callstacks().len(), 3);
    assert_eq!(dataset.snapshots().len(), 3);
    assert_eq!(dataset.time_unit(), "ms");
    assert_eq!(dataset.peak().map(|s| s.id), Some(1));

    let busiest = dataset.snapshot(1).expect("snapshot 1");
    assert_eq!(busiest.assoc_callstacks, vec![1, 1, 2, 3]);
    assert_eq!(busiest.tot_bytes_occupied, 272);

    assert_eq!(dataset.total_ticks(false), 300);
    assert_eq!(dataset.total_ticks(true), 150);
    assert_eq!(dataset.max_occupied(true), 128);

    let grow = dataset.callstack(3).expect("callstack 3");
    assert_eq!(grow.frames.len(), 4);
    assert_eq!(grow.stale_samples(2)[0].last_access, 300);
}

#[test]
fn highlight_drives_table_and_staleness() {
    let mut tool = HeapstatTool::new(Options::default());
    tool.load_dir(&sample_dir()).expect("sample loads");
    assert_eq!(tool.current_snapshot(), Some(0));

    let x = timeline_x(&tool, 0.5);
    tool.timeline_highlight(x);
    assert_eq!(tool.current_snapshot(), Some(1));

    let table = tool.table();
    assert_eq!(table.total(), 4);
    assert_eq!(table.page_label(), "Displaying callstacks 1 to 4 of 4");
    let first = &table.rows()[0];
    assert_eq!(first.symbol, "malloc <-- make_buffer <-- main");
    assert_eq!(first.bytes_asked_for, 64);
    assert_eq!(first.extra_usable, 80);
    assert_eq!(first.extra_occupied, 96);

    tool.sort_table(Column::Alloc);
    tool.sort_table(Column::Alloc);
    assert_eq!(tool.table().selected_row().map(|r| r.callstack), Some(3));
    assert!(tool.frame_list().starts_with("Callstack #3\n\n# 0 libc.so.6!calloc"));

    let svg = tool.staleness_svg(false);
    for id in 1..=3 {
        assert!(svg.contains(&format!("data-item=\"{id}\"")));
    }

    let events: Vec<Event> = tool.drain_events().collect();
    assert_eq!(
        events,
        vec![Event::HighlightChanged(0), Event::HighlightChanged(1)]
    );
}

#[test]
fn hiding_peak_drops_it_from_timeline() {
    let mut tool = HeapstatTool::new(Options {
        hide_peak_snapshot: true,
        ..Options::default()
    });
    tool.load_dir(&sample_dir()).expect("sample loads");
    let x = timeline_x(&tool, 0.9);
    tool.timeline_highlight(x);
    assert_eq!(tool.current_snapshot(), Some(2));

    tool.update_options(Options::default());
    let x = timeline_x(&tool, 0.5);
    tool.timeline_highlight(x);
    assert_eq!(tool.current_snapshot(), Some(1));
}

#[test]
fn failed_reload_keeps_current_dataset() {
    let dir = tempfile::tempdir().expect("tempdir");
    copy_sample(dir.path());

    let mut tool = HeapstatTool::new(Options::default());
    tool.load_dir(dir.path()).expect("first load");
    let x = timeline_x(&tool, 0.5);
    tool.timeline_highlight(x);

    fs::remove_file(dir.path().join(parsers::STALENESS_LOG)).expect("remove");
    let err = tool.load_dir(dir.path()).expect_err("missing file");
    assert!(matches!(err, LoadError::InvalidFile { .. }));

    fs::write(
        dir.path().join(parsers::STALENESS_LOG),
        "SNAPSHOT #0\n1,64,80\n",
    )
    .expect("write");
    let err = tool.load_dir(dir.path()).expect_err("truncated log");
    assert!(matches!(err, LoadError::Malformed(_)));

    assert_eq!(tool.current_snapshot(), Some(1));
    assert_eq!(tool.table().total(), 4);
    assert_eq!(tool.dataset().map(|d| d.snapshots().len()), Some(3));
}

#[test]
fn surplus_snapshot_records_are_rejected() {
    let dir = tempfile::tempdir().expect("tempdir");
    copy_sample(dir.path());

    let mut tool = HeapstatTool::new(Options::default());
    tool.load_dir(dir.path()).expect("first load");
    assert_eq!(tool.current_snapshot(), Some(0));

    fs::write(
        dir.path().join(parsers::SNAPSHOT_LOG),
        "SNAPSHOT #0 @10 ms\ntotal: 1,64,80,96\n1,1,64,16,16\n2,2,32,8,8\nLOG END\n",
    )
    .expect("write");
    let err = tool.load_dir(dir.path()).expect_err("surplus records");
    assert!(matches!(err, LoadError::Malformed(_)));

    assert_eq!(tool.current_snapshot(), Some(0));
    assert_eq!(tool.table().total(), 2);
    assert_eq!(tool.dataset().map(|d| d.snapshots().len()), Some(3));
}

#[test]
fn empty_logs_render_placeholder() {
    let dir = tempfile::tempdir().expect("tempdir");
    for name in [
        parsers::CALLSTACK_LOG,
        parsers::SNAPSHOT_LOG,
        parsers::STALENESS_LOG,
    ] {
        fs::write(dir.path().join(name), "LOG END\n").expect("write");
    }

    let mut tool = HeapstatTool::new(Options::default());
    tool.resize_timeline(Viewport::new(400.0, 200.0));
    tool.load_dir(dir.path()).expect("empty logs load");
    assert_eq!(tool.current_snapshot(), None);
    assert_eq!(tool.table().total(), 0);

    let commands = tool.render_timeline();
    assert!(commands.iter().any(|c| matches!(
        c,
        RenderCommand::DrawText { text, .. } if text == EMPTY_MESSAGE
    )));
    assert!(tool.timeline_svg(true).contains(EMPTY_MESSAGE));
}

#[test]
fn background_load_installs_on_completion() {
    let pending = heapvis_core::spawn_load(&sample_dir()).expect("spawn");
    let dataset = pending.wait().expect("sample loads");

    let mut tool = HeapstatTool::new(Options::default());
    tool.install_dataset(dataset);
    assert_eq!(tool.current_snapshot(), Some(0));
    assert_eq!(tool.table().total(), 2);
}
