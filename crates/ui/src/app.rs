use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use eframe::egui;
use heapvis_core::controller::{Event, HeapstatTool, TreeScope};
use heapvis_core::loader::{self, PendingLoad};
use heapvis_core::options::Options;
use heapvis_core::tool::{HeapstatFactory, InstanceId, ToolFactory};
use heapvis_core::views::frames::TreePath;
use heapvis_core::views::staleness::StalenessViewport;
use heapvis_core::views::table::{Column, SortOrder};
use heapvis_core::views::timeline::Series;
use heapvis_protocol::{RenderCommand, ThemeToken, Viewport};

use crate::renderer::{self, RenderResult};
use crate::theme::{self, ThemeMode};

const MAX_MESSAGES: usize = 200;
const LOAD_POLL: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DetailTab {
    List,
    Tree,
    Staleness,
}

/// Main application state: one Dr. Heapstat instance plus the chrome
/// around it.
pub struct HeapvisApp {
    factory: HeapstatFactory,
    tool_id: InstanceId,
    dir_input: String,
    pending: Option<PendingLoad>,
    theme_mode: ThemeMode,
    tab: DetailTab,
    messages: Vec<String>,
    /// Where the options came from, if a file was used.
    options_path: Option<PathBuf>,
}

fn report(messages: &mut Vec<String>, message: String) {
    tracing::info!("{message}");
    messages.push(message);
    if messages.len() > MAX_MESSAGES {
        messages.remove(0);
    }
}

impl HeapvisApp {
    pub fn new(
        cc: &eframe::CreationContext<'_>,
        options: Options,
        options_path: Option<PathBuf>,
    ) -> Self {
        cc.egui_ctx.set_visuals(theme::mocha_dark_visuals());
        theme::apply_typography(&cc.egui_ctx);

        let mut factory = HeapstatFactory::new(options);
        let tool_id = factory.create_instance();
        let dir_input = factory.options().def_load_dir.display().to_string();
        Self {
            factory,
            tool_id,
            dir_input,
            pending: None,
            theme_mode: ThemeMode::Dark,
            tab: DetailTab::List,
            messages: Vec::new(),
            options_path,
        }
    }

    fn start_load(&mut self) {
        let dir = PathBuf::from(self.dir_input.trim());
        match loader::spawn_load(&dir) {
            Ok(pending) => {
                report(
                    &mut self.messages,
                    format!("Loading results from {}", dir.display()),
                );
                self.pending = Some(pending);
            }
            Err(err) => report(&mut self.messages, format!("Cannot load: {err}")),
        }
    }

    fn poll_load(&mut self, ctx: &egui::Context) {
        let Some(result) = self.pending.as_ref().and_then(PendingLoad::try_take) else {
            if self.pending.is_some() {
                ctx.request_repaint_after(LOAD_POLL);
            }
            return;
        };
        let dir = self
            .pending
            .take()
            .map(|p| p.dir().display().to_string())
            .unwrap_or_default();
        match result {
            Ok(dataset) => {
                let summary = format!(
                    "Loaded {} snapshots and {} callstacks from {dir}",
                    dataset.snapshots().len(),
                    dataset.callstacks().len()
                );
                if let Some(tool) = self.factory.instance_mut(self.tool_id) {
                    tool.install_dataset(Arc::clone(&dataset));
                }
                report(&mut self.messages, summary);
            }
            Err(err) => report(&mut self.messages, format!("Failed to load {dir}: {err}")),
        }
    }

    fn handle_events(&mut self) {
        for (_, event) in self.factory.drain_events() {
            match event {
                Event::HighlightChanged(snapshot) => {
                    tracing::debug!(snapshot, "snapshot highlighted");
                }
                Event::OpenSourceRequested { path, line } => {
                    if !self.factory.open_file(&path, line) {
                        report(
                            &mut self.messages,
                            format!("No editor available for {}:{line}", path.display()),
                        );
                    }
                }
            }
        }
    }

    fn toolbar(&mut self, ctx: &egui::Context) {
        egui::TopBottomPanel::top("toolbar").show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.heading("heapvis");
                ui.separator();
                ui.label("Results:");
                ui.add(egui::TextEdit::singleline(&mut self.dir_input).desired_width(320.0));
                if ui.button("Browse…").clicked()
                    && let Some(dir) = rfd::FileDialog::new()
                        .set_directory(self.dir_input.trim())
                        .pick_folder()
                {
                    self.dir_input = dir.display().to_string();
                    self.start_load();
                }
                let idle = self.pending.is_none();
                if ui.add_enabled(idle, egui::Button::new("Load Results")).clicked() {
                    self.start_load();
                }
                if !idle {
                    ui.spinner();
                }
                ui.separator();

                if let Some(path) = self.options_path.clone()
                    && ui.button("Reload Options").clicked()
                {
                    self.reload_options(&path);
                }
                if ui.button("Export SVG").clicked() {
                    self.export_svg();
                }

                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    let label = match self.theme_mode {
                        ThemeMode::Dark => "Light",
                        ThemeMode::Light => "Dark",
                    };
                    if ui.button(label).clicked() {
                        self.theme_mode = match self.theme_mode {
                            ThemeMode::Dark => {
                                ctx.set_visuals(theme::light_visuals());
                                ThemeMode::Light
                            }
                            ThemeMode::Light => {
                                ctx.set_visuals(theme::mocha_dark_visuals());
                                ThemeMode::Dark
                            }
                        };
                    }
                });
            });
        });
    }

    fn export_svg(&mut self) {
        let Some(path) = rfd::FileDialog::new()
            .add_filter("SVG", &["svg"])
            .set_file_name("timeline.svg")
            .save_file()
        else {
            return;
        };
        let dark = self.theme_mode.is_dark();
        let Some(tool) = self.factory.instance_mut(self.tool_id) else {
            return;
        };
        let svg = tool.timeline_svg(dark);
        let message = match std::fs::write(&path, svg) {
            Ok(()) => format!("Timeline exported to {}", path.display()),
            Err(err) => format!("Failed to write {}: {err}", path.display()),
        };
        report(&mut self.messages, message);
    }

    /// Re-read the options file and push it to every instance; views
    /// refresh without re-parsing.
    fn reload_options(&mut self, path: &Path) {
        match Options::load(path) {
            Ok(options) => {
                self.factory.set_options(options);
                report(
                    &mut self.messages,
                    format!("Options reloaded from {}", path.display()),
                );
            }
            Err(err) => report(&mut self.messages, format!("Options not reloaded: {err}")),
        }
    }
}

impl eframe::App for HeapvisApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.poll_load(ctx);
        self.handle_events();

        let antialiasing = self.factory.options().antialiasing_enabled;
        ctx.tessellation_options_mut(|t| t.feathering = antialiasing);

        self.toolbar(ctx);

        egui::TopBottomPanel::bottom("messages")
            .resizable(true)
            .default_height(90.0)
            .show(ctx, |ui| {
                ui.label("Messages");
                egui::ScrollArea::vertical()
                    .id_salt("messages")
                    .stick_to_bottom(true)
                    .auto_shrink([false, false])
                    .show(ui, |ui| {
                        for message in &self.messages {
                            ui.monospace(message.as_str());
                        }
                    });
            });

        let mode = self.theme_mode;
        let Some(tool) = self.factory.instance_mut(self.tool_id) else {
            return;
        };

        egui::SidePanel::right("details")
            .resizable(true)
            .default_width(380.0)
            .show(ctx, |ui| {
                ui.horizontal(|ui| {
                    ui.selectable_value(&mut self.tab, DetailTab::List, "List");
                    ui.selectable_value(&mut self.tab, DetailTab::Tree, "Tree");
                    ui.selectable_value(&mut self.tab, DetailTab::Staleness, "Staleness Graph");
                });
                ui.separator();
                match self.tab {
                    DetailTab::List => frame_list_tab(ui, tool),
                    DetailTab::Tree => frame_tree_tab(ui, tool, &mut self.messages),
                    DetailTab::Staleness => staleness_tab(ui, tool, mode),
                }
            });

        egui::CentralPanel::default().show(ctx, |ui| {
            timeline_section(ui, tool, mode);
            ui.separator();
            table_section(ui, tool);
        });
    }
}

/// Fill `rect` with the background and paint `commands` on top.
fn paint_canvas(
    ui: &egui::Ui,
    rect: egui::Rect,
    commands: &[RenderCommand],
    mode: ThemeMode,
) -> RenderResult {
    let mut painter = ui.painter_at(rect);
    painter.rect_filled(
        rect,
        egui::CornerRadius::ZERO,
        theme::resolve(ThemeToken::Background, mode),
    );
    renderer::render_commands(&mut painter, commands, rect.min, mode)
}

/// Pointer gestures shared by both graphs: primary click or drag moves the
/// cursor, secondary drag selects a zoom range.
struct Gesture {
    highlight: Option<f64>,
    press: Option<f64>,
    drag: Option<f64>,
    release: bool,
}

impl Gesture {
    fn read(response: &egui::Response, rect: egui::Rect) -> Self {
        let x = response
            .interact_pointer_pos()
            .map(|pos| f64::from(pos.x - rect.left()));
        let secondary = egui::PointerButton::Secondary;
        let started = response.drag_started_by(secondary);
        Self {
            highlight: x.filter(|_| {
                response.clicked() || response.dragged_by(egui::PointerButton::Primary)
            }),
            press: x.filter(|_| started),
            drag: x.filter(|_| !started && response.dragged_by(secondary)),
            release: response.drag_stopped_by(secondary),
        }
    }
}

fn canvas_viewport(rect: egui::Rect) -> Viewport {
    Viewport::new(f64::from(rect.width()), f64::from(rect.height()))
}

fn timeline_section(ui: &mut egui::Ui, tool: &mut HeapstatTool, mode: ThemeMode) {
    ui.horizontal(|ui| {
        for series in Series::ALL {
            let mut visible = tool.lines().is_visible(series);
            if ui.checkbox(&mut visible, series.label()).changed() {
                tool.set_line_visible(series, visible);
            }
        }
        ui.separator();
        if ui.button("Reset Zoom").clicked() {
            tool.reset_timeline_zoom();
        }
        if let Some(dataset) = tool.dataset() {
            ui.label(format!("time unit: {}", dataset.time_unit()));
        }
    });

    let height = (ui.available_height() * 0.5).max(160.0);
    let (rect, response) = ui.allocate_exact_size(
        egui::vec2(ui.available_width(), height),
        egui::Sense::click_and_drag(),
    );
    tool.resize_timeline(canvas_viewport(rect));

    let gesture = Gesture::read(&response, rect);
    if let Some(x) = gesture.press {
        tool.timeline_press(x);
    }
    if let Some(x) = gesture.drag {
        tool.timeline_drag(x);
    }
    if gesture.release {
        tool.timeline_release();
    }
    if let Some(x) = gesture.highlight {
        tool.timeline_highlight(x);
    }

    let commands = tool.render_timeline();
    paint_canvas(ui, rect, &commands, mode);
}

fn table_section(ui: &mut egui::Ui, tool: &mut HeapstatTool) {
    let table = tool.table();
    let mut go_prev = false;
    let mut go_next = false;
    ui.horizontal(|ui| {
        go_prev = ui
            .add_enabled(table.has_prev(), egui::Button::new("Prev Page"))
            .clicked();
        go_next = ui
            .add_enabled(table.has_next(), egui::Button::new("Next Page"))
            .clicked();
        if table.total() > 0 {
            ui.label(table.page_label());
        }
    });

    let mut sort = None;
    let mut select = None;
    egui::ScrollArea::vertical()
        .id_salt("callstack_table")
        .auto_shrink([false, false])
        .show(ui, |ui| {
            egui::Grid::new("callstacks")
                .striped(true)
                .num_columns(Column::ALL.len())
                .show(ui, |ui| {
                    for column in Column::ALL {
                        let marker = match table.sort_state() {
                            Some((c, SortOrder::Ascending)) if c == column => " ⏶",
                            Some((c, SortOrder::Descending)) if c == column => " ⏷",
                            _ => "",
                        };
                        if ui.button(format!("{}{marker}", column.title())).clicked() {
                            sort = Some(column);
                        }
                    }
                    ui.end_row();

                    for (index, row) in table.rows().iter().enumerate() {
                        let selected = table.selected() == Some(index);
                        for column in Column::ALL {
                            if ui.selectable_label(selected, row.cell(column)).clicked() {
                                select = Some(index);
                            }
                        }
                        ui.end_row();
                    }
                });
        });

    if go_prev {
        tool.prev_page();
    }
    if go_next {
        tool.next_page();
    }
    if let Some(column) = sort {
        tool.sort_table(column);
    }
    if let Some(row) = select {
        tool.select_row(row);
    }
}

fn frame_list_tab(ui: &mut egui::Ui, tool: &HeapstatTool) {
    egui::ScrollArea::both()
        .id_salt("frame_list")
        .auto_shrink([false, false])
        .show(ui, |ui| {
            if tool.frame_list().is_empty() {
                ui.weak("No callstack selected");
            } else {
                ui.monospace(tool.frame_list());
            }
        });
}

fn frame_tree_tab(ui: &mut egui::Ui, tool: &mut HeapstatTool, messages: &mut Vec<String>) {
    let mut scope = tool.tree_scope();
    ui.horizontal(|ui| {
        ui.radio_value(&mut scope, TreeScope::Snapshot, "Whole snapshot");
        ui.radio_value(&mut scope, TreeScope::SelectedCallstack, "Selected callstack");
    });
    tool.set_tree_scope(scope);

    let mut activated = None;
    egui::ScrollArea::vertical()
        .id_salt("frame_tree")
        .auto_shrink([false, false])
        .show(ui, |ui| {
            let tree = tool.frame_tree();
            if tree.is_empty() {
                ui.weak("No frames");
                return;
            }
            for (m, module) in tree.modules.iter().enumerate() {
                egui::CollapsingHeader::new(module.module.as_str())
                    .id_salt(("module", m))
                    .show(ui, |ui| {
                        for (f, file) in module.files.iter().enumerate() {
                            let name = file.file_name.as_deref().unwrap_or("<unknown file>");
                            egui::CollapsingHeader::new(name)
                                .id_salt(("file", m, f))
                                .show(ui, |ui| {
                                    for (i, entry) in file.functions.iter().enumerate() {
                                        let line = entry
                                            .line
                                            .map(|l| format!(":{l}"))
                                            .unwrap_or_default();
                                        let text = format!(
                                            "{}{line}  x{}",
                                            entry.function, entry.occurrences
                                        );
                                        let response = ui.selectable_label(false, text);
                                        if response.double_clicked() {
                                            activated = Some(TreePath {
                                                module: m,
                                                file: f,
                                                function: i,
                                            });
                                        }
                                    }
                                });
                        }
                    });
            }
        });

    if let Some(path) = activated
        && !tool.activate_frame(path)
    {
        report(messages, "That frame has no source location".to_string());
    }
}

fn staleness_tab(ui: &mut egui::Ui, tool: &mut HeapstatTool, mode: ThemeMode) {
    ui.horizontal(|ui| {
        if ui.button("Reset Zoom").clicked() {
            tool.reset_staleness_zoom();
        }
        if let Some(info) = tool.staleness().and_then(StalenessViewport::zoom_info) {
            ui.label(info);
        }
    });

    let height = (ui.available_height() - 40.0).max(120.0);
    let (rect, response) = ui.allocate_exact_size(
        egui::vec2(ui.available_width(), height),
        egui::Sense::click_and_drag(),
    );
    tool.resize_staleness(canvas_viewport(rect));

    let gesture = Gesture::read(&response, rect);
    if let Some(x) = gesture.press {
        tool.staleness_press(x);
    }
    if let Some(x) = gesture.drag {
        tool.staleness_drag(x);
    }
    if gesture.release {
        tool.staleness_release();
    }
    if let Some(x) = gesture.highlight {
        tool.staleness_highlight(x);
    }

    let commands = tool.render_staleness();
    let result = paint_canvas(ui, rect, &commands, mode);

    if let Some(info) = tool.staleness().and_then(StalenessViewport::hover_info) {
        ui.label(info);
    }
    if let Some(id) = response.hover_pos().and_then(|pos| result.item_at(pos)) {
        response.on_hover_text(format!("Callstack #{id}"));
    }
}
