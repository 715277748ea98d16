use std::path::Path;

use crate::controller::{Event, HeapstatTool};
use crate::options::Options;

pub const HEAPSTAT_TOOL_NAME: &str = "Dr. Heapstat";

/// Index of an instance inside its factory.
pub type InstanceId = usize;

/// A family of analysis tools the host can list, instantiate and configure.
pub trait ToolFactory {
    type Tool;

    fn tool_names(&self) -> Vec<&'static str>;

    /// Create a new instance sharing the factory's options.
    fn create_instance(&mut self) -> InstanceId;

    fn instance(&self, id: InstanceId) -> Option<&Self::Tool>;

    fn instance_mut(&mut self, id: InstanceId) -> Option<&mut Self::Tool>;

    fn options(&self) -> &Options;

    /// Replace the shared options and push them to every instance.
    fn set_options(&mut self, options: Options);

    /// Ask the family to open a source file. Returns whether it was
    /// handled.
    fn open_file(&mut self, path: &Path, line: u32) -> bool;
}

/// Owns every Dr. Heapstat instance the host has opened.
pub struct HeapstatFactory {
    options: Options,
    tools: Vec<HeapstatTool>,
}

impl HeapstatFactory {
    pub fn new(options: Options) -> Self {
        Self {
            options: options.validated(),
            tools: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Collect pending events from every instance, tagged with their
    /// origin.
    pub fn drain_events(&mut self) -> Vec<(InstanceId, Event)> {
        self.tools
            .iter_mut()
            .enumerate()
            .flat_map(|(id, tool)| {
                tool.drain_events()
                    .map(move |event| (id, event))
                    .collect::<Vec<_>>()
            })
            .collect()
    }
}

impl Default for HeapstatFactory {
    fn default() -> Self {
        Self::new(Options::default())
    }
}

impl ToolFactory for HeapstatFactory {
    type Tool = HeapstatTool;

    fn tool_names(&self) -> Vec<&'static str> {
        vec![HEAPSTAT_TOOL_NAME]
    }

    fn create_instance(&mut self) -> InstanceId {
        self.tools.push(HeapstatTool::new(self.options.clone()));
        tracing::debug!(instances = self.tools.len(), "heapstat instance created");
        self.tools.len() - 1
    }

    fn instance(&self, id: InstanceId) -> Option<&HeapstatTool> {
        self.tools.get(id)
    }

    fn instance_mut(&mut self, id: InstanceId) -> Option<&mut HeapstatTool> {
        self.tools.get_mut(id)
    }

    fn options(&self) -> &Options {
        &self.options
    }

    fn set_options(&mut self, options: Options) {
        self.options = options.validated();
        for tool in &mut self.tools {
            tool.update_options(self.options.clone());
        }
    }

    fn open_file(&mut self, path: &Path, line: u32) -> bool {
        tracing::debug!(path = %path.display(), line, "heapstat does not open source files");
        false
    }
}
