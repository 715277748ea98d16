use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::model::{Callstack, Dataset, FrameInfo};

/// Text for the frame list: a `Callstack #<n>` heading, a blank line, then
/// every raw frame line.
pub fn frame_list(callstack: &Callstack) -> String {
    let mut text = format!("Callstack #{}\n", callstack.id);
    for frame in &callstack.frames {
        text.push('\n');
        text.push_str(frame);
    }
    text
}

/// A function inside a source file, with the number of times its return
/// address was seen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionEntry {
    pub function: String,
    pub line: Option<u32>,
    pub address: Option<String>,
    pub occurrences: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileNode {
    pub directory: Option<String>,
    pub file_name: Option<String>,
    pub functions: Vec<FunctionEntry>,
}

impl FileNode {
    pub fn path(&self) -> Option<PathBuf> {
        let file = self.file_name.as_deref()?;
        Some(PathBuf::from(format!(
            "{}{}",
            self.directory.as_deref().unwrap_or_default(),
            file
        )))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleNode {
    pub module: String,
    pub files: Vec<FileNode>,
}

/// Address of a leaf in a [`FrameTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TreePath {
    pub module: usize,
    pub file: usize,
    pub function: usize,
}

/// Frames grouped module, then source file, then function. Modules and
/// files are sorted by name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrameTree {
    pub modules: Vec<ModuleNode>,
}

type FileKey = (Option<String>, Option<String>);

impl FrameTree {
    /// Group the frames of every listed callstack. A callstack listed
    /// twice contributes its frames twice.
    pub fn build<'a>(callstacks: impl IntoIterator<Item = &'a Callstack>) -> Self {
        let mut grouped: BTreeMap<String, BTreeMap<FileKey, Vec<FunctionEntry>>> = BTreeMap::new();
        for callstack in callstacks {
            for frame in callstack.frames.iter().filter(|f| !f.trim().is_empty()) {
                let info = FrameInfo::parse(frame);
                let key = match &info.location {
                    Some(loc) => (Some(loc.directory.clone()), Some(loc.file_name.clone())),
                    None => (None, None),
                };
                let entries = grouped
                    .entry(info.module.clone())
                    .or_default()
                    .entry(key)
                    .or_default();
                match entries.iter_mut().find(|e| e.address == info.address) {
                    Some(entry) => entry.occurrences += 1,
                    None => entries.push(FunctionEntry {
                        function: info.function_name().to_string(),
                        line: info.location.as_ref().and_then(|l| l.line),
                        address: info.address.clone(),
                        occurrences: 1,
                    }),
                }
            }
        }

        let modules = grouped
            .into_iter()
            .map(|(module, files)| ModuleNode {
                module,
                files: files
                    .into_iter()
                    .map(|((directory, file_name), functions)| FileNode {
                        directory,
                        file_name,
                        functions,
                    })
                    .collect(),
            })
            .collect();
        Self { modules }
    }

    /// Tree over every allocation in `snapshot`.
    pub fn for_snapshot(dataset: &Dataset, snapshot: usize) -> Self {
        let Some(snap) = dataset.snapshot(snapshot) else {
            return Self::default();
        };
        Self::build(
            snap.assoc_callstacks
                .iter()
                .filter_map(|&id| dataset.callstack(id)),
        )
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    pub fn function(&self, path: TreePath) -> Option<(&FileNode, &FunctionEntry)> {
        let file = self.modules.get(path.module)?.files.get(path.file)?;
        Some((file, file.functions.get(path.function)?))
    }

    /// The source location behind a leaf, if both the file and the line
    /// are known.
    pub fn source_location(&self, path: TreePath) -> Option<(PathBuf, u32)> {
        let (file, entry) = self.function(path)?;
        Some((file.path()?, entry.line?))
    }
}
