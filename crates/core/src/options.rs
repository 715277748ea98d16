use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const MAX_CALLSTACKS_PER_PAGE: usize = 500;

#[derive(Debug, Error)]
pub enum OptionsError {
    #[error("failed to read options file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid options JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Display options handed to the viewports and the table.
///
/// Consumers get their own copy; nothing downstream writes back into it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Options {
    pub def_load_dir: PathBuf,
    pub hide_peak_snapshot: bool,
    pub num_vertical_ticks: u32,
    pub square_graph: bool,
    pub antialiasing_enabled: bool,
    pub num_callstacks_per_page: usize,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            def_load_dir: PathBuf::from("."),
            hide_peak_snapshot: false,
            num_vertical_ticks: 10,
            square_graph: false,
            antialiasing_enabled: true,
            num_callstacks_per_page: 50,
        }
    }
}

impl Options {
    /// Clamp numeric fields into their supported ranges.
    pub fn validated(mut self) -> Self {
        self.num_vertical_ticks = self.num_vertical_ticks.max(1);
        self.num_callstacks_per_page = self
            .num_callstacks_per_page
            .clamp(1, MAX_CALLSTACKS_PER_PAGE);
        self
    }

    pub fn from_json(data: &[u8]) -> Result<Self, OptionsError> {
        let options: Options = serde_json::from_slice(data)?;
        Ok(options.validated())
    }

    pub fn load(path: &Path) -> Result<Self, OptionsError> {
        let data = std::fs::read(path).map_err(|source| OptionsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let options = Self::from_json(&data)?;
        tracing::debug!(path = %path.display(), ?options, "options loaded");
        Ok(options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_take_defaults() {
        let opts = Options::from_json(br#"{"square_graph": true}"#).unwrap();
        assert!(opts.square_graph);
        assert_eq!(opts.num_vertical_ticks, 10);
        assert_eq!(opts.num_callstacks_per_page, 50);
        assert!(opts.antialiasing_enabled);
    }

    #[test]
    fn out_of_range_values_are_clamped() {
        let opts =
            Options::from_json(br#"{"num_vertical_ticks": 0, "num_callstacks_per_page": 9000}"#)
                .unwrap();
        assert_eq!(opts.num_vertical_ticks, 1);
        assert_eq!(opts.num_callstacks_per_page, MAX_CALLSTACKS_PER_PAGE);
    }

    #[test]
    fn rejects_malformed_json() {
        assert!(matches!(
            Options::from_json(b"{ticks"),
            Err(OptionsError::Json(_))
        ));
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = Options::load(Path::new("/definitely/not/here.json"));
        assert!(matches!(err, Err(OptionsError::Io { .. })));
    }
}
