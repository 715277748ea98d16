use thiserror::Error;

pub const CALLSTACK_MARKER: &str = "CALLSTACK";
pub const SNAPSHOT_MARKER: &str = "SNAPSHOT #";
pub const TOTAL_MARKER: &str = "total: ";
pub const ERROR_END_MARKER: &str = "error end";
pub const LOG_END_MARKER: &str = "LOG END";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FieldError {
    #[error("line {line}: expected {expected} comma-separated fields, found {found}")]
    FieldCount {
        line: usize,
        expected: usize,
        found: usize,
    },
    #[error("line {line}: invalid integer {value:?}")]
    InvalidInteger { line: usize, value: String },
}

/// Forward-only line cursor that remembers the 1-based number of the
/// last line it handed out.
pub struct LogLines<'a> {
    lines: std::iter::Peekable<std::str::Lines<'a>>,
    line_no: usize,
}

impl<'a> LogLines<'a> {
    pub fn new(text: &'a str) -> Self {
        Self {
            lines: text.lines().peekable(),
            line_no: 0,
        }
    }

    pub fn next_line(&mut self) -> Option<&'a str> {
        let line = self.lines.next()?;
        self.line_no += 1;
        Some(line)
    }

    /// The next line, without advancing.
    pub fn peek(&mut self) -> Option<&'a str> {
        self.lines.peek().copied()
    }

    /// Number of the line most recently returned (0 before the first).
    pub fn line_no(&self) -> usize {
        self.line_no
    }

    /// Advance to the first line containing any of `markers`.
    pub fn skip_until(&mut self, markers: &[&str]) -> Option<&'a str> {
        while let Some(line) = self.next_line() {
            if markers.iter().any(|m| line.contains(m)) {
                return Some(line);
            }
        }
        None
    }
}

/// Split a comma-separated record into exactly `N` unsigned integers.
pub fn parse_fields<const N: usize>(record: &str, line: usize) -> Result<[u64; N], FieldError> {
    let parts: Vec<&str> = record.trim().split(',').collect();
    if parts.len() != N {
        return Err(FieldError::FieldCount {
            line,
            expected: N,
            found: parts.len(),
        });
    }
    let mut out = [0u64; N];
    for (slot, part) in out.iter_mut().zip(parts) {
        let part = part.trim();
        *slot = part.parse().map_err(|_| FieldError::InvalidInteger {
            line,
            value: part.to_string(),
        })?;
    }
    Ok(out)
}
