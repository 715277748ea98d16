use thiserror::Error;

use super::lines::{FieldError, LOG_END_MARKER, LogLines, SNAPSHOT_MARKER, parse_fields};
use crate::model::{Callstack, StaleSample};

#[derive(Debug, Error)]
pub enum StalenessLogError {
    #[error("invalid UTF-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),
    #[error(transparent)]
    Field(#[from] FieldError),
    #[error("line {line}: stream ended before LOG END")]
    UnexpectedEof { line: usize },
    #[error("line {line}: callstack #{callstack} does not exist")]
    DanglingCallstack { line: usize, callstack: u64 },
}

/// Parse `staleness.log`, attaching samples to `callstacks`.
///
/// Blocks are opened by a `SNAPSHOT #` line and numbered by a local
/// counter starting at 0; the header's own number is ignored. Every
/// non-blank line inside a block is `callstack,stale_bytes,last_access`.
/// Returns the number of blocks seen.
pub fn parse_staleness_log(
    data: &[u8],
    callstacks: &mut [Callstack],
) -> Result<usize, StalenessLogError> {
    let text = std::str::from_utf8(data)?;
    let mut lines = LogLines::new(text);
    let markers = [SNAPSHOT_MARKER, LOG_END_MARKER];
    let mut blocks = 0usize;
    let mut samples = 0usize;

    let mut pending = lines.skip_until(&markers);
    loop {
        let Some(line) = pending else {
            return Err(StalenessLogError::UnexpectedEof {
                line: lines.line_no(),
            });
        };
        if line.contains(LOG_END_MARKER) {
            break;
        }
        let snapshot = blocks;
        blocks += 1;

        pending = None;
        while let Some(line) = lines.next_line() {
            if markers.iter().any(|m| line.contains(m)) {
                pending = Some(line);
                break;
            }
            if line.trim().is_empty() {
                continue;
            }
            let line_no = lines.line_no();
            let [id, stale_bytes, last_access] = parse_fields::<3>(line, line_no)?;
            let callstack = usize::try_from(id)
                .ok()
                .and_then(|id| id.checked_sub(1))
                .and_then(|index| callstacks.get_mut(index))
                .ok_or(StalenessLogError::DanglingCallstack {
                    line: line_no,
                    callstack: id,
                })?;
            callstack
                .staleness
                .entry(snapshot)
                .or_default()
                .push(StaleSample {
                    stale_bytes,
                    last_access,
                });
            samples += 1;
        }
    }

    tracing::debug!(blocks, samples, "staleness.log read");
    Ok(blocks)
}
