use thiserror::Error;

use super::lines::{CALLSTACK_MARKER, ERROR_END_MARKER, LOG_END_MARKER, LogLines};
use crate::model::Callstack;

#[derive(Debug, Error)]
pub enum CallstackLogError {
    #[error("invalid UTF-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),
    #[error("line {line}: stream ended before LOG END")]
    UnexpectedEof { line: usize },
    #[error("line {line}: too many callstacks")]
    TooManyCallstacks { line: usize },
}

/// Parse `callstack.log`.
///
/// Every line containing `CALLSTACK` opens a block whose ordinal is the
/// 1-based block count. The lines that follow are the frames, up to a line
/// containing `error end` (or the next block / `LOG END`). Anything before
/// the first block is header noise. The log must end with `LOG END`.
pub fn parse_callstack_log(data: &[u8]) -> Result<Vec<Callstack>, CallstackLogError> {
    let text = std::str::from_utf8(data)?;
    let mut lines = LogLines::new(text);
    let mut callstacks: Vec<Callstack> = Vec::new();
    let block_markers = [CALLSTACK_MARKER, LOG_END_MARKER];

    let mut pending = lines.skip_until(&block_markers);
    loop {
        let Some(line) = pending else {
            return Err(CallstackLogError::UnexpectedEof {
                line: lines.line_no(),
            });
        };
        if line.contains(LOG_END_MARKER) {
            break;
        }

        let id = u32::try_from(callstacks.len() + 1).map_err(|_| {
            CallstackLogError::TooManyCallstacks {
                line: lines.line_no(),
            }
        })?;
        let mut callstack = Callstack::new(id);

        pending = None;
        while let Some(frame) = lines.next_line() {
            if frame.contains(ERROR_END_MARKER) {
                pending = lines.skip_until(&block_markers);
                break;
            }
            if block_markers.iter().any(|m| frame.contains(m)) {
                pending = Some(frame);
                break;
            }
            callstack.frames.push(frame.to_string());
        }
        callstacks.push(callstack);
    }

    tracing::debug!(callstacks = callstacks.len(), "callstack.log read");
    Ok(callstacks)
}

#[cfg(test)]
mod tests {
    use super::*;

    const LOG: &str = "\
Dr. Heapstat callstack log
format: 1
CALLSTACK 1
# 0 app!alloc_a [/src/a.c:10] (0x00401000 <app+0x1000>)
# 1 app!main [/src/main.c:5] (0x00402000 <app+0x2000>)
error end
CALLSTACK 2
# 0 libc.so.6!malloc (0x7f000000 <libc.so.6+0x1000>)
error end
LOG END
";

    #[test]
    fn assigns_one_based_ordinals_and_frames() {
        let callstacks = parse_callstack_log(LOG.as_bytes()).unwrap();
        assert_eq!(callstacks.len(), 2);
        assert_eq!(callstacks[0].id, 1);
        assert_eq!(callstacks[0].frames.len(), 2);
        assert!(callstacks[0].frames[0].contains("alloc_a"));
        assert_eq!(callstacks[1].id, 2);
        assert_eq!(callstacks[1].frames.len(), 1);
    }

    #[test]
    fn block_without_error_end_stops_at_next_marker() {
        let log = "CALLSTACK 1\n# 0 a!f (0x1 <a+0x1>)\nCALLSTACK 2\n# 0 a!g (0x2 <a+0x2>)\nLOG END\n";
        let callstacks = parse_callstack_log(log.as_bytes()).unwrap();
        assert_eq!(callstacks.len(), 2);
        assert_eq!(callstacks[0].frames, vec!["# 0 a!f (0x1 <a+0x1>)".to_string()]);
    }

    #[test]
    fn frame_lines_are_kept_verbatim() {
        let log = "CALLSTACK 1\n# 0 a!f (0x1 <a+0x1>)\n\n# 1 a!main (0x2 <a+0x2>)\nerror end\nLOG END\n";
        let callstacks = parse_callstack_log(log.as_bytes()).unwrap();
        assert_eq!(
            callstacks[0].frames,
            vec![
                "# 0 a!f (0x1 <a+0x1>)".to_string(),
                String::new(),
                "# 1 a!main (0x2 <a+0x2>)".to_string(),
            ]
        );
    }

    #[test]
    fn only_log_end_yields_nothing() {
        let callstacks = parse_callstack_log(b"LOG END\n").unwrap();
        assert!(callstacks.is_empty());
    }

    #[test]
    fn missing_log_end_is_an_error() {
        let err = parse_callstack_log(b"CALLSTACK 1\n# 0 a!f (0x1 <a+0x1>)\nerror end\n");
        assert!(matches!(err, Err(CallstackLogError::UnexpectedEof { .. })));
    }
}
