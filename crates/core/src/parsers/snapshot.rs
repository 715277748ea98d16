use thiserror::Error;

use super::lines::{
    FieldError, LOG_END_MARKER, LogLines, SNAPSHOT_MARKER, TOTAL_MARKER, parse_fields,
};
use crate::model::{Accounting, AllocationRecord, Callstack, Snapshot};

#[derive(Debug, Error)]
pub enum SnapshotLogError {
    #[error("invalid UTF-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),
    #[error(transparent)]
    Field(#[from] FieldError),
    #[error("line {line}: stream ended before LOG END")]
    UnexpectedEof { line: usize },
    #[error("line {line}: snapshot header has no tick count")]
    MissingTicks { line: usize },
    #[error("line {line}: snapshot header has no time unit")]
    MissingTimeUnit { line: usize },
    #[error("line {line}: snapshot #{snapshot} has no totals line")]
    MissingTotals { line: usize, snapshot: usize },
    #[error("line {line}: totals are not ordered asked <= usable <= occupied")]
    AccountingOrder { line: usize },
    #[error("line {line}: callstack #{callstack} does not exist")]
    DanglingCallstack { line: usize, callstack: u64 },
    #[error("line {line}: allocation record has zero instances")]
    ZeroInstances { line: usize },
    #[error(
        "line {line}: snapshot #{snapshot} declares {expected} mallocs but its records count {found}"
    )]
    InstanceCountMismatch {
        line: usize,
        snapshot: usize,
        expected: u64,
        found: u64,
    },
}

/// Snapshots parsed from `snapshot.log` plus the tick unit.
#[derive(Debug, Clone)]
pub struct SnapshotLog {
    pub snapshots: Vec<Snapshot>,
    pub time_unit: String,
}

/// Parse `snapshot.log`, updating the accounting of the referenced
/// callstacks.
///
/// A block is a `SNAPSHOT #<n> @<ticks> <unit>` header, a
/// `total: mallocs,asked,usable,occupied` line and allocation records
/// `callstack,instances,asked,padding,headers`. Records are read until
/// their instance counts add up to exactly `mallocs`; each record adds its
/// callstack to the association list once per instance.
pub fn parse_snapshot_log(
    data: &[u8],
    callstacks: &mut [Callstack],
) -> Result<SnapshotLog, SnapshotLogError> {
    let text = std::str::from_utf8(data)?;
    let mut lines = LogLines::new(text);
    let mut snapshots: Vec<Snapshot> = Vec::new();
    let mut time_unit: Option<String> = None;

    loop {
        let Some(header) = lines.skip_until(&[SNAPSHOT_MARKER, LOG_END_MARKER]) else {
            return Err(SnapshotLogError::UnexpectedEof {
                line: lines.line_no(),
            });
        };
        if header.contains(LOG_END_MARKER) {
            break;
        }

        let (ticks, unit) = parse_header(header, lines.line_no())?;
        match &time_unit {
            None => time_unit = Some(unit.to_string()),
            Some(first) if first != unit => {
                tracing::warn!(first = %first, found = unit, "time unit differs between snapshots");
            }
            Some(_) => {}
        }

        let mut snapshot = Snapshot::new(snapshots.len(), ticks);
        parse_block(&mut lines, &mut snapshot, callstacks)?;
        snapshots.push(snapshot);
    }

    tracing::debug!(snapshots = snapshots.len(), "snapshot.log read");
    Ok(SnapshotLog {
        snapshots,
        time_unit: time_unit.unwrap_or_default(),
    })
}

/// Extract `(ticks, unit)` from a block header.
///
/// The part after `@` is split on spaces; the first token that parses as an
/// unsigned integer is the tick count and the token after it is the unit.
fn parse_header(line: &str, line_no: usize) -> Result<(u64, &str), SnapshotLogError> {
    let Some((_, after)) = line.split_once('@') else {
        return Err(SnapshotLogError::MissingTicks { line: line_no });
    };
    let mut tokens = after.split(' ').filter(|t| !t.is_empty());
    while let Some(token) = tokens.next() {
        if let Ok(ticks) = token.parse::<u64>() {
            let unit = tokens
                .next()
                .ok_or(SnapshotLogError::MissingTimeUnit { line: line_no })?;
            return Ok((ticks, unit.trim()));
        }
    }
    Err(SnapshotLogError::MissingTicks { line: line_no })
}

fn parse_block(
    lines: &mut LogLines<'_>,
    snapshot: &mut Snapshot,
    callstacks: &mut [Callstack],
) -> Result<(), SnapshotLogError> {
    let totals = lines
        .skip_until(&[TOTAL_MARKER, SNAPSHOT_MARKER, LOG_END_MARKER])
        .filter(|l| l.contains(TOTAL_MARKER))
        .ok_or(SnapshotLogError::MissingTotals {
            line: lines.line_no(),
            snapshot: snapshot.id,
        })?;
    let totals_line = lines.line_no();
    let rest = totals
        .split_once(TOTAL_MARKER)
        .map_or(totals, |(_, rest)| rest);
    let [mallocs, asked, usable, occupied] = parse_fields::<4>(rest, totals_line)?;
    if !(asked <= usable && usable <= occupied) {
        return Err(SnapshotLogError::AccountingOrder { line: totals_line });
    }
    snapshot.tot_mallocs = mallocs;
    snapshot.tot_bytes_asked_for = asked;
    snapshot.tot_bytes_usable = usable;
    snapshot.tot_bytes_occupied = occupied;

    let mut consumed: u64 = 0;
    while consumed < mallocs {
        let line = lines.next_line().ok_or(SnapshotLogError::UnexpectedEof {
            line: lines.line_no(),
        })?;
        let line_no = lines.line_no();
        if line.contains(SNAPSHOT_MARKER) || line.contains(LOG_END_MARKER) {
            return Err(SnapshotLogError::InstanceCountMismatch {
                line: line_no,
                snapshot: snapshot.id,
                expected: mallocs,
                found: consumed,
            });
        }
        if line.trim().is_empty() {
            continue;
        }

        let [id, instances, bytes, padding, headers] = parse_fields::<5>(line, line_no)?;
        if instances == 0 {
            return Err(SnapshotLogError::ZeroInstances { line: line_no });
        }
        consumed = consumed.saturating_add(instances);
        if consumed > mallocs {
            return Err(SnapshotLogError::InstanceCountMismatch {
                line: line_no,
                snapshot: snapshot.id,
                expected: mallocs,
                found: consumed,
            });
        }

        let callstack = u32::try_from(id)
            .ok()
            .and_then(|id| callstacks.get_mut(usize::try_from(id).ok()?.checked_sub(1)?))
            .ok_or(SnapshotLogError::DanglingCallstack {
                line: line_no,
                callstack: id,
            })?;
        let usage = Accounting::from_deltas(instances, bytes, padding, headers);
        callstack.usage = usage;
        // `consumed <= mallocs` bounds the association list by the declared total.
        snapshot.push_record(
            AllocationRecord {
                callstack: callstack.id,
                usage,
            },
            instances,
        );
    }
    check_no_surplus(lines, snapshot.id, mallocs)
}

/// Fail if records remain between a satisfied block and the next header.
fn check_no_surplus(
    lines: &mut LogLines<'_>,
    snapshot: usize,
    mallocs: u64,
) -> Result<(), SnapshotLogError> {
    let mut found = mallocs;
    let mut first_surplus = None;
    while let Some(line) = lines.peek() {
        if line.contains(SNAPSHOT_MARKER) || line.contains(LOG_END_MARKER) {
            break;
        }
        lines.next_line();
        if line.trim().is_empty() {
            continue;
        }
        let [_, instances, _, _, _] = parse_fields::<5>(line, lines.line_no())?;
        found = found.saturating_add(instances);
        first_surplus.get_or_insert(lines.line_no());
    }
    match first_surplus {
        Some(line) => Err(SnapshotLogError::InstanceCountMismatch {
            line,
            snapshot,
            expected: mallocs,
            found,
        }),
        None => Ok(()),
    }
}
