use serde::{Deserialize, Serialize};

use super::callstack::Accounting;

/// One allocation record inside a snapshot block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationRecord {
    pub callstack: u32,
    pub usage: Accounting,
}

/// A point-in-time measurement of heap state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    /// 0-based ordinal in `snapshot.log` order.
    pub id: usize,
    /// Tick weight of this snapshot on the timeline.
    pub num_ticks: u64,
    pub tot_mallocs: u64,
    pub tot_bytes_asked_for: u64,
    pub tot_bytes_usable: u64,
    pub tot_bytes_occupied: u64,
    /// Callstack ordinals, one entry per live instance, in file order.
    pub assoc_callstacks: Vec<u32>,
    /// Index into `records` for each `assoc_callstacks` entry.
    pub assoc_records: Vec<usize>,
    /// Allocation records in file order.
    pub records: Vec<AllocationRecord>,
    pub is_peak: bool,
}

impl Snapshot {
    pub fn new(id: usize, num_ticks: u64) -> Self {
        Self {
            id,
            num_ticks,
            tot_mallocs: 0,
            tot_bytes_asked_for: 0,
            tot_bytes_usable: 0,
            tot_bytes_occupied: 0,
            assoc_callstacks: Vec::new(),
            assoc_records: Vec::new(),
            records: Vec::new(),
            is_peak: false,
        }
    }

    /// Append a record and associate its callstack once per instance.
    pub fn push_record(&mut self, record: AllocationRecord, instances: u64) {
        let index = self.records.len();
        for _ in 0..instances {
            self.assoc_callstacks.push(record.callstack);
            self.assoc_records.push(index);
        }
        self.records.push(record);
    }

    /// The record behind association entry `index`.
    pub fn record_at(&self, index: usize) -> Option<&AllocationRecord> {
        self.records.get(*self.assoc_records.get(index)?)
    }

    /// The first record that introduced `callstack` into this snapshot.
    pub fn record_for(&self, callstack: u32) -> Option<&AllocationRecord> {
        self.records.iter().find(|r| r.callstack == callstack)
    }
}
