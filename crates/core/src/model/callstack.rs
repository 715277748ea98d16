use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Memory accounting for one allocation record.
///
/// Each field after `bytes_asked_for` is cumulative: `extra_usable`
/// includes the bytes asked for plus allocator padding, and
/// `extra_occupied` includes that plus heap-metadata overhead.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Accounting {
    pub instances: u64,
    pub bytes_asked_for: u64,
    pub extra_usable: u64,
    pub extra_occupied: u64,
}

impl Accounting {
    /// Build cumulative accounting from the raw deltas found in a
    /// snapshot record.
    pub fn from_deltas(instances: u64, bytes_asked_for: u64, padding: u64, headers: u64) -> Self {
        let extra_usable = bytes_asked_for.saturating_add(padding);
        Self {
            instances,
            bytes_asked_for,
            extra_usable,
            extra_occupied: extra_usable.saturating_add(headers),
        }
    }
}

/// One live instance's staleness at a given snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaleSample {
    /// Bytes of the allocation that have not been touched.
    pub stale_bytes: u64,
    /// Ticks since the allocation was last accessed.
    pub last_access: u64,
}

/// A unique allocation site, identified by its captured frames.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Callstack {
    /// 1-based ordinal in `callstack.log` order.
    pub id: u32,
    /// Raw frame description lines, outermost last.
    pub frames: Vec<String>,
    /// Accounting from the most recent snapshot record for this callstack.
    pub usage: Accounting,
    /// Staleness samples keyed by snapshot ordinal.
    pub staleness: BTreeMap<usize, Vec<StaleSample>>,
}

impl Callstack {
    pub fn new(id: u32) -> Self {
        Self {
            id,
            frames: Vec::new(),
            usage: Accounting::default(),
            staleness: BTreeMap::new(),
        }
    }

    /// Staleness samples recorded at `snapshot`, empty if there are none.
    pub fn stale_samples(&self, snapshot: usize) -> &[StaleSample] {
        self.staleness
            .get(&snapshot)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deltas_accumulate() {
        let a = Accounting::from_deltas(2, 50, 10, 10);
        assert_eq!(a.extra_usable, 60);
        assert_eq!(a.extra_occupied, 70);
        assert!(a.bytes_asked_for <= a.extra_usable && a.extra_usable <= a.extra_occupied);
    }

    #[test]
    fn missing_staleness_is_empty() {
        let mut cs = Callstack::new(1);
        cs.staleness.entry(3).or_default().push(StaleSample {
            stale_bytes: 16,
            last_access: 4,
        });
        assert!(cs.stale_samples(0).is_empty());
        assert_eq!(cs.stale_samples(3).len(), 1);
    }
}
