use serde::{Deserialize, Serialize};

use super::callstack::Callstack;
use super::snapshot::Snapshot;

/// The fully cross-referenced result of parsing one log directory.
///
/// Built once by the parser and never mutated afterwards; consumers share
/// it behind an `Arc` and replace it wholesale on reload.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Dataset {
    callstacks: Vec<Callstack>,
    snapshots: Vec<Snapshot>,
    time_unit: String,
    peak: Option<usize>,
}

impl Dataset {
    /// Assemble a dataset and mark its peak snapshot.
    pub fn new(callstacks: Vec<Callstack>, mut snapshots: Vec<Snapshot>, time_unit: String) -> Self {
        let peak = mark_peak(&mut snapshots);
        Self {
            callstacks,
            snapshots,
            time_unit,
            peak,
        }
    }

    pub fn callstacks(&self) -> &[Callstack] {
        &self.callstacks
    }

    /// Look up a callstack by its 1-based ordinal.
    pub fn callstack(&self, id: u32) -> Option<&Callstack> {
        let index = usize::try_from(id).ok()?.checked_sub(1)?;
        self.callstacks.get(index)
    }

    pub fn snapshots(&self) -> &[Snapshot] {
        &self.snapshots
    }

    pub fn snapshot(&self, id: usize) -> Option<&Snapshot> {
        self.snapshots.get(id)
    }

    /// Physical unit of a tick, as read from the first snapshot header.
    pub fn time_unit(&self) -> &str {
        &self.time_unit
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    pub fn peak(&self) -> Option<&Snapshot> {
        self.peak.and_then(|i| self.snapshots.get(i))
    }

    /// Snapshots that take part in rendering, in file order.
    pub fn visible_snapshots(&self, hide_peak: bool) -> impl Iterator<Item = &Snapshot> + '_ {
        self.snapshots
            .iter()
            .filter(move |s| !(hide_peak && s.is_peak))
    }

    /// Horizontal extent of the timeline in ticks.
    pub fn total_ticks(&self, hide_peak: bool) -> u64 {
        self.visible_snapshots(hide_peak).map(|s| s.num_ticks).sum()
    }

    /// Largest occupied total among the visible snapshots.
    pub fn max_occupied(&self, hide_peak: bool) -> u64 {
        self.visible_snapshots(hide_peak)
            .map(|s| s.tot_bytes_occupied)
            .max()
            .unwrap_or(0)
    }
}

/// Flag the snapshot with the largest occupied total. Ties go to the
/// earliest snapshot.
fn mark_peak(snapshots: &mut [Snapshot]) -> Option<usize> {
    let mut peak: Option<(usize, u64)> = None;
    for (i, s) in snapshots.iter_mut().enumerate() {
        s.is_peak = false;
        if peak.is_none_or(|(_, best)| s.tot_bytes_occupied > best) {
            peak = Some((i, s.tot_bytes_occupied));
        }
    }
    let (index, _) = peak?;
    snapshots[index].is_peak = true;
    Some(index)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snap(id: usize, ticks: u64, occupied: u64) -> Snapshot {
        let mut s = Snapshot::new(id, ticks);
        s.tot_bytes_occupied = occupied;
        s
    }

    #[test]
    fn exactly_one_peak() {
        let ds = Dataset::new(
            vec![],
            vec![snap(0, 10, 100), snap(1, 10, 300), snap(2, 10, 300), snap(3, 10, 50)],
            "ticks".into(),
        );
        let peaks: Vec<_> = ds.snapshots().iter().filter(|s| s.is_peak).collect();
        assert_eq!(peaks.len(), 1);
        assert_eq!(peaks[0].id, 1);
        assert_eq!(ds.peak().map(|s| s.id), Some(1));
    }

    #[test]
    fn hiding_peak_changes_extent_and_scale() {
        let ds = Dataset::new(
            vec![],
            vec![snap(0, 10, 100), snap(1, 30, 300), snap(2, 20, 200)],
            "ticks".into(),
        );
        assert_eq!(ds.total_ticks(false), 60);
        assert_eq!(ds.total_ticks(true), 30);
        assert_eq!(ds.max_occupied(false), 300);
        assert_eq!(ds.max_occupied(true), 200);
    }

    #[test]
    fn empty_dataset_has_no_peak() {
        let ds = Dataset::default();
        assert!(ds.is_empty());
        assert!(ds.peak().is_none());
        assert_eq!(ds.total_ticks(false), 0);
    }

    #[test]
    fn callstack_lookup_is_one_based() {
        let ds = Dataset::new(vec![Callstack::new(1), Callstack::new(2)], vec![], String::new());
        assert!(ds.callstack(0).is_none());
        assert_eq!(ds.callstack(2).map(|c| c.id), Some(2));
        assert!(ds.callstack(3).is_none());
    }
}
