use std::cmp::Ordering;

use crate::model::{Dataset, FrameInfo};

/// Number of leading frames summarised in the symbol column.
const SYMBOL_FRAMES: usize = 3;
const SYMBOL_SEPARATOR: &str = " <-- ";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Column {
    Callstack,
    Symbol,
    Alloc,
    Padding,
    Headers,
}

impl Column {
    pub const ALL: [Column; 5] = [
        Column::Callstack,
        Column::Symbol,
        Column::Alloc,
        Column::Padding,
        Column::Headers,
    ];

    pub fn title(self) -> &'static str {
        match self {
            Column::Callstack => "Call Stack",
            Column::Symbol => "Symbol",
            Column::Alloc => "Alloc",
            Column::Padding => "+Pad",
            Column::Headers => "+Head",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRow {
    pub callstack: u32,
    pub symbol: String,
    pub bytes_asked_for: u64,
    pub extra_usable: u64,
    pub extra_occupied: u64,
}

impl TableRow {
    fn compare(&self, other: &Self, column: Column) -> Ordering {
        match column {
            Column::Callstack => self.callstack.cmp(&other.callstack),
            Column::Symbol => self.symbol.cmp(&other.symbol),
            Column::Alloc => self.bytes_asked_for.cmp(&other.bytes_asked_for),
            Column::Padding => self.extra_usable.cmp(&other.extra_usable),
            Column::Headers => self.extra_occupied.cmp(&other.extra_occupied),
        }
    }

    pub fn cell(&self, column: Column) -> String {
        match column {
            Column::Callstack => self.callstack.to_string(),
            Column::Symbol => self.symbol.clone(),
            Column::Alloc => self.bytes_asked_for.to_string(),
            Column::Padding => self.extra_usable.to_string(),
            Column::Headers => self.extra_occupied.to_string(),
        }
    }
}

/// Function names of the first frames, innermost first.
pub fn symbol_summary(frames: &[String]) -> String {
    frames
        .iter()
        .filter(|f| !f.trim().is_empty())
        .take(SYMBOL_FRAMES)
        .map(|f| FrameInfo::parse(f).function_name().to_string())
        .collect::<Vec<_>>()
        .join(SYMBOL_SEPARATOR)
}

/// One page of the current snapshot's association list.
///
/// Only the visible page is materialised; the other rows are built when
/// the user pages to them.
#[derive(Debug, Clone)]
pub struct CallstackTable {
    per_page: usize,
    page: usize,
    total: usize,
    rows: Vec<TableRow>,
    selected: Option<usize>,
    sort: Option<(Column, SortOrder)>,
}

impl CallstackTable {
    pub fn new(per_page: usize) -> Self {
        Self {
            per_page: per_page.max(1),
            page: 0,
            total: 0,
            rows: Vec::new(),
            selected: None,
            sort: None,
        }
    }

    pub fn set_per_page(&mut self, per_page: usize) {
        self.per_page = per_page.max(1);
    }

    pub fn per_page(&self) -> usize {
        self.per_page
    }

    pub fn page(&self) -> usize {
        self.page
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn rows(&self) -> &[TableRow] {
        &self.rows
    }

    pub fn selected(&self) -> Option<usize> {
        self.selected
    }

    pub fn selected_row(&self) -> Option<&TableRow> {
        self.rows.get(self.selected?)
    }

    pub fn sort_state(&self) -> Option<(Column, SortOrder)> {
        self.sort
    }

    pub fn clear(&mut self) {
        self.page = 0;
        self.total = 0;
        self.rows.clear();
        self.selected = None;
    }

    /// Rebuild `page` of `snapshot`'s association list. Each row shows the
    /// accounting of the record its association entry came from. Selects
    /// the first row.
    pub fn rebuild(&mut self, dataset: &Dataset, snapshot: usize, page: usize) {
        let Some(snap) = dataset.snapshot(snapshot) else {
            self.clear();
            return;
        };
        self.total = snap.assoc_callstacks.len();
        self.page = page;
        let start = page.saturating_mul(self.per_page);
        self.rows = snap
            .assoc_callstacks
            .iter()
            .enumerate()
            .skip(start)
            .take(self.per_page)
            .filter_map(|(index, &id)| {
                let callstack = dataset.callstack(id)?;
                let usage = snap
                    .record_at(index)
                    .or_else(|| snap.record_for(id))
                    .map_or(callstack.usage, |record| record.usage);
                Some(TableRow {
                    callstack: id,
                    symbol: symbol_summary(&callstack.frames),
                    bytes_asked_for: usage.bytes_asked_for,
                    extra_usable: usage.extra_usable,
                    extra_occupied: usage.extra_occupied,
                })
            })
            .collect();
        self.apply_sort();
        self.selected = (!self.rows.is_empty()).then_some(0);
        tracing::debug!(snapshot, page, rows = self.rows.len(), "callstack table rebuilt");
    }

    /// Sort the visible page by `column`. Sorting the same column again
    /// flips the order.
    pub fn sort_by(&mut self, column: Column) {
        let order = match self.sort {
            Some((c, SortOrder::Ascending)) if c == column => SortOrder::Descending,
            _ => SortOrder::Ascending,
        };
        self.sort = Some((column, order));
        self.apply_sort();
        self.selected = (!self.rows.is_empty()).then_some(0);
    }

    fn apply_sort(&mut self) {
        if let Some((column, order)) = self.sort {
            self.rows.sort_by(|a, b| {
                let ord = a.compare(b, column);
                match order {
                    SortOrder::Ascending => ord,
                    SortOrder::Descending => ord.reverse(),
                }
            });
        }
    }

    /// Select a visible row. Returns whether the selection changed.
    pub fn select(&mut self, row: usize) -> bool {
        if row >= self.rows.len() || self.selected == Some(row) {
            return false;
        }
        self.selected = Some(row);
        true
    }

    pub fn first_shown(&self) -> usize {
        self.page * self.per_page
    }

    pub fn has_next(&self) -> bool {
        self.first_shown() + self.rows.len() < self.total
    }

    pub fn has_prev(&self) -> bool {
        self.page > 0
    }

    /// `"Displaying callstacks <first> to <last> of <total>"`.
    pub fn page_label(&self) -> String {
        let first = self.first_shown();
        format!(
            "Displaying callstacks {} to {} of {}",
            first + 1,
            first + self.rows.len(),
            self.total
        )
    }
}
