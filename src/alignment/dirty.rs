//! Dirty-set resolution — which units may differ from the interval start
//!
//! The set is re-derived from the journal every time it is asked for. It
//! may over-report (a write that stored the value already present still
//! counts) but never under-reports, since a missing unit would leave a
//! downstream leaf cache stale.

use super::journal::EditJournal;
use std::collections::BTreeSet;

/// Unit indices needing their leaf data refreshed
pub type DirtyUnits = BTreeSet<usize>;

/// Union of the units touched by every record in `journal`
pub fn resolve_dirty_units(journal: &EditJournal, unit_count: usize) -> DirtyUnits {
    resolve_dirty_units_since(journal, 0, unit_count)
}

/// Like [`resolve_dirty_units`], skipping the first `start` records
pub fn resolve_dirty_units_since(journal: &EditJournal, start: usize, unit_count: usize) -> DirtyUnits {
    let mut dirty = DirtyUnits::new();
    for record in journal.records().iter().skip(start) {
        if dirty.len() == unit_count {
            break;
        }
        dirty.extend(record.touched_units(unit_count));
    }
    dirty
}
