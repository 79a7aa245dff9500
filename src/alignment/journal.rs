//! EditJournal — the undo log of one open transaction

use super::edit::EditRecord;
use crate::datatype::Code;
use nalgebra::DMatrix;

/// Insertion-ordered, append-only list of edit records.
///
/// Records are only ever dropped in bulk, by [`EditJournal::clear`] on
/// commit or by [`EditJournal::undo_all`] on rollback. Each bulk drop
/// starts a new generation, so a reader holding a `(generation, len)`
/// cursor can tell appended records from a journal that was reset.
#[derive(Debug, Clone, Default)]
pub struct EditJournal {
    records: Vec<EditRecord>,
    generation: u64,
}

impl EditJournal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, record: EditRecord) {
        self.records.push(record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &EditRecord> {
        self.records.iter()
    }

    pub fn records(&self) -> &[EditRecord] {
        &self.records
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn clear(&mut self) {
        self.records.clear();
        self.generation += 1;
    }

    /// Invert every record, newest first, then empty the journal
    pub fn undo_all(&mut self, grid: &mut DMatrix<Code>) {
        for record in self.records.iter().rev() {
            record.undo(grid);
        }
        self.clear();
    }
}
