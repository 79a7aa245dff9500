//! EditRecord — one journaled mutation of the matrix
//!
//! Each record stores both the value(s) it replaced and the value(s) it
//! wrote, so it can be inverted without consulting anything but the grid.

use crate::datatype::Code;
use nalgebra::DMatrix;
use std::collections::BTreeSet;

/// The four edit shapes the matrix supports
#[derive(Debug, Clone, PartialEq)]
pub enum EditRecord {
    /// One cell
    SingleCell {
        site: usize,
        unit: usize,
        old: Code,
        new: Code,
    },
    /// Every unit's value at one site
    Row {
        site: usize,
        old: Vec<Code>,
        new: Vec<Code>,
    },
    /// Every site's value for one unit
    Column {
        unit: usize,
        old: Vec<Code>,
        new: Vec<Code>,
    },
    /// The whole grid
    Full {
        old: DMatrix<Code>,
        new: DMatrix<Code>,
    },
}

impl EditRecord {
    /// Write this record's prior values back into `grid`
    pub fn undo(&self, grid: &mut DMatrix<Code>) {
        match self {
            EditRecord::SingleCell { site, unit, old, .. } => {
                grid[(*site, *unit)] = *old;
            }
            EditRecord::Row { site, old, .. } => {
                for (unit, &code) in old.iter().enumerate() {
                    grid[(*site, unit)] = code;
                }
            }
            EditRecord::Column { unit, old, .. } => {
                for (site, &code) in old.iter().enumerate() {
                    grid[(site, *unit)] = code;
                }
            }
            EditRecord::Full { old, .. } => {
                grid.copy_from(old);
            }
        }
    }

    /// Units whose values this record may have changed.
    ///
    /// A row edit spans every unit at its site; a column edit is confined
    /// to its own unit across all sites.
    pub fn touched_units(&self, unit_count: usize) -> BTreeSet<usize> {
        match self {
            EditRecord::SingleCell { unit, .. } | EditRecord::Column { unit, .. } => {
                BTreeSet::from([*unit])
            }
            EditRecord::Row { .. } | EditRecord::Full { .. } => (0..unit_count).collect(),
        }
    }

    /// Short name for logs
    pub fn kind(&self) -> &'static str {
        match self {
            EditRecord::SingleCell { .. } => "cell",
            EditRecord::Row { .. } => "row",
            EditRecord::Column { .. } => "column",
            EditRecord::Full { .. } => "full",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid() -> DMatrix<Code> {
        DMatrix::from_row_slice(3, 2, &[0, 1, 1, 0, 0, 0])
    }

    #[test]
    fn test_undo_single_cell() {
        let mut g = grid();
        g[(2, 1)] = 3;
        EditRecord::SingleCell { site: 2, unit: 1, old: 0, new: 3 }.undo(&mut g);
        assert_eq!(g, grid());
    }

    #[test]
    fn test_undo_row_and_column() {
        let mut g = grid();
        g[(0, 0)] = 2;
        g[(0, 1)] = 2;
        EditRecord::Row { site: 0, old: vec![0, 1], new: vec![2, 2] }.undo(&mut g);
        assert_eq!(g, grid());

        for site in 0..3 {
            g[(site, 1)] = 3;
        }
        EditRecord::Column { unit: 1, old: vec![1, 0, 0], new: vec![3, 3, 3] }.undo(&mut g);
        assert_eq!(g, grid());
    }

    #[test]
    fn test_undo_full() {
        let replaced = DMatrix::from_element(3, 2, 3);
        let mut g = replaced.clone();
        EditRecord::Full { old: grid(), new: replaced }.undo(&mut g);
        assert_eq!(g, grid());
    }

    #[test]
    fn test_touched_units() {
        let row = EditRecord::Row { site: 1, old: vec![0; 4], new: vec![1; 4] };
        assert_eq!(row.touched_units(4), BTreeSet::from([0, 1, 2, 3]));
        let col = EditRecord::Column { unit: 2, old: vec![0; 9], new: vec![1; 9] };
        assert_eq!(col.touched_units(4), BTreeSet::from([2]));
        assert_eq!(col.kind(), "column");
    }
}
