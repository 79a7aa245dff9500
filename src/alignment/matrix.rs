//! VersionedMatrix — the journaled `site × unit` grid of state codes
//!
//! Writes land in the grid immediately; recoverability comes only from the
//! journal. `commit` forgets the journal, `rollback` replays it backwards.
//! Every write validates indices, shapes and codes first, so a rejected
//! call leaves both grid and journal untouched.
//!
//! Each site also carries a pattern weight (1 unless set otherwise) used
//! when per-site log likelihoods are summed.

use super::dirty::{resolve_dirty_units, DirtyUnits};
use super::edit::EditRecord;
use super::journal::EditJournal;
use crate::datatype::{Code, DataType};
use crate::error::{AlignmentError, Axis};
use log::debug;
use nalgebra::{DMatrix, DVector};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct VersionedMatrix {
    id: String,
    taxa: Vec<String>,
    data_type: Arc<dyn DataType>,
    /// nrows = sites, ncols = units
    grid: DMatrix<Code>,
    journal: EditJournal,
    /// One weight per site; zero drops the site from the sum
    pattern_weights: Vec<u32>,
}

/// Every code must name a symbol of `data_type`
fn check_codes<'a>(
    data_type: &dyn DataType,
    codes: impl IntoIterator<Item = &'a Code>,
) -> Result<(), AlignmentError> {
    let code_count = data_type.code_count();
    match codes.into_iter().find(|&&c| c as usize >= code_count) {
        Some(&code) => Err(AlignmentError::Code {
            code,
            data_type: data_type.name().to_string(),
            code_count,
        }),
        None => Ok(()),
    }
}

impl VersionedMatrix {
    /// Wrap an existing grid. `taxa[u]` names column `u`.
    pub fn new(
        taxa: Vec<String>,
        data_type: Arc<dyn DataType>,
        grid: DMatrix<Code>,
    ) -> Result<Self, AlignmentError> {
        if grid.ncols() != taxa.len() {
            return Err(AlignmentError::shape("unit names", grid.ncols(), taxa.len()));
        }
        let mut seen = HashSet::new();
        for name in &taxa {
            if !seen.insert(name.as_str()) {
                return Err(AlignmentError::Configuration(format!(
                    "duplicate unit name '{}'",
                    name
                )));
            }
        }
        check_codes(data_type.as_ref(), grid.iter())?;
        let site_count = grid.nrows();
        Ok(Self {
            id: Uuid::new_v4().to_string(),
            taxa,
            data_type,
            grid,
            journal: EditJournal::new(),
            pattern_weights: vec![1; site_count],
        })
    }

    /// Build from named symbol strings. Units are sorted by name first.
    pub fn from_sequences(
        data_type: Arc<dyn DataType>,
        sequences: &[(&str, &str)],
    ) -> Result<Self, AlignmentError> {
        let mut sorted: Vec<(&str, &str)> = sequences.to_vec();
        sorted.sort_by(|a, b| a.0.cmp(b.0));

        let site_count = sorted.first().map(|(_, s)| s.chars().count()).unwrap_or(0);
        let mut columns = Vec::with_capacity(sorted.len());
        for (name, symbols) in &sorted {
            let codes = data_type.encode(symbols)?;
            if codes.len() != site_count {
                return Err(AlignmentError::shape("sequence length", site_count, codes.len()));
            }
            debug!("{}: {} sites", name, codes.len());
            columns.push(codes);
        }

        let grid = DMatrix::from_fn(site_count, columns.len(), |site, unit| columns[unit][site]);
        let taxa = sorted.iter().map(|(name, _)| name.to_string()).collect();
        Self::new(taxa, data_type, grid)
    }

    /// Override the state-node identifier
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Replace the per-site pattern weights
    pub fn with_site_weights(mut self, weights: &[u32]) -> Result<Self, AlignmentError> {
        self.set_site_weights(weights)?;
        Ok(self)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn site_count(&self) -> usize {
        self.grid.nrows()
    }

    pub fn unit_count(&self) -> usize {
        self.grid.ncols()
    }

    pub fn taxa(&self) -> &[String] {
        &self.taxa
    }

    pub fn unit_index(&self, name: &str) -> Option<usize> {
        self.taxa.iter().position(|t| t == name)
    }

    pub fn data_type(&self) -> &Arc<dyn DataType> {
        &self.data_type
    }

    pub fn grid(&self) -> &DMatrix<Code> {
        &self.grid
    }

    pub fn journal(&self) -> &EditJournal {
        &self.journal
    }

    pub fn pattern_weights(&self) -> &[u32] {
        &self.pattern_weights
    }

    pub fn set_site_weights(&mut self, weights: &[u32]) -> Result<(), AlignmentError> {
        if weights.len() != self.site_count() {
            return Err(AlignmentError::shape("site weights", self.site_count(), weights.len()));
        }
        self.pattern_weights.copy_from_slice(weights);
        Ok(())
    }

    /// Zero the weight of every site where all units hold the same code.
    ///
    /// Invariance is judged on the current codes, ambiguity codes taken
    /// literally. Returns the total weight removed.
    pub fn strip_invariant_sites(&mut self) -> u32 {
        let mut removed = 0;
        for site in 0..self.site_count() {
            let row = self.grid.row(site);
            let invariant = row.iter().all(|&c| c == row[0]);
            if invariant && self.pattern_weights[site] > 0 {
                removed += self.pattern_weights[site];
                self.pattern_weights[site] = 0;
            }
        }
        if removed > 0 {
            debug!("Stripped invariant sites from '{}', weight {} removed", self.id, removed);
        }
        removed
    }

    /// Σ weight[site] · per_site[site]
    pub fn weighted_sum(&self, per_site: &DVector<f64>) -> Result<f64, AlignmentError> {
        if per_site.len() != self.site_count() {
            return Err(AlignmentError::shape("per-site values", self.site_count(), per_site.len()));
        }
        Ok(per_site
            .iter()
            .zip(&self.pattern_weights)
            .map(|(value, &weight)| if weight == 0 { 0.0 } else { weight as f64 * value })
            .sum())
    }

    /// Units touched since the last commit or rollback
    pub fn dirty_units(&self) -> DirtyUnits {
        resolve_dirty_units(&self.journal, self.unit_count())
    }

    fn check_site(&self, site: usize) -> Result<(), AlignmentError> {
        if site >= self.site_count() {
            return Err(AlignmentError::Index { axis: Axis::Site, index: site, len: self.site_count() });
        }
        Ok(())
    }

    fn check_unit(&self, unit: usize) -> Result<(), AlignmentError> {
        if unit >= self.unit_count() {
            return Err(AlignmentError::Index { axis: Axis::Unit, index: unit, len: self.unit_count() });
        }
        Ok(())
    }

    pub fn read_cell(&self, site: usize, unit: usize) -> Result<Code, AlignmentError> {
        self.check_site(site)?;
        self.check_unit(unit)?;
        Ok(self.grid[(site, unit)])
    }

    /// All units' codes at one site
    pub fn row(&self, site: usize) -> Result<Vec<Code>, AlignmentError> {
        self.check_site(site)?;
        Ok(self.grid.row(site).iter().copied().collect())
    }

    /// One unit's codes across all sites
    pub fn column(&self, unit: usize) -> Result<Vec<Code>, AlignmentError> {
        self.check_unit(unit)?;
        Ok(self.grid.column(unit).iter().copied().collect())
    }

    pub fn write_cell(&mut self, site: usize, unit: usize, new: Code) -> Result<(), AlignmentError> {
        let old = self.read_cell(site, unit)?;
        check_codes(self.data_type.as_ref(), [&new])?;
        self.journal.push(EditRecord::SingleCell { site, unit, old, new });
        self.grid[(site, unit)] = new;
        Ok(())
    }

    pub fn write_row(&mut self, site: usize, new_row: &[Code]) -> Result<(), AlignmentError> {
        self.check_site(site)?;
        if new_row.len() != self.unit_count() {
            return Err(AlignmentError::shape("row", self.unit_count(), new_row.len()));
        }
        check_codes(self.data_type.as_ref(), new_row)?;
        let old = self.grid.row(site).iter().copied().collect();
        self.journal.push(EditRecord::Row { site, old, new: new_row.to_vec() });
        for (unit, &code) in new_row.iter().enumerate() {
            self.grid[(site, unit)] = code;
        }
        Ok(())
    }

    pub fn write_column(&mut self, unit: usize, new_column: &[Code]) -> Result<(), AlignmentError> {
        self.check_unit(unit)?;
        if new_column.len() != self.site_count() {
            return Err(AlignmentError::shape("column", self.site_count(), new_column.len()));
        }
        check_codes(self.data_type.as_ref(), new_column)?;
        let old = self.grid.column(unit).iter().copied().collect();
        self.journal.push(EditRecord::Column { unit, old, new: new_column.to_vec() });
        for (site, &code) in new_column.iter().enumerate() {
            self.grid[(site, unit)] = code;
        }
        Ok(())
    }

    pub fn write_all(&mut self, new_matrix: &DMatrix<Code>) -> Result<(), AlignmentError> {
        if new_matrix.shape() != self.grid.shape() {
            return Err(AlignmentError::shape(
                "matrix",
                format!("{}x{}", self.site_count(), self.unit_count()),
                format!("{}x{}", new_matrix.nrows(), new_matrix.ncols()),
            ));
        }
        check_codes(self.data_type.as_ref(), new_matrix.iter())?;
        self.journal.push(EditRecord::Full {
            old: self.grid.clone(),
            new: new_matrix.clone(),
        });
        self.grid.copy_from(new_matrix);
        Ok(())
    }

    /// Make every journaled edit permanent
    pub fn commit(&mut self) {
        if !self.journal.is_empty() {
            debug!("Committing {} edits to '{}'", self.journal.len(), self.id);
        }
        self.journal.clear();
    }

    /// Undo every journaled edit, newest first.
    ///
    /// Returns the units the undone edits touched; their downstream caches
    /// now hold the discarded speculative values.
    pub fn rollback(&mut self) -> DirtyUnits {
        if self.journal.is_empty() {
            return DirtyUnits::new();
        }
        let undone = self.dirty_units();
        debug!(
            "Rolling back {} edits on '{}' ({} units affected)",
            self.journal.len(),
            self.id,
            undone.len()
        );
        self.journal.undo_all(&mut self.grid);
        undone
    }

    /// Copy another matrix's codes into this one without journaling.
    /// Any open journal is discarded.
    pub fn assign_from(&mut self, other: &VersionedMatrix) -> Result<(), AlignmentError> {
        if other.grid.shape() != self.grid.shape() {
            return Err(AlignmentError::shape(
                "matrix",
                format!("{}x{}", self.site_count(), self.unit_count()),
                format!("{}x{}", other.site_count(), other.unit_count()),
            ));
        }
        check_codes(self.data_type.as_ref(), other.grid.iter())?;
        self.grid.copy_from(&other.grid);
        self.journal.clear();
        Ok(())
    }

    /// Load path: overwrite one unit's column, bypassing the journal
    pub(crate) fn load_column(&mut self, unit: usize, codes: &[Code]) -> Result<(), AlignmentError> {
        self.check_unit(unit)?;
        if codes.len() != self.site_count() {
            return Err(AlignmentError::shape("column", self.site_count(), codes.len()));
        }
        check_codes(self.data_type.as_ref(), codes)?;
        for (site, &code) in codes.iter().enumerate() {
            self.grid[(site, unit)] = code;
        }
        Ok(())
    }

    /// SHA256 over the dimensions and every code
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update((self.site_count() as u64).to_le_bytes());
        hasher.update((self.unit_count() as u64).to_le_bytes());
        for code in self.grid.iter() {
            hasher.update(code.to_le_bytes());
        }
        hex::encode(hasher.finalize())
    }

    pub fn summary(&self) -> String {
        format!(
            "VersionedMatrix '{}' | {} | sites={} | units={} | pending edits={}",
            self.id,
            self.data_type.name(),
            self.site_count(),
            self.unit_count(),
            self.journal.len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datatype::{Binary, Nucleotide};

    /// 3 sites × 2 units, site-major: [[0,1],[1,0],[0,0]]
    fn scenario_matrix() -> VersionedMatrix {
        let grid = DMatrix::from_row_slice(3, 2, &[0, 1, 1, 0, 0, 0]);
        VersionedMatrix::new(vec!["a".into(), "b".into()], Arc::new(Binary), grid).unwrap()
    }

    fn primates() -> VersionedMatrix {
        VersionedMatrix::from_sequences(
            Arc::new(Nucleotide),
            &[
                ("human", "AGA"),
                ("chimp", "AGA"),
                ("bonobo", "AGA"),
                ("gorilla", "AGA"),
                ("orangutan", "AGA"),
                ("siamang", "TGA"),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_units_sorted_by_name() {
        let m = primates();
        assert_eq!(m.taxa(), &["bonobo", "chimp", "gorilla", "human", "orangutan", "siamang"]);
        assert_eq!(m.site_count(), 3);
        assert_eq!(m.column(5).unwrap(), vec![3, 2, 0]);
        assert_eq!(m.row(0).unwrap(), vec![0, 0, 0, 0, 0, 3]);
    }

    #[test]
    fn test_read_out_of_range() {
        let m = scenario_matrix();
        assert!(matches!(
            m.read_cell(3, 0),
            Err(AlignmentError::Index { axis: Axis::Site, index: 3, len: 3 })
        ));
        assert!(matches!(
            m.read_cell(0, 2),
            Err(AlignmentError::Index { axis: Axis::Unit, .. })
        ));
    }

    #[test]
    fn test_round_trip_each_shape() {
        let original = scenario_matrix();

        let mut m = original.clone();
        m.write_cell(2, 1, 1).unwrap();
        m.rollback();
        assert_eq!(m.grid(), original.grid());

        let mut m = original.clone();
        m.write_row(1, &[0, 1]).unwrap();
        m.rollback();
        assert_eq!(m.grid(), original.grid());

        let mut m = original.clone();
        m.write_column(0, &[1, 1, 1]).unwrap();
        m.rollback();
        assert_eq!(m.grid(), original.grid());

        let mut m = original.clone();
        m.write_all(&DMatrix::from_element(3, 2, 1)).unwrap();
        m.rollback();
        assert_eq!(m.grid(), original.grid());
        assert_eq!(m.fingerprint(), original.fingerprint());
    }

    #[test]
    fn test_commit_finality() {
        let mut m = scenario_matrix();
        m.write_cell(0, 0, 1).unwrap();
        m.commit();
        let committed = m.grid().clone();
        let undone = m.rollback();
        assert!(undone.is_empty());
        assert_eq!(m.grid(), &committed);
        assert!(m.journal().is_empty());
    }

    #[test]
    fn test_rollback_on_empty_journal_is_noop() {
        let mut m = scenario_matrix();
        let before = m.grid().clone();
        assert!(m.rollback().is_empty());
        assert!(m.rollback().is_empty());
        m.commit();
        assert_eq!(m.grid(), &before);
    }

    #[test]
    fn test_lifo_same_cell() {
        let mut m = scenario_matrix();
        m.write_cell(0, 0, 1).unwrap();
        m.write_cell(0, 0, 0).unwrap();
        m.write_cell(0, 0, 1).unwrap();
        m.rollback();
        assert_eq!(m.read_cell(0, 0).unwrap(), 0);
    }

    #[test]
    fn test_scenario_a_literal_call() {
        // site 1 already holds 1 for unit 0: the write is journaled and
        // reported dirty even though no value changes
        let mut m = scenario_matrix();
        m.write_cell(1, 0, 1).unwrap();
        assert_eq!(m.grid(), scenario_matrix().grid());
        assert_eq!(m.dirty_units(), DirtyUnits::from([0]));
        assert_eq!(m.journal().len(), 1);
        m.rollback();
        assert_eq!(m.grid(), scenario_matrix().grid());
    }

    #[test]
    fn test_scenario_a_value_change() {
        let mut m = scenario_matrix();
        m.write_cell(1, 1, 1).unwrap();
        assert_eq!(m.grid(), &DMatrix::from_row_slice(3, 2, &[0, 1, 1, 1, 0, 0]));
        assert_eq!(m.dirty_units(), DirtyUnits::from([1]));
        assert_eq!(m.rollback(), DirtyUnits::from([1]));
        assert_eq!(m.grid(), scenario_matrix().grid());
    }

    #[test]
    fn test_scenario_b_column_then_row() {
        let mut m = scenario_matrix();
        m.write_column(1, &[1, 1, 1]).unwrap();
        m.write_row(0, &[1, 1]).unwrap();
        assert_eq!(m.grid(), &DMatrix::from_row_slice(3, 2, &[1, 1, 1, 1, 0, 1]));
        assert_eq!(m.dirty_units(), DirtyUnits::from([0, 1]));

        let kinds: Vec<_> = m.journal().iter().map(|r| r.kind()).collect();
        assert_eq!(kinds, vec!["column", "row"]);

        m.rollback();
        assert_eq!(m.grid(), scenario_matrix().grid());
    }

    #[test]
    fn test_shape_errors_leave_state_unchanged() {
        let mut m = scenario_matrix();
        m.write_cell(0, 0, 1).unwrap();
        let grid = m.grid().clone();

        assert!(matches!(m.write_row(0, &[1, 1, 1]), Err(AlignmentError::Shape { .. })));
        assert!(matches!(m.write_column(0, &[1]), Err(AlignmentError::Shape { .. })));
        assert!(matches!(
            m.write_all(&DMatrix::from_element(2, 2, 1)),
            Err(AlignmentError::Shape { .. })
        ));
        assert!(matches!(m.write_cell(5, 0, 1), Err(AlignmentError::Index { .. })));
        assert!(matches!(m.write_row(9, &[1, 1]), Err(AlignmentError::Index { .. })));

        assert_eq!(m.grid(), &grid);
        assert_eq!(m.journal().len(), 1);
    }

    #[test]
    fn test_original_edit_sequence() {
        // one cell, one taxon, one site, then everything
        let mut m = primates();
        let start = m.fingerprint();
        let chimp = m.unit_index("chimp").unwrap();
        let bonobo = m.unit_index("bonobo").unwrap();

        m.write_cell(1, chimp, 0).unwrap();
        assert_eq!(m.column(chimp).unwrap(), Nucleotide.encode("AAA").unwrap());
        m.write_column(bonobo, &[3, 2, 1]).unwrap();
        assert_eq!(m.column(bonobo).unwrap(), Nucleotide.encode("TGC").unwrap());
        m.write_row(0, &[1; 6]).unwrap();
        assert_eq!(m.column(chimp).unwrap(), Nucleotide.encode("CAA").unwrap());
        m.write_all(&DMatrix::from_row_slice(
            3,
            6,
            &[2, 1, 2, 1, 2, 1, 1, 2, 1, 2, 1, 2, 0, 1, 2, 3, 2, 1],
        ))
        .unwrap();
        assert_eq!(m.journal().len(), 4);

        m.rollback();
        assert_eq!(m.fingerprint(), start);
    }

    #[test]
    fn test_index_errors_after_edits_apply_nothing() {
        let mut m = scenario_matrix();
        m.write_column(1, &[1, 1, 1]).unwrap();
        m.write_cell(2, 0, 1).unwrap();
        let grid = m.grid().clone();

        assert!(matches!(
            m.write_column(2, &[0, 0, 0]),
            Err(AlignmentError::Index { axis: Axis::Unit, index: 2, len: 2 })
        ));
        assert!(matches!(m.write_row(1, &[0]), Err(AlignmentError::Shape { .. })));
        assert!(matches!(m.write_row(1, &[0, 0, 0]), Err(AlignmentError::Shape { .. })));

        assert_eq!(m.grid(), &grid);
        assert_eq!(m.journal().len(), 2);
        m.rollback();
        assert_eq!(m.grid(), scenario_matrix().grid());
    }

    #[test]
    fn test_out_of_alphabet_codes_rejected() {
        let mut m = VersionedMatrix::from_sequences(Arc::new(Nucleotide), &[("a", "ACGT")]).unwrap();
        let grid = m.grid().clone();
        let count = Nucleotide.code_count() as Code;

        assert!(matches!(
            m.write_cell(0, 0, 99),
            Err(AlignmentError::Code { code: 99, code_count: 18, .. })
        ));
        assert!(m.write_cell(0, 0, count).is_err());
        assert!(m.write_column(0, &[0, 1, 2, count]).is_err());
        assert!(m.write_row(3, &[count + 5]).is_err());
        assert!(m.write_all(&DMatrix::from_element(4, 1, count)).is_err());
        assert_eq!(m.grid(), &grid);
        assert!(m.journal().is_empty());

        // the last valid code still round-trips through text
        m.write_cell(0, 0, count - 1).unwrap();
        m.commit();
        let mut reloaded = VersionedMatrix::from_sequences(Arc::new(Nucleotide), &[("a", "ACGT")]).unwrap();
        crate::alignment::text::load_text(&mut reloaded, &crate::alignment::text::to_text(&m)).unwrap();
        assert_eq!(reloaded.grid(), m.grid());

        let bad = VersionedMatrix::new(vec!["z".into()], Arc::new(Binary), DMatrix::from_element(2, 1, 4));
        assert!(matches!(bad, Err(AlignmentError::Code { code: 4, .. })));
    }

    #[test]
    fn test_site_weights() {
        let m = scenario_matrix();
        assert_eq!(m.pattern_weights(), &[1, 1, 1]);

        let m = m.with_site_weights(&[2, 0, 5]).unwrap();
        let per_site = DVector::from_vec(vec![-1.0, -2.0, -0.5]);
        assert!((m.weighted_sum(&per_site).unwrap() - (-4.5)).abs() < 1e-12);

        let mut m = m;
        assert!(matches!(m.set_site_weights(&[1, 1]), Err(AlignmentError::Shape { .. })));
        assert!(m.weighted_sum(&DVector::zeros(2)).is_err());
        assert_eq!(m.pattern_weights(), &[2, 0, 5]);
    }

    #[test]
    fn test_strip_invariant_sites() {
        // sites: [0,1] varies, [1,0] varies, [0,0] invariant
        let mut m = scenario_matrix().with_site_weights(&[3, 2, 5]).unwrap();
        assert_eq!(m.strip_invariant_sites(), 5);
        assert_eq!(m.pattern_weights(), &[3, 2, 0]);
        assert_eq!(m.strip_invariant_sites(), 0);

        // five identical "AGA" columns and one "TGA": sites 1 and 2 are invariant
        let mut p = primates();
        assert_eq!(p.strip_invariant_sites(), 2);
        assert_eq!(p.pattern_weights(), &[1, 0, 0]);
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let grid = DMatrix::zeros(1, 2);
        let err = VersionedMatrix::new(vec!["x".into(), "x".into()], Arc::new(Binary), grid);
        assert!(matches!(err, Err(AlignmentError::Configuration(_))));
    }

    #[test]
    fn test_assign_from() {
        let mut a = scenario_matrix();
        let mut b = scenario_matrix();
        b.write_all(&DMatrix::from_element(3, 2, 1)).unwrap();
        a.write_cell(0, 0, 1).unwrap();

        a.assign_from(&b).unwrap();
        assert_eq!(a.grid(), b.grid());
        assert!(a.journal().is_empty());

        let other = VersionedMatrix::new(vec!["z".into()], Arc::new(Binary), DMatrix::zeros(3, 1)).unwrap();
        assert!(a.assign_from(&other).is_err());
    }
}
