//! Local storage for committed matrices
//!
//! Snapshots are JSON documents carrying the codes plus a SHA256
//! fingerprint that is checked again on load.

use crate::alignment::VersionedMatrix;
use crate::datatype::{data_type_by_name, Code};
use crate::error::AlignmentError;
use chrono::{DateTime, Utc};
use log::info;
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlignmentSnapshot {
    pub id: String,
    pub data_type: String,
    pub taxa: Vec<String>,
    /// Site-major: `rows[site][unit]`
    pub rows: Vec<Vec<Code>>,
    /// Per-site pattern weights; absent means all ones
    #[serde(default)]
    pub pattern_weights: Vec<u32>,
    pub fingerprint: String,
    pub saved_at: DateTime<Utc>,
}

impl AlignmentSnapshot {
    /// Capture a matrix; refuses while edits are still uncommitted
    pub fn from_matrix(matrix: &VersionedMatrix) -> Result<Self, AlignmentError> {
        if !matrix.journal().is_empty() {
            return Err(AlignmentError::Configuration(format!(
                "'{}' has {} uncommitted edits",
                matrix.id(),
                matrix.journal().len()
            )));
        }
        let rows = (0..matrix.site_count())
            .map(|site| matrix.grid().row(site).iter().copied().collect())
            .collect();
        Ok(Self {
            id: matrix.id().to_string(),
            data_type: matrix.data_type().name().to_string(),
            taxa: matrix.taxa().to_vec(),
            rows,
            pattern_weights: matrix.pattern_weights().to_vec(),
            fingerprint: matrix.fingerprint(),
            saved_at: Utc::now(),
        })
    }

    pub fn into_matrix(self) -> Result<VersionedMatrix, AlignmentError> {
        let data_type = data_type_by_name(&self.data_type).ok_or_else(|| {
            AlignmentError::Configuration(format!("unknown data type '{}'", self.data_type))
        })?;
        let site_count = self.rows.len();
        let unit_count = self.taxa.len();
        if let Some(row) = self.rows.iter().find(|r| r.len() != unit_count) {
            return Err(AlignmentError::shape("snapshot row", unit_count, row.len()));
        }
        let flat: Vec<Code> = self.rows.concat();
        let grid = DMatrix::from_row_slice(site_count, unit_count, &flat);
        let mut matrix = VersionedMatrix::new(self.taxa, data_type, grid)?.with_id(self.id);
        if !self.pattern_weights.is_empty() {
            matrix.set_site_weights(&self.pattern_weights)?;
        }
        if matrix.fingerprint() != self.fingerprint {
            return Err(AlignmentError::Configuration(format!(
                "fingerprint mismatch for '{}'",
                matrix.id()
            )));
        }
        Ok(matrix)
    }
}

/// A single snapshot file on disk
pub struct AlignmentStore {
    pub path: PathBuf,
}

impl AlignmentStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self { path: path.as_ref().to_path_buf() }
    }

    pub fn save(&self, matrix: &VersionedMatrix) -> Result<AlignmentSnapshot, AlignmentError> {
        let snapshot = AlignmentSnapshot::from_matrix(matrix)?;
        let json = serde_json::to_string_pretty(&snapshot)?;
        std::fs::write(&self.path, json)?;
        info!("Saved '{}' to {}", snapshot.id, self.path.display());
        Ok(snapshot)
    }

    pub fn load(&self) -> Result<VersionedMatrix, AlignmentError> {
        let json = std::fs::read_to_string(&self.path)?;
        let snapshot: AlignmentSnapshot = serde_json::from_str(&json)?;
        let matrix = snapshot.into_matrix()?;
        info!("Loaded {} from {}", matrix.summary(), self.path.display());
        Ok(matrix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datatype::Nucleotide;
    use std::sync::Arc;
    use uuid::Uuid;

    fn matrix() -> VersionedMatrix {
        VersionedMatrix::from_sequences(
            Arc::new(Nucleotide),
            &[("human", "AGA"), ("chimp", "ARA"), ("siamang", "TG-")],
        )
        .unwrap()
    }

    #[test]
    fn test_save_and_load() {
        let path = std::env::temp_dir().join(format!("mutalign-{}.json", Uuid::new_v4()));
        let store = AlignmentStore::new(&path);
        let mut m = matrix();
        m.write_cell(2, 0, 3).unwrap();
        m.commit();
        m.set_site_weights(&[4, 0, 1]).unwrap();

        let snapshot = store.save(&m).unwrap();
        assert_eq!(snapshot.rows.len(), 3);

        let loaded = store.load().unwrap();
        assert_eq!(loaded.grid(), m.grid());
        assert_eq!(loaded.taxa(), m.taxa());
        assert_eq!(loaded.id(), m.id());
        assert_eq!(loaded.pattern_weights(), &[4, 0, 1]);
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_uncommitted_edits_refused() {
        let mut m = matrix();
        m.write_cell(0, 0, 1).unwrap();
        assert!(matches!(
            AlignmentSnapshot::from_matrix(&m),
            Err(AlignmentError::Configuration(_))
        ));
    }

    #[test]
    fn test_snapshot_without_weights_defaults_to_ones() {
        let mut value = serde_json::to_value(AlignmentSnapshot::from_matrix(&matrix()).unwrap()).unwrap();
        value.as_object_mut().unwrap().remove("pattern_weights");
        let snapshot: AlignmentSnapshot = serde_json::from_value(value).unwrap();
        assert_eq!(snapshot.into_matrix().unwrap().pattern_weights(), &[1, 1, 1]);
    }

    #[test]
    fn test_out_of_alphabet_snapshot_rejected() {
        let mut snapshot = AlignmentSnapshot::from_matrix(&matrix()).unwrap();
        snapshot.rows[0][0] = 99;
        assert!(matches!(snapshot.into_matrix(), Err(AlignmentError::Code { code: 99, .. })));
    }

    #[test]
    fn test_tampered_snapshot_rejected() {
        let mut snapshot = AlignmentSnapshot::from_matrix(&matrix()).unwrap();
        snapshot.rows[0][0] = 2;
        assert!(snapshot.into_matrix().is_err());
    }
}
