//! LikelihoodCacheAdapter — pushes matrix changes into the engine's leaves
//!
//! The adapter owns the engine but never the matrix: every call that needs
//! matrix data borrows it. Leaf data is pushed only for units that may have
//! changed since the last sync, and the engine is told exactly which leaves
//! to recompute.

use super::{LeafId, LikelihoodEngine};
use crate::alignment::{resolve_dirty_units_since, DirtyUnits, VersionedMatrix};
use crate::datatype::{Code, DataType};
use crate::error::AlignmentError;
use log::{debug, warn};
use nalgebra::DVector;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// How observed codes are presented to the engine's leaves
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LeafEncoding {
    /// One state per site; ambiguous codes become the unknown state
    DiscreteStates,
    /// A per-state vector per site built from the ambiguity lookup
    Partials,
}

/// Adapter configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdapterConfig {
    pub leaf_encoding: LeafEncoding,
    /// Run the engine recursion as soon as restored leaves are re-pushed
    #[serde(default)]
    pub recompute_on_restore: bool,
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self::partials()
    }
}

impl AdapterConfig {
    pub fn discrete() -> Self {
        Self { leaf_encoding: LeafEncoding::DiscreteStates, recompute_on_restore: false }
    }

    /// Ambiguity-aware leaves
    pub fn partials() -> Self {
        Self { leaf_encoding: LeafEncoding::Partials, recompute_on_restore: false }
    }
}

/// Counters over the adapter's lifetime
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncStats {
    pub syncs: u64,
    pub leaves_pushed: u64,
    pub restores: u64,
    pub hypotheticals: u64,
}

/// Encoded observation for one leaf
enum LeafData {
    States(Vec<u32>),
    Partials(DVector<f64>),
}

pub struct LikelihoodCacheAdapter<E: LikelihoodEngine> {
    engine: E,
    config: AdapterConfig,
    data_type: Arc<dyn DataType>,
    site_count: usize,
    /// Leaf for each unit, `None` when the topology has no such taxon
    leaves: Vec<Option<LeafId>>,
    taxa: Vec<String>,
    /// Units to re-push regardless of the journal (set by `on_restore`)
    pending: DirtyUnits,
    /// Units whose leaf holds hypothetical data instead of matrix data
    scratch: DirtyUnits,
    /// Scratch units at the last `on_store`; the engine snapshot holds their hypothetical data
    stored_scratch: DirtyUnits,
    /// Journal generation and length already pushed
    synced: (u64, usize),
    stats: SyncStats,
}

impl<E: LikelihoodEngine> LikelihoodCacheAdapter<E> {
    /// Resolve every unit of `matrix` to a leaf of `engine`'s topology.
    ///
    /// Units without a leaf are tolerated until they need syncing.
    pub fn new(engine: E, config: AdapterConfig, matrix: &VersionedMatrix) -> Result<Self, AlignmentError> {
        let data_type = matrix.data_type().clone();
        if engine.state_count() != data_type.state_count() {
            return Err(AlignmentError::Configuration(format!(
                "engine has {} states but {} data has {}",
                engine.state_count(),
                data_type.name(),
                data_type.state_count()
            )));
        }

        let leaves: Vec<Option<LeafId>> = matrix
            .taxa()
            .iter()
            .map(|taxon| engine.leaf_for_taxon(taxon))
            .collect();
        for (taxon, leaf) in matrix.taxa().iter().zip(&leaves) {
            if leaf.is_none() {
                warn!("Unit '{}' has no leaf in the likelihood engine topology", taxon);
            }
        }

        Ok(Self {
            engine,
            config,
            data_type,
            site_count: matrix.site_count(),
            leaves,
            taxa: matrix.taxa().to_vec(),
            pending: DirtyUnits::new(),
            scratch: DirtyUnits::new(),
            stored_scratch: DirtyUnits::new(),
            synced: (matrix.journal().generation(), matrix.journal().len()),
            stats: SyncStats::default(),
        })
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }

    pub fn into_engine(self) -> E {
        self.engine
    }

    pub fn config(&self) -> &AdapterConfig {
        &self.config
    }

    pub fn stats(&self) -> &SyncStats {
        &self.stats
    }

    pub fn pending(&self) -> &DirtyUnits {
        &self.pending
    }

    pub fn leaf_for_unit(&self, unit: usize) -> Option<LeafId> {
        self.leaves.get(unit).copied().flatten()
    }

    /// Units that the next sync will push
    pub fn dirty_units(&self, matrix: &VersionedMatrix) -> DirtyUnits {
        let journal = matrix.journal();
        let start = if self.synced.0 == journal.generation() {
            self.synced.1.min(journal.len())
        } else {
            0
        };
        let mut dirty = resolve_dirty_units_since(journal, start, matrix.unit_count());
        dirty.extend(self.pending.iter().copied());
        dirty.extend(self.scratch.iter().copied());
        dirty
    }

    /// Push fresh leaf data for every dirty unit and mark those leaves dirty
    pub fn sync_dirty_leaves(&mut self, matrix: &VersionedMatrix) -> Result<DirtyUnits, AlignmentError> {
        let dirty = self.dirty_units(matrix);
        self.push_units(matrix, &dirty)?;
        self.pending.clear();
        self.scratch.clear();
        self.synced = (matrix.journal().generation(), matrix.journal().len());
        self.stats.syncs += 1;
        if !dirty.is_empty() {
            debug!("Synced {} dirty leaves", dirty.len());
        }
        Ok(dirty)
    }

    /// Push every unit, e.g. when the engine starts out empty
    pub fn sync_all_leaves(&mut self, matrix: &VersionedMatrix) -> Result<(), AlignmentError> {
        self.pending.extend(0..matrix.unit_count());
        self.sync_dirty_leaves(matrix).map(|_| ())
    }

    /// A speculative edit is about to be tried
    pub fn on_store(&mut self) {
        self.pending.clear();
        self.stored_scratch = self.scratch.clone();
    }

    /// The matrix was just rolled back; `undone` are the units it touched.
    ///
    /// The leaves still hold the discarded speculative values, so they are
    /// re-pushed right away. So are leaves that held hypothetical data when
    /// the transaction opened, since the engine's restore brings that back.
    pub fn on_restore(&mut self, matrix: &VersionedMatrix, undone: &DirtyUnits) -> Result<DirtyUnits, AlignmentError> {
        self.pending.extend(undone.iter().copied());
        self.pending.append(&mut self.stored_scratch);
        self.stats.restores += 1;
        let resynced = self.sync_dirty_leaves(matrix)?;
        if self.config.recompute_on_restore && !resynced.is_empty() {
            self.engine.recompute_up_tree();
        }
        Ok(resynced)
    }

    /// Per-site log likelihoods with `candidate` observed at `leaf`.
    ///
    /// The matrix and its journal are not involved. The leaf keeps the
    /// candidate data until the next sync pushes the matrix values back.
    pub fn evaluate_hypothetical_leaf(
        &mut self,
        leaf: LeafId,
        candidate: &[Code],
    ) -> Result<DVector<f64>, AlignmentError> {
        let unit = self
            .leaves
            .iter()
            .position(|l| *l == Some(leaf))
            .ok_or_else(|| AlignmentError::Configuration(format!("leaf {} is not mapped to any unit", leaf)))?;
        if candidate.len() != self.site_count {
            return Err(AlignmentError::shape("candidate", self.site_count, candidate.len()));
        }

        let data = self.encode(candidate);
        self.push_leaf(leaf, data);
        self.scratch.insert(unit);
        self.engine.recompute_up_tree();
        self.stats.hypotheticals += 1;
        Ok(self.engine.per_site_log_likelihoods())
    }

    fn push_units(&mut self, matrix: &VersionedMatrix, units: &DirtyUnits) -> Result<(), AlignmentError> {
        if matrix.unit_count() != self.leaves.len() || matrix.site_count() != self.site_count {
            return Err(AlignmentError::Configuration(format!(
                "matrix is {}x{} but the adapter was built for {}x{}",
                matrix.site_count(),
                matrix.unit_count(),
                self.site_count,
                self.leaves.len()
            )));
        }

        // resolve every leaf first so a bad mapping pushes nothing
        let mut targets = Vec::with_capacity(units.len());
        for &unit in units {
            let leaf = self.leaf_for_unit(unit).ok_or_else(|| {
                AlignmentError::Configuration(format!("unit '{}' has no leaf in the engine topology", self.taxa[unit]))
            })?;
            targets.push((unit, leaf));
        }

        for (unit, leaf) in targets {
            let codes: Vec<Code> = matrix.grid().column(unit).iter().copied().collect();
            let data = self.encode(&codes);
            self.push_leaf(leaf, data);
        }
        Ok(())
    }

    fn encode(&self, codes: &[Code]) -> LeafData {
        let state_count = self.data_type.state_count();
        match self.config.leaf_encoding {
            LeafEncoding::DiscreteStates => LeafData::States(
                codes
                    .iter()
                    .map(|&code| match self.data_type.canonical_states_for_code(code).as_slice() {
                        [state] => *state as u32,
                        _ => state_count as u32,
                    })
                    .collect(),
            ),
            LeafEncoding::Partials => {
                let mut partials = DVector::zeros(codes.len() * state_count);
                for (site, &code) in codes.iter().enumerate() {
                    let mask = self.data_type.ambiguity_states_for_code(code);
                    for (state, compatible) in mask.into_iter().enumerate() {
                        if compatible {
                            partials[site * state_count + state] = 1.0;
                        }
                    }
                }
                LeafData::Partials(partials)
            }
        }
    }

    fn push_leaf(&mut self, leaf: LeafId, data: LeafData) {
        match data {
            LeafData::States(states) => self.engine.set_leaf_discrete_states(leaf, &states),
            LeafData::Partials(partials) => self.engine.set_leaf_partials(leaf, &partials),
        }
        self.engine.mark_leaf_dirty(leaf);
        self.stats.leaves_pushed += 1;
    }
}
