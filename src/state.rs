//! SearchState — the single owner of the matrix and its likelihood cache
//!
//! One proposal at a time: `store`, edit through `matrix_mut`, evaluate
//! with `log_likelihood`, then `accept` or `reject`. The adapter never
//! holds the matrix; the state lends it on every call.

use crate::alignment::{DirtyUnits, VersionedMatrix};
use crate::datatype::Code;
use crate::error::AlignmentError;
use crate::likelihood::{AdapterConfig, LikelihoodCacheAdapter, LikelihoodEngine};
use log::debug;
use nalgebra::DVector;
use serde::{Deserialize, Serialize};

/// Outcome counters for a search run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StateStats {
    pub proposals: u64,
    pub accepted: u64,
    pub rejected: u64,
}

impl StateStats {
    pub fn acceptance_rate(&self) -> f64 {
        if self.proposals == 0 {
            0.0
        } else {
            self.accepted as f64 / self.proposals as f64
        }
    }
}

pub struct SearchState<E: LikelihoodEngine> {
    matrix: VersionedMatrix,
    adapter: LikelihoodCacheAdapter<E>,
    stats: StateStats,
}

impl<E: LikelihoodEngine> SearchState<E> {
    /// Load every leaf into `engine` and compute the starting likelihood
    pub fn new(matrix: VersionedMatrix, engine: E, config: AdapterConfig) -> Result<Self, AlignmentError> {
        let mut adapter = LikelihoodCacheAdapter::new(engine, config, &matrix)?;
        adapter.sync_all_leaves(&matrix)?;
        adapter.engine_mut().recompute_up_tree();
        Ok(Self {
            matrix,
            adapter,
            stats: StateStats::default(),
        })
    }

    pub fn matrix(&self) -> &VersionedMatrix {
        &self.matrix
    }

    /// Edits made here are journaled and undone by [`SearchState::reject`]
    pub fn matrix_mut(&mut self) -> &mut VersionedMatrix {
        &mut self.matrix
    }

    pub fn adapter(&self) -> &LikelihoodCacheAdapter<E> {
        &self.adapter
    }

    pub fn adapter_mut(&mut self) -> &mut LikelihoodCacheAdapter<E> {
        &mut self.adapter
    }

    pub fn engine(&self) -> &E {
        self.adapter.engine()
    }

    pub fn stats(&self) -> &StateStats {
        &self.stats
    }

    /// Open a transaction
    pub fn store(&mut self) {
        self.stats.proposals += 1;
        self.adapter.on_store();
        self.adapter.engine_mut().store();
    }

    /// Bring the cache up to date with the matrix and sum the per-site
    /// terms, each scaled by its site's pattern weight
    pub fn log_likelihood(&mut self) -> Result<f64, AlignmentError> {
        self.adapter.sync_dirty_leaves(&self.matrix)?;
        self.adapter.engine_mut().recompute_up_tree();
        self.matrix.weighted_sum(&self.adapter.engine().per_site_log_likelihoods())
    }

    /// Keep the open transaction's edits.
    ///
    /// Leaves are synced before the journal is dropped, so edits that were
    /// never evaluated still reach the engine.
    pub fn accept(&mut self) -> Result<(), AlignmentError> {
        self.adapter.sync_dirty_leaves(&self.matrix)?;
        self.stats.accepted += 1;
        self.matrix.commit();
        self.adapter.engine_mut().accept();
        Ok(())
    }

    /// Discard the open transaction's edits and re-push the affected leaves
    pub fn reject(&mut self) -> Result<DirtyUnits, AlignmentError> {
        self.stats.rejected += 1;
        let undone = self.matrix.rollback();
        self.adapter.engine_mut().restore();
        let resynced = self.adapter.on_restore(&self.matrix, &undone)?;
        debug!("Rejected proposal, {} leaves re-pushed", resynced.len());
        Ok(undone)
    }

    /// What-if evaluation of `unit` holding `candidate`, leaving the matrix alone
    pub fn evaluate_hypothetical(&mut self, unit: usize, candidate: &[Code]) -> Result<DVector<f64>, AlignmentError> {
        let leaf = self.adapter.leaf_for_unit(unit).ok_or_else(|| {
            AlignmentError::Configuration(format!("unit {} has no leaf in the engine topology", unit))
        })?;
        self.adapter.evaluate_hypothetical_leaf(leaf, candidate)
    }

    pub fn into_parts(self) -> (VersionedMatrix, E) {
        (self.matrix, self.adapter.into_engine())
    }
}
