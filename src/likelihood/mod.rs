//! Likelihood boundary — keeping an external tree-likelihood cache in step
//!
//! The engine that owns the tree recursion is opaque here. The crate only
//! relies on the narrow set of calls in [`LikelihoodEngine`]: push leaf
//! data, mark a leaf dirty, recompute, read back per-site log likelihoods.

mod adapter;
mod star;

pub use adapter::{AdapterConfig, LeafEncoding, LikelihoodCacheAdapter, SyncStats};
pub use star::StarTreeEngine;

use nalgebra::DVector;

/// Identity of a leaf node in the engine's topology
pub type LeafId = usize;

/// Boundary calls into an external tree-likelihood engine
pub trait LikelihoodEngine {
    /// Leaf carrying the named taxon, if the topology has one
    fn leaf_for_taxon(&self, taxon: &str) -> Option<LeafId>;

    /// Number of model states; also the "unknown" sentinel for discrete states
    fn state_count(&self) -> usize;

    /// One state per site; `state_count()` means unknown
    fn set_leaf_discrete_states(&mut self, leaf: LeafId, states: &[u32]);

    /// Site-major partials, `site_count * state_count()` entries
    fn set_leaf_partials(&mut self, leaf: LeafId, partials: &DVector<f64>);

    fn mark_leaf_dirty(&mut self, leaf: LeafId);

    /// Run the engine's own recursion over whatever is marked dirty
    fn recompute_up_tree(&mut self);

    /// One entry per pattern (every site is its own pattern here)
    fn per_site_log_likelihoods(&self) -> DVector<f64>;

    fn store(&mut self) {}

    fn restore(&mut self) {}

    fn accept(&mut self) {}
}
