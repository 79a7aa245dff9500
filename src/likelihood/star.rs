//! StarTreeEngine — a small reference engine behind [`LikelihoodEngine`]
//!
//! Every leaf hangs directly off the root with its own branch length, and
//! substitutions follow the Jukes–Cantor model over `state_count` states
//! with uniform root frequencies. Each leaf caches its contribution
//! `L_leaf[site, r] = Σ_s P_t(r → s) · obs[site, s]`; recomputation only
//! refreshes leaves marked dirty before combining them at the root.
//!
//! Being a reference engine it trusts its caller: leaf ids must come from
//! `leaf_for_taxon`, and pushed data must cover `site_count` sites.

use super::{LeafId, LikelihoodEngine};
use nalgebra::{DMatrix, DVector};
use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct StarTreeEngine {
    leaf_index: HashMap<String, LeafId>,
    state_count: usize,
    site_count: usize,
    /// Per-leaf transition matrices P(t)
    transitions: Vec<DMatrix<f64>>,
    /// Per-leaf observations, site × state
    observations: Vec<DMatrix<f64>>,
    /// Per-leaf cached contributions, site × root state
    contributions: Vec<DMatrix<f64>>,
    dirty: Vec<bool>,
    site_log_likelihoods: DVector<f64>,
    stored: Option<(Vec<DMatrix<f64>>, DVector<f64>)>,
    leaf_recomputations: u64,
}

impl StarTreeEngine {
    /// One leaf per taxon (leaf ids follow `taxa` order), all with the same branch length
    pub fn new(taxa: &[String], state_count: usize, site_count: usize, branch_length: f64) -> Self {
        Self::with_branch_lengths(taxa, state_count, site_count, &vec![branch_length; taxa.len()])
    }

    /// # Panics
    ///
    /// Panics if `branch_lengths` does not hold one entry per taxon.
    pub fn with_branch_lengths(
        taxa: &[String],
        state_count: usize,
        site_count: usize,
        branch_lengths: &[f64],
    ) -> Self {
        assert_eq!(taxa.len(), branch_lengths.len(), "one branch length per leaf");
        let leaf_count = taxa.len();
        let leaf_index = taxa.iter().enumerate().map(|(i, t)| (t.clone(), i)).collect();
        let transitions = branch_lengths
            .iter()
            .map(|&t| jukes_cantor(state_count, t))
            .collect();
        Self {
            leaf_index,
            state_count,
            site_count,
            transitions,
            observations: vec![DMatrix::from_element(site_count, state_count, 1.0); leaf_count],
            contributions: vec![DMatrix::from_element(site_count, state_count, 1.0); leaf_count],
            dirty: vec![true; leaf_count],
            site_log_likelihoods: DVector::zeros(site_count),
            stored: None,
            leaf_recomputations: 0,
        }
    }

    pub fn leaf_count(&self) -> usize {
        self.observations.len()
    }

    /// How many leaf contributions have been recomputed so far
    pub fn leaf_recomputations(&self) -> u64 {
        self.leaf_recomputations
    }

    /// False for leaf ids the topology does not have
    pub fn is_leaf_dirty(&self, leaf: LeafId) -> bool {
        self.dirty.get(leaf).copied().unwrap_or(false)
    }

    pub fn total_log_likelihood(&self) -> f64 {
        self.site_log_likelihoods.sum()
    }
}

/// Jukes–Cantor transition probabilities for branch length `t`
fn jukes_cantor(state_count: usize, t: f64) -> DMatrix<f64> {
    if state_count < 2 {
        return DMatrix::identity(state_count, state_count);
    }
    let k = state_count as f64;
    let decay = (-k / (k - 1.0) * t).exp();
    let same = 1.0 / k + (k - 1.0) / k * decay;
    let diff = 1.0 / k - 1.0 / k * decay;
    DMatrix::from_fn(state_count, state_count, |r, s| if r == s { same } else { diff })
}

impl LikelihoodEngine for StarTreeEngine {
    fn leaf_for_taxon(&self, taxon: &str) -> Option<LeafId> {
        self.leaf_index.get(taxon).copied()
    }

    fn state_count(&self) -> usize {
        self.state_count
    }

    fn set_leaf_discrete_states(&mut self, leaf: LeafId, states: &[u32]) {
        let k = self.state_count;
        let obs = &mut self.observations[leaf];
        for (site, &state) in states.iter().enumerate().take(self.site_count) {
            for s in 0..k {
                // a state outside the model is unknown: compatible with all
                obs[(site, s)] = if state as usize >= k || state as usize == s { 1.0 } else { 0.0 };
            }
        }
    }

    /// Panics if `leaf` is unknown or `partials` is shorter than
    /// `site_count * state_count`.
    fn set_leaf_partials(&mut self, leaf: LeafId, partials: &DVector<f64>) {
        let k = self.state_count;
        let obs = &mut self.observations[leaf];
        for site in 0..self.site_count {
            for s in 0..k {
                obs[(site, s)] = partials[site * k + s];
            }
        }
    }

    fn mark_leaf_dirty(&mut self, leaf: LeafId) {
        self.dirty[leaf] = true;
    }

    fn recompute_up_tree(&mut self) {
        for leaf in 0..self.leaf_count() {
            if self.dirty[leaf] {
                // P is symmetric, so obs · P gives Σ_s P(r → s) obs[s] per root state r
                self.contributions[leaf] = &self.observations[leaf] * &self.transitions[leaf];
                self.dirty[leaf] = false;
                self.leaf_recomputations += 1;
            }
        }

        let root_freq = 1.0 / self.state_count as f64;
        for site in 0..self.site_count {
            let mut site_likelihood = 0.0;
            for r in 0..self.state_count {
                let product: f64 = self.contributions.iter().map(|c| c[(site, r)]).product();
                site_likelihood += root_freq * product;
            }
            self.site_log_likelihoods[site] = site_likelihood.ln();
        }
    }

    fn per_site_log_likelihoods(&self) -> DVector<f64> {
        self.site_log_likelihoods.clone()
    }

    fn store(&mut self) {
        self.stored = Some((self.contributions.clone(), self.site_log_likelihoods.clone()));
    }

    fn restore(&mut self) {
        if let Some((contributions, site_log_likelihoods)) = self.stored.take() {
            self.contributions = contributions;
            self.site_log_likelihoods = site_log_likelihoods;
        }
    }

    fn accept(&mut self) {
        self.stored = None;
    }
}
