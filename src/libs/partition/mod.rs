//! Partial-likelihood engine over one alignment partition.
//!
//! A [`Partition`] owns every buffer needed to evaluate Felsenstein's pruning
//! algorithm on a fixed topology: tip states, conditional likelihood vectors
//! (CLVs), per-site scalers, probability matrices and model parameters.
//!
//! Buffers are addressed by index. Tips occupy `[0, tips)`, internal CLVs
//! `[tips, tips + clv_buffers)`. The tree itself is never stored; the caller
//! supplies a post-order sequence of [`Operation`]s.
//!
//! An internal CLV goes stale when anything it was computed from changes: a
//! tip, a matrix slot or a buffer it read, directly or further down. Model
//! and category-rate changes stale every internal CLV.
//!
//! ```
//! use plk::libs::maps::StateMap;
//! use plk::libs::partition::{Attributes, Dimensions, Operation, Partition};
//!
//! let dims = Dimensions {
//!     tips: 3,
//!     clv_buffers: 1,
//!     states: 4,
//!     sites: 5,
//!     rate_matrices: 1,
//!     prob_matrices: 2,
//!     rate_cats: 1,
//! };
//! let mut partition = Partition::new(dims, Attributes::default()).unwrap();
//!
//! let map = StateMap::nt();
//! partition.set_tip_states(0, &map, "ACGTA").unwrap();
//! partition.set_tip_states(1, &map, "ACGTT").unwrap();
//! partition.set_tip_states(2, &map, "ACG-N").unwrap();
//!
//! partition.update_prob_matrices(0, &[0, 1], &[0.1, 0.2]).unwrap();
//! partition.update_partials(&[Operation::new(3, 0, 0, 1, 0)]).unwrap();
//!
//! let lnl = partition.compute_edge_log_likelihood(3, 2, 0, 1).unwrap();
//! assert!(lnl.is_finite() && lnl < 0.0);
//! ```

mod clv;
mod likelihood;
mod lineage;
mod model;
mod pmatrix;
mod show;
mod tip;


pub use model::{ModelState, SubstModel};
pub use tip::TipState;

use crate::libs::error::{Diagnostic, PartitionError, Result};
use lineage::Lineage;
use crate::libs::maps::StateSet;
use std::collections::HashMap;

/// Sizes fixed for the lifetime of a partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    /// Number of tips, T
    pub tips: usize,
    /// Number of internal CLV buffers, C
    pub clv_buffers: usize,
    /// Number of states, S (2..=64)
    pub states: usize,
    /// Number of sites (patterns), L
    pub sites: usize,
    /// Number of substitution models, M
    pub rate_matrices: usize,
    /// Number of probability-matrix slots, K
    pub prob_matrices: usize,
    /// Number of rate categories, R
    pub rate_cats: usize,
}

impl Dimensions {
    /// Entries of one CLV buffer: L·R·S
    pub fn clv_len(&self) -> usize {
        self.sites * self.rate_cats * self.states
    }

    /// Entries of one probability-matrix slot: M·R·S·S
    pub fn pmatrix_len(&self) -> usize {
        self.rate_matrices * self.rate_cats * self.states * self.states
    }

    /// Total number of addressable buffers, T + C
    pub fn buffers(&self) -> usize {
        self.tips + self.clv_buffers
    }

    fn validate(&self) -> Result<()> {
        let checks = [
            (self.tips >= 1, "at least one tip is required"),
            (self.states >= 2, "at least two states are required"),
            (self.states <= 64, "at most 64 states are supported"),
            (self.sites >= 1, "at least one site is required"),
            (self.rate_matrices >= 1, "at least one rate matrix is required"),
            (self.prob_matrices >= 1, "at least one probability matrix is required"),
            (self.rate_cats >= 1, "at least one rate category is required"),
        ];
        for (ok, message) in checks {
            if !ok {
                return Err(PartitionError::InvalidDimensions(message.to_string()));
            }
        }

        let too_large = self
            .sites
            .checked_mul(self.rate_cats)
            .and_then(|n| n.checked_mul(self.states))
            .and_then(|n| n.checked_mul(self.clv_buffers.max(1)))
            .is_none()
            || self
                .rate_matrices
                .checked_mul(self.rate_cats)
                .and_then(|n| n.checked_mul(self.states * self.states))
                .and_then(|n| n.checked_mul(self.prob_matrices))
                .is_none();
        if too_large {
            return Err(PartitionError::InvalidDimensions(
                "buffer sizes overflow".to_string(),
            ));
        }

        Ok(())
    }
}

/// Optional behaviour selected at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Attributes {
    /// Rescale CLVs that approach underflow and correct the log-likelihood.
    pub scaling: bool,
}

impl Default for Attributes {
    fn default() -> Self {
        Self { scaling: true }
    }
}

/// One pruning step: `parent = (P[child1_matrix]·child1) ⊙ (P[child2_matrix]·child2)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Operation {
    pub parent: usize,
    pub child1: usize,
    pub child1_matrix: usize,
    pub child2: usize,
    pub child2_matrix: usize,
}

impl Operation {
    pub fn new(
        parent: usize,
        child1: usize,
        child1_matrix: usize,
        child2: usize,
        child2_matrix: usize,
    ) -> Self {
        Self {
            parent,
            child1,
            child1_matrix,
            child2,
            child2_matrix,
        }
    }
}

#[derive(Debug)]
pub struct Partition {
    dims: Dimensions,
    attrs: Attributes,

    models: Vec<SubstModel>,
    rates: Vec<f64>,
    weights: Vec<f64>,
    pattern_weights: Vec<u32>,

    /// Encoded tip sequences, `None` until set
    tips: Vec<Option<Vec<TipState>>>,
    /// Ambiguity masks expanded to indicator vectors, filled when a tip is set
    indicators: HashMap<StateSet, Vec<f64>>,

    /// Internal CLVs, indexed by `buffer - tips`
    clvs: Vec<Vec<f64>>,
    /// Cumulative scale counts per internal buffer and site
    scalers: Vec<Vec<u32>>,
    lineage: Lineage,

    /// Probability matrices per slot, laid out as [model][category][row][col]
    pmatrices: Vec<Vec<f64>>,
    /// Validity per slot and model
    pmatrix_valid: Vec<Vec<bool>>,

    diagnostics: Vec<Diagnostic>,
}

impl Partition {
    /// Allocate a partition. Models start with equal exchangeabilities and
    /// uniform frequencies, categories with rate 1 and weight 1/R, patterns
    /// with weight 1.
    pub fn new(dims: Dimensions, attrs: Attributes) -> Result<Self> {
        dims.validate()?;

        let models = (0..dims.rate_matrices)
            .map(|m| SubstModel::new(m, dims.states))
            .collect();

        let partition = Self {
            dims,
            attrs,
            models,
            rates: vec![1.0; dims.rate_cats],
            weights: vec![1.0 / dims.rate_cats as f64; dims.rate_cats],
            pattern_weights: vec![1; dims.sites],
            tips: vec![None; dims.tips],
            indicators: HashMap::new(),
            clvs: vec![vec![0.0; dims.clv_len()]; dims.clv_buffers],
            scalers: vec![vec![0; dims.sites]; dims.clv_buffers],
            lineage: Lineage::new(dims.tips, dims.buffers()),
            pmatrices: vec![vec![0.0; dims.pmatrix_len()]; dims.prob_matrices],
            pmatrix_valid: vec![vec![false; dims.rate_matrices]; dims.prob_matrices],
            diagnostics: Vec::new(),
        };

        tracing::debug!(
            tips = dims.tips,
            clv_buffers = dims.clv_buffers,
            states = dims.states,
            sites = dims.sites,
            rate_cats = dims.rate_cats,
            "partition created"
        );

        Ok(partition)
    }

    pub fn dims(&self) -> &Dimensions {
        &self.dims
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attrs
    }

    // --- Model configuration ---

    /// Set the S·(S-1)/2 exchangeabilities of `model` (upper triangle, row-major).
    pub fn set_subst_params(&mut self, model: usize, exchangeabilities: &[f64]) -> Result<()> {
        check_index("model", model, self.dims.rate_matrices)?;
        self.models[model].set_exchangeabilities(exchangeabilities)?;
        self.invalidate_model(model);
        Ok(())
    }

    /// Set the equilibrium frequencies of `model`.
    ///
    /// Frequencies are used as given. A sum deviating from 1 by more than
    /// 1e-10 is reported through [`Partition::diagnostics`] and a warning log,
    /// without failing.
    pub fn set_frequencies(&mut self, model: usize, frequencies: &[f64]) -> Result<()> {
        check_index("model", model, self.dims.rate_matrices)?;
        if let Some(diagnostic) = self.models[model].set_frequencies(frequencies)? {
            tracing::warn!("{}", diagnostic);
            self.diagnostics.push(diagnostic);
        }
        self.invalidate_model(model);
        Ok(())
    }

    /// Set the R category rates, e.g. from
    /// [`compute_gamma_categories`](crate::libs::gamma::compute_gamma_categories).
    pub fn set_category_rates(&mut self, rates: &[f64]) -> Result<()> {
        if rates.len() != self.dims.rate_cats {
            return Err(PartitionError::InvalidArgument(format!(
                "expected {} category rates, got {}",
                self.dims.rate_cats,
                rates.len()
            )));
        }
        if let Some(bad) = rates.iter().find(|r| !(r.is_finite() && **r >= 0.0)) {
            return Err(PartitionError::InvalidArgument(format!(
                "invalid category rate {}",
                bad
            )));
        }

        self.rates.copy_from_slice(rates);
        for valid in self.pmatrix_valid.iter_mut() {
            valid.fill(false);
        }
        self.invalidate_clvs();
        Ok(())
    }

    /// Set the R category weights. They are rescaled to sum to 1.
    pub fn set_category_weights(&mut self, weights: &[f64]) -> Result<()> {
        if weights.len() != self.dims.rate_cats {
            return Err(PartitionError::InvalidArgument(format!(
                "expected {} category weights, got {}",
                self.dims.rate_cats,
                weights.len()
            )));
        }
        let sum: f64 = weights.iter().sum();
        if weights.iter().any(|w| !(w.is_finite() && *w >= 0.0)) || !(sum > 0.0) {
            return Err(PartitionError::InvalidArgument(format!(
                "category weights must be non-negative with a positive sum: {:?}",
                weights
            )));
        }

        for (dst, w) in self.weights.iter_mut().zip(weights) {
            *dst = w / sum;
        }
        Ok(())
    }

    /// Set the multiplicity of each site pattern.
    pub fn set_pattern_weights(&mut self, weights: &[u32]) -> Result<()> {
        if weights.len() != self.dims.sites {
            return Err(PartitionError::InvalidArgument(format!(
                "expected {} pattern weights, got {}",
                self.dims.sites,
                weights.len()
            )));
        }
        self.pattern_weights.copy_from_slice(weights);
        Ok(())
    }

    pub fn model(&self, model: usize) -> Option<&SubstModel> {
        self.models.get(model)
    }

    pub fn category_rates(&self) -> &[f64] {
        &self.rates
    }

    pub fn category_weights(&self) -> &[f64] {
        &self.weights
    }

    pub fn pattern_weights(&self) -> &[u32] {
        &self.pattern_weights
    }

    /// Warnings collected so far
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Drain collected warnings
    pub fn take_diagnostics(&mut self) -> Vec<Diagnostic> {
        std::mem::take(&mut self.diagnostics)
    }

    /// Whether `buffer` currently holds usable data
    pub fn is_valid(&self, buffer: usize) -> bool {
        self.lineage.is_valid(buffer)
    }

    // --- Internal helpers ---

    /// Model used by rate category `category`
    fn model_of(&self, category: usize) -> usize {
        category % self.dims.rate_matrices
    }

    /// Models referenced by at least one category
    fn models_in_use(&self) -> std::ops::Range<usize> {
        0..self.dims.rate_matrices.min(self.dims.rate_cats)
    }

    fn invalidate_model(&mut self, model: usize) {
        for valid in self.pmatrix_valid.iter_mut() {
            valid[model] = false;
        }
        self.invalidate_clvs();
    }

    fn invalidate_clvs(&mut self) {
        self.lineage.invalidate_internal();
    }
}

fn check_index(kind: &'static str, index: usize, limit: usize) -> Result<()> {
    if index < limit {
        Ok(())
    } else {
        Err(PartitionError::IndexOutOfRange { kind, index, limit })
    }
}
