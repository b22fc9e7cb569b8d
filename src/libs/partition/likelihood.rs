use super::clv::LN_SCALE_FACTOR;
use super::{check_index, Partition};
use crate::libs::error::{PartitionError, Result};
use rayon::prelude::*;

impl Partition {
    /// Log-likelihood of the tree evaluated across the edge joining `left`
    /// and `right`, whose two halves carry the matrices `left_matrix` and
    /// `right_matrix`.
    ///
    /// Any edge gives the same value once every CLV points towards it.
    pub fn compute_edge_log_likelihood(
        &self,
        left: usize,
        right: usize,
        left_matrix: usize,
        right_matrix: usize,
    ) -> Result<f64> {
        let sites = self.site_log_likelihoods(left, right, left_matrix, right_matrix)?;
        let lnl = sites
            .iter()
            .zip(self.pattern_weights.iter())
            .map(|(l, &w)| w as f64 * l)
            .sum();
        Ok(lnl)
    }

    /// Per-site log-likelihoods (scaling corrected, not pattern-weighted).
    pub fn site_log_likelihoods(
        &self,
        left: usize,
        right: usize,
        left_matrix: usize,
        right_matrix: usize,
    ) -> Result<Vec<f64>> {
        let buffers = self.dims.buffers();
        check_index("buffer", left, buffers)?;
        check_index("buffer", right, buffers)?;
        check_index("matrix slot", left_matrix, self.dims.prob_matrices)?;
        check_index("matrix slot", right_matrix, self.dims.prob_matrices)?;
        if left == right {
            return Err(PartitionError::InvalidArgument(format!(
                "edge endpoints must differ, got {} twice",
                left
            )));
        }
        for buffer in [left, right] {
            if !self.is_valid(buffer) {
                return Err(PartitionError::StaleOperand {
                    operation: 0,
                    buffer,
                });
            }
        }
        self.check_matrices(0, &[left_matrix, right_matrix])?;

        let raw = self.edge_site_likelihoods(left, right, left_matrix, right_matrix);

        raw.into_iter()
            .enumerate()
            .map(|(site, (value, scale))| {
                if value.is_finite() && value > 0.0 {
                    Ok(value.ln() - scale as f64 * LN_SCALE_FACTOR)
                } else {
                    Err(PartitionError::DegenerateLikelihood { site, value })
                }
            })
            .collect()
    }

    /// Site likelihoods together with the summed scaler of both ends
    fn edge_site_likelihoods(
        &self,
        left: usize,
        right: usize,
        left_matrix: usize,
        right_matrix: usize,
    ) -> Vec<(f64, u32)> {
        let s = self.dims.states;
        let rate_cats = self.dims.rate_cats;
        let a = self.operand(left);
        let b = self.operand(right);

        (0..self.dims.sites)
            .into_par_iter()
            .map_init(
                || (vec![0.0; s], vec![0.0; s]),
                |(x, y), site| {
                    let mut total = 0.0;
                    for cat in 0..rate_cats {
                        let pi = self.models[self.model_of(cat)].frequencies();
                        let pl = self.pmatrix_block(left_matrix, cat);
                        let pr = self.pmatrix_block(right_matrix, cat);
                        self.propagate(&a, pl, site, cat, x);
                        self.propagate(&b, pr, site, cat, y);
                        let term: f64 = pi
                            .iter()
                            .zip(x.iter().zip(y.iter()))
                            .map(|(p, (u, v))| p * u * v)
                            .sum();
                        total += self.weights[cat] * term;
                    }
                    (total, a.scale(site) + b.scale(site))
                },
            )
            .collect()
    }
}
