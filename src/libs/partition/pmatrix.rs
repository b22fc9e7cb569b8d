use super::{check_index, Partition};
use crate::libs::error::{PartitionError, Result};
use nalgebra::DMatrix;

impl Partition {
    /// Compute `P(r·t) = exp(Q·r·t)` of `model` for every rate category and
    /// store it into each of `slots`, with `t` taken from `lengths`.
    ///
    /// The update is all-or-nothing: every matrix is computed into scratch
    /// space first, and nothing is stored if any entry turns out non-finite.
    /// A zero branch length gives the identity exactly. CLVs computed through
    /// one of `slots` go stale, together with the CLVs computed from them.
    pub fn update_prob_matrices(
        &mut self,
        model: usize,
        slots: &[usize],
        lengths: &[f64],
    ) -> Result<()> {
        check_index("model", model, self.dims.rate_matrices)?;
        if slots.len() != lengths.len() {
            return Err(PartitionError::InvalidArgument(format!(
                "{} matrix slots but {} branch lengths",
                slots.len(),
                lengths.len()
            )));
        }
        for (&slot, &length) in slots.iter().zip(lengths) {
            check_index("matrix slot", slot, self.dims.prob_matrices)?;
            if length.is_nan() || length < 0.0 {
                return Err(PartitionError::InvalidBranchLength { slot, length });
            }
        }

        self.models[model].decompose()?;

        let s = self.dims.states;
        let block = self.dims.rate_cats * s * s;
        let mut scratch = vec![0.0; slots.len() * block];

        {
            let (values, v, v_inv) = self.models[model]
                .eigen()
                .ok_or(PartitionError::SingularRateMatrix { model })?;

            for (i, (&slot, &length)) in slots.iter().zip(lengths).enumerate() {
                for (cat, &rate) in self.rates.iter().enumerate() {
                    let out = &mut scratch[i * block + cat * s * s..][..s * s];
                    let t = rate * length;
                    if t == 0.0 {
                        identity(out, s);
                        continue;
                    }
                    if !t.is_finite() || !exponentiate(out, values, v, v_inv, t) {
                        return Err(PartitionError::NumericOverflow {
                            slot,
                            category: cat,
                        });
                    }
                }
            }
        }

        for (i, &slot) in slots.iter().enumerate() {
            let offset = model * block;
            self.pmatrices[slot][offset..offset + block]
                .copy_from_slice(&scratch[i * block..(i + 1) * block]);
            self.pmatrix_valid[slot][model] = true;
        }
        self.lineage.invalidate_slots(slots);

        tracing::trace!(model, slots = ?slots, "probability matrices updated");
        Ok(())
    }

    /// Every matrix stored in `slot`: M·R·S·S values laid out as
    /// [model][category][row][col]. Entries of models never computed for the
    /// slot are zero.
    pub fn prob_matrix(&self, slot: usize) -> Result<&[f64]> {
        check_index("matrix slot", slot, self.dims.prob_matrices)?;
        Ok(&self.pmatrices[slot])
    }

    /// The S·S matrix of `slot` for `category` (under model `category % M`),
    /// row-major.
    pub fn category_matrix(&self, slot: usize, category: usize) -> Result<&[f64]> {
        check_index("matrix slot", slot, self.dims.prob_matrices)?;
        check_index("rate category", category, self.dims.rate_cats)?;
        let model = self.model_of(category);
        if !self.pmatrix_valid[slot][model] {
            return Err(PartitionError::StaleMatrix {
                operation: 0,
                slot,
                model,
            });
        }
        Ok(self.pmatrix_block(slot, category))
    }

    /// Whether `slot` holds current matrices for `model`
    pub fn is_matrix_valid(&self, slot: usize, model: usize) -> bool {
        self.pmatrix_valid
            .get(slot)
            .and_then(|v| v.get(model))
            .copied()
            .unwrap_or(false)
    }

    /// Matrix of `category` in `slot`, using the category's own model
    pub(super) fn pmatrix_block(&self, slot: usize, category: usize) -> &[f64] {
        let s = self.dims.states;
        let model = self.model_of(category);
        let offset = (model * self.dims.rate_cats + category) * s * s;
        &self.pmatrices[slot][offset..offset + s * s]
    }
}

fn identity(out: &mut [f64], s: usize) {
    out.fill(0.0);
    for i in 0..s {
        out[i * s + i] = 1.0;
    }
}

/// `out = V·diag(exp(λ·t))·V⁻¹`; false if any entry is non-finite.
fn exponentiate(
    out: &mut [f64],
    values: &[f64],
    v: &DMatrix<f64>,
    v_inv: &DMatrix<f64>,
    t: f64,
) -> bool {
    let s = values.len();
    let exps: Vec<f64> = values.iter().map(|l| (l * t).exp()).collect();

    for i in 0..s {
        for j in 0..s {
            let mut p = 0.0;
            for k in 0..s {
                p += v[(i, k)] * exps[k] * v_inv[(k, j)];
            }
            if !p.is_finite() {
                return false;
            }
            // round-off can leave tiny negatives
            out[i * s + j] = p.max(0.0);
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::libs::partition::{Attributes, Dimensions};
    use approx::assert_abs_diff_eq;

    fn partition(rate_matrices: usize, rate_cats: usize) -> Partition {
        let dims = Dimensions {
            tips: 2,
            clv_buffers: 1,
            states: 4,
            sites: 1,
            rate_matrices,
            prob_matrices: 3,
            rate_cats,
        };
        let mut p = Partition::new(dims, Attributes::default()).unwrap();
        for m in 0..rate_matrices {
            p.set_subst_params(m, &[1.0, 2.0, 0.5, 1.5, 3.0, 1.0]).unwrap();
            p.set_frequencies(m, &[0.1, 0.2, 0.3, 0.4]).unwrap();
        }
        p
    }

    #[test]
    fn zero_length_is_identity() {
        let mut p = partition(1, 4);
        p.set_category_rates(&[0.2, 0.6, 1.0, 2.2]).unwrap();
        p.update_prob_matrices(0, &[1], &[0.0]).unwrap();
        for cat in 0..4 {
            let m = p.category_matrix(1, cat).unwrap();
            for i in 0..4 {
                for j in 0..4 {
                    assert_eq!(m[i * 4 + j], if i == j { 1.0 } else { 0.0 });
                }
            }
        }
    }

    #[test]
    fn rows_are_stochastic() {
        let mut p = partition(1, 4);
        p.set_category_rates(&[0.1, 0.5, 1.0, 2.4]).unwrap();
        for &t in &[1e-6, 0.01, 0.3, 1.0, 5.0, 100.0] {
            p.update_prob_matrices(0, &[0], &[t]).unwrap();
            for cat in 0..4 {
                let m = p.category_matrix(0, cat).unwrap();
                for i in 0..4 {
                    let sum: f64 = m[i * 4..(i + 1) * 4].iter().sum();
                    assert_abs_diff_eq!(sum, 1.0, epsilon = 1e-8);
                    assert!(m[i * 4..(i + 1) * 4].iter().all(|&x| x >= 0.0));
                }
            }
        }
    }

    #[test]
    fn long_branch_reaches_equilibrium() {
        let mut p = partition(1, 1);
        p.update_prob_matrices(0, &[0], &[200.0]).unwrap();
        let m = p.category_matrix(0, 0).unwrap();
        let pi = [0.1, 0.2, 0.3, 0.4];
        for i in 0..4 {
            for j in 0..4 {
                assert_abs_diff_eq!(m[i * 4 + j], pi[j], epsilon = 1e-8);
            }
        }
    }

    #[test]
    fn rejects_bad_lengths() {
        let mut p = partition(1, 1);
        assert_eq!(
            p.update_prob_matrices(0, &[0, 2], &[0.1, -0.5]),
            Err(PartitionError::InvalidBranchLength {
                slot: 2,
                length: -0.5
            })
        );
        assert!(matches!(
            p.update_prob_matrices(0, &[0], &[f64::NAN]),
            Err(PartitionError::InvalidBranchLength { slot: 0, .. })
        ));
        assert!(matches!(
            p.update_prob_matrices(0, &[3], &[0.1]),
            Err(PartitionError::IndexOutOfRange { index: 3, limit: 3, .. })
        ));
        assert!(matches!(
            p.update_prob_matrices(0, &[0, 1], &[0.1]),
            Err(PartitionError::InvalidArgument(_))
        ));
        // nothing was stored
        assert!(!p.is_matrix_valid(0, 0));
    }

    #[test]
    fn overflow_leaves_slots_untouched() {
        let mut p = partition(1, 1);
        p.update_prob_matrices(0, &[0], &[0.5]).unwrap();
        let before = p.category_matrix(0, 0).unwrap().to_vec();

        let res = p.update_prob_matrices(0, &[1, 0], &[0.1, f64::INFINITY]);
        assert_eq!(
            res,
            Err(PartitionError::NumericOverflow {
                slot: 0,
                category: 0
            })
        );
        assert_eq!(p.category_matrix(0, 0).unwrap(), &before[..]);
        assert!(!p.is_matrix_valid(1, 0));
    }

    #[test]
    fn model_change_invalidates_slots() {
        let mut p = partition(2, 2);
        p.update_prob_matrices(0, &[0], &[0.1]).unwrap();
        p.update_prob_matrices(1, &[0], &[0.1]).unwrap();
        assert!(p.is_matrix_valid(0, 0) && p.is_matrix_valid(0, 1));
        assert_eq!(p.prob_matrix(0).unwrap().len(), 2 * 2 * 4 * 4);

        p.set_frequencies(1, &[0.25; 4]).unwrap();
        assert!(p.is_matrix_valid(0, 0));
        assert!(!p.is_matrix_valid(0, 1));
        assert!(matches!(
            p.category_matrix(0, 1),
            Err(PartitionError::StaleMatrix { slot: 0, model: 1, .. })
        ));

        p.set_category_rates(&[0.5, 1.5]).unwrap();
        assert!(!p.is_matrix_valid(0, 0));
    }

    #[test]
    fn categories_read_their_own_model() {
        // category 1 uses model 1, whose frequencies differ
        let mut p = partition(2, 2);
        p.set_frequencies(1, &[0.4, 0.3, 0.2, 0.1]).unwrap();
        p.update_prob_matrices(0, &[0], &[50.0]).unwrap();
        p.update_prob_matrices(1, &[0], &[50.0]).unwrap();

        let m0 = p.pmatrix_block(0, 0);
        let m1 = p.pmatrix_block(0, 1);
        assert_abs_diff_eq!(m0[3], 0.4, epsilon = 1e-8);
        assert_abs_diff_eq!(m1[3], 0.1, epsilon = 1e-8);
    }
}
