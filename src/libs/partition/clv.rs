//! Conditional likelihood vectors and the pruning recursion.

use super::tip::{indicator, TipState};
use super::{check_index, Operation, Partition};
use crate::libs::error::{PartitionError, Result};
use rayon::prelude::*;

/// 2^-256: sites whose largest entry falls below this are rescaled
pub const SCALE_THRESHOLD: f64 = 8.636168555094445e-78;
/// 2^256
pub const SCALE_FACTOR: f64 = 1.157920892373162e77;
/// ln(2^256), the log-likelihood correction per scaling event
pub const LN_SCALE_FACTOR: f64 = 256.0 * std::f64::consts::LN_2;

/// Sites handed to one rayon task at least
const MIN_SITES_PER_TASK: usize = 16;

/// A child buffer as seen by the recursion
pub(super) enum Operand<'a> {
    Tip(&'a [TipState]),
    Inner { clv: &'a [f64], scaler: &'a [u32] },
}

impl Operand<'_> {
    pub(super) fn scale(&self, site: usize) -> u32 {
        match self {
            Operand::Tip(_) => 0,
            Operand::Inner { scaler, .. } => scaler[site],
        }
    }
}

impl Partition {
    /// Run a post-order sequence of pruning operations.
    ///
    /// The whole sequence is validated first; on error no buffer is touched.
    pub fn update_partials(&mut self, operations: &[Operation]) -> Result<()> {
        self.validate_operations(operations)?;

        for op in operations {
            let index = op.parent - self.dims.tips;
            let mut clv = std::mem::take(&mut self.clvs[index]);
            let mut scaler = std::mem::take(&mut self.scalers[index]);

            self.prune(op, &mut clv, &mut scaler);

            self.clvs[index] = clv;
            self.scalers[index] = scaler;
            self.lineage.record(op);
        }

        tracing::trace!(operations = operations.len(), "partials updated");
        Ok(())
    }

    fn validate_operations(&self, operations: &[Operation]) -> Result<()> {
        let tips = self.dims.tips;
        let buffers = self.dims.buffers();

        let mut lineage = self.lineage.clone();
        let mut produced = vec![false; buffers];
        let mut consumed = vec![false; buffers];

        for (k, op) in operations.iter().enumerate() {
            check_index("buffer", op.parent, buffers)?;
            check_index("buffer", op.child1, buffers)?;
            check_index("buffer", op.child2, buffers)?;
            check_index("matrix slot", op.child1_matrix, self.dims.prob_matrices)?;
            check_index("matrix slot", op.child2_matrix, self.dims.prob_matrices)?;

            let invalid = |message: String| PartitionError::InvalidOperation {
                operation: k,
                message,
            };
            if op.parent < tips {
                return Err(invalid(format!(
                    "parent {} is a tip, not an internal buffer",
                    op.parent
                )));
            }
            if op.parent == op.child1 || op.parent == op.child2 {
                return Err(invalid(format!(
                    "parent {} is also one of its children",
                    op.parent
                )));
            }
            if produced[op.parent] {
                return Err(invalid(format!(
                    "buffer {} is written twice in one pass",
                    op.parent
                )));
            }
            if consumed[op.parent] {
                return Err(invalid(format!(
                    "buffer {} is overwritten after an earlier operation read it",
                    op.parent
                )));
            }

            for child in [op.child1, op.child2] {
                if !lineage.is_valid(child) {
                    return Err(PartitionError::StaleOperand {
                        operation: k,
                        buffer: child,
                    });
                }
            }
            self.check_matrices(k, &[op.child1_matrix, op.child2_matrix])?;

            consumed[op.child1] = true;
            consumed[op.child2] = true;
            produced[op.parent] = true;
            lineage.record(op);
        }

        Ok(())
    }

    /// Every model reachable from a category must be computed in `slots`.
    pub(super) fn check_matrices(&self, operation: usize, slots: &[usize]) -> Result<()> {
        for &slot in slots {
            for model in self.models_in_use() {
                if !self.pmatrix_valid[slot][model] {
                    return Err(PartitionError::StaleMatrix {
                        operation,
                        slot,
                        model,
                    });
                }
            }
        }
        Ok(())
    }

    /// Borrow a validated buffer
    pub(super) fn operand(&self, buffer: usize) -> Operand<'_> {
        if buffer < self.dims.tips {
            Operand::Tip(self.tips[buffer].as_deref().unwrap_or_default())
        } else {
            let index = buffer - self.dims.tips;
            Operand::Inner {
                clv: &self.clvs[index],
                scaler: &self.scalers[index],
            }
        }
    }

    /// `out = P · child` for one site and category
    pub(super) fn propagate(
        &self,
        operand: &Operand,
        pmatrix: &[f64],
        site: usize,
        category: usize,
        out: &mut [f64],
    ) {
        let s = self.dims.states;
        match operand {
            Operand::Tip(states) => match states[site] {
                TipState::Single(state) => {
                    let state = state as usize;
                    for (i, o) in out.iter_mut().enumerate() {
                        *o = pmatrix[i * s + state];
                    }
                }
                TipState::Ambiguous(set) => match self.indicators.get(&set) {
                    Some(vector) => mat_vec(pmatrix, vector, out),
                    None => mat_vec(pmatrix, &indicator(set, s), out),
                },
            },
            Operand::Inner { clv, .. } => {
                let offset = (site * self.dims.rate_cats + category) * s;
                mat_vec(pmatrix, &clv[offset..offset + s], out);
            }
        }
    }

    fn prune(&self, op: &Operation, clv: &mut [f64], scaler: &mut [u32]) {
        let s = self.dims.states;
        let rate_cats = self.dims.rate_cats;
        let scaling = self.attrs.scaling;

        let left = self.operand(op.child1);
        let right = self.operand(op.child2);

        clv.par_chunks_mut(rate_cats * s)
            .zip(scaler.par_iter_mut())
            .enumerate()
            .with_min_len(MIN_SITES_PER_TASK)
            .for_each_init(
                || (vec![0.0; s], vec![0.0; s]),
                |(a, b), (site, (out, count))| {
                    for cat in 0..rate_cats {
                        let p1 = self.pmatrix_block(op.child1_matrix, cat);
                        let p2 = self.pmatrix_block(op.child2_matrix, cat);
                        self.propagate(&left, p1, site, cat, a);
                        self.propagate(&right, p2, site, cat, b);
                        for (o, (x, y)) in out[cat * s..(cat + 1) * s]
                            .iter_mut()
                            .zip(a.iter().zip(b.iter()))
                        {
                            *o = x * y;
                        }
                    }

                    *count = left.scale(site) + right.scale(site);
                    if scaling {
                        let mut max = out.iter().copied().fold(0.0, f64::max);
                        while max > 0.0 && max < SCALE_THRESHOLD {
                            out.iter_mut().for_each(|v| *v *= SCALE_FACTOR);
                            max *= SCALE_FACTOR;
                            *count += 1;
                        }
                    }
                },
            );
    }

    /// Snapshot of a buffer as L·R·S values. Tips are expanded to their
    /// indicator vectors, replicated over categories.
    pub fn clv(&self, buffer: usize) -> Result<Vec<f64>> {
        check_index("buffer", buffer, self.dims.buffers())?;
        if !self.is_valid(buffer) {
            return Err(PartitionError::StaleOperand {
                operation: 0,
                buffer,
            });
        }

        let s = self.dims.states;
        match self.operand(buffer) {
            Operand::Tip(states) => {
                let mut values = Vec::with_capacity(self.dims.clv_len());
                for site in states {
                    let vector = indicator(site.mask(), s);
                    for _ in 0..self.dims.rate_cats {
                        values.extend_from_slice(&vector);
                    }
                }
                Ok(values)
            }
            Operand::Inner { clv, .. } => Ok(clv.to_vec()),
        }
    }

    /// Cumulative scaling counts of a buffer per site; all zero for tips.
    pub fn scalers(&self, buffer: usize) -> Result<Vec<u32>> {
        check_index("buffer", buffer, self.dims.buffers())?;
        match self.operand(buffer) {
            Operand::Tip(_) => Ok(vec![0; self.dims.sites]),
            Operand::Inner { scaler, .. } => Ok(scaler.to_vec()),
        }
    }
}

fn mat_vec(matrix: &[f64], vector: &[f64], out: &mut [f64]) {
    let s = vector.len();
    for (i, o) in out.iter_mut().enumerate() {
        *o = matrix[i * s..(i + 1) * s]
            .iter()
            .zip(vector)
            .map(|(m, v)| m * v)
            .sum();
    }
}
