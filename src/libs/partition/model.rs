use crate::libs::error::{Diagnostic, PartitionError, Result};
use nalgebra::{DMatrix, SymmetricEigen};

/// Frequency sums further than this from 1 raise a diagnostic
const FREQ_TOLERANCE: f64 = 1e-10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelState {
    /// Parameters changed since the last decomposition
    Dirty,
    /// Eigenvalues and eigenvectors match the current parameters
    Ready,
}

/// A time-reversible substitution model and its cached eigendecomposition.
///
/// The rate matrix is `Q[i][j] = E[i][j]·π[j]` off the diagonal, with rows
/// summing to zero, scaled so that the expected rate `-Σ π[i]·Q[i][i]` is 1.
/// Because `Q` is π-reversible, `D^{1/2}·Q·D^{-1/2}` (with `D = diag(π)`) is
/// symmetric and `Q = V·Λ·V⁻¹` with `V = D^{-1/2}·U`, `V⁻¹ = Uᵀ·D^{1/2}`.
#[derive(Debug, Clone)]
pub struct SubstModel {
    index: usize,
    states: usize,
    exchangeabilities: Vec<f64>,
    frequencies: Vec<f64>,
    state: ModelState,
    eigenvalues: Vec<f64>,
    eigenvectors: DMatrix<f64>,
    inv_eigenvectors: DMatrix<f64>,
}

impl SubstModel {
    /// Equal exchangeabilities and uniform frequencies
    pub fn new(index: usize, states: usize) -> Self {
        Self {
            index,
            states,
            exchangeabilities: vec![1.0; states * (states - 1) / 2],
            frequencies: vec![1.0 / states as f64; states],
            state: ModelState::Dirty,
            eigenvalues: vec![0.0; states],
            eigenvectors: DMatrix::zeros(states, states),
            inv_eigenvectors: DMatrix::zeros(states, states),
        }
    }

    pub fn states(&self) -> usize {
        self.states
    }

    /// Upper triangle of the exchangeability matrix, row-major
    pub fn exchangeabilities(&self) -> &[f64] {
        &self.exchangeabilities
    }

    pub fn frequencies(&self) -> &[f64] {
        &self.frequencies
    }

    pub fn state(&self) -> ModelState {
        self.state
    }

    pub(super) fn set_exchangeabilities(&mut self, values: &[f64]) -> Result<()> {
        let expected = self.states * (self.states - 1) / 2;
        if values.len() != expected {
            return Err(PartitionError::InvalidModelDimension {
                model: self.index,
                what: "exchangeabilities",
                expected,
                got: values.len(),
            });
        }
        if let Some((position, &value)) = values
            .iter()
            .enumerate()
            .find(|(_, v)| !(v.is_finite() && **v >= 0.0))
        {
            return Err(PartitionError::InvalidParameter {
                model: self.index,
                what: "exchangeability",
                position,
                value,
            });
        }

        self.exchangeabilities.copy_from_slice(values);
        self.state = ModelState::Dirty;
        Ok(())
    }

    /// Store `values` unchanged; report the deviation of their sum from 1.
    pub(super) fn set_frequencies(&mut self, values: &[f64]) -> Result<Option<Diagnostic>> {
        if values.len() != self.states {
            return Err(PartitionError::InvalidModelDimension {
                model: self.index,
                what: "frequencies",
                expected: self.states,
                got: values.len(),
            });
        }
        if let Some((position, &value)) = values
            .iter()
            .enumerate()
            .find(|(_, v)| !(v.is_finite() && **v >= 0.0))
        {
            return Err(PartitionError::InvalidParameter {
                model: self.index,
                what: "frequency",
                position,
                value,
            });
        }

        self.frequencies.copy_from_slice(values);
        self.state = ModelState::Dirty;

        let deviation = values.iter().sum::<f64>() - 1.0;
        if deviation.abs() > FREQ_TOLERANCE {
            Ok(Some(Diagnostic::FrequencyNormalizationWarning {
                model: self.index,
                deviation,
            }))
        } else {
            Ok(None)
        }
    }

    /// Exchangeability between states `i` and `j`
    fn exchangeability(&self, i: usize, j: usize) -> f64 {
        let (a, b) = if i < j { (i, j) } else { (j, i) };
        // row a of the upper triangle starts after a rows of shrinking length
        let offset = a * (2 * self.states - a - 1) / 2;
        self.exchangeabilities[offset + (b - a - 1)]
    }

    /// Expected substitution rate of the unnormalized matrix
    fn mean_rate(&self) -> f64 {
        let s = self.states;
        let mut mu = 0.0;
        for i in 0..s {
            for j in 0..s {
                if i != j {
                    mu += self.frequencies[i] * self.exchangeability(i, j) * self.frequencies[j];
                }
            }
        }
        mu
    }

    /// The normalized rate matrix Q.
    pub fn rate_matrix(&self) -> Result<DMatrix<f64>> {
        let s = self.states;
        let mu = self.mean_rate();
        if !(mu.is_finite() && mu > 0.0) {
            return Err(PartitionError::SingularRateMatrix { model: self.index });
        }

        let mut q = DMatrix::zeros(s, s);
        for i in 0..s {
            let mut row = 0.0;
            for j in 0..s {
                if i != j {
                    let rate = self.exchangeability(i, j) * self.frequencies[j] / mu;
                    q[(i, j)] = rate;
                    row += rate;
                }
            }
            q[(i, i)] = -row;
        }
        Ok(q)
    }

    /// Recompute the eigendecomposition if parameters changed.
    pub fn decompose(&mut self) -> Result<()> {
        if self.state == ModelState::Ready {
            return Ok(());
        }

        let s = self.states;
        let singular = PartitionError::SingularRateMatrix { model: self.index };
        if self.frequencies.iter().any(|&f| f <= 0.0) {
            return Err(singular);
        }

        let q = self.rate_matrix()?;
        let sqrt_pi: Vec<f64> = self.frequencies.iter().map(|f| f.sqrt()).collect();

        // B = D^{1/2} Q D^{-1/2}
        let b = DMatrix::from_fn(s, s, |i, j| q[(i, j)] * sqrt_pi[i] / sqrt_pi[j]);
        if b.iter().any(|v| !v.is_finite()) {
            return Err(singular);
        }

        let eigen = SymmetricEigen::try_new(b, f64::EPSILON, 10_000).ok_or(singular.clone())?;
        let u = &eigen.eigenvectors;

        let eigenvectors = DMatrix::from_fn(s, s, |i, k| u[(i, k)] / sqrt_pi[i]);
        let inv_eigenvectors = DMatrix::from_fn(s, s, |k, j| u[(j, k)] * sqrt_pi[j]);
        let eigenvalues: Vec<f64> = eigen.eigenvalues.iter().copied().collect();

        if eigenvalues.iter().any(|v| !v.is_finite())
            || eigenvectors.iter().any(|v| !v.is_finite())
            || inv_eigenvectors.iter().any(|v| !v.is_finite())
        {
            return Err(singular);
        }

        self.eigenvalues = eigenvalues;
        self.eigenvectors = eigenvectors;
        self.inv_eigenvectors = inv_eigenvectors;
        self.state = ModelState::Ready;

        tracing::debug!(model = self.index, "rate matrix decomposed");
        Ok(())
    }

    /// Eigenvalues, V and V⁻¹; `None` while the model is dirty.
    pub fn eigen(&self) -> Option<(&[f64], &DMatrix<f64>, &DMatrix<f64>)> {
        match self.state {
            ModelState::Ready => Some((
                &self.eigenvalues,
                &self.eigenvectors,
                &self.inv_eigenvectors,
            )),
            ModelState::Dirty => None,
        }
    }
}
