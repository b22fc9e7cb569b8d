use thiserror::Error;

/// Errors raised by a [`Partition`](crate::libs::partition::Partition) and the
/// numerical helpers it relies on.
///
/// Configuration errors are detected before any numeric work, so the partition
/// is left untouched. Numerical and consistency errors carry the offending
/// index; the partition stays usable for a retry with corrected input.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PartitionError {
    // --- Configuration ---
    #[error("invalid partition dimensions: {0}")]
    InvalidDimensions(String),

    #[error("model {model}: expected {expected} {what}, got {got}")]
    InvalidModelDimension {
        model: usize,
        what: &'static str,
        expected: usize,
        got: usize,
    },

    #[error("tip {tip}: sequence has {got} sites, partition has {expected}")]
    SequenceLengthMismatch {
        tip: usize,
        expected: usize,
        got: usize,
    },

    #[error("tip {tip}, site {site}: unknown symbol '{symbol}'")]
    UnknownSymbol {
        tip: usize,
        site: usize,
        symbol: char,
    },

    #[error("invalid gamma shape parameter: alpha = {alpha}, categories = {categories}")]
    InvalidShapeParameter { alpha: f64, categories: usize },

    #[error("matrix slot {slot}: invalid branch length {length}")]
    InvalidBranchLength { slot: usize, length: f64 },

    #[error("{kind} index {index} out of range [0, {limit})")]
    IndexOutOfRange {
        kind: &'static str,
        index: usize,
        limit: usize,
    },

    #[error("model {model}: invalid {what} value {value} at position {position}")]
    InvalidParameter {
        model: usize,
        what: &'static str,
        position: usize,
        value: f64,
    },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    // --- Numerical ---
    #[error("model {model}: rate matrix has no real invertible eigenbasis")]
    SingularRateMatrix { model: usize },

    #[error("discrete gamma computation failed: {0}")]
    GammaComputationFailure(String),

    #[error("matrix slot {slot}, category {category}: non-finite transition probability")]
    NumericOverflow { slot: usize, category: usize },

    #[error("site {site}: degenerate likelihood {value}")]
    DegenerateLikelihood { site: usize, value: f64 },

    // --- Consistency ---
    #[error("operation {operation}: buffer {buffer} holds no valid data")]
    StaleOperand { operation: usize, buffer: usize },

    #[error("operation {operation}: matrix slot {slot} is not computed for model {model}")]
    StaleMatrix {
        operation: usize,
        slot: usize,
        model: usize,
    },

    #[error("operation {operation}: {message}")]
    InvalidOperation { operation: usize, message: String },
}

pub type Result<T> = std::result::Result<T, PartitionError>;

/// Non-fatal conditions worth surfacing to the caller.
#[derive(Debug, Clone, PartialEq)]
pub enum Diagnostic {
    /// Equilibrium frequencies of `model` sum to `1 + deviation`.
    FrequencyNormalizationWarning { model: usize, deviation: f64 },
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Diagnostic::FrequencyNormalizationWarning { model, deviation } => {
                write!(f, "model {}: frequency sum diff {:e}", model, deviation)
            }
        }
    }
}
