//! Error and warning taxonomy.
//!
//! Errors are fatal to the call that raised them and leave the model in its
//! last valid state. Warnings are non-fatal: they ride along with a
//! best-effort result and are also emitted through `log::warn!`.
use thiserror::Error;

/// A parameter or hyperparameter violates its shape/sign/sum-to-one contract
#[derive(Clone, Debug, Error, PartialEq)]
pub enum ParameterFormatError {
    /// The value must be a positive, finite real
    #[error("{name} must be positive and finite, but is {value}")]
    NotPositive { name: &'static str, value: f64 },
    /// A vector parameter was empty
    #[error("{name} must not be empty")]
    Empty { name: &'static str },
    /// A probability vector does not sum to one
    #[error("{name} must sum to 1, but sums to {sum}")]
    NotNormalized { name: &'static str, sum: f64 },
    /// A vector has the wrong length for the model's constants
    #[error("{name} should have length {expected}, but has length {len}")]
    LengthMismatch {
        name: &'static str,
        expected: usize,
        len: usize,
    },
    /// Two explicitly supplied sources imply different shapes
    #[error(
        "{a} (length {a_len}) and {b} (length {b_len}) imply different \
         model shapes"
    )]
    InconsistentShapes {
        a: &'static str,
        a_len: usize,
        b: &'static str,
        b_len: usize,
    },
    /// An integer count (n_classes, degree) was zero
    #[error("{name} must be a positive integer")]
    ZeroCount { name: &'static str },
    /// Rows of a matrix parameter have unequal lengths
    #[error("all rows of {name} must have the same length")]
    RaggedRows { name: &'static str },
}

/// A dependent parameter was reinitialized to a safe default because a
/// primary parameter it depends on changed dimension. Non-fatal.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ParameterFormatWarning {
    #[error(
        "pi_vec was reinitialized to uniform because its length no longer \
         matches h_alpha_vec"
    )]
    PiVecReinitialized,
    #[error(
        "theta_vecs were reinitialized to uniform because their shape no \
         longer matches (h_alpha_vec, h_beta_vec)"
    )]
    ThetaVecsReinitialized,
    #[error(
        "h_alpha_vec was reinitialized to the default concentration because \
         its length no longer matches pi_vec"
    )]
    HAlphaVecReinitialized,
    #[error(
        "h_beta_vec was reinitialized to the default concentration because \
         its length no longer matches theta_vecs"
    )]
    HBetaVecReinitialized,
}

/// Observed data violates its shape/sign contract
#[derive(Clone, Debug, Error, PartialEq)]
pub enum DataFormatError {
    #[error("the sample must contain at least one observation")]
    EmptySample,
    /// A count row has the wrong number of categories
    #[error("row {row} has {len} categories, but the model degree is {degree}")]
    WrongDegree {
        row: usize,
        len: usize,
        degree: usize,
    },
    /// A count row sums to zero trials
    #[error("row {row} sums to zero; each row must sum to a positive integer")]
    ZeroTrials { row: usize },
    /// An exponential observation was non-positive or non-finite
    #[error("x[{ix}] must be positive and finite, but is {value}")]
    NotPositive { ix: usize, value: f64 },
    #[error("sample_size must be a positive integer")]
    ZeroSampleSize,
    #[error("n_trials must be a positive integer")]
    ZeroNTrials,
}

/// The caller requested an unsupported estimation criterion
#[derive(Clone, Debug, Error, PartialEq)]
pub enum CriteriaError {
    /// Unknown loss-function name
    #[error(
        "unsupported loss function {requested:?}; supported values are \
         \"squared\", \"0-1\", \"abs\", and \"KL\""
    )]
    UnsupportedLoss { requested: String },
    /// Credibility level outside the unit interval
    #[error("credibility must be in [0, 1], but is {0}")]
    CredibilityOutOfBounds(f64),
}

/// A well-formed request produced a mathematically undefined value or a
/// degraded result. Non-fatal: the call still returns its best effort.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum ResultWarning {
    /// The predictive mean does not exist for the current shape parameter
    #[error("the predictive mean does not exist for p_kappa <= 1")]
    MeanUndefined,
    /// A mode was requested where it does not exist; the floor value is used
    #[error(
        "the mode does not exist because a concentration parameter is <= 1; \
         the floor value is returned"
    )]
    ModeUndefined,
    /// The variational loop hit its iteration cap before converging
    #[error(
        "variational inference did not converge within {max_iters} \
         iterations (last ELBO delta {delta:e})"
    )]
    NotConverged { max_iters: usize, delta: f64 },
}
