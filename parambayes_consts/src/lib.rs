//! Default constants shared by the parambayes crates.
pub use rv;

/// Number of mixture classes assumed when nothing else specifies it
pub const DEFAULT_N_CLASSES: usize = 2;

/// Number of multinomial categories assumed when nothing else specifies it
pub const DEFAULT_DEGREE: usize = 3;

/// Default symmetric Dirichlet concentration for mixing-proportion and
/// multinomial-parameter priors (the Jeffreys-like 1/2)
pub const DEFAULT_DIRICHLET_ALPHA: f64 = 0.5;

/// Default shape of the Gamma prior on the exponential rate
pub const DEFAULT_GAMMA_SHAPE: f64 = 1.0;

/// Default rate of the Gamma prior on the exponential rate
pub const DEFAULT_GAMMA_RATE: f64 = 1.0;

/// Default number of multinomial trials per generated observation
pub const DEFAULT_N_TRIALS: u32 = 50;

/// Default iteration cap for the variational update loop
pub const DEFAULT_MAX_VB_ITERS: usize = 100;

/// Default convergence tolerance on the ELBO delta
pub const DEFAULT_VB_TOLERANCE: f64 = 1e-6;
