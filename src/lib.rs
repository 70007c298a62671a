#![warn(unused_extern_crates)]
#![warn(
    clippy::all,
    clippy::imprecise_flops,
    clippy::suboptimal_flops,
    clippy::unseparated_literal_suffix,
    clippy::unreadable_literal,
    clippy::option_option,
    clippy::implicit_clone
)]
//! Conjugate and variational Bayesian inference for parametric models.
//!
//! Two model families, each split into a data-generative half (`GenModel`)
//! and a posterior/predictive half (`LearnModel`):
//!
//! - [`exponential`] — Exponential likelihood with a Gamma conjugate prior.
//!   Closed-form posterior, Lomax posterior predictive.
//! - [`multinomial_mixture`] — K multinomial components mixed by a
//!   categorical proportion vector, Dirichlet priors throughout. The
//!   posterior is approximated by mean-field variational Bayes.
//!
//! Point estimates and predictions are dispatched through a [`Loss`]
//! function; `"KL"` returns the full distribution instead of a point.
//!
//! # Example
//!
//! The conjugate pair: prior Gamma(1, 1), three observations.
//!
//! ```rust
//! use parambayes::prelude::*;
//!
//! let mut model = exponential::LearnModel::new(1.0, 1.0).unwrap();
//! model.update_posterior(&[1.0, 2.0, 3.0]).unwrap();
//!
//! let mean = model.estimate_params(Loss::Squared).point().unwrap();
//! assert!((mean - 4.0 / 7.0).abs() < 1e-12);
//! ```
//!
//! Variational inference on simulated mixture data:
//!
//! ```rust
//! use parambayes::prelude::*;
//!
//! let config = MixtureConfig::new().n_classes(2).degree(3).seed(1337);
//! let mut gen = multinomial_mixture::GenModel::from_config(&config).unwrap();
//! let (x, _z) = gen.gen_sample(50, 20).unwrap();
//!
//! let mut learner =
//!     multinomial_mixture::LearnModel::from_config(&config).unwrap();
//! let report = learner.update_posterior(&x, &VbConfig::new()).unwrap();
//!
//! assert!(report.converged);
//! for row in learner.r_vecs() {
//!     assert!((row.iter().sum::<f64>() - 1.0).abs() < 1e-9);
//! }
//! ```
mod check;
pub mod dist;
pub mod error;
pub mod exponential;
pub mod loss;
pub mod metadata;
pub mod multinomial_mixture;
pub mod prelude;
pub mod traits;

pub use loss::{Estimate, Loss};
pub use parambayes_consts::rv;
pub use traits::{Posterior, Predictive};
