//! Mixture of multinomials with Dirichlet priors.
//!
//! The generative side draws labeled count data from K class-conditional
//! multinomial distributions mixed by a categorical proportion vector. The
//! learning side approximates the posterior over (π, θ) by mean-field
//! variational Bayes and exposes a plug-in categorical-mixture predictive.
mod config;
mod gen;
mod learn;

pub use config::MixtureConfig;
pub use gen::GenModel;
pub use learn::{
    LearnModel, MixtureParams, PosteriorDists, ResponsibilityInit, VbConfig,
    VbReport,
};
