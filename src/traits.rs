//! Interfaces shared by the two learn models.
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::loss::{Estimate, Loss};

/// A numeric parameter value, as exposed by the hyperparameter getters
///
/// Getters return a plain mapping from parameter name to one of these, one
/// mapping per parameter group (prior, posterior, predictive).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum ParamValue {
    Scalar(f64),
    Vector(Vec<f64>),
    Matrix(Vec<Vec<f64>>),
}

impl From<f64> for ParamValue {
    fn from(x: f64) -> Self {
        ParamValue::Scalar(x)
    }
}

impl From<Vec<f64>> for ParamValue {
    fn from(xs: Vec<f64>) -> Self {
        ParamValue::Vector(xs)
    }
}

impl From<Vec<Vec<f64>>> for ParamValue {
    fn from(xss: Vec<Vec<f64>>) -> Self {
        ParamValue::Matrix(xss)
    }
}

/// A parameter-group mapping returned by the getters
pub type ParamMap = BTreeMap<&'static str, ParamValue>;

/// A model holding a posterior distribution over its parameters
pub trait Posterior {
    /// Point-estimate type produced by the loss dispatcher
    type PointEst;
    /// Posterior distribution object returned under KL loss
    type PosteriorDist;

    /// Map a loss function to a posterior point estimate or distribution
    fn estimate_params(
        &self,
        loss: Loss,
    ) -> Estimate<Self::PointEst, Self::PosteriorDist>;

    /// Reset the posterior hyperparameters to their initial (prior) values
    /// and recompute the predictive parameters from them
    fn reset_hn_params(&mut self);
}

/// A model exposing a posterior-predictive distribution
pub trait Predictive: Posterior {
    /// Point-prediction type produced by the loss dispatcher
    type PredPoint;
    /// Predictive distribution object returned under KL loss
    type PredDist;

    /// Recompute the predictive parameters from the current posterior
    ///
    /// Idempotent; also invoked automatically whenever the posterior
    /// hyperparameters change, so the predictive state is never stale.
    fn calc_pred_dist(&mut self);

    /// Map a loss function to a predictive point estimate or distribution
    fn make_prediction(
        &self,
        loss: Loss,
    ) -> Estimate<Self::PredPoint, Self::PredDist>;
}
