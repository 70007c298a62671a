//! Exponential likelihood with a Gamma conjugate prior.
//!
//! The reference pattern for the crate: everything here is closed form.
//! `GenModel` draws synthetic data from x ~ Exponential(λ) with
//! λ ~ Gamma(h_alpha, h_beta); `LearnModel` carries the conjugate
//! posterior Gamma(hn_alpha, hn_beta) and the Lomax posterior predictive.
use std::collections::BTreeMap;
use std::path::Path;

use rand::SeedableRng;
use rand_xoshiro::Xoshiro256Plus;
use serde::{Deserialize, Serialize};
use special::Gamma as _;

use parambayes_consts::{DEFAULT_GAMMA_RATE, DEFAULT_GAMMA_SHAPE};

use crate::check;
use crate::dist::{gamma_cdf, gamma_quantile, Lomax};
use crate::error::{
    CriteriaError, DataFormatError, ParameterFormatError, ResultWarning,
};
use crate::loss::{Estimate, Loss};
use crate::metadata::{self, ExponentialSample, MetadataError};
use crate::rv::dist::{Exponential, Gamma};
use crate::rv::traits::Rv;
use crate::traits::{Posterior, Predictive};

/// The data generative model and its prior
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GenModel {
    lambda: f64,
    h_alpha: f64,
    h_beta: f64,
    rng: Xoshiro256Plus,
}

impl Default for GenModel {
    fn default() -> Self {
        GenModel {
            lambda: 1.0,
            h_alpha: DEFAULT_GAMMA_SHAPE,
            h_beta: DEFAULT_GAMMA_RATE,
            rng: Xoshiro256Plus::from_entropy(),
        }
    }
}

impl GenModel {
    /// Create a model with rate `lambda` and a Gamma(h_alpha, h_beta) prior
    pub fn new(
        lambda: f64,
        h_alpha: f64,
        h_beta: f64,
    ) -> Result<Self, ParameterFormatError> {
        Ok(GenModel {
            lambda: check::pos_float(lambda, "lambda")?,
            h_alpha: check::pos_float(h_alpha, "h_alpha")?,
            h_beta: check::pos_float(h_beta, "h_beta")?,
            rng: Xoshiro256Plus::from_entropy(),
        })
    }

    /// Reseed the internal generator
    pub fn seed_from_u64(&mut self, seed: u64) -> &mut Self {
        self.rng = Xoshiro256Plus::seed_from_u64(seed);
        self
    }

    pub fn lambda(&self) -> f64 {
        self.lambda
    }

    /// Set the parameter of the generative model
    pub fn set_params(
        &mut self,
        lambda: f64,
    ) -> Result<&mut Self, ParameterFormatError> {
        self.lambda = check::pos_float(lambda, "lambda")?;
        Ok(self)
    }

    pub fn get_params(&self) -> BTreeMap<&'static str, f64> {
        BTreeMap::from([("lambda", self.lambda)])
    }

    /// Set the hyperparameters of the prior distribution
    ///
    /// Fails without touching the model if either value is invalid.
    pub fn set_h_params(
        &mut self,
        h_alpha: f64,
        h_beta: f64,
    ) -> Result<&mut Self, ParameterFormatError> {
        let h_alpha = check::pos_float(h_alpha, "h_alpha")?;
        let h_beta = check::pos_float(h_beta, "h_beta")?;
        self.h_alpha = h_alpha;
        self.h_beta = h_beta;
        Ok(self)
    }

    pub fn get_h_params(&self) -> BTreeMap<&'static str, f64> {
        BTreeMap::from([("h_alpha", self.h_alpha), ("h_beta", self.h_beta)])
    }

    /// Draw λ from the prior and install it as the current parameter
    pub fn gen_params(&mut self) -> &mut Self {
        let prior = Gamma::new_unchecked(self.h_alpha, self.h_beta);
        self.lambda = prior.draw(&mut self.rng);
        self
    }

    /// Draw `sample_size` observations from Exponential(λ)
    pub fn gen_sample(
        &mut self,
        sample_size: usize,
    ) -> Result<Vec<f64>, DataFormatError> {
        if sample_size == 0 {
            return Err(DataFormatError::ZeroSampleSize);
        }
        let fx = Exponential::new_unchecked(self.lambda);
        Ok(fx.sample(sample_size, &mut self.rng))
    }

    /// Generate a sample and persist it under the key `"x"`
    pub fn save_sample<P: AsRef<Path>>(
        &mut self,
        path: P,
        sample_size: usize,
    ) -> Result<(), MetadataError> {
        let x = self.gen_sample(sample_size)?;
        metadata::save_exponential_sample(path, &ExponentialSample { x })
    }

    /// Density of Exponential(λ) evaluated on an even grid over [lo, hi]
    ///
    /// Returns plot-ready (x, pdf) arrays for a visualization sink.
    pub fn density_curve(
        &self,
        lo: f64,
        hi: f64,
        n_points: usize,
    ) -> (Vec<f64>, Vec<f64>) {
        let fx = Exponential::new_unchecked(self.lambda);
        let step = (hi - lo) / (n_points.max(2) - 1) as f64;
        let xs: Vec<f64> =
            (0..n_points.max(2)).map(|i| step.mul_add(i as f64, lo)).collect();
        let ys: Vec<f64> = xs.iter().map(|x| fx.f(x)).collect();
        (xs, ys)
    }
}

/// The posterior and predictive distributions
///
/// Posterior: λ | x ~ Gamma(hn_alpha, hn_beta) with hn_alpha = h0_alpha + n
/// and hn_beta = h0_beta + Σ x_i. Predictive: Lomax(p_kappa, p_lambda).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LearnModel {
    h0_alpha: f64,
    h0_beta: f64,
    hn_alpha: f64,
    hn_beta: f64,
    p_kappa: f64,
    p_lambda: f64,
}

impl Default for LearnModel {
    fn default() -> Self {
        let mut model = LearnModel {
            h0_alpha: DEFAULT_GAMMA_SHAPE,
            h0_beta: DEFAULT_GAMMA_RATE,
            hn_alpha: DEFAULT_GAMMA_SHAPE,
            hn_beta: DEFAULT_GAMMA_RATE,
            p_kappa: DEFAULT_GAMMA_SHAPE,
            p_lambda: DEFAULT_GAMMA_RATE,
        };
        model.reset_hn_params();
        model
    }
}

impl LearnModel {
    /// Create a model with prior hyperparameters (h0_alpha, h0_beta)
    pub fn new(
        h0_alpha: f64,
        h0_beta: f64,
    ) -> Result<Self, ParameterFormatError> {
        let mut model = LearnModel::default();
        model.set_h0_params(h0_alpha, h0_beta)?;
        Ok(model)
    }

    /// Set the initial values of the posterior hyperparameters
    ///
    /// On success the posterior is reset to the new prior and the
    /// predictive parameters are recomputed; on failure the model is
    /// unchanged.
    pub fn set_h0_params(
        &mut self,
        h0_alpha: f64,
        h0_beta: f64,
    ) -> Result<&mut Self, ParameterFormatError> {
        let h0_alpha = check::pos_float(h0_alpha, "h0_alpha")?;
        let h0_beta = check::pos_float(h0_beta, "h0_beta")?;
        self.h0_alpha = h0_alpha;
        self.h0_beta = h0_beta;
        self.reset_hn_params();
        Ok(self)
    }

    pub fn get_h0_params(&self) -> BTreeMap<&'static str, f64> {
        BTreeMap::from([
            ("h0_alpha", self.h0_alpha),
            ("h0_beta", self.h0_beta),
        ])
    }

    /// Overwrite the posterior hyperparameters directly
    pub fn set_hn_params(
        &mut self,
        hn_alpha: f64,
        hn_beta: f64,
    ) -> Result<&mut Self, ParameterFormatError> {
        let hn_alpha = check::pos_float(hn_alpha, "hn_alpha")?;
        let hn_beta = check::pos_float(hn_beta, "hn_beta")?;
        self.hn_alpha = hn_alpha;
        self.hn_beta = hn_beta;
        self.calc_pred_dist();
        Ok(self)
    }

    pub fn get_hn_params(&self) -> BTreeMap<&'static str, f64> {
        BTreeMap::from([
            ("hn_alpha", self.hn_alpha),
            ("hn_beta", self.hn_beta),
        ])
    }

    pub fn get_p_params(&self) -> BTreeMap<&'static str, f64> {
        BTreeMap::from([
            ("p_kappa", self.p_kappa),
            ("p_lambda", self.p_lambda),
        ])
    }

    pub fn hn_alpha(&self) -> f64 {
        self.hn_alpha
    }

    pub fn hn_beta(&self) -> f64 {
        self.hn_beta
    }

    /// Fold a batch of observations into the posterior
    ///
    /// The update is cumulative across calls: the sufficient statistics
    /// (count, sum) are added to the current posterior hyperparameters.
    /// The predictive parameters are recomputed afterwards.
    pub fn update_posterior(
        &mut self,
        x: &[f64],
    ) -> Result<&mut Self, DataFormatError> {
        if x.is_empty() {
            return Err(DataFormatError::EmptySample);
        }
        for (ix, &xi) in x.iter().enumerate() {
            if !(xi.is_finite() && xi > 0.0) {
                return Err(DataFormatError::NotPositive { ix, value: xi });
            }
        }
        self.update_posterior_unchecked(x);
        Ok(self)
    }

    /// Update without input validation. Only called after the public
    /// `update_posterior` has validated the batch.
    fn update_posterior_unchecked(&mut self, x: &[f64]) {
        self.hn_alpha += x.len() as f64;
        self.hn_beta += x.iter().sum::<f64>();
        self.calc_pred_dist();
    }

    /// Equal-tailed credible interval for λ under the current posterior
    pub fn estimate_interval(
        &self,
        credibility: f64,
    ) -> Result<(f64, f64), CriteriaError> {
        if !(credibility.is_finite() && (0.0..=1.0).contains(&credibility)) {
            return Err(CriteriaError::CredibilityOutOfBounds(credibility));
        }
        let tail = 0.5 * (1.0 - credibility);
        let lower = gamma_quantile(self.hn_alpha, self.hn_beta, tail);
        let upper = gamma_quantile(self.hn_alpha, self.hn_beta, 1.0 - tail);
        Ok((lower, upper))
    }

    /// Predictive density at `x` under the current Lomax parameters
    pub fn pred_density(&self, x: f64) -> f64 {
        Lomax::new_unchecked(self.p_kappa, self.p_lambda).f(x)
    }

    /// Predict a new data point, then fold it into the posterior
    ///
    /// The prediction is computed from the pre-update predictive
    /// parameters; the observation is only folded in afterwards, so the
    /// returned value is a genuine sequential forecast.
    pub fn pred_and_update(
        &mut self,
        x: f64,
        loss: Loss,
    ) -> Result<Estimate<f64, Lomax>, DataFormatError> {
        if !(x.is_finite() && x > 0.0) {
            return Err(DataFormatError::NotPositive { ix: 0, value: x });
        }
        let prediction = self.make_prediction(loss);
        self.update_posterior_unchecked(&[x]);
        Ok(prediction)
    }

    /// Log marginal likelihood of all data folded in so far
    pub fn calc_log_marginal_likelihood(&self) -> f64 {
        self.h0_alpha.mul_add(
            self.h0_beta.ln(),
            -self.hn_alpha * self.hn_beta.ln(),
        ) - self.h0_alpha.ln_gamma().0
            + self.hn_alpha.ln_gamma().0
    }

    /// Posterior density over λ on an even grid spanning mean ± 4·sd
    ///
    /// Returns plot-ready (λ, pdf) arrays for a visualization sink.
    pub fn posterior_density_curve(
        &self,
        n_points: usize,
    ) -> (Vec<f64>, Vec<f64>) {
        let mean = self.hn_alpha / self.hn_beta;
        let sd = self.hn_alpha.sqrt() / self.hn_beta;
        let lo = 4.0_f64.mul_add(-sd, mean).max(1e-8);
        let hi = 4.0_f64.mul_add(sd, mean);
        let n = n_points.max(2);
        let step = (hi - lo) / (n - 1) as f64;
        let posterior = Gamma::new_unchecked(self.hn_alpha, self.hn_beta);
        let xs: Vec<f64> =
            (0..n).map(|i| step.mul_add(i as f64, lo)).collect();
        let ys: Vec<f64> = xs.iter().map(|x| posterior.f(x)).collect();
        (xs, ys)
    }
}

impl Posterior for LearnModel {
    type PointEst = f64;
    type PosteriorDist = Gamma;

    fn estimate_params(&self, loss: Loss) -> Estimate<f64, Gamma> {
        match loss {
            Loss::Squared => Estimate::Point(self.hn_alpha / self.hn_beta),
            Loss::ZeroOne => {
                if self.hn_alpha > 1.0 {
                    Estimate::Point((self.hn_alpha - 1.0) / self.hn_beta)
                } else {
                    log::warn!("{}", ResultWarning::ModeUndefined);
                    Estimate::Point(0.0)
                }
            }
            Loss::Abs => Estimate::Point(gamma_quantile(
                self.hn_alpha,
                self.hn_beta,
                0.5,
            )),
            Loss::Kl => Estimate::Distribution(Gamma::new_unchecked(
                self.hn_alpha,
                self.hn_beta,
            )),
        }
    }

    fn reset_hn_params(&mut self) {
        self.hn_alpha = self.h0_alpha;
        self.hn_beta = self.h0_beta;
        self.calc_pred_dist();
    }
}

impl Predictive for LearnModel {
    type PredPoint = f64;
    type PredDist = Lomax;

    fn calc_pred_dist(&mut self) {
        self.p_kappa = self.hn_alpha;
        self.p_lambda = self.hn_beta;
    }

    fn make_prediction(&self, loss: Loss) -> Estimate<f64, Lomax> {
        let predictive = Lomax::new_unchecked(self.p_kappa, self.p_lambda);
        match loss {
            Loss::Squared => match predictive.mean() {
                Some(mean) => Estimate::Point(mean),
                None => {
                    let warning = ResultWarning::MeanUndefined;
                    log::warn!("{}", warning);
                    Estimate::Undefined(warning)
                }
            },
            Loss::ZeroOne => Estimate::Point(predictive.mode()),
            Loss::Abs => Estimate::Point(predictive.median()),
            Loss::Kl => Estimate::Distribution(predictive),
        }
    }
}
