//! Variational posterior engine and predictive calculator.
//!
//! The posterior over (π, θ) is intractable, so `LearnModel` carries a
//! mean-field approximation q(π)·∏q(θ_k)·∏q(z_i) and fits it by coordinate
//! ascent: an E-step computing per-row class responsibilities in log space,
//! an M-step refreshing the Dirichlet hyperparameters, and an ELBO-based
//! convergence check.
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256Plus;
use serde::{Deserialize, Serialize};
use special::Gamma as _;

use itertools::izip;
use parambayes_consts::{
    DEFAULT_DIRICHLET_ALPHA, DEFAULT_MAX_VB_ITERS, DEFAULT_VB_TOLERANCE,
};
use parambayes_utils::{logsumexp, normalized};

use crate::check;
use crate::dist::{beta_median, ln_multinomial_coef, MultinomialMixture};
use crate::error::{DataFormatError, ParameterFormatError, ResultWarning};
use crate::loss::{Estimate, Loss};
use crate::multinomial_mixture::MixtureConfig;
use crate::rv::dist::Dirichlet;
use crate::rv::traits::Rv;
use crate::traits::{ParamMap, ParamValue, Posterior, Predictive};

/// How the first responsibilities of a variational run are formed
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResponsibilityInit {
    /// One E-step from the freshly reset posterior. Deterministic, but a
    /// symmetric prior is a fixed point: every class keeps equal weight.
    Posterior,
    /// Rows drawn from a flat Dirichlet through the model's seeded
    /// generator. Breaks class symmetry; determinism keyed by the seed.
    Random,
}

impl Default for ResponsibilityInit {
    fn default() -> Self {
        ResponsibilityInit::Posterior
    }
}

/// Iteration control for `LearnModel::update_posterior`
///
/// A `tolerance` of zero never triggers the convergence check, so the loop
/// runs for exactly `max_iters` iterations.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VbConfig {
    pub max_iters: usize,
    pub tolerance: f64,
    pub init: ResponsibilityInit,
}

impl Default for VbConfig {
    fn default() -> Self {
        VbConfig {
            max_iters: DEFAULT_MAX_VB_ITERS,
            tolerance: DEFAULT_VB_TOLERANCE,
            init: ResponsibilityInit::Posterior,
        }
    }
}

impl VbConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_iters(mut self, max_iters: usize) -> Self {
        self.max_iters = max_iters;
        self
    }

    pub fn tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn init(mut self, init: ResponsibilityInit) -> Self {
        self.init = init;
        self
    }
}

/// Outcome of a variational run
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct VbReport {
    /// Iterations actually performed
    pub n_iters: usize,
    /// Final evidence lower bound
    pub elbo: f64,
    /// Last observed |ELBO - ELBO_prev|
    pub delta: f64,
    /// Whether `delta` fell below the tolerance before `max_iters`
    pub converged: bool,
}

impl VbReport {
    /// The non-convergence warning, when the iteration budget ran out
    pub fn warning(&self) -> Option<ResultWarning> {
        if self.converged {
            None
        } else {
            Some(ResultWarning::NotConverged {
                max_iters: self.n_iters,
                delta: self.delta,
            })
        }
    }
}

/// Point parameters of the mixture, as produced by the loss dispatcher
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MixtureParams {
    pub pi_vec: Vec<f64>,
    pub theta_vecs: Vec<Vec<f64>>,
}

/// The factorized posterior over (π, θ), returned under KL loss
#[derive(Clone, Debug, PartialEq)]
pub struct PosteriorDists {
    pub pi_dist: Dirichlet,
    pub theta_dists: Vec<Dirichlet>,
}

/// The variational posterior and the plug-in predictive
///
/// Posterior: π ~ Dirichlet(hn_alpha_vec), θ_k ~ Dirichlet(hn_beta_vecs[k]).
/// Predictive: a categorical mixture parameterized by the normalized
/// posterior hyperparameters (p_pi_vec, p_theta_vecs).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LearnModel {
    n_classes: usize,
    degree: usize,
    h0_alpha_vec: Vec<f64>,
    h0_beta_vec: Vec<f64>,
    // log-normalizers of the prior Dirichlets, cached for the ELBO
    ln_c_h0_alpha: f64,
    ln_c_h0_beta: f64,
    hn_alpha_vec: Vec<f64>,
    hn_beta_vecs: Vec<Vec<f64>>,
    r_vecs: Vec<Vec<f64>>,
    p_pi_vec: Vec<f64>,
    p_theta_vecs: Vec<Vec<f64>>,
    rng: Xoshiro256Plus,
}

impl Default for LearnModel {
    fn default() -> Self {
        LearnModel::from_config(&MixtureConfig::default())
            .expect("the default configuration is always valid")
    }
}

/// Log-normalizer of a Dirichlet: ln C(a) = ln Γ(Σa) − Σ ln Γ(a_j)
fn ln_c(a: &[f64]) -> f64 {
    a.iter().sum::<f64>().ln_gamma().0
        - a.iter().map(|&x| x.ln_gamma().0).sum::<f64>()
}

/// E[ln p_j] under Dirichlet(a): ψ(a_j) − ψ(Σa)
fn expected_ln_dirichlet(a: &[f64]) -> Vec<f64> {
    let psi_total = a.iter().sum::<f64>().digamma();
    a.iter().map(|&x| x.digamma() - psi_total).collect()
}

/// Mode of Dirichlet(a): (a_j − 1) / (Σa − K), coordinates floored at zero
///
/// `None` when every coordinate floors out (all a_j ≤ 1).
fn dirichlet_mode(a: &[f64]) -> Option<Vec<f64>> {
    let shifted: Vec<f64> = a.iter().map(|&x| (x - 1.0).max(0.0)).collect();
    let total: f64 = shifted.iter().sum();
    if total > 0.0 {
        Some(shifted.iter().map(|&x| x / total).collect())
    } else {
        None
    }
}

/// Per-coordinate medians of the Beta(a_j, Σa − a_j) marginals
fn marginal_medians(a: &[f64]) -> Vec<f64> {
    if a.len() == 1 {
        return vec![1.0];
    }
    let total: f64 = a.iter().sum();
    a.iter().map(|&x| beta_median(x, total - x)).collect()
}

fn normalize_rows(ln_rho: &[Vec<f64>]) -> Vec<Vec<f64>> {
    ln_rho
        .iter()
        .map(|row| {
            let z = logsumexp(row);
            row.iter().map(|&l| (l - z).exp()).collect()
        })
        .collect()
}

impl LearnModel {
    /// Build a model from a resolved configuration
    ///
    /// Only the shape sources, the prior concentration vectors and the seed
    /// are consulted; `pi_vec`/`theta_vecs` matter to `GenModel` alone.
    pub fn from_config(
        config: &MixtureConfig,
    ) -> Result<Self, ParameterFormatError> {
        let (n_classes, degree) = config.resolve_shape()?;

        let h0_alpha_vec = match &config.h_alpha_vec {
            Some(alpha) => check::pos_float_vec(alpha, "h_alpha_vec")?,
            None => vec![DEFAULT_DIRICHLET_ALPHA; n_classes],
        };
        let h0_beta_vec = match &config.h_beta_vec {
            Some(beta) => check::pos_float_vec(beta, "h_beta_vec")?,
            None => vec![DEFAULT_DIRICHLET_ALPHA; degree],
        };
        let rng = match config.seed {
            Some(seed) => Xoshiro256Plus::seed_from_u64(seed),
            None => Xoshiro256Plus::from_entropy(),
        };

        let mut model = LearnModel {
            n_classes,
            degree,
            ln_c_h0_alpha: ln_c(&h0_alpha_vec),
            ln_c_h0_beta: ln_c(&h0_beta_vec),
            h0_alpha_vec,
            h0_beta_vec,
            hn_alpha_vec: Vec::new(),
            hn_beta_vecs: Vec::new(),
            r_vecs: Vec::new(),
            p_pi_vec: Vec::new(),
            p_theta_vecs: Vec::new(),
            rng,
        };
        model.reset_hn_params();
        Ok(model)
    }

    /// Create a model with prior concentrations (h0_alpha_vec, h0_beta_vec)
    pub fn new(
        h0_alpha_vec: &[f64],
        h0_beta_vec: &[f64],
    ) -> Result<Self, ParameterFormatError> {
        LearnModel::from_config(
            &MixtureConfig::new()
                .h_alpha_vec(h0_alpha_vec.to_vec())
                .h_beta_vec(h0_beta_vec.to_vec()),
        )
    }

    /// Reseed the internal generator
    pub fn seed_from_u64(&mut self, seed: u64) -> &mut Self {
        self.rng = Xoshiro256Plus::seed_from_u64(seed);
        self
    }

    pub fn n_classes(&self) -> usize {
        self.n_classes
    }

    pub fn degree(&self) -> usize {
        self.degree
    }

    pub fn hn_alpha_vec(&self) -> &[f64] {
        &self.hn_alpha_vec
    }

    pub fn hn_beta_vecs(&self) -> &[Vec<f64>] {
        &self.hn_beta_vecs
    }

    /// Responsibilities of the last `update_posterior` batch (N × K)
    pub fn r_vecs(&self) -> &[Vec<f64>] {
        &self.r_vecs
    }

    pub fn p_pi_vec(&self) -> &[f64] {
        &self.p_pi_vec
    }

    pub fn p_theta_vecs(&self) -> &[Vec<f64>] {
        &self.p_theta_vecs
    }

    /// Set the initial values of the posterior hyperparameters
    ///
    /// The model constants (K, d) follow the new vectors. On success the
    /// posterior is reset to the new prior and the predictive parameters
    /// are recomputed; on failure the model is unchanged.
    pub fn set_h0_params(
        &mut self,
        h0_alpha_vec: &[f64],
        h0_beta_vec: &[f64],
    ) -> Result<&mut Self, ParameterFormatError> {
        let h0_alpha_vec = check::pos_float_vec(h0_alpha_vec, "h0_alpha_vec")?;
        let h0_beta_vec = check::pos_float_vec(h0_beta_vec, "h0_beta_vec")?;

        self.n_classes = h0_alpha_vec.len();
        self.degree = h0_beta_vec.len();
        self.ln_c_h0_alpha = ln_c(&h0_alpha_vec);
        self.ln_c_h0_beta = ln_c(&h0_beta_vec);
        self.h0_alpha_vec = h0_alpha_vec;
        self.h0_beta_vec = h0_beta_vec;
        self.reset_hn_params();
        Ok(self)
    }

    pub fn get_h0_params(&self) -> ParamMap {
        ParamMap::from([
            ("h0_alpha_vec", ParamValue::from(self.h0_alpha_vec.clone())),
            ("h0_beta_vec", ParamValue::from(self.h0_beta_vec.clone())),
        ])
    }

    /// Overwrite the posterior hyperparameters directly
    ///
    /// The vectors must match the model constants; the responsibilities of
    /// any previous batch are discarded and the predictive parameters are
    /// recomputed.
    pub fn set_hn_params(
        &mut self,
        hn_alpha_vec: &[f64],
        hn_beta_vecs: &[Vec<f64>],
    ) -> Result<&mut Self, ParameterFormatError> {
        let hn_alpha_vec = check::pos_float_vec(hn_alpha_vec, "hn_alpha_vec")?;
        if hn_alpha_vec.len() != self.n_classes {
            return Err(ParameterFormatError::LengthMismatch {
                name: "hn_alpha_vec",
                expected: self.n_classes,
                len: hn_alpha_vec.len(),
            });
        }
        if hn_beta_vecs.len() != self.n_classes {
            return Err(ParameterFormatError::LengthMismatch {
                name: "hn_beta_vecs",
                expected: self.n_classes,
                len: hn_beta_vecs.len(),
            });
        }
        let mut rows = Vec::with_capacity(self.n_classes);
        for row in hn_beta_vecs {
            let row = check::pos_float_vec(row, "hn_beta_vecs")?;
            if row.len() != self.degree {
                return Err(ParameterFormatError::LengthMismatch {
                    name: "hn_beta_vecs",
                    expected: self.degree,
                    len: row.len(),
                });
            }
            rows.push(row);
        }

        self.hn_alpha_vec = hn_alpha_vec;
        self.hn_beta_vecs = rows;
        self.r_vecs.clear();
        self.calc_pred_dist();
        Ok(self)
    }

    pub fn get_hn_params(&self) -> ParamMap {
        ParamMap::from([
            ("hn_alpha_vec", ParamValue::from(self.hn_alpha_vec.clone())),
            ("hn_beta_vecs", ParamValue::from(self.hn_beta_vecs.clone())),
        ])
    }

    pub fn get_p_params(&self) -> ParamMap {
        ParamMap::from([
            ("p_pi_vec", ParamValue::from(self.p_pi_vec.clone())),
            ("p_theta_vecs", ParamValue::from(self.p_theta_vecs.clone())),
        ])
    }

    /// Fit the variational posterior to a batch of count rows
    ///
    /// Each call starts from the prior and overwrites the previous
    /// posterior state entirely; updates are not additive across calls.
    /// Rows may carry different trial counts, but every row must have
    /// `degree` categories and a positive sum.
    ///
    /// Non-convergence within `config.max_iters` is not an error: the best
    /// estimate is kept and the returned report carries
    /// `converged: false` (also logged).
    pub fn update_posterior(
        &mut self,
        x: &[Vec<u32>],
        config: &VbConfig,
    ) -> Result<VbReport, DataFormatError> {
        self.validate_batch(x)?;
        Ok(self.update_posterior_unchecked(x, config))
    }

    fn validate_batch(&self, x: &[Vec<u32>]) -> Result<(), DataFormatError> {
        if x.is_empty() {
            return Err(DataFormatError::EmptySample);
        }
        for (row, xs) in x.iter().enumerate() {
            if xs.len() != self.degree {
                return Err(DataFormatError::WrongDegree {
                    row,
                    len: xs.len(),
                    degree: self.degree,
                });
            }
            if xs.iter().all(|&c| c == 0) {
                return Err(DataFormatError::ZeroTrials { row });
            }
        }
        Ok(())
    }

    /// The coordinate-ascent loop. Only called after the public
    /// `update_posterior` has validated the batch.
    fn update_posterior_unchecked(
        &mut self,
        x: &[Vec<u32>],
        config: &VbConfig,
    ) -> VbReport {
        self.hn_alpha_vec = self.h0_alpha_vec.clone();
        self.hn_beta_vecs = vec![self.h0_beta_vec.clone(); self.n_classes];

        let ln_coefs: Vec<f64> =
            x.iter().map(|xs| ln_multinomial_coef(xs)).collect();

        self.r_vecs = match config.init {
            ResponsibilityInit::Posterior => {
                let elp = expected_ln_dirichlet(&self.hn_alpha_vec);
                let elt: Vec<Vec<f64>> = self
                    .hn_beta_vecs
                    .iter()
                    .map(|b| expected_ln_dirichlet(b))
                    .collect();
                normalize_rows(&self.ln_rho_rows(x, &ln_coefs, &elp, &elt))
            }
            ResponsibilityInit::Random => {
                let flat =
                    Dirichlet::new_unchecked(vec![1.0; self.n_classes]);
                (0..x.len()).map(|_| flat.draw(&mut self.rng)).collect()
            }
        };

        let mut prev_elbo = f64::NEG_INFINITY;
        let mut elbo = prev_elbo;
        let mut delta = f64::INFINITY;
        let mut converged = false;
        let mut n_iters = 0;

        for it in 1..=config.max_iters {
            n_iters = it;

            // M-step
            for (k, hn_beta) in self.hn_beta_vecs.iter_mut().enumerate() {
                let r_mass: f64 = self.r_vecs.iter().map(|r| r[k]).sum();
                self.hn_alpha_vec[k] = self.h0_alpha_vec[k] + r_mass;
                for (j, b) in hn_beta.iter_mut().enumerate() {
                    let weighted: f64 = self
                        .r_vecs
                        .iter()
                        .zip(x.iter())
                        .map(|(r, xs)| r[k] * f64::from(xs[j]))
                        .sum();
                    *b = self.h0_beta_vec[j] + weighted;
                }
            }

            // expectations under the refreshed posterior, shared between
            // the ELBO and the next E-step
            let elp = expected_ln_dirichlet(&self.hn_alpha_vec);
            let elt: Vec<Vec<f64>> = self
                .hn_beta_vecs
                .iter()
                .map(|b| expected_ln_dirichlet(b))
                .collect();
            let ln_rho = self.ln_rho_rows(x, &ln_coefs, &elp, &elt);

            elbo = self.elbo(&ln_rho, &elp, &elt);
            delta = (elbo - prev_elbo).abs();
            if delta < config.tolerance {
                converged = true;
                break;
            }
            prev_elbo = elbo;

            // E-step for the next iteration
            self.r_vecs = normalize_rows(&ln_rho);
        }

        self.calc_pred_dist();
        let report = VbReport {
            n_iters,
            elbo,
            delta,
            converged,
        };
        if let Some(warning) = report.warning() {
            log::warn!("{}", warning);
        }
        report
    }

    /// Unnormalized log responsibilities:
    /// ln ρ_ik = E[ln π_k] + Σ_j x_ij E[ln θ_kj] + ln(n_i! / ∏_j x_ij!)
    fn ln_rho_rows(
        &self,
        x: &[Vec<u32>],
        ln_coefs: &[f64],
        elp: &[f64],
        elt: &[Vec<f64>],
    ) -> Vec<Vec<f64>> {
        x.iter()
            .zip(ln_coefs.iter())
            .map(|(xs, &ln_coef)| {
                elp.iter()
                    .zip(elt.iter())
                    .map(|(&elp_k, elt_k)| {
                        let ln_like: f64 = xs
                            .iter()
                            .zip(elt_k.iter())
                            .map(|(&c, &e)| f64::from(c) * e)
                            .sum();
                        elp_k + ln_like + ln_coef
                    })
                    .collect()
            })
            .collect()
    }

    /// Evidence lower bound at the current (post-M-step) posterior
    ///
    /// `ln_rho` must have been computed from the same expectations passed
    /// in `elp`/`elt`. Responsibilities of exactly zero contribute nothing
    /// (the limit of r·ln r at zero).
    fn elbo(&self, ln_rho: &[Vec<f64>], elp: &[f64], elt: &[Vec<f64>]) -> f64 {
        let data_term: f64 = self
            .r_vecs
            .iter()
            .zip(ln_rho.iter())
            .map(|(rs, ls)| {
                rs.iter()
                    .zip(ls.iter())
                    .filter(|(&r, _)| r > 0.0)
                    .map(|(&r, &l)| r * (l - r.ln()))
                    .sum::<f64>()
            })
            .sum();

        let pi_term = self.ln_c_h0_alpha - ln_c(&self.hn_alpha_vec)
            + izip!(&self.h0_alpha_vec, &self.hn_alpha_vec, elp)
                .map(|(&a0, &an, &e)| (a0 - an) * e)
                .sum::<f64>();

        let theta_term: f64 = self
            .hn_beta_vecs
            .iter()
            .zip(elt.iter())
            .map(|(bn, elt_k)| {
                self.ln_c_h0_beta - ln_c(bn)
                    + izip!(&self.h0_beta_vec, bn, elt_k)
                        .map(|(&b0, &bj, &e)| (b0 - bj) * e)
                        .sum::<f64>()
            })
            .sum();

        data_term + pi_term + theta_term
    }

    /// The predictive mixture parameterized by (p_pi_vec, p_theta_vecs)
    pub fn predictive_dist(&self) -> MultinomialMixture {
        MultinomialMixture::new_unchecked(
            self.p_pi_vec.clone(),
            self.p_theta_vecs.clone(),
        )
    }

    /// Log predictive mass of a new count row
    pub fn ln_pred_density(&self, xs: &[u32]) -> Result<f64, DataFormatError> {
        self.predictive_dist().ln_f(xs)
    }

    /// Predict a new count row, then fold it into the posterior
    ///
    /// The prediction is computed from the pre-update predictive
    /// parameters; the row is only folded in afterwards (with the
    /// documented overwrite semantics of `update_posterior`), so the
    /// returned value is a genuine sequential forecast.
    pub fn pred_and_update(
        &mut self,
        xs: &[u32],
        loss: Loss,
        config: &VbConfig,
    ) -> Result<Estimate<MixtureParams, MultinomialMixture>, DataFormatError>
    {
        let batch = [xs.to_vec()];
        self.validate_batch(&batch)?;
        let prediction = self.make_prediction(loss);
        self.update_posterior_unchecked(&batch, config);
        Ok(prediction)
    }
}

impl Posterior for LearnModel {
    type PointEst = MixtureParams;
    type PosteriorDist = PosteriorDists;

    fn estimate_params(
        &self,
        loss: Loss,
    ) -> Estimate<MixtureParams, PosteriorDists> {
        match loss {
            Loss::Squared => Estimate::Point(MixtureParams {
                pi_vec: normalized(&self.hn_alpha_vec),
                theta_vecs: self
                    .hn_beta_vecs
                    .iter()
                    .map(|b| normalized(b))
                    .collect(),
            }),
            Loss::ZeroOne => {
                let pi_mode = dirichlet_mode(&self.hn_alpha_vec);
                let theta_modes: Option<Vec<Vec<f64>>> = self
                    .hn_beta_vecs
                    .iter()
                    .map(|b| dirichlet_mode(b))
                    .collect();
                match (pi_mode, theta_modes) {
                    (Some(pi_vec), Some(theta_vecs)) => {
                        let clamped = self
                            .hn_alpha_vec
                            .iter()
                            .chain(self.hn_beta_vecs.iter().flatten())
                            .any(|&a| a <= 1.0);
                        if clamped {
                            log::warn!("{}", ResultWarning::ModeUndefined);
                        }
                        Estimate::Point(MixtureParams {
                            pi_vec,
                            theta_vecs,
                        })
                    }
                    _ => {
                        let warning = ResultWarning::ModeUndefined;
                        log::warn!("{}", warning);
                        Estimate::Undefined(warning)
                    }
                }
            }
            Loss::Abs => Estimate::Point(MixtureParams {
                pi_vec: marginal_medians(&self.hn_alpha_vec),
                theta_vecs: self
                    .hn_beta_vecs
                    .iter()
                    .map(|b| marginal_medians(b))
                    .collect(),
            }),
            Loss::Kl => Estimate::Distribution(PosteriorDists {
                pi_dist: Dirichlet::new_unchecked(self.hn_alpha_vec.clone()),
                theta_dists: self
                    .hn_beta_vecs
                    .iter()
                    .map(|b| Dirichlet::new_unchecked(b.clone()))
                    .collect(),
            }),
        }
    }

    fn reset_hn_params(&mut self) {
        self.hn_alpha_vec = self.h0_alpha_vec.clone();
        self.hn_beta_vecs = vec![self.h0_beta_vec.clone(); self.n_classes];
        self.r_vecs.clear();
        self.calc_pred_dist();
    }
}

impl Predictive for LearnModel {
    type PredPoint = MixtureParams;
    type PredDist = MultinomialMixture;

    fn calc_pred_dist(&mut self) {
        self.p_pi_vec = normalized(&self.hn_alpha_vec);
        self.p_theta_vecs = self
            .hn_beta_vecs
            .iter()
            .map(|b| normalized(b))
            .collect();
    }

    fn make_prediction(
        &self,
        loss: Loss,
    ) -> Estimate<MixtureParams, MultinomialMixture> {
        match loss {
            // the predictive is parameterized by point values, so mean,
            // mode and median all reduce to the parameters themselves
            Loss::Squared | Loss::ZeroOne | Loss::Abs => {
                Estimate::Point(MixtureParams {
                    pi_vec: self.p_pi_vec.clone(),
                    theta_vecs: self.p_theta_vecs.clone(),
                })
            }
            Loss::Kl => Estimate::Distribution(self.predictive_dist()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const TOL: f64 = 1e-12;

    fn symmetric_model() -> LearnModel {
        // K = 2, d = 3, symmetric 0.5 priors
        LearnModel::new(&[0.5, 0.5], &[0.5, 0.5, 0.5]).unwrap()
    }

    #[test]
    fn single_degenerate_row_with_symmetric_prior() {
        let mut model = symmetric_model();
        let report = model
            .update_posterior(&[vec![5, 0, 0]], &VbConfig::new())
            .unwrap();

        // symmetry: both classes share the row equally
        assert_relative_eq!(model.r_vecs()[0][0], 0.5, epsilon = TOL);
        assert_relative_eq!(model.r_vecs()[0][1], 0.5, epsilon = TOL);
        for k in 0..2 {
            assert_relative_eq!(
                model.hn_alpha_vec()[k],
                1.0,
                epsilon = TOL
            );
            let row = &model.hn_beta_vecs()[k];
            assert_relative_eq!(row[0], 3.0, epsilon = TOL);
            assert_relative_eq!(row[1], 0.5, epsilon = TOL);
            assert_relative_eq!(row[2], 0.5, epsilon = TOL);
        }

        // a single row reaches the fixed point after one pass; the second
        // iteration only confirms it
        assert!(report.converged);
        assert_eq!(report.n_iters, 2);
        assert_relative_eq!(report.delta, 0.0, epsilon = TOL);
        assert!(report.warning().is_none());
    }

    #[test]
    fn single_row_adds_exactly_its_responsibility_vector() {
        let mut model = symmetric_model();
        model
            .update_posterior(&[vec![2, 2, 1]], &VbConfig::new())
            .unwrap();
        for k in 0..2 {
            assert_relative_eq!(
                model.hn_alpha_vec()[k],
                0.5 + model.r_vecs()[0][k],
                epsilon = TOL
            );
        }
    }

    #[test]
    fn posterior_mass_grows_by_the_batch_size() {
        let mut model = LearnModel::new(&[0.5, 1.5], &[1.0, 2.0, 0.5]).unwrap();
        let x = vec![vec![3, 1, 1], vec![0, 4, 1], vec![2, 2, 6]];
        model.update_posterior(&x, &VbConfig::new()).unwrap();

        let alpha_total: f64 = model.hn_alpha_vec().iter().sum();
        assert_relative_eq!(alpha_total, 2.0 + 3.0, epsilon = 1e-9);

        // every class row gained at least its prior mass, and the total
        // gain over all classes is the total count mass
        let prior_row_total = 3.5;
        let mut gained = 0.0;
        for row in model.hn_beta_vecs() {
            let row_total: f64 = row.iter().sum();
            assert!(row_total >= prior_row_total - TOL);
            gained += row_total - prior_row_total;
        }
        let count_mass: f64 =
            x.iter().flatten().map(|&c| f64::from(c)).sum();
        assert_relative_eq!(gained, count_mass, epsilon = 1e-9);
    }

    #[test]
    fn responsibility_rows_sum_to_one() {
        let mut model = LearnModel::new(&[0.5, 1.0, 2.0], &[0.5; 4]).unwrap();
        let x = vec![vec![10, 0, 0, 0], vec![0, 0, 0, 7], vec![1, 2, 3, 4]];
        model.update_posterior(&x, &VbConfig::new()).unwrap();
        assert_eq!(model.r_vecs().len(), 3);
        for row in model.r_vecs() {
            assert_relative_eq!(row.iter().sum::<f64>(), 1.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn zero_tolerance_exhausts_the_iteration_budget() {
        let mut model = symmetric_model();
        let config = VbConfig::new().max_iters(7).tolerance(0.0);
        let report = model
            .update_posterior(&[vec![5, 0, 0], vec![0, 3, 2]], &config)
            .unwrap();

        assert!(!report.converged);
        assert_eq!(report.n_iters, 7);
        assert!(matches!(
            report.warning(),
            Some(ResultWarning::NotConverged { max_iters: 7, .. })
        ));

        // the best estimate is still mass-consistent
        let alpha_total: f64 = model.hn_alpha_vec().iter().sum();
        assert_relative_eq!(alpha_total, 1.0 + 2.0, epsilon = 1e-9);
    }

    #[test]
    fn update_overwrites_rather_than_accumulates() {
        let mut model = symmetric_model();
        let x = vec![vec![4, 1, 0], vec![1, 1, 3]];
        model.update_posterior(&x, &VbConfig::new()).unwrap();
        let first = model.get_hn_params();
        model.update_posterior(&x, &VbConfig::new()).unwrap();
        assert_eq!(model.get_hn_params(), first);
    }

    #[test]
    fn reset_and_rerun_is_deterministic() {
        let mut model = symmetric_model();
        let x = vec![vec![2, 2, 1], vec![0, 1, 4]];
        model.update_posterior(&x, &VbConfig::new()).unwrap();
        let first = model.get_hn_params();
        model.reset_hn_params();
        model.update_posterior(&x, &VbConfig::new()).unwrap();
        assert_eq!(model.get_hn_params(), first);
    }

    #[test]
    fn random_init_is_deterministic_under_equal_seeds() {
        let config = MixtureConfig::new().n_classes(2).degree(3).seed(42);
        let mut a = LearnModel::from_config(&config).unwrap();
        let mut b = LearnModel::from_config(&config).unwrap();
        let x = vec![vec![9, 1, 0], vec![0, 2, 8], vec![8, 1, 1]];
        let vb = VbConfig::new().init(ResponsibilityInit::Random);
        a.update_posterior(&x, &vb).unwrap();
        b.update_posterior(&x, &vb).unwrap();
        assert_eq!(a.get_hn_params(), b.get_hn_params());
    }

    #[test]
    fn update_rejects_malformed_batches() {
        let mut model = symmetric_model();
        assert_eq!(
            model.update_posterior(&[], &VbConfig::new()),
            Err(DataFormatError::EmptySample)
        );
        assert_eq!(
            model.update_posterior(&[vec![1, 2]], &VbConfig::new()),
            Err(DataFormatError::WrongDegree {
                row: 0,
                len: 2,
                degree: 3
            })
        );
        assert_eq!(
            model.update_posterior(
                &[vec![1, 1, 1], vec![0, 0, 0]],
                &VbConfig::new()
            ),
            Err(DataFormatError::ZeroTrials { row: 1 })
        );
    }

    #[test]
    fn predictive_parameters_are_normalized_posteriors() {
        let mut model = symmetric_model();
        model
            .set_hn_params(
                &[1.0, 3.0],
                &[vec![1.0, 1.0, 2.0], vec![3.0, 1.0, 1.0]],
            )
            .unwrap();
        assert_relative_eq!(model.p_pi_vec()[0], 0.25, epsilon = TOL);
        assert_relative_eq!(model.p_pi_vec()[1], 0.75, epsilon = TOL);
        assert_relative_eq!(model.p_theta_vecs()[0][2], 0.5, epsilon = TOL);
        assert_relative_eq!(model.p_theta_vecs()[1][0], 0.6, epsilon = TOL);
    }

    #[test]
    fn calc_pred_dist_is_idempotent() {
        let mut model = symmetric_model();
        model
            .update_posterior(&[vec![3, 1, 1]], &VbConfig::new())
            .unwrap();
        let first = model.get_p_params();
        model.calc_pred_dist();
        assert_eq!(model.get_p_params(), first);
    }

    #[test]
    fn set_hn_params_rejects_wrong_shapes() {
        let mut model = symmetric_model();
        assert!(matches!(
            model.set_hn_params(&[1.0], &[vec![1.0; 3], vec![1.0; 3]]),
            Err(ParameterFormatError::LengthMismatch {
                name: "hn_alpha_vec",
                ..
            })
        ));
        assert!(matches!(
            model.set_hn_params(&[1.0, 1.0], &[vec![1.0, 1.0], vec![1.0, 1.0]]),
            Err(ParameterFormatError::LengthMismatch {
                name: "hn_beta_vecs",
                ..
            })
        ));
    }

    #[test]
    fn set_h0_params_resets_the_posterior() {
        let mut model = symmetric_model();
        model
            .update_posterior(&[vec![5, 0, 0]], &VbConfig::new())
            .unwrap();
        model
            .set_h0_params(&[1.0, 2.0, 3.0], &[0.5, 0.5])
            .unwrap();
        assert_eq!(model.n_classes(), 3);
        assert_eq!(model.degree(), 2);
        assert_eq!(model.hn_alpha_vec(), &[1.0, 2.0, 3.0]);
        assert!(model.r_vecs().is_empty());
        // predictive recomputed from the new prior
        assert_relative_eq!(model.p_pi_vec()[2], 0.5, epsilon = TOL);
    }

    #[test]
    fn set_h0_params_is_atomic() {
        let mut model = symmetric_model();
        let before_h0 = model.get_h0_params();
        assert!(model.set_h0_params(&[1.0, -1.0], &[0.5, 0.5]).is_err());
        assert_eq!(model.get_h0_params(), before_h0);
        assert_eq!(model.n_classes(), 2);
    }

    #[test]
    fn squared_loss_returns_posterior_means() {
        let mut model = symmetric_model();
        model
            .set_hn_params(
                &[1.0, 3.0],
                &[vec![1.0, 1.0, 2.0], vec![1.0, 1.0, 2.0]],
            )
            .unwrap();
        let params = model.estimate_params(Loss::Squared).point().unwrap();
        assert_relative_eq!(params.pi_vec[1], 0.75, epsilon = TOL);
        assert_relative_eq!(params.theta_vecs[0][2], 0.5, epsilon = TOL);
    }

    #[test]
    fn zero_one_loss_returns_dirichlet_modes() {
        let mut model = symmetric_model();
        model
            .set_hn_params(
                &[3.0, 3.0],
                &[vec![2.0, 2.0, 2.0], vec![4.0, 2.0, 2.0]],
            )
            .unwrap();
        let params = model.estimate_params(Loss::ZeroOne).point().unwrap();
        assert_relative_eq!(params.pi_vec[0], 0.5, epsilon = TOL);
        // (4-1)/(8-3) = 0.6
        assert_relative_eq!(params.theta_vecs[1][0], 0.6, epsilon = TOL);
    }

    #[test]
    fn zero_one_loss_is_undefined_at_the_default_prior() {
        // all concentrations 0.5: every coordinate floors out
        let model = symmetric_model();
        let est = model.estimate_params(Loss::ZeroOne);
        assert_eq!(est.warning(), Some(&ResultWarning::ModeUndefined));
    }

    #[test]
    fn abs_loss_returns_marginal_medians() {
        let mut model = symmetric_model();
        model
            .set_hn_params(
                &[2.0, 2.0],
                &[vec![1.0, 1.0, 1.0], vec![1.0, 1.0, 1.0]],
            )
            .unwrap();
        let params = model.estimate_params(Loss::Abs).point().unwrap();
        // Beta(2, 2) is symmetric about 1/2
        assert_relative_eq!(params.pi_vec[0], 0.5, epsilon = 1e-9);
    }

    #[test]
    fn kl_loss_returns_the_posterior_dirichlets() {
        let mut model = symmetric_model();
        model
            .update_posterior(&[vec![5, 0, 0]], &VbConfig::new())
            .unwrap();
        let dists = model.estimate_params(Loss::Kl).distribution().unwrap();
        assert_eq!(dists.pi_dist.alphas(), &vec![1.0, 1.0]);
        assert_eq!(dists.theta_dists.len(), 2);
        assert_eq!(dists.theta_dists[0].alphas(), &vec![3.0, 0.5, 0.5]);
    }

    #[test]
    fn prediction_uses_pre_update_state() {
        let mut model = symmetric_model();
        let before = model.make_prediction(Loss::Squared).point().unwrap();
        let returned = model
            .pred_and_update(&[5, 0, 0], Loss::Squared, &VbConfig::new())
            .unwrap()
            .point()
            .unwrap();
        assert_eq!(returned, before);
        // and the posterior did move
        assert_relative_eq!(model.hn_alpha_vec()[0], 1.0, epsilon = TOL);
    }

    #[test]
    fn predictive_density_matches_the_plug_in_mixture() {
        let mut model = symmetric_model();
        model
            .update_posterior(&[vec![5, 0, 0]], &VbConfig::new())
            .unwrap();
        let expected = model.predictive_dist().ln_f(&[2, 1, 0]).unwrap();
        assert_relative_eq!(
            model.ln_pred_density(&[2, 1, 0]).unwrap(),
            expected,
            epsilon = TOL
        );
        // and it is a genuine log mass
        assert!(expected < 0.0);
    }

    #[test]
    fn elbo_is_monotone_over_iterations() {
        // run the same batch with growing iteration caps; the final ELBO
        // must never decrease
        let x = vec![
            vec![9, 1, 0],
            vec![0, 2, 8],
            vec![8, 1, 1],
            vec![1, 0, 9],
        ];
        let mut last = f64::NEG_INFINITY;
        for cap in [1, 2, 4, 8, 16] {
            let config = MixtureConfig::new().n_classes(2).degree(3).seed(3);
            let mut model = LearnModel::from_config(&config).unwrap();
            let vb = VbConfig::new()
                .max_iters(cap)
                .tolerance(0.0)
                .init(ResponsibilityInit::Random);
            let report = model.update_posterior(&x, &vb).unwrap();
            assert!(report.elbo >= last - 1e-9);
            last = report.elbo;
        }
    }
}
