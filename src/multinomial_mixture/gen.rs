//! The stochastic data generative model and its prior.
use std::path::Path;

use rand::SeedableRng;
use rand_xoshiro::Xoshiro256Plus;
use serde::{Deserialize, Serialize};

use parambayes_consts::DEFAULT_DIRICHLET_ALPHA;
use parambayes_utils::{bincount, uniform_vec};

use crate::check;
use crate::error::{
    DataFormatError, ParameterFormatError, ParameterFormatWarning,
};
use crate::metadata::{self, MetadataError, MixtureSample};
use crate::multinomial_mixture::MixtureConfig;
use crate::rv::dist::{Categorical, Dirichlet};
use crate::rv::traits::Rv;
use crate::traits::{ParamMap, ParamValue};

/// Mixture of multinomials: z ~ Categorical(π), x | z=k ~ Multinomial(n, θ_k)
///
/// π carries a Dirichlet(h_alpha_vec) prior and each θ_k a
/// Dirichlet(h_beta_vec) prior. Used to simulate labeled count data.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GenModel {
    n_classes: usize,
    degree: usize,
    pi_vec: Vec<f64>,
    theta_vecs: Vec<Vec<f64>>,
    h_alpha_vec: Vec<f64>,
    h_beta_vec: Vec<f64>,
    rng: Xoshiro256Plus,
}

impl Default for GenModel {
    fn default() -> Self {
        GenModel::from_config(&MixtureConfig::default())
            .expect("the default configuration is always valid")
    }
}

impl GenModel {
    /// Build a model from a resolved configuration
    ///
    /// Parameters and hyperparameters not present in the configuration are
    /// filled with uniform vectors and the default symmetric concentration.
    pub fn from_config(
        config: &MixtureConfig,
    ) -> Result<Self, ParameterFormatError> {
        let (n_classes, degree) = config.resolve_shape()?;

        let pi_vec = match &config.pi_vec {
            Some(pi) => check::simplex_vec(pi, "pi_vec")?,
            None => uniform_vec(n_classes),
        };
        let theta_vecs = match &config.theta_vecs {
            Some(theta) => check::simplex_vecs(theta, "theta_vecs")?,
            None => vec![uniform_vec(degree); n_classes],
        };
        let h_alpha_vec = match &config.h_alpha_vec {
            Some(alpha) => check::pos_float_vec(alpha, "h_alpha_vec")?,
            None => vec![DEFAULT_DIRICHLET_ALPHA; n_classes],
        };
        let h_beta_vec = match &config.h_beta_vec {
            Some(beta) => check::pos_float_vec(beta, "h_beta_vec")?,
            None => vec![DEFAULT_DIRICHLET_ALPHA; degree],
        };

        let rng = match config.seed {
            Some(seed) => Xoshiro256Plus::seed_from_u64(seed),
            None => Xoshiro256Plus::from_entropy(),
        };

        Ok(GenModel {
            n_classes,
            degree,
            pi_vec,
            theta_vecs,
            h_alpha_vec,
            h_beta_vec,
            rng,
        })
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

    pub fn pi_vec(&self) -> &[f64] {
        &self.pi_vec
    }

    pub fn theta_vecs(&self) -> &[Vec<f64>] {
        &self.theta_vecs
    }

    /// Set the parameters of the generative model
    ///
    /// `pi_vec` and `theta_vecs` must be mutually consistent; the
    /// hyperparameter vectors are dependents and are reinitialized to the
    /// default concentration (with a warning) if their dimension no longer
    /// matches.
    pub fn set_params(
        &mut self,
        pi_vec: &[f64],
        theta_vecs: &[Vec<f64>],
    ) -> Result<Vec<ParameterFormatWarning>, ParameterFormatError> {
        let pi_vec = check::simplex_vec(pi_vec, "pi_vec")?;
        let theta_vecs = check::simplex_vecs(theta_vecs, "theta_vecs")?;
        if theta_vecs.len() != pi_vec.len() {
            return Err(ParameterFormatError::InconsistentShapes {
                a: "pi_vec",
                a_len: pi_vec.len(),
                b: "theta_vecs",
                b_len: theta_vecs.len(),
            });
        }

        self.n_classes = pi_vec.len();
        self.degree = theta_vecs[0].len();
        self.pi_vec = pi_vec;
        self.theta_vecs = theta_vecs;

        let mut warnings = Vec::new();
        if self.h_alpha_vec.len() != self.n_classes {
            self.h_alpha_vec =
                vec![DEFAULT_DIRICHLET_ALPHA; self.n_classes];
            let w = ParameterFormatWarning::HAlphaVecReinitialized;
            log::warn!("{}", w);
            warnings.push(w);
        }
        if self.h_beta_vec.len() != self.degree {
            self.h_beta_vec = vec![DEFAULT_DIRICHLET_ALPHA; self.degree];
            let w = ParameterFormatWarning::HBetaVecReinitialized;
            log::warn!("{}", w);
            warnings.push(w);
        }
        Ok(warnings)
    }

    pub fn get_params(&self) -> ParamMap {
        ParamMap::from([
            ("pi_vec", ParamValue::from(self.pi_vec.clone())),
            ("theta_vecs", ParamValue::from(self.theta_vecs.clone())),
        ])
    }

    /// Set the hyperparameters of the prior distribution
    ///
    /// The model constants (K, d) follow the new vectors; `pi_vec` and
    /// `theta_vecs` are dependents and are reinitialized to uniform (with a
    /// warning) if their dimension no longer matches.
    pub fn set_h_params(
        &mut self,
        h_alpha_vec: &[f64],
        h_beta_vec: &[f64],
    ) -> Result<Vec<ParameterFormatWarning>, ParameterFormatError> {
        let h_alpha_vec = check::pos_float_vec(h_alpha_vec, "h_alpha_vec")?;
        let h_beta_vec = check::pos_float_vec(h_beta_vec, "h_beta_vec")?;

        self.n_classes = h_alpha_vec.len();
        self.degree = h_beta_vec.len();
        self.h_alpha_vec = h_alpha_vec;
        self.h_beta_vec = h_beta_vec;

        let mut warnings = Vec::new();
        if self.pi_vec.len() != self.n_classes {
            self.pi_vec = uniform_vec(self.n_classes);
            let w = ParameterFormatWarning::PiVecReinitialized;
            log::warn!("{}", w);
            warnings.push(w);
        }
        let theta_mismatched = self.theta_vecs.len() != self.n_classes
            || self.theta_vecs[0].len() != self.degree;
        if theta_mismatched {
            self.theta_vecs =
                vec![uniform_vec(self.degree); self.n_classes];
            let w = ParameterFormatWarning::ThetaVecsReinitialized;
            log::warn!("{}", w);
            warnings.push(w);
        }
        Ok(warnings)
    }

    pub fn get_h_params(&self) -> ParamMap {
        ParamMap::from([
            ("h_alpha_vec", ParamValue::from(self.h_alpha_vec.clone())),
            ("h_beta_vec", ParamValue::from(self.h_beta_vec.clone())),
        ])
    }

    /// Draw (π, θ) from the prior and install them as current parameters
    pub fn gen_params(&mut self) -> &mut Self {
        let pi_prior = Dirichlet::new_unchecked(self.h_alpha_vec.clone());
        self.pi_vec = pi_prior.draw(&mut self.rng);
        let theta_prior = Dirichlet::new_unchecked(self.h_beta_vec.clone());
        self.theta_vecs = (0..self.n_classes)
            .map(|_| theta_prior.draw(&mut self.rng))
            .collect();
        self
    }

    /// Draw a labeled sample from the generative model
    ///
    /// Returns the count matrix `x` (sample_size × degree, rows summing to
    /// `n_trials`) and the one-hot class indicators `z`
    /// (sample_size × n_classes).
    pub fn gen_sample(
        &mut self,
        sample_size: usize,
        n_trials: u32,
    ) -> Result<(Vec<Vec<u32>>, Vec<Vec<u8>>), DataFormatError> {
        if sample_size == 0 {
            return Err(DataFormatError::ZeroSampleSize);
        }
        if n_trials == 0 {
            return Err(DataFormatError::ZeroNTrials);
        }

        let class_dist = Categorical::new_unchecked(
            self.pi_vec.iter().map(|&p| p.ln()).collect(),
        );
        let category_dists: Vec<Categorical> = self
            .theta_vecs
            .iter()
            .map(|row| {
                Categorical::new_unchecked(
                    row.iter().map(|&t| t.ln()).collect(),
                )
            })
            .collect();

        let mut x = Vec::with_capacity(sample_size);
        let mut z = Vec::with_capacity(sample_size);
        for _ in 0..sample_size {
            let k: usize = class_dist.draw(&mut self.rng);
            let mut indicator = vec![0_u8; self.n_classes];
            indicator[k] = 1;

            let draws: Vec<usize> = (0..n_trials)
                .map(|_| category_dists[k].draw(&mut self.rng))
                .collect();
            x.push(bincount(&draws, self.degree));
            z.push(indicator);
        }
        Ok((x, z))
    }

    /// Generate a sample and persist it under the keys `"x"` and `"z"`
    pub fn save_sample<P: AsRef<Path>>(
        &mut self,
        path: P,
        sample_size: usize,
        n_trials: u32,
    ) -> Result<(), MetadataError> {
        let (x, z) = self.gen_sample(sample_size, n_trials)?;
        metadata::save_mixture_sample(path, &MixtureSample { x, z })
    }

    /// Generated count rows normalized to proportions
    ///
    /// A plot-ready array for a visualization sink (histogram source for
    /// d = 2, scatter source for d = 3).
    pub fn sample_fractions(
        &mut self,
        sample_size: usize,
        n_trials: u32,
    ) -> Result<Vec<Vec<f64>>, DataFormatError> {
        let (x, _) = self.gen_sample(sample_size, n_trials)?;
        let nf = f64::from(n_trials);
        Ok(x.iter()
            .map(|row| row.iter().map(|&c| f64::from(c) / nf).collect())
            .collect())
    }
}
