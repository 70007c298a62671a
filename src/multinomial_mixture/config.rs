//! Shape and prior specification for the mixture models.
use serde::{Deserialize, Serialize};

use parambayes_consts::{DEFAULT_DEGREE, DEFAULT_N_CLASSES};

use crate::check;
use crate::error::ParameterFormatError;

/// Configuration for building a mixture `GenModel` or `LearnModel`
///
/// The number of classes K and the degree d can each come from several
/// sources. Precedence: an explicit integer beats a length inferred from a
/// supplied vector, which beats the global default (K = 2, d = 3). All
/// supplied sources are validated against each other once, at resolution
/// time; a disagreement is a `ParameterFormatError`, never a silent pick.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MixtureConfig {
    pub n_classes: Option<usize>,
    pub degree: Option<usize>,
    pub pi_vec: Option<Vec<f64>>,
    pub theta_vecs: Option<Vec<Vec<f64>>>,
    pub h_alpha_vec: Option<Vec<f64>>,
    pub h_beta_vec: Option<Vec<f64>>,
    pub seed: Option<u64>,
}

impl MixtureConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn n_classes(mut self, k: usize) -> Self {
        self.n_classes = Some(k);
        self
    }

    pub fn degree(mut self, d: usize) -> Self {
        self.degree = Some(d);
        self
    }

    pub fn pi_vec(mut self, pi_vec: Vec<f64>) -> Self {
        self.pi_vec = Some(pi_vec);
        self
    }

    pub fn theta_vecs(mut self, theta_vecs: Vec<Vec<f64>>) -> Self {
        self.theta_vecs = Some(theta_vecs);
        self
    }

    pub fn h_alpha_vec(mut self, h_alpha_vec: Vec<f64>) -> Self {
        self.h_alpha_vec = Some(h_alpha_vec);
        self
    }

    pub fn h_beta_vec(mut self, h_beta_vec: Vec<f64>) -> Self {
        self.h_beta_vec = Some(h_beta_vec);
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Resolve (n_classes, degree) from the supplied sources
    ///
    /// Every source that was supplied must agree with the resolved value.
    pub fn resolve_shape(
        &self,
    ) -> Result<(usize, usize), ParameterFormatError> {
        let mut k_sources: Vec<(&'static str, usize)> = Vec::new();
        if let Some(k) = self.n_classes {
            k_sources.push(("n_classes", check::pos_int(k, "n_classes")?));
        }
        if let Some(pi) = &self.pi_vec {
            k_sources.push(("pi_vec", pi.len()));
        }
        if let Some(theta) = &self.theta_vecs {
            k_sources.push(("theta_vecs", theta.len()));
        }
        if let Some(alpha) = &self.h_alpha_vec {
            k_sources.push(("h_alpha_vec", alpha.len()));
        }
        let n_classes = resolve_sources(&k_sources, DEFAULT_N_CLASSES)?;

        let mut d_sources: Vec<(&'static str, usize)> = Vec::new();
        if let Some(d) = self.degree {
            d_sources.push(("degree", check::pos_int(d, "degree")?));
        }
        if let Some(theta) = &self.theta_vecs {
            // row widths are checked for raggedness at validation time
            d_sources.push(("theta_vecs", theta.first().map_or(0, Vec::len)));
        }
        if let Some(beta) = &self.h_beta_vec {
            d_sources.push(("h_beta_vec", beta.len()));
        }
        let degree = resolve_sources(&d_sources, DEFAULT_DEGREE)?;

        Ok((n_classes, degree))
    }
}

fn resolve_sources(
    sources: &[(&'static str, usize)],
    default: usize,
) -> Result<usize, ParameterFormatError> {
    match sources.first() {
        None => Ok(default),
        Some(&(name, value)) => {
            if value == 0 {
                return Err(ParameterFormatError::Empty { name });
            }
            for &(other, other_value) in &sources[1..] {
                if other_value != value {
                    return Err(ParameterFormatError::InconsistentShapes {
                        a: name,
                        a_len: value,
                        b: other,
                        b_len: other_value,
                    });
                }
            }
            Ok(value)
        }
    }
}
