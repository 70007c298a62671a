//! Predictive distributions and special-function numerics.
//!
//! The posterior-predictive families of the two models are not provided by
//! `rv` (Lomax for the exponential model, a categorical mixture over count
//! vectors for the multinomial mixture), so they live here, together with
//! the incomplete-gamma/beta plumbing used for medians and credible
//! intervals.
use rand::Rng;
use serde::{Deserialize, Serialize};
use special::{Beta as _, Gamma as _};

use parambayes_utils::logsumexp;

use crate::error::DataFormatError;

/// ln n! via the log-gamma function
#[inline]
pub fn ln_factorial(n: u32) -> f64 {
    (f64::from(n) + 1.0).ln_gamma().0
}

/// Log multinomial coefficient ln( n! / (x_1! ... x_d!) ) where n = Σ x_j
pub fn ln_multinomial_coef(xs: &[u32]) -> f64 {
    let n: u32 = xs.iter().sum();
    xs.iter()
        .fold(ln_factorial(n), |acc, &x| acc - ln_factorial(x))
}

/// CDF of Gamma(shape, rate) via the regularized lower incomplete gamma
pub fn gamma_cdf(shape: f64, rate: f64, x: f64) -> f64 {
    if x <= 0.0 {
        0.0
    } else {
        (rate * x).inc_gamma(shape)
    }
}

/// Quantile of Gamma(shape, rate) by bisection on the CDF
///
/// `p` is clamped away from 0 and 1; the bracket is grown geometrically
/// from the mean + 10·sd upper bound before bisecting.
pub fn gamma_quantile(shape: f64, rate: f64, p: f64) -> f64 {
    let p = p.clamp(f64::EPSILON, 1.0 - f64::EPSILON);
    let mean = shape / rate;
    let sd = shape.sqrt() / rate;
    let mut lo = 0.0;
    let mut hi = 10.0_f64.mul_add(sd, mean);
    while gamma_cdf(shape, rate, hi) < p {
        hi *= 2.0;
    }
    for _ in 0..200 {
        let mid = 0.5 * (lo + hi);
        if gamma_cdf(shape, rate, mid) < p {
            lo = mid;
        } else {
            hi = mid;
        }
        if hi - lo < 1e-14 * hi.max(1.0) {
            break;
        }
    }
    0.5 * (lo + hi)
}

/// Median of Beta(a, b) via the inverse regularized incomplete beta
pub fn beta_median(a: f64, b: f64) -> f64 {
    0.5_f64.inv_inc_beta(a, b, a.ln_beta(b))
}

/// Lomax (Pareto type II) distribution
///
/// The posterior predictive of the Gamma-Exponential conjugate pair:
/// if λ ~ Gamma(κ, λ₀) then x ~ Lomax(κ, λ₀) marginally.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Lomax {
    shape: f64,
    scale: f64,
}

impl Lomax {
    /// Create a Lomax(shape, scale) without checking the parameters
    ///
    /// Both parameters must be positive and finite.
    pub fn new_unchecked(shape: f64, scale: f64) -> Self {
        Lomax { shape, scale }
    }

    pub fn shape(&self) -> f64 {
        self.shape
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    /// Log density at `x` (−∞ for x < 0)
    pub fn ln_f(&self, x: f64) -> f64 {
        if x < 0.0 {
            f64::NEG_INFINITY
        } else {
            self.shape.ln() - self.scale.ln()
                - (self.shape + 1.0) * (x / self.scale).ln_1p()
        }
    }

    pub fn f(&self, x: f64) -> f64 {
        self.ln_f(x).exp()
    }

    pub fn cdf(&self, x: f64) -> f64 {
        if x <= 0.0 {
            0.0
        } else {
            1.0 - (-self.shape * (x / self.scale).ln_1p()).exp()
        }
    }

    /// Closed-form quantile function
    pub fn invcdf(&self, p: f64) -> f64 {
        debug_assert!((0.0..1.0).contains(&p));
        self.scale * ((1.0 - p).powf(-self.shape.recip()) - 1.0)
    }

    /// The mean, which only exists for shape > 1
    pub fn mean(&self) -> Option<f64> {
        if self.shape > 1.0 {
            Some(self.scale / (self.shape - 1.0))
        } else {
            None
        }
    }

    pub fn median(&self) -> f64 {
        self.scale * (2.0_f64.powf(self.shape.recip()) - 1.0)
    }

    /// The mode, which sits at the origin
    pub fn mode(&self) -> f64 {
        0.0
    }

    /// Draw by inverting the CDF on a uniform variate
    pub fn draw<R: Rng>(&self, rng: &mut R) -> f64 {
        self.invcdf(rng.gen::<f64>())
    }
}

/// Mixture of multinomial distributions with point parameters
///
/// The plug-in posterior predictive of the multinomial mixture model,
/// parameterized by the normalized posterior hyperparameters
/// (`p_pi_vec`, `p_theta_vecs`).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MultinomialMixture {
    pi_vec: Vec<f64>,
    theta_vecs: Vec<Vec<f64>>,
}

impl MultinomialMixture {
    /// Build from a mixing weight vector and per-class parameter rows
    /// without validating them
    ///
    /// `pi_vec` must sum to 1 and every row of `theta_vecs` must be a
    /// distribution over the same number of categories.
    pub fn new_unchecked(pi_vec: Vec<f64>, theta_vecs: Vec<Vec<f64>>) -> Self {
        MultinomialMixture { pi_vec, theta_vecs }
    }

    pub fn n_classes(&self) -> usize {
        self.pi_vec.len()
    }

    pub fn degree(&self) -> usize {
        self.theta_vecs[0].len()
    }

    pub fn pi_vec(&self) -> &[f64] {
        &self.pi_vec
    }

    pub fn theta_vecs(&self) -> &[Vec<f64>] {
        &self.theta_vecs
    }

    /// Log mass of the count vector `xs`, multinomial coefficient included
    ///
    /// Computed in log space with a log-sum-exp over classes.
    pub fn ln_f(&self, xs: &[u32]) -> Result<f64, DataFormatError> {
        if xs.len() != self.degree() {
            return Err(DataFormatError::WrongDegree {
                row: 0,
                len: xs.len(),
                degree: self.degree(),
            });
        }
        if xs.iter().all(|&x| x == 0) {
            return Err(DataFormatError::ZeroTrials { row: 0 });
        }

        let ln_coef = ln_multinomial_coef(xs);
        let ln_terms: Vec<f64> = self
            .pi_vec
            .iter()
            .zip(self.theta_vecs.iter())
            .map(|(&pi, theta)| {
                let ln_like: f64 = xs
                    .iter()
                    .zip(theta.iter())
                    .filter(|(&x, _)| x > 0)
                    .map(|(&x, &t)| f64::from(x) * t.ln())
                    .sum();
                pi.ln() + ln_coef + ln_like
            })
            .collect();
        Ok(logsumexp(&ln_terms))
    }

    pub fn f(&self, xs: &[u32]) -> Result<f64, DataFormatError> {
        self.ln_f(xs).map(f64::exp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const TOL: f64 = 1e-10;

    #[test]
    fn ln_multinomial_coef_binomial_case() {
        // C(5, 2) = 10
        assert_relative_eq!(
            ln_multinomial_coef(&[2, 3]),
            10.0_f64.ln(),
            epsilon = TOL
        );
    }

    #[test]
    fn ln_multinomial_coef_degenerate_row_is_zero() {
        assert_relative_eq!(
            ln_multinomial_coef(&[5, 0, 0]),
            0.0,
            epsilon = TOL
        );
    }

    #[test]
    fn gamma_cdf_with_unit_shape_is_exponential() {
        // Gamma(1, rate) is Exponential(rate)
        let rate = 2.0;
        for x in [0.1, 0.5, 1.0, 3.0] {
            assert_relative_eq!(
                gamma_cdf(1.0, rate, x),
                1.0 - (-rate * x).exp(),
                epsilon = 1e-9
            );
        }
    }

    #[test]
    fn gamma_quantile_inverts_the_cdf() {
        let (shape, rate) = (4.0, 7.0);
        for p in [0.05, 0.5, 0.95] {
            let q = gamma_quantile(shape, rate, p);
            assert_relative_eq!(gamma_cdf(shape, rate, q), p, epsilon = 1e-9);
        }
    }

    #[test]
    fn gamma_quantile_median_of_unit_shape() {
        // median of Exponential(2) is ln(2)/2
        assert_relative_eq!(
            gamma_quantile(1.0, 2.0, 0.5),
            2.0_f64.ln() / 2.0,
            epsilon = 1e-9
        );
    }

    #[test]
    fn beta_median_is_half_for_symmetric_parameters() {
        for a in [0.5, 1.0, 3.5] {
            assert_relative_eq!(beta_median(a, a), 0.5, epsilon = 1e-9);
        }
    }

    #[test]
    fn lomax_cdf_inverts_quantile() {
        let lomax = Lomax::new_unchecked(4.0, 7.0);
        for p in [0.1, 0.5, 0.9] {
            assert_relative_eq!(
                lomax.cdf(lomax.invcdf(p)),
                p,
                epsilon = 1e-12
            );
        }
    }

    #[test]
    fn lomax_median_matches_quantile() {
        let lomax = Lomax::new_unchecked(1.5, 2.0);
        assert_relative_eq!(
            lomax.median(),
            lomax.invcdf(0.5),
            epsilon = 1e-12
        );
    }

    #[test]
    fn lomax_mean_requires_shape_above_one() {
        assert_eq!(Lomax::new_unchecked(0.5, 1.0).mean(), None);
        assert_relative_eq!(
            Lomax::new_unchecked(3.0, 4.0).mean().unwrap(),
            2.0,
            epsilon = TOL
        );
    }

    #[test]
    fn lomax_density_integrates_near_one() {
        // crude trapezoid over [0, 200] catches almost all the mass
        let lomax = Lomax::new_unchecked(2.5, 1.5);
        let n = 200_000;
        let hi = 200.0;
        let dx = hi / n as f64;
        let total: f64 = (0..n)
            .map(|i| lomax.f((i as f64 + 0.5) * dx) * dx)
            .sum();
        assert_relative_eq!(total, 1.0, epsilon = 1e-3);
    }

    #[test]
    fn mixture_mass_sums_to_one_over_full_support() {
        // d = 2, n = 3 trials: support is {[0,3], [1,2], [2,1], [3,0]}
        let mm = MultinomialMixture::new_unchecked(
            vec![0.3, 0.7],
            vec![vec![0.2, 0.8], vec![0.9, 0.1]],
        );
        let total: f64 = (0..=3)
            .map(|x0| mm.f(&[x0, 3 - x0]).unwrap())
            .sum();
        assert_relative_eq!(total, 1.0, epsilon = TOL);
    }

    #[test]
    fn single_class_mixture_is_the_multinomial_pmf() {
        let mm = MultinomialMixture::new_unchecked(
            vec![1.0],
            vec![vec![0.5, 0.3, 0.2]],
        );
        // pmf of [2, 1, 0] under Multinomial(3; 0.5, 0.3, 0.2)
        let expected = 3.0 * 0.5 * 0.5 * 0.3;
        assert_relative_eq!(mm.f(&[2, 1, 0]).unwrap(), expected, epsilon = TOL);
    }

    #[test]
    fn mixture_rejects_malformed_rows() {
        let mm = MultinomialMixture::new_unchecked(
            vec![1.0],
            vec![vec![0.5, 0.5]],
        );
        assert!(mm.ln_f(&[1, 2, 3]).is_err());
        assert!(mm.ln_f(&[0, 0]).is_err());
    }

    #[test]
    fn mixture_handles_zero_probability_categories() {
        let mm = MultinomialMixture::new_unchecked(
            vec![1.0],
            vec![vec![1.0, 0.0]],
        );
        // a count in the zero-probability category has zero mass
        assert_eq!(mm.f(&[1, 1]).unwrap(), 0.0);
        // counts confined to the supported category have full mass
        assert_relative_eq!(mm.f(&[2, 0]).unwrap(), 1.0, epsilon = TOL);
    }
}
