//! Input validation preconditions.
//!
//! Every public constructor and setter funnels its arguments through these
//! checks before any model state is touched, so the models themselves only
//! ever hold valid hyperparameters.
use crate::error::ParameterFormatError;

const SUM_TO_ONE_TOL: f64 = 1e-10;

pub(crate) fn pos_float(
    x: f64,
    name: &'static str,
) -> Result<f64, ParameterFormatError> {
    if x.is_finite() && x > 0.0 {
        Ok(x)
    } else {
        Err(ParameterFormatError::NotPositive { name, value: x })
    }
}

pub(crate) fn pos_int(
    n: usize,
    name: &'static str,
) -> Result<usize, ParameterFormatError> {
    if n > 0 {
        Ok(n)
    } else {
        Err(ParameterFormatError::ZeroCount { name })
    }
}

/// A non-empty vector of positive, finite reals (Dirichlet/Gamma parameters)
pub(crate) fn pos_float_vec(
    xs: &[f64],
    name: &'static str,
) -> Result<Vec<f64>, ParameterFormatError> {
    if xs.is_empty() {
        return Err(ParameterFormatError::Empty { name });
    }
    for &x in xs {
        pos_float(x, name)?;
    }
    Ok(xs.to_vec())
}

/// A point on the simplex: entries in [0, 1] summing to 1
pub(crate) fn simplex_vec(
    xs: &[f64],
    name: &'static str,
) -> Result<Vec<f64>, ParameterFormatError> {
    if xs.is_empty() {
        return Err(ParameterFormatError::Empty { name });
    }
    for &x in xs {
        if !(x.is_finite() && (0.0..=1.0).contains(&x)) {
            return Err(ParameterFormatError::NotPositive { name, value: x });
        }
    }
    let sum: f64 = xs.iter().sum();
    if (sum - 1.0).abs() > SUM_TO_ONE_TOL {
        return Err(ParameterFormatError::NotNormalized { name, sum });
    }
    Ok(xs.to_vec())
}

/// A matrix whose rows are all simplex points of equal length
pub(crate) fn simplex_vecs(
    xss: &[Vec<f64>],
    name: &'static str,
) -> Result<Vec<Vec<f64>>, ParameterFormatError> {
    if xss.is_empty() {
        return Err(ParameterFormatError::Empty { name });
    }
    let width = xss[0].len();
    if xss.iter().any(|row| row.len() != width) {
        return Err(ParameterFormatError::RaggedRows { name });
    }
    xss.iter().map(|row| simplex_vec(row, name)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pos_float_rejects_zero_nan_and_infinity() {
        assert!(pos_float(1e-300, "x").is_ok());
        for bad in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            assert!(matches!(
                pos_float(bad, "x"),
                Err(ParameterFormatError::NotPositive { name: "x", .. })
            ));
        }
    }

    #[test]
    fn pos_float_vec_rejects_empty() {
        assert_eq!(
            pos_float_vec(&[], "h_alpha_vec"),
            Err(ParameterFormatError::Empty {
                name: "h_alpha_vec"
            })
        );
    }

    #[test]
    fn simplex_vec_requires_unit_sum() {
        assert!(simplex_vec(&[0.4, 0.6], "pi_vec").is_ok());
        assert!(matches!(
            simplex_vec(&[0.4, 0.5], "pi_vec"),
            Err(ParameterFormatError::NotNormalized { .. })
        ));
    }

    #[test]
    fn simplex_vecs_rejects_ragged_rows() {
        let theta = vec![vec![0.5, 0.5], vec![0.2, 0.3, 0.5]];
        assert_eq!(
            simplex_vecs(&theta, "theta_vecs"),
            Err(ParameterFormatError::RaggedRows { name: "theta_vecs" })
        );
    }
}
