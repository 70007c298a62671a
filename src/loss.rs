//! Loss functions and the output of the loss dispatcher.
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{CriteriaError, ResultWarning};

/// Loss function underlying the Bayes risk of a requested estimate
///
/// The Bayes-optimal point estimate under each loss:
/// squared-error → mean, 0-1 → mode, absolute-error → median. KL "loss"
/// returns the whole distribution so the caller can query arbitrary
/// functionals.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Loss {
    /// Squared-error loss (posterior/predictive mean)
    Squared,
    /// 0-1 loss (posterior/predictive mode)
    ZeroOne,
    /// Absolute-error loss (posterior/predictive median)
    Abs,
    /// Kullback-Leibler loss (the full distribution)
    Kl,
}

impl Loss {
    /// The loss names accepted at the string boundary
    pub const SUPPORTED: [&'static str; 4] = ["squared", "0-1", "abs", "KL"];
}

impl FromStr for Loss {
    type Err = CriteriaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "squared" => Ok(Loss::Squared),
            "0-1" => Ok(Loss::ZeroOne),
            "abs" => Ok(Loss::Abs),
            "KL" => Ok(Loss::Kl),
            _ => Err(CriteriaError::UnsupportedLoss {
                requested: s.to_string(),
            }),
        }
    }
}

/// Output of a loss-dispatched estimator
#[derive(Clone, Debug, PartialEq)]
pub enum Estimate<T, D> {
    /// The Bayes-optimal point value under the requested loss
    Point(T),
    /// The point value does not exist for the current hyperparameters
    Undefined(ResultWarning),
    /// The full distribution, returned under KL loss
    Distribution(D),
}

impl<T, D> Estimate<T, D> {
    /// The point value, if this estimate is one
    pub fn point(self) -> Option<T> {
        match self {
            Estimate::Point(x) => Some(x),
            _ => None,
        }
    }

    /// The distribution object, if this estimate is one
    pub fn distribution(self) -> Option<D> {
        match self {
            Estimate::Distribution(d) => Some(d),
            _ => None,
        }
    }

    /// The warning attached to an undefined estimate
    pub fn warning(&self) -> Option<&ResultWarning> {
        match self {
            Estimate::Undefined(w) => Some(w),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loss_parses_every_supported_name() {
        assert_eq!("squared".parse::<Loss>(), Ok(Loss::Squared));
        assert_eq!("0-1".parse::<Loss>(), Ok(Loss::ZeroOne));
        assert_eq!("abs".parse::<Loss>(), Ok(Loss::Abs));
        assert_eq!("KL".parse::<Loss>(), Ok(Loss::Kl));
    }

    #[test]
    fn unknown_loss_name_is_a_criteria_error() {
        let err = "huber".parse::<Loss>().unwrap_err();
        assert_eq!(
            err,
            CriteriaError::UnsupportedLoss {
                requested: "huber".to_string()
            }
        );
        // the message names the offender and the supported set
        let msg = err.to_string();
        assert!(msg.contains("huber"));
        for name in Loss::SUPPORTED {
            assert!(msg.contains(name));
        }
    }

    #[test]
    fn loss_parsing_is_case_sensitive() {
        assert!("kl".parse::<Loss>().is_err());
        assert!("Squared".parse::<Loss>().is_err());
    }

    #[test]
    fn estimate_accessors() {
        let est: Estimate<f64, ()> = Estimate::Point(0.5);
        assert_eq!(est.clone().point(), Some(0.5));
        assert_eq!(est.distribution(), None);

        let und: Estimate<f64, ()> =
            Estimate::Undefined(ResultWarning::MeanUndefined);
        assert!(und.point().is_none());
    }
}
