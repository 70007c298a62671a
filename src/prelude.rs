//! Most-used types, importable in one line.
pub use crate::dist::{Lomax, MultinomialMixture};
pub use crate::error::{
    CriteriaError, DataFormatError, ParameterFormatError,
    ParameterFormatWarning, ResultWarning,
};
pub use crate::exponential;
pub use crate::loss::{Estimate, Loss};
pub use crate::metadata::{
    load_exponential_sample, load_mixture_sample, ExponentialSample,
    MetadataError, MixtureSample,
};
pub use crate::multinomial_mixture::{
    self, MixtureConfig, MixtureParams, PosteriorDists, ResponsibilityInit,
    VbConfig, VbReport,
};
pub use crate::rv;
pub use crate::traits::{ParamMap, ParamValue, Posterior, Predictive};
