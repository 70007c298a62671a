//! Persistence of generated samples.
//!
//! Samples are stored as a single binary archive of named arrays: `x`
//! (and `z` for the mixture model), serialized with bincode. Round-trips
//! are lossless.
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::DataFormatError;

#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Codec(#[from] bincode::Error),
    #[error(transparent)]
    Data(#[from] DataFormatError),
}

/// Archive of a multinomial-mixture sample: counts `x` (N × d) and the
/// one-hot class indicators `z` (N × K)
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MixtureSample {
    pub x: Vec<Vec<u32>>,
    pub z: Vec<Vec<u8>>,
}

/// Archive of an exponential sample: positive reals `x`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExponentialSample {
    pub x: Vec<f64>,
}

pub fn save_mixture_sample<P: AsRef<Path>>(
    path: P,
    sample: &MixtureSample,
) -> Result<(), MetadataError> {
    let file = File::create(path.as_ref())?;
    bincode::serialize_into(BufWriter::new(file), sample)?;
    log::info!(
        "saved mixture sample with {} observations to {:?}",
        sample.x.len(),
        path.as_ref()
    );
    Ok(())
}

pub fn load_mixture_sample<P: AsRef<Path>>(
    path: P,
) -> Result<MixtureSample, MetadataError> {
    let file = File::open(path.as_ref())?;
    let sample = bincode::deserialize_from(BufReader::new(file))?;
    Ok(sample)
}

pub fn save_exponential_sample<P: AsRef<Path>>(
    path: P,
    sample: &ExponentialSample,
) -> Result<(), MetadataError> {
    let file = File::create(path.as_ref())?;
    bincode::serialize_into(BufWriter::new(file), sample)?;
    log::info!(
        "saved exponential sample with {} observations to {:?}",
        sample.x.len(),
        path.as_ref()
    );
    Ok(())
}

pub fn load_exponential_sample<P: AsRef<Path>>(
    path: P,
) -> Result<ExponentialSample, MetadataError> {
    let file = File::open(path.as_ref())?;
    let sample = bincode::deserialize_from(BufReader::new(file))?;
    Ok(sample)
}
