//! Robust noise estimation.
//!
//! Four estimators are available through [`NoiseMethod`]: plain standard
//! deviation, MAD rescaled to Gaussian sigma, and iterative Chauvenet
//! rejection using either of those as the dispersion. An empty sample set or
//! a rejection pass that discards everything yields an explicit undefined
//! estimate (NaN sigma plus an [`EstimateStatus`]), never a silent zero.


use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};
use thiserror::Error;

use crate::cube::{CubeError, ImageCube, strides};
use crate::math::{self, erfc};

/// Default number of Chauvenet rejection passes.
pub const DEFAULT_CHAUVENET_ITERATIONS: usize = 5;

/// Mask-cube values at or above this are treated as signal.
const MASK_SIGNAL_LEVEL: f32 = 0.5;

/// Dispersion estimator.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display, EnumString, Serialize, Deserialize,
)]
pub enum NoiseMethod {
    /// Standard deviation of all valid samples.
    #[strum(serialize = "std")]
    #[serde(rename = "std")]
    Std,
    /// Median absolute deviation divided by 0.6745.
    #[default]
    #[strum(serialize = "mad")]
    #[serde(rename = "mad")]
    Mad,
    /// Chauvenet rejection with the standard deviation as dispersion.
    #[strum(serialize = "chauv")]
    #[serde(rename = "chauv")]
    Chauvenet,
    /// Chauvenet rejection with the MAD-based sigma as dispersion.
    #[strum(serialize = "chauvmad")]
    #[serde(rename = "chauvmad")]
    ChauvenetMad,
}

/// Whether a noise estimate is usable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EstimateStatus {
    Valid,
    /// No finite, masked-in samples were available.
    NoValidData,
    /// A Chauvenet pass would have rejected every remaining sample.
    AllRejected,
}

/// A scalar noise estimate and how it was obtained.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NoiseEstimate {
    /// Estimated sigma; NaN unless `status` is [`EstimateStatus::Valid`].
    pub sigma: f64,
    pub method: NoiseMethod,
    pub status: EstimateStatus,
    /// Samples contributing to the final value.
    pub samples: usize,
}

impl NoiseEstimate {
    fn valid(sigma: f64, method: NoiseMethod, samples: usize) -> Self {
        Self {
            sigma,
            method,
            status: EstimateStatus::Valid,
            samples,
        }
    }

    fn undefined(method: NoiseMethod, status: EstimateStatus) -> Self {
        Self {
            sigma: f64::NAN,
            method,
            status,
            samples: 0,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.status == EstimateStatus::Valid
    }

    /// The sigma if the estimate is usable.
    pub fn value(&self) -> Option<f64> {
        self.is_valid().then_some(self.sigma)
    }
}

/// How a mask cube restricts the pixels used for a cube-level estimate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MaskUsage {
    /// Use only pixels the mask marks as emission-free.
    #[default]
    Exclude,
    /// Use only pixels the mask marks as signal.
    Include,
}

#[derive(Debug, Error)]
pub enum NoiseError {
    #[error("Mask for '{name}' has {mask} elements but the data has {data}")]
    SizeMismatch {
        name: String,
        data: usize,
        mask: usize,
    },

    #[error("Cube '{name}' has no spectral axis")]
    NoSpectralAxis { name: String },

    #[error(transparent)]
    Cube(#[from] CubeError),
}

/// Survivors of an iterative Chauvenet rejection.
#[derive(Debug, Clone, PartialEq)]
pub struct ChauvenetOutcome {
    pub survivors: Vec<f64>,
    /// Surviving sample count after each completed pass.
    pub history: Vec<usize>,
    /// Set when a pass would have rejected every sample.
    pub rejected_all: bool,
}

/// Iteratively reject samples whose two-sided Gaussian tail probability is
/// below `1 / (2N)`, with N the current survivor count.
///
/// Each pass recomputes the mean and the dispersion (`std` or MAD sigma) of
/// the survivors. Stops early once a pass rejects nothing. A dispersion of
/// zero (or NaN) puts every sample at an infinite deviation, so that pass
/// rejects everything.
pub fn chauvenet_reject(values: &[f64], use_mad: bool, iterations: usize) -> ChauvenetOutcome {
    let mut survivors = values.to_vec();
    let mut history = Vec::with_capacity(iterations);
    let mut scratch = Vec::with_capacity(values.len());

    for _ in 0..iterations {
        if survivors.is_empty() {
            break;
        }
        let mean = math::mean(&survivors);
        let dispersion = if use_mad {
            math::mad_with_scratch(&survivors, &mut scratch) / math::MAD_SIGMA_DIVISOR
        } else {
            math::std_dev(&survivors)
        };

        let criterion = 1.0 / (2.0 * survivors.len() as f64);
        let kept: Vec<f64> = if dispersion.is_nan() || dispersion <= 0.0 {
            Vec::new()
        } else {
            survivors
                .iter()
                .copied()
                .filter(|v| {
                    let deviation = ((v - mean) / dispersion).abs() / std::f64::consts::SQRT_2;
                    erfc(deviation) > criterion
                })
                .collect()
        };

        if kept.is_empty() {
            return ChauvenetOutcome {
                survivors: Vec::new(),
                history,
                rejected_all: true,
            };
        }

        let converged = kept.len() == survivors.len();
        survivors = kept;
        history.push(survivors.len());
        if converged {
            break;
        }
    }

    ChauvenetOutcome {
        survivors,
        history,
        rejected_all: false,
    }
}

/// Estimate the noise of `data`, optionally restricted by `mask`.
///
/// Non-finite samples are always ignored. `iterations` only affects the
/// Chauvenet methods and defaults to [`DEFAULT_CHAUVENET_ITERATIONS`].
pub fn estimate_noise(
    data: &[f32],
    mask: Option<&[bool]>,
    method: NoiseMethod,
    iterations: Option<usize>,
) -> Result<NoiseEstimate, NoiseError> {
    estimate_named("data", data, mask, method, iterations)
}

fn estimate_named(
    name: &str,
    data: &[f32],
    mask: Option<&[bool]>,
    method: NoiseMethod,
    iterations: Option<usize>,
) -> Result<NoiseEstimate, NoiseError> {
    if let Some(mask) = mask {
        if mask.len() != data.len() {
            return Err(NoiseError::SizeMismatch {
                name: name.to_string(),
                data: data.len(),
                mask: mask.len(),
            });
        }
    }

    let samples: Vec<f64> = match mask {
        Some(mask) => data
            .iter()
            .zip(mask)
            .filter(|(v, m)| **m && v.is_finite())
            .map(|(v, _)| *v as f64)
            .collect(),
        None => data
            .iter()
            .filter(|v| v.is_finite())
            .map(|v| *v as f64)
            .collect(),
    };

    Ok(estimate_samples(name, &samples, method, iterations))
}

fn estimate_samples(
    name: &str,
    samples: &[f64],
    method: NoiseMethod,
    iterations: Option<usize>,
) -> NoiseEstimate {
    if samples.is_empty() {
        tracing::error!("No valid data in '{}', noise is undefined", name);
        return NoiseEstimate::undefined(method, EstimateStatus::NoValidData);
    }

    match method {
        NoiseMethod::Std => NoiseEstimate::valid(math::std_dev(samples), method, samples.len()),
        NoiseMethod::Mad => NoiseEstimate::valid(math::mad_sigma(samples), method, samples.len()),
        NoiseMethod::Chauvenet | NoiseMethod::ChauvenetMad => {
            let iterations = iterations.unwrap_or(DEFAULT_CHAUVENET_ITERATIONS);
            let outcome =
                chauvenet_reject(samples, method == NoiseMethod::ChauvenetMad, iterations);
            if outcome.rejected_all {
                tracing::error!("Chauvenet rejection discarded all of '{}'", name);
                return NoiseEstimate::undefined(method, EstimateStatus::AllRejected);
            }
            tracing::debug!(
                "Chauvenet on '{}': {} -> {:?}",
                name,
                samples.len(),
                outcome.history
            );
            NoiseEstimate::valid(
                math::std_dev(&outcome.survivors),
                method,
                outcome.survivors.len(),
            )
        }
    }
}

/// Validity mask for a cube, optionally intersected with a mask cube.
fn usable_mask(
    cube: &ImageCube,
    mask_cube: Option<&ImageCube>,
    usage: MaskUsage,
) -> Result<Vec<bool>, NoiseError> {
    let mut usable = cube.mask().to_vec();
    if let Some(mask_cube) = mask_cube {
        cube.ensure_same_shape(mask_cube)?;
        for ((u, &value), &valid) in usable
            .iter_mut()
            .zip(mask_cube.data())
            .zip(mask_cube.mask())
        {
            let is_signal = value >= MASK_SIGNAL_LEVEL;
            let selected = match usage {
                MaskUsage::Exclude => !is_signal,
                MaskUsage::Include => is_signal,
            };
            *u = *u && valid && selected;
        }
    }
    Ok(usable)
}

/// Single noise estimate for a whole cube.
///
/// The cube's own validity mask always applies. With `mask_cube` the estimate
/// is further restricted to emission-free pixels (`Exclude`) or to signal
/// pixels (`Include`).
pub fn noise_for_cube(
    cube: &ImageCube,
    mask_cube: Option<&ImageCube>,
    usage: MaskUsage,
    method: NoiseMethod,
    iterations: Option<usize>,
) -> Result<NoiseEstimate, NoiseError> {
    let usable = usable_mask(cube, mask_cube, usage)?;
    let estimate = estimate_named(cube.name(), cube.data(), Some(&usable), method, iterations)?;
    tracing::debug!(
        "Noise for '{}' ({}): {} from {} samples",
        cube.name(),
        method,
        estimate.sigma,
        estimate.samples
    );
    Ok(estimate)
}

/// Noise per spectral channel, each estimated over its full spatial plane
/// (and any other non-spectral axes).
pub fn noise_spectrum(
    cube: &ImageCube,
    mask_cube: Option<&ImageCube>,
    usage: MaskUsage,
    method: NoiseMethod,
) -> Result<Vec<NoiseEstimate>, NoiseError> {
    let spec_axis = cube
        .header()
        .spectral_axis()
        .ok_or_else(|| NoiseError::NoSpectralAxis {
            name: cube.name().to_string(),
        })?;
    let usable = usable_mask(cube, mask_cube, usage)?;
    let shape = cube.shape();
    let stride = strides(&shape)[spec_axis];
    let channels = shape[spec_axis];
    let outer_count = cube.len() / (stride * channels).max(1);
    let name = cube.name();
    let data = cube.data();

    let estimates = (0..channels)
        .into_par_iter()
        .map(|channel| {
            let samples: Vec<f64> = (0..outer_count)
                .flat_map(|outer| {
                    let base = outer * stride * channels + channel * stride;
                    base..base + stride
                })
                .filter(|&i| usable[i] && data[i].is_finite())
                .map(|i| data[i] as f64)
                .collect();
            estimate_samples(name, &samples, method, None)
        })
        .collect();
    Ok(estimates)
}

/// Noise map: one estimate per position on the non-spectral axes, taken
/// along the spectral axis. Undefined positions hold NaN.
///
/// The returned cube keeps the input header with the spectral axis reduced
/// to a single plane.
pub fn noise_map(
    cube: &ImageCube,
    mask_cube: Option<&ImageCube>,
    usage: MaskUsage,
    method: NoiseMethod,
) -> Result<ImageCube, NoiseError> {
    let spec_axis = cube
        .header()
        .spectral_axis()
        .ok_or_else(|| NoiseError::NoSpectralAxis {
            name: cube.name().to_string(),
        })?;
    let usable = usable_mask(cube, mask_cube, usage)?;
    let shape = cube.shape();
    let stride = strides(&shape)[spec_axis];
    let channels = shape[spec_axis];
    let data = cube.data();
    let name = cube.name();

    let mut header = cube.header().clone();
    header.axes[spec_axis].size = 1;
    header.name = format!("{}.noise", cube.name());
    let plane_len = header.pixel_count();

    // Flat index in the reduced cube maps to (outer, inner) around the spectral axis.
    let sigmas: Vec<f32> = (0..plane_len)
        .into_par_iter()
        .map(|reduced| {
            let inner = reduced % stride;
            let outer = reduced / stride;
            let base = outer * stride * channels + inner;
            let samples: Vec<f64> = (0..channels)
                .map(|c| base + c * stride)
                .filter(|&i| usable[i] && data[i].is_finite())
                .map(|i| data[i] as f64)
                .collect();
            if samples.is_empty() {
                return f32::NAN;
            }
            estimate_samples(name, &samples, method, None).sigma as f32
        })
        .collect();

    Ok(ImageCube::from_data(header, sigmas)?)
}
