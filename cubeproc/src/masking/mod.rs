//! Signal masks from a two-threshold scheme with constrained dilation.
//!
//! Pixels above `high_snr · σ` seed the mask. Both the seed and the
//! low-threshold envelope (`low_snr · σ`) are widened by one channel either
//! side along the spectral axis, wrapping at the band edges. When
//! `low_snr < high_snr` the seeds are then flood-filled through the envelope.
//! The result can be combined with a prior mask.

mod dilation;

use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};
use thiserror::Error;

use crate::cube::{CubeError, CubeHeader, ImageCube};
use crate::engine::ImageEngine;
use crate::noise::{
    EstimateStatus, MaskUsage, NoiseError, NoiseEstimate, NoiseMethod, noise_for_cube,
};

/// How a freshly built mask is combined with a prior mask.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "UPPERCASE", ascii_case_insensitive)]
#[serde(rename_all = "UPPERCASE")]
pub enum MaskOperation {
    #[default]
    And,
    Or,
    New,
}

/// Thresholds and combination rule for [`build_signal_mask`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalMaskConfig {
    pub high_snr: f64,
    pub low_snr: f64,
    /// Threshold `|value|` instead of `value`.
    pub absolute: bool,
    pub operation: MaskOperation,
}

impl Default for SignalMaskConfig {
    fn default() -> Self {
        Self {
            high_snr: 4.0,
            low_snr: 2.0,
            absolute: false,
            operation: MaskOperation::And,
        }
    }
}

impl SignalMaskConfig {
    pub fn new(high_snr: f64, low_snr: f64) -> Self {
        Self {
            high_snr,
            low_snr,
            ..Self::default()
        }
    }

    pub fn with_operation(mut self, operation: MaskOperation) -> Self {
        self.operation = operation;
        self
    }

    pub fn with_absolute(mut self, absolute: bool) -> Self {
        self.absolute = absolute;
        self
    }

    pub fn validate(&self) -> Result<(), MaskError> {
        for (parameter, value) in [("high_snr", self.high_snr), ("low_snr", self.low_snr)] {
            if !value.is_finite() || value <= 0.0 {
                return Err(MaskError::InvalidThreshold { parameter, value });
            }
        }
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum MaskError {
    #[error("Invalid {parameter}: {value} (must be positive and finite)")]
    InvalidThreshold { parameter: &'static str, value: f64 },

    #[error("Noise of '{name}' is undefined ({status:?}), cannot threshold")]
    UndefinedNoise {
        name: String,
        status: EstimateStatus,
    },

    #[error("Mask '{name}' has shape {actual:?} but '{target}' has shape {expected:?}")]
    ShapeMismatch {
        name: String,
        target: String,
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    #[error(transparent)]
    Noise(#[from] NoiseError),

    #[error(transparent)]
    Cube(#[from] CubeError),
}

/// Boolean mask on a cube's pixel grid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignalMask {
    name: String,
    shape: Vec<usize>,
    values: Vec<bool>,
}

impl SignalMask {
    pub fn new(
        name: impl Into<String>,
        shape: Vec<usize>,
        values: Vec<bool>,
    ) -> Result<Self, CubeError> {
        let name = name.into();
        let expected: usize = shape.iter().product();
        if values.len() != expected {
            return Err(CubeError::LengthMismatch {
                name,
                array: "mask",
                shape,
                expected,
                actual: values.len(),
            });
        }
        Ok(Self {
            name,
            shape,
            values,
        })
    }

    /// Read a mask stored as a cube: valid pixels at or above 0.5 are set.
    pub fn from_cube(cube: &ImageCube) -> Self {
        let values = cube
            .data()
            .iter()
            .zip(cube.mask())
            .map(|(&v, &m)| m && v >= 0.5)
            .collect();
        Self {
            name: cube.name().to_string(),
            shape: cube.shape(),
            values,
        }
    }

    /// Store as a fully valid cube of ones and zeros on `header`'s grid.
    pub fn to_cube(&self, header: &CubeHeader) -> Result<ImageCube, CubeError> {
        let mut header = header.clone();
        header.name = self.name.clone();
        header.brightness_unit = String::new();
        let data = self.values.iter().map(|&v| if v { 1.0 } else { 0.0 }).collect();
        let mask = vec![true; self.values.len()];
        ImageCube::new(header, data, mask)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn values(&self) -> &[bool] {
        &self.values
    }

    pub fn count(&self) -> usize {
        self.values.iter().filter(|&&v| v).count()
    }

    /// True if every pixel set in `other` is also set here.
    pub fn is_superset_of(&self, other: &SignalMask) -> bool {
        self.shape == other.shape
            && self
                .values
                .iter()
                .zip(&other.values)
                .all(|(&mine, &theirs)| mine || !theirs)
    }

    fn ensure_shape(&self, target: &str, expected: &[usize]) -> Result<(), MaskError> {
        if self.shape != expected {
            return Err(MaskError::ShapeMismatch {
                name: self.name.clone(),
                target: target.to_string(),
                expected: expected.to_vec(),
                actual: self.shape.clone(),
            });
        }
        Ok(())
    }
}

/// A mask plus the statistics it was built from.
#[derive(Debug, Clone)]
pub struct SignalMaskResult {
    pub mask: SignalMask,
    pub noise: NoiseEstimate,
    pub high_threshold: f64,
    pub low_threshold: f64,
    /// Combination actually applied; AND/OR become NEW without a prior.
    pub operation: MaskOperation,
}

fn threshold(cube: &ImageCube, level: f64, absolute: bool) -> Vec<bool> {
    cube.data()
        .iter()
        .zip(cube.mask())
        .map(|(&v, &valid)| {
            if !valid || !v.is_finite() {
                return false;
            }
            let v = if absolute { v.abs() } else { v };
            f64::from(v) > level
        })
        .collect()
}

/// Build a signal mask for `image`.
///
/// The noise scale is the MAD sigma of `residual` when given, otherwise of
/// `image` itself. `prior` is combined according to `config.operation`; with
/// no prior, AND and OR fall back to NEW.
pub fn build_signal_mask(
    image: &ImageCube,
    residual: Option<&ImageCube>,
    prior: Option<&SignalMask>,
    config: &SignalMaskConfig,
) -> Result<SignalMaskResult, MaskError> {
    config.validate()?;
    let shape = image.shape();
    if let Some(residual) = residual {
        image.ensure_same_shape(residual)?;
    }
    if let Some(prior) = prior {
        prior.ensure_shape(image.name(), &shape)?;
    }

    let noise_source = residual.unwrap_or(image);
    let noise = noise_for_cube(noise_source, None, MaskUsage::Exclude, NoiseMethod::Mad, None)?;
    let Some(sigma) = noise.value() else {
        return Err(MaskError::UndefinedNoise {
            name: noise_source.name().to_string(),
            status: noise.status,
        });
    };
    let high_threshold = config.high_snr * sigma;
    let low_threshold = config.low_snr * sigma;
    tracing::debug!(
        "Signal mask for '{}': sigma {} from '{}', thresholds {} / {}",
        image.name(),
        sigma,
        noise_source.name(),
        high_threshold,
        low_threshold
    );

    let spectral_axis = image.header().spectral_axis();
    let widen = |mask: Vec<bool>| match spectral_axis {
        Some(axis) => dilation::widen_along_axis(&mask, &shape, axis),
        None => mask,
    };

    let seed = widen(threshold(image, high_threshold, config.absolute));
    let mut values = if config.low_snr < config.high_snr {
        let envelope = widen(threshold(image, low_threshold, config.absolute));
        dilation::propagate(&seed, &envelope, &shape)
    } else {
        seed
    };

    let operation = match (config.operation, prior) {
        (MaskOperation::And, Some(prior)) => {
            values
                .iter_mut()
                .zip(prior.values())
                .for_each(|(v, &p)| *v = *v && p);
            MaskOperation::And
        }
        (MaskOperation::Or, Some(prior)) => {
            values
                .iter_mut()
                .zip(prior.values())
                .for_each(|(v, &p)| *v = *v || p);
            MaskOperation::Or
        }
        (MaskOperation::New, _) => MaskOperation::New,
        (requested, None) => {
            tracing::warn!(
                "{} requested for '{}' but no prior mask exists, using NEW",
                requested,
                image.name()
            );
            MaskOperation::New
        }
    };

    let mask = SignalMask {
        name: format!("{}.mask", image.name()),
        shape,
        values,
    };
    tracing::info!(
        "Signal mask for '{}': {} of {} pixels",
        image.name(),
        mask.count(),
        mask.values.len()
    );

    Ok(SignalMaskResult {
        mask,
        noise,
        high_threshold,
        low_threshold,
        operation,
    })
}

/// Combine `mask` with `other > threshold`, e.g. a primary-beam limit.
///
/// Only AND and OR are meaningful here; NEW replaces the mask outright.
pub fn apply_additional_mask(
    mask: &mut SignalMask,
    other: &ImageCube,
    threshold: f32,
    operation: MaskOperation,
) -> Result<(), MaskError> {
    if mask.shape != other.shape() {
        return Err(MaskError::ShapeMismatch {
            name: other.name().to_string(),
            target: mask.name.clone(),
            expected: mask.shape.clone(),
            actual: other.shape(),
        });
    }
    let passes = other
        .data()
        .iter()
        .zip(other.mask())
        .map(|(&v, &valid)| valid && v > threshold);
    for (value, pass) in mask.values.iter_mut().zip(passes) {
        *value = match operation {
            MaskOperation::And => *value && pass,
            MaskOperation::Or => *value || pass,
            MaskOperation::New => pass,
        };
    }
    Ok(())
}

/// Files that make up an imaging root: `<root>.image`, `<root>.residual`
/// and `<root>.mask`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaskRoot {
    pub image: PathBuf,
    pub residual: PathBuf,
    pub mask: PathBuf,
}

impl MaskRoot {
    pub fn new(root: &Path) -> Self {
        let with_ext = |ext: &str| {
            let mut name = root.as_os_str().to_os_string();
            name.push(ext);
            PathBuf::from(name)
        };
        Self {
            image: with_ext(".image"),
            residual: with_ext(".residual"),
            mask: with_ext(".mask"),
        }
    }
}

/// Build and write the signal mask for an imaging root.
///
/// Reads `<root>.image`, the residual and the prior mask when they exist, and
/// overwrites `<root>.mask`.
pub fn signal_mask_for_root(
    engine: &dyn ImageEngine,
    root: &Path,
    config: &SignalMaskConfig,
) -> anyhow::Result<SignalMaskResult> {
    let files = MaskRoot::new(root);
    let image = engine
        .read_cube(&files.image)
        .with_context(|| format!("Reading image {}", files.image.display()))?;

    let residual = if engine.exists(&files.residual) {
        Some(engine.read_cube(&files.residual)?)
    } else {
        tracing::debug!("No residual for {}, using the image for noise", root.display());
        None
    };

    let prior = if config.operation != MaskOperation::New && engine.exists(&files.mask) {
        Some(SignalMask::from_cube(&engine.read_cube(&files.mask)?))
    } else {
        None
    };

    let mut result = build_signal_mask(&image, residual.as_ref(), prior.as_ref(), config)
        .with_context(|| format!("Building signal mask for {}", root.display()))?;
    result.mask.name = files.mask.display().to_string();

    let cube = result.mask.to_cube(image.header())?;
    engine
        .write_cube(&files.mask, &cube)
        .with_context(|| format!("Writing mask {}", files.mask.display()))?;
    Ok(result)
}
