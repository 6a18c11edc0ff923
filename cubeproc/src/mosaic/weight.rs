//! Per-pixel statistical weights for linear mosaicking.

use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

use crate::cube::{CubeHeader, ImageCube};
use crate::noise::NoiseEstimate;

use super::error::MosaicError;

/// What the weight source represents.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum WeightInputType {
    /// Primary-beam response; weight is `value²`.
    #[default]
    Pb,
    /// Noise; weight is `1 / value²`.
    Noise,
    /// Already a weight, used as is.
    Weight,
}

impl WeightInputType {
    /// Weight for one source value, `None` where no weight is defined.
    #[inline]
    pub fn weight_of(self, value: f64) -> Option<f64> {
        if !value.is_finite() {
            return None;
        }
        match self {
            WeightInputType::Pb => Some(value * value),
            WeightInputType::Noise => (value > 0.0).then(|| 1.0 / (value * value)),
            WeightInputType::Weight => Some(value),
        }
    }
}

/// Non-negative weight image on a cube grid. Pixels without a defined
/// weight hold zero and are masked out.
#[derive(Debug, Clone)]
pub struct WeightMap {
    cube: ImageCube,
}

impl WeightMap {
    /// Constant weight derived from a single value.
    pub fn from_value(
        template: &CubeHeader,
        value: f64,
        input_type: WeightInputType,
    ) -> Result<Self, MosaicError> {
        let weight = input_type
            .weight_of(value)
            .filter(|w| *w >= 0.0)
            .ok_or_else(|| MosaicError::InvalidParameter {
                name: format!("'{}'", template.name),
                parameter: "input_value",
                value,
            })?;
        let mut header = template.clone();
        header.name = format!("{}.weight", template.name);
        header.brightness_unit = String::new();
        Ok(Self {
            cube: ImageCube::filled(header, weight as f32),
        })
    }

    /// Apply `input_type` pixel by pixel. Invalid source pixels get zero
    /// weight; negative literal weights are rejected.
    pub fn from_cube(input: &ImageCube, input_type: WeightInputType) -> Result<Self, MosaicError> {
        let mut data = Vec::with_capacity(input.len());
        let mut mask = Vec::with_capacity(input.len());
        for (index, (&value, &valid)) in input.data().iter().zip(input.mask()).enumerate() {
            let weight = if valid {
                input_type.weight_of(f64::from(value))
            } else {
                None
            };
            match weight {
                Some(w) if w < 0.0 => {
                    return Err(MosaicError::NegativeWeight {
                        name: input.name().to_string(),
                        index,
                        value,
                    });
                }
                Some(w) => {
                    data.push(w as f32);
                    mask.push(true);
                }
                None => {
                    data.push(0.0);
                    mask.push(false);
                }
            }
        }

        let mut header = input.header().clone();
        header.name = format!("{}.weight", input.name());
        header.brightness_unit = String::new();
        Ok(Self {
            cube: ImageCube::new(header, data, mask)?,
        })
    }

    /// Wrap an existing weight cube without transforming it.
    pub fn from_weight_cube(cube: ImageCube) -> Result<Self, MosaicError> {
        Self::from_cube(&cube, WeightInputType::Weight).map(|mut map| {
            map.cube.set_name(cube.name());
            map
        })
    }

    /// Multiply every weight by `factor`.
    pub fn scaled(mut self, factor: f64) -> Result<Self, MosaicError> {
        if !factor.is_finite() || factor < 0.0 {
            return Err(MosaicError::InvalidParameter {
                name: format!("'{}'", self.cube.name()),
                parameter: "scale_factor",
                value: factor,
            });
        }
        let factor = factor as f32;
        self.cube.data_mut().iter_mut().for_each(|w| *w *= factor);
        Ok(self)
    }

    /// Multiply every weight by `1 / σ²`.
    pub fn scale_by_noise(self, noise: &NoiseEstimate) -> Result<Self, MosaicError> {
        match noise.value() {
            Some(sigma) if sigma > 0.0 => self.scaled(1.0 / (sigma * sigma)),
            _ => Err(MosaicError::InvalidParameter {
                name: format!("'{}'", self.cube.name()),
                parameter: "noise",
                value: noise.sigma,
            }),
        }
    }

    pub fn cube(&self) -> &ImageCube {
        &self.cube
    }

    pub fn weights(&self) -> &[f32] {
        self.cube.data()
    }

    pub fn into_cube(self) -> ImageCube {
        self.cube
    }
}
