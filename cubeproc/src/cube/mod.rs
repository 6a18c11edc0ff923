//! In-memory image cubes.
//!
//! A cube is a flat `f32` pixel array plus a validity mask of identical
//! length, described by a [`CubeHeader`]. Axis 0 varies fastest, matching
//! the FITS/CASA axis order (RA, Dec, spectral, Stokes).

pub(crate) mod error;
pub(crate) mod header;
pub(crate) mod ops;


pub use error::CubeError;
pub use header::{ARCSEC_UNIT, Axis, AxisKind, Beam, CubeHeader, RAD_TO_ARCSEC, RADIAN_UNIT};
pub use ops::{
    JY_PER_BEAM, KELVIN, jy_to_kelvin, jy_to_kelvin_factor, kelvin_to_jy, primary_beam_correct,
    trim_to_valid,
};

/// Element strides for a shape with axis 0 varying fastest.
pub fn strides(shape: &[usize]) -> Vec<usize> {
    let mut strides = Vec::with_capacity(shape.len());
    let mut stride = 1;
    for &size in shape {
        strides.push(stride);
        stride *= size;
    }
    strides
}

/// An image cube together with its validity mask.
#[derive(Debug, Clone)]
pub struct ImageCube {
    header: CubeHeader,
    data: Vec<f32>,
    mask: Vec<bool>,
}

impl ImageCube {
    /// Build a cube from explicit data and mask arrays.
    pub fn new(header: CubeHeader, data: Vec<f32>, mask: Vec<bool>) -> Result<Self, CubeError> {
        let expected = header.pixel_count();
        for (array, actual) in [("data", data.len()), ("mask", mask.len())] {
            if actual != expected {
                return Err(CubeError::LengthMismatch {
                    name: header.name.clone(),
                    array,
                    shape: header.shape(),
                    expected,
                    actual,
                });
            }
        }
        Ok(Self { header, data, mask })
    }

    /// Build a cube whose mask marks every finite pixel valid.
    pub fn from_data(header: CubeHeader, data: Vec<f32>) -> Result<Self, CubeError> {
        let mask = data.iter().map(|v| v.is_finite()).collect();
        Self::new(header, data, mask)
    }

    /// A fully valid cube with every pixel set to `value`.
    pub fn filled(header: CubeHeader, value: f32) -> Self {
        let len = header.pixel_count();
        Self {
            header,
            data: vec![value; len],
            mask: vec![true; len],
        }
    }

    #[inline]
    pub fn header(&self) -> &CubeHeader {
        &self.header
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.header.name
    }

    #[inline]
    pub fn data(&self) -> &[f32] {
        &self.data
    }

    #[inline]
    pub fn data_mut(&mut self) -> &mut [f32] {
        &mut self.data
    }

    #[inline]
    pub fn mask(&self) -> &[bool] {
        &self.mask
    }

    #[inline]
    pub fn mask_mut(&mut self) -> &mut [bool] {
        &mut self.mask
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn shape(&self) -> Vec<usize> {
        self.header.shape()
    }

    /// Number of pixels that are both masked-in and finite.
    pub fn valid_count(&self) -> usize {
        self.data
            .iter()
            .zip(&self.mask)
            .filter(|(v, m)| **m && v.is_finite())
            .count()
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.header.name = name.into();
    }

    pub fn set_brightness_unit(&mut self, unit: impl Into<String>) {
        self.header.brightness_unit = unit.into();
    }

    pub fn set_beam(&mut self, beam: Option<header::Beam>) {
        self.header.beam = beam;
    }

    /// Swap in a new header describing the same shape.
    pub fn replace_header(&mut self, header: CubeHeader) -> Result<(), CubeError> {
        if header.shape() != self.header.shape() {
            return Err(CubeError::ShapeMismatch {
                name: header.name.clone(),
                expected: self.header.shape(),
                actual: header.shape(),
            });
        }
        self.header = header;
        Ok(())
    }

    /// Fails with [`CubeError::ShapeMismatch`] unless `other` has this cube's shape.
    pub fn ensure_same_shape(&self, other: &ImageCube) -> Result<(), CubeError> {
        if self.header.shape() != other.header.shape() {
            return Err(CubeError::ShapeMismatch {
                name: other.header.name.clone(),
                expected: self.header.shape(),
                actual: other.header.shape(),
            });
        }
        Ok(())
    }

    pub fn into_parts(self) -> (CubeHeader, Vec<f32>, Vec<bool>) {
        (self.header, self.data, self.mask)
    }
}
