//! Common resolution for a set of cubes.

use crate::cube::{Beam, CubeHeader};

use super::error::{MosaicError, joined_names};

/// Pixels added in quadrature to the largest beam by default.
pub const DEFAULT_PIXEL_PADDING: f64 = 2.0;

/// Smallest round beam (arcsec) every cube can be convolved to.
///
/// `sqrt(max_beam² + (pixel_padding · max_pixel)²)`: the padding keeps the
/// implied convolution kernel resolved by at least `pixel_padding` pixels.
/// A `target_arcsec` short-circuits the computation.
pub fn common_resolution(
    headers: &[CubeHeader],
    pixel_padding: f64,
    target_arcsec: Option<f64>,
) -> Result<f64, MosaicError> {
    if let Some(target) = target_arcsec {
        if !target.is_finite() || target <= 0.0 {
            return Err(MosaicError::InvalidParameter {
                name: joined_names(headers.iter().map(|h| h.name.as_str())),
                parameter: "target_resolution",
                value: target,
            });
        }
        tracing::debug!("Using forced target resolution {} arcsec", target);
        return Ok(target);
    }

    if !pixel_padding.is_finite() || pixel_padding < 0.0 {
        return Err(MosaicError::InvalidParameter {
            name: joined_names(headers.iter().map(|h| h.name.as_str())),
            parameter: "pixel_padding",
            value: pixel_padding,
        });
    }
    if headers.is_empty() {
        return Err(MosaicError::NoInputs {
            operation: "common resolution",
        });
    }

    let mut max_beam = 0.0f64;
    let mut max_pixel = 0.0f64;
    for header in headers {
        max_pixel = max_pixel.max(header.pixel_scale_arcsec()?);
        max_beam = max_beam.max(header.beam_major_arcsec()?);
    }

    let resolution = (max_beam.powi(2) + (pixel_padding * max_pixel).powi(2)).sqrt();
    tracing::debug!(
        "Common resolution {} arcsec from beam {} and pixel {} over {} cubes",
        resolution,
        max_beam,
        max_pixel,
        headers.len()
    );
    Ok(resolution)
}

/// [`common_resolution`] as a round beam.
pub fn common_beam(
    headers: &[CubeHeader],
    pixel_padding: f64,
    target_arcsec: Option<f64>,
) -> Result<Beam, MosaicError> {
    common_resolution(headers, pixel_padding, target_arcsec).map(Beam::round_arcsec)
}
