//! Whole-cube corrections: primary-beam correction, brightness unit
//! conversion and trimming to the valid region.

use super::error::CubeError;
use super::{ImageCube, strides};

/// Brightness unit of interferometric images.
pub const JY_PER_BEAM: &str = "Jy/beam";

/// Brightness unit after conversion to temperature.
pub const KELVIN: &str = "K";

/// `T[K] = JY_TO_K · S[Jy/beam] / (ν[GHz]² · θmaj["] · θmin["])`.
const JY_TO_K: f64 = 1.222e6;

/// Divide `image` by the primary-beam response `pb`.
///
/// Pixels where the response is invalid or at or below `cutoff` (and always
/// where it is not positive) become NaN and are masked out.
pub fn primary_beam_correct(
    image: &ImageCube,
    pb: &ImageCube,
    cutoff: f32,
) -> Result<ImageCube, CubeError> {
    image.ensure_same_shape(pb)?;
    let cutoff = cutoff.max(0.0);

    let mut corrected = image.clone();
    let (data, mask) = (corrected.data.as_mut_slice(), corrected.mask.as_mut_slice());
    for (((value, valid), &response), &response_valid) in data
        .iter_mut()
        .zip(mask.iter_mut())
        .zip(pb.data())
        .zip(pb.mask())
    {
        if response_valid && response.is_finite() && response > cutoff {
            *value /= response;
        } else {
            *value = f32::NAN;
            *valid = false;
        }
    }
    tracing::debug!(
        "Primary-beam corrected '{}' with '{}': {} valid pixels",
        image.name(),
        pb.name(),
        corrected.valid_count()
    );
    Ok(corrected)
}

/// Jy/beam to Kelvin factor for the cube's beam and rest frequency.
pub fn jy_to_kelvin_factor(cube: &ImageCube) -> Result<f64, CubeError> {
    let header = cube.header();
    let major = header.beam_major_arcsec()?;
    let minor = header.beam.as_ref().map_or(major, |beam| beam.minor);
    let freq_ghz = header
        .rest_frequency_hz
        .ok_or_else(|| CubeError::MissingRestFrequency {
            name: header.name.clone(),
        })?
        / 1e9;
    Ok(JY_TO_K / (freq_ghz * freq_ghz * major * minor))
}

fn convert_units(
    cube: &mut ImageCube,
    from: &'static str,
    to: &'static str,
    factor: f64,
) -> Result<(), CubeError> {
    if cube.header().brightness_unit != from {
        return Err(CubeError::BrightnessUnit {
            name: cube.name().to_string(),
            expected: from,
            found: cube.header().brightness_unit.clone(),
        });
    }
    let factor = factor as f32;
    cube.data.iter_mut().for_each(|v| *v *= factor);
    cube.set_brightness_unit(to);
    tracing::debug!("Converted '{}' from {} to {} (x{})", cube.name(), from, to, factor);
    Ok(())
}

/// Convert a Jy/beam cube to brightness temperature in place.
pub fn jy_to_kelvin(cube: &mut ImageCube) -> Result<(), CubeError> {
    let factor = jy_to_kelvin_factor(cube)?;
    convert_units(cube, JY_PER_BEAM, KELVIN, factor)
}

/// Convert a Kelvin cube back to Jy/beam in place.
pub fn kelvin_to_jy(cube: &mut ImageCube) -> Result<(), CubeError> {
    let factor = jy_to_kelvin_factor(cube)?;
    convert_units(cube, KELVIN, JY_PER_BEAM, 1.0 / factor)
}

/// Crop the direction axes to the bounding box of valid pixels (over all
/// channels), grown by `pad` pixels and clipped to the original extent.
///
/// Reference pixels shift with the crop so sky coordinates are unchanged.
pub fn trim_to_valid(cube: &ImageCube, pad: usize) -> Result<ImageCube, CubeError> {
    let (ra_idx, dec_idx) = cube.header().direction_axes()?;
    let shape = cube.shape();
    let old_strides = strides(&shape);

    let mut lo = [usize::MAX; 2];
    let mut hi = [0usize; 2];
    for (i, (&value, &valid)) in cube.data().iter().zip(cube.mask()).enumerate() {
        if !valid || !value.is_finite() {
            continue;
        }
        for (k, axis) in [ra_idx, dec_idx].into_iter().enumerate() {
            let position = (i / old_strides[axis]) % shape[axis];
            lo[k] = lo[k].min(position);
            hi[k] = hi[k].max(position);
        }
    }
    if lo[0] == usize::MAX {
        return Err(CubeError::NoValidPixels {
            name: cube.name().to_string(),
        });
    }

    let mut header = cube.header().clone();
    let mut offsets = vec![0usize; shape.len()];
    for (k, axis) in [ra_idx, dec_idx].into_iter().enumerate() {
        let start = lo[k].saturating_sub(pad);
        let end = (hi[k] + pad).min(shape[axis] - 1);
        offsets[axis] = start;
        header.axes[axis].size = end - start + 1;
        header.axes[axis].reference_pixel -= start as f64;
    }

    let new_shape = header.shape();
    let new_strides = strides(&new_shape);
    let len = header.pixel_count();
    let mut data = Vec::with_capacity(len);
    let mut mask = Vec::with_capacity(len);
    for j in 0..len {
        let old: usize = new_shape
            .iter()
            .zip(&new_strides)
            .zip(old_strides.iter().zip(&offsets))
            .map(|((&size, &stride), (&old_stride, &offset))| {
                ((j / stride) % size + offset) * old_stride
            })
            .sum();
        data.push(cube.data[old]);
        mask.push(cube.mask[old]);
    }

    tracing::debug!(
        "Trimmed '{}' from {:?} to {:?}",
        cube.name(),
        shape,
        new_shape
    );
    ImageCube::new(header, data, mask)
}
