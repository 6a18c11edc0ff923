//! Weighted linear combination of aligned cubes.

use rayon::prelude::*;

use crate::cube::ImageCube;

use super::error::{MosaicError, joined_names};
use super::weight::WeightMap;

/// Output of [`combine`].
#[derive(Debug, Clone)]
pub struct LinearMosaic {
    /// `Σ(d·w²) / Σ(w²)`; masked out and zero where `Σ(w²) = 0`.
    pub image: ImageCube,
    /// `Σ(w²)` per pixel, fully valid.
    pub weight_sum: ImageCube,
}

impl LinearMosaic {
    /// Pixels with positive total weight.
    pub fn covered(&self) -> usize {
        self.image.mask().iter().filter(|&&m| m).count()
    }
}

/// Combine aligned cubes with matching weight maps.
///
/// A pixel contributes only where both the cube and its weight map are
/// valid. The output header is the first cube's.
pub fn combine(cubes: &[ImageCube], weights: &[WeightMap]) -> Result<LinearMosaic, MosaicError> {
    if cubes.is_empty() {
        return Err(MosaicError::NoInputs {
            operation: "linear mosaic",
        });
    }
    if cubes.len() != weights.len() {
        return Err(MosaicError::WeightCountMismatch {
            names: joined_names(cubes.iter().map(ImageCube::name)),
            cubes: cubes.len(),
            weights: weights.len(),
        });
    }
    let reference = &cubes[0];
    for (cube, weight) in cubes.iter().zip(weights) {
        reference.ensure_same_shape(cube)?;
        reference.ensure_same_shape(weight.cube())?;
    }

    let sums: Vec<(f64, f64)> = (0..reference.len())
        .into_par_iter()
        .map(|i| {
            let mut sum = 0.0f64;
            let mut weight_sum = 0.0f64;
            for (cube, weight) in cubes.iter().zip(weights) {
                let value = cube.data()[i];
                let w = weight.weights()[i];
                if !cube.mask()[i] || !value.is_finite() || !weight.cube().mask()[i] {
                    continue;
                }
                let w2 = f64::from(w) * f64::from(w);
                sum += f64::from(value) * w2;
                weight_sum += w2;
            }
            (sum, weight_sum)
        })
        .collect();

    let mut data = Vec::with_capacity(sums.len());
    let mut mask = Vec::with_capacity(sums.len());
    let mut weight_data = Vec::with_capacity(sums.len());
    for (sum, weight_sum) in sums {
        if weight_sum > 0.0 {
            data.push((sum / weight_sum) as f32);
            mask.push(true);
        } else {
            data.push(0.0);
            mask.push(false);
        }
        weight_data.push(weight_sum as f32);
    }

    let image = ImageCube::new(reference.header().clone(), data, mask)?;
    let mut weight_header = reference.header().clone();
    weight_header.name = format!("{}.weight", reference.name());
    weight_header.brightness_unit = String::new();
    let weight_mask = vec![true; weight_data.len()];
    let weight_sum = ImageCube::new(weight_header, weight_data, weight_mask)?;

    let mosaic = LinearMosaic { image, weight_sum };
    tracing::info!(
        "Linear mosaic of {} cubes: {} of {} pixels covered",
        cubes.len(),
        mosaic.covered(),
        reference.len()
    );
    Ok(mosaic)
}
