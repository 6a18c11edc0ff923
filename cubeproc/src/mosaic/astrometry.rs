//! Common astrometric grid covering a set of cubes.

use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

use crate::cube::{CubeHeader, RAD_TO_ARCSEC};

use super::error::{MosaicError, joined_names};

/// Default ceiling on the pixel count of either grid axis.
pub const DEFAULT_MAX_AXIS_PIXELS: usize = 10_000;

/// Slack when rounding an extent up to whole pixels, so an extent that is an
/// exact pixel multiple up to float noise does not gain a pixel.
const PIXEL_ROUNDING_SLACK: f64 = 1e-6;

/// Centre and full extent of a mosaic grid.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MosaicGrid {
    pub ra_ctr_deg: f64,
    pub dec_ctr_deg: f64,
    /// Extent along RA on the sky, already scaled by `cos(dec_ctr)`.
    pub delta_ra_arcsec: f64,
    pub delta_dec_arcsec: f64,
}

/// Explicit grid values; any unset field is derived from the inputs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridOverrides {
    pub ra_ctr_deg: Option<f64>,
    pub dec_ctr_deg: Option<f64>,
    pub delta_ra_arcsec: Option<f64>,
    pub delta_dec_arcsec: Option<f64>,
}

impl GridOverrides {
    fn complete(&self) -> Option<MosaicGrid> {
        Some(MosaicGrid {
            ra_ctr_deg: self.ra_ctr_deg?,
            dec_ctr_deg: self.dec_ctr_deg?,
            delta_ra_arcsec: self.delta_ra_arcsec?,
            delta_dec_arcsec: self.delta_dec_arcsec?,
        })
    }
}

/// Size guard applied by [`build_header`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridLimits {
    pub max_axis_pixels: usize,
    /// Build grids beyond `max_axis_pixels` anyway.
    pub allow_big: bool,
}

impl Default for GridLimits {
    fn default() -> Self {
        Self {
            max_axis_pixels: DEFAULT_MAX_AXIS_PIXELS,
            allow_big: false,
        }
    }
}

/// Grid covering the corners of every input.
///
/// The centre is the midpoint of the corner RA/Dec range unless forced
/// (degrees). The extent is twice the largest corner offset from the centre,
/// with RA offsets scaled by `cos(dec_ctr)`. Inputs whose corners span more
/// than 180 degrees of RA are taken to straddle RA = 0 and rejected; the same
/// min/max approach is also unreliable close to the poles.
pub fn common_grid(
    headers: &[CubeHeader],
    force_ra_deg: Option<f64>,
    force_dec_deg: Option<f64>,
) -> Result<MosaicGrid, MosaicError> {
    if headers.is_empty() {
        return Err(MosaicError::NoInputs {
            operation: "common grid",
        });
    }

    let (mut min_ra, mut max_ra) = (f64::INFINITY, f64::NEG_INFINITY);
    let (mut min_dec, mut max_dec) = (f64::INFINITY, f64::NEG_INFINITY);
    for header in headers {
        for corner in header.corners()? {
            min_ra = min_ra.min(corner.x);
            max_ra = max_ra.max(corner.x);
            min_dec = min_dec.min(corner.y);
            max_dec = max_dec.max(corner.y);
        }
    }

    if max_ra - min_ra > PI {
        return Err(MosaicError::MeridianStraddle {
            names: joined_names(headers.iter().map(|h| h.name.as_str())),
            span_deg: (max_ra - min_ra).to_degrees(),
        });
    }

    let ra_ctr = force_ra_deg.map_or((max_ra + min_ra) * 0.5, f64::to_radians);
    let dec_ctr = force_dec_deg.map_or((max_dec + min_dec) * 0.5, f64::to_radians);

    let delta_ra = 2.0 * (max_ra - ra_ctr).abs().max((min_ra - ra_ctr).abs()) * dec_ctr.cos();
    let delta_dec = 2.0 * (max_dec - dec_ctr).abs().max((min_dec - dec_ctr).abs());

    let grid = MosaicGrid {
        ra_ctr_deg: ra_ctr.to_degrees(),
        dec_ctr_deg: dec_ctr.to_degrees(),
        delta_ra_arcsec: delta_ra * RAD_TO_ARCSEC,
        delta_dec_arcsec: delta_dec * RAD_TO_ARCSEC,
    };
    tracing::debug!("Common grid over {} cubes: {:?}", headers.len(), grid);
    Ok(grid)
}

/// Grid from overrides, computing only what they leave unset.
pub fn resolve_grid(
    headers: &[CubeHeader],
    overrides: &GridOverrides,
) -> Result<MosaicGrid, MosaicError> {
    if let Some(grid) = overrides.complete() {
        return Ok(grid);
    }
    let computed = common_grid(headers, overrides.ra_ctr_deg, overrides.dec_ctr_deg)?;
    Ok(MosaicGrid {
        delta_ra_arcsec: overrides
            .delta_ra_arcsec
            .unwrap_or(computed.delta_ra_arcsec),
        delta_dec_arcsec: overrides
            .delta_dec_arcsec
            .unwrap_or(computed.delta_dec_arcsec),
        ..computed
    })
}

/// Header for `grid`, keeping the template's pixel scale, units and
/// non-direction axes.
///
/// The reference value moves to the grid centre, which sits at pixel
/// `(n - 1) / 2` of each direction axis; `n = ceil(extent / pixel)`.
pub fn build_header(
    grid: &MosaicGrid,
    template: &CubeHeader,
    limits: &GridLimits,
) -> Result<CubeHeader, MosaicError> {
    for (parameter, value) in [
        ("delta_ra", grid.delta_ra_arcsec),
        ("delta_dec", grid.delta_dec_arcsec),
    ] {
        if !value.is_finite() || value <= 0.0 {
            return Err(MosaicError::InvalidParameter {
                name: format!("template '{}'", template.name),
                parameter,
                value,
            });
        }
    }

    let (ra_idx, dec_idx) = template.direction_axes()?;
    let (ra_pix, dec_pix) = template.pixel_scales_arcsec()?;
    let nx = (grid.delta_ra_arcsec / ra_pix - PIXEL_ROUNDING_SLACK).ceil().max(1.0);
    let ny = (grid.delta_dec_arcsec / dec_pix - PIXEL_ROUNDING_SLACK).ceil().max(1.0);

    let limit = limits.max_axis_pixels as f64;
    if nx > limit || ny > limit {
        if !limits.allow_big {
            return Err(MosaicError::GridTooLarge {
                template: template.name.clone(),
                nx: nx as usize,
                ny: ny as usize,
                limit: limits.max_axis_pixels,
            });
        }
        tracing::warn!("Building a {} x {} pixel grid", nx, ny);
    }
    let (nx, ny) = (nx as usize, ny as usize);

    let mut header = template.clone();
    let ra = &mut header.axes[ra_idx];
    ra.size = nx;
    ra.reference_value = grid.ra_ctr_deg.to_radians();
    ra.reference_pixel = (nx as f64 - 1.0) / 2.0;
    let dec = &mut header.axes[dec_idx];
    dec.size = ny;
    dec.reference_value = grid.dec_ctr_deg.to_radians();
    dec.reference_pixel = (ny as f64 - 1.0) / 2.0;

    tracing::debug!(
        "Grid header from '{}': {} x {} pixels",
        template.name,
        nx,
        ny
    );
    Ok(header)
}
