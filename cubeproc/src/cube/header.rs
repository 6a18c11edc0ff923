//! Cube headers: axis descriptions, restoring beam and the celestial
//! (gnomonic) coordinate mapping of the two direction axes.

use glam::DVec2;
use serde::{Deserialize, Serialize};
use std::f64::consts::TAU;

use super::error::CubeError;

/// Radians to arcseconds.
pub const RAD_TO_ARCSEC: f64 = 180.0 / std::f64::consts::PI * 3600.0;

/// Unit string used for direction axes.
pub const RADIAN_UNIT: &str = "rad";

/// Unit string expected for beam sizes.
pub const ARCSEC_UNIT: &str = "arcsec";

/// Role of an axis, derived from its name rather than its position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AxisKind {
    RightAscension,
    Declination,
    Spectral,
    Stokes,
    Linear,
}

impl AxisKind {
    /// Classify an axis from either a CASA axis name ("Right Ascension",
    /// "Frequency") or a FITS CTYPE ("RA---SIN", "VRAD").
    pub fn from_name(name: &str) -> Self {
        let upper = name.trim().to_ascii_uppercase();
        if upper == "RIGHT ASCENSION" || upper == "RA" || upper.starts_with("RA--") {
            AxisKind::RightAscension
        } else if upper == "DECLINATION" || upper == "DEC" || upper.starts_with("DEC-") {
            AxisKind::Declination
        } else if upper == "FREQUENCY"
            || upper == "VELOCITY"
            || upper.starts_with("FREQ")
            || upper.starts_with("VRAD")
            || upper.starts_with("VOPT")
            || upper.starts_with("VELO")
            || upper.starts_with("FELO")
        {
            AxisKind::Spectral
        } else if upper == "STOKES" {
            AxisKind::Stokes
        } else {
            AxisKind::Linear
        }
    }
}

/// One axis of a cube. Pixel coordinates are zero-based.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Axis {
    pub name: String,
    pub unit: String,
    pub size: usize,
    pub reference_value: f64,
    pub reference_pixel: f64,
    pub increment: f64,
}

impl Axis {
    pub fn new(name: impl Into<String>, unit: impl Into<String>, size: usize) -> Self {
        Self {
            name: name.into(),
            unit: unit.into(),
            size,
            reference_value: 0.0,
            reference_pixel: 0.0,
            increment: 1.0,
        }
    }

    pub fn with_reference(mut self, value: f64, pixel: f64, increment: f64) -> Self {
        self.reference_value = value;
        self.reference_pixel = pixel;
        self.increment = increment;
        self
    }

    pub fn kind(&self) -> AxisKind {
        AxisKind::from_name(&self.name)
    }

    /// Linear world coordinate at a pixel position.
    pub fn world_at(&self, pixel: f64) -> f64 {
        self.reference_value + (pixel - self.reference_pixel) * self.increment
    }
}

/// Restoring beam. Major and minor axes are in `unit`, the position angle in degrees.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Beam {
    pub major: f64,
    pub minor: f64,
    pub position_angle_deg: f64,
    pub unit: String,
}

impl Beam {
    pub fn round_arcsec(size: f64) -> Self {
        Self {
            major: size,
            minor: size,
            position_angle_deg: 0.0,
            unit: ARCSEC_UNIT.to_string(),
        }
    }

    pub fn arcsec(major: f64, minor: f64, position_angle_deg: f64) -> Self {
        Self {
            major,
            minor,
            position_angle_deg,
            unit: ARCSEC_UNIT.to_string(),
        }
    }
}

/// Header metadata the numerics need: axes, beam and brightness unit.
///
/// `name` identifies the cube in errors and logs; engines set it to the
/// file the header was read from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CubeHeader {
    pub name: String,
    pub axes: Vec<Axis>,
    pub beam: Option<Beam>,
    pub brightness_unit: String,
    pub rest_frequency_hz: Option<f64>,
}

impl CubeHeader {
    pub fn new(name: impl Into<String>, axes: Vec<Axis>) -> Self {
        Self {
            name: name.into(),
            axes,
            beam: None,
            brightness_unit: "Jy/beam".to_string(),
            rest_frequency_hz: None,
        }
    }

    /// A two-axis sky image centred on `center_deg` (RA, Dec) with square
    /// pixels of `pixel_arcsec`. RA increases to the left as usual.
    pub fn sky(
        name: impl Into<String>,
        (nx, ny): (usize, usize),
        center_deg: (f64, f64),
        pixel_arcsec: f64,
    ) -> Self {
        let pixel_rad = pixel_arcsec / RAD_TO_ARCSEC;
        let axes = vec![
            Axis::new("Right Ascension", RADIAN_UNIT, nx).with_reference(
                center_deg.0.to_radians(),
                (nx as f64 - 1.0) / 2.0,
                -pixel_rad,
            ),
            Axis::new("Declination", RADIAN_UNIT, ny).with_reference(
                center_deg.1.to_radians(),
                (ny as f64 - 1.0) / 2.0,
                pixel_rad,
            ),
        ];
        Self::new(name, axes)
    }

    /// Append a frequency axis of `channels` planes.
    pub fn with_frequency_axis(mut self, channels: usize, start_hz: f64, width_hz: f64) -> Self {
        self.axes
            .push(Axis::new("Frequency", "Hz", channels).with_reference(start_hz, 0.0, width_hz));
        self
    }

    pub fn with_beam(mut self, beam: Beam) -> Self {
        self.beam = Some(beam);
        self
    }

    pub fn with_rest_frequency(mut self, rest_frequency_hz: f64) -> Self {
        self.rest_frequency_hz = Some(rest_frequency_hz);
        self
    }

    pub fn with_brightness_unit(mut self, unit: impl Into<String>) -> Self {
        self.brightness_unit = unit.into();
        self
    }

    pub fn shape(&self) -> Vec<usize> {
        self.axes.iter().map(|a| a.size).collect()
    }

    pub fn pixel_count(&self) -> usize {
        self.axes.iter().map(|a| a.size).product()
    }

    pub fn axis_index(&self, kind: AxisKind) -> Option<usize> {
        self.axes.iter().position(|a| a.kind() == kind)
    }

    /// Index of the spectral axis, located by name.
    pub fn spectral_axis(&self) -> Option<usize> {
        self.axis_index(AxisKind::Spectral)
    }

    /// Indices of the RA and Dec axes, both required to be in radians.
    pub fn direction_axes(&self) -> Result<(usize, usize), CubeError> {
        let ra = self
            .axis_index(AxisKind::RightAscension)
            .ok_or_else(|| CubeError::MissingAxis {
                name: self.name.clone(),
                axis: "Right Ascension",
            })?;
        let dec = self
            .axis_index(AxisKind::Declination)
            .ok_or_else(|| CubeError::MissingAxis {
                name: self.name.clone(),
                axis: "Declination",
            })?;
        for idx in [ra, dec] {
            let axis = &self.axes[idx];
            if axis.unit != RADIAN_UNIT {
                return Err(CubeError::UnexpectedUnit {
                    name: self.name.clone(),
                    axis: axis.name.clone(),
                    expected: RADIAN_UNIT,
                    found: axis.unit.clone(),
                });
            }
        }
        Ok((ra, dec))
    }

    /// Pixel size along the RA axis in arcseconds.
    pub fn pixel_scale_arcsec(&self) -> Result<f64, CubeError> {
        let (ra, _) = self.direction_axes()?;
        Ok(self.axes[ra].increment.abs() * RAD_TO_ARCSEC)
    }

    /// Pixel size along (RA, Dec) in arcseconds.
    pub fn pixel_scales_arcsec(&self) -> Result<(f64, f64), CubeError> {
        let (ra, dec) = self.direction_axes()?;
        Ok((
            self.axes[ra].increment.abs() * RAD_TO_ARCSEC,
            self.axes[dec].increment.abs() * RAD_TO_ARCSEC,
        ))
    }

    /// Beam major axis in arcseconds; the beam must be stored in arcseconds.
    pub fn beam_major_arcsec(&self) -> Result<f64, CubeError> {
        let beam = self.beam.as_ref().ok_or_else(|| CubeError::MissingBeam {
            name: self.name.clone(),
        })?;
        if beam.unit != ARCSEC_UNIT {
            return Err(CubeError::UnexpectedUnit {
                name: self.name.clone(),
                axis: "restoring beam".to_string(),
                expected: ARCSEC_UNIT,
                found: beam.unit.clone(),
            });
        }
        Ok(beam.major)
    }

    /// Sky position (RA, Dec in radians) of a pixel on the direction axes.
    ///
    /// Gnomonic (TAN) de-projection about the reference value. RA is
    /// normalised to `[0, 2π)`.
    pub fn pixel_to_sky(&self, x: f64, y: f64) -> Result<DVec2, CubeError> {
        let (ra_idx, dec_idx) = self.direction_axes()?;
        let ra_axis = &self.axes[ra_idx];
        let dec_axis = &self.axes[dec_idx];

        let xi = ra_axis.increment * (x - ra_axis.reference_pixel);
        let eta = dec_axis.increment * (y - dec_axis.reference_pixel);

        let ra0 = ra_axis.reference_value;
        let (sin_dec0, cos_dec0) = dec_axis.reference_value.sin_cos();
        let denom = cos_dec0 - eta * sin_dec0;

        let ra = ra0 + xi.atan2(denom);
        let dec = (sin_dec0 + eta * cos_dec0).atan2((xi * xi + denom * denom).sqrt());

        Ok(DVec2::new(ra.rem_euclid(TAU), dec))
    }

    /// Sky positions of the four corner pixels of the direction plane:
    /// bottom-left, top-left, top-right, bottom-right.
    pub fn corners(&self) -> Result<[DVec2; 4], CubeError> {
        let (ra_idx, dec_idx) = self.direction_axes()?;
        let xhi = self.axes[ra_idx].size.saturating_sub(1) as f64;
        let yhi = self.axes[dec_idx].size.saturating_sub(1) as f64;
        Ok([
            self.pixel_to_sky(0.0, 0.0)?,
            self.pixel_to_sky(0.0, yhi)?,
            self.pixel_to_sky(xhi, yhi)?,
            self.pixel_to_sky(xhi, 0.0)?,
        ])
    }
}
