//! The image-engine collaborator.
//!
//! Everything that touches on-disk images goes through [`ImageEngine`]: the
//! numerics in this crate only ever see loaded [`ImageCube`]s. Regridding,
//! convolution, feathering and FITS conversion are black-box primitives of
//! the engine.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

use crate::cube::{Beam, CubeHeader, ImageCube};

/// Interpolation used when regridding onto a template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Interpolation {
    Nearest,
    Linear,
    #[default]
    Cubic,
}

/// Options for exporting an image to FITS.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportOptions {
    /// Force a round beam in the exported header when the major and minor
    /// axes agree to within `round_beam_tolerance` (fractional).
    pub round_beam: bool,
    pub round_beam_tolerance: f64,
    /// Drop the history cards of the source image.
    pub zap_history: bool,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            round_beam: true,
            round_beam_tolerance: 0.01,
            zap_history: true,
        }
    }
}

/// Options for feathering interferometric and single-dish cubes.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatherOptions {
    /// Blank the output where the interferometric data is blank.
    pub blank: bool,
    /// Primary-beam image used to apodize the interferometric data before
    /// feathering. `None` feathers the primary-beam corrected data as is.
    pub apodize_with: Option<PathBuf>,
    pub apodize_cutoff: f64,
}

impl Default for FeatherOptions {
    fn default() -> Self {
        Self {
            blank: true,
            apodize_with: None,
            apodize_cutoff: -1.0,
        }
    }
}

/// Image I/O and the heavy image primitives.
///
/// Every operation fully overwrites its output.
pub trait ImageEngine {
    fn exists(&self, path: &Path) -> bool;

    fn read_header(&self, path: &Path) -> anyhow::Result<CubeHeader>;

    /// Read the full pixel array and its validity mask.
    fn read_cube(&self, path: &Path) -> anyhow::Result<ImageCube>;

    fn write_cube(&self, path: &Path, cube: &ImageCube) -> anyhow::Result<()>;

    /// Copy an image, dropping degenerate axes.
    fn copy_dropdeg(&self, input: &Path, output: &Path) -> anyhow::Result<()>;

    /// Import a FITS file as an engine image.
    fn import_fits(&self, input: &Path, output: &Path) -> anyhow::Result<()>;

    fn export_fits(&self, input: &Path, output: &Path, options: &ExportOptions)
    -> anyhow::Result<()>;

    /// Resample `input` onto the grid described by `template`. `input` and
    /// `output` must be different images.
    fn regrid(
        &self,
        input: &Path,
        template: &CubeHeader,
        output: &Path,
        interpolation: Interpolation,
    ) -> anyhow::Result<()>;

    /// Convolve `input` so its restoring beam becomes `target`.
    fn convolve(&self, input: &Path, output: &Path, target: &Beam) -> anyhow::Result<()>;

    fn feather(
        &self,
        interferometer: &Path,
        single_dish: &Path,
        output: &Path,
        options: &FeatherOptions,
    ) -> anyhow::Result<()>;
}
