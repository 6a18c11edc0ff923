//! Pipeline configuration: list filters, stage toggles and numeric overrides.

use std::path::Path;

use common::{FileFormat, deserialize};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;
use strum_macros::{Display, EnumString};
use thiserror::Error;

use crate::mosaic::{DEFAULT_MAX_AXIS_PIXELS, DEFAULT_PIXEL_PADDING, GridLimits, GridOverrides};
use crate::noise::NoiseMethod;

use super::stage::Stage;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Config '{path}': {source}")]
    Format {
        path: String,
        #[source]
        source: common::FileExtensionError,
    },

    #[error("Failed to parse config '{path}': {source}")]
    Parse {
        path: String,
        #[source]
        source: common::SerdeFormatError,
    },

    #[error("Filter for {list}: '{name}' in {field} is not a known entry")]
    UnknownFilterEntry {
        list: &'static str,
        field: &'static str,
        name: String,
    },

    #[error("Invalid override {parameter}: {value}")]
    InvalidOverride { parameter: &'static str, value: f64 },
}

/// Selects a sub-list of an ordered list.
///
/// `first` and `last` bound an inclusive range by position; `only` keeps
/// just the named entries and `skip` drops entries. Empty fields do nothing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListFilter {
    pub first: Option<String>,
    pub last: Option<String>,
    pub only: Vec<String>,
    pub skip: Vec<String>,
}

impl ListFilter {
    pub fn only<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            only: names.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn skip<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            skip: names.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.first.is_none() && self.last.is_none() && self.only.is_empty() && self.skip.is_empty()
    }

    /// Apply to `items`, keeping their order.
    pub fn apply(&self, items: &[String]) -> Vec<String> {
        let mut after_first = self.first.is_none();
        let mut past_last = false;
        let mut kept = Vec::new();
        for item in items {
            if past_last {
                break;
            }
            if self.first.as_ref() == Some(item) {
                after_first = true;
            }
            if self.last.as_ref() == Some(item) {
                past_last = true;
            }
            if !after_first {
                continue;
            }
            if !self.only.is_empty() && !self.only.contains(item) {
                continue;
            }
            if self.skip.contains(item) {
                continue;
            }
            kept.push(item.clone());
        }
        kept
    }

    /// Fails on any named entry that is not in `items`.
    pub fn check(&self, list: &'static str, items: &[String]) -> Result<(), ConfigError> {
        let named = self
            .first
            .iter()
            .map(|name| ("first", name))
            .chain(self.last.iter().map(|name| ("last", name)))
            .chain(self.only.iter().map(|name| ("only", name)));
        for (field, name) in named {
            if !items.contains(name) {
                return Err(ConfigError::UnknownFilterEntry {
                    list,
                    field,
                    name: name.clone(),
                });
            }
        }
        Ok(())
    }
}

/// One switch per stage. All stages are off by default.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StageToggles {
    pub stage: bool,
    pub pbcorr: bool,
    pub round: bool,
    pub sd_prep: bool,
    pub weight: bool,
    pub mosaic_convolve: bool,
    pub mosaic_align: bool,
    pub mosaic_combine: bool,
    pub feather: bool,
    pub compress: bool,
    pub convert: bool,
    pub export: bool,
}

impl StageToggles {
    pub fn all() -> Self {
        let mut toggles = Self::default();
        for stage in Stage::iter() {
            toggles.set(stage, true);
        }
        toggles
    }

    pub fn only(stages: &[Stage]) -> Self {
        let mut toggles = Self::default();
        for &stage in stages {
            toggles.set(stage, true);
        }
        toggles
    }

    pub fn is_enabled(&self, stage: Stage) -> bool {
        *self.field(stage)
    }

    /// Enabled stages in execution order.
    pub fn enabled(&self) -> impl Iterator<Item = Stage> + '_ {
        Stage::iter().filter(|&stage| self.is_enabled(stage))
    }

    pub fn set(&mut self, stage: Stage, enabled: bool) {
        *self.field_mut(stage) = enabled;
    }

    fn field(&self, stage: Stage) -> &bool {
        match stage {
            Stage::Stage => &self.stage,
            Stage::Pbcorr => &self.pbcorr,
            Stage::Round => &self.round,
            Stage::SdPrep => &self.sd_prep,
            Stage::Weight => &self.weight,
            Stage::MosaicConvolve => &self.mosaic_convolve,
            Stage::MosaicAlign => &self.mosaic_align,
            Stage::MosaicCombine => &self.mosaic_combine,
            Stage::Feather => &self.feather,
            Stage::Compress => &self.compress,
            Stage::Convert => &self.convert,
            Stage::Export => &self.export,
        }
    }

    fn field_mut(&mut self, stage: Stage) -> &mut bool {
        match stage {
            Stage::Stage => &mut self.stage,
            Stage::Pbcorr => &mut self.pbcorr,
            Stage::Round => &mut self.round,
            Stage::SdPrep => &mut self.sd_prep,
            Stage::Weight => &mut self.weight,
            Stage::MosaicConvolve => &mut self.mosaic_convolve,
            Stage::MosaicAlign => &mut self.mosaic_align,
            Stage::MosaicCombine => &mut self.mosaic_combine,
            Stage::Feather => &mut self.feather,
            Stage::Compress => &mut self.compress,
            Stage::Convert => &mut self.convert,
            Stage::Export => &mut self.export,
        }
    }
}

/// Input used for feathering.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum FeatherMethod {
    /// Feather the primary-beam corrected interferometric data.
    #[default]
    Pbcorr,
    /// Apodize the interferometric data by its primary beam first.
    Apodize,
}

/// Numeric knobs of the individual transforms.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Overrides {
    /// Pixels added in quadrature to the largest beam for mosaics.
    pub pixel_padding: f64,
    /// Forced mosaic resolution in arcsec.
    pub target_resolution_arcsec: Option<f64>,
    pub grid: GridOverrides,
    pub max_axis_pixels: usize,
    pub allow_big_image: bool,
    /// Scale mosaic weights by `1/σ²` of each part.
    pub scale_weights_by_noise: bool,
    pub noise_method: NoiseMethod,
    /// Primary-beam response below which corrected pixels are blanked.
    pub pb_cutoff: f32,
    /// Pixels kept around the valid region when trimming.
    pub trim_padding: usize,
}

impl Default for Overrides {
    fn default() -> Self {
        Self {
            pixel_padding: DEFAULT_PIXEL_PADDING,
            target_resolution_arcsec: None,
            grid: GridOverrides::default(),
            max_axis_pixels: DEFAULT_MAX_AXIS_PIXELS,
            allow_big_image: false,
            scale_weights_by_noise: true,
            noise_method: NoiseMethod::Mad,
            pb_cutoff: 0.0,
            trim_padding: 2,
        }
    }
}

impl Overrides {
    pub fn grid_limits(&self) -> GridLimits {
        GridLimits {
            max_axis_pixels: self.max_axis_pixels,
            allow_big: self.allow_big_image,
        }
    }
}

/// Everything that selects and parameterises a post-processing run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub targets: ListFilter,
    pub mosaic_targets: ListFilter,
    pub line_products: ListFilter,
    pub cont_products: ListFilter,
    pub interf_configs: ListFilter,
    pub feather_configs: ListFilter,
    pub no_line: bool,
    pub no_cont: bool,
    pub stages: StageToggles,
    /// Plan and log without touching any image.
    pub dry_run: bool,
    pub feather_method: FeatherMethod,
    pub overrides: Overrides,
}

/// Read a YAML or JSON document, the format chosen by extension.
pub(crate) fn load_document<T: DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    let path_display = path.display().to_string();
    let format = FileFormat::from_path(path).map_err(|source| ConfigError::Format {
        path: path_display.clone(),
        source,
    })?;
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path_display.clone(),
        source,
    })?;
    let document = deserialize(&text, format).map_err(|source| ConfigError::Parse {
        path: path_display.clone(),
        source,
    })?;
    tracing::debug!("Loaded {}", path_display);
    Ok(document)
}

impl PipelineConfig {
    /// Load from a YAML or JSON file, chosen by extension.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let config: Self = load_document(path)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self =
            deserialize(text, FileFormat::Yaml).map_err(|source| ConfigError::Parse {
                path: "<string>".to_string(),
                source,
            })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let overrides = &self.overrides;
        if !overrides.pixel_padding.is_finite() || overrides.pixel_padding < 0.0 {
            return Err(ConfigError::InvalidOverride {
                parameter: "pixel_padding",
                value: overrides.pixel_padding,
            });
        }
        if let Some(resolution) = overrides.target_resolution_arcsec {
            if !resolution.is_finite() || resolution <= 0.0 {
                return Err(ConfigError::InvalidOverride {
                    parameter: "target_resolution_arcsec",
                    value: resolution,
                });
            }
        }
        if overrides.max_axis_pixels == 0 {
            return Err(ConfigError::InvalidOverride {
                parameter: "max_axis_pixels",
                value: 0.0,
            });
        }
        if !overrides.pb_cutoff.is_finite() || overrides.pb_cutoff < 0.0 {
            return Err(ConfigError::InvalidOverride {
                parameter: "pb_cutoff",
                value: f64::from(overrides.pb_cutoff),
            });
        }
        Ok(())
    }
}
