//! Stage list, per-triple gates and the declarative applicability table.

use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString, IntoStaticStr};

/// Post-processing stages in execution order.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Display,
    EnumString,
    EnumIter,
    IntoStaticStr,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum Stage {
    /// Copy raw imaging products into the post-processing area.
    Stage,
    /// Primary-beam correction.
    Pbcorr,
    /// Convolution to a round beam.
    Round,
    /// Import and align single-dish data.
    SdPrep,
    /// Weight images for mosaic parts.
    Weight,
    MosaicConvolve,
    MosaicAlign,
    MosaicCombine,
    Feather,
    /// Trim to the valid region.
    Compress,
    /// Jy/beam to Kelvin.
    Convert,
    /// FITS export.
    Export,
}

/// Kind of array configuration.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, EnumString, Serialize, Deserialize,
)]
pub enum ConfigType {
    #[strum(serialize = "interf")]
    #[serde(rename = "interf")]
    Interferometric,
    #[strum(serialize = "feather")]
    #[serde(rename = "feather")]
    Feathered,
}

/// Facts about one (target, product, configuration) triple that decide
/// which stages apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Gates {
    pub has_imaging: bool,
    pub has_single_dish: bool,
    pub is_mosaic: bool,
    pub config_type: ConfigType,
}

impl Gates {
    /// Feathered configurations only make sense for mosaics or targets with
    /// single-dish data.
    pub fn passes_feather_gate(&self) -> bool {
        self.config_type != ConfigType::Feathered || self.is_mosaic || self.has_single_dish
    }
}

/// Data a stage needs on the triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Needs {
    Imaging,
    ImagingAndSingleDish,
    Mosaic,
    ImagingOrMosaic,
}

impl Needs {
    fn holds(self, gates: &Gates) -> bool {
        match self {
            Needs::Imaging => gates.has_imaging,
            Needs::ImagingAndSingleDish => gates.has_imaging && gates.has_single_dish,
            Needs::Mosaic => gates.is_mosaic,
            Needs::ImagingOrMosaic => gates.has_imaging || gates.is_mosaic,
        }
    }
}

/// One row of the applicability table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Applicability {
    /// Restrict to one configuration type; `None` accepts both.
    pub config: Option<ConfigType>,
    pub needs: Needs,
}

const INTERF: Option<ConfigType> = Some(ConfigType::Interferometric);
const FEATHER: Option<ConfigType> = Some(ConfigType::Feathered);

#[rustfmt::skip]
const APPLICABILITY: [(Stage, Applicability); 12] = [
    (Stage::Stage,          Applicability { config: INTERF,  needs: Needs::Imaging }),
    (Stage::Pbcorr,         Applicability { config: INTERF,  needs: Needs::Imaging }),
    (Stage::Round,          Applicability { config: INTERF,  needs: Needs::Imaging }),
    (Stage::SdPrep,         Applicability { config: INTERF,  needs: Needs::ImagingAndSingleDish }),
    (Stage::Weight,         Applicability { config: None,    needs: Needs::Mosaic }),
    (Stage::MosaicConvolve, Applicability { config: None,    needs: Needs::Mosaic }),
    (Stage::MosaicAlign,    Applicability { config: None,    needs: Needs::Mosaic }),
    (Stage::MosaicCombine,  Applicability { config: None,    needs: Needs::Mosaic }),
    (Stage::Feather,        Applicability { config: FEATHER, needs: Needs::ImagingAndSingleDish }),
    (Stage::Compress,       Applicability { config: None,    needs: Needs::ImagingOrMosaic }),
    (Stage::Convert,        Applicability { config: None,    needs: Needs::ImagingOrMosaic }),
    (Stage::Export,         Applicability { config: None,    needs: Needs::ImagingOrMosaic }),
];

impl Stage {
    pub fn name(self) -> &'static str {
        self.into()
    }

    pub fn applicability(self) -> Applicability {
        APPLICABILITY[self as usize].1
    }

    /// Whether this stage runs for a triple with `gates`, ignoring toggles.
    pub fn applies_to(self, gates: &Gates) -> bool {
        let rule = self.applicability();
        gates.passes_feather_gate()
            && rule.config.is_none_or(|config| config == gates.config_type)
            && rule.needs.holds(gates)
    }

    /// Stages that operate on a mosaic as a whole.
    pub fn is_mosaic_stage(self) -> bool {
        self.applicability().needs == Needs::Mosaic
    }
}
