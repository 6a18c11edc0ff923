//! Target metadata and the artifact naming convention.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use common::{FileFormat, deserialize};
use serde::{Deserialize, Serialize};

use super::config::{ConfigError, load_document};

/// Files produced or consumed along the pipeline for one triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Artifact {
    Original,
    PrimaryBeam,
    Pbcorr,
    PbcorrRound,
    ImportedSingleDish,
    PreppedSingleDish,
    Weight,
    LinmosRound,
    LinmosAligned,
    WeightAligned,
    PbcorrTrimmed,
    TrimmedPb,
    PbcorrTrimmedK,
    PbcorrTrimmedKFits,
    TrimmedPbFits,
}

impl Artifact {
    /// Name suffix and file extension.
    fn naming(self) -> (Option<&'static str>, &'static str) {
        match self {
            Artifact::Original => (None, ".image"),
            Artifact::PrimaryBeam => (None, ".pb"),
            Artifact::Pbcorr => (Some("pbcorr"), ".image"),
            Artifact::PbcorrRound => (Some("pbcorr_round"), ".image"),
            Artifact::ImportedSingleDish => (Some("singledish_import"), ".image"),
            Artifact::PreppedSingleDish => (Some("singledish"), ".image"),
            Artifact::Weight => (Some("weight"), ".image"),
            Artifact::LinmosRound => (Some("linmos_round"), ".image"),
            Artifact::LinmosAligned => (Some("linmos_aligned"), ".image"),
            Artifact::WeightAligned => (Some("weight_aligned"), ".image"),
            Artifact::PbcorrTrimmed => (Some("pbcorr_trimmed"), ".image"),
            Artifact::TrimmedPb => (Some("trimmed"), ".pb"),
            Artifact::PbcorrTrimmedK => (Some("pbcorr_trimmed_k"), ".image"),
            Artifact::PbcorrTrimmedKFits => (Some("pbcorr_trimmed_k"), ".fits"),
            Artifact::TrimmedPbFits => (Some("trimmed_pb"), ".fits"),
        }
    }
}

/// `<target>_<config>_<product>[_<suffix>]<ext>`
pub fn artifact_file_name(target: &str, config: &str, product: &str, artifact: Artifact) -> String {
    let (suffix, extension) = artifact.naming();
    match suffix {
        Some(suffix) => format!("{target}_{config}_{product}_{suffix}{extension}"),
        None => format!("{target}_{config}_{product}{extension}"),
    }
}

/// Target, product and configuration metadata plus file locations.
pub trait Catalog {
    fn targets(&self) -> Vec<String>;
    fn line_products(&self) -> Vec<String>;
    fn cont_products(&self) -> Vec<String>;
    fn interf_configs(&self) -> Vec<String>;
    fn feather_configs(&self) -> Vec<String>;

    /// Interferometric configuration a feathered configuration is built from.
    fn interf_config_for_feather(&self, feather_config: &str) -> Option<String>;

    /// Parts of a linear mosaic, `None` if the target is not a mosaic.
    fn mosaic_parts(&self, target: &str) -> Option<Vec<String>>;

    fn single_dish_file(&self, target: &str, product: &str) -> Option<PathBuf>;

    /// Whether raw imaging exists for the triple.
    fn has_imaging(&self, target: &str, config: &str, product: &str) -> bool;

    fn imaging_dir(&self, target: &str) -> PathBuf;
    fn postprocess_dir(&self, target: &str) -> PathBuf;

    /// Location of a raw imaging product.
    fn imaging_path(&self, target: &str, config: &str, product: &str, artifact: Artifact) -> PathBuf {
        self.imaging_dir(target)
            .join(artifact_file_name(target, config, product, artifact))
    }

    /// Location of a post-processing product.
    fn artifact_path(
        &self,
        target: &str,
        config: &str,
        product: &str,
        artifact: Artifact,
    ) -> PathBuf {
        self.postprocess_dir(target)
            .join(artifact_file_name(target, config, product, artifact))
    }
}

/// Imaging known to exist for one triple.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImagingRecord {
    pub target: String,
    pub config: String,
    pub product: String,
}

/// A feathered configuration and the interferometric configuration it is
/// built from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatherPair {
    pub feather: String,
    pub interf: String,
}

/// Catalog held in memory, loadable from YAML or JSON.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StaticCatalog {
    pub targets: Vec<String>,
    /// Mosaic target to its parts.
    pub mosaics: BTreeMap<String, Vec<String>>,
    pub line_products: Vec<String>,
    pub cont_products: Vec<String>,
    pub interf_configs: Vec<String>,
    /// Feathered configurations in declaration order.
    pub feather_configs: Vec<FeatherPair>,
    /// Target to product to single-dish FITS file.
    pub single_dish: BTreeMap<String, BTreeMap<String, PathBuf>>,
    pub imaging: Vec<ImagingRecord>,
    pub imaging_root: PathBuf,
    pub postprocess_root: PathBuf,
}

impl StaticCatalog {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        load_document(path)
    }

    pub fn from_yaml_str(text: &str) -> Result<Self, ConfigError> {
        deserialize(text, FileFormat::Yaml).map_err(|source| ConfigError::Parse {
            path: "<string>".to_string(),
            source,
        })
    }

    pub fn with_imaging(mut self, target: &str, config: &str, product: &str) -> Self {
        self.imaging.push(ImagingRecord {
            target: target.to_string(),
            config: config.to_string(),
            product: product.to_string(),
        });
        self
    }

    pub fn with_feather(mut self, feather: &str, interf: &str) -> Self {
        self.feather_configs.push(FeatherPair {
            feather: feather.to_string(),
            interf: interf.to_string(),
        });
        self
    }

    pub fn with_single_dish(mut self, target: &str, product: &str, file: impl Into<PathBuf>) -> Self {
        self.single_dish
            .entry(target.to_string())
            .or_default()
            .insert(product.to_string(), file.into());
        self
    }
}

impl Catalog for StaticCatalog {
    fn targets(&self) -> Vec<String> {
        self.targets.clone()
    }

    fn line_products(&self) -> Vec<String> {
        self.line_products.clone()
    }

    fn cont_products(&self) -> Vec<String> {
        self.cont_products.clone()
    }

    fn interf_configs(&self) -> Vec<String> {
        self.interf_configs.clone()
    }

    fn feather_configs(&self) -> Vec<String> {
        self.feather_configs
            .iter()
            .map(|pair| pair.feather.clone())
            .collect()
    }

    fn interf_config_for_feather(&self, feather_config: &str) -> Option<String> {
        self.feather_configs
            .iter()
            .find(|pair| pair.feather == feather_config)
            .map(|pair| pair.interf.clone())
    }

    fn mosaic_parts(&self, target: &str) -> Option<Vec<String>> {
        self.mosaics.get(target).cloned()
    }

    fn single_dish_file(&self, target: &str, product: &str) -> Option<PathBuf> {
        self.single_dish.get(target)?.get(product).cloned()
    }

    fn has_imaging(&self, target: &str, config: &str, product: &str) -> bool {
        self.imaging
            .iter()
            .any(|r| r.target == target && r.config == config && r.product == product)
    }

    fn imaging_dir(&self, target: &str) -> PathBuf {
        self.imaging_root.join(target)
    }

    fn postprocess_dir(&self, target: &str) -> PathBuf {
        self.postprocess_root.join(target)
    }
}
