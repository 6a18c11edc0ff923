//! Pure planning: from configuration and catalog to an ordered list of
//! (triple, stage) work items. Never touches the image engine.

use std::fmt;

use tracing::{debug, info};

use super::catalog::Catalog;
use super::config::{ConfigError, PipelineConfig};
use super::stage::{ConfigType, Gates, Stage};

/// One (target, product, configuration) combination.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Triple {
    pub target: String,
    pub product: String,
    pub config: String,
    pub config_type: ConfigType,
}

impl fmt::Display for Triple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.target, self.product, self.config)
    }
}

/// A triple with everything the planner learned about it.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedTriple {
    pub triple: Triple,
    pub gates: Gates,
    /// Interferometric configuration holding the raw imaging: the triple's
    /// own for interferometric triples, the paired one for feathered triples.
    pub imaging_config: Option<String>,
    /// Parts of a mosaic target, empty otherwise.
    pub mosaic_parts: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkItem {
    /// Index into [`Plan::triples`].
    pub triple: usize,
    pub stage: Stage,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Plan {
    pub triples: Vec<PlannedTriple>,
    pub items: Vec<WorkItem>,
}

impl Plan {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Work items in execution order with their triples.
    pub fn iter(&self) -> impl Iterator<Item = (&PlannedTriple, Stage)> + '_ {
        self.items
            .iter()
            .map(|item| (&self.triples[item.triple], item.stage))
    }

    /// Stages planned for one triple, in execution order.
    pub fn stages_for(&self, target: &str, product: &str, config: &str) -> Vec<Stage> {
        self.iter()
            .filter(|(planned, _)| {
                let t = &planned.triple;
                t.target == target && t.product == product && t.config == config
            })
            .map(|(_, stage)| stage)
            .collect()
    }
}

fn filtered_targets(
    config: &PipelineConfig,
    catalog: &dyn Catalog,
) -> Result<Vec<String>, ConfigError> {
    let all = catalog.targets();
    config.targets.check("targets", &all)?;

    let mosaics: Vec<String> = all
        .iter()
        .filter(|target| catalog.mosaic_parts(target).is_some())
        .cloned()
        .collect();
    config.mosaic_targets.check("mosaic_targets", &mosaics)?;
    let kept_mosaics = config.mosaic_targets.apply(&mosaics);

    Ok(config
        .targets
        .apply(&all)
        .into_iter()
        .filter(|target| !mosaics.contains(target) || kept_mosaics.contains(target))
        .collect())
}

fn filtered_products(
    config: &PipelineConfig,
    catalog: &dyn Catalog,
) -> Result<Vec<String>, ConfigError> {
    let line = catalog.line_products();
    let cont = catalog.cont_products();
    config.line_products.check("line_products", &line)?;
    config.cont_products.check("cont_products", &cont)?;

    let mut products = Vec::new();
    if !config.no_line {
        products.extend(config.line_products.apply(&line));
    }
    if !config.no_cont {
        products.extend(config.cont_products.apply(&cont));
    }
    Ok(products)
}

fn filtered_configs(
    config: &PipelineConfig,
    catalog: &dyn Catalog,
) -> Result<Vec<(String, ConfigType)>, ConfigError> {
    let interf = catalog.interf_configs();
    let feather = catalog.feather_configs();
    config.interf_configs.check("interf_configs", &interf)?;
    config.feather_configs.check("feather_configs", &feather)?;

    let interf = config
        .interf_configs
        .apply(&interf)
        .into_iter()
        .map(|name| (name, ConfigType::Interferometric));
    let feather = config
        .feather_configs
        .apply(&feather)
        .into_iter()
        .map(|name| (name, ConfigType::Feathered));
    Ok(interf.chain(feather).collect())
}

fn plan_triple(catalog: &dyn Catalog, triple: Triple) -> PlannedTriple {
    let imaging_config = match triple.config_type {
        ConfigType::Interferometric => Some(triple.config.clone()),
        ConfigType::Feathered => catalog.interf_config_for_feather(&triple.config),
    };
    let has_imaging = imaging_config
        .as_deref()
        .is_some_and(|config| catalog.has_imaging(&triple.target, config, &triple.product));
    let mosaic_parts = catalog.mosaic_parts(&triple.target);
    let gates = Gates {
        has_imaging,
        has_single_dish: catalog
            .single_dish_file(&triple.target, &triple.product)
            .is_some(),
        is_mosaic: mosaic_parts.is_some(),
        config_type: triple.config_type,
    };
    PlannedTriple {
        triple,
        gates,
        imaging_config,
        mosaic_parts: mosaic_parts.unwrap_or_default(),
    }
}

/// Enumerate triples (target, then product, then configuration with
/// interferometric before feathered), gate them and order the work.
///
/// Non-mosaic triples come first, stage-major, so every part of a mosaic is
/// complete (feathered parts included) before any mosaic stage runs. Mosaic
/// triples follow, also stage-major.
pub fn plan(config: &PipelineConfig, catalog: &dyn Catalog) -> Result<Plan, ConfigError> {
    let targets = filtered_targets(config, catalog)?;
    let products = filtered_products(config, catalog)?;
    let configs = filtered_configs(config, catalog)?;

    let mut triples = Vec::new();
    let mut items = Vec::new();
    for target in &targets {
        for product in &products {
            for (name, config_type) in &configs {
                let planned = plan_triple(
                    catalog,
                    Triple {
                        target: target.clone(),
                        product: product.clone(),
                        config: name.clone(),
                        config_type: *config_type,
                    },
                );
                if !planned.gates.passes_feather_gate() {
                    debug!(
                        "Skipping {}: feathered configuration without mosaic or single-dish data",
                        planned.triple
                    );
                    continue;
                }

                let stages: Vec<Stage> = config
                    .stages
                    .enabled()
                    .filter(|stage| stage.applies_to(&planned.gates))
                    .collect();
                if stages.is_empty() {
                    debug!("Nothing to do for {} ({:?})", planned.triple, planned.gates);
                    continue;
                }
                let index = triples.len();
                items.extend(stages.into_iter().map(|stage| WorkItem { triple: index, stage }));
                triples.push(planned);
            }
        }
    }

    items.sort_by_key(|item| (triples[item.triple].gates.is_mosaic, item.stage));

    info!(
        "Planned {} work items over {} triples ({} targets, {} products, {} configurations)",
        items.len(),
        triples.len(),
        targets.len(),
        products.len(),
        configs.len()
    );
    Ok(Plan { triples, items })
}
