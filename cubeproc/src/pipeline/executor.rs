//! Executes a [`Plan`]: resolves each work item's artifacts, logs them and,
//! outside dry-run mode, drives the transforms through the image engine.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use anyhow::Context;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::cube::{Beam, KELVIN, jy_to_kelvin, kelvin_to_jy, primary_beam_correct, trim_to_valid};
use crate::engine::{ExportOptions, FeatherOptions, ImageEngine, Interpolation};
use crate::mosaic::{
    MosaicError, WeightInputType, WeightMap, build_header, combine, common_beam, resolve_grid,
};
use crate::noise::{MaskUsage, noise_for_cube};

use super::catalog::{Artifact, Catalog};
use super::config::{ConfigError, FeatherMethod, PipelineConfig};
use super::plan::{Plan, PlannedTriple, Triple, plan};
use super::stage::Stage;

#[derive(Debug, Error)]
pub enum StageError {
    #[error("{stage} for {triple}: input {} does not exist", .path.display())]
    MissingInput {
        stage: Stage,
        triple: String,
        path: PathBuf,
    },

    #[error("{stage} for {triple}: configuration '{config}' has no interferometric pair")]
    MissingFeatherPair {
        stage: Stage,
        triple: String,
        config: String,
    },

    #[error("{stage} for {triple}: no single-dish data for target '{target}', product '{product}'")]
    MissingSingleDish {
        stage: Stage,
        triple: String,
        target: String,
        product: String,
    },
}

/// Copy-like step from one artifact to another.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transfer {
    pub input: PathBuf,
    pub output: PathBuf,
}

/// Weight image for one mosaic part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartWeight {
    pub pb: PathBuf,
    /// Image whose noise scales the weights, when scaling is on.
    pub noise_source: Option<PathBuf>,
    pub output: PathBuf,
}

/// A stage bound to concrete artifacts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageAction {
    Stage {
        copies: Vec<Transfer>,
    },
    Pbcorr {
        image: PathBuf,
        pb: PathBuf,
        output: PathBuf,
    },
    Round(Transfer),
    /// The FITS import lands in `imported` and is regridded from there.
    SdPrep {
        single_dish: PathBuf,
        imported: PathBuf,
        template: PathBuf,
        output: PathBuf,
    },
    Weight {
        parts: Vec<PartWeight>,
    },
    MosaicConvolve {
        parts: Vec<Transfer>,
    },
    MosaicAlign {
        images: Vec<Transfer>,
        weights: Vec<Transfer>,
    },
    MosaicCombine {
        images: Vec<PathBuf>,
        weights: Vec<PathBuf>,
        output: PathBuf,
        weight_output: PathBuf,
    },
    Feather {
        interferometer: PathBuf,
        single_dish: PathBuf,
        apodize_with: Option<PathBuf>,
        output: PathBuf,
    },
    /// The primary beam follows the trimmed image when it exists.
    Compress {
        image: Transfer,
        pb: Option<Transfer>,
    },
    Convert(Transfer),
    Export {
        image: Transfer,
        pb: Option<Transfer>,
    },
}

impl StageAction {
    /// Artifacts that must exist before the stage runs.
    pub fn inputs(&self) -> Vec<&Path> {
        match self {
            StageAction::Stage { copies } => copies.iter().map(|c| c.input.as_path()).collect(),
            StageAction::Pbcorr { image, pb, .. } => vec![image.as_path(), pb.as_path()],
            StageAction::Round(t) | StageAction::Convert(t) => vec![t.input.as_path()],
            StageAction::SdPrep {
                single_dish,
                template,
                ..
            } => vec![single_dish.as_path(), template.as_path()],
            StageAction::Weight { parts } => parts
                .iter()
                .flat_map(|p| std::iter::once(p.pb.as_path()).chain(p.noise_source.as_deref()))
                .collect(),
            StageAction::MosaicConvolve { parts } => {
                parts.iter().map(|t| t.input.as_path()).collect()
            }
            StageAction::MosaicAlign { images, weights } => images
                .iter()
                .chain(weights)
                .map(|t| t.input.as_path())
                .collect(),
            StageAction::MosaicCombine {
                images, weights, ..
            } => images.iter().chain(weights).map(PathBuf::as_path).collect(),
            StageAction::Feather {
                interferometer,
                single_dish,
                apodize_with,
                ..
            } => [Some(interferometer), Some(single_dish), apodize_with.as_ref()]
                .into_iter()
                .flatten()
                .map(PathBuf::as_path)
                .collect(),
            StageAction::Compress { image, .. } | StageAction::Export { image, .. } => {
                vec![image.input.as_path()]
            }
        }
    }

    /// Artifacts the stage writes (optional outputs included).
    pub fn outputs(&self) -> Vec<&Path> {
        match self {
            StageAction::Stage { copies } => copies.iter().map(|c| c.output.as_path()).collect(),
            StageAction::Pbcorr { output, .. } | StageAction::Feather { output, .. } => {
                vec![output.as_path()]
            }
            StageAction::SdPrep {
                imported, output, ..
            } => vec![imported.as_path(), output.as_path()],
            StageAction::Round(t) | StageAction::Convert(t) => vec![t.output.as_path()],
            StageAction::Weight { parts } => parts.iter().map(|p| p.output.as_path()).collect(),
            StageAction::MosaicConvolve { parts } => {
                parts.iter().map(|t| t.output.as_path()).collect()
            }
            StageAction::MosaicAlign { images, weights } => images
                .iter()
                .chain(weights)
                .map(|t| t.output.as_path())
                .collect(),
            StageAction::MosaicCombine {
                output,
                weight_output,
                ..
            } => vec![output.as_path(), weight_output.as_path()],
            StageAction::Compress { image, pb } | StageAction::Export { image, pb } => {
                std::iter::once(image)
                    .chain(pb.as_ref())
                    .map(|t| t.output.as_path())
                    .collect()
            }
        }
    }
}

/// What happened to one work item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageOutcome {
    Executed,
    /// Planned and logged only.
    DryRun,
    /// Rendered error chain.
    Failed(String),
    /// An earlier stage of the triple, or of a mosaic part, failed.
    SkippedUpstream,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ItemReport {
    pub triple: Triple,
    pub stage: Stage,
    pub outcome: StageOutcome,
}

/// One entry per work item, in execution order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunReport {
    pub items: Vec<ItemReport>,
}

impl RunReport {
    pub fn outcome(
        &self,
        target: &str,
        product: &str,
        config: &str,
        stage: Stage,
    ) -> Option<&StageOutcome> {
        self.items
            .iter()
            .find(|item| {
                item.stage == stage
                    && item.triple.target == target
                    && item.triple.product == product
                    && item.triple.config == config
            })
            .map(|item| &item.outcome)
    }

    pub fn count(&self, predicate: impl Fn(&StageOutcome) -> bool) -> usize {
        self.items.iter().filter(|item| predicate(&item.outcome)).count()
    }

    pub fn failures(&self) -> impl Iterator<Item = &ItemReport> + '_ {
        self.items
            .iter()
            .filter(|item| matches!(item.outcome, StageOutcome::Failed(_)))
    }

    pub fn is_success(&self) -> bool {
        self.failures().next().is_none()
    }
}

/// Drives post-processing for every planned triple.
pub struct Orchestrator<'a> {
    config: &'a PipelineConfig,
    catalog: &'a dyn Catalog,
    engine: &'a dyn ImageEngine,
}

impl<'a> Orchestrator<'a> {
    pub fn new(
        config: &'a PipelineConfig,
        catalog: &'a dyn Catalog,
        engine: &'a dyn ImageEngine,
    ) -> Self {
        Self {
            config,
            catalog,
            engine,
        }
    }

    /// Plan and execute.
    pub fn run(&self) -> Result<RunReport, ConfigError> {
        let plan = plan(self.config, self.catalog)?;
        Ok(self.execute(&plan))
    }

    /// Execute `plan`. A failed item fails its triple: the triple's later
    /// items, and mosaic items whose parts failed, are skipped. Other
    /// triples carry on.
    pub fn execute(&self, plan: &Plan) -> RunReport {
        info!(
            "Post-processing {} work items ({})",
            plan.len(),
            if self.config.dry_run { "dry run" } else { "live" }
        );

        let index: HashMap<(&str, &str, &str), usize> = plan
            .triples
            .iter()
            .enumerate()
            .map(|(i, planned)| {
                let t = &planned.triple;
                ((t.target.as_str(), t.product.as_str(), t.config.as_str()), i)
            })
            .collect();
        let mut failed: HashSet<usize> = HashSet::new();
        let mut report = RunReport::default();

        for item in &plan.items {
            let planned = &plan.triples[item.triple];
            let upstream_failed = failed.contains(&item.triple)
                || planned.mosaic_parts.iter().any(|part| {
                    let key = (
                        part.as_str(),
                        planned.triple.product.as_str(),
                        planned.triple.config.as_str(),
                    );
                    index.get(&key).is_some_and(|i| failed.contains(i))
                });

            let outcome = if upstream_failed {
                warn!("{} {}: skipped after an upstream failure", item.stage, planned.triple);
                StageOutcome::SkippedUpstream
            } else {
                match self.run_item(planned, item.stage) {
                    Ok(outcome) => outcome,
                    Err(err) => {
                        let message = format!("{err:#}");
                        error!("{} {}: {}", item.stage, planned.triple, message);
                        failed.insert(item.triple);
                        StageOutcome::Failed(message)
                    }
                }
            };
            report.items.push(ItemReport {
                triple: planned.triple.clone(),
                stage: item.stage,
                outcome,
            });
        }

        info!(
            "Post-processing finished: {} executed, {} dry run, {} failed, {} skipped",
            report.count(|o| *o == StageOutcome::Executed),
            report.count(|o| *o == StageOutcome::DryRun),
            report.count(|o| matches!(o, StageOutcome::Failed(_))),
            report.count(|o| *o == StageOutcome::SkippedUpstream)
        );
        report
    }

    fn run_item(&self, planned: &PlannedTriple, stage: Stage) -> anyhow::Result<StageOutcome> {
        let action = self.resolve(planned, stage)?;

        info!("{} {}", stage, planned.triple);
        for input in action.inputs() {
            debug!("  input  {}", input.display());
        }
        for output in action.outputs() {
            debug!("  output {}", output.display());
        }

        if self.config.dry_run {
            return Ok(StageOutcome::DryRun);
        }

        for input in action.inputs() {
            if !self.engine.exists(input) {
                return Err(StageError::MissingInput {
                    stage,
                    triple: planned.triple.to_string(),
                    path: input.to_path_buf(),
                }
                .into());
            }
        }
        self.apply(&action)
            .with_context(|| format!("{} failed for {}", stage, planned.triple))?;
        Ok(StageOutcome::Executed)
    }

    /// Bind `stage` of `planned` to concrete artifact paths. Pure.
    pub fn resolve(
        &self,
        planned: &PlannedTriple,
        stage: Stage,
    ) -> Result<StageAction, StageError> {
        let catalog = self.catalog;
        let t = &planned.triple;
        let (target, product, config) = (t.target.as_str(), t.product.as_str(), t.config.as_str());
        let artifact = |target: &str, config: &str, kind: Artifact| {
            catalog.artifact_path(target, config, product, kind)
        };
        let transfer = |from, to| Transfer {
            input: artifact(target, config, from),
            output: artifact(target, config, to),
        };
        let imaging_config = move || {
            planned
                .imaging_config
                .as_deref()
                .ok_or_else(|| StageError::MissingFeatherPair {
                    stage,
                    triple: t.to_string(),
                    config: config.to_string(),
                })
        };

        let action = match stage {
            Stage::Stage => StageAction::Stage {
                copies: [Artifact::Original, Artifact::PrimaryBeam]
                    .into_iter()
                    .map(|kind| Transfer {
                        input: catalog.imaging_path(target, config, product, kind),
                        output: artifact(target, config, kind),
                    })
                    .collect(),
            },
            Stage::Pbcorr => StageAction::Pbcorr {
                image: artifact(target, config, Artifact::Original),
                pb: artifact(target, config, Artifact::PrimaryBeam),
                output: artifact(target, config, Artifact::Pbcorr),
            },
            Stage::Round => StageAction::Round(transfer(Artifact::Pbcorr, Artifact::PbcorrRound)),
            Stage::SdPrep => StageAction::SdPrep {
                single_dish: catalog.single_dish_file(target, product).ok_or_else(|| {
                    StageError::MissingSingleDish {
                        stage,
                        triple: t.to_string(),
                        target: target.to_string(),
                        product: product.to_string(),
                    }
                })?,
                imported: artifact(target, config, Artifact::ImportedSingleDish),
                template: artifact(target, config, Artifact::PbcorrRound),
                output: artifact(target, config, Artifact::PreppedSingleDish),
            },
            Stage::Weight => {
                let pb_config = imaging_config()?;
                let scale = self.config.overrides.scale_weights_by_noise;
                StageAction::Weight {
                    parts: planned
                        .mosaic_parts
                        .iter()
                        .map(|part| PartWeight {
                            pb: artifact(part.as_str(), pb_config, Artifact::PrimaryBeam),
                            noise_source: scale
                                .then(|| artifact(part.as_str(), config, Artifact::PbcorrRound)),
                            output: artifact(part.as_str(), config, Artifact::Weight),
                        })
                        .collect(),
                }
            }
            Stage::MosaicConvolve => StageAction::MosaicConvolve {
                parts: self.part_transfers(
                    planned,
                    Artifact::PbcorrRound,
                    Artifact::LinmosRound,
                ),
            },
            Stage::MosaicAlign => StageAction::MosaicAlign {
                images: self.part_transfers(
                    planned,
                    Artifact::LinmosRound,
                    Artifact::LinmosAligned,
                ),
                weights: self.part_transfers(planned, Artifact::Weight, Artifact::WeightAligned),
            },
            Stage::MosaicCombine => StageAction::MosaicCombine {
                images: self.part_paths(planned, Artifact::LinmosAligned),
                weights: self.part_paths(planned, Artifact::WeightAligned),
                output: artifact(target, config, Artifact::PbcorrRound),
                weight_output: artifact(target, config, Artifact::Weight),
            },
            Stage::Feather => {
                let interf = imaging_config()?;
                StageAction::Feather {
                    interferometer: artifact(target, interf, Artifact::PbcorrRound),
                    single_dish: artifact(target, interf, Artifact::PreppedSingleDish),
                    apodize_with: (self.config.feather_method == FeatherMethod::Apodize)
                        .then(|| artifact(target, interf, Artifact::PrimaryBeam)),
                    output: artifact(target, config, Artifact::PbcorrRound),
                }
            }
            Stage::Compress => StageAction::Compress {
                image: transfer(Artifact::PbcorrRound, Artifact::PbcorrTrimmed),
                pb: planned.imaging_config.as_deref().map(|pb_config| Transfer {
                    input: artifact(target, pb_config, Artifact::PrimaryBeam),
                    output: artifact(target, config, Artifact::TrimmedPb),
                }),
            },
            Stage::Convert => {
                StageAction::Convert(transfer(Artifact::PbcorrTrimmed, Artifact::PbcorrTrimmedK))
            }
            Stage::Export => StageAction::Export {
                image: transfer(Artifact::PbcorrTrimmedK, Artifact::PbcorrTrimmedKFits),
                pb: Some(transfer(Artifact::TrimmedPb, Artifact::TrimmedPbFits)),
            },
        };
        Ok(action)
    }

    fn part_paths(&self, planned: &PlannedTriple, kind: Artifact) -> Vec<PathBuf> {
        let t = &planned.triple;
        planned
            .mosaic_parts
            .iter()
            .map(|part| self.catalog.artifact_path(part, &t.config, &t.product, kind))
            .collect()
    }

    fn part_transfers(
        &self,
        planned: &PlannedTriple,
        from: Artifact,
        to: Artifact,
    ) -> Vec<Transfer> {
        self.part_paths(planned, from)
            .into_iter()
            .zip(self.part_paths(planned, to))
            .map(|(input, output)| Transfer { input, output })
            .collect()
    }

    fn apply(&self, action: &StageAction) -> anyhow::Result<()> {
        let engine = self.engine;
        let overrides = &self.config.overrides;
        match action {
            StageAction::Stage { copies } => {
                for copy in copies {
                    engine
                        .copy_dropdeg(&copy.input, &copy.output)
                        .with_context(|| format!("staging {}", copy.input.display()))?;
                }
            }
            StageAction::Pbcorr { image, pb, output } => {
                let image = engine.read_cube(image)?;
                let pb = engine.read_cube(pb)?;
                let corrected = primary_beam_correct(&image, &pb, overrides.pb_cutoff)?;
                engine.write_cube(output, &corrected)?;
            }
            StageAction::Round(t) => {
                let header = engine.read_header(&t.input)?;
                let beam = Beam::round_arcsec(header.beam_major_arcsec()?);
                engine.convolve(&t.input, &t.output, &beam)?;
            }
            StageAction::SdPrep {
                single_dish,
                imported,
                template,
                output,
            } => {
                engine.import_fits(single_dish, imported)?;
                let template = engine.read_header(template)?;
                engine.regrid(imported, &template, output, Interpolation::Cubic)?;
                let mut cube = engine.read_cube(output)?;
                if cube.header().brightness_unit == KELVIN {
                    kelvin_to_jy(&mut cube)?;
                    engine.write_cube(output, &cube)?;
                }
            }
            StageAction::Weight { parts } => {
                for part in parts {
                    let pb = engine.read_cube(&part.pb)?;
                    let mut weight = WeightMap::from_cube(&pb, WeightInputType::Pb)?;
                    if let Some(source) = &part.noise_source {
                        let image = engine.read_cube(source)?;
                        let noise = noise_for_cube(
                            &image,
                            None,
                            MaskUsage::Exclude,
                            overrides.noise_method,
                            None,
                        )?;
                        debug!("Noise of {} for weighting: {}", source.display(), noise.sigma);
                        weight = weight
                            .scale_by_noise(&noise)
                            .with_context(|| format!("weighting by noise of {}", source.display()))?;
                    }
                    engine.write_cube(&part.output, weight.cube())?;
                }
            }
            StageAction::MosaicConvolve { parts } => {
                let headers = parts
                    .iter()
                    .map(|t| engine.read_header(&t.input))
                    .collect::<anyhow::Result<Vec<_>>>()?;
                let beam = common_beam(
                    &headers,
                    overrides.pixel_padding,
                    overrides.target_resolution_arcsec,
                )?;
                info!("Common mosaic resolution: {:.3}\"", beam.major);
                for t in parts {
                    engine.convolve(&t.input, &t.output, &beam)?;
                }
            }
            StageAction::MosaicAlign { images, weights } => {
                let headers = images
                    .iter()
                    .map(|t| engine.read_header(&t.input))
                    .collect::<anyhow::Result<Vec<_>>>()?;
                let Some(first) = headers.first() else {
                    return Err(MosaicError::NoInputs {
                        operation: "mosaic alignment",
                    }
                    .into());
                };
                let grid = resolve_grid(&headers, &overrides.grid)?;
                let template = build_header(&grid, first, &overrides.grid_limits())?;
                for t in images.iter().chain(weights) {
                    engine.regrid(&t.input, &template, &t.output, Interpolation::Cubic)?;
                }
            }
            StageAction::MosaicCombine {
                images,
                weights,
                output,
                weight_output,
            } => {
                let cubes = images
                    .iter()
                    .map(|path| engine.read_cube(path))
                    .collect::<anyhow::Result<Vec<_>>>()?;
                let weights = weights
                    .iter()
                    .map(|path| -> anyhow::Result<WeightMap> {
                        let cube = engine.read_cube(path)?;
                        Ok(WeightMap::from_weight_cube(cube)?)
                    })
                    .collect::<anyhow::Result<Vec<_>>>()?;
                let mosaic = combine(&cubes, &weights)?;
                info!(
                    "Combined {} parts: {} of {} pixels covered",
                    cubes.len(),
                    mosaic.covered(),
                    mosaic.image.len()
                );
                engine.write_cube(output, &mosaic.image)?;
                engine.write_cube(weight_output, &mosaic.weight_sum)?;
            }
            StageAction::Feather {
                interferometer,
                single_dish,
                apodize_with,
                output,
            } => {
                let options = FeatherOptions {
                    apodize_with: apodize_with.clone(),
                    apodize_cutoff: if apodize_with.is_some() { 0.0 } else { -1.0 },
                    ..FeatherOptions::default()
                };
                engine.feather(interferometer, single_dish, output, &options)?;
            }
            StageAction::Compress { image, pb } => {
                let cube = engine.read_cube(&image.input)?;
                let trimmed = trim_to_valid(&cube, overrides.trim_padding)?;
                engine.write_cube(&image.output, &trimmed)?;
                if let Some(pb) = pb {
                    if engine.exists(&pb.input) {
                        engine.regrid(&pb.input, trimmed.header(), &pb.output, Interpolation::Cubic)?;
                    } else {
                        debug!("No primary beam at {}", pb.input.display());
                    }
                }
            }
            StageAction::Convert(t) => {
                let mut cube = engine.read_cube(&t.input)?;
                jy_to_kelvin(&mut cube)?;
                engine.write_cube(&t.output, &cube)?;
            }
            StageAction::Export { image, pb } => {
                engine.export_fits(&image.input, &image.output, &ExportOptions::default())?;
                if let Some(pb) = pb {
                    if engine.exists(&pb.input) {
                        let options = ExportOptions {
                            round_beam: false,
                            ..ExportOptions::default()
                        };
                        engine.export_fits(&pb.input, &pb.output, &options)?;
                    } else {
                        debug!("No trimmed primary beam at {}", pb.input.display());
                    }
                }
            }
        }
        Ok(())
    }
}
