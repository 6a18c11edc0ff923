//! Post-processing orchestration.
//!
//! [`plan`] turns a [`PipelineConfig`] and a [`Catalog`] into ordered work
//! items without side effects; [`Orchestrator`] executes them against an
//! [`ImageEngine`](crate::engine::ImageEngine), or only logs them in
//! dry-run mode.

pub(crate) mod catalog;
pub(crate) mod config;
pub(crate) mod executor;
pub(crate) mod plan;
pub(crate) mod stage;

#[cfg(test)]
mod tests;

pub use catalog::{
    Artifact, Catalog, FeatherPair, ImagingRecord, StaticCatalog, artifact_file_name,
};
pub use config::{
    ConfigError, FeatherMethod, ListFilter, Overrides, PipelineConfig, StageToggles,
};
pub use executor::{
    ItemReport, Orchestrator, PartWeight, RunReport, StageAction, StageError, StageOutcome,
    Transfer,
};
pub use plan::{Plan, PlannedTriple, Triple, WorkItem, plan};
pub use stage::{Applicability, ConfigType, Gates, Needs, Stage};
