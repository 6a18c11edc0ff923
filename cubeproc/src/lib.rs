//! Cubeproc - post-processing for radio interferometric image cubes.
//!
//! This library provides:
//! - Robust noise estimation (std, MAD, Chauvenet rejection)
//! - Two-threshold signal masks with constrained dilation
//! - Linear mosaicking: common resolution, common grid, weight maps and
//!   weighted combination
//! - A staged post-processing orchestrator with dry-run support
//!
//! Image I/O and heavy image primitives (regrid, convolve, feather, FITS
//! conversion) sit behind the [`ImageEngine`] trait.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use cubeproc::{Orchestrator, PipelineConfig, StaticCatalog};
//!
//! let config = PipelineConfig::from_file("postprocess.yaml".as_ref())?;
//! let catalog = StaticCatalog::from_file("catalog.yaml".as_ref())?;
//! let report = Orchestrator::new(&config, &catalog, &engine).run()?;
//! for failure in report.failures() {
//!     eprintln!("{} {}: {:?}", failure.stage, failure.triple, failure.outcome);
//! }
//! ```

pub mod cube;
pub mod engine;
pub(crate) mod masking;
pub(crate) mod math;
pub(crate) mod mosaic;
pub(crate) mod noise;
pub(crate) mod pipeline;

#[cfg(test)]
pub(crate) mod testing;

pub mod prelude;

// ============================================================================
// Data model
// ============================================================================

pub use cube::{Axis, AxisKind, Beam, CubeError, CubeHeader, ImageCube};
pub use engine::{ExportOptions, FeatherOptions, ImageEngine, Interpolation};

// ============================================================================
// Noise
// ============================================================================

pub use noise::{
    DEFAULT_CHAUVENET_ITERATIONS, EstimateStatus, MaskUsage, NoiseError, NoiseEstimate,
    NoiseMethod, chauvenet_reject, estimate_noise, noise_for_cube, noise_map, noise_spectrum,
};

// ============================================================================
// Signal masks
// ============================================================================

pub use masking::{
    MaskError, MaskOperation, MaskRoot, SignalMask, SignalMaskConfig, SignalMaskResult,
    apply_additional_mask, build_signal_mask, signal_mask_for_root,
};

// ============================================================================
// Mosaicking
// ============================================================================

pub use mosaic::{
    DEFAULT_MAX_AXIS_PIXELS, DEFAULT_PIXEL_PADDING, GridLimits, GridOverrides, LinearMosaic,
    MosaicError, MosaicGrid, WeightInputType, WeightMap, build_header, combine, common_beam,
    common_grid, common_resolution, resolve_grid,
};

// ============================================================================
// Orchestration
// ============================================================================

pub use pipeline::{
    Artifact, Catalog, ConfigError, ConfigType, FeatherMethod, FeatherPair, Gates, ListFilter,
    Orchestrator, Overrides, PipelineConfig, Plan, RunReport, Stage, StageError, StageOutcome,
    StageToggles, StaticCatalog, Triple, artifact_file_name, plan,
};
