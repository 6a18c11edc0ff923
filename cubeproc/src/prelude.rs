//! Common imports.
//!
//! ```rust,ignore
//! use cubeproc::prelude::*;
//! ```

pub use crate::{CubeHeader, ImageCube, ImageEngine};

pub use crate::{NoiseEstimate, NoiseMethod, SignalMaskConfig, build_signal_mask, estimate_noise};

pub use crate::{WeightInputType, WeightMap, combine, common_beam, common_grid};

pub use crate::{Catalog, Orchestrator, PipelineConfig, RunReport, Stage, StaticCatalog};
