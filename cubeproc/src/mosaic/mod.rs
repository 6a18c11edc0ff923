//! Linear mosaicking: common resolution, common astrometric grid, weight
//! maps and the weighted combination of aligned cubes.

pub(crate) mod astrometry;
pub(crate) mod combine;
pub(crate) mod error;
pub(crate) mod resolution;
pub(crate) mod weight;


pub use astrometry::{
    DEFAULT_MAX_AXIS_PIXELS, GridLimits, GridOverrides, MosaicGrid, build_header, common_grid,
    resolve_grid,
};
pub use combine::{LinearMosaic, combine};
pub use error::MosaicError;
pub use resolution::{DEFAULT_PIXEL_PADDING, common_beam, common_resolution};
pub use weight::{WeightInputType, WeightMap};
