//! Error types for mosaicking operations.

use thiserror::Error;

use crate::cube::CubeError;

/// Errors that can occur while matching resolution, building a common grid,
/// generating weights or combining cubes.
#[derive(Debug, Error)]
pub enum MosaicError {
    #[error("No input cubes provided for {operation}")]
    NoInputs { operation: &'static str },

    #[error("Got {cubes} cubes ({names}) but {weights} weight maps")]
    WeightCountMismatch {
        names: String,
        cubes: usize,
        weights: usize,
    },

    #[error("Invalid {parameter} for {name}: {value}")]
    InvalidParameter {
        name: String,
        parameter: &'static str,
        value: f64,
    },

    #[error(
        "Inputs {names} straddle RA = 0 (corner RA spans {span_deg:.3} deg); rotate the data or force the grid"
    )]
    MeridianStraddle { names: String, span_deg: f64 },

    #[error(
        "Grid of {nx} x {ny} pixels from template '{template}' exceeds the {limit} pixel limit per axis; set allow_big to build it"
    )]
    GridTooLarge {
        template: String,
        nx: usize,
        ny: usize,
        limit: usize,
    },

    #[error("Weight map '{name}': negative weight {value} at pixel {index}")]
    NegativeWeight {
        name: String,
        index: usize,
        value: f32,
    },

    #[error(transparent)]
    Cube(#[from] CubeError),
}

/// Quoted, comma-separated names for error messages.
pub(crate) fn joined_names<'a>(names: impl IntoIterator<Item = &'a str>) -> String {
    names
        .into_iter()
        .map(|name| format!("'{name}'"))
        .collect::<Vec<_>>()
        .join(", ")
}
