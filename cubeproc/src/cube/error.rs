use thiserror::Error;

/// Errors raised while validating cubes and their headers.
#[derive(Debug, Error)]
pub enum CubeError {
    #[error("Cube '{name}': {array} has {actual} elements but the header shape {shape:?} needs {expected}")]
    LengthMismatch {
        name: String,
        array: &'static str,
        shape: Vec<usize>,
        expected: usize,
        actual: usize,
    },

    #[error("Cube '{name}': shape {actual:?} does not match expected shape {expected:?}")]
    ShapeMismatch {
        name: String,
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    #[error("Cube '{name}': no {axis} axis in header")]
    MissingAxis { name: String, axis: &'static str },

    #[error("Cube '{name}': expected units of '{expected}' on {axis}, found '{found}'")]
    UnexpectedUnit {
        name: String,
        axis: String,
        expected: &'static str,
        found: String,
    },

    #[error("Cube '{name}': header has no restoring beam")]
    MissingBeam { name: String },

    #[error("Cube '{name}': header has no rest frequency")]
    MissingRestFrequency { name: String },

    #[error("Cube '{name}': expected brightness unit '{expected}', found '{found}'")]
    BrightnessUnit {
        name: String,
        expected: &'static str,
        found: String,
    },

    #[error("Cube '{name}': no valid pixels")]
    NoValidPixels { name: String },
}
