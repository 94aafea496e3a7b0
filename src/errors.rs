//! Errors
//!
//! Custom error types used throughout the `geoconformal` crate.
use thiserror::Error;

/// Errors that can occur while calibrating, evaluating or running tiled inference.
#[derive(Debug, Error)]
pub enum GeoConformalError {
    /// A partition contained no usable samples.
    #[error("The {0} partition is empty, at least one sample is required.")]
    InsufficientCalibrationData(String),
    /// First value is the name of the parameter, second is expected, third is what was passed.
    #[error("Invalid parameter value passed for {0}, expected {1} but {2} provided.")]
    InvalidParameter(String, String, String),
    /// Band or class-name lists do not line up.
    #[error("Mismatched bands: {0}")]
    MismatchedBands(String),
    /// A raster window task failed during tiled inference.
    #[error("Inference task failed on window at ({0}, {1}): {2}")]
    InferenceTaskFailure(usize, usize, String),
    /// An external collaborator (remote engine, model, raster I/O) reported an error.
    /// Passed through unmodified; no retry is attempted.
    #[error("External collaborator failure: {0}")]
    Collaborator(String),
    /// Unable to write a result to file.
    #[error("Unable to write to file: {0}")]
    UnableToWrite(String),
    /// Unable to read a result from a file.
    #[error("Unable to read from a file {0}")]
    UnableToRead(String),
}
