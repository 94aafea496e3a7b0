//! Conformal Prediction
//!
//! Split-conformal calibration and inference with finite-sample coverage
//! guarantees, for both feature collections (one sample per row) and pixel
//! batches (one sample per raster pixel).
//!
//! # Submodules
//!
//! * `score`: Nonconformity scoring for classification and regression.
//! * `calibrate`: Adjusted quantile levels and the qHat threshold.
//! * `sets`: Prediction-set and prediction-interval construction.
//! * `evaluate`: Empirical coverage and average set-size/width.
//! * `config`: Workflow configuration.
//! * `classifier` / `regressor`: High-level calibrate/evaluate/predict drivers.

pub mod calibrate;
pub mod classifier;
pub mod config;
pub mod evaluate;
pub mod regressor;
pub mod score;
pub mod sets;
#[cfg(test)]
mod tests;
