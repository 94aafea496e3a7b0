// Modules
pub mod conformal;
pub mod data;
pub mod engine;
pub mod errors;
pub mod inference;
pub mod metrics;
pub mod model;
pub mod raster;
pub mod splitter;
pub mod utils;

// Individual classes, and functions
pub use conformal::calibrate::{CalibrationResult, QuantileCalibrator, QuantileMethod};
pub use conformal::classifier::{ConformalClassifier, LabeledImage};
pub use conformal::config::ConformalConfig;
pub use conformal::evaluate::{CoverageEvaluator, EvaluationSummary};
pub use conformal::regressor::ConformalRegressor;
pub use conformal::sets::{PixelSets, PredictionInterval, PredictionSet, PredictionSetBuilder};
pub use data::{ClassDictionary, PixelTable, Sample};
pub use errors::GeoConformalError;
pub use inference::{InferenceMode, TiledInferenceEngine};
pub use splitter::{DataSplitter, SplitResult};
