//! Conformal Regressor
//!
//! High-level driver for the regression workflow: absolute-residual scores on
//! the calibration partition, a residual-polarity threshold, symmetric
//! prediction intervals, and coverage/width evaluation.
use crate::conformal::calibrate::{CalibrationResult, QuantileCalibrator, QuantileMethod};
use crate::conformal::evaluate::{evaluate_intervals, EvaluationSummary};
use crate::conformal::score::regression_scores;
use crate::conformal::sets::PredictionInterval;
use crate::data::Sample;
use crate::errors::GeoConformalError;
use crate::utils::validate_unit_open_interval;

pub struct ConformalRegressor {
    /// Miscoverage tolerance in (0, 1).
    pub alpha: f64,
    /// Quantile level derivation; `FiniteSample` unless legacy parity is needed.
    pub method: QuantileMethod,
    /// Experiment version tag, carried through results.
    pub version: Option<String>,
}

impl ConformalRegressor {
    pub fn new(alpha: f64) -> Result<Self, GeoConformalError> {
        validate_unit_open_interval(alpha, "alpha")?;
        Ok(ConformalRegressor {
            alpha,
            method: QuantileMethod::default(),
            version: None,
        })
    }

    pub fn set_method(mut self, method: QuantileMethod) -> Self {
        self.method = method;
        self
    }

    pub fn set_version<S: Into<String>>(mut self, version: S) -> Self {
        self.version = Some(version.into());
        self
    }

    /// Score the calibration samples and derive the residual threshold.
    pub fn calibrate(&self, calibration: &[Sample]) -> Result<CalibrationResult, GeoConformalError> {
        if calibration.is_empty() {
            return Err(GeoConformalError::InsufficientCalibrationData(
                "calibration".to_string(),
            ));
        }
        let scored = regression_scores(calibration)?;
        let scores: Vec<f64> = scored.iter().map(|s| s.score).collect();
        let calibrator = QuantileCalibrator::new(self.alpha)?.set_method(self.method);
        let mut result = calibrator.calibrate_residuals(&scores)?;
        result.version = self.version.clone();
        Ok(result)
    }

    /// The symmetric interval for one point prediction.
    pub fn predict(&self, prediction: f64, result: &CalibrationResult) -> PredictionInterval {
        PredictionInterval::from_prediction(prediction, result)
    }

    /// Intervals for a batch of point predictions.
    pub fn predict_intervals(
        &self,
        predictions: &[f64],
        result: &CalibrationResult,
    ) -> Vec<PredictionInterval> {
        predictions
            .iter()
            .map(|p| PredictionInterval::from_prediction(*p, result))
            .collect()
    }

    /// Coverage and mean width over the test partition.
    pub fn evaluate(
        &self,
        test: &[Sample],
        result: &CalibrationResult,
    ) -> Result<EvaluationSummary, GeoConformalError> {
        evaluate_intervals(test, result)
    }
}
