//! Quantile Calibration
//!
//! Computes the finite-sample-adjusted quantile level and the resulting
//! threshold (qHat) from a nonconformity score distribution. The threshold is
//! immutable once computed and is reused by every downstream prediction and
//! evaluation until discarded.
use crate::conformal::score::ImageScores;
use crate::errors::GeoConformalError;
use crate::utils::{percentile, validate_unit_open_interval};
use log::info;
use serde::{Deserialize, Serialize};
use std::fs;

/// How the quantile level is derived from `alpha`.
#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Debug, Default)]
pub enum QuantileMethod {
    /// Standard split-conformal adjustment: `ceil((n+1)(1-alpha))/n`.
    #[default]
    FiniteSample,
    /// Plain `(1-alpha)` without the finite-sample ceiling. Kept for parity
    /// with an older regression path; prefer `FiniteSample`.
    Legacy,
}

/// The outcome of calibration: the percentile level that was cut and the
/// score threshold found there.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationResult {
    /// Percentile level on the 0-100 scale, adjusted for finite sample size.
    pub q_level: f64,
    /// Score threshold at `q_level`, in the same units as the scores.
    pub q_hat: f64,
    /// Optional experiment version tag carried through to reports.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

impl CalibrationResult {
    /// Dump the result as a json object.
    pub fn json_dump(&self) -> Result<String, GeoConformalError> {
        match serde_json::to_string(self) {
            Ok(s) => Ok(s),
            Err(e) => Err(GeoConformalError::UnableToWrite(e.to_string())),
        }
    }

    /// Save the result as a json object to a file.
    ///
    /// * `path` - Path to save the result.
    pub fn save(&self, path: &str) -> Result<(), GeoConformalError> {
        let json = self.json_dump()?;
        match fs::write(path, json) {
            Err(e) => Err(GeoConformalError::UnableToWrite(e.to_string())),
            Ok(_) => Ok(()),
        }
    }

    /// Load a result from a json string.
    pub fn from_json(json_str: &str) -> Result<Self, GeoConformalError> {
        match serde_json::from_str::<CalibrationResult>(json_str) {
            Ok(r) => Ok(r),
            Err(e) => Err(GeoConformalError::UnableToRead(e.to_string())),
        }
    }

    /// Load a result from a path to a json object.
    pub fn load(path: &str) -> Result<Self, GeoConformalError> {
        let json_str = match fs::read_to_string(path) {
            Ok(s) => Ok(s),
            Err(e) => Err(GeoConformalError::UnableToRead(e.to_string())),
        }?;
        Self::from_json(&json_str)
    }
}

/// Computes adjusted quantile levels and qHat thresholds for a fixed
/// miscoverage tolerance `alpha`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct QuantileCalibrator {
    /// Miscoverage tolerance in (0, 1); alpha of 0.1 targets 90% coverage.
    pub alpha: f64,
    /// Quantile level derivation for residual-polarity scores.
    pub method: QuantileMethod,
}

impl QuantileCalibrator {
    pub fn new(alpha: f64) -> Result<Self, GeoConformalError> {
        validate_unit_open_interval(alpha, "alpha")?;
        Ok(QuantileCalibrator {
            alpha,
            method: QuantileMethod::default(),
        })
    }

    pub fn set_method(mut self, method: QuantileMethod) -> Self {
        self.method = method;
        self
    }

    /// Adjusted quantile level for probability-polarity scores
    /// (classification): `100 - (ceil((n+1)(1-alpha))/n)*100`.
    ///
    /// The low tail of the true-class probability distribution is cut, so the
    /// resulting qHat acts as an inclusion threshold (`p >= qHat` keeps a
    /// class in the set).
    pub fn q_level(&self, n_cal: usize) -> Result<f64, GeoConformalError> {
        if n_cal == 0 {
            return Err(GeoConformalError::InsufficientCalibrationData(
                "calibration".to_string(),
            ));
        }
        let n = n_cal as f64;
        Ok(100.0 - (((n + 1.0) * (1.0 - self.alpha)).ceil() / n) * 100.0)
    }

    /// Quantile level for residual-polarity scores (regression), where the
    /// *high* tail of the score distribution is cut.
    pub fn q_level_residual(&self, n_cal: usize) -> Result<f64, GeoConformalError> {
        match self.method {
            QuantileMethod::FiniteSample => Ok((100.0 - self.q_level(n_cal)?).min(100.0)),
            QuantileMethod::Legacy => {
                if n_cal == 0 {
                    return Err(GeoConformalError::InsufficientCalibrationData(
                        "calibration".to_string(),
                    ));
                }
                Ok((1.0 - self.alpha) * 100.0)
            }
        }
    }

    /// Calibrate on probability-polarity scores: qHat is the `q_level`-th
    /// percentile of the calibration score distribution.
    pub fn calibrate(&self, scores: &[f64]) -> Result<CalibrationResult, GeoConformalError> {
        let q_level = self.q_level(scores.len())?;
        let q_hat = percentile(scores, q_level).ok_or_else(|| {
            GeoConformalError::InsufficientCalibrationData("calibration".to_string())
        })?;
        info!("Calibrated at qLevel {:.4} with qHat {:.6}", q_level, q_hat);
        Ok(CalibrationResult {
            q_level,
            q_hat,
            version: None,
        })
    }

    /// Calibrate on residual-polarity scores (absolute residuals).
    pub fn calibrate_residuals(&self, scores: &[f64]) -> Result<CalibrationResult, GeoConformalError> {
        let q_level = self.q_level_residual(scores.len())?;
        let q_hat = percentile(scores, q_level).ok_or_else(|| {
            GeoConformalError::InsufficientCalibrationData("calibration".to_string())
        })?;
        info!("Calibrated at qLevel {:.4} with qHat {:.6}", q_level, q_hat);
        Ok(CalibrationResult {
            q_level,
            q_hat,
            version: None,
        })
    }

    /// Calibrate on per-pixel scores from a set of calibration images.
    ///
    /// Two-stage aggregation: a per-image threshold is taken at `q_level`,
    /// then the same percentile is taken across the pooled per-image
    /// thresholds. The level itself is computed from the summed valid pixel
    /// count. This is not equivalent to a single pooled quantile over raw
    /// per-pixel scores; the two-stage form is the compatibility contract.
    pub fn calibrate_images(&self, images: &[ImageScores]) -> Result<CalibrationResult, GeoConformalError> {
        let n_pixels_cal: usize = images.iter().map(|im| im.n_pixels).sum();
        let q_level = self.q_level(n_pixels_cal)?;
        let mut per_image = Vec::with_capacity(images.len());
        for image in images.iter() {
            if let Some(threshold) = percentile(&image.scores, q_level) {
                per_image.push(threshold);
            }
        }
        let q_hat = percentile(&per_image, q_level).ok_or_else(|| {
            GeoConformalError::InsufficientCalibrationData("calibration".to_string())
        })?;
        info!(
            "Calibrated over {} images ({} pixels) at qLevel {:.4} with qHat {:.6}",
            images.len(),
            n_pixels_cal,
            q_level,
            q_hat
        );
        Ok(CalibrationResult {
            q_level,
            q_hat,
            version: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_q_level_adjusted() {
        let calibrator = QuantileCalibrator::new(0.1).unwrap();
        // n=100, alpha=0.1: 100 - ceil(101 * 0.9) / 100 * 100 = 9.
        assert!((calibrator.q_level(100).unwrap() - 9.0).abs() < 1e-12);
    }

    #[test]
    fn test_q_level_monotone_in_alpha() {
        // Raising alpha (weaker coverage) must not lower the level.
        let n = 250;
        let mut last = f64::MIN;
        for alpha in [0.01, 0.05, 0.1, 0.2, 0.5, 0.9] {
            let level = QuantileCalibrator::new(alpha).unwrap().q_level(n).unwrap();
            assert!(level >= last);
            last = level;
        }
    }

    #[test]
    fn test_q_level_empty_calibration() {
        let calibrator = QuantileCalibrator::new(0.1).unwrap();
        assert!(matches!(
            calibrator.q_level(0),
            Err(GeoConformalError::InsufficientCalibrationData(_))
        ));
        assert!(calibrator.calibrate(&[]).is_err());
    }

    #[test]
    fn test_invalid_alpha() {
        assert!(QuantileCalibrator::new(0.0).is_err());
        assert!(QuantileCalibrator::new(1.0).is_err());
        assert!(QuantileCalibrator::new(-0.5).is_err());
    }

    #[test]
    fn test_calibrate_known_scores() {
        // 100 calibration scores [0, 1, ..., 99] / 99 with alpha = 0.1:
        // qLevel = 9, qHat = 9th percentile = 8.91 / 99.
        let scores: Vec<f64> = (0..100).map(|v| v as f64 / 99.0).collect();
        let calibrator = QuantileCalibrator::new(0.1).unwrap();
        let result = calibrator.calibrate(&scores).unwrap();
        assert!((result.q_level - 9.0).abs() < 1e-12);
        assert!((result.q_hat - 8.91 / 99.0).abs() < 1e-12);
    }

    #[test]
    fn test_calibrate_residuals_legacy() {
        // Residuals [1..5] with alpha = 0.2 on the legacy path:
        // qLevel = 80, qHat = 4.2 with linear interpolation.
        let scores: Vec<f64> = (1..=5).map(|v| v as f64).collect();
        let calibrator = QuantileCalibrator::new(0.2)
            .unwrap()
            .set_method(QuantileMethod::Legacy);
        let result = calibrator.calibrate_residuals(&scores).unwrap();
        assert!((result.q_level - 80.0).abs() < 1e-12);
        assert!((result.q_hat - 4.2).abs() < 1e-12);
    }

    #[test]
    fn test_calibrate_residuals_finite_sample_is_wider() {
        let scores: Vec<f64> = (1..=100).map(|v| v as f64).collect();
        let legacy = QuantileCalibrator::new(0.2)
            .unwrap()
            .set_method(QuantileMethod::Legacy)
            .calibrate_residuals(&scores)
            .unwrap();
        let adjusted = QuantileCalibrator::new(0.2)
            .unwrap()
            .calibrate_residuals(&scores)
            .unwrap();
        assert!(adjusted.q_hat >= legacy.q_hat);
    }

    #[test]
    fn test_two_stage_matches_single_image() {
        // With exactly one calibration image the two stages collapse.
        let scores: Vec<f64> = (0..100).map(|v| v as f64 / 99.0).collect();
        let calibrator = QuantileCalibrator::new(0.1).unwrap();
        let pooled = calibrator.calibrate(&scores).unwrap();
        let image = ImageScores {
            n_pixels: scores.len(),
            scores,
        };
        let staged = calibrator.calibrate_images(&[image]).unwrap();
        assert!((staged.q_hat - pooled.q_hat).abs() < 1e-12);
        assert_eq!(staged.q_level, pooled.q_level);
    }

    #[test]
    fn test_two_stage_pixel_weighted_level() {
        // The level is driven by the total pixel count, not the image count.
        let a = ImageScores {
            scores: (0..90).map(|v| v as f64 / 89.0).collect(),
            n_pixels: 90,
        };
        let b = ImageScores {
            scores: (0..10).map(|v| v as f64 / 9.0).collect(),
            n_pixels: 10,
        };
        let calibrator = QuantileCalibrator::new(0.1).unwrap();
        let result = calibrator.calibrate_images(&[a, b]).unwrap();
        let expected_level = calibrator.q_level(100).unwrap();
        assert_eq!(result.q_level, expected_level);
    }

    #[test]
    fn test_calibrate_images_empty() {
        let calibrator = QuantileCalibrator::new(0.1).unwrap();
        assert!(calibrator.calibrate_images(&[]).is_err());
        let empty = ImageScores {
            scores: vec![],
            n_pixels: 0,
        };
        assert!(calibrator.calibrate_images(&[empty]).is_err());
    }

    #[test]
    fn test_result_json_round_trip() {
        let result = CalibrationResult {
            q_level: 9.0,
            q_hat: 0.09,
            version: Some("v1".to_string()),
        };
        let json = result.json_dump().unwrap();
        let back = CalibrationResult::from_json(&json).unwrap();
        assert_eq!(result, back);
    }

    #[test]
    fn test_result_save_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("calibration.json");
        let path = path.to_str().unwrap();
        let result = CalibrationResult {
            q_level: 80.0,
            q_hat: 4.2,
            version: None,
        };
        result.save(path).unwrap();
        let back = CalibrationResult::load(path).unwrap();
        assert_eq!(result, back);
    }
}
