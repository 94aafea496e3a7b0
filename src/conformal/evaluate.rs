//! Coverage Evaluation
//!
//! Aggregates empirical marginal coverage and average set-size/width over a
//! held-out test partition. Returns a structured summary; reporting it is a
//! caller concern.
use crate::conformal::calibrate::CalibrationResult;
use crate::conformal::score::label_class;
use crate::conformal::sets::{PredictionInterval, PredictionSetBuilder};
use crate::data::{ClassDictionary, Label, Sample};
use crate::errors::GeoConformalError;
use crate::PixelTable;
use log::info;
use serde::{Deserialize, Serialize};

/// Empirical coverage and average set size (classification) or interval
/// width (regression), aggregated over a test partition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationSummary {
    /// Fraction of test samples whose true label/value fell inside its
    /// set/interval. Always in [0, 1].
    pub coverage: f64,
    /// Mean set cardinality, or mean interval width for regression.
    /// Absolute count/width, not a fraction.
    pub avg_set_size: f64,
    /// Number of test samples (or valid test pixels) aggregated over.
    pub n_test: usize,
    /// Optional experiment version tag.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

/// Evaluates a calibrated threshold against labeled test data.
pub struct CoverageEvaluator<'a> {
    dict: &'a ClassDictionary,
    result: &'a CalibrationResult,
}

impl<'a> CoverageEvaluator<'a> {
    pub fn new(dict: &'a ClassDictionary, result: &'a CalibrationResult) -> Self {
        CoverageEvaluator { dict, result }
    }

    /// Feature-level classification: for each test sample, the coverage
    /// indicator is 1 if the true class is a member of its prediction set.
    pub fn evaluate_samples(&self, test: &[Sample]) -> Result<EvaluationSummary, GeoConformalError> {
        if test.is_empty() {
            return Err(GeoConformalError::InsufficientCalibrationData(
                "test".to_string(),
            ));
        }
        let builder = PredictionSetBuilder::new(self.dict, self.result);
        let mut correct = 0usize;
        let mut total_size = 0usize;
        for sample in test {
            let class = match sample.label {
                Label::Class(c) => c,
                Label::Value(v) => {
                    return Err(GeoConformalError::InvalidParameter(
                        "label".to_string(),
                        "a class index".to_string(),
                        v.to_string(),
                    ))
                }
            };
            let name = self.dict.name(class)?;
            let set = builder.sample_set(&sample.probabilities)?;
            if set.classes.iter().any(|c| c == name) {
                correct += 1;
            }
            total_size += set.size;
        }
        let n_test = test.len();
        let summary = EvaluationSummary {
            coverage: correct as f64 / n_test as f64,
            avg_set_size: total_size as f64 / n_test as f64,
            n_test,
            version: self.result.version.clone(),
        };
        info!(
            "Average set size: {:.2}, empirical (marginal) coverage: {:.2}",
            summary.avg_set_size, summary.coverage
        );
        Ok(summary)
    }

    /// Image-level classification: the same indicators aggregated over valid
    /// pixel counts rather than sample counts, since one raster may
    /// contribute millions of pixels unevenly.
    ///
    /// * `images` - Pairs of (probability table, label plane). NaN labels
    ///   mark masked pixels and are excluded from both numerators and the
    ///   denominator.
    pub fn evaluate_pixels(
        &self,
        images: &[(PixelTable, Vec<f64>)],
    ) -> Result<EvaluationSummary, GeoConformalError> {
        let builder = PredictionSetBuilder::new(self.dict, self.result);
        let mut correct = 0usize;
        let mut total_size = 0usize;
        let mut n_pixels_test = 0usize;
        for (probabilities, labels) in images {
            if labels.len() != probabilities.rows {
                return Err(GeoConformalError::MismatchedBands(format!(
                    "label plane of {} pixels does not match probability table of {} rows",
                    labels.len(),
                    probabilities.rows
                )));
            }
            let sets = builder.pixel_sets(probabilities)?;
            for (pixel, label) in labels.iter().enumerate() {
                if label.is_nan() {
                    continue;
                }
                let class = label_class(*label, pixel, self.dict)?;
                n_pixels_test += 1;
                total_size += sets.set_length[pixel] as usize;
                if sets.masks[class][pixel] == 1 {
                    correct += 1;
                }
            }
        }
        if n_pixels_test == 0 {
            return Err(GeoConformalError::InsufficientCalibrationData(
                "test".to_string(),
            ));
        }
        let summary = EvaluationSummary {
            coverage: correct as f64 / n_pixels_test as f64,
            avg_set_size: total_size as f64 / n_pixels_test as f64,
            n_test: n_pixels_test,
            version: self.result.version.clone(),
        };
        info!(
            "Average set size: {:.2}, empirical (marginal) coverage: {:.2} over {} pixels",
            summary.avg_set_size, summary.coverage, summary.n_test
        );
        Ok(summary)
    }
}

/// Regression: coverage indicator is 1 if `lower <= y <= upper`; the size
/// metric is the mean interval width.
pub fn evaluate_intervals(
    test: &[Sample],
    result: &CalibrationResult,
) -> Result<EvaluationSummary, GeoConformalError> {
    if test.is_empty() {
        return Err(GeoConformalError::InsufficientCalibrationData(
            "test".to_string(),
        ));
    }
    let mut correct = 0usize;
    let mut total_width = 0.0;
    for sample in test {
        let value = match sample.label {
            Label::Value(v) => v,
            Label::Class(c) => {
                return Err(GeoConformalError::InvalidParameter(
                    "label".to_string(),
                    "a continuous value".to_string(),
                    c.to_string(),
                ))
            }
        };
        let prediction = sample.prediction.ok_or_else(|| {
            GeoConformalError::InvalidParameter(
                "prediction".to_string(),
                "a point prediction".to_string(),
                "None".to_string(),
            )
        })?;
        let interval = PredictionInterval::from_prediction(prediction, result);
        if interval.contains(value) {
            correct += 1;
        }
        total_width += interval.width;
    }
    let n_test = test.len();
    let summary = EvaluationSummary {
        coverage: correct as f64 / n_test as f64,
        avg_set_size: total_width / n_test as f64,
        n_test,
        version: result.version.clone(),
    };
    info!(
        "Average width: {:.2}, empirical (marginal) coverage: {:.2}",
        summary.avg_set_size, summary.coverage
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixtures() -> (ClassDictionary, CalibrationResult) {
        let dict = ClassDictionary::from_bands(&["water", "forest"]).unwrap();
        let result = CalibrationResult {
            q_level: 9.0,
            q_hat: 0.4,
            version: None,
        };
        (dict, result)
    }

    #[test]
    fn test_evaluate_samples() {
        let (dict, result) = fixtures();
        let evaluator = CoverageEvaluator::new(&dict, &result);
        let test = vec![
            // Covered, set {water}.
            Sample::classification(0, 0, vec![0.8, 0.2]),
            // Covered, set {water, forest}.
            Sample::classification(1, 1, vec![0.5, 0.5]),
            // Not covered, set {water}.
            Sample::classification(2, 1, vec![0.7, 0.3]),
            // Not covered, empty set.
            Sample::classification(3, 0, vec![0.3, 0.3]),
        ];
        let summary = evaluator.evaluate_samples(&test).unwrap();
        assert!((summary.coverage - 0.5).abs() < 1e-12);
        assert!((summary.avg_set_size - 1.0).abs() < 1e-12);
        assert_eq!(summary.n_test, 4);
    }

    #[test]
    fn test_evaluate_samples_empty_test() {
        let (dict, result) = fixtures();
        let evaluator = CoverageEvaluator::new(&dict, &result);
        assert!(matches!(
            evaluator.evaluate_samples(&[]),
            Err(GeoConformalError::InsufficientCalibrationData(_))
        ));
    }

    #[test]
    fn test_evaluate_pixels_matches_samples() {
        let (dict, result) = fixtures();
        let evaluator = CoverageEvaluator::new(&dict, &result);
        // Same four samples as the feature-level test, as one 4-pixel image.
        let probs = PixelTable::new(
            vec![0.8, 0.5, 0.7, 0.3, 0.2, 0.5, 0.3, 0.3],
            4,
            vec!["water".to_string(), "forest".to_string()],
        )
        .unwrap();
        let labels = vec![0.0, 1.0, 1.0, 0.0];
        let summary = evaluator.evaluate_pixels(&[(probs, labels)]).unwrap();
        assert!((summary.coverage - 0.5).abs() < 1e-12);
        assert!((summary.avg_set_size - 1.0).abs() < 1e-12);
        assert_eq!(summary.n_test, 4);
    }

    #[test]
    fn test_evaluate_pixels_masked_excluded() {
        let (dict, result) = fixtures();
        let evaluator = CoverageEvaluator::new(&dict, &result);
        let probs = PixelTable::new(
            vec![0.8, 0.5, 0.2, 0.5],
            2,
            vec!["water".to_string(), "forest".to_string()],
        )
        .unwrap();
        let labels = vec![0.0, f64::NAN];
        let summary = evaluator.evaluate_pixels(&[(probs, labels)]).unwrap();
        assert_eq!(summary.n_test, 1);
        assert!((summary.coverage - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_evaluate_pixels_rejects_nodata_label() {
        let (dict, result) = fixtures();
        let evaluator = CoverageEvaluator::new(&dict, &result);
        let probs = PixelTable::new(
            vec![0.8, 0.5, 0.2, 0.5],
            2,
            vec!["water".to_string(), "forest".to_string()],
        )
        .unwrap();
        // A nodata sentinel is an error, not a class-0 test pixel.
        let labels = vec![-9999.0, 0.0];
        assert!(matches!(
            evaluator.evaluate_pixels(&[(probs, labels)]),
            Err(GeoConformalError::MismatchedBands(_))
        ));
    }

    #[test]
    fn test_evaluate_intervals() {
        let result = CalibrationResult {
            q_level: 80.0,
            q_hat: 4.2,
            version: None,
        };
        let test = vec![
            // 10 +- 4.2 covers 12.0.
            Sample::regression(0, 12.0, 10.0),
            // 0 +- 4.2 does not cover 5.0.
            Sample::regression(1, 5.0, 0.0),
        ];
        let summary = evaluate_intervals(&test, &result).unwrap();
        assert!((summary.coverage - 0.5).abs() < 1e-12);
        assert!((summary.avg_set_size - 8.4).abs() < 1e-12);
    }

    #[test]
    fn test_coverage_monotone_in_alpha() {
        use crate::conformal::calibrate::QuantileCalibrator;
        // Lowering qLevel (higher alpha) must not increase coverage.
        let cal_scores: Vec<f64> = (0..200).map(|v| (v as f64 + 0.5) / 200.0).collect();
        let (dict, _) = fixtures();
        let test: Vec<Sample> = (0..50)
            .map(|i| {
                let p = (i as f64 + 0.5) / 50.0;
                Sample::classification(i, 0, vec![p, 1.0 - p])
            })
            .collect();
        let mut last = f64::MAX;
        for alpha in [0.05, 0.1, 0.2, 0.4] {
            let result = QuantileCalibrator::new(alpha)
                .unwrap()
                .calibrate(&cal_scores)
                .unwrap();
            let evaluator = CoverageEvaluator::new(&dict, &result);
            let summary = evaluator.evaluate_samples(&test).unwrap();
            assert!(summary.coverage <= last);
            last = summary.coverage;
        }
    }
}
