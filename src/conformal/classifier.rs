//! Conformal Classifier
//!
//! High-level driver for the classification workflow: split the labeled data,
//! score the calibration partition, derive the qHat threshold, evaluate
//! coverage on the test partition, and apply the threshold to new probability
//! vectors or whole pixel batches.
//!
//! All intermediate state (partitions, thresholds) is carried in explicit
//! value objects returned to the caller; the classifier itself holds only
//! configuration and the class dictionary.
use crate::conformal::calibrate::{CalibrationResult, QuantileCalibrator};
use crate::conformal::config::ConformalConfig;
use crate::conformal::evaluate::{CoverageEvaluator, EvaluationSummary};
use crate::conformal::score::{classification_scores, pixel_scores, ImageScores};
use crate::conformal::sets::{PixelSets, PredictionSet, PredictionSetBuilder};
use crate::data::{ClassDictionary, Sample};
use crate::engine::TableQuery;
use crate::errors::GeoConformalError;
use crate::splitter::{DataSplitter, SplitResult};
use crate::PixelTable;
use log::info;

/// A probability image paired with its label plane, for the image-level
/// calibration path. NaN labels mark masked pixels.
#[derive(Debug, Clone, PartialEq)]
pub struct LabeledImage {
    pub probabilities: PixelTable,
    pub labels: Vec<f64>,
}

pub struct ConformalClassifier {
    pub config: ConformalConfig,
    dict: ClassDictionary,
}

impl ConformalClassifier {
    pub fn new(config: ConformalConfig) -> Result<Self, GeoConformalError> {
        config.validate()?;
        let dict = ClassDictionary::from_bands(&config.bands)?;
        Ok(ConformalClassifier { config, dict })
    }

    pub fn class_dictionary(&self) -> &ClassDictionary {
        &self.dict
    }

    /// The table query that materializes this workflow's samples from the
    /// remote engine: every probability band plus the label property.
    pub fn sample_query(&self, asset: &str) -> TableQuery {
        let mut properties = self.config.bands.clone();
        properties.push(self.config.label.clone());
        TableQuery {
            asset: asset.to_string(),
            bounds: None,
            start_date: None,
            end_date: None,
            properties,
        }
    }

    fn tag(&self, mut result: CalibrationResult) -> CalibrationResult {
        result.version = self.config.version.clone();
        result
    }

    /// Split the samples, score the calibration partition, and derive the
    /// threshold. Returns the partition alongside the result so evaluation
    /// runs on exactly the held-out half.
    pub fn calibrate(
        &self,
        samples: &[Sample],
    ) -> Result<(SplitResult, CalibrationResult), GeoConformalError> {
        let splitter = DataSplitter::new(self.config.split, self.config.seed);
        let split = splitter.split(samples.len())?;
        if split.calibration.is_empty() {
            return Err(GeoConformalError::InsufficientCalibrationData(
                "calibration".to_string(),
            ));
        }
        let calibration: Vec<Sample> = split.calibration.iter().map(|i| samples[*i].clone()).collect();
        let scored = classification_scores(&calibration, &self.dict)?;
        let scores: Vec<f64> = scored.iter().map(|s| s.score).collect();
        let calibrator = QuantileCalibrator::new(self.config.alpha)?;
        let result = calibrator.calibrate(&scores)?;
        info!(
            "Calibrated on {} of {} samples",
            split.calibration.len(),
            samples.len()
        );
        Ok((split, self.tag(result)))
    }

    /// Image-level calibration: per-pixel scores per calibration image, then
    /// the two-stage pixel-weighted threshold.
    pub fn calibrate_images(
        &self,
        images: &[LabeledImage],
    ) -> Result<(SplitResult, CalibrationResult), GeoConformalError> {
        let splitter = DataSplitter::new(self.config.split, self.config.seed);
        let split = splitter.split(images.len())?;
        if split.calibration.is_empty() {
            return Err(GeoConformalError::InsufficientCalibrationData(
                "calibration".to_string(),
            ));
        }
        let mut scored: Vec<ImageScores> = Vec::with_capacity(split.calibration.len());
        for i in &split.calibration {
            let image = &images[*i];
            scored.push(pixel_scores(&image.probabilities, &image.labels, &self.dict)?);
        }
        let calibrator = QuantileCalibrator::new(self.config.alpha)?;
        let result = calibrator.calibrate_images(&scored)?;
        Ok((split, self.tag(result)))
    }

    /// Evaluate coverage and average set size on the test partition.
    pub fn evaluate(
        &self,
        samples: &[Sample],
        split: &SplitResult,
        result: &CalibrationResult,
    ) -> Result<EvaluationSummary, GeoConformalError> {
        let test: Vec<Sample> = split.test.iter().map(|i| samples[*i].clone()).collect();
        CoverageEvaluator::new(&self.dict, result).evaluate_samples(&test)
    }

    /// Evaluate on the test images, pixel-weighted.
    pub fn evaluate_images(
        &self,
        images: &[LabeledImage],
        split: &SplitResult,
        result: &CalibrationResult,
    ) -> Result<EvaluationSummary, GeoConformalError> {
        let test: Vec<(PixelTable, Vec<f64>)> = split
            .test
            .iter()
            .map(|i| (images[*i].probabilities.clone(), images[*i].labels.clone()))
            .collect();
        CoverageEvaluator::new(&self.dict, result).evaluate_pixels(&test)
    }

    /// The prediction set for one probability vector.
    pub fn predict(
        &self,
        probabilities: &[f64],
        result: &CalibrationResult,
    ) -> Result<PredictionSet, GeoConformalError> {
        PredictionSetBuilder::new(&self.dict, result).sample_set(probabilities)
    }

    /// Binary class masks plus a set-length plane for a pixel batch.
    pub fn predict_pixels(
        &self,
        probabilities: &PixelTable,
        result: &CalibrationResult,
    ) -> Result<PixelSets, GeoConformalError> {
        PredictionSetBuilder::new(&self.dict, result).pixel_sets(probabilities)
    }
}
