//! Prediction Sets
//!
//! Builds the conformal output for a calibrated threshold: class sets for
//! classification (a class is included iff its predicted probability clears
//! qHat) and symmetric intervals for regression. One builder serves both the
//! per-sample and the pixel-batch granularity, so feature and image paths
//! cannot drift apart.
use crate::conformal::calibrate::CalibrationResult;
use crate::data::ClassDictionary;
use crate::errors::GeoConformalError;
use crate::PixelTable;

/// The prediction set for a single classification sample.
#[derive(Debug, Clone, PartialEq)]
pub struct PredictionSet {
    /// Names of the classes whose probability cleared qHat.
    pub classes: Vec<String>,
    /// Set cardinality. May be 0 when no class clears the threshold.
    pub size: usize,
}

/// The prediction interval for a single regression sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PredictionInterval {
    pub lower: f64,
    pub upper: f64,
    pub width: f64,
}

impl PredictionInterval {
    /// Symmetric interval `prediction +- q_hat`. The width is `2 * q_hat`
    /// for every sample, by construction of the absolute-residual method.
    pub fn from_prediction(prediction: f64, result: &CalibrationResult) -> Self {
        let lower = prediction - result.q_hat;
        let upper = prediction + result.q_hat;
        PredictionInterval {
            lower,
            upper,
            width: upper - lower,
        }
    }

    pub fn contains(&self, value: f64) -> bool {
        self.lower <= value && value <= self.upper
    }
}

/// Binary class masks plus a per-pixel set-length plane, for one pixel batch.
#[derive(Debug, Clone, PartialEq)]
pub struct PixelSets {
    /// One mask plane per class, in dictionary order. 1 = included in set.
    pub masks: Vec<Vec<u8>>,
    /// Per-pixel set cardinality (sum of the masks).
    pub set_length: Vec<u8>,
    /// Number of pixels in the batch.
    pub n_pixels: usize,
}

/// Applies a [`CalibrationResult`] to probability vectors, at either
/// per-sample or pixel-batch granularity. Stateless and deterministic: the
/// same inputs always yield the same sets.
pub struct PredictionSetBuilder<'a> {
    dict: &'a ClassDictionary,
    result: &'a CalibrationResult,
}

impl<'a> PredictionSetBuilder<'a> {
    pub fn new(dict: &'a ClassDictionary, result: &'a CalibrationResult) -> Self {
        PredictionSetBuilder { dict, result }
    }

    /// Each candidate class is compared independently to qHat; no ordering
    /// or cumulative-probability rule is involved.
    pub fn sample_set(&self, probabilities: &[f64]) -> Result<PredictionSet, GeoConformalError> {
        if probabilities.len() != self.dict.len() {
            return Err(GeoConformalError::MismatchedBands(format!(
                "{} probabilities for {} classes",
                probabilities.len(),
                self.dict.len()
            )));
        }
        let mut classes = Vec::new();
        for (class, p) in probabilities.iter().enumerate() {
            if *p >= self.result.q_hat {
                classes.push(self.dict.name(class)?.to_string());
            }
        }
        let size = classes.len();
        Ok(PredictionSet { classes, size })
    }

    /// The per-sample logic vectorized over a batch of pixels: one binary
    /// mask plane per class plus a set-length plane. A NaN probability never
    /// clears the threshold, so masked pixels end up with empty sets.
    pub fn pixel_sets(&self, probabilities: &PixelTable) -> Result<PixelSets, GeoConformalError> {
        if probabilities.cols != self.dict.len() {
            return Err(GeoConformalError::MismatchedBands(format!(
                "probability table has {} bands for {} classes",
                probabilities.cols,
                self.dict.len()
            )));
        }
        let n_pixels = probabilities.rows;
        let mut masks = Vec::with_capacity(self.dict.len());
        let mut set_length = vec![0u8; n_pixels];
        for class in 0..self.dict.len() {
            let plane = probabilities.get_col(class);
            let mask: Vec<u8> = plane
                .iter()
                .map(|p| u8::from(*p >= self.result.q_hat))
                .collect();
            for (len, m) in set_length.iter_mut().zip(mask.iter()) {
                *len += m;
            }
            masks.push(mask);
        }
        Ok(PixelSets {
            masks,
            set_length,
            n_pixels,
        })
    }
}
