//! Nonconformity Scoring
//!
//! Computes, per calibration sample, a scalar measuring model agreement with
//! ground truth. Classification keeps the raw probability of the true class
//! as the score (the calibration step then cuts the *low* tail, so qHat acts
//! as a probability threshold downstream, not a distance). Regression uses
//! the absolute residual.
use crate::data::{ClassDictionary, Label, Sample, ScoredSample};
use crate::errors::GeoConformalError;
use crate::PixelTable;

/// Nonconformity scores for classification samples.
///
/// Each score is the stored probability of the sample's true class, looked
/// up through the class dictionary. Scores are raw probabilities, not
/// one-minus-probability.
pub fn classification_scores(
    samples: &[Sample],
    dict: &ClassDictionary,
) -> Result<Vec<ScoredSample>, GeoConformalError> {
    samples
        .iter()
        .map(|sample| {
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
            if sample.probabilities.len() != dict.len() {
                return Err(GeoConformalError::MismatchedBands(format!(
                    "sample {} has {} probabilities for {} classes",
                    sample.id,
                    sample.probabilities.len(),
                    dict.len()
                )));
            }
            // Bounds-check the label through the dictionary.
            dict.name(class)?;
            Ok(ScoredSample {
                id: sample.id,
                score: sample.probabilities[class],
            })
        })
        .collect()
}

/// Nonconformity scores for regression samples: the absolute residual
/// `|y - yhat|`.
pub fn regression_scores(samples: &[Sample]) -> Result<Vec<ScoredSample>, GeoConformalError> {
    samples
        .iter()
        .map(|sample| {
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
            Ok(ScoredSample {
                id: sample.id,
                score: (value - prediction).abs(),
            })
        })
        .collect()
}

/// Per-pixel nonconformity scores for one calibration image, with the number
/// of valid pixels tracked explicitly. Pixel counts vary per image, and the
/// global threshold is computed across calibration images weighted by these
/// counts, so `n_pixels` is part of the value, not derivable later.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageScores {
    /// One score per valid (labeled) pixel.
    pub scores: Vec<f64>,
    /// Number of valid pixels that contributed.
    pub n_pixels: usize,
}

/// Resolve a label-plane value to a class index.
///
/// Nodata sentinels (negative values such as -9999) and fractional values are
/// rejected rather than truncated into class 0; the dictionary lookup catches
/// indices past the last class.
pub(crate) fn label_class(
    label: f64,
    pixel: usize,
    dict: &ClassDictionary,
) -> Result<usize, GeoConformalError> {
    if label < 0.0 || label.fract() != 0.0 {
        return Err(GeoConformalError::MismatchedBands(format!(
            "label value {} at pixel {} is not a class index",
            label, pixel
        )));
    }
    let class = label as usize;
    dict.name(class)?;
    Ok(class)
}

/// Score every valid pixel of a probability image against its label plane.
///
/// * `probabilities` - One row per pixel, one column per class band.
/// * `labels` - The label plane; a NaN entry marks a masked pixel, which is
///   skipped and not counted.
pub fn pixel_scores(
    probabilities: &PixelTable,
    labels: &[f64],
    dict: &ClassDictionary,
) -> Result<ImageScores, GeoConformalError> {
    if labels.len() != probabilities.rows {
        return Err(GeoConformalError::MismatchedBands(format!(
            "label plane of {} pixels does not match probability table of {} rows",
            labels.len(),
            probabilities.rows
        )));
    }
    if probabilities.cols != dict.len() {
        return Err(GeoConformalError::MismatchedBands(format!(
            "probability table has {} bands for {} classes",
            probabilities.cols,
            dict.len()
        )));
    }
    let mut scores = Vec::with_capacity(labels.len());
    for (pixel, label) in labels.iter().enumerate() {
        if label.is_nan() {
            continue;
        }
        let class = label_class(*label, pixel, dict)?;
        scores.push(probabilities.get(pixel, class));
    }
    let n_pixels = scores.len();
    Ok(ImageScores { scores, n_pixels })
}
