//! Fold Metrics
//!
//! Aggregation of k-fold cross-validation outcomes: a sample-weighted
//! average accuracy across folds and a summed confusion matrix with
//! producer's and consumer's accuracies. The classifier that produced each
//! fold is a collaborator; only the assessment values live here.
use crate::errors::GeoConformalError;
use serde::{Deserialize, Serialize};

/// The assessment of a single cross-validation fold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FoldAssessment {
    /// Overall accuracy on this fold's validation samples.
    pub accuracy: f64,
    /// Number of validation samples in this fold; the weight when averaging.
    pub n_validation: usize,
    /// Square confusion matrix, rows = actual class, columns = predicted.
    pub confusion: Vec<Vec<u64>>,
}

impl FoldAssessment {
    /// Build an assessment from per-sample actual/predicted class indices.
    pub fn from_predictions(
        actual: &[usize],
        predicted: &[usize],
        n_classes: usize,
    ) -> Result<Self, GeoConformalError> {
        if actual.len() != predicted.len() {
            return Err(GeoConformalError::InvalidParameter(
                "predicted".to_string(),
                format!("{} predictions", actual.len()),
                predicted.len().to_string(),
            ));
        }
        if actual.is_empty() {
            return Err(GeoConformalError::InsufficientCalibrationData(
                "validation".to_string(),
            ));
        }
        let mut confusion = vec![vec![0u64; n_classes]; n_classes];
        let mut correct = 0usize;
        for (a, p) in actual.iter().zip(predicted.iter()) {
            if *a >= n_classes || *p >= n_classes {
                return Err(GeoConformalError::MismatchedBands(format!(
                    "class index {} out of range for {} classes",
                    a.max(p),
                    n_classes
                )));
            }
            confusion[*a][*p] += 1;
            if a == p {
                correct += 1;
            }
        }
        Ok(FoldAssessment {
            accuracy: correct as f64 / actual.len() as f64,
            n_validation: actual.len(),
            confusion,
        })
    }
}

/// Average accuracy across folds, each fold weighted by its validation
/// sample count.
pub fn weighted_accuracy(folds: &[FoldAssessment]) -> Result<f64, GeoConformalError> {
    let total: usize = folds.iter().map(|f| f.n_validation).sum();
    if total == 0 {
        return Err(GeoConformalError::InsufficientCalibrationData(
            "validation".to_string(),
        ));
    }
    Ok(folds
        .iter()
        .map(|f| f.accuracy * f.n_validation as f64 / total as f64)
        .sum())
}

/// A confusion matrix summed over folds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    counts: Vec<Vec<u64>>,
    n_classes: usize,
}

impl ConfusionMatrix {
    /// Sum the per-fold matrices element-wise. All folds must share the
    /// same class count.
    pub fn sum_folds(folds: &[FoldAssessment]) -> Result<Self, GeoConformalError> {
        let first = folds.first().ok_or_else(|| {
            GeoConformalError::InsufficientCalibrationData("validation".to_string())
        })?;
        let n_classes = first.confusion.len();
        let mut counts = vec![vec![0u64; n_classes]; n_classes];
        for fold in folds {
            if fold.confusion.len() != n_classes
                || fold.confusion.iter().any(|row| row.len() != n_classes)
            {
                return Err(GeoConformalError::MismatchedBands(format!(
                    "confusion matrices of different sizes ({} vs {})",
                    fold.confusion.len(),
                    n_classes
                )));
            }
            for (acc_row, row) in counts.iter_mut().zip(fold.confusion.iter()) {
                for (acc, v) in acc_row.iter_mut().zip(row.iter()) {
                    *acc += v;
                }
            }
        }
        Ok(ConfusionMatrix { counts, n_classes })
    }

    pub fn counts(&self) -> &[Vec<u64>] {
        &self.counts
    }

    /// Fraction of all samples on the diagonal.
    pub fn overall_accuracy(&self) -> f64 {
        let total: u64 = self.counts.iter().flatten().sum();
        if total == 0 {
            return f64::NAN;
        }
        let diagonal: u64 = (0..self.n_classes).map(|i| self.counts[i][i]).sum();
        diagonal as f64 / total as f64
    }

    /// Per-class recall: diagonal over the actual-class row sum.
    pub fn producers_accuracy(&self) -> Vec<f64> {
        (0..self.n_classes)
            .map(|i| {
                let row: u64 = self.counts[i].iter().sum();
                if row == 0 {
                    f64::NAN
                } else {
                    self.counts[i][i] as f64 / row as f64
                }
            })
            .collect()
    }

    /// Per-class precision: diagonal over the predicted-class column sum.
    pub fn consumers_accuracy(&self) -> Vec<f64> {
        (0..self.n_classes)
            .map(|j| {
                let col: u64 = (0..self.n_classes).map(|i| self.counts[i][j]).sum();
                if col == 0 {
                    f64::NAN
                } else {
                    self.counts[j][j] as f64 / col as f64
                }
            })
            .collect()
    }
}
