//! Model Collaborator
//!
//! Interface to a fitted classifier or regressor. Training is a black box
//! that happens elsewhere; this crate only calls the prediction surface.
//! Errors a model raises are passed through unmodified.
use crate::errors::GeoConformalError;
use crate::PixelTable;

/// A fitted model applied row-wise to a pixel table.
///
/// `predict_proba` returns a row-major `rows x n_classes` block. Both calls
/// are fallible; a failure inside a tiled run surfaces as an
/// [`GeoConformalError::InferenceTaskFailure`] for the window being
/// processed.
pub trait PredictiveModel: Send + Sync {
    /// Number of classes in the probability output. 0 for pure regressors.
    fn n_classes(&self) -> usize;

    /// Point predictions, one per row.
    fn predict(&self, table: &PixelTable) -> Result<Vec<f64>, GeoConformalError>;

    /// Per-class probabilities, row-major `rows * n_classes`.
    fn predict_proba(&self, table: &PixelTable) -> Result<Vec<f64>, GeoConformalError>;
}
