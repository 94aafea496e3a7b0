//! Workflow Configuration
//!
//! Declarative configuration for the conformal classification workflow:
//! which bands carry the class probabilities, which property carries the
//! label, the miscoverage tolerance, and the calibration/test split.
use crate::errors::GeoConformalError;
use crate::utils::validate_unit_open_interval;
use serde::{Deserialize, Serialize};

fn default_seed() -> u64 {
    42
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConformalConfig {
    /// Ordered probability band names, one per candidate class.
    pub bands: Vec<String>,
    /// Name of the property/band that carries the reference label;
    /// materialized alongside the probability bands by the sample query.
    pub label: String,
    /// Miscoverage tolerance in (0, 1); 0.1 targets 90% coverage.
    pub alpha: f64,
    /// Fraction of samples assigned to the calibration partition, in (0, 1).
    pub split: f64,
    /// Seed for the calibration/test split.
    #[serde(default = "default_seed")]
    pub seed: u64,
    /// Experiment version tag, carried through results.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

impl ConformalConfig {
    pub fn new<S: Into<String>>(bands: Vec<String>, label: S, alpha: f64, split: f64) -> Self {
        ConformalConfig {
            bands,
            label: label.into(),
            alpha,
            split,
            seed: default_seed(),
            version: None,
        }
    }

    pub fn set_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn set_version<S: Into<String>>(mut self, version: S) -> Self {
        self.version = Some(version.into());
        self
    }

    /// Validate the configuration up front, before any calibration work.
    /// The workflow always needs both partitions, so `split` must lie
    /// strictly inside (0, 1) here, unlike the lower-level splitter.
    pub fn validate(&self) -> Result<(), GeoConformalError> {
        validate_unit_open_interval(self.alpha, "alpha")?;
        validate_unit_open_interval(self.split, "split")?;
        if self.bands.is_empty() {
            return Err(GeoConformalError::MismatchedBands(
                "at least one probability band is required".to_string(),
            ));
        }
        if self.bands.iter().any(|b| b == &self.label) {
            return Err(GeoConformalError::MismatchedBands(format!(
                "label property {} collides with a probability band",
                self.label
            )));
        }
        Ok(())
    }
}
