//! Splitter
//!
//! Deterministic seeded partitioning of a dataset into a calibration and a
//! test subset. Each sample, in dataset order, is assigned a uniform random
//! value in [0,1); samples below the split fraction go to calibration, the
//! rest to test. The partition is a pure function of (dataset order, seed,
//! split), with no hidden global state.
use crate::errors::GeoConformalError;
use crate::utils::validate_float_parameter;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// Index partition produced by [`DataSplitter::split`].
///
/// The two index sets are disjoint and together cover `0..n`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitResult {
    pub calibration: Vec<usize>,
    pub test: Vec<usize>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DataSplitter {
    /// Fraction of samples assigned to the calibration partition.
    pub split: f64,
    /// Seed for the random assignment.
    pub seed: u64,
}

impl DataSplitter {
    pub fn new(split: f64, seed: u64) -> Self {
        DataSplitter { split, seed }
    }

    /// Partition `0..n` into calibration (`random < split`) and test
    /// (`random >= split`) indices.
    ///
    /// A split of exactly 0 or 1 is legal and yields an empty partition;
    /// calibration will then fail fast downstream. Values outside [0, 1]
    /// are rejected.
    pub fn split(&self, n: usize) -> Result<SplitResult, GeoConformalError> {
        validate_float_parameter(self.split, 0.0, 1.0, "split")?;
        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut calibration = Vec::new();
        let mut test = Vec::new();
        for i in 0..n {
            if rng.gen::<f64>() < self.split {
                calibration.push(i);
            } else {
                test.push(i);
            }
        }
        Ok(SplitResult { calibration, test })
    }
}
