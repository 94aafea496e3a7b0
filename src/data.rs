//! Data containers
//!
//! Sample types consumed by the conformal engine, the class dictionary that
//! maps integer labels to probability-band names, and the flat row-per-pixel
//! table handed to models during tiled inference.
use crate::errors::GeoConformalError;
use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

/// The ground-truth side of a sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Label {
    /// Integer class index for classification.
    Class(usize),
    /// Continuous response for regression.
    Value(f64),
}

/// A single labeled observation with its model outputs attached.
///
/// For classification `probabilities` holds one entry per candidate class,
/// ordered to match the band list the [`ClassDictionary`] was built from.
/// For regression `prediction` holds the point estimate and `probabilities`
/// is empty. Samples are immutable once scored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub id: u64,
    pub label: Label,
    pub probabilities: Vec<f64>,
    pub prediction: Option<f64>,
}

impl Sample {
    /// A classification sample: true class index plus per-class probabilities.
    pub fn classification(id: u64, class: usize, probabilities: Vec<f64>) -> Self {
        Sample {
            id,
            label: Label::Class(class),
            probabilities,
            prediction: None,
        }
    }

    /// A regression sample: true value plus point prediction.
    pub fn regression(id: u64, value: f64, prediction: f64) -> Self {
        Sample {
            id,
            label: Label::Value(value),
            probabilities: Vec::new(),
            prediction: Some(prediction),
        }
    }
}

/// A sample id paired with its nonconformity score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoredSample {
    pub id: u64,
    pub score: f64,
}

/// Bidirectional mapping between integer class indices `0..K-1` and the
/// band/property names that carry each class probability.
///
/// Keys are contiguous integers starting at zero and names must be unique;
/// both are enforced at construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassDictionary {
    names: Vec<String>,
    indices: HashMap<String, usize>,
}

impl ClassDictionary {
    /// Build the dictionary from the ordered probability-band list.
    ///
    /// At most 255 classes; mask and set-length planes are stored as `u8`.
    pub fn from_bands<S: AsRef<str>>(bands: &[S]) -> Result<Self, GeoConformalError> {
        if bands.is_empty() {
            return Err(GeoConformalError::MismatchedBands(
                "cannot build a class dictionary from an empty band list".to_string(),
            ));
        }
        if bands.len() > u8::MAX as usize {
            return Err(GeoConformalError::MismatchedBands(format!(
                "{} classes exceed the {} supported per dictionary",
                bands.len(),
                u8::MAX
            )));
        }
        let mut names = Vec::with_capacity(bands.len());
        let mut indices = HashMap::with_capacity(bands.len());
        for (i, band) in bands.iter().enumerate() {
            let name = band.as_ref().to_string();
            if indices.insert(name.clone(), i).is_some() {
                return Err(GeoConformalError::MismatchedBands(format!(
                    "duplicate class band name {}",
                    name
                )));
            }
            names.push(name);
        }
        Ok(ClassDictionary { names, indices })
    }

    /// Number of classes.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// The band name for a class index.
    pub fn name(&self, class: usize) -> Result<&str, GeoConformalError> {
        self.names
            .get(class)
            .map(|s| s.as_str())
            .ok_or_else(|| {
                GeoConformalError::MismatchedBands(format!(
                    "class index {} out of range for {} classes",
                    class,
                    self.names.len()
                ))
            })
    }

    /// The class index for a band name.
    pub fn index(&self, name: &str) -> Result<usize, GeoConformalError> {
        self.indices.get(name).copied().ok_or_else(|| {
            GeoConformalError::MismatchedBands(format!("unknown class band name {}", name))
        })
    }

    /// The ordered band names.
    pub fn names(&self) -> &[String] {
        &self.names
    }
}

/// Contiguous column major pixel table.
///
/// One row per pixel, one column per band, stored in a single contiguous
/// block in column-major order so a band plane is a single slice. This is the
/// shape models consume during tiled inference.
#[derive(Debug, Clone, PartialEq)]
pub struct PixelTable {
    data: Vec<f64>,
    band_names: Vec<String>,
    /// Number of rows (pixels) in the table.
    pub rows: usize,
    /// Number of columns (bands) in the table.
    pub cols: usize,
}

impl PixelTable {
    /// Create a new table from column-major data.
    ///
    /// * `data` - Column-major values, `rows * band_names.len()` long.
    /// * `rows` - The number of pixels.
    /// * `band_names` - One name per column.
    pub fn new(data: Vec<f64>, rows: usize, band_names: Vec<String>) -> Result<Self, GeoConformalError> {
        let cols = band_names.len();
        if data.len() != rows * cols {
            return Err(GeoConformalError::MismatchedBands(format!(
                "pixel table of {} values cannot hold {} rows x {} bands",
                data.len(),
                rows,
                cols
            )));
        }
        Ok(PixelTable {
            data,
            band_names,
            rows,
            cols,
        })
    }

    /// Get a single item in the table.
    ///
    /// * `i` - The ith row of the data to get.
    /// * `j` - The jth column of the data to get.
    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.data[j * self.rows + i]
    }

    /// Get an entire column (band plane) in the table.
    pub fn get_col(&self, col: usize) -> &[f64] {
        &self.data[col * self.rows..(col + 1) * self.rows]
    }

    /// Get a column by band name.
    pub fn get_band(&self, name: &str) -> Result<&[f64], GeoConformalError> {
        let col = self
            .band_names
            .iter()
            .position(|b| b == name)
            .ok_or_else(|| GeoConformalError::MismatchedBands(format!("unknown band {}", name)))?;
        Ok(self.get_col(col))
    }

    /// Get a row of the data as a vector.
    pub fn get_row(&self, row: usize) -> Vec<f64> {
        (0..self.cols).map(|j| self.get(row, j)).collect()
    }

    /// The ordered band names.
    pub fn band_names(&self) -> &[String] {
        &self.band_names
    }

    /// Replace missing values with `fill`, in place.
    pub fn fill_missing(&mut self, fill: f64) {
        crate::utils::fill_missing(&mut self.data, f64::NAN, fill);
    }
}
