//! Tiled Inference
//!
//! Applies a fitted model across a large raster window by window: the raster
//! is partitioned into fixed-size tiles, a bounded worker pool reads each
//! tile's pixel block, reshapes it into a row-per-pixel table, runs the
//! model, and writes the result back to the matching output window.
//!
//! A run moves through Opened (source metadata read), Windowed (tiling
//! enumerated), Processing (workers draining the window list) and Closed
//! (all windows complete). Reads and writes are each serialized behind their
//! own lock since the underlying handles are not safe to share; the model
//! call runs unlocked and concurrently, and should dominate wall-clock time.
//! The first failing window stops scheduling of new windows and propagates;
//! partial output already written stays on disk, and a failed run must be
//! treated as invalid in full.
use crate::conformal::calibrate::CalibrationResult;
use crate::conformal::sets::PredictionSetBuilder;
use crate::data::ClassDictionary;
use crate::errors::GeoConformalError;
use crate::model::PredictiveModel;
use crate::raster::{RasterSink, RasterSource, RasterWindow, TileLayout};
use crate::PixelTable;
use log::info;
use rayon::prelude::*;
use std::sync::Mutex;

/// What the model writes per pixel.
#[derive(Debug, Clone)]
pub enum InferenceMode {
    /// One band: the point prediction.
    Predict,
    /// One band per class: the class probabilities.
    PredictProba,
    /// One binary mask band per class plus a set-length band, from a
    /// calibrated threshold.
    PredictSets {
        result: CalibrationResult,
        dict: ClassDictionary,
    },
}

impl InferenceMode {
    fn output_bands(&self, n_classes: usize) -> usize {
        match self {
            InferenceMode::Predict => 1,
            InferenceMode::PredictProba => n_classes,
            InferenceMode::PredictSets { dict, .. } => dict.len() + 1,
        }
    }
}

/// Summary of a completed tiled run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TiledRunReport {
    pub windows: usize,
    pub pixels: usize,
}

#[derive(Debug, Clone, Copy)]
pub struct TiledInferenceEngine {
    /// Tile edge length in pixels.
    pub tile_size: usize,
    /// Bounded worker count for the processing pool.
    pub workers: usize,
}

impl TiledInferenceEngine {
    pub fn new(tile_size: usize, workers: usize) -> Result<Self, GeoConformalError> {
        if tile_size == 0 {
            return Err(GeoConformalError::InvalidParameter(
                "tile_size".to_string(),
                "a positive tile edge length".to_string(),
                "0".to_string(),
            ));
        }
        if workers == 0 {
            return Err(GeoConformalError::InvalidParameter(
                "workers".to_string(),
                "a positive worker count".to_string(),
                "0".to_string(),
            ));
        }
        Ok(TiledInferenceEngine { tile_size, workers })
    }

    /// Run the model over every window of `source`, writing to `sink`.
    ///
    /// Window order is unspecified; each window's read -> compute -> write
    /// sequence is strictly ordered internally. Blocks until every window
    /// completes or one fails.
    pub fn run<S, K, M>(
        &self,
        source: S,
        sink: K,
        model: &M,
        mode: &InferenceMode,
    ) -> Result<TiledRunReport, GeoConformalError>
    where
        S: RasterSource,
        K: RasterSink,
        M: PredictiveModel,
    {
        // Opened: source metadata.
        let width = source.width();
        let height = source.height();
        let band_names = source.band_names();

        let expected_bands = mode.output_bands(model.n_classes());
        if sink.bands() != expected_bands {
            return Err(GeoConformalError::MismatchedBands(format!(
                "output raster has {} bands, mode requires {}",
                sink.bands(),
                expected_bands
            )));
        }
        if let InferenceMode::PredictSets { dict, .. } = mode {
            if dict.len() != model.n_classes() {
                return Err(GeoConformalError::MismatchedBands(format!(
                    "class dictionary has {} classes, model outputs {}",
                    dict.len(),
                    model.n_classes()
                )));
            }
        }

        // Windowed: enumerate the exhaustive tiling.
        let layout = TileLayout::new(width, height, self.tile_size)?;
        let windows = layout.windows();
        info!(
            "Tiled inference over {}x{} raster: {} windows of up to {}x{}, {} workers",
            width,
            height,
            windows.len(),
            self.tile_size,
            self.tile_size,
            self.workers
        );

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.workers)
            .build()
            .map_err(|e| {
                GeoConformalError::InvalidParameter(
                    "workers".to_string(),
                    "a usable worker pool".to_string(),
                    e.to_string(),
                )
            })?;

        let read_lock = Mutex::new(source);
        let write_lock = Mutex::new(sink);

        // Processing: fail-fast over the window list. try_for_each stops
        // handing out new windows after the first error; in-flight windows
        // finish, then the error propagates.
        pool.install(|| {
            windows.par_iter().try_for_each(|window| {
                self.process_window(window, &band_names, &read_lock, &write_lock, model, mode)
                    .map_err(|e| match e {
                        e @ GeoConformalError::InferenceTaskFailure(_, _, _) => e,
                        other => GeoConformalError::InferenceTaskFailure(
                            window.x_off,
                            window.y_off,
                            other.to_string(),
                        ),
                    })
            })
        })?;

        // Closed: every window completed.
        info!("Tiled inference complete: {} windows", windows.len());
        Ok(TiledRunReport {
            windows: windows.len(),
            pixels: width * height,
        })
    }

    fn process_window<S, K, M>(
        &self,
        window: &RasterWindow,
        band_names: &[String],
        read_lock: &Mutex<S>,
        write_lock: &Mutex<K>,
        model: &M,
        mode: &InferenceMode,
    ) -> Result<(), GeoConformalError>
    where
        S: RasterSource,
        K: RasterSink,
        M: PredictiveModel,
    {
        let block = {
            let mut source = read_lock
                .lock()
                .map_err(|_| GeoConformalError::Collaborator("poisoned read lock".to_string()))?;
            source.read_window(window)?
        };

        // Band-major planes are exactly the column-major pixel table.
        let mut table = PixelTable::new(block, window.n_pixels(), band_names.to_vec())?;
        // Missing inputs are zero-filled before prediction; a policy choice,
        // not imputation.
        table.fill_missing(0.0);

        let output = match mode {
            InferenceMode::Predict => model.predict(&table)?,
            InferenceMode::PredictProba => {
                let proba = model.predict_proba(&table)?;
                row_major_to_planes(&proba, table.rows, model.n_classes())?
            }
            InferenceMode::PredictSets { result, dict } => {
                let proba = model.predict_proba(&table)?;
                let planes = row_major_to_planes(&proba, table.rows, model.n_classes())?;
                let proba_table =
                    PixelTable::new(planes, table.rows, dict.names().to_vec())?;
                let sets = PredictionSetBuilder::new(dict, result).pixel_sets(&proba_table)?;
                let mut out = Vec::with_capacity((dict.len() + 1) * table.rows);
                for mask in &sets.masks {
                    out.extend(mask.iter().map(|m| *m as f64));
                }
                out.extend(sets.set_length.iter().map(|l| *l as f64));
                out
            }
        };

        let mut sink = write_lock
            .lock()
            .map_err(|_| GeoConformalError::Collaborator("poisoned write lock".to_string()))?;
        sink.write_window(window, &output)
    }
}

/// Reshape a row-major `rows x cols` block into `cols` contiguous planes.
fn row_major_to_planes(data: &[f64], rows: usize, cols: usize) -> Result<Vec<f64>, GeoConformalError> {
    if data.len() != rows * cols {
        return Err(GeoConformalError::MismatchedBands(format!(
            "model returned {} values for {} rows x {} outputs",
            data.len(),
            rows,
            cols
        )));
    }
    let mut planes = vec![0.0; rows * cols];
    for row in 0..rows {
        for col in 0..cols {
            planes[col * rows + row] = data[row * cols + col];
        }
    }
    Ok(planes)
}
