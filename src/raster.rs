//! Raster Windows
//!
//! Rectangular pixel-block descriptors over a georeferenced raster, the
//! exhaustive tiling that partitions a raster into fixed-size windows, and
//! the windowed read/write collaborator traits the inference engine drives.
//! File-format codecs are out of scope; `MemoryRaster` backs the tests.
use crate::errors::GeoConformalError;
use serde::{Deserialize, Serialize};

/// A rectangular pixel block over a source raster. Read-only view; one per
/// output tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RasterWindow {
    pub x_off: usize,
    pub y_off: usize,
    pub width: usize,
    pub height: usize,
}

impl RasterWindow {
    pub fn n_pixels(&self) -> usize {
        self.width * self.height
    }
}

/// Partitions a (width x height) raster into non-overlapping windows with a
/// fixed tile edge. Edge windows are clipped, so the union covers the raster
/// exactly with no gaps or overlaps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileLayout {
    pub width: usize,
    pub height: usize,
    pub tile_size: usize,
}

impl TileLayout {
    pub fn new(width: usize, height: usize, tile_size: usize) -> Result<Self, GeoConformalError> {
        if tile_size == 0 {
            return Err(GeoConformalError::InvalidParameter(
                "tile_size".to_string(),
                "a positive tile edge length".to_string(),
                "0".to_string(),
            ));
        }
        Ok(TileLayout {
            width,
            height,
            tile_size,
        })
    }

    /// Number of windows: `ceil(width / tile) * ceil(height / tile)`.
    pub fn count(&self) -> usize {
        self.width.div_ceil(self.tile_size) * self.height.div_ceil(self.tile_size)
    }

    /// Enumerate every window, row by row.
    pub fn windows(&self) -> Vec<RasterWindow> {
        let mut windows = Vec::with_capacity(self.count());
        let mut y_off = 0;
        while y_off < self.height {
            let height = self.tile_size.min(self.height - y_off);
            let mut x_off = 0;
            while x_off < self.width {
                let width = self.tile_size.min(self.width - x_off);
                windows.push(RasterWindow {
                    x_off,
                    y_off,
                    width,
                    height,
                });
                x_off += self.tile_size;
            }
            y_off += self.tile_size;
        }
        windows
    }
}

/// Windowed read access to a georeferenced raster with named bands.
///
/// `read_window` returns band-major data: one `width * height` plane per
/// band (row-major within the plane), concatenated in band order.
pub trait RasterSource: Send {
    fn width(&self) -> usize;
    fn height(&self) -> usize;
    fn band_names(&self) -> Vec<String>;
    fn read_window(&mut self, window: &RasterWindow) -> Result<Vec<f64>, GeoConformalError>;
}

/// Windowed write access to an output raster with matching georeferencing.
///
/// `write_window` takes band-major data shaped like `read_window` output,
/// with `bands()` planes.
pub trait RasterSink: Send {
    fn bands(&self) -> usize;
    fn write_window(&mut self, window: &RasterWindow, data: &[f64]) -> Result<(), GeoConformalError>;
}

/// In-memory raster implementing both collaborator traits. Band-major
/// storage, row-major within each band plane.
#[derive(Debug, Clone, PartialEq)]
pub struct MemoryRaster {
    width: usize,
    height: usize,
    band_names: Vec<String>,
    data: Vec<f64>,
}

impl MemoryRaster {
    /// A raster filled with `fill`.
    pub fn filled(width: usize, height: usize, band_names: Vec<String>, fill: f64) -> Self {
        let data = vec![fill; width * height * band_names.len()];
        MemoryRaster {
            width,
            height,
            band_names,
            data,
        }
    }

    /// A raster from band-major data.
    pub fn from_data(
        width: usize,
        height: usize,
        band_names: Vec<String>,
        data: Vec<f64>,
    ) -> Result<Self, GeoConformalError> {
        if data.len() != width * height * band_names.len() {
            return Err(GeoConformalError::MismatchedBands(format!(
                "{} values cannot hold {} bands of {}x{} pixels",
                data.len(),
                band_names.len(),
                width,
                height
            )));
        }
        Ok(MemoryRaster {
            width,
            height,
            band_names,
            data,
        })
    }

    /// One full band plane, row-major.
    pub fn band(&self, band: usize) -> &[f64] {
        let plane = self.width * self.height;
        &self.data[band * plane..(band + 1) * plane]
    }

    pub fn get(&self, band: usize, x: usize, y: usize) -> f64 {
        self.band(band)[y * self.width + x]
    }

    fn check_window(&self, window: &RasterWindow) -> Result<(), GeoConformalError> {
        if window.x_off + window.width > self.width || window.y_off + window.height > self.height {
            return Err(GeoConformalError::InvalidParameter(
                "window".to_string(),
                format!("a window within {}x{}", self.width, self.height),
                format!(
                    "({}, {}) {}x{}",
                    window.x_off, window.y_off, window.width, window.height
                ),
            ));
        }
        Ok(())
    }
}

impl RasterSource for MemoryRaster {
    fn width(&self) -> usize {
        self.width
    }

    fn height(&self) -> usize {
        self.height
    }

    fn band_names(&self) -> Vec<String> {
        self.band_names.clone()
    }

    fn read_window(&mut self, window: &RasterWindow) -> Result<Vec<f64>, GeoConformalError> {
        self.check_window(window)?;
        let mut out = Vec::with_capacity(self.band_names.len() * window.n_pixels());
        for band in 0..self.band_names.len() {
            let plane = self.band(band);
            for row in 0..window.height {
                let start = (window.y_off + row) * self.width + window.x_off;
                out.extend_from_slice(&plane[start..start + window.width]);
            }
        }
        Ok(out)
    }
}

impl RasterSink for MemoryRaster {
    fn bands(&self) -> usize {
        self.band_names.len()
    }

    fn write_window(&mut self, window: &RasterWindow, data: &[f64]) -> Result<(), GeoConformalError> {
        self.check_window(window)?;
        let n_bands = self.band_names.len();
        if data.len() != n_bands * window.n_pixels() {
            return Err(GeoConformalError::MismatchedBands(format!(
                "window data of {} values for {} bands of {} pixels",
                data.len(),
                n_bands,
                window.n_pixels()
            )));
        }
        let plane_len = self.width * self.height;
        for band in 0..n_bands {
            for row in 0..window.height {
                let src = band * window.n_pixels() + row * window.width;
                let dst = band * plane_len + (window.y_off + row) * self.width + window.x_off;
                self.data[dst..dst + window.width]
                    .copy_from_slice(&data[src..src + window.width]);
            }
        }
        Ok(())
    }
}
