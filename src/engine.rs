//! Remote Engine Collaborator
//!
//! Boundary to the remote earth-observation engine. The engine's lazy
//! server-side computation graph is replaced by a synchronous
//! "query -> materialized table/raster" contract: the core asks for a table
//! of labeled probability samples or a downloaded raster region and never
//! builds or optimizes a computation graph itself.
//!
//! Calls are blocking network round trips and may be slow or fail; errors
//! are surfaced once, unmodified, with no retry policy in this crate.
use crate::data::Sample;
use crate::errors::GeoConformalError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Geographic bounding box in the query's coordinate reference system:
/// (min x, min y, max x, max y).
pub type Bounds = [f64; 4];

/// A declarative request for labeled per-sample probability vectors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableQuery {
    /// Identifier of the server-side collection to sample.
    pub asset: String,
    /// Optional spatial filter.
    pub bounds: Option<Bounds>,
    /// Optional ISO-8601 date filter, inclusive start.
    pub start_date: Option<String>,
    /// Optional ISO-8601 date filter, exclusive end.
    pub end_date: Option<String>,
    /// Properties to materialize: the probability bands plus the label.
    pub properties: Vec<String>,
}

/// A declarative request for a raster download.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RasterExport {
    /// Identifier of the server-side image.
    pub asset: String,
    /// Region to export.
    pub bounds: Bounds,
    /// Pixel size in the units of `crs`.
    pub scale: f64,
    /// Coordinate reference system, e.g. "EPSG:4326".
    pub crs: String,
}

/// The remote geospatial-computation collaborator.
///
/// Implementations wrap whatever client library talks to the service and
/// map its failures into [`GeoConformalError::Collaborator`].
pub trait GeoEngine {
    /// Materialize a table of labeled probability samples.
    fn sample_table(&self, query: &TableQuery) -> Result<Vec<Sample>, GeoConformalError>;

    /// Download a raster region at the given scale and CRS, returning the
    /// local file path.
    fn export_raster(&self, export: &RasterExport) -> Result<PathBuf, GeoConformalError>;
}
