//! I/O layer: scene metadata, GDAL/OGR-backed raster and boundary readers,
//! Landsat-8 band loading, reprojection, and the GeoTIFF product writers.
use std::path::Path;

use geo::MultiPolygon;

use crate::core::processing::align::clip_to_boundary;
use crate::core::raster::{GeoReference, RasterGrid};

pub mod mtl;
pub use mtl::{MtlError, SceneMetadata};

pub mod gdal;
pub use self::gdal::{GdalError, GdalMetadata, GdalRasterSource, GdalReader};

pub mod boundary;
pub use boundary::OgrBoundarySource;

pub mod landsat8;
pub use landsat8::BandLoader;

pub mod warp;

pub mod writers;

/// Raster reading collaborator: opens the first band of a file with its georeferencing.
pub trait RasterSource {
    fn open(&self, path: &Path) -> crate::Result<RasterGrid>;

    /// Georeferencing only; the default reads the data too.
    fn georeference(&self, path: &Path) -> crate::Result<GeoReference> {
        Ok(self.open(path)?.georef)
    }

    /// First band clipped to `boundary`. Sources that can read a pixel window
    /// should override this to skip the data outside the polygon bounds.
    fn open_clipped(&self, path: &Path, boundary: &MultiPolygon<f64>) -> crate::Result<RasterGrid> {
        clip_to_boundary(&self.open(path)?, boundary)
    }
}

/// Vector boundary collaborator: every polygon in the file, merged.
pub trait BoundarySource {
    fn read(&self, path: &Path) -> crate::Result<MultiPolygon<f64>>;
}
