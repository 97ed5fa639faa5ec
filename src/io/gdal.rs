use gdal::raster::GdalDataType;
use gdal::{Dataset, errors::GdalError as GdalCrateError};
use geo::MultiPolygon;
use ndarray::Array2;
use std::path::Path;
use thiserror::Error;
use tracing::debug;

use crate::core::processing::align::{boundary_window, clip_to_boundary};
use crate::core::raster::{GeoReference, GeoTransform, RasterGrid};
use crate::io::RasterSource;
use crate::types::PixelType;

/// Errors encountered when using the GDAL adapters
#[derive(Debug, Error)]
pub enum GdalError {
    #[error("GDAL error: {0}")]
    Gdal(#[from] GdalCrateError),
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),
    #[error("Dimension mismatch: expected {0}x{1}, got {2}x{3}")]
    DimensionMismatch(usize, usize, usize, usize),
    #[error("gdalwarp failed: {0}")]
    Warp(String),
}

/// Georeferencing and layout of an opened dataset
#[derive(Debug, Clone)]
pub struct GdalMetadata {
    /// Width (pixels) of the raster
    pub size_x: usize,
    /// Height (lines) of the raster
    pub size_y: usize,
    pub bands: usize,
    /// Affine geotransform coefficients ([origin_x, pixel_width, rot_x, origin_y, rot_y, pixel_height])
    pub geotransform: [f64; 6],
    /// Projection in WKT format
    pub projection: String,
    /// Nodata value of band 1
    pub nodata: Option<f64>,
    /// Storage type of band 1
    pub dtype: PixelType,
}

/// Reader for single-scene rasters (bands, elevation models, reference grids)
pub struct GdalReader {
    pub dataset: Dataset,
    pub metadata: GdalMetadata,
}

/// EPSG code from the last WKT authority tag, as `EPSG:XXXX`.
pub fn parse_epsg(wkt: &str) -> Option<String> {
    if wkt.starts_with("EPSG:") {
        return Some(wkt.to_string());
    }
    const KEY: &str = "AUTHORITY[\"EPSG\",\"";
    if let Some(idx) = wkt.rfind(KEY) {
        let start = idx + KEY.len();
        if let Some(end) = wkt[start..].find('"') {
            let code = &wkt[start..start + end];
            return Some(format!("EPSG:{}", code));
        }
    }
    None
}

fn pixel_type(dt: GdalDataType) -> PixelType {
    match dt {
        GdalDataType::UInt8 => PixelType::U8,
        GdalDataType::UInt16 => PixelType::U16,
        GdalDataType::Int16 => PixelType::I16,
        GdalDataType::UInt32 => PixelType::U32,
        GdalDataType::Int32 => PixelType::I32,
        GdalDataType::Float32 => PixelType::F32,
        _ => PixelType::F64,
    }
}

impl GdalReader {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, GdalError> {
        let dataset = Dataset::open(path.as_ref())?;
        let (size_x, size_y) = dataset.raster_size();
        let bands = dataset.raster_count() as usize;
        if bands == 0 {
            return Err(GdalError::UnsupportedFormat(format!(
                "No raster bands found in {}",
                path.as_ref().display()
            )));
        }
        let geotransform = match dataset.geo_transform() {
            Ok(gt) => gt,
            Err(_) => [0.0, 1.0, 0.0, 0.0, 0.0, 1.0],
        };
        let projection = dataset.projection();
        let first = dataset.rasterband(1)?;
        let nodata = first.no_data_value();
        let dtype = pixel_type(first.band_type());
        debug!(
            "Opened {}: {}x{} {} band(s), {}, nodata {:?}",
            path.as_ref().display(),
            size_x,
            size_y,
            bands,
            dtype,
            nodata
        );
        Ok(GdalReader {
            dataset,
            metadata: GdalMetadata {
                size_x: size_x as usize,
                size_y: size_y as usize,
                bands,
                geotransform,
                projection,
                nodata,
                dtype,
            },
        })
    }

    pub fn georeference(&self) -> GeoReference {
        GeoReference {
            transform: GeoTransform::from_gdal(self.metadata.geotransform),
            crs: self.metadata.projection.clone(),
            width: self.metadata.size_x,
            height: self.metadata.size_y,
            nodata: self.metadata.nodata,
            dtype: self.metadata.dtype,
        }
    }

    /// Read a single band (1-based index) as an f64 ndarray of shape (height, width)
    pub fn read_band(&self, index: usize) -> Result<Array2<f64>, GdalError> {
        self.read_window(index, 0, 0, self.metadata.size_y, self.metadata.size_x)
    }

    /// Read a `rows` x `cols` block of one band starting at (row_off, col_off).
    pub fn read_window(
        &self,
        index: usize,
        row_off: usize,
        col_off: usize,
        rows: usize,
        cols: usize,
    ) -> Result<Array2<f64>, GdalError> {
        if index == 0 || index > self.metadata.bands {
            return Err(GdalError::UnsupportedFormat(format!(
                "Band index {} out of range",
                index
            )));
        }
        if row_off + rows > self.metadata.size_y || col_off + cols > self.metadata.size_x {
            return Err(GdalError::DimensionMismatch(
                self.metadata.size_x,
                self.metadata.size_y,
                col_off + cols,
                row_off + rows,
            ));
        }
        let band = self.dataset.rasterband(index)?;
        let buf = band.read_as::<f64>(
            (col_off as isize, row_off as isize),
            (cols, rows),
            (cols, rows),
            None,
        )?;
        let data_vec = buf.data().to_vec();
        let len = data_vec.len();
        Array2::from_shape_vec((rows, cols), data_vec)
            .map_err(|_| GdalError::DimensionMismatch(cols, rows, len, 1))
    }

    /// First band plus georeferencing.
    pub fn read_grid(&self) -> Result<RasterGrid, GdalError> {
        let data = self.read_band(1)?;
        Ok(RasterGrid {
            data,
            georef: self.georeference(),
        })
    }
}

/// GDAL-backed raster collaborator.
#[derive(Debug, Clone, Copy, Default)]
pub struct GdalRasterSource;

impl RasterSource for GdalRasterSource {
    fn open(&self, path: &Path) -> crate::Result<RasterGrid> {
        Ok(GdalReader::open(path)?.read_grid()?)
    }

    fn georeference(&self, path: &Path) -> crate::Result<GeoReference> {
        Ok(GdalReader::open(path)?.georeference())
    }

    fn open_clipped(&self, path: &Path, boundary: &MultiPolygon<f64>) -> crate::Result<RasterGrid> {
        let reader = GdalReader::open(path)?;
        let georef = reader.georeference();
        let (row_off, col_off, rows, cols) =
            boundary_window(&georef, boundary).ok_or_else(|| {
                crate::Error::EmptyGeometry(format!(
                    "boundary does not overlap {}",
                    path.display()
                ))
            })?;
        debug!(
            "Reading window ({}, {}) {}x{} of {}",
            row_off,
            col_off,
            rows,
            cols,
            path.display()
        );
        let data = reader.read_window(1, row_off, col_off, rows, cols)?;
        let window = RasterGrid::new(
            data,
            GeoReference {
                transform: georef.transform.window(row_off, col_off),
                width: cols,
                height: rows,
                ..georef
            },
        )?;
        clip_to_boundary(&window, boundary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn epsg_from_wkt_uses_outer_authority() {
        let wkt = r#"PROJCS["WGS 84 / UTM zone 23S",GEOGCS["WGS 84",AUTHORITY["EPSG","4326"]],AUTHORITY["EPSG","32723"]]"#;
        assert_eq!(parse_epsg(wkt).as_deref(), Some("EPSG:32723"));
        assert_eq!(parse_epsg("EPSG:4326").as_deref(), Some("EPSG:4326"));
        assert_eq!(parse_epsg("LOCAL_CS[\"x\"]"), None);
    }
}
