//! In-memory raster model: affine `GeoTransform`, the `GeoReference` record
//! shared by every layer of a run, and `RasterGrid` (data + georeference).
use std::collections::BTreeMap;

use ndarray::{Array2, ArrayView2};

use crate::error::{Error, Result};
use crate::types::PixelType;

/// Affine geotransform in GDAL coefficient order
/// `[origin_x, pixel_width, row_rotation, origin_y, col_rotation, pixel_height]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoTransform {
    pub origin_x: f64,
    pub pixel_width: f64,
    pub row_rotation: f64,
    pub origin_y: f64,
    pub col_rotation: f64,
    pub pixel_height: f64,
}

impl GeoTransform {
    /// North-up transform without rotation terms.
    pub fn north_up(origin_x: f64, origin_y: f64, pixel_width: f64, pixel_height: f64) -> Self {
        Self {
            origin_x,
            pixel_width,
            row_rotation: 0.0,
            origin_y,
            col_rotation: 0.0,
            pixel_height,
        }
    }

    pub fn from_gdal(gt: [f64; 6]) -> Self {
        Self {
            origin_x: gt[0],
            pixel_width: gt[1],
            row_rotation: gt[2],
            origin_y: gt[3],
            col_rotation: gt[4],
            pixel_height: gt[5],
        }
    }

    pub fn to_gdal(&self) -> [f64; 6] {
        [
            self.origin_x,
            self.pixel_width,
            self.row_rotation,
            self.origin_y,
            self.col_rotation,
            self.pixel_height,
        ]
    }

    /// Map coordinates of the centre of pixel (row, col).
    pub fn pixel_center(&self, row: usize, col: usize) -> (f64, f64) {
        self.apply(col as f64 + 0.5, row as f64 + 0.5)
    }

    /// Forward transform of fractional pixel coordinates.
    pub fn apply(&self, col: f64, row: f64) -> (f64, f64) {
        let x = self.origin_x + col * self.pixel_width + row * self.row_rotation;
        let y = self.origin_y + col * self.col_rotation + row * self.pixel_height;
        (x, y)
    }

    /// Inverse transform to fractional (col, row). NaN for a degenerate transform.
    pub fn invert(&self, x: f64, y: f64) -> (f64, f64) {
        let det = self.pixel_width * self.pixel_height - self.row_rotation * self.col_rotation;
        if det.abs() < 1e-12 {
            return (f64::NAN, f64::NAN);
        }
        let dx = x - self.origin_x;
        let dy = y - self.origin_y;
        let col = (self.pixel_height * dx - self.row_rotation * dy) / det;
        let row = (-self.col_rotation * dx + self.pixel_width * dy) / det;
        (col, row)
    }

    /// Integer (row, col) containing map point (x, y); may be negative or past
    /// the edge. `None` when the transform cannot be inverted.
    pub fn index(&self, x: f64, y: f64) -> Option<(i64, i64)> {
        let (col, row) = self.invert(x, y);
        if !(col.is_finite() && row.is_finite()) {
            return None;
        }
        Some((row.floor() as i64, col.floor() as i64))
    }

    /// Transform of a sub-window whose top-left pixel is (row_off, col_off).
    pub fn window(&self, row_off: usize, col_off: usize) -> Self {
        let (x, y) = self.apply(col_off as f64, row_off as f64);
        Self {
            origin_x: x,
            origin_y: y,
            ..*self
        }
    }
}

impl Default for GeoTransform {
    fn default() -> Self {
        Self::from_gdal([0.0, 1.0, 0.0, 0.0, 0.0, 1.0])
    }
}

/// Georeferencing record shared by every layer aligned to the same grid.
#[derive(Debug, Clone, PartialEq)]
pub struct GeoReference {
    pub transform: GeoTransform,
    /// Projection as WKT or `EPSG:XXXX`; empty when unknown
    pub crs: String,
    pub width: usize,
    pub height: usize,
    pub nodata: Option<f64>,
    pub dtype: PixelType,
}

impl GeoReference {
    /// Same transform/CRS/size, with another storage type and NaN nodata for float layers.
    pub fn derived(&self, dtype: PixelType) -> Self {
        let nodata = match dtype {
            PixelType::F32 | PixelType::F64 => Some(f64::NAN),
            _ => self.nodata,
        };
        Self {
            nodata,
            dtype,
            ..self.clone()
        }
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.height, self.width)
    }

    /// Resolve a map coordinate to an in-grid (row, col).
    pub fn locate(&self, x: f64, y: f64) -> Option<(usize, usize)> {
        let (row, col) = self.transform.index(x, y)?;
        if row < 0 || col < 0 || row as usize >= self.height || col as usize >= self.width {
            return None;
        }
        Some((row as usize, col as usize))
    }

    /// Fails with `GridMismatch` unless `data` has this grid's shape.
    pub fn ensure_shape(&self, what: &str, data: &ArrayView2<f64>) -> Result<()> {
        let (rows, cols) = data.dim();
        if (rows, cols) != self.shape() {
            return Err(Error::GridMismatch {
                what: what.to_string(),
                expected_rows: self.height,
                expected_cols: self.width,
                rows,
                cols,
            });
        }
        Ok(())
    }
}

/// A 2-D raster with its georeferencing.
#[derive(Debug, Clone)]
pub struct RasterGrid {
    pub data: Array2<f64>,
    pub georef: GeoReference,
}

impl RasterGrid {
    pub fn new(data: Array2<f64>, georef: GeoReference) -> Result<Self> {
        georef.ensure_shape("raster", &data.view())?;
        Ok(Self { data, georef })
    }

    pub fn width(&self) -> usize {
        self.georef.width
    }

    pub fn height(&self) -> usize {
        self.georef.height
    }

    /// Copy of the data with nodata pixels replaced by NaN.
    pub fn masked(&self) -> Array2<f64> {
        match self.georef.nodata {
            Some(nd) if !nd.is_nan() => self.data.mapv(|v| if v == nd { f64::NAN } else { v }),
            _ => self.data.clone(),
        }
    }

    /// True when both grids share transform, CRS and size.
    pub fn same_grid(&self, other: &GeoReference) -> bool {
        self.georef.transform == other.transform
            && self.georef.crs == other.crs
            && self.georef.shape() == other.shape()
    }
}

/// Loaded Landsat bands keyed by band number (1-7, 10).
#[derive(Debug, Clone, Default)]
pub struct BandSet {
    bands: BTreeMap<u8, RasterGrid>,
}

impl BandSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, band: u8, grid: RasterGrid) {
        self.bands.insert(band, grid);
    }

    pub fn get(&self, band: u8) -> Option<&RasterGrid> {
        self.bands.get(&band)
    }

    /// Like [`get`](Self::get) but fails with `MissingBand`.
    pub fn require(&self, band: u8) -> Result<&RasterGrid> {
        self.get(band).ok_or(Error::MissingBand { band })
    }

    pub fn contains(&self, band: u8) -> bool {
        self.bands.contains_key(&band)
    }

    pub fn band_numbers(&self) -> Vec<u8> {
        self.bands.keys().copied().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u8, &RasterGrid)> {
        self.bands.iter().map(|(b, g)| (*b, g))
    }

    pub fn len(&self) -> usize {
        self.bands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bands.is_empty()
    }

    /// Working grid of the loaded bands, taken from the lowest band number.
    pub fn working_grid(&self) -> Option<&GeoReference> {
        self.bands.values().next().map(|g| &g.georef)
    }
}

/// Median over finite values; NaN when none are finite.
pub fn nan_median(data: &ArrayView2<f64>) -> f64 {
    let mut values: Vec<f64> = data.iter().copied().filter(|v| v.is_finite()).collect();
    if values.is_empty() {
        return f64::NAN;
    }
    values.sort_by(|a, b| a.total_cmp(b));
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    }
}

/// Mean over finite values; NaN when none are finite.
pub fn nan_mean(data: &ArrayView2<f64>) -> f64 {
    let (sum, n) = data
        .iter()
        .filter(|v| v.is_finite())
        .fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    if n == 0 { f64::NAN } else { sum / n as f64 }
}
