//! Raster alignment: clip to an area-of-interest polygon, then resample onto a
//! reference grid with nearest-neighbour lookup.
//!
//! Both steps assume the source is already expressed in the reference CRS;
//! reprojection between coordinate systems happens before, in `io::warp`.
use geo::{BoundingRect, Contains, MultiPolygon, Point};
use ndarray::Array2;
use tracing::{debug, info};

use crate::core::raster::{GeoReference, RasterGrid};
use crate::error::{Error, Result};

/// Fill value for pixels that carry no data after clipping or resampling.
fn fill_value(georef: &GeoReference) -> f64 {
    georef.nodata.unwrap_or(f64::NAN)
}

/// Pixel window (row_off, col_off, rows, cols) covering the polygon bounds,
/// clamped to the grid. `None` when the bounds miss the grid entirely.
pub fn boundary_window(
    georef: &GeoReference,
    boundary: &MultiPolygon<f64>,
) -> Option<(usize, usize, usize, usize)> {
    let rect = boundary.bounding_rect()?;
    let (min, max) = (rect.min(), rect.max());
    let corners = [
        georef.transform.invert(min.x, min.y),
        georef.transform.invert(min.x, max.y),
        georef.transform.invert(max.x, min.y),
        georef.transform.invert(max.x, max.y),
    ];
    let fold = |f: fn(&(f64, f64)) -> f64| {
        corners.iter().map(f).fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
            (lo.min(v), hi.max(v))
        })
    };
    let (col_lo, col_hi) = fold(|c| c.0);
    let (row_lo, row_hi) = fold(|c| c.1);
    if !(col_lo.is_finite() && col_hi.is_finite() && row_lo.is_finite() && row_hi.is_finite()) {
        return None;
    }

    let clamp = |v: f64, n: usize| v.max(0.0).min(n as f64) as usize;
    let col_off = clamp(col_lo.floor(), georef.width);
    let col_end = clamp(col_hi.ceil(), georef.width);
    let row_off = clamp(row_lo.floor(), georef.height);
    let row_end = clamp(row_hi.ceil(), georef.height);
    if col_end <= col_off || row_end <= row_off {
        return None;
    }
    Some((row_off, col_off, row_end - row_off, col_end - col_off))
}

/// Crop `src` to the boundary's bounding window and blank every pixel whose
/// centre lies outside the polygons. The cropped extent becomes the new grid.
pub fn clip_to_boundary(src: &RasterGrid, boundary: &MultiPolygon<f64>) -> Result<RasterGrid> {
    let (row_off, col_off, rows, cols) = boundary_window(&src.georef, boundary).ok_or_else(|| {
        Error::EmptyGeometry(format!(
            "boundary does not overlap the {}x{} source raster",
            src.height(),
            src.width()
        ))
    })?;

    let transform = src.georef.transform.window(row_off, col_off);
    let fill = fill_value(&src.georef);
    let mut data = Array2::<f64>::from_elem((rows, cols), fill);
    let mut inside = 0usize;
    for ((r, c), out) in data.indexed_iter_mut() {
        let (x, y) = transform.pixel_center(r, c);
        if boundary.contains(&Point::new(x, y)) {
            *out = src.data[[row_off + r, col_off + c]];
            inside += 1;
        }
    }
    debug!(
        "Clipped window at ({}, {}) size {}x{}, {} pixels inside boundary",
        row_off, col_off, rows, cols, inside
    );

    let georef = GeoReference {
        transform,
        width: cols,
        height: rows,
        ..src.georef.clone()
    };
    RasterGrid::new(data, georef)
}

/// Nearest-neighbour resample of `src` onto `target`'s transform and size.
/// Destination pixels that fall outside the source are filled with nodata.
pub fn resample_nearest(src: &RasterGrid, target: &GeoReference) -> Result<RasterGrid> {
    let fill = fill_value(&src.georef);
    let mut data = Array2::<f64>::from_elem(target.shape(), fill);
    for ((r, c), out) in data.indexed_iter_mut() {
        let (x, y) = target.transform.pixel_center(r, c);
        let (sc, sr) = src.georef.transform.invert(x, y);
        if !(sc.is_finite() && sr.is_finite()) || sc < 0.0 || sr < 0.0 {
            continue;
        }
        let (sr, sc) = (sr.floor() as usize, sc.floor() as usize);
        if sr < src.height() && sc < src.width() {
            *out = src.data[[sr, sc]];
        }
    }

    let georef = GeoReference {
        transform: target.transform,
        crs: target.crs.clone(),
        width: target.width,
        height: target.height,
        nodata: src.georef.nodata,
        dtype: src.georef.dtype,
    };
    RasterGrid::new(data, georef)
}

/// Clip `src` to `boundary` and resample it onto `reference`. The result has the
/// reference transform/CRS/size and keeps the source nodata value and dtype.
pub fn align(
    src: &RasterGrid,
    reference: &GeoReference,
    boundary: &MultiPolygon<f64>,
) -> Result<RasterGrid> {
    let clipped = clip_to_boundary(src, boundary)?;
    let aligned = resample_nearest(&clipped, reference)?;
    info!(
        "Aligned raster onto reference grid {}x{}",
        aligned.height(),
        aligned.width()
    );
    Ok(aligned)
}
