//! Reprojection through the external `gdalwarp` tool, used when an input
//! raster is not in the reference CRS.
use std::path::Path;
use std::process::Command;
use tracing::info;

use crate::core::raster::RasterGrid;
use crate::io::gdal::{GdalError, GdalReader, parse_epsg};

/// Compare two projections by EPSG code when both carry one, else textually.
/// An empty projection is treated as matching anything.
pub fn same_crs(a: &str, b: &str) -> bool {
    if a.trim().is_empty() || b.trim().is_empty() {
        return true;
    }
    match (parse_epsg(a), parse_epsg(b)) {
        (Some(x), Some(y)) => x.eq_ignore_ascii_case(&y),
        _ => a.trim() == b.trim(),
    }
}

/// Open `path` and, when its CRS differs from `target_crs`, reproject it with
/// nearest-neighbour resampling into a temporary GeoTIFF first.
pub fn open_in_crs(path: &Path, target_crs: &str) -> crate::Result<RasterGrid> {
    let reader = GdalReader::open(path)?;
    if same_crs(&reader.metadata.projection, target_crs) {
        return Ok(reader.read_grid()?);
    }
    drop(reader);

    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("raster");
    let tmp_file = tempfile::Builder::new()
        .prefix(&format!("{}_", stem))
        .suffix("_warped.tif")
        .tempfile()?;
    let tmp_out = tmp_file.path().to_path_buf();
    let t_srs = parse_epsg(target_crs).unwrap_or_else(|| target_crs.to_string());
    info!("Reprojecting {} to {} with gdalwarp", path.display(), t_srs);

    let status = Command::new("gdalwarp")
        .args(["-of", "GTiff", "-overwrite", "-r", "near", "-t_srs"])
        .arg(&t_srs)
        .arg(path)
        .arg(&tmp_out)
        .status()
        .map_err(|e| GdalError::Warp(format!("could not run gdalwarp: {}", e)))?;
    if !status.success() {
        return Err(GdalError::Warp(format!("exit status {} for {}", status, path.display())).into());
    }

    let grid = GdalReader::open(&tmp_out)?.read_grid()?;
    Ok(grid)
}
