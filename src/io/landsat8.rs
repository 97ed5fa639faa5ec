//! Landsat-8 band discovery, clipping, and TOA reflectance conversion.
use geo::MultiPolygon;
use ndarray::{Array2, ArrayView2};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::core::raster::{BandSet, RasterGrid};
use crate::error::{Error, Result};
use crate::io::RasterSource;
use crate::io::mtl::SceneMetadata;
use crate::types::PixelType;

/// Thermal band kept as raw digital numbers.
pub const THERMAL_BAND: u8 = 10;

/// Bands the SEBAL chain consumes.
pub fn is_supported_band(band: u8) -> bool {
    (1..=7).contains(&band) || band == THERMAL_BAND
}

/// Band number from the first `_B<digits>` token in a file name.
pub fn band_number(file_name: &str) -> Option<u8> {
    file_name.match_indices("_B").find_map(|(idx, _)| {
        let digits: String = file_name[idx + 2..]
            .chars()
            .take_while(|c| c.is_ascii_digit())
            .collect();
        if digits.is_empty() {
            None
        } else {
            digits.parse().ok()
        }
    })
}

fn is_tiff(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("tif"))
        .unwrap_or(false)
}

/// `.tif` files in `dir` that carry a band token, sorted by band number.
pub fn discover_bands(dir: &Path) -> Result<Vec<(u8, PathBuf)>> {
    let mut found = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if !path.is_file() || !is_tiff(&path) {
            continue;
        }
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default();
        match band_number(name) {
            Some(band) => found.push((band, path)),
            None => warn!("No band number in {}; skipping", name),
        }
    }
    found.sort();
    Ok(found)
}

/// `(mult * DN + add) / sin(sun_elevation)`
pub fn toa_reflectance(
    dn: &ArrayView2<f64>,
    mult: f64,
    add: f64,
    sun_elevation_deg: f64,
) -> Array2<f64> {
    let sin_e = sun_elevation_deg.to_radians().sin();
    dn.mapv(|v| (mult * v + add) / sin_e)
}

pub struct BandLoader<'a, S: RasterSource + ?Sized> {
    source: &'a S,
    meta: &'a SceneMetadata,
}

impl<'a, S: RasterSource + ?Sized> BandLoader<'a, S> {
    pub fn new(source: &'a S, meta: &'a SceneMetadata) -> Self {
        Self { source, meta }
    }

    /// Load every recognised band in `dir`, clipped to `boundary`. A band that
    /// cannot be read, clipped or calibrated is skipped with a warning; only an
    /// unreadable directory or a missing sun elevation fails the load.
    pub fn load(&self, dir: &Path, boundary: &MultiPolygon<f64>) -> Result<BandSet> {
        let sun_elevation = self.meta.sun_elevation()?;
        let mut set = BandSet::new();
        for (band, path) in discover_bands(dir)? {
            if !is_supported_band(band) {
                debug!("Band {} is not used; skipping {}", band, path.display());
                continue;
            }
            match self.load_band(band, &path, boundary, sun_elevation) {
                Ok(grid) => {
                    if set.contains(band) {
                        warn!("Band {} found twice; keeping {}", band, path.display());
                    }
                    set.insert(band, grid);
                }
                Err(e) => warn!("Band {} skipped ({}): {}", band, path.display(), e),
            }
        }
        info!("Loaded bands {:?}", set.band_numbers());
        Ok(set)
    }

    fn load_band(
        &self,
        band: u8,
        path: &Path,
        boundary: &MultiPolygon<f64>,
        sun_elevation: f64,
    ) -> Result<RasterGrid> {
        let coefficients = if band == THERMAL_BAND {
            None
        } else {
            Some(
                self.meta
                    .reflectance_coefficients(band)
                    .ok_or(Error::MissingCalibrationKeys { band })?,
            )
        };

        let clipped = self.source.open_clipped(path, boundary)?;
        let dn = clipped.masked();
        let data = match coefficients {
            Some((mult, add)) => toa_reflectance(&dn.view(), mult, add, sun_elevation),
            None => dn,
        };
        debug!(
            "Band {}: {}x{} working grid",
            band,
            clipped.height(),
            clipped.width()
        );
        RasterGrid::new(data, clipped.georef.derived(PixelType::F64))
    }
}
