//! Vegetation indices and surface emissivity from TOA reflectance.
use ndarray::{Array2, ArrayView2, Zip};

/// Guards the NDVI denominator on dark or water pixels
pub const NDVI_EPSILON: f64 = 1e-10;
/// SAVI soil brightness correction
pub const SAVI_L: f64 = 0.5;

/// Narrow-band emissivity where the pixel is not vegetated (water, bare)
pub const ENB_FALLBACK: f64 = 0.99;
/// Broad-band emissivity where the pixel is not vegetated
pub const E0_FALLBACK: f64 = 0.985;

/// `clip((NIR - RED) / (NIR + RED + 1e-10), -1, 1)`
pub fn ndvi(nir: &ArrayView2<f64>, red: &ArrayView2<f64>) -> Array2<f64> {
    Zip::from(nir)
        .and(red)
        .map_collect(|&n, &r| clamp_unit((n - r) / (n + r + NDVI_EPSILON)))
}

/// `clip(((NIR - RED) / (NIR + RED + L)) * (1 + L), -1, 1)` with L = 0.5
pub fn savi(nir: &ArrayView2<f64>, red: &ArrayView2<f64>) -> Array2<f64> {
    Zip::from(nir)
        .and(red)
        .map_collect(|&n, &r| clamp_unit(((n - r) / (n + r + SAVI_L)) * (1.0 + SAVI_L)))
}

// NaN passes through like numpy's clip
fn clamp_unit(v: f64) -> f64 {
    if v.is_nan() { v } else { v.clamp(-1.0, 1.0) }
}

/// Floor of the LAI range; the log branch evaluates to 0 at SAVI = 0.1
pub const LAI_MIN: f64 = 0.00001;
pub const LAI_MAX: f64 = 6.0;

/// Leaf area index from SAVI, piecewise:
/// `0.00001` below 0.1, `-ln((0.69 - SAVI) / 0.59) / 0.91` up to 0.687, `6` above.
pub fn calculate_lai(savi: f64) -> f64 {
    if savi.is_nan() {
        f64::NAN
    } else if savi < 0.1 {
        LAI_MIN
    } else if savi < 0.687 {
        (-((0.69 - savi) / 0.59).ln() / 0.91).max(LAI_MIN)
    } else {
        LAI_MAX
    }
}

pub fn lai(savi: &ArrayView2<f64>) -> Array2<f64> {
    savi.mapv(calculate_lai)
}

/// Emissivity branch selection shared by eNB and e0:
/// vegetated pixels with LAI < 3, dense canopy (LAI >= 3), and the fallback.
fn emissivity(lai: f64, ndvi: f64, slope: f64, base: f64, fallback: f64) -> f64 {
    if ndvi > 0.0 && lai < 3.0 {
        base + slope * lai
    } else if ndvi > 0.0 && lai >= 3.0 {
        0.98
    } else {
        fallback
    }
}

/// Narrow-band emissivity `eNBf`: `0.97 + 0.0033 LAI`, `0.98`, or 0.99.
pub fn narrow_band_emissivity(lai: &ArrayView2<f64>, ndvi: &ArrayView2<f64>) -> Array2<f64> {
    Zip::from(lai)
        .and(ndvi)
        .map_collect(|&l, &n| emissivity(l, n, 0.0033, 0.97, ENB_FALLBACK))
}

/// Broad-band emissivity `e0f`: `0.95 + 0.01 LAI`, `0.98`, or 0.985.
pub fn broad_band_emissivity(lai: &ArrayView2<f64>, ndvi: &ArrayView2<f64>) -> Array2<f64> {
    Zip::from(lai)
        .and(ndvi)
        .map_collect(|&l, &n| emissivity(l, n, 0.01, 0.95, E0_FALLBACK))
}
