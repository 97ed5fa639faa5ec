//! Cold/hot anchor pixels: the external input seam of the pipeline.
//!
//! The pipeline asks an [`AnchorProvider`] for "easting, northing" text once the
//! candidate mask for that anchor exists. Providers may be interactive (the CLI
//! prompt), fixed values from configuration, or [`AutoAnchors`]. Returning
//! `Ok(None)` means the request was declined and the run stops gracefully.
use ndarray::ArrayView2;
use serde::Serialize;

use crate::core::raster::GeoReference;
use crate::error::{Error, Result};
use crate::types::AnchorKind;

/// A resolved calibration anchor.
#[derive(Debug, Clone, Serialize)]
pub struct AnchorPixel {
    pub kind: AnchorKind,
    pub row: usize,
    pub col: usize,
    /// Surface temperature at the pixel (K)
    pub temperature: f64,
    /// Coordinate text as supplied
    pub raw: String,
}

/// What the pipeline hands to a provider when it needs an anchor.
pub struct AnchorRequest<'a> {
    pub kind: AnchorKind,
    pub georef: &'a GeoReference,
    /// Candidate mask (`Pcold` or `Phot`): Ts where the pixel qualifies, NaN elsewhere
    pub candidates: ArrayView2<'a, f64>,
}

pub trait AnchorProvider {
    fn request(&mut self, req: &AnchorRequest<'_>) -> Result<Option<String>>;
}

impl<F> AnchorProvider for F
where
    F: FnMut(&AnchorRequest<'_>) -> Result<Option<String>>,
{
    fn request(&mut self, req: &AnchorRequest<'_>) -> Result<Option<String>> {
        self(req)
    }
}

/// Coordinates known before the run starts; a missing entry acts as a decline.
#[derive(Debug, Clone, Default)]
pub struct FixedAnchors {
    pub cold: Option<String>,
    pub hot: Option<String>,
}

impl FixedAnchors {
    pub fn new(cold: impl Into<String>, hot: impl Into<String>) -> Self {
        Self {
            cold: Some(cold.into()),
            hot: Some(hot.into()),
        }
    }
}

impl AnchorProvider for FixedAnchors {
    fn request(&mut self, req: &AnchorRequest<'_>) -> Result<Option<String>> {
        Ok(match req.kind {
            AnchorKind::Cold => self.cold.clone(),
            AnchorKind::Hot => self.hot.clone(),
        })
    }
}

/// Picks the coldest `Pcold` candidate and the hottest `Phot` candidate.
#[derive(Debug, Clone, Copy, Default)]
pub struct AutoAnchors;

impl AnchorProvider for AutoAnchors {
    fn request(&mut self, req: &AnchorRequest<'_>) -> Result<Option<String>> {
        let mut best: Option<((usize, usize), f64)> = None;
        for ((row, col), &t) in req.candidates.indexed_iter() {
            if !t.is_finite() {
                continue;
            }
            let better = match (best, req.kind) {
                (None, _) => true,
                (Some((_, b)), AnchorKind::Cold) => t < b,
                (Some((_, b)), AnchorKind::Hot) => t > b,
            };
            if better {
                best = Some(((row, col), t));
            }
        }
        let ((row, col), _) = best.ok_or_else(|| {
            Error::Processing(format!("no {} anchor candidates in the scene", req.kind))
        })?;
        let (x, y) = req.georef.transform.pixel_center(row, col);
        Ok(Some(format!("{}, {}", x, y)))
    }
}

/// Parse "easting, northing"; any other count of numbers is malformed.
pub fn parse_coordinates(kind: AnchorKind, input: &str) -> Result<(f64, f64)> {
    let malformed = || Error::MalformedCoordinates {
        kind,
        input: input.to_string(),
    };
    let parts: Vec<&str> = input.trim().split(',').collect();
    if parts.len() != 2 {
        return Err(malformed());
    }
    let x: f64 = parts[0].trim().parse().map_err(|_| malformed())?;
    let y: f64 = parts[1].trim().parse().map_err(|_| malformed())?;
    if !x.is_finite() || !y.is_finite() {
        return Err(malformed());
    }
    Ok((x, y))
}

/// Resolve coordinate text against the grid and sample Ts there.
pub fn resolve_anchor(
    kind: AnchorKind,
    input: &str,
    georef: &GeoReference,
    ts: &ArrayView2<f64>,
) -> Result<AnchorPixel> {
    let (x, y) = parse_coordinates(kind, input)?;
    let (row, col) = georef.locate(x, y).ok_or(Error::OutOfBounds { kind, x, y })?;
    Ok(AnchorPixel {
        kind,
        row,
        col,
        temperature: ts[[row, col]],
        raw: input.trim().to_string(),
    })
}

/// Ask the provider, mapping a decline to `UserCancelled`.
pub fn acquire_anchor(
    provider: &mut dyn AnchorProvider,
    req: &AnchorRequest<'_>,
    ts: &ArrayView2<f64>,
) -> Result<AnchorPixel> {
    let text = provider
        .request(req)?
        .ok_or_else(|| Error::UserCancelled {
            stage: format!("{} pixel selection", req.kind),
        })?;
    resolve_anchor(req.kind, &text, req.georef, ts)
}
