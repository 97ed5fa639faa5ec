//! Wind profile, aerodynamic resistance, and the cold/hot anchor dT solver.
use ndarray::{Array2, ArrayView2, Zip};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::core::anchor::AnchorPixel;
use crate::core::raster::nan_median;
use crate::error::{Error, Result};
use crate::types::CalibrationStatus;

/// von Karman constant
pub const KARMAN: f64 = 0.41;
/// Air density (kg/m^3)
pub const AIR_DENSITY: f64 = 1.25;
/// Specific heat of air (J/kg/K)
pub const AIR_SPECIFIC_HEAT: f64 = 1004.0;
/// Blending height for the extrapolated wind speed (m)
pub const BLENDING_HEIGHT: f64 = 200.0;

/// Friction velocity and blending-height wind speed at the weather station.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct StationWind {
    pub roughness: f64,
    pub friction_velocity: f64,
    pub u_200m: f64,
}

/// `Zom = 0.123 h`, `u* = k u2 / ln(2 / Zom)`, `u200 = u* ln(200 / Zom) / k`
pub fn station_wind(u_2m: f64, canopy_height: f64) -> StationWind {
    let roughness = 0.123 * canopy_height;
    let friction_velocity = KARMAN * u_2m / (2.0 / roughness).ln();
    let u_200m = friction_velocity * (BLENDING_HEIGHT / roughness).ln() / KARMAN;
    StationWind {
        roughness,
        friction_velocity,
        u_200m,
    }
}

/// Momentum roughness length per pixel: `exp(-5.809 + 5.62 SAVI)`
pub fn roughness_map(savi: &ArrayView2<f64>) -> Array2<f64> {
    savi.mapv(|s| (-5.809 + 5.62 * s).exp())
}

/// `u* = k u200 / ln(200 / Z0)`
pub fn friction_velocity_map(u_200m: f64, z0map: &ArrayView2<f64>) -> Array2<f64> {
    z0map.mapv(|z0| KARMAN * u_200m / (BLENDING_HEIGHT / z0).ln())
}

/// Neutral aerodynamic resistance between 0.1 m and 2 m: `ln(2 / 0.1) / (u* k)`
pub fn aerodynamic_resistance(u_astmap: &ArrayView2<f64>) -> Array2<f64> {
    let z = (2.0_f64 / 0.1).ln();
    u_astmap.mapv(|u| z / (u * KARMAN))
}

/// Cold candidates: Ts where NDVI > 0.4 and Ts is below the scene median.
pub fn cold_candidates(ndvi: &ArrayView2<f64>, ts: &ArrayView2<f64>) -> Array2<f64> {
    let median = nan_median(ts);
    debug!("Median Ts for cold candidates: {:.3} K", median);
    Zip::from(ndvi)
        .and(ts)
        .map_collect(|&n, &t| if n > 0.4 && t < median { t } else { f64::NAN })
}

/// Hot candidates: Ts where 0.18 < SAVI < 0.3.
pub fn hot_candidates(savi: &ArrayView2<f64>, ts: &ArrayView2<f64>) -> Array2<f64> {
    Zip::from(savi)
        .and(ts)
        .map_collect(|&s, &t| if s > 0.18 && s < 0.3 { t } else { f64::NAN })
}

/// Values sampled at the anchors that drive the solver.
#[derive(Debug, Clone, Copy)]
pub struct CalibrationInputs {
    pub ts_cold: f64,
    pub ts_hot: f64,
    pub rn_hot: f64,
    pub g_hot: f64,
    /// (row, col) of the hot anchor
    pub hot: (usize, usize),
}

impl CalibrationInputs {
    pub fn from_anchors(
        cold: &AnchorPixel,
        hot: &AnchorPixel,
        rn: &ArrayView2<f64>,
        g: &ArrayView2<f64>,
    ) -> Self {
        Self {
            ts_cold: cold.temperature,
            ts_hot: hot.temperature,
            rn_hot: rn[[hot.row, hot.col]],
            g_hot: g[[hot.row, hot.col]],
            hot: (hot.row, hot.col),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CalibrationState {
    pub a: f64,
    pub b: f64,
    pub iteration: usize,
    pub delta: f64,
}

enum Step {
    Init,
    Iterating(CalibrationState),
    Done(CalibrationState, CalibrationStatus),
}

/// Final linear coefficients plus the dT and H rasters of the last iteration.
#[derive(Debug, Clone)]
pub struct Calibration {
    pub a: f64,
    pub b: f64,
    pub iterations: usize,
    pub status: CalibrationStatus,
    pub rah_hot: f64,
    pub dt: Array2<f64>,
    pub h: Array2<f64>,
}

/// Serializable summary for the run report.
#[derive(Debug, Clone, Serialize)]
pub struct CalibrationSummary {
    pub a: f64,
    pub b: f64,
    pub iterations: usize,
    pub status: CalibrationStatus,
    pub rah_hot: f64,
}

impl Calibration {
    pub fn summary(&self) -> CalibrationSummary {
        CalibrationSummary {
            a: self.a,
            b: self.b,
            iterations: self.iterations,
            status: self.status,
            rah_hot: self.rah_hot,
        }
    }
}

/// Solve `dT = a Ts + b` with the resistance map held fixed (neutral stability).
pub fn calibrate(
    inputs: &CalibrationInputs,
    ts: &ArrayView2<f64>,
    rah: &ArrayView2<f64>,
    max_iterations: usize,
    tolerance: f64,
) -> Result<Calibration> {
    calibrate_with(inputs, ts, rah, max_iterations, tolerance, |_, rah| {
        Ok(rah.to_owned())
    })
}

/// Iterate the anchor calibration. After every pass `refine` receives the new
/// H raster and the current resistance map and returns the map for the next pass.
/// Hitting `max_iterations` is not an error; the last dT/H are kept.
pub fn calibrate_with<F>(
    inputs: &CalibrationInputs,
    ts: &ArrayView2<f64>,
    rah: &ArrayView2<f64>,
    max_iterations: usize,
    tolerance: f64,
    mut refine: F,
) -> Result<Calibration>
where
    F: FnMut(&ArrayView2<f64>, &ArrayView2<f64>) -> Result<Array2<f64>>,
{
    let dts = inputs.ts_hot - inputs.ts_cold;
    if dts == 0.0 {
        return Err(Error::DegenerateAnchors { ts: inputs.ts_hot });
    }
    let rho_cp = AIR_DENSITY * AIR_SPECIFIC_HEAT;
    let (hr, hc) = inputs.hot;

    let mut rah_map = rah.to_owned();
    let mut rah_i = 0.0;
    let mut dt = Array2::<f64>::zeros(ts.raw_dim());
    let mut h = Array2::<f64>::zeros(ts.raw_dim());
    let mut step = Step::Init;

    let (state, status) = loop {
        step = match step {
            Step::Init => Step::Iterating(CalibrationState::default()),
            Step::Iterating(mut state) => {
                rah_i = rah_map[[hr, hc]];
                if !rah_i.is_finite() {
                    return Err(Error::Processing(format!(
                        "aerodynamic resistance at hot pixel ({}, {}) is not finite",
                        hr, hc
                    )));
                }
                state.a = ((inputs.rn_hot - inputs.g_hot) * rah_i) / (dts * rho_cp);
                state.b = -state.a * inputs.ts_cold;
                dt = ts.mapv(|t| state.a * t + state.b);
                h = Zip::from(&dt)
                    .and(&rah_map)
                    .map_collect(|&d, &r| rho_cp * d / r);

                rah_map = refine(&h.view(), &rah_map.view())?;
                let rah_next = rah_map[[hr, hc]];
                state.iteration += 1;
                state.delta = (rah_next - rah_i).abs();
                debug!(
                    "dT iteration {}: a={:.6} b={:.6} rah_hot={:.6} delta={:.3e}",
                    state.iteration, state.a, state.b, rah_next, state.delta
                );

                if state.delta <= tolerance {
                    Step::Done(state, CalibrationStatus::Converged)
                } else if state.iteration >= max_iterations {
                    Step::Done(state, CalibrationStatus::MaxIterationsReached)
                } else {
                    Step::Iterating(state)
                }
            }
            Step::Done(state, status) => break (state, status),
        };
    };

    match status {
        CalibrationStatus::Converged => info!(
            "Calibration converged after {} iteration(s): a={:.6}, b={:.6}",
            state.iteration, state.a, state.b
        ),
        CalibrationStatus::MaxIterationsReached => warn!(
            "Calibration stopped at the iteration cap ({}), last delta {:.3e}; using last dT/H",
            state.iteration, state.delta
        ),
    }

    Ok(Calibration {
        a: state.a,
        b: state.b,
        iterations: state.iteration,
        status,
        rah_hot: rah_i,
        dt,
        h,
    })
}
