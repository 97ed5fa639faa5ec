//! Stability, latent heat, and evapotranspiration products.
use ndarray::{Array2, ArrayView2, Zip};

use crate::core::processing::calibration::{AIR_DENSITY, AIR_SPECIFIC_HEAT, KARMAN};

pub const GRAVITY: f64 = 9.81;
/// Latent heat of vaporization (J/kg)
pub const LATENT_HEAT: f64 = 2.45e6;

/// Monin-Obukhov length `L = -(rho cp Ts u*^3) / (k g H)`
pub fn monin_obukhov_length(
    ts: &ArrayView2<f64>,
    u_astmap: &ArrayView2<f64>,
    h: &ArrayView2<f64>,
) -> Array2<f64> {
    Zip::from(ts).and(u_astmap).and(h).map_collect(|&t, &u, &hf| {
        -(AIR_DENSITY * AIR_SPECIFIC_HEAT * t * u.powi(3)) / (KARMAN * GRAVITY * hf)
    })
}

/// Stability correction at `height` for a single Monin-Obukhov length.
pub fn stability_correction(height: f64, l: f64) -> f64 {
    if l.is_nan() {
        f64::NAN
    } else if l < 0.0 {
        2.0 * ((1.0 + (1.0 - 16.0 * height / l).sqrt()) / 2.0).ln()
    } else if l > 0.0 {
        -5.0 * height / l
    } else {
        0.0
    }
}

pub fn stability_map(l: &ArrayView2<f64>, height: f64) -> Array2<f64> {
    l.mapv(|v| stability_correction(height, v))
}

/// Energy-balance residual `LET = Rn - G - H`
pub fn latent_heat_flux(
    rn: &ArrayView2<f64>,
    g: &ArrayView2<f64>,
    h: &ArrayView2<f64>,
) -> Array2<f64> {
    Zip::from(rn)
        .and(g)
        .and(h)
        .map_collect(|&r, &gf, &hf| r - gf - hf)
}

/// Hourly ET in mm/h, `max(0, 3600 LET / lambda)`. NaN stays NaN.
pub fn instantaneous_et(let_: &ArrayView2<f64>) -> Array2<f64> {
    let_.mapv(|v| {
        let et = 3600.0 * v / LATENT_HEAT;
        if et < 0.0 { 0.0 } else { et }
    })
}

/// `ETof = ETi / EToi`
pub fn reference_fraction(eti: &ArrayView2<f64>, eto_i: f64) -> Array2<f64> {
    eti.mapv(|v| v / eto_i)
}

/// `ETday = ETof * ETo`
pub fn daily_et(etof: &ArrayView2<f64>, eto: f64) -> Array2<f64> {
    etof.mapv(|v| v * eto)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    #[test]
    fn stability_branches() {
        assert_eq!(stability_correction(2.0, 0.0), 0.0);
        assert_relative_eq!(stability_correction(2.0, 50.0), -0.2, epsilon = 1e-12);
        let unstable = stability_correction(200.0, -100.0);
        assert_relative_eq!(unstable, 2.0 * ((1.0 + 33.0_f64.sqrt()) / 2.0).ln(), epsilon = 1e-12);
        assert!(stability_correction(2.0, f64::NAN).is_nan());
    }

    #[test]
    fn length_sign_follows_heat_flux() {
        let ts = array![[300.0, 300.0]];
        let u = array![[0.3, 0.3]];
        let h = array![[100.0, -20.0]];
        let l = monin_obukhov_length(&ts.view(), &u.view(), &h.view());
        assert!(l[[0, 0]] < 0.0);
        assert!(l[[0, 1]] > 0.0);
        let expected = -(1.25 * 1004.0 * 300.0 * 0.027) / (0.41 * 9.81 * 100.0);
        assert_relative_eq!(l[[0, 0]], expected, epsilon = 1e-9);
    }

    #[test]
    fn eti_never_negative() {
        let le = array![[-500.0, -1e-9, 0.0, 245.0, f64::NAN]];
        let eti = instantaneous_et(&le.view());
        assert_eq!(eti[[0, 0]], 0.0);
        assert_eq!(eti[[0, 1]], 0.0);
        assert_eq!(eti[[0, 2]], 0.0);
        assert_relative_eq!(eti[[0, 3]], 0.36, epsilon = 1e-12);
        assert!(eti[[0, 4]].is_nan());
    }

    #[test]
    fn daily_chain() {
        let rn = array![[600.0]];
        let g = array![[100.0]];
        let h = array![[255.0]];
        let le = latent_heat_flux(&rn.view(), &g.view(), &h.view());
        assert_eq!(le[[0, 0]], 245.0);
        let eti = instantaneous_et(&le.view());
        let etof = reference_fraction(&eti.view(), 0.72);
        assert_relative_eq!(etof[[0, 0]], 0.5, epsilon = 1e-12);
        let day = daily_et(&etof.view(), 6.0);
        assert_relative_eq!(day[[0, 0]], 3.0, epsilon = 1e-12);
    }
}
