//! Surface temperature, albedo, and the radiation balance (Rn, G).
use ndarray::{Array2, ArrayView2, Zip};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::io::mtl::SceneMetadata;

pub const STEFAN_BOLTZMANN: f64 = 5.67e-8;
pub const SOLAR_CONSTANT: f64 = 1367.0;

/// Band-10 calibration constants needed for brightness temperature.
#[derive(Debug, Clone, Copy)]
pub struct ThermalConstants {
    pub radiance_mult: f64,
    pub radiance_add: f64,
    pub k1: f64,
    pub k2: f64,
}

impl ThermalConstants {
    pub fn from_metadata(meta: &SceneMetadata) -> Result<Self> {
        Ok(Self {
            radiance_mult: meta.get_f64("RADIANCE_MULT_BAND_10")?,
            radiance_add: meta.get_f64("RADIANCE_ADD_BAND_10")?,
            k1: meta.get_f64("K1_CONSTANT_BAND_10")?,
            k2: meta.get_f64("K2_CONSTANT_BAND_10")?,
        })
    }
}

/// `Tb = K2 / ln(K1 / L + 1)` with `L = ML * DN + AL`.
pub fn brightness_temperature(band10: &ArrayView2<f64>, c: &ThermalConstants) -> Array2<f64> {
    band10.mapv(|dn| {
        let radiance = c.radiance_mult * dn + c.radiance_add;
        c.k2 / (c.k1 / radiance + 1.0).ln()
    })
}

/// `Ts = Tb / (1 + (10.8 Tb / 14380) ln(eNBf))`
pub fn surface_temperature(tb: &ArrayView2<f64>, enbf: &ArrayView2<f64>) -> Array2<f64> {
    Zip::from(tb)
        .and(enbf)
        .map_collect(|&t, &e| t / (1.0 + (10.8 * t / 14380.0) * e.ln()))
}

/// Per-band weights `ESUN_i / sum(ESUN)` for bands 1-7. A band missing either
/// maximum key gets weight 0.
pub fn esun_weights(meta: &SceneMetadata) -> Result<[f64; 7]> {
    let d = meta.earth_sun_distance()?;
    let mut esun = [0.0; 7];
    for (i, slot) in esun.iter_mut().enumerate() {
        let band = (i + 1) as u8;
        match (
            meta.band_f64("RADIANCE_MAXIMUM_BAND", band),
            meta.band_f64("REFLECTANCE_MAXIMUM_BAND", band),
        ) {
            (Some(rad_max), Some(ref_max)) => {
                *slot = std::f64::consts::PI * d * d * (rad_max / ref_max);
            }
            _ => warn!(
                "Missing radiance or reflectance maximum for band {}; weight set to 0",
                band
            ),
        }
    }
    let total: f64 = esun.iter().sum();
    if total == 0.0 || !total.is_finite() {
        return Err(Error::MissingMetadataKey(
            "RADIANCE_MAXIMUM_BAND_n / REFLECTANCE_MAXIMUM_BAND_n".into(),
        ));
    }
    let weights = esun.map(|e| e / total);
    debug!("ESUN weights: {:?}", weights);
    Ok(weights)
}

/// Weighted sum of bands 1-7. Absent bands contribute nothing.
pub fn albedo_toa(
    bands: &[Option<ArrayView2<f64>>; 7],
    weights: &[f64; 7],
    shape: (usize, usize),
) -> Array2<f64> {
    let mut acc = Array2::<f64>::zeros(shape);
    for (i, (band, &w)) in bands.iter().zip(weights).enumerate() {
        match band {
            Some(b) => Zip::from(&mut acc).and(b).for_each(|a, &v| *a += w * v),
            None => warn!("Band {} absent; excluded from aTOA", i + 1),
        }
    }
    acc
}

/// Atmospheric transmissivity `Tsw = 0.75 + 2e-5 * elevation`
pub fn transmissivity(elevation: &ArrayView2<f64>) -> Array2<f64> {
    elevation.mapv(|z| 0.75 + 0.00002 * z)
}

/// Surface albedo `aS = (aTOA - 0.03) / Tsw^2`
pub fn surface_albedo(a_toa: &ArrayView2<f64>, tsw: &ArrayView2<f64>) -> Array2<f64> {
    Zip::from(a_toa)
        .and(tsw)
        .map_collect(|&a, &t| (a - 0.03) / (t * t))
}

/// `Rsi = 1367 cos(pi/2 - sun_elevation) (1 / d^2) Tsw`
pub fn incoming_shortwave(
    tsw: &ArrayView2<f64>,
    sun_elevation_deg: f64,
    earth_sun_distance: f64,
) -> Array2<f64> {
    let zenith = (90.0 - sun_elevation_deg).to_radians();
    let factor = SOLAR_CONSTANT * zenith.cos() / (earth_sun_distance * earth_sun_distance);
    tsw.mapv(|t| factor * t)
}

/// `RLo = e0f * sigma * Ts^4`
pub fn outgoing_longwave(e0f: &ArrayView2<f64>, ts: &ArrayView2<f64>) -> Array2<f64> {
    Zip::from(e0f)
        .and(ts)
        .map_collect(|&e, &t| e * STEFAN_BOLTZMANN * t.powi(4))
}

/// Scene-wide incoming longwave evaluated at the cold anchor:
/// `0.85 (-ln Tsw_cold)^0.09 sigma Ts_cold^4`
pub fn incoming_longwave(tsw_cold: f64, ts_cold: f64) -> f64 {
    0.85 * (-tsw_cold.ln()).powf(0.09) * STEFAN_BOLTZMANN * ts_cold.powi(4)
}

/// `Rn = (1 - aS) Rsi + RLi - RLo - (1 - e0f) RLi`
pub fn net_radiation(
    a_s: &ArrayView2<f64>,
    rsi: &ArrayView2<f64>,
    rli: &ArrayView2<f64>,
    rlo: &ArrayView2<f64>,
    e0f: &ArrayView2<f64>,
) -> Array2<f64> {
    Zip::from(a_s)
        .and(rsi)
        .and(rli)
        .and(rlo)
        .and(e0f)
        .map_collect(|&a, &si, &li, &lo, &e| (1.0 - a) * si + li - lo - (1.0 - e) * li)
}

/// `G/Rn`: 0.5 over water (NDVI < 0), else the Bastiaanssen soil-heat ratio.
pub fn soil_heat_ratio(ts: f64, a_s: f64, ndvi: f64) -> f64 {
    if ndvi < 0.0 {
        0.5
    } else {
        ((ts - 273.15) / a_s) * (0.0038 * a_s + 0.0074 * a_s * a_s) * (1.0 - 0.98 * ndvi.powi(4))
    }
}

/// `G = (G/Rn) * Rn`
pub fn soil_heat_flux(
    ts: &ArrayView2<f64>,
    a_s: &ArrayView2<f64>,
    ndvi: &ArrayView2<f64>,
    rn: &ArrayView2<f64>,
) -> Array2<f64> {
    Zip::from(ts)
        .and(a_s)
        .and(ndvi)
        .and(rn)
        .map_collect(|&t, &a, &n, &r| soil_heat_ratio(t, a, n) * r)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    fn meta(text: &str) -> SceneMetadata {
        SceneMetadata::parse_text(text)
    }

    #[test]
    fn brightness_and_surface_temperature() {
        let c = ThermalConstants {
            radiance_mult: 3.342e-4,
            radiance_add: 0.1,
            k1: 774.8853,
            k2: 1321.0789,
        };
        let dn = array![[30000.0]];
        let tb = brightness_temperature(&dn.view(), &c);
        let radiance: f64 = 3.342e-4 * 30000.0 + 0.1;
        let expected = 1321.0789 / (774.8853 / radiance + 1.0).ln();
        assert_relative_eq!(tb[[0, 0]], expected, epsilon = 1e-9);

        let e = array![[0.98]];
        let ts = surface_temperature(&tb.view(), &e.view());
        let t = expected;
        assert_relative_eq!(
            ts[[0, 0]],
            t / (1.0 + (10.8 * t / 14380.0) * 0.98_f64.ln()),
            epsilon = 1e-9
        );
        assert!(ts[[0, 0]] > t);
    }

    #[test]
    fn esun_weights_sum_to_one_and_zero_missing_band() {
        let mut text = String::from("EARTH_SUN_DISTANCE = 1.0\n");
        for b in 1..=7 {
            if b == 6 {
                continue;
            }
            text.push_str(&format!("RADIANCE_MAXIMUM_BAND_{b} = {}\n", 700.0 - b as f64 * 50.0));
            text.push_str(&format!("REFLECTANCE_MAXIMUM_BAND_{b} = 1.2107\n"));
        }
        let w = esun_weights(&meta(&text)).unwrap();
        assert_relative_eq!(w.iter().sum::<f64>(), 1.0, epsilon = 1e-12);
        assert_eq!(w[5], 0.0);
        assert!(w[0] > w[6]);
    }

    #[test]
    fn esun_weights_without_any_maxima_fail() {
        let err = esun_weights(&meta("EARTH_SUN_DISTANCE = 1.0\n")).unwrap_err();
        assert!(matches!(err, Error::MissingMetadataKey(_)));
    }

    #[test]
    fn albedo_skips_missing_bands() {
        let one = Array2::from_elem((2, 2), 1.0);
        let bands = [
            Some(one.view()),
            Some(one.view()),
            None,
            Some(one.view()),
            Some(one.view()),
            Some(one.view()),
            Some(one.view()),
        ];
        let w = [0.1, 0.2, 0.3, 0.1, 0.1, 0.1, 0.1];
        let a = albedo_toa(&bands, &w, (2, 2));
        assert_relative_eq!(a[[1, 1]], 0.7, epsilon = 1e-12);
    }

    #[test]
    fn shortwave_and_albedo() {
        let z = array![[0.0, 1000.0]];
        let tsw = transmissivity(&z.view());
        assert_relative_eq!(tsw[[0, 1]], 0.77);
        let rsi = incoming_shortwave(&tsw.view(), 90.0, 1.0);
        assert_relative_eq!(rsi[[0, 0]], 1367.0 * 0.75, epsilon = 1e-9);
        let atoa = array![[0.2, 0.2]];
        let a_s = surface_albedo(&atoa.view(), &tsw.view());
        assert_relative_eq!(a_s[[0, 0]], 0.17 / 0.5625, epsilon = 1e-12);
    }

    #[test]
    fn net_radiation_closes_balance() {
        let rli_scalar = incoming_longwave(0.75, 295.0);
        let expected_rli = 0.85 * (-(0.75_f64).ln()).powf(0.09) * STEFAN_BOLTZMANN * 295.0_f64.powi(4);
        assert_relative_eq!(rli_scalar, expected_rli, epsilon = 1e-9);

        let a_s = array![[0.2]];
        let rsi = array![[800.0]];
        let rli = array![[rli_scalar]];
        let e0 = array![[0.97]];
        let ts = array![[300.0]];
        let rlo = outgoing_longwave(&e0.view(), &ts.view());
        let rn = net_radiation(&a_s.view(), &rsi.view(), &rli.view(), &rlo.view(), &e0.view());
        let expected = 0.8 * 800.0 + rli_scalar - rlo[[0, 0]] - 0.03 * rli_scalar;
        assert_relative_eq!(rn[[0, 0]], expected, epsilon = 1e-9);
    }

    #[test]
    fn soil_heat_ratio_branches() {
        assert_eq!(soil_heat_ratio(300.0, 0.2, -0.1), 0.5);
        let r = soil_heat_ratio(303.15, 0.2, 0.5);
        let expected = (30.0 / 0.2) * (0.0038 * 0.2 + 0.0074 * 0.04) * (1.0 - 0.98 * 0.0625);
        assert_relative_eq!(r, expected, epsilon = 1e-12);
        let g = soil_heat_flux(&array![[303.15]].view(), &array![[0.2]].view(), &array![[0.5]].view(), &array![[500.0]].view());
        assert_relative_eq!(g[[0, 0]], expected * 500.0, epsilon = 1e-9);
    }
}
