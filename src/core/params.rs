use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Weather-station scalars and solver settings for one run, suitable for config files
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunParams {
    /// Wind speed at 2 m (m/s)
    pub u_2m: f64,
    /// Instantaneous reference ET at overpass time (mm/h)
    pub eto_i: f64,
    /// Daily reference ET (mm/day)
    pub eto: f64,
    /// Vegetation height at the weather station (m)
    pub canopy_height: f64,
    pub max_iterations: usize,
    /// Convergence threshold on the hot-pixel aerodynamic resistance (s/m)
    pub tolerance: f64,
    /// Also persist the clipped per-band rasters
    pub write_bands: bool,
}

impl Default for RunParams {
    fn default() -> Self {
        Self {
            u_2m: f64::NAN,
            eto_i: f64::NAN,
            eto: f64::NAN,
            canopy_height: 0.15,
            max_iterations: 10,
            tolerance: 1e-5,
            write_bands: false,
        }
    }
}

impl RunParams {
    pub fn new(u_2m: f64, eto_i: f64, eto: f64) -> Self {
        Self {
            u_2m,
            eto_i,
            eto,
            ..Self::default()
        }
    }

    /// Station scalars must be positive and finite; solver settings must be usable.
    pub fn validate(&self) -> Result<()> {
        let scalars: [(&'static str, f64); 4] = [
            ("u_2m", self.u_2m),
            ("eto_i", self.eto_i),
            ("eto", self.eto),
            ("canopy_height", self.canopy_height),
        ];
        for (arg, value) in scalars {
            if !value.is_finite() || value <= 0.0 {
                return Err(Error::InvalidArgument {
                    arg,
                    value: value.to_string(),
                });
            }
        }
        if self.max_iterations == 0 {
            return Err(Error::InvalidArgument {
                arg: "max_iterations",
                value: "0".into(),
            });
        }
        if !self.tolerance.is_finite() || self.tolerance <= 0.0 {
            return Err(Error::InvalidArgument {
                arg: "tolerance",
                value: self.tolerance.to_string(),
            });
        }
        Ok(())
    }
}

/// Parse a user-supplied scalar, rejecting non-numeric text before any processing.
pub fn parse_scalar(arg: &'static str, text: &str) -> Result<f64> {
    let value: f64 = text.trim().parse().map_err(|_| Error::InvalidArgument {
        arg,
        value: text.to_string(),
    })?;
    if !value.is_finite() || value <= 0.0 {
        return Err(Error::InvalidArgument {
            arg,
            value: text.to_string(),
        });
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_follow_reference_settings() {
        let p = RunParams::new(2.1, 0.6, 5.2);
        assert_eq!(p.max_iterations, 10);
        assert_eq!(p.tolerance, 1e-5);
        assert_eq!(p.canopy_height, 0.15);
        assert!(p.validate().is_ok());
    }

    #[test]
    fn validate_rejects_non_positive_or_nan_scalars() {
        assert!(RunParams::new(0.0, 0.6, 5.2).validate().is_err());
        assert!(RunParams::new(2.0, -1.0, 5.2).validate().is_err());
        assert!(RunParams::new(2.0, 0.6, f64::NAN).validate().is_err());
        assert!(RunParams::default().validate().is_err());
    }

    #[test]
    fn parse_scalar_rejects_text() {
        assert_eq!(parse_scalar("u_2m", " 2.5 ").unwrap(), 2.5);
        assert!(matches!(
            parse_scalar("u_2m", "fast"),
            Err(Error::InvalidArgument { arg: "u_2m", .. })
        ));
        assert!(parse_scalar("eto", "inf").is_err());
    }

    #[test]
    fn params_load_from_partial_json() {
        let p: RunParams = serde_json::from_str(r#"{"u_2m": 1.8, "eto_i": 0.7, "eto": 6.0}"#).unwrap();
        assert_eq!(p.u_2m, 1.8);
        assert_eq!(p.max_iterations, 10);
        assert!(p.validate().is_ok());
    }
}
