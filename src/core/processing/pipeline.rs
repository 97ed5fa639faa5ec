//! Staged SEBAL pipeline.
//!
//! Each stage consumes the typed output of the previous one and persists every
//! product it creates through a [`ProductSink`]. Write failures are logged and
//! recorded; downstream stages always use the in-memory arrays.
use std::collections::{BTreeMap, BTreeSet};

use ndarray::{Array2, ArrayView2};
use serde::Serialize;
use tracing::{info, warn};

use crate::core::anchor::{AnchorPixel, AnchorProvider, AnchorRequest, acquire_anchor};
use crate::core::params::RunParams;
use crate::core::processing::calibration::{
    self, Calibration, CalibrationInputs, StationWind,
};
use crate::core::processing::{flux, indices, radiation};
use crate::core::raster::{BandSet, GeoReference, RasterGrid, nan_mean};
use crate::error::{Error, Result};
use crate::io::mtl::SceneMetadata;
use crate::types::{AnchorKind, PixelType, Product};

/// Output boundary for product rasters. One call per product; multi-band
/// products pass several equally shaped arrays.
pub trait ProductSink {
    fn write(
        &mut self,
        product: Product,
        georef: &GeoReference,
        bands: &[ArrayView2<f64>],
    ) -> Result<()>;
}

/// Keeps written products in memory. Products listed in `fail_on` are
/// rejected with a write failure.
#[derive(Debug, Default)]
pub struct MemorySink {
    pub products: BTreeMap<Product, (GeoReference, Vec<Array2<f64>>)>,
    pub fail_on: BTreeSet<Product>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(products: impl IntoIterator<Item = Product>) -> Self {
        Self {
            products: BTreeMap::new(),
            fail_on: products.into_iter().collect(),
        }
    }

    pub fn get(&self, product: Product) -> Option<&Array2<f64>> {
        self.products.get(&product).and_then(|(_, b)| b.first())
    }

    pub fn contains(&self, product: Product) -> bool {
        self.products.contains_key(&product)
    }
}

impl ProductSink for MemorySink {
    fn write(
        &mut self,
        product: Product,
        georef: &GeoReference,
        bands: &[ArrayView2<f64>],
    ) -> Result<()> {
        if self.fail_on.contains(&product) {
            return Err(Error::write_failure(product, "sink rejected product"));
        }
        let arrays = bands.iter().map(|b| b.to_owned()).collect();
        self.products.insert(product, (georef.clone(), arrays));
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct WriteFailureRecord {
    pub product: Product,
    pub reason: String,
}

/// Which products reached the sink and which did not.
#[derive(Debug, Clone, Default, Serialize)]
pub struct WriteLog {
    pub written: Vec<Product>,
    pub failures: Vec<WriteFailureRecord>,
}

/// NaN-aware scene means reported after surface temperature.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct SceneStatistics {
    pub mean_tb: f64,
    pub mean_enbf: f64,
    pub mean_e0f: f64,
    pub mean_ts: f64,
}

/// Indices, emissivities, temperature, albedo and shortwave/outgoing longwave.
#[derive(Debug, Clone)]
pub struct SurfaceStage {
    pub dem: Array2<f64>,
    pub ndvi: Array2<f64>,
    pub savi: Array2<f64>,
    pub lai: Array2<f64>,
    pub e_nb: Array2<f64>,
    pub e_0: Array2<f64>,
    pub tb: Array2<f64>,
    pub ts: Array2<f64>,
    pub a_toa: Array2<f64>,
    pub tsw: Array2<f64>,
    pub a_s: Array2<f64>,
    pub rsi: Array2<f64>,
    pub rlo: Array2<f64>,
    pub p_cold: Array2<f64>,
    pub stats: SceneStatistics,
}

/// Everything that depends on the cold anchor.
#[derive(Debug, Clone)]
pub struct RadiationBalance {
    pub cold: AnchorPixel,
    /// Incoming longwave, uniform over the scene
    pub rli_value: f64,
    pub rli: Array2<f64>,
    pub rn: Array2<f64>,
    pub g: Array2<f64>,
    pub p_hot: Array2<f64>,
}

/// Everything that depends on the hot anchor.
#[derive(Debug, Clone)]
pub struct FluxStage {
    pub hot: AnchorPixel,
    pub wind: StationWind,
    pub z0map: Array2<f64>,
    pub u_astmap: Array2<f64>,
    pub rah: Array2<f64>,
    pub calibration: Calibration,
    pub l: Array2<f64>,
    pub l200m: Array2<f64>,
    pub l2m: Array2<f64>,
    pub l01m: Array2<f64>,
    pub let_: Array2<f64>,
    pub eti: Array2<f64>,
    pub etof: Array2<f64>,
    pub etday: Array2<f64>,
}

impl FluxStage {
    pub fn dt(&self) -> &Array2<f64> {
        &self.calibration.dt
    }

    pub fn h(&self) -> &Array2<f64> {
        &self.calibration.h
    }
}

#[derive(Debug, Clone)]
pub struct SebalProducts {
    pub surface: SurfaceStage,
    pub balance: RadiationBalance,
    pub flux: FluxStage,
}

pub struct SebalPipeline<'a> {
    meta: &'a SceneMetadata,
    params: &'a RunParams,
    grid: GeoReference,
    sink: &'a mut dyn ProductSink,
    log: WriteLog,
}

impl<'a> SebalPipeline<'a> {
    /// `grid` is the reference grid every layer of the run must share.
    pub fn new(
        meta: &'a SceneMetadata,
        params: &'a RunParams,
        grid: &GeoReference,
        sink: &'a mut dyn ProductSink,
    ) -> Result<Self> {
        params.validate()?;
        Ok(Self {
            meta,
            params,
            grid: grid.clone(),
            sink,
            log: WriteLog::default(),
        })
    }

    pub fn grid(&self) -> &GeoReference {
        &self.grid
    }

    pub fn write_log(&self) -> &WriteLog {
        &self.log
    }

    pub fn into_write_log(self) -> WriteLog {
        self.log
    }

    /// Run every stage in order, asking `anchors` for the cold then hot pixel.
    pub fn run(
        &mut self,
        dem: &RasterGrid,
        bands: &BandSet,
        anchors: &mut dyn AnchorProvider,
    ) -> Result<SebalProducts> {
        let surface = self.surface(dem, bands)?;
        let balance = self.radiation_balance(&surface, anchors)?;
        let flux = self.fluxes(&surface, &balance, anchors)?;
        info!(
            "SEBAL run complete: {} products written, {} write failures",
            self.log.written.len(),
            self.log.failures.len()
        );
        Ok(SebalProducts {
            surface,
            balance,
            flux,
        })
    }

    fn persist_with(&mut self, product: Product, georef: &GeoReference, bands: &[ArrayView2<f64>]) {
        match self.sink.write(product, georef, bands) {
            Ok(()) => {
                info!("Saved {}", product);
                self.log.written.push(product);
            }
            Err(e) => {
                warn!("Could not save {}: {}", product, e);
                self.log.failures.push(WriteFailureRecord {
                    product,
                    reason: e.to_string(),
                });
            }
        }
    }

    fn persist(&mut self, product: Product, data: &Array2<f64>) {
        let georef = self.grid.derived(product.storage());
        self.persist_with(product, &georef, &[data.view()]);
    }

    fn band_on_grid(&self, bands: &BandSet, band: u8) -> Result<Array2<f64>> {
        let grid = bands.require(band)?;
        self.grid
            .ensure_shape(&format!("band {}", band), &grid.data.view())?;
        Ok(grid.masked())
    }

    pub fn surface(&mut self, dem: &RasterGrid, bands: &BandSet) -> Result<SurfaceStage> {
        self.grid.ensure_shape("elevation model", &dem.data.view())?;
        self.persist_with(Product::Dem, &dem.georef, &[dem.data.view()]);
        let dem_data = dem.masked();

        let b2 = self.band_on_grid(bands, 2)?;
        let b3 = self.band_on_grid(bands, 3)?;
        let red = self.band_on_grid(bands, 4)?;
        let nir = self.band_on_grid(bands, 5)?;

        let composite = self.grid.derived(Product::Composite432.storage());
        self.persist_with(
            Product::Composite432,
            &composite,
            &[red.view(), b3.view(), b2.view()],
        );

        if self.params.write_bands {
            for (n, grid) in bands.iter() {
                let georef = grid.georef.derived(PixelType::F32);
                self.persist_with(Product::Band(n), &georef, &[grid.data.view()]);
            }
        }

        let ndvi = indices::ndvi(&nir.view(), &red.view());
        self.persist(Product::Ndvi, &ndvi);
        let savi = indices::savi(&nir.view(), &red.view());
        self.persist(Product::Savi, &savi);
        let lai = indices::lai(&savi.view());
        self.persist(Product::Lai, &lai);
        let e_nb = indices::narrow_band_emissivity(&lai.view(), &ndvi.view());
        self.persist(Product::ENbf, &e_nb);
        let e_0 = indices::broad_band_emissivity(&lai.view(), &ndvi.view());
        self.persist(Product::E0f, &e_0);

        let thermal = self.band_on_grid(bands, 10)?;
        let constants = radiation::ThermalConstants::from_metadata(self.meta)?;
        let tb = radiation::brightness_temperature(&thermal.view(), &constants);
        let ts = radiation::surface_temperature(&tb.view(), &e_nb.view());
        self.persist(Product::Ts, &ts);

        let stats = SceneStatistics {
            mean_tb: nan_mean(&tb.view()),
            mean_enbf: nan_mean(&e_nb.view()),
            mean_e0f: nan_mean(&e_0.view()),
            mean_ts: nan_mean(&ts.view()),
        };
        info!(
            "Scene means: Tb={:.3} K, eNBf={:.5}, e0f={:.5}, Ts={:.3} K",
            stats.mean_tb, stats.mean_enbf, stats.mean_e0f, stats.mean_ts
        );

        let weights = radiation::esun_weights(self.meta)?;
        let mut reflectance: [Option<Array2<f64>>; 7] = Default::default();
        for (i, slot) in reflectance.iter_mut().enumerate() {
            let n = (i + 1) as u8;
            if bands.contains(n) {
                *slot = Some(self.band_on_grid(bands, n)?);
            }
        }
        let views = reflectance.each_ref().map(|b| b.as_ref().map(|a| a.view()));
        let a_toa = radiation::albedo_toa(&views, &weights, self.grid.shape());
        self.persist(Product::ATOA, &a_toa);

        let tsw = radiation::transmissivity(&dem_data.view());
        self.persist(Product::Tsw, &tsw);
        let a_s = radiation::surface_albedo(&a_toa.view(), &tsw.view());
        self.persist(Product::AS, &a_s);

        let rsi = radiation::incoming_shortwave(
            &tsw.view(),
            self.meta.sun_elevation()?,
            self.meta.earth_sun_distance()?,
        );
        self.persist(Product::Rsi, &rsi);
        let rlo = radiation::outgoing_longwave(&e_0.view(), &ts.view());
        self.persist(Product::RLo, &rlo);

        let p_cold = calibration::cold_candidates(&ndvi.view(), &ts.view());
        self.persist(Product::PCold, &p_cold);

        Ok(SurfaceStage {
            dem: dem_data,
            ndvi,
            savi,
            lai,
            e_nb,
            e_0,
            tb,
            ts,
            a_toa,
            tsw,
            a_s,
            rsi,
            rlo,
            p_cold,
            stats,
        })
    }

    pub fn radiation_balance(
        &mut self,
        surface: &SurfaceStage,
        anchors: &mut dyn AnchorProvider,
    ) -> Result<RadiationBalance> {
        let cold = {
            let request = AnchorRequest {
                kind: AnchorKind::Cold,
                georef: &self.grid,
                candidates: surface.p_cold.view(),
            };
            acquire_anchor(anchors, &request, &surface.ts.view())?
        };
        info!(
            "Cold pixel at row {}, col {}: Ts = {:.3} K",
            cold.row, cold.col, cold.temperature
        );

        let tsw_cold = surface.tsw[[cold.row, cold.col]];
        let rli_value = radiation::incoming_longwave(tsw_cold, cold.temperature);
        let rli = Array2::from_elem(self.grid.shape(), rli_value);
        self.persist(Product::RLi, &rli);

        let rn = radiation::net_radiation(
            &surface.a_s.view(),
            &surface.rsi.view(),
            &rli.view(),
            &surface.rlo.view(),
            &surface.e_0.view(),
        );
        self.persist(Product::Rn, &rn);
        let g = radiation::soil_heat_flux(
            &surface.ts.view(),
            &surface.a_s.view(),
            &surface.ndvi.view(),
            &rn.view(),
        );
        self.persist(Product::G, &g);

        let p_hot = calibration::hot_candidates(&surface.savi.view(), &surface.ts.view());
        self.persist(Product::PHot, &p_hot);

        Ok(RadiationBalance {
            cold,
            rli_value,
            rli,
            rn,
            g,
            p_hot,
        })
    }

    pub fn fluxes(
        &mut self,
        surface: &SurfaceStage,
        balance: &RadiationBalance,
        anchors: &mut dyn AnchorProvider,
    ) -> Result<FluxStage> {
        let hot = {
            let request = AnchorRequest {
                kind: AnchorKind::Hot,
                georef: &self.grid,
                candidates: balance.p_hot.view(),
            };
            acquire_anchor(anchors, &request, &surface.ts.view())?
        };
        info!(
            "Hot pixel at row {}, col {}: Ts = {:.3} K",
            hot.row, hot.col, hot.temperature
        );

        let wind = calibration::station_wind(self.params.u_2m, self.params.canopy_height);
        info!(
            "Station wind: u* = {:.4} m/s, u200 = {:.4} m/s",
            wind.friction_velocity, wind.u_200m
        );
        let z0map = calibration::roughness_map(&surface.savi.view());
        self.persist(Product::Z0Map, &z0map);
        let u_astmap = calibration::friction_velocity_map(wind.u_200m, &z0map.view());
        self.persist(Product::UAstMap, &u_astmap);
        let rah = calibration::aerodynamic_resistance(&u_astmap.view());
        self.persist(Product::Rah, &rah);

        let inputs = CalibrationInputs::from_anchors(
            &balance.cold,
            &hot,
            &balance.rn.view(),
            &balance.g.view(),
        );
        let calibration = calibration::calibrate(
            &inputs,
            &surface.ts.view(),
            &rah.view(),
            self.params.max_iterations,
            self.params.tolerance,
        )?;
        self.persist(Product::DT, &calibration.dt);
        self.persist(Product::H, &calibration.h);

        let l = flux::monin_obukhov_length(&surface.ts.view(), &u_astmap.view(), &calibration.h.view());
        self.persist(Product::L, &l);
        let l200m = flux::stability_map(&l.view(), 200.0);
        self.persist(Product::L200m, &l200m);
        let l2m = flux::stability_map(&l.view(), 2.0);
        self.persist(Product::L2m, &l2m);
        let l01m = flux::stability_map(&l.view(), 0.1);
        self.persist(Product::L01m, &l01m);

        let let_ = flux::latent_heat_flux(&balance.rn.view(), &balance.g.view(), &calibration.h.view());
        self.persist(Product::Let, &let_);
        let eti = flux::instantaneous_et(&let_.view());
        self.persist(Product::ETi, &eti);
        let etof = flux::reference_fraction(&eti.view(), self.params.eto_i);
        self.persist(Product::ETof, &etof);
        let etday = flux::daily_et(&etof.view(), self.params.eto);
        self.persist(Product::ETday, &etday);

        Ok(FluxStage {
            hot,
            wind,
            z0map,
            u_astmap,
            rah,
            calibration,
            l,
            l200m,
            l2m,
            l01m,
            let_,
            eti,
            etof,
            etday,
        })
    }
}
