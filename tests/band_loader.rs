mod common;

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use approx::assert_relative_eq;
use etpro::io::writers::ProductContext;
use etpro::io::{BoundarySource, RasterSource};
use etpro::{
    AutoAnchors, BandLoader, CalibrationStatus, Error, GeoTransform, MemorySink, PixelType,
    Product, RasterGrid, RunParams, SceneMetadata, SebalInputs, run_sebal_with,
};
use geo::{MultiPolygon, polygon};

const SCENE: &str = "LC08_L1TP_218076_20190720_20200827_02_T1";

/// Serves in-memory grids by file name.
struct FakeRasters {
    grids: HashMap<String, RasterGrid>,
}

impl RasterSource for FakeRasters {
    fn open(&self, path: &Path) -> etpro::Result<RasterGrid> {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default();
        self.grids
            .get(name)
            .cloned()
            .ok_or_else(|| Error::Processing(format!("no fake raster for {}", name)))
    }
}

/// Whole-grid boundary regardless of the path.
struct FakeBoundary;

impl BoundarySource for FakeBoundary {
    fn read(&self, _path: &Path) -> etpro::Result<MultiPolygon<f64>> {
        Ok(MultiPolygon(vec![polygon![
            (x: 500_000.0, y: 7_999_880.0),
            (x: 500_120.0, y: 7_999_880.0),
            (x: 500_120.0, y: 8_000_000.0),
            (x: 500_000.0, y: 8_000_000.0),
        ]]))
    }
}

/// Digital number that converts to `reflectance` with the test calibration.
fn dn_for(reflectance: f64) -> f64 {
    (reflectance * 45f64.to_radians().sin() + 0.1) / 2.0e-5
}

fn raw_grid(f: impl Fn(usize, usize) -> f64) -> RasterGrid {
    let mut georef = common::grid();
    georef.dtype = PixelType::U16;
    georef.nodata = Some(0.0);
    RasterGrid::new(
        ndarray::Array2::from_shape_fn((common::ROWS, common::COLS), |(r, c)| f(r, c)),
        georef,
    )
    .unwrap()
}

/// Band files on disk (empty, only discovered) plus their fake contents.
fn scene(dir: &Path) -> FakeRasters {
    let reflectance = common::contrasted_bands();
    let mut grids = HashMap::new();
    for (band, grid) in reflectance.iter() {
        let name = format!("{}_B{}.TIF", SCENE, band);
        fs::write(dir.join(&name), b"").unwrap();
        let raw = if band == 10 {
            raw_grid(|r, c| grid.data[[r, c]])
        } else {
            raw_grid(|r, c| dn_for(grid.data[[r, c]]))
        };
        grids.insert(name, raw);
    }
    fs::write(dir.join(format!("{}_BQA.TIF", SCENE)), b"").unwrap();
    grids.insert("dem.tif".to_string(), common::dem());
    FakeRasters { grids }
}

fn inputs(dir: &Path) -> SebalInputs {
    SebalInputs {
        mtl: dir.join(format!("{}_MTL.txt", SCENE)),
        dem: PathBuf::from("dem.tif"),
        bands_dir: dir.to_path_buf(),
        boundary: PathBuf::from("aoi.shp"),
        output_dir: dir.join("out"),
        reference: None,
    }
}

#[test]
fn loader_converts_reflective_bands_and_keeps_thermal_raw() {
    let dir = tempfile::tempdir().unwrap();
    let rasters = scene(dir.path());
    let meta = common::scene_metadata();
    let boundary = FakeBoundary.read(Path::new("aoi.shp")).unwrap();

    let bands = BandLoader::new(&rasters, &meta)
        .load(dir.path(), &boundary)
        .unwrap();
    assert_eq!(bands.band_numbers(), vec![1, 2, 3, 4, 5, 6, 7, 10]);

    let nir = bands.require(5).unwrap();
    assert_eq!(nir.georef.dtype, PixelType::F64);
    assert_relative_eq!(nir.data[[0, 0]], 0.5, epsilon = 1e-9);
    assert_relative_eq!(nir.data[[0, 3]], 0.3, epsilon = 1e-9);

    let thermal = bands.require(10).unwrap();
    assert_relative_eq!(thermal.data[[1, 2]], 30_000.0 + 50.0 * 6.0);
}

#[test]
fn band_without_calibration_keys_is_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let rasters = scene(dir.path());
    let text: String = common::mtl_text()
        .lines()
        .filter(|l| !l.starts_with("REFLECTANCE_MULT_BAND_4"))
        .map(|l| format!("{}\n", l))
        .collect();
    let meta = SceneMetadata::parse_text(&text);
    let boundary = FakeBoundary.read(Path::new("aoi.shp")).unwrap();

    let bands = BandLoader::new(&rasters, &meta)
        .load(dir.path(), &boundary)
        .unwrap();
    assert!(!bands.contains(4));
    assert!(bands.contains(3));
    assert!(bands.contains(5));
}

#[test]
fn unreadable_band_is_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let mut rasters = scene(dir.path());
    rasters.grids.remove(&format!("{}_B6.TIF", SCENE));
    assert!(dir.path().join(format!("{}_B6.TIF", SCENE)).exists());
    let meta = common::scene_metadata();
    let boundary = FakeBoundary.read(Path::new("aoi.shp")).unwrap();

    let bands = BandLoader::new(&rasters, &meta)
        .load(dir.path(), &boundary)
        .unwrap();
    assert_eq!(bands.band_numbers(), vec![1, 2, 3, 4, 5, 7, 10]);
}

#[test]
fn end_to_end_with_fake_collaborators() {
    let dir = tempfile::tempdir().unwrap();
    let rasters = scene(dir.path());
    let meta = common::scene_metadata();
    let params = RunParams::new(2.3, 0.62, 5.1);
    let ctx = ProductContext::new(meta.scene_id().map(str::to_string));
    let mut sink = MemorySink::new();

    let run = run_sebal_with(
        &inputs(dir.path()),
        &params,
        &meta,
        &rasters,
        &FakeBoundary,
        &mut sink,
        &mut AutoAnchors,
        &ctx,
    );
    let products = run.outcome.unwrap();

    let report = &run.report;
    assert!(report.is_complete());
    assert_eq!(report.scene_id.as_deref(), Some(SCENE));
    assert_eq!((report.rows, report.cols), (common::ROWS, common::COLS));
    assert_eq!(report.bands_loaded, vec![1, 2, 3, 4, 5, 6, 7, 10]);
    assert_eq!(report.products_written.len(), 31);
    let cal = report.calibration.as_ref().unwrap();
    assert_eq!(cal.status, CalibrationStatus::Converged);

    let (_, dem) = &sink.products[&Product::Dem];
    assert_eq!(dem[0][[3, 0]], 530.0);
    let expected_ndvi = (0.5 - 0.05) / (0.5 + 0.05);
    assert_relative_eq!(products.surface.ndvi[[2, 1]], expected_ndvi, epsilon = 1e-6);
}

#[test]
fn failed_run_still_produces_a_report() {
    let dir = tempfile::tempdir().unwrap();
    let rasters = scene(dir.path());
    let text: String = common::mtl_text()
        .lines()
        .filter(|l| !l.starts_with("REFLECTANCE_ADD_BAND_4"))
        .map(|l| format!("{}\n", l))
        .collect();
    let meta = SceneMetadata::parse_text(&text);
    let params = RunParams::new(2.3, 0.62, 5.1);
    let ctx = ProductContext::new(None);
    let mut sink = MemorySink::new();

    let run = run_sebal_with(
        &inputs(dir.path()),
        &params,
        &meta,
        &rasters,
        &FakeBoundary,
        &mut sink,
        &mut AutoAnchors,
        &ctx,
    );

    assert!(matches!(run.outcome, Err(Error::MissingBand { band: 4 })));
    assert!(!run.report.is_complete());
    assert!(run.report.aborted.is_some());
    assert_eq!(run.report.products_written, vec![Product::Dem]);
}

#[test]
fn elevation_model_outside_boundary_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let mut rasters = scene(dir.path());
    let mut far_dem = common::dem();
    far_dem.georef.transform = GeoTransform::north_up(600_000.0, 8_000_000.0, 30.0, -30.0);
    rasters.grids.insert("dem.tif".to_string(), far_dem);
    let meta = common::scene_metadata();
    let params = RunParams::new(2.3, 0.62, 5.1);
    let ctx = ProductContext::new(meta.scene_id().map(str::to_string));
    let mut sink = MemorySink::new();

    let run = run_sebal_with(
        &inputs(dir.path()),
        &params,
        &meta,
        &rasters,
        &FakeBoundary,
        &mut sink,
        &mut AutoAnchors,
        &ctx,
    );

    assert!(matches!(run.outcome, Err(Error::EmptyGeometry(_))));
    assert!(run.report.aborted.is_some());
    assert!(!run.report.is_complete());
    assert_eq!(run.report.scene_id.as_deref(), Some(SCENE));
    assert!(run.report.products_written.is_empty());
    assert!(sink.products.is_empty());
}
