//! High-level library API: run the whole SEBAL chain from input paths to
//! GeoTIFF products and a JSON run report. `run_sebal_with` takes the raster,
//! boundary and sink collaborators explicitly for embedding and testing.
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::core::anchor::AnchorProvider;
use crate::core::params::RunParams;
use crate::core::processing::align::align;
use crate::core::processing::pipeline::{ProductSink, SebalPipeline, SebalProducts};
use crate::core::raster::{BandSet, GeoReference, RasterGrid};
use crate::error::{Error, Result};
use crate::io::landsat8::BandLoader;
use crate::io::mtl::SceneMetadata;
use crate::io::warp::{open_in_crs, same_crs};
use crate::io::writers::{GeoTiffSink, ProductContext, write_run_report};
use crate::io::{BoundarySource, GdalRasterSource, OgrBoundarySource, RasterSource};
use crate::types::PixelType;

pub use crate::io::writers::RunReport;

/// Input locations for one run
#[derive(Debug, Clone)]
pub struct SebalInputs {
    /// Scene metadata (`*_MTL.txt` or `*_MTL.xml`)
    pub mtl: PathBuf,
    /// Elevation model in any GDAL format
    pub dem: PathBuf,
    /// Directory holding the `*_B<n>.TIF` band files
    pub bands_dir: PathBuf,
    /// Area-of-interest polygons (shapefile, GeoPackage, GeoJSON)
    pub boundary: PathBuf,
    pub output_dir: PathBuf,
    /// Raster whose grid all products share; defaults to the band working grid
    pub reference: Option<PathBuf>,
}

/// Report plus either the products or the error that stopped the run.
pub struct SebalRun {
    pub report: RunReport,
    pub outcome: Result<SebalProducts>,
}

/// Run with GDAL/OGR collaborators, writing GeoTIFFs and `run_report.json`
/// into `inputs.output_dir`. The report is written even when loading the
/// inputs fails, the run is cancelled or a stage fails; the error is returned
/// afterwards.
pub fn run_sebal(
    inputs: &SebalInputs,
    params: &RunParams,
    anchors: &mut dyn AnchorProvider,
) -> Result<RunReport> {
    params.validate()?;
    let meta = SceneMetadata::from_path(&inputs.mtl)?;
    let ctx = ProductContext::new(meta.scene_id().map(str::to_string));
    let mut sink = GeoTiffSink::new(&inputs.output_dir, ctx.clone())?;

    let run = run_sebal_with(
        inputs,
        params,
        &meta,
        &GdalRasterSource,
        &OgrBoundarySource,
        &mut sink,
        anchors,
        &ctx,
    );
    write_run_report(&inputs.output_dir, &run.report)?;
    match run.outcome {
        Ok(_) => Ok(run.report),
        Err(e) => Err(e),
    }
}

/// Load the elevation model in the reference CRS. Reprojection goes through
/// `gdalwarp` and so only applies to files GDAL can open.
fn load_dem(rasters: &dyn RasterSource, path: &Path, reference: &GeoReference) -> Result<RasterGrid> {
    let dem = rasters.open(path)?;
    if same_crs(&dem.georef.crs, &reference.crs) {
        return Ok(dem);
    }
    info!("Elevation model CRS differs from the reference grid");
    open_in_crs(path, &reference.crs)
}

/// Bands, product grid and aligned elevation model for one run.
struct PreparedInputs {
    bands: BandSet,
    grid: GeoReference,
    dem: RasterGrid,
}

fn prepare(
    inputs: &SebalInputs,
    meta: &SceneMetadata,
    rasters: &dyn RasterSource,
    boundaries: &dyn BoundarySource,
) -> Result<PreparedInputs> {
    let boundary = boundaries.read(&inputs.boundary)?;
    let bands = BandLoader::new(rasters, meta).load(&inputs.bands_dir, &boundary)?;

    let reference = match &inputs.reference {
        Some(path) => rasters.georeference(path)?,
        None => bands
            .working_grid()
            .cloned()
            .ok_or_else(|| Error::Processing(format!(
                "no usable bands found in {}",
                inputs.bands_dir.display()
            )))?,
    };
    let grid = reference.derived(PixelType::F32);
    info!("Reference grid: {}x{}", grid.height, grid.width);

    let dem = load_dem(rasters, &inputs.dem, &grid)?;
    let dem = align(&dem, &grid, &boundary)?;
    Ok(PreparedInputs {
        bands,
        grid,
        dem,
    })
}

/// Run against explicit collaborators. Errors while loading inputs or running
/// the chain land in `SebalRun::outcome` with the report's `aborted` set.
#[allow(clippy::too_many_arguments)]
pub fn run_sebal_with(
    inputs: &SebalInputs,
    params: &RunParams,
    meta: &SceneMetadata,
    rasters: &dyn RasterSource,
    boundaries: &dyn BoundarySource,
    sink: &mut dyn ProductSink,
    anchors: &mut dyn AnchorProvider,
    ctx: &ProductContext,
) -> SebalRun {
    let mut report = RunReport::new(ctx, &inputs.output_dir, params);

    let prepared = match prepare(inputs, meta, rasters, boundaries) {
        Ok(prepared) => prepared,
        Err(e) => {
            warn!("Input loading failed: {}", e);
            report.aborted = Some(e.to_string());
            return SebalRun {
                report,
                outcome: Err(e),
            };
        }
    };
    let PreparedInputs { bands, grid, dem } = prepared;
    report.rows = grid.height;
    report.cols = grid.width;
    report.bands_loaded = bands.band_numbers();

    let outcome = match SebalPipeline::new(meta, params, &grid, sink) {
        Ok(mut pipeline) => {
            let outcome = pipeline.run(&dem, &bands, anchors);
            report.record_writes(pipeline.into_write_log());
            outcome
        }
        Err(e) => Err(e),
    };

    match &outcome {
        Ok(products) => {
            report.statistics = Some(products.surface.stats);
            report.cold_pixel = Some(products.balance.cold.clone());
            report.hot_pixel = Some(products.flux.hot.clone());
            report.rli = Some(products.balance.rli_value);
            report.calibration = Some(products.flux.calibration.summary());
        }
        Err(e) if e.is_cancellation() => {
            warn!("{}; products written so far are kept", e);
            report.aborted = Some(e.to_string());
        }
        Err(e) => report.aborted = Some(e.to_string()),
    }
    SebalRun { report, outcome }
}
