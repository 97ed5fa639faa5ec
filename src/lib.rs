#![doc = r#"
ETPRO: SEBAL evapotranspiration from Landsat-8 scenes.

This crate runs the Surface Energy Balance Algorithm for Land over a clipped
Landsat-8 scene: TOA reflectance, vegetation indices, emissivity, surface
temperature, the radiation balance, cold/hot anchor calibration of sensible
heat, and the instantaneous, reference-fraction and daily ET products. Every
intermediate layer is written as a GeoTIFF. It powers the `etpro` CLI and can
be embedded in your own Rust applications.

Requirements
------------
- GDAL development headers and runtime available on your system.
- `gdalwarp` on `PATH` when the elevation model is in another CRS.
- Rust 2024 edition toolchain.

Quick start
-----------
```rust,no_run
use std::path::PathBuf;
use etpro::{run_sebal, FixedAnchors, RunParams, SebalInputs};

fn main() -> etpro::Result<()> {
    let inputs = SebalInputs {
        mtl: PathBuf::from("/data/LC08_MTL.txt"),
        dem: PathBuf::from("/data/srtm.tif"),
        bands_dir: PathBuf::from("/data/LC08"),
        boundary: PathBuf::from("/data/aoi.shp"),
        output_dir: PathBuf::from("/out"),
        reference: None,
    };
    let params = RunParams::new(2.3, 0.62, 5.1);
    let mut anchors = FixedAnchors::new("512345.0, 7801234.0", "515678.0, 7799876.0");
    let report = run_sebal(&inputs, &params, &mut anchors)?;
    println!("{} products written", report.products_written.len());
    Ok(())
}
```

Anchor pixels
-------------
The pipeline asks an [`AnchorProvider`] for the cold and then the hot pixel once
their candidate masks exist. Closures work as providers, [`FixedAnchors`] holds
known coordinates and [`AutoAnchors`] picks the coldest `Pcold` and hottest
`Phot` candidate. Returning `Ok(None)` stops the run with
[`Error::UserCancelled`]; products written up to that point stay on disk.

In-memory pipeline
------------------
[`SebalPipeline`] runs on already loaded rasters and writes through any
[`ProductSink`]; [`MemorySink`] keeps products in memory.

Useful modules
--------------
- [`api`] - high-level entry points.
- [`core`] - raster model, parameters, anchors and the processing stages.
- [`io`] - MTL reader, GDAL/OGR adapters, band loader and writers.
- [`types`] - `Product`, `AnchorKind`, `CalibrationStatus`, `PixelType`.
- [`error`] - crate-level `Error` and `Result`.
"#]

pub mod api;
pub mod core;
pub mod error;
pub mod io;
pub mod types;

// Curated public API surface
pub use crate::core::anchor::{AnchorPixel, AnchorProvider, AnchorRequest, AutoAnchors, FixedAnchors};
pub use crate::core::params::RunParams;
pub use crate::core::processing::pipeline::{MemorySink, ProductSink, SebalPipeline, SebalProducts};
pub use crate::core::raster::{BandSet, GeoReference, GeoTransform, RasterGrid};
pub use crate::error::{Error, Result};
pub use crate::types::{AnchorKind, CalibrationStatus, PixelType, Product};

// Readers and writers
pub use crate::io::writers::{GeoTiffSink, RunReport};
pub use crate::io::{BandLoader, GdalReader, MtlError, SceneMetadata};

pub use crate::api::{SebalInputs, SebalRun, run_sebal, run_sebal_with};
