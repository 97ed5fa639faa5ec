//! Product writers: GeoTIFF sink plus product tags and the JSON run report.
pub mod metadata;
pub mod tiff;

pub use metadata::{ProductContext, RunReport, write_run_report};
pub use tiff::{GeoTiffSink, write_geotiff};
