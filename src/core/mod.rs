//! Algorithmic core of the SEBAL energy balance: raster model, run
//! parameters, anchor resolution, and the processing stages. No file I/O
//! happens here; rasters come in and products leave through `ProductSink`.
pub mod anchor;
pub mod params;
pub mod processing;
pub mod raster;
