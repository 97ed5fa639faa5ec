use gdal::Dataset;
use gdal::Metadata;
use gdal::spatial_ref::SpatialRef;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::core::anchor::AnchorPixel;
use crate::core::params::RunParams;
use crate::core::processing::calibration::CalibrationSummary;
use crate::core::processing::pipeline::{SceneStatistics, WriteFailureRecord, WriteLog};
use crate::core::raster::GeoReference;
use crate::io::GdalError;
use crate::types::Product;

pub const SOFTWARE: &str = concat!("etpro ", env!("CARGO_PKG_VERSION"));
pub const REPORT_FILE: &str = "run_report.json";

/// Run-wide values stamped into every product.
#[derive(Debug, Clone)]
pub struct ProductContext {
    pub scene_id: Option<String>,
    pub processed_at: String,
}

impl ProductContext {
    pub fn new(scene_id: Option<String>) -> Self {
        Self {
            scene_id,
            processed_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Tag set written into a product GeoTIFF.
pub fn product_tags(product: Product, ctx: &ProductContext) -> BTreeMap<String, String> {
    let mut tags = BTreeMap::new();
    tags.insert("PRODUCT".to_string(), product.file_name().trim_end_matches(".tif").to_string());
    tags.insert("UNITS".to_string(), product.units().to_string());
    if let Some(id) = &ctx.scene_id {
        tags.insert("SCENE_ID".to_string(), id.clone());
    }
    tags.insert("SOFTWARE".to_string(), SOFTWARE.to_string());
    tags.insert("PROCESSING_TIMESTAMP".to_string(), ctx.processed_at.clone());
    tags
}

/// Set georeferencing and product tags on a freshly created dataset.
pub fn embed_product_metadata(
    ds: &mut Dataset,
    georef: &GeoReference,
    product: Product,
    ctx: &ProductContext,
) -> Result<(), GdalError> {
    ds.set_geo_transform(&georef.transform.to_gdal())?;
    if !georef.crs.is_empty() {
        let srs = SpatialRef::from_definition(&georef.crs)?;
        ds.set_spatial_ref(&srs)?;
    }
    for (key, value) in product_tags(product, ctx) {
        ds.set_metadata_item(&key, &value, "")?;
    }
    Ok(())
}

/// Summary of one run, persisted as `run_report.json` in the output directory.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub software: String,
    pub scene_id: Option<String>,
    pub processed_at: String,
    pub output_dir: PathBuf,
    pub params: RunParams,
    pub rows: usize,
    pub cols: usize,
    pub bands_loaded: Vec<u8>,
    pub statistics: Option<SceneStatistics>,
    pub cold_pixel: Option<AnchorPixel>,
    pub hot_pixel: Option<AnchorPixel>,
    pub rli: Option<f64>,
    pub calibration: Option<CalibrationSummary>,
    pub products_written: Vec<Product>,
    pub write_failures: Vec<WriteFailureRecord>,
    /// Set when the run stopped early (cancellation or a stage error)
    pub aborted: Option<String>,
}

impl RunReport {
    pub fn new(ctx: &ProductContext, output_dir: &Path, params: &RunParams) -> Self {
        Self {
            software: SOFTWARE.to_string(),
            scene_id: ctx.scene_id.clone(),
            processed_at: ctx.processed_at.clone(),
            output_dir: output_dir.to_path_buf(),
            params: params.clone(),
            rows: 0,
            cols: 0,
            bands_loaded: Vec::new(),
            statistics: None,
            cold_pixel: None,
            hot_pixel: None,
            rli: None,
            calibration: None,
            products_written: Vec::new(),
            write_failures: Vec::new(),
            aborted: None,
        }
    }

    pub fn record_writes(&mut self, log: WriteLog) {
        self.products_written = log.written;
        self.write_failures = log.failures;
    }

    pub fn is_complete(&self) -> bool {
        self.aborted.is_none() && self.calibration.is_some()
    }
}

/// Write the report next to the products and return its path.
pub fn write_run_report(output_dir: &Path, report: &RunReport) -> crate::Result<PathBuf> {
    let path = output_dir.join(REPORT_FILE);
    let json = serde_json::to_string_pretty(report)
        .map_err(|e| crate::Error::Processing(format!("report serialization failed: {}", e)))?;
    std::fs::write(&path, json)?;
    info!("Wrote run report {:?}", path);
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_carry_product_and_units() {
        let ctx = ProductContext::new(Some("LC08_TEST".into()));
        let tags = product_tags(Product::ETday, &ctx);
        assert_eq!(tags["PRODUCT"], "ETday");
        assert_eq!(tags["UNITS"], "mm/day");
        assert_eq!(tags["SCENE_ID"], "LC08_TEST");
        assert!(tags["SOFTWARE"].starts_with("etpro "));
        assert!(chrono::DateTime::parse_from_rfc3339(&tags["PROCESSING_TIMESTAMP"]).is_ok());
    }

    #[test]
    fn report_round_trips_to_json() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = ProductContext::new(None);
        let mut report = RunReport::new(&ctx, dir.path(), &RunParams::new(2.0, 0.6, 5.0));
        report.record_writes(WriteLog {
            written: vec![Product::Ndvi],
            failures: vec![WriteFailureRecord {
                product: Product::Savi,
                reason: "disk full".into(),
            }],
        });
        let path = write_run_report(dir.path(), &report).unwrap();
        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(value["products_written"][0], "Ndvi");
        assert_eq!(value["write_failures"][0]["reason"], "disk full");
        assert_eq!(value["params"]["u_2m"], 2.0);
        assert!(!report.is_complete());
    }
}
