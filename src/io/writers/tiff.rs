use gdal::raster::{Buffer, GdalType};
use gdal::{Dataset, DriverManager};
use ndarray::ArrayView2;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::core::processing::pipeline::ProductSink;
use crate::core::raster::GeoReference;
use crate::error::{Error, Result};
use crate::io::GdalError;
use crate::io::writers::metadata::{ProductContext, embed_product_metadata};
use crate::types::{PixelType, Product};

/// Create a GeoTIFF with one band per array, converting samples with `convert`.
fn write_tiff_typed<T, F>(
    output: &Path,
    georef: &GeoReference,
    bands: &[ArrayView2<f64>],
    convert: F,
) -> std::result::Result<Dataset, GdalError>
where
    T: GdalType + Copy,
    F: Fn(f64) -> T,
{
    let (rows, cols) = georef.shape();
    let driver = DriverManager::get_driver_by_name("GTiff")?;
    let ds = driver.create_with_band_type::<T, _>(output, cols, rows, bands.len())?;
    for (i, data) in bands.iter().enumerate() {
        if data.dim() != (rows, cols) {
            return Err(GdalError::DimensionMismatch(cols, rows, data.ncols(), data.nrows()));
        }
        let mut band = ds.rasterband(i + 1)?;
        if let Some(nd) = georef.nodata {
            band.set_no_data_value(Some(nd))?;
        }
        let samples: Vec<T> = data.iter().map(|&v| convert(v)).collect();
        let mut buf = Buffer::new((cols, rows), samples);
        band.write((0, 0), (cols, rows), &mut buf)?;
    }
    Ok(ds)
}

/// Write `bands` as a GeoTIFF in the storage type recorded in `georef`.
/// Integer outputs round, and map NaN to the nodata value (or 0).
pub fn write_geotiff(
    output: &Path,
    georef: &GeoReference,
    bands: &[ArrayView2<f64>],
) -> std::result::Result<Dataset, GdalError> {
    let fill = georef.nodata.filter(|v| v.is_finite()).unwrap_or(0.0);
    let int = move |v: f64| if v.is_nan() { fill } else { v.round() };
    match georef.dtype {
        PixelType::U8 => write_tiff_typed::<u8, _>(output, georef, bands, |v| int(v) as u8),
        PixelType::U16 => write_tiff_typed::<u16, _>(output, georef, bands, |v| int(v) as u16),
        PixelType::I16 => write_tiff_typed::<i16, _>(output, georef, bands, |v| int(v) as i16),
        PixelType::U32 => write_tiff_typed::<u32, _>(output, georef, bands, |v| int(v) as u32),
        PixelType::I32 => write_tiff_typed::<i32, _>(output, georef, bands, |v| int(v) as i32),
        PixelType::F32 => write_tiff_typed::<f32, _>(output, georef, bands, |v| v as f32),
        PixelType::F64 => write_tiff_typed::<f64, _>(output, georef, bands, |v| v),
    }
}

/// GeoTIFF product sink: one `<product file name>` per product in `output_dir`.
pub struct GeoTiffSink {
    output_dir: PathBuf,
    context: ProductContext,
}

impl GeoTiffSink {
    /// Creates `output_dir` if needed.
    pub fn new<P: AsRef<Path>>(output_dir: P, context: ProductContext) -> Result<Self> {
        fs::create_dir_all(output_dir.as_ref())?;
        Ok(Self {
            output_dir: output_dir.as_ref().to_path_buf(),
            context,
        })
    }

    pub fn path_for(&self, product: Product) -> PathBuf {
        self.output_dir.join(product.file_name())
    }

    pub fn context(&self) -> &ProductContext {
        &self.context
    }
}

impl ProductSink for GeoTiffSink {
    fn write(
        &mut self,
        product: Product,
        georef: &GeoReference,
        bands: &[ArrayView2<f64>],
    ) -> Result<()> {
        if bands.is_empty() {
            return Err(Error::write_failure(product, "no bands to write"));
        }
        let path = self.path_for(product);
        let mut ds =
            write_geotiff(&path, georef, bands).map_err(|e| Error::write_failure(product, e))?;
        embed_product_metadata(&mut ds, georef, product, &self.context)
            .map_err(|e| Error::write_failure(product, e))?;
        debug!(
            "Wrote {:?} ({} band(s), {})",
            path,
            bands.len(),
            georef.dtype
        );
        Ok(())
    }
}
