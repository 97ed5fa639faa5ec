use clap::Parser;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "etpro",
    version,
    about = "ETPRO CLI: SEBAL evapotranspiration from Landsat-8 scenes"
)]
pub struct CliArgs {
    /// Scene metadata file (*_MTL.txt or *_MTL.xml)
    #[arg(long)]
    pub mtl: PathBuf,

    /// Digital elevation model raster
    #[arg(long)]
    pub dem: PathBuf,

    /// Directory containing the *_B<n>.TIF band files
    #[arg(long)]
    pub bands: PathBuf,

    /// Area-of-interest polygons (shapefile, GeoPackage or GeoJSON)
    #[arg(long)]
    pub boundary: PathBuf,

    /// Directory receiving the product GeoTIFFs and run_report.json
    #[arg(short, long)]
    pub output_dir: PathBuf,

    /// Optional reference raster defining the output grid (default: band grid)
    #[arg(long)]
    pub reference: Option<PathBuf>,

    /// Wind speed at 2 m (m/s)
    #[arg(long)]
    pub u2m: Option<String>,

    /// Instantaneous reference ET at overpass (mm/h)
    #[arg(long)]
    pub etoi: Option<String>,

    /// Daily reference ET (mm/day)
    #[arg(long)]
    pub eto: Option<String>,

    /// Cold pixel as "easting, northing", or "auto". Prompts on stdin when omitted
    #[arg(long)]
    pub cold: Option<String>,

    /// Hot pixel as "easting, northing", or "auto". Prompts on stdin when omitted
    #[arg(long)]
    pub hot: Option<String>,

    /// JSON file with run parameters; command line values take precedence
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Also write the clipped per-band rasters (band<n>.tif)
    #[arg(long, default_value_t = false)]
    pub write_bands: bool,

    /// Enable debug logging
    #[arg(long, default_value_t = false)]
    pub log: bool,
}
