#![allow(dead_code)]

use etpro::{BandSet, GeoReference, GeoTransform, PixelType, RasterGrid, SceneMetadata};
use ndarray::Array2;

pub const ROWS: usize = 4;
pub const COLS: usize = 4;

pub fn mtl_text() -> String {
    let mut text = String::from(
        "LANDSAT_PRODUCT_ID = \"LC08_L1TP_218076_20190720_20200827_02_T1\"\n\
         SUN_ELEVATION = 45.0\n\
         EARTH_SUN_DISTANCE = 1.0\n\
         RADIANCE_MULT_BAND_10 = 3.3420E-04\n\
         RADIANCE_ADD_BAND_10 = 0.10000\n\
         K1_CONSTANT_BAND_10 = 774.8853\n\
         K2_CONSTANT_BAND_10 = 1321.0789\n",
    );
    let rad_max = [743.2, 761.1, 701.3, 591.4, 361.9, 90.0, 30.3];
    for (i, r) in rad_max.iter().enumerate() {
        let b = i + 1;
        text.push_str(&format!("RADIANCE_MAXIMUM_BAND_{b} = {r}\n"));
        text.push_str(&format!("REFLECTANCE_MAXIMUM_BAND_{b} = 1.210700\n"));
        text.push_str(&format!("REFLECTANCE_MULT_BAND_{b} = 2.0000E-05\n"));
        text.push_str(&format!("REFLECTANCE_ADD_BAND_{b} = -0.100000\n"));
    }
    text
}

pub fn scene_metadata() -> SceneMetadata {
    SceneMetadata::parse_text(&mtl_text())
}

/// 30 m UTM grid shared by every synthetic layer.
pub fn grid() -> GeoReference {
    GeoReference {
        transform: GeoTransform::north_up(500_000.0, 8_000_000.0, 30.0, -30.0),
        crs: "EPSG:32723".into(),
        width: COLS,
        height: ROWS,
        nodata: Some(f64::NAN),
        dtype: PixelType::F64,
    }
}

/// Map coordinates of the centre of (row, col) as "easting, northing".
pub fn coords(row: usize, col: usize) -> String {
    let (x, y) = grid().transform.pixel_center(row, col);
    format!("{}, {}", x, y)
}

pub fn layer(f: impl Fn(usize, usize) -> f64) -> RasterGrid {
    RasterGrid::new(Array2::from_shape_fn((ROWS, COLS), |(r, c)| f(r, c)), grid()).unwrap()
}

pub fn dem() -> RasterGrid {
    let georef = GeoReference {
        nodata: Some(-32768.0),
        dtype: PixelType::I16,
        ..grid()
    };
    let data = Array2::from_shape_fn((ROWS, COLS), |(r, _)| 500.0 + 10.0 * r as f64);
    RasterGrid::new(data, georef).unwrap()
}

/// Uniform scene: NIR = 0.5 and RED = 0.1 everywhere.
pub fn uniform_bands() -> BandSet {
    let mut set = BandSet::new();
    for b in [1u8, 2, 3, 6, 7] {
        set.insert(b, layer(|_, _| 0.1));
    }
    set.insert(4, layer(|_, _| 0.1));
    set.insert(5, layer(|_, _| 0.5));
    set.insert(10, layer(|r, c| 25_000.0 + 50.0 * (r * COLS + c) as f64));
    set
}

/// Columns 0-1 well-watered vegetation, columns 2-3 dry bare soil, with the
/// thermal signal rising across the scene so anchors are unique.
pub fn contrasted_bands() -> BandSet {
    let vegetated = |c: usize| c < 2;
    let mut set = BandSet::new();
    for b in [1u8, 2, 3, 6, 7] {
        set.insert(b, layer(|_, c| if vegetated(c) { 0.04 } else { 0.15 }));
    }
    set.insert(4, layer(|_, c| if vegetated(c) { 0.05 } else { 0.15 }));
    set.insert(5, layer(|_, c| if vegetated(c) { 0.5 } else { 0.3 }));
    set.insert(
        10,
        layer(|r, c| {
            let base = if vegetated(c) { 25_000.0 } else { 30_000.0 };
            base + 50.0 * (r * COLS + c) as f64
        }),
    );
    set
}
