use gdal::Dataset;
use gdal::vector::LayerAccess;
use geo::{Geometry, MultiPolygon, Polygon};
use std::path::Path;
use tracing::{debug, info};

use crate::error::Error;
use crate::io::{BoundarySource, GdalError};

/// Collect polygon parts from any geometry, flattening collections.
fn collect_polygons(geometry: Geometry<f64>, out: &mut Vec<Polygon<f64>>) -> usize {
    match geometry {
        Geometry::Polygon(p) => {
            out.push(p);
            1
        }
        Geometry::MultiPolygon(mp) => {
            let n = mp.0.len();
            out.extend(mp.0);
            n
        }
        Geometry::GeometryCollection(gc) => gc
            .0
            .into_iter()
            .map(|g| collect_polygons(g, out))
            .sum(),
        _ => 0,
    }
}

/// Area-of-interest reader for shapefiles, GeoPackages and GeoJSON via OGR.
#[derive(Debug, Clone, Copy, Default)]
pub struct OgrBoundarySource;

impl BoundarySource for OgrBoundarySource {
    fn read(&self, path: &Path) -> crate::Result<MultiPolygon<f64>> {
        let ds = Dataset::open(path).map_err(GdalError::from)?;
        let mut polygons = Vec::new();
        for mut layer in ds.layers() {
            let mut skipped = 0usize;
            for feature in layer.features() {
                let Some(geometry) = feature.geometry() else {
                    skipped += 1;
                    continue;
                };
                let geo = geometry.to_geo().map_err(GdalError::from)?;
                if collect_polygons(geo, &mut polygons) == 0 {
                    skipped += 1;
                }
            }
            if skipped > 0 {
                debug!("Skipped {} non-polygon features in layer {}", skipped, layer.name());
            }
        }
        if polygons.is_empty() {
            return Err(Error::EmptyGeometry(format!(
                "no polygon features in {}",
                path.display()
            )));
        }
        info!("Loaded {} boundary polygon(s) from {}", polygons.len(), path.display());
        Ok(MultiPolygon(polygons))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{GeometryCollection, Point, polygon};

    #[test]
    fn polygons_are_flattened_from_collections() {
        let p = polygon![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0), (x: 0.0, y: 1.0), (x: 0.0, y: 0.0)];
        let gc = Geometry::GeometryCollection(GeometryCollection(vec![
            Geometry::Polygon(p.clone()),
            Geometry::Point(Point::new(0.5, 0.5)),
            Geometry::MultiPolygon(MultiPolygon(vec![p.clone(), p])),
        ]));
        let mut out = Vec::new();
        assert_eq!(collect_polygons(gc, &mut out), 3);
        assert_eq!(out.len(), 3);
    }
}
