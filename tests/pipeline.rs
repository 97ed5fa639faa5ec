mod common;

use approx::assert_relative_eq;
use etpro::core::anchor::AnchorRequest;
use etpro::{
    AnchorKind, AutoAnchors, CalibrationStatus, Error, FixedAnchors, MemorySink, Product,
    RunParams, SebalPipeline,
};

fn params() -> RunParams {
    RunParams::new(2.3, 0.62, 5.1)
}

#[test]
fn uniform_scene_indices_are_exact() {
    let meta = common::scene_metadata();
    let params = params();
    let grid = common::grid();
    let mut sink = MemorySink::new();
    let mut pipeline = SebalPipeline::new(&meta, &params, &grid, &mut sink).unwrap();

    let surface = pipeline
        .surface(&common::dem(), &common::uniform_bands())
        .unwrap();
    let expected_ndvi = (0.5 - 0.1) / (0.5 + 0.1 + 1e-10);
    let expected_savi = 1.5 * (0.5 - 0.1) / (0.5 + 0.1 + 0.5);
    for (&n, &s) in surface.ndvi.iter().zip(surface.savi.iter()) {
        assert_relative_eq!(n, expected_ndvi, epsilon = 1e-12);
        assert_relative_eq!(s, expected_savi, epsilon = 1e-12);
    }
    let expected_lai = -((0.69 - expected_savi) / 0.59).ln() / 0.91;
    for &l in surface.lai.iter() {
        assert_relative_eq!(l, expected_lai, epsilon = 1e-12);
    }
    assert!(surface.ts.iter().all(|t| *t > 250.0 && *t < 330.0));
    drop(pipeline);

    assert!(sink.contains(Product::Ndvi));
    assert!(sink.contains(Product::PCold));
    assert!(!sink.contains(Product::RLi));
    let (_, composite) = &sink.products[&Product::Composite432];
    assert_eq!(composite.len(), 3);
}

#[test]
fn automatic_anchors_run_every_stage() {
    let meta = common::scene_metadata();
    let params = params();
    let grid = common::grid();
    let mut sink = MemorySink::new();
    let mut pipeline = SebalPipeline::new(&meta, &params, &grid, &mut sink).unwrap();

    let products = pipeline
        .run(&common::dem(), &common::contrasted_bands(), &mut AutoAnchors)
        .unwrap();
    let log = pipeline.into_write_log();

    let cold = &products.balance.cold;
    let hot = &products.flux.hot;
    assert!(cold.col < 2, "cold anchor should sit on vegetation");
    assert!(hot.col >= 2, "hot anchor should sit on bare soil");
    assert!(hot.temperature > cold.temperature);

    let cal = &products.flux.calibration;
    assert_eq!(cal.status, CalibrationStatus::Converged);
    assert_eq!(cal.iterations, 1);

    let (hr, hc) = (hot.row, hot.col);
    let available = products.balance.rn[[hr, hc]] - products.balance.g[[hr, hc]];
    assert_relative_eq!(products.flux.h()[[hr, hc]], available, max_relative = 1e-9);
    assert_relative_eq!(
        products.flux.dt()[[cold.row, cold.col]],
        0.0,
        epsilon = 1e-9
    );

    for (&eti, &etof) in products.flux.eti.iter().zip(products.flux.etof.iter()) {
        assert!(eti >= 0.0);
        assert_relative_eq!(etof, eti / params.eto_i, max_relative = 1e-12);
    }

    assert_eq!(log.written.len(), 31);
    assert!(log.failures.is_empty());
    assert_eq!(log.written.first(), Some(&Product::Dem));
    assert_eq!(log.written.last(), Some(&Product::ETday));
    assert!(sink.contains(Product::ETday));
}

#[test]
fn fixed_anchor_outside_grid_stops_before_radiation_balance() {
    let meta = common::scene_metadata();
    let params = params();
    let grid = common::grid();
    let mut sink = MemorySink::new();
    let mut pipeline = SebalPipeline::new(&meta, &params, &grid, &mut sink).unwrap();

    let mut anchors = FixedAnchors::new("100.0, 100.0", common::coords(0, 3));
    let err = pipeline
        .run(&common::dem(), &common::contrasted_bands(), &mut anchors)
        .unwrap_err();
    assert!(matches!(
        err,
        Error::OutOfBounds {
            kind: AnchorKind::Cold,
            ..
        }
    ));
    drop(pipeline);

    assert!(sink.contains(Product::PCold));
    for product in [Product::RLi, Product::Rn, Product::G, Product::H] {
        assert!(!sink.contains(product), "{} should not exist", product);
    }
}

#[test]
fn declining_hot_anchor_cancels_after_hot_candidates() {
    let meta = common::scene_metadata();
    let params = params();
    let grid = common::grid();
    let mut sink = MemorySink::new();
    let mut pipeline = SebalPipeline::new(&meta, &params, &grid, &mut sink).unwrap();

    let cold = common::coords(0, 0);
    let mut provider = |req: &AnchorRequest<'_>| -> etpro::Result<Option<String>> {
        Ok(match req.kind {
            AnchorKind::Cold => Some(cold.clone()),
            AnchorKind::Hot => None,
        })
    };
    let err = pipeline
        .run(&common::dem(), &common::contrasted_bands(), &mut provider)
        .unwrap_err();
    assert!(err.is_cancellation());
    drop(pipeline);

    assert!(sink.contains(Product::PHot));
    assert!(sink.contains(Product::Rn));
    assert!(!sink.contains(Product::Z0Map));
}

#[test]
fn write_failure_is_recorded_and_run_continues() {
    let meta = common::scene_metadata();
    let params = params();
    let grid = common::grid();
    let mut sink = MemorySink::failing([Product::Ndvi]);
    let mut pipeline = SebalPipeline::new(&meta, &params, &grid, &mut sink).unwrap();

    let products = pipeline
        .run(&common::dem(), &common::contrasted_bands(), &mut AutoAnchors)
        .unwrap();
    assert!(products.surface.ndvi.iter().all(|v| v.is_finite()));

    let log = pipeline.into_write_log();
    assert_eq!(log.failures.len(), 1);
    assert_eq!(log.failures[0].product, Product::Ndvi);
    assert_eq!(log.written.len(), 30);
    assert!(!sink.contains(Product::Ndvi));
    assert!(sink.contains(Product::ETday));
}

#[test]
fn missing_thermal_band_is_reported() {
    let meta = common::scene_metadata();
    let params = params();
    let grid = common::grid();
    let mut sink = MemorySink::new();
    let mut pipeline = SebalPipeline::new(&meta, &params, &grid, &mut sink).unwrap();

    let mut bands = etpro::BandSet::new();
    for (n, grid) in common::contrasted_bands().iter() {
        if n != 10 {
            bands.insert(n, grid.clone());
        }
    }

    let err = pipeline.surface(&common::dem(), &bands).unwrap_err();
    assert!(matches!(err, Error::MissingBand { band: 10 }));
}

#[test]
fn elevation_model_on_other_grid_is_rejected() {
    let meta = common::scene_metadata();
    let params = params();
    let grid = common::grid();
    let mut sink = MemorySink::new();
    let mut pipeline = SebalPipeline::new(&meta, &params, &grid, &mut sink).unwrap();

    let mut dem_ref = common::grid();
    dem_ref.width = 3;
    let dem = etpro::RasterGrid::new(ndarray::Array2::from_elem((4, 3), 500.0), dem_ref).unwrap();
    let err = pipeline
        .surface(&dem, &common::contrasted_bands())
        .unwrap_err();
    assert!(matches!(err, Error::GridMismatch { .. }));
    drop(pipeline);
    assert!(sink.products.is_empty());
}

#[test]
fn invalid_params_are_rejected_up_front() {
    let meta = common::scene_metadata();
    let params = RunParams::new(0.0, 0.62, 5.1);
    let grid = common::grid();
    let mut sink = MemorySink::new();
    assert!(matches!(
        SebalPipeline::new(&meta, &params, &grid, &mut sink),
        Err(Error::InvalidArgument { arg: "u_2m", .. })
    ));
}
