//! Integration test: refine a small pentagon end to end with a stub
//! engine that echoes the foreground seed back as its label mask.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::cell::Cell;

use image::{DynamicImage, GrayImage, Luma};
use rwsnake_pipeline::diagnostics::{StageMetrics, WebClock, refine_with_diagnostics};
use rwsnake_pipeline::{
    Contour, ContourId, PipelineError, Point, RawConfig, SeedBundle, SeedRole,
    SegmentationParameters, SegmenterError, marshal, refine, refine_with,
};

const PENTAGON: [(f64, f64); 5] = [
    (185.0, 279.0),
    (216.0, 289.0),
    (238.0, 309.0),
    (226.0, 313.0),
    (192.0, 300.0),
];

fn pentagon(id: u32) -> Contour {
    let points = PENTAGON.iter().map(|&(x, y)| Point::new(x, y)).collect();
    Contour::new(ContourId(id), points).unwrap()
}

/// Host-style configuration: every value arrives as text.
fn config() -> RawConfig {
    [
        ("alpha", "400.0"),
        ("beta", "50.0"),
        ("iter", "100.0"),
        ("relim", "0.008"),
        ("shrinkPower", "2.0"),
        ("localMean", "true"),
        ("LmWindow", "9.0"),
        ("clean", "true"),
    ]
    .into_iter()
    .collect()
}

/// A horizontal intensity ramp so the engine sees a non-trivial image.
#[allow(clippy::cast_possible_truncation)]
fn source() -> DynamicImage {
    DynamicImage::ImageLuma8(GrayImage::from_fn(400, 400, |x, _| {
        Luma([(x * 255 / 399) as u8])
    }))
}

fn seed_echo(
    _: &GrayImage,
    seeds: &SeedBundle,
    _: &SegmentationParameters,
) -> Result<GrayImage, SegmenterError> {
    Ok(seeds.get(SeedRole::Foreground).clone())
}

#[test]
fn pentagon_refines_to_same_object() {
    let params = marshal(&config()).expect("configuration should marshal");
    assert_eq!(params.max_iterations, 100);
    assert_eq!(params.shrink_distance, 2);
    assert_eq!(params.local_mean_window, 9);
    assert_eq!(params.relim, [0.008, 0.004]);
    assert!(params.local_mean);
    assert!(params.clean);

    let input = pentagon(42);
    let calls = Cell::new(0);
    let refined = refine_with(&input, &source(), &params, &seed_echo, |c| {
        assert_eq!(c.id(), ContourId(42));
        calls.set(calls.get() + 1);
    })
    .expect("refinement should succeed");

    assert_eq!(calls.get(), 1);
    assert_eq!(refined.id(), ContourId(42));
    assert!(refined.len() >= 3);

    // The echoed seed is the pentagon eroded by two pixels, so every
    // refined vertex stays inside the input's bounding box.
    for p in refined.points() {
        assert!((185.0..=238.0).contains(&p.x), "x = {} out of range", p.x);
        assert!((279.0..=313.0).contains(&p.y), "y = {} out of range", p.y);
    }
}

#[test]
fn pentagon_diagnostics_cover_every_stage() {
    let params = marshal(&config()).unwrap();
    let (result, diagnostics) =
        refine_with_diagnostics(&pentagon(7), &source(), &params, &seed_echo, &WebClock).unwrap();

    assert_eq!(result.contour.id(), ContourId(7));
    assert!(result.composite.is_none());
    assert!(matches!(
        diagnostics.propagate.metrics,
        StageMetrics::Propagate {
            shrink_distance: 2,
            expand_distance: 10,
            ..
        }
    ));
    let clean = diagnostics.clean.as_ref().expect("clean stage should run");
    assert!(matches!(clean.metrics, StageMetrics::Clean { enabled: true, .. }));
    assert!(matches!(
        diagnostics.source.metrics,
        StageMetrics::Source { vertex_count: 5, width: 400, height: 400 }
    ));
    eprintln!("{}", diagnostics.report());
}

#[test]
fn pentagon_seed_preview_is_produced_on_request() {
    let mut raw = config();
    raw.insert("maskPreview", true);
    let params = marshal(&raw).unwrap();
    let (result, _) =
        refine_with_diagnostics(&pentagon(1), &source(), &params, &seed_echo, &WebClock).unwrap();
    let composite = result.composite.expect("composite requested");
    assert_eq!(composite.dimensions(), (400, 400));
}

#[test]
fn overshrunk_pentagon_reports_degenerate_seed() {
    let mut raw = config();
    raw.insert("shrinkPower", "60");
    let params = marshal(&raw).unwrap();
    let err = refine(&pentagon(1), &source(), &params, &seed_echo).unwrap_err();
    assert_eq!(err, PipelineError::DegenerateSeed(SeedRole::Foreground));
}

#[test]
fn pentagon_parameters_survive_a_config_round_trip() {
    let params = marshal(&config()).unwrap();
    let again = marshal(&params.to_raw_config()).unwrap();
    assert_eq!(params, again);
    assert_eq!(again.relim[1], 0.004);
}
