mod common;

use common::synthetic_image::{aa_checkerboard, l_corner, nonzero_positions};
use stencil_pipes::image::{ImageU8, ImageView};
use stencil_pipes::pipelines::harris::{self, HarrisCorner, HarrisParams};
use stencil_pipes::schedule::{ParallelDim, ScheduleSpec, StageSchedule};

#[test]
fn checkerboard_crossings_are_detected() {
    let (w, h) = (32usize, 32usize);
    let data = aa_checkerboard(w, h, 8);
    let img = ImageU8::gray(w, h, &data);
    let detector = HarrisCorner::new(HarrisParams::default()).unwrap();
    let out = detector.run(&img).unwrap();
    assert_eq!((out.width(), out.height()), (26, 26));

    let found = nonzero_positions(out.data(), out.width());
    let axis = [4usize, 6, 12, 14, 20, 22];
    let mut expected: Vec<(usize, usize)> = axis
        .iter()
        .flat_map(|&y| axis.iter().map(move |&x| (x, y)))
        .collect();
    expected.sort_by_key(|&(x, y)| (y, x));
    assert_eq!(found, expected);
    assert!(out.data().iter().all(|&v| v == 0 || v == 255));
}

#[test]
fn single_corner_is_localized() {
    let data = l_corner(24, 12);
    let img = ImageU8::gray(24, 24, &data);
    let out = HarrisCorner::new(HarrisParams::default())
        .unwrap()
        .run(&img)
        .unwrap();
    assert_eq!(nonzero_positions(out.data(), out.width()), vec![(10, 10)]);
}

#[test]
fn threshold_filters_responses() {
    let data = aa_checkerboard(32, 32, 8);
    let img = ImageU8::gray(32, 32, &data);
    let count = |threshold: f32| {
        let detector = HarrisCorner::new(HarrisParams {
            threshold,
            ..HarrisParams::default()
        })
        .unwrap();
        let out = detector.run(&img).unwrap();
        nonzero_positions(out.data(), out.width()).len()
    };
    assert_eq!(count(0.0), 36);
    assert_eq!(count(1.0e9), 0);
}

#[test]
fn default_schedule_matches_inline_and_root() {
    common::init_logging();
    let data = aa_checkerboard(48, 40, 8);
    let img = ImageU8::gray(48, 40, &data);
    let detector = HarrisCorner::new(HarrisParams::default()).unwrap();

    let inline = detector.run_with(&img, &ScheduleSpec::new()).unwrap();
    let scheduled = detector
        .run_with(&img, &detector.default_schedule())
        .unwrap();
    let mut all_root = ScheduleSpec::new();
    for name in [
        harris::PADDED,
        harris::GRAD_X,
        harris::GRAD_Y,
        harris::GRAD_XX,
        harris::GRAD_YY,
        harris::GRAD_XY,
        harris::GRAD_GX,
        harris::GRAD_GY,
        harris::GRAD_GXY,
        harris::CIM,
    ] {
        all_root.set(name, StageSchedule::root());
    }
    let rooted = detector.run_with(&img, &all_root).unwrap();

    // Small tiles force many tile borders through the 8-neighbour halo.
    let mut small_tiles = ScheduleSpec::new().with(
        harris::OUTPUT,
        StageSchedule::root()
            .parallel(ParallelDim::Tiles)
            .vectorize(3),
    );
    for name in [harris::GRAD_X, harris::GRAD_Y, harris::CIM] {
        small_tiles.set(name, StageSchedule::tiled_at(harris::OUTPUT, 5, 7));
    }
    let tiled = detector.run_with(&img, &small_tiles).unwrap();

    for other in [&scheduled, &rooted, &tiled] {
        assert_eq!(other.output, inline.output);
        assert_eq!(other.stats.fallback_evaluations, 0);
    }
    assert!(tiled.stats.tiles > scheduled.stats.tiles);
}

#[test]
fn image_smaller_than_margin_is_rejected() {
    let data = vec![0u8; 6 * 6];
    let img = ImageU8::gray(6, 6, &data);
    let err = HarrisCorner::new(HarrisParams::default())
        .unwrap()
        .run(&img)
        .unwrap_err();
    assert!(matches!(
        err,
        stencil_pipes::PipelineError::EmptyOutput { .. }
    ));
}
