mod common;

use common::synthetic_image::noise;
use stencil_pipes::boundary::BoundaryPolicy;
use stencil_pipes::buffer::{Buffer, ElemType, Region, Span};
use stencil_pipes::exec::{Executor, Realization};
use stencil_pipes::graph::{FuncDef, ReductionDomain, StageGraph};
use stencil_pipes::schedule::{ParallelDim, ScheduleSpec, StageSchedule};
use stencil_pipes::PipelineError;

const W: usize = 37;
const H: usize = 23;

/// input -> a -> {b, c, d} -> out, with b also feeding c.
fn diamond(boundary: BoundaryPolicy) -> StageGraph {
    let mut g = StageGraph::new();
    let input = g.input("input", ElemType::U8, 1, boundary).unwrap();
    let a = g
        .add(
            FuncDef::new("a", ElemType::U16)
                .reads(input, Span::radius(1), Span::ZERO)
                .pure(move |env, p| {
                    env.at(input, p.x - 1, p.y, 0)
                        + 2.0 * env.at(input, p.x, p.y, 0)
                        + env.at(input, p.x + 1, p.y, 0)
                }),
        )
        .unwrap();
    let b = g
        .add(
            FuncDef::new("b", ElemType::I16)
                .reads(a, Span::ZERO, Span::radius(1))
                .pure(move |env, p| env.at(a, p.x, p.y - 1, 0) - env.at(a, p.x, p.y + 1, 0)),
        )
        .unwrap();
    let c = g
        .add(
            FuncDef::new("c", ElemType::I32)
                .reads(a, Span::ZERO, Span::ZERO)
                .reads(b, Span::radius(1), Span::ZERO)
                .pure(move |env, p| {
                    env.at(a, p.x, p.y, 0) + 3.0 * env.at(b, p.x + 1, p.y, 0)
                        - env.at(b, p.x - 1, p.y, 0)
                }),
        )
        .unwrap();
    let d = g
        .add(
            FuncDef::new("d", ElemType::F32)
                .reads(a, Span::radius(2), Span::ZERO)
                .pure(|_, _| 0.0)
                .update(
                    ReductionDomain::range(Span::radius(2)),
                    move |env, p, r, acc| acc + 0.1 * env.at(a, p.x + r[0], p.y, 0),
                ),
        )
        .unwrap();
    let out = g
        .add(
            FuncDef::new("out", ElemType::U8)
                .reads(c, Span::ZERO, Span::ZERO)
                .reads(d, Span::ZERO, Span::ZERO)
                .pure(move |env, p| 0.25 * env.at(c, p.x, p.y, 0) + env.at(d, p.x, p.y, 0)),
        )
        .unwrap();
    g.set_output(out).unwrap();
    g
}

fn input_buffer() -> Buffer {
    Buffer::from_u8(W, H, 1, noise(W * H, 1234)).unwrap()
}

fn run(graph: &StageGraph, schedule: &ScheduleSpec) -> Realization {
    let input = input_buffer();
    Executor::new(graph, schedule)
        .unwrap()
        .run(&[&input], Region::from_size(W as i64, H as i64))
        .unwrap()
}

fn schedules() -> Vec<(&'static str, ScheduleSpec)> {
    let all_root = ["a", "b", "c", "d"]
        .into_iter()
        .fold(ScheduleSpec::new(), |s, n| s.with(n, StageSchedule::root()));
    vec![
        ("all_root", all_root),
        (
            "nested_tiles",
            ScheduleSpec::new()
                .with("a", StageSchedule::root().vectorize(5))
                .with("b", StageSchedule::tiled_at("c", 4, 3))
                .with("c", StageSchedule::tiled_at("out", 6, 5).vectorize(2))
                .with("d", StageSchedule::tiled_at("out", 6, 5))
                .with(
                    "out",
                    StageSchedule::root()
                        .parallel(ParallelDim::Tiles)
                        .vectorize(4),
                ),
        ),
        (
            "shared_tile",
            ScheduleSpec::new()
                .with("a", StageSchedule::tiled_at("out", 5, 5).vectorize(8))
                .with(
                    "out",
                    StageSchedule::root().parallel(ParallelDim::Rows).vectorize(3),
                ),
        ),
        (
            "parallel_roots",
            ScheduleSpec::new()
                .with("a", StageSchedule::root().parallel(ParallelDim::Rows))
                .with("b", StageSchedule::root().parallel(ParallelDim::Tiles))
                .with("c", StageSchedule::root().vectorize(16)),
        ),
    ]
}

#[test]
fn every_schedule_produces_identical_output() {
    common::init_logging();
    for boundary in [
        BoundaryPolicy::ClampToEdge,
        BoundaryPolicy::ConstantExterior(17.0),
    ] {
        let graph = diamond(boundary);
        let reference = run(&graph, &ScheduleSpec::new());
        assert_eq!(reference.output.region(), Region::from_size(W as i64, H as i64));
        for (name, schedule) in schedules() {
            let r = run(&graph, &schedule);
            assert_eq!(r.output, reference.output, "{name} / {boundary:?}");
            assert_eq!(r.stats.fallback_evaluations, 0, "{name}");
        }
    }
}

#[test]
fn materializing_a_shared_producer_saves_work() {
    let graph = diamond(BoundaryPolicy::ClampToEdge);
    let inline = run(&graph, &ScheduleSpec::new());
    let rooted = run(&graph, &ScheduleSpec::new().with("a", StageSchedule::root()));

    let a_inline = inline.stats.stage("a").unwrap();
    let a_root = rooted.stats.stage("a").unwrap();
    assert_eq!(a_inline.materializations, 0);
    assert_eq!(a_root.materializations, 1);
    // Root demand of `a`: output grown by 2 in x (d) and 1 in y (b).
    assert_eq!(a_root.evaluated, ((W + 4) * (H + 2)) as u64);
    assert!(a_inline.evaluated > a_root.evaluated);
}

#[test]
fn vector_chunks_and_tiles_are_counted() {
    let graph = diamond(BoundaryPolicy::ClampToEdge);
    let (_, schedule) = schedules()
        .into_iter()
        .find(|(name, _)| *name == "nested_tiles")
        .unwrap();
    let r = run(&graph, &schedule);
    assert!(r.stats.tiles > 1);
    assert!(r.stats.vector_chunks > 0);
    assert!(r.stats.stage("c").unwrap().materializations > 1);
}

#[test]
fn prepadded_input_must_cover_the_demand() {
    let graph = diamond(BoundaryPolicy::Prepadded);
    let input = input_buffer();
    let executor = Executor::new(&graph, &ScheduleSpec::new()).unwrap();

    let err = executor
        .run(&[&input], Region::from_size(W as i64, H as i64))
        .unwrap_err();
    assert!(
        matches!(err, PipelineError::OutOfBounds { ref stage, .. } if stage == "input"),
        "{err}"
    );

    // a reads ±1 in x; d reads a at ±2, b reads a at ±1 in y.
    let inner = Region::new(3, 1, W as i64 - 6, H as i64 - 2);
    let r = executor.run(&[&input], inner).unwrap();
    assert_eq!(r.output.region(), inner);
}

#[test]
fn invalid_schedules_are_rejected() {
    let graph = diamond(BoundaryPolicy::ClampToEdge);
    let cases = [
        ScheduleSpec::new().with("nope", StageSchedule::root()),
        ScheduleSpec::new().with("input", StageSchedule::root()),
        ScheduleSpec::new().with("out", StageSchedule::inline()),
        ScheduleSpec::new().with("a", StageSchedule::root().vectorize(0)),
        ScheduleSpec::new().with("a", StageSchedule::tiled_at("missing", 4, 4)),
        ScheduleSpec::new().with("a", StageSchedule::tiled_at("out", 0, 4)),
        // d never reads b.
        ScheduleSpec::new()
            .with("b", StageSchedule::tiled_at("d", 4, 4))
            .with("d", StageSchedule::root()),
        // c is inline, so it has no tiles.
        ScheduleSpec::new().with("b", StageSchedule::tiled_at("c", 4, 4)),
        // Two tile sizes for the same consumer.
        ScheduleSpec::new()
            .with("c", StageSchedule::tiled_at("out", 6, 5))
            .with("d", StageSchedule::tiled_at("out", 4, 4)),
        // a is also read by c and d, outside b's tiles.
        ScheduleSpec::new()
            .with("a", StageSchedule::tiled_at("b", 4, 4))
            .with("b", StageSchedule::root()),
    ];
    for schedule in cases {
        let err = Executor::new(&graph, &schedule).map(|_| ()).unwrap_err();
        assert!(
            matches!(err, PipelineError::Schedule { .. }),
            "{schedule:?}: {err}"
        );
    }
}

#[test]
fn input_buffers_are_checked() {
    let graph = diamond(BoundaryPolicy::ClampToEdge);
    let executor = Executor::new(&graph, &ScheduleSpec::new()).unwrap();
    let out = Region::from_size(4, 4);

    let err = executor.run(&[], out).unwrap_err();
    assert!(matches!(err, PipelineError::InputMismatch { .. }));

    let rgb = Buffer::from_u8(4, 4, 3, vec![0; 48]).unwrap();
    let err = executor.run(&[&rgb], out).unwrap_err();
    assert!(matches!(err, PipelineError::InputMismatch { ref stage, .. } if stage == "input"));

    let input = input_buffer();
    let err = executor.run(&[&input], Region::from_size(0, 4)).unwrap_err();
    assert!(matches!(err, PipelineError::EmptyOutput { .. }));
}
