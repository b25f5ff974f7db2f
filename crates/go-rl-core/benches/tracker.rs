use criterion::{criterion_group, criterion_main, Criterion};
use go_rl_core::board::{GoBoard, SimpleBoard};
use go_rl_core::features::shared::ShareKind;
use go_rl_core::features::FeatureSetArena;
use go_rl_core::point::{Color, Move, Point};
use go_rl_core::trackers::TrackerArena;
use std::hint::black_box;

const SIZE: usize = 9;

fn build_trackers() -> (TrackerArena, go_rl_core::trackers::TrackerId) {
    let mut arena = FeatureSetArena::new();
    let ls = arena.add_local_shape(3, 3, SIZE);
    let shared = arena.add_shared(ls, ShareKind::Ci, true, true).unwrap();
    let trackers = TrackerArena::build(&arena).unwrap();
    (trackers, shared)
}

fn bench_reset(c: &mut Criterion) {
    let (mut trackers, root) = build_trackers();
    let mut board = SimpleBoard::new(SIZE, 7.0);
    for (x, y) in [(2, 2), (2, 3), (3, 2), (6, 6)] {
        board.play(Move::Play(Point::from_xy(x, y, SIZE)), Color::Black).unwrap();
        board.play(Move::Pass, Color::White).unwrap();
    }

    c.bench_function("tracker_reset_9x9_3x3_ci", |b| {
        b.iter(|| black_box(trackers.reset(root, black_box(&board))))
    });
}

fn bench_execute_undo(c: &mut Criterion) {
    let (mut trackers, root) = build_trackers();
    let mut board = SimpleBoard::new(SIZE, 7.0);
    trackers.reset(root, &board);
    let p = Point::from_xy(4, 4, SIZE);

    c.bench_function("tracker_execute_undo_9x9_3x3_ci", |b| {
        b.iter(|| {
            let captured = board.play(Move::Play(black_box(p)), Color::Black).unwrap();
            black_box(trackers.execute(root, p, Color::Black, &captured));
            black_box(trackers.undo(root));
            board.undo().unwrap();
        })
    });
}

fn bench_with_mark(c: &mut Criterion) {
    let (mut trackers, root) = build_trackers();
    let mut board = SimpleBoard::new(SIZE, 7.0);
    trackers.reset(root, &board);
    let p = Point::from_xy(4, 4, SIZE);

    c.bench_function("tracker_with_mark_speculative_execute_9x9_3x3_ci", |b| {
        b.iter(|| {
            let captured = board.play(Move::Play(black_box(p)), Color::Black).unwrap();
            let changes = trackers.with_mark(root, |t| t.execute(root, p, Color::Black, &captured));
            board.undo().unwrap();
            black_box(changes)
        })
    });
}

criterion_group!(benches, bench_reset, bench_execute_undo, bench_with_mark);
criterion_main!(benches);
