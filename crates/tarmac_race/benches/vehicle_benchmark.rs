//! # Vehicle Tick Benchmark
//!
//! Cost of one `Level::update` with a grid full of cars.
//!
//! Run with: `cargo bench --package tarmac_race`

#![allow(missing_docs)]

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use tarmac_race::{Car, Level, LevelData};
use tarmac_shared::Vec2;

const TRACK: &str = r#"
    [meta.size]
    width = 4
    height = 4

    [[content.track.block]]
    x = 0
    y = 0
    type = "turn_bottom_right"

    [[content.track.block]]
    x = 1
    y = 0
    type = "horiz"

    [[content.track.block]]
    x = 2
    y = 0
    type = "turn_bottom_left"

    [[content.track.block]]
    x = 0
    y = 1
    type = "start_line"

    [[content.track.block]]
    x = 2
    y = 1
    type = "vert"

    [[content.bounds.bound]]
    x1 = 0.0
    y1 = 0.0
    x2 = 3.0
    y2 = 0.0
"#;

fn level_with_cars(count: usize) -> Level {
    let mut level = Level::new();
    level.initialize_with(LevelData::parse(TRACK).expect("bench level"));
    for i in 0..count {
        let mut car = Car::new(Vec2::new(100.0 + i as f32, 300.0), 270.0);
        car.set_acceleration(true);
        car.set_turn(if i % 2 == 0 { 1.0 } else { -0.5 });
        level.add_car(car);
    }
    level
}

fn bench_level_update(c: &mut Criterion) {
    let mut group = c.benchmark_group("level_update");
    for count in [1_usize, 8, 32] {
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, &count| {
            let mut level = level_with_cars(count);
            b.iter(|| black_box(level.update(black_box(16))));
        });
    }
    group.finish();
}

fn bench_resistance_lookup(c: &mut Criterion) {
    let level = level_with_cars(0);
    c.bench_function("resistance_lookup", |b| {
        b.iter(|| black_box(level.resistance(black_box(310.0), black_box(95.0))));
    });
}

criterion_group!(benches, bench_level_update, bench_resistance_lookup);
criterion_main!(benches);
