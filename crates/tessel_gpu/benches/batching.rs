//! Element batching throughput

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::sync::Arc;
use tessel_core::{Color, Geometry, LayoutTransform, Rect, Vec2};
use tessel_gpu::{BatchData, BatcherConfig, ElementBatcher, ResourceTable};
use tessel_paint::{Brush, ElementPlacement, WindowElementList};

const WINDOW: Vec2 = Vec2::new(1280.0, 720.0);

fn placement(layer: i32, position: Vec2, size: Vec2) -> ElementPlacement {
    let geometry = Geometry::make_root(WINDOW, LayoutTransform::IDENTITY).make_child_at(position, size);
    ElementPlacement::new(layer, geometry.to_paint_geometry(), Rect::new(0.0, 0.0, WINDOW.x, WINDOW.y))
}

fn grid(count: usize) -> WindowElementList {
    let mut list = WindowElementList::new(WINDOW);
    let brush = Brush::solid();
    for i in 0..count {
        let position = Vec2::new((i % 64) as f32 * 20.0, (i / 64) as f32 * 20.0);
        let at = placement((i % 4) as i32, position, Vec2::splat(16.0));
        if i % 3 == 0 {
            list.add_border(at, &brush, Color::WHITE);
        } else {
            list.add_box(at, &brush, Color::BLUE);
        }
    }
    list
}

fn lines(count: usize) -> WindowElementList {
    let mut list = WindowElementList::new(WINDOW);
    for i in 0..count {
        let y = i as f32 * 4.0;
        let points = (0..16).map(|x| Vec2::new(x as f32 * 40.0, y + (x % 2) as f32 * 10.0)).collect();
        list.add_lines(placement(0, Vec2::ZERO, WINDOW), points, Color::GREEN, i % 2 == 0, 2.0);
    }
    list
}

fn bench_frame(c: &mut Criterion) {
    let mut group = c.benchmark_group("batch_frame");
    for count in [100, 1_000, 10_000] {
        let list = grid(count);
        group.bench_with_input(BenchmarkId::new("boxes", count), &list, |b, list| {
            let mut batcher = ElementBatcher::new(BatcherConfig::default(), Arc::new(ResourceTable::new()));
            let mut out = BatchData::new();
            b.iter(|| {
                out.clear();
                batcher.batch_frame(black_box(list), &mut out);
                black_box(out.vertices.len())
            });
        });
    }
    group.finish();
}

fn bench_lines(c: &mut Criterion) {
    let list = lines(200);
    c.bench_function("batch_lines_200", |b| {
        let mut batcher = ElementBatcher::new(BatcherConfig::default(), Arc::new(ResourceTable::new()));
        let mut out = BatchData::new();
        b.iter(|| {
            out.clear();
            batcher.add_elements(black_box(&list));
            batcher.fill_batch_buffers(&mut out);
            black_box(out.indices.len())
        });
    });
}

criterion_group!(benches, bench_frame, bench_lines);
criterion_main!(benches);
