//! R-Tree benchmarks

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use spatial_rtree::{
    DataId, DiskStorageConfig, DiskStorageManager, MemoryStorageManager, Point, RTree,
    RTreeConfig, RTreeVariant, Region, StorageManager,
};
use std::hint::black_box;
use std::sync::Arc;
use tempfile::tempdir;

fn cell(i: usize) -> Region {
    let x = (i % 100) as f64;
    let y = (i / 100) as f64;
    Region::new(vec![x, y], vec![x + 1.0, y + 1.0]).unwrap()
}

fn populated(storage: Arc<dyn StorageManager>, variant: RTreeVariant, size: usize) -> RTree {
    let tree = RTree::create(storage, RTreeConfig::default().with_variant(variant)).unwrap();
    for i in 0..size {
        tree.insert_data(None, &cell(i), i as DataId).unwrap();
    }
    tree
}

fn bench_memory_insert(c: &mut Criterion) {
    let mut group = c.benchmark_group("Memory Insert");

    for variant in [RTreeVariant::Linear, RTreeVariant::Quadratic, RTreeVariant::RStar] {
        for size in [1000, 10000] {
            let id = BenchmarkId::new(variant.to_string(), size);
            group.bench_with_input(id, &size, |b, &size| {
                b.iter(|| {
                    let tree = populated(Arc::new(MemoryStorageManager::new()), variant, size);
                    black_box(tree.statistics().data_count)
                });
            });
        }
    }

    group.finish();
}

fn bench_disk_insert(c: &mut Criterion) {
    let mut group = c.benchmark_group("Disk Insert");

    for size in [100, 1000, 10000].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            b.iter_with_setup(
                || {
                    let dir = tempdir().unwrap();
                    let config = DiskStorageConfig::new(dir.path().join("bench"));
                    let storage: Arc<dyn StorageManager> =
                        Arc::new(DiskStorageManager::open(&config).unwrap());
                    (storage, dir)
                },
                |(storage, _dir)| {
                    let tree = populated(storage, RTreeVariant::RStar, size);
                    black_box(tree.statistics().data_count)
                },
            );
        });
    }

    group.finish();
}

fn bench_queries(c: &mut Criterion) {
    let mut group = c.benchmark_group("Queries");

    let tree = populated(Arc::new(MemoryStorageManager::new()), RTreeVariant::RStar, 10000);
    let window = Region::new(vec![25.0, 25.0], vec![75.0, 75.0]).unwrap();
    let center = Point::new(vec![50.0, 50.0]);

    group.bench_function("intersection_10k", |b| {
        b.iter(|| {
            let mut hits: Vec<DataId> = Vec::new();
            tree.intersection_query(&window, &mut hits).unwrap();
            black_box(hits.len())
        });
    });

    group.bench_function("nearest_10_of_10k", |b| {
        b.iter(|| {
            let mut hits: Vec<DataId> = Vec::new();
            tree.nearest_neighbor_query(10, &center, &mut hits).unwrap();
            black_box(hits.len())
        });
    });

    group.finish();
}

criterion_group!(benches, bench_memory_insert, bench_disk_insert, bench_queries);
criterion_main!(benches);
