use criterion::{Criterion, criterion_group, criterion_main};
use signalcore::{
    geo::GeoPoint,
    raytrace::{RaySampler, RayTracingConfig, occlusion::OpenSky},
    scene::generation::SceneGenerator,
    signal::best_signal,
};
use std::{hint::black_box, time::Duration};

pub fn criterion_benchmark(c: &mut Criterion) {
    let scene = SceneGenerator::urban_grid((116.39, 39.9)).generate_from_seed(123456);
    let engine = scene.engine();
    let occlusion = scene.occlusion();
    let Some((station, antenna)) = scene.antennas().next() else {
        return;
    };
    let config = RayTracingConfig::default();
    let target = GeoPoint::new(116.392, 39.902, 1.5);

    let mut group = c.benchmark_group("main");
    group.measurement_time(Duration::from_secs(15));

    group.bench_function("Sweep Open Sky", |b| {
        let sampler = RaySampler::new(OpenSky);
        b.iter(|| black_box(sampler.sample(station, antenna, &config)))
    });

    group.bench_function("Sweep Buildings", |b| {
        let sampler = RaySampler::new(occlusion.clone());
        b.iter(|| black_box(sampler.sample(station, antenna, &config)))
    });

    group.bench_function("Wall Detection", |b| {
        let start = station.antenna_position(antenna);
        b.iter(|| black_box(engine.detect_walls(&start, &target)))
    });

    group.bench_function("Best Signal", |b| {
        b.iter(|| black_box(best_signal(&engine, &scene.stations, &target)))
    });

    group.finish();
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
