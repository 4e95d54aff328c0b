//! Benchmarks pour la lecture GPX et YAML

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use waypoint::{read_gpx, read_yaml, write_gpx, write_yaml, Address, Waypoint};

fn generate_waypoints(count: usize) -> Vec<Waypoint> {
    (0..count)
        .map(|i| {
            let mut wpt = Waypoint::new(45.0 + i as f64 * 1e-3, 6.0 - i as f64 * 1e-3);
            wpt.name = Some(format!("WPT{:05}", i));
            wpt.elevation = Some(1000.0 + i as f64);
            wpt.description = Some(format!("Point {}", i));
            if i % 2 == 0 {
                wpt.set_address(Address {
                    city: Some("Chamonix".into()),
                    country: Some("France".into()),
                    postal_code: Some("74400".into()),
                    ..Default::default()
                });
            }
            wpt
        })
        .collect()
}

fn bench_read_gpx(c: &mut Criterion) {
    let mut group = c.benchmark_group("read_gpx");

    for count in [100, 1_000, 10_000] {
        let mut out = Vec::new();
        write_gpx(&generate_waypoints(count), &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();

        group.throughput(Throughput::Bytes(text.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), &text, |b, text| {
            b.iter(|| black_box(read_gpx(black_box(text)).unwrap()))
        });
    }

    group.finish();
}

fn bench_read_yaml(c: &mut Criterion) {
    let mut group = c.benchmark_group("read_yaml");
    group.sample_size(10);

    for count in [100, 1_000] {
        let mut out = Vec::new();
        write_yaml(&generate_waypoints(count), &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();

        group.throughput(Throughput::Bytes(text.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), &text, |b, text| {
            b.iter(|| black_box(read_yaml(black_box(text)).unwrap()))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_read_gpx, bench_read_yaml);
criterion_main!(benches);
