//! Storage format benchmarks
//!
//! Benchmarks for the database codecs:
//! - Legacy line parsing
//! - JSON-lines loading
//! - Legacy to JSON file migration
//!
//! Toyota Way: Measure before optimizing (Genchi Genbutsu)

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use predicate_db::migration::PredicateDbMigration;
use predicate_db::storage::{
    JsonFormat, LegacyFormat, PredicateDbFormat, PredicateSample, SampleStream, TrainingData,
};

/// Create legacy lines with four labels each
fn create_legacy_lines(num_lines: usize) -> String {
    (0..num_lines)
        .map(|i| format!("{i}.5,2.0,-1.0,{i}.25:x : 1..{i} & x > 5:lift/Lift.mch:PREDICATES\n"))
        .collect()
}

/// Benchmark legacy line parsing
fn bench_legacy_parse_line(c: &mut Criterion) {
    let line = "1200.0,340.5,-1.0,98.0:x : 1..10 & x > 5 & card({x}) = 1:lift/Lift.mch:PREDICATES";

    c.bench_function("legacy_parse_line", |b| {
        b.iter(|| black_box(LegacyFormat::parse_line(black_box(line))));
    });
}

/// Benchmark streaming a JSON-lines file
#[allow(clippy::cast_precision_loss)]
fn bench_json_loading(c: &mut Criterion) {
    let mut group = c.benchmark_group("json_loading");
    let dir = tempfile::tempdir().unwrap();

    for size in [1_000, 10_000, 100_000] {
        let samples: Vec<PredicateSample> = (0..size)
            .map(|i| {
                PredicateSample::new(
                    format!("x : 1..{i} & x > 5"),
                    vec![i as f64, -1.0, 2.5],
                    Some("lift/Lift.mch".into()),
                )
            })
            .collect();
        let name = format!("bench_{size}.mch");
        let data = TrainingData::new(&name, &name, SampleStream::from_samples(samples));
        JsonFormat::new().write_samples(data, dir.path()).unwrap();
        let file = dir.path().join(format!("bench_{size}.jsonl"));

        group.bench_with_input(BenchmarkId::from_parameter(size), &file, |b, file| {
            b.iter(|| {
                let count = JsonFormat::new().load_samples(file).unwrap().count();
                black_box(count);
            });
        });
    }

    group.finish();
}

/// Benchmark converting one legacy file
fn bench_migrate_file(c: &mut Criterion) {
    let mut group = c.benchmark_group("migrate_file");
    let dir = tempfile::tempdir().unwrap();
    let migration = PredicateDbMigration::new(LegacyFormat::new()).with_overwrite(true);

    for size in [1_000, 10_000] {
        let file = dir.path().join(format!("bench_{size}.pdb"));
        std::fs::write(&file, create_legacy_lines(size)).unwrap();
        let out = dir.path().join("out");

        group.bench_with_input(BenchmarkId::from_parameter(size), &file, |b, file| {
            b.iter(|| {
                let stats = migration.migrate_file(file, dir.path(), &out, &JsonFormat::new());
                black_box(stats);
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_legacy_parse_line,
    bench_json_loading,
    bench_migrate_file
);
criterion_main!(benches);
