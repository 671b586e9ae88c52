use std::hint::black_box;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use aqstore::record::write_fixed;
use aqstore::{AggregationEngine, CsvRecordParser, EnvironmentalRecord, MISSING_AQI};

const RECORDS: usize = 200_000;

fn synthetic_records(n: usize) -> Vec<EnvironmentalRecord> {
    (0..n)
        .map(|i| {
            let mut record = EnvironmentalRecord {
                air_quality_index: if i % 17 == 0 { MISSING_AQI } else { (i % 300) as i32 },
                ..EnvironmentalRecord::default()
            };
            let ts = format!("2024-{:02}-{:02}T{:02}:00:00Z", 1 + i % 12, 1 + i % 28, i % 24);
            write_fixed(&mut record.timestamp_utc, &ts);
            record
        })
        .collect()
}

fn bench_aggregate_workers(c: &mut Criterion) {
    let records = synthetic_records(RECORDS);
    let mut group = c.benchmark_group("aggregate");
    group.throughput(Throughput::Elements(RECORDS as u64));
    for workers in [1usize, 2, 4, 8] {
        group.bench_with_input(BenchmarkId::from_parameter(workers), &workers, |b, &w| {
            let engine = AggregationEngine::new(w);
            b.iter(|| black_box(engine.aggregate(black_box(&records))));
        });
    }
    group.finish();
}

fn bench_parse_line(c: &mut Criterion) {
    let line = r#""34.0522","-118.2437","2020-08-14T10:00:00Z","PM2.5","12.3","UG/M3","12.1","51","2","Los Angeles - N. Main","South Coast AQMD","060370016","840060370016""#;
    let parser = CsvRecordParser::new();
    c.bench_function("parse_line", |b| {
        b.iter(|| black_box(parser.parse_line(black_box(line))));
    });
}

criterion_group!(benches, bench_aggregate_workers, bench_parse_line);
criterion_main!(benches);
