use criterion::{criterion_group, criterion_main, BatchSize, Criterion, Throughput};
use std::hint::black_box;

use reqmerge::{ProcessorBuilder, RequestProcessor, RequestRecord, RuleSpec};

fn shop_rules() -> Vec<RuleSpec> {
    vec![
        RuleSpec {
            id: 0,
            drop_on_match: true,
            content_type_pattern: Some("^image/|^text/css|javascript".to_string()),
            ..RuleSpec::default()
        },
        RuleSpec {
            id: 1,
            new_name: "Item-{u:1}".to_string(),
            url_pattern: Some(r"/item/(\d+)".to_string()),
            ..RuleSpec::default()
        },
        RuleSpec {
            id: 2,
            new_name: "Search".to_string(),
            url_pattern: Some(r"/search\?".to_string()),
            ..RuleSpec::default()
        },
        RuleSpec {
            id: 3,
            new_name: "{n} ({m}) [{r}]".to_string(),
            response_time_ranges: vec![500, 1000, 2000, 5000],
            ..RuleSpec::default()
        },
    ]
}

fn build_processor(cache_capacity: usize) -> RequestProcessor {
    ProcessorBuilder::new()
        .rules(shop_rules())
        .cache_capacity(cache_capacity)
        .build()
        .expect("benchmark rules compile")
}

fn sample_records(count: usize) -> Vec<RequestRecord> {
    (0..count)
        .map(|index| {
            let mut record = RequestRecord::new(format!("Request.{}", index % 7));
            record.url = format!("https://shop.example.com/item/{}", index % 50);
            record.http_method = "GET".to_string();
            record.content_type = "text/html".to_string();
            record.response_time_millis = (index as u64 * 37) % 6000;
            record
        })
        .collect()
}

fn benchmark_compile(c: &mut Criterion) {
    let mut group = c.benchmark_group("rule_compilation");

    group.bench_function("compile_four_rules", |b| {
        b.iter(|| {
            let processor = ProcessorBuilder::new()
                .rules(black_box(shop_rules()))
                .build()
                .expect("rules compile");
            black_box(processor);
        });
    });

    group.finish();
}

fn benchmark_single_record(c: &mut Criterion) {
    let mut group = c.benchmark_group("single_record");
    group.throughput(Throughput::Elements(1));

    let cached = build_processor(100);
    let uncached = build_processor(0);

    group.bench_function("process_cached", |b| {
        let mut ctx = cached.new_worker_context();
        b.iter(|| {
            let mut record = RequestRecord::new("GetItem");
            record.url = "https://shop.example.com/item/17".to_string();
            cached.process(black_box(&mut record), &mut ctx);
            black_box(record);
        });
    });

    group.bench_function("process_uncached", |b| {
        let mut ctx = uncached.new_worker_context();
        b.iter(|| {
            let mut record = RequestRecord::new("GetItem");
            record.url = "https://shop.example.com/item/17".to_string();
            uncached.process(black_box(&mut record), &mut ctx);
            black_box(record);
        });
    });

    group.finish();
}

fn benchmark_batch(c: &mut Criterion) {
    let mut group = c.benchmark_group("batch");
    let processor = build_processor(100);

    for size in [1_000usize, 10_000] {
        group.throughput(Throughput::Elements(size as u64));
        group.bench_function(format!("parallel_{size}"), |b| {
            b.iter_batched(
                || sample_records(size),
                |records| {
                    let summary = reqmerge::process_batch(&processor, records);
                    black_box(summary);
                },
                BatchSize::LargeInput,
            );
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    benchmark_compile,
    benchmark_single_record,
    benchmark_batch
);
criterion_main!(benches);
