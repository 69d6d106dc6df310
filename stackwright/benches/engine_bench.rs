//! Benchmarks for the engine's hot paths.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use stackwright::parameters::OutputLookup;
use stackwright::tail::select_new_events;
use stackwright::testing::event_page;

fn event_selection_benchmark(c: &mut Criterion) {
    let page = event_page("web", 1, 100);
    c.bench_function("select_new_events_mid_page", |b| {
        b.iter(|| select_new_events(black_box(&page), black_box(Some("e50"))).len())
    });
    c.bench_function("select_new_events_no_mark", |b| {
        b.iter(|| select_new_events(black_box(&page), None).len())
    });
}

fn lookup_benchmark(c: &mut Criterion) {
    c.bench_function("parse_lookup", |b| {
        b.iter(|| OutputLookup::parse(black_box("@network-prod.PrivateSubnetIds")))
    });
    c.bench_function("parse_plain_value", |b| {
        b.iter(|| OutputLookup::parse(black_box("t3.micro")))
    });
}

criterion_group!(benches, event_selection_benchmark, lookup_benchmark);
criterion_main!(benches);
