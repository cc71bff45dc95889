use criterion::{black_box, criterion_group, criterion_main, Criterion};
use plan_core::{BenchmarkRow, ChannelId, ChannelSelection, IndustryId, SelectionMap};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

fn build_catalog(n_channels: usize, seed: u64) -> (Vec<BenchmarkRow>, SelectionMap) {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let industry = IndustryId("Retail".into());
    let mut rows = Vec::with_capacity(n_channels);
    let mut selections = SelectionMap::new();
    for i in 0..n_channels {
        let channel = ChannelId(format!("Channel {i}"));
        rows.push(BenchmarkRow {
            industry: industry.clone(),
            channel: channel.clone(),
            cpc: rng.gen_range(0.1..12.0),
            ctr_pct: rng.gen_range(0.1..8.0),
            conv_rate_pct: rng.gen_range(0.5..15.0),
        });
        selections.insert(
            channel,
            ChannelSelection::new(rng.gen_bool(0.7), Some(rng.gen_range(0.0..40.0))),
        );
    }
    (rows, selections)
}

fn bench_compute(c: &mut Criterion) {
    let (rows, selections) = build_catalog(200, 42);
    let industry = IndustryId("Retail".into());
    c.bench_function("compute 200 channels", |b| {
        b.iter(|| {
            let out = plan_engine::compute(black_box(250_000.0), &industry, &rows, &selections);
            black_box(plan_engine::summarize(250_000.0, &out, &selections))
        })
    });
}

criterion_group!(benches, bench_compute);
criterion_main!(benches);
