use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use rz_bench::make_rewards;
use rz_ranked::RankedRewardsBuffer;

fn bench_normalize(c: &mut Criterion) {
    let mut g = c.benchmark_group("rz_ranked_normalize");
    for &len in &[100usize, 2000] {
        let mut buffer = RankedRewardsBuffer::new(len, 75.0).expect("valid buffer");
        for r in make_rewards(len) {
            buffer.add_reward(r);
        }
        g.bench_with_input(BenchmarkId::from_parameter(len), &buffer, |b, buf| {
            b.iter(|| black_box(buf.normalize(black_box(0.1))))
        });
    }
    g.finish();
}

criterion_group!(benches, bench_normalize);
criterion_main!(benches);
