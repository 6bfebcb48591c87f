use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use rz_bench::{make_mask, make_stats};
use rz_core::{DiceRace, DiceRaceParams};
use rz_mcts::{Mcts, MctsConfig, UniformModel};

fn bench_best_action(c: &mut Criterion) {
    let mut g = c.benchmark_group("rz_mcts_best_action");
    for &n in &[4usize, 64, 1024] {
        let stats = make_stats(n);
        let mask = make_mask(n);
        g.bench_with_input(BenchmarkId::from_parameter(n), &(stats, mask), |b, (s, m)| {
            b.iter(|| black_box(s.best_action(black_box(m), black_box(10_000), black_box(1.5))))
        });
    }
    g.finish();
}

fn bench_decision(c: &mut Criterion) {
    let mut g = c.benchmark_group("rz_mcts_decision");
    for &sims in &[32u32, 128] {
        let cfg = MctsConfig {
            num_simulations: sims,
            add_dirichlet_noise: true,
            ..MctsConfig::default()
        };
        g.bench_with_input(BenchmarkId::new("dice_race_root", sims), &cfg, |b, cfg| {
            b.iter(|| {
                let env = DiceRace::new(DiceRaceParams::default(), 0);
                let mut mcts = Mcts::new(env, UniformModel, *cfg, 0).expect("valid config");
                let root = mcts.root();
                black_box(mcts.compute_action(root).expect("decision"))
            })
        });
    }
    g.finish();
}

criterion_group!(benches, bench_best_action, bench_decision);
criterion_main!(benches);
