use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use matchmaking_sim::{Engine, MatchmakingConfig};

/// Builds an engine with `population` players and warms up the queue for
/// `warmup_ticks` so the benchmarked tick actually exercises matchmaking
/// (arrivals/search-starts need a few ticks to fill the search queue from a
/// cold, all-offline population).
fn warmed_up_engine(population: usize, warmup_ticks: u64) -> Engine {
    let mut engine = Engine::new(0xC0D, MatchmakingConfig::default()).expect("valid default config");
    engine.generate_population(population);
    engine.run(warmup_ticks).expect("population generated before tick");
    engine
}

fn bench_tick_by_population(c: &mut Criterion) {
    let mut group = c.benchmark_group("engine_tick");

    for &population in &[500usize, 2_000, 10_000] {
        let mut engine = warmed_up_engine(population, 20);

        group.bench_with_input(BenchmarkId::new("tick", population), &population, |b, _| {
            b.iter(|| {
                black_box(engine.tick().expect("population already generated"));
            });
        });
    }

    group.finish();
}

/// Isolates steady-state matchmaking cost once the queue has reached a
/// roughly stable depth, as opposed to the cold-start ticks above.
fn bench_steady_state_tick(c: &mut Criterion) {
    let mut group = c.benchmark_group("engine_tick_steady_state");

    let mut engine = warmed_up_engine(10_000, 200);

    group.bench_function("tick_at_steady_state", |b| {
        b.iter(|| {
            black_box(engine.tick().expect("population already generated"));
        });
    });

    group.finish();
}

criterion_group!(benches, bench_tick_by_population, bench_steady_state_tick);
criterion_main!(benches);
