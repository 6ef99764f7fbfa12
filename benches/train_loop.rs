//! Benchmarks for the decision engine and the training loop.

use criterion::{Criterion, black_box, criterion_group, criterion_main};

use pulseloom::agent::{AgentConfig, BootstrapAgent};
use pulseloom::partner::make_partner;
use pulseloom::trainer::{DriftConfig, RoundOptions, Trainer};

fn populated_agent(handles: u64) -> BootstrapAgent {
    let mut agent = BootstrapAgent::new(AgentConfig::default()).unwrap();
    for i in 1..=handles {
        let stimulus = format!("{},{}", i % 12 + 1, i % 7 + 1);
        let response = format!("{}", i % 9 + 1);
        agent
            .registry_mut()
            .create(stimulus, response, 0.6, 0.5);
    }
    agent
}

fn bench_predict(c: &mut Criterion) {
    let mut agent = populated_agent(500);

    c.bench_function("predict_500_handles", |bench| {
        bench.iter(|| black_box(agent.predict(&[3, 2])))
    });
}

fn bench_observe(c: &mut Criterion) {
    let mut agent = populated_agent(500);

    c.bench_function("observe_500_handles", |bench| {
        bench.iter(|| black_box(agent.observe(&[3, 2], &[3], true, false, 0.0)))
    });
}

fn bench_train_round(c: &mut Criterion) {
    c.bench_function("train_round_mixed_30", |bench| {
        bench.iter_with_setup(
            || {
                let agent = BootstrapAgent::new(AgentConfig {
                    seed_proto_handles: true,
                    ..Default::default()
                })
                .unwrap();
                let partner = make_partner("mixed", 0).unwrap();
                Trainer::new(
                    agent,
                    partner,
                    RoundOptions::default(),
                    DriftConfig::default(),
                    0,
                )
                .unwrap()
            },
            |mut trainer| black_box(trainer.train_round()),
        )
    });
}

criterion_group!(benches, bench_predict, bench_observe, bench_train_round);
criterion_main!(benches);
