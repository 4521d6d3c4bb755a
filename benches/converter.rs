use std::collections::BTreeMap;

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use optimizer_bo::backend::{BackendOptions, GpBackend};
use optimizer_bo::converter::SpaceConverter;
use optimizer_bo::distribution::Distribution;
use optimizer_bo::param::ParamValue;
use optimizer_bo::sampler::{BoSampler, RandomSampler, Sampler};
use optimizer_bo::search_space::SearchSpace;
use optimizer_bo::{Direction, FrozenTrial, InMemoryStudy};

/// A mixed space with `dims` continuous parameters plus one integer and one
/// categorical parameter.
fn build_space(dims: usize) -> SearchSpace {
    let mut space = BTreeMap::new();
    for i in 0..dims {
        space.insert(
            format!("x{i}"),
            Distribution::uniform(-5.0, 5.0).expect("valid bounds"),
        );
    }
    space.insert(
        "n".to_string(),
        Distribution::int_uniform(0, 10).expect("valid bounds"),
    );
    space.insert(
        "c".to_string(),
        Distribution::categorical(["a", "b", "c"]).expect("non-empty choices"),
    );
    space
}

/// Build a study holding `n` completed trials over `space`, scored by the sphere function.
fn build_history(n: usize, space: &SearchSpace) -> InMemoryStudy {
    let study = InMemoryStudy::new(Direction::Minimize);
    let sampler = RandomSampler::with_seed(42);

    for number in 0..n as u64 {
        let mut trial = FrozenTrial::completed(number, 0.0);
        let mut value = 0.0;
        for (name, distribution) in space {
            let param = sampler.draw(distribution);
            if let ParamValue::Float(f) = param {
                value += f * f;
            }
            trial.set_param(name.clone(), distribution.clone(), param);
        }
        trial.value = Some(value);
        study.push(trial);
    }
    study
}

fn bench_replay(c: &mut Criterion) {
    let mut group = c.benchmark_group("converter_replay");
    let space = build_space(4);
    let backend = GpBackend::new();
    let options = BackendOptions::new().with("n_initial_points", i64::MAX);

    for history_size in [10, 100, 1000] {
        let study = build_history(history_size, &space);
        group.bench_with_input(
            BenchmarkId::new("history", history_size),
            &study,
            |b, study| {
                b.iter(|| {
                    let mut converter = SpaceConverter::new(space.clone(), &backend, &options)
                        .expect("supported space");
                    converter.replay(study).expect("replay succeeds")
                });
            },
        );
    }
    group.finish();
}

fn bench_gp_relative(c: &mut Criterion) {
    let mut group = c.benchmark_group("gp_sample_relative");
    let space = build_space(2);
    let sampler = BoSampler::builder(GpBackend::new())
        .backend_option("n_initial_points", 1)
        .backend_option("n_candidates", 200)
        .backend_option("random_state", 42)
        .build()
        .expect("gp backend available");

    for history_size in [10, 50, 100] {
        let study = build_history(history_size, &space);
        let trial = FrozenTrial::new(history_size as u64);
        group.bench_with_input(
            BenchmarkId::new("history", history_size),
            &study,
            |b, study| {
                b.iter(|| {
                    let joint = sampler.infer_relative_search_space(study, &trial);
                    sampler
                        .sample_relative(study, &trial, &joint)
                        .expect("proposal succeeds")
                });
            },
        );
    }
    group.finish();
}

criterion_group!(benches, bench_replay, bench_gp_relative);
criterion_main!(benches);
