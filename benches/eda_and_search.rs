//! Benchmarks for the EDA summary and grid search kernels.
//!
//! Run with: `cargo bench`
//!
//! This benchmark measures:
//! - Summary and flag computation on the example dataset
//! - Grid search over a small SVC grid with stratified folds

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use mlp::modeling::cv::StratifiedKFold;
use mlp::modeling::{GridSearch, LabelEncoder, PipelineFactory, Scoring};
use mlp::models::{
    EstimatorConfig, HyperParam, ParamMap, ParamScalar, PreprocessConfig, ScoringConfig,
    StepsConfig,
};
use mlp::services::{EdaSummarizer, example_dataset};
use std::hint::black_box;

fn bench_eda_summary(c: &mut Criterion) {
    let (x, y) = example_dataset(42)
        .split_target("target")
        .expect("example dataset has a target column");

    c.bench_function("eda_summary_compute", |b| {
        b.iter(|| EdaSummarizer::compute(black_box(&x), black_box(Some(&y))))
    });
}

fn svc_steps(candidates: usize) -> StepsConfig {
    let mut params = ParamMap::new();
    params.insert(
        "C".into(),
        HyperParam::Many((1..=candidates).map(|c| ParamScalar::Float(c as f64 * 0.5)).collect()),
    );
    params.insert("kernel".into(), HyperParam::One(ParamScalar::Text("linear".into())));
    StepsConfig {
        preprocess: Some(PreprocessConfig {
            imputer: None,
            scaler: Some("standard".into()),
        }),
        estimator: Some(EstimatorConfig {
            kind: "svc".into(),
            params: Some(params),
        }),
        ..StepsConfig::default()
    }
}

fn bench_grid_search(c: &mut Criterion) {
    let (x, y) = example_dataset(42)
        .split_target("target")
        .expect("example dataset has a target column");
    let matrix = x.to_matrix().expect("example features are numeric");
    let (encoder, labels) = LabelEncoder::fit_transform(&y).expect("target has no missing values");
    let scoring = Scoring::resolve(&ScoringConfig::One("accuracy".into()), None)
        .expect("accuracy is a known metric");
    let folds = StratifiedKFold::new(3, true, 42)
        .and_then(|kfold| kfold.split(&labels))
        .expect("both classes have at least three members");

    let mut group = c.benchmark_group("grid_search");
    group.sample_size(10);
    for candidates in [1usize, 2, 4] {
        let (pipeline, grid) = PipelineFactory::new(42)
            .build_pipeline(&svc_steps(candidates))
            .expect("svc steps build");
        let search = GridSearch::new(&pipeline, &grid, &scoring, &folds);
        group.bench_with_input(BenchmarkId::from_parameter(candidates), &search, |b, search| {
            b.iter(|| search.run(black_box(&matrix), black_box(&labels), encoder.n_classes()))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_eda_summary, bench_grid_search);
criterion_main!(benches);
