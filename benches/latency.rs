//! Latency benchmarks for the forecast pipeline.
//!
//! ```bash
//! cargo bench
//! cargo bench -- engineer_features
//!
//! # With a real ONNX model and preprocessor in benches/
//! cargo bench -- end_to_end
//! ```

use std::sync::Arc;

use chrono::{Days, NaiveDate};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use ndarray::Array3;

use close_forecast::{
    engineer_features, predict_next_close, ArtifactBundle, Candle, FeatureSchema, RollingWindow,
    Scaler, ScalerAdapter, SequenceBuilder, SequenceModel,
};

struct MeanModel;

impl SequenceModel for MeanModel {
    fn predict(&self, input: &Array3<f32>) -> anyhow::Result<f32> {
        Ok(input.mean().unwrap_or_default())
    }

    fn name(&self) -> &str {
        "mean"
    }
}

fn candles(n: usize) -> Vec<Candle> {
    let start = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
    (0..n)
        .map(|i| {
            let close = 100.0 + (i as f64 * 0.05).sin() * 5.0 + i as f64 * 0.02;
            Candle::new(
                start + Days::new(i as u64),
                close - 0.3,
                close + 1.0,
                close - 1.0,
                close,
                1_000_000.0 + (i % 7) as f64 * 5_000.0,
            )
        })
        .collect()
}

fn benchmark_rolling_window(c: &mut Criterion) {
    c.bench_function("rolling_window_push_std", |b| {
        let mut window = RollingWindow::new(20);
        let mut i = 0u64;
        b.iter(|| {
            window.push(black_box(100.0 + (i % 13) as f64));
            let _ = window.sample_std();
            i += 1;
        });
    });
}

fn benchmark_features(c: &mut Criterion) {
    let mut group = c.benchmark_group("engineer_features");

    // ~200 trading days is what a 300-calendar-day fetch returns
    for rows in [120usize, 200, 500] {
        let data = candles(rows);
        group.bench_with_input(BenchmarkId::from_parameter(rows), &data, |b, data| {
            b.iter(|| engineer_features(black_box(data)));
        });
    }

    group.finish();
}

fn benchmark_window_and_scaling(c: &mut Criterion) {
    let frame = engineer_features(&candles(200));
    let schema = FeatureSchema::full();
    let scaler = Scaler::Standard {
        mean: vec![100.0; schema.len()],
        scale: vec![10.0; schema.len()],
    };

    c.bench_function("sequence_build", |b| {
        let builder = SequenceBuilder::new(&schema, 60);
        b.iter(|| builder.build(black_box(&frame)));
    });

    c.bench_function("scale_window", |b| {
        let window = SequenceBuilder::new(&schema, 60).build(&frame).unwrap();
        let adapter = ScalerAdapter::new(&scaler, &schema).unwrap();
        b.iter(|| adapter.forward(black_box(&window)));
    });
}

fn benchmark_pipeline(c: &mut Criterion) {
    let schema = FeatureSchema::full();
    let bundle = ArtifactBundle::new(
        Arc::new(MeanModel),
        Scaler::identity(schema.len()),
        schema,
    )
    .unwrap();
    let data = candles(200);

    c.bench_function("predict_next_close_stub_model", |b| {
        b.iter(|| predict_next_close(&bundle, black_box(&data), 60));
    });
}

//
// End-to-end with real artifacts.
// Place lstm_stock_model.onnx and preprocessor.json in benches/ to enable.
//

fn benchmark_end_to_end(c: &mut Criterion) {
    use close_forecast::{ArtifactLoader, ArtifactPaths, FsArtifactLoader};
    use std::path::PathBuf;

    let paths = ArtifactPaths::in_dir(&PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("benches"));
    if !paths.model_path.exists() {
        eprintln!(
            "Skipping end-to-end benchmarks: model not found at {}",
            paths.model_path.display()
        );
        return;
    }

    let bundle = match FsArtifactLoader::new(paths).load() {
        Ok(bundle) => bundle,
        Err(e) => {
            eprintln!("Skipping end-to-end benchmarks: {e}");
            return;
        }
    };
    let data = candles(200);

    c.bench_function("end_to_end_onnx", |b| {
        b.iter(|| predict_next_close(&bundle, black_box(&data), 60));
    });
}

criterion_group!(
    benches,
    benchmark_rolling_window,
    benchmark_features,
    benchmark_window_and_scaling,
    benchmark_pipeline,
    benchmark_end_to_end,
);
criterion_main!(benches);
