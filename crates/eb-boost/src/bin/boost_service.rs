// Demo estimation service: fits a synthetic session and persists the record

use std::path::Path;

use anyhow::Result;
use ndarray::{array, Array2};
use rand::{Rng, SeedableRng};
use rand::rngs::StdRng;
use tracing::info;
use tracing_subscriber::EnvFilter;

use eb_boost::{apply_kernel, boost};
use eb_types::{BoostConfig, BoostRecord, SignalSet};

fn main() -> Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .init();

    let workers: usize = std::env::var("EB_BOOST_WORKERS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(4);

    // synthetic session: three responses driven by two shared predictors
    let mut rng = StdRng::seed_from_u64(2024);
    let samples = 4_000;
    let tstep = 0.01;
    let predictors = Array2::from_shape_fn((2, samples), |_| rng.gen_range(-1.0..1.0));

    let true_kernels = [
        array![[0.0, 0.6, 0.3, 0.0, 0.0], [0.0, 0.0, -0.4, 0.0, 0.0]],
        array![[0.2, 0.0, 0.0, 0.0, -0.2], [0.0, 0.5, 0.0, 0.0, 0.0]],
        array![[0.0, 0.0, 0.0, 0.0, 0.0], [0.0, 0.0, 0.0, 0.0, 0.0]],
    ];
    let mut response = Array2::zeros((true_kernels.len(), samples));
    for (i, kernel) in true_kernels.iter().enumerate() {
        let clean = apply_kernel(predictors.view(), kernel);
        for (t, value) in clean.iter().enumerate() {
            response[[i, t]] = value + 0.05 * rng.gen_range(-1.0..1.0);
        }
    }

    let signals = SignalSet::new(response, predictors, tstep)?;
    let config = BoostConfig::default()
        .with_step_size(0.01)
        .with_folds(10)
        .with_workers(workers);

    let record = boost(&signals, 0.0, 0.05, &config)?;
    for i in 0..record.n_signals() {
        info!(
            signal = i,
            pearson = record.pearson_r[i],
            spearman = record.spearman_r[i],
            degenerate = record.degenerate[i],
            "fit quality"
        );
    }

    let out_dir = std::env::var("EB_BOOST_OUT").unwrap_or_else(|_| "runs".to_string());
    std::fs::create_dir_all(&out_dir)?;
    let path = Path::new(&out_dir).join(format!("boost-{}.json", record.id));
    record.save(&path)?;
    info!(path = %path.display(), "record saved");

    let reloaded = BoostRecord::load(&path)?;
    info!(id = %reloaded.id, signals = reloaded.n_signals(), "record reloaded");

    Ok(())
}
