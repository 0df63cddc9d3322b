use std::{env, fs};

use adaptive_sag::{
    AdaptiveSag, Dataset, LineSearchSag, RandomDraws, RunSpec, SagState, Selection, Trainer,
    fit_path,
};
use anyhow::{Context, bail};
use log::info;
use rand::{Rng, SeedableRng, rngs::StdRng};
use serde_json::{Value, json};

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let Some(path) = env::args().nth(1) else {
        bail!("usage: adaptive-sag <run.json>");
    };

    let content = fs::read_to_string(&path).with_context(|| format!("reading {path}"))?;
    let spec: RunSpec = serde_json::from_str(&content).context("invalid run spec")?;

    let data = spec.dataset.into_dataset()?;
    let seed = spec.seed.unwrap_or_else(rand::random);
    let lambdas = spec.lambdas.as_deref();
    info!("loaded {path}: seed={seed}");

    let report = match spec.trainer.selection {
        Selection::Importance => {
            let trainer = AdaptiveSag::from_spec(&spec.trainer)?;
            let mut state = SagState::for_dataset(&data, spec.initial_lipschitz);

            run(&trainer, &data, &mut state, lambdas, |k| {
                RandomDraws::new(StdRng::seed_from_u64(seed.wrapping_add(k as u64)))
            })?
        }
        Selection::Uniform => {
            let trainer = LineSearchSag::from_spec(&spec.trainer)?;
            let mut state = SagState::shared_for_dataset(&data, spec.initial_lipschitz);
            let (n, max_iter) = (data.n_examples(), trainer.max_iter());

            run(&trainer, &data, &mut state, lambdas, |k| {
                let mut rng = StdRng::seed_from_u64(seed.wrapping_add(k as u64));
                Ok((0..max_iter).map(|_| rng.random_range(0..n)).collect())
            })?
        }
    };

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

/// Fits a single model, or a path when `lambdas` is given, and reports it as JSON.
fn run<T, S, F>(
    trainer: &T,
    data: &Dataset,
    state: &mut SagState,
    lambdas: Option<&[f64]>,
    mut selection: F,
) -> anyhow::Result<Value>
where
    T: Trainer<S>,
    F: FnMut(usize) -> adaptive_sag::Result<S>,
{
    let Some(lambdas) = lambdas else {
        let report = trainer.fit(data, state, selection(0)?)?;

        return Ok(json!({
            "weights": state.weights.to_vec(),
            "report": report,
            "convergence_code": report.convergence_code(),
        }));
    };

    let path = fit_path(trainer, data, state, lambdas, selection)?;
    let weights: Vec<Vec<f64>> = path
        .weights
        .columns()
        .into_iter()
        .map(|column| column.to_vec())
        .collect();

    Ok(json!({
        "lambdas": path.lambdas,
        "weights": weights,
        "reports": path.reports,
        "convergence_codes": path.convergence_codes(),
    }))
}
