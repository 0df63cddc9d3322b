//! Warm-started fits over a sequence of regularization strengths.

use glm_core::{Dataset, LinearAlgebra, Result};
use log::debug;
use ndarray::Array2;

use crate::sag::{FitReport, SagState, Trainer};

/// The models along a regularization path.
#[derive(Debug, Clone)]
pub struct PathReport {
    pub lambdas: Vec<f64>,
    /// One column of weights per strength.
    pub weights: Array2<f64>,
    pub reports: Vec<FitReport>,
}

impl PathReport {
    pub fn convergence_codes(&self) -> Vec<i32> {
        self.reports.iter().map(FitReport::convergence_code).collect()
    }
}

/// Fits one model per strength, each one warm-started from the previous.
///
/// # Arguments
/// * `trainer` - The trainer whose strength is replaced at every step.
/// * `data` - The examples.
/// * `state` - The starting state, holds the last model afterwards.
/// * `lambdas` - The strengths, usually decreasing.
/// * `selection` - Builds the example selection of the `k`-th fit, draws for
///   `AdaptiveSag` or example indices for `LineSearchSag`.
///
/// # Returns
/// An error before any training if a strength is invalid, or as soon as a fit
/// rejects its inputs.
pub fn fit_path<T, S, F>(
    trainer: &T,
    data: &Dataset,
    state: &mut SagState,
    lambdas: &[f64],
    mut selection: F,
) -> Result<PathReport>
where
    T: Trainer<S>,
    F: FnMut(usize) -> Result<S>,
{
    let trainers = lambdas
        .iter()
        .map(|&lambda| trainer.with_lambda(lambda))
        .collect::<Result<Vec<_>>>()?;

    let mut weights = Array2::zeros((data.n_features(), lambdas.len()));
    let mut reports = Vec::with_capacity(lambdas.len());

    for (k, trainer) in trainers.iter().enumerate() {
        let report = trainer.fit(data, state, selection(k)?)?;
        debug!(
            step = k,
            lambda = trainer.lambda(),
            iterations = report.iterations,
            statistic = report.statistic;
            "path step done"
        );

        trainer
            .blas()
            .copy(state.weights.view(), weights.column_mut(k));
        reports.push(report);
    }

    Ok(PathReport {
        lambdas: lambdas.to_vec(),
        weights,
        reports,
    })
}
