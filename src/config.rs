use std::num::NonZeroUsize;

use glm_core::{Dataset, DesignMatrix, Family, Result};
use ndarray::Array1;
use serde::{Deserialize, Serialize};

use crate::{lipschitz::DEFAULT_PRECISION, sag::StepSizeRule};

/// How a trainer picks the example of each iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Selection {
    /// Importance sampling over per-example Lipschitz estimates (`AdaptiveSag`).
    #[default]
    Importance,
    /// Uniformly drawn example indices with one shared estimate (`LineSearchSag`).
    Uniform,
}

/// The scalars of a trainer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainerSpec {
    pub family: Family,
    /// The `l2` regularization strength.
    pub lambda: f64,
    /// The gradient norm under which training stops.
    pub tol: f64,
    pub max_iter: NonZeroUsize,
    /// Backtracking stops once `g^2 * ||x_i||^2` falls under this.
    #[serde(default = "default_precision")]
    pub precision: f64,
    /// Whether Lipschitz estimates may shrink again (halve-then-double).
    #[serde(default = "default_increasing")]
    pub increasing: bool,
    #[serde(default)]
    pub selection: Selection,
    /// The step size of `LineSearchSag`, ignored by `AdaptiveSag`.
    #[serde(default)]
    pub step_size: StepSizeRule,
}

fn default_precision() -> f64 {
    DEFAULT_PRECISION
}

fn default_increasing() -> bool {
    true
}

impl TrainerSpec {
    /// Creates a new `TrainerSpec` with the default precision and the
    /// halve-then-double line search.
    pub fn new(family: Family, lambda: f64, tol: f64, max_iter: NonZeroUsize) -> Self {
        Self {
            family,
            lambda,
            tol,
            max_iter,
            precision: default_precision(),
            increasing: default_increasing(),
            selection: Selection::default(),
            step_size: StepSizeRule::default(),
        }
    }
}

/// The examples of a run, column-major: example `i` is column `i`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DatasetSpec {
    Dense {
        n_features: usize,
        values: Vec<f64>,
        targets: Vec<f64>,
    },
    Sparse {
        n_features: usize,
        values: Vec<f64>,
        row_indices: Vec<usize>,
        col_offsets: Vec<usize>,
        targets: Vec<f64>,
    },
}

impl DatasetSpec {
    /// Builds the dataset this spec describes.
    ///
    /// # Returns
    /// An error if the matrix is malformed or its width disagrees with the targets.
    pub fn into_dataset(self) -> Result<Dataset> {
        let (x, targets) = match self {
            DatasetSpec::Dense {
                n_features,
                values,
                targets,
            } => (DesignMatrix::dense(n_features, values)?, targets),
            DatasetSpec::Sparse {
                n_features,
                values,
                row_indices,
                col_offsets,
                targets,
            } => (
                DesignMatrix::sparse(n_features, values, row_indices, col_offsets)?,
                targets,
            ),
        };

        Dataset::new(x, Array1::from(targets))
    }
}

/// A complete command-line run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSpec {
    pub trainer: TrainerSpec,
    pub dataset: DatasetSpec,
    /// A decreasing sequence of strengths to fit as a path, overrides
    /// `trainer.lambda` when present.
    #[serde(default)]
    pub lambdas: Option<Vec<f64>>,
    pub seed: Option<u64>,
    #[serde(default = "default_lipschitz")]
    pub initial_lipschitz: f64,
}

fn default_lipschitz() -> f64 {
    1.
}

#[cfg(test)]
mod tests {
    use super::*;
    use glm_core::GlmErr;

    #[test]
    fn run_spec_fills_defaults() {
        let json = r#"{
            "trainer": { "family": "bernoulli", "lambda": 0.01, "tol": 1e-6, "max_iter": 100 },
            "dataset": { "dense": { "n_features": 2, "values": [1, 0, 0, 1], "targets": [1, -1] } },
            "seed": null
        }"#;

        let spec: RunSpec = serde_json::from_str(json).unwrap();
        assert_eq!(spec.trainer.family, Family::Bernoulli);
        assert_eq!(spec.trainer.precision, DEFAULT_PRECISION);
        assert!(spec.trainer.increasing);
        assert_eq!(spec.trainer.selection, Selection::Importance);
        assert_eq!(spec.trainer.step_size, StepSizeRule::Lipschitz);
        assert_eq!(spec.initial_lipschitz, 1.);
        assert!(spec.lambdas.is_none());

        let data = spec.dataset.into_dataset().unwrap();
        assert_eq!(data.n_features(), 2);
        assert_eq!(data.n_examples(), 2);
        assert!(!data.x().is_sparse());
    }

    #[test]
    fn uniform_selection_with_strongly_convex_steps() {
        let json = r#"{
            "family": "gaussian", "lambda": 0.1, "tol": 1e-6, "max_iter": 10,
            "selection": "uniform", "step_size": "strongly_convex"
        }"#;

        let spec: TrainerSpec = serde_json::from_str(json).unwrap();
        assert_eq!(spec.selection, Selection::Uniform);
        assert_eq!(spec.step_size, StepSizeRule::StronglyConvex);
    }

    #[test]
    fn zero_budget_is_rejected() {
        let json = r#"{ "family": "gaussian", "lambda": 0.1, "tol": 0.0, "max_iter": 0 }"#;
        assert!(serde_json::from_str::<TrainerSpec>(json).is_err());
    }

    #[test]
    fn sparse_dataset_spec() {
        let spec = DatasetSpec::Sparse {
            n_features: 3,
            values: vec![1., 2., 3.],
            row_indices: vec![0, 2, 1],
            col_offsets: vec![0, 2, 3],
            targets: vec![0.5, 1.5],
        };

        let data = spec.into_dataset().unwrap();
        assert!(data.x().is_sparse());
        assert_eq!(data.n_examples(), 2);
    }

    #[test]
    fn mismatched_targets_are_rejected() {
        let spec = DatasetSpec::Dense {
            n_features: 2,
            values: vec![1., 0., 0., 1.],
            targets: vec![1.],
        };

        assert!(matches!(
            spec.into_dataset(),
            Err(GlmErr::SizeMismatch { what: "targets", .. })
        ));
    }
}
