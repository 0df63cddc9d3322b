#![allow(dead_code)]

use std::num::NonZeroUsize;

use adaptive_sag::{Dataset, DesignMatrix, Family, PrecomputedDraws, TrainerSpec};
use ndarray::Array1;

/// Low-discrepancy draws: the fractional parts of `k * (sqrt(5) - 1) / 2` and
/// `k * (sqrt(2) - 1)`.
pub fn golden_draws(n: usize) -> PrecomputedDraws {
    let phi = (5f64.sqrt() - 1.) / 2.;
    let root = 2f64.sqrt() - 1.;

    let selection = (1..=n).map(|k| (k as f64 * phi).fract()).collect();
    let descent = (1..=n).map(|k| (k as f64 * root).fract()).collect();

    PrecomputedDraws::new(selection, descent).unwrap()
}

pub fn trainer_spec(family: Family, lambda: f64, tol: f64, max_iter: usize) -> TrainerSpec {
    TrainerSpec::new(family, lambda, tol, NonZeroUsize::new(max_iter).unwrap())
}

/// Two informative examples on orthogonal axes and two all-zero ones.
pub fn padded_identity() -> Dataset {
    let x = DesignMatrix::dense(2, vec![1., 0., 0., 1., 0., 0., 0., 0.]).unwrap();
    Dataset::new(x, Array1::from(vec![1., -1., 1., -1.])).unwrap()
}

pub fn small_regression() -> Dataset {
    let x = DesignMatrix::dense(2, vec![1., 0., 0., 1., 2., 1., 0.5, 0.]).unwrap();
    Dataset::new(x, Array1::from(vec![1., 2., 0.5, -1.])).unwrap()
}

/// Solves `(X X^T / n + lambda I) w = X y / n` for a two-feature dataset.
pub fn ridge_solution(data: &Dataset, lambda: f64) -> [f64; 2] {
    let DesignMatrix::Dense(x) = data.x() else {
        panic!("expected a dense matrix");
    };
    let y = data.y();
    let n = data.n_examples() as f64;

    let a = |r: usize, c: usize| {
        x.row(r).dot(&x.row(c)) / n + if r == c { lambda } else { 0. }
    };
    let b = |r: usize| x.row(r).dot(&y) / n;

    let det = a(0, 0) * a(1, 1) - a(0, 1) * a(1, 0);
    [
        (b(0) * a(1, 1) - a(0, 1) * b(1)) / det,
        (a(0, 0) * b(1) - a(1, 0) * b(0)) / det,
    ]
}
