mod common;

use adaptive_sag::{
    Family, GlmErr, LineSearchSag, SagState, Status, StepSizeRule, TrainerSpec, fit_path,
};
use approx::assert_abs_diff_eq;
use common::{padded_identity, ridge_solution, small_regression, trainer_spec};

fn line_search(spec: TrainerSpec, step_size: StepSizeRule) -> LineSearchSag {
    LineSearchSag::from_spec(&TrainerSpec { step_size, ..spec }).unwrap()
}

fn cyclic(len: usize, n: usize) -> Vec<usize> {
    (0..len).map(|k| k % n).collect()
}

/// Fractional parts of `k * (sqrt(5) - 1) / 2`, scaled to example indices.
fn golden_indices(len: usize, n: usize) -> Vec<usize> {
    let phi = (5f64.sqrt() - 1.) / 2.;
    (1..=len)
        .map(|k| ((k as f64 * phi).fract() * n as f64) as usize)
        .collect()
}

#[test]
fn logistic_scenario_converges_under_both_rules() {
    let data = padded_identity();

    for rule in [StepSizeRule::Lipschitz, StepSizeRule::StronglyConvex] {
        let trainer = line_search(trainer_spec(Family::Bernoulli, 0.01, 1e-6, 3000), rule);
        let mut state = SagState::shared_for_dataset(&data, 1.);

        let report = trainer.fit(&data, &mut state, cyclic(3000, 4)).unwrap();

        assert_eq!(report.convergence_code(), 0);
        assert!(report.iterations < 100);
        assert!(state.covered.iter().all(|&c| c));
        assert_eq!(state.lipschitz.len(), 1);
        assert!(state.lipschitz[0] > 0.);

        assert_abs_diff_eq!(state.weights[0], 2.2929, epsilon = 1e-3);
        assert_abs_diff_eq!(state.weights[1], -2.2929, epsilon = 1e-3);
    }
}

#[test]
fn ridge_path_matches_closed_form() {
    let data = small_regression();
    let lambdas = [1., 0.1, 0.01];

    for rule in [StepSizeRule::Lipschitz, StepSizeRule::StronglyConvex] {
        let trainer = line_search(trainer_spec(Family::Gaussian, 1., 1e-8, 20000), rule);
        let mut state = SagState::shared_for_dataset(&data, 1.);

        let path = fit_path(&trainer, &data, &mut state, &lambdas, |_| {
            Ok(golden_indices(20000, 4))
        })
        .unwrap();

        assert_eq!(path.convergence_codes(), vec![0, 0, 0]);
        for (k, &lambda) in lambdas.iter().enumerate() {
            let expected = ridge_solution(&data, lambda);
            assert_abs_diff_eq!(path.weights[[0, k]], expected[0], epsilon = 1e-6);
            assert_abs_diff_eq!(path.weights[[1, k]], expected[1], epsilon = 1e-6);
        }
    }
}

#[test]
fn sparse_and_dense_runs_agree() {
    let dense = small_regression();
    let sparse = dense.to_sparse();
    let trainer = line_search(
        trainer_spec(Family::Poisson, 0.05, 1e-9, 2000),
        StepSizeRule::StronglyConvex,
    );

    let mut dense_state = SagState::shared_for_dataset(&dense, 0.5);
    let mut sparse_state = SagState::shared_for_dataset(&sparse, 0.5);

    let dense_report = trainer
        .fit(&dense, &mut dense_state, golden_indices(2000, 4))
        .unwrap();
    let sparse_report = trainer
        .fit(&sparse, &mut sparse_state, golden_indices(2000, 4))
        .unwrap();

    assert_eq!(dense_report.status, sparse_report.status);
    assert_eq!(dense_report.iterations, sparse_report.iterations);
    assert_abs_diff_eq!(dense_state.lipschitz[0], sparse_state.lipschitz[0], epsilon = 1e-12);
    for (a, b) in dense_state.weights.iter().zip(&sparse_state.weights) {
        assert_abs_diff_eq!(a, b, epsilon = 1e-9);
    }
}

#[test]
fn single_index_budget_is_exhausted() {
    let data = small_regression();
    let trainer = line_search(
        trainer_spec(Family::Gaussian, 0.1, 1e-8, 1),
        StepSizeRule::Lipschitz,
    );
    let mut state = SagState::shared_for_dataset(&data, 1.);

    let mut solver = trainer.solver(&data, &mut state, vec![0]).unwrap();
    assert_eq!(solver.step(), Status::BudgetExhausted);
    assert_eq!(solver.n_covered(), 1);

    let report = solver.finish();
    assert_eq!(report.convergence_code(), 1);
    assert_eq!(report.iterations, 1);
    assert_eq!(state.covered, vec![true, false, false, false]);
}

#[test]
fn invalid_inputs_leave_state_untouched() {
    let data = small_regression();
    let trainer = line_search(
        trainer_spec(Family::Gaussian, 0.1, 1e-8, 3),
        StepSizeRule::Lipschitz,
    );

    let mut state = SagState::shared_for_dataset(&data, 1.);
    let before = state.clone();
    assert_eq!(
        trainer.fit(&data, &mut state, vec![0, 4, 1]),
        Err(GlmErr::InvalidInput("example index out of bounds"))
    );
    assert_eq!(state, before);

    assert_eq!(
        trainer.fit(&data, &mut state, vec![0, 1]),
        Err(GlmErr::SizeMismatch {
            what: "example indices",
            got: 2,
            expected: 3,
        })
    );
    assert_eq!(state, before);

    let mut state = SagState::for_dataset(&data, 1.);
    let before = state.clone();
    assert_eq!(
        trainer.fit(&data, &mut state, vec![0, 1, 2]),
        Err(GlmErr::SizeMismatch {
            what: "lipschitz estimates",
            got: 4,
            expected: 1,
        })
    );
    assert_eq!(state, before);
}
