mod common;

use adaptive_sag::{AdaptiveSag, Family, SagState, fit_path};
use approx::assert_abs_diff_eq;
use common::{golden_draws, ridge_solution, small_regression, trainer_spec};

#[test]
fn ridge_path_matches_closed_form() {
    let data = small_regression();
    let trainer = AdaptiveSag::from_spec(&trainer_spec(Family::Gaussian, 1., 1e-8, 20000)).unwrap();
    let mut state = SagState::for_dataset(&data, 1.);
    let lambdas = [1., 0.1, 0.01];

    let path = fit_path(&trainer, &data, &mut state, &lambdas, |_| Ok(golden_draws(20000))).unwrap();

    assert_eq!(path.convergence_codes(), vec![0, 0, 0]);
    assert_eq!(path.weights.dim(), (2, 3));

    for (k, &lambda) in lambdas.iter().enumerate() {
        let expected = ridge_solution(&data, lambda);
        assert_abs_diff_eq!(path.weights[[0, k]], expected[0], epsilon = 1e-6);
        assert_abs_diff_eq!(path.weights[[1, k]], expected[1], epsilon = 1e-6);
    }

    assert_eq!(state.weights, path.weights.column(2));
}

#[test]
fn invalid_strength_fails_before_training() {
    let data = small_regression();
    let trainer = AdaptiveSag::from_spec(&trainer_spec(Family::Gaussian, 1., 1e-8, 100)).unwrap();
    let mut state = SagState::for_dataset(&data, 1.);
    let before = state.clone();

    let result = fit_path(&trainer, &data, &mut state, &[0.5, -0.1], |_| Ok(golden_draws(100)));

    assert!(result.is_err());
    assert_eq!(state, before);
}
