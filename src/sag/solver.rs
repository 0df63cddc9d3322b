use glm_core::{Dataset, LinearAlgebra, LossFamily};
use log::{info, warn};
use ndarray::Array1;

use super::{FitReport, Objective, Status, policy::Importance, policy::Policy};
use crate::{
    ledger::DeferredDecayLedger,
    lipschitz::{LipschitzEstimator, Visit},
    sampling::ImportanceSampler,
};

/// Floor applied to the curvature sums before inverting them into step sizes.
pub const MIN_CURVATURE: f64 = 1e-12;

/// The caller-owned buffers a solver trains in place.
pub(super) struct Buffers<'a> {
    pub weights: &'a mut Array1<f64>,
    pub direction: &'a mut Array1<f64>,
    pub gradients: &'a mut Array1<f64>,
    pub covered: &'a mut [bool],
}

/// A training call in progress.
///
/// The solver borrows the caller's state for its whole lifetime and advances
/// one iteration per `step`. Between steps the weight buffer of a sparse run
/// holds the lazily decayed representation, use `weights` to read the actual
/// values. The pending decay is flushed by `finish`, or when the solver is
/// dropped, so the state can always be trained again.
pub struct SagSolver<'a, L, B: LinearAlgebra, P> {
    objective: &'a Objective<L, B>,
    data: &'a Dataset,

    weights: &'a mut Array1<f64>,
    direction: &'a mut Array1<f64>,
    gradients: &'a mut Array1<f64>,
    covered: &'a mut [bool],
    n_covered: usize,

    policy: P,
    ledger: Option<DeferredDecayLedger>,

    iteration: usize,
    statistic: f64,
    status: Status,
}

impl<'a, L, B, P> SagSolver<'a, L, B, P>
where
    L: LossFamily,
    B: LinearAlgebra,
    P: Policy,
{
    /// Builds a solver over already validated buffers.
    pub(super) fn new(
        objective: &'a Objective<L, B>,
        data: &'a Dataset,
        buffers: Buffers<'a>,
        policy: P,
    ) -> Self {
        let Buffers {
            weights,
            direction,
            gradients,
            covered,
        } = buffers;

        let ledger = data
            .x()
            .is_sparse()
            .then(|| DeferredDecayLedger::new(data.n_features(), objective.max_iter.get()));

        let mut solver = Self {
            objective,
            data,
            n_covered: covered.iter().filter(|&&c| c).count(),
            weights,
            direction,
            gradients,
            covered,
            policy,
            ledger,
            iteration: 0,
            statistic: f64::INFINITY,
            status: Status::Running,
        };

        solver.statistic = solver.gradient_norm();
        solver
    }

    /// Runs one iteration.
    ///
    /// # Returns
    /// The status after the iteration. Once terminal, further calls do nothing.
    pub fn step(&mut self) -> Status {
        if self.status != Status::Running {
            return self.status;
        }

        let objective = self.objective;
        let blas = &objective.blas;
        let lambda = objective.lambda;
        let data = self.data;
        let x = data.x();

        let Some(i) = self.policy.select(lambda) else {
            return self.exhaust();
        };
        let target = data.y()[i];

        let eta = match &mut self.ledger {
            Some(ledger) => {
                let weights = &mut *self.weights;
                let direction = &*self.direction;
                x.for_each_nonzero(i, |j, _| ledger.catch_up(j, weights, direction));
                ledger.scale() * x.dot(blas, i, self.weights.view())
            }
            None => x.dot(blas, i, self.weights.view()),
        };

        let gradient = objective.family.gradient(target, eta);
        x.axpy(blas, i, gradient - self.gradients[i], self.direction.view_mut());
        self.gradients[i] = gradient;

        let was_covered = self.covered[i];
        if !was_covered {
            self.covered[i] = true;
            self.n_covered += 1;
        }

        let visit = Visit {
            target,
            eta,
            gradient,
            squared_norm: x.squared_norm(blas, i),
        };
        self.policy
            .observe(i, was_covered, self.n_covered, &objective.family, &visit);

        let alpha = self
            .policy
            .step_size(self.covered.len(), self.n_covered, lambda);

        match &mut self.ledger {
            Some(ledger) => {
                ledger.record_step(alpha, lambda, self.n_covered);
                if ledger.needs_rebase() {
                    ledger.flush(blas, self.weights, self.direction);
                }
            }
            None => {
                blas.scal(1. - alpha * lambda, self.weights.view_mut());
                blas.axpy(
                    -alpha / self.n_covered as f64,
                    self.direction.view(),
                    self.weights.view_mut(),
                );
            }
        }

        self.policy.decay();
        self.iteration += 1;
        self.statistic = self.gradient_norm();

        if self.statistic <= objective.tol {
            info!(
                "tolerance met at iteration {} (gradient norm {:e})",
                self.iteration, self.statistic
            );
            self.status = Status::Converged;
        } else if self.iteration >= objective.max_iter.get() {
            return self.exhaust();
        }

        self.status
    }

    /// Steps until a terminal status is reached, then finishes.
    pub fn run(mut self) -> FitReport {
        while self.step() == Status::Running {}
        self.finish()
    }

    fn exhaust(&mut self) -> Status {
        warn!(
            "optimisation stopped before convergence: {}/{} (gradient norm {:e})",
            self.iteration,
            self.objective.max_iter.get(),
            self.statistic
        );

        self.status = Status::BudgetExhausted;
        self.status
    }

    pub fn policy(&self) -> &P {
        &self.policy
    }
}

impl<'a, L, B: LinearAlgebra, P> SagSolver<'a, L, B, P> {
    /// Flushes the pending decay into the weights and reports the call.
    pub fn finish(mut self) -> FitReport {
        self.settle();

        FitReport {
            status: self.status,
            iterations: self.iteration,
            statistic: self.statistic,
        }
    }

    /// Leaves the weight buffer holding the actual weights.
    fn settle(&mut self) {
        if let Some(mut ledger) = self.ledger.take() {
            ledger.flush(&self.objective.blas, self.weights, self.direction);
        }
    }

    /// Norm of `lambda * w + d / nCovered`, the approximate gradient of the
    /// regularized objective, taken on the actual weights.
    fn gradient_norm(&self) -> f64 {
        let lambda = self.objective.lambda;
        let n_covered = self.n_covered.max(1) as f64;
        let (weights, direction) = (&*self.weights, &*self.direction);

        (0..weights.len())
            .map(|j| {
                let w = match &self.ledger {
                    Some(ledger) => ledger.materialize(j, weights, direction),
                    None => weights[j],
                };
                (lambda * w + direction[j] / n_covered).powi(2)
            })
            .sum::<f64>()
            .sqrt()
    }

    pub fn status(&self) -> Status {
        self.status
    }

    /// Returns the number of completed iterations.
    pub fn iteration(&self) -> usize {
        self.iteration
    }

    /// Returns the stopping statistic after the last iteration.
    pub fn statistic(&self) -> f64 {
        self.statistic
    }

    pub fn n_covered(&self) -> usize {
        self.n_covered
    }

    pub fn covered(&self) -> &[bool] {
        self.covered
    }

    pub fn direction(&self) -> &Array1<f64> {
        self.direction
    }

    /// Returns the current weights, pending sparse decay included.
    pub fn weights(&self) -> Array1<f64> {
        let (weights, direction) = (&*self.weights, &*self.direction);

        match &self.ledger {
            Some(ledger) => {
                Array1::from_shape_fn(weights.len(), |j| ledger.materialize(j, weights, direction))
            }
            None => weights.clone(),
        }
    }
}

impl<'a, L, B: LinearAlgebra, D> SagSolver<'a, L, B, Importance<'a, D>> {
    pub fn sampler(&self) -> &ImportanceSampler {
        self.policy.sampler()
    }

    pub fn estimator(&self) -> &LipschitzEstimator<'a> {
        self.policy.estimator()
    }
}

impl<L, B: LinearAlgebra, P> Drop for SagSolver<'_, L, B, P> {
    fn drop(&mut self) {
        self.settle();
    }
}

/// Blends `1 / (Lmax + lambda)` for the uncovered fraction with the mean of
/// `1 / (Lmax + lambda)` and `1 / (Lmean + lambda)` for the covered one.
pub fn blended_step_size(
    n_examples: usize,
    n_covered: usize,
    lmax: f64,
    lmean: f64,
    lambda: f64,
) -> f64 {
    let n = n_examples as f64;
    let nc = n_covered as f64;
    let inv_max = 1. / (lmax + lambda).max(MIN_CURVATURE);
    let inv_mean = 1. / (lmean + lambda).max(MIN_CURVATURE);

    ((n - nc) / n) * inv_max + (nc / n) * (inv_max / 2. + inv_mean / 2.)
}
