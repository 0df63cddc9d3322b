//! Stochastic average gradient for `l2`-regularized generalized linear models.
//!
//! Two trainers share one solver loop: `AdaptiveSag` samples examples by
//! importance over per-example Lipschitz estimates, `LineSearchSag` follows a
//! caller-given example order with a single shared estimate.

mod policy;
mod solver;
mod state;

pub use policy::{Importance, Policy, Sequence, StepSizeRule};
pub use solver::{MIN_CURVATURE, SagSolver, blended_step_size};
pub use state::SagState;

use std::num::NonZeroUsize;

use glm_core::{
    Dataset, DrawSource, Family, GlmErr, LinearAlgebra, LossFamily, NdarrayBlas, Result,
};
use log::debug;
use serde::Serialize;

use crate::config::TrainerSpec;
use solver::Buffers;

/// The lifecycle of a training call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Running,
    /// The gradient norm fell to the tolerance.
    Converged,
    /// The iteration budget ran out first.
    BudgetExhausted,
}

/// The summary of a finished training call.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FitReport {
    pub status: Status,
    pub iterations: usize,
    /// The gradient norm after the last iteration.
    pub statistic: f64,
}

impl FitReport {
    /// Returns 0 if the tolerance was met, 1 otherwise.
    pub fn convergence_code(&self) -> i32 {
        match self.status {
            Status::Converged => 0,
            Status::Running | Status::BudgetExhausted => 1,
        }
    }

    pub fn converged(&self) -> bool {
        self.status == Status::Converged
    }
}

/// A trainer that can be rerun with other regularization strengths.
///
/// `S` is what drives the example selection of one call, e.g. a draw source
/// or a sequence of example indices.
pub trait Trainer<S>: Sized {
    type Blas: LinearAlgebra;

    fn lambda(&self) -> f64;

    fn blas(&self) -> &Self::Blas;

    /// Returns a copy of this trainer with another regularization strength.
    fn with_lambda(&self, lambda: f64) -> Result<Self>;

    /// Trains `state` in place on `data`.
    fn fit(&self, data: &Dataset, state: &mut SagState, selection: S) -> Result<FitReport>;
}

/// The settings both trainers share.
#[derive(Debug, Clone)]
struct Objective<L, B> {
    lambda: f64,
    tol: f64,
    max_iter: NonZeroUsize,
    precision: f64,
    family: L,
    blas: B,
}

impl<L: Clone, B: Clone> Objective<L, B> {
    fn new(spec: &TrainerSpec, family: L, blas: B) -> Result<Self> {
        check_lambda(spec.lambda)?;

        if spec.tol.is_nan() || spec.tol < 0. {
            return Err(GlmErr::InvalidInput("tol must be non-negative"));
        }

        if spec.precision.is_nan() || spec.precision < 0. {
            return Err(GlmErr::InvalidInput("precision must be non-negative"));
        }

        Ok(Self {
            lambda: spec.lambda,
            tol: spec.tol,
            max_iter: spec.max_iter,
            precision: spec.precision,
            family,
            blas,
        })
    }

    fn with_lambda(&self, lambda: f64) -> Result<Self> {
        check_lambda(lambda)?;

        Ok(Self {
            lambda,
            family: self.family.clone(),
            blas: self.blas.clone(),
            ..*self
        })
    }

    /// Rejects a selection source that cannot last `max_iter` iterations.
    fn check_budget(&self, what: &'static str, remaining: Option<usize>) -> Result<()> {
        match remaining {
            Some(got) if got < self.max_iter.get() => Err(GlmErr::SizeMismatch {
                what,
                got,
                expected: self.max_iter.get(),
            }),
            _ => Ok(()),
        }
    }
}

/// An adaptive SAG trainer.
///
/// Minimizes `1/n * sum_i loss(y_i, <w, x_i>) + lambda / 2 * ||w||^2`,
/// sampling examples by importance over per-example Lipschitz estimates.
#[derive(Debug, Clone)]
pub struct AdaptiveSag<L = Family, B = NdarrayBlas> {
    objective: Objective<L, B>,
    increasing: bool,
}

impl AdaptiveSag {
    /// Creates a new `AdaptiveSag` following a spec.
    ///
    /// # Arguments
    /// * `spec` - The trainer settings.
    ///
    /// # Returns
    /// An error if a setting is out of its domain.
    pub fn from_spec(spec: &TrainerSpec) -> Result<Self> {
        Self::new(spec, spec.family, NdarrayBlas)
    }
}

impl<L, B> AdaptiveSag<L, B>
where
    L: LossFamily + Clone,
    B: LinearAlgebra + Clone,
{
    /// Creates a new `AdaptiveSag` with a custom loss family and linear-algebra provider.
    ///
    /// # Arguments
    /// * `spec` - The scalars of the trainer, its `family` field is ignored.
    /// * `family` - The loss family.
    /// * `blas` - The linear-algebra provider.
    ///
    /// # Returns
    /// An error if `lambda`, `tol` or `precision` is negative or not a number.
    pub fn new(spec: &TrainerSpec, family: L, blas: B) -> Result<Self> {
        Ok(Self {
            objective: Objective::new(spec, family, blas)?,
            increasing: spec.increasing,
        })
    }

    pub fn lambda(&self) -> f64 {
        self.objective.lambda
    }

    pub fn max_iter(&self) -> usize {
        self.objective.max_iter.get()
    }

    pub fn family(&self) -> &L {
        &self.objective.family
    }

    pub fn blas(&self) -> &B {
        &self.objective.blas
    }

    /// Returns a copy of this trainer with another regularization strength.
    pub fn with_lambda(&self, lambda: f64) -> Result<Self> {
        Ok(Self {
            objective: self.objective.with_lambda(lambda)?,
            increasing: self.increasing,
        })
    }

    /// Validates a training call and returns a solver ready to step through it.
    ///
    /// # Arguments
    /// * `data` - The examples.
    /// * `state` - The warm-start state, updated in place.
    /// * `draws` - At least `max_iter` pairs of uniform draws.
    ///
    /// # Returns
    /// An error, with `state` untouched, if any dimension disagrees.
    pub fn solver<'a, D>(
        &'a self,
        data: &'a Dataset,
        state: &'a mut SagState,
        draws: D,
    ) -> Result<SagSolver<'a, L, B, Importance<'a, D>>>
    where
        D: DrawSource,
    {
        state.validate(data, data.n_examples())?;
        self.objective.check_budget("draws", draws.remaining())?;

        debug!(
            n = data.n_examples(),
            p = data.n_features(),
            sparse = data.x().is_sparse(),
            lambda = self.objective.lambda,
            max_iter = self.objective.max_iter.get();
            "starting adaptive sag"
        );

        let SagState {
            weights,
            direction,
            gradients,
            lipschitz,
            covered,
        } = state;

        let policy = Importance::new(
            draws,
            covered,
            lipschitz,
            self.increasing,
            self.objective.precision,
        );
        let buffers = Buffers {
            weights,
            direction,
            gradients,
            covered,
        };

        Ok(SagSolver::new(&self.objective, data, buffers, policy))
    }

    /// Trains until the tolerance is met or the budget runs out.
    ///
    /// # Arguments
    /// * `data` - The examples.
    /// * `state` - The warm-start state, holds the trained model afterwards.
    /// * `draws` - At least `max_iter` pairs of uniform draws.
    ///
    /// # Returns
    /// The report of the call, or an error if the inputs are inconsistent.
    pub fn fit<D>(&self, data: &Dataset, state: &mut SagState, draws: D) -> Result<FitReport>
    where
        D: DrawSource,
    {
        Ok(self.solver(data, state, draws)?.run())
    }
}

impl<L, B, D> Trainer<D> for AdaptiveSag<L, B>
where
    L: LossFamily + Clone,
    B: LinearAlgebra + Clone,
    D: DrawSource,
{
    type Blas = B;

    fn lambda(&self) -> f64 {
        AdaptiveSag::lambda(self)
    }

    fn blas(&self) -> &B {
        AdaptiveSag::blas(self)
    }

    fn with_lambda(&self, lambda: f64) -> Result<Self> {
        AdaptiveSag::with_lambda(self, lambda)
    }

    fn fit(&self, data: &Dataset, state: &mut SagState, draws: D) -> Result<FitReport> {
        AdaptiveSag::fit(self, data, state, draws)
    }
}

/// A SAG trainer with a single Lipschitz estimate found by line search.
///
/// Examples are visited in the order the caller gives. The state it trains
/// holds exactly one Lipschitz estimate, see `SagState::shared`.
#[derive(Debug, Clone)]
pub struct LineSearchSag<L = Family, B = NdarrayBlas> {
    objective: Objective<L, B>,
    step_size: StepSizeRule,
}

impl LineSearchSag {
    /// Creates a new `LineSearchSag` following a spec.
    ///
    /// # Returns
    /// An error if a setting is out of its domain.
    pub fn from_spec(spec: &TrainerSpec) -> Result<Self> {
        Self::new(spec, spec.family, NdarrayBlas)
    }
}

impl<L, B> LineSearchSag<L, B>
where
    L: LossFamily + Clone,
    B: LinearAlgebra + Clone,
{
    /// Creates a new `LineSearchSag` with a custom loss family and linear-algebra provider.
    ///
    /// # Arguments
    /// * `spec` - The scalars of the trainer and its step size rule, its
    ///   `family` field is ignored.
    /// * `family` - The loss family.
    /// * `blas` - The linear-algebra provider.
    pub fn new(spec: &TrainerSpec, family: L, blas: B) -> Result<Self> {
        Ok(Self {
            objective: Objective::new(spec, family, blas)?,
            step_size: spec.step_size,
        })
    }

    pub fn lambda(&self) -> f64 {
        self.objective.lambda
    }

    pub fn max_iter(&self) -> usize {
        self.objective.max_iter.get()
    }

    pub fn step_size(&self) -> StepSizeRule {
        self.step_size
    }

    pub fn blas(&self) -> &B {
        &self.objective.blas
    }

    pub fn with_lambda(&self, lambda: f64) -> Result<Self> {
        Ok(Self {
            objective: self.objective.with_lambda(lambda)?,
            step_size: self.step_size,
        })
    }

    /// Validates a training call and returns a solver ready to step through it.
    ///
    /// # Arguments
    /// * `data` - The examples.
    /// * `state` - The warm-start state with a single Lipschitz estimate.
    /// * `indices` - The example of each iteration, at least `max_iter` of them.
    ///
    /// # Returns
    /// An error, with `state` untouched, if any dimension disagrees or an index
    /// is out of bounds.
    pub fn solver<'a>(
        &'a self,
        data: &'a Dataset,
        state: &'a mut SagState,
        indices: Vec<usize>,
    ) -> Result<SagSolver<'a, L, B, Sequence<'a>>> {
        let n = data.n_examples();

        state.validate(data, 1)?;
        self.objective
            .check_budget("example indices", Some(indices.len()))?;

        if indices.iter().any(|&i| i >= n) {
            return Err(GlmErr::InvalidInput("example index out of bounds"));
        }

        debug!(
            n = n,
            p = data.n_features(),
            sparse = data.x().is_sparse(),
            lambda = self.objective.lambda,
            max_iter = self.objective.max_iter.get();
            "starting line-search sag"
        );

        let SagState {
            weights,
            direction,
            gradients,
            lipschitz,
            covered,
        } = state;

        let policy = Sequence::new(
            indices,
            &mut lipschitz[0],
            n,
            self.step_size,
            self.objective.precision,
        );
        let buffers = Buffers {
            weights,
            direction,
            gradients,
            covered,
        };

        Ok(SagSolver::new(&self.objective, data, buffers, policy))
    }

    /// Trains until the tolerance is met or the budget runs out.
    pub fn fit(
        &self,
        data: &Dataset,
        state: &mut SagState,
        indices: Vec<usize>,
    ) -> Result<FitReport> {
        Ok(self.solver(data, state, indices)?.run())
    }
}

impl<L, B> Trainer<Vec<usize>> for LineSearchSag<L, B>
where
    L: LossFamily + Clone,
    B: LinearAlgebra + Clone,
{
    type Blas = B;

    fn lambda(&self) -> f64 {
        LineSearchSag::lambda(self)
    }

    fn blas(&self) -> &B {
        LineSearchSag::blas(self)
    }

    fn with_lambda(&self, lambda: f64) -> Result<Self> {
        LineSearchSag::with_lambda(self, lambda)
    }

    fn fit(&self, data: &Dataset, state: &mut SagState, indices: Vec<usize>) -> Result<FitReport> {
        LineSearchSag::fit(self, data, state, indices)
    }
}

fn check_lambda(lambda: f64) -> Result<()> {
    if !lambda.is_finite() || lambda < 0. {
        return Err(GlmErr::InvalidInput("lambda must be finite and non-negative"));
    }

    Ok(())
}
