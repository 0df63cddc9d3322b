//! Example selection and step sizes.
//!
//! A policy owns the curvature estimates of a training call: it picks the next
//! example, refines the estimates once the example's gradient is known and
//! turns them into a step size.

use glm_core::{DrawSource, GlmErr, LossFamily};
use serde::{Deserialize, Serialize};

use super::solver::{MIN_CURVATURE, blended_step_size};
use crate::{
    lipschitz::{LipschitzEstimator, Visit, backtrack},
    sampling::ImportanceSampler,
};

pub trait Policy {
    /// Returns the next example, `None` once the source of examples is exhausted.
    fn select(&mut self, lambda: f64) -> Option<usize>;

    /// Refines the curvature after the gradient of example `i` was recomputed.
    ///
    /// # Arguments
    /// * `i` - The example.
    /// * `was_covered` - Whether `i` was visited before this iteration.
    /// * `n_covered` - The covered count, `i` included.
    /// * `family` - The loss family.
    /// * `visit` - The state of example `i` at the current weights.
    fn observe<L: LossFamily>(
        &mut self,
        i: usize,
        was_covered: bool,
        n_covered: usize,
        family: &L,
        visit: &Visit,
    );

    fn step_size(&self, n_examples: usize, n_covered: usize, lambda: f64) -> f64;

    /// Relaxes the curvature ceiling at the end of an iteration.
    fn decay(&mut self);
}

/// Importance sampling over per-example Lipschitz estimates.
#[derive(Debug)]
pub struct Importance<'a, D> {
    draws: D,
    sampler: ImportanceSampler,
    estimator: LipschitzEstimator<'a>,
}

impl<'a, D> Importance<'a, D> {
    /// Creates a new `Importance` policy.
    ///
    /// # Arguments
    /// * `draws` - One pair of uniform draws per iteration.
    /// * `covered` - Whether each example was already visited.
    /// * `lipschitz` - The per-example estimates, refined in place.
    /// * `increasing` - See `LipschitzEstimator::new`.
    /// * `precision` - The backtracking floor.
    pub fn new(
        draws: D,
        covered: &[bool],
        lipschitz: &'a mut [f64],
        increasing: bool,
        precision: f64,
    ) -> Self {
        let sampler = ImportanceSampler::new(covered, lipschitz);
        let estimator = LipschitzEstimator::new(lipschitz, covered, increasing, precision);

        Self {
            draws,
            sampler,
            estimator,
        }
    }

    pub fn sampler(&self) -> &ImportanceSampler {
        &self.sampler
    }

    pub fn estimator(&self) -> &LipschitzEstimator<'a> {
        &self.estimator
    }
}

impl<D: DrawSource> Policy for Importance<'_, D> {
    fn select(&mut self, lambda: f64) -> Option<usize> {
        let (selection, descent) = self.draws.next_pair()?;
        let i = self
            .sampler
            .sample(selection, descent, self.estimator.lmean(), lambda);

        Some(i)
    }

    fn observe<L: LossFamily>(
        &mut self,
        i: usize,
        was_covered: bool,
        n_covered: usize,
        family: &L,
        visit: &Visit,
    ) {
        let refinement = self.estimator.refine(i, was_covered, family, visit);

        if !was_covered {
            self.sampler.mark_covered(i, refinement.current);
            self.estimator.record_covered(refinement.current, n_covered);
        } else if refinement.changed() {
            self.estimator.record_change(&refinement, n_covered);
            self.sampler
                .update_curvature(i, refinement.current - refinement.previous);
        }
    }

    fn step_size(&self, n_examples: usize, n_covered: usize, lambda: f64) -> f64 {
        blended_step_size(
            n_examples,
            n_covered,
            self.estimator.lmax(),
            self.estimator.lmean(),
            lambda,
        )
    }

    fn decay(&mut self) {
        self.estimator.decay();
    }
}

/// The step size of the line-search trainer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepSizeRule {
    /// `1 / (L + lambda)`.
    #[default]
    Lipschitz,
    /// `2 / (L + (n + 1) * lambda)`.
    StronglyConvex,
}

impl TryFrom<i32> for StepSizeRule {
    type Error = GlmErr;

    fn try_from(code: i32) -> Result<Self, Self::Error> {
        match code {
            1 => Ok(StepSizeRule::Lipschitz),
            2 => Ok(StepSizeRule::StronglyConvex),
            _ => Err(GlmErr::InvalidInput("step size type must be 1 or 2")),
        }
    }
}

/// Examples taken in a caller-given order, with one Lipschitz estimate
/// shared by all of them.
#[derive(Debug)]
pub struct Sequence<'a> {
    indices: std::vec::IntoIter<usize>,
    lipschitz: &'a mut f64,
    rule: StepSizeRule,
    precision: f64,
    decay: f64,
}

impl<'a> Sequence<'a> {
    /// Creates a new `Sequence` policy.
    ///
    /// # Arguments
    /// * `indices` - The example of every iteration, in order.
    /// * `lipschitz` - The shared estimate, refined in place.
    /// * `n_examples` - The number of examples, sets the decay rate.
    /// * `rule` - The step size rule.
    /// * `precision` - The backtracking floor.
    pub fn new(
        indices: Vec<usize>,
        lipschitz: &'a mut f64,
        n_examples: usize,
        rule: StepSizeRule,
        precision: f64,
    ) -> Self {
        Self {
            indices: indices.into_iter(),
            lipschitz,
            rule,
            precision,
            decay: 2f64.powf(-1. / n_examples.max(1) as f64),
        }
    }

    /// Returns the current shared estimate.
    pub fn lipschitz(&self) -> f64 {
        *self.lipschitz
    }
}

impl Policy for Sequence<'_> {
    fn select(&mut self, _lambda: f64) -> Option<usize> {
        self.indices.next()
    }

    fn observe<L: LossFamily>(
        &mut self,
        _i: usize,
        _was_covered: bool,
        _n_covered: usize,
        family: &L,
        visit: &Visit,
    ) {
        let (li, _) = backtrack(*self.lipschitz, self.precision, family, visit);
        *self.lipschitz = li;
    }

    fn step_size(&self, n_examples: usize, _n_covered: usize, lambda: f64) -> f64 {
        let li = *self.lipschitz;

        match self.rule {
            StepSizeRule::Lipschitz => 1. / (li + lambda).max(MIN_CURVATURE),
            StepSizeRule::StronglyConvex => {
                2. / (li + (n_examples as f64 + 1.) * lambda).max(MIN_CURVATURE)
            }
        }
    }

    fn decay(&mut self) {
        *self.lipschitz *= self.decay;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use glm_core::Family;

    #[test]
    fn step_size_rules() {
        let mut li = 3.;
        let policy = Sequence::new(vec![], &mut li, 4, StepSizeRule::Lipschitz, 0.);
        assert_eq!(policy.step_size(4, 2, 1.), 0.25);

        let mut li = 3.;
        let policy = Sequence::new(vec![], &mut li, 4, StepSizeRule::StronglyConvex, 0.);
        assert_eq!(policy.step_size(4, 2, 1.), 0.25);
        assert_eq!(policy.step_size(4, 2, 0.5), 2. / 5.5);

        let mut li = 1e-300;
        let policy = Sequence::new(vec![], &mut li, 4, StepSizeRule::Lipschitz, 0.);
        assert_eq!(policy.step_size(4, 2, 0.), 1. / MIN_CURVATURE);
    }

    #[test]
    fn step_size_rule_codes() {
        assert_eq!(StepSizeRule::try_from(1), Ok(StepSizeRule::Lipschitz));
        assert_eq!(StepSizeRule::try_from(2), Ok(StepSizeRule::StronglyConvex));
        assert!(StepSizeRule::try_from(0).is_err());
    }

    #[test]
    fn sequence_backtracks_the_shared_estimate_and_decays_it() {
        let mut li = 0.25;
        let mut policy = Sequence::new(vec![2, 0], &mut li, 4, StepSizeRule::Lipschitz, 1e-8);

        assert_eq!(policy.select(0.1), Some(2));
        let visit = Visit {
            target: 0.,
            eta: 2.,
            gradient: Family::Gaussian.gradient(0., 2.),
            squared_norm: 1.,
        };
        policy.observe(2, false, 1, &Family::Gaussian, &visit);
        assert_eq!(policy.lipschitz(), 1.);

        for _ in 0..4 {
            policy.decay();
        }
        assert_abs_diff_eq!(policy.lipschitz(), 0.5, epsilon = 1e-12);

        assert_eq!(policy.select(0.1), Some(0));
        assert_eq!(policy.select(0.1), None);
        assert_abs_diff_eq!(li, 0.5, epsilon = 1e-12);
    }
}
