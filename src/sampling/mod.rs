//! Non-uniform example selection.
//!
//! Examples that were never visited are drawn uniformly, visited ones are drawn
//! proportionally to their curvature estimate plus a floor shared by all of
//! them. The pool is picked first, with the uncovered pool chosen with
//! probability equal to the fraction of uncovered examples.

mod sum_tree;

pub use sum_tree::SumTree;

use sum_tree::descend;

/// The two populations the sampler draws from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pool {
    Uncovered,
    Covered,
}

/// Weighted example sampler with `O(log n)` updates and draws.
///
/// Three sum trees share the same shape:
/// - `uncovered`: 1 per example not yet visited,
/// - `curvature`: the Lipschitz estimate of every visited example,
/// - `descendants`: 1 per real example, 0 on padding.
///
/// Under any node, `descendants - uncovered` is the number of visited examples,
/// which prices the floor of the covered pool without a fourth tree.
#[derive(Debug, Clone)]
pub struct ImportanceSampler {
    uncovered: SumTree,
    curvature: SumTree,
    descendants: SumTree,
    n_covered: usize,
}

impl ImportanceSampler {
    /// Creates a new `ImportanceSampler`.
    ///
    /// # Arguments
    /// * `covered` - Whether each example was already visited.
    /// * `lipschitz` - The current Lipschitz estimate of each example.
    ///
    /// # Panics
    /// If both slices differ in length.
    pub fn new(covered: &[bool], lipschitz: &[f64]) -> Self {
        assert_eq!(covered.len(), lipschitz.len());

        let uncovered: Vec<f64> = covered.iter().map(|&c| if c { 0. } else { 1. }).collect();
        let curvature: Vec<f64> = covered
            .iter()
            .zip(lipschitz)
            .map(|(&c, &li)| if c { li } else { 0. })
            .collect();

        Self {
            uncovered: SumTree::from_leaves(&uncovered),
            curvature: SumTree::from_leaves(&curvature),
            descendants: SumTree::from_leaves(&vec![1.; covered.len()]),
            n_covered: covered.iter().filter(|&&c| c).count(),
        }
    }

    /// Returns the number of examples.
    pub fn len(&self) -> usize {
        self.descendants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descendants.is_empty()
    }

    /// Returns how many examples have been visited at least once.
    pub fn n_covered(&self) -> usize {
        self.n_covered
    }

    /// Returns the fraction of examples never visited.
    pub fn uncovered_fraction(&self) -> f64 {
        (self.len() - self.n_covered) as f64 / self.len() as f64
    }

    /// Picks the pool for a selection draw.
    pub fn pool(&self, selection: f64) -> Pool {
        if selection < self.uncovered_fraction() {
            Pool::Uncovered
        } else {
            Pool::Covered
        }
    }

    /// Draws the next example.
    ///
    /// # Arguments
    /// * `selection` - Uniform draw choosing the pool.
    /// * `descent` - Uniform draw descending the pool's tree.
    /// * `lmean` - The running mean of the covered Lipschitz estimates.
    /// * `lambda` - The regularization strength.
    ///
    /// # Returns
    /// The index of the selected example.
    pub fn sample(&self, selection: f64, descent: f64, lmean: f64, lambda: f64) -> usize {
        let width = self.descendants.width();

        match self.pool(selection) {
            Pool::Uncovered => self.uncovered.sample(descent),
            Pool::Covered => {
                let floor = lmean + 2. * lambda;
                let visited = |k| self.descendants.node(k) - self.uncovered.node(k);
                let weighted = |k| self.curvature.node(k) + floor * visited(k);

                if weighted(1) > 0. {
                    descend(width, descent, weighted)
                } else {
                    descend(width, descent, visited)
                }
            }
        }
    }

    /// Moves example `i` to the covered pool with curvature `li`.
    ///
    /// # Panics
    /// If `i` was already covered.
    pub fn mark_covered(&mut self, i: usize, li: f64) {
        assert_eq!(self.uncovered.leaf(i), 1., "example {i} is already covered");

        self.uncovered.set(i, 0.);
        self.curvature.update(i, li);
        self.n_covered += 1;
    }

    /// Shifts the curvature weight of a covered example by `delta`.
    pub fn update_curvature(&mut self, i: usize, delta: f64) {
        self.curvature.update(i, delta);
    }

    pub fn uncovered(&self) -> &SumTree {
        &self.uncovered
    }

    pub fn curvature(&self) -> &SumTree {
        &self.curvature
    }

    /// Checks the children-sum invariant of every tree.
    pub fn is_consistent(&self) -> bool {
        self.uncovered.is_consistent()
            && self.curvature.is_consistent()
            && self.descendants.is_consistent()
    }
}
