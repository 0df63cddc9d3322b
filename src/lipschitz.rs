use glm_core::LossFamily;
use log::trace;

/// Numerical floor under which the backtracking test is considered satisfied.
///
/// Equals the square root of the `f64` machine epsilon.
pub const DEFAULT_PRECISION: f64 = 1.490116119384765625e-8;

/// The quantities the line search needs about the sampled example.
#[derive(Debug, Clone, Copy)]
pub struct Visit {
    /// Observed target.
    pub target: f64,
    /// Current linear predictor `<w, x_i>`.
    pub eta: f64,
    /// Loss derivative at `eta`.
    pub gradient: f64,
    /// `||x_i||^2`.
    pub squared_norm: f64,
}

/// The outcome of one backtracking refinement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Refinement {
    pub previous: f64,
    pub current: f64,
    pub doublings: usize,
}

impl Refinement {
    pub fn changed(&self) -> bool {
        self.current != self.previous
    }
}

/// Doubles `li` until the loss decrease of a `1 / li` gradient step on one
/// example is majorized, or until the quadratic term falls under `precision`.
///
/// # Returns
/// The refined estimate and the number of doublings.
pub fn backtrack<L: LossFamily>(
    mut li: f64,
    precision: f64,
    family: &L,
    visit: &Visit,
) -> (f64, usize) {
    let Visit {
        target,
        eta,
        gradient,
        squared_norm,
    } = *visit;

    let fi = family.loss(target, eta);
    let gg = gradient * gradient * squared_norm;
    let stepped = |li: f64| family.loss(target, eta - squared_norm * gradient / li);

    let mut doublings = 0;
    while gg > precision && stepped(li) > fi - gg / (2. * li) {
        li *= 2.;
        doublings += 1;
        trace!(lipschitz = li; "lipschitz backtracking");
    }

    (li, doublings)
}

/// Per-example curvature estimates, refined by backtracking every time an
/// example is visited, with their running maximum and covered mean.
///
/// The estimates live in the caller's buffer and are refined in place.
#[derive(Debug)]
pub struct LipschitzEstimator<'a> {
    lipschitz: &'a mut [f64],
    lmax: f64,
    lmean: f64,
    increasing: bool,
    precision: f64,
    decay: f64,
}

impl<'a> LipschitzEstimator<'a> {
    /// Creates a new `LipschitzEstimator`.
    ///
    /// # Arguments
    /// * `lipschitz` - The starting estimate of every example, refined in place.
    /// * `covered` - Whether each example was already visited.
    /// * `increasing` - Whether to run the increasing schedule: estimates of
    ///   visited examples are halved before backtracking and `lmax` decays.
    /// * `precision` - See `DEFAULT_PRECISION`.
    ///
    /// # Returns
    /// An estimator whose `lmax` is the largest starting estimate and whose
    /// `lmean` is the mean over covered examples, 0 if there are none.
    pub fn new(
        lipschitz: &'a mut [f64],
        covered: &[bool],
        increasing: bool,
        precision: f64,
    ) -> Self {
        let n = lipschitz.len();
        let lmax = lipschitz.iter().copied().fold(0., f64::max);

        let (sum, count) = lipschitz
            .iter()
            .zip(covered)
            .filter(|&(_, &c)| c)
            .fold((0., 0usize), |(sum, count), (li, _)| (sum + li, count + 1));
        let lmean = if count > 0 { sum / count as f64 } else { 0. };

        Self {
            lipschitz,
            lmax,
            lmean,
            increasing,
            precision,
            decay: 2f64.powf(-1. / n.max(1) as f64),
        }
    }

    /// Refines the estimate of example `i`, see `backtrack`.
    ///
    /// # Arguments
    /// * `i` - The example.
    /// * `covered` - Whether `i` was visited before this iteration.
    /// * `family` - The loss family.
    /// * `visit` - The state of example `i` at the current weights.
    ///
    /// # Returns
    /// The estimate before and after the search.
    pub fn refine<L: LossFamily>(
        &mut self,
        i: usize,
        covered: bool,
        family: &L,
        visit: &Visit,
    ) -> Refinement {
        let previous = self.lipschitz[i];
        let mut li = previous;
        if self.increasing && covered {
            li /= 2.;
        }

        let (li, doublings) = backtrack(li, self.precision, family, visit);

        self.lipschitz[i] = li;
        self.lmax = self.lmax.max(li);

        Refinement {
            previous,
            current: li,
            doublings,
        }
    }

    /// Folds a newly covered example into the running mean.
    ///
    /// # Arguments
    /// * `li` - The estimate of the example.
    /// * `n_covered` - The covered count, the new example included.
    pub fn record_covered(&mut self, li: f64, n_covered: usize) {
        let nc = n_covered as f64;
        self.lmean = self.lmean * ((nc - 1.) / nc) + li / nc;
    }

    /// Moves the running mean after a covered example changed its estimate.
    pub fn record_change(&mut self, refinement: &Refinement, n_covered: usize) {
        self.lmean += (refinement.current - refinement.previous) / n_covered as f64;
    }

    /// Relaxes `lmax` by `2^(-1/n)` under the increasing schedule.
    pub fn decay(&mut self) {
        if self.increasing {
            self.lmax *= self.decay;
        }
    }

    pub fn lmax(&self) -> f64 {
        self.lmax
    }

    pub fn lmean(&self) -> f64 {
        self.lmean
    }

    pub fn lipschitz(&self) -> &[f64] {
        self.lipschitz
    }
}
