use glm_core::LinearAlgebra;
use log::debug;
use ndarray::Array1;

/// Folded scale under which the ledger is flushed and restarted.
pub const MIN_SCALE: f64 = 1e-100;

/// Deferred weight decay for sparse design matrices.
///
/// The dense update `w <- (1 - alpha * lambda) * w - (alpha / nc) * d` touches all
/// `p` coordinates. Writing `w = c * v`, it becomes `c <- c * (1 - alpha * lambda)`
/// and `v <- v - alpha / (c * nc) * d`. The second part only changes a coordinate
/// of `v` through `d`, and `d[j]` only changes when an example touching `j` is
/// visited. So the scalar steps `alpha / (c * nc)` are accumulated in a
/// cumulative sum and coordinate `j` pays `d[j] * (cum[now] - cum[last_synced[j]])`
/// when it is next read.
///
/// The buffer handed to the ledger holds `v` between flushes.
#[derive(Debug, Clone)]
pub struct DeferredDecayLedger {
    last_synced: Vec<usize>,
    cum_sum: Vec<f64>,
    origin: usize,
    iteration: usize,
    scale: f64,
}

impl DeferredDecayLedger {
    /// Creates a new `DeferredDecayLedger`.
    ///
    /// # Arguments
    /// * `n_features` - The number of coordinates `p`.
    /// * `capacity` - The expected number of iterations, used to size the cumulative sum.
    pub fn new(n_features: usize, capacity: usize) -> Self {
        let mut cum_sum = Vec::with_capacity(capacity + 1);
        cum_sum.push(0.);

        Self {
            last_synced: vec![0; n_features],
            cum_sum,
            origin: 0,
            iteration: 0,
            scale: 1.,
        }
    }

    /// Returns the number of recorded steps.
    pub fn iteration(&self) -> usize {
        self.iteration
    }

    /// Returns the folded scale factor `c`.
    pub fn scale(&self) -> f64 {
        self.scale
    }

    /// Returns the iteration at which coordinate `j` was last synchronized.
    pub fn last_synced(&self, j: usize) -> usize {
        self.last_synced[j]
    }

    fn owed(&self, j: usize) -> f64 {
        let now = self.iteration - self.origin;
        let then = self.last_synced[j] - self.origin;
        self.cum_sum[now] - self.cum_sum[then]
    }

    /// Replays the steps coordinate `j` missed since it was last synchronized.
    pub fn catch_up(&mut self, j: usize, v: &mut Array1<f64>, d: &Array1<f64>) {
        v[j] -= d[j] * self.owed(j);
        self.last_synced[j] = self.iteration;
    }

    /// Returns the value coordinate `j` of the weights would have under eager
    /// updates, without synchronizing it.
    pub fn materialize(&self, j: usize, v: &Array1<f64>, d: &Array1<f64>) -> f64 {
        self.scale * (v[j] - d[j] * self.owed(j))
    }

    /// Records one optimizer step.
    ///
    /// # Arguments
    /// * `alpha` - The step size.
    /// * `lambda` - The regularization strength.
    /// * `n_covered` - The number of covered examples, at least 1.
    pub fn record_step(&mut self, alpha: f64, lambda: f64, n_covered: usize) {
        self.scale *= 1. - alpha * lambda;

        let last = self.cum_sum[self.iteration - self.origin];
        self.cum_sum.push(last + alpha / (self.scale * n_covered as f64));
        self.iteration += 1;
    }

    /// Whether `c` got small enough to risk underflowing.
    pub fn needs_rebase(&self) -> bool {
        self.scale < MIN_SCALE
    }

    /// Synchronizes every coordinate, folds `c` into the buffer and restarts the
    /// cumulative sum. Afterwards the buffer holds the eager weights.
    ///
    /// Flushing twice in a row leaves the buffer unchanged the second time.
    pub fn flush<B: LinearAlgebra>(&mut self, blas: &B, v: &mut Array1<f64>, d: &Array1<f64>) {
        for j in 0..v.len() {
            self.catch_up(j, v, d);
        }

        if self.scale != 1. {
            debug!(iteration = self.iteration, scale = self.scale; "folding ledger scale");
            blas.scal(self.scale, v.view_mut());
        }

        self.scale = 1.;
        self.origin = self.iteration;
        self.cum_sum.clear();
        self.cum_sum.push(0.);
    }
}
