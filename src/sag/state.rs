use glm_core::{Dataset, GlmErr, Result, ensure_len};
use ndarray::Array1;

/// The warm-startable state of a training call.
///
/// Every buffer is updated in place by the optimizer and can be fed to a
/// later call (e.g. with a different `lambda`) to resume from it.
#[derive(Debug, Clone, PartialEq)]
pub struct SagState {
    /// The model weights `w`, one per feature.
    pub weights: Array1<f64>,
    /// The running sum `d = sum_i g[i] * x_i`, one per feature.
    pub direction: Array1<f64>,
    /// The last loss derivative computed at each example.
    pub gradients: Array1<f64>,
    /// The local Lipschitz estimate of each example, or a single estimate
    /// shared by all of them for `LineSearchSag`.
    pub lipschitz: Vec<f64>,
    /// Whether each example was sampled at least once.
    pub covered: Vec<bool>,
}

impl SagState {
    /// Creates a cold-start state: zero weights, nothing covered.
    ///
    /// # Arguments
    /// * `n_features` - The number of features `p`.
    /// * `n_examples` - The number of examples `n`.
    /// * `lipschitz` - The starting Lipschitz estimate shared by all examples.
    pub fn new(n_features: usize, n_examples: usize, lipschitz: f64) -> Self {
        Self {
            weights: Array1::zeros(n_features),
            direction: Array1::zeros(n_features),
            gradients: Array1::zeros(n_examples),
            lipschitz: vec![lipschitz; n_examples],
            covered: vec![false; n_examples],
        }
    }

    /// Creates a cold-start state sized for `data`.
    pub fn for_dataset(data: &Dataset, lipschitz: f64) -> Self {
        Self::new(data.n_features(), data.n_examples(), lipschitz)
    }

    /// Creates a cold-start state with one Lipschitz estimate shared by every
    /// example, the layout `LineSearchSag` trains.
    pub fn shared(n_features: usize, n_examples: usize, lipschitz: f64) -> Self {
        Self {
            lipschitz: vec![lipschitz],
            ..Self::new(n_features, n_examples, lipschitz)
        }
    }

    /// Creates a shared-estimate cold-start state sized for `data`.
    pub fn shared_for_dataset(data: &Dataset, lipschitz: f64) -> Self {
        Self::shared(data.n_features(), data.n_examples(), lipschitz)
    }

    /// Returns how many examples are covered.
    pub fn n_covered(&self) -> usize {
        self.covered.iter().filter(|&&c| c).count()
    }

    /// Checks this state against the dataset it is going to be trained on.
    ///
    /// # Arguments
    /// * `data` - The examples.
    /// * `estimates` - The number of Lipschitz estimates the trainer expects.
    ///
    /// # Returns
    /// An error on any length mismatch or if a Lipschitz estimate is not a
    /// positive finite number.
    pub fn validate(&self, data: &Dataset, estimates: usize) -> Result<()> {
        let p = data.n_features();
        let n = data.n_examples();

        ensure_len("weights", self.weights.len(), p)?;
        ensure_len("direction", self.direction.len(), p)?;
        ensure_len("gradients", self.gradients.len(), n)?;
        ensure_len("lipschitz estimates", self.lipschitz.len(), estimates)?;
        ensure_len("coverage flags", self.covered.len(), n)?;

        if !self.lipschitz.iter().all(|li| li.is_finite() && *li > 0.) {
            return Err(GlmErr::InvalidInput(
                "lipschitz estimates must be positive and finite",
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glm_core::DesignMatrix;
    use ndarray::array;

    fn data() -> Dataset {
        let x = DesignMatrix::dense(2, vec![1., 0., 0., 1., 1., 1.]).unwrap();
        Dataset::new(x, array![1., -1., 1.]).unwrap()
    }

    #[test]
    fn cold_start_fits_its_dataset() {
        let state = SagState::for_dataset(&data(), 1.);
        assert!(state.validate(&data(), 3).is_ok());
        assert_eq!(state.n_covered(), 0);
    }

    #[test]
    fn reports_the_first_mismatch() {
        let mut state = SagState::for_dataset(&data(), 1.);
        state.direction = Array1::zeros(3);

        assert_eq!(
            state.validate(&data(), 3),
            Err(GlmErr::SizeMismatch {
                what: "direction",
                got: 3,
                expected: 2,
            })
        );
    }

    #[test]
    fn rejects_non_positive_estimates() {
        let mut state = SagState::for_dataset(&data(), 1.);
        state.lipschitz[1] = 0.;
        assert!(state.validate(&data(), 3).is_err());
    }

    #[test]
    fn shared_state_holds_one_estimate() {
        let state = SagState::shared_for_dataset(&data(), 0.5);

        assert_eq!(state.lipschitz, vec![0.5]);
        assert_eq!(state.gradients.len(), 3);
        assert!(state.validate(&data(), 1).is_ok());
        assert_eq!(
            state.validate(&data(), 3),
            Err(GlmErr::SizeMismatch {
                what: "lipschitz estimates",
                got: 1,
                expected: 3,
            })
        );
    }
}
