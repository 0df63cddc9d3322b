use rand::Rng;
use rand_distr::{uniform::Error as UniformError, Distribution, Uniform};

use crate::{GlmErr, Result};

/// Supplies the two uniform draws consumed by every optimizer iteration.
///
/// The first draw of the pair selects the sampling pool and the second one
/// descends the chosen pool's tree.
pub trait DrawSource {
    /// Returns the next `(selection, descent)` pair, or `None` once exhausted.
    fn next_pair(&mut self) -> Option<(f64, f64)>;

    /// Returns how many pairs are left, `None` if the source is unbounded.
    fn remaining(&self) -> Option<usize> {
        None
    }
}

/// A pre-generated, strictly ordered sequence of draws.
#[derive(Debug, Clone)]
pub struct PrecomputedDraws {
    selection: Vec<f64>,
    descent: Vec<f64>,
    cursor: usize,
}

impl PrecomputedDraws {
    /// Creates a new `PrecomputedDraws` from its two streams.
    ///
    /// # Arguments
    /// * `selection` - Pool selection draws, one per iteration.
    /// * `descent` - Tree descent draws, one per iteration.
    ///
    /// # Returns
    /// An error if both streams differ in length or a draw lies outside `[0, 1)`.
    pub fn new(selection: Vec<f64>, descent: Vec<f64>) -> Result<Self> {
        if selection.len() != descent.len() {
            return Err(GlmErr::SizeMismatch {
                what: "descent draws",
                got: descent.len(),
                expected: selection.len(),
            });
        }

        let in_range = |u: &f64| (0.0..1.0).contains(u);
        if !selection.iter().chain(&descent).all(in_range) {
            return Err(GlmErr::InvalidInput("draws must lie in [0, 1)"));
        }

        Ok(Self {
            selection,
            descent,
            cursor: 0,
        })
    }

    /// Creates a new `PrecomputedDraws` from a single buffer of length `2 * max_iter`
    /// whose first half holds the selection draws and second half the descent draws.
    ///
    /// # Arguments
    /// * `values` - The concatenated draws.
    ///
    /// # Returns
    /// An error if `values` has odd length or any draw lies outside `[0, 1)`.
    pub fn from_halves(mut values: Vec<f64>) -> Result<Self> {
        if values.len() % 2 != 0 {
            return Err(GlmErr::InvalidInput(
                "draws must hold two halves of equal length",
            ));
        }

        let descent = values.split_off(values.len() / 2);
        Self::new(values, descent)
    }
}

impl DrawSource for PrecomputedDraws {
    fn next_pair(&mut self) -> Option<(f64, f64)> {
        let k = self.cursor;
        let pair = (*self.selection.get(k)?, *self.descent.get(k)?);
        self.cursor += 1;
        Some(pair)
    }

    fn remaining(&self) -> Option<usize> {
        Some(self.selection.len() - self.cursor)
    }
}

/// An unbounded stream of draws taken from a random number generator.
pub struct RandomDraws<R: Rng> {
    rng: R,
    uniform: Uniform<f64>,
}

impl<R: Rng> RandomDraws<R> {
    /// Creates a new `RandomDraws`.
    ///
    /// # Arguments
    /// * `rng` - The generator, seed it for reproducible runs.
    pub fn new(rng: R) -> Result<Self> {
        let uniform = Uniform::new(0.0, 1.0)
            .map_err(|_: UniformError| GlmErr::InvalidInput("empty unit interval"))?;

        Ok(Self { rng, uniform })
    }
}

impl<R: Rng> DrawSource for RandomDraws<R> {
    fn next_pair(&mut self) -> Option<(f64, f64)> {
        let selection = self.uniform.sample(&mut self.rng);
        let descent = self.uniform.sample(&mut self.rng);
        Some((selection, descent))
    }
}
