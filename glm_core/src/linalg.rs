use ndarray::{ArrayView1, ArrayViewMut1};

/// The dense vector primitives the optimizer relies on.
///
/// Implementations must be pure functions of their arguments: the optimizer
/// owns every buffer passed in and never expects the provider to keep state.
pub trait LinearAlgebra {
    /// Returns `<x, y>`.
    fn dot(&self, x: ArrayView1<f64>, y: ArrayView1<f64>) -> f64;

    /// Computes `y <- alpha * x + y`.
    fn axpy(&self, alpha: f64, x: ArrayView1<f64>, y: ArrayViewMut1<f64>);

    /// Computes `x <- alpha * x`.
    fn scal(&self, alpha: f64, x: ArrayViewMut1<f64>);

    /// Computes `y <- x`.
    fn copy(&self, x: ArrayView1<f64>, y: ArrayViewMut1<f64>);
}

/// `LinearAlgebra` backed by `ndarray`'s own kernels.
#[derive(Debug, Default, Clone, Copy)]
pub struct NdarrayBlas;

impl LinearAlgebra for NdarrayBlas {
    fn dot(&self, x: ArrayView1<f64>, y: ArrayView1<f64>) -> f64 {
        x.dot(&y)
    }

    fn axpy(&self, alpha: f64, x: ArrayView1<f64>, mut y: ArrayViewMut1<f64>) {
        y.scaled_add(alpha, &x);
    }

    fn scal(&self, alpha: f64, mut x: ArrayViewMut1<f64>) {
        x.mapv_inplace(|v| alpha * v);
    }

    fn copy(&self, x: ArrayView1<f64>, mut y: ArrayViewMut1<f64>) {
        y.assign(&x);
    }
}
