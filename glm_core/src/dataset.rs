use ndarray::{Array1, Array2, ArrayView1, ArrayViewMut1, ShapeBuilder};
use sprs::CsMat;

use crate::{GlmErr, LinearAlgebra, Result, error::ensure_len};

/// The design matrix of a training call, one column per example.
#[derive(Debug, Clone)]
pub enum DesignMatrix {
    /// Feature-major `p x n` matrix, each example stored contiguously.
    Dense(Array2<f64>),
    /// Compressed-column `p x n` matrix.
    Sparse(CsMat<f64>),
}

impl DesignMatrix {
    /// Creates a dense design matrix.
    ///
    /// # Arguments
    /// * `n_features` - The number of rows `p`.
    /// * `values` - `p * n` values laid out example after example.
    ///
    /// # Returns
    /// An error if `values` cannot be split in columns of `n_features` entries.
    pub fn dense(n_features: usize, values: Vec<f64>) -> Result<Self> {
        if n_features == 0 {
            return Err(GlmErr::InvalidInput("the design matrix has no features"));
        }

        if values.len() % n_features != 0 {
            return Err(GlmErr::SizeMismatch {
                what: "dense values",
                got: values.len(),
                expected: (values.len() / n_features + 1) * n_features,
            });
        }

        let n_examples = values.len() / n_features;
        let x = Array2::from_shape_vec((n_features, n_examples).f(), values)
            .map_err(|_| GlmErr::InvalidInput("dense values do not fit the feature count"))?;

        Ok(Self::Dense(x))
    }

    /// Creates a sparse design matrix from its compressed-column arrays.
    ///
    /// # Arguments
    /// * `n_features` - The number of rows `p`.
    /// * `values` - The nonzero values.
    /// * `row_indices` - The row of every nonzero, strictly increasing within a column.
    /// * `col_offsets` - `n + 1` offsets into `values`, starting at 0.
    ///
    /// # Returns
    /// An error if the arrays do not describe a valid compressed-column matrix.
    pub fn sparse(
        n_features: usize,
        values: Vec<f64>,
        row_indices: Vec<usize>,
        col_offsets: Vec<usize>,
    ) -> Result<Self> {
        ensure_len("row indices", row_indices.len(), values.len())?;

        let Some(n_examples) = col_offsets.len().checked_sub(1) else {
            return Err(GlmErr::InvalidSparse("empty column offsets".into()));
        };

        if col_offsets[0] != 0 || col_offsets[n_examples] != values.len() {
            return Err(GlmErr::InvalidSparse(format!(
                "column offsets must span [0, {}]",
                values.len()
            )));
        }

        for (col, bounds) in col_offsets.windows(2).enumerate() {
            let [start, end] = [bounds[0], bounds[1]];
            if start > end || end > values.len() {
                return Err(GlmErr::InvalidSparse(format!(
                    "column {col} has offsets outside [0, {}]",
                    values.len()
                )));
            }

            let rows = &row_indices[start..end];
            if rows.iter().any(|&r| r >= n_features) {
                return Err(GlmErr::InvalidSparse(format!(
                    "column {col} has a row index out of bounds"
                )));
            }

            if rows.windows(2).any(|w| w[0] >= w[1]) {
                return Err(GlmErr::InvalidSparse(format!(
                    "column {col} has unsorted or repeated row indices"
                )));
            }
        }

        let x = CsMat::try_new_csc((n_features, n_examples), col_offsets, row_indices, values)
            .map_err(|(_, _, _, e)| GlmErr::InvalidSparse(format!("{e:?}")))?;

        Ok(Self::Sparse(x))
    }

    /// Re-encodes this matrix in compressed-column form, dropping explicit zeros.
    pub fn to_sparse(&self) -> Self {
        let x = match self {
            Self::Sparse(x) => return Self::Sparse(x.clone()),
            Self::Dense(x) => x,
        };

        let mut col_offsets = Vec::with_capacity(x.ncols() + 1);
        let mut row_indices = Vec::new();
        let mut values = Vec::new();
        col_offsets.push(0);

        for column in x.columns() {
            for (row, &v) in column.iter().enumerate() {
                if v != 0. {
                    row_indices.push(row);
                    values.push(v);
                }
            }
            col_offsets.push(values.len());
        }

        Self::Sparse(CsMat::new_csc(
            (x.nrows(), x.ncols()),
            col_offsets,
            row_indices,
            values,
        ))
    }

    /// Returns the number of features `p`.
    pub fn n_features(&self) -> usize {
        match self {
            Self::Dense(x) => x.nrows(),
            Self::Sparse(x) => x.rows(),
        }
    }

    /// Returns the number of examples `n`.
    pub fn n_examples(&self) -> usize {
        match self {
            Self::Dense(x) => x.ncols(),
            Self::Sparse(x) => x.cols(),
        }
    }

    pub fn is_sparse(&self) -> bool {
        matches!(self, Self::Sparse(_))
    }

    /// Computes `<w, x_i>`.
    pub fn dot<B: LinearAlgebra>(&self, blas: &B, i: usize, w: ArrayView1<f64>) -> f64 {
        match self {
            Self::Dense(x) => blas.dot(w, x.column(i)),
            Self::Sparse(_) => {
                let mut acc = 0.;
                self.for_each_nonzero(i, |j, v| acc += w[j] * v);
                acc
            }
        }
    }

    /// Computes `||x_i||^2`.
    pub fn squared_norm<B: LinearAlgebra>(&self, blas: &B, i: usize) -> f64 {
        match self {
            Self::Dense(x) => blas.dot(x.column(i), x.column(i)),
            Self::Sparse(_) => {
                let mut acc = 0.;
                self.for_each_nonzero(i, |_, v| acc += v * v);
                acc
            }
        }
    }

    /// Computes `y <- alpha * x_i + y`.
    pub fn axpy<B: LinearAlgebra>(
        &self,
        blas: &B,
        i: usize,
        alpha: f64,
        mut y: ArrayViewMut1<f64>,
    ) {
        match self {
            Self::Dense(x) => blas.axpy(alpha, x.column(i), y),
            Self::Sparse(_) => self.for_each_nonzero(i, |j, v| y[j] += alpha * v),
        }
    }

    /// Calls `f(row, value)` for every entry stored for example `i`.
    ///
    /// Dense matrices visit every row, zeros included.
    pub fn for_each_nonzero<F>(&self, i: usize, mut f: F)
    where
        F: FnMut(usize, f64),
    {
        match self {
            Self::Dense(x) => {
                for (j, &v) in x.column(i).iter().enumerate() {
                    f(j, v);
                }
            }
            Self::Sparse(x) => {
                let Some(column) = x.outer_view(i) else {
                    return;
                };

                for (j, &v) in column.iter() {
                    f(j, v);
                }
            }
        }
    }
}

/// The immutable training examples: a design matrix and its targets.
#[derive(Debug, Clone)]
pub struct Dataset {
    x: DesignMatrix,
    y: Array1<f64>,
}

impl Dataset {
    /// Creates a new `Dataset`.
    ///
    /// # Arguments
    /// * `x` - The `p x n` design matrix.
    /// * `y` - One target per example.
    ///
    /// # Returns
    /// An error if there is not exactly one target per column of `x`.
    pub fn new(x: DesignMatrix, y: Array1<f64>) -> Result<Self> {
        ensure_len("targets", y.len(), x.n_examples())?;
        if x.n_examples() == 0 {
            return Err(GlmErr::InvalidInput("the dataset has no examples"));
        }

        Ok(Self { x, y })
    }

    pub fn x(&self) -> &DesignMatrix {
        &self.x
    }

    pub fn y(&self) -> ArrayView1<'_, f64> {
        self.y.view()
    }

    pub fn n_features(&self) -> usize {
        self.x.n_features()
    }

    pub fn n_examples(&self) -> usize {
        self.x.n_examples()
    }

    /// Returns a copy of this dataset with its design matrix in compressed-column form.
    pub fn to_sparse(&self) -> Self {
        Self {
            x: self.x.to_sparse(),
            y: self.y.clone(),
        }
    }
}
