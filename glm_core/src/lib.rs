//! The collaborators of the adaptive SAG optimizer: loss families, the dense
//! linear-algebra provider, draw sources and the design matrix.

mod dataset;
mod draws;
mod error;
mod family;
mod linalg;

pub use dataset::{Dataset, DesignMatrix};
pub use draws::{DrawSource, PrecomputedDraws, RandomDraws};
pub use error::{GlmErr, Result, ensure_len};
pub use family::{Family, LossFamily};
pub use linalg::{LinearAlgebra, NdarrayBlas};
