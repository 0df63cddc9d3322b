//! Stochastic average gradient for `l2`-regularized generalized linear models
//! over dense or sparse column-major data, with importance sampling over
//! adaptive Lipschitz estimates or a line search on a shared one.

pub mod config;
pub mod ledger;
pub mod lipschitz;
pub mod path;
pub mod sag;
pub mod sampling;

pub use config::{DatasetSpec, RunSpec, Selection, TrainerSpec};
pub use glm_core::{
    Dataset, DesignMatrix, DrawSource, Family, GlmErr, LinearAlgebra, LossFamily, NdarrayBlas,
    PrecomputedDraws, RandomDraws, Result,
};
pub use path::{PathReport, fit_path};
pub use sag::{
    AdaptiveSag, FitReport, LineSearchSag, SagSolver, SagState, Status, StepSizeRule, Trainer,
};
