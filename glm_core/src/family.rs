use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{GlmErr, Result};

/// Per-example loss of an exponential-family model.
///
/// Both functions take the observed target and the linear predictor
/// `eta = <w, x_i>`; `gradient` is the derivative of `loss` with respect to
/// `eta`, so the gradient with respect to the weights is `gradient * x_i`.
pub trait LossFamily {
    fn loss(&self, target: f64, eta: f64) -> f64;
    fn gradient(&self, target: f64, eta: f64) -> f64;
}

/// The closed set of loss families the optimizer ships with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Family {
    /// Least squares, any real target.
    Gaussian,
    /// Logistic loss, targets in {-1, +1}.
    Bernoulli,
    /// Log link on the mean, positive targets.
    Exponential,
    /// Log link on the rate, count targets.
    Poisson,
}

use Family::*;

impl LossFamily for Family {
    fn loss(&self, target: f64, eta: f64) -> f64 {
        match self {
            Gaussian => 0.5 * (eta - target).powi(2),
            Bernoulli => softplus(-target * eta),
            Exponential => target * (-eta).exp() + eta,
            Poisson => eta.exp() - target * eta,
        }
    }

    fn gradient(&self, target: f64, eta: f64) -> f64 {
        match self {
            Gaussian => eta - target,
            Bernoulli => -target / (1. + (target * eta).exp()),
            Exponential => 1. - target * (-eta).exp(),
            Poisson => eta.exp() - target,
        }
    }
}

/// `log(1 + e^m)` without overflowing for large `m`.
fn softplus(m: f64) -> f64 {
    if m > 0. {
        m + (-m).exp().ln_1p()
    } else {
        m.exp().ln_1p()
    }
}

impl TryFrom<i32> for Family {
    type Error = GlmErr;

    /// Maps the integer selector used by host runtimes (0 = gaussian, 1 = bernoulli,
    /// 2 = exponential, 3 = poisson).
    fn try_from(code: i32) -> Result<Self> {
        match code {
            0 => Ok(Gaussian),
            1 => Ok(Bernoulli),
            2 => Ok(Exponential),
            3 => Ok(Poisson),
            other => Err(GlmErr::UnknownFamily(other.to_string())),
        }
    }
}

impl FromStr for Family {
    type Err = GlmErr;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "gaussian" => Ok(Gaussian),
            "bernoulli" | "binomial" => Ok(Bernoulli),
            "exponential" => Ok(Exponential),
            "poisson" => Ok(Poisson),
            _ => Err(GlmErr::UnknownFamily(s.to_string())),
        }
    }
}

impl fmt::Display for Family {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Gaussian => "gaussian",
            Bernoulli => "bernoulli",
            Exponential => "exponential",
            Poisson => "poisson",
        };

        f.write_str(name)
    }
}
