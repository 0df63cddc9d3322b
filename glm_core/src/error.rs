use std::{
    error::Error,
    fmt::{self, Display},
};

/// The result type used across the GLM collaborators and the optimizer.
pub type Result<T> = std::result::Result<T, GlmErr>;

/// Errors produced while validating the inputs of a training call.
///
/// Every variant is raised before the optimizer touches any caller-owned
/// buffer, so an `Err` always leaves the warm-start state as it was.
#[derive(Debug, Clone, PartialEq)]
pub enum GlmErr {
    /// A length invariant was violated (e.g. `d` does not have one entry per feature).
    SizeMismatch {
        /// Human-readable name of the offending buffer.
        what: &'static str,
        /// Observed length.
        got: usize,
        /// Expected length.
        expected: usize,
    },

    /// The loss family selector is not one of the known families.
    UnknownFamily(String),

    /// The compressed-column arrays do not describe a valid sparse matrix.
    InvalidSparse(String),

    /// A scalar or an element is outside of its domain.
    InvalidInput(&'static str),
}

impl Display for GlmErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GlmErr::SizeMismatch {
                what,
                got,
                expected,
            } => write!(
                f,
                "size mismatch for {what}: got {got}, expected {expected}"
            ),
            GlmErr::UnknownFamily(selector) => write!(f, "unrecognized glm family: {selector}"),
            GlmErr::InvalidSparse(detail) => write!(f, "invalid sparse design matrix: {detail}"),
            GlmErr::InvalidInput(msg) => write!(f, "invalid input: {msg}"),
        }
    }
}

impl Error for GlmErr {}

/// Checks that a buffer has the expected length.
///
/// # Arguments
/// * `what` - The name reported on failure.
/// * `got` - The observed length.
/// * `expected` - The required length.
///
/// # Returns
/// A `SizeMismatch` error when both lengths differ.
pub fn ensure_len(what: &'static str, got: usize, expected: usize) -> Result<()> {
    if got != expected {
        return Err(GlmErr::SizeMismatch {
            what,
            got,
            expected,
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn size_mismatch_message() {
        let err = ensure_len("weights", 3, 2).unwrap_err();
        assert_eq!(err.to_string(), "size mismatch for weights: got 3, expected 2");
    }

    #[test]
    fn matching_len_is_ok() {
        assert!(ensure_len("targets", 4, 4).is_ok());
    }
}
