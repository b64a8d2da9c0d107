//! Error types for convflow
//!
//! Every variant describes a configuration or construction problem. Once a
//! pipeline has been built from validated parameters, its iterations cannot
//! fail.

use thiserror::Error;

/// Result type alias using convflow's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while configuring or wiring a layer pipeline
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Shape mismatch between a declared dimension and actual storage
    #[error("Shape mismatch for '{what}': expected {expected:?}, got {got:?}")]
    ShapeMismatch {
        /// What was being checked
        what: &'static str,
        /// Expected shape
        expected: Vec<usize>,
        /// Actual shape
        got: Vec<usize>,
    },

    /// Invalid argument provided to a constructor
    #[error("Invalid argument '{arg}': {reason}")]
    InvalidArgument {
        /// The argument name
        arg: &'static str,
        /// Reason for invalidity
        reason: String,
    },

    /// A count that must split evenly into groups does not
    #[error("{what} ({value}) is not divisible by {divisor_name} ({divisor})")]
    NotDivisible {
        /// The quantity being divided
        what: &'static str,
        /// Its value
        value: usize,
        /// Name of the divisor
        divisor_name: &'static str,
        /// The divisor
        divisor: usize,
    },

    /// Index out of bounds
    #[error("Index {index} out of bounds for '{what}' of size {size}")]
    IndexOutOfBounds {
        /// What was indexed
        what: &'static str,
        /// The invalid index
        index: usize,
        /// Size of the dimension
        size: usize,
    },

    /// Reduction stages that do not shrink their input toward one value
    #[error("Invalid reduction plan at stage {stage}: {reason}")]
    InvalidReductionPlan {
        /// Zero-based stage number
        stage: usize,
        /// Description of the problem
        reason: String,
    },

    /// An operation that the configured layer variant does not support
    #[error("Operation '{operation}' is not supported by the {variant} variant")]
    UnsupportedVariant {
        /// The operation being attempted
        operation: &'static str,
        /// Name of the layer variant
        variant: &'static str,
    },
}

impl Error {
    /// Create a shape mismatch error
    pub fn shape_mismatch(what: &'static str, expected: &[usize], got: &[usize]) -> Self {
        Self::ShapeMismatch {
            what,
            expected: expected.to_vec(),
            got: got.to_vec(),
        }
    }

    /// Create an invalid argument error
    pub fn invalid_argument(arg: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            arg,
            reason: reason.into(),
        }
    }

    /// Create an invalid reduction plan error
    pub fn invalid_plan(stage: usize, reason: impl Into<String>) -> Self {
        Self::InvalidReductionPlan {
            stage,
            reason: reason.into(),
        }
    }
}
