use std::error::Error;
use std::fmt;
use std::fmt::Display;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BeamError {
    /// The configuration cannot describe a valid beam (non-positive parameters, bad load vector).
    InvalidConfiguration(String),
    /// An input vector does not have the length required by the configuration.
    DimensionMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },
    /// The assembled stiffness matrix is singular.
    SingularMatrix,
    /// The sparse factorization failed for a reason other than singularity.
    Factorization(String),
}

impl BeamError {
    pub(crate) fn check_len(what: &'static str, expected: usize, actual: usize) -> Result<(), BeamError> {
        if expected == actual {
            Ok(())
        } else {
            Err(BeamError::DimensionMismatch { what, expected, actual })
        }
    }
}

impl Display for BeamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        match self {
            BeamError::InvalidConfiguration(reason) => write!(f, "Invalid beam configuration: {}", reason),
            BeamError::DimensionMismatch { what, expected, actual } => {
                write!(f, "Expected {} of length {}, got length {}.", what, expected, actual)
            }
            BeamError::SingularMatrix => write!(f, "Assembled stiffness matrix is singular."),
            BeamError::Factorization(reason) => write!(f, "Failed to factorize stiffness matrix: {}", reason),
        }
    }
}

impl Error for BeamError {}
