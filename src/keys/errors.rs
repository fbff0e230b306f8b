use crate::rings::RingError;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum KeyError {
    #[error("Hamming weight {weight} exceeds ring degree {degree}")]
    InvalidHammingWeight { weight: usize, degree: usize },

    #[error("Invalid error standard deviation: {0} (must be positive)")]
    InvalidErrorStd(f64),

    #[error("Plaintext basis does not match the key: expected {expected:?}, got {actual:?}")]
    BasisMismatch { expected: Vec<u64>, actual: Vec<u64> },

    #[error("Key material was generated for a different modulus chain")]
    ForeignKey,

    #[error("Key generation failed: {0}")]
    Ring(#[from] RingError),
}

pub type KeyResult<T> = Result<T, KeyError>;
