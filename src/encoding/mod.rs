//! Canonical-embedding encoding between real slot vectors and ring
//! coefficients, scaled by `Δ` and rounded to integers.

mod fft;

pub use fft::{CanonicalEncoder, encode_constant};
use thiserror::Error;

pub type EncodingResult<T> = Result<T, EncodingError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EncodingError {
    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Ring degree {degree} not supported")]
    InvalidRingDegree { degree: usize },

    #[error("Input too long: got {got}, max {max}")]
    InputTooLong { got: usize, max: usize },

    #[error("Value {value} is not finite")]
    NonFiniteValue { value: f64 },

    #[error("Coefficient {value} out of range")]
    CoefficientOutOfRange { value: f64 },
}
