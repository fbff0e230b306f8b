use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CkksError {
    /// The parameter set cannot support the requested computation.
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Depth exhausted: operation needs {required} level(s), {available} remaining")]
    DepthExhausted { required: usize, available: usize },

    #[error("Scale mismatch: expected {expected:.6e}, got {actual:.6e}")]
    ScaleMismatch { expected: f64, actual: f64 },

    #[error("Level mismatch: {left} vs {right}")]
    LevelMismatch { left: usize, right: usize },

    #[error("Invalid ciphertext: {reason}")]
    InvalidCiphertext { reason: String },

    #[error("Invalid operand: {message}")]
    InvalidOperand { message: String },

    #[error("Encoding failed: {source}")]
    Encoding {
        #[from]
        source: crate::encoding::EncodingError,
    },

    #[error("Ring arithmetic failed: {source}")]
    Ring {
        #[from]
        source: crate::rings::RingError,
    },

    #[error("Key material error: {source}")]
    Key {
        #[from]
        source: crate::keys::KeyError,
    },
}

pub type CkksResult<T> = Result<T, CkksError>;
