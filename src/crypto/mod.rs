//! High-level CKKS cryptographic operations
//!
//! This module provides the main user-facing API for CKKS operations:
//! encoding, encryption, decryption, homomorphic arithmetic and the
//! polynomial / reciprocal approximations built on top of it.

pub mod approx;
pub mod engine;
pub mod errors;
pub mod types;

// Re-export the main types users need
pub use approx::{ReciprocalDomain, polynomial_depth, reciprocal_depth};
pub use engine::{CkksEngine, SCALE_TOLERANCE, check_scales};
pub use errors::{CkksError, CkksResult};
pub use types::{Ciphertext, Plaintext, TensoredCiphertext};
