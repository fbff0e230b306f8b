//! Key material: the ternary secret key, the public encryption key and the
//! relinearization key, all generated from an explicit RNG.

pub mod errors;
pub mod generator;
pub mod public_key;
pub mod relin_key;
pub mod secret_key;

pub use errors::{KeyError, KeyResult};
pub use generator::{EncryptionKey, EvaluationKeySet, KeyGenerator, KeyPair};
pub use public_key::PublicKey;
pub use relin_key::{KeySwitchDigit, RelinearizationKey};
pub use secret_key::SecretKey;
