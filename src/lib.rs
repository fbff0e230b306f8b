//! Credit-risk scoring over CKKS-encrypted inputs.
//!
//! A data owner encrypts an applicant's age, salary, credit score and
//! debt-to-income ratio; an evaluator holding only public material runs
//! [`EncryptedCreditPipeline`] and returns a ciphertext that decrypts to the
//! same score as the plaintext [`credit::reference`] evaluator, or `-1` for
//! an ineligible applicant.
//!
//! The scheme is leveled RNS-CKKS over `Z_Q[X]/(X^N + 1)` with the ring
//! degree as a const generic.
pub mod context;
pub mod credit;
pub mod crypto;
pub mod encoding;
pub mod harness;
pub mod keys;
pub mod math;
pub mod params;
pub mod rings;

pub use context::CkksContext;
pub use credit::{
    CreditRecord, EncryptedCreditPipeline, EncryptedCreditRecord, PIPELINE_DEPTH, ScoringDomain,
};
pub use crypto::{Ciphertext, CkksEngine, CkksError, CkksResult, Plaintext};
pub use keys::{EvaluationKeySet, KeyGenerator, KeyPair, PublicKey, SecretKey};
pub use params::{SchemeParameters, SchemeParametersBuilder};
pub use rings::{RingError, RnsPoly};
