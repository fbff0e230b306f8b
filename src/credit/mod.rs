//! Credit-risk scoring: the plaintext reference and its encrypted
//! counterpart.
pub mod domain;
pub mod pipeline;
pub mod policy;
pub mod record;
pub mod reference;

pub use domain::ScoringDomain;
pub use pipeline::{EncryptedCreditPipeline, PIPELINE_DEPTH, recommended_parameters};
pub use record::{CreditRecord, EncryptedCreditRecord};
