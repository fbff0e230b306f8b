//! Public lending policy shared by the reference evaluator and the encrypted
//! pipeline.

/// Salary an applicant must strictly exceed.
pub const MIN_SALARY: u64 = 10 * 1000 * 1000;
/// Age an applicant must strictly exceed.
pub const MIN_AGE: u32 = 18;

pub const MAX_CREDIT_SCORE: f64 = 850.0;
pub const MIN_CREDIT_SCORE: f64 = 300.0;
/// Floor applied to the debt-to-income ratio before taking its reciprocal.
pub const MIN_DTI: f64 = 0.01;

/// Weight of the normalized credit score.
pub const W0: f64 = 0.5;
/// Weight of the reciprocal debt-to-income ratio.
pub const W1: f64 = 0.5;

/// Score reported for an ineligible applicant.
pub const INELIGIBLE: f64 = -1.0;
