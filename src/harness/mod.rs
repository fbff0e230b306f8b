//! Accuracy/Performance Harness: synthetic data, batch scoring over CSV
//! tables, and the comparison report.
pub mod batch;
pub mod errors;
pub mod generator;
pub mod report;

pub use batch::{
    APPLICANT_AGE, APPLICANT_SALARY, BatchSummary, EncryptedEvaluator, Evaluation, EvaluationMode,
    Evaluator, ReferenceEvaluator,
};
pub use errors::{BatchError, BatchResult, ReportError, ReportResult};
pub use generator::{SampleRow, generate_file};
pub use report::Report;

pub const CREDIT_SCORE_COLUMN: &str = "Credit Score";
pub const DTI_COLUMN: &str = "DTI";
