//! Batch runner: scores every row of a `Credit Score`,`DTI` table with one or
//! more evaluators and writes the table back with result columns appended.
//!
//! Rows are independent, so they are scored in parallel. A row whose
//! evaluation fails is logged and left with empty cells; the rest of the
//! batch continues.
use super::{BatchError, BatchResult, CREDIT_SCORE_COLUMN, DTI_COLUMN};
use crate::{
    context::CkksContext,
    credit::{CreditRecord, EncryptedCreditPipeline, EncryptedCreditRecord, reference},
    keys::{KeyGenerator, KeyPair},
};
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use rayon::prelude::*;
use std::{
    io,
    path::Path,
    sync::Arc,
    time::{Duration, Instant},
};
use tracing::{info, warn};

/// Applicant age used for every row; the table carries no age column.
pub const APPLICANT_AGE: u32 = 19;
/// Applicant salary used for every row.
pub const APPLICANT_SALARY: u64 = 100 * 1000 * 1000 + 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvaluationMode {
    Raw,
    Encrypted,
}

impl EvaluationMode {
    pub fn label(self) -> &'static str {
        match self {
            Self::Raw => "Raw",
            Self::Encrypted => "Encrypted",
        }
    }

    pub fn score_column(self) -> String {
        format!("{} Evaluation Score", self.label())
    }

    pub fn result_column(self) -> String {
        format!("{} Evaluation Result", self.label())
    }

    pub fn time_column(self) -> String {
        format!("{} Evaluation Time (ns)", self.label())
    }
}

/// A scored row and the time spent scoring it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Evaluation {
    pub score: f64,
    pub elapsed: Duration,
}

impl Evaluation {
    /// The result column: `sigmoid(score)`.
    ///
    /// The score is already a sigmoid output, so this squashes it a second
    /// time (0.95 becomes 0.72). Existing result tables are produced this
    /// way and the column stays comparable with them.
    pub fn result(&self) -> f64 {
        reference::sigmoid(self.score)
    }
}

/// Scores one record. `index` is the row's position, available for
/// per-row determinism.
pub trait Evaluator: Sync {
    fn mode(&self) -> EvaluationMode;

    fn evaluate(&self, index: usize, record: &CreditRecord) -> BatchResult<Evaluation>;
}

/// Plaintext reference evaluator.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReferenceEvaluator;

impl Evaluator for ReferenceEvaluator {
    fn mode(&self) -> EvaluationMode {
        EvaluationMode::Raw
    }

    fn evaluate(&self, _index: usize, record: &CreditRecord) -> BatchResult<Evaluation> {
        let start = Instant::now();
        let score = record.reference_score();
        Ok(Evaluation {
            score,
            elapsed: start.elapsed(),
        })
    }
}

/// Plays both roles: encrypts as the data owner, evaluates as the
/// evaluator, decrypts as the data owner. Only evaluation and decryption
/// are timed.
pub struct EncryptedEvaluator<const DEGREE: usize> {
    pipeline: EncryptedCreditPipeline<DEGREE>,
    keys: KeyPair<DEGREE>,
    seed: u64,
}

impl<const DEGREE: usize> EncryptedEvaluator<DEGREE> {
    /// Generates fresh keys from `seed` and builds the pipeline.
    pub fn new(context: Arc<CkksContext<DEGREE>>, seed: u64) -> BatchResult<Self> {
        let mut rng = ChaCha20Rng::seed_from_u64(seed);
        let generator = KeyGenerator::new(Arc::clone(&context));
        let keys = generator.generate_key_pair(&mut rng)?;
        let evaluation_keys = generator.generate_evaluation_keys(&keys.secret, &mut rng)?;
        let pipeline = EncryptedCreditPipeline::new(context, Arc::new(evaluation_keys))?;
        Ok(Self::from_parts(pipeline, keys, seed))
    }

    pub fn from_parts(
        pipeline: EncryptedCreditPipeline<DEGREE>,
        keys: KeyPair<DEGREE>,
        seed: u64,
    ) -> Self {
        Self {
            pipeline,
            keys,
            seed,
        }
    }

    pub fn pipeline(&self) -> &EncryptedCreditPipeline<DEGREE> {
        &self.pipeline
    }
}

impl<const DEGREE: usize> Evaluator for EncryptedEvaluator<DEGREE> {
    fn mode(&self) -> EvaluationMode {
        EvaluationMode::Encrypted
    }

    fn evaluate(&self, index: usize, record: &CreditRecord) -> BatchResult<Evaluation> {
        let mut rng = ChaCha20Rng::seed_from_u64(self.seed);
        rng.set_stream(index as u64 + 1);
        let engine = self.pipeline.engine();
        let encrypted = EncryptedCreditRecord::encrypt(
            record,
            self.pipeline.domain(),
            engine,
            &self.keys.public,
            &mut rng,
        )?;

        let start = Instant::now();
        let output = self.pipeline.evaluate(&encrypted)?;
        let score = engine.decrypt(&output, &self.keys.secret)?;
        Ok(Evaluation {
            score,
            elapsed: start.elapsed(),
        })
    }
}

/// Counts for one evaluator over one batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchSummary {
    pub mode: EvaluationMode,
    pub rows: usize,
    pub failures: usize,
}

/// Reads the table from `input`, scores it with every evaluator and writes
/// the extended table to `output`. `input` and `output` may be the same file.
pub fn run_file(
    input: &Path,
    output: &Path,
    evaluators: &[&dyn Evaluator],
) -> BatchResult<Vec<BatchSummary>> {
    let table = std::fs::read(input)?;
    let mut buffer = Vec::new();
    let summaries = run(table.as_slice(), &mut buffer, evaluators)?;
    std::fs::write(output, buffer)?;
    info!(input = %input.display(), output = %output.display(), "batch written");
    Ok(summaries)
}

pub fn run<R: io::Read, W: io::Write>(
    input: R,
    output: W,
    evaluators: &[&dyn Evaluator],
) -> BatchResult<Vec<BatchSummary>> {
    let mut reader = csv::Reader::from_reader(input);
    let mut header: Vec<String> = reader.headers()?.iter().map(str::to_owned).collect();
    let credit_score_idx = column_index(&header, CREDIT_SCORE_COLUMN)?;
    let dti_idx = column_index(&header, DTI_COLUMN)?;

    let mut rows = Vec::new();
    let mut records = Vec::new();
    for (i, row) in reader.records().enumerate() {
        let row: Vec<String> = row?.iter().map(str::to_owned).collect();
        let credit_score = parse_cell(&row, credit_score_idx, CREDIT_SCORE_COLUMN, i + 1)?;
        let dti = parse_cell(&row, dti_idx, DTI_COLUMN, i + 1)?;
        records.push(CreditRecord::new(
            APPLICANT_AGE,
            APPLICANT_SALARY,
            credit_score,
            dti,
        ));
        rows.push(row);
    }

    let mut summaries = Vec::with_capacity(evaluators.len());
    for evaluator in evaluators {
        let mode = evaluator.mode();
        let columns = [
            ensure_column(&mut header, mode.score_column()),
            ensure_column(&mut header, mode.result_column()),
            ensure_column(&mut header, mode.time_column()),
        ];

        let results: Vec<BatchResult<Evaluation>> = records
            .par_iter()
            .enumerate()
            .map(|(i, record)| evaluator.evaluate(i, record))
            .collect();

        let mut failures = 0;
        for (i, (row, result)) in rows.iter_mut().zip(results).enumerate() {
            row.resize(header.len(), String::new());
            let cells = match result {
                Ok(evaluation) => [
                    format!("{:.6}", evaluation.score),
                    format!("{:.2}", evaluation.result()),
                    evaluation.elapsed.as_nanos().to_string(),
                ],
                Err(err) => {
                    warn!(row = i + 1, mode = mode.label(), error = %err, "evaluation failed");
                    failures += 1;
                    Default::default()
                }
            };
            for (idx, cell) in columns.into_iter().zip(cells) {
                row[idx] = cell;
            }
        }
        info!(
            mode = mode.label(),
            rows = records.len(),
            failures,
            "batch evaluated"
        );
        summaries.push(BatchSummary {
            mode,
            rows: records.len(),
            failures,
        });
    }

    let mut writer = csv::Writer::from_writer(output);
    writer.write_record(&header)?;
    for row in &rows {
        writer.write_record(row)?;
    }
    writer.flush()?;
    Ok(summaries)
}

pub(crate) fn column_index(header: &[String], name: &str) -> BatchResult<usize> {
    header
        .iter()
        .position(|h| h == name)
        .ok_or_else(|| BatchError::MissingColumn(name.to_owned()))
}

/// Index of `name`, appending it if absent. Re-running a mode overwrites its
/// columns.
fn ensure_column(header: &mut Vec<String>, name: String) -> usize {
    match header.iter().position(|h| *h == name) {
        Some(idx) => idx,
        None => {
            header.push(name);
            header.len() - 1
        }
    }
}

pub(crate) fn parse_cell(
    row: &[String],
    idx: usize,
    column: &str,
    line: usize,
) -> BatchResult<f64> {
    let value = row.get(idx).map(String::as_str).unwrap_or_default();
    value.trim().parse().map_err(|_| BatchError::Parse {
        row: line,
        column: column.to_owned(),
        value: value.to_owned(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn result_squashes_the_score_once_more() {
        let evaluation = Evaluation {
            score: reference::evaluate(25, 150_000_000, 800.0, 0.2),
            elapsed: Duration::ZERO,
        };
        assert!((evaluation.score - 0.950_478).abs() < 1e-6);
        assert!((evaluation.result() - 0.721_211).abs() < 1e-6);
        assert_eq!(format!("{:.2}", evaluation.result()), "0.72");
    }

    struct Failing;

    impl Evaluator for Failing {
        fn mode(&self) -> EvaluationMode {
            EvaluationMode::Encrypted
        }

        fn evaluate(&self, index: usize, record: &CreditRecord) -> BatchResult<Evaluation> {
            if index == 1 {
                return Err(crate::crypto::CkksError::DepthExhausted {
                    required: 2,
                    available: 1,
                }
                .into());
            }
            Ok(Evaluation {
                score: record.credit_score / 1000.0,
                elapsed: Duration::from_nanos(7),
            })
        }
    }

    fn run_to_string(input: &str, evaluators: &[&dyn Evaluator]) -> (String, Vec<BatchSummary>) {
        let mut out = Vec::new();
        let summaries = run(input.as_bytes(), &mut out, evaluators).unwrap();
        (String::from_utf8(out).unwrap(), summaries)
    }

    #[test]
    fn reference_columns_are_appended() {
        let (text, summaries) =
            run_to_string("Credit Score,DTI\n800,0.20\n", &[&ReferenceEvaluator]);
        let mut lines = text.lines();
        assert_eq!(
            lines.next().unwrap(),
            "Credit Score,DTI,Raw Evaluation Score,Raw Evaluation Result,Raw Evaluation Time (ns)"
        );
        let cells: Vec<&str> = lines.next().unwrap().split(',').collect();
        assert_eq!(&cells[..4], ["800", "0.20", "0.950478", "0.72"]);
        assert!(cells[4].parse::<u128>().is_ok());
        assert_eq!(summaries[0].failures, 0);
    }

    #[test]
    fn failed_rows_leave_empty_cells() {
        let input = "Credit Score,DTI\n500,0.3\n600,0.4\n700,0.5\n";
        let (text, summaries) = run_to_string(input, &[&Failing]);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[1], "500,0.3,0.500000,0.62,7");
        assert_eq!(lines[2], "600,0.4,,,");
        assert_eq!(lines[3], "700,0.5,0.700000,0.67,7");
        assert_eq!(
            summaries,
            vec![BatchSummary {
                mode: EvaluationMode::Encrypted,
                rows: 3,
                failures: 1
            }]
        );
    }

    #[test]
    fn rerun_overwrites_existing_columns() {
        let (first, _) = run_to_string("Credit Score,DTI\n800,0.20\n", &[&ReferenceEvaluator]);
        let (second, _) = run_to_string(&first, &[&ReferenceEvaluator, &Failing]);
        let header = second.lines().next().unwrap();
        assert_eq!(header.split(',').count(), 8);
        assert_eq!(header.matches("Raw Evaluation Score").count(), 1);
    }

    #[test]
    fn missing_column_is_an_error() {
        let err =
            run("Score,DTI\n1,2\n".as_bytes(), Vec::new(), &[&ReferenceEvaluator]).unwrap_err();
        assert!(matches!(err, BatchError::MissingColumn(name) if name == CREDIT_SCORE_COLUMN));
    }

    #[test]
    fn unparsable_cell_names_its_row() {
        let err = run(
            "Credit Score,DTI\n700,0.2\n7x0,0.2\n".as_bytes(),
            Vec::new(),
            &[&ReferenceEvaluator],
        )
        .unwrap_err();
        assert!(matches!(err, BatchError::Parse { row: 2, .. }));
    }
}
