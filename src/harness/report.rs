//! Accuracy and latency statistics comparing the reference evaluator with
//! the encrypted pipeline.
use super::{
    BatchResult, ReportError, ReportResult,
    batch::{EvaluationMode, column_index, parse_cell},
};
use std::{fmt, io, path::Path};
use tracing::warn;

fn check_lengths(reference: &[f64], pipeline: &[f64]) -> ReportResult<()> {
    if reference.len() != pipeline.len() {
        return Err(ReportError::LengthMismatch {
            left: reference.len(),
            right: pipeline.len(),
        });
    }
    if reference.is_empty() {
        return Err(ReportError::Empty);
    }
    Ok(())
}

pub fn mean(values: &[f64]) -> ReportResult<f64> {
    if values.is_empty() {
        return Err(ReportError::Empty);
    }
    Ok(values.iter().sum::<f64>() / values.len() as f64)
}

pub fn mean_absolute_error(reference: &[f64], pipeline: &[f64]) -> ReportResult<f64> {
    check_lengths(reference, pipeline)?;
    let total: f64 = reference
        .iter()
        .zip(pipeline)
        .map(|(r, p)| (r - p).abs())
        .sum();
    Ok(total / reference.len() as f64)
}

pub fn mean_squared_error(reference: &[f64], pipeline: &[f64]) -> ReportResult<f64> {
    check_lengths(reference, pipeline)?;
    let total: f64 = reference
        .iter()
        .zip(pipeline)
        .map(|(r, p)| (r - p) * (r - p))
        .sum();
    Ok(total / reference.len() as f64)
}

pub fn root_mean_squared_error(reference: &[f64], pipeline: &[f64]) -> ReportResult<f64> {
    mean_squared_error(reference, pipeline).map(f64::sqrt)
}

/// Mean of `pipeline[i] / reference[i]`.
pub fn mean_ratio(reference: &[f64], pipeline: &[f64]) -> ReportResult<f64> {
    check_lengths(reference, pipeline)?;
    let mut total = 0.0;
    for (index, (r, p)) in reference.iter().zip(pipeline).enumerate() {
        if *r == 0.0 {
            return Err(ReportError::DivisionByZero { index });
        }
        total += p / r;
    }
    Ok(total / reference.len() as f64)
}

/// Reads two named numeric columns. Rows where either cell is empty (a
/// failed evaluation) are skipped with a warning.
pub fn read_columns<R: io::Read>(
    input: R,
    left: &str,
    right: &str,
) -> BatchResult<(Vec<f64>, Vec<f64>)> {
    let mut reader = csv::Reader::from_reader(input);
    let header: Vec<String> = reader.headers()?.iter().map(str::to_owned).collect();
    let left_idx = column_index(&header, left)?;
    let right_idx = column_index(&header, right)?;

    let mut lefts = Vec::new();
    let mut rights = Vec::new();
    for (i, row) in reader.records().enumerate() {
        let row: Vec<String> = row?.iter().map(str::to_owned).collect();
        let blank = |idx: usize| row.get(idx).is_none_or(|cell| cell.trim().is_empty());
        if blank(left_idx) || blank(right_idx) {
            warn!(row = i + 1, left, right, "skipping row with empty cell");
            continue;
        }
        lefts.push(parse_cell(&row, left_idx, left, i + 1)?);
        rights.push(parse_cell(&row, right_idx, right, i + 1)?);
    }
    Ok((lefts, rights))
}

/// Summary of a batch table carrying both raw and encrypted columns.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Report {
    pub rows: usize,
    pub score_mae: f64,
    pub score_mse: f64,
    pub score_rmse: f64,
    pub result_mae: f64,
    pub result_mse: f64,
    pub raw_latency_ns: f64,
    pub encrypted_latency_ns: f64,
    pub latency_ratio: f64,
}

impl Report {
    pub fn from_path(path: &Path) -> BatchResult<Self> {
        let table = std::fs::read(path)?;
        Self::from_table(table.as_slice())
    }

    pub fn from_table(table: &[u8]) -> BatchResult<Self> {
        let (raw, encrypted) = read_columns(
            table,
            &EvaluationMode::Raw.score_column(),
            &EvaluationMode::Encrypted.score_column(),
        )?;
        let (raw_result, encrypted_result) = read_columns(
            table,
            &EvaluationMode::Raw.result_column(),
            &EvaluationMode::Encrypted.result_column(),
        )?;
        let (raw_time, encrypted_time) = read_columns(
            table,
            &EvaluationMode::Raw.time_column(),
            &EvaluationMode::Encrypted.time_column(),
        )?;

        Ok(Self {
            rows: raw.len(),
            score_mae: mean_absolute_error(&raw, &encrypted)?,
            score_mse: mean_squared_error(&raw, &encrypted)?,
            score_rmse: root_mean_squared_error(&raw, &encrypted)?,
            result_mae: mean_absolute_error(&raw_result, &encrypted_result)?,
            result_mse: mean_squared_error(&raw_result, &encrypted_result)?,
            raw_latency_ns: mean(&raw_time)?,
            encrypted_latency_ns: mean(&encrypted_time)?,
            latency_ratio: mean_ratio(&raw_time, &encrypted_time)?,
        })
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Rows compared: {}", self.rows)?;
        writeln!(f, "Evaluation Score Report:")?;
        writeln!(f, "  Mean Absolute Error (MAE):      {:.10}", self.score_mae)?;
        writeln!(f, "  Mean Squared Error (MSE):       {:.10}", self.score_mse)?;
        writeln!(f, "  Root Mean Squared Error (RMSE): {:.10}", self.score_rmse)?;
        writeln!(f, "Evaluation Result Report:")?;
        writeln!(f, "  Mean Absolute Error (MAE):      {:.10}", self.result_mae)?;
        writeln!(f, "  Mean Squared Error (MSE):       {:.10}", self.result_mse)?;
        writeln!(f, "Latency Report:")?;
        writeln!(f, "  Mean raw latency (ns):          {:.0}", self.raw_latency_ns)?;
        writeln!(f, "  Mean encrypted latency (ns):    {:.0}", self.encrypted_latency_ns)?;
        write!(f, "  Mean time ratio:                {:.4}", self.latency_ratio)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use proptest::prelude::*;

    #[test]
    fn error_metrics() {
        let reference = [1.0, 2.0, 3.0, 4.0];
        let pipeline = [1.5, 2.0, 2.0, 4.0];
        assert_abs_diff_eq!(mean_absolute_error(&reference, &pipeline).unwrap(), 0.375);
        assert_abs_diff_eq!(mean_squared_error(&reference, &pipeline).unwrap(), 0.3125);
        assert_abs_diff_eq!(
            root_mean_squared_error(&reference, &pipeline).unwrap(),
            0.3125f64.sqrt()
        );
        assert_abs_diff_eq!(mean_ratio(&[2.0, 4.0], &[6.0, 4.0]).unwrap(), 2.0);
    }

    #[test]
    fn mismatched_inputs_fail() {
        assert_eq!(
            mean_absolute_error(&[1.0, 2.0], &[1.0]),
            Err(ReportError::LengthMismatch { left: 2, right: 1 })
        );
        assert_eq!(
            mean_ratio(&[1.0, 0.0, 3.0], &[1.0, 1.0, 1.0]),
            Err(ReportError::DivisionByZero { index: 1 })
        );
        assert_eq!(mean_squared_error(&[], &[]), Err(ReportError::Empty));
        assert_eq!(mean(&[]), Err(ReportError::Empty));
    }

    proptest! {
        #[test]
        fn identical_sequences_have_zero_error(
            values in prop::collection::vec(-1e6f64..1e6, 1..64)
        ) {
            prop_assert_eq!(mean_absolute_error(&values, &values).unwrap(), 0.0);
            prop_assert_eq!(mean_squared_error(&values, &values).unwrap(), 0.0);
        }
    }

    #[test]
    fn report_skips_failed_rows() {
        let table = concat!(
            "Credit Score,DTI,",
            "Raw Evaluation Score,Raw Evaluation Result,Raw Evaluation Time (ns),",
            "Encrypted Evaluation Score,Encrypted Evaluation Result,",
            "Encrypted Evaluation Time (ns)\n",
            "800,0.20,0.950478,0.72,100,0.950400,0.72,1000\n",
            "700,0.30,0.900000,0.71,200,,,\n",
            "600,0.40,0.800000,0.69,50,0.800100,0.69,500\n",
        );
        let report = Report::from_table(table.as_bytes()).unwrap();
        assert_eq!(report.rows, 2);
        assert_abs_diff_eq!(report.score_mae, (0.000078 + 0.0001) / 2.0, epsilon = 1e-12);
        assert_abs_diff_eq!(report.result_mae, 0.0);
        assert_abs_diff_eq!(report.raw_latency_ns, 75.0);
        assert_abs_diff_eq!(report.latency_ratio, 10.0);
        assert!(report.to_string().contains("Mean time ratio:                10.0000"));
    }
}
