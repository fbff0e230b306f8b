//! Synthetic input tables for the batch runner.
use super::{BatchResult, CREDIT_SCORE_COLUMN, DTI_COLUMN};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use std::{io, path::Path};
use tracing::info;

/// Range of generated debt-to-income ratios.
pub const DTI_RANGE: (f64, f64) = (0.1, 0.6);

/// One generated row: an integer credit score and a DTI with two decimals.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SampleRow {
    pub credit_score: u32,
    pub dti: f64,
}

pub fn generate_samples<R: Rng + ?Sized>(rows: usize, rng: &mut R) -> Vec<SampleRow> {
    (0..rows)
        .map(|_| {
            let credit_score = rng.random_range(300..=850);
            let dti = rng.random_range(DTI_RANGE.0..DTI_RANGE.1);
            SampleRow {
                credit_score,
                dti: (dti * 100.0).round() / 100.0,
            }
        })
        .collect()
}

pub fn write_samples<W: io::Write>(samples: &[SampleRow], writer: W) -> BatchResult<()> {
    let mut writer = csv::Writer::from_writer(writer);
    writer.write_record([CREDIT_SCORE_COLUMN, DTI_COLUMN])?;
    for sample in samples {
        writer.write_record([
            sample.credit_score.to_string(),
            format!("{:.2}", sample.dti),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

/// Writes `rows` seeded samples to `path`.
pub fn generate_file(path: &Path, rows: usize, seed: u64) -> BatchResult<()> {
    let mut rng = ChaCha20Rng::seed_from_u64(seed);
    let samples = generate_samples(rows, &mut rng);
    write_samples(&samples, std::fs::File::create(path)?)?;
    info!(rows, seed, path = %path.display(), "wrote synthetic samples");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn samples_stay_in_range() {
        let mut rng = ChaCha20Rng::seed_from_u64(1);
        let samples = generate_samples(2000, &mut rng);
        assert_eq!(samples.len(), 2000);
        for sample in &samples {
            assert!((300..=850).contains(&sample.credit_score));
            assert!((DTI_RANGE.0..=DTI_RANGE.1).contains(&sample.dti));
            assert_eq!((sample.dti * 100.0).round() / 100.0, sample.dti);
        }
        assert!(samples.iter().any(|s| s.credit_score < 400));
        assert!(samples.iter().any(|s| s.credit_score > 750));
    }

    #[test]
    fn same_seed_same_samples() {
        let a = generate_samples(50, &mut ChaCha20Rng::seed_from_u64(9));
        let b = generate_samples(50, &mut ChaCha20Rng::seed_from_u64(9));
        assert_eq!(a, b);
    }

    #[test]
    fn table_has_header_and_two_decimal_dti() {
        let samples = [
            SampleRow { credit_score: 712, dti: 0.3 },
            SampleRow { credit_score: 300, dti: 0.15 },
        ];
        let mut buffer = Vec::new();
        write_samples(&samples, &mut buffer).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        assert_eq!(text, "Credit Score,DTI\n712,0.30\n300,0.15\n");
    }
}
