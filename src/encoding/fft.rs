//! Canonical-embedding encoder for real vectors.
//!
//! A real plaintext polynomial `m(X)` in `R[X]/(X^n + 1)` is identified with
//! its evaluations at the primitive `2n`-th roots of unity
//! `zeta^(2k+1)`, `zeta = e^(i*pi/n)`. Evaluations come in conjugate pairs
//! (`k` and `n-1-k`), so `n/2` complex numbers determine `m`; this encoder
//! uses their real parts as `n/2` real slots.
//!
//! Mathematical background:
//! - `m(zeta^(2k+1)) = sum_i (m_i zeta^i) w^(ik)` with `w = zeta^2`, which is an
//!   unnormalized inverse DFT of the twisted coefficients `m_i zeta^i`
//! - encoding runs the forward DFT over the slot vector and untwists
//! - values are scaled by `delta` and rounded to integers
use super::{EncodingError, EncodingResult};
use rustfft::{Fft, FftPlanner};
use num_complex::Complex64;
use std::{f64::consts::PI, sync::Arc};

/// Largest coefficient magnitude accepted by the encoder (`2^126`).
const MAX_COEFFICIENT: f64 = (1u128 << 126) as f64;

pub struct CanonicalEncoder<const DEGREE: usize> {
    forward: Arc<dyn Fft<f64>>,
    inverse: Arc<dyn Fft<f64>>,
    // twist[i] = zeta^i
    twist: Vec<Complex64>,
}

impl<const DEGREE: usize> std::fmt::Debug for CanonicalEncoder<DEGREE> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CanonicalEncoder")
            .field("degree", &DEGREE)
            .finish()
    }
}

impl<const DEGREE: usize> CanonicalEncoder<DEGREE> {
    pub fn new() -> EncodingResult<Self> {
        if !DEGREE.is_power_of_two() || DEGREE < 8 {
            return Err(EncodingError::InvalidRingDegree { degree: DEGREE });
        }
        let mut planner = FftPlanner::new();
        let twist = (0..DEGREE)
            .map(|i| Complex64::from_polar(1.0, PI * i as f64 / DEGREE as f64))
            .collect();
        Ok(Self {
            forward: planner.plan_fft_forward(DEGREE),
            inverse: planner.plan_fft_inverse(DEGREE),
            twist,
        })
    }

    /// Maximum number of values that can be encoded
    pub fn max_slots(&self) -> usize {
        DEGREE / 2
    }

    /// Encodes up to `n/2` reals into rounded integer coefficients of
    /// `delta * m(X)`. Unused slots are zero.
    pub fn encode(&self, values: &[f64], delta: f64) -> EncodingResult<Vec<i128>> {
        let max_slots = self.max_slots();
        if values.len() > max_slots {
            return Err(EncodingError::InputTooLong {
                got: values.len(),
                max: max_slots,
            });
        }
        if let Some(&value) = values.iter().find(|v| !v.is_finite()) {
            return Err(EncodingError::NonFiniteValue { value });
        }

        let mut slots = vec![Complex64::new(0.0, 0.0); DEGREE];
        for (j, &value) in values.iter().enumerate() {
            slots[j] = Complex64::new(value, 0.0);
            slots[DEGREE - 1 - j] = Complex64::new(value, 0.0);
        }
        self.forward.process(&mut slots);

        let normalizer = delta / DEGREE as f64;
        slots
            .iter()
            .zip(&self.twist)
            .map(|(&transformed, &twist)| {
                let coeff = (transformed * twist.conj()).re * normalizer;
                round_coefficient(coeff)
            })
            .collect()
    }

    /// Decodes centered coefficients of `delta * m(X)` back to `n/2` real slots.
    pub fn decode(&self, coeffs: &[f64], delta: f64) -> EncodingResult<Vec<f64>> {
        if coeffs.len() != DEGREE {
            return Err(EncodingError::InvalidInput {
                message: format!("expected {DEGREE} coefficients, got {}", coeffs.len()),
            });
        }
        let mut evaluations: Vec<Complex64> = coeffs
            .iter()
            .zip(&self.twist)
            .map(|(&coeff, &twist)| twist * coeff)
            .collect();
        self.inverse.process(&mut evaluations);

        Ok(evaluations
            .iter()
            .take(self.max_slots())
            .map(|value| value.re / delta)
            .collect())
    }
}

/// Encodes a single value as the constant polynomial `round(value * delta)`.
///
/// A constant polynomial evaluates to the same number at every root, so this
/// is the encoding of `value` replicated across all slots.
pub fn encode_constant(value: f64, delta: f64) -> EncodingResult<i128> {
    if !value.is_finite() {
        return Err(EncodingError::NonFiniteValue { value });
    }
    round_coefficient(value * delta)
}

fn round_coefficient(scaled: f64) -> EncodingResult<i128> {
    if !scaled.is_finite() || scaled.abs() >= MAX_COEFFICIENT {
        return Err(EncodingError::CoefficientOutOfRange { value: scaled });
    }
    Ok(scaled.round() as i128)
}
