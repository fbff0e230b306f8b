//! Non-linear functions built from additions and multiplications only:
//! polynomial evaluation and the Newton reciprocal. Nothing here ever
//! decrypts an operand.
use super::{
    engine::{CkksEngine, require_levels},
    errors::{CkksError, CkksResult},
    types::Ciphertext,
};
use crate::keys::EvaluationKeySet;
use tracing::debug;

/// Levels consumed by [`CkksEngine::evaluate_polynomial`] for degree `degree`:
/// `⌈log2(degree + 1)⌉`.
pub const fn polynomial_depth(degree: usize) -> usize {
    (usize::BITS - degree.leading_zeros()) as usize
}

/// Levels consumed by [`CkksEngine::reciprocal`]: two per iteration.
pub const fn reciprocal_depth(iterations: usize) -> usize {
    2 * iterations
}

/// The interval `[lo, hi]` a reciprocal input is known to lie in.
///
/// Newton's iteration `y ← y (2 - d y)` squares the relative error
/// `e = 1 - d y` every step. Seeding with `2 / (lo + hi)` bounds the starting
/// error by `(hi - lo) / (hi + lo)` over the whole interval.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReciprocalDomain {
    lo: f64,
    hi: f64,
}

impl ReciprocalDomain {
    pub fn new(lo: f64, hi: f64) -> CkksResult<Self> {
        if !(lo.is_finite() && hi.is_finite() && 0.0 < lo && lo < hi) {
            return Err(CkksError::Configuration {
                message: format!("reciprocal domain [{lo}, {hi}] must satisfy 0 < lo < hi"),
            });
        }
        Ok(Self { lo, hi })
    }

    pub fn lo(&self) -> f64 {
        self.lo
    }

    pub fn hi(&self) -> f64 {
        self.hi
    }

    pub fn initial_guess(&self) -> f64 {
        2.0 / (self.lo + self.hi)
    }

    /// Worst-case relative error of the seed over the domain.
    pub fn initial_error(&self) -> f64 {
        (self.hi - self.lo) / (self.hi + self.lo)
    }

    /// Worst-case relative error after `iterations` Newton steps.
    pub fn error_after(&self, iterations: usize) -> f64 {
        self.initial_error().powf(2f64.powi(iterations as i32))
    }

    /// Smallest iteration count whose worst-case relative error is at most
    /// `tolerance` (at least one).
    pub fn iterations_for(&self, tolerance: f64) -> usize {
        let mut iterations = 1;
        while self.error_after(iterations) > tolerance && iterations < 64 {
            iterations += 1;
        }
        iterations
    }
}

impl<const DEGREE: usize> CkksEngine<DEGREE> {
    /// Evaluates `sum_k coefficients[k] * x^k` on `ciphertext`.
    ///
    /// Consumes `⌈log2(d + 1)⌉` levels for degree `d`. Every monomial is
    /// produced directly at the default scale on the output level, so the
    /// terms add without any scale correction.
    pub fn evaluate_polynomial(
        &self,
        ciphertext: &Ciphertext<DEGREE>,
        coefficients: &[f64],
        keys: &EvaluationKeySet<DEGREE>,
    ) -> CkksResult<Ciphertext<DEGREE>> {
        let degree = degree_of(coefficients);
        if degree == 0 {
            return Err(CkksError::InvalidOperand {
                message: "polynomial must have degree at least one".into(),
            });
        }
        if let Some(&bad) = coefficients.iter().find(|c| !c.is_finite()) {
            return Err(CkksError::InvalidOperand {
                message: format!("non-finite polynomial coefficient {bad}"),
            });
        }

        let level = self.validate(ciphertext)?;
        let depth = polynomial_depth(degree);
        require_levels(depth, level)?;
        let output_level = level - depth;
        debug!(degree, depth, level, output_level, "evaluating polynomial");

        // powers[i] = x^(2^i), at level `level - i`
        let mut powers = vec![ciphertext.clone()];
        while 1usize << powers.len() <= degree {
            let next = self.square(&powers[powers.len() - 1], keys)?;
            powers.push(next);
        }

        let target_scale = self.context().default_scale();
        let mut sum: Option<Ciphertext<DEGREE>> = None;
        for (k, &coefficient) in coefficients.iter().enumerate().take(degree + 1).skip(1) {
            if coefficient == 0.0 {
                continue;
            }
            let term =
                self.scaled_power(&powers, coefficient, k, target_scale, output_level, keys)?;
            sum = Some(match sum {
                Some(acc) => self.add(&acc, &term)?,
                None => term,
            });
        }
        let sum = sum.ok_or_else(|| CkksError::InvalidOperand {
            message: "polynomial has no non-constant term".into(),
        })?;
        self.add_plain(&sum, coefficients[0])
    }

    /// Applies `polynomials` innermost first: `p_n(... p_2(p_1(x)))`.
    ///
    /// Fails with `DepthExhausted` before any work if the summed depth of all
    /// stages exceeds the ciphertext's level.
    pub fn evaluate_composite(
        &self,
        ciphertext: &Ciphertext<DEGREE>,
        polynomials: &[&[f64]],
        keys: &EvaluationKeySet<DEGREE>,
    ) -> CkksResult<Ciphertext<DEGREE>> {
        let required = polynomials
            .iter()
            .map(|p| polynomial_depth(degree_of(p)))
            .sum::<usize>();
        require_levels(required, self.validate(ciphertext)?)?;
        let mut x = ciphertext.clone();
        for coefficients in polynomials {
            x = self.evaluate_polynomial(&x, coefficients, keys)?;
        }
        Ok(x)
    }

    /// Encrypts `coefficient * x^k` at exactly `scale` on `level`.
    ///
    /// With `m` the largest power of two not above `k`, the result is the
    /// product of `x^m` and `coefficient * x^(k-m)`, where the latter is built
    /// one level higher at the scale that makes the product land on `scale`.
    fn scaled_power(
        &self,
        powers: &[Ciphertext<DEGREE>],
        coefficient: f64,
        k: usize,
        scale: f64,
        level: usize,
        keys: &EvaluationKeySet<DEGREE>,
    ) -> CkksResult<Ciphertext<DEGREE>> {
        let exponent = (usize::BITS - 1 - k.leading_zeros()) as usize;
        let power = self.drop_to_level(&powers[exponent], level + 1)?;
        let m = 1usize << exponent;
        if m == k {
            return self.multiply_plain_to_scale(&power, coefficient, scale);
        }
        let modulus = self.context().modulus_at(level + 1)? as f64;
        let rest_scale = scale * modulus / power.scale;
        let rest = self.scaled_power(powers, coefficient, k - m, rest_scale, level + 1, keys)?;
        self.multiply(&rest, &power, keys)
    }

    /// Approximates `1 / d` with `iterations` Newton steps
    /// `y ← y (2 - d y)` seeded with the public constant `initial_guess`.
    ///
    /// Consumes two levels per iteration and fails with `DepthExhausted`
    /// before any work if the ciphertext cannot afford them. Converges when
    /// `0 < d * initial_guess < 2`; the result lands on the default scale.
    pub fn reciprocal(
        &self,
        ciphertext: &Ciphertext<DEGREE>,
        iterations: usize,
        initial_guess: f64,
        keys: &EvaluationKeySet<DEGREE>,
    ) -> CkksResult<Ciphertext<DEGREE>> {
        if iterations == 0 {
            return Err(CkksError::InvalidOperand {
                message: "reciprocal needs at least one iteration".into(),
            });
        }
        if !(initial_guess.is_finite() && initial_guess > 0.0) {
            return Err(CkksError::InvalidOperand {
                message: format!("initial guess {initial_guess} must be finite and positive"),
            });
        }
        let level = self.validate(ciphertext)?;
        require_levels(reciprocal_depth(iterations), level)?;
        debug!(iterations, initial_guess, level, "reciprocal");

        let target_scale = self.context().default_scale();

        // First step with the public seed: plaintext multiplications only.
        let t = self.multiply_plain(ciphertext, initial_guess)?;
        let u = self.add_plain(&self.negate(&t)?, 2.0)?;
        let mut y = self.multiply_plain_to_scale(&u, initial_guess, target_scale)?;

        for _ in 1..iterations {
            let t = self.multiply(ciphertext, &y, keys)?;
            let u = self.add_plain(&self.negate(&t)?, 2.0)?;
            // Re-scale y on u's level so that u * y lands on the default scale.
            let modulus = self.context().modulus_at(u.level())? as f64;
            let y_adjusted = self.multiply_plain_to_scale(
                &self.drop_to_level(&y, u.level() + 1)?,
                1.0,
                target_scale * modulus / u.scale,
            )?;
            y = self.multiply(&u, &y_adjusted, keys)?;
        }
        Ok(y)
    }

    /// [`Self::reciprocal`] with seed and iteration count derived from the
    /// input domain and a relative error tolerance.
    pub fn reciprocal_over(
        &self,
        ciphertext: &Ciphertext<DEGREE>,
        domain: &ReciprocalDomain,
        tolerance: f64,
        keys: &EvaluationKeySet<DEGREE>,
    ) -> CkksResult<Ciphertext<DEGREE>> {
        let iterations = domain.iterations_for(tolerance);
        self.reciprocal(ciphertext, iterations, domain.initial_guess(), keys)
    }
}

fn degree_of(coefficients: &[f64]) -> usize {
    coefficients
        .iter()
        .rposition(|&c| c != 0.0)
        .unwrap_or_default()
}
