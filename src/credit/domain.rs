//! Plaintext ranges the encrypted pipeline is valid over, and the polynomial
//! approximations fitted to them.
//!
//! Comparison and the sigmoid have no homomorphic primitive; both are
//! replaced by polynomials that are only accurate on a known input range:
//! - the threshold gates map `x = (v - threshold) / R` through a composite
//!   sign polynomial that sends `x ∈ [2^-8, 1]` to 1 and `x ∈ [-1, -2^-8]`
//!   to 0, within 1e-4
//! - the sigmoid is the degree-7 Chebyshev interpolant of `1 / (1 + e^-r)`
//!   on `r ∈ [0, 8.5]`, max error 4.1e-4
//!
//! Ages and salaries are integers, so every value is at least half a unit
//! from its gate threshold. Clamping salary into a window of `±2^6` around
//! the threshold keeps each salary on its side of it and lets both gates
//! share the radius `2^7`.
use super::policy::{MAX_CREDIT_SCORE, MIN_AGE, MIN_CREDIT_SCORE, MIN_SALARY, W0, W1};
use tracing::debug;

/// The age gate normalizes by `2^7`; ages are assumed in `[0, 146]`.
pub const AGE_RADIUS_BITS: u32 = 7;
/// The salary gate normalizes by `2^7`; salaries are clamped to
/// `MIN_SALARY ± 2^6`.
pub const SALARY_RADIUS_BITS: u32 = 7;
pub const AGE_RADIUS: f64 = (1u64 << AGE_RADIUS_BITS) as f64;
pub const SALARY_RADIUS: f64 = (1u64 << SALARY_RADIUS_BITS) as f64;
/// Largest power-of-two division done in one plaintext multiplication. The
/// rounded constant `q / 2^bits` keeps at least 24 significant bits.
pub const MAX_DIVISION_BITS: u32 = 16;

/// Plaintext multiplications needed to divide by `2^bits`.
pub const fn division_stages(bits: u32) -> usize {
    bits.div_ceil(MAX_DIVISION_BITS) as usize
}

/// `g(x) = (2126 x - 1359 x^3) / 1024`: pushes `|x|` away from zero fast.
pub const SIGN_STEEPEN: [f64; 4] = [0.0, 2126.0 / 1024.0, 0.0, -1359.0 / 1024.0];
/// `f(x) = (3 x - x^3) / 2`: pulls values near ±1 onto ±1.
pub const SIGN_POLISH: [f64; 4] = [0.0, 1.5, 0.0, -0.5];
/// `h(x) = 1/2 + 3/4 x - 1/4 x^3`: the last polish step, mapping ±1 to {0, 1}.
pub const SIGN_TO_STEP: [f64; 4] = [0.5, 0.75, 0.0, -0.25];
pub const STEEPEN_ROUNDS: usize = 8;
pub const POLISH_ROUNDS: usize = 2;

/// Below this DTI the raw score is at least 8 and the sigmoid is within
/// 3.4e-4 of 1, so smaller ratios are clamped up to it.
pub const DTI_FLOOR: f64 = 1.0 / 16.0;
/// Above this DTI the reciprocal term moves the sigmoid by less than 2e-3.
pub const DTI_CEILING: f64 = 64.0;

/// The sigmoid input `raw` is fitted on `[SIGMOID_LO, SIGMOID_HI]` and fed to
/// the polynomial as `z = (raw - 4.25) / 4.25 ∈ [-1, 1]`.
pub const SIGMOID_LO: f64 = 0.0;
pub const SIGMOID_HI: f64 = W0 + W1 / DTI_FLOOR;
pub const SIGMOID_DEGREE: usize = 7;

/// Newton iterations for `1 / dti` over `[DTI_FLOOR, DTI_CEILING]`.
pub const DTI_ITERATIONS: usize = 12;
/// Worst-case relative error accepted for `1 / dti`.
pub const DTI_TOLERANCE: f64 = 1e-3;

/// The plaintext ranges the pipeline's polynomials are valid over. The data
/// owner clamps into this box before encrypting; the evaluator never clamps.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoringDomain {
    pub age: (f64, f64),
    pub salary: (f64, f64),
    pub credit_score: (f64, f64),
    pub dti: (f64, f64),
}

impl Default for ScoringDomain {
    fn default() -> Self {
        Self {
            age: (0.0, 146.0),
            salary: (
                MIN_SALARY as f64 - SALARY_RADIUS / 2.0,
                MIN_SALARY as f64 + SALARY_RADIUS / 2.0,
            ),
            credit_score: (MIN_CREDIT_SCORE, MAX_CREDIT_SCORE),
            dti: (DTI_FLOOR, DTI_CEILING),
        }
    }
}

impl ScoringDomain {
    /// Clamps `(age, salary, credit_score, dti)` into the domain.
    pub fn clamp(&self, age: f64, salary: f64, credit_score: f64, dti: f64) -> [f64; 4] {
        [
            clamp_logged("age", age, self.age),
            clamp_logged("salary", salary, self.salary),
            clamp_logged("credit score", credit_score, self.credit_score),
            clamp_logged("dti", dti, self.dti),
        ]
    }

    /// Gate threshold for age: halfway between the last rejected and first
    /// accepted integer.
    pub fn age_threshold(&self) -> f64 {
        MIN_AGE as f64 + 0.5
    }

    pub fn salary_threshold(&self) -> f64 {
        MIN_SALARY as f64 + 0.5
    }
}

fn clamp_logged(name: &str, value: f64, (lo, hi): (f64, f64)) -> f64 {
    let clamped = value.clamp(lo, hi);
    if clamped != value {
        debug!(field = name, value, clamped, "input clamped into scoring domain");
    }
    clamped
}

/// Chebyshev interpolant of `f` on `[lo, hi]`, returned as monomial
/// coefficients in the normalized variable `z = (2x - lo - hi) / (hi - lo)`.
pub fn chebyshev_fit(f: impl Fn(f64) -> f64, degree: usize, lo: f64, hi: f64) -> Vec<f64> {
    let n = degree + 1;
    let samples: Vec<f64> = (0..n)
        .map(|k| {
            let node = (std::f64::consts::PI * (k as f64 + 0.5) / n as f64).cos();
            f(lo + (hi - lo) * (node + 1.0) / 2.0)
        })
        .collect();
    let mut chebyshev: Vec<f64> = (0..n)
        .map(|j| {
            let sum: f64 = samples
                .iter()
                .enumerate()
                .map(|(k, v)| {
                    v * (std::f64::consts::PI * j as f64 * (k as f64 + 0.5) / n as f64).cos()
                })
                .sum();
            2.0 * sum / n as f64
        })
        .collect();
    chebyshev[0] /= 2.0;

    // T_0 = 1, T_1 = z, T_k = 2 z T_{k-1} - T_{k-2}
    let mut basis: Vec<Vec<f64>> = vec![vec![1.0], vec![0.0, 1.0]];
    for k in 2..n {
        let mut next = vec![0.0; k + 1];
        for (i, v) in basis[k - 1].iter().enumerate() {
            next[i + 1] += 2.0 * v;
        }
        for (i, v) in basis[k - 2].iter().enumerate() {
            next[i] -= v;
        }
        basis.push(next);
    }

    let mut monomial = vec![0.0; n];
    for (c, t) in chebyshev.iter().zip(&basis) {
        for (i, v) in t.iter().enumerate() {
            monomial[i] += c * v;
        }
    }
    monomial
}

/// Monomial coefficients approximating the sigmoid in
/// `z = (raw - 4.25) / 4.25`.
pub fn sigmoid_coefficients() -> Vec<f64> {
    chebyshev_fit(super::reference::sigmoid, SIGMOID_DEGREE, SIGMOID_LO, SIGMOID_HI)
}

/// Horner evaluation in plaintext, used to predict the pipeline's output.
pub fn evaluate_polynomial(coefficients: &[f64], x: f64) -> f64 {
    coefficients.iter().rev().fold(0.0, |acc, c| acc * x + c)
}

/// Plaintext model of the encrypted gate: 1 for `x ≥ 2^-8`, 0 for `x ≤ -2^-8`.
pub fn approximate_step(mut x: f64) -> f64 {
    for _ in 0..STEEPEN_ROUNDS {
        x = evaluate_polynomial(&SIGN_STEEPEN, x);
    }
    for _ in 0..POLISH_ROUNDS {
        x = evaluate_polynomial(&SIGN_POLISH, x);
    }
    evaluate_polynomial(&SIGN_TO_STEP, x)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        credit::reference::sigmoid,
        crypto::{ReciprocalDomain, polynomial_depth},
    };
    use approx::assert_abs_diff_eq;

    #[test]
    fn sigmoid_fit_meets_error_bound() {
        let coefficients = sigmoid_coefficients();
        assert_eq!(coefficients.len(), SIGMOID_DEGREE + 1);
        assert_eq!(SIGMOID_HI, 8.5);
        assert_abs_diff_eq!(coefficients[0], 0.985_533_778_220, epsilon = 1e-9);
        assert_abs_diff_eq!(coefficients[7], -0.087_187_942_072, epsilon = 1e-9);
        let worst = (0..=8500)
            .map(|i| {
                let raw = i as f64 / 1000.0;
                (evaluate_polynomial(&coefficients, (raw - 4.25) / 4.25) - sigmoid(raw)).abs()
            })
            .fold(0.0, f64::max);
        assert!(worst < 4.1e-4, "worst error {worst}");
    }

    #[test]
    fn approximate_step_separates_outside_band() {
        let band = 2f64.powi(-8);
        for i in 0..=1000 {
            let x = band + (1.0 - band) * i as f64 / 1000.0;
            assert_abs_diff_eq!(approximate_step(x), 1.0, epsilon = 1e-4);
            assert_abs_diff_eq!(approximate_step(-x), 0.0, epsilon = 1e-4);
        }
        assert_abs_diff_eq!(approximate_step(0.0), 0.5, epsilon = 1e-12);
    }

    #[test]
    fn domain_fits_gate_radii() {
        let domain = ScoringDomain::default();
        for age in [domain.age.0, domain.age.1] {
            assert!((age - domain.age_threshold()).abs() <= AGE_RADIUS);
        }
        for salary in [domain.salary.0, domain.salary.1] {
            assert!((salary - domain.salary_threshold()).abs() <= SALARY_RADIUS);
        }
        // every integer age is at least half a year from the threshold
        assert!(0.5 / AGE_RADIUS >= 2f64.powi(-8));
    }

    #[test]
    fn sigmoid_input_stays_in_fit_range() {
        use crate::credit::reference::calc_score;
        let domain = ScoringDomain::default();
        for (cs, dti) in [
            (domain.credit_score.0, domain.dti.1),
            (domain.credit_score.1, domain.dti.0),
        ] {
            let raw = calc_score(cs, dti);
            assert!((SIGMOID_LO..=SIGMOID_HI).contains(&raw), "raw {raw}");
        }
    }

    #[test]
    fn radii_split_into_precise_stages() {
        assert_eq!(division_stages(AGE_RADIUS_BITS), 1);
        assert_eq!(division_stages(SALARY_RADIUS_BITS), 1);
        assert_eq!(division_stages(30), 2);
        assert_eq!(SALARY_RADIUS, 128.0);
    }

    #[test]
    fn dti_iterations_match_tolerance() {
        let domain = ScoringDomain::default();
        let reciprocal = ReciprocalDomain::new(domain.dti.0, domain.dti.1).unwrap();
        assert_eq!(reciprocal.iterations_for(DTI_TOLERANCE), DTI_ITERATIONS);
        assert_eq!(polynomial_depth(SIGMOID_DEGREE), 3);
    }

    #[test]
    fn clamp_only_touches_out_of_range_values() {
        let domain = ScoringDomain::default();
        assert_eq!(
            domain.clamp(25.0, 10_000_040.0, 700.0, 0.3),
            [25.0, 10_000_040.0, 700.0, 0.3]
        );
        assert_eq!(
            domain.clamp(200.0, 5e9, 900.0, 0.01),
            [146.0, 10_000_064.0, 850.0, DTI_FLOOR]
        );
        assert_eq!(domain.clamp(30.0, 0.0, 300.0, 500.0)[1..], [9_999_936.0, 300.0, 64.0]);
    }

    #[test]
    fn clamped_salaries_keep_their_side_of_the_threshold() {
        let domain = ScoringDomain::default();
        for salary in [0u64, 5_800_000, 9_999_000, 9_999_999, 10_000_000] {
            let [_, clamped, _, _] = domain.clamp(30.0, salary as f64, 700.0, 0.3);
            let x = (clamped - domain.salary_threshold()) / SALARY_RADIUS;
            assert!(x <= -2f64.powi(-8), "salary {salary}");
            assert_abs_diff_eq!(approximate_step(x), 0.0, epsilon = 1e-4);
        }
        for salary in [10_000_001u64, 10_000_002, 14_200_000, 100_000_001, 5_000_000_000] {
            let [_, clamped, _, _] = domain.clamp(30.0, salary as f64, 700.0, 0.3);
            let x = (clamped - domain.salary_threshold()) / SALARY_RADIUS;
            assert!(x >= 2f64.powi(-8), "salary {salary}");
            assert_abs_diff_eq!(approximate_step(x), 1.0, epsilon = 1e-4);
        }
    }

    #[test]
    fn dti_clamp_moves_the_score_little() {
        use crate::credit::reference::calc_score;
        let domain = ScoringDomain::default();
        for cs in [300.0, 575.0, 850.0] {
            for dti in [0.01, 0.03, 0.05, 0.06, 80.0, 1e3, 1e6] {
                let [_, _, _, clamped] = domain.clamp(30.0, 2e7, cs, dti);
                let moved = (sigmoid(calc_score(cs, clamped)) - sigmoid(calc_score(cs, dti))).abs();
                assert!(moved < 2e-3, "cs {cs} dti {dti}: {moved}");
            }
        }
    }
}
