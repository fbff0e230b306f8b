//! Plaintext Reference Evaluator: the ground truth the encrypted pipeline is
//! measured against. Total: every input produces a score.
use super::policy::{
    INELIGIBLE, MAX_CREDIT_SCORE, MIN_AGE, MIN_CREDIT_SCORE, MIN_DTI, MIN_SALARY, W0, W1,
};

/// Preselection, then the squashed score; [`INELIGIBLE`] if preselection fails.
pub fn evaluate(age: u32, salary: u64, credit_score: f64, dti: f64) -> f64 {
    if !satisfies_preselection(age, salary) {
        return INELIGIBLE;
    }
    sigmoid(calc_score(credit_score, dti))
}

pub fn satisfies_preselection(age: u32, salary: u64) -> bool {
    salary > MIN_SALARY && age > MIN_AGE
}

/// The raw weighted score `W0 * norm + W1 / max(dti, MIN_DTI)`, before
/// squashing.
pub fn calc_score(credit_score: f64, dti: f64) -> f64 {
    let normalized = (credit_score - MIN_CREDIT_SCORE) / (MAX_CREDIT_SCORE - MIN_CREDIT_SCORE);
    let dti = dti.max(MIN_DTI);
    W0 * normalized + W1 * (1.0 / dti)
}

pub fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn preselection_gate() {
        assert_eq!(evaluate(17, 150_000_000, 800.0, 0.2), -1.0);
        assert_eq!(evaluate(18, 150_000_000, 800.0, 0.2), -1.0);
        assert_eq!(evaluate(25, 10_000_000, 800.0, 0.2), -1.0);
        assert!(evaluate(19, 10_000_001, 800.0, 0.2) > 0.0);
    }

    #[test]
    fn eligible_applicant_scores_near_one() {
        let expected = sigmoid(0.5 * 500.0 / 550.0 + 0.5 * 5.0);
        let score = evaluate(25, 150_000_000, 800.0, 0.2);
        assert_abs_diff_eq!(score, expected, epsilon = 1e-12);
        assert_abs_diff_eq!(score, 0.950_477_88, epsilon = 1e-6);
    }

    #[test]
    fn dti_is_floored() {
        assert_eq!(calc_score(300.0, 0.0), calc_score(300.0, MIN_DTI));
        assert_eq!(calc_score(300.0, -4.0), 0.5 / MIN_DTI);
        assert!(evaluate(30, 20_000_000, 850.0, 0.0).is_finite());
    }

    #[test]
    fn sigmoid_is_symmetric() {
        assert_abs_diff_eq!(sigmoid(0.0), 0.5);
        for x in [0.3, 1.0, 4.5] {
            assert_abs_diff_eq!(sigmoid(x) + sigmoid(-x), 1.0, epsilon = 1e-15);
        }
    }
}
