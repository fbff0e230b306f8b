//! Encrypted Credit Evaluation Pipeline.
//!
//! Reproduces [`reference::evaluate`](super::reference::evaluate) on
//! ciphertexts only:
//!
//! ```text
//! gate  = step((age - 18.5) / 2^7) * step((salary - 10_000_000.5) / 2^7)
//! z     = W0 / (550 * 4.25) * (cs - 300) + W1 / 4.25 * (1 / dti) - 1
//! score = sigmoid_poly(z)
//! out   = gate * (score + 1) - 1
//! ```
//!
//! where `z = (raw - 4.25) / 4.25`. An ineligible record has `gate ≈ 0` and
//! decrypts to the sentinel -1.
//! The multiplicative depth is fixed by the constants below and checked
//! against the parameter set at construction.
use super::{
    domain::{
        AGE_RADIUS_BITS, DTI_ITERATIONS, MAX_DIVISION_BITS, POLISH_ROUNDS, SALARY_RADIUS_BITS,
        SIGMOID_DEGREE, SIGMOID_HI, SIGMOID_LO, SIGN_POLISH, SIGN_STEEPEN, SIGN_TO_STEP,
        STEEPEN_ROUNDS, ScoringDomain, division_stages, sigmoid_coefficients,
    },
    policy::{INELIGIBLE, MAX_CREDIT_SCORE, MIN_CREDIT_SCORE, W0, W1},
    record::EncryptedCreditRecord,
};
use crate::{
    context::CkksContext,
    crypto::{
        Ciphertext, CkksEngine, CkksError, CkksResult, ReciprocalDomain, polynomial_depth,
        reciprocal_depth,
    },
    keys::EvaluationKeySet,
    params::SchemeParameters,
};
use std::{iter, sync::Arc};
use tracing::{debug, info};

/// Levels for the composite sign polynomial shared by both gates.
const STEP_DEPTH: usize =
    (STEEPEN_ROUNDS + POLISH_ROUNDS + 1) * polynomial_depth(SIGN_STEEPEN.len() - 1);
/// Levels for the age gate: normalization plus the step polynomial.
pub const AGE_GATE_DEPTH: usize = division_stages(AGE_RADIUS_BITS) + STEP_DEPTH;
pub const SALARY_GATE_DEPTH: usize = division_stages(SALARY_RADIUS_BITS) + STEP_DEPTH;
/// Levels for the score branch: `1 / dti`, its weight, then the sigmoid.
pub const SCORE_DEPTH: usize =
    reciprocal_depth(DTI_ITERATIONS) + 1 + polynomial_depth(SIGMOID_DEGREE);
/// Total depth: the AND of both gates, then the gated score.
pub const PIPELINE_DEPTH: usize =
    max(max(AGE_GATE_DEPTH, SALARY_GATE_DEPTH) + 1, SCORE_DEPTH) + 1;

const fn max(a: usize, b: usize) -> usize {
    if a > b { a } else { b }
}

/// Parameters with exactly the depth the pipeline needs.
pub fn recommended_parameters<const DEGREE: usize>() -> CkksResult<SchemeParameters<DEGREE>> {
    SchemeParameters::credit_scoring()
}

/// Evaluator-side pipeline. Holds only public material: the context and the
/// evaluation keys.
#[derive(Debug)]
pub struct EncryptedCreditPipeline<const DEGREE: usize> {
    engine: CkksEngine<DEGREE>,
    keys: Arc<EvaluationKeySet<DEGREE>>,
    domain: ScoringDomain,
    dti_domain: ReciprocalDomain,
    sigmoid: Vec<f64>,
    step_stages: Vec<&'static [f64]>,
}

impl<const DEGREE: usize> EncryptedCreditPipeline<DEGREE> {
    /// Fails with `CkksError::Configuration` when the parameter set cannot
    /// afford [`PIPELINE_DEPTH`] levels.
    pub fn new(
        context: Arc<CkksContext<DEGREE>>,
        keys: Arc<EvaluationKeySet<DEGREE>>,
    ) -> CkksResult<Self> {
        let available = context.max_level();
        if available < PIPELINE_DEPTH {
            return Err(CkksError::Configuration {
                message: format!(
                    "credit pipeline needs multiplicative depth {PIPELINE_DEPTH}, \
                     parameters provide {available}"
                ),
            });
        }
        let digits = keys.relinearization.digits().len();
        if digits != context.chain().len() {
            return Err(CkksError::Configuration {
                message: format!(
                    "evaluation keys cover {digits} chain prime(s), context has {}",
                    context.chain().len()
                ),
            });
        }
        let domain = ScoringDomain::default();
        let dti_domain = ReciprocalDomain::new(domain.dti.0, domain.dti.1)?;
        info!(
            depth = PIPELINE_DEPTH,
            gate_depth = max(AGE_GATE_DEPTH, SALARY_GATE_DEPTH),
            score_depth = SCORE_DEPTH,
            levels = available,
            "credit pipeline ready"
        );
        Ok(Self {
            engine: CkksEngine::new(context),
            keys,
            domain,
            dti_domain,
            sigmoid: sigmoid_coefficients(),
            step_stages: step_stages(),
        })
    }

    pub const fn required_depth() -> usize {
        PIPELINE_DEPTH
    }

    pub fn engine(&self) -> &CkksEngine<DEGREE> {
        &self.engine
    }

    pub fn domain(&self) -> &ScoringDomain {
        &self.domain
    }

    /// Full evaluation: the gated score, or an encryption of -1.
    pub fn evaluate(
        &self,
        record: &EncryptedCreditRecord<DEGREE>,
    ) -> CkksResult<Ciphertext<DEGREE>> {
        let gate = self.preselection_gate(record)?;
        let score = self.score(record)?;
        let shifted = self.engine.sub_plain(&score, INELIGIBLE)?;
        let gated = self.engine.multiply(&gate, &shifted, &self.keys)?;
        self.engine.add_plain(&gated, INELIGIBLE)
    }

    /// Encrypted `[age > MIN_AGE] * [salary > MIN_SALARY]`, approximately 0
    /// or 1.
    pub fn preselection_gate(
        &self,
        record: &EncryptedCreditRecord<DEGREE>,
    ) -> CkksResult<Ciphertext<DEGREE>> {
        let age = self.step(&record.age, self.domain.age_threshold(), AGE_RADIUS_BITS)?;
        let salary = self.step(
            &record.salary,
            self.domain.salary_threshold(),
            SALARY_RADIUS_BITS,
        )?;
        debug!(level = age.level(), "preselection gates computed");
        self.engine.multiply(&age, &salary, &self.keys)
    }

    /// Encrypted `sigmoid(W0 * norm(cs) + W1 / dti)`.
    pub fn score(
        &self,
        record: &EncryptedCreditRecord<DEGREE>,
    ) -> CkksResult<Ciphertext<DEGREE>> {
        let default_scale = self.engine.context().default_scale();
        let half_width = (SIGMOID_HI - SIGMOID_LO) / 2.0;

        // W0 * (cs - 300) / 550, divided by the fit half-width; the range is a
        // public constant so this is one plaintext multiplication.
        let normalized = self.engine.multiply_plain_to_scale(
            &self.engine.sub_plain(&record.credit_score, MIN_CREDIT_SCORE)?,
            W0 / ((MAX_CREDIT_SCORE - MIN_CREDIT_SCORE) * half_width),
            default_scale,
        )?;

        let inverse = self.engine.reciprocal(
            &record.dti,
            DTI_ITERATIONS,
            self.dti_domain.initial_guess(),
            &self.keys,
        )?;
        let dti_term = self
            .engine
            .multiply_plain_to_scale(&inverse, W1 / half_width, default_scale)?;

        let normalized = self.engine.drop_to_level(&normalized, dti_term.level())?;
        let raw = self.engine.add(&normalized, &dti_term)?;
        let z = self
            .engine
            .sub_plain(&raw, (SIGMOID_LO + SIGMOID_HI) / (2.0 * half_width))?;
        debug!(level = z.level(), "sigmoid input computed");
        self.engine.evaluate_polynomial(&z, &self.sigmoid, &self.keys)
    }

    /// Composite-polynomial step of `(value - threshold) / 2^radius_bits`.
    fn step(
        &self,
        value: &Ciphertext<DEGREE>,
        threshold: f64,
        radius_bits: u32,
    ) -> CkksResult<Ciphertext<DEGREE>> {
        let mut x = self.engine.sub_plain(value, threshold)?;
        let mut remaining = radius_bits;
        while remaining > 0 {
            let shift = remaining.min(MAX_DIVISION_BITS);
            x = self.engine.multiply_plain(&x, 2f64.powi(-(shift as i32)))?;
            remaining -= shift;
        }
        self.engine.evaluate_composite(&x, &self.step_stages, &self.keys)
    }
}

/// The composite sign polynomial, innermost stage first.
fn step_stages() -> Vec<&'static [f64]> {
    let steepen: &'static [f64] = &SIGN_STEEPEN;
    let polish: &'static [f64] = &SIGN_POLISH;
    let to_step: &'static [f64] = &SIGN_TO_STEP;
    iter::repeat_n(steepen, STEEPEN_ROUNDS)
        .chain(iter::repeat_n(polish, POLISH_ROUNDS))
        .chain(iter::once(to_step))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::KeyGenerator;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    #[test]
    fn depth_constants() {
        assert_eq!(AGE_GATE_DEPTH, 23);
        assert_eq!(SALARY_GATE_DEPTH, 23);
        assert_eq!(SCORE_DEPTH, 28);
        assert_eq!(PIPELINE_DEPTH, 29);
        assert_eq!(EncryptedCreditPipeline::<64>::required_depth(), 29);
        assert_eq!(recommended_parameters::<64>().unwrap().max_level(), 29);
    }

    #[test]
    fn step_stages_match_step_depth() {
        let stages = step_stages();
        assert_eq!(stages.len(), STEEPEN_ROUNDS + POLISH_ROUNDS + 1);
        let depth: usize = stages.iter().map(|p| polynomial_depth(p.len() - 1)).sum();
        assert_eq!(depth, STEP_DEPTH);
    }

    #[test]
    fn shallow_parameters_fail_at_construction() {
        let params = SchemeParameters::<32>::for_depth(PIPELINE_DEPTH - 1).unwrap();
        let context = Arc::new(CkksContext::new(params).unwrap());
        let mut rng = ChaCha20Rng::seed_from_u64(5);
        let generator = KeyGenerator::new(Arc::clone(&context));
        let keys = generator.generate_key_pair(&mut rng).unwrap();
        let eval = generator.generate_evaluation_keys(&keys.secret, &mut rng).unwrap();
        let err = EncryptedCreditPipeline::new(context, Arc::new(eval)).unwrap_err();
        assert!(matches!(err, CkksError::Configuration { .. }));
    }
}
