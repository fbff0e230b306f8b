use super::{domain::ScoringDomain, reference};
use crate::{
    crypto::{Ciphertext, CkksEngine, CkksResult},
    keys::EncryptionKey,
};
use rand::Rng;

/// An applicant's plaintext inputs. Held by the data owner only.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CreditRecord {
    pub age: u32,
    pub salary: u64,
    pub credit_score: f64,
    pub dti: f64,
}

impl CreditRecord {
    pub fn new(age: u32, salary: u64, credit_score: f64, dti: f64) -> Self {
        Self {
            age,
            salary,
            credit_score,
            dti,
        }
    }

    /// Plaintext score for this record.
    pub fn reference_score(&self) -> f64 {
        reference::evaluate(self.age, self.salary, self.credit_score, self.dti)
    }
}

/// Four independent ciphertexts, one per input, each at the top level.
#[derive(Debug, Clone)]
pub struct EncryptedCreditRecord<const DEGREE: usize> {
    pub age: Ciphertext<DEGREE>,
    pub salary: Ciphertext<DEGREE>,
    pub credit_score: Ciphertext<DEGREE>,
    pub dti: Ciphertext<DEGREE>,
}

impl<const DEGREE: usize> EncryptedCreditRecord<DEGREE> {
    /// Data-owner side: clamps `record` into `domain` and encrypts each field.
    pub fn encrypt<K, R>(
        record: &CreditRecord,
        domain: &ScoringDomain,
        engine: &CkksEngine<DEGREE>,
        key: &K,
        rng: &mut R,
    ) -> CkksResult<Self>
    where
        K: EncryptionKey<DEGREE> + ?Sized,
        R: Rng + ?Sized,
    {
        let [age, salary, credit_score, dti] = domain.clamp(
            record.age as f64,
            record.salary as f64,
            record.credit_score,
            record.dti,
        );
        Ok(Self {
            age: engine.encrypt(age, key, rng)?,
            salary: engine.encrypt(salary, key, rng)?,
            credit_score: engine.encrypt(credit_score, key, rng)?,
            dti: engine.encrypt(dti, key, rng)?,
        })
    }
}
