//! Key Material Manager: explicit, non-global key generation.
use super::{KeyError, KeyResult, PublicKey, RelinearizationKey, SecretKey};
use crate::{
    context::CkksContext,
    rings::{PolySampler, RnsPoly},
};
use rand::Rng;
use std::sync::Arc;
use tracing::info;

/// Encryption keys for the data owner. The secret half never leaves the
/// owner; only `public` is handed to an evaluator.
#[derive(Debug)]
pub struct KeyPair<const DEGREE: usize> {
    pub public: PublicKey<DEGREE>,
    pub secret: SecretKey<DEGREE>,
}

/// Keys an evaluator needs to compute on ciphertexts. Contains nothing that
/// decrypts.
#[derive(Debug, Clone)]
pub struct EvaluationKeySet<const DEGREE: usize> {
    pub relinearization: RelinearizationKey<DEGREE>,
}

pub struct KeyGenerator<const DEGREE: usize> {
    context: Arc<CkksContext<DEGREE>>,
}

impl<const DEGREE: usize> KeyGenerator<DEGREE> {
    pub fn new(context: Arc<CkksContext<DEGREE>>) -> Self {
        Self { context }
    }

    pub fn generate_key_pair<R: Rng + ?Sized>(&self, rng: &mut R) -> KeyResult<KeyPair<DEGREE>> {
        let secret = SecretKey::generate(&self.context, rng)?;
        let public = PublicKey::generate(&secret, &self.context, rng)?;
        info!(
            degree = DEGREE,
            hamming_weight = self.context.params().hamming_weight(),
            "generated key pair"
        );
        Ok(KeyPair { public, secret })
    }

    pub fn generate_evaluation_keys<R: Rng + ?Sized>(
        &self,
        secret: &SecretKey<DEGREE>,
        rng: &mut R,
    ) -> KeyResult<EvaluationKeySet<DEGREE>> {
        let relinearization = RelinearizationKey::generate(secret, &self.context, rng)?;
        info!(
            digits = relinearization.digits().len(),
            "generated relinearization key"
        );
        Ok(EvaluationKeySet { relinearization })
    }
}

/// A key that can encrypt. Public and secret keys yield ciphertexts of the
/// same shape that decrypt identically.
pub trait EncryptionKey<const DEGREE: usize> {
    /// Encrypts the NTT-domain plaintext polynomial `message`, which must live
    /// over the top level basis, into `(c0, c1)`.
    fn encrypt_poly<R: Rng + ?Sized>(
        &self,
        message: &RnsPoly<DEGREE>,
        context: &CkksContext<DEGREE>,
        rng: &mut R,
    ) -> KeyResult<(RnsPoly<DEGREE>, RnsPoly<DEGREE>)>;
}

fn check_message_basis<const DEGREE: usize>(
    message: &RnsPoly<DEGREE>,
    context: &CkksContext<DEGREE>,
) -> KeyResult<()> {
    let expected = context.top_basis().moduli();
    if message.basis().moduli() != expected {
        return Err(KeyError::BasisMismatch {
            expected: expected.to_vec(),
            actual: message.basis().moduli().to_vec(),
        });
    }
    Ok(())
}

impl<const DEGREE: usize> EncryptionKey<DEGREE> for PublicKey<DEGREE> {
    /// c0 = b * u + e0 + m, c1 = a * u + e1 with ternary `u`.
    fn encrypt_poly<R: Rng + ?Sized>(
        &self,
        message: &RnsPoly<DEGREE>,
        context: &CkksContext<DEGREE>,
        rng: &mut R,
    ) -> KeyResult<(RnsPoly<DEGREE>, RnsPoly<DEGREE>)> {
        check_message_basis(message, context)?;
        if self.b.basis().moduli() != message.basis().moduli() {
            return Err(KeyError::ForeignKey);
        }
        let basis = context.top_basis();
        let params = context.params();
        let u = RnsPoly::sample_ternary(params.hamming_weight(), basis, rng);
        let e0 = RnsPoly::sample_gaussian(params.error_std_dev(), basis, rng);
        let e1 = RnsPoly::sample_gaussian(params.error_std_dev(), basis, rng);

        let mut c0 = self.b.clone();
        c0 *= &u;
        c0 += &e0;
        c0 += message;

        let mut c1 = self.a.clone();
        c1 *= &u;
        c1 += &e1;
        Ok((c0, c1))
    }
}

impl<const DEGREE: usize> EncryptionKey<DEGREE> for SecretKey<DEGREE> {
    /// c0 = -(a * s) + e + m, c1 = a with uniform `a`.
    fn encrypt_poly<R: Rng + ?Sized>(
        &self,
        message: &RnsPoly<DEGREE>,
        context: &CkksContext<DEGREE>,
        rng: &mut R,
    ) -> KeyResult<(RnsPoly<DEGREE>, RnsPoly<DEGREE>)> {
        check_message_basis(message, context)?;
        let basis = context.top_basis();
        let s = self.project(basis).map_err(|_| KeyError::ForeignKey)?;
        let a = RnsPoly::sample_uniform(basis, rng);
        let e = RnsPoly::sample_gaussian(context.params().error_std_dev(), basis, rng);

        let mut a_times_s = a.clone();
        a_times_s *= &s;
        let mut c0 = -a_times_s;
        c0 += &e;
        c0 += message;
        Ok((c0, a))
    }
}

impl<const DEGREE: usize> EncryptionKey<DEGREE> for KeyPair<DEGREE> {
    fn encrypt_poly<R: Rng + ?Sized>(
        &self,
        message: &RnsPoly<DEGREE>,
        context: &CkksContext<DEGREE>,
        rng: &mut R,
    ) -> KeyResult<(RnsPoly<DEGREE>, RnsPoly<DEGREE>)> {
        self.public.encrypt_poly(message, context, rng)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{params::SchemeParameters, rings::PolyRing};
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    fn setup() -> (Arc<CkksContext<64>>, KeyPair<64>, ChaCha20Rng) {
        let context = Arc::new(CkksContext::new(SchemeParameters::for_depth(2).unwrap()).unwrap());
        let mut rng = ChaCha20Rng::seed_from_u64(11);
        let keys = KeyGenerator::new(Arc::clone(&context))
            .generate_key_pair(&mut rng)
            .unwrap();
        (context, keys, rng)
    }

    fn phase(
        c0: &RnsPoly<64>,
        c1: &RnsPoly<64>,
        keys: &KeyPair<64>,
        context: &CkksContext<64>,
    ) -> [i64; 64] {
        let mut m = c1.clone();
        m *= &keys.secret.project(context.top_basis()).unwrap();
        m += c0;
        m.to_coeffs()
    }

    #[test]
    fn both_key_kinds_encrypt_the_same_message() {
        let (context, keys, mut rng) = setup();
        let mut coeffs = [0i64; 64];
        coeffs[0] = 1_000_000;
        coeffs[5] = -42_000;
        let message =
            RnsPoly::from_coeffs(&coeffs, Arc::clone(context.top_basis())).into_ntt_domain();

        let (c0, c1) = keys.public.encrypt_poly(&message, &context, &mut rng).unwrap();
        let (s0, s1) = keys.secret.encrypt_poly(&message, &context, &mut rng).unwrap();
        for decrypted in [phase(&c0, &c1, &keys, &context), phase(&s0, &s1, &keys, &context)] {
            for (got, want) in decrypted.iter().zip(coeffs) {
                assert!((got - want).abs() < 2_000, "{got} vs {want}");
            }
        }
    }

    #[test]
    fn message_at_wrong_level_is_rejected() {
        let (context, keys, mut rng) = setup();
        let message = RnsPoly::zero(Arc::clone(context.level_basis(0).unwrap())).into_ntt_domain();
        assert!(matches!(
            keys.encrypt_poly(&message, &context, &mut rng),
            Err(KeyError::BasisMismatch { .. })
        ));
    }
}
