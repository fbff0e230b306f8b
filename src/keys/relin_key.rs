use super::{KeyError, KeyResult, SecretKey};
use crate::{
    context::CkksContext,
    rings::{PolySampler, RnsPoly},
};
use rand::Rng;

/// One key-switching pair for the RNS digit of chain prime `q_j`.
///
/// Over `{q_0, …, q_L, P}`: `b_j + a_j * s = e_j + G_j * s^2`, where the gadget
/// constant `G_j` is `P mod q_j` in channel `j` and zero in every other channel.
#[derive(Debug, Clone)]
pub struct KeySwitchDigit<const DEGREE: usize> {
    pub b: RnsPoly<DEGREE>,
    pub a: RnsPoly<DEGREE>,
}

/// Relinearization key used to transform ciphertexts after multiplication.
///
/// Converts a degree-2 ciphertext `(d0, d1, d2)` back to a degree-1
/// ciphertext. The digit decomposition keeps the product `d2_j * e_j` below
/// `q_j * P`, and the final division by the special prime `P` shrinks it to a
/// few units.
#[derive(Debug, Clone)]
pub struct RelinearizationKey<const DEGREE: usize> {
    digits: Vec<KeySwitchDigit<DEGREE>>,
}

impl<const DEGREE: usize> RelinearizationKey<DEGREE> {
    /// Generate a relinearization key from a secret key.
    ///
    /// For every chain prime `q_j`:
    /// 1. sample a uniform `a_j` and Gaussian `e_j` over the key basis
    /// 2. set `b_j = -(a_j * s) + e_j + G_j * s^2`
    pub fn generate<R: Rng + ?Sized>(
        secret_key: &SecretKey<DEGREE>,
        context: &CkksContext<DEGREE>,
        rng: &mut R,
    ) -> KeyResult<Self> {
        let std_dev = context.params().error_std_dev();
        if !(std_dev > 0.0) {
            return Err(KeyError::InvalidErrorStd(std_dev));
        }
        let basis = context.key_basis();
        let s = secret_key.poly();
        if s.basis().moduli() != basis.moduli() {
            return Err(KeyError::ForeignKey);
        }

        let mut s_squared = s.clone();
        s_squared *= s;

        let special = context.special_modulus();
        let channel_count = basis.channel_count();
        let digits = (0..channel_count - 1)
            .map(|j| {
                let a = RnsPoly::sample_uniform(basis, rng);
                let e = RnsPoly::sample_gaussian(std_dev, basis, rng);

                let mut gadget = vec![0u64; channel_count];
                gadget[j] = special % basis.moduli()[j];
                let mut scaled = s_squared.clone();
                scaled.mul_rns_constant_assign(&gadget);

                let mut a_times_s = a.clone();
                a_times_s *= s;
                let mut b = -a_times_s;
                b += &e;
                b += &scaled;
                KeySwitchDigit { b, a }
            })
            .collect();

        Ok(Self { digits })
    }

    /// One digit per chain prime `q_0, …, q_L`.
    pub fn digits(&self) -> &[KeySwitchDigit<DEGREE>] {
        &self.digits
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{params::SchemeParameters, rings::PolyRing};
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    #[test]
    fn one_digit_per_chain_prime() {
        let context = CkksContext::new(SchemeParameters::<32>::for_depth(3).unwrap()).unwrap();
        let mut rng = ChaCha20Rng::seed_from_u64(42);
        let sk = SecretKey::generate(&context, &mut rng).unwrap();
        let rk = RelinearizationKey::generate(&sk, &context, &mut rng).unwrap();
        assert_eq!(rk.digits().len(), 4);
        for digit in rk.digits() {
            assert_eq!(digit.b.basis().moduli(), context.key_basis().moduli());
        }
    }

    #[test]
    fn digit_satisfies_gadget_relation_in_other_channels() {
        let context = CkksContext::new(SchemeParameters::<32>::for_depth(2).unwrap()).unwrap();
        let mut rng = ChaCha20Rng::seed_from_u64(3);
        let sk = SecretKey::generate(&context, &mut rng).unwrap();
        let rk = RelinearizationKey::generate(&sk, &context, &mut rng).unwrap();

        // Restricted to {q_1, P} the gadget of digit 0 vanishes, leaving e_0.
        let others = std::sync::Arc::new(
            crate::rings::RnsBasis::new(vec![context.chain()[1], context.special_modulus()])
                .unwrap(),
        );
        let digit = &rk.digits()[0];
        let mut check = digit.a.project(&others).unwrap();
        check *= &sk.project(&others).unwrap();
        check += &digit.b.project(&others).unwrap();
        assert!(check.to_coeffs().iter().all(|c| c.abs() < 40));
    }
}
