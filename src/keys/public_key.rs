use super::{KeyError, KeyResult, SecretKey};
use crate::{
    context::CkksContext,
    rings::{PolySampler, RnsPoly},
};
use rand::Rng;

/// RNS-encoded public key (RLWE sample) at the top level `{q_0, …, q_L}`.
#[derive(Debug, Clone)]
pub struct PublicKey<const DEGREE: usize> {
    /// "b" component: b = -(a * s) + e
    pub b: RnsPoly<DEGREE>,
    /// "a" component: uniformly random
    pub a: RnsPoly<DEGREE>,
}

impl<const DEGREE: usize> PublicKey<DEGREE> {
    /// Generate a new RLWE public key for `secret_key`.
    pub fn generate<R: Rng + ?Sized>(
        secret_key: &SecretKey<DEGREE>,
        context: &CkksContext<DEGREE>,
        rng: &mut R,
    ) -> KeyResult<Self> {
        let std_dev = context.params().error_std_dev();
        if !(std_dev > 0.0) {
            return Err(KeyError::InvalidErrorStd(std_dev));
        }
        let basis = context.top_basis();
        let s = secret_key.project(basis)?;

        let a = RnsPoly::sample_uniform(basis, rng);
        let e = RnsPoly::sample_gaussian(std_dev, basis, rng);

        let mut a_times_s = a.clone();
        a_times_s *= &s;
        let mut b = -a_times_s;
        b += &e;

        Ok(PublicKey { b, a })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{params::SchemeParameters, rings::PolyRing};
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    #[test]
    fn b_plus_a_s_is_small() {
        let context = CkksContext::new(SchemeParameters::<64>::for_depth(2).unwrap()).unwrap();
        let mut rng = ChaCha20Rng::seed_from_u64(7);
        let sk = SecretKey::generate(&context, &mut rng).unwrap();
        let pk = PublicKey::generate(&sk, &context, &mut rng).unwrap();

        let mut check = pk.a.clone();
        check *= &sk.project(context.top_basis()).unwrap();
        check += &pk.b;
        // what remains is the Gaussian error e
        assert!(check.to_coeffs().iter().all(|c| c.abs() < 40));
    }
}
