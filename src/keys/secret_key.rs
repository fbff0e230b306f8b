//! Secret Key (sk): a sparse ternary polynomial `s(X)` with exactly
//! `hamming_weight` non-zero coefficients in {-1, 1}.
use super::{KeyError, KeyResult};
use crate::{
    context::CkksContext,
    rings::{PolySampler, RnsBasis, RnsPoly, RingResult},
};
use rand::Rng;
use std::sync::Arc;

/// The data owner's secret. Stored in NTT form over the key basis
/// `{q_0, …, q_L, P}` so it can be projected onto any level.
///
/// Deliberately not `Clone`, and its `Debug` output omits the polynomial.
pub struct SecretKey<const DEGREE: usize> {
    poly: RnsPoly<DEGREE>,
}

impl<const DEGREE: usize> std::fmt::Debug for SecretKey<DEGREE> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretKey")
            .field("moduli", &self.poly.basis().moduli())
            .finish_non_exhaustive()
    }
}

impl<const DEGREE: usize> SecretKey<DEGREE> {
    /// Generate a new sparse ternary secret key over the context's key basis.
    pub fn generate<R: Rng + ?Sized>(
        context: &CkksContext<DEGREE>,
        rng: &mut R,
    ) -> KeyResult<Self> {
        let weight = context.params().hamming_weight();
        if weight > DEGREE {
            return Err(KeyError::InvalidHammingWeight {
                weight,
                degree: DEGREE,
            });
        }
        let poly = RnsPoly::sample_ternary(weight, context.key_basis(), rng);
        Ok(Self { poly })
    }

    /// `s` over the full key basis, NTT domain.
    pub fn poly(&self) -> &RnsPoly<DEGREE> {
        &self.poly
    }

    /// `s` restricted to `basis`, which must be a subset of the key basis.
    pub fn project(&self, basis: &Arc<RnsBasis<DEGREE>>) -> RingResult<RnsPoly<DEGREE>> {
        self.poly.project(basis)
    }
}
