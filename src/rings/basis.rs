use super::errors::{RingError, RingResult};
use crate::math::{
    add_mod, center, inv_mod, is_ntt_friendly_prime, mul_mod, pow_mod, reduce_i128, sub_mod,
};
use std::sync::Arc;

/// Precomputed twiddle factors for the negacyclic NTT modulo one prime.
///
/// `forward_roots[k] = psi^bitrev(k)` and `inverse_roots[k] = psi^-bitrev(k)`
/// where `psi` is a primitive `2N`-th root of unity, so a single merged
/// butterfly pass evaluates at the odd powers of `psi` and no separate
/// pre/post twist is needed.
#[derive(Debug, Clone)]
pub struct NttTable<const DEGREE: usize> {
    pub forward_roots: [u64; DEGREE],
    pub inverse_roots: [u64; DEGREE],
    pub n_inv: u64,
    pub modulus: u64,
}

impl<const DEGREE: usize> NttTable<DEGREE> {
    pub fn new(modulus: u64) -> RingResult<Self> {
        if !DEGREE.is_power_of_two() || DEGREE < 8 {
            return Err(RingError::InvalidDegree { degree: DEGREE });
        }
        if !is_ntt_friendly_prime(modulus, DEGREE as u64) {
            return Err(RingError::NonNttFriendlyModulus {
                modulus,
                degree: DEGREE,
            });
        }

        let psi = find_primitive_root(modulus, DEGREE as u64).ok_or(
            RingError::NonNttFriendlyModulus {
                modulus,
                degree: DEGREE,
            },
        )?;
        let psi_inv = inv_mod(psi, modulus).ok_or(RingError::NonNttFriendlyModulus {
            modulus,
            degree: DEGREE,
        })?;
        let bit_count = DEGREE.trailing_zeros();

        let mut forward_roots = [1u64; DEGREE];
        let mut inverse_roots = [1u64; DEGREE];
        for index in 1..DEGREE {
            let exponent = reverse_bits(index, bit_count) as u64;
            forward_roots[index] = pow_mod(psi, exponent, modulus);
            inverse_roots[index] = pow_mod(psi_inv, exponent, modulus);
        }

        let n_inv = inv_mod(DEGREE as u64, modulus).ok_or(RingError::NonNttFriendlyModulus {
            modulus,
            degree: DEGREE,
        })?;
        Ok(Self {
            forward_roots,
            inverse_roots,
            n_inv,
            modulus,
        })
    }

    /// In-place forward transform: natural-order coefficients in,
    /// bit-reversed evaluations out (Cooley-Tukey butterflies).
    pub fn forward(&self, values: &mut [u64; DEGREE]) {
        let q = self.modulus;
        let mut t = DEGREE;
        let mut m = 1;
        while m < DEGREE {
            t >>= 1;
            for i in 0..m {
                let start = 2 * i * t;
                let root = self.forward_roots[m + i];
                for j in start..start + t {
                    let u = values[j];
                    let v = mul_mod(values[j + t], root, q);
                    values[j] = add_mod(u, v, q);
                    values[j + t] = sub_mod(u, v, q);
                }
            }
            m <<= 1;
        }
    }

    /// In-place inverse transform (Gentleman-Sande butterflies), including
    /// the final `N^-1` scaling.
    pub fn inverse(&self, values: &mut [u64; DEGREE]) {
        let q = self.modulus;
        let mut t = 1;
        let mut m = DEGREE;
        while m > 1 {
            let half = m >> 1;
            let mut start = 0;
            for i in 0..half {
                let root = self.inverse_roots[half + i];
                for j in start..start + t {
                    let u = values[j];
                    let v = values[j + t];
                    values[j] = add_mod(u, v, q);
                    values[j + t] = mul_mod(sub_mod(u, v, q), root, q);
                }
                start += 2 * t;
            }
            t <<= 1;
            m = half;
        }
        for value in values.iter_mut() {
            *value = mul_mod(*value, self.n_inv, q);
        }
    }
}

/// RNS basis: a set of distinct NTT-friendly primes with their NTT tables and
/// the mixed-radix constants used to lift residues back to integers.
///
/// Invariant: `moduli.len() == ntt_tables.len()` and
/// `ntt_tables[i].modulus == moduli[i]` for all `i`.
#[derive(Debug, Clone)]
pub struct RnsBasis<const DEGREE: usize> {
    moduli: Vec<u64>,
    ntt_tables: Vec<Arc<NttTable<DEGREE>>>,
    // radix_inverses[i] = (q_0 * ... * q_{i-1})^-1 mod q_i
    radix_inverses: Vec<u64>,
    // prefix_products[i][t] = (q_0 * ... * q_{t-1}) mod q_i, for t < i
    prefix_products: Vec<Vec<u64>>,
}

impl<const DEGREE: usize> RnsBasis<DEGREE> {
    pub fn new(moduli: Vec<u64>) -> RingResult<Self> {
        let tables = moduli
            .iter()
            .map(|&modulus| NttTable::new(modulus).map(Arc::new))
            .collect::<RingResult<Vec<_>>>()?;
        Self::from_tables(tables)
    }

    /// Builds a basis from already computed tables, sharing them.
    pub fn from_tables(ntt_tables: Vec<Arc<NttTable<DEGREE>>>) -> RingResult<Self> {
        if ntt_tables.is_empty() {
            return Err(RingError::EmptyBasis);
        }
        let moduli: Vec<u64> = ntt_tables.iter().map(|table| table.modulus).collect();
        for (index, &modulus) in moduli.iter().enumerate() {
            if moduli[..index].contains(&modulus) {
                return Err(RingError::DuplicateModulus { modulus });
            }
        }

        let mut radix_inverses = Vec::with_capacity(moduli.len());
        let mut prefix_products = Vec::with_capacity(moduli.len());
        for (i, &q_i) in moduli.iter().enumerate() {
            let mut prefixes = Vec::with_capacity(i);
            let mut running = 1u64;
            for &q_t in &moduli[..i] {
                prefixes.push(running);
                running = mul_mod(running, q_t % q_i, q_i);
            }
            let inverse =
                inv_mod(running, q_i).ok_or(RingError::DuplicateModulus { modulus: q_i })?;
            radix_inverses.push(inverse);
            prefix_products.push(prefixes);
        }

        Ok(Self {
            moduli,
            ntt_tables,
            radix_inverses,
            prefix_products,
        })
    }

    pub fn moduli(&self) -> &[u64] {
        &self.moduli
    }

    pub fn ntt_table(&self, channel: usize) -> &NttTable<DEGREE> {
        &self.ntt_tables[channel]
    }

    pub fn shared_table(&self, channel: usize) -> Arc<NttTable<DEGREE>> {
        Arc::clone(&self.ntt_tables[channel])
    }

    pub fn channel_count(&self) -> usize {
        self.moduli.len()
    }

    /// Index of `modulus` within this basis, if present.
    pub fn position(&self, modulus: u64) -> Option<usize> {
        self.moduli.iter().position(|&q| q == modulus)
    }

    /// `log2` of the product of all moduli.
    pub fn log_modulus(&self) -> f64 {
        self.moduli.iter().map(|&q| (q as f64).log2()).sum()
    }

    /// Returns a new basis with the last `drop_count` channels removed.
    pub fn drop_last(&self, drop_count: usize) -> RingResult<Self> {
        let channel_count = self.channel_count();
        if drop_count >= channel_count {
            return Err(RingError::InvalidModDrop {
                drop_count,
                channel_count,
            });
        }
        let keep = channel_count - drop_count;
        Self::from_tables(self.ntt_tables[..keep].to_vec())
    }

    /// Lifts one coefficient to its centered integer value as an `f64`.
    ///
    /// Uses mixed-radix (Garner) reconstruction with balanced digits, so the
    /// result is the representative in `[-(Q-1)/2, (Q-1)/2]` and no integer
    /// wider than a machine word is ever formed.
    pub fn reconstruct_centered(&self, residues: &[u64]) -> f64 {
        debug_assert_eq!(residues.len(), self.moduli.len());
        let mut digits: Vec<i64> = Vec::with_capacity(self.moduli.len());
        for (i, (&residue, &q_i)) in residues.iter().zip(&self.moduli).enumerate() {
            let mut partial = 0u64;
            for (&digit, &prefix) in digits.iter().zip(&self.prefix_products[i]) {
                let digit_mod = reduce_i128(digit as i128, q_i);
                partial = add_mod(partial, mul_mod(digit_mod, prefix, q_i), q_i);
            }
            let digit = mul_mod(sub_mod(residue, partial, q_i), self.radix_inverses[i], q_i);
            digits.push(center(digit, q_i));
        }

        let mut value = 0.0f64;
        for (&digit, &q_i) in digits.iter().zip(&self.moduli).rev() {
            value = value * q_i as f64 + digit as f64;
        }
        value
    }
}

// ─── Private number-theory helpers ───────────────────────────────────────────

/// Finds a primitive `2n`-th root of unity modulo `modulus`.
///
/// For a candidate `g`, `r = g^((q-1)/2n)` has order dividing `2n`; since
/// `2n` is a power of two, `r^n = -1` pins the order to exactly `2n`.
fn find_primitive_root(modulus: u64, n: u64) -> Option<u64> {
    let order = 2 * n;
    let exponent = (modulus - 1) / order;
    (2..modulus.min(1 << 20))
        .map(|candidate| pow_mod(candidate, exponent, modulus))
        .find(|&root| pow_mod(root, n, modulus) == modulus - 1)
}

pub(crate) fn reverse_bits(value: usize, bit_count: u32) -> usize {
    if bit_count == 0 {
        return 0;
    }
    value.reverse_bits() >> (usize::BITS - bit_count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::scaling_primes;
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha20Rng;

    const DEGREE: usize = 16;

    fn negacyclic_schoolbook(a: &[u64; DEGREE], b: &[u64; DEGREE], q: u64) -> [u64; DEGREE] {
        let mut out = [0u64; DEGREE];
        for i in 0..DEGREE {
            for j in 0..DEGREE {
                let product = mul_mod(a[i], b[j], q);
                let k = i + j;
                if k < DEGREE {
                    out[k] = add_mod(out[k], product, q);
                } else {
                    out[k - DEGREE] = sub_mod(out[k - DEGREE], product, q);
                }
            }
        }
        out
    }

    #[test]
    fn reverse_bits_matches_manual_table() {
        assert_eq!(reverse_bits(1, 3), 4);
        assert_eq!(reverse_bits(3, 3), 6);
        assert_eq!(reverse_bits(6, 3), 3);
        assert_eq!(reverse_bits(0, 0), 0);
    }

    #[test]
    fn ntt_round_trip_is_identity() {
        let q = scaling_primes(40, 1, DEGREE as u64).unwrap()[0];
        let table = NttTable::<DEGREE>::new(q).unwrap();
        let mut rng = ChaCha20Rng::seed_from_u64(3);
        let original: [u64; DEGREE] = std::array::from_fn(|_| rng.random_range(0..q));
        let mut values = original;
        table.forward(&mut values);
        assert_ne!(values, original);
        table.inverse(&mut values);
        assert_eq!(values, original);
    }

    #[test]
    fn pointwise_product_is_negacyclic_convolution() {
        let q = scaling_primes(30, 1, DEGREE as u64).unwrap()[0];
        let table = NttTable::<DEGREE>::new(q).unwrap();
        let mut rng = ChaCha20Rng::seed_from_u64(11);
        let a: [u64; DEGREE] = std::array::from_fn(|_| rng.random_range(0..q));
        let b: [u64; DEGREE] = std::array::from_fn(|_| rng.random_range(0..q));

        let (mut fa, mut fb) = (a, b);
        table.forward(&mut fa);
        table.forward(&mut fb);
        let mut product: [u64; DEGREE] = std::array::from_fn(|i| mul_mod(fa[i], fb[i], q));
        table.inverse(&mut product);

        assert_eq!(product, negacyclic_schoolbook(&a, &b, q));
    }

    #[test]
    fn constant_polynomial_transforms_to_constant_vector() {
        let q = scaling_primes(40, 1, DEGREE as u64).unwrap()[0];
        let table = NttTable::<DEGREE>::new(q).unwrap();
        let mut values = [0u64; DEGREE];
        values[0] = 42;
        table.forward(&mut values);
        assert!(values.iter().all(|&v| v == 42));
    }

    #[test]
    fn table_rejects_unfriendly_modulus() {
        // 103 is prime but not 1 mod 2N; 97 is
        assert_eq!(
            NttTable::<DEGREE>::new(103).unwrap_err(),
            RingError::NonNttFriendlyModulus {
                modulus: 103,
                degree: DEGREE
            }
        );
        assert!(NttTable::<DEGREE>::new(97).is_ok());
        assert!(matches!(
            NttTable::<12>::new(97),
            Err(RingError::InvalidDegree { degree: 12 })
        ));
    }

    #[test]
    fn basis_rejects_duplicates_and_empty() {
        let q = scaling_primes(40, 1, DEGREE as u64).unwrap()[0];
        assert_eq!(
            RnsBasis::<DEGREE>::new(vec![q, q]).unwrap_err(),
            RingError::DuplicateModulus { modulus: q }
        );
        assert_eq!(RnsBasis::<DEGREE>::new(vec![]).unwrap_err(), RingError::EmptyBasis);
    }

    #[test]
    fn drop_last_keeps_prefix() {
        let moduli = scaling_primes(40, 3, DEGREE as u64).unwrap();
        let basis = RnsBasis::<DEGREE>::new(moduli.clone()).unwrap();
        let dropped = basis.drop_last(1).unwrap();
        assert_eq!(dropped.moduli(), &moduli[..2]);
        assert!(basis.drop_last(3).is_err());
    }

    #[test]
    fn centered_reconstruction_recovers_wide_values() {
        let moduli = scaling_primes(40, 3, DEGREE as u64).unwrap();
        let basis = RnsBasis::<DEGREE>::new(moduli.clone()).unwrap();
        let mut rng = ChaCha20Rng::seed_from_u64(17);
        for _ in 0..200 {
            let value: i128 = rng.random_range(-(1i128 << 110)..(1i128 << 110));
            let residues: Vec<u64> = moduli.iter().map(|&q| reduce_i128(value, q)).collect();
            let lifted = basis.reconstruct_centered(&residues);
            let expected = value as f64;
            assert!(
                (lifted - expected).abs() <= expected.abs() * 1e-14 + 1.0,
                "{lifted} vs {expected}"
            );
        }
    }

    #[test]
    fn centered_reconstruction_handles_small_negatives() {
        let moduli = scaling_primes(40, 2, DEGREE as u64).unwrap();
        let basis = RnsBasis::<DEGREE>::new(moduli.clone()).unwrap();
        for value in [-5i128, -1, 0, 1, 123_456] {
            let residues: Vec<u64> = moduli.iter().map(|&q| reduce_i128(value, q)).collect();
            assert_eq!(basis.reconstruct_centered(&residues), value as f64);
        }
    }
}
