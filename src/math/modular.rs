//! Word-sized modular arithmetic shared by the prime search, the NTT tables
//! and the RNS polynomial kernels.
//!
//! Every modulus used by the scheme is below `2^62`, so sums of two reduced
//! residues never overflow a `u64` and products are formed in `u128`.

/// Computes `(a + b) mod modulus` for reduced inputs.
#[inline]
pub fn add_mod(a: u64, b: u64, modulus: u64) -> u64 {
    let sum = a + b;
    if sum >= modulus { sum - modulus } else { sum }
}

/// Computes `(a - b) mod modulus` for reduced inputs.
#[inline]
pub fn sub_mod(a: u64, b: u64, modulus: u64) -> u64 {
    if a >= b { a - b } else { modulus - b + a }
}

/// Computes `-a mod modulus` for a reduced input.
#[inline]
pub fn neg_mod(a: u64, modulus: u64) -> u64 {
    if a == 0 { 0 } else { modulus - a }
}

/// Computes `(a * b) mod modulus` using `u128` intermediate arithmetic.
#[inline]
pub fn mul_mod(a: u64, b: u64, modulus: u64) -> u64 {
    ((a as u128 * b as u128) % modulus as u128) as u64
}

/// Computes `base^exp mod modulus` via binary exponentiation.
pub fn pow_mod(mut base: u64, mut exp: u64, modulus: u64) -> u64 {
    if modulus == 1 {
        return 0;
    }
    let mut acc = 1u64;
    base %= modulus;
    while exp > 0 {
        if exp & 1 == 1 {
            acc = mul_mod(acc, base, modulus);
        }
        base = mul_mod(base, base, modulus);
        exp >>= 1;
    }
    acc
}

/// Multiplicative inverse via the extended Euclidean algorithm.
///
/// Returns `None` when `value` and `modulus` are not coprime.
pub fn inv_mod(value: u64, modulus: u64) -> Option<u64> {
    let (mut old_r, mut r) = (value as i128 % modulus as i128, modulus as i128);
    let (mut old_s, mut s) = (1i128, 0i128);
    while r != 0 {
        let quotient = old_r / r;
        (old_r, r) = (r, old_r - quotient * r);
        (old_s, s) = (s, old_s - quotient * s);
    }
    if old_r != 1 {
        return None;
    }
    Some(old_s.rem_euclid(modulus as i128) as u64)
}

/// Maps a residue to its centered representative in `(-q/2, q/2]`.
#[inline]
pub fn center(residue: u64, modulus: u64) -> i64 {
    if residue > modulus / 2 {
        -((modulus - residue) as i64)
    } else {
        residue as i64
    }
}

/// Reduces a signed integer into `[0, modulus)`.
#[inline]
pub fn reduce_i128(value: i128, modulus: u64) -> u64 {
    value.rem_euclid(modulus as i128) as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    const Q: u64 = 1_073_750_017;

    #[test]
    fn add_and_sub_wrap_around_modulus() {
        assert_eq!(add_mod(Q - 1, 5, Q), 4);
        assert_eq!(sub_mod(3, 5, Q), Q - 2);
        assert_eq!(neg_mod(0, Q), 0);
        assert_eq!(neg_mod(1, Q), Q - 1);
    }

    #[test]
    fn mul_mod_matches_widened_reference() {
        let a = Q - 11;
        let b = Q - 17;
        let expected = ((a as u128 * b as u128) % Q as u128) as u64;
        assert_eq!(mul_mod(a, b, Q), expected);
    }

    #[test]
    fn pow_mod_handles_edge_cases() {
        assert_eq!(pow_mod(2, 0, 17), 1);
        assert_eq!(pow_mod(5, 0, 1), 0);
        assert_eq!(pow_mod(0, 5, 17), 0);
        assert_eq!(pow_mod(3, 16, 17), 1);
    }

    #[test]
    fn inverse_round_trips() {
        for value in [1u64, 2, 12_345, Q - 1] {
            let inverse = inv_mod(value, Q).unwrap();
            assert_eq!(mul_mod(value, inverse, Q), 1);
        }
        assert_eq!(inv_mod(6, 9), None);
    }

    #[test]
    fn center_is_balanced() {
        assert_eq!(center(0, 17), 0);
        assert_eq!(center(8, 17), 8);
        assert_eq!(center(9, 17), -8);
        assert_eq!(center(16, 17), -1);
        assert_eq!(reduce_i128(-1, 17), 16);
        assert_eq!(reduce_i128(-35, 17), 16);
    }
}
