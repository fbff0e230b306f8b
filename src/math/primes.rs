//! Prime utilities for constructing NTT-friendly modulus chains.
//!
//! Primality uses deterministic Miller-Rabin: for `u64` inputs the fixed base
//! set below never lets a composite through. Chain construction only visits
//! candidates `p = 1 (mod 2n)`, which is what the negacyclic NTT over
//! `X^n + 1` needs.
use super::modular::{mul_mod, pow_mod};

// These bases are deterministic for all n < 318,665,857,834,031,151,167,461,
// which covers all u64 values.
const MILLER_RABIN_BASES: [u64; 12] = [2, 3, 5, 7, 11, 13, 17, 19, 23, 29, 31, 37];

/// Returns `(odd_part, power_of_two)` such that `n = odd_part * 2^power_of_two`.
fn decompose(n: u64) -> (u64, u32) {
    let r = n.trailing_zeros();
    (n >> r, r)
}

/// Returns `true` if `n` is prime using deterministic Miller-Rabin on `u64`.
pub fn is_prime(n: u64) -> bool {
    match n {
        0 | 1 => return false,
        2 | 3 => return true,
        _ if n & 1 == 0 => return false,
        _ => {}
    }

    let (d, r) = decompose(n - 1);
    'bases: for &a in MILLER_RABIN_BASES.iter() {
        if a % n == 0 {
            continue;
        }
        let mut x = pow_mod(a, d, n);
        if x == 1 || x == n - 1 {
            continue;
        }
        for _ in 1..r {
            x = mul_mod(x, x, n);
            if x == n - 1 {
                continue 'bases;
            }
        }
        return false;
    }
    true
}

/// Returns `true` when `p` is prime and `p = 1 (mod 2n)`.
#[inline]
pub fn is_ntt_friendly_prime(p: u64, n: u64) -> bool {
    match n.checked_mul(2) {
        Some(order) if order > 0 => p % order == 1 && is_prime(p),
        _ => false,
    }
}

/// Smallest NTT-friendly prime strictly above `bound`.
///
/// Returns `None` if the search would leave the `u64` range.
pub fn next_ntt_prime_above(bound: u64, degree: u64) -> Option<u64> {
    let step = degree.checked_mul(2)?;
    let remainder = bound % step;
    // First candidate > bound with candidate % step == 1.
    let mut candidate = if remainder == 0 {
        bound.checked_add(1)?
    } else {
        bound.checked_add(step - remainder + 1)?
    };
    loop {
        if is_prime(candidate) {
            return Some(candidate);
        }
        candidate = candidate.checked_add(step)?;
    }
}

/// Largest NTT-friendly prime strictly below `bound`.
///
/// Returns `None` if no such prime exists.
pub fn prev_ntt_prime_below(bound: u64, degree: u64) -> Option<u64> {
    let step = degree.checked_mul(2)?;
    let top = bound.checked_sub(1)?;
    let mut candidate = top.checked_sub((top % step + step - 1) % step)?;
    loop {
        if candidate <= 2 {
            return None;
        }
        if is_prime(candidate) {
            return Some(candidate);
        }
        candidate = candidate.checked_sub(step)?;
    }
}

/// Generates `count` distinct NTT-friendly primes clustered around `2^bits`.
///
/// Candidates alternate between just below and just above the power of two,
/// so the product of any prefix stays close to `2^(bits * len)`. That keeps
/// the scale of a ciphertext near its nominal value after repeated rescaling.
pub fn scaling_primes(bits: u32, count: usize, degree: u64) -> Option<Vec<u64>> {
    if bits >= 63 {
        return None;
    }
    let center = 1u64 << bits;
    let mut primes = Vec::with_capacity(count);
    let (mut below, mut above) = (center, center);
    for index in 0..count {
        let prime = if index % 2 == 0 {
            below = prev_ntt_prime_below(below, degree)?;
            below
        } else {
            above = next_ntt_prime_above(above, degree)?;
            above
        };
        primes.push(prime);
    }
    Some(primes)
}
