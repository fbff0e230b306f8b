pub mod modular;
pub mod primes;
pub mod sampling;

pub use modular::{add_mod, center, inv_mod, mul_mod, neg_mod, pow_mod, reduce_i128, sub_mod};
pub use primes::{
    is_ntt_friendly_prime, is_prime, next_ntt_prime_above, prev_ntt_prime_below,
    scaling_primes,
};
pub use sampling::{gaussian_coefficients, ternary_coefficients, uniform_coefficients};
