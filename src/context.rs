//! Precomputed state derived from [`SchemeParameters`]: the concrete modulus
//! chain, one shared RNS basis per level and the encoder.
use crate::{
    crypto::{CkksError, CkksResult},
    encoding::CanonicalEncoder,
    math::{prev_ntt_prime_below, scaling_primes},
    params::SchemeParameters,
    rings::{NttTable, RnsBasis},
};
use std::sync::Arc;
use tracing::info;

#[derive(Debug)]
pub struct CkksContext<const DEGREE: usize> {
    params: SchemeParameters<DEGREE>,
    chain: Vec<u64>,
    special_modulus: u64,
    // level_bases[l] = {q_0, …, q_l}
    level_bases: Vec<Arc<RnsBasis<DEGREE>>>,
    // extended_bases[l] = {q_0, …, q_l, P}
    extended_bases: Vec<Arc<RnsBasis<DEGREE>>>,
    encoder: CanonicalEncoder<DEGREE>,
}

impl<const DEGREE: usize> CkksContext<DEGREE> {
    pub fn new(params: SchemeParameters<DEGREE>) -> CkksResult<Self> {
        let degree = DEGREE as u64;
        let no_prime = |bits: u32| CkksError::Configuration {
            message: format!("no NTT-friendly prime of {bits} bits for degree {DEGREE}"),
        };

        let base = prev_ntt_prime_below(1u64 << params.base_bits(), degree)
            .ok_or_else(|| no_prime(params.base_bits()))?;
        let scaling = scaling_primes(params.scale_bits(), params.max_level(), degree)
            .ok_or_else(|| no_prime(params.scale_bits()))?;
        let mut special = prev_ntt_prime_below(1u64 << params.special_modulus_bits(), degree)
            .ok_or_else(|| no_prime(params.special_modulus_bits()))?;
        if special == base {
            special = prev_ntt_prime_below(base, degree)
                .ok_or_else(|| no_prime(params.special_modulus_bits()))?;
        }

        let chain: Vec<u64> = std::iter::once(base).chain(scaling).collect();
        let tables = chain
            .iter()
            .map(|&q| NttTable::new(q).map(Arc::new))
            .collect::<Result<Vec<_>, _>>()?;
        let special_table = Arc::new(NttTable::new(special)?);

        let mut level_bases = Vec::with_capacity(chain.len());
        let mut extended_bases = Vec::with_capacity(chain.len());
        for level in 0..chain.len() {
            let prefix = tables[..=level].to_vec();
            let mut extended = prefix.clone();
            extended.push(Arc::clone(&special_table));
            level_bases.push(Arc::new(RnsBasis::from_tables(prefix)?));
            extended_bases.push(Arc::new(RnsBasis::from_tables(extended)?));
        }

        let encoder = CanonicalEncoder::new()?;
        let context = Self {
            params,
            chain,
            special_modulus: special,
            level_bases,
            extended_bases,
            encoder,
        };
        info!(
            degree = DEGREE,
            levels = context.max_level(),
            log_q = format!("{:.1}", context.top_basis().log_modulus()),
            special_modulus = context.special_modulus,
            "CKKS context ready"
        );
        Ok(context)
    }

    pub fn params(&self) -> &SchemeParameters<DEGREE> {
        &self.params
    }

    pub fn max_level(&self) -> usize {
        self.params.max_level()
    }

    pub fn default_scale(&self) -> f64 {
        self.params.default_scale()
    }

    pub fn max_slots(&self) -> usize {
        self.params.max_slots()
    }

    /// `q_0, …, q_L` in chain order.
    pub fn chain(&self) -> &[u64] {
        &self.chain
    }

    /// The prime `q_level`, the one a rescale at `level` divides out.
    pub fn modulus_at(&self, level: usize) -> CkksResult<u64> {
        self.chain.get(level).copied().ok_or_else(|| self.level_error(level))
    }

    pub fn special_modulus(&self) -> u64 {
        self.special_modulus
    }

    pub fn encoder(&self) -> &CanonicalEncoder<DEGREE> {
        &self.encoder
    }

    /// Shared basis `{q_0, …, q_level}`.
    pub fn level_basis(&self, level: usize) -> CkksResult<&Arc<RnsBasis<DEGREE>>> {
        self.level_bases.get(level).ok_or_else(|| self.level_error(level))
    }

    /// Shared basis `{q_0, …, q_level, P}` used during key switching.
    pub fn extended_basis(&self, level: usize) -> CkksResult<&Arc<RnsBasis<DEGREE>>> {
        self.extended_bases.get(level).ok_or_else(|| self.level_error(level))
    }

    pub fn top_basis(&self) -> &Arc<RnsBasis<DEGREE>> {
        &self.level_bases[self.level_bases.len() - 1]
    }

    /// Basis every key is stored over: the full chain plus the special prime.
    pub fn key_basis(&self) -> &Arc<RnsBasis<DEGREE>> {
        &self.extended_bases[self.extended_bases.len() - 1]
    }

    fn level_error(&self, level: usize) -> CkksError {
        CkksError::InvalidCiphertext {
            reason: format!("level {level} exceeds maximum level {}", self.max_level()),
        }
    }
}
