//! The scheme parameter set: ring degree, modulus chain shape and encoding
//! scale. Immutable once built; everything else reads it.
use crate::crypto::{CkksError, CkksResult};

const DEFAULT_SCALE_BITS: u32 = 40;
const DEFAULT_BASE_BITS: u32 = 60;
const DEFAULT_SPECIAL_BITS: u32 = 61;
const DEFAULT_ERROR_STD_DEV: f64 = 3.2;
const MIN_MODULUS_BITS: u32 = 20;
const MAX_MODULUS_BITS: u32 = 61;

/// CKKS parameters for ring degree `DEGREE`.
///
/// The modulus chain is `q_0 · q_1 · … · q_L` where `q_0` has `base_bits`
/// bits and every `q_i` (i ≥ 1) sits near `2^scale_bits`. A ciphertext at
/// level `l` lives modulo `q_0 · … · q_l`, so `L` is the number of rescales
/// (multiplicative depth) available after a fresh encryption. One extra
/// special prime of `special_bits` bits is used only for key switching.
#[derive(Debug, Clone, PartialEq)]
pub struct SchemeParameters<const DEGREE: usize> {
    levels: usize,
    scale_bits: u32,
    base_bits: u32,
    special_bits: u32,
    error_std_dev: f64,
    hamming_weight: usize,
}

impl<const DEGREE: usize> SchemeParameters<DEGREE> {
    pub fn builder() -> SchemeParametersBuilder<DEGREE> {
        SchemeParametersBuilder::new()
    }

    /// Default parameters with exactly `depth` levels.
    pub fn for_depth(depth: usize) -> CkksResult<Self> {
        Self::builder().levels(depth).build()
    }

    /// Default parameters deep enough for the encrypted credit pipeline.
    pub fn credit_scoring() -> CkksResult<Self> {
        Self::for_depth(crate::credit::PIPELINE_DEPTH)
    }

    pub fn ring_degree(&self) -> usize {
        DEGREE
    }

    pub fn max_slots(&self) -> usize {
        DEGREE / 2
    }

    /// Highest level a fresh ciphertext is encrypted at.
    pub fn max_level(&self) -> usize {
        self.levels
    }

    pub fn scale_bits(&self) -> u32 {
        self.scale_bits
    }

    pub fn default_scale(&self) -> f64 {
        2f64.powi(self.scale_bits as i32)
    }

    pub fn base_bits(&self) -> u32 {
        self.base_bits
    }

    pub fn special_modulus_bits(&self) -> u32 {
        self.special_bits
    }

    /// Bit sizes of `q_0, q_1, …, q_L` in chain order.
    pub fn modulus_bits(&self) -> Vec<u32> {
        std::iter::once(self.base_bits)
            .chain(std::iter::repeat_n(self.scale_bits, self.levels))
            .collect()
    }

    pub fn error_std_dev(&self) -> f64 {
        self.error_std_dev
    }

    pub fn hamming_weight(&self) -> usize {
        self.hamming_weight
    }
}

pub struct SchemeParametersBuilder<const DEGREE: usize> {
    levels: Option<usize>,
    scale_bits: Option<u32>,
    base_bits: Option<u32>,
    special_bits: Option<u32>,
    error_std_dev: Option<f64>,
    hamming_weight: Option<usize>,
}

impl<const DEGREE: usize> Default for SchemeParametersBuilder<DEGREE> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const DEGREE: usize> SchemeParametersBuilder<DEGREE> {
    pub fn new() -> Self {
        Self {
            levels: None,
            scale_bits: None,
            base_bits: None,
            special_bits: None,
            error_std_dev: None,
            hamming_weight: None,
        }
    }

    pub fn levels(mut self, levels: usize) -> Self {
        self.levels = Some(levels);
        self
    }

    pub fn scale_bits(mut self, bits: u32) -> Self {
        self.scale_bits = Some(bits);
        self
    }

    pub fn base_bits(mut self, bits: u32) -> Self {
        self.base_bits = Some(bits);
        self
    }

    pub fn special_modulus_bits(mut self, bits: u32) -> Self {
        self.special_bits = Some(bits);
        self
    }

    pub fn error_std_dev(mut self, std_dev: f64) -> Self {
        self.error_std_dev = Some(std_dev);
        self
    }

    pub fn hamming_weight(mut self, weight: usize) -> Self {
        self.hamming_weight = Some(weight);
        self
    }

    pub fn build(self) -> CkksResult<SchemeParameters<DEGREE>> {
        let params = SchemeParameters {
            levels: self.levels.unwrap_or(1),
            scale_bits: self.scale_bits.unwrap_or(DEFAULT_SCALE_BITS),
            base_bits: self.base_bits.unwrap_or(DEFAULT_BASE_BITS),
            special_bits: self.special_bits.unwrap_or(DEFAULT_SPECIAL_BITS),
            error_std_dev: self.error_std_dev.unwrap_or(DEFAULT_ERROR_STD_DEV),
            hamming_weight: self.hamming_weight.unwrap_or(64.min(DEGREE / 2)),
        };
        params.validate()?;
        Ok(params)
    }
}

impl<const DEGREE: usize> SchemeParameters<DEGREE> {
    fn validate(&self) -> CkksResult<()> {
        let fail = |message: String| Err(CkksError::Configuration { message });
        if !DEGREE.is_power_of_two() || DEGREE < 8 {
            return fail(format!("ring degree {DEGREE} must be a power of two >= 8"));
        }
        if self.levels == 0 {
            return fail("at least one level is required".into());
        }
        for (name, bits) in [
            ("scale", self.scale_bits),
            ("base", self.base_bits),
            ("special", self.special_bits),
        ] {
            if !(MIN_MODULUS_BITS..=MAX_MODULUS_BITS).contains(&bits) {
                return fail(format!(
                    "{name} modulus bits {bits} outside [{MIN_MODULUS_BITS}, {MAX_MODULUS_BITS}]"
                ));
            }
        }
        if self.base_bits <= self.scale_bits {
            return fail(format!(
                "base modulus bits {} must exceed scale bits {}",
                self.base_bits, self.scale_bits
            ));
        }
        if self.special_bits < self.base_bits {
            return fail(format!(
                "special modulus bits {} must be at least the base bits {}",
                self.special_bits, self.base_bits
            ));
        }
        if !(self.error_std_dev.is_finite() && self.error_std_dev > 0.0) {
            return fail(format!(
                "error standard deviation {} must be finite and positive",
                self.error_std_dev
            ));
        }
        if self.hamming_weight == 0 || self.hamming_weight > DEGREE {
            return fail(format!(
                "Hamming weight {} must be in 1..={DEGREE}",
                self.hamming_weight
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_describe_chain() {
        let params = SchemeParameters::<64>::for_depth(3).unwrap();
        assert_eq!(params.max_level(), 3);
        assert_eq!(params.modulus_bits(), vec![60, 40, 40, 40]);
        assert_eq!(params.special_modulus_bits(), 61);
        assert_eq!(params.max_slots(), 32);
        assert_eq!(params.hamming_weight(), 32);
        assert_eq!(params.default_scale(), (1u64 << 40) as f64);
    }

    #[test]
    fn credit_preset_matches_pipeline_depth() {
        let params = SchemeParameters::<256>::credit_scoring().unwrap();
        assert_eq!(params.max_level(), crate::credit::PIPELINE_DEPTH);
        assert_eq!(params.modulus_bits().len(), crate::credit::PIPELINE_DEPTH + 1);
    }

    #[test]
    fn builder_overrides_defaults() {
        let params = SchemeParameters::<1024>::builder()
            .levels(5)
            .scale_bits(35)
            .base_bits(55)
            .special_modulus_bits(58)
            .error_std_dev(2.0)
            .hamming_weight(128)
            .build()
            .unwrap();
        assert_eq!(params.modulus_bits(), vec![55, 35, 35, 35, 35, 35]);
        assert_eq!(params.hamming_weight(), 128);
        assert_eq!(params.error_std_dev(), 2.0);
    }

    #[test]
    fn invalid_configurations_are_rejected() {
        let cases = [
            SchemeParameters::<64>::builder().levels(0).build(),
            SchemeParameters::<64>::builder().scale_bits(62).build(),
            SchemeParameters::<64>::builder().scale_bits(50).base_bits(45).build(),
            SchemeParameters::<64>::builder().base_bits(60).special_modulus_bits(50).build(),
            SchemeParameters::<64>::builder().error_std_dev(-1.0).build(),
            SchemeParameters::<64>::builder().hamming_weight(65).build(),
        ];
        for case in cases {
            assert!(matches!(case, Err(CkksError::Configuration { .. })));
        }
        assert!(matches!(
            SchemeParameters::<48>::builder().build(),
            Err(CkksError::Configuration { .. })
        ));
    }
}
