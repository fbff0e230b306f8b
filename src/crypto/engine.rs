use super::{
    errors::{CkksError, CkksResult},
    types::{Ciphertext, Plaintext, TensoredCiphertext},
};
use crate::{
    context::CkksContext,
    encoding::encode_constant,
    keys::{EncryptionKey, EvaluationKeySet, SecretKey},
    rings::RnsPoly,
};
use rand::Rng;
use std::sync::Arc;
use tracing::{debug, trace};

/// Relative tolerance under which two scales count as equal.
pub const SCALE_TOLERANCE: f64 = 1e-6;

/// Homomorphic Arithmetic Provider.
///
/// Stateless apart from the shared context: every operation takes its
/// operands by reference and returns a fresh value, so one engine can be used
/// from many threads at once.
#[derive(Debug, Clone)]
pub struct CkksEngine<const DEGREE: usize> {
    context: Arc<CkksContext<DEGREE>>,
}

impl<const DEGREE: usize> CkksEngine<DEGREE> {
    pub fn new(context: Arc<CkksContext<DEGREE>>) -> Self {
        Self { context }
    }

    pub fn context(&self) -> &Arc<CkksContext<DEGREE>> {
        &self.context
    }

    pub fn max_level(&self) -> usize {
        self.context.max_level()
    }

    // ─── Encoding ────────────────────────────────────────────────────────────

    /// Encodes a real vector (at most `N/2` values) at the default scale and
    /// top level.
    pub fn encode(&self, values: &[f64]) -> CkksResult<Plaintext<DEGREE>> {
        if values.is_empty() {
            return Err(CkksError::InvalidOperand {
                message: "cannot encode an empty vector".into(),
            });
        }
        let scale = self.context.default_scale();
        let coeffs = self.context.encoder().encode(values, scale)?;
        let basis = Arc::clone(self.context.top_basis());
        Ok(Plaintext {
            poly: RnsPoly::from_wide_coeffs(&coeffs, basis).into_ntt_domain(),
            scale,
            slots: values.len(),
        })
    }

    /// Encodes one value, replicated in every slot, as the constant
    /// polynomial `round(value * scale)`.
    pub fn encode_scalar(&self, value: f64) -> CkksResult<Plaintext<DEGREE>> {
        let scale = self.context.default_scale();
        let constant = encode_constant(value, scale)?;
        let basis = Arc::clone(self.context.top_basis());
        Ok(Plaintext {
            poly: RnsPoly::constant_ntt(constant, basis),
            scale,
            slots: 1,
        })
    }

    pub fn decode(&self, plaintext: &Plaintext<DEGREE>) -> CkksResult<Vec<f64>> {
        let coeffs = plaintext.poly.to_centered_f64();
        if coeffs.iter().any(|c| !c.is_finite()) {
            return Err(CkksError::InvalidCiphertext {
                reason: "decrypted message exceeds the modulus range".into(),
            });
        }
        let mut values = self.context.encoder().decode(&coeffs, plaintext.scale)?;
        values.truncate(plaintext.slots);
        Ok(values)
    }

    // ─── Encryption / decryption ─────────────────────────────────────────────

    /// Encrypts one value at the top level under a public or secret key.
    pub fn encrypt<K, R>(&self, value: f64, key: &K, rng: &mut R) -> CkksResult<Ciphertext<DEGREE>>
    where
        K: EncryptionKey<DEGREE> + ?Sized,
        R: Rng + ?Sized,
    {
        let plaintext = self.encode_scalar(value)?;
        self.encrypt_plaintext(&plaintext, key, rng)
    }

    pub fn encrypt_vector<K, R>(
        &self,
        values: &[f64],
        key: &K,
        rng: &mut R,
    ) -> CkksResult<Ciphertext<DEGREE>>
    where
        K: EncryptionKey<DEGREE> + ?Sized,
        R: Rng + ?Sized,
    {
        let plaintext = self.encode(values)?;
        self.encrypt_plaintext(&plaintext, key, rng)
    }

    pub fn encrypt_plaintext<K, R>(
        &self,
        plaintext: &Plaintext<DEGREE>,
        key: &K,
        rng: &mut R,
    ) -> CkksResult<Ciphertext<DEGREE>>
    where
        K: EncryptionKey<DEGREE> + ?Sized,
        R: Rng + ?Sized,
    {
        let (c0, c1) = key.encrypt_poly(&plaintext.poly, &self.context, rng)?;
        Ok(Ciphertext {
            c0,
            c1,
            scale: plaintext.scale,
            slots: plaintext.slots,
        })
    }

    /// Decrypts to the value in slot 0.
    pub fn decrypt(
        &self,
        ciphertext: &Ciphertext<DEGREE>,
        secret_key: &SecretKey<DEGREE>,
    ) -> CkksResult<f64> {
        let values = self.decrypt_vector(ciphertext, secret_key)?;
        values.first().copied().ok_or_else(|| CkksError::InvalidCiphertext {
            reason: "ciphertext carries no slots".into(),
        })
    }

    /// Decrypts the first `ciphertext.slots` slots.
    pub fn decrypt_vector(
        &self,
        ciphertext: &Ciphertext<DEGREE>,
        secret_key: &SecretKey<DEGREE>,
    ) -> CkksResult<Vec<f64>> {
        let level = self.validate(ciphertext)?;
        let basis = self.context.level_basis(level)?;
        let s = secret_key
            .project(basis)
            .map_err(|_| CkksError::InvalidCiphertext {
                reason: "secret key does not cover the ciphertext moduli".into(),
            })?;

        // m = c0 + c1 * s
        let mut message = ciphertext.c1.clone();
        message *= &s;
        message += &ciphertext.c0;

        self.decode(&Plaintext {
            poly: message,
            scale: ciphertext.scale,
            slots: ciphertext.slots,
        })
    }

    // ─── Linear operations ───────────────────────────────────────────────────

    pub fn add(
        &self,
        a: &Ciphertext<DEGREE>,
        b: &Ciphertext<DEGREE>,
    ) -> CkksResult<Ciphertext<DEGREE>> {
        self.check_compatible(a, b)?;
        let mut c0 = a.c0.clone();
        c0 += &b.c0;
        let mut c1 = a.c1.clone();
        c1 += &b.c1;
        Ok(Ciphertext {
            c0,
            c1,
            scale: a.scale,
            slots: a.slots.max(b.slots),
        })
    }

    pub fn sub(
        &self,
        a: &Ciphertext<DEGREE>,
        b: &Ciphertext<DEGREE>,
    ) -> CkksResult<Ciphertext<DEGREE>> {
        self.check_compatible(a, b)?;
        let mut c0 = a.c0.clone();
        c0 -= &b.c0;
        let mut c1 = a.c1.clone();
        c1 -= &b.c1;
        Ok(Ciphertext {
            c0,
            c1,
            scale: a.scale,
            slots: a.slots.max(b.slots),
        })
    }

    pub fn negate(&self, ciphertext: &Ciphertext<DEGREE>) -> CkksResult<Ciphertext<DEGREE>> {
        self.validate(ciphertext)?;
        Ok(Ciphertext {
            c0: -ciphertext.c0.clone(),
            c1: -ciphertext.c1.clone(),
            scale: ciphertext.scale,
            slots: ciphertext.slots,
        })
    }

    /// Adds a public constant to every slot. Level and scale are unchanged.
    pub fn add_plain(
        &self,
        ciphertext: &Ciphertext<DEGREE>,
        value: f64,
    ) -> CkksResult<Ciphertext<DEGREE>> {
        self.validate(ciphertext)?;
        let constant = encode_constant(value, ciphertext.scale)?;
        let mut result = ciphertext.clone();
        result.c0.add_constant_assign(constant);
        Ok(result)
    }

    pub fn sub_plain(
        &self,
        ciphertext: &Ciphertext<DEGREE>,
        value: f64,
    ) -> CkksResult<Ciphertext<DEGREE>> {
        self.add_plain(ciphertext, -value)
    }

    // ─── Plaintext multiplication ────────────────────────────────────────────

    /// Multiplies by a public constant, consuming one level.
    ///
    /// The constant is encoded at scale `q_level`, so the rescale that follows
    /// divides out exactly what was multiplied in and the scale is preserved.
    pub fn multiply_plain(
        &self,
        ciphertext: &Ciphertext<DEGREE>,
        value: f64,
    ) -> CkksResult<Ciphertext<DEGREE>> {
        let level = self.validate(ciphertext)?;
        require_levels(1, level)?;
        let modulus = self.context.modulus_at(level)? as f64;
        let mut result = self.scale_by_constant(ciphertext, value, modulus)?;
        result.scale = ciphertext.scale;
        Ok(result)
    }

    /// Multiplies by a public constant and lands on exactly `target_scale`,
    /// consuming one level.
    pub fn multiply_plain_to_scale(
        &self,
        ciphertext: &Ciphertext<DEGREE>,
        value: f64,
        target_scale: f64,
    ) -> CkksResult<Ciphertext<DEGREE>> {
        let level = self.validate(ciphertext)?;
        require_levels(1, level)?;
        let modulus = self.context.modulus_at(level)? as f64;
        let plain_scale = target_scale * modulus / ciphertext.scale;
        if !(plain_scale.is_finite() && plain_scale >= 1.0) {
            return Err(CkksError::InvalidOperand {
                message: format!(
                    "cannot reach scale {target_scale:.3e} from {:.3e} at level {level}",
                    ciphertext.scale
                ),
            });
        }
        let mut result = self.scale_by_constant(ciphertext, value, plain_scale)?;
        result.scale = target_scale;
        Ok(result)
    }

    /// Brings the scale back to the default scale, consuming one level.
    pub fn normalize_scale(
        &self,
        ciphertext: &Ciphertext<DEGREE>,
    ) -> CkksResult<Ciphertext<DEGREE>> {
        self.multiply_plain_to_scale(ciphertext, 1.0, self.context.default_scale())
    }

    /// Divides by a public non-zero constant, consuming one level.
    pub fn divide_plain(
        &self,
        ciphertext: &Ciphertext<DEGREE>,
        divisor: f64,
    ) -> CkksResult<Ciphertext<DEGREE>> {
        if divisor == 0.0 || !divisor.is_finite() {
            return Err(CkksError::InvalidOperand {
                message: format!("cannot divide by {divisor}"),
            });
        }
        self.multiply_plain(ciphertext, 1.0 / divisor)
    }

    fn scale_by_constant(
        &self,
        ciphertext: &Ciphertext<DEGREE>,
        value: f64,
        plain_scale: f64,
    ) -> CkksResult<Ciphertext<DEGREE>> {
        let constant = encode_constant(value, plain_scale)?;
        let mut product = ciphertext.clone();
        product.c0.mul_constant_assign(constant);
        product.c1.mul_constant_assign(constant);
        product.scale = ciphertext.scale * plain_scale;
        self.rescale(&product)
    }

    // ─── Ciphertext multiplication ───────────────────────────────────────────

    /// `a * b` followed by relinearization and one rescale.
    ///
    /// Operands at different levels are first brought to the lower one. The
    /// result sits one level below that and is immediately usable in further
    /// multiplications.
    pub fn multiply(
        &self,
        a: &Ciphertext<DEGREE>,
        b: &Ciphertext<DEGREE>,
        keys: &EvaluationKeySet<DEGREE>,
    ) -> CkksResult<Ciphertext<DEGREE>> {
        let level = self.validate(a)?.min(self.validate(b)?);
        require_levels(1, level)?;
        let tensored = self.tensor(a, b)?;
        let relinearized = self.relinearize(&tensored, keys)?;
        self.rescale(&relinearized)
    }

    pub fn square(
        &self,
        ciphertext: &Ciphertext<DEGREE>,
        keys: &EvaluationKeySet<DEGREE>,
    ) -> CkksResult<Ciphertext<DEGREE>> {
        self.multiply(ciphertext, ciphertext, keys)
    }

    /// Raw product `(d0, d1, d2) = (a0 b0, a0 b1 + a1 b0, a1 b1)` at the lower
    /// of the two levels. The scale is the product of both scales.
    pub fn tensor(
        &self,
        a: &Ciphertext<DEGREE>,
        b: &Ciphertext<DEGREE>,
    ) -> CkksResult<TensoredCiphertext<DEGREE>> {
        let (a, b) = self.align_levels(a, b)?;

        let mut d0 = a.c0.clone();
        d0 *= &b.c0;

        let mut d1 = a.c0.clone();
        d1 *= &b.c1;
        let mut cross = a.c1.clone();
        cross *= &b.c0;
        d1 += &cross;

        let mut d2 = a.c1;
        d2 *= &b.c1;

        Ok(TensoredCiphertext {
            d0,
            d1,
            d2,
            scale: a.scale * b.scale,
            slots: a.slots.max(b.slots),
        })
    }

    /// Folds `d2 * s^2` back into a two-component ciphertext.
    ///
    /// Each RNS digit `[d2]_{q_j}` is lifted to `{q_0, …, q_l, P}`, multiplied
    /// by its key pair and accumulated; dividing the sums by `P` yields
    /// `(c0', c1')` with `c0' + c1' s ≈ d2 s^2`.
    pub fn relinearize(
        &self,
        tensored: &TensoredCiphertext<DEGREE>,
        keys: &EvaluationKeySet<DEGREE>,
    ) -> CkksResult<Ciphertext<DEGREE>> {
        let level = tensored.level();
        let level_basis = self.context.level_basis(level)?;
        for poly in [&tensored.d0, &tensored.d1, &tensored.d2] {
            if poly.basis().moduli() != level_basis.moduli() || !poly.is_ntt_domain() {
                return Err(CkksError::InvalidCiphertext {
                    reason: "tensored components do not match the level basis".into(),
                });
            }
        }
        let digits = keys.relinearization.digits();
        if digits.len() <= level {
            return Err(CkksError::InvalidOperand {
                message: format!(
                    "relinearization key has {} digit(s), level {level} needs {}",
                    digits.len(),
                    level + 1
                ),
            });
        }

        let extended = self.context.extended_basis(level)?;
        let mut d2 = tensored.d2.clone();
        d2.to_coeff_domain();

        let mut acc_b = RnsPoly::zero(Arc::clone(extended)).into_ntt_domain();
        let mut acc_a = acc_b.clone();
        for (j, digit) in digits.iter().enumerate().take(level + 1) {
            let lifted = d2.lift_channel(j, extended);
            let mut term_b = digit.b.project(extended)?;
            term_b *= &lifted;
            acc_b += &term_b;
            let mut term_a = digit.a.project(extended)?;
            term_a *= &lifted;
            acc_a += &term_a;
        }

        let mut c0 = tensored.d0.clone();
        c0 += &acc_b.divide_by_last_modulus(level_basis)?;
        let mut c1 = tensored.d1.clone();
        c1 += &acc_a.divide_by_last_modulus(level_basis)?;

        Ok(Ciphertext {
            c0,
            c1,
            scale: tensored.scale,
            slots: tensored.slots,
        })
    }

    /// Divides out `q_level`, dropping one level and dividing the scale by
    /// the same prime.
    pub fn rescale(&self, ciphertext: &Ciphertext<DEGREE>) -> CkksResult<Ciphertext<DEGREE>> {
        let level = self.validate(ciphertext)?;
        require_levels(1, level)?;
        let target = self.context.level_basis(level - 1)?;
        let modulus = self.context.modulus_at(level)?;
        trace!(level, modulus, "rescale");
        Ok(Ciphertext {
            c0: ciphertext.c0.divide_by_last_modulus(target)?,
            c1: ciphertext.c1.divide_by_last_modulus(target)?,
            scale: ciphertext.scale / modulus as f64,
            slots: ciphertext.slots,
        })
    }

    // ─── Level management ────────────────────────────────────────────────────

    /// Drops to `level` by discarding moduli. Exact: no noise is added and
    /// the scale is unchanged.
    pub fn drop_to_level(
        &self,
        ciphertext: &Ciphertext<DEGREE>,
        level: usize,
    ) -> CkksResult<Ciphertext<DEGREE>> {
        let current = self.validate(ciphertext)?;
        if level > current {
            return Err(CkksError::LevelMismatch {
                left: current,
                right: level,
            });
        }
        if level == current {
            return Ok(ciphertext.clone());
        }
        debug!(from = current, to = level, "dropping ciphertext level");
        let basis = self.context.level_basis(level)?;
        Ok(Ciphertext {
            c0: ciphertext.c0.project(basis)?,
            c1: ciphertext.c1.project(basis)?,
            scale: ciphertext.scale,
            slots: ciphertext.slots,
        })
    }

    /// Returns both operands at the lower of their two levels.
    pub fn align_levels(
        &self,
        a: &Ciphertext<DEGREE>,
        b: &Ciphertext<DEGREE>,
    ) -> CkksResult<(Ciphertext<DEGREE>, Ciphertext<DEGREE>)> {
        let level = self.validate(a)?.min(self.validate(b)?);
        Ok((self.drop_to_level(a, level)?, self.drop_to_level(b, level)?))
    }

    // ─── Validation ──────────────────────────────────────────────────────────

    /// Checks that `ciphertext` was produced under this parameter set and
    /// returns its level.
    pub fn validate(&self, ciphertext: &Ciphertext<DEGREE>) -> CkksResult<usize> {
        let invalid = |reason: &str| CkksError::InvalidCiphertext {
            reason: reason.to_string(),
        };
        let level = ciphertext.level();
        let basis = self.context.level_basis(level)?;
        if ciphertext.c0.basis().moduli() != basis.moduli() {
            return Err(invalid("moduli do not belong to this parameter set"));
        }
        if ciphertext.c1.basis().moduli() != basis.moduli() {
            return Err(invalid("components are at different levels"));
        }
        if !(ciphertext.c0.is_ntt_domain() && ciphertext.c1.is_ntt_domain()) {
            return Err(invalid("components must be in NTT form"));
        }
        if !(ciphertext.scale.is_finite() && ciphertext.scale > 0.0) {
            return Err(invalid("scale must be finite and positive"));
        }
        if ciphertext.slots == 0 || ciphertext.slots > self.context.max_slots() {
            return Err(invalid("slot count outside 1..=N/2"));
        }
        Ok(level)
    }

    fn check_compatible(&self, a: &Ciphertext<DEGREE>, b: &Ciphertext<DEGREE>) -> CkksResult<()> {
        let left = self.validate(a)?;
        let right = self.validate(b)?;
        if left != right {
            return Err(CkksError::LevelMismatch { left, right });
        }
        check_scales(a.scale, b.scale)
    }
}

/// Fails with `ScaleMismatch` unless the scales agree within
/// [`SCALE_TOLERANCE`].
pub fn check_scales(expected: f64, actual: f64) -> CkksResult<()> {
    let bound = SCALE_TOLERANCE * expected.abs().max(actual.abs());
    if (expected - actual).abs() > bound {
        return Err(CkksError::ScaleMismatch { expected, actual });
    }
    Ok(())
}

pub(crate) fn require_levels(required: usize, available: usize) -> CkksResult<()> {
    if available < required {
        return Err(CkksError::DepthExhausted {
            required,
            available,
        });
    }
    Ok(())
}
