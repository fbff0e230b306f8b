use super::{
    basis::RnsBasis,
    errors::{RingError, RingResult},
    traits::{PolyRing, PolySampler},
};
use crate::math::{
    add_mod, center, gaussian_coefficients, inv_mod, mul_mod, neg_mod, reduce_i128, sub_mod,
    ternary_coefficients, uniform_coefficients,
};
use rand::Rng;
use std::{
    ops::{AddAssign, MulAssign, Neg, SubAssign},
    sync::Arc,
};

/// A polynomial in `Z_{q_0} x … x Z_{q_l}[X] / (X^N + 1)`.
///
/// Stores one `[u64; DEGREE]` array per RNS channel. The `in_ntt_domain` flag
/// tracks whether the arrays hold coefficient-domain or NTT-domain values.
///
/// # Invariants
/// - `channels.len() == basis.channel_count()`
/// - Every `channels[i][j] < basis.moduli()[i]`
#[derive(Clone, Debug)]
pub struct RnsPoly<const DEGREE: usize> {
    channels: Vec<[u64; DEGREE]>,
    basis: Arc<RnsBasis<DEGREE>>,
    in_ntt_domain: bool,
}

fn same_basis<const DEGREE: usize>(a: &Arc<RnsBasis<DEGREE>>, b: &Arc<RnsBasis<DEGREE>>) -> bool {
    Arc::ptr_eq(a, b) || a.moduli() == b.moduli()
}

// ─── Constructors ─────────────────────────────────────────────────────────────

impl<const DEGREE: usize> RnsPoly<DEGREE> {
    /// Creates the zero polynomial in coefficient domain.
    pub fn zero(basis: Arc<RnsBasis<DEGREE>>) -> Self {
        let channels = vec![[0u64; DEGREE]; basis.channel_count()];
        Self {
            channels,
            basis,
            in_ntt_domain: false,
        }
    }

    /// Creates a polynomial from signed integer coefficients.
    ///
    /// Accepts slices of length ≥ DEGREE; only the first DEGREE elements are used.
    pub fn from_coeffs(coeffs: &[i64], basis: Arc<RnsBasis<DEGREE>>) -> Self {
        assert!(
            coeffs.len() >= DEGREE,
            "from_coeffs: need at least {DEGREE} coefficients, got {}",
            coeffs.len()
        );
        let channels = basis
            .moduli()
            .iter()
            .map(|&q| std::array::from_fn(|i| reduce_i128(coeffs[i] as i128, q)))
            .collect();
        Self {
            channels,
            basis,
            in_ntt_domain: false,
        }
    }

    /// Creates a polynomial from wide signed coefficients (used by the encoder,
    /// whose scaled values routinely exceed `i64`).
    pub fn from_wide_coeffs(coeffs: &[i128], basis: Arc<RnsBasis<DEGREE>>) -> Self {
        assert!(
            coeffs.len() >= DEGREE,
            "from_wide_coeffs: need at least {DEGREE} coefficients, got {}",
            coeffs.len()
        );
        let channels = basis
            .moduli()
            .iter()
            .map(|&q| std::array::from_fn(|i| reduce_i128(coeffs[i], q)))
            .collect();
        Self {
            channels,
            basis,
            in_ntt_domain: false,
        }
    }

    /// The constant polynomial `value`, directly in NTT domain.
    ///
    /// A constant evaluates to itself at every root, so every slot of every
    /// channel holds `value mod q_i`.
    pub fn constant_ntt(value: i128, basis: Arc<RnsBasis<DEGREE>>) -> Self {
        let channels = basis
            .moduli()
            .iter()
            .map(|&q| [reduce_i128(value, q); DEGREE])
            .collect();
        Self {
            channels,
            basis,
            in_ntt_domain: true,
        }
    }

    /// Creates a polynomial from pre-built channel arrays.
    ///
    /// Returns an error if the channel count doesn't match the basis, or if any
    /// coefficient is not reduced.
    pub fn from_channels(
        channels: Vec<[u64; DEGREE]>,
        basis: Arc<RnsBasis<DEGREE>>,
        in_ntt_domain: bool,
    ) -> RingResult<Self> {
        let expected = basis.channel_count();
        let actual = channels.len();
        if actual != expected {
            return Err(RingError::ChannelCountMismatch { expected, actual });
        }
        for (channel, &q) in channels.iter().zip(basis.moduli()) {
            if let Some(&coefficient) = channel.iter().find(|&&c| c >= q) {
                return Err(RingError::NonReducedCoefficient {
                    coefficient,
                    modulus: q,
                });
            }
        }
        Ok(Self {
            channels,
            basis,
            in_ntt_domain,
        })
    }
}

// ─── Accessors & domain conversion ───────────────────────────────────────────

impl<const DEGREE: usize> RnsPoly<DEGREE> {
    pub fn channels(&self) -> &[[u64; DEGREE]] {
        &self.channels
    }

    pub fn basis(&self) -> &Arc<RnsBasis<DEGREE>> {
        &self.basis
    }

    pub fn is_ntt_domain(&self) -> bool {
        self.in_ntt_domain
    }

    /// Converts to NTT domain in-place (no-op if already there).
    pub fn to_ntt_domain(&mut self) {
        if self.in_ntt_domain {
            return;
        }
        for (ch, channel) in self.channels.iter_mut().enumerate() {
            self.basis.ntt_table(ch).forward(channel);
        }
        self.in_ntt_domain = true;
    }

    /// Converts to coefficient domain in-place (no-op if already there).
    pub fn to_coeff_domain(&mut self) {
        if !self.in_ntt_domain {
            return;
        }
        for (ch, channel) in self.channels.iter_mut().enumerate() {
            self.basis.ntt_table(ch).inverse(channel);
        }
        self.in_ntt_domain = false;
    }

    pub fn into_ntt_domain(mut self) -> Self {
        self.to_ntt_domain();
        self
    }

    /// Restricts the polynomial to the channels of `target`.
    ///
    /// Every modulus of `target` must be present in the current basis. Used
    /// for modulus dropping and for reading a key at a lower level; the
    /// represented value is unchanged modulo the smaller product.
    pub fn project(&self, target: &Arc<RnsBasis<DEGREE>>) -> RingResult<Self> {
        let channels = target
            .moduli()
            .iter()
            .map(|&modulus| {
                self.basis
                    .position(modulus)
                    .map(|index| self.channels[index])
                    .ok_or(RingError::MissingChannel { modulus })
            })
            .collect::<RingResult<Vec<_>>>()?;
        Ok(Self {
            channels,
            basis: Arc::clone(target),
            in_ntt_domain: self.in_ntt_domain,
        })
    }

    /// Divides by the last modulus of the basis with rounding and drops that
    /// channel: `x -> round(x / q_last)` over `target`, the basis without its
    /// last modulus.
    ///
    /// This single primitive implements both CKKS rescaling (dividing out a
    /// chain prime) and the key-switching mod-down (dividing out the special
    /// prime). Domain is preserved.
    pub fn divide_by_last_modulus(&self, target: &Arc<RnsBasis<DEGREE>>) -> RingResult<Self> {
        let count = self.channels.len();
        if count < 2 {
            return Err(RingError::InvalidModDrop {
                drop_count: 1,
                channel_count: count,
            });
        }
        if target.moduli() != &self.basis.moduli()[..count - 1] {
            return Err(RingError::ChannelCountMismatch {
                expected: count - 1,
                actual: target.channel_count(),
            });
        }

        let last_modulus = self.basis.moduli()[count - 1];
        let mut last = self.channels[count - 1];
        if self.in_ntt_domain {
            self.basis.ntt_table(count - 1).inverse(&mut last);
        }
        let centered: Vec<i64> = last.iter().map(|&c| center(c, last_modulus)).collect();

        let mut channels = Vec::with_capacity(count - 1);
        for (ch, &q) in target.moduli().iter().enumerate() {
            let mut remainder: [u64; DEGREE] =
                std::array::from_fn(|i| reduce_i128(centered[i] as i128, q));
            if self.in_ntt_domain {
                target.ntt_table(ch).forward(&mut remainder);
            }
            let inverse = inv_mod(last_modulus % q, q).ok_or(RingError::DuplicateModulus {
                modulus: q,
            })?;
            let source = &self.channels[ch];
            channels.push(std::array::from_fn(|i| {
                mul_mod(sub_mod(source[i], remainder[i], q), inverse, q)
            }));
        }

        Ok(Self {
            channels,
            basis: Arc::clone(target),
            in_ntt_domain: self.in_ntt_domain,
        })
    }

    /// Takes coefficient-domain channel `channel`, reads it as a centered
    /// integer polynomial and re-encodes it over `target` in NTT domain.
    ///
    /// This is the RNS digit lift used by key switching.
    pub fn lift_channel(&self, channel: usize, target: &Arc<RnsBasis<DEGREE>>) -> Self {
        debug_assert!(!self.in_ntt_domain, "lift_channel: requires coefficient domain");
        let q_source = self.basis.moduli()[channel];
        let source = &self.channels[channel];
        let channels = target
            .moduli()
            .iter()
            .enumerate()
            .map(|(ch, &q)| {
                let mut lifted: [u64; DEGREE] = if q == q_source {
                    *source
                } else {
                    std::array::from_fn(|i| reduce_i128(center(source[i], q_source) as i128, q))
                };
                target.ntt_table(ch).forward(&mut lifted);
                lifted
            })
            .collect();
        Self {
            channels,
            basis: Arc::clone(target),
            in_ntt_domain: true,
        }
    }

    /// Lifts every coefficient to its centered value as `f64`.
    pub fn to_centered_f64(&self) -> Vec<f64> {
        let mut coeff = self.clone();
        coeff.to_coeff_domain();
        let mut residues = vec![0u64; coeff.channels.len()];
        (0..DEGREE)
            .map(|i| {
                for (residue, channel) in residues.iter_mut().zip(&coeff.channels) {
                    *residue = channel[i];
                }
                coeff.basis.reconstruct_centered(&residues)
            })
            .collect()
    }
}

// ─── Arithmetic ───────────────────────────────────────────────────────────────

impl<const DEGREE: usize> RnsPoly<DEGREE> {
    /// Adds the integer constant `value` (as a polynomial) in place.
    pub fn add_constant_assign(&mut self, value: i128) {
        for (ch, channel) in self.channels.iter_mut().enumerate() {
            let q = self.basis.moduli()[ch];
            let residue = reduce_i128(value, q);
            if self.in_ntt_domain {
                for c in channel.iter_mut() {
                    *c = add_mod(*c, residue, q);
                }
            } else {
                channel[0] = add_mod(channel[0], residue, q);
            }
        }
    }

    /// Multiplies every coefficient by the integer constant `value`.
    pub fn mul_constant_assign(&mut self, value: i128) {
        for (ch, channel) in self.channels.iter_mut().enumerate() {
            let q = self.basis.moduli()[ch];
            let residue = reduce_i128(value, q);
            for c in channel.iter_mut() {
                *c = mul_mod(*c, residue, q);
            }
        }
    }

    /// Multiplies by the integer whose CRT residues are `residues`, i.e.
    /// channel `i` is scaled by `residues[i]`. Works in both domains.
    pub fn mul_rns_constant_assign(&mut self, residues: &[u64]) {
        debug_assert_eq!(residues.len(), self.channels.len());
        for (ch, channel) in self.channels.iter_mut().enumerate() {
            let q = self.basis.moduli()[ch];
            let residue = residues[ch] % q;
            for c in channel.iter_mut() {
                *c = mul_mod(*c, residue, q);
            }
        }
    }
}

impl<const DEGREE: usize> AddAssign<&RnsPoly<DEGREE>> for RnsPoly<DEGREE> {
    /// Coefficient-wise addition modulo each `q_i`.
    ///
    /// Works in both coefficient and NTT domain. Both operands must share the
    /// same basis and be in the same domain.
    fn add_assign(&mut self, rhs: &RnsPoly<DEGREE>) {
        debug_assert!(same_basis(&self.basis, &rhs.basis), "add_assign: basis mismatch");
        debug_assert_eq!(
            self.in_ntt_domain, rhs.in_ntt_domain,
            "add_assign: domain mismatch"
        );
        for (ch, channel) in self.channels.iter_mut().enumerate() {
            let q = self.basis.moduli()[ch];
            for (a, &b) in channel.iter_mut().zip(rhs.channels[ch].iter()) {
                *a = add_mod(*a, b, q);
            }
        }
    }
}

impl<const DEGREE: usize> SubAssign<&RnsPoly<DEGREE>> for RnsPoly<DEGREE> {
    fn sub_assign(&mut self, rhs: &RnsPoly<DEGREE>) {
        debug_assert!(same_basis(&self.basis, &rhs.basis), "sub_assign: basis mismatch");
        debug_assert_eq!(
            self.in_ntt_domain, rhs.in_ntt_domain,
            "sub_assign: domain mismatch"
        );
        for (ch, channel) in self.channels.iter_mut().enumerate() {
            let q = self.basis.moduli()[ch];
            for (a, &b) in channel.iter_mut().zip(rhs.channels[ch].iter()) {
                *a = sub_mod(*a, b, q);
            }
        }
    }
}

impl<const DEGREE: usize> MulAssign<&RnsPoly<DEGREE>> for RnsPoly<DEGREE> {
    /// Ring multiplication as a pointwise product of NTT evaluations.
    ///
    /// Both operands must already be in NTT domain and share the same basis.
    fn mul_assign(&mut self, rhs: &RnsPoly<DEGREE>) {
        debug_assert!(
            self.in_ntt_domain && rhs.in_ntt_domain,
            "mul_assign: requires NTT domain; call to_ntt_domain first"
        );
        debug_assert!(same_basis(&self.basis, &rhs.basis), "mul_assign: basis mismatch");
        for (ch, channel) in self.channels.iter_mut().enumerate() {
            let q = self.basis.moduli()[ch];
            for (a, &b) in channel.iter_mut().zip(rhs.channels[ch].iter()) {
                *a = mul_mod(*a, b, q);
            }
        }
    }
}

impl<const DEGREE: usize> Neg for RnsPoly<DEGREE> {
    type Output = Self;

    /// Coefficient-wise negation modulo each `q_i`. Works in both domains.
    fn neg(mut self) -> Self {
        for (ch, channel) in self.channels.iter_mut().enumerate() {
            let q = self.basis.moduli()[ch];
            for c in channel.iter_mut() {
                *c = neg_mod(*c, q);
            }
        }
        self
    }
}

// ─── PolyRing trait ───────────────────────────────────────────────────────────

impl<const DEGREE: usize> PolyRing<DEGREE> for RnsPoly<DEGREE> {
    type Context = Arc<RnsBasis<DEGREE>>;

    fn zero(context: &Self::Context) -> Self {
        Self::zero(Arc::clone(context))
    }

    fn from_coeffs(coeffs: &[i64], context: &Self::Context) -> Self {
        Self::from_coeffs(coeffs, Arc::clone(context))
    }

    /// Centered coefficients, saturating at the `i64` range.
    fn to_coeffs(&self) -> [i64; DEGREE] {
        let wide = self.to_centered_f64();
        std::array::from_fn(|i| wide[i].round() as i64)
    }

    fn context(&self) -> &Self::Context {
        &self.basis
    }
}

// ─── PolySampler trait ────────────────────────────────────────────────────────

impl<const DEGREE: usize> PolySampler<DEGREE> for RnsPoly<DEGREE> {
    /// Uniform in every channel. The NTT is a bijection, so the sample is
    /// produced directly in NTT domain.
    fn sample_uniform<R: Rng + ?Sized>(context: &Self::Context, rng: &mut R) -> Self {
        let channels = context
            .moduli()
            .iter()
            .map(|&q| uniform_coefficients::<DEGREE, _>(q, rng))
            .collect();
        Self {
            channels,
            basis: Arc::clone(context),
            in_ntt_domain: true,
        }
    }

    /// Rounded Gaussian noise, returned in NTT domain.
    fn sample_gaussian<R: Rng + ?Sized>(
        std_dev: f64,
        context: &Self::Context,
        rng: &mut R,
    ) -> Self {
        let noise = gaussian_coefficients::<DEGREE, _>(std_dev, rng);
        Self::from_coeffs(&noise, Arc::clone(context)).into_ntt_domain()
    }

    /// Ternary polynomial with exactly `hamming_weight` non-zero
    /// coefficients, returned in NTT domain.
    fn sample_ternary<R: Rng + ?Sized>(
        hamming_weight: usize,
        context: &Self::Context,
        rng: &mut R,
    ) -> Self {
        let ternary = ternary_coefficients::<DEGREE, _>(hamming_weight, rng);
        Self::from_coeffs(&ternary, Arc::clone(context)).into_ntt_domain()
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────
