use crate::rings::RnsPoly;

/// An encoded (not encrypted) value: `round(scale * m(X))` in NTT form.
#[derive(Debug, Clone)]
pub struct Plaintext<const DEGREE: usize> {
    pub poly: RnsPoly<DEGREE>,
    pub scale: f64,
    pub slots: usize, // Number of encoded slots (determines decode output length)
}

impl<const DEGREE: usize> Plaintext<DEGREE> {
    pub fn level(&self) -> usize {
        self.poly.basis().channel_count() - 1
    }
}

/// CKKS ciphertext with exact scale tracking.
///
/// Decrypts as `c0 + c1 * s ≈ scale * m` modulo `q_0 * … * q_level`. Both
/// components are kept in NTT form over the context's level basis.
/// - `scale`: the exact factor the message is multiplied by; rescaling
///   divides it by the dropped prime `q_level`
/// - level: number of channels minus one; each rescale removes one
#[derive(Debug, Clone)]
pub struct Ciphertext<const DEGREE: usize> {
    pub c0: RnsPoly<DEGREE>,
    pub c1: RnsPoly<DEGREE>,
    pub scale: f64,
    pub slots: usize,
}

impl<const DEGREE: usize> Ciphertext<DEGREE> {
    /// Remaining multiplicative depth.
    pub fn level(&self) -> usize {
        self.c0.basis().channel_count() - 1
    }
}

/// The degree-2 product `(d0, d1, d2)` before relinearization; decrypts as
/// `d0 + d1 * s + d2 * s^2`.
#[derive(Debug, Clone)]
pub struct TensoredCiphertext<const DEGREE: usize> {
    pub d0: RnsPoly<DEGREE>,
    pub d1: RnsPoly<DEGREE>,
    pub d2: RnsPoly<DEGREE>,
    pub scale: f64,
    pub slots: usize,
}

impl<const DEGREE: usize> TensoredCiphertext<DEGREE> {
    pub fn level(&self) -> usize {
        self.d0.basis().channel_count() - 1
    }
}
