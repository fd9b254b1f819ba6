//! Fixed numeric parameter profiles.
//!
//! Every constant here is baked into [`crate::engine::SecAggEngine::new`]
//! rather than threaded through its signature: there is no host process to
//! source configuration from, so named constants are the whole configuration
//! surface.

use std::sync::Arc;

use crate::backend::{ModInt, MontgomeryU128};
use crate::error::{Result, SecAggError};
use crate::ntt::NttTable;

/// Ring degree `N` for both the primary and key-serialization profiles.
pub const RING_SIZE: usize = 2048;

/// `log2(RING_SIZE)`.
pub const LOG_RING_SIZE: u32 = 11;

/// The fixed 80-bit secure-aggregation modulus (`q ≡ 1 mod 4096`, prime).
pub const MODULUS_80: u128 = 604_462_909_807_314_587_443_201;

/// Default standard deviation of the RLWE error distribution.
pub const STDDEV: f64 = 4.5;

/// The NewHope modulus, used only for the key-serialization channel.
pub const NEWHOPE_MODULUS: u128 = 12289;

/// `log2(t_p - 1)` for the NewHope plaintext modulus `t_p = 2^9 + 1`.
pub const NEWHOPE_LOG_T: u32 = 9;

/// Bounds derived from `(log_t, variance, N, q)`, tracked for diagnostics
/// only; never consulted for correctness.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ErrorParams {
    /// `t * sqrt(3N)`.
    pub b_plaintext: f64,
    /// `t * sqrt(N) * (sqrt(3) + 6*sigma)`.
    pub b_encryption: f64,
    /// Scale bound for modulus-switching analysis (unused by this crate's
    /// fixed-modulus flow but computed for completeness).
    pub b_scale: f64,
}

impl ErrorParams {
    /// Derive error bounds for plaintext modulus `t = 2^log_t + 1`, error
    /// standard deviation `sigma`, ring degree `n`, and ciphertext modulus
    /// `log_q`.
    pub fn derive(log_t: u32, sigma: f64, n: usize, log_q: u32) -> Self {
        let t = plaintext_modulus(log_t) as f64;
        let n_f = n as f64;
        let b_plaintext = t * (3.0 * n_f).sqrt();
        let b_encryption = t * n_f.sqrt() * (3.0f64.sqrt() + 6.0 * sigma);
        let b_scale = t * n_f.sqrt() * (log_q as f64).sqrt();
        Self {
            b_plaintext,
            b_encryption,
            b_scale,
        }
    }
}

/// Canonical plaintext modulus `t = 2^log_t + 1` (not `2^log_t`).
pub fn plaintext_modulus(log_t: u32) -> u128 {
    (1u128 << log_t) + 1
}

/// A fully built `(backend, NTT table, ErrorParams)` profile for one modulus.
#[derive(Clone)]
pub struct RingProfile<B: ModInt> {
    pub backend: B,
    pub table: Arc<NttTable<B>>,
    pub error_params: ErrorParams,
}

impl<B: ModInt> RingProfile<B> {
    pub fn build(backend: B, n: usize, log_t: u32, sigma: f64) -> Result<Self> {
        let log_q = backend.log_modulus();
        let table = Arc::new(NttTable::new(backend.clone(), n)?);
        let error_params = ErrorParams::derive(log_t, sigma, n, log_q);
        Ok(Self {
            backend,
            table,
            error_params,
        })
    }
}

/// Build the primary `(N=2048, MODULUS_80)` profile.
pub fn primary_profile(log_t: u32, sigma: f64) -> Result<RingProfile<MontgomeryU128>> {
    if log_t == 0 {
        return Err(SecAggError::InvalidArgument(
            "log_t must be strictly positive".into(),
        ));
    }
    let backend = MontgomeryU128::new(MODULUS_80)?;
    if log_t >= backend.log_modulus() - 1 {
        return Err(SecAggError::InvalidArgument(format!(
            "log_t {log_t} must be < log_q - 1 = {}",
            backend.log_modulus() - 1
        )));
    }
    RingProfile::build(backend, RING_SIZE, log_t, sigma)
}

/// Build the NewHope key-serialization profile.
pub fn newhope_profile(sigma: f64) -> Result<RingProfile<MontgomeryU128>> {
    let backend = MontgomeryU128::new(NEWHOPE_MODULUS)?;
    RingProfile::build(backend, RING_SIZE, NEWHOPE_LOG_T, sigma)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plaintext_modulus_is_power_plus_one() {
        assert_eq!(plaintext_modulus(11), 2049);
    }

    #[test]
    fn primary_profile_rejects_log_t_too_large() {
        assert!(primary_profile(200, STDDEV).is_err());
    }

    #[test]
    fn primary_profile_builds_with_canonical_constants() {
        let profile = primary_profile(11, STDDEV).unwrap();
        assert_eq!(profile.table.ring_size(), RING_SIZE);
        assert_eq!(profile.backend.modulus_u128(), MODULUS_80);
    }

    #[test]
    fn newhope_profile_builds() {
        let profile = newhope_profile(STDDEV).unwrap();
        assert_eq!(profile.backend.modulus_u128(), NEWHOPE_MODULUS);
    }
}
