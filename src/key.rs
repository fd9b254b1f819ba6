//! RLWE secret keys: additively homomorphic, stored in NTT form, with
//! modulus-balanced conversion between two moduli for serialization.

use std::sync::Arc;

use crate::backend::ModInt;
use crate::error::{Result, SecAggError};
use crate::ntt::NttTable;
use crate::poly::{Polynomial, Repr};
use crate::random::SeedableStream;
use crate::sampling::sample_centered_binomial;

/// RLWE secret key `s`: an `R_q` element sampled from the error
/// distribution, stored in NTT form. Never mutated in place; [`SecretKey::add`]
/// returns a new key.
#[derive(Clone, Debug)]
pub struct SecretKey<B: ModInt> {
    key: Polynomial<B>,
    variance: u32,
    log_t: u32,
}

impl<B: ModInt> SecretKey<B> {
    /// Sample a fresh key: draw a centered-binomial coefficient vector of
    /// variance `variance`, store its NTT image.
    pub fn sample<S: SeedableStream>(
        backend: &B,
        table: Arc<NttTable<B>>,
        variance: u32,
        log_t: u32,
        prng: &mut S,
    ) -> Result<Self> {
        let coeffs = sample_centered_binomial(backend, table, variance, prng)?;
        let key = coeffs.convert_to_ntt()?;
        Ok(Self {
            key,
            variance,
            log_t,
        })
    }

    /// Wrap an externally supplied coefficient vector (interpreted mod `q`,
    /// already in Montgomery form) as a secret key by taking its NTT.
    pub fn create_from_coeffs(
        coeffs: Polynomial<B>,
        variance: u32,
        log_t: u32,
    ) -> Result<Self> {
        if coeffs.repr() != Repr::Coeff {
            return Err(SecAggError::RepresentationMismatch(
                "create_from_coeffs requires coefficient form".into(),
            ));
        }
        let key = coeffs.convert_to_ntt()?;
        Ok(Self {
            key,
            variance,
            log_t,
        })
    }

    /// The key's NTT-form polynomial.
    pub fn key(&self) -> &Polynomial<B> {
        &self.key
    }

    /// Variance of the error distribution this key was drawn from.
    pub fn variance(&self) -> u32 {
        self.variance
    }

    /// Plaintext bit-width this key is associated with.
    pub fn log_t(&self) -> u32 {
        self.log_t
    }

    /// Coordinatewise NTT-form addition: `k3.key = k1.key + k2.key mod q`.
    ///
    /// # Errors
    /// [`SecAggError::ParamsMismatch`] if `variance` or `log_t` differ
    /// between `self` and `other`.
    pub fn add(&self, other: &Self) -> Result<Self> {
        if self.variance != other.variance || self.log_t != other.log_t {
            return Err(SecAggError::ParamsMismatch(format!(
                "key params differ: (variance={}, log_t={}) vs (variance={}, log_t={})",
                self.variance, self.log_t, other.variance, other.log_t
            )));
        }
        let key = self.key.add(&other.key)?;
        Ok(Self {
            key,
            variance: self.variance,
            log_t: self.log_t,
        })
    }

    /// Modulus-balanced conversion `q -> p`: inverse-NTT to coefficient form,
    /// then lift each coefficient `c in [0, q)` to its centered representative
    /// `c' = c if c <= q/2 else c - q`, and reduce `c'` mod `p` into `[0, p)`.
    ///
    /// This is the canonical lift used so that small-norm keys survive the
    /// switch between two moduli; it must not be approximated.
    pub fn convert_key<P: ModInt>(
        &self,
        q_backend: &B,
        p_backend: &P,
        p_table: Arc<NttTable<P>>,
    ) -> Result<Vec<u128>> {
        let coeffs = self.key.inverse_ntt()?;
        let q = q_backend.modulus_u128();
        let half_q = q / 2;
        let p = p_backend.modulus_u128();
        let n = coeffs.len();
        if n != p_table.ring_size() {
            return Err(SecAggError::ParamsMismatch(format!(
                "ring size mismatch: key has {n}, target table has {}",
                p_table.ring_size()
            )));
        }
        let mut out = Vec::with_capacity(n);
        for i in 0..n {
            let c = q_backend.export_int(coeffs.coefficient(i));
            let centered = if c <= half_q {
                c as i128
            } else {
                c as i128 - q as i128
            };
            let reduced_p = centered.rem_euclid(p as i128) as u128;
            out.push(reduced_p);
        }
        Ok(out)
    }

    /// Inverse of [`SecretKey::convert_key`]: interpret `coeffs_mod_p` as
    /// centered representatives mod `p`, lift them to coefficients mod `q`,
    /// and take the NTT.
    pub fn create_key(
        coeffs_mod_p: &[u128],
        p: u128,
        q_backend: &B,
        q_table: Arc<NttTable<B>>,
        variance: u32,
        log_t: u32,
    ) -> Result<Self> {
        let q = q_backend.modulus_u128();
        let half_p = p / 2;
        let n = coeffs_mod_p.len();
        if n != q_table.ring_size() {
            return Err(SecAggError::ParamsMismatch(format!(
                "coefficient count {n} does not match ring size {}",
                q_table.ring_size()
            )));
        }
        let mut values = Vec::with_capacity(n);
        for &c in coeffs_mod_p {
            let lifted = if c <= half_p { c } else { q - (p - c) };
            values.push(q_backend.import_int(lifted));
        }
        let coeffs = Polynomial::from_values(values, Repr::Coeff, q_table)?;
        Self::create_from_coeffs(coeffs, variance, log_t)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MontgomeryU128;
    use crate::random::HkdfPrng;

    const Q: u128 = 604_462_909_807_314_587_443_201;
    const P: u128 = 12289;
    const N: usize = 16;
    const VARIANCE: u32 = 20;
    const LOG_T: u32 = 11;

    fn q_setup() -> (MontgomeryU128, Arc<NttTable<MontgomeryU128>>) {
        let backend = MontgomeryU128::new(Q).unwrap();
        let table = Arc::new(NttTable::new(backend.clone(), N).unwrap());
        (backend, table)
    }

    fn p_setup() -> (MontgomeryU128, Arc<NttTable<MontgomeryU128>>) {
        let backend = MontgomeryU128::new(P).unwrap();
        let table = Arc::new(NttTable::new(backend.clone(), N).unwrap());
        (backend, table)
    }

    #[test]
    fn add_rejects_mismatched_params() {
        let (q_backend, q_table) = q_setup();
        let mut prng = HkdfPrng::create(&[1u8; 32]).unwrap();
        let k1 = SecretKey::sample(&q_backend, q_table.clone(), VARIANCE, LOG_T, &mut prng).unwrap();
        let k2 = SecretKey::sample(&q_backend, q_table, VARIANCE + 1, LOG_T, &mut prng).unwrap();
        assert!(k1.add(&k2).is_err());
    }

    #[test]
    fn add_is_coordinatewise_in_ntt_form() {
        let (q_backend, q_table) = q_setup();
        let mut prng = HkdfPrng::create(&[2u8; 32]).unwrap();
        let k1 = SecretKey::sample(&q_backend, q_table.clone(), VARIANCE, LOG_T, &mut prng).unwrap();
        let k2 = SecretKey::sample(&q_backend, q_table, VARIANCE, LOG_T, &mut prng).unwrap();
        let sum = k1.add(&k2).unwrap();
        for i in 0..N {
            let expected = q_backend.add(k1.key().coefficient(i), k2.key().coefficient(i));
            assert_eq!(sum.key().coefficient(i), expected);
        }
    }

    #[test]
    fn convert_then_create_key_roundtrips() {
        let (q_backend, q_table) = q_setup();
        let (p_backend, p_table) = p_setup();
        let mut prng = HkdfPrng::create(&[3u8; 32]).unwrap();
        let key = SecretKey::sample(&q_backend, q_table.clone(), VARIANCE, LOG_T, &mut prng).unwrap();

        let coeffs_p = key.convert_key(&q_backend, &p_backend, p_table).unwrap();
        let reconstructed =
            SecretKey::create_key(&coeffs_p, P, &q_backend, q_table, VARIANCE, LOG_T).unwrap();

        assert_eq!(key.key().values(), reconstructed.key().values());
    }

    #[test]
    fn convert_key_commutes_with_add() {
        let (q_backend, q_table) = q_setup();
        let (p_backend, p_table) = p_setup();
        let mut prng = HkdfPrng::create(&[4u8; 32]).unwrap();
        let k1 = SecretKey::sample(&q_backend, q_table.clone(), VARIANCE, LOG_T, &mut prng).unwrap();
        let k2 = SecretKey::sample(&q_backend, q_table.clone(), VARIANCE, LOG_T, &mut prng).unwrap();
        let sum = k1.add(&k2).unwrap();

        let converted_sum = sum
            .convert_key(&q_backend, &p_backend, p_table.clone())
            .unwrap();
        let c1 = k1.convert_key(&q_backend, &p_backend, p_table.clone()).unwrap();
        let c2 = k2.convert_key(&q_backend, &p_backend, p_table).unwrap();
        let summed_converted: Vec<u128> = c1
            .iter()
            .zip(c2.iter())
            .map(|(&a, &b)| (a + b) % P)
            .collect();

        assert_eq!(converted_sum, summed_converted);
    }
}
