//! Symmetric RLWE encryption / decryption.

use std::sync::Arc;

use crate::backend::ModInt;
use crate::ciphertext::Ciphertext;
use crate::error::Result;
use crate::key::SecretKey;
use crate::ntt::NttTable;
use crate::params::ErrorParams;
use crate::poly::{Polynomial, Repr};
use crate::random::SeedableStream;
use crate::sampling::sample_centered_binomial;

/// Encrypt `m` (NTT form) under `key`, using the precomputed randomness `a`
/// (NTT form) and the plaintext-modulus scaling factor `t = 2^log_t + 1`.
///
/// `(c0, c1) = (a*s + t*e + m, -a)`, so that `c0 + c1*s = t*e + m`.
pub fn encrypt<B: ModInt, S: SeedableStream>(
    backend: &B,
    table: Arc<NttTable<B>>,
    key: &SecretKey<B>,
    m: &Polynomial<B>,
    a: &Polynomial<B>,
    error_params: &ErrorParams,
    log_t: u32,
    prng: &mut S,
) -> Result<Ciphertext<B>> {
    let e_coeff = sample_centered_binomial(backend, table.clone(), key.variance(), prng)?;
    let e = e_coeff.convert_to_ntt()?;

    let t = crate::params::plaintext_modulus(log_t);
    let t_elem = backend.import_int(t);
    let t_e_values: Vec<B::Elem> = e.values().iter().map(|&x| backend.mul(x, t_elem)).collect();
    let t_e = Polynomial::from_values(t_e_values, Repr::Ntt, table.clone())?;

    let a_s = a.mul(key.key())?;
    let c0 = a_s.add(&t_e)?.add(m)?;
    let c1 = a.neg();

    Ciphertext::new(vec![c0, c1], 1, error_params.b_encryption, table)
}

/// Decrypt `ciphertext` under `key`, returning `input_size` plaintext
/// coefficients in `[0, t)`.
///
/// `d = c0 + c1*s` (higher components `c_i*s^i` for `i >= 2` would be added
/// here too, but the secure-aggregation flow never produces them).
pub fn decrypt<B: ModInt>(
    backend: &B,
    ciphertext: &Ciphertext<B>,
    key: &SecretKey<B>,
    log_t: u32,
) -> Result<Vec<u128>> {
    let c0 = ciphertext.component(0);
    let c1 = ciphertext.component(1);
    let c1_s = c1.mul(key.key())?;
    let d = c0.add(&c1_s)?;
    let d_coeff = d.inverse_ntt()?;

    let q = backend.modulus_u128();
    let half_q = q / 2;
    let t = crate::params::plaintext_modulus(log_t);

    let mut out = Vec::with_capacity(d_coeff.len());
    for i in 0..d_coeff.len() {
        let x = backend.export_int(d_coeff.coefficient(i));
        let centered = if x <= half_q {
            x as i128
        } else {
            x as i128 - q as i128
        };
        let plain = centered.rem_euclid(t as i128) as u128;
        out.push(plain);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MontgomeryU128;
    use crate::random::HkdfPrng;

    const Q: u128 = 604_462_909_807_314_587_443_201;
    const N: usize = 16;
    const VARIANCE: u32 = 20;
    const LOG_T: u32 = 11;

    fn setup() -> (MontgomeryU128, Arc<NttTable<MontgomeryU128>>, ErrorParams) {
        let backend = MontgomeryU128::new(Q).unwrap();
        let table = Arc::new(NttTable::new(backend.clone(), N).unwrap());
        let error_params = ErrorParams::derive(LOG_T, 4.5, N, backend.log_modulus());
        (backend, table, error_params)
    }

    fn plaintext_poly(
        backend: &MontgomeryU128,
        table: Arc<NttTable<MontgomeryU128>>,
        coeffs: &[u128],
    ) -> Polynomial<MontgomeryU128> {
        let values = coeffs.iter().map(|&x| backend.import_int(x)).collect();
        Polynomial::from_values(values, Repr::Coeff, table)
            .unwrap()
            .convert_to_ntt()
            .unwrap()
    }

    #[test]
    fn encrypt_decrypt_is_identity() {
        let (backend, table, error_params) = setup();
        let mut prng = HkdfPrng::create(&[1u8; 32]).unwrap();
        let key = SecretKey::sample(&backend, table.clone(), VARIANCE, LOG_T, &mut prng).unwrap();
        let a = crate::sampling::sample_uniform(&backend, table.clone(), &mut prng)
            .unwrap()
            .convert_to_ntt()
            .unwrap();

        let t = crate::params::plaintext_modulus(LOG_T);
        let msg_coeffs: Vec<u128> = (0..N as u128).map(|x| x % t).collect();
        let m = plaintext_poly(&backend, table.clone(), &msg_coeffs);

        let ct = encrypt(
            &backend,
            table.clone(),
            &key,
            &m,
            &a,
            &error_params,
            LOG_T,
            &mut prng,
        )
        .unwrap();
        let decrypted = decrypt(&backend, &ct, &key, LOG_T).unwrap();
        assert_eq!(decrypted, msg_coeffs);
    }

    #[test]
    fn additive_homomorphism_holds() {
        let (backend, table, error_params) = setup();
        let mut prng = HkdfPrng::create(&[2u8; 32]).unwrap();
        let key1 = SecretKey::sample(&backend, table.clone(), VARIANCE, LOG_T, &mut prng).unwrap();
        let key2 = SecretKey::sample(&backend, table.clone(), VARIANCE, LOG_T, &mut prng).unwrap();
        let sum_key = key1.add(&key2).unwrap();
        let a = crate::sampling::sample_uniform(&backend, table.clone(), &mut prng)
            .unwrap()
            .convert_to_ntt()
            .unwrap();

        let t = crate::params::plaintext_modulus(LOG_T);
        let m1_coeffs: Vec<u128> = (0..N as u128).map(|x| x % t).collect();
        let m2_coeffs: Vec<u128> = (0..N as u128).map(|x| (x * 7 + 3) % t).collect();
        let m1 = plaintext_poly(&backend, table.clone(), &m1_coeffs);
        let m2 = plaintext_poly(&backend, table.clone(), &m2_coeffs);

        let ct1 = encrypt(
            &backend,
            table.clone(),
            &key1,
            &m1,
            &a,
            &error_params,
            LOG_T,
            &mut prng,
        )
        .unwrap();
        let ct2 = encrypt(
            &backend,
            table.clone(),
            &key2,
            &m2,
            &a,
            &error_params,
            LOG_T,
            &mut prng,
        )
        .unwrap();
        let sum_ct = ct1.add_in_place_fst(&ct2).unwrap();

        let decrypted = decrypt(&backend, &sum_ct, &sum_key, LOG_T).unwrap();
        let expected: Vec<u128> = m1_coeffs
            .iter()
            .zip(m2_coeffs.iter())
            .map(|(&a, &b)| (a + b) % t)
            .collect();
        assert_eq!(decrypted, expected);
    }
}
