//! `SecAggEngine`: the secure-aggregation orchestrator.

use std::cell::RefCell;
use std::sync::Arc;

use crate::backend::{ModInt, MontgomeryU128};
use crate::ciphertext::Ciphertext;
use crate::error::{Result, SecAggError};
use crate::key::SecretKey;
use crate::ntt::NttTable;
use crate::params::{self, ErrorParams, RingProfile, STDDEV};
use crate::poly::{Polynomial, Repr};
use crate::random::{HkdfPrng, SeedableStream};
use crate::rlwe;
use crate::testutil::sample_plaintext_mt19937;

/// Orchestrates the whole secure-aggregation flow over the fixed `(N=2048,
/// MODULUS_80)` profile, with a second `(N=2048, NEWHOPE_MODULUS)` profile
/// used only for key serialization.
pub struct SecAggEngine {
    input_size: usize,
    log_t: u32,
    variance: u32,
    k_chunks: usize,
    seed: Vec<u8>,
    q_profile: RingProfile<MontgomeryU128>,
    p_profile: RingProfile<MontgomeryU128>,
    a_polys: Vec<Polynomial<MontgomeryU128>>,
    /// Continues on from wherever `a_i` sampling left the HKDF stream, so
    /// successive `encrypt` calls never reuse the bytes that produced `a_i`
    /// or each other's noise.
    prng: RefCell<HkdfPrng>,
}

impl SecAggEngine {
    /// Build an engine for plaintexts of length `input_size`, plaintext
    /// bit-width `log_t`, an optional explicit 32-byte seed (one is generated
    /// if not given), and an optional standard deviation (defaults to
    /// [`STDDEV`]).
    ///
    /// # Errors
    /// [`SecAggError::InvalidArgument`] if `input_size` is not a multiple of
    /// [`params::RING_SIZE`], if `log_t` is out of range, or if `stddev` is
    /// negative.
    pub fn new(
        input_size: usize,
        log_t: u32,
        seed: Option<Vec<u8>>,
        stddev: Option<f64>,
    ) -> Result<Self> {
        let sigma = stddev.unwrap_or(STDDEV);
        if sigma < 0.0 {
            return Err(SecAggError::InvalidArgument(
                "stddev must be non-negative".into(),
            ));
        }
        if input_size % params::RING_SIZE != 0 {
            return Err(SecAggError::InvalidArgument(format!(
                "input_size {input_size} must be a multiple of N = {}",
                params::RING_SIZE
            )));
        }
        let k_chunks = input_size / params::RING_SIZE;
        let variance = sigma.powi(2).round() as u32;

        let q_profile = params::primary_profile(log_t, sigma)?;
        let p_profile = params::newhope_profile(sigma)?;

        let seed = match seed {
            Some(s) => s,
            None => HkdfPrng::generate_seed(),
        };
        let mut prng = HkdfPrng::create(&seed)?;

        let mut a_polys = Vec::with_capacity(k_chunks);
        for _ in 0..k_chunks {
            let a = crate::sampling::sample_uniform(
                &q_profile.backend,
                q_profile.table.clone(),
                &mut prng,
            )?
            .convert_to_ntt()?;
            a_polys.push(a);
        }

        Ok(Self {
            input_size,
            log_t,
            variance,
            k_chunks,
            seed,
            q_profile,
            p_profile,
            a_polys,
            prng: RefCell::new(prng),
        })
    }

    /// The 32-byte HKDF seed driving `a_0,...,a_{K-1}`.
    pub fn get_seed(&self) -> &[u8] {
        &self.seed
    }

    /// Plaintext bit-width this engine was constructed with.
    pub fn log_t(&self) -> u32 {
        self.log_t
    }

    /// Expected plaintext length.
    pub fn input_size(&self) -> usize {
        self.input_size
    }

    /// Sample a fresh secret key over the primary `(N, MODULUS_80)` profile.
    pub fn sample_key(&self) -> Result<SecretKey<MontgomeryU128>> {
        let mut prng = HkdfPrng::create(&HkdfPrng::generate_seed())?;
        SecretKey::sample(
            &self.q_profile.backend,
            self.q_profile.table.clone(),
            self.variance,
            self.log_t,
            &mut prng,
        )
    }

    /// Reconstruct an aggregated key from its mod-`p` centered-representative
    /// serialization.
    pub fn create_key(&self, coeffs_mod_p: &[u128]) -> Result<SecretKey<MontgomeryU128>> {
        SecretKey::create_key(
            coeffs_mod_p,
            params::NEWHOPE_MODULUS,
            &self.q_profile.backend,
            self.q_profile.table.clone(),
            self.variance,
            self.log_t,
        )
    }

    /// Serialize `key` as coefficients mod `p` (centered-representative lift
    /// from `q` to `p`).
    pub fn convert_key(&self, key: &SecretKey<MontgomeryU128>) -> Result<Vec<u128>> {
        key.convert_key(
            &self.q_profile.backend,
            &self.p_profile.backend,
            self.p_profile.table.clone(),
        )
    }

    /// Deterministic test plaintext: `num_coeffs` integers in `[0,
    /// 2^log_t)`, from a Mersenne Twister seeded with 1.
    pub fn sample_plaintext(num_coeffs: usize, log_t: u32) -> Vec<u128> {
        sample_plaintext_mt19937(num_coeffs, log_t)
    }

    /// Encrypt `plaintext` (length must equal `input_size`) under `key`,
    /// producing one ciphertext per `N`-sized chunk.
    ///
    /// # Errors
    /// [`SecAggError::InvalidArgument`] if `plaintext.len() != input_size`.
    pub fn encrypt(
        &self,
        key: &SecretKey<MontgomeryU128>,
        plaintext: &[u128],
    ) -> Result<Vec<Ciphertext<MontgomeryU128>>> {
        if plaintext.len() != self.input_size {
            return Err(SecAggError::InvalidArgument(format!(
                "plaintext length {} does not match input_size {}",
                plaintext.len(),
                self.input_size
            )));
        }
        let backend = &self.q_profile.backend;
        let table = self.q_profile.table.clone();
        let error_params = &self.q_profile.error_params;
        let mut prng = self.prng.borrow_mut();

        let mut out = Vec::with_capacity(self.k_chunks);
        for (chunk_idx, chunk) in plaintext.chunks(params::RING_SIZE).enumerate() {
            let values: Vec<_> = chunk.iter().map(|&x| backend.import_int(x)).collect();
            let m = Polynomial::from_values(values, Repr::Coeff, table.clone())?.convert_to_ntt()?;
            let ct = rlwe::encrypt(
                backend,
                table.clone(),
                key,
                &m,
                &self.a_polys[chunk_idx],
                error_params,
                self.log_t,
                &mut *prng,
            )?;
            out.push(ct);
        }
        Ok(out)
    }

    /// Decrypt `ciphertexts` (one per chunk) under `key`, concatenating
    /// per-chunk decryptions into a flat plaintext vector.
    ///
    /// # Errors
    /// [`SecAggError::InvalidArgument`] if `ciphertexts.len() != K`.
    pub fn decrypt(
        &self,
        key: &SecretKey<MontgomeryU128>,
        ciphertexts: &[Ciphertext<MontgomeryU128>],
    ) -> Result<Vec<u128>> {
        if ciphertexts.len() != self.k_chunks {
            return Err(SecAggError::InvalidArgument(format!(
                "expected {} ciphertexts, got {}",
                self.k_chunks,
                ciphertexts.len()
            )));
        }
        let mut out = Vec::with_capacity(self.input_size);
        for ct in ciphertexts {
            let chunk = rlwe::decrypt(&self.q_profile.backend, ct, key, self.log_t)?;
            out.extend(chunk);
        }
        Ok(out)
    }

    /// Chunkwise ciphertext addition: `sum_chunks[i] += new_chunks[i]`.
    ///
    /// # Errors
    /// [`SecAggError::InvalidArgument`] if the two lists have different
    /// lengths.
    pub fn aggregate(
        &self,
        sum_chunks: &[Ciphertext<MontgomeryU128>],
        new_chunks: &[Ciphertext<MontgomeryU128>],
    ) -> Result<Vec<Ciphertext<MontgomeryU128>>> {
        if sum_chunks.len() != new_chunks.len() {
            return Err(SecAggError::InvalidArgument(format!(
                "mismatched ciphertext counts: {} vs {}",
                sum_chunks.len(),
                new_chunks.len()
            )));
        }
        sum_chunks
            .iter()
            .zip(new_chunks.iter())
            .map(|(a, b)| a.add_in_place_fst(b))
            .collect()
    }

    /// `k1 + k2`.
    pub fn sum_keys(
        &self,
        k1: &SecretKey<MontgomeryU128>,
        k2: &SecretKey<MontgomeryU128>,
    ) -> Result<SecretKey<MontgomeryU128>> {
        k1.add(k2)
    }

    pub(crate) fn error_params(&self) -> &ErrorParams {
        &self.q_profile.error_params
    }
}
