//! Pseudorandom sampling over `R_q`: uniform ring elements, centered-binomial
//! error/key coefficients, and discrete-Gaussian coefficients.
//!
//! Every sampler here takes a PRNG by mutable reference and consumes a fixed
//! bit budget per coefficient, so results are fully determined by the PRNG's
//! seed.

use std::sync::Arc;

use crate::backend::ModInt;
use crate::error::{Result, SecAggError};
use crate::ntt::NttTable;
use crate::poly::{Polynomial, Repr};
use crate::random::SeedableStream;

/// Largest centered-binomial variance this crate will sample (`4 * 2^20`).
pub const MAX_VARIANCE: u32 = 4 * (1 << 20);

/// Uniform coefficient-form polynomial. Each coefficient is drawn by
/// concatenating `ceil(log2(q) / 64)` uniform 64-bit words into a wide
/// integer and reducing it mod `q`.
pub fn sample_uniform<B: ModInt, S: SeedableStream>(
    backend: &B,
    table: Arc<NttTable<B>>,
    prng: &mut S,
) -> Result<Polynomial<B>> {
    let n = table.ring_size();
    let words_needed = (backend.log_modulus() as usize).div_ceil(64).max(1);
    let mut values = Vec::with_capacity(n);
    for _ in 0..n {
        let mut acc: u128 = 0;
        for _ in 0..words_needed {
            acc = (acc << 64) | prng.rand64() as u128;
        }
        values.push(backend.import_int(acc));
    }
    Polynomial::from_values(values, Repr::Coeff, table)
}

/// Draw a running popcount over exactly `bits` uniform random bits: full
/// 64-bit words are consumed while `bits >= 64`; the remainder (1-63 bits) is
/// drawn a byte at a time and masked down to the exact bit count needed.
fn draw_popcount<S: SeedableStream>(prng: &mut S, mut bits: u32) -> u32 {
    let mut count = 0u32;
    while bits >= 64 {
        count += prng.rand64().count_ones();
        bits -= 64;
    }
    if bits > 0 {
        let full_bytes = (bits / 8) as usize;
        let has_partial = bits % 8 != 0;
        let total_bytes = full_bytes + if has_partial { 1 } else { 0 };
        let mut acc: u64 = 0;
        for i in 0..total_bytes {
            acc |= (prng.rand8() as u64) << (8 * i);
        }
        let mask = (1u64 << bits) - 1;
        count += (acc & mask).count_ones();
    }
    count
}

/// Centered-binomial coefficient-form polynomial of variance `v`: each
/// coefficient is `popcount(v bits) - popcount(next v bits)`, mean 0,
/// variance `v`. Negative values map to `q - |x|`.
///
/// # Errors
/// [`SecAggError::InvalidArgument`] if `variance > MAX_VARIANCE`.
pub fn sample_centered_binomial<B: ModInt, S: SeedableStream>(
    backend: &B,
    table: Arc<NttTable<B>>,
    variance: u32,
    prng: &mut S,
) -> Result<Polynomial<B>> {
    if variance > MAX_VARIANCE {
        return Err(SecAggError::InvalidArgument(format!(
            "variance {variance} exceeds MaxVariance {MAX_VARIANCE}"
        )));
    }
    let n = table.ring_size();
    let q = backend.modulus_u128();
    let mut values = Vec::with_capacity(n);
    for _ in 0..n {
        let a = draw_popcount(prng, variance) as i64;
        let b = draw_popcount(prng, variance) as i64;
        let diff = a - b;
        let reduced = if diff >= 0 {
            diff as u128
        } else {
            q - (-diff) as u128
        };
        values.push(backend.import_int(reduced));
    }
    Polynomial::from_values(values, Repr::Coeff, table)
}

/// Discrete-Gaussian coefficient-form polynomial of standard deviation
/// `stddev`, implemented as the centered-binomial sampler with `v =
/// round(stddev^2)` (the path the secure-aggregation flow actually takes).
///
/// # Errors
/// [`SecAggError::InvalidArgument`] if `stddev` is negative.
pub fn sample_gaussian<B: ModInt, S: SeedableStream>(
    backend: &B,
    table: Arc<NttTable<B>>,
    stddev: f64,
    prng: &mut S,
) -> Result<Polynomial<B>> {
    if stddev < 0.0 {
        return Err(SecAggError::InvalidArgument(
            "stddev must be non-negative".into(),
        ));
    }
    let variance = stddev.powi(2).round() as u32;
    sample_centered_binomial(backend, table, variance, prng)
}

/// Inversion-method discrete Gaussian over arbitrary `stddev`, via a
/// cumulative distribution table (CDT) truncated at `13 * stddev`. Not used
/// by the secure-aggregation flow (which fixes `stddev = 4.5` and takes the
/// centered-binomial path above); exposed for callers who explicitly need a
/// non-fixed-variance Gaussian.
///
/// # Errors
/// [`SecAggError::InvalidArgument`] if `stddev` is not strictly positive.
pub fn sample_gaussian_cdt<B: ModInt, S: SeedableStream>(
    backend: &B,
    table: Arc<NttTable<B>>,
    stddev: f64,
    prng: &mut S,
) -> Result<Polynomial<B>> {
    if !(stddev > 0.0) {
        return Err(SecAggError::InvalidArgument(
            "stddev must be strictly positive for the CDT sampler".into(),
        ));
    }
    let tail = (13.0 * stddev).ceil() as i64;
    let mut cdt = Vec::with_capacity((2 * tail + 1) as usize);
    let mut acc = 0.0f64;
    let denom = 2.0 * stddev * stddev;
    for x in -tail..=tail {
        acc += (-((x * x) as f64) / denom).exp();
        cdt.push(acc);
    }
    for p in cdt.iter_mut() {
        *p /= acc;
    }

    let n = table.ring_size();
    let q = backend.modulus_u128();
    let mut values = Vec::with_capacity(n);
    for _ in 0..n {
        let u = (prng.rand64() as f64) / (u64::MAX as f64 + 1.0);
        let idx = cdt.partition_point(|&p| p < u).min(cdt.len() - 1);
        let x = idx as i64 - tail;
        let reduced = if x >= 0 {
            x as u128
        } else {
            q - (-x) as u128
        };
        values.push(backend.import_int(reduced));
    }
    Polynomial::from_values(values, Repr::Coeff, table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MontgomeryU128;
    use crate::random::HkdfPrng;

    const Q: u128 = 604_462_909_807_314_587_443_201;
    const N: usize = 16;

    fn table() -> (MontgomeryU128, Arc<NttTable<MontgomeryU128>>) {
        let backend = MontgomeryU128::new(Q).unwrap();
        let table = Arc::new(NttTable::new(backend.clone(), N).unwrap());
        (backend, table)
    }

    #[test]
    fn uniform_is_deterministic_from_seed() {
        let (backend, table) = table();
        let mut p1 = HkdfPrng::create(&[1u8; 32]).unwrap();
        let mut p2 = HkdfPrng::create(&[1u8; 32]).unwrap();
        let a = sample_uniform(&backend, table.clone(), &mut p1).unwrap();
        let b = sample_uniform(&backend, table, &mut p2).unwrap();
        assert_eq!(a.values(), b.values());
    }

    #[test]
    fn centered_binomial_rejects_variance_too_large() {
        let (backend, table) = table();
        let mut prng = HkdfPrng::create(&[2u8; 32]).unwrap();
        assert!(sample_centered_binomial(&backend, table, MAX_VARIANCE + 1, &mut prng).is_err());
    }

    #[test]
    fn centered_binomial_values_are_small_norm() {
        let (backend, table) = table();
        let mut prng = HkdfPrng::create(&[3u8; 32]).unwrap();
        let variance = 20;
        let poly = sample_centered_binomial(&backend, table, variance, &mut prng).unwrap();
        for i in 0..N {
            let x = backend.export_int(poly.coefficient(i));
            let centered = if x > Q / 2 { x as i128 - Q as i128 } else { x as i128 };
            assert!(centered.unsigned_abs() <= variance as u128);
        }
    }

    #[test]
    fn gaussian_rejects_negative_stddev() {
        let (backend, table) = table();
        let mut prng = HkdfPrng::create(&[4u8; 32]).unwrap();
        assert!(sample_gaussian(&backend, table, -1.0, &mut prng).is_err());
    }

    #[test]
    fn gaussian_matches_centered_binomial_at_fixed_variance() {
        let (backend, table) = table();
        let mut p1 = HkdfPrng::create(&[5u8; 32]).unwrap();
        let mut p2 = HkdfPrng::create(&[5u8; 32]).unwrap();
        let a = sample_gaussian(&backend, table.clone(), 4.5, &mut p1).unwrap();
        let b = sample_centered_binomial(&backend, table, 20, &mut p2).unwrap();
        assert_eq!(a.values(), b.values());
    }

    #[test]
    fn cdt_sampler_rejects_non_positive_stddev() {
        let (backend, table) = table();
        let mut prng = HkdfPrng::create(&[6u8; 32]).unwrap();
        assert!(sample_gaussian_cdt(&backend, table, 0.0, &mut prng).is_err());
    }

    #[test]
    fn cdt_sampler_is_deterministic_from_seed() {
        let (backend, table) = table();
        let mut p1 = HkdfPrng::create(&[7u8; 32]).unwrap();
        let mut p2 = HkdfPrng::create(&[7u8; 32]).unwrap();
        let a = sample_gaussian_cdt(&backend, table.clone(), 3.0, &mut p1).unwrap();
        let b = sample_gaussian_cdt(&backend, table, 3.0, &mut p2).unwrap();
        assert_eq!(a.values(), b.values());
    }

    #[test]
    fn centered_binomial_mean_and_variance_match_theory() {
        // Property: for C >= 10^6 centered-binomial draws of variance v, the
        // empirical mean is within 3*sigma/sqrt(C) of 0 and the empirical
        // variance is within 10% of v.
        let (backend, table) = table();
        let mut prng = HkdfPrng::create(&[8u8; 32]).unwrap();
        let variance = 20u32;
        let rounds = 70_000;
        let mut samples = Vec::with_capacity(rounds * N);
        for _ in 0..rounds {
            let poly =
                sample_centered_binomial(&backend, table.clone(), variance, &mut prng).unwrap();
            for i in 0..N {
                let x = backend.export_int(poly.coefficient(i));
                let centered = if x > Q / 2 {
                    x as i128 - Q as i128
                } else {
                    x as i128
                };
                samples.push(centered as f64);
            }
        }

        let count = samples.len() as f64;
        let mean: f64 = samples.iter().sum::<f64>() / count;
        let var: f64 = samples.iter().map(|&x| (x - mean).powi(2)).sum::<f64>() / count;

        let sigma = (variance as f64).sqrt();
        let mean_tolerance = 3.0 * sigma / count.sqrt();
        assert!(
            mean.abs() <= mean_tolerance,
            "empirical mean {mean} exceeds tolerance {mean_tolerance}"
        );
        assert!(
            (var - variance as f64).abs() <= 0.10 * variance as f64,
            "empirical variance {var} not within 10% of {variance}"
        );
    }
}
