//! Number-Theoretic Transform over `R_q = Z_q[X]/(X^N + 1)`.
//!
//! [`NttTable`] precomputes bit-reversed powers of a primitive `2N`-th root
//! of unity `psi` mod `q` (forward table) and of its inverse (inverse
//! table), plus `N^-1 mod q`, all stored in Montgomery form. [`Ntt::forward`]
//! runs the Cooley-Tukey decimation-in-time negacyclic transform in place;
//! [`Ntt::backward`] runs the matching inverse and rescales by `N^-1`.

use crate::backend::{mod_pow_u128, ModInt};
use crate::error::{Result, SecAggError};

/// Forward/inverse NTT over a fixed `(N, q)`.
pub trait Ntt {
    /// Element type (matches the associated `ModInt::Elem`).
    type Elem: Copy;

    /// In-place negacyclic forward transform: coefficient form -> evaluation
    /// (NTT) form.
    fn forward(&self, a: &mut [Self::Elem]) -> Result<()>;

    /// In-place inverse transform: evaluation (NTT) form -> coefficient
    /// form.
    fn backward(&self, a: &mut [Self::Elem]) -> Result<()>;

    /// Ring degree `N` this table was built for.
    fn ring_size(&self) -> usize;
}

/// Find a primitive `2N`-th root of unity mod `q`, `N` a power of two.
///
/// A value `psi` is a primitive `2N`-th root of unity iff `psi^N == q - 1`
/// (i.e. `-1 mod q`): since `2N` is a power of two, any element whose `N`th
/// power is `-1` has order exactly `2N` (its order divides `2N` but not `N`,
/// and the only divisors of a power of two that don't divide `N = 2N/2` are
/// `2N` itself).
pub fn find_primitive_2nth_root(q: u128, n: usize) -> Result<u128> {
    if !n.is_power_of_two() {
        return Err(SecAggError::InvalidArgument(format!(
            "ring degree {n} must be a power of two"
        )));
    }
    let two_n = 2 * n as u128;
    if (q - 1) % two_n != 0 {
        return Err(SecAggError::InvalidArgument(format!(
            "modulus {q} is not congruent to 1 mod {two_n}; no 2N-th root of unity exists"
        )));
    }
    let exp = (q - 1) / two_n;
    for g in 2u128..q {
        let psi = mod_pow_u128(g, exp, q);
        if psi == 0 {
            continue;
        }
        if mod_pow_u128(psi, n as u128, q) == q - 1 {
            return Ok(psi);
        }
    }
    Err(SecAggError::InvalidArgument(format!(
        "no primitive 2*{n}-th root of unity found mod {q}"
    )))
}

fn bit_reverse(mut x: usize, log_n: u32) -> usize {
    let mut r = 0usize;
    for _ in 0..log_n {
        r = (r << 1) | (x & 1);
        x >>= 1;
    }
    r
}

/// Precomputed twiddle tables for the forward and inverse NTT over a single
/// `(N, q)` pair. Built once, immutable thereafter.
#[derive(Clone, Debug)]
pub struct NttTable<B: ModInt> {
    backend: B,
    n: usize,
    log_n: u32,
    /// forward_twiddles[i] = psi^{br(i)} in Montgomery form, used by the
    /// Cooley-Tukey forward pass.
    forward_twiddles: Vec<B::Elem>,
    /// inverse_twiddles[i] = psi^{-br(i)} in Montgomery form.
    inverse_twiddles: Vec<B::Elem>,
    n_inv: B::Elem,
}

impl<B: ModInt> NttTable<B> {
    /// Build the forward/inverse twiddle tables for ring degree `n` over the
    /// modulus `backend` is built for.
    pub fn new(backend: B, n: usize) -> Result<Self> {
        if !n.is_power_of_two() || n == 0 {
            return Err(SecAggError::InvalidArgument(format!(
                "ring degree {n} must be a nonzero power of two"
            )));
        }
        let q = backend.modulus_u128();
        let log_n = n.trailing_zeros();
        let psi = find_primitive_2nth_root(q, n)?;
        let psi_inv = mod_pow_u128(psi, q - 2, q);

        let mut forward_twiddles = vec![B::Elem::default(); n];
        let mut inverse_twiddles = vec![B::Elem::default(); n];
        for i in 0..n {
            let br = bit_reverse(i, log_n);
            let pw = mod_pow_u128(psi, br as u128, q);
            let pw_inv = mod_pow_u128(psi_inv, br as u128, q);
            forward_twiddles[i] = backend.import_int(pw);
            inverse_twiddles[i] = backend.import_int(pw_inv);
        }

        let n_inv_plain = mod_pow_u128(n as u128, q - 2, q);
        let n_inv = backend.import_int(n_inv_plain);

        Ok(Self {
            backend,
            n,
            log_n,
            forward_twiddles,
            inverse_twiddles,
            n_inv,
        })
    }

    /// The backend used for arithmetic.
    pub fn backend(&self) -> &B {
        &self.backend
    }
}

impl<B: ModInt> Ntt for NttTable<B> {
    type Elem = B::Elem;

    fn forward(&self, a: &mut [B::Elem]) -> Result<()> {
        if a.len() != self.n {
            return Err(SecAggError::ParamsMismatch(format!(
                "expected length {}, got {}",
                self.n,
                a.len()
            )));
        }
        let n = self.n;
        let mut t = n;
        let mut m = 1usize;
        while m < n {
            t >>= 1;
            for i in 0..m {
                let twiddle = self.forward_twiddles[m + i];
                let j1 = 2 * i * t;
                let j2 = j1 + t;
                for j in j1..j2 {
                    let u = a[j];
                    let v = self.backend.mul(a[j + t], twiddle);
                    a[j] = self.backend.add(u, v);
                    a[j + t] = self.backend.sub(u, v);
                }
            }
            m <<= 1;
        }
        Ok(())
    }

    fn backward(&self, a: &mut [B::Elem]) -> Result<()> {
        if a.len() != self.n {
            return Err(SecAggError::ParamsMismatch(format!(
                "expected length {}, got {}",
                self.n,
                a.len()
            )));
        }
        let n = self.n;
        let mut t = 1usize;
        let mut m = n;
        while m > 1 {
            let mut j1 = 0usize;
            let h = m / 2;
            for i in 0..h {
                let twiddle = self.inverse_twiddles[h + i];
                let j2 = j1 + t;
                for j in j1..j2 {
                    let u = a[j];
                    let v = a[j + t];
                    a[j] = self.backend.add(u, v);
                    let diff = self.backend.sub(u, v);
                    a[j + t] = self.backend.mul(diff, twiddle);
                }
                j1 += 2 * t;
            }
            t <<= 1;
            m >>= 1;
        }
        for x in a.iter_mut() {
            *x = self.backend.mul(*x, self.n_inv);
        }
        Ok(())
    }

    fn ring_size(&self) -> usize {
        self.n
    }
}
