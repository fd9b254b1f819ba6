//! Montgomery-form modular arithmetic.
//!
//! `ModInt` is the capability set every ring operation is built against:
//! import/export to and from Montgomery form, add/sub/neg/mul, and a batch
//! reduction helper. Two concrete, monomorphized backends implement it —
//! [`MontgomeryU64`] for moduli that fit a 64-bit word (128-bit
//! intermediates) and [`MontgomeryU128`] for the wider 80-bit-class moduli
//! this crate's fixed parameter sets actually use (256-bit-equivalent
//! intermediates, built from 128-bit half-multiplies). There is no trait
//! object anywhere on the hot path: `Polynomial<B>`, `NttTable<B>` and
//! friends are monomorphized over whichever backend a given `ModulusParams`
//! picks.

use std::fmt::Debug;

use crate::error::{Result, SecAggError};

/// Capability set for Montgomery-form modular arithmetic over a fixed prime
/// `q`. All operations are constant-time with respect to values: branching,
/// where present, depends only on `q`'s bit width, never on the operands.
pub trait ModInt: Clone + Debug {
    /// The Montgomery-form residue type (`u64` or `u128`).
    type Elem: Copy + Clone + Debug + Default + PartialEq + Eq + Send + Sync + 'static;

    /// Bit width of the backing integer (64 or 128).
    const WIDTH_BITS: u32;

    /// Build a Montgomery context for modulus `q`.
    ///
    /// # Errors
    /// [`SecAggError::Overflow`] if `q` does not fit the backend's width.
    /// [`SecAggError::InvalidArgument`] if `q` is even or not a valid
    /// modulus.
    fn new(q: u128) -> Result<Self>
    where
        Self: Sized;

    /// The modulus `q`, as a plain (non-Montgomery) integer.
    fn modulus_u128(&self) -> u128;

    /// `log2(q)`, rounded up.
    fn log_modulus(&self) -> u32;

    /// Reduce `x` mod `q` and lift into Montgomery form. Takes `u128` so
    /// that values up to the widest backend's modulus (e.g. the 80-bit
    /// `MODULUS_80` profile) can be imported without truncation, even on
    /// the narrower `MontgomeryU64` backend.
    fn import_int(&self, x: u128) -> Self::Elem;

    /// Montgomery-reduce `a` back to the plain range `[0, q)`.
    fn export_int(&self, a: Self::Elem) -> u128;

    /// `a + b mod q`, operands and result in Montgomery form.
    fn add(&self, a: Self::Elem, b: Self::Elem) -> Self::Elem;

    /// `a - b mod q`, operands and result in Montgomery form.
    fn sub(&self, a: Self::Elem, b: Self::Elem) -> Self::Elem;

    /// `-a mod q`, operand and result in Montgomery form.
    fn neg(&self, a: Self::Elem) -> Self::Elem;

    /// Montgomery multiplication: `a * b * R^-1 mod q`.
    fn mul(&self, a: Self::Elem, b: Self::Elem) -> Self::Elem;

    /// The additive identity in Montgomery form.
    fn zero(&self) -> Self::Elem;

    /// Amortized reduction of a batch of raw (non-Montgomery) values into
    /// Montgomery form.
    fn batch_reduce(&self, xs: &[u128]) -> Vec<Self::Elem> {
        xs.iter().map(|&x| self.import_int(x)).collect()
    }
}

#[inline(always)]
fn mul_u128_wide(a: u128, b: u128) -> (u128, u128) {
    let a_lo = a as u64 as u128;
    let a_hi = (a >> 64) as u64 as u128;
    let b_lo = b as u64 as u128;
    let b_hi = (b >> 64) as u64 as u128;

    let lo_lo = a_lo * b_lo;
    let lo_hi = a_lo * b_hi;
    let hi_lo = a_hi * b_lo;
    let hi_hi = a_hi * b_hi;

    let mid = (lo_lo >> 64) + (lo_hi as u64 as u128) + (hi_lo as u64 as u128);
    let lo = (lo_lo as u64 as u128) | (mid << 64);
    let hi = hi_hi + (lo_hi >> 64) + (hi_lo >> 64) + (mid >> 64);
    (lo, hi)
}

pub(crate) fn is_probably_prime(n: u128) -> bool {
    if n < 2 {
        return false;
    }
    if n % 2 == 0 {
        return n == 2;
    }
    // Deterministic Miller-Rabin witnesses sufficient for all n < 3.3*10^24,
    // comfortably covering our 64/128-bit moduli in practice for the sizes
    // this crate actually instantiates (<= ~80 bits).
    let witnesses: [u128; 13] = [
        2, 3, 5, 7, 11, 13, 17, 19, 23, 29, 31, 37, 41,
    ];
    let mut d = n - 1;
    let mut r = 0u32;
    while d % 2 == 0 {
        d /= 2;
        r += 1;
    }
    'witness: for &a in witnesses.iter() {
        if a >= n {
            continue;
        }
        let mut x = mod_pow_u128(a, d, n);
        if x == 1 || x == n - 1 {
            continue;
        }
        for _ in 0..r.saturating_sub(1) {
            x = mulmod_u128(x, x, n);
            if x == n - 1 {
                continue 'witness;
            }
        }
        return false;
    }
    true
}

pub(crate) fn mulmod_u128(a: u128, b: u128, m: u128) -> u128 {
    let (lo, hi) = mul_u128_wide(a, b);
    if hi == 0 {
        lo % m
    } else {
        // Fallback long division for the rare 256-bit product; used only in
        // primality testing at construction time, never on the hot path.
        let mut rem: u128 = 0;
        for i in (0..128).rev() {
            rem = rem.wrapping_shl(1) | ((hi >> i) & 1);
            if rem >= m {
                rem -= m;
            }
        }
        for i in (0..128).rev() {
            rem = rem.wrapping_shl(1) | ((lo >> i) & 1);
            if rem >= m {
                rem -= m;
            }
        }
        rem
    }
}

pub(crate) fn mod_pow_u128(mut base: u128, mut exp: u128, m: u128) -> u128 {
    let mut result = 1u128 % m;
    base %= m;
    while exp > 0 {
        if exp & 1 == 1 {
            result = mulmod_u128(result, base, m);
        }
        base = mulmod_u128(base, base, m);
        exp >>= 1;
    }
    result
}

fn check_modulus(q: u128, max_bits: u32) -> Result<()> {
    if q % 2 == 0 {
        return Err(SecAggError::InvalidArgument(format!(
            "modulus {q} must be odd"
        )));
    }
    let bits = 128 - q.leading_zeros();
    if bits > max_bits {
        return Err(SecAggError::Overflow(format!(
            "modulus {q} needs {bits} bits, backend width is {max_bits}"
        )));
    }
    if !is_probably_prime(q) {
        return Err(SecAggError::InvalidArgument(format!(
            "modulus {q} is not prime"
        )));
    }
    Ok(())
}

/// Montgomery-form arithmetic with a 64-bit backing word (128-bit
/// intermediates).
#[derive(Clone, Debug)]
pub struct MontgomeryU64 {
    q: u64,
    q_inv_neg: u64, // -q^-1 mod 2^64
    r2: u64,        // R^2 mod q, R = 2^64
    log_q: u32,
}

impl MontgomeryU64 {
    /// REDC over a 128-bit intermediate `t = hi * 2^64 + lo`, `t < q * 2^64`.
    #[inline(always)]
    fn redc_wide(&self, t: u128) -> u64 {
        let lo = t as u64;
        let m = lo.wrapping_mul(self.q_inv_neg);
        let mn = (m as u128) * (self.q as u128);
        let result = ((t + mn) >> 64) as u64;
        if result >= self.q {
            result - self.q
        } else {
            result
        }
    }
}

impl ModInt for MontgomeryU64 {
    type Elem = u64;
    const WIDTH_BITS: u32 = 64;

    fn new(q: u128) -> Result<Self> {
        check_modulus(q, 64)?;
        let q = q as u64;
        let r2 = (((1u128 << 64) % q as u128) * ((1u128 << 64) % q as u128) % q as u128) as u64;
        let mut inv: u64 = 1;
        for _ in 0..6 {
            inv = inv.wrapping_mul(2u64.wrapping_sub(q.wrapping_mul(inv)));
        }
        let q_inv_neg = inv.wrapping_neg();
        let log_q = 64 - q.leading_zeros();
        Ok(Self {
            q,
            q_inv_neg,
            r2,
            log_q,
        })
    }

    fn modulus_u128(&self) -> u128 {
        self.q as u128
    }

    fn log_modulus(&self) -> u32 {
        self.log_q
    }

    fn import_int(&self, x: u128) -> u64 {
        let x = (x % self.q as u128) as u64;
        self.mul(x, self.r2)
    }

    fn export_int(&self, a: u64) -> u128 {
        self.redc_wide(a as u128) as u128
    }

    fn add(&self, a: u64, b: u64) -> u64 {
        let (sum, carry) = a.overflowing_add(b);
        if carry || sum >= self.q {
            sum.wrapping_sub(self.q)
        } else {
            sum
        }
    }

    fn sub(&self, a: u64, b: u64) -> u64 {
        if a >= b {
            a - b
        } else {
            self.q - (b - a)
        }
    }

    fn neg(&self, a: u64) -> u64 {
        if a == 0 {
            0
        } else {
            self.q - a
        }
    }

    fn mul(&self, a: u64, b: u64) -> u64 {
        let t = (a as u128) * (b as u128);
        self.redc_wide(t)
    }

    fn zero(&self) -> u64 {
        0
    }
}

/// Montgomery-form arithmetic with a 128-bit backing word
/// (256-bit-equivalent intermediates). This is the backend the fixed
/// 80-bit `kModulus80` secure-aggregation profile uses.
#[derive(Clone, Debug)]
pub struct MontgomeryU128 {
    q: u128,
    q_inv_neg: u128, // -q^-1 mod 2^128
    r2: u128,        // R^2 mod q, R = 2^128
    log_q: u32,
}

impl MontgomeryU128 {
    #[inline(always)]
    fn redc(&self, t_lo: u128, t_hi: u128) -> u128 {
        let m = t_lo.wrapping_mul(self.q_inv_neg);
        let (mn_lo, mn_hi) = mul_u128_wide(m, self.q);
        let (_sum_lo, carry) = t_lo.overflowing_add(mn_lo);
        let result = t_hi.wrapping_add(mn_hi).wrapping_add(carry as u128);
        if result >= self.q {
            result - self.q
        } else {
            result
        }
    }
}

impl ModInt for MontgomeryU128 {
    type Elem = u128;
    const WIDTH_BITS: u32 = 128;

    fn new(q: u128) -> Result<Self> {
        check_modulus(q, 128)?;
        // n' = -n^-1 mod 2^128 via Newton-Raphson (q odd => q^-1 mod 2 = 1).
        let mut inv: u128 = 1;
        for _ in 0..7 {
            inv = inv.wrapping_mul(2u128.wrapping_sub(q.wrapping_mul(inv)));
        }
        let q_inv_neg = inv.wrapping_neg();

        // R^2 mod q, R = 2^128. Computed directly via modular exponentiation
        // (2^256 mod q) rather than by doubling R mod q and squaring, which
        // would overflow u128 when R mod q's top bit is set.
        let r2 = mod_pow_u128(2, 256, q);

        Ok(Self {
            q,
            q_inv_neg,
            r2,
            log_q: 128 - q.leading_zeros(),
        })
    }

    fn modulus_u128(&self) -> u128 {
        self.q
    }

    fn log_modulus(&self) -> u32 {
        self.log_q
    }

    fn import_int(&self, x: u128) -> u128 {
        let x = x % self.q;
        self.mul(x, self.r2)
    }

    fn export_int(&self, a: u128) -> u128 {
        self.redc(a, 0)
    }

    fn add(&self, a: u128, b: u128) -> u128 {
        let (sum, carry) = a.overflowing_add(b);
        if carry || sum >= self.q {
            sum.wrapping_sub(self.q)
        } else {
            sum
        }
    }

    fn sub(&self, a: u128, b: u128) -> u128 {
        if a >= b {
            a - b
        } else {
            self.q - (b - a)
        }
    }

    fn neg(&self, a: u128) -> u128 {
        if a == 0 {
            0
        } else {
            self.q - a
        }
    }

    fn mul(&self, a: u128, b: u128) -> u128 {
        let (lo, hi) = mul_u128_wide(a, b);
        self.redc(lo, hi)
    }

    fn zero(&self) -> u128 {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn montgomery_u64_roundtrip() {
        let q = (1u64 << 32) - 5; // not a real RLWE modulus, just odd & prime-ish for the test
        // Use a known small prime instead to keep is_probably_prime happy.
        let q = 12289u64;
        let m = MontgomeryU64::new(q as u128).unwrap();
        for x in [0u128, 1, 5, 12288, 6000] {
            let a = m.import_int(x);
            assert_eq!(m.export_int(a), x % q as u128);
        }
    }

    #[test]
    fn montgomery_u64_arith_matches_plain() {
        let q = 12289u64;
        let m = MontgomeryU64::new(q as u128).unwrap();
        let (a, b) = (100u128, 12000u128);
        let am = m.import_int(a);
        let bm = m.import_int(b);

        assert_eq!(m.export_int(m.add(am, bm)), (a + b) % q as u128);
        assert_eq!(m.export_int(m.mul(am, bm)), (a * b) % q as u128);
        let diff = if a >= b { a - b } else { a + q as u128 - b };
        assert_eq!(m.export_int(m.sub(am, bm)), diff % q as u128);
    }

    #[test]
    fn montgomery_u128_roundtrip_and_arith() {
        // Same 80-bit prime as `params::MODULUS_80` (q = k*4096 + 1, prime).
        let q: u128 = 604_462_909_807_314_587_443_201;
        let m = MontgomeryU128::new(q).unwrap();
        let a = 123456789012345u128;
        let b = 987654321098765u128;
        let am = m.import_int(a);
        let bm = m.import_int(b);
        assert_eq!(m.export_int(am), a % q);
        assert_eq!(m.export_int(m.mul(am, bm)), (a * b) % q);
        assert_eq!(m.export_int(m.add(am, bm)), (a + b) % q);
    }

    #[test]
    fn rejects_even_modulus() {
        assert!(MontgomeryU64::new(100).is_err());
    }

    #[test]
    fn rejects_oversized_modulus_for_u64_backend() {
        assert!(MontgomeryU64::new(1u128 << 70).is_err());
    }
}
