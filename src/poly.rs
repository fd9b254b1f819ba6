//! Ring elements of `R_q = Z_q[X]/(X^N + 1)`.
//!
//! A [`Polynomial`] carries an explicit representation tag rather than being
//! split into two distinct types: callers must convert between
//! [`Repr::Coeff`] and [`Repr::Ntt`] explicitly, and operations that require
//! a particular representation check it at the boundary.

use std::sync::Arc;

use itertools::izip;

use crate::backend::ModInt;
use crate::error::{Result, SecAggError};
use crate::ntt::{Ntt, NttTable};

/// Which representation a [`Polynomial`]'s coefficients are currently in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Repr {
    /// Coefficient form: `values[i]` is the coefficient of `X^i`.
    Coeff,
    /// Evaluation (NTT) form.
    Ntt,
}

/// A degree-`< N` ring element, tagged by representation, sharing an
/// [`NttTable`] with every other polynomial built over the same `(N, q)`.
#[derive(Clone, Debug)]
pub struct Polynomial<B: ModInt> {
    values: Vec<B::Elem>,
    repr: Repr,
    table: Arc<NttTable<B>>,
}

impl<B: ModInt> Polynomial<B> {
    /// Wrap `values` (already in Montgomery form) as a polynomial in the
    /// given representation.
    ///
    /// # Errors
    /// [`SecAggError::ParamsMismatch`] if `values.len() != table.ring_size()`.
    pub fn from_values(values: Vec<B::Elem>, repr: Repr, table: Arc<NttTable<B>>) -> Result<Self> {
        if values.len() != table.ring_size() {
            return Err(SecAggError::ParamsMismatch(format!(
                "expected {} coefficients, got {}",
                table.ring_size(),
                values.len()
            )));
        }
        Ok(Self {
            values,
            repr,
            table,
        })
    }

    /// Build a zero polynomial in coefficient form.
    pub fn zero(table: Arc<NttTable<B>>) -> Self {
        let n = table.ring_size();
        let backend = table.backend();
        Self {
            values: vec![backend.zero(); n],
            repr: Repr::Coeff,
            table,
        }
    }

    /// Current representation.
    pub fn repr(&self) -> Repr {
        self.repr
    }

    /// Ring degree `N`.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether this polynomial holds zero coefficients (always false for a
    /// well-formed instance; kept for parity with the index-accessor API).
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// `i`-th coefficient (Montgomery form), regardless of representation.
    pub fn coefficient(&self, i: usize) -> B::Elem {
        self.values[i]
    }

    /// Raw backing slice.
    pub fn values(&self) -> &[B::Elem] {
        &self.values
    }

    /// The backend these coefficients are reduced under.
    pub fn backend(&self) -> &B {
        self.table.backend()
    }

    /// The shared NTT table.
    pub fn table(&self) -> &Arc<NttTable<B>> {
        &self.table
    }

    fn check_compatible(&self, other: &Self) -> Result<()> {
        if self.len() != other.len() {
            return Err(SecAggError::ParamsMismatch(format!(
                "length mismatch: {} vs {}",
                self.len(),
                other.len()
            )));
        }
        if self.repr != other.repr {
            return Err(SecAggError::RepresentationMismatch(format!(
                "{:?} vs {:?}",
                self.repr, other.repr
            )));
        }
        Ok(())
    }

    /// Coordinatewise addition. Both operands must share representation and
    /// length.
    pub fn add(&self, other: &Self) -> Result<Self> {
        self.check_compatible(other)?;
        let backend = self.backend();
        let values = izip!(self.values.iter(), other.values.iter())
            .map(|(&a, &b)| backend.add(a, b))
            .collect();
        Ok(Self {
            values,
            repr: self.repr,
            table: self.table.clone(),
        })
    }

    /// Coordinatewise subtraction. Both operands must share representation
    /// and length.
    pub fn sub(&self, other: &Self) -> Result<Self> {
        self.check_compatible(other)?;
        let backend = self.backend();
        let values = izip!(self.values.iter(), other.values.iter())
            .map(|(&a, &b)| backend.sub(a, b))
            .collect();
        Ok(Self {
            values,
            repr: self.repr,
            table: self.table.clone(),
        })
    }

    /// Coordinatewise negation.
    pub fn neg(&self) -> Self {
        let backend = self.backend();
        let values = self.values.iter().map(|&a| backend.neg(a)).collect();
        Self {
            values,
            repr: self.repr,
            table: self.table.clone(),
        }
    }

    /// Ring multiplication. In NTT form this is a pointwise product. In
    /// coefficient form both operands are converted to NTT form first and the
    /// pointwise product is returned in NTT form.
    pub fn mul(&self, other: &Self) -> Result<Self> {
        self.check_compatible(other)?;
        if self.repr == Repr::Coeff {
            let lhs = self.convert_to_ntt()?;
            let rhs = other.convert_to_ntt()?;
            return lhs.mul(&rhs);
        }
        let backend = self.backend();
        let values = izip!(self.values.iter(), other.values.iter())
            .map(|(&a, &b)| backend.mul(a, b))
            .collect();
        Ok(Self {
            values,
            repr: Repr::Ntt,
            table: self.table.clone(),
        })
    }

    /// `X^k` substitution automorphism: `Sum c_j X^j -> Sum c_j X^{jk mod 2N}`.
    /// Only defined in coefficient form; `k` must be odd. Not reached by the
    /// secure-aggregation path (no Galois keys here) but kept for parity with
    /// the ring-level API the rest of the library expects.
    ///
    /// # Errors
    /// [`SecAggError::RepresentationMismatch`] if `self` is in NTT form.
    /// [`SecAggError::InvalidArgument`] if `k` is even.
    pub fn substitute(&self, k: usize) -> Result<Self> {
        if self.repr != Repr::Coeff {
            return Err(SecAggError::RepresentationMismatch(
                "substitute requires coefficient form".into(),
            ));
        }
        if k % 2 == 0 {
            return Err(SecAggError::InvalidArgument(format!(
                "substitution power {k} must be odd"
            )));
        }
        let n = self.len();
        let two_n = 2 * n;
        let backend = self.backend();
        let mut out = vec![backend.zero(); n];
        for j in 0..n {
            let dst = (j * k) % two_n;
            if dst < n {
                out[dst] = backend.add(out[dst], self.values[j]);
            } else {
                let idx = dst - n;
                out[idx] = backend.sub(out[idx], self.values[j]);
            }
        }
        Ok(Self {
            values: out,
            repr: Repr::Coeff,
            table: self.table.clone(),
        })
    }

    /// Forward NTT: coefficient form -> evaluation form.
    pub fn convert_to_ntt(&self) -> Result<Self> {
        if self.repr != Repr::Coeff {
            return Err(SecAggError::RepresentationMismatch(
                "convert_to_ntt requires coefficient form".into(),
            ));
        }
        let mut values = self.values.clone();
        self.table.forward(&mut values)?;
        Ok(Self {
            values,
            repr: Repr::Ntt,
            table: self.table.clone(),
        })
    }

    /// Inverse NTT: evaluation form -> coefficient form.
    pub fn inverse_ntt(&self) -> Result<Self> {
        if self.repr != Repr::Ntt {
            return Err(SecAggError::RepresentationMismatch(
                "inverse_ntt requires NTT form".into(),
            ));
        }
        let mut values = self.values.clone();
        self.table.backward(&mut values)?;
        Ok(Self {
            values,
            repr: Repr::Coeff,
            table: self.table.clone(),
        })
    }
}
