//! RLWE ciphertexts: `(c0, c1)` pairs in NTT form, plus tracked modulus,
//! noise bound, and `power_of_s` tag.

use std::sync::Arc;

use itertools::izip;
use serde::{Deserialize, Serialize};

use crate::backend::ModInt;
use crate::error::{Result, SecAggError};
use crate::ntt::NttTable;
use crate::poly::{Polynomial, Repr};

/// Plain-integer wire format for a [`Ciphertext`], used to move it across a
/// process boundary without pulling in a protocol-buffer-style format. Each
/// component's coefficients are Montgomery-exported to `[0, q)` integers;
/// reconstructing requires the `NttTable` the original ciphertext was built
/// over.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CiphertextWire {
    /// One coefficient vector (length `N`, values in `[0, q)`) per component.
    pub components: Vec<Vec<u128>>,
    /// `power_of_s` tag, carried verbatim.
    pub power_of_s: u32,
    /// Noise bound, carried verbatim.
    pub error_bound: f64,
}

/// A ciphertext `(c0, c1, ..., power_of_s, error_bound)`. The
/// secure-aggregation flow never multiplies, relinearizes, or applies
/// `substitute`, so `components.len()` stays at 2 and `power_of_s` stays at 1
/// everywhere this crate produces a ciphertext.
#[derive(Clone, Debug)]
pub struct Ciphertext<B: ModInt> {
    components: Vec<Polynomial<B>>,
    power_of_s: u32,
    error_bound: f64,
    table: Arc<NttTable<B>>,
}

impl<B: ModInt> Ciphertext<B> {
    /// Build a ciphertext from its NTT-form components.
    ///
    /// # Errors
    /// [`SecAggError::InvalidArgument`] if fewer than 2 components are given.
    /// [`SecAggError::RepresentationMismatch`] if any component is not in
    /// NTT form.
    /// [`SecAggError::ParamsMismatch`] if components disagree on length.
    pub fn new(
        components: Vec<Polynomial<B>>,
        power_of_s: u32,
        error_bound: f64,
        table: Arc<NttTable<B>>,
    ) -> Result<Self> {
        if components.len() < 2 {
            return Err(SecAggError::InvalidArgument(
                "a ciphertext needs at least 2 components".into(),
            ));
        }
        for c in &components {
            if c.repr() != Repr::Ntt {
                return Err(SecAggError::RepresentationMismatch(
                    "ciphertext components must be in NTT form".into(),
                ));
            }
            if c.len() != table.ring_size() {
                return Err(SecAggError::ParamsMismatch(format!(
                    "component length {} does not match ring size {}",
                    c.len(),
                    table.ring_size()
                )));
            }
        }
        Ok(Self {
            components,
            power_of_s,
            error_bound,
            table,
        })
    }

    /// `i`-th component polynomial.
    pub fn component(&self, i: usize) -> &Polynomial<B> {
        &self.components[i]
    }

    /// Number of components (always 2 in this crate's flow).
    pub fn len(&self) -> usize {
        self.components.len()
    }

    /// Whether this ciphertext has zero components (never true for a
    /// well-formed instance).
    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// `log2(q)`.
    pub fn log_modulus(&self) -> u32 {
        self.table.backend().log_modulus()
    }

    /// Ring degree `N`.
    pub fn num_coeffs(&self) -> usize {
        self.table.ring_size()
    }

    /// Key-power tag (always 1 in this system).
    pub fn power_of_s(&self) -> u32 {
        self.power_of_s
    }

    /// Informational noise bound; not consulted for correctness.
    pub fn error(&self) -> f64 {
        self.error_bound
    }

    pub(crate) fn table(&self) -> &Arc<NttTable<B>> {
        &self.table
    }

    /// `(c0+other.c0, c1+other.c1)`, same `power_of_s`, `error_bound` summed.
    /// Despite the name, returns a new ciphertext rather than mutating
    /// `self`.
    ///
    /// # Errors
    /// [`SecAggError::ParamsMismatch`] if component counts or length differ.
    /// [`SecAggError::PowerOfSMismatch`] if `power_of_s` tags differ.
    pub fn add_in_place_fst(&self, other: &Self) -> Result<Self> {
        if self.power_of_s != other.power_of_s {
            return Err(SecAggError::PowerOfSMismatch {
                expected: self.power_of_s,
                got: other.power_of_s,
            });
        }
        if self.components.len() != other.components.len() {
            return Err(SecAggError::ParamsMismatch(format!(
                "component count mismatch: {} vs {}",
                self.components.len(),
                other.components.len()
            )));
        }
        let components = izip!(self.components.iter(), other.components.iter())
            .map(|(a, b)| a.add(b))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            components,
            power_of_s: self.power_of_s,
            error_bound: self.error_bound + other.error_bound,
            table: self.table.clone(),
        })
    }

    /// Export to the plain-integer [`CiphertextWire`] format.
    pub fn to_wire(&self) -> CiphertextWire {
        let backend = self.table.backend();
        let components = self
            .components
            .iter()
            .map(|p| p.values().iter().map(|&x| backend.export_int(x)).collect())
            .collect();
        CiphertextWire {
            components,
            power_of_s: self.power_of_s,
            error_bound: self.error_bound,
        }
    }

    /// Reconstruct from a [`CiphertextWire`] over the given `table`.
    ///
    /// # Errors
    /// Same as [`Ciphertext::new`]: fewer than 2 components, or a component
    /// whose length disagrees with `table`'s ring size.
    pub fn from_wire(wire: &CiphertextWire, table: Arc<NttTable<B>>) -> Result<Self> {
        let backend = table.backend();
        let components = wire
            .components
            .iter()
            .map(|c| {
                let values = c.iter().map(|&x| backend.import_int(x)).collect();
                Polynomial::from_values(values, Repr::Ntt, table.clone())
            })
            .collect::<Result<Vec<_>>>()?;
        Ciphertext::new(components, wire.power_of_s, wire.error_bound, table)
    }
}
