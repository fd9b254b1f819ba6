//! Symmetric RLWE secure-aggregation engine.
//!
//! Provides a Ring-Learning-With-Errors encryption scheme whose ciphertexts
//! and whose secret keys are both additively homomorphic: `N` clients each
//! encrypt a vector under their own key, a server sums the ciphertexts
//! without learning any individual input, and the holder of the summed key
//! recovers the sum of the plaintexts.
//!
//! The dependency order, leaves first, mirrors the module layout:
//! [`backend`] (Montgomery modular arithmetic) and [`random`] (seedable PRNG
//! streams) underlie [`ntt`] and [`poly`] (the ring and its transform),
//! which underlie [`sampling`] (uniform / centered-binomial / Gaussian
//! draws), which underlies [`key`] and [`ciphertext`], which underlie
//! [`rlwe`] (encrypt/decrypt), which [`engine`] orchestrates into the
//! chunked secure-aggregation flow.

pub mod backend;
pub mod ciphertext;
pub mod engine;
pub mod error;
pub mod key;
pub mod ntt;
pub mod params;
pub mod poly;
pub mod random;
pub mod rlwe;
pub mod sampling;

pub(crate) mod testutil;

pub use crate::backend::{ModInt, MontgomeryU128, MontgomeryU64};
pub use crate::ciphertext::{Ciphertext, CiphertextWire};
pub use crate::engine::SecAggEngine;
pub use crate::error::{Result, SecAggError};
pub use crate::key::SecretKey;
pub use crate::ntt::{Ntt, NttTable};
pub use crate::params::{ErrorParams, RingProfile};
pub use crate::poly::{Polynomial, Repr};
pub use crate::random::{ChaCha20Prng, HkdfPrng, SeedableStream};
