//! Error taxonomy for the secure-aggregation engine.
//!
//! Every fallible public operation returns [`SecAggError`]. Nothing is
//! recovered silently and no operation retries internally; a failure
//! propagates verbatim to the caller of the top-level engine operation.
//! The only conditions that panic instead of returning an error are
//! invariant violations confined to [`crate::backend`] construction (e.g. a
//! non-prime modulus), which indicate a bug rather than a runtime condition.

use thiserror::Error;

/// Distinct observable error kinds produced by this crate.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SecAggError {
    /// A parameter was out of range (variance too large, bad `log_t`,
    /// negative stddev, mismatched lengths, ...).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Two operands disagree on modulus, ring degree, or NTT tables.
    #[error("params mismatch: {0}")]
    ParamsMismatch(String),

    /// A polynomial was in the wrong representation (`Coeff` vs `Ntt`) for
    /// the requested operation.
    #[error("representation mismatch: {0}")]
    RepresentationMismatch(String),

    /// Two ciphertexts with different `power_of_s` tags were combined.
    #[error("power_of_s mismatch: expected {expected}, got {got}")]
    PowerOfSMismatch {
        /// `power_of_s` tag of the left-hand ciphertext.
        expected: u32,
        /// `power_of_s` tag of the right-hand ciphertext.
        got: u32,
    },

    /// The underlying PRNG failed, or a seed of the wrong length was given.
    #[error("prng error: {0}")]
    PrngError(String),

    /// The modulus does not fit the chosen integer width.
    #[error("overflow: {0}")]
    Overflow(String),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, SecAggError>;
