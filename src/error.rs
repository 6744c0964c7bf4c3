//! Error types for transaction construction and signing.
//!
//! Every variant aborts construction before an envelope exists, so a caller
//! never holds a partially signed transaction.

use thiserror::Error;

use crate::crypto::Scheme;
use crate::transaction::TxVersion;

/// Result alias used throughout the crate
pub type TxResult<T> = Result<T, TxError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TxError {
    /// Secret key bytes have the wrong length or are not a valid scalar
    #[error("invalid key format: {0}")]
    InvalidKeyFormat(String),

    /// Transaction version outside the supported wire layouts
    #[error("unsupported transaction version {0}")]
    UnsupportedVersion(u32),

    /// The signature primitive rejected its input
    #[error("signing failed: {0}")]
    SigningError(String),

    /// Height, chain id or nonce collaborator failed; safe to retry
    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("invalid signature: {0}")]
    InvalidSignature(String),

    /// Malformed or non-canonical wire bytes
    #[error("decode error: {0}")]
    Decode(String),

    #[error("scheme mismatch: expected {expected}, found {found}")]
    SchemeMismatch { expected: Scheme, found: Scheme },

    /// Chain id was resolved for a different wire layout than requested
    #[error("chain id is for version {found}, transaction requires version {expected}")]
    ChainMismatch { expected: TxVersion, found: TxVersion },

    #[error("configuration error: {0}")]
    Config(String),
}
