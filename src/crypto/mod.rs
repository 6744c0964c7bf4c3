// ============================================================================
// Crypto Module - Signature Schemes, Digests & Addresses
// ============================================================================
//
// CITA chains run one of two algorithm families, fixed when the chain is
// built. Both are exposed here behind the closed `Scheme` enum.
//
// Components:
//   - keys:   key material and address derivation
//   - signer: digest + signature over canonical transaction bytes
//
// ============================================================================

pub mod keys;
pub mod signer;

pub use keys::*;
pub use signer::*;

use serde::{Deserialize, Serialize};
use sha3::{Digest, Keccak256};
use std::fmt;
use std::str::FromStr;

use crate::error::{TxError, TxResult};

// ============================================================================
// CONSTANTS
// ============================================================================

/// Address length in bytes
pub const ADDRESS_LEN: usize = 20;

/// Digest length for both schemes
pub const HASH_LEN: usize = 32;

/// Key of the BLAKE2b-256 digest used by the ed25519 family
pub const BLAKE2B_KEY: &[u8; 16] = b"CryptapeCryptape";

/// secp256k1 signature: r (32) || s (32) || recovery id (1)
pub const SECP_SIGNATURE_LEN: usize = 65;

/// ed25519 signature (64) || public key (32)
pub const ED25519_SIGNATURE_LEN: usize = 96;

pub type Hash = [u8; HASH_LEN];

// ============================================================================
// SCHEME
// ============================================================================

/// Signature algorithm paired with its hash function
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Scheme {
    /// secp256k1 recoverable ECDSA over keccak-256
    Secp256k1Keccak,
    /// Ed25519 over keyed BLAKE2b-256
    Ed25519Blake2b,
}

impl Scheme {
    /// Map the legacy `newcrypto` switch onto a scheme
    pub fn from_newcrypto(newcrypto: bool) -> Self {
        if newcrypto {
            Scheme::Ed25519Blake2b
        } else {
            Scheme::Secp256k1Keccak
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Scheme::Secp256k1Keccak => "secp256k1-keccak",
            Scheme::Ed25519Blake2b => "ed25519-blake2b",
        }
    }

    /// Length of the signature bytes carried in an envelope
    pub fn signature_len(&self) -> usize {
        match self {
            Scheme::Secp256k1Keccak => SECP_SIGNATURE_LEN,
            Scheme::Ed25519Blake2b => ED25519_SIGNATURE_LEN,
        }
    }

    /// Identify the scheme of a decoded envelope by its signature length
    pub fn from_signature_len(len: usize) -> Option<Self> {
        match len {
            SECP_SIGNATURE_LEN => Some(Scheme::Secp256k1Keccak),
            ED25519_SIGNATURE_LEN => Some(Scheme::Ed25519Blake2b),
            _ => None,
        }
    }

    /// The digest function paired with this scheme
    pub fn digest(&self, bytes: &[u8]) -> Hash {
        match self {
            Scheme::Secp256k1Keccak => keccak256(bytes),
            Scheme::Ed25519Blake2b => blake2b_cryptape(bytes),
        }
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ============================================================================
// DIGESTS
// ============================================================================

pub fn keccak256(bytes: &[u8]) -> Hash {
    let mut hasher = Keccak256::new();
    hasher.update(bytes);
    hasher.finalize().into()
}

/// BLAKE2b-256 keyed with `CryptapeCryptape`
pub fn blake2b_cryptape(bytes: &[u8]) -> Hash {
    let hash = blake2b_simd::Params::new()
        .hash_length(HASH_LEN)
        .key(BLAKE2B_KEY)
        .hash(bytes);
    let mut out = [0u8; HASH_LEN];
    out.copy_from_slice(hash.as_bytes());
    out
}

// ============================================================================
// ADDRESS
// ============================================================================

/// 20-byte account address
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct Address([u8; ADDRESS_LEN]);

impl Address {
    pub const fn new(bytes: [u8; ADDRESS_LEN]) -> Self {
        Address(bytes)
    }

    pub fn from_slice(bytes: &[u8]) -> TxResult<Self> {
        let array: [u8; ADDRESS_LEN] = bytes.try_into().map_err(|_| {
            TxError::InvalidAddress(format!(
                "expected {} bytes, got {}",
                ADDRESS_LEN,
                bytes.len()
            ))
        })?;
        Ok(Address(array))
    }

    /// Take the trailing 20 bytes of a 32-byte digest
    pub fn from_hash(hash: &Hash) -> Self {
        let mut out = [0u8; ADDRESS_LEN];
        out.copy_from_slice(&hash[HASH_LEN - ADDRESS_LEN..]);
        Address(out)
    }

    pub fn as_bytes(&self) -> &[u8; ADDRESS_LEN] {
        &self.0
    }

    /// Lowercase hex without a `0x` prefix
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl FromStr for Address {
    type Err = TxError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(strip_hex_prefix(s.trim()))
            .map_err(|e| TxError::InvalidAddress(format!("{}: {}", s, e)))?;
        Address::from_slice(&bytes)
    }
}

impl From<[u8; ADDRESS_LEN]> for Address {
    fn from(bytes: [u8; ADDRESS_LEN]) -> Self {
        Address(bytes)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", self.to_hex())
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address(0x{})", self.to_hex())
    }
}

/// Strip an optional `0x` / `0X` prefix
pub fn strip_hex_prefix(s: &str) -> &str {
    s.strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s)
}

// ============================================================================
// TESTS
// ============================================================================
