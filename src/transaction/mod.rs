// ============================================================================
// Transaction Module - Canonical Encoding & Envelopes
// ============================================================================
//
// A `CanonicalTransaction` is the scheme-independent record a sender signs.
// Its bytes are the CITA protobuf `Transaction` message: fields in tag
// order, default values omitted, so one logical value has one encoding.
//
// Components:
//   - proto:    wire messages
//   - envelope: signed, serialized and hashed outer record
//
// ============================================================================

pub mod envelope;
pub mod proto;

pub use envelope::*;

use prost::Message;
use std::fmt;
use std::str::FromStr;

use crate::crypto::{strip_hex_prefix, Address};
use crate::error::{TxError, TxResult};

// ============================================================================
// CONSTANTS
// ============================================================================

/// Blocks a signed transaction stays valid past the current height
pub const VALID_BLOCK_WINDOW: u64 = 88;

/// Width of `value` and of the v1 chain id
pub const U256_LEN: usize = 32;

/// Last block at which a transaction built at `current_height` is accepted
pub fn valid_until_block(current_height: u64) -> u64 {
    current_height.saturating_add(VALID_BLOCK_WINDOW)
}

// ============================================================================
// VERSION
// ============================================================================

/// Wire layout of a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TxVersion {
    /// `chain_id` as uint32, `to` as hex string
    V0,
    /// `chain_id_v1` as 32 bytes, `to_v1` as raw address bytes
    V1,
}

impl TxVersion {
    pub const LATEST: TxVersion = TxVersion::V1;

    pub fn as_u32(&self) -> u32 {
        match self {
            TxVersion::V0 => 0,
            TxVersion::V1 => 1,
        }
    }
}

impl TryFrom<u32> for TxVersion {
    type Error = TxError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(TxVersion::V0),
            1 => Ok(TxVersion::V1),
            other => Err(TxError::UnsupportedVersion(other)),
        }
    }
}

impl fmt::Display for TxVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_u32())
    }
}

// ============================================================================
// CHAIN SPEC
// ============================================================================

/// Chain id in the shape required by one wire version
///
/// Each variant owns exactly one encoder arm in `populate`, so the version
/// and the chain-id field can never disagree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChainSpec {
    V0 { chain_id: u32 },
    V1 { chain_id: [u8; U256_LEN] },
}

impl ChainSpec {
    /// Build the chain id for `version` from a numeric id
    pub fn for_version(version: TxVersion, chain_id: u64) -> TxResult<Self> {
        match version {
            TxVersion::V0 => {
                let chain_id = u32::try_from(chain_id).map_err(|_| {
                    TxError::Config(format!("chain id {} does not fit a v0 transaction", chain_id))
                })?;
                Ok(ChainSpec::V0 { chain_id })
            }
            TxVersion::V1 => Ok(ChainSpec::V1 {
                chain_id: Value::from(chain_id).to_be_bytes(),
            }),
        }
    }

    pub fn version(&self) -> TxVersion {
        match self {
            ChainSpec::V0 { .. } => TxVersion::V0,
            ChainSpec::V1 { .. } => TxVersion::V1,
        }
    }

    /// Write the version-specific chain id and recipient fields
    fn populate(&self, msg: &mut proto::Transaction, to: Option<&Address>) {
        match self {
            ChainSpec::V0 { chain_id } => {
                msg.chain_id = *chain_id;
                if let Some(to) = to {
                    msg.to = to.to_hex();
                }
            }
            ChainSpec::V1 { chain_id } => {
                msg.chain_id_v1 = chain_id.to_vec();
                if let Some(to) = to {
                    msg.to_v1 = to.as_bytes().to_vec();
                }
            }
        }
    }
}

// ============================================================================
// VALUE
// ============================================================================

/// Unsigned 256-bit amount, stored big-endian
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct Value([u8; U256_LEN]);

impl Value {
    pub const ZERO: Value = Value([0u8; U256_LEN]);

    pub const fn from_be_bytes(bytes: [u8; U256_LEN]) -> Self {
        Value(bytes)
    }

    /// Left-pad up to 32 big-endian bytes; empty input is zero
    pub fn from_be_slice(bytes: &[u8]) -> TxResult<Self> {
        if bytes.len() > U256_LEN {
            return Err(TxError::Decode(format!(
                "256-bit value has {} bytes",
                bytes.len()
            )));
        }
        let mut out = [0u8; U256_LEN];
        out[U256_LEN - bytes.len()..].copy_from_slice(bytes);
        Ok(Value(out))
    }

    pub fn to_be_bytes(&self) -> [u8; U256_LEN] {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; U256_LEN]
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Value::from(u128::from(v))
    }
}

impl From<u128> for Value {
    fn from(v: u128) -> Self {
        let mut out = [0u8; U256_LEN];
        out[U256_LEN - 16..].copy_from_slice(&v.to_be_bytes());
        Value(out)
    }
}

impl FromStr for Value {
    type Err = TxError;

    /// Decimal up to u128, or `0x`-prefixed hex up to 32 bytes
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.starts_with("0x") || s.starts_with("0X") {
            let digits = strip_hex_prefix(s);
            let padded = if digits.len() % 2 == 1 {
                format!("0{}", digits)
            } else {
                digits.to_string()
            };
            let bytes = hex::decode(&padded)
                .map_err(|e| TxError::Config(format!("invalid hex value {}: {}", s, e)))?;
            Value::from_be_slice(&bytes).map_err(|e| TxError::Config(e.to_string()))
        } else {
            s.parse::<u128>()
                .map(Value::from)
                .map_err(|e| TxError::Config(format!("invalid value {}: {}", s, e)))
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Value(0x{})", hex::encode(self.0))
    }
}

// ============================================================================
// CANONICAL TRANSACTION
// ============================================================================

/// Logical transaction, independent of the signature scheme
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalTransaction {
    /// Replay-distinguishing token; uniqueness is enforced by the node
    pub nonce: String,
    pub quota: u64,
    pub valid_until_block: u64,
    /// `None` creates a contract
    pub to: Option<Address>,
    pub data: Vec<u8>,
    pub value: Value,
    pub chain: ChainSpec,
}

impl CanonicalTransaction {
    pub fn version(&self) -> TxVersion {
        self.chain.version()
    }

    pub fn is_contract_creation(&self) -> bool {
        self.to.is_none()
    }

    pub fn to_proto(&self) -> proto::Transaction {
        let mut msg = proto::Transaction {
            nonce: self.nonce.clone(),
            quota: self.quota,
            valid_until_block: self.valid_until_block,
            data: self.data.clone(),
            value: self.value.to_be_bytes().to_vec(),
            version: self.version().as_u32(),
            ..Default::default()
        };
        self.chain.populate(&mut msg, self.to.as_ref());
        msg
    }

    /// Canonical bytes covered by the signature
    pub fn encode(&self) -> Vec<u8> {
        self.to_proto().encode_to_vec()
    }

    pub fn decode(bytes: &[u8]) -> TxResult<Self> {
        let msg = proto::Transaction::decode(bytes).map_err(|e| TxError::Decode(e.to_string()))?;
        Self::from_proto(msg)
    }

    /// Rebuild from a wire message, rejecting fields of the other version
    pub fn from_proto(msg: proto::Transaction) -> TxResult<Self> {
        let (to, chain) = match TxVersion::try_from(msg.version)? {
            TxVersion::V0 => {
                if !msg.to_v1.is_empty() || !msg.chain_id_v1.is_empty() {
                    return Err(TxError::Decode("v0 transaction carries v1 fields".into()));
                }
                let to = if msg.to.is_empty() {
                    None
                } else {
                    Some(msg.to.parse::<Address>()?)
                };
                (to, ChainSpec::V0 { chain_id: msg.chain_id })
            }
            TxVersion::V1 => {
                if !msg.to.is_empty() || msg.chain_id != 0 {
                    return Err(TxError::Decode("v1 transaction carries v0 fields".into()));
                }
                let to = if msg.to_v1.is_empty() {
                    None
                } else {
                    Some(Address::from_slice(&msg.to_v1)?)
                };
                let chain_id: [u8; U256_LEN] = msg.chain_id_v1.as_slice().try_into().map_err(|_| {
                    TxError::Decode(format!(
                        "chain_id_v1 must be {} bytes, got {}",
                        U256_LEN,
                        msg.chain_id_v1.len()
                    ))
                })?;
                (to, ChainSpec::V1 { chain_id })
            }
        };

        Ok(CanonicalTransaction {
            nonce: msg.nonce,
            quota: msg.quota,
            valid_until_block: msg.valid_until_block,
            to,
            data: msg.data,
            value: Value::from_be_slice(&msg.value)?,
            chain,
        })
    }
}

// ============================================================================
// TESTS
// ============================================================================
