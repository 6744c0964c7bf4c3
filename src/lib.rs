//! CITA Transaction Signer
//! Builds, signs and serializes CITA transactions for secp256k1/keccak256
//! and ed25519/blake2b chains, then submits them over JSON-RPC.

pub mod builder;
pub mod config;
pub mod crypto;
pub mod error;
pub mod oracle;
pub mod transaction;

#[path = "../rpc/mod.rs"]
pub mod rpc;

pub use builder::{TransactionBuilder, DEFAULT_QUOTA};
pub use config::{ChainIdSource, KeySource, SigningConfig};
pub use crypto::{
    blake2b_cryptape, keccak256, load_secret_key, recover_public_key, sign_bytes,
    verify_signature, Address, Hash, KeyMaterial, Scheme, SignatureBlock, TxSigner,
};
pub use error::{TxError, TxResult};
pub use oracle::{
    resolve_context, ChainContext, ChainIdOracle, FixedChainId, FixedHeight, FixedNonce,
    HeightOracle, NonceOracle, RandomNonce,
};
pub use rpc::{MetaData, RpcClient, RpcError, TxResponse};
pub use transaction::{
    valid_until_block, CanonicalTransaction, ChainSpec, Envelope, TxVersion, Value,
    VALID_BLOCK_WINDOW,
};
