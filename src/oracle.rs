//! Nonce, height and chain-id collaborators.
//!
//! These are the only parts of the pipeline that may block or fail for
//! reasons outside the caller's inputs. Their failures surface as
//! `TxError::UpstreamUnavailable` and are never retried here.

use rand::Rng;
use std::future::Future;

use crate::error::{TxError, TxResult};
use crate::transaction::{valid_until_block, ChainSpec, TxVersion};

/// Length of generated nonces
pub const NONCE_LEN: usize = 6;

const NONCE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

// ============================================================================
// TRAITS
// ============================================================================

pub trait NonceOracle {
    fn next_nonce(&self) -> TxResult<String>;
}

pub trait HeightOracle {
    fn current_height(&self) -> impl Future<Output = TxResult<u64>> + Send;
}

pub trait ChainIdOracle {
    /// Chain id in the shape `version` encodes
    fn chain_id(&self, version: TxVersion) -> impl Future<Output = TxResult<ChainSpec>> + Send;
}

// ============================================================================
// IMPLEMENTATIONS
// ============================================================================

/// Random `[A-Z0-9]` token per transaction
///
/// Concurrent signers need no coordination; the node rejects a reused
/// `(sender, nonce)` pair.
#[derive(Debug, Clone, Copy)]
pub struct RandomNonce {
    len: usize,
}

impl RandomNonce {
    pub fn new(len: usize) -> Self {
        RandomNonce { len }
    }
}

impl Default for RandomNonce {
    fn default() -> Self {
        RandomNonce::new(NONCE_LEN)
    }
}

impl NonceOracle for RandomNonce {
    fn next_nonce(&self) -> TxResult<String> {
        let mut rng = rand::thread_rng();
        Ok((0..self.len)
            .map(|_| char::from(NONCE_ALPHABET[rng.gen_range(0..NONCE_ALPHABET.len())]))
            .collect())
    }
}

/// Caller-supplied nonce
#[derive(Debug, Clone)]
pub struct FixedNonce(pub String);

impl NonceOracle for FixedNonce {
    fn next_nonce(&self) -> TxResult<String> {
        Ok(self.0.clone())
    }
}

/// Height known ahead of time (offline signing, tests)
#[derive(Debug, Clone, Copy)]
pub struct FixedHeight(pub u64);

impl HeightOracle for FixedHeight {
    async fn current_height(&self) -> TxResult<u64> {
        Ok(self.0)
    }
}

/// Numeric chain id shaped per version
#[derive(Debug, Clone, Copy)]
pub struct FixedChainId(pub u64);

impl ChainIdOracle for FixedChainId {
    async fn chain_id(&self, version: TxVersion) -> TxResult<ChainSpec> {
        ChainSpec::for_version(version, self.0)
    }
}

// ============================================================================
// CHAIN CONTEXT
// ============================================================================

/// Height and chain id resolved before assembly
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainContext {
    pub current_height: u64,
    pub chain: ChainSpec,
}

impl ChainContext {
    pub fn new(current_height: u64, chain: ChainSpec) -> Self {
        ChainContext {
            current_height,
            chain,
        }
    }

    pub fn valid_until_block(&self) -> u64 {
        valid_until_block(self.current_height)
    }
}

/// Query both oracles for `version`
pub async fn resolve_context<H, C>(version: TxVersion, height: &H, chain: &C) -> TxResult<ChainContext>
where
    H: HeightOracle,
    C: ChainIdOracle,
{
    let current_height = height.current_height().await?;
    let chain = chain.chain_id(version).await?;
    if chain.version() != version {
        return Err(TxError::ChainMismatch {
            expected: version,
            found: chain.version(),
        });
    }
    Ok(ChainContext::new(current_height, chain))
}

// ============================================================================
// TESTS
// ============================================================================
