//! Transaction assembly: caller intent + oracles -> signed envelope.
//!
//! The version is validated first, before any oracle is queried or any key
//! is touched. Oracle failures abort before signing.

use tracing::{debug, error, info};

use crate::crypto::{Address, TxSigner};
use crate::error::{TxError, TxResult};
use crate::oracle::{resolve_context, ChainContext, ChainIdOracle, HeightOracle, NonceOracle};
use crate::transaction::{CanonicalTransaction, Envelope, TxVersion, Value};

/// Quota used when the caller does not set one
pub const DEFAULT_QUOTA: u64 = 1_000_000;

/// What the caller wants to send
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionBuilder {
    to: Option<Address>,
    data: Vec<u8>,
    value: Value,
    quota: u64,
    version: u32,
}

impl Default for TransactionBuilder {
    fn default() -> Self {
        TransactionBuilder {
            to: None,
            data: Vec::new(),
            value: Value::ZERO,
            quota: DEFAULT_QUOTA,
            version: TxVersion::LATEST.as_u32(),
        }
    }
}

impl TransactionBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Recipient; leave unset to create a contract
    pub fn to(mut self, to: Address) -> Self {
        self.to = Some(to);
        self
    }

    pub fn data(mut self, data: impl Into<Vec<u8>>) -> Self {
        self.data = data.into();
        self
    }

    pub fn value(mut self, value: Value) -> Self {
        self.value = value;
        self
    }

    pub fn quota(mut self, quota: u64) -> Self {
        self.quota = quota;
        self
    }

    /// Raw wire version; checked when the transaction is assembled
    pub fn version(mut self, version: u32) -> Self {
        self.version = version;
        self
    }

    pub fn checked_version(&self) -> TxResult<TxVersion> {
        TxVersion::try_from(self.version)
    }

    /// Build the canonical record from already-resolved inputs
    pub fn assemble(&self, nonce: String, ctx: &ChainContext) -> TxResult<CanonicalTransaction> {
        let version = self.checked_version()?;
        if ctx.chain.version() != version {
            return Err(TxError::ChainMismatch {
                expected: version,
                found: ctx.chain.version(),
            });
        }

        let tx = CanonicalTransaction {
            nonce,
            quota: self.quota,
            valid_until_block: ctx.valid_until_block(),
            to: self.to,
            data: self.data.clone(),
            value: self.value,
            chain: ctx.chain,
        };
        debug!(
            version = %version,
            valid_until_block = tx.valid_until_block,
            quota = tx.quota,
            contract_creation = tx.is_contract_creation(),
            "assembled transaction"
        );
        Ok(tx)
    }

    /// Assemble and sign with already-resolved inputs
    pub fn sign<S>(&self, nonce: String, ctx: &ChainContext, signer: &S) -> TxResult<Envelope>
    where
        S: TxSigner + ?Sized,
    {
        let tx = self.assemble(nonce, ctx)?;
        let envelope = Envelope::sign(tx, signer).map_err(|e| {
            if matches!(e, TxError::SigningError(_)) {
                error!(error = %e, scheme = %signer.scheme(), "signing primitive failed");
            }
            e
        })?;
        info!(
            scheme = %envelope.scheme(),
            version = %envelope.transaction().version(),
            hash = %envelope.hash_hex(),
            "signed transaction"
        );
        Ok(envelope)
    }

    /// Full pipeline: validate version, query oracles, assemble, sign
    pub async fn build<S, N, H, C>(
        &self,
        signer: &S,
        nonce: &N,
        height: &H,
        chain: &C,
    ) -> TxResult<Envelope>
    where
        S: TxSigner + ?Sized,
        N: NonceOracle + ?Sized,
        H: HeightOracle,
        C: ChainIdOracle,
    {
        let version = self.checked_version()?;
        let nonce = nonce.next_nonce()?;
        let ctx = resolve_context(version, height, chain).await?;
        self.sign(nonce, &ctx, signer)
    }
}

// ============================================================================
// TESTS
// ============================================================================
