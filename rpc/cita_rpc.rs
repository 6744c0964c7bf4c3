//! CITA JSON-RPC Client
//!
//! HTTP client for the node endpoints the signing pipeline needs: current
//! height, chain metadata, raw transaction submission and receipts.
//! Runs in mock mode when no endpoint is configured, so offline signing and
//! tests never touch the network.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::crypto::strip_hex_prefix;
use crate::error::{TxError, TxResult};
use crate::oracle::{ChainIdOracle, HeightOracle};
use crate::transaction::{ChainSpec, Envelope, TxVersion, U256_LEN};

// ============================================================================
// CONSTANTS
// ============================================================================

/// Default timeout for RPC calls
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Height reported in mock mode
pub const MOCK_BLOCK_HEIGHT: u64 = 1_000;

/// Chain id reported in mock mode
pub const MOCK_CHAIN_ID: u32 = 1;

pub mod method {
    pub const BLOCK_NUMBER: &str = "blockNumber";
    pub const GET_META_DATA: &str = "getMetaData";
    pub const SEND_RAW_TRANSACTION: &str = "sendRawTransaction";
    pub const GET_TRANSACTION_RECEIPT: &str = "getTransactionReceipt";
}

// ============================================================================
// ERROR TYPES
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RpcError {
    #[error("RPC not connected (mock mode)")]
    NotConnected,

    #[error("RPC {method} request failed: {reason}")]
    RequestFailed { method: String, reason: String },

    #[error("RPC {method} invalid response: {reason}")]
    InvalidResponse { method: String, reason: String },

    #[error("RPC {method} error: {error}")]
    Node { method: String, error: String },
}

impl From<RpcError> for TxError {
    fn from(err: RpcError) -> Self {
        TxError::UpstreamUnavailable(err.to_string())
    }
}

// ============================================================================
// RESPONSE TYPES
// ============================================================================

/// Subset of `getMetaData` the signer reads
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetaData {
    #[serde(rename = "chainId")]
    pub chain_id: u32,
    /// Hex U256, only reported by nodes that speak version 1
    #[serde(rename = "chainIdV1", default, skip_serializing_if = "Option::is_none")]
    pub chain_id_v1: Option<String>,
    #[serde(rename = "chainName", default)]
    pub chain_name: String,
    #[serde(rename = "blockInterval", default)]
    pub block_interval: u64,
}

/// Result of `sendRawTransaction`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxResponse {
    pub hash: String,
    pub status: String,
}

// ============================================================================
// RPC CLIENT
// ============================================================================

pub struct RpcClient {
    /// JSON-RPC endpoint URL
    endpoint_url: Option<String>,

    client: Client,

    timeout: Duration,

    /// Whether we're in mock mode (no real node)
    mock_mode: bool,

    next_id: AtomicU64,

    /// Raw transactions accepted in mock mode
    mock_submitted: Mutex<Vec<String>>,
}

impl RpcClient {
    /// Create a client; `None` selects mock mode
    pub fn new(endpoint_url: Option<String>) -> Self {
        Self::with_timeout(endpoint_url, Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    pub fn with_timeout(endpoint_url: Option<String>, timeout: Duration) -> Self {
        let mock_mode = endpoint_url.is_none();

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| Client::new());

        RpcClient {
            endpoint_url,
            client,
            timeout,
            mock_mode,
            next_id: AtomicU64::new(1),
            mock_submitted: Mutex::new(Vec::new()),
        }
    }

    /// Mock-mode client
    pub fn mock() -> Self {
        Self::new(None)
    }

    pub fn is_mock_mode(&self) -> bool {
        self.mock_mode
    }

    pub fn endpoint_url(&self) -> Option<&str> {
        self.endpoint_url.as_deref()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Log connection status (call on startup)
    pub fn log_status(&self) {
        match &self.endpoint_url {
            Some(url) => info!(endpoint = %url, "RPC connected"),
            None => warn!("RPC in mock mode (no endpoint configured)"),
        }
    }

    /// Raw transactions accepted so far in mock mode
    pub fn mock_submissions(&self) -> Vec<String> {
        self.mock_submitted
            .lock()
            .map(|s| s.clone())
            .unwrap_or_default()
    }

    // ========================================================================
    // JSON-RPC
    // ========================================================================

    /// Issue one JSON-RPC request and return its `result`
    pub async fn call(&self, method: &str, params: Value) -> Result<Value, RpcError> {
        let url = self.endpoint_url.as_deref().ok_or(RpcError::NotConnected)?;
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let payload = json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": id,
        });
        debug!(method, id, "RPC request");

        let response = self
            .client
            .post(url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| RpcError::RequestFailed {
                method: method.to_string(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        let body: Value = response
            .json()
            .await
            .map_err(|e| RpcError::InvalidResponse {
                method: method.to_string(),
                reason: e.to_string(),
            })?;

        if !status.is_success() {
            return Err(RpcError::RequestFailed {
                method: method.to_string(),
                reason: format!("HTTP {}: {}", status, body),
            });
        }
        if let Some(error) = body.get("error") {
            return Err(RpcError::Node {
                method: method.to_string(),
                error: error.to_string(),
            });
        }

        body.get("result")
            .cloned()
            .ok_or_else(|| RpcError::InvalidResponse {
                method: method.to_string(),
                reason: "missing result field".into(),
            })
    }

    // ========================================================================
    // CHAIN QUERIES
    // ========================================================================

    /// Current block height
    pub async fn block_number(&self) -> Result<u64, RpcError> {
        if self.mock_mode {
            return Ok(MOCK_BLOCK_HEIGHT);
        }

        let result = self.call(method::BLOCK_NUMBER, json!([])).await?;
        let height = result.as_str().ok_or_else(|| RpcError::InvalidResponse {
            method: method::BLOCK_NUMBER.into(),
            reason: format!("non-string result: {}", result),
        })?;
        parse_hex_u64(height).map_err(|reason| RpcError::InvalidResponse {
            method: method::BLOCK_NUMBER.into(),
            reason,
        })
    }

    /// Chain metadata at the latest block
    pub async fn meta_data(&self) -> Result<MetaData, RpcError> {
        if self.mock_mode {
            return Ok(MetaData {
                chain_id: MOCK_CHAIN_ID,
                chain_id_v1: Some(format!("{:#x}", MOCK_CHAIN_ID)),
                chain_name: "mock-chain".into(),
                block_interval: 3_000,
            });
        }

        let result = self.call(method::GET_META_DATA, json!(["latest"])).await?;
        serde_json::from_value(result).map_err(|e| RpcError::InvalidResponse {
            method: method::GET_META_DATA.into(),
            reason: e.to_string(),
        })
    }

    /// Receipt for `hash`, `None` while the transaction is pending
    pub async fn get_receipt(&self, hash: &str) -> Result<Option<Value>, RpcError> {
        if self.mock_mode {
            return Ok(None);
        }

        let result = self
            .call(method::GET_TRANSACTION_RECEIPT, json!([hash]))
            .await?;
        Ok(if result.is_null() { None } else { Some(result) })
    }

    // ========================================================================
    // SUBMISSION
    // ========================================================================

    /// Submit a hex-encoded `UnverifiedTransaction`
    pub async fn send_raw_transaction(&self, raw_hex: &str) -> Result<TxResponse, RpcError> {
        if self.mock_mode {
            let envelope = Envelope::from_hex(raw_hex).map_err(|e| RpcError::RequestFailed {
                method: method::SEND_RAW_TRANSACTION.into(),
                reason: e.to_string(),
            })?;
            if let Ok(mut submitted) = self.mock_submitted.lock() {
                submitted.push(envelope.to_hex());
            }
            return Ok(TxResponse {
                hash: envelope.hash_hex(),
                status: "OK".into(),
            });
        }

        let result = self
            .call(method::SEND_RAW_TRANSACTION, json!([raw_hex]))
            .await?;
        serde_json::from_value(result).map_err(|e| RpcError::InvalidResponse {
            method: method::SEND_RAW_TRANSACTION.into(),
            reason: e.to_string(),
        })
    }

    /// Submit a signed envelope; the envelope is consumed
    pub async fn submit(&self, envelope: Envelope) -> TxResult<TxResponse> {
        let local_hash = envelope.hash_hex();
        let response = self.send_raw_transaction(&envelope.to_hex()).await?;

        if response.hash != local_hash {
            warn!(local = %local_hash, remote = %response.hash, "node reported a different tx hash");
        }
        info!(hash = %response.hash, status = %response.status, "transaction submitted");
        Ok(response)
    }
}

impl HeightOracle for RpcClient {
    async fn current_height(&self) -> TxResult<u64> {
        Ok(self.block_number().await?)
    }
}

impl ChainIdOracle for RpcClient {
    async fn chain_id(&self, version: TxVersion) -> TxResult<ChainSpec> {
        let meta = self.meta_data().await?;
        chain_spec_from_meta(&meta, version)
    }
}

/// Pick the chain id field `version` needs out of `getMetaData`
pub fn chain_spec_from_meta(meta: &MetaData, version: TxVersion) -> TxResult<ChainSpec> {
    match version {
        TxVersion::V0 => Ok(ChainSpec::V0 {
            chain_id: meta.chain_id,
        }),
        TxVersion::V1 => {
            let raw = meta.chain_id_v1.as_deref().ok_or_else(|| {
                TxError::UpstreamUnavailable("node did not report chainIdV1".into())
            })?;
            let chain_id = parse_chain_id_v1(raw).map_err(TxError::UpstreamUnavailable)?;
            Ok(ChainSpec::V1 { chain_id })
        }
    }
}

// ============================================================================
// HELPERS
// ============================================================================

/// Parse a `0x`-prefixed quantity
pub fn parse_hex_u64(value: &str) -> Result<u64, String> {
    let digits = strip_hex_prefix(value.trim());
    if digits.is_empty() {
        return Err(format!("empty quantity: {:?}", value));
    }
    u64::from_str_radix(digits, 16).map_err(|e| format!("invalid quantity {:?}: {}", value, e))
}

/// Parse a hex U256 into 32 big-endian bytes
pub fn parse_chain_id_v1(value: &str) -> Result<[u8; U256_LEN], String> {
    let digits = strip_hex_prefix(value.trim());
    let padded = if digits.len() % 2 == 1 {
        format!("0{}", digits)
    } else {
        digits.to_string()
    };
    let bytes = hex::decode(&padded).map_err(|e| format!("invalid chainIdV1 {:?}: {}", value, e))?;
    if bytes.len() > U256_LEN {
        return Err(format!("chainIdV1 longer than {} bytes", U256_LEN));
    }

    let mut out = [0u8; U256_LEN];
    out[U256_LEN - bytes.len()..].copy_from_slice(&bytes);
    Ok(out)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::TransactionBuilder;
    use crate::crypto::{KeyMaterial, Scheme};
    use crate::oracle::RandomNonce;

    #[test]
    fn test_mock_mode_without_endpoint() {
        let client = RpcClient::new(None);
        assert!(client.is_mock_mode());
        assert!(client.endpoint_url().is_none());
        assert_eq!(client.timeout(), Duration::from_secs(DEFAULT_TIMEOUT_SECS));

        let live = RpcClient::new(Some("http://127.0.0.1:1337".into()));
        assert!(!live.is_mock_mode());
    }

    #[test]
    fn test_parse_hex_u64() {
        assert_eq!(parse_hex_u64("0x186a0"), Ok(100_000));
        assert_eq!(parse_hex_u64("0x0"), Ok(0));
        assert!(parse_hex_u64("0x").is_err());
        assert!(parse_hex_u64("0xzz").is_err());
    }

    #[test]
    fn test_parse_chain_id_v1() {
        let id = parse_chain_id_v1("0x1").unwrap();
        assert_eq!(id[31], 1);
        assert!(id[..31].iter().all(|b| *b == 0));

        let full = format!("0x{}", "ff".repeat(32));
        assert_eq!(parse_chain_id_v1(&full).unwrap(), [0xff; 32]);
        assert!(parse_chain_id_v1(&format!("0x{}", "ff".repeat(33))).is_err());
    }

    #[test]
    fn test_meta_data_deserialize() {
        let meta: MetaData = serde_json::from_value(json!({
            "chainId": 123,
            "chainName": "test-chain-name",
            "operator": "test-operator",
            "blockInterval": 3000,
            "tokenSymbol": "NOS"
        }))
        .unwrap();
        assert_eq!(meta.chain_id, 123);
        assert_eq!(meta.chain_id_v1, None);
        assert_eq!(meta.block_interval, 3000);
    }

    #[test]
    fn test_v1_chain_id_missing_from_meta() {
        let meta: MetaData = serde_json::from_value(json!({ "chainId": 5 })).unwrap();

        assert_eq!(
            chain_spec_from_meta(&meta, TxVersion::V0),
            Ok(ChainSpec::V0 { chain_id: 5 })
        );
        assert!(matches!(
            chain_spec_from_meta(&meta, TxVersion::V1),
            Err(TxError::UpstreamUnavailable(_))
        ));
    }

    #[test]
    fn test_v1_chain_id_malformed_in_meta() {
        let meta: MetaData =
            serde_json::from_value(json!({ "chainId": 5, "chainIdV1": "0xnothex" })).unwrap();
        assert!(matches!(
            chain_spec_from_meta(&meta, TxVersion::V1),
            Err(TxError::UpstreamUnavailable(_))
        ));
    }

    #[test]
    fn test_rpc_error_becomes_upstream_unavailable() {
        let err: TxError = RpcError::NotConnected.into();
        assert!(matches!(err, TxError::UpstreamUnavailable(_)));
    }

    #[tokio::test]
    async fn test_call_requires_endpoint() {
        let client = RpcClient::mock();
        assert_eq!(
            client.call(method::BLOCK_NUMBER, json!([])).await,
            Err(RpcError::NotConnected)
        );
    }

    #[tokio::test]
    async fn test_mock_oracles() {
        let client = RpcClient::mock();
        assert_eq!(client.current_height().await.unwrap(), MOCK_BLOCK_HEIGHT);
        assert_eq!(
            client.chain_id(TxVersion::V0).await.unwrap(),
            ChainSpec::V0 { chain_id: MOCK_CHAIN_ID }
        );
        let mut expected = [0u8; 32];
        expected[31] = 1;
        assert_eq!(
            client.chain_id(TxVersion::V1).await.unwrap(),
            ChainSpec::V1 { chain_id: expected }
        );
    }

    #[tokio::test]
    async fn test_mock_submit_returns_local_hash() {
        let client = RpcClient::mock();
        let key = KeyMaterial::generate(Scheme::Secp256k1Keccak);
        let envelope = TransactionBuilder::new()
            .build(&key, &RandomNonce::default(), &client, &client)
            .await
            .unwrap();

        let expected_hash = envelope.hash_hex();
        let expected_hex = envelope.to_hex();
        let response = client.submit(envelope).await.unwrap();

        assert_eq!(response.hash, expected_hash);
        assert_eq!(response.status, "OK");
        assert_eq!(client.mock_submissions(), vec![expected_hex]);
        assert_eq!(client.get_receipt(&expected_hash).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_mock_rejects_garbage() {
        let client = RpcClient::mock();
        let result = client.send_raw_transaction("0xdeadbeef").await;
        assert!(matches!(result, Err(RpcError::RequestFailed { .. })));
    }
}
