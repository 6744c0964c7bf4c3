//! Signing configuration
//!
//! Everything the pipeline needs besides the caller's intent: which scheme,
//! where the key comes from, where the node is, which wire version and how
//! to learn the chain id. Loaded from the environment (and `.env`), then
//! overridden by CLI flags.

use std::fmt;
use std::path::PathBuf;

use tracing::debug;
use zeroize::Zeroizing;

use crate::builder::DEFAULT_QUOTA;
use crate::crypto::{decode_secret_hex, load_secret_key, KeyMaterial, Scheme};
use crate::error::{TxError, TxResult};
use crate::transaction::TxVersion;

pub const ENV_RPC_URL: &str = "CITA_RPC_URL";
pub const ENV_PRIVKEY: &str = "CITA_PRIVKEY";
pub const ENV_PRIVKEY_FILE: &str = "CITA_PRIVKEY_FILE";
pub const ENV_NEWCRYPTO: &str = "CITA_NEWCRYPTO";
pub const ENV_TX_VERSION: &str = "CITA_TX_VERSION";
pub const ENV_CHAIN_ID: &str = "CITA_CHAIN_ID";
pub const ENV_QUOTA: &str = "CITA_QUOTA";

/// Where the secret key comes from
#[derive(Clone)]
pub enum KeySource {
    /// Hex secret given directly
    Inline(Zeroizing<String>),
    /// Flat file holding a hex secret
    File(PathBuf),
    /// Fresh random key
    Generate,
}

impl fmt::Debug for KeySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeySource::Inline(_) => f.write_str("Inline(<redacted>)"),
            KeySource::File(path) => f.debug_tuple("File").field(path).finish(),
            KeySource::Generate => f.write_str("Generate"),
        }
    }
}

/// Where the chain id comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainIdSource {
    /// Ask the node (`getMetaData`)
    Remote,
    /// Known ahead of time
    Fixed(u64),
}

#[derive(Debug, Clone)]
pub struct SigningConfig {
    pub scheme: Scheme,
    pub key: KeySource,
    /// JSON-RPC endpoint; `None` runs the RPC client in mock mode
    pub rpc_url: Option<String>,
    /// Raw wire version, validated by the builder
    pub version: u32,
    pub chain_id: ChainIdSource,
    pub quota: u64,
}

impl Default for SigningConfig {
    fn default() -> Self {
        SigningConfig {
            scheme: Scheme::Secp256k1Keccak,
            key: KeySource::Generate,
            rpc_url: None,
            version: TxVersion::LATEST.as_u32(),
            chain_id: ChainIdSource::Remote,
            quota: DEFAULT_QUOTA,
        }
    }
}

impl SigningConfig {
    pub fn new(scheme: Scheme, key: KeySource) -> Self {
        SigningConfig {
            scheme,
            key,
            ..Default::default()
        }
    }

    /// Load `.env` if present, then read `CITA_*` variables
    pub fn from_env() -> TxResult<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from any variable lookup; unset variables keep their defaults
    pub fn from_lookup<F>(lookup: F) -> TxResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = SigningConfig::default();
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(url) = get(ENV_RPC_URL) {
            config.rpc_url = Some(url.trim().to_string());
        }
        if let Some(flag) = get(ENV_NEWCRYPTO) {
            config.scheme = Scheme::from_newcrypto(parse_bool(ENV_NEWCRYPTO, &flag)?);
        }
        if let Some(version) = get(ENV_TX_VERSION) {
            config.version = parse_number(ENV_TX_VERSION, &version)?;
        }
        if let Some(chain_id) = get(ENV_CHAIN_ID) {
            config.chain_id = ChainIdSource::Fixed(parse_number(ENV_CHAIN_ID, &chain_id)?);
        }
        if let Some(quota) = get(ENV_QUOTA) {
            config.quota = parse_number(ENV_QUOTA, &quota)?;
        }

        // An inline key wins over a key file
        if let Some(secret) = get(ENV_PRIVKEY) {
            config.key = KeySource::Inline(Zeroizing::new(secret));
        } else if let Some(path) = get(ENV_PRIVKEY_FILE) {
            config.key = KeySource::File(PathBuf::from(path.trim()));
        }

        debug!(
            scheme = %config.scheme,
            version = config.version,
            mock_rpc = config.rpc_url.is_none(),
            "loaded signing config"
        );
        Ok(config)
    }

    /// Materialize the configured key for `self.scheme`
    pub fn load_key(&self) -> TxResult<KeyMaterial> {
        match &self.key {
            KeySource::Inline(secret) => {
                let bytes = decode_secret_hex(secret)?;
                KeyMaterial::from_secret(self.scheme, &bytes)
            }
            KeySource::File(path) => {
                let bytes = load_secret_key(path)?;
                KeyMaterial::from_secret(self.scheme, &bytes)
            }
            KeySource::Generate => Ok(KeyMaterial::generate(self.scheme)),
        }
    }
}

fn parse_bool(name: &str, value: &str) -> TxResult<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" => Ok(true),
        "0" | "false" | "no" => Ok(false),
        other => Err(TxError::Config(format!("{} is not a boolean: {}", name, other))),
    }
}

fn parse_number<T: std::str::FromStr>(name: &str, value: &str) -> TxResult<T>
where
    T::Err: fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| TxError::Config(format!("invalid {}: {}", name, e)))
}

// ============================================================================
// TESTS
// ============================================================================
