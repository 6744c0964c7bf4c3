// make_tx - build, sign and optionally submit one CITA transaction
//
// Reads CITA_* variables (and .env), lets flags override them, prints the
// hex-encoded UnverifiedTransaction and its hash.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};
use zeroize::Zeroizing;

use cita_txsigner::crypto::strip_hex_prefix;
use cita_txsigner::{
    Address, ChainContext, ChainIdOracle, ChainIdSource, ChainSpec, HeightOracle, KeySource,
    NonceOracle, RandomNonce, RpcClient, Scheme, SigningConfig, TransactionBuilder, TxError,
    TxResult, TxVersion, Value,
};

#[derive(Parser)]
#[command(name = "make_tx")]
#[command(about = "Build and sign a CITA transaction")]
#[command(disable_version_flag = true)]
struct Args {
    /// Call data or contract bytecode (hex)
    #[arg(long, default_value = "")]
    code: String,

    /// Value to transfer: decimal, or 0x-prefixed hex
    #[arg(long, default_value = "0")]
    value: String,

    /// Execution quota; overrides CITA_QUOTA
    #[arg(long)]
    quota: Option<u64>,

    /// Secret key (hex); overrides CITA_PRIVKEY / CITA_PRIVKEY_FILE
    #[arg(long)]
    privkey: Option<String>,

    /// Recipient address; omit to create a contract
    #[arg(long)]
    to: Option<String>,

    /// Sign with ed25519/blake2b instead of secp256k1/keccak256
    #[arg(long)]
    newcrypto: bool,

    /// Transaction wire version (0 or 1)
    #[arg(long)]
    version: Option<u32>,

    /// Chain id; skips the getMetaData lookup
    #[arg(long)]
    chain_id: Option<u64>,

    /// Current block height; skips the blockNumber lookup
    #[arg(long)]
    height: Option<u64>,

    /// JSON-RPC endpoint; overrides CITA_RPC_URL
    #[arg(long)]
    rpc_url: Option<String>,

    /// Submit the signed transaction with sendRawTransaction
    #[arg(long)]
    send: bool,

    /// Also write the hex transaction to this file
    #[arg(long)]
    output: Option<PathBuf>,

    /// Write a freshly generated secret key to this file (owner-only on unix)
    #[arg(long)]
    save_key: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

impl Args {
    fn apply(&self, config: &mut SigningConfig) {
        if self.newcrypto {
            config.scheme = Scheme::Ed25519Blake2b;
        }
        if let Some(secret) = &self.privkey {
            config.key = KeySource::Inline(Zeroizing::new(secret.clone()));
        }
        if let Some(url) = &self.rpc_url {
            config.rpc_url = Some(url.clone());
        }
        if let Some(version) = self.version {
            config.version = version;
        }
        if let Some(chain_id) = self.chain_id {
            config.chain_id = ChainIdSource::Fixed(chain_id);
        }
        if let Some(quota) = self.quota {
            config.quota = quota;
        }
    }

    /// `--save-key` only makes sense for a key generated by this run
    fn check_save_key(&self, config: &SigningConfig) -> TxResult<()> {
        if self.save_key.is_some() && !matches!(config.key, KeySource::Generate) {
            return Err(TxError::Config(
                "--save-key requires a generated key; drop --privkey / CITA_PRIVKEY(_FILE)".into(),
            ));
        }
        Ok(())
    }
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    init_tracing(&args.log_level);

    if let Err(e) = run(args).await {
        error!(error = %e, "make_tx failed");
        std::process::exit(1);
    }
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

async fn run(args: Args) -> TxResult<()> {
    let mut config = SigningConfig::from_env()?;
    args.apply(&mut config);
    args.check_save_key(&config)?;

    // Reject unknown versions before touching keys or the network
    let version = TxVersion::try_from(config.version)?;

    let data = hex::decode(strip_hex_prefix(args.code.trim()))
        .map_err(|e| TxError::Config(format!("--code is not valid hex: {}", e)))?;
    let value: Value = args.value.parse()?;
    let mut builder = TransactionBuilder::new()
        .data(data)
        .value(value)
        .quota(config.quota)
        .version(config.version);
    if let Some(to) = &args.to {
        builder = builder.to(to.parse::<Address>()?);
    }

    let key = config.load_key()?;
    info!(scheme = %key.scheme(), address = %key.address(), "signing key ready");
    if matches!(config.key, KeySource::Generate) {
        info!(public_key = %key.public_key_hex(), "generated a new key");
        if let Some(path) = &args.save_key {
            write_secret(path, &key.secret_hex())?;
            info!(path = %path.display(), "secret key saved");
        }
    }

    let rpc = RpcClient::new(config.rpc_url.clone());
    rpc.log_status();

    let current_height = match args.height {
        Some(height) => height,
        None => rpc.current_height().await?,
    };
    let chain = match config.chain_id {
        ChainIdSource::Fixed(id) => ChainSpec::for_version(version, id)?,
        ChainIdSource::Remote => rpc.chain_id(version).await?,
    };
    let ctx = ChainContext::new(current_height, chain);
    info!(height = current_height, valid_until_block = ctx.valid_until_block(), "chain context");

    let nonce = RandomNonce::default().next_nonce()?;
    let envelope = builder.sign(nonce, &ctx, &key)?;
    let raw = envelope.to_hex();

    println!("{}", raw);
    println!("hash: {}", envelope.hash_hex());

    if let Some(path) = &args.output {
        std::fs::write(path, &raw).map_err(|e| {
            TxError::Config(format!("cannot write {}: {}", path.display(), e))
        })?;
    }

    if args.send {
        let response = rpc.submit(envelope).await?;
        println!("submitted: {} ({})", response.hash, response.status);
    }

    Ok(())
}

fn write_secret(path: &Path, secret: &str) -> TxResult<()> {
    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    options
        .open(path)
        .and_then(|mut file| file.write_all(secret.as_bytes()))
        .map_err(|e| TxError::Config(format!("cannot write key file {}: {}", path.display(), e)))
}

// ============================================================================
// TESTS
// ============================================================================
