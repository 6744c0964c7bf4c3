//! Key material for both signature schemes.
//!
//! A `KeyMaterial` owns one secret key and the public key and address derived
//! from it. Secrets are wiped on drop and never appear in `Debug` output.

use ed25519_dalek::SigningKey;
use rand::rngs::OsRng;
use secp256k1::{All, PublicKey, Secp256k1, SecretKey};
use std::fmt;
use std::path::Path;
use std::sync::OnceLock;
use zeroize::Zeroizing;

use super::{blake2b_cryptape, keccak256, strip_hex_prefix, Address, Scheme};
use crate::error::{TxError, TxResult};

/// Length of a secp256k1 secret scalar and of an ed25519 seed
pub const SECRET_LEN: usize = 32;

/// libsodium-style ed25519 secret: seed || public key
pub const ED25519_KEYPAIR_LEN: usize = 64;

pub(crate) fn secp() -> &'static Secp256k1<All> {
    static SECP: OnceLock<Secp256k1<All>> = OnceLock::new();
    SECP.get_or_init(Secp256k1::new)
}

pub(crate) enum Secret {
    Secp256k1(SecretKey),
    Ed25519(SigningKey),
}

/// A private key with its derived public key and address
pub struct KeyMaterial {
    pub(crate) secret: Secret,
    public_key: Vec<u8>,
    address: Address,
}

impl KeyMaterial {
    /// Generate a fresh key pair from the OS random source
    pub fn generate(scheme: Scheme) -> Self {
        match scheme {
            Scheme::Secp256k1Keccak => {
                let (secret, _) = secp().generate_keypair(&mut OsRng);
                Self::from_secp(secret)
            }
            Scheme::Ed25519Blake2b => Self::from_ed25519(SigningKey::generate(&mut OsRng)),
        }
    }

    /// Load key material from raw secret bytes
    ///
    /// secp256k1 takes a 32-byte scalar. ed25519 takes either a 32-byte seed
    /// or a 64-byte `seed || public` pair whose public half must match.
    pub fn from_secret(scheme: Scheme, secret: &[u8]) -> TxResult<Self> {
        match scheme {
            Scheme::Secp256k1Keccak => {
                if secret.len() != SECRET_LEN {
                    return Err(TxError::InvalidKeyFormat(format!(
                        "secp256k1 secret must be {} bytes, got {}",
                        SECRET_LEN,
                        secret.len()
                    )));
                }
                let key = SecretKey::from_slice(secret)
                    .map_err(|e| TxError::InvalidKeyFormat(e.to_string()))?;
                Ok(Self::from_secp(key))
            }
            Scheme::Ed25519Blake2b => {
                let key = match secret.len() {
                    SECRET_LEN => {
                        let mut seed = Zeroizing::new([0u8; SECRET_LEN]);
                        seed.copy_from_slice(secret);
                        SigningKey::from_bytes(&seed)
                    }
                    ED25519_KEYPAIR_LEN => {
                        let mut pair = Zeroizing::new([0u8; ED25519_KEYPAIR_LEN]);
                        pair.copy_from_slice(secret);
                        SigningKey::from_keypair_bytes(&pair)
                            .map_err(|e| TxError::InvalidKeyFormat(e.to_string()))?
                    }
                    n => {
                        return Err(TxError::InvalidKeyFormat(format!(
                            "ed25519 secret must be {} or {} bytes, got {}",
                            SECRET_LEN, ED25519_KEYPAIR_LEN, n
                        )))
                    }
                };
                Ok(Self::from_ed25519(key))
            }
        }
    }

    /// Load key material from a hex string (optional `0x` prefix)
    pub fn from_hex(scheme: Scheme, secret_hex: &str) -> TxResult<Self> {
        let bytes = decode_secret_hex(secret_hex)?;
        Self::from_secret(scheme, &bytes)
    }

    fn from_secp(secret: SecretKey) -> Self {
        let public = PublicKey::from_secret_key(secp(), &secret).serialize_uncompressed();
        KeyMaterial {
            secret: Secret::Secp256k1(secret),
            public_key: public.to_vec(),
            address: secp256k1_address(&public),
        }
    }

    fn from_ed25519(secret: SigningKey) -> Self {
        let public = secret.verifying_key().to_bytes();
        KeyMaterial {
            secret: Secret::Ed25519(secret),
            public_key: public.to_vec(),
            address: ed25519_address(&public),
        }
    }

    pub fn scheme(&self) -> Scheme {
        match self.secret {
            Secret::Secp256k1(_) => Scheme::Secp256k1Keccak,
            Secret::Ed25519(_) => Scheme::Ed25519Blake2b,
        }
    }

    /// Public key bytes: 65-byte uncompressed point or 32-byte ed25519 key
    pub fn public_key(&self) -> &[u8] {
        &self.public_key
    }

    pub fn public_key_hex(&self) -> String {
        hex::encode(&self.public_key)
    }

    pub fn address(&self) -> Address {
        self.address
    }

    /// Export the secret as hex for writing a key file
    ///
    /// ed25519 keys export the 64-byte `seed || public` form.
    pub fn secret_hex(&self) -> Zeroizing<String> {
        match &self.secret {
            Secret::Secp256k1(key) => Zeroizing::new(hex::encode(key.secret_bytes())),
            Secret::Ed25519(key) => Zeroizing::new(hex::encode(key.to_keypair_bytes())),
        }
    }
}

impl Drop for KeyMaterial {
    fn drop(&mut self) {
        // SigningKey zeroizes itself; the secp256k1 scalar needs an explicit wipe
        if let Secret::Secp256k1(key) = &mut self.secret {
            key.non_secure_erase();
        }
    }
}

impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyMaterial")
            .field("scheme", &self.scheme())
            .field("address", &self.address)
            .field("public_key", &self.public_key_hex())
            .finish()
    }
}

// ============================================================================
// ADDRESS DERIVATION
// ============================================================================

/// keccak256 of the uncompressed point without its 0x04 prefix, last 20 bytes
pub fn secp256k1_address(uncompressed: &[u8; 65]) -> Address {
    Address::from_hash(&keccak256(&uncompressed[1..]))
}

/// keyed blake2b of the public key, bytes [12..32]
pub fn ed25519_address(public_key: &[u8; 32]) -> Address {
    Address::from_hash(&blake2b_cryptape(public_key))
}

// ============================================================================
// KEY FILES
// ============================================================================

/// Decode a hex secret, tolerating whitespace and a `0x` prefix
pub fn decode_secret_hex(secret_hex: &str) -> TxResult<Zeroizing<Vec<u8>>> {
    hex::decode(strip_hex_prefix(secret_hex.trim()))
        .map(Zeroizing::new)
        .map_err(|e| TxError::InvalidKeyFormat(format!("secret is not valid hex: {}", e)))
}

/// Read a hex-encoded secret key from a flat file
pub fn load_secret_key(path: impl AsRef<Path>) -> TxResult<Zeroizing<Vec<u8>>> {
    let path = path.as_ref();
    let contents = Zeroizing::new(std::fs::read_to_string(path).map_err(|e| {
        TxError::Config(format!("cannot read key file {}: {}", path.display(), e))
    })?);
    decode_secret_hex(&contents)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secp_known_address() {
        let key = KeyMaterial::from_secret(Scheme::Secp256k1Keccak, &[0x01u8; 32]).unwrap();
        assert_eq!(
            key.address().to_hex(),
            "1a642f0e3c3af545e7acbd38b07251b3990914f1"
        );
        assert_eq!(key.public_key().len(), 65);
        assert_eq!(key.public_key()[0], 0x04);
    }

    #[test]
    fn test_secp_rejects_bad_secret() {
        let short = KeyMaterial::from_secret(Scheme::Secp256k1Keccak, &[0x01u8; 31]);
        assert!(matches!(short, Err(TxError::InvalidKeyFormat(_))));

        let zero = KeyMaterial::from_secret(Scheme::Secp256k1Keccak, &[0u8; 32]);
        assert!(matches!(zero, Err(TxError::InvalidKeyFormat(_))));

        let over_order = KeyMaterial::from_secret(Scheme::Secp256k1Keccak, &[0xffu8; 32]);
        assert!(matches!(over_order, Err(TxError::InvalidKeyFormat(_))));
    }

    #[test]
    fn test_ed25519_seed_and_keypair_forms_agree() {
        let from_seed = KeyMaterial::from_secret(Scheme::Ed25519Blake2b, &[7u8; 32]).unwrap();
        let exported = from_seed.secret_hex();
        let from_pair = KeyMaterial::from_hex(Scheme::Ed25519Blake2b, &exported).unwrap();

        assert_eq!(from_seed.public_key(), from_pair.public_key());
        assert_eq!(from_seed.address(), from_pair.address());
        assert_eq!(from_seed.public_key().len(), 32);
    }

    #[test]
    fn test_ed25519_rejects_mismatched_keypair() {
        let mut pair = SigningKey::from_bytes(&[7u8; 32]).to_keypair_bytes();
        pair[40] ^= 0xff;
        let result = KeyMaterial::from_secret(Scheme::Ed25519Blake2b, &pair);
        assert!(matches!(result, Err(TxError::InvalidKeyFormat(_))));

        let result = KeyMaterial::from_secret(Scheme::Ed25519Blake2b, &[7u8; 48]);
        assert!(matches!(result, Err(TxError::InvalidKeyFormat(_))));
    }

    #[test]
    fn test_ed25519_address_derivation() {
        let key = KeyMaterial::from_secret(Scheme::Ed25519Blake2b, &[9u8; 32]).unwrap();
        let public: [u8; 32] = key.public_key().try_into().unwrap();
        let digest = blake2b_cryptape(&public);
        assert_eq!(key.address().as_bytes()[..], digest[12..]);
    }

    #[test]
    fn test_generate_produces_distinct_keys() {
        for scheme in [Scheme::Secp256k1Keccak, Scheme::Ed25519Blake2b] {
            let a = KeyMaterial::generate(scheme);
            let b = KeyMaterial::generate(scheme);
            assert_eq!(a.scheme(), scheme);
            assert_ne!(a.address(), b.address());
        }
    }

    #[test]
    fn test_hex_round_trip() {
        let key = KeyMaterial::generate(Scheme::Secp256k1Keccak);
        let hex = format!("0x{}\n", key.secret_hex().as_str());
        let loaded = KeyMaterial::from_hex(Scheme::Secp256k1Keccak, &hex).unwrap();
        assert_eq!(key.address(), loaded.address());
    }

    #[test]
    fn test_debug_redacts_secret() {
        let key = KeyMaterial::from_secret(Scheme::Secp256k1Keccak, &[0x01u8; 32]).unwrap();
        let debug = format!("{:?}", key);
        assert!(!debug.contains(key.secret_hex().as_str()));
        assert!(debug.contains("1a642f0e3c3af545e7acbd38b07251b3990914f1"));
    }

    #[test]
    fn test_load_secret_key_from_file() {
        let path = std::env::temp_dir().join(format!("cita-txsigner-key-{}", std::process::id()));
        std::fs::write(&path, format!("0x{}\n", "01".repeat(32))).unwrap();

        let secret = load_secret_key(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(secret.as_slice(), &[0x01u8; 32]);
    }

    #[test]
    fn test_load_secret_key_missing_file() {
        let result = load_secret_key("/nonexistent/cita-txsigner/privkey");
        assert!(matches!(result, Err(TxError::Config(_))));
    }
}
