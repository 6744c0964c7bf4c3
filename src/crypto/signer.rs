//! Dual-scheme signing over canonical transaction bytes.
//!
//! The digest function is always taken from the signer's own scheme, so a
//! keccak digest is never handed to Ed25519 and vice versa.

use ed25519_dalek::{Signature as EdSignature, Signer as _, Verifier as _, VerifyingKey};
use secp256k1::ecdsa::{RecoverableSignature, RecoveryId};
use secp256k1::Message;

use super::keys::{ed25519_address, secp, secp256k1_address, KeyMaterial, Secret};
use super::{Address, Hash, Scheme, ED25519_SIGNATURE_LEN, SECP_SIGNATURE_LEN};
use crate::error::{TxError, TxResult};

/// Scheme-tagged signature bytes
///
/// secp256k1: `r || s || recovery_id` (65 bytes).
/// ed25519: `signature || public_key` (96 bytes).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureBlock {
    scheme: Scheme,
    bytes: Vec<u8>,
}

impl SignatureBlock {
    pub fn new(scheme: Scheme, bytes: Vec<u8>) -> TxResult<Self> {
        if bytes.len() != scheme.signature_len() {
            return Err(TxError::InvalidSignature(format!(
                "{} signature must be {} bytes, got {}",
                scheme,
                scheme.signature_len(),
                bytes.len()
            )));
        }
        Ok(SignatureBlock { scheme, bytes })
    }

    pub fn scheme(&self) -> Scheme {
        self.scheme
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn to_hex(&self) -> String {
        hex::encode(&self.bytes)
    }

    /// The signer public key carried by ed25519 signatures
    pub fn embedded_public_key(&self) -> Option<&[u8]> {
        match self.scheme {
            Scheme::Secp256k1Keccak => None,
            Scheme::Ed25519Blake2b => Some(&self.bytes[64..]),
        }
    }
}

/// Anything that can sign a 32-byte transaction digest
pub trait TxSigner {
    fn scheme(&self) -> Scheme;

    fn sign_digest(&self, digest: &Hash) -> TxResult<SignatureBlock>;
}

/// Digest `bytes` with the signer's scheme and sign the digest
pub fn sign_bytes<S: TxSigner + ?Sized>(signer: &S, bytes: &[u8]) -> TxResult<(Hash, SignatureBlock)> {
    let scheme = signer.scheme();
    let digest = scheme.digest(bytes);
    let signature = signer.sign_digest(&digest)?;
    if signature.scheme() != scheme {
        return Err(TxError::SchemeMismatch {
            expected: scheme,
            found: signature.scheme(),
        });
    }
    Ok((digest, signature))
}

impl TxSigner for KeyMaterial {
    fn scheme(&self) -> Scheme {
        KeyMaterial::scheme(self)
    }

    fn sign_digest(&self, digest: &Hash) -> TxResult<SignatureBlock> {
        match &self.secret {
            Secret::Secp256k1(key) => {
                let message = Message::from_digest(*digest);
                let signature = secp().sign_ecdsa_recoverable(&message, key);
                let (recovery_id, compact) = signature.serialize_compact();
                let recovery_byte = u8::try_from(recovery_id.to_i32())
                    .map_err(|e| TxError::SigningError(format!("recovery id: {}", e)))?;

                let mut bytes = Vec::with_capacity(SECP_SIGNATURE_LEN);
                bytes.extend_from_slice(&compact);
                bytes.push(recovery_byte);
                SignatureBlock::new(Scheme::Secp256k1Keccak, bytes)
                    .map_err(|e| TxError::SigningError(e.to_string()))
            }
            Secret::Ed25519(key) => {
                let signature = key.sign(digest);

                let mut bytes = Vec::with_capacity(ED25519_SIGNATURE_LEN);
                bytes.extend_from_slice(&signature.to_bytes());
                bytes.extend_from_slice(key.verifying_key().as_bytes());
                SignatureBlock::new(Scheme::Ed25519Blake2b, bytes)
                    .map_err(|e| TxError::SigningError(e.to_string()))
            }
        }
    }
}

// ============================================================================
// VERIFICATION
// ============================================================================

/// Reconstruct the uncompressed secp256k1 public key from a 65-byte signature
pub fn recover_public_key(digest: &Hash, signature: &[u8]) -> TxResult<[u8; 65]> {
    if signature.len() != SECP_SIGNATURE_LEN {
        return Err(TxError::InvalidSignature(format!(
            "expected {} bytes, got {}",
            SECP_SIGNATURE_LEN,
            signature.len()
        )));
    }
    let recovery_id = RecoveryId::from_i32(i32::from(signature[64]))
        .map_err(|e| TxError::InvalidSignature(format!("recovery id: {}", e)))?;
    let recoverable = RecoverableSignature::from_compact(&signature[..64], recovery_id)
        .map_err(|e| TxError::InvalidSignature(e.to_string()))?;
    let public = secp()
        .recover_ecdsa(&Message::from_digest(*digest), &recoverable)
        .map_err(|e| TxError::InvalidSignature(e.to_string()))?;
    Ok(public.serialize_uncompressed())
}

/// Check a signature against its digest and return the signer address
///
/// secp256k1 recovers the key; ed25519 verifies against the carried key.
pub fn verify_signature(scheme: Scheme, digest: &Hash, signature: &[u8]) -> TxResult<Address> {
    match scheme {
        Scheme::Secp256k1Keccak => {
            let public = recover_public_key(digest, signature)?;
            Ok(secp256k1_address(&public))
        }
        Scheme::Ed25519Blake2b => {
            if signature.len() != ED25519_SIGNATURE_LEN {
                return Err(TxError::InvalidSignature(format!(
                    "expected {} bytes, got {}",
                    ED25519_SIGNATURE_LEN,
                    signature.len()
                )));
            }
            let (sig_bytes, public_bytes) = signature.split_at(64);
            let public: [u8; 32] = public_bytes
                .try_into()
                .map_err(|_| TxError::InvalidSignature("public key must be 32 bytes".into()))?;
            let sig_array: [u8; 64] = sig_bytes
                .try_into()
                .map_err(|_| TxError::InvalidSignature("signature must be 64 bytes".into()))?;

            let verifying_key = VerifyingKey::from_bytes(&public)
                .map_err(|e| TxError::InvalidSignature(e.to_string()))?;
            verifying_key
                .verify(digest, &EdSignature::from_bytes(&sig_array))
                .map_err(|_| TxError::InvalidSignature("ed25519 signature does not match".into()))?;
            Ok(ed25519_address(&public))
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{blake2b_cryptape, keccak256};

    #[test]
    fn test_secp_signature_layout() {
        let key = KeyMaterial::from_secret(Scheme::Secp256k1Keccak, &[0x01u8; 32]).unwrap();
        let (digest, signature) = sign_bytes(&key, b"canonical").unwrap();

        assert_eq!(digest, keccak256(b"canonical"));
        assert_eq!(signature.as_bytes().len(), 65);
        assert!(signature.as_bytes()[64] <= 3);
        assert!(signature.embedded_public_key().is_none());
    }

    #[test]
    fn test_secp_signing_is_deterministic() {
        let key = KeyMaterial::from_secret(Scheme::Secp256k1Keccak, &[0x02u8; 32]).unwrap();
        let (_, first) = sign_bytes(&key, b"same bytes").unwrap();
        let (_, second) = sign_bytes(&key, b"same bytes").unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_secp_recovery_matches_signer() {
        let key = KeyMaterial::generate(Scheme::Secp256k1Keccak);
        let (digest, signature) = sign_bytes(&key, b"recover me").unwrap();

        let public = recover_public_key(&digest, signature.as_bytes()).unwrap();
        assert_eq!(&public[..], key.public_key());

        let address = verify_signature(Scheme::Secp256k1Keccak, &digest, signature.as_bytes()).unwrap();
        assert_eq!(address, key.address());
    }

    #[test]
    fn test_ed25519_signature_layout() {
        let key = KeyMaterial::from_secret(Scheme::Ed25519Blake2b, &[5u8; 32]).unwrap();
        let (digest, signature) = sign_bytes(&key, b"canonical").unwrap();

        assert_eq!(digest, blake2b_cryptape(b"canonical"));
        assert_eq!(signature.as_bytes().len(), 96);
        assert_eq!(signature.embedded_public_key(), Some(key.public_key()));

        let address = verify_signature(Scheme::Ed25519Blake2b, &digest, signature.as_bytes()).unwrap();
        assert_eq!(address, key.address());
    }

    #[test]
    fn test_ed25519_tampered_signature_rejected() {
        let key = KeyMaterial::from_secret(Scheme::Ed25519Blake2b, &[5u8; 32]).unwrap();
        let (digest, signature) = sign_bytes(&key, b"canonical").unwrap();

        let mut bytes = signature.as_bytes().to_vec();
        bytes[0] ^= 0xff;
        let result = verify_signature(Scheme::Ed25519Blake2b, &digest, &bytes);
        assert!(matches!(result, Err(TxError::InvalidSignature(_))));
    }

    #[test]
    fn test_secp_wrong_digest_recovers_other_address() {
        let key = KeyMaterial::generate(Scheme::Secp256k1Keccak);
        let (_, signature) = sign_bytes(&key, b"signed message").unwrap();

        let other = keccak256(b"different");
        match verify_signature(Scheme::Secp256k1Keccak, &other, signature.as_bytes()) {
            Ok(address) => assert_ne!(address, key.address()),
            Err(err) => assert!(matches!(err, TxError::InvalidSignature(_))),
        }
    }

    #[test]
    fn test_signature_block_length_checked() {
        let result = SignatureBlock::new(Scheme::Secp256k1Keccak, vec![0u8; 96]);
        assert!(matches!(result, Err(TxError::InvalidSignature(_))));
        let result = SignatureBlock::new(Scheme::Ed25519Blake2b, vec![0u8; 65]);
        assert!(matches!(result, Err(TxError::InvalidSignature(_))));
    }

    struct WrongSchemeSigner;

    impl TxSigner for WrongSchemeSigner {
        fn scheme(&self) -> Scheme {
            Scheme::Secp256k1Keccak
        }

        fn sign_digest(&self, _digest: &Hash) -> TxResult<SignatureBlock> {
            SignatureBlock::new(Scheme::Ed25519Blake2b, vec![0u8; 96])
        }
    }

    #[test]
    fn test_sign_bytes_rejects_scheme_mixing() {
        let result = sign_bytes(&WrongSchemeSigner, b"bytes");
        assert!(matches!(result, Err(TxError::SchemeMismatch { .. })));
    }
}
