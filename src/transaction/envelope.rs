//! Signed Transaction Envelopes
//!
//! An `Envelope` is the unit submitted to a node: the canonical transaction,
//! its signature and the scheme tag, serialized as an `UnverifiedTransaction`.
//! Serialization and hashing happen once, at construction, and the envelope is
//! read-only afterwards. The hash is taken over the serialized bytes, which
//! is how the node computes the transaction id.

use prost::Message;

use super::proto::{self, Crypto};
use super::CanonicalTransaction;
use crate::crypto::{
    sign_bytes, strip_hex_prefix, verify_signature, Address, Hash, Scheme, SignatureBlock,
    TxSigner,
};
use crate::error::{TxError, TxResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    transaction: CanonicalTransaction,
    signature: SignatureBlock,
    /// Serialized inner `Transaction`, the bytes the signature covers
    signed_bytes: Vec<u8>,
    bytes: Vec<u8>,
    hash: Hash,
}

/// Scheme tag written into the envelope
///
/// CITA chains pick their algorithm family at build time and read both
/// families from the default `SECP` slot; `SM2` is reserved.
pub fn crypto_tag(scheme: Scheme) -> Crypto {
    match scheme {
        Scheme::Secp256k1Keccak => Crypto::Secp,
        Scheme::Ed25519Blake2b => Crypto::Secp,
    }
}

impl Envelope {
    /// Encode, digest and sign `transaction`, then seal the result
    pub fn sign<S: TxSigner + ?Sized>(transaction: CanonicalTransaction, signer: &S) -> TxResult<Self> {
        let encoded = transaction.encode();
        let (_, signature) = sign_bytes(signer, &encoded)?;
        Ok(Self::seal(transaction, signature))
    }

    /// Wrap, serialize and hash; the signature is not checked
    pub(crate) fn seal(transaction: CanonicalTransaction, signature: SignatureBlock) -> Self {
        let message = transaction.to_proto();
        Self::wrap(transaction, message, signature)
    }

    fn wrap(
        transaction: CanonicalTransaction,
        message: proto::Transaction,
        signature: SignatureBlock,
    ) -> Self {
        let signed_bytes = message.encode_to_vec();
        let outer = proto::UnverifiedTransaction {
            transaction: Some(message),
            signature: signature.as_bytes().to_vec(),
            crypto: crypto_tag(signature.scheme()) as i32,
        };
        let bytes = outer.encode_to_vec();
        let hash = signature.scheme().digest(&bytes);

        Envelope {
            transaction,
            signature,
            signed_bytes,
            bytes,
            hash,
        }
    }

    /// Parse wire bytes; the scheme is identified by the signature length
    ///
    /// The inner transaction keeps its received field values, so a v0 `to`
    /// written in mixed case or with a `0x` prefix still verifies. Only
    /// protobuf-level non-canonical input (explicit defaults, reordered
    /// fields) is rejected.
    pub fn from_bytes(bytes: &[u8]) -> TxResult<Self> {
        let message = proto::UnverifiedTransaction::decode(bytes)
            .map_err(|e| TxError::Decode(e.to_string()))?;

        if message.crypto != Crypto::Secp as i32 {
            return Err(TxError::Decode(format!(
                "unsupported crypto tag {}",
                message.crypto
            )));
        }
        let scheme = Scheme::from_signature_len(message.signature.len()).ok_or_else(|| {
            TxError::Decode(format!(
                "signature length {} matches no scheme",
                message.signature.len()
            ))
        })?;
        let inner = message
            .transaction
            .ok_or_else(|| TxError::Decode("envelope has no transaction".into()))?;
        let transaction = CanonicalTransaction::from_proto(inner.clone())?;
        let signature = SignatureBlock::new(scheme, message.signature)?;

        let envelope = Self::wrap(transaction, inner, signature);
        if envelope.bytes != bytes {
            return Err(TxError::Decode("envelope bytes are not canonical".into()));
        }
        Ok(envelope)
    }

    /// Parse the hex wire form (optional `0x` prefix)
    pub fn from_hex(hex_str: &str) -> TxResult<Self> {
        let bytes = hex::decode(strip_hex_prefix(hex_str.trim()))
            .map_err(|e| TxError::Decode(format!("envelope is not valid hex: {}", e)))?;
        Self::from_bytes(&bytes)
    }

    pub fn transaction(&self) -> &CanonicalTransaction {
        &self.transaction
    }

    pub fn signature(&self) -> &SignatureBlock {
        &self.signature
    }

    pub fn scheme(&self) -> Scheme {
        self.signature.scheme()
    }

    /// Serialized `UnverifiedTransaction`
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Wire form: lowercase hex, no `0x` prefix
    pub fn to_hex(&self) -> String {
        hex::encode(&self.bytes)
    }

    /// Transaction id: scheme digest of the serialized envelope
    pub fn hash(&self) -> Hash {
        self.hash
    }

    pub fn hash_hex(&self) -> String {
        format!("0x{}", hex::encode(self.hash))
    }

    /// Serialized inner transaction the signature covers
    pub fn signed_bytes(&self) -> &[u8] {
        &self.signed_bytes
    }

    /// Digest the signature covers
    pub fn signing_digest(&self) -> Hash {
        self.scheme().digest(&self.signed_bytes)
    }

    /// Verify the signature and return the sender address
    pub fn sender(&self) -> TxResult<Address> {
        verify_signature(self.scheme(), &self.signing_digest(), self.signature.as_bytes())
    }

    /// Build the record the node's auth service keeps for this envelope
    ///
    /// `signer` is the 64-byte point (prefix dropped) for secp256k1 and the
    /// 32-byte key for ed25519.
    pub fn to_signed_transaction(&self) -> TxResult<proto::SignedTransaction> {
        let signer = match self.scheme() {
            Scheme::Secp256k1Keccak => {
                let public = crate::crypto::recover_public_key(
                    &self.signing_digest(),
                    self.signature.as_bytes(),
                )?;
                public[1..].to_vec()
            }
            Scheme::Ed25519Blake2b => {
                self.sender()?;
                self.signature
                    .embedded_public_key()
                    .map(<[u8]>::to_vec)
                    .unwrap_or_default()
            }
        };
        let transaction_with_sig = proto::UnverifiedTransaction::decode(self.bytes.as_slice())
            .map_err(|e| TxError::Decode(e.to_string()))?;

        Ok(proto::SignedTransaction {
            transaction_with_sig: Some(transaction_with_sig),
            tx_hash: self.hash.to_vec(),
            signer,
        })
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{keccak256, KeyMaterial};
    use crate::transaction::{valid_until_block, ChainSpec, TxVersion, Value};

    fn sample(chain: ChainSpec) -> CanonicalTransaction {
        CanonicalTransaction {
            nonce: "XYZ123".into(),
            quota: 21_000,
            valid_until_block: valid_until_block(10),
            to: Some("0x00000000000000000000000000000000000000aa".parse().unwrap()),
            data: b"call data".to_vec(),
            value: Value::from(1u64),
            chain,
        }
    }

    #[test]
    fn test_secp_envelope_hash_is_over_bytes() {
        let key = KeyMaterial::generate(Scheme::Secp256k1Keccak);
        let envelope = Envelope::sign(sample(ChainSpec::V0 { chain_id: 1 }), &key).unwrap();

        assert_eq!(envelope.hash(), keccak256(envelope.as_bytes()));
        assert_eq!(envelope.to_hex(), hex::encode(envelope.as_bytes()));
        assert!(!envelope.to_hex().starts_with("0x"));
    }

    #[test]
    fn test_ed25519_envelope_hash_uses_blake2b() {
        let key = KeyMaterial::generate(Scheme::Ed25519Blake2b);
        let chain = ChainSpec::for_version(TxVersion::V1, 1).unwrap();
        let envelope = Envelope::sign(sample(chain), &key).unwrap();

        assert_eq!(
            envelope.hash(),
            crate::crypto::blake2b_cryptape(envelope.as_bytes())
        );
        assert_eq!(envelope.sender().unwrap(), key.address());
    }

    #[test]
    fn test_round_trip_through_hex() {
        for scheme in [Scheme::Secp256k1Keccak, Scheme::Ed25519Blake2b] {
            let key = KeyMaterial::generate(scheme);
            let envelope = Envelope::sign(sample(ChainSpec::V0 { chain_id: 3 }), &key).unwrap();

            let parsed = Envelope::from_hex(&format!("0x{}", envelope.to_hex())).unwrap();
            assert_eq!(parsed, envelope);
            assert_eq!(parsed.scheme(), scheme);
            assert_eq!(parsed.sender().unwrap(), key.address());
        }
    }

    #[test]
    fn test_from_bytes_rejects_sm2_tag() {
        let key = KeyMaterial::generate(Scheme::Secp256k1Keccak);
        let envelope = Envelope::sign(sample(ChainSpec::V0 { chain_id: 1 }), &key).unwrap();

        let mut message = proto::UnverifiedTransaction::decode(envelope.as_bytes()).unwrap();
        message.crypto = Crypto::Sm2 as i32;
        let result = Envelope::from_bytes(&message.encode_to_vec());
        assert!(matches!(result, Err(TxError::Decode(_))));
    }

    #[test]
    fn test_from_bytes_rejects_bad_signature_length() {
        let message = proto::UnverifiedTransaction {
            transaction: Some(sample(ChainSpec::V0 { chain_id: 1 }).to_proto()),
            signature: vec![0u8; 70],
            crypto: 0,
        };
        let result = Envelope::from_bytes(&message.encode_to_vec());
        assert!(matches!(result, Err(TxError::Decode(_))));
    }

    #[test]
    fn test_tampered_transaction_changes_sender() {
        let key = KeyMaterial::generate(Scheme::Secp256k1Keccak);
        let envelope = Envelope::sign(sample(ChainSpec::V0 { chain_id: 1 }), &key).unwrap();

        let mut tx = envelope.transaction().clone();
        tx.quota += 1;
        let forged = Envelope::seal(tx, envelope.signature().clone());
        match forged.sender() {
            Ok(address) => assert_ne!(address, key.address()),
            Err(err) => assert!(matches!(err, TxError::InvalidSignature(_))),
        }
    }

    #[test]
    fn test_from_bytes_keeps_received_recipient_spelling() {
        let key = KeyMaterial::from_secret(Scheme::Secp256k1Keccak, &[0x01u8; 32]).unwrap();
        let mut inner = sample(ChainSpec::V0 { chain_id: 1 }).to_proto();
        inner.to = "0x000000000000000000000000000000000000AbCd".into();

        let signed = inner.encode_to_vec();
        let (_, signature) = sign_bytes(&key, &signed).unwrap();
        let wire = proto::UnverifiedTransaction {
            transaction: Some(inner),
            signature: signature.as_bytes().to_vec(),
            crypto: Crypto::Secp as i32,
        }
        .encode_to_vec();

        let envelope = Envelope::from_bytes(&wire).unwrap();
        assert_eq!(envelope.as_bytes(), wire.as_slice());
        assert_eq!(envelope.signed_bytes(), signed.as_slice());
        assert_eq!(envelope.hash(), keccak256(&wire));
        assert_eq!(envelope.sender().unwrap(), key.address());
        assert_eq!(
            envelope.transaction().to.unwrap().to_hex(),
            "000000000000000000000000000000000000abcd"
        );
    }

    #[test]
    fn test_from_bytes_rejects_explicit_default_fields() {
        let key = KeyMaterial::generate(Scheme::Secp256k1Keccak);
        let envelope = Envelope::sign(sample(ChainSpec::V0 { chain_id: 1 }), &key).unwrap();

        // crypto = 0 written explicitly instead of omitted
        let mut wire = envelope.as_bytes().to_vec();
        wire.extend_from_slice(&[0x18, 0x00]);
        assert!(matches!(Envelope::from_bytes(&wire), Err(TxError::Decode(_))));
    }

    #[test]
    fn test_signed_transaction_record() {
        let key = KeyMaterial::generate(Scheme::Secp256k1Keccak);
        let envelope = Envelope::sign(sample(ChainSpec::V0 { chain_id: 1 }), &key).unwrap();

        let record = envelope.to_signed_transaction().unwrap();
        assert_eq!(record.tx_hash, envelope.hash().to_vec());
        assert_eq!(record.signer, key.public_key()[1..].to_vec());
        assert_eq!(
            record.transaction_with_sig.unwrap().encode_to_vec(),
            envelope.as_bytes()
        );
    }

    #[test]
    fn test_signed_transaction_record_ed25519() {
        let key = KeyMaterial::generate(Scheme::Ed25519Blake2b);
        let envelope = Envelope::sign(sample(ChainSpec::V0 { chain_id: 1 }), &key).unwrap();

        let record = envelope.to_signed_transaction().unwrap();
        assert_eq!(record.signer, key.public_key().to_vec());
    }
}
