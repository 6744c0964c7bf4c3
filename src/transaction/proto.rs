//! Protobuf messages accepted by CITA nodes.
//!
//! Field tags are consensus-relevant: nodes re-serialize these messages to
//! verify signatures, so they must never be renumbered.

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Transaction {
    /// v0 recipient: hex string of the address, empty for contract creation
    #[prost(string, tag = "1")]
    pub to: String,
    #[prost(string, tag = "2")]
    pub nonce: String,
    #[prost(uint64, tag = "3")]
    pub quota: u64,
    #[prost(uint64, tag = "4")]
    pub valid_until_block: u64,
    #[prost(bytes = "vec", tag = "5")]
    pub data: Vec<u8>,
    /// 32-byte big-endian U256
    #[prost(bytes = "vec", tag = "6")]
    pub value: Vec<u8>,
    #[prost(uint32, tag = "7")]
    pub chain_id: u32,
    #[prost(uint32, tag = "8")]
    pub version: u32,
    /// v1 recipient: raw 20 address bytes
    #[prost(bytes = "vec", tag = "9")]
    pub to_v1: Vec<u8>,
    /// v1 chain id: 32-byte big-endian
    #[prost(bytes = "vec", tag = "10")]
    pub chain_id_v1: Vec<u8>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct UnverifiedTransaction {
    #[prost(message, optional, tag = "1")]
    pub transaction: Option<Transaction>,
    #[prost(bytes = "vec", tag = "2")]
    pub signature: Vec<u8>,
    #[prost(enumeration = "Crypto", tag = "3")]
    pub crypto: i32,
}

/// Record kept by the node's auth service after signature checking
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SignedTransaction {
    #[prost(message, optional, tag = "1")]
    pub transaction_with_sig: Option<UnverifiedTransaction>,
    #[prost(bytes = "vec", tag = "2")]
    pub tx_hash: Vec<u8>,
    #[prost(bytes = "vec", tag = "3")]
    pub signer: Vec<u8>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum Crypto {
    /// Default slot: the chain's built-in algorithm family
    Secp = 0,
    Sm2 = 1,
}
