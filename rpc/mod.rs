// ============================================================================
// RPC Module - CITA Node Communication
// ============================================================================
//
// JSON-RPC client for the node the signer talks to: height and chain id
// for assembly, raw transaction submission and receipt lookup.
//
// Components:
//   - cita_rpc: JSON-RPC client with mock mode and oracle impls
//
// ============================================================================

pub mod cita_rpc;

pub use cita_rpc::*;
