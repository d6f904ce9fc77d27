//! Primitive types of the shielded ledger, on top of alloy-primitives

pub use alloy_primitives::{Address, Bloom, BloomInput, B256, U256};

/// 32-byte Keccak256 output
pub type Hash = B256;

/// Serial number revealed when a shielded note is spent
pub type Nullifier = B256;

/// Opaque binding reference to a newly created shielded note
pub type Commitment = B256;

pub type Nonce = u64;

pub type Gas = u64;

pub type BlockNumber = u64;

/// Seconds since the Unix epoch
pub type Timestamp = u64;
