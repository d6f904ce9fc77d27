//! Keccak256 helpers
//!
//! Transaction and block identity, state roots, and the address of a
//! one-time deposit key all hash with Keccak256.

use crate::errors::Result;
use crate::types::{Address, Hash, B256};
use sha3::{Digest, Keccak256};

pub fn keccak256(data: &[u8]) -> Hash {
    B256::from_slice(&Keccak256::digest(data))
}

/// Hash the bincode encoding of `value`
pub fn hash_struct<T: serde::Serialize>(value: &T) -> Result<Hash> {
    let bytes = bincode::serialize(value)?;
    Ok(keccak256(&bytes))
}

/// Address owning an uncompressed secp256k1 point: `keccak256(x || y)[12..]`
pub fn public_key_address(x: &B256, y: &B256) -> Address {
    let mut hasher = Keccak256::new();
    hasher.update(x);
    hasher.update(y);
    Address::from_slice(&hasher.finalize()[12..])
}
