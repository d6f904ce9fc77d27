//! Replay-protection records
//!
//! Spent nullifiers, the commitment-to-block index and claimed one-time keys
//! live in a key/value store next to the ledger state, addressed with fixed
//! namespace prefixes. Writes made while applying a block are staged in a
//! [`ReplayBatch`] and reach the store in one `write_batch` call once the whole
//! block has been accepted.

use crate::errors::Result;
use crate::types::{Address, BlockNumber, Commitment, Nullifier};
use alloc::collections::BTreeMap;
use alloc::vec::Vec;

extern crate alloc;

/// Namespace of spent-nullifier records
pub const NULLIFIER_PREFIX: &[u8] = b"cmt";
/// Namespace of the commitment-to-block index
pub const COMMITMENT_BLOCK_PREFIX: &[u8] = b"cmtblock";
/// Namespace of claimed one-time keys
pub const ONE_TIME_KEY_PREFIX: &[u8] = b"randompubkeyb";

/// Key of the spent record for `nullifier`
pub fn nullifier_key(nullifier: &Nullifier) -> Vec<u8> {
    [NULLIFIER_PREFIX, nullifier.as_slice()].concat()
}

/// Key of the index entry for `commitment`
pub fn commitment_block_key(commitment: &Commitment) -> Vec<u8> {
    [COMMITMENT_BLOCK_PREFIX, commitment.as_slice()].concat()
}

/// Key of the usage record for the one-time key owning `address`
pub fn one_time_key_key(address: &Address) -> Vec<u8> {
    [ONE_TIME_KEY_PREFIX, address.as_slice()].concat()
}

/// Persistent key/value store holding replay-protection records
///
/// `get` must distinguish absence (`Ok(None)`) from backend failure (`Err`).
pub trait ReplayStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>>;

    /// Apply all writes or none of them
    fn write_batch(&mut self, writes: Vec<(Vec<u8>, Vec<u8>)>) -> Result<()>;

    fn contains(&self, key: &[u8]) -> Result<bool> {
        Ok(self.get(key)?.is_some())
    }

    fn put(&mut self, key: Vec<u8>, value: Vec<u8>) -> Result<()> {
        self.write_batch(vec![(key, value)])
    }
}

/// In-memory replay store
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryReplayStore {
    records: BTreeMap<Vec<u8>, Vec<u8>>,
}

impl MemoryReplayStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Whether `nullifier` has been spent
    pub fn is_spent(&self, nullifier: &Nullifier) -> bool {
        self.records.contains_key(&nullifier_key(nullifier))
    }

    /// Block in which `commitment` was created by a Send
    pub fn commitment_block(&self, commitment: &Commitment) -> Option<BlockNumber> {
        self.records
            .get(&commitment_block_key(commitment))
            .and_then(|value| decode_block_number(value))
    }

    /// Whether the one-time key owning `address` has been claimed
    pub fn is_key_claimed(&self, address: &Address) -> bool {
        self.records.contains_key(&one_time_key_key(address))
    }
}

impl ReplayStore for MemoryReplayStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(self.records.get(key).cloned())
    }

    fn write_batch(&mut self, writes: Vec<(Vec<u8>, Vec<u8>)>) -> Result<()> {
        self.records.extend(writes);
        Ok(())
    }
}

/// Block number encoding used by the commitment index
pub fn encode_block_number(number: BlockNumber) -> Vec<u8> {
    number.to_be_bytes().to_vec()
}

/// Inverse of [`encode_block_number`]
pub fn decode_block_number(value: &[u8]) -> Option<BlockNumber> {
    let bytes: [u8; 8] = value.try_into().ok()?;
    Some(BlockNumber::from_be_bytes(bytes))
}

/// Writes staged over a [`ReplayStore`] while a block is applied
///
/// Reads see staged writes first, so a record staged by one transaction is
/// visible to every later transaction of the same block.
pub struct ReplayBatch<'a, S: ReplayStore + ?Sized> {
    store: &'a S,
    staged: BTreeMap<Vec<u8>, Vec<u8>>,
}

impl<'a, S: ReplayStore + ?Sized> ReplayBatch<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self {
            store,
            staged: BTreeMap::new(),
        }
    }

    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        match self.staged.get(key) {
            Some(value) => Ok(Some(value.clone())),
            None => self.store.get(key),
        }
    }

    pub fn contains(&self, key: &[u8]) -> Result<bool> {
        if self.staged.contains_key(key) {
            return Ok(true);
        }
        self.store.contains(key)
    }

    pub fn put(&mut self, key: Vec<u8>, value: Vec<u8>) {
        self.staged.insert(key, value);
    }

    /// Stage `key` only if it is absent from both the batch and the store
    ///
    /// Returns `false` without staging anything when the key already exists.
    pub fn put_if_absent(&mut self, key: Vec<u8>, value: Vec<u8>) -> Result<bool> {
        if self.contains(&key)? {
            return Ok(false);
        }
        self.staged.insert(key, value);
        Ok(true)
    }

    pub fn len(&self) -> usize {
        self.staged.len()
    }

    pub fn is_empty(&self) -> bool {
        self.staged.is_empty()
    }

    /// Consume the batch, returning the staged writes in key order
    pub fn into_writes(self) -> Vec<(Vec<u8>, Vec<u8>)> {
        self.staged.into_iter().collect()
    }
}

/// Replay store whose reads always fail; for exercising error paths
#[cfg(test)]
pub(crate) struct FailingStore;

#[cfg(test)]
impl ReplayStore for FailingStore {
    fn get(&self, _key: &[u8]) -> Result<Option<Vec<u8>>> {
        Err(crate::errors::ShieldedLedgerError::Storage("disk unavailable".into()))
    }

    fn write_batch(&mut self, _writes: Vec<(Vec<u8>, Vec<u8>)>) -> Result<()> {
        Err(crate::errors::ShieldedLedgerError::Storage("disk unavailable".into()))
    }
}
