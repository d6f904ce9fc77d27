//! Block types
//!
//! The header doubles as the execution environment handed to the EVM.

use crate::errors::Result;
use crate::hashing::hash_struct;
use crate::transaction::Transaction;
use crate::types::{Address, BlockNumber, Gas, Hash, Timestamp, U256};
use alloc::vec::Vec;
use serde::{Deserialize, Serialize};

extern crate alloc;

/// Block header
///
/// Contains all block-level parameters needed for transaction application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeader {
    /// Hash of the parent block
    pub parent_hash: Hash,
    /// Block number
    pub number: BlockNumber,
    /// Block timestamp (seconds since epoch)
    pub timestamp: Timestamp,
    /// Block gas limit
    pub gas_limit: Gas,
    /// Block coinbase (miner/validator address)
    pub coinbase: Address,
    /// Block base fee (EIP-1559)
    pub base_fee: U256,
    /// Previous block's RANDAO value
    pub prev_randao: Hash,
}

impl Default for BlockHeader {
    fn default() -> Self {
        Self {
            parent_hash: Hash::ZERO,
            number: 1,
            timestamp: 1700000000, // Nov 2023
            gas_limit: 30_000_000,
            coinbase: Address::ZERO,
            base_fee: U256::from(1_000_000_000u64), // 1 gwei
            prev_randao: Hash::ZERO,
        }
    }
}

impl BlockHeader {
    /// Create a header with custom number and gas limit
    pub fn new(number: BlockNumber, gas_limit: Gas) -> Self {
        Self {
            number,
            gas_limit,
            ..Default::default()
        }
    }

    /// Set the coinbase
    pub fn with_coinbase(mut self, coinbase: Address) -> Self {
        self.coinbase = coinbase;
        self
    }

    /// Set the base fee
    pub fn with_base_fee(mut self, base_fee: U256) -> Self {
        self.base_fee = base_fee;
        self
    }

    /// Header hash
    pub fn hash(&self) -> Result<Hash> {
        hash_struct(self)
    }
}

/// A block: header plus ordered transactions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub header: BlockHeader,
    pub transactions: Vec<Transaction>,
}

impl Block {
    pub fn new(header: BlockHeader, transactions: Vec<Transaction>) -> Self {
        Self {
            header,
            transactions,
        }
    }

    pub fn number(&self) -> BlockNumber {
        self.header.number
    }

    pub fn gas_limit(&self) -> Gas {
        self.header.gas_limit
    }

    pub fn hash(&self) -> Result<Hash> {
        self.header.hash()
    }
}
