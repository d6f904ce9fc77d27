//! Chain configuration
//!
//! Fork boundaries that change how blocks are applied, the parameters of the
//! one-time DAO hard-fork mutation, and the static block reward.

use crate::errors::Result;
use crate::types::{Address, BlockNumber, U256};
use serde::{Deserialize, Serialize};

/// Fork schedule and consensus parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainConfig {
    /// Chain ID
    pub chain_id: u64,
    /// From this block on, intermediate roots delete touched empty accounts
    pub eip158_block: Option<BlockNumber>,
    /// From this block on, receipts carry no intermediate root
    pub byzantium_block: Option<BlockNumber>,
    /// Height of the DAO hard fork
    pub dao_fork_block: Option<BlockNumber>,
    /// Whether this chain applies the DAO hard-fork state mutation
    pub dao_fork_support: bool,
    /// Accounts drained at the DAO fork block
    pub dao_drain_list: Vec<Address>,
    /// Recipient of the drained balances
    pub dao_refund_contract: Address,
    /// Reward credited to the block coinbase on finalization
    pub block_reward: U256,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            chain_id: 1,
            eip158_block: Some(0),
            byzantium_block: Some(0),
            dao_fork_block: None,
            dao_fork_support: false,
            dao_drain_list: Vec::new(),
            dao_refund_contract: Address::ZERO,
            block_reward: U256::from(3_000_000_000_000_000_000u128), // 3 ETH
        }
    }
}

impl ChainConfig {
    /// Configuration where every fork is active from genesis
    pub fn all_forks() -> Self {
        Self::default()
    }

    /// Configuration with no fork activated, i.e. per-receipt intermediate roots
    /// that keep touched empty accounts
    pub fn frontier() -> Self {
        Self {
            eip158_block: None,
            byzantium_block: None,
            block_reward: U256::from(5_000_000_000_000_000_000u128), // 5 ETH
            ..Default::default()
        }
    }

    /// Parse a configuration from JSON; missing fields take their defaults
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Whether EIP-158 empty-account deletion is active at `number`
    pub fn is_eip158(&self, number: BlockNumber) -> bool {
        is_forked(self.eip158_block, number)
    }

    /// Whether Byzantium receipt rules are active at `number`
    pub fn is_byzantium(&self, number: BlockNumber) -> bool {
        is_forked(self.byzantium_block, number)
    }

    /// Whether `number` is exactly the DAO hard-fork block on a supporting chain
    pub fn is_dao_fork(&self, number: BlockNumber) -> bool {
        self.dao_fork_support && self.dao_fork_block == Some(number)
    }
}

fn is_forked(fork: Option<BlockNumber>, number: BlockNumber) -> bool {
    fork.is_some_and(|at| at <= number)
}
