//! Block finalization
//!
//! Consensus-specific state changes applied once every transaction of a block
//! has been accepted.

use crate::block::BlockHeader;
use crate::config::ChainConfig;
use crate::errors::{Result, ShieldedLedgerError};
use crate::receipt::Receipt;
use crate::state::LedgerState;
use crate::transaction::Transaction;
use crate::types::U256;
use tracing::debug;

const LOG_TARGET: &str = "shielded_ledger::finalize";

/// Consensus hook run after the last transaction of a block
pub trait Finalizer {
    fn finalize(
        &self,
        header: &BlockHeader,
        state: &mut dyn LedgerState,
        transactions: &[Transaction],
        receipts: &[Receipt],
    ) -> Result<()>;
}

/// Finalizer that changes nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopFinalizer;

impl Finalizer for NoopFinalizer {
    fn finalize(
        &self,
        _header: &BlockHeader,
        _state: &mut dyn LedgerState,
        _transactions: &[Transaction],
        _receipts: &[Receipt],
    ) -> Result<()> {
        Ok(())
    }
}

/// Credits a fixed reward to the block coinbase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StaticRewardFinalizer {
    reward: U256,
}

impl StaticRewardFinalizer {
    pub fn new(reward: U256) -> Self {
        Self { reward }
    }

    /// Reward taken from [`ChainConfig::block_reward`]
    pub fn from_config(config: &ChainConfig) -> Self {
        Self::new(config.block_reward)
    }
}

impl Finalizer for StaticRewardFinalizer {
    fn finalize(
        &self,
        header: &BlockHeader,
        state: &mut dyn LedgerState,
        _transactions: &[Transaction],
        _receipts: &[Receipt],
    ) -> Result<()> {
        let balance = state
            .balance(&header.coinbase)
            .checked_add(self.reward)
            .ok_or_else(|| ShieldedLedgerError::Database("coinbase balance overflow".into()))?;
        state.set_balance(header.coinbase, balance);
        debug!(
            target: LOG_TARGET,
            coinbase = %header.coinbase,
            reward = %self.reward,
            "block reward applied"
        );
        Ok(())
    }
}
