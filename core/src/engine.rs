//! Execution engine
//!
//! Applies a transaction's public-ledger effect. [`RevmEngine`] wraps `revm`
//! to run value transfers and contract code deterministically, then applies
//! the shielded ledger effect of an accepted shielded action.

extern crate alloc;

use crate::block::BlockHeader;
use crate::config::ChainConfig;
use crate::errors::{Result, ShieldedLedgerError};
use crate::gas::GasPool;
use crate::receipt::Log;
use crate::state::{AccountState, InMemoryDB, LedgerState};
use crate::transaction::{ShieldedAction, Transaction};
use crate::types::{Address, BlockNumber, Gas, U256};
use alloc::format;
use alloc::vec::Vec;
use revm::primitives::{
    BlockEnv as RevmBlockEnv, CfgEnv, ExecutionResult as RevmResult, Output, ResultAndState,
    SpecId, TxEnv, TxKind,
};
use revm::Evm;
use tracing::trace;

const LOG_TARGET: &str = "shielded_ledger::engine";

/// Outcome of applying one message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionResult {
    /// Gas consumed by the transaction (after refunds)
    pub gas_used: Gas,
    /// Whether execution reverted or halted inside the EVM
    pub failed: bool,
    /// Return data (or revert reason)
    pub return_data: Vec<u8>,
    /// Address of the contract created, if any
    pub created_address: Option<Address>,
}

/// Applies the public value effect of a transaction
///
/// The engine buys gas from `gas_pool` and returns whatever the transaction did
/// not use. A revert is reported through [`ExecutionResult::failed`]; an `Err`
/// means the transaction could not be applied at all and invalidates the block.
pub trait ExecutionEngine<S: LedgerState + ?Sized> {
    fn apply_message(
        &mut self,
        header: &BlockHeader,
        tx: &Transaction,
        state: &mut S,
        gas_pool: &mut GasPool,
    ) -> Result<ExecutionResult>;
}

/// revm-backed engine over [`InMemoryDB`]
#[derive(Debug, Clone)]
pub struct RevmEngine {
    config: ChainConfig,
}

impl RevmEngine {
    pub fn new(config: ChainConfig) -> Self {
        Self { config }
    }

    /// EVM rule set for a block height
    pub fn spec_id(&self, number: BlockNumber) -> SpecId {
        if self.config.is_byzantium(number) {
            SpecId::CANCUN
        } else if self.config.is_eip158(number) {
            SpecId::SPURIOUS_DRAGON
        } else {
            SpecId::HOMESTEAD
        }
    }

    /// Build revm EVM instance for one transaction
    fn build_evm(
        &self,
        header: &BlockHeader,
        tx: &Transaction,
        db: InMemoryDB,
    ) -> Evm<'static, (), InMemoryDB> {
        let mut cfg = CfgEnv::default();
        cfg.chain_id = self.config.chain_id;

        let block_env = RevmBlockEnv {
            number: U256::from(header.number),
            timestamp: U256::from(header.timestamp),
            gas_limit: U256::from(header.gas_limit),
            coinbase: header.coinbase,
            basefee: header.base_fee,
            prevrandao: Some(header.prev_randao),
            ..Default::default()
        };

        let tx_env = TxEnv {
            caller: tx.sender,
            transact_to: match tx.to {
                Some(addr) => TxKind::Call(addr),
                None => TxKind::Create,
            },
            value: tx.value,
            data: tx.data.clone().into(),
            gas_limit: tx.gas_limit,
            gas_price: tx.gas_price,
            nonce: Some(tx.nonce),
            ..Default::default()
        };

        Evm::builder()
            .with_db(db)
            .with_spec_id(self.spec_id(header.number))
            .modify_cfg_env(|c| *c = cfg)
            .modify_block_env(|b| *b = block_env)
            .modify_tx_env(|t| *t = tx_env)
            .build()
    }

    /// Apply state changes from execution result to our database
    ///
    /// Only touched accounts are written back; they stay marked touched until
    /// the next finalise.
    fn apply_state_changes(db: &mut InMemoryDB, result: &ResultAndState) {
        for (addr, account) in &result.state {
            if !account.is_touched() {
                continue;
            }
            if account.is_selfdestructed() {
                db.remove_account(addr);
                continue;
            }

            let info = &account.info;
            let existing = db.account_entry(*addr);
            existing.balance = info.balance;
            existing.nonce = info.nonce;
            if let Some(code) = &info.code {
                if !code.is_empty() && existing.code.is_empty() {
                    existing.code = code.original_bytes().to_vec();
                    existing.code_hash = info.code_hash;
                }
            }
            for (slot, value) in &account.storage {
                existing.set_storage(*slot, value.present_value);
            }
        }
    }

    /// Convert revm logs to ledger logs
    fn convert_logs(logs: &[revm::primitives::Log]) -> Vec<Log> {
        logs.iter()
            .map(|log| Log::new(log.address, log.topics().to_vec(), log.data.data.to_vec()))
            .collect()
    }
}

impl ExecutionEngine<InMemoryDB> for RevmEngine {
    fn apply_message(
        &mut self,
        header: &BlockHeader,
        tx: &Transaction,
        state: &mut InMemoryDB,
        gas_pool: &mut GasPool,
    ) -> Result<ExecutionResult> {
        gas_pool.sub_gas(tx.gas_limit)?;

        let mut evm = self.build_evm(header, tx, state.execution_view());
        let result = evm
            .transact()
            .map_err(|e| ShieldedLedgerError::ExecutionEngineError(format!("{:?}", e)))?;
        drop(evm);

        let gas_used = result.result.gas_used();
        gas_pool.add_gas(tx.gas_limit.saturating_sub(gas_used));
        Self::apply_state_changes(state, &result);

        let outcome = match result.result {
            RevmResult::Success { output, logs, .. } => {
                for log in Self::convert_logs(&logs) {
                    state.add_log(log);
                }
                let (return_data, created_address) = match output {
                    Output::Call(data) => (data.to_vec(), None),
                    Output::Create(data, addr) => (data.to_vec(), addr),
                };
                ExecutionResult {
                    gas_used,
                    failed: false,
                    return_data,
                    created_address,
                }
            }
            RevmResult::Revert { output, .. } => ExecutionResult {
                gas_used,
                failed: true,
                return_data: output.to_vec(),
                created_address: None,
            },
            RevmResult::Halt { reason, .. } => {
                trace!(target: LOG_TARGET, ?reason, "execution halted");
                ExecutionResult {
                    gas_used,
                    failed: true,
                    return_data: Vec::new(),
                    created_address: None,
                }
            }
        };

        if !outcome.failed {
            apply_shielded_effect(state, tx)?;
        }
        Ok(outcome)
    }
}

/// Move value between the public and shielded balances of the sender
///
/// The shielded balance holds the account's current balance commitment; every
/// accepted shielded action replaces it with the action's new commitment.
pub fn apply_shielded_effect<S: LedgerState + ?Sized>(
    state: &mut S,
    tx: &Transaction,
) -> Result<()> {
    let sender = tx.sender;
    match &tx.shielded {
        ShieldedAction::Ordinary => return Ok(()),
        ShieldedAction::Mint { value, .. } => {
            let balance = state.balance(&sender).checked_sub(*value).ok_or_else(|| {
                ShieldedLedgerError::ExecutionEngineError(format!(
                    "insufficient public balance to mint {value}"
                ))
            })?;
            state.set_balance(sender, balance);
        }
        ShieldedAction::Redeem { value, .. } => {
            let balance = state.balance(&sender).checked_add(*value).ok_or_else(|| {
                ShieldedLedgerError::ExecutionEngineError("public balance overflow".into())
            })?;
            state.set_balance(sender, balance);
        }
        ShieldedAction::Send { .. }
        | ShieldedAction::Update { .. }
        | ShieldedAction::Deposit { .. } => {}
    }
    if let Some(commitment) = tx.shielded.commitment() {
        state.set_shielded_balance(sender, U256::from_be_bytes(commitment.0));
    }
    Ok(())
}
