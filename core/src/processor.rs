//! Block processor
//!
//! Drives the shielded-pool guard and the execution engine across every
//! transaction of a block, in block order, and assembles the receipts.
//!
//! Processing is all-or-nothing: any guard rejection, gas-pool exhaustion or
//! engine error aborts the whole block and nothing is returned but the error.
//! Replay records staged while applying the block are only written to the
//! replay store once the block has been fully accepted. The ledger state passed
//! in is mutated in place; on error the caller must discard it.

extern crate alloc;

use crate::block::{Block, BlockHeader};
use crate::config::ChainConfig;
use crate::engine::ExecutionEngine;
use crate::errors::Result;
use crate::finalize::Finalizer;
use crate::gas::GasPool;
use crate::guard::ShieldedPoolGuard;
use crate::proof::ProofVerifier;
use crate::receipt::{Log, Receipt};
use crate::replay::{ReplayBatch, ReplayStore};
use crate::signer::SignerRecovery;
use crate::state::LedgerState;
use crate::transaction::Transaction;
use crate::types::{Gas, Hash, U256};
use alloc::vec::Vec;
use tracing::{debug, info_span, warn};

const LOG_TARGET: &str = "shielded_ledger::processor";

/// Everything a successfully processed block produces
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockOutcome {
    /// One receipt per transaction, in block order
    pub receipts: Vec<Receipt>,
    /// All logs of the block, concatenated in transaction order
    pub logs: Vec<Log>,
    /// Total gas used by the block
    pub gas_used: Gas,
}

/// Applies blocks to ledger state
pub struct StateProcessor<V, R, F> {
    config: ChainConfig,
    guard: ShieldedPoolGuard<V, R>,
    finalizer: F,
}

impl<V, R, F> StateProcessor<V, R, F>
where
    V: ProofVerifier,
    R: SignerRecovery,
    F: Finalizer,
{
    pub fn new(config: ChainConfig, verifier: V, recovery: R, finalizer: F) -> Self {
        Self {
            config,
            guard: ShieldedPoolGuard::new(verifier, recovery),
            finalizer,
        }
    }

    pub fn config(&self) -> &ChainConfig {
        &self.config
    }

    /// Apply every transaction of `block` to `state`, then finalize the block
    pub fn process<S, E, D>(
        &self,
        block: &Block,
        state: &mut S,
        engine: &mut E,
        store: &mut D,
    ) -> Result<BlockOutcome>
    where
        S: LedgerState,
        E: ExecutionEngine<S>,
        D: ReplayStore,
    {
        let header = &block.header;
        let block_hash = block.hash()?;
        let mut gas_pool = GasPool::new(block.gas_limit());
        let mut used_gas: Gas = 0;
        let mut receipts = Vec::with_capacity(block.transactions.len());
        let mut logs = Vec::new();

        if self.config.is_dao_fork(header.number) {
            apply_dao_hard_fork(&self.config, state);
        }

        let writes = {
            let mut replay = ReplayBatch::new(&*store);
            for (index, tx) in block.transactions.iter().enumerate() {
                let tx_hash = tx.hash()?;
                let span = info_span!(
                    target: LOG_TARGET,
                    "apply_tx",
                    block = header.number,
                    index,
                    tx = %tx_hash,
                    code = %tx.code(),
                );
                let _enter = span.enter();

                state.prepare(tx_hash, block_hash, index);
                let receipt = match self.apply_transaction(
                    header,
                    tx,
                    tx_hash,
                    state,
                    engine,
                    &mut gas_pool,
                    &mut replay,
                    &mut used_gas,
                ) {
                    Ok(receipt) => receipt,
                    Err(err) => {
                        warn!(target: LOG_TARGET, %err, "block rejected");
                        return Err(err);
                    }
                };
                logs.extend(receipt.logs.iter().cloned());
                receipts.push(receipt);
            }

            self.finalizer
                .finalize(header, state, &block.transactions, &receipts)?;
            replay.into_writes()
        };

        if !writes.is_empty() {
            store.write_batch(writes)?;
        }

        debug!(
            target: LOG_TARGET,
            block = header.number,
            txs = receipts.len(),
            gas_used = used_gas,
            "block processed"
        );
        Ok(BlockOutcome {
            receipts,
            logs,
            gas_used: used_gas,
        })
    }

    /// Apply one transaction and build its receipt
    ///
    /// Guard checks run first; a rejection returns before the engine is
    /// invoked, so no gas is charged. `used_gas` is the block's running total
    /// and is advanced by this transaction's consumption.
    #[allow(clippy::too_many_arguments)]
    pub fn apply_transaction<S, E, D>(
        &self,
        header: &BlockHeader,
        tx: &Transaction,
        tx_hash: Hash,
        state: &mut S,
        engine: &mut E,
        gas_pool: &mut GasPool,
        replay: &mut ReplayBatch<'_, D>,
        used_gas: &mut Gas,
    ) -> Result<Receipt>
    where
        S: LedgerState,
        E: ExecutionEngine<S>,
        D: ReplayStore + ?Sized,
    {
        let post_effect = self.guard.check(tx, &*state, replay)?;

        let result = engine.apply_message(header, tx, state, gas_pool)?;
        if let Some(effect) = post_effect {
            self.guard.record_effect(effect, header.number, replay)?;
        }

        let root = if self.config.is_byzantium(header.number) {
            state.finalise(true);
            None
        } else {
            Some(state.intermediate_root(self.config.is_eip158(header.number))?)
        };
        *used_gas += result.gas_used;

        let mut receipt = Receipt::new(root, result.failed, *used_gas);
        receipt.tx_hash = tx_hash;
        receipt.gas_used = result.gas_used;
        if tx.is_create() {
            receipt.contract_address = Some(tx.sender.create(tx.nonce));
        }
        let receipt = receipt.with_logs(state.logs(&tx_hash));

        debug!(
            target: LOG_TARGET,
            gas_used = receipt.gas_used,
            failed = !receipt.is_success(),
            "receipt built"
        );
        Ok(receipt)
    }
}

/// Move every balance in the DAO drain list to the refund contract
pub fn apply_dao_hard_fork<S: LedgerState + ?Sized>(config: &ChainConfig, state: &mut S) {
    let mut drained = U256::ZERO;
    for address in &config.dao_drain_list {
        drained = drained.saturating_add(state.balance(address));
        state.set_balance(*address, U256::ZERO);
    }
    let refund = config.dao_refund_contract;
    let balance = state.balance(&refund).saturating_add(drained);
    state.set_balance(refund, balance);
    debug!(target: LOG_TARGET, %drained, "dao hard fork applied");
}
