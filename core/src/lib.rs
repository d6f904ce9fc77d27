//! # Shielded Ledger Core
//!
//! Per-block transaction application for a ledger that carries a shielded
//! value pool next to ordinary account balances.
//!
//! Every transaction in a block passes the shielded-pool guard before it is
//! executed. The guard rejects replayed nullifiers, invalid proofs and reused
//! one-time deposit keys; a single rejection invalidates the whole block.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │      Block      │ ── Header, ordered transactions
//! └────────┬────────┘
//!          │  per transaction
//!          ▼
//! ┌─────────────────┐
//! │ShieldedPoolGuard│ ── Nullifier replay, proof oracle,
//! │                 │    deposit key binding
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │ExecutionEngine  │ ── revm, gas pool, shielded value effect
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │    Receipt      │ ── Root or status, cumulative gas, logs, bloom
//! └────────┬────────┘
//!          │  after the last transaction
//!          ▼
//! ┌─────────────────┐
//! │   Finalizer     │ ── Consensus rewards, then replay batch commit
//! └─────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use shielded_ledger_core::prelude::*;
//!
//! let config = ChainConfig::all_forks();
//! let processor = StateProcessor::new(config.clone(), verifier, Secp256k1Recovery, NoopFinalizer);
//! let mut engine = RevmEngine::new(config);
//! let mut replay = MemoryReplayStore::new();
//!
//! let outcome = processor.process(&block, &mut state, &mut engine, &mut replay)?;
//! println!("gas used: {}", outcome.gas_used);
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Primitive aliases (Address, Hash, Nullifier, Commitment)
//! - [`errors`] - Error taxonomy and Result alias
//! - [`hashing`] - Keccak256 helpers
//! - [`config`] - Chain configuration and fork schedule
//! - [`transaction`] - Transactions and shielded actions
//! - [`block`] - Block and header
//! - [`gas`] - Block gas pool
//! - [`state`] - Ledger state trait and in-memory database
//! - [`replay`] - Replay-protection store and staging batch
//! - [`proof`] - Proof oracle interface
//! - [`signer`] - One-time key signature recovery
//! - [`guard`] - Shielded-pool admission checks
//! - [`engine`] - revm-backed message execution
//! - [`receipt`] - Receipts, logs and blooms
//! - [`finalize`] - End-of-block consensus hook
//! - [`processor`] - Block processing

extern crate alloc;

pub mod block;
pub mod config;
pub mod engine;
pub mod errors;
pub mod finalize;
pub mod gas;
pub mod guard;
pub mod hashing;
pub mod processor;
pub mod proof;
pub mod receipt;
pub mod replay;
pub mod signer;
pub mod state;
pub mod transaction;
pub mod types;

// Re-exports for convenience
pub use block::{Block, BlockHeader};
pub use config::ChainConfig;
pub use engine::{ExecutionEngine, ExecutionResult, RevmEngine};
pub use errors::{Result, ShieldedLedgerError};
pub use finalize::{Finalizer, NoopFinalizer, StaticRewardFinalizer};
pub use gas::GasPool;
pub use guard::{PostEffect, ShieldedPoolGuard};
pub use hashing::{hash_struct, keccak256};
pub use processor::{apply_dao_hard_fork, BlockOutcome, StateProcessor};
pub use proof::{ProofVerifier, VerificationFailure};
pub use receipt::{create_bloom, Log, Receipt, ReceiptStatus};
pub use replay::{MemoryReplayStore, ReplayBatch, ReplayStore};
pub use signer::{Secp256k1Recovery, SignerRecovery};
pub use state::{AccountState, InMemoryDB, LedgerState};
pub use transaction::{RawPublicKey, ShieldedAction, Transaction, TxCode};
pub use types::{Address, Commitment, Gas, Hash, Nullifier, U256};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        AccountState, Address, Block, BlockHeader, BlockOutcome, ChainConfig, Commitment,
        ExecutionEngine, Finalizer, Gas, Hash, InMemoryDB, LedgerState, Log, MemoryReplayStore,
        NoopFinalizer, Nullifier, ProofVerifier, Receipt, ReceiptStatus, ReplayStore, Result,
        RevmEngine, Secp256k1Recovery, ShieldedAction, ShieldedLedgerError, SignerRecovery,
        StateProcessor, Transaction, TxCode, U256,
    };
}
