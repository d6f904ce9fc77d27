/*
Error types for shielded ledger block processing
Every variant aborts the block that produced it.
*/

use crate::transaction::TxCode;
use crate::types::{Address, Gas, Nullifier};
use thiserror::Error;

/// Errors that can occur while applying a block
#[derive(Debug, Error)]
pub enum ShieldedLedgerError {
    /// Transaction cannot be interpreted as a valid message
    #[error("malformed transaction: {0}")]
    MalformedTransaction(String),

    /// Nullifier already present in the replay store
    #[error("nullifier {0} is already used")]
    ReplayedNullifier(Nullifier),

    /// Proof oracle rejected the proof for the claimed variant
    #[error("invalid {kind} proof: {reason}")]
    InvalidProof { kind: TxCode, reason: String },

    /// Deposit public key does not derive the signer's address
    #[error("invalid deposit binding: key derives {derived}, signature recovers {recovered}")]
    InvalidDepositBinding { derived: Address, recovered: Address },

    /// One-time key already claimed by an earlier deposit
    #[error("one-time key {0} cannot be used a second time")]
    OneTimeKeyReused(Address),

    /// Transaction gas exceeds what is left in the block gas pool
    #[error("gas limit reached: wanted {wanted}, {available} available")]
    GasLimitExceeded { wanted: Gas, available: Gas },

    /// Execution engine reported an unrecoverable error
    #[error("execution engine error: {0}")]
    ExecutionEngineError(String),

    /// Replay-protection store backend failure
    #[error("replay store error: {0}")]
    Storage(String),

    /// Ledger state backend failure
    #[error("database error: {0}")]
    Database(String),

    /// Chain configuration could not be loaded
    #[error("invalid chain config: {0}")]
    Config(String),
}

/// Result type for shielded ledger operations
pub type Result<T> = core::result::Result<T, ShieldedLedgerError>;

impl From<bincode::Error> for ShieldedLedgerError {
    fn from(err: bincode::Error) -> Self {
        ShieldedLedgerError::MalformedTransaction(err.to_string())
    }
}

impl From<serde_json::Error> for ShieldedLedgerError {
    fn from(err: serde_json::Error) -> Self {
        ShieldedLedgerError::Config(err.to_string())
    }
}

impl ShieldedLedgerError {
    /// Whether this error came from the shielded-pool guard rather than execution
    pub fn is_guard_rejection(&self) -> bool {
        matches!(
            self,
            ShieldedLedgerError::ReplayedNullifier(_)
                | ShieldedLedgerError::InvalidProof { .. }
                | ShieldedLedgerError::InvalidDepositBinding { .. }
                | ShieldedLedgerError::OneTimeKeyReused(_)
        )
    }
}
