//! Transaction model
//!
//! A transaction is an ordinary EVM message plus an optional shielded action.
//! The shielded action is a tagged union: each variant carries exactly the
//! fields its proof needs, so dispatch is a single exhaustive match.

use crate::errors::{Result, ShieldedLedgerError};
use crate::hashing::{hash_struct, public_key_address};
use crate::types::{Address, Commitment, Gas, Hash, Nonce, Nullifier, B256, U256};
use alloc::vec::Vec;
use core::fmt;
use serde::{Deserialize, Serialize};

extern crate alloc;

/// Wire-level transaction code selecting the shielded variant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum TxCode {
    /// Plain value transfer or contract call; bypasses the shielded pool
    Ordinary = 0,
    /// Move public balance into the shielded pool
    Mint = 1,
    /// Transfer shielded value to a new commitment
    Send = 2,
    /// Advance the sender's commitment pointer
    Update = 3,
    /// Receive a shielded transfer with a one-time key
    Deposit = 4,
    /// Move shielded value back to the public balance
    Redeem = 5,
}

impl TryFrom<u8> for TxCode {
    type Error = ShieldedLedgerError;

    fn try_from(code: u8) -> Result<Self> {
        match code {
            0 => Ok(TxCode::Ordinary),
            1 => Ok(TxCode::Mint),
            2 => Ok(TxCode::Send),
            3 => Ok(TxCode::Update),
            4 => Ok(TxCode::Deposit),
            5 => Ok(TxCode::Redeem),
            other => Err(ShieldedLedgerError::MalformedTransaction(format!(
                "unknown transaction code {other}"
            ))),
        }
    }
}

impl fmt::Display for TxCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TxCode::Ordinary => "ordinary",
            TxCode::Mint => "mint",
            TxCode::Send => "send",
            TxCode::Update => "update",
            TxCode::Deposit => "deposit",
            TxCode::Redeem => "redeem",
        };
        f.write_str(name)
    }
}

/// Uncompressed secp256k1 public key coordinates of a one-time key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawPublicKey {
    pub x: B256,
    pub y: B256,
}

impl RawPublicKey {
    pub fn new(x: B256, y: B256) -> Self {
        Self { x, y }
    }

    /// Address owned by this key
    pub fn address(&self) -> Address {
        public_key_address(&self.x, &self.y)
    }
}

/// Shielded part of a transaction
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ShieldedAction {
    /// No shielded effect
    #[default]
    Ordinary,
    Mint {
        nullifier: Nullifier,
        commitment: Commitment,
        value: U256,
        proof: Vec<u8>,
    },
    Send {
        nullifier: Nullifier,
        commitment: Commitment,
        proof: Vec<u8>,
    },
    Update {
        /// Prior commitment the proof is relative to
        root: Commitment,
        commitment: Commitment,
        proof: Vec<u8>,
    },
    Deposit {
        public_key: RawPublicKey,
        root: Commitment,
        nullifier: Nullifier,
        commitment: Commitment,
        proof: Vec<u8>,
        /// 65-byte `r || s || v` signature by the one-time key over the signing hash
        key_signature: Vec<u8>,
    },
    Redeem {
        nullifier: Nullifier,
        commitment: Commitment,
        value: U256,
        proof: Vec<u8>,
    },
}

impl ShieldedAction {
    /// Wire code of this action
    pub fn code(&self) -> TxCode {
        match self {
            ShieldedAction::Ordinary => TxCode::Ordinary,
            ShieldedAction::Mint { .. } => TxCode::Mint,
            ShieldedAction::Send { .. } => TxCode::Send,
            ShieldedAction::Update { .. } => TxCode::Update,
            ShieldedAction::Deposit { .. } => TxCode::Deposit,
            ShieldedAction::Redeem { .. } => TxCode::Redeem,
        }
    }

    /// Nullifier consumed by this action, if any
    pub fn nullifier(&self) -> Option<&Nullifier> {
        match self {
            ShieldedAction::Mint { nullifier, .. }
            | ShieldedAction::Send { nullifier, .. }
            | ShieldedAction::Deposit { nullifier, .. }
            | ShieldedAction::Redeem { nullifier, .. } => Some(nullifier),
            ShieldedAction::Ordinary | ShieldedAction::Update { .. } => None,
        }
    }

    /// Commitment created by this action, if any
    pub fn commitment(&self) -> Option<&Commitment> {
        match self {
            ShieldedAction::Ordinary => None,
            ShieldedAction::Mint { commitment, .. }
            | ShieldedAction::Send { commitment, .. }
            | ShieldedAction::Update { commitment, .. }
            | ShieldedAction::Deposit { commitment, .. }
            | ShieldedAction::Redeem { commitment, .. } => Some(commitment),
        }
    }

    /// Check if this is a proof-bearing action
    pub fn is_shielded(&self) -> bool {
        !matches!(self, ShieldedAction::Ordinary)
    }
}

/// A signed ledger transaction
///
/// `sender` is the address recovered from the outer transaction signature by the
/// submission layer; the core only ever reads it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Message sender
    pub sender: Address,
    /// Recipient (None for contract creation)
    pub to: Option<Address>,
    /// Sender nonce
    pub nonce: Nonce,
    /// Public value to transfer (in wei)
    pub value: U256,
    /// Gas limit for execution
    pub gas_limit: Gas,
    /// Gas price
    pub gas_price: U256,
    /// Calldata or init code
    pub data: Vec<u8>,
    /// Shielded-pool action
    pub shielded: ShieldedAction,
}

impl Default for Transaction {
    fn default() -> Self {
        Self {
            sender: Address::ZERO,
            to: None,
            nonce: 0,
            value: U256::ZERO,
            data: Vec::new(),
            gas_limit: 10_000_000,
            gas_price: U256::from(1_000_000_000u64), // 1 gwei
            shielded: ShieldedAction::Ordinary,
        }
    }
}

impl Transaction {
    /// Create a simple call transaction
    pub fn call(sender: Address, to: Address, data: Vec<u8>) -> Self {
        Self {
            sender,
            to: Some(to),
            data,
            ..Default::default()
        }
    }

    /// Create a value transfer transaction
    pub fn transfer(sender: Address, to: Address, value: U256) -> Self {
        Self {
            sender,
            to: Some(to),
            value,
            gas_limit: 21_000,
            ..Default::default()
        }
    }

    /// Create a contract creation transaction
    pub fn create(sender: Address, init_code: Vec<u8>, value: U256) -> Self {
        Self {
            sender,
            to: None,
            data: init_code,
            value,
            ..Default::default()
        }
    }

    /// Attach a shielded action
    pub fn with_shielded(mut self, shielded: ShieldedAction) -> Self {
        self.shielded = shielded;
        self
    }

    pub fn with_gas_limit(mut self, gas_limit: Gas) -> Self {
        self.gas_limit = gas_limit;
        self
    }

    pub fn with_gas_price(mut self, gas_price: U256) -> Self {
        self.gas_price = gas_price;
        self
    }

    pub fn with_nonce(mut self, nonce: Nonce) -> Self {
        self.nonce = nonce;
        self
    }

    /// Transaction code selecting the shielded variant
    pub fn code(&self) -> TxCode {
        self.shielded.code()
    }

    /// Check if this is a contract creation
    pub fn is_create(&self) -> bool {
        self.to.is_none()
    }

    /// Transaction hash (Keccak256 of the bincode encoding)
    pub fn hash(&self) -> Result<Hash> {
        hash_struct(self)
    }

    /// Hash signed by a Deposit's one-time key
    ///
    /// Same as [`Transaction::hash`] with the key signature blanked out, so the
    /// signature cannot cover itself.
    pub fn signing_hash(&self) -> Result<Hash> {
        match &self.shielded {
            ShieldedAction::Deposit { .. } => {
                let mut unsigned = self.clone();
                if let ShieldedAction::Deposit { key_signature, .. } = &mut unsigned.shielded {
                    key_signature.clear();
                }
                hash_struct(&unsigned)
            }
            _ => hash_struct(self),
        }
    }
}
