//! Ledger state
//!
//! [`LedgerState`] is the accessor contract the block processor consumes.
//! [`InMemoryDB`] implements it together with `revm::Database`, using a
//! simplified BTreeMap model (not a Merkle Patricia Trie).

use crate::errors::{Result, ShieldedLedgerError};
use crate::hashing::{hash_struct, keccak256};
use crate::receipt::Log;
use crate::types::{Address, Hash, U256};
use alloc::collections::{BTreeMap, BTreeSet};
use alloc::vec::Vec;
use revm::primitives::{AccountInfo, Bytecode, KECCAK_EMPTY};
use revm::Database;
use serde::{Deserialize, Serialize};

extern crate alloc;

/// Accessor contract over the authenticated ledger state
pub trait LedgerState {
    /// Public balance of `address`
    fn balance(&self, address: &Address) -> U256;

    /// Overwrite the public balance of `address`, creating the account if needed
    fn set_balance(&mut self, address: Address, balance: U256);

    /// Shielded balance (current commitment value) of `address`
    fn shielded_balance(&self, address: &Address) -> U256;

    /// Overwrite the shielded balance of `address`, creating the account if needed
    fn set_shielded_balance(&mut self, address: Address, value: U256);

    /// Finalise pending changes and compute the state root
    fn intermediate_root(&mut self, delete_empty: bool) -> Result<Hash>;

    /// Finalise pending changes without computing a root
    fn finalise(&mut self, delete_empty: bool);

    /// Set the transaction context subsequent logs are attributed to
    fn prepare(&mut self, tx_hash: Hash, block_hash: Hash, tx_index: usize);

    /// Record a log under the prepared transaction
    fn add_log(&mut self, log: Log);

    /// Logs recorded for `tx_hash`
    fn logs(&self, tx_hash: &Hash) -> Vec<Log>;
}

/// Account state representation
///
/// Contains all account data needed for EVM execution plus the
/// account's shielded balance.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountState {
    /// Account balance in wei
    pub balance: U256,
    /// Shielded balance, held in the privacy pool
    pub shielded_balance: U256,
    /// Transaction nonce
    pub nonce: u64,
    /// Hash of contract code (KECCAK_EMPTY if EOA)
    pub code_hash: Hash,
    /// Contract bytecode (empty for EOA)
    pub code: Vec<u8>,
    /// Storage slots (key -> value)
    pub storage: BTreeMap<U256, U256>,
}

impl AccountState {
    /// Create a new externally owned account (EOA) with balance
    pub fn new_with_balance(balance: U256) -> Self {
        Self {
            balance,
            shielded_balance: U256::ZERO,
            nonce: 0,
            code_hash: KECCAK_EMPTY,
            code: Vec::new(),
            storage: BTreeMap::new(),
        }
    }

    /// Create a contract account with code
    pub fn new_contract(code: Vec<u8>, balance: U256) -> Self {
        let code_hash = keccak256(&code);
        Self {
            nonce: 1,
            code_hash,
            code,
            ..Self::new_with_balance(balance)
        }
    }

    /// Set the shielded balance
    pub fn with_shielded_balance(mut self, value: U256) -> Self {
        self.shielded_balance = value;
        self
    }

    /// Check if the account holds a shielded commitment
    pub fn has_shielded_balance(&self) -> bool {
        !self.shielded_balance.is_zero()
    }

    /// Check if this is a contract account
    pub fn is_contract(&self) -> bool {
        !self.code.is_empty()
    }

    /// Check if this is an empty account (can be pruned)
    pub fn is_empty(&self) -> bool {
        self.balance.is_zero()
            && self.shielded_balance.is_zero()
            && self.nonce == 0
            && self.code.is_empty()
    }

    /// Set a storage slot value
    pub fn set_storage(&mut self, slot: U256, value: U256) {
        if value.is_zero() {
            self.storage.remove(&slot);
        } else {
            self.storage.insert(slot, value);
        }
    }

    /// Get a storage slot value
    pub fn get_storage(&self, slot: &U256) -> U256 {
        self.storage.get(slot).copied().unwrap_or(U256::ZERO)
    }
}

/// In-memory state database
///
/// Uses BTreeMap for deterministic iteration order, so state roots agree
/// across nodes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InMemoryDB {
    /// Account states indexed by address
    pub accounts: BTreeMap<Address, AccountState>,
    /// Block hashes for BLOCKHASH opcode (block number -> hash)
    pub block_hashes: BTreeMap<u64, Hash>,
    /// Accounts modified since the last finalise
    #[serde(skip)]
    touched: BTreeSet<Address>,
    /// Logs per transaction hash, for the current block only
    #[serde(skip)]
    logs: BTreeMap<Hash, Vec<Log>>,
    /// Transaction logs are currently attributed to
    #[serde(skip)]
    tx_hash: Hash,
    /// Block the recorded logs belong to
    #[serde(skip)]
    block_hash: Hash,
}

impl InMemoryDB {
    /// Create a new empty database
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an account into the database
    pub fn insert_account(&mut self, address: Address, account: AccountState) {
        self.accounts.insert(address, account);
    }

    /// Get an account reference
    pub fn get_account(&self, address: &Address) -> Option<&AccountState> {
        self.accounts.get(address)
    }

    /// Get an account for modification, creating an empty one if absent
    pub fn account_entry(&mut self, address: Address) -> &mut AccountState {
        self.touched.insert(address);
        self.accounts
            .entry(address)
            .or_insert_with(|| AccountState::new_with_balance(U256::ZERO))
    }

    /// Remove an account from the database
    pub fn remove_account(&mut self, address: &Address) -> Option<AccountState> {
        self.touched.remove(address);
        self.accounts.remove(address)
    }

    /// Check if an account exists
    pub fn account_exists(&self, address: &Address) -> bool {
        self.accounts.contains_key(address)
    }

    /// Check if an account was modified since the last finalise
    pub fn is_touched(&self, address: &Address) -> bool {
        self.touched.contains(address)
    }

    /// Insert a block hash (for BLOCKHASH opcode)
    pub fn insert_block_hash(&mut self, number: u64, hash: Hash) {
        self.block_hashes.insert(number, hash);
    }

    /// Compute state root commitment (simplified - not MPT)
    ///
    /// Deterministic hash of all accounts, shielded balances included.
    pub fn compute_state_root(&self) -> Result<Hash> {
        hash_struct(&self.accounts)
    }

    /// Copy of the accounts and block hashes, without logs or touched set
    ///
    /// This is what the EVM reads from while executing a message.
    pub fn execution_view(&self) -> Self {
        Self {
            accounts: self.accounts.clone(),
            block_hashes: self.block_hashes.clone(),
            ..Self::default()
        }
    }

    /// Number of transactions with recorded logs
    pub fn logged_tx_count(&self) -> usize {
        self.logs.len()
    }

    /// Get the number of accounts in the database
    pub fn account_count(&self) -> usize {
        self.accounts.len()
    }
}

impl LedgerState for InMemoryDB {
    fn balance(&self, address: &Address) -> U256 {
        self.accounts
            .get(address)
            .map(|acc| acc.balance)
            .unwrap_or(U256::ZERO)
    }

    fn set_balance(&mut self, address: Address, balance: U256) {
        self.account_entry(address).balance = balance;
    }

    fn shielded_balance(&self, address: &Address) -> U256 {
        self.accounts
            .get(address)
            .map(|acc| acc.shielded_balance)
            .unwrap_or(U256::ZERO)
    }

    fn set_shielded_balance(&mut self, address: Address, value: U256) {
        self.account_entry(address).shielded_balance = value;
    }

    fn intermediate_root(&mut self, delete_empty: bool) -> Result<Hash> {
        self.finalise(delete_empty);
        self.compute_state_root()
    }

    fn finalise(&mut self, delete_empty: bool) {
        let touched = core::mem::take(&mut self.touched);
        if !delete_empty {
            return;
        }
        for address in touched {
            if self.accounts.get(&address).is_some_and(AccountState::is_empty) {
                self.accounts.remove(&address);
            }
        }
    }

    fn prepare(&mut self, tx_hash: Hash, block_hash: Hash, _tx_index: usize) {
        if block_hash != self.block_hash {
            self.logs.clear();
            self.block_hash = block_hash;
        }
        self.tx_hash = tx_hash;
    }

    fn add_log(&mut self, log: Log) {
        self.logs.entry(self.tx_hash).or_default().push(log);
    }

    fn logs(&self, tx_hash: &Hash) -> Vec<Log> {
        self.logs.get(tx_hash).cloned().unwrap_or_default()
    }
}

impl Database for InMemoryDB {
    type Error = ShieldedLedgerError;

    fn basic(&mut self, address: Address) -> Result<Option<AccountInfo>> {
        Ok(self.accounts.get(&address).map(|acc| AccountInfo {
            balance: acc.balance,
            nonce: acc.nonce,
            code_hash: acc.code_hash,
            code: if acc.code.is_empty() {
                None
            } else {
                Some(Bytecode::new_raw(acc.code.clone().into()))
            },
        }))
    }

    fn code_by_hash(&mut self, code_hash: Hash) -> Result<Bytecode> {
        if code_hash == KECCAK_EMPTY || code_hash.is_zero() {
            return Ok(Bytecode::default());
        }

        self.accounts
            .values()
            .find(|acc| acc.code_hash == code_hash && !acc.code.is_empty())
            .map(|acc| Bytecode::new_raw(acc.code.clone().into()))
            .ok_or_else(|| ShieldedLedgerError::Database(format!("unknown code hash {code_hash}")))
    }

    fn storage(&mut self, address: Address, slot: U256) -> Result<U256> {
        Ok(self
            .accounts
            .get(&address)
            .map(|acc| acc.get_storage(&slot))
            .unwrap_or(U256::ZERO))
    }

    fn block_hash(&mut self, number: u64) -> Result<Hash> {
        Ok(self.block_hashes.get(&number).copied().unwrap_or(Hash::ZERO))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_eoa() {
        let balance = U256::from(1_000_000_000_000_000_000u128); // 1 ETH
        let account = AccountState::new_with_balance(balance);

        assert_eq!(account.balance, balance);
        assert_eq!(account.nonce, 0);
        assert!(!account.is_contract());
        assert!(!account.is_empty());
    }

    #[test]
    fn test_new_contract() {
        let code = vec![0x60, 0x00, 0x60, 0x00, 0xf3]; // PUSH1 0, PUSH1 0, RETURN
        let account = AccountState::new_contract(code.clone(), U256::ZERO);

        assert!(account.is_contract());
        assert_eq!(account.nonce, 1);
        assert_eq!(account.code, code);
        assert_ne!(account.code_hash, KECCAK_EMPTY);
    }

    #[test]
    fn test_shielded_balance_keeps_account_alive() {
        let account =
            AccountState::new_with_balance(U256::ZERO).with_shielded_balance(U256::from(7u64));
        assert!(!account.is_empty());
    }

    #[test]
    fn test_storage_operations() {
        let mut account = AccountState::new_with_balance(U256::ZERO);

        let slot = U256::from(1u64);
        let value = U256::from(42u64);

        assert_eq!(account.get_storage(&slot), U256::ZERO);

        account.set_storage(slot, value);
        assert_eq!(account.get_storage(&slot), value);

        // Set to zero removes slot
        account.set_storage(slot, U256::ZERO);
        assert!(!account.storage.contains_key(&slot));
    }

    #[test]
    fn test_database_basic() {
        let mut db = InMemoryDB::new();
        let addr = Address::repeat_byte(0x01);
        let balance = U256::from(1000u64);

        db.insert_account(addr, AccountState::new_with_balance(balance));

        let info = db.basic(addr).unwrap().unwrap();
        assert_eq!(info.balance, balance);
        assert_eq!(info.nonce, 0);
        assert!(db.basic(Address::repeat_byte(0x02)).unwrap().is_none());
    }

    #[test]
    fn test_unknown_code_hash_is_an_error() {
        let mut db = InMemoryDB::new();
        assert!(db.code_by_hash(KECCAK_EMPTY).unwrap().is_empty());
        assert!(matches!(
            db.code_by_hash(Hash::repeat_byte(0x09)),
            Err(ShieldedLedgerError::Database(_))
        ));
    }

    #[test]
    fn test_state_root_deterministic() {
        let mut db1 = InMemoryDB::new();
        let mut db2 = InMemoryDB::new();

        let addr = Address::repeat_byte(0x01);
        let account = AccountState::new_with_balance(U256::from(1000u64));

        db1.insert_account(addr, account.clone());
        db2.insert_account(addr, account);

        assert_eq!(
            db1.compute_state_root().unwrap(),
            db2.compute_state_root().unwrap()
        );
    }

    #[test]
    fn test_state_root_covers_shielded_balance() {
        let addr = Address::repeat_byte(0x01);
        let mut db = InMemoryDB::new();
        db.insert_account(addr, AccountState::new_with_balance(U256::from(1u64)));
        let before = db.compute_state_root().unwrap();

        db.set_shielded_balance(addr, U256::from(99u64));
        assert_ne!(before, db.compute_state_root().unwrap());
    }

    #[test]
    fn test_finalise_deletes_touched_empty_accounts() {
        let empty = Address::repeat_byte(0x0e);
        let untouched_empty = Address::repeat_byte(0x0f);

        let mut db = InMemoryDB::new();
        db.insert_account(untouched_empty, AccountState::new_with_balance(U256::ZERO));
        db.set_balance(empty, U256::ZERO);
        assert!(db.is_touched(&empty));

        db.finalise(true);

        assert!(!db.account_exists(&empty));
        assert!(db.account_exists(&untouched_empty));
        assert!(!db.is_touched(&empty));
    }

    #[test]
    fn test_finalise_keeps_empty_accounts_before_eip158() {
        let empty = Address::repeat_byte(0x0e);
        let mut db = InMemoryDB::new();
        db.set_balance(empty, U256::ZERO);

        let root = db.intermediate_root(false).unwrap();

        assert!(db.account_exists(&empty));
        assert_eq!(root, db.compute_state_root().unwrap());
    }

    #[test]
    fn test_logs_follow_prepared_transaction() {
        let tx1 = Hash::repeat_byte(0x01);
        let tx2 = Hash::repeat_byte(0x02);
        let log = Log::new(Address::repeat_byte(0xaa), vec![Hash::repeat_byte(0x10)], vec![1]);

        let mut db = InMemoryDB::new();
        db.prepare(tx1, Hash::ZERO, 0);
        db.add_log(log.clone());
        db.prepare(tx2, Hash::ZERO, 1);

        assert_eq!(db.logs(&tx1), vec![log]);
        assert!(db.logs(&tx2).is_empty());
    }

    #[test]
    fn test_logs_reset_on_new_block() {
        let block_a = Hash::repeat_byte(0xa0);
        let block_b = Hash::repeat_byte(0xb0);
        let tx1 = Hash::repeat_byte(0x01);
        let tx2 = Hash::repeat_byte(0x02);
        let log = Log::new(Address::repeat_byte(0xaa), vec![], vec![]);

        let mut db = InMemoryDB::new();
        db.prepare(tx1, block_a, 0);
        db.add_log(log.clone());
        db.prepare(tx2, block_a, 1);
        db.add_log(log.clone());
        assert_eq!(db.logged_tx_count(), 2);

        db.prepare(tx1, block_b, 0);
        assert!(db.logs(&tx1).is_empty());
        assert_eq!(db.logged_tx_count(), 0);
    }

    #[test]
    fn test_execution_view_drops_logs() {
        let addr = Address::repeat_byte(0x01);
        let mut db = InMemoryDB::new();
        db.set_balance(addr, U256::from(5u64));
        db.prepare(Hash::repeat_byte(0x01), Hash::ZERO, 0);
        db.add_log(Log::new(addr, vec![], vec![]));

        let view = db.execution_view();

        assert_eq!(view.accounts, db.accounts);
        assert_eq!(view.logged_tx_count(), 0);
        assert!(!view.is_touched(&addr));
    }

    #[test]
    fn test_block_hash() {
        let mut db = InMemoryDB::new();

        let hash = Hash::repeat_byte(0xAB);
        db.insert_block_hash(100, hash);

        assert_eq!(db.block_hash(100).unwrap(), hash);
        assert_eq!(db.block_hash(101).unwrap(), Hash::ZERO);
    }
}
