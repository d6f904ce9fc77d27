//! Transaction receipts
//!
//! One receipt per applied transaction. The bloom filter is built from the
//! receipt's own logs only.

use crate::types::{Address, Bloom, BloomInput, Gas, Hash};
use alloc::vec::Vec;
use serde::{Deserialize, Serialize};

extern crate alloc;

/// EVM execution log entry
///
/// Represents an event emitted during contract execution.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Log {
    /// Contract that emitted the log
    pub address: Address,
    /// Log topics (up to 4, first is usually event signature)
    pub topics: Vec<Hash>,
    /// Log data (ABI-encoded event parameters)
    pub data: Vec<u8>,
}

impl Log {
    /// Create a new log entry
    pub fn new(address: Address, topics: Vec<Hash>, data: Vec<u8>) -> Self {
        Self {
            address,
            topics,
            data,
        }
    }

    /// Get the event signature (first topic, if present)
    pub fn event_signature(&self) -> Option<Hash> {
        self.topics.first().copied()
    }
}

/// Outcome of the transaction's own execution
///
/// A failed receipt records an in-contract revert or halt; it does not
/// invalidate the block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReceiptStatus {
    Success,
    Failed,
}

impl ReceiptStatus {
    pub fn from_failed(failed: bool) -> Self {
        if failed {
            ReceiptStatus::Failed
        } else {
            ReceiptStatus::Success
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ReceiptStatus::Success)
    }
}

/// Receipt of one applied transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    /// Intermediate state root; `None` once Byzantium rules apply
    pub root: Option<Hash>,
    pub status: ReceiptStatus,
    /// Gas used by the block up to and including this transaction
    pub cumulative_gas_used: Gas,
    pub tx_hash: Hash,
    /// Gas used by this transaction alone
    pub gas_used: Gas,
    /// Contract created by this transaction, if it had no recipient
    pub contract_address: Option<Address>,
    pub logs: Vec<Log>,
    pub bloom: Bloom,
}

impl Receipt {
    /// Create a receipt with no logs
    pub fn new(root: Option<Hash>, failed: bool, cumulative_gas_used: Gas) -> Self {
        Self {
            root,
            status: ReceiptStatus::from_failed(failed),
            cumulative_gas_used,
            tx_hash: Hash::ZERO,
            gas_used: 0,
            contract_address: None,
            logs: Vec::new(),
            bloom: Bloom::ZERO,
        }
    }

    /// Attach logs and derive the bloom from them
    pub fn with_logs(mut self, logs: Vec<Log>) -> Self {
        self.bloom = logs_bloom(&logs);
        self.logs = logs;
        self
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}

/// Bloom filter over log addresses and topics
pub fn logs_bloom<'a>(logs: impl IntoIterator<Item = &'a Log>) -> Bloom {
    let mut bloom = Bloom::ZERO;
    for log in logs {
        bloom.accrue(BloomInput::Raw(log.address.as_slice()));
        for topic in &log.topics {
            bloom.accrue(BloomInput::Raw(topic.as_slice()));
        }
    }
    bloom
}

/// Bloom of a receipt sequence, e.g. for a block header
pub fn create_bloom(receipts: &[Receipt]) -> Bloom {
    let mut bloom = Bloom::ZERO;
    for receipt in receipts {
        bloom.accrue_bloom(&receipt.bloom);
    }
    bloom
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transfer_log() -> Log {
        Log::new(
            Address::repeat_byte(0x01),
            vec![Hash::repeat_byte(0x02)],
            vec![0x12, 0x34],
        )
    }

    #[test]
    fn test_log_creation() {
        let log = transfer_log();
        assert_eq!(log.address, Address::repeat_byte(0x01));
        assert_eq!(log.event_signature(), Some(Hash::repeat_byte(0x02)));
    }

    #[test]
    fn test_status_from_failed() {
        assert!(ReceiptStatus::from_failed(false).is_success());
        assert!(!ReceiptStatus::from_failed(true).is_success());
    }

    #[test]
    fn test_bloom_contains_address_and_topics() {
        let receipt = Receipt::new(None, false, 21_000).with_logs(vec![transfer_log()]);

        assert!(receipt
            .bloom
            .contains_input(BloomInput::Raw(Address::repeat_byte(0x01).as_slice())));
        assert!(receipt
            .bloom
            .contains_input(BloomInput::Raw(Hash::repeat_byte(0x02).as_slice())));
    }

    #[test]
    fn test_empty_logs_empty_bloom() {
        let receipt = Receipt::new(Some(Hash::ZERO), false, 0).with_logs(Vec::new());
        assert_eq!(receipt.bloom, Bloom::ZERO);
    }

    #[test]
    fn test_bloom_is_deterministic() {
        let a = logs_bloom(&[transfer_log()]);
        let b = logs_bloom(&[transfer_log()]);
        assert_eq!(a, b);
    }

    #[test]
    fn test_create_bloom_unions_receipts() {
        let first = Receipt::new(None, false, 1).with_logs(vec![transfer_log()]);
        let other = Log::new(Address::repeat_byte(0x09), vec![], vec![]);
        let second = Receipt::new(None, false, 2).with_logs(vec![other]);

        let bloom = create_bloom(&[first, second]);
        assert!(bloom.contains_input(BloomInput::Raw(Address::repeat_byte(0x09).as_slice())));
        assert!(bloom.contains_input(BloomInput::Raw(Address::repeat_byte(0x01).as_slice())));
    }
}
