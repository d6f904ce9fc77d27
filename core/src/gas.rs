//! Block gas pool

use crate::errors::{Result, ShieldedLedgerError};
use crate::types::Gas;

/// Remaining gas budget of one block
///
/// Transactions buy their gas limit up front and return what they did not use.
/// The pool never underflows: a purchase larger than what is left fails
/// without touching the counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GasPool {
    remaining: Gas,
}

impl GasPool {
    /// Create a pool holding `limit` gas
    pub fn new(limit: Gas) -> Self {
        Self { remaining: limit }
    }

    /// Return gas to the pool
    pub fn add_gas(&mut self, amount: Gas) -> &mut Self {
        self.remaining = self.remaining.saturating_add(amount);
        self
    }

    /// Take gas from the pool
    pub fn sub_gas(&mut self, amount: Gas) -> Result<()> {
        if self.remaining < amount {
            return Err(ShieldedLedgerError::GasLimitExceeded {
                wanted: amount,
                available: self.remaining,
            });
        }
        self.remaining -= amount;
        Ok(())
    }

    pub fn remaining(&self) -> Gas {
        self.remaining
    }
}
