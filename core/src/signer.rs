//! One-time-key signer recovery
//!
//! A Deposit carries a signature by its one-time key over the transaction's
//! signing hash. Recovering the signer lets the guard bind the embedded public
//! key coordinates to a key the submitter actually controls.

use crate::errors::{Result, ShieldedLedgerError};
use crate::transaction::Transaction;
use crate::types::Address;
use alloy_primitives::PrimitiveSignature;

/// Recovers the address that produced a one-time-key signature
pub trait SignerRecovery {
    fn recover_key_signer(&self, tx: &Transaction, signature: &[u8]) -> Result<Address>;
}

impl<T: SignerRecovery + ?Sized> SignerRecovery for &T {
    fn recover_key_signer(&self, tx: &Transaction, signature: &[u8]) -> Result<Address> {
        (**self).recover_key_signer(tx, signature)
    }
}

/// secp256k1 ECDSA recovery over [`Transaction::signing_hash`]
#[derive(Debug, Clone, Copy, Default)]
pub struct Secp256k1Recovery;

impl SignerRecovery for Secp256k1Recovery {
    fn recover_key_signer(&self, tx: &Transaction, signature: &[u8]) -> Result<Address> {
        let signature = PrimitiveSignature::try_from(signature).map_err(|e| {
            ShieldedLedgerError::MalformedTransaction(format!("invalid key signature: {e}"))
        })?;
        let prehash = tx.signing_hash()?;
        signature.recover_address_from_prehash(&prehash).map_err(|e| {
            ShieldedLedgerError::MalformedTransaction(format!("unrecoverable key signature: {e}"))
        })
    }
}
