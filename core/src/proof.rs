//! Proof oracle contract
//!
//! Zero-knowledge verification is an external capability with one call per
//! shielded variant. Implementations must be free of side effects; a call
//! either accepts or rejects, it is never retried.

use crate::transaction::RawPublicKey;
use crate::types::{Commitment, Nullifier, U256};
use thiserror::Error;

/// Rejection returned by a [`ProofVerifier`]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct VerificationFailure(pub String);

impl VerificationFailure {
    pub fn new(reason: impl Into<String>) -> Self {
        Self(reason.into())
    }
}

/// Result of one proof verification
pub type Verification = core::result::Result<(), VerificationFailure>;

/// Verifier for the proofs carried by shielded transactions
pub trait ProofVerifier {
    fn verify_mint(
        &self,
        shielded_balance: &U256,
        nullifier: &Nullifier,
        commitment: &Commitment,
        value: &U256,
        public_balance: &U256,
        proof: &[u8],
    ) -> Verification;

    /// Transferred amount stays hidden, so no value fields are passed
    fn verify_send(
        &self,
        nullifier: &Nullifier,
        commitment: &Commitment,
        proof: &[u8],
    ) -> Verification;

    fn verify_update(
        &self,
        shielded_balance: &U256,
        root: &Commitment,
        commitment: &Commitment,
        proof: &[u8],
    ) -> Verification;

    fn verify_deposit(
        &self,
        public_key: &RawPublicKey,
        root: &Commitment,
        shielded_balance: &U256,
        nullifier: &Nullifier,
        commitment: &Commitment,
        proof: &[u8],
    ) -> Verification;

    fn verify_redeem(
        &self,
        shielded_balance: &U256,
        nullifier: &Nullifier,
        commitment: &Commitment,
        value: &U256,
        proof: &[u8],
    ) -> Verification;
}

impl<T: ProofVerifier + ?Sized> ProofVerifier for &T {
    fn verify_mint(
        &self,
        shielded_balance: &U256,
        nullifier: &Nullifier,
        commitment: &Commitment,
        value: &U256,
        public_balance: &U256,
        proof: &[u8],
    ) -> Verification {
        (**self).verify_mint(shielded_balance, nullifier, commitment, value, public_balance, proof)
    }

    fn verify_send(
        &self,
        nullifier: &Nullifier,
        commitment: &Commitment,
        proof: &[u8],
    ) -> Verification {
        (**self).verify_send(nullifier, commitment, proof)
    }

    fn verify_update(
        &self,
        shielded_balance: &U256,
        root: &Commitment,
        commitment: &Commitment,
        proof: &[u8],
    ) -> Verification {
        (**self).verify_update(shielded_balance, root, commitment, proof)
    }

    fn verify_deposit(
        &self,
        public_key: &RawPublicKey,
        root: &Commitment,
        shielded_balance: &U256,
        nullifier: &Nullifier,
        commitment: &Commitment,
        proof: &[u8],
    ) -> Verification {
        (**self).verify_deposit(public_key, root, shielded_balance, nullifier, commitment, proof)
    }

    fn verify_redeem(
        &self,
        shielded_balance: &U256,
        nullifier: &Nullifier,
        commitment: &Commitment,
        value: &U256,
        proof: &[u8],
    ) -> Verification {
        (**self).verify_redeem(shielded_balance, nullifier, commitment, value, proof)
    }
}

/// Scripted verifier for tests
///
/// Accepts exactly the proofs equal to [`ScriptedVerifier::VALID`] and counts
/// every call it receives.
#[cfg(test)]
#[derive(Debug, Default)]
pub(crate) struct ScriptedVerifier {
    calls: core::cell::Cell<usize>,
}

#[cfg(test)]
impl ScriptedVerifier {
    pub(crate) const VALID: &'static [u8] = b"valid";

    pub(crate) fn calls(&self) -> usize {
        self.calls.get()
    }

    fn check(&self, proof: &[u8]) -> Verification {
        self.calls.set(self.calls.get() + 1);
        if proof == Self::VALID {
            Ok(())
        } else {
            Err(VerificationFailure::new("proof rejected"))
        }
    }
}

#[cfg(test)]
impl ProofVerifier for ScriptedVerifier {
    fn verify_mint(
        &self,
        _shielded_balance: &U256,
        _nullifier: &Nullifier,
        _commitment: &Commitment,
        value: &U256,
        public_balance: &U256,
        proof: &[u8],
    ) -> Verification {
        self.check(proof)?;
        if value > public_balance {
            return Err(VerificationFailure::new("mint exceeds public balance"));
        }
        Ok(())
    }

    fn verify_send(
        &self,
        _nullifier: &Nullifier,
        _commitment: &Commitment,
        proof: &[u8],
    ) -> Verification {
        self.check(proof)
    }

    fn verify_update(
        &self,
        _shielded_balance: &U256,
        _root: &Commitment,
        _commitment: &Commitment,
        proof: &[u8],
    ) -> Verification {
        self.check(proof)
    }

    fn verify_deposit(
        &self,
        _public_key: &RawPublicKey,
        _root: &Commitment,
        _shielded_balance: &U256,
        _nullifier: &Nullifier,
        _commitment: &Commitment,
        proof: &[u8],
    ) -> Verification {
        self.check(proof)
    }

    fn verify_redeem(
        &self,
        _shielded_balance: &U256,
        _nullifier: &Nullifier,
        _commitment: &Commitment,
        _value: &U256,
        proof: &[u8],
    ) -> Verification {
        self.check(proof)
    }
}
