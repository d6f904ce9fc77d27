//! Shielded-pool guard
//!
//! Gates every proof-bearing transaction on anti-replay and proof validity
//! before its value effect runs, and stages the records that make a later
//! replay detectable.
//!
//! Two orderings coexist:
//! - the nullifier record is checked and staged *before* the value effect
//! - the commitment index (Send) and one-time-key claim (Deposit) are staged
//!   *after* the execution engine returns, reverted or not, via
//!   [`ShieldedPoolGuard::record_effect`]
//!
//! Checks always precede writes, so a rejected transaction stages nothing.

use crate::errors::{Result, ShieldedLedgerError};
use crate::proof::{ProofVerifier, Verification};
use crate::replay::{
    commitment_block_key, encode_block_number, nullifier_key, one_time_key_key, ReplayBatch,
    ReplayStore,
};
use crate::signer::SignerRecovery;
use crate::state::LedgerState;
use crate::transaction::{ShieldedAction, Transaction, TxCode};
use crate::types::{Address, BlockNumber, Commitment, Nullifier};
use tracing::debug;

const LOG_TARGET: &str = "shielded_ledger::guard";

/// Record to stage once the execution engine has run the transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostEffect {
    /// Send: index the new commitment under the current block
    IndexCommitment(Commitment),
    /// Deposit: claim the one-time key owning this address
    ClaimOneTimeKey(Address),
}

/// Shielded-pool guard over a proof oracle and a signer-recovery capability
pub struct ShieldedPoolGuard<V, R> {
    verifier: V,
    recovery: R,
}

impl<V: ProofVerifier, R: SignerRecovery> ShieldedPoolGuard<V, R> {
    pub fn new(verifier: V, recovery: R) -> Self {
        Self { verifier, recovery }
    }

    /// Run the preconditions of `tx`'s shielded variant
    ///
    /// Ordinary transactions pass through untouched and never reach the proof
    /// oracle. For every other variant the proof is verified against the
    /// sender's current balances and, where a note is consumed, the nullifier
    /// record is staged. Returns the record to stage after execution, if any.
    pub fn check<S, D>(
        &self,
        tx: &Transaction,
        state: &S,
        replay: &mut ReplayBatch<'_, D>,
    ) -> Result<Option<PostEffect>>
    where
        S: LedgerState + ?Sized,
        D: ReplayStore + ?Sized,
    {
        let sender = &tx.sender;
        match &tx.shielded {
            ShieldedAction::Ordinary => Ok(None),
            ShieldedAction::Mint {
                nullifier,
                commitment,
                value,
                proof,
            } => {
                ensure_unspent(replay, nullifier)?;
                let shielded_balance = state.shielded_balance(sender);
                let public_balance = state.balance(sender);
                proof_result(
                    TxCode::Mint,
                    self.verifier.verify_mint(
                        &shielded_balance,
                        nullifier,
                        commitment,
                        value,
                        &public_balance,
                        proof,
                    ),
                )?;
                spend(replay, nullifier)?;
                Ok(None)
            }
            ShieldedAction::Send {
                nullifier,
                commitment,
                proof,
            } => {
                ensure_unspent(replay, nullifier)?;
                proof_result(
                    TxCode::Send,
                    self.verifier.verify_send(nullifier, commitment, proof),
                )?;
                spend(replay, nullifier)?;
                Ok(Some(PostEffect::IndexCommitment(*commitment)))
            }
            ShieldedAction::Update {
                root,
                commitment,
                proof,
            } => {
                let shielded_balance = state.shielded_balance(sender);
                proof_result(
                    TxCode::Update,
                    self.verifier
                        .verify_update(&shielded_balance, root, commitment, proof),
                )?;
                debug!(target: LOG_TARGET, %sender, "update accepted");
                Ok(None)
            }
            ShieldedAction::Deposit {
                public_key,
                root,
                nullifier,
                commitment,
                proof,
                key_signature,
            } => {
                ensure_unspent(replay, nullifier)?;
                let derived = public_key.address();
                let recovered = self.recovery.recover_key_signer(tx, key_signature)?;
                if derived != recovered {
                    return Err(ShieldedLedgerError::InvalidDepositBinding {
                        derived,
                        recovered,
                    });
                }
                let shielded_balance = state.shielded_balance(sender);
                proof_result(
                    TxCode::Deposit,
                    self.verifier.verify_deposit(
                        public_key,
                        root,
                        &shielded_balance,
                        nullifier,
                        commitment,
                        proof,
                    ),
                )?;
                if replay.contains(&one_time_key_key(&derived))? {
                    return Err(ShieldedLedgerError::OneTimeKeyReused(derived));
                }
                spend(replay, nullifier)?;
                Ok(Some(PostEffect::ClaimOneTimeKey(derived)))
            }
            ShieldedAction::Redeem {
                nullifier,
                commitment,
                value,
                proof,
            } => {
                ensure_unspent(replay, nullifier)?;
                let shielded_balance = state.shielded_balance(sender);
                proof_result(
                    TxCode::Redeem,
                    self.verifier.verify_redeem(
                        &shielded_balance,
                        nullifier,
                        commitment,
                        value,
                        proof,
                    ),
                )?;
                spend(replay, nullifier)?;
                Ok(None)
            }
        }
    }

    /// Stage the record that follows execution
    ///
    /// Runs for reverted executions too: the nullifier is already spent, so the
    /// commitment index and key claim must follow it.
    pub fn record_effect<D>(
        &self,
        effect: PostEffect,
        block_number: BlockNumber,
        replay: &mut ReplayBatch<'_, D>,
    ) -> Result<()>
    where
        D: ReplayStore + ?Sized,
    {
        match effect {
            PostEffect::IndexCommitment(commitment) => {
                replay.put(
                    commitment_block_key(&commitment),
                    encode_block_number(block_number),
                );
                debug!(target: LOG_TARGET, %commitment, block_number, "commitment indexed");
                Ok(())
            }
            PostEffect::ClaimOneTimeKey(address) => {
                if !replay.put_if_absent(one_time_key_key(&address), address.to_vec())? {
                    return Err(ShieldedLedgerError::OneTimeKeyReused(address));
                }
                debug!(target: LOG_TARGET, %address, "one-time key claimed");
                Ok(())
            }
        }
    }
}

fn ensure_unspent<D: ReplayStore + ?Sized>(
    replay: &ReplayBatch<'_, D>,
    nullifier: &Nullifier,
) -> Result<()> {
    if replay.contains(&nullifier_key(nullifier))? {
        return Err(ShieldedLedgerError::ReplayedNullifier(*nullifier));
    }
    Ok(())
}

fn spend<D: ReplayStore + ?Sized>(
    replay: &mut ReplayBatch<'_, D>,
    nullifier: &Nullifier,
) -> Result<()> {
    if !replay.put_if_absent(nullifier_key(nullifier), nullifier.to_vec())? {
        return Err(ShieldedLedgerError::ReplayedNullifier(*nullifier));
    }
    debug!(target: LOG_TARGET, %nullifier, "nullifier spent");
    Ok(())
}

fn proof_result(kind: TxCode, verification: Verification) -> Result<()> {
    verification.map_err(|failure| ShieldedLedgerError::InvalidProof {
        kind,
        reason: failure.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proof::ScriptedVerifier;
    use crate::replay::{FailingStore, MemoryReplayStore};
    use crate::signer::testing::OneTimeKey;
    use crate::signer::Secp256k1Recovery;
    use crate::state::{AccountState, InMemoryDB};
    use crate::types::U256;

    const VALID: &[u8] = ScriptedVerifier::VALID;

    fn alice() -> Address {
        Address::repeat_byte(0xa1)
    }

    fn state() -> InMemoryDB {
        let mut db = InMemoryDB::new();
        db.insert_account(alice(), AccountState::new_with_balance(U256::from(100u64)));
        db
    }

    fn tx(action: ShieldedAction) -> Transaction {
        Transaction::transfer(alice(), alice(), U256::ZERO).with_shielded(action)
    }

    fn mint(nf: u8, value: u64, proof: &[u8]) -> Transaction {
        tx(ShieldedAction::Mint {
            nullifier: Nullifier::repeat_byte(nf),
            commitment: Commitment::repeat_byte(0xc1),
            value: U256::from(value),
            proof: proof.to_vec(),
        })
    }

    fn redeem(nf: u8) -> Transaction {
        tx(ShieldedAction::Redeem {
            nullifier: Nullifier::repeat_byte(nf),
            commitment: Commitment::repeat_byte(0xc2),
            value: U256::from(10u64),
            proof: VALID.to_vec(),
        })
    }

    fn send(nf: u8, cm: u8) -> Transaction {
        tx(ShieldedAction::Send {
            nullifier: Nullifier::repeat_byte(nf),
            commitment: Commitment::repeat_byte(cm),
            proof: VALID.to_vec(),
        })
    }

    fn unsigned_deposit(key: &OneTimeKey, nf: u8) -> Transaction {
        tx(ShieldedAction::Deposit {
            public_key: key.public_key(),
            root: Commitment::repeat_byte(0x0f),
            nullifier: Nullifier::repeat_byte(nf),
            commitment: Commitment::repeat_byte(0xd0),
            proof: VALID.to_vec(),
            key_signature: Vec::new(),
        })
    }

    fn deposit(key: &OneTimeKey, nf: u8) -> Transaction {
        key.sign(unsigned_deposit(key, nf))
    }

    fn guard(
        verifier: &ScriptedVerifier,
    ) -> ShieldedPoolGuard<&ScriptedVerifier, Secp256k1Recovery> {
        ShieldedPoolGuard::new(verifier, Secp256k1Recovery)
    }

    #[test]
    fn test_ordinary_bypasses_oracle() {
        let verifier = ScriptedVerifier::default();
        let store = MemoryReplayStore::new();
        let mut replay = ReplayBatch::new(&store);

        let ordinary = Transaction::transfer(alice(), Address::repeat_byte(2), U256::from(1u64));
        let effect = guard(&verifier).check(&ordinary, &state(), &mut replay).unwrap();

        assert_eq!(effect, None);
        assert_eq!(verifier.calls(), 0);
        assert!(replay.is_empty());
    }

    #[test]
    fn test_mint_stages_nullifier() {
        let verifier = ScriptedVerifier::default();
        let store = MemoryReplayStore::new();
        let mut replay = ReplayBatch::new(&store);

        guard(&verifier).check(&mint(1, 40, VALID), &state(), &mut replay).unwrap();

        let key = nullifier_key(&Nullifier::repeat_byte(1));
        assert_eq!(replay.get(&key).unwrap(), Some(Nullifier::repeat_byte(1).to_vec()));
    }

    #[test]
    fn test_invalid_proof_stages_nothing() {
        let verifier = ScriptedVerifier::default();
        let store = MemoryReplayStore::new();
        let mut replay = ReplayBatch::new(&store);

        let err = guard(&verifier)
            .check(&mint(1, 40, b"forged"), &state(), &mut replay)
            .unwrap_err();

        assert!(matches!(
            err,
            ShieldedLedgerError::InvalidProof {
                kind: TxCode::Mint,
                ..
            }
        ));
        assert!(replay.is_empty());
    }

    #[test]
    fn test_mint_sees_public_balance() {
        let verifier = ScriptedVerifier::default();
        let store = MemoryReplayStore::new();
        let mut replay = ReplayBatch::new(&store);

        // The scripted oracle rejects mints larger than the public balance (100)
        let err = guard(&verifier)
            .check(&mint(1, 101, VALID), &state(), &mut replay)
            .unwrap_err();
        assert!(matches!(err, ShieldedLedgerError::InvalidProof { .. }));
    }

    #[test]
    fn test_nullifier_replay_across_variants() {
        let verifier = ScriptedVerifier::default();
        let store = MemoryReplayStore::new();
        let mut replay = ReplayBatch::new(&store);
        let g = guard(&verifier);

        g.check(&mint(1, 40, VALID), &state(), &mut replay).unwrap();
        let calls = verifier.calls();

        for replayed in [redeem(1), send(1, 0xc9), mint(1, 1, VALID)] {
            let err = g.check(&replayed, &state(), &mut replay).unwrap_err();
            assert!(matches!(err, ShieldedLedgerError::ReplayedNullifier(_)));
        }
        // Replays are rejected before the oracle is consulted
        assert_eq!(verifier.calls(), calls);
    }

    #[test]
    fn test_nullifier_in_persisted_store_is_replay() {
        let verifier = ScriptedVerifier::default();
        let mut store = MemoryReplayStore::new();
        store
            .put(nullifier_key(&Nullifier::repeat_byte(3)), Vec::new())
            .unwrap();
        let mut replay = ReplayBatch::new(&store);

        let err = guard(&verifier).check(&redeem(3), &state(), &mut replay).unwrap_err();
        assert!(matches!(err, ShieldedLedgerError::ReplayedNullifier(_)));
    }

    #[test]
    fn test_send_returns_commitment_index() {
        let verifier = ScriptedVerifier::default();
        let store = MemoryReplayStore::new();
        let mut replay = ReplayBatch::new(&store);
        let g = guard(&verifier);

        let effect = g.check(&send(4, 0xcc), &state(), &mut replay).unwrap();
        assert_eq!(
            effect,
            Some(PostEffect::IndexCommitment(Commitment::repeat_byte(0xcc)))
        );
        // The index is written only once the effect is recorded
        let key = commitment_block_key(&Commitment::repeat_byte(0xcc));
        assert_eq!(replay.get(&key).unwrap(), None);

        g.record_effect(effect.unwrap(), 77, &mut replay).unwrap();
        assert_eq!(replay.get(&key).unwrap(), Some(encode_block_number(77)));
    }

    #[test]
    fn test_update_has_no_nullifier() {
        let verifier = ScriptedVerifier::default();
        let store = MemoryReplayStore::new();
        let mut replay = ReplayBatch::new(&store);
        let g = guard(&verifier);

        let update = tx(ShieldedAction::Update {
            root: Commitment::repeat_byte(1),
            commitment: Commitment::repeat_byte(2),
            proof: VALID.to_vec(),
        });
        assert_eq!(g.check(&update, &state(), &mut replay).unwrap(), None);
        assert_eq!(g.check(&update, &state(), &mut replay).unwrap(), None);
        assert!(replay.is_empty());
        assert_eq!(verifier.calls(), 2);
    }

    #[test]
    fn test_deposit_claims_one_time_key() {
        let verifier = ScriptedVerifier::default();
        let store = MemoryReplayStore::new();
        let mut replay = ReplayBatch::new(&store);
        let g = guard(&verifier);
        let key = OneTimeKey::from_seed(0x11);

        let effect = g.check(&deposit(&key, 2), &state(), &mut replay).unwrap();
        assert_eq!(
            effect,
            Some(PostEffect::ClaimOneTimeKey(key.public_key().address()))
        );
        g.record_effect(effect.unwrap(), 1, &mut replay).unwrap();

        // Same key, fresh nullifier
        let err = g.check(&deposit(&key, 3), &state(), &mut replay).unwrap_err();
        assert!(matches!(
            err,
            ShieldedLedgerError::OneTimeKeyReused(addr) if addr == key.public_key().address()
        ));
    }

    #[test]
    fn test_deposit_proof_is_checked_before_key_reuse() {
        let verifier = ScriptedVerifier::default();
        let store = MemoryReplayStore::new();
        let mut replay = ReplayBatch::new(&store);
        let g = guard(&verifier);
        let key = OneTimeKey::from_seed(0x11);
        g.record_effect(
            PostEffect::ClaimOneTimeKey(key.public_key().address()),
            1,
            &mut replay,
        )
        .unwrap();

        let mut bad = unsigned_deposit(&key, 3);
        if let ShieldedAction::Deposit { proof, .. } = &mut bad.shielded {
            *proof = b"forged".to_vec();
        }
        let err = g.check(&key.sign(bad), &state(), &mut replay).unwrap_err();

        assert!(matches!(
            err,
            ShieldedLedgerError::InvalidProof {
                kind: TxCode::Deposit,
                ..
            }
        ));
        assert!(!replay.contains(&nullifier_key(&Nullifier::repeat_byte(3))).unwrap());
    }

    #[test]
    fn test_deposit_signed_by_other_key_is_unbound() {
        let verifier = ScriptedVerifier::default();
        let store = MemoryReplayStore::new();
        let mut replay = ReplayBatch::new(&store);
        let key = OneTimeKey::from_seed(0x11);
        let intruder = OneTimeKey::from_seed(0x12);

        // Embeds `key`'s coordinates but is signed by `intruder`
        let forged = intruder.sign(unsigned_deposit(&key, 2));

        let err = guard(&verifier).check(&forged, &state(), &mut replay).unwrap_err();
        assert!(matches!(err, ShieldedLedgerError::InvalidDepositBinding { .. }));
        assert_eq!(verifier.calls(), 0);
        assert!(replay.is_empty());
    }

    #[test]
    fn test_double_claim_is_rejected() {
        let verifier = ScriptedVerifier::default();
        let store = MemoryReplayStore::new();
        let mut replay = ReplayBatch::new(&store);
        let g = guard(&verifier);
        let addr = Address::repeat_byte(0x33);

        g.record_effect(PostEffect::ClaimOneTimeKey(addr), 1, &mut replay).unwrap();
        let err = g
            .record_effect(PostEffect::ClaimOneTimeKey(addr), 1, &mut replay)
            .unwrap_err();
        assert!(matches!(err, ShieldedLedgerError::OneTimeKeyReused(_)));
    }

    #[test]
    fn test_storage_error_is_surfaced() {
        let verifier = ScriptedVerifier::default();
        let mut replay = ReplayBatch::new(&FailingStore);

        let err = guard(&verifier).check(&redeem(1), &state(), &mut replay).unwrap_err();
        assert!(matches!(err, ShieldedLedgerError::Storage(_)));
        assert_eq!(verifier.calls(), 0);
    }
}
