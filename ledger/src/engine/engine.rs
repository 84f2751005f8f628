//! # Ledger Engine — Submission & Settlement
//!
//! The engine drives every transaction through the pipeline:
//!
//! 1. **Idempotency claim** — a keyed submission atomically claims its key;
//!    a completed duplicate short-circuits to the original transaction.
//! 2. **Shape validation** — amount, description, wallet pairing for the
//!    kind, wallet existence/ownership/currency.
//! 3. **Authorization** — the verification gate's role matrix and KYC policy.
//! 4. **Reservation** — outgoing kinds place a hold on the source wallet.
//! 5. **Persist `Pending`** — and return to the caller. Settlement is a
//!    separate explicit call, because it may depend on a downstream rail
//!    the core does not itself drive.
//!
//! Every abort path unwinds completely: a failed submission releases its
//! idempotency claim and leaves no reservation behind. There is no
//! observable half-submitted transaction.
//!
//! ## Settlement Ordering
//!
//! On commit, the destination is credited *before* the source hold is
//! committed. The credit is the only step that can be refused (the
//! destination may have been deactivated since admission); refusing it
//! leaves the transaction `Pending` with no funds moved, free to be retried
//! or failed by the confirmer. Committing the hold cannot fail once the
//! credit has landed.

use std::fmt;
use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::config::{MAX_DESCRIPTION_LENGTH, MAX_IDEMPOTENCY_KEY_LENGTH};
use crate::engine::error::EngineError;
use crate::engine::idempotency::{BeginOutcome, IdempotencyIndex};
use crate::engine::transaction::{
    Transaction, TransactionId, TransactionKind, TransactionStatus,
};
use crate::money::Amount;
use crate::verification::gate::{Role, VerificationGate};
use crate::verification::record::VerificationRecord;
use crate::wallet::account::{Wallet, WalletId};
use crate::wallet::registry::WalletRegistry;
use crate::wallet::reservation::{Reservation, ReservationId, SettleOutcome};

// ---------------------------------------------------------------------------
// SubmitRequest
// ---------------------------------------------------------------------------

/// Everything the engine needs to admit one transaction.
///
/// `owner` and `role` come from the session layer; the engine treats both
/// as opaque, already-authenticated inputs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitRequest {
    /// The submitting user.
    pub owner: String,
    /// The role the session attached to this request.
    pub role: Role,
    /// What kind of transaction this is.
    pub kind: TransactionKind,
    /// The amount to move. Must be positive.
    pub amount: Amount,
    /// Source wallet, required for `Send`/`Withdraw`/`Payment`.
    pub from_wallet: Option<WalletId>,
    /// Destination wallet, required for all kinds except `Withdraw`.
    pub to_wallet: Option<WalletId>,
    /// Free-text statement line.
    pub description: String,
    /// Caller-supplied idempotency key. Optional but recommended.
    pub idempotency_key: Option<String>,
}

// ---------------------------------------------------------------------------
// SettlementOutcome
// ---------------------------------------------------------------------------

/// What the settlement confirmer reports back for a pending transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettlementOutcome {
    /// The downstream rail succeeded: move the funds.
    Commit,
    /// The downstream rail failed: release the hold, no funds move.
    Fail,
}

impl fmt::Display for SettlementOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SettlementOutcome::Commit => f.write_str("commit"),
            SettlementOutcome::Fail => f.write_str("fail"),
        }
    }
}

// ---------------------------------------------------------------------------
// StoredTransaction & LedgerSnapshot
// ---------------------------------------------------------------------------

/// A transaction together with the reservation backing it, as held in the
/// engine's store and persisted in snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredTransaction {
    /// The transaction record.
    pub transaction: Transaction,
    /// The hold on the source wallet, for kinds that debit one.
    pub reservation: Option<ReservationId>,
}

/// Full engine state for persistence: the logical shape of §6 —
/// wallets, reservations, transactions, verification records.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    /// All wallet records.
    pub wallets: Vec<Wallet>,
    /// All reservations, open and settled.
    pub reservations: Vec<Reservation>,
    /// All transactions with their reservation links.
    pub transactions: Vec<StoredTransaction>,
    /// All verification records.
    pub verification: Vec<VerificationRecord>,
}

// ---------------------------------------------------------------------------
// LedgerEngine
// ---------------------------------------------------------------------------

/// The transaction state machine. Owns transaction lifecycle transitions;
/// delegates balance mutation to the registry and authorization to the gate.
///
/// Safe to share via `Arc` and call from many threads; per-transaction
/// state sits behind its own lock, and per-wallet serialization is the
/// registry's job.
#[derive(Debug, Default)]
pub struct LedgerEngine {
    registry: Arc<WalletRegistry>,
    gate: Arc<VerificationGate>,
    idempotency: IdempotencyIndex,
    transactions: DashMap<TransactionId, Arc<Mutex<StoredTransaction>>>,
}

impl LedgerEngine {
    /// Creates an engine with a fresh registry and gate.
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds an engine from persisted state.
    ///
    /// Idempotency claims are deliberately not persisted: after a restart
    /// every completed key is already answered by its stored transaction
    /// being re-registered here, and in-flight claims died with the process.
    pub fn from_snapshot(snapshot: LedgerSnapshot) -> Self {
        let engine = Self {
            registry: Arc::new(WalletRegistry::restore(
                snapshot.wallets,
                snapshot.reservations,
            )),
            gate: Arc::new(VerificationGate::restore(snapshot.verification)),
            idempotency: IdempotencyIndex::new(),
            transactions: DashMap::new(),
        };
        for stored in snapshot.transactions {
            if let Some(key) = &stored.transaction.idempotency_key {
                engine
                    .idempotency
                    .complete(&stored.transaction.owner, key, stored.transaction.id);
            }
            engine
                .transactions
                .insert(stored.transaction.id, Arc::new(Mutex::new(stored)));
        }
        engine
    }

    /// The wallet registry backing this engine.
    pub fn registry(&self) -> &WalletRegistry {
        &self.registry
    }

    /// The verification gate backing this engine.
    pub fn gate(&self) -> &VerificationGate {
        &self.gate
    }

    // -----------------------------------------------------------------------
    // Submission
    // -----------------------------------------------------------------------

    /// Admits a transaction, leaving it `Pending` for the settlement
    /// confirmer.
    ///
    /// Resubmitting a completed idempotency key returns the original
    /// transaction's current state without re-validating or re-moving
    /// funds. A key whose first submission is still in flight yields
    /// [`EngineError::DuplicateInFlight`].
    pub fn submit(&self, request: SubmitRequest) -> Result<Transaction, EngineError> {
        let key = match &request.idempotency_key {
            Some(key) => key.clone(),
            None => return self.admit(request),
        };

        if key.is_empty() || key.len() > MAX_IDEMPOTENCY_KEY_LENGTH {
            return Err(EngineError::InvalidRequest(format!(
                "idempotency key must be 1..={MAX_IDEMPOTENCY_KEY_LENGTH} bytes"
            )));
        }

        match self.idempotency.begin(&request.owner, &key) {
            BeginOutcome::Existing(tx_id) => {
                tracing::debug!(owner = %request.owner, key, tx = %tx_id, "duplicate submission absorbed");
                self.transaction(tx_id)
            }
            BeginOutcome::InFlight { age } => Err(EngineError::DuplicateInFlight {
                age_ms: age.as_millis() as u64,
            }),
            BeginOutcome::Fresh => {
                let owner = request.owner.clone();
                match self.admit(request) {
                    Ok(tx) => {
                        self.idempotency.complete(&owner, &key, tx.id);
                        Ok(tx)
                    }
                    Err(err) => {
                        // A failed submission produced no transaction; the
                        // key must stay retryable.
                        self.idempotency.release(&owner, &key);
                        Err(err)
                    }
                }
            }
        }
    }

    /// Validation, authorization, reservation, persistence — the un-keyed
    /// core of [`submit`](Self::submit).
    fn admit(&self, request: SubmitRequest) -> Result<Transaction, EngineError> {
        self.validate_shape(&request)?;

        self.gate
            .authorize(&request.owner, request.role, request.kind.operation_class())?;

        let reservation = match (request.kind.requires_source(), request.from_wallet) {
            (true, Some(from)) => Some(self.registry.reserve(from, request.amount)?),
            _ => None,
        };

        let transaction = Transaction {
            id: TransactionId::new(),
            owner: request.owner,
            idempotency_key: request.idempotency_key,
            kind: request.kind,
            amount: request.amount,
            from_wallet: request.from_wallet,
            to_wallet: request.to_wallet,
            status: TransactionStatus::Pending,
            description: request.description,
            created_at: Utc::now(),
            settled_at: None,
        };

        self.transactions.insert(
            transaction.id,
            Arc::new(Mutex::new(StoredTransaction {
                transaction: transaction.clone(),
                reservation,
            })),
        );

        tracing::info!(
            tx = %transaction.id,
            owner = %transaction.owner,
            kind = %transaction.kind,
            amount = %transaction.amount,
            "transaction admitted"
        );
        Ok(transaction)
    }

    /// Request-shape checks: positive amount, bounded description, the
    /// wallet-pair rule for the kind, and endpoint wallets that exist, are
    /// active, belong to the right owner, and match the currency.
    fn validate_shape(&self, request: &SubmitRequest) -> Result<(), EngineError> {
        let invalid = |reason: String| Err(EngineError::InvalidRequest(reason));

        if request.amount.is_zero() {
            return invalid("amount must be positive".to_string());
        }
        if request.description.len() > MAX_DESCRIPTION_LENGTH {
            return invalid(format!(
                "description exceeds {MAX_DESCRIPTION_LENGTH} bytes"
            ));
        }

        let kind = request.kind;
        match (kind.requires_source(), request.from_wallet) {
            (true, None) => return invalid(format!("{kind} requires a source wallet")),
            (false, Some(_)) => return invalid(format!("{kind} must not name a source wallet")),
            _ => {}
        }
        match (kind.requires_destination(), request.to_wallet) {
            (true, None) => return invalid(format!("{kind} requires a destination wallet")),
            (false, Some(_)) => {
                return invalid(format!("{kind} must not name a destination wallet"))
            }
            _ => {}
        }
        if kind.is_transfer() && request.from_wallet == request.to_wallet {
            return invalid("source and destination wallets must differ".to_string());
        }

        if let Some(from_id) = request.from_wallet {
            let from = self
                .registry
                .wallet(from_id)
                .ok_or(EngineError::WalletNotFound(from_id))?;
            if from.owner != request.owner {
                return invalid("source wallet does not belong to the submitting user".to_string());
            }
            if !from.active {
                return Err(EngineError::WalletInactive(from_id));
            }
            if from.currency != request.amount.currency() {
                return invalid(format!(
                    "source wallet holds {}, request is {}",
                    from.currency,
                    request.amount.currency()
                ));
            }
        }

        if let Some(to_id) = request.to_wallet {
            let to = self
                .registry
                .wallet(to_id)
                .ok_or(EngineError::WalletNotFound(to_id))?;
            // Incoming kinds fund the submitter's own wallet; transfers may
            // target anyone's.
            if !kind.is_transfer() && to.owner != request.owner {
                return invalid(
                    "destination wallet does not belong to the submitting user".to_string(),
                );
            }
            if !to.active {
                return Err(EngineError::WalletInactive(to_id));
            }
            if to.currency != request.amount.currency() {
                return invalid(format!(
                    "destination wallet holds {}, request is {}",
                    to.currency,
                    request.amount.currency()
                ));
            }
        }

        Ok(())
    }

    // -----------------------------------------------------------------------
    // Settlement
    // -----------------------------------------------------------------------

    /// Applies the settlement confirmer's verdict to a pending transaction.
    ///
    /// Idempotent at the transaction level: settling a terminal transaction
    /// returns its recorded state and produces no balance change, mirroring
    /// the reservation-level idempotency in the registry.
    pub fn settle(
        &self,
        id: TransactionId,
        outcome: SettlementOutcome,
    ) -> Result<Transaction, EngineError> {
        let slot = self
            .transactions
            .get(&id)
            .map(|e| e.value().clone())
            .ok_or(EngineError::TransactionNotFound(id))?;

        let mut stored = slot.lock();
        if stored.transaction.status.is_terminal() {
            return Ok(stored.transaction.clone());
        }

        match outcome {
            SettlementOutcome::Commit => {
                // Destination first — see module docs on ordering.
                if let Some(to) = stored.transaction.to_wallet {
                    self.registry.credit(to, stored.transaction.amount)?;
                }
                if let Some(reservation) = stored.reservation {
                    self.registry.settle(reservation, SettleOutcome::Commit)?;
                }
                stored.transaction.status = TransactionStatus::Completed;
            }
            SettlementOutcome::Fail => {
                if let Some(reservation) = stored.reservation {
                    self.registry.settle(reservation, SettleOutcome::Release)?;
                }
                stored.transaction.status = TransactionStatus::Failed;
            }
        }
        stored.transaction.settled_at = Some(Utc::now());

        tracing::info!(
            tx = %id,
            outcome = %outcome,
            status = %stored.transaction.status,
            "transaction settled"
        );
        Ok(stored.transaction.clone())
    }

    /// Cancels a transaction that is still `Pending`.
    ///
    /// Releases the reservation, so the held funds become available again.
    /// Once settlement has produced a terminal state, cancellation is
    /// rejected with the recorded status.
    pub fn cancel(&self, id: TransactionId) -> Result<Transaction, EngineError> {
        let slot = self
            .transactions
            .get(&id)
            .map(|e| e.value().clone())
            .ok_or(EngineError::TransactionNotFound(id))?;

        let mut stored = slot.lock();
        if stored.transaction.status.is_terminal() {
            return Err(EngineError::AlreadySettled {
                id,
                status: stored.transaction.status,
            });
        }

        if let Some(reservation) = stored.reservation {
            self.registry.settle(reservation, SettleOutcome::Release)?;
        }
        stored.transaction.status = TransactionStatus::Cancelled;
        stored.transaction.settled_at = Some(Utc::now());

        tracing::info!(tx = %id, "transaction cancelled");
        Ok(stored.transaction.clone())
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    /// Returns a snapshot of a transaction's current state.
    pub fn transaction(&self, id: TransactionId) -> Result<Transaction, EngineError> {
        let slot = self
            .transactions
            .get(&id)
            .map(|e| e.value().clone())
            .ok_or(EngineError::TransactionNotFound(id))?;
        let snapshot = slot.lock().transaction.clone();
        Ok(snapshot)
    }

    /// Returns all of an owner's transactions, newest first.
    pub fn transactions_for(&self, owner: &str) -> Vec<Transaction> {
        let slots: Vec<Arc<Mutex<StoredTransaction>>> =
            self.transactions.iter().map(|e| e.value().clone()).collect();

        let mut result: Vec<Transaction> = slots
            .iter()
            .map(|slot| slot.lock().transaction.clone())
            .filter(|tx| tx.owner == owner)
            .collect();
        result.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        result
    }

    /// Number of transactions the engine has admitted.
    pub fn transaction_count(&self) -> usize {
        self.transactions.len()
    }

    /// Number of transactions still `Pending`.
    pub fn pending_count(&self) -> usize {
        let slots: Vec<Arc<Mutex<StoredTransaction>>> =
            self.transactions.iter().map(|e| e.value().clone()).collect();
        slots
            .iter()
            .filter(|slot| slot.lock().transaction.status == TransactionStatus::Pending)
            .count()
    }

    // -----------------------------------------------------------------------
    // Snapshot
    // -----------------------------------------------------------------------

    /// Exports the full engine state for persistence.
    ///
    /// Each record is internally consistent; the snapshot as a whole is
    /// taken without a global pause, so records admitted during the export
    /// may or may not be included.
    pub fn snapshot(&self) -> LedgerSnapshot {
        let (wallets, reservations) = self.registry.export();

        let slots: Vec<Arc<Mutex<StoredTransaction>>> =
            self.transactions.iter().map(|e| e.value().clone()).collect();
        let mut transactions: Vec<StoredTransaction> =
            slots.iter().map(|slot| slot.lock().clone()).collect();
        transactions.sort_by_key(|s| s.transaction.id);

        LedgerSnapshot {
            wallets,
            reservations,
            transactions,
            verification: self.gate.export(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
