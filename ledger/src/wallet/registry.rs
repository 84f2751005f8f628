//! # Wallet Registry — The Balance Arena
//!
//! The registry owns every wallet record and is the only code path that
//! mutates a balance. It hands out snapshots, never live references.
//!
//! ## Concurrency
//!
//! - Wallets live in a `DashMap<WalletId, Arc<Mutex<Wallet>>>`. The DashMap
//!   gives lock-free routing to the right wallet; the per-wallet
//!   `parking_lot::Mutex` linearizes the operations on that wallet.
//!   Operations on disjoint wallets never contend. There is no global lock.
//! - The insufficient-funds check and the pending-balance increment in
//!   [`reserve`](WalletRegistry::reserve) happen under a single lock
//!   acquisition — one atomic step, not check-then-act across two calls.
//! - Lock order is reservation → wallet, and at most one wallet lock is held
//!   at a time. DashMap shard references are dropped before any mutex is
//!   acquired.
//!
//! ## Invariants
//!
//! For every wallet, at all times: `balance >= 0`, `pending_balance >= 0`,
//! and `pending_balance <= balance`. Every open reservation is counted in
//! its wallet's `pending_balance`.

use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;
use thiserror::Error;

use crate::money::{Amount, Currency};
use crate::wallet::account::{Wallet, WalletId, WalletType};
use crate::wallet::reservation::{Reservation, ReservationId, SettleOutcome};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors returned by registry operations.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// No wallet exists with the given id.
    #[error("wallet not found: {0}")]
    WalletNotFound(WalletId),

    /// The wallet has been deactivated and rejects money movement.
    #[error("wallet {0} is inactive")]
    WalletInactive(WalletId),

    /// Zero-amount reservations and credits are no-ops and likely indicate
    /// a bug in the caller.
    #[error("zero-amount operations are not permitted")]
    ZeroAmount,

    /// The amount's currency does not match the wallet's currency.
    #[error("currency mismatch on wallet {wallet_id}: wallet holds {wallet_currency}, got {amount_currency}")]
    CurrencyMismatch {
        /// The wallet being operated on.
        wallet_id: WalletId,
        /// The wallet's fixed currency.
        wallet_currency: Currency,
        /// The currency of the offered amount.
        amount_currency: Currency,
    },

    /// Available funds (`balance - pending_balance`) do not cover the
    /// requested reservation.
    #[error("insufficient funds on wallet {wallet_id}: available {available}, requested {requested} (minor units of {currency})")]
    InsufficientFunds {
        /// The wallet being debited.
        wallet_id: WalletId,
        /// Available minor units at admission time.
        available: u64,
        /// Requested minor units.
        requested: u64,
        /// The wallet's currency.
        currency: Currency,
    },

    /// A credit would push the balance past `u64::MAX` minor units.
    /// If you're hitting this, someone is crediting more than 18.4
    /// quintillion minor units. That's either a bug or an attack.
    #[error("balance overflow on wallet {0}")]
    BalanceOverflow(WalletId),

    /// No reservation exists with the given id.
    #[error("reservation not found: {0}")]
    ReservationNotFound(ReservationId),
}

// ---------------------------------------------------------------------------
// WalletRegistry
// ---------------------------------------------------------------------------

/// The arena of all wallet records, with atomic balance operations.
///
/// Cheap to share via `Arc`; every method takes `&self`.
#[derive(Debug, Default)]
pub struct WalletRegistry {
    /// All wallets, each behind its own lock.
    wallets: DashMap<WalletId, Arc<Mutex<Wallet>>>,
    /// Lazy-creation index: `(owner, type)` -> wallet id.
    index: DashMap<(String, WalletType), WalletId>,
    /// All reservations ever taken, open and settled.
    reservations: DashMap<ReservationId, Arc<Mutex<Reservation>>>,
}

impl WalletRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds a registry from snapshot state.
    ///
    /// Used at service startup to restore persisted wallets and still-open
    /// reservations. The `(owner, type)` index is derived from the wallet
    /// records themselves.
    pub fn restore(wallets: Vec<Wallet>, reservations: Vec<Reservation>) -> Self {
        let registry = Self::new();
        for wallet in wallets {
            registry
                .index
                .insert((wallet.owner.clone(), wallet.wallet_type), wallet.id);
            registry
                .wallets
                .insert(wallet.id, Arc::new(Mutex::new(wallet)));
        }
        for reservation in reservations {
            registry
                .reservations
                .insert(reservation.id, Arc::new(Mutex::new(reservation)));
        }
        registry
    }

    // -----------------------------------------------------------------------
    // Creation & Reads
    // -----------------------------------------------------------------------

    /// Returns the wallet for `(owner, wallet_type)`, creating it with zero
    /// balances on first request.
    ///
    /// A wallet's currency is fixed by whoever creates it first; subsequent
    /// calls return the existing wallet regardless of the currency argument.
    /// Creation is atomic — two concurrent calls for the same `(owner, type)`
    /// produce exactly one wallet.
    pub fn get_or_create(
        &self,
        owner: &str,
        wallet_type: WalletType,
        currency: Currency,
    ) -> Result<Wallet, RegistryError> {
        let key = (owner.to_string(), wallet_type);
        let id = *self.index.entry(key).or_insert_with(|| {
            let wallet = Wallet::new(owner, wallet_type, currency);
            let id = wallet.id;
            tracing::info!(owner, wallet_type = %wallet_type, currency = %currency, wallet_id = %id, "wallet created");
            self.wallets.insert(id, Arc::new(Mutex::new(wallet)));
            id
        });
        self.wallet(id).ok_or(RegistryError::WalletNotFound(id))
    }

    /// Returns a snapshot of the wallet with the given id.
    pub fn wallet(&self, id: WalletId) -> Option<Wallet> {
        let slot = self.wallets.get(&id)?.value().clone();
        let snapshot = slot.lock().clone();
        Some(snapshot)
    }

    /// Returns a snapshot of the owner's wallet of the given type, if it
    /// has been created.
    pub fn find(&self, owner: &str, wallet_type: WalletType) -> Option<Wallet> {
        let id = *self.index.get(&(owner.to_string(), wallet_type))?.value();
        self.wallet(id)
    }

    /// Returns snapshots of all wallets belonging to an owner, oldest first.
    pub fn wallets_for(&self, owner: &str) -> Vec<Wallet> {
        let slots: Vec<Arc<Mutex<Wallet>>> =
            self.wallets.iter().map(|e| e.value().clone()).collect();

        let mut result: Vec<Wallet> = slots
            .iter()
            .map(|slot| slot.lock().clone())
            .filter(|w| w.owner == owner)
            .collect();
        result.sort_by_key(|w| w.created_at);
        result
    }

    /// Returns the number of wallets in the registry.
    pub fn wallet_count(&self) -> usize {
        self.wallets.len()
    }

    /// Returns a snapshot of a reservation.
    pub fn reservation(&self, id: ReservationId) -> Option<Reservation> {
        let slot = self.reservations.get(&id)?.value().clone();
        let snapshot = slot.lock().clone();
        Some(snapshot)
    }

    // -----------------------------------------------------------------------
    // Balance Operations
    // -----------------------------------------------------------------------

    /// Places a hold on `amount` iff the wallet's available funds cover it.
    ///
    /// This is the only admission check for outgoing funds. The check and
    /// the `pending_balance` increment are a single atomic step under the
    /// wallet's lock.
    ///
    /// # Errors
    ///
    /// [`RegistryError::InsufficientFunds`] when
    /// `balance - pending_balance < amount`; also rejects zero amounts,
    /// inactive wallets, and currency mismatches. No partial state is left
    /// behind on any failure.
    pub fn reserve(
        &self,
        wallet_id: WalletId,
        amount: Amount,
    ) -> Result<ReservationId, RegistryError> {
        if amount.is_zero() {
            return Err(RegistryError::ZeroAmount);
        }
        let slot = self
            .wallets
            .get(&wallet_id)
            .map(|e| e.value().clone())
            .ok_or(RegistryError::WalletNotFound(wallet_id))?;

        let mut wallet = slot.lock();
        if !wallet.active {
            return Err(RegistryError::WalletInactive(wallet_id));
        }
        if wallet.currency != amount.currency() {
            return Err(RegistryError::CurrencyMismatch {
                wallet_id,
                wallet_currency: wallet.currency,
                amount_currency: amount.currency(),
            });
        }

        let available = wallet.available();
        if available < amount.minor() {
            return Err(RegistryError::InsufficientFunds {
                wallet_id,
                available,
                requested: amount.minor(),
                currency: wallet.currency,
            });
        }

        // Covered by the check above: pending + amount <= balance, so this
        // cannot overflow.
        wallet.pending_balance += amount.minor();

        let reservation = Reservation::new(wallet_id, amount);
        let reservation_id = reservation.id;
        self.reservations
            .insert(reservation_id, Arc::new(Mutex::new(reservation)));

        tracing::debug!(
            wallet = %wallet_id,
            reservation = %reservation_id,
            amount = %amount,
            pending = wallet.pending_balance,
            "funds reserved"
        );
        Ok(reservation_id)
    }

    /// Resolves a reservation.
    ///
    /// `Commit` moves the held funds out of the wallet (balance and pending
    /// both decrease); `Release` undoes the hold (only pending decreases).
    ///
    /// Idempotent: settling an already-settled reservation is a no-op that
    /// returns the previously recorded outcome.
    pub fn settle(
        &self,
        reservation_id: ReservationId,
        outcome: SettleOutcome,
    ) -> Result<SettleOutcome, RegistryError> {
        let res_slot = self
            .reservations
            .get(&reservation_id)
            .map(|e| e.value().clone())
            .ok_or(RegistryError::ReservationNotFound(reservation_id))?;

        // Lock order: reservation first, then its wallet. No other path
        // acquires them in the opposite order.
        let mut reservation = res_slot.lock();
        if let Some(prior) = reservation.outcome {
            return Ok(prior);
        }

        let wallet_slot = self
            .wallets
            .get(&reservation.wallet_id)
            .map(|e| e.value().clone())
            .ok_or(RegistryError::WalletNotFound(reservation.wallet_id))?;

        let mut wallet = wallet_slot.lock();
        let held = reservation.amount.minor();

        // An open reservation is always counted in pending_balance (and,
        // transitively, covered by balance), so neither subtraction can
        // underflow.
        match outcome {
            SettleOutcome::Commit => {
                wallet.balance -= held;
                wallet.pending_balance -= held;
            }
            SettleOutcome::Release => {
                wallet.pending_balance -= held;
            }
        }
        reservation.outcome = Some(outcome);

        tracing::debug!(
            wallet = %reservation.wallet_id,
            reservation = %reservation_id,
            outcome = %outcome,
            balance = wallet.balance,
            pending = wallet.pending_balance,
            "reservation settled"
        );
        Ok(outcome)
    }

    /// Atomically credits `amount` to a wallet's settled balance.
    ///
    /// Used for the receiving side of a transfer and for top-ups. Returns
    /// the new balance in minor units.
    pub fn credit(&self, wallet_id: WalletId, amount: Amount) -> Result<u64, RegistryError> {
        if amount.is_zero() {
            return Err(RegistryError::ZeroAmount);
        }
        let slot = self
            .wallets
            .get(&wallet_id)
            .map(|e| e.value().clone())
            .ok_or(RegistryError::WalletNotFound(wallet_id))?;

        let mut wallet = slot.lock();
        if !wallet.active {
            return Err(RegistryError::WalletInactive(wallet_id));
        }
        if wallet.currency != amount.currency() {
            return Err(RegistryError::CurrencyMismatch {
                wallet_id,
                wallet_currency: wallet.currency,
                amount_currency: amount.currency(),
            });
        }

        wallet.balance = wallet
            .balance
            .checked_add(amount.minor())
            .ok_or(RegistryError::BalanceOverflow(wallet_id))?;

        tracing::debug!(
            wallet = %wallet_id,
            amount = %amount,
            balance = wallet.balance,
            "wallet credited"
        );
        Ok(wallet.balance)
    }

    /// Deactivates a wallet. Wallets are never deleted.
    ///
    /// A deactivated wallet rejects new reservations and credits, but open
    /// reservations against it still settle — pending transactions must be
    /// able to reach a terminal state.
    pub fn deactivate(&self, wallet_id: WalletId) -> Result<Wallet, RegistryError> {
        let slot = self
            .wallets
            .get(&wallet_id)
            .map(|e| e.value().clone())
            .ok_or(RegistryError::WalletNotFound(wallet_id))?;

        let mut wallet = slot.lock();
        wallet.active = false;
        tracing::info!(wallet = %wallet_id, "wallet deactivated");
        Ok(wallet.clone())
    }

    // -----------------------------------------------------------------------
    // Snapshot Export
    // -----------------------------------------------------------------------

    /// Exports all wallets and reservations for persistence.
    pub fn export(&self) -> (Vec<Wallet>, Vec<Reservation>) {
        let wallet_slots: Vec<Arc<Mutex<Wallet>>> =
            self.wallets.iter().map(|e| e.value().clone()).collect();
        let mut wallets: Vec<Wallet> =
            wallet_slots.iter().map(|slot| slot.lock().clone()).collect();
        wallets.sort_by_key(|w| w.id);

        let res_slots: Vec<Arc<Mutex<Reservation>>> =
            self.reservations.iter().map(|e| e.value().clone()).collect();
        let mut reservations: Vec<Reservation> =
            res_slots.iter().map(|slot| slot.lock().clone()).collect();
        reservations.sort_by_key(|r| r.id);

        (wallets, reservations)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn usd(minor: u64) -> Amount {
        Amount::from_minor(minor, Currency::USD)
    }

    fn funded_wallet(registry: &WalletRegistry, owner: &str, minor: u64) -> WalletId {
        let w = registry
            .get_or_create(owner, WalletType::Primary, Currency::USD)
            .unwrap();
        if minor > 0 {
            registry.credit(w.id, usd(minor)).unwrap();
        }
        w.id
    }

    #[test]
    fn get_or_create_is_lazy_and_stable() {
        let registry = WalletRegistry::new();

        let first = registry
            .get_or_create("alice", WalletType::Primary, Currency::USD)
            .unwrap();
        let second = registry
            .get_or_create("alice", WalletType::Primary, Currency::USD)
            .unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(registry.wallet_count(), 1);

        let savings = registry
            .get_or_create("alice", WalletType::Savings, Currency::USD)
            .unwrap();
        assert_ne!(savings.id, first.id);
        assert_eq!(registry.wallet_count(), 2);
    }

    #[test]
    fn currency_is_fixed_by_first_creation() {
        let registry = WalletRegistry::new();
        let first = registry
            .get_or_create("alice", WalletType::Crypto, Currency::BTC)
            .unwrap();
        let again = registry
            .get_or_create("alice", WalletType::Crypto, Currency::USD)
            .unwrap();

        assert_eq!(again.id, first.id);
        assert_eq!(again.currency, Currency::BTC);
    }

    #[test]
    fn credit_increases_balance() {
        let registry = WalletRegistry::new();
        let id = funded_wallet(&registry, "alice", 0);

        assert_eq!(registry.credit(id, usd(5_000)).unwrap(), 5_000);
        assert_eq!(registry.credit(id, usd(2_500)).unwrap(), 7_500);
        assert_eq!(registry.wallet(id).unwrap().balance, 7_500);
    }

    #[test]
    fn credit_overflow_rejected() {
        let registry = WalletRegistry::new();
        let id = funded_wallet(&registry, "alice", u64::MAX);

        let err = registry.credit(id, usd(1)).unwrap_err();
        assert!(matches!(err, RegistryError::BalanceOverflow(_)));
    }

    #[test]
    fn reserve_holds_available_funds() {
        let registry = WalletRegistry::new();
        let id = funded_wallet(&registry, "alice", 100_000);

        registry.reserve(id, usd(10_000)).unwrap();

        let w = registry.wallet(id).unwrap();
        assert_eq!(w.balance, 100_000);
        assert_eq!(w.pending_balance, 10_000);
        assert_eq!(w.available(), 90_000);
    }

    #[test]
    fn reserve_rejects_overdraw() {
        let registry = WalletRegistry::new();
        let id = funded_wallet(&registry, "alice", 50_000);

        let err = registry.reserve(id, usd(200_000)).unwrap_err();
        assert!(matches!(
            err,
            RegistryError::InsufficientFunds {
                available: 50_000,
                requested: 200_000,
                ..
            }
        ));
        // No partial reservation left behind.
        assert_eq!(registry.wallet(id).unwrap().pending_balance, 0);
    }

    #[test]
    fn reserve_counts_existing_holds() {
        let registry = WalletRegistry::new();
        let id = funded_wallet(&registry, "alice", 100_000);

        registry.reserve(id, usd(70_000)).unwrap();
        // 30_000 available; a 40_000 hold must fail even though balance
        // alone would cover it.
        let err = registry.reserve(id, usd(40_000)).unwrap_err();
        assert!(matches!(err, RegistryError::InsufficientFunds { .. }));

        registry.reserve(id, usd(30_000)).unwrap();
        assert_eq!(registry.wallet(id).unwrap().available(), 0);
    }

    #[test]
    fn reserve_rejects_zero_and_wrong_currency() {
        let registry = WalletRegistry::new();
        let id = funded_wallet(&registry, "alice", 1_000);

        assert!(matches!(
            registry.reserve(id, usd(0)).unwrap_err(),
            RegistryError::ZeroAmount
        ));
        assert!(matches!(
            registry
                .reserve(id, Amount::from_minor(100, Currency::EUR))
                .unwrap_err(),
            RegistryError::CurrencyMismatch { .. }
        ));
    }

    #[test]
    fn reserve_rejects_unknown_wallet() {
        let registry = WalletRegistry::new();
        let err = registry.reserve(WalletId::new(), usd(100)).unwrap_err();
        assert!(matches!(err, RegistryError::WalletNotFound(_)));
    }

    #[test]
    fn settle_commit_moves_funds_out() {
        let registry = WalletRegistry::new();
        let id = funded_wallet(&registry, "alice", 100_000);
        let res = registry.reserve(id, usd(10_000)).unwrap();

        let outcome = registry.settle(res, SettleOutcome::Commit).unwrap();
        assert_eq!(outcome, SettleOutcome::Commit);

        let w = registry.wallet(id).unwrap();
        assert_eq!(w.balance, 90_000);
        assert_eq!(w.pending_balance, 0);
    }

    #[test]
    fn settle_release_undoes_hold() {
        let registry = WalletRegistry::new();
        let id = funded_wallet(&registry, "alice", 100_000);
        let res = registry.reserve(id, usd(10_000)).unwrap();

        registry.settle(res, SettleOutcome::Release).unwrap();

        let w = registry.wallet(id).unwrap();
        assert_eq!(w.balance, 100_000);
        assert_eq!(w.pending_balance, 0);
    }

    #[test]
    fn settle_is_idempotent() {
        let registry = WalletRegistry::new();
        let id = funded_wallet(&registry, "alice", 100_000);
        let res = registry.reserve(id, usd(10_000)).unwrap();

        registry.settle(res, SettleOutcome::Commit).unwrap();
        // Second settle — with the opposite outcome, even — is a no-op that
        // returns the recorded outcome.
        let outcome = registry.settle(res, SettleOutcome::Release).unwrap();
        assert_eq!(outcome, SettleOutcome::Commit);

        let w = registry.wallet(id).unwrap();
        assert_eq!(w.balance, 90_000);
        assert_eq!(w.pending_balance, 0);
    }

    #[test]
    fn settle_unknown_reservation_rejected() {
        let registry = WalletRegistry::new();
        let err = registry
            .settle(ReservationId::new(), SettleOutcome::Commit)
            .unwrap_err();
        assert!(matches!(err, RegistryError::ReservationNotFound(_)));
    }

    #[test]
    fn inactive_wallet_rejects_movement_but_settles_holds() {
        let registry = WalletRegistry::new();
        let id = funded_wallet(&registry, "alice", 100_000);
        let res = registry.reserve(id, usd(10_000)).unwrap();

        registry.deactivate(id).unwrap();

        assert!(matches!(
            registry.reserve(id, usd(100)).unwrap_err(),
            RegistryError::WalletInactive(_)
        ));
        assert!(matches!(
            registry.credit(id, usd(100)).unwrap_err(),
            RegistryError::WalletInactive(_)
        ));

        // The open hold still settles — pending transactions must be able
        // to terminate.
        registry.settle(res, SettleOutcome::Commit).unwrap();
        assert_eq!(registry.wallet(id).unwrap().balance, 90_000);
    }

    #[test]
    fn wallets_for_lists_only_owner() {
        let registry = WalletRegistry::new();
        funded_wallet(&registry, "alice", 100);
        registry
            .get_or_create("alice", WalletType::Savings, Currency::USD)
            .unwrap();
        funded_wallet(&registry, "bob", 200);

        let alices = registry.wallets_for("alice");
        assert_eq!(alices.len(), 2);
        assert!(alices.iter().all(|w| w.owner == "alice"));
    }

    #[test]
    fn concurrent_reserves_never_overdraw() {
        use std::thread;

        let registry = Arc::new(WalletRegistry::new());
        let id = funded_wallet(&registry, "alice", 100_000);

        // 20 threads each try to hold 10_000; only 10 can fit.
        let handles: Vec<_> = (0..20)
            .map(|_| {
                let registry = Arc::clone(&registry);
                thread::spawn(move || registry.reserve(id, usd(10_000)).is_ok())
            })
            .collect();

        let successes = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|&ok| ok)
            .count();

        assert_eq!(successes, 10);
        let w = registry.wallet(id).unwrap();
        assert_eq!(w.pending_balance, 100_000);
        assert_eq!(w.available(), 0);
    }

    #[test]
    fn concurrent_get_or_create_is_single_wallet() {
        use std::thread;

        let registry = Arc::new(WalletRegistry::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                thread::spawn(move || {
                    registry
                        .get_or_create("alice", WalletType::Primary, Currency::USD)
                        .unwrap()
                        .id
                })
            })
            .collect();

        let ids: Vec<WalletId> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(ids.windows(2).all(|pair| pair[0] == pair[1]));
        assert_eq!(registry.wallet_count(), 1);
    }

    #[test]
    fn export_restore_roundtrip() {
        let registry = WalletRegistry::new();
        let id = funded_wallet(&registry, "alice", 100_000);
        let res = registry.reserve(id, usd(25_000)).unwrap();

        let (wallets, reservations) = registry.export();
        let restored = WalletRegistry::restore(wallets, reservations);

        let w = restored.wallet(id).unwrap();
        assert_eq!(w.balance, 100_000);
        assert_eq!(w.pending_balance, 25_000);

        // The restored registry can settle the carried-over hold.
        restored.settle(res, SettleOutcome::Commit).unwrap();
        assert_eq!(restored.wallet(id).unwrap().balance, 75_000);

        // And the rebuilt index still resolves (owner, type).
        assert_eq!(restored.find("alice", WalletType::Primary).unwrap().id, id);
    }
}
